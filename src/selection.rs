use std::collections::BTreeSet;

use log::{debug, trace};
use noisy_float::prelude::*;

use crate::event::{McEvent, McSample};
use crate::physics::{final_state_descendants, BOTTOM, CHARM, ELECTRON, MUON, PHOTON, TAU};
use crate::reco::{register_once, IsolationCone, RecEvent, RecTrack, ISOLATION_RADII};
use crate::traits::{Classify, DecayOrigin, Identify};

/// Transverse momentum below which particles are ignored
pub const MIN_PT: f64 = 1e-10;

/// Outcome of the selection of clustering inputs
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    /// Particles already reconstructed as leptons or photons
    pub vetoed: Vec<bool>,
    /// Final-state decay products of identified hadronic taus
    pub tau_descendants: BTreeSet<usize>,
}

impl Selection {
    /// Whether the particle is consumed by a non-jet object
    pub fn is_vetoed(&self, idx: usize) -> bool {
        self.vetoed[idx] || self.tau_descendants.contains(&idx)
    }
}

/// How a tau decays according to its direct daughters
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TauDecayKind {
    Muonic,
    Electronic,
    Hadronic,
}

/// Classify a tau decay from the ids of its direct daughters
pub fn tau_decay_kind(mc: &McEvent, tau: usize) -> TauDecayKind {
    let mut leptonic = true;
    let mut muonic = false;
    let mut electronic = false;
    for &d in mc[tau].daughters() {
        match mc[d].pdg_id().abs() {
            MUON => muonic = true,
            ELECTRON => electronic = true,
            PHOTON | 11..=16 => {}
            _ => leptonic = false,
        }
    }
    match (leptonic, muonic, electronic) {
        (true, true, _) => TauDecayKind::Muonic,
        (true, false, true) => TauDecayKind::Electronic,
        _ => TauDecayKind::Hadronic,
    }
}

/// Whether no direct daughter repeats the particle id, i.e. this is
/// the last copy in a chain of same-flavour entries
fn is_last_copy(mc: &McEvent, idx: usize) -> bool {
    let id = mc[idx].pid;
    mc[idx].daughters().iter().all(|&d| mc[d].pid != id)
}

/// Selection of the particles entering jet clustering
///
/// Leptons, photons, and identified hadronic taus are reconstructed
/// directly from the generator-level record and their source
/// particles are vetoed.
pub struct InputSelector<'a, C: ?Sized, O: ?Sized, I: ?Sized> {
    pub classifier: &'a C,
    pub origin: &'a O,
    pub tau_id: &'a mut I,
    /// Reject leptons and photons stemming from hadron decays
    pub exclusive_id: bool,
    /// Reconstruct tracks from charged final-state particles
    pub fill_tracks: bool,
}

impl<'a, C, O, I> InputSelector<'a, C, O, I>
where
    C: Classify + ?Sized,
    O: DecayOrigin + ?Sized,
    I: Identify + ?Sized,
{
    /// Classify all particles of `mc`, filling the corresponding
    /// reconstructed objects into `rec`
    pub fn select(&mut self, mc: &McEvent, sample: &McSample, rec: &mut RecEvent) -> Selection {
        let mut sel = Selection {
            vetoed: vec![false; mc.len()],
            tau_descendants: BTreeSet::new(),
        };
        for (idx, part) in mc.particles().iter().enumerate() {
            // initial state
            if part.pt() < MIN_PT {
                continue;
            }
            let absid = part.pdg_id().abs();
            if self.classifier.is_inter_state(part) {
                if !matches!(absid, BOTTOM | CHARM | TAU) || !is_last_copy(mc, idx) {
                    continue;
                }
                match absid {
                    BOTTOM => {
                        register_once(&mut rec.mc_bquarks, idx);
                    }
                    CHARM => {
                        register_once(&mut rec.mc_cquarks, idx);
                    }
                    _ => self.select_tau(mc, idx, sample, rec, &mut sel),
                }
            } else if self.classifier.is_final_state(part) {
                if !matches!(absid, ELECTRON | MUON | PHOTON) {
                    continue;
                }
                if self.exclusive_id && self.origin.coming_from_hadron_decay(mc, idx, sample) {
                    continue;
                }
                let charge = part.pdg_id() < 0;
                let isolation_cones = self.isolation_cones(mc, idx);
                match absid {
                    MUON => {
                        let muon = rec.new_muon();
                        muon.momentum = part.momentum;
                        muon.charge = charge;
                        muon.mc = Some(idx);
                        muon.isolation_cones = isolation_cones;
                    }
                    ELECTRON => {
                        let electron = rec.new_electron();
                        electron.momentum = part.momentum;
                        electron.charge = charge;
                        electron.mc = Some(idx);
                        electron.isolation_cones = isolation_cones;
                    }
                    _ => {
                        if self.origin.irrelevant_photon(mc, idx, sample) {
                            continue;
                        }
                        let photon = rec.new_photon();
                        photon.momentum = part.momentum;
                        photon.mc = Some(idx);
                        photon.isolation_cones = isolation_cones;
                    }
                }
                sel.vetoed[idx] = true;
            }
        }
        if self.fill_tracks {
            self.fill_tracks(mc, rec);
        }
        debug!(
            "selected {} electrons, {} muons, {} photons, {} taus; {} b, {} c quarks",
            rec.electrons.len(),
            rec.muons.len(),
            rec.photons.len(),
            rec.taus.len(),
            rec.mc_bquarks.len(),
            rec.mc_cquarks.len(),
        );
        sel
    }

    fn select_tau(
        &mut self,
        mc: &McEvent,
        idx: usize,
        sample: &McSample,
        rec: &mut RecEvent,
        sel: &mut Selection,
    ) {
        if self.origin.coming_from_hadron_decay(mc, idx, sample) {
            return;
        }
        let kind = tau_decay_kind(mc, idx);
        trace!("tau {idx}: {kind:?}");
        match kind {
            TauDecayKind::Muonic => {
                register_once(&mut rec.mc_muonic_taus, idx);
            }
            TauDecayKind::Electronic => {
                register_once(&mut rec.mc_electronic_taus, idx);
            }
            TauDecayKind::Hadronic => {
                if !register_once(&mut rec.mc_hadronic_taus, idx) {
                    return;
                }
                if !self.tau_id.is_identified() {
                    return;
                }
                let part = &mc[idx];
                let decay_mode = self.classifier.tau_decay_mode(mc, idx);
                let tau = rec.new_tau();
                tau.momentum = part.momentum;
                tau.charge = part.pdg_id() < 0;
                tau.mc = Some(idx);
                tau.decay_mode = decay_mode;
                tau.ntracks = decay_mode.ntracks();
                sel.tau_descendants
                    .extend(final_state_descendants(self.classifier, mc, idx));
            }
        }
    }

    fn is_visible_final_state(&self, mc: &McEvent, idx: usize) -> bool {
        let part = &mc[idx];
        self.classifier.is_final_state(part)
            && !self.classifier.is_invisible(part)
            && part.pt() >= MIN_PT
    }

    fn isolation_cones(&self, mc: &McEvent, idx: usize) -> Vec<IsolationCone> {
        let centre = &mc[idx].momentum;
        let mut cones: Vec<_> = ISOLATION_RADII
            .iter()
            .map(|&r| IsolationCone {
                delta_r: n64(r),
                ..Default::default()
            })
            .collect();
        for (other, part) in mc.particles().iter().enumerate() {
            if other == idx || !self.is_visible_final_state(mc, other) {
                continue;
            }
            let dr = centre.delta_r2(&part.momentum).sqrt();
            let charged = self.classifier.is_charged(part.pid);
            for cone in cones.iter_mut().filter(|c| c.delta_r > dr) {
                cone.sum_et += part.momentum.et();
                if charged {
                    cone.sum_pt += part.pt();
                    cone.ntracks += 1;
                }
            }
        }
        cones
    }

    fn fill_tracks(&self, mc: &McEvent, rec: &mut RecEvent) {
        for (idx, part) in mc.particles().iter().enumerate() {
            if !self.is_visible_final_state(mc, idx) {
                continue;
            }
            let charge = crate::physics::three_charge(part.pdg_id());
            if charge == 0 {
                continue;
            }
            rec.tracks.push(RecTrack {
                momentum: part.momentum,
                pid: part.pid,
                charge: charge > 0,
                mc: Some(idx),
                isolation_cones: self.isolation_cones(mc, idx),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::McEventBuilder;
    use crate::four_vector::FourVector;
    use crate::physics::{HadronDecayOrigin, PdgClassifier};
    use crate::tagger::Efficiency;
    use particle_id::ParticleID;

    fn log_init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn p(px: f64, py: f64, pz: f64) -> FourVector {
        FourVector::from_pxpypze(px, py, pz, (px * px + py * py + pz * pz).sqrt())
    }

    fn select(mc: &McEvent, exclusive_id: bool, efficiency: f64) -> (Selection, RecEvent) {
        let classifier = PdgClassifier::new();
        let origin = HadronDecayOrigin::new();
        let mut tau_id = Efficiency::with_seed(efficiency, 0);
        let mut selector = InputSelector {
            classifier: &classifier,
            origin: &origin,
            tau_id: &mut tau_id,
            exclusive_id,
            fill_tracks: false,
        };
        let mut rec = RecEvent::new();
        let sel = selector.select(mc, &McSample::default(), &mut rec);
        (sel, rec)
    }

    // beam protons, Z -> τ τ with one muonic and one hadronic tau
    fn ditau_event() -> McEvent {
        let mut b = McEventBuilder::new();
        b.add_particle(ParticleID::new(2212), 4, [0, 0], p(0., 0., 6500.))
            .add_particle(ParticleID::new(2212), 4, [0, 0], p(0., 0., -6500.))
            .add_particle(ParticleID::new(23), 2, [1, 2], p(5., 0., 10.))
            // 3: tau copy, 4: last copy
            .add_particle(ParticleID::new(15), 2, [3, 0], p(20., 5., 3.))
            .add_particle(ParticleID::new(15), 2, [4, 0], p(20., 5., 3.))
            .add_particle(ParticleID::new(-15), 2, [3, 0], p(-15., -5., 7.))
            // 6-8: muonic tau decay
            .add_particle(ParticleID::new(13), 1, [5, 0], p(10., 3., 1.))
            .add_particle(ParticleID::new(-14), 1, [5, 0], p(5., 1., 1.))
            .add_particle(ParticleID::new(16), 1, [5, 0], p(5., 1., 1.))
            // 9-10: hadronic tau decay
            .add_particle(ParticleID::new(211), 1, [6, 0], p(-10., -4., 5.))
            .add_particle(ParticleID::new(-16), 1, [6, 0], p(-5., -1., 2.))
            // 11: photon, 12: pion
            .add_particle(ParticleID::new(22), 1, [3, 0], p(1., 20., 0.))
            .add_particle(ParticleID::new(-211), 1, [3, 0], p(0., -30., 4.));
        b.build().unwrap()
    }

    #[test]
    fn taus() {
        log_init();
        let mc = ditau_event();
        let (sel, rec) = select(&mc, true, 1.);
        assert_eq!(rec.mc_muonic_taus, [4]);
        assert!(rec.mc_electronic_taus.is_empty());
        assert_eq!(rec.mc_hadronic_taus, [5]);
        assert_eq!(rec.taus.len(), 1);
        let tau = &rec.taus[0];
        assert_eq!(tau.mc, Some(5));
        assert!(tau.charge);
        assert_eq!(tau.ntracks, 1);
        assert_eq!(sel.tau_descendants, BTreeSet::from([9, 10]));

        assert_eq!(rec.muons.len(), 1);
        assert!(!rec.muons[0].charge);
        assert_eq!(rec.muons[0].mc, Some(6));
        assert_eq!(rec.photons.len(), 1);
        assert!(sel.vetoed[6] && sel.vetoed[11]);
        assert!(!sel.vetoed[12]);
        assert!(sel.is_vetoed(9));
        assert!(!sel.is_vetoed(12));
        assert_eq!(rec.muons[0].isolation_cones.len(), ISOLATION_RADII.len());
    }

    #[test]
    fn unidentified_tau() {
        let mc = ditau_event();
        let (sel, rec) = select(&mc, true, 0.);
        assert_eq!(rec.mc_hadronic_taus, [5]);
        assert!(rec.taus.is_empty());
        assert!(sel.tau_descendants.is_empty());
    }

    #[test]
    fn muonic_tau_daughters() {
        let mut b = McEventBuilder::new();
        b.add_particle(ParticleID::new(15), 2, [0, 0], p(20., 0., 0.))
            .add_particle(ParticleID::new(13), 1, [1, 0], p(15., 0., 0.))
            .add_particle(ParticleID::new(14), 1, [1, 0], p(5., 0., 0.));
        let mc = b.build().unwrap();
        assert_eq!(tau_decay_kind(&mc, 0), TauDecayKind::Muonic);
        let (_, rec) = select(&mc, true, 1.);
        assert_eq!(rec.mc_muonic_taus, [0]);
        assert!(rec.mc_hadronic_taus.is_empty());
        assert!(rec.taus.is_empty());
    }

    #[test]
    fn heavy_quarks() {
        let mut b = McEventBuilder::new();
        b.add_particle(ParticleID::new(5), 2, [0, 0], p(20., 0., 0.))
            .add_particle(ParticleID::new(5), 2, [1, 0], p(19., 0., 0.))
            .add_particle(ParticleID::new(21), 1, [1, 0], p(1., 0., 0.))
            .add_particle(ParticleID::new(-4), 2, [0, 0], p(0., 20., 0.))
            // zero transverse momentum
            .add_particle(ParticleID::new(5), 2, [0, 0], p(0., 0., 20.));
        let mc = b.build().unwrap();
        let (_, rec) = select(&mc, false, 1.);
        assert_eq!(rec.mc_bquarks, [1]);
        assert_eq!(rec.mc_cquarks, [3]);
    }

    #[test]
    fn leptons_from_hadrons() {
        let mut b = McEventBuilder::new();
        b.add_particle(ParticleID::new(511), 2, [0, 0], p(20., 0., 0.))
            .add_particle(ParticleID::new(-11), 1, [1, 0], p(10., 0., 0.))
            .add_particle(ParticleID::new(12), 1, [1, 0], p(10., 0., 0.));
        let mc = b.build().unwrap();

        let (sel, rec) = select(&mc, true, 1.);
        assert!(rec.electrons.is_empty());
        assert!(!sel.vetoed[1]);

        let (sel, rec) = select(&mc, false, 1.);
        assert_eq!(rec.electrons.len(), 1);
        assert!(rec.electrons[0].charge);
        assert!(sel.vetoed[1]);
    }

    #[test]
    fn isolation_and_tracks() {
        let mut b = McEventBuilder::new();
        b.add_particle(ParticleID::new(11), 1, [0, 0], p(50., 0., 0.))
            .add_particle(ParticleID::new(211), 1, [0, 0], p(10., 1., 0.))
            .add_particle(ParticleID::new(22), 1, [0, 0], p(5., -1.5, 0.))
            .add_particle(ParticleID::new(-211), 1, [0, 0], p(-10., 0., 0.));
        let mc = b.build().unwrap();
        let classifier = PdgClassifier::new();
        let origin = HadronDecayOrigin::new();
        let mut tau_id = Efficiency::with_seed(1., 0);
        let mut selector = InputSelector {
            classifier: &classifier,
            origin: &origin,
            tau_id: &mut tau_id,
            exclusive_id: false,
            fill_tracks: true,
        };
        let mut rec = RecEvent::new();
        selector.select(&mc, &McSample::default(), &mut rec);

        // pion at ΔR ≈ 0.1, photon at ΔR ≈ 0.29
        let cones = &rec.electrons[0].isolation_cones;
        assert_eq!(cones[0].delta_r, 0.5);
        assert_eq!(cones[0].ntracks, 1);
        assert_eq!(cones[1].ntracks, 1);
        assert!(cones[0].sum_et > cones[0].sum_pt);
        assert_eq!(cones[3].ntracks, 1);
        assert!((f64::from(cones[3].sum_et) - f64::from(cones[3].sum_pt)).abs() < 1e-9);

        assert_eq!(rec.tracks.len(), 3);
        assert_eq!(rec.tracks[0].charge(), -1);
        assert_eq!(rec.tracks[1].charge(), 1);
    }
}
