use crate::event::{McEvent, McParticle, McSample};
use crate::traits::{Classify, DecayOrigin};

use log::trace;
use particle_id::hadrons::HADRONS;
use particle_id::ParticleID;
use serde::{Deserialize, Serialize};

/// Status code of stable particles
pub const STATUS_FINAL: i32 = 1;
/// Status code of decayed particles
pub const STATUS_INTERMEDIATE: i32 = 2;
/// Status code of particles from the matrix element in shower records
pub const STATUS_MATRIX_ELEMENT: i32 = 3;
/// Status code of beam particles
pub const STATUS_BEAM: i32 = 4;
/// Status code of incoming partons in Les Houches event records
pub const STATUS_INCOMING: i32 = -1;

/// Pseudo-particle ids of hadronization clusters (91) and strings (92)
pub const HADRONIZATION_IDS: [i32; 2] = [91, 92];

pub const ELECTRON: i32 = 11;
pub const MUON: i32 = 13;
pub const TAU: i32 = 15;
pub const PHOTON: i32 = 22;
pub const GLUON: i32 = 21;
pub const CHARM: i32 = 4;
pub const BOTTOM: i32 = 5;

const PI_PLUS: i32 = 211;
const PI_ZERO: i32 = 111;
const K_PLUS: i32 = 321;

/// Three times the electric charge of the given particle species
///
/// Hadron charges are derived from the quark content encoded in the
/// PDG numbering scheme.
pub fn three_charge(id: i32) -> i32 {
    const QUARK_CHARGES: [i32; 7] = [0, -1, 2, -1, 2, -1, 2];
    let sign = id.signum();
    let aid = id.unsigned_abs() as i32;
    let charge = match aid {
        0 => 0,
        1..=6 => QUARK_CHARGES[aid as usize],
        7 | 8 => QUARK_CHARGES[(aid - 6) as usize],
        11 | 13 | 15 | 17 => -3,
        12 | 14 | 16 | 18 => 0,
        21..=23 | 25 | 32 | 33 | 35 | 36 => 0,
        24 | 34 | 37 => 3,
        81..=100 => 0,
        _ => {
            // nuclei, SUSY and other extensions are treated by their
            // hadronic digits only
            let digits = aid % 10_000;
            let nq1 = (digits / 1000) % 10;
            let nq2 = (digits / 100) % 10;
            let nq3 = (digits / 10) % 10;
            if digits < 100 {
                0
            } else if nq1 == 0 {
                // meson: q qbar with the heavier quark first
                if nq2 > 6 || nq3 > 6 {
                    return 0;
                }
                let c = QUARK_CHARGES[nq2 as usize] - QUARK_CHARGES[nq3 as usize];
                // for down-type heavier quarks the meson is (q̄ q')
                if nq2 % 2 == 1 { -c } else { c }
            } else {
                if nq1 > 6 || nq2 > 6 || nq3 > 6 {
                    return 0;
                }
                QUARK_CHARGES[nq1 as usize]
                    + QUARK_CHARGES[nq2 as usize]
                    + QUARK_CHARGES[nq3 as usize]
            }
        }
    };
    sign * charge
}

/// Tau decay modes
///
/// The numeric codes follow the usual tau decay-mode table; codes 7
/// and 9 are three-prong decays.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize,
)]
pub enum TauDecayMode {
    /// Unclassifiable decay
    #[default]
    Error,
    /// τ → e ν ν
    Electron,
    /// τ → μ ν ν
    Muon,
    /// τ → π ν
    Pion,
    /// τ → K ν
    Kaon,
    /// τ → π π0 ν
    PionPi0,
    /// τ → π 2π0 ν (or more neutral pions)
    PionTwoPi0,
    /// τ → 3π ν
    ThreePion,
    /// other one-prong decays
    OtherOneProng,
    /// τ → 3π π0 ν and other three-prong decays
    ThreePionPi0,
}

impl TauDecayMode {
    /// The numeric decay mode code
    pub fn code(self) -> i32 {
        use TauDecayMode::*;
        match self {
            Error => 0,
            Electron => 1,
            Muon => 2,
            Pion => 3,
            Kaon => 4,
            PionPi0 => 5,
            PionTwoPi0 => 6,
            ThreePion => 7,
            OtherOneProng => 8,
            ThreePionPi0 => 9,
        }
    }

    /// Number of charged tracks expected from the decay
    pub fn ntracks(self) -> u32 {
        match self.code() {
            c if c <= 0 => 0,
            7 | 9 => 3,
            _ => 1,
        }
    }
}

/// Collect the final-state descendants of the particle with index `idx`
///
/// Descendants are visited depth-first with an explicit stack; the
/// search along a branch stops at the first final-state particle.
pub fn final_state_descendants<C: Classify + ?Sized>(
    classifier: &C,
    event: &McEvent,
    idx: usize,
) -> Vec<usize> {
    let mut res = Vec::new();
    let mut visited = vec![false; event.len()];
    let mut stack: Vec<usize> = event[idx].daughters().iter().rev().copied().collect();
    while let Some(d) = stack.pop() {
        if std::mem::replace(&mut visited[d], true) {
            continue;
        }
        if classifier.is_final_state(&event[d]) {
            res.push(d);
        } else {
            stack.extend(event[d].daughters().iter().rev().copied());
        }
    }
    res
}

/// Particle classification based on PDG ids and status codes
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct PdgClassifier {
    /// Additional invisible species, e.g. the lightest neutralino
    pub invisible: Vec<i32>,
}

impl PdgClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Treat the given species as invisible in addition to the neutrinos
    pub fn with_invisible(mut self, ids: impl IntoIterator<Item = i32>) -> Self {
        self.invisible.extend(ids.into_iter().map(|id| id.abs()));
        self
    }

    fn is_invisible_id(&self, aid: i32) -> bool {
        matches!(aid, 12 | 14 | 16) || self.invisible.contains(&aid)
    }
}

impl Classify for PdgClassifier {
    fn is_invisible(&self, p: &McParticle) -> bool {
        self.is_invisible_id(p.pdg_id().abs())
    }

    fn is_final_state(&self, p: &McParticle) -> bool {
        p.status == STATUS_FINAL
    }

    fn is_inter_state(&self, p: &McParticle) -> bool {
        p.status == STATUS_INTERMEDIATE
    }

    fn is_hadronic(&self, p: &McParticle) -> bool {
        let aid = p.pdg_id().abs();
        !(self.is_invisible_id(aid) || matches!(aid, ELECTRON | MUON | TAU | PHOTON))
    }

    fn is_charged(&self, pid: ParticleID) -> bool {
        three_charge(pid.id()) != 0
    }

    fn tau_decay_mode(&self, event: &McEvent, tau: usize) -> TauDecayMode {
        use TauDecayMode::*;

        let mut ncharged_pions = 0;
        let mut ncharged_kaons = 0;
        let mut nneutral_pions = 0;
        let mut nelectrons = 0;
        let mut nmuons = 0;
        let mut nother_charged = 0;
        // neutral pions are counted before they decay
        let mut stack = event[tau].daughters().to_vec();
        let mut visited = vec![false; event.len()];
        while let Some(d) = stack.pop() {
            if std::mem::replace(&mut visited[d], true) {
                continue;
            }
            let p = &event[d];
            let aid = p.pdg_id().abs();
            if aid == PI_ZERO {
                nneutral_pions += 1;
                continue;
            }
            if !self.is_final_state(p) {
                stack.extend_from_slice(p.daughters());
                continue;
            }
            match aid {
                ELECTRON => nelectrons += 1,
                MUON => nmuons += 1,
                PI_PLUS => ncharged_pions += 1,
                K_PLUS => ncharged_kaons += 1,
                _ if self.is_charged(p.pid) => nother_charged += 1,
                _ => {}
            }
        }
        let nprongs = ncharged_pions + ncharged_kaons + nother_charged;
        trace!(
            "tau {tau}: {nelectrons} e, {nmuons} μ, {ncharged_pions} π±, {ncharged_kaons} K±, {nneutral_pions} π0, {nother_charged} other charged"
        );
        match (nelectrons, nmuons, nprongs) {
            (1, 0, 0) => Electron,
            (0, 1, 0) => Muon,
            (0, 0, 1) => match (ncharged_pions, ncharged_kaons, nneutral_pions) {
                (1, 0, 0) => Pion,
                (0, 1, 0) => Kaon,
                (1, 0, 1) => PionPi0,
                (1, 0, _) => PionTwoPi0,
                _ => OtherOneProng,
            },
            (0, 0, 3) => {
                if ncharged_pions == 3 && nneutral_pions == 0 {
                    ThreePion
                } else {
                    ThreePionPi0
                }
            }
            _ => Error,
        }
    }
}

/// Origin tests walking up the mother chain
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HadronDecayOrigin {}

impl HadronDecayOrigin {
    pub fn new() -> Self {
        Self::default()
    }
}

fn is_initial_state(p: &McParticle) -> bool {
    matches!(p.status, STATUS_BEAM | STATUS_INCOMING)
}

fn is_hadron(id: i32) -> bool {
    HADRONS.contains(&ParticleID::new(id.abs()))
}

impl DecayOrigin for HadronDecayOrigin {
    fn coming_from_hadron_decay(
        &self,
        event: &McEvent,
        idx: usize,
        _sample: &McSample,
    ) -> bool {
        let mut visited = vec![false; event.len()];
        let mut cur = idx;
        while let Some(mother) = event[cur].mother1() {
            if std::mem::replace(&mut visited[mother], true)
                || is_initial_state(&event[mother])
            {
                break;
            }
            let id = event[mother].pdg_id();
            if is_hadron(id) || HADRONIZATION_IDS.contains(&id.abs()) {
                return true;
            }
            cur = mother;
        }
        false
    }

    fn irrelevant_photon(
        &self,
        event: &McEvent,
        idx: usize,
        sample: &McSample,
    ) -> bool {
        // photons radiated off a photon copy are traced through the copies
        let mut cur = idx;
        while let Some(mother) = event[cur].mother1() {
            if event[mother].pdg_id() != PHOTON || mother == cur {
                break;
            }
            cur = mother;
        }
        self.coming_from_hadron_decay(event, cur, sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::McEventBuilder;
    use crate::four_vector::FourVector;

    fn p() -> FourVector {
        FourVector::from_pxpypze(1., 1., 1., 2.)
    }

    #[test]
    fn charges() {
        assert_eq!(three_charge(11), -3);
        assert_eq!(three_charge(-11), 3);
        assert_eq!(three_charge(12), 0);
        assert_eq!(three_charge(2), 2);
        assert_eq!(three_charge(-1), 1);
        assert_eq!(three_charge(211), 3);
        assert_eq!(three_charge(-211), -3);
        assert_eq!(three_charge(111), 0);
        assert_eq!(three_charge(321), 3);
        assert_eq!(three_charge(311), 0);
        assert_eq!(three_charge(2212), 3);
        assert_eq!(three_charge(2112), 0);
        assert_eq!(three_charge(3222), 3);
        assert_eq!(three_charge(22), 0);
        assert_eq!(three_charge(-24), -3);
        assert_eq!(three_charge(421), 0);
        assert_eq!(three_charge(411), 3);
        assert_eq!(three_charge(521), 3);
        assert_eq!(three_charge(511), 0);
    }

    #[test]
    fn tau_modes() {
        let classifier = PdgClassifier::new();
        let mut b = McEventBuilder::new();
        b.add_particle(ParticleID::new(15), 2, [0, 0], p())
            .add_particle(ParticleID::new(16), 1, [1, 0], p())
            .add_particle(ParticleID::new(-211), 1, [1, 0], p())
            .add_particle(ParticleID::new(111), 2, [1, 0], p())
            .add_particle(ParticleID::new(22), 1, [4, 0], p())
            .add_particle(ParticleID::new(22), 1, [4, 0], p());
        let ev = b.build().unwrap();
        assert_eq!(classifier.tau_decay_mode(&ev, 0), TauDecayMode::PionPi0);
        assert_eq!(TauDecayMode::PionPi0.ntracks(), 1);

        let mut b = McEventBuilder::new();
        b.add_particle(ParticleID::new(15), 2, [0, 0], p())
            .add_particle(ParticleID::new(16), 1, [1, 0], p())
            .add_particle(ParticleID::new(-211), 1, [1, 0], p())
            .add_particle(ParticleID::new(-211), 1, [1, 0], p())
            .add_particle(ParticleID::new(211), 1, [1, 0], p());
        let ev = b.build().unwrap();
        let mode = classifier.tau_decay_mode(&ev, 0);
        assert_eq!(mode, TauDecayMode::ThreePion);
        assert_eq!(mode.code(), 7);
        assert_eq!(mode.ntracks(), 3);
        assert_eq!(TauDecayMode::Error.ntracks(), 0);
    }

    #[test]
    fn descendants() {
        let classifier = PdgClassifier::new();
        let mut b = McEventBuilder::new();
        b.add_particle(ParticleID::new(15), 2, [0, 0], p())
            .add_particle(ParticleID::new(16), 1, [1, 0], p())
            .add_particle(ParticleID::new(213), 2, [1, 0], p())
            .add_particle(ParticleID::new(211), 1, [3, 0], p())
            .add_particle(ParticleID::new(111), 2, [3, 0], p())
            .add_particle(ParticleID::new(22), 1, [5, 0], p())
            .add_particle(ParticleID::new(22), 1, [5, 0], p());
        let ev = b.build().unwrap();
        let mut desc = final_state_descendants(&classifier, &ev, 0);
        desc.sort();
        assert_eq!(desc, [1, 3, 5, 6]);
    }

    #[test]
    fn hadron_origin() {
        let origin = HadronDecayOrigin::new();
        let sample = McSample::default();
        let mut b = McEventBuilder::new();
        b.add_particle(ParticleID::new(23), 2, [0, 0], p())
            .add_particle(ParticleID::new(13), 1, [1, 0], p())
            .add_particle(ParticleID::new(511), 2, [0, 0], p())
            .add_particle(ParticleID::new(13), 1, [3, 0], p())
            .add_particle(ParticleID::new(111), 2, [0, 0], p())
            .add_particle(ParticleID::new(22), 1, [5, 0], p())
            .add_particle(ParticleID::new(22), 1, [2, 0], p());
        // 7: beam proton, 8: parton
        b.add_particle(ParticleID::new(2212), STATUS_BEAM, [0, 0], p())
            .add_particle(ParticleID::new(13), 1, [8, 0], p());
        let ev = b.build().unwrap();
        assert!(!origin.coming_from_hadron_decay(&ev, 1, &sample));
        assert!(origin.coming_from_hadron_decay(&ev, 3, &sample));
        assert!(!origin.coming_from_hadron_decay(&ev, 8, &sample));
        assert!(origin.irrelevant_photon(&ev, 5, &sample));
        assert!(!origin.irrelevant_photon(&ev, 6, &sample));
    }
}
