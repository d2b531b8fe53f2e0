use log::debug;
use noisy_float::prelude::*;

use crate::event::{Event, McEvent};
use crate::four_vector::FourVector;
use crate::physics::PdgClassifier;
use crate::reco::RecEvent;
use crate::traits::Classify;

/// Computation of the missing and total transverse energies
#[derive(Clone, Debug, Default)]
pub struct EventFinalizer<C = PdgClassifier> {
    classifier: C,
}

impl EventFinalizer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<C: Classify> EventFinalizer<C> {
    pub fn with_classifier(classifier: C) -> Self {
        Self { classifier }
    }

    /// Fill the global observables of both the reconstructed and the
    /// generator-level records
    pub fn finalize(&self, event: &mut Event) {
        if let Some(rec) = event.rec.as_mut() {
            self.finalize_rec(rec);
        }
        if let Some(mc) = event.mc.as_mut() {
            self.finalize_mc(mc);
        }
    }

    /// Add the reconstructed objects to the global observables
    ///
    /// An externally measured HT is left untouched, but jets are
    /// always part of the total transverse energy.
    pub fn finalize_rec(&self, rec: &mut RecEvent) {
        for jet in &rec.jets {
            rec.mht -= jet.momentum;
            if !rec.external_tht {
                rec.tht += jet.momentum.pt();
            }
            rec.tet += jet.momentum.pt();
        }
        let leptons = rec.muons.iter().chain(&rec.electrons).map(|l| l.momentum.pt());
        let taus = rec.taus.iter().map(|t| t.momentum.pt());
        let photons = rec.photons.iter().map(|p| p.momentum.pt());
        rec.tet += leptons.chain(taus).chain(photons).sum::<N64>();
        rec.met.make_transverse();
        rec.mht.make_transverse();
    }

    /// Compute the generator-level global observables from the
    /// visible final-state particles
    pub fn finalize_mc(&self, mc: &mut McEvent) {
        let mut met = FourVector::new();
        let mut mht = FourVector::new();
        let mut tet = n64(0.);
        let mut tht = n64(0.);
        for part in mc.particles() {
            if !self.classifier.is_final_state(part) || self.classifier.is_invisible(part) {
                continue;
            }
            met -= part.momentum;
            tet += part.pt();
            if self.classifier.is_hadronic(part) {
                mht -= part.momentum;
                tht += part.pt();
            }
        }
        met.make_transverse();
        mht.make_transverse();
        debug!("generator level: MET = {:.3}, THT = {:.3}", met.pt(), tht);
        mc.met = met;
        mc.mht = mht;
        mc.tet = tet;
        mc.tht = tht;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::McEventBuilder;
    use particle_id::ParticleID;

    fn p(px: f64, py: f64, pz: f64) -> FourVector {
        FourVector::from_pxpypze(px, py, pz, (px * px + py * py + pz * pz).sqrt())
    }

    #[test]
    fn generator_level() {
        let mut b = McEventBuilder::new();
        b.add_particle(ParticleID::new(211), 1, [0, 0], p(10., 0., 5.))
            .add_particle(ParticleID::new(11), 1, [0, 0], p(0., 20., 0.))
            .add_particle(ParticleID::new(12), 1, [0, 0], p(-10., -20., 0.))
            .add_particle(ParticleID::new(23), 2, [0, 0], p(5., 5., 5.));
        let mc = b.build().unwrap();
        let mut event = Event::from_mc(mc);
        EventFinalizer::new().finalize(&mut event);
        let mc = event.mc.unwrap();
        assert_eq!(mc.met.px(), -10.);
        assert_eq!(mc.met.py(), -20.);
        assert_eq!(mc.met.pz(), 0.);
        assert_eq!(mc.met.e(), mc.met.pt());
        assert_eq!(mc.tet, 30.);
        assert_eq!(mc.mht.px(), -10.);
        assert_eq!(mc.mht.py(), 0.);
        assert_eq!(mc.tht, 10.);
    }

    #[test]
    fn external_tht() {
        let mut rec = RecEvent::new();
        rec.new_jet().momentum = p(30., 0., 0.);
        rec.new_jet().momentum = p(0., -20., 0.);
        rec.new_muon().momentum = p(0., 5., 0.);
        rec.new_photon().momentum = p(0., 0., 7.);
        let finalizer = EventFinalizer::new();

        let mut measured = rec.clone();
        measured.set_external_tht(n64(100.));
        finalizer.finalize_rec(&mut measured);
        assert_eq!(measured.tht, 100.);
        assert_eq!(measured.tet, 55.);

        finalizer.finalize_rec(&mut rec);
        assert_eq!(rec.tht, 50.);
        assert_eq!(rec.tet, 55.);
        assert_eq!(rec.mht.px(), -30.);
        assert_eq!(rec.mht.py(), 20.);
        assert_eq!(rec.mht.e(), rec.mht.pt());
    }

    #[test]
    fn extra_invisible() {
        let mut b = McEventBuilder::new();
        b.add_particle(ParticleID::new(1000022), 1, [0, 0], p(15., 0., 0.))
            .add_particle(ParticleID::new(13), 1, [0, 0], p(0., 10., 0.));
        let mut mc = b.build().unwrap();

        EventFinalizer::new().finalize_mc(&mut mc);
        assert_eq!(mc.tet, 25.);

        let classifier = PdgClassifier::new().with_invisible([-1000022]);
        EventFinalizer::with_classifier(classifier).finalize_mc(&mut mc);
        assert_eq!(mc.tet, 10.);
        assert_eq!(mc.met.px(), 0.);
        assert_eq!(mc.met.py(), -10.);
        assert_eq!(mc.tht, 0.);
    }
}
