use crate::event::{Event, McEvent, McParticle, McSample, Sample};
use crate::physics::TauDecayMode;

use particle_id::ParticleID;

/// Classification of generator-level particles
pub trait Classify {
    /// Particles escaping detection, e.g. neutrinos
    fn is_invisible(&self, p: &McParticle) -> bool;

    /// Stable particles
    fn is_final_state(&self, p: &McParticle) -> bool;

    /// Particles that decay further
    fn is_inter_state(&self, p: &McParticle) -> bool;

    /// Visible particles that are not leptons or photons
    fn is_hadronic(&self, p: &McParticle) -> bool;

    /// Electrically charged particle species
    fn is_charged(&self, pid: ParticleID) -> bool;

    /// Decay mode of the tau with index `tau` in `event`
    fn tau_decay_mode(&self, event: &McEvent, tau: usize) -> TauDecayMode;
}

/// Origin tests for generator-level particles
pub trait DecayOrigin {
    /// Whether the particle with index `idx` stems from the decay of a hadron
    fn coming_from_hadron_decay(
        &self,
        event: &McEvent,
        idx: usize,
        sample: &McSample,
    ) -> bool;

    /// Whether the photon with index `idx` should not be reconstructed
    fn irrelevant_photon(
        &self,
        event: &McEvent,
        idx: usize,
        sample: &McSample,
    ) -> bool;
}

/// Identification efficiency gate
pub trait Identify {
    /// Decide whether the next candidate is identified
    fn is_identified(&mut self) -> bool;
}

/// A tagging step operating on a reconstructed event
pub trait Tag {
    fn execute(&mut self, sample: &Sample, event: &mut Event);
}

/// Progress indicator
pub trait Progress {
    fn inc(&self, i: u64);

    fn finish(&self);
}
