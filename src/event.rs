use crate::four_vector::FourVector;
use crate::reco::RecEvent;

use noisy_float::prelude::*;
use particle_id::ParticleID;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of generator-level record entries reserved for the beams
/// and the incoming partons of the hard process
pub const N_INITIAL_ENTRIES: usize = 6;

/// A generator-level particle
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct McParticle {
    /// Four-momentum
    pub momentum: FourVector,
    /// Particle identity
    pub pid: ParticleID,
    /// Generator status code
    pub status: i32,
    /// Mother references as found in the record (1-based, 0 means none)
    pub mothup: [usize; 2],
    mothers: [Option<usize>; 2],
    daughters: Vec<usize>,
}

impl McParticle {
    /// A new particle without mother references
    pub fn new(pid: ParticleID, status: i32, momentum: FourVector) -> Self {
        Self {
            momentum,
            pid,
            status,
            mothup: [0, 0],
            mothers: [None, None],
            daughters: Vec::new(),
        }
    }

    /// PDG id as a plain integer
    pub fn pdg_id(&self) -> i32 {
        self.pid.id()
    }

    /// Transverse momentum
    pub fn pt(&self) -> N64 {
        self.momentum.pt()
    }

    /// Index of the first mother in the event record
    pub fn mother1(&self) -> Option<usize> {
        self.mothers[0]
    }

    /// Index of the second mother in the event record
    pub fn mother2(&self) -> Option<usize> {
        self.mothers[1]
    }

    /// Indices of the daughters in the event record
    pub fn daughters(&self) -> &[usize] {
        &self.daughters
    }
}

/// Error building a generator-level event record
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EventError {
    /// A mother reference points outside the record
    #[error("Mother index {mother} of particle {particle} exceeds number of particles {nparticles}")]
    MotherOutOfRange {
        particle: usize,
        mother: usize,
        nparticles: usize,
    },
}

/// Builder for generator-level event records
///
/// Mother references are resolved and checked in [build](McEventBuilder::build).
#[derive(Clone, Debug, Default)]
pub struct McEventBuilder {
    particles: Vec<McParticle>,
}

impl McEventBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            particles: Vec::with_capacity(cap),
        }
    }

    /// Add a particle with 1-based mother references (0 means no mother)
    pub fn add_particle(
        &mut self,
        pid: ParticleID,
        status: i32,
        mothup: [usize; 2],
        momentum: FourVector,
    ) -> &mut Self {
        let mut particle = McParticle::new(pid, status, momentum);
        particle.mothup = mothup;
        self.particles.push(particle);
        self
    }

    pub fn build(self) -> Result<McEvent, EventError> {
        let mut particles = self.particles;
        let nparticles = particles.len();
        for idx in 0..nparticles {
            let mothup = particles[idx].mothup;
            for (n, &mother) in mothup.iter().enumerate() {
                if mother == 0 {
                    continue;
                }
                if mother > nparticles {
                    return Err(EventError::MotherOutOfRange {
                        particle: idx + 1,
                        mother,
                        nparticles,
                    });
                }
                particles[idx].mothers[n] = Some(mother - 1);
                // a single mother may be recorded twice
                if n == 0 || mothup[0] != mother {
                    particles[mother - 1].daughters.push(idx);
                }
            }
        }
        Ok(McEvent {
            particles,
            ..Default::default()
        })
    }
}

/// Generator-level event record
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct McEvent {
    particles: Vec<McParticle>,
    /// Missing transverse energy
    pub met: FourVector,
    /// Missing transverse hadronic energy
    pub mht: FourVector,
    /// Total transverse energy
    pub tet: N64,
    /// Total hadronic transverse energy
    pub tht: N64,
}

impl McEvent {
    pub fn particles(&self) -> &[McParticle] {
        &self.particles
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// The first mother of the particle with the given index
    pub fn mother1(&self, idx: usize) -> Option<&McParticle> {
        self.particles[idx].mother1().map(|m| &self.particles[m])
    }
}

impl std::ops::Index<usize> for McEvent {
    type Output = McParticle;

    fn index(&self, idx: usize) -> &Self::Output {
        &self.particles[idx]
    }
}

/// Beam information shared by all events of a sample
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct McSample {
    /// PDG ids of the two beams
    pub beam_id: [i32; 2],
    /// Energies of the two beams in GeV
    pub beam_energy: [f64; 2],
}

/// An event sample
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct Sample {
    /// Generator-level sample information
    pub mc: Option<McSample>,
}

impl Sample {
    pub fn with_mc(mc: McSample) -> Self {
        Self { mc: Some(mc) }
    }
}

/// A single event with generator-level and reconstructed records
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Event {
    pub weight: N64,
    pub mc: Option<McEvent>,
    pub rec: Option<RecEvent>,
}

impl Default for Event {
    fn default() -> Self {
        Self {
            weight: n64(1.),
            mc: None,
            rec: None,
        }
    }
}

impl Event {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_mc(mc: McEvent) -> Self {
        Self {
            mc: Some(mc),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(px: f64) -> FourVector {
        FourVector::from_pxpypze(px, 0., 0., px.abs())
    }

    #[test]
    fn resolve_mothers() {
        let mut builder = McEventBuilder::new();
        builder
            .add_particle(ParticleID::new(21), -1, [0, 0], p(0.))
            .add_particle(ParticleID::new(21), -1, [0, 0], p(0.))
            .add_particle(ParticleID::new(6), 2, [1, 2], p(10.))
            .add_particle(ParticleID::new(5), 1, [3, 3], p(5.));
        let ev = builder.build().unwrap();
        assert_eq!(ev[2].mother1(), Some(0));
        assert_eq!(ev[2].mother2(), Some(1));
        assert_eq!(ev[0].daughters(), &[2]);
        assert_eq!(ev[1].daughters(), &[2]);
        assert_eq!(ev[2].daughters(), &[3]);
        assert_eq!(ev.mother1(3).unwrap().pdg_id(), 6);
        assert!(ev.mother1(0).is_none());
    }

    #[test]
    fn mother_out_of_range() {
        let mut builder = McEventBuilder::new();
        builder
            .add_particle(ParticleID::new(21), -1, [0, 0], p(0.))
            .add_particle(ParticleID::new(1), 1, [3, 0], p(1.));
        assert_eq!(
            builder.build(),
            Err(EventError::MotherOutOfRange {
                particle: 2,
                mother: 3,
                nparticles: 2
            })
        );
    }
}
