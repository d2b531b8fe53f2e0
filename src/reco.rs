use crate::four_vector::FourVector;
use crate::physics::TauDecayMode;

use noisy_float::prelude::*;
use particle_id::ParticleID;
use serde::{Deserialize, Serialize};

/// Radii of the standard isolation cones, in the order they are stored
pub const ISOLATION_RADII: [f64; 4] = [0.5, 0.4, 0.3, 0.2];

/// Activity summed up in a cone around a reconstructed object
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct IsolationCone {
    /// Cone radius ΔR
    pub delta_r: N64,
    /// Scalar sum of the transverse momenta of the tracks in the cone
    pub sum_pt: N64,
    /// Scalar sum of the transverse energies in the cone
    pub sum_et: N64,
    /// Number of tracks in the cone
    pub ntracks: u32,
}

/// A reconstructed jet
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct RecJet {
    pub momentum: FourVector,
    /// Number of charged constituents
    pub ntracks: u32,
    pub btag: bool,
    /// Matched to a generator-level b quark
    pub true_btag: bool,
    /// Matched to a generator-level c quark
    pub true_ctag: bool,
    /// Matched to a generator-level hadronic tau
    pub true_tau: bool,
    /// Ratio of hadronic to electromagnetic energy
    pub had_over_em: N64,
    /// Indices of the generator-level constituents
    pub constituents: Vec<usize>,
    pub isolation_cones: Vec<IsolationCone>,
}

/// A reconstructed electron or muon
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct RecLepton {
    pub momentum: FourVector,
    /// `true` for positive charge
    pub charge: bool,
    pub had_over_em: N64,
    /// Index of the generator-level particle
    pub mc: Option<usize>,
    pub isolation_cones: Vec<IsolationCone>,
}

/// A reconstructed photon
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct RecPhoton {
    pub momentum: FourVector,
    pub had_over_em: N64,
    pub mc: Option<usize>,
    pub isolation_cones: Vec<IsolationCone>,
}

/// A reconstructed hadronic tau
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct RecTau {
    pub momentum: FourVector,
    pub charge: bool,
    pub decay_mode: TauDecayMode,
    pub ntracks: u32,
    pub had_over_em: N64,
    pub mc: Option<usize>,
}

/// A reconstructed track
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct RecTrack {
    pub momentum: FourVector,
    pub pid: ParticleID,
    pub charge: bool,
    pub mc: Option<usize>,
    pub isolation_cones: Vec<IsolationCone>,
}

macro_rules! impl_charge {
    ( $( $t:ty ),* ) => {
        $(
            impl $t {
                /// Electric charge in units of the elementary charge
                pub fn charge(&self) -> i32 {
                    if self.charge { 1 } else { -1 }
                }
            }
        )*
    };
}

impl_charge!(RecLepton, RecTau, RecTrack);

/// Reconstructed event record
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct RecEvent {
    pub jets: Vec<RecJet>,
    pub electrons: Vec<RecLepton>,
    pub muons: Vec<RecLepton>,
    pub photons: Vec<RecPhoton>,
    pub taus: Vec<RecTau>,
    pub tracks: Vec<RecTrack>,
    /// Missing transverse energy
    pub met: FourVector,
    /// Missing transverse hadronic energy
    pub mht: FourVector,
    /// Total transverse energy
    pub tet: N64,
    /// Total hadronic transverse energy
    pub tht: N64,
    /// Whether `tht` was measured externally
    pub external_tht: bool,
    /// Generator-level b quarks (last copies)
    pub mc_bquarks: Vec<usize>,
    /// Generator-level c quarks (last copies)
    pub mc_cquarks: Vec<usize>,
    pub mc_hadronic_taus: Vec<usize>,
    pub mc_muonic_taus: Vec<usize>,
    pub mc_electronic_taus: Vec<usize>,
}

impl RecEvent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn new_jet(&mut self) -> &mut RecJet {
        push_default(&mut self.jets)
    }

    pub fn new_electron(&mut self) -> &mut RecLepton {
        push_default(&mut self.electrons)
    }

    pub fn new_muon(&mut self) -> &mut RecLepton {
        push_default(&mut self.muons)
    }

    pub fn new_photon(&mut self) -> &mut RecPhoton {
        push_default(&mut self.photons)
    }

    pub fn new_tau(&mut self) -> &mut RecTau {
        push_default(&mut self.taus)
    }

    /// Set an externally measured scalar HT
    pub fn set_external_tht(&mut self, tht: N64) {
        self.tht = tht;
        self.external_tht = true;
    }
}

/// Register `idx` in `list` unless it is already present
///
/// Returns whether the index was newly registered.
pub(crate) fn register_once(list: &mut Vec<usize>, idx: usize) -> bool {
    if list.contains(&idx) {
        false
    } else {
        list.push(idx);
        true
    }
}

fn push_default<T: Default>(objects: &mut Vec<T>) -> &mut T {
    let idx = objects.len();
    objects.push(T::default());
    &mut objects[idx]
}
