//! `jetreco` reconstructs jets and other physics objects from
//! generator-level collider events.
//!
//! # How to use
//!
//! Events are read from Les Houches Event Files with [lhef::LhefReader].
//! A [cluster::JetClusterer] turns the generator-level record of each
//! event into reconstructed leptons, photons, taus, and jets, together
//! with the missing and total transverse energies.
//!
//! ## Most relevant modules
//!
//! - [cluster] for the reconstruction and its settings
//! - [selection] for the identification of leptons, photons, and taus
//! - [sequence] for sequential recombination jet algorithms
//! - [tagger] for b and tau tagging
//! - [merging] for differential jet rate plots
//! - [finalize] for generator-level global observables
//! - [traits] for the interfaces that can be substituted
//!

/// Jet reconstruction
pub mod cluster;
/// Generator-level and reconstructed event records
pub mod event;
/// Missing and total transverse energies
pub mod finalize;
/// Four-vector class
pub mod four_vector;
/// Histograms
pub mod histo;
/// Les Houches Event File interface
pub mod lhef;
/// Differential jet rate plots
pub mod merging;
/// Particle properties and default classification
pub mod physics;
/// Progress bar
pub mod progress_bar;
/// Reconstructed objects
pub mod reco;
/// Selection of clustering inputs
pub mod selection;
/// Sequential recombination
pub mod sequence;
/// b and tau tagging
pub mod tagger;
/// Common traits
pub mod traits;
/// Writer for reconstructed events
pub mod writer;

use lazy_static::lazy_static;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
lazy_static! {
    pub static ref VERSION_MAJOR: u32 =
        env!("CARGO_PKG_VERSION_MAJOR").parse().unwrap();
    pub static ref VERSION_MINOR: u32 =
        env!("CARGO_PKG_VERSION_MINOR").parse().unwrap();
    pub static ref VERSION_PATCH: u32 =
        env!("CARGO_PKG_VERSION_PATCH").parse().unwrap();
}
pub const GIT_REV: Option<&str> = option_env!("VERGEN_GIT_SHA");
pub const GIT_BRANCH: Option<&str> = option_env!("VERGEN_GIT_BRANCH");
