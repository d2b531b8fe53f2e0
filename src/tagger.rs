use crate::event::{Event, McEvent, Sample};
use crate::reco::RecJet;
use crate::traits::{Identify, Tag};

use jetty::PseudoJet;
use log::debug;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;
use serde::{Deserialize, Serialize};

/// Default ΔR for matching jets to generator-level objects
pub const DEFAULT_MATCHING_RADIUS: f64 = 0.5;

/// Bernoulli acceptance with a fixed efficiency
#[derive(Clone, Debug)]
pub struct Efficiency<R = Xoshiro256Plus> {
    efficiency: f64,
    rng: R,
}

impl Efficiency<Xoshiro256Plus> {
    /// Efficiency gate with a seeded [Xoshiro256Plus] generator
    pub fn with_seed(efficiency: f64, seed: u64) -> Self {
        Self::new(efficiency, Xoshiro256Plus::seed_from_u64(seed))
    }
}

impl<R> Efficiency<R> {
    pub fn new(efficiency: f64, rng: R) -> Self {
        Self { efficiency, rng }
    }
}

impl<R: Rng> Identify for Efficiency<R> {
    fn is_identified(&mut self) -> bool {
        if self.efficiency >= 1. {
            true
        } else if self.efficiency <= 0. {
            false
        } else {
            self.rng.gen::<f64>() < self.efficiency
        }
    }
}

/// Efficiencies for b tagging
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq)]
#[serde(default)]
pub struct BTagSettings {
    /// Matching radius between jets and b quarks
    pub matching_radius: f64,
    /// Efficiency for jets matched to a b quark
    pub efficiency: f64,
    /// Mistag rate for jets matched to a c quark
    pub c_mistag: f64,
    /// Mistag rate for light jets
    pub light_mistag: f64,
}

impl Default for BTagSettings {
    fn default() -> Self {
        Self {
            matching_radius: DEFAULT_MATCHING_RADIUS,
            efficiency: 1.,
            c_mistag: 0.,
            light_mistag: 0.,
        }
    }
}

/// Whether any of the generator-level particles lies within `radius` of the jet
fn matches_any(jet: &RecJet, mc: &McEvent, candidates: &[usize], radius: f64) -> bool {
    let jet = PseudoJet::from(jet.momentum);
    candidates.iter().any(|&idx| {
        let p: PseudoJet = mc[idx].momentum.into();
        jet.delta_r(&p) < radius
    })
}

/// b tagging by matching jets to generator-level b and c quarks
#[derive(Clone, Debug)]
pub struct BTagger {
    settings: BTagSettings,
    b_eff: Efficiency,
    c_mistag: Efficiency,
    light_mistag: Efficiency,
}

impl BTagger {
    pub fn new(settings: BTagSettings, seed: u64) -> Self {
        Self {
            settings,
            b_eff: Efficiency::with_seed(settings.efficiency, seed),
            c_mistag: Efficiency::with_seed(settings.c_mistag, seed.wrapping_add(1)),
            light_mistag: Efficiency::with_seed(settings.light_mistag, seed.wrapping_add(2)),
        }
    }
}

impl Tag for BTagger {
    fn execute(&mut self, _sample: &Sample, event: &mut Event) {
        let (Some(mc), Some(rec)) = (event.mc.as_ref(), event.rec.as_mut()) else {
            return;
        };
        let radius = self.settings.matching_radius;
        for jet in rec.jets.iter_mut() {
            jet.true_btag = matches_any(jet, mc, &rec.mc_bquarks, radius);
            jet.true_ctag = !jet.true_btag && matches_any(jet, mc, &rec.mc_cquarks, radius);
            jet.btag = if jet.true_btag {
                self.b_eff.is_identified()
            } else if jet.true_ctag {
                self.c_mistag.is_identified()
            } else {
                self.light_mistag.is_identified()
            };
        }
        debug!(
            "{} of {} jets b-tagged",
            rec.jets.iter().filter(|j| j.btag).count(),
            rec.jets.len()
        );
    }
}

/// Efficiencies for hadronic tau identification
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq)]
#[serde(default)]
pub struct TauTagSettings {
    /// Matching radius between jets and hadronic taus
    pub matching_radius: f64,
    /// Identification efficiency for hadronic taus
    pub efficiency: f64,
}

impl Default for TauTagSettings {
    fn default() -> Self {
        Self {
            matching_radius: DEFAULT_MATCHING_RADIUS,
            efficiency: 1.,
        }
    }
}

/// Hadronic tau identification
///
/// Serves as the identification gate for generator-level hadronic taus
/// and flags jets originating from hadronic taus that were not identified.
#[derive(Clone, Debug)]
pub struct TauTagger {
    settings: TauTagSettings,
    eff: Efficiency,
}

impl TauTagger {
    pub fn new(settings: TauTagSettings, seed: u64) -> Self {
        Self {
            settings,
            eff: Efficiency::with_seed(settings.efficiency, seed),
        }
    }
}

impl Identify for TauTagger {
    fn is_identified(&mut self) -> bool {
        self.eff.is_identified()
    }
}

impl Tag for TauTagger {
    fn execute(&mut self, _sample: &Sample, event: &mut Event) {
        let (Some(mc), Some(rec)) = (event.mc.as_ref(), event.rec.as_mut()) else {
            return;
        };
        let unidentified: Vec<usize> = rec
            .mc_hadronic_taus
            .iter()
            .copied()
            .filter(|idx| !rec.taus.iter().any(|t| t.mc == Some(*idx)))
            .collect();
        let radius = self.settings.matching_radius;
        for jet in rec.jets.iter_mut() {
            jet.true_tau = matches_any(jet, mc, &unidentified, radius);
        }
    }
}
