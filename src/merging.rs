use std::{
    collections::BTreeMap,
    io::{self, Write},
    num::ParseIntError,
};

use log::{debug, trace, warn};
use thiserror::Error;

use crate::{
    event::{Event, McEvent, Sample, N_INITIAL_ENTRIES},
    histo::Histogram,
    physics::{
        GLUON, HADRONIZATION_IDS, STATUS_INTERMEDIATE, STATUS_MATRIX_ELEMENT,
    },
    sequence::{ClusterInput, ClusterSequence, JetAlgorithm, JetDefinition},
};

/// Default largest quark flavour counted as a matrix-element jet
pub const DEFAULT_NQMATCH: i32 = 4;

const DJR_NBINS: usize = 100;
const DJR_MIN: f64 = 0.;
const DJR_MAX: f64 = 4.;
const MAX_ABS_ETA: f64 = 5.;
const SAME_MOMENTUM_TOLERANCE: f64 = 1e-4;

/// Error initialising the merging plots
#[derive(Debug, Error)]
pub enum MergingError {
    #[error("Number of jets for differential jet rate plots not set")]
    MissingNJets,
    #[error("Number of jets requested for differential jet rate plots is zero")]
    ZeroNJets,
    #[error("Invalid number of jets for differential jet rate plots: `{0}`")]
    InvalidNJets(String, #[source] ParseIntError),
}

/// Histograms for one differential jet rate
#[derive(Clone, Debug, PartialEq)]
pub struct DjrPlots {
    /// All events
    pub total: Histogram,
    /// Events split by matrix-element jet multiplicity
    pub contributions: Vec<Histogram>,
}

impl DjrPlots {
    fn new(idx: usize, ncontributions: usize) -> Self {
        let name = format!("DJR{}", idx + 1);
        let contributions = (0..ncontributions)
            .map(|j| Histogram::new(format!("{name}_{j}jet"), DJR_NBINS, DJR_MIN, DJR_MAX))
            .collect();
        Self {
            total: Histogram::new(format!("{name}_total"), DJR_NBINS, DJR_MIN, DJR_MAX),
            contributions,
        }
    }
}

/// The plotted value for a merging scale `d`
pub fn djr_observable(d: f64) -> f64 {
    if d > 0. {
        d.sqrt().log10()
    } else {
        0.
    }
}

/// Differential jet rate plots for validating matrix element and
/// parton shower merging
///
/// Partons after the shower are reclustered with the kt algorithm at
/// R = 1. The scales at which the event goes from i + 1 to i jets
/// are histogrammed, split by the number of jets in the matrix element.
#[derive(Clone, Debug)]
pub struct MergingPlots {
    nqmatch: i32,
    hadronised: bool,
    jet_def: JetDefinition,
    djr: Vec<DjrPlots>,
}

impl Default for MergingPlots {
    fn default() -> Self {
        Self {
            nqmatch: DEFAULT_NQMATCH,
            hadronised: true,
            jet_def: JetDefinition::new(JetAlgorithm::Kt, 1.),
            djr: Vec::new(),
        }
    }
}

impl MergingPlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Largest quark flavour counted as a matrix-element jet
    pub fn with_nqmatch(mut self, nqmatch: i32) -> Self {
        self.nqmatch = nqmatch;
        self
    }

    /// Whether the events were hadronised
    ///
    /// For events without hadronisation all partons not from the
    /// matrix element are reclustered.
    pub fn hadronised(mut self, hadronised: bool) -> Self {
        self.hadronised = hadronised;
        self
    }

    /// Allocate the histograms
    ///
    /// The only recognised parameter is `njets`, the number of
    /// differential jet rates to plot.
    pub fn initialize(&mut self, parameters: &BTreeMap<String, String>) -> Result<(), MergingError> {
        self.djr.clear();
        let mut njets = None;
        for (key, val) in parameters {
            if key == "njets" {
                let n: usize = val
                    .trim()
                    .parse()
                    .map_err(|err| MergingError::InvalidNJets(val.clone(), err))?;
                njets = Some(n);
            } else {
                warn!("Parameter '{key}' is unknown and will be ignored");
            }
        }
        let njets = match njets {
            None => return Err(MergingError::MissingNJets),
            Some(0) => return Err(MergingError::ZeroNJets),
            Some(n) => n,
        };
        self.djr = (0..njets).map(|i| DjrPlots::new(i, njets + 1)).collect();
        debug!("Initialised {njets} differential jet rate plots");
        Ok(())
    }

    pub fn djr(&self) -> &[DjrPlots] {
        &self.djr
    }

    /// Add the differential jet rates of the event to the histograms
    pub fn execute(&mut self, sample: &Sample, event: &Event) {
        let (Some(_), Some(mc)) = (sample.mc.as_ref(), event.mc.as_ref()) else {
            return;
        };
        let njets = self.jet_number(mc);
        if njets > self.djr.len() {
            trace!("Skipping event with {njets} matrix element jets");
            return;
        }
        let inputs = self.select_particles(mc);
        let seq = ClusterSequence::new(inputs, &self.jet_def);
        for (i, plots) in self.djr.iter_mut().enumerate() {
            let djr = djr_observable(seq.exclusive_dmerge(i));
            plots.total.fill(djr, 1.);
            plots.contributions[njets].fill(djr, 1.);
        }
    }

    /// Write the histograms and release them
    pub fn finalize(&mut self, mut out: impl Write) -> io::Result<()> {
        writeln!(out, "<MergingPlots>")?;
        for plots in &self.djr {
            plots.total.write_text(&mut out)?;
            for contribution in &plots.contributions {
                contribution.write_text(&mut out)?;
            }
        }
        writeln!(out, "</MergingPlots>")?;
        self.djr.clear();
        Ok(())
    }

    /// Number of jets in the matrix element
    pub(crate) fn jet_number(&self, mc: &McEvent) -> usize {
        mc.particles()
            .iter()
            .skip(N_INITIAL_ENTRIES)
            .filter(|p| {
                p.status == STATUS_MATRIX_ELEMENT
                    && (p.pdg_id().abs() <= self.nqmatch || p.pdg_id() == GLUON)
                    && p.mother1().is_some()
                    && (p.mothup[0] <= N_INITIAL_ENTRIES || p.mothup[1] != 0)
            })
            .count()
    }

    /// Partons entering the reclustering
    pub(crate) fn select_particles(&self, mc: &McEvent) -> Vec<ClusterInput> {
        let mut inputs = Vec::new();
        for (idx, part) in mc.particles().iter().enumerate().skip(N_INITIAL_ENTRIES) {
            let id = part.pdg_id();
            if id.abs() > 5 && id != GLUON {
                continue;
            }
            let shower_parton = if self.hadronised {
                part.status == STATUS_INTERMEDIATE
            } else {
                part.status != STATUS_MATRIX_ELEMENT
            };
            if !shower_parton || !from_hard_process(mc, idx) {
                continue;
            }
            if part.momentum.abs_eta() > MAX_ABS_ETA {
                continue;
            }
            if self.hadronised && is_copy_of_mother(mc, idx) {
                continue;
            }
            inputs.push(ClusterInput::new(part.momentum, idx));
        }
        trace!("{} partons selected for reclustering", inputs.len());
        inputs
    }
}

// walk up the first mothers until reaching the hard process, beam
// remnants, or hadronisation
fn from_hard_process(mc: &McEvent, idx: usize) -> bool {
    let mut visited = vec![false; mc.len()];
    let mut cur = idx;
    while let Some(mother) = mc[cur].mother1() {
        if std::mem::replace(&mut visited[cur], true) {
            return false;
        }
        let mothup1 = mc[cur].mothup[0];
        if mothup1 == 1 || mothup1 == 2 {
            return false;
        } else if mothup1 <= N_INITIAL_ENTRIES {
            return true;
        } else if HADRONIZATION_IDS.contains(&mc[mother].pdg_id()) {
            return false;
        }
        cur = mother;
    }
    true
}

fn is_copy_of_mother(mc: &McEvent, idx: usize) -> bool {
    let part = &mc[idx];
    let Some(mother) = part.mother1() else {
        return false;
    };
    let mother = &mc[mother];
    let close = |a: f64, b: f64| (a - b).abs() < SAME_MOMENTUM_TOLERANCE;
    part.pid == mother.pid
        && part.status == mother.status
        && close(part.momentum.px().into(), mother.momentum.px().into())
        && close(part.momentum.py().into(), mother.momentum.py().into())
        && close(part.momentum.pz().into(), mother.momentum.pz().into())
}
