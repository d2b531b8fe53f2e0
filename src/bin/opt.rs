use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use jetreco::cluster::ClusteringSettings;
use jetreco::merging::DEFAULT_NQMATCH;
use jetreco::sequence::JetAlgorithm;

#[derive(Debug, Copy, Clone, Parser)]
pub(crate) struct JetDefinition {
    /// Jet algorithm.
    #[clap(
        short = 'a',
        long,
        help = "Jet algorithm.\nPossible settings are 'antikt', 'kt', 'cambridge', 'genkt:<p>'."
    )]
    pub jetalgorithm: Option<JetAlgorithm>,
    /// Jet radius parameter.
    #[clap(short = 'R', long)]
    pub jetradius: Option<f64>,
    /// Minimum jet transverse momentum in GeV.
    #[clap(short = 'p', long)]
    pub jetpt: Option<f64>,
    /// Extract exclusive instead of inclusive jets.
    #[clap(long)]
    pub exclusive_jets: bool,
}

#[derive(Debug, Parser)]
#[clap(about, author, version)]
pub(crate) struct Opt {
    /// Clustering settings in YAML format.
    ///
    /// Options given on the command line take precedence.
    #[clap(long, short)]
    pub(crate) config: Option<PathBuf>,

    #[clap(flatten)]
    pub(crate) jet_def: JetDefinition,

    /// Whether to remove identified leptons, photons, and taus from
    /// the jet clustering.
    #[clap(long)]
    pub(crate) exclusive_id: Option<bool>,

    /// Reconstruct tracks from charged final-state particles.
    #[clap(long)]
    pub(crate) tracks: bool,

    /// Random number generator seed for tagging efficiencies.
    #[clap(long)]
    pub(crate) seed: Option<u64>,

    /// Number of differential jet rates to plot.
    #[clap(long)]
    pub(crate) njets: Option<usize>,

    /// Largest quark flavour counted as a matrix-element jet.
    #[clap(long, default_value_t = DEFAULT_NQMATCH)]
    pub(crate) nqmatch: i32,

    /// Events are not hadronised.
    #[clap(long)]
    pub(crate) no_hadronisation: bool,

    /// Output file for the differential jet rate histograms.
    #[clap(long, short, default_value = "merging_plots.txt")]
    pub(crate) output: PathBuf,

    /// Write the reconstructed events to the given file in YAML format.
    #[clap(long)]
    pub(crate) dump: Option<PathBuf>,

    /// Verbosity level
    #[clap(
        short,
        long,
        default_value = "Info",
        help = "Verbosity level.\nPossible values with increasing amount of output are\n'off', 'error', 'warn', 'info', 'debug', 'trace'.\n"
    )]
    pub(crate) loglevel: String,

    /// Input files in Les Houches Event format
    #[clap(name = "INFILES", value_parser, required = true)]
    pub(crate) infiles: Vec<PathBuf>,
}

impl Opt {
    pub(crate) fn validate(self) -> Result<Self> {
        if let Some(r) = self.jet_def.jetradius {
            if r <= 0. {
                bail!("Jet radius has to be positive, is {r}");
            }
        }
        if self.njets == Some(0) {
            bail!("Number of jets for differential jet rate plots has to be positive");
        }
        Ok(self)
    }

    /// Combine the configuration file with command-line options
    pub(crate) fn clustering_settings(&self) -> Result<ClusteringSettings> {
        let mut settings = if let Some(config) = &self.config {
            let file = File::open(config)
                .with_context(|| format!("Failed to open configuration file {config:?}"))?;
            serde_yaml::from_reader(BufReader::new(file))
                .with_context(|| format!("Failed to read settings from {config:?}"))?
        } else {
            ClusteringSettings::default()
        };
        if let Some(algorithm) = self.jet_def.jetalgorithm {
            settings.algorithm = algorithm;
        }
        if let Some(radius) = self.jet_def.jetradius {
            settings.radius = radius;
        }
        if let Some(ptmin) = self.jet_def.jetpt {
            settings.ptmin = ptmin;
        }
        if self.jet_def.exclusive_jets {
            settings.exclusive = true;
        }
        if let Some(exclusive_id) = self.exclusive_id {
            settings.exclusive_id = exclusive_id;
        }
        if self.tracks {
            settings.fill_tracks = true;
        }
        if let Some(seed) = self.seed {
            settings.seed = seed;
        }
        Ok(settings)
    }
}
