mod opt;

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;

use crate::opt::Opt;

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use jetreco::{
    cluster::JetClusterer,
    finalize::EventFinalizer,
    lhef::{LhefError, LhefReader},
    merging::MergingPlots,
    progress_bar::{Progress, ProgressBar},
    writer::EventWriter,
    GIT_BRANCH, GIT_REV, VERSION,
};
use log::{debug, info, warn};

fn main() -> Result<()> {
    let args = argfile::expand_args_from(
        std::env::args_os(),
        argfile::parse_fromfile,
        argfile::PREFIX,
    )
    .with_context(|| "Failed to read argument file")?;
    let opt = Opt::parse_from(args).validate()?;

    let env = Env::default().filter_or("JETRECO_LOG", &opt.loglevel);
    env_logger::init_from_env(env);

    if let (Some(rev), Some(branch)) = (GIT_REV, GIT_BRANCH) {
        info!("jetreco {VERSION} rev {rev} ({branch})");
    } else {
        info!("jetreco {VERSION}");
    }

    debug!("options: {:#?}", opt);
    let settings = opt.clustering_settings()?;
    debug!("clustering settings: {:#?}", settings);

    let mut clusterer = JetClusterer::new(settings);
    let jet_def = clusterer.jet_definition();
    info!("Clustering {} jets with R = {}", jet_def.algorithm, jet_def.radius);
    let finalizer = EventFinalizer::new();
    let mut merging = if let Some(njets) = opt.njets {
        let mut plots = MergingPlots::new()
            .with_nqmatch(opt.nqmatch)
            .hadronised(!opt.no_hadronisation);
        let parameters = BTreeMap::from([("njets".to_owned(), njets.to_string())]);
        plots.initialize(&parameters)?;
        Some(plots)
    } else {
        None
    };
    let mut dump = match &opt.dump {
        Some(path) => Some(
            EventWriter::create(path)
                .with_context(|| format!("Failed to create {path:?}"))?,
        ),
        None => None,
    };

    let mut nevents = 0;
    let mut nskipped = 0;
    let mut njets = 0;
    for infile in &opt.infiles {
        info!("Reading events from {infile:?}");
        let reader = LhefReader::open(infile)
            .with_context(|| format!("Failed to read from {infile:?}"))?;
        let sample = reader.sample().clone();
        let progress = ProgressBar::new(None, "events processed:");
        for event in reader {
            let mut event = match event {
                Ok(event) => event,
                Err(LhefError::EventError(err)) => {
                    warn!("Skipping event: {err}");
                    nskipped += 1;
                    continue;
                }
                Err(err) => {
                    progress.finish();
                    return Err(err).with_context(|| format!("Failed to read event from {infile:?}"));
                }
            };
            progress.inc(1);
            nevents += 1;
            if !clusterer.execute(&sample, &mut event) {
                warn!("Event without generator-level record");
                continue;
            }
            if let Some(mc) = event.mc.as_mut() {
                finalizer.finalize_mc(mc);
            }
            njets += event.rec.as_ref().map(|rec| rec.jets.len()).unwrap_or_default();
            if let Some(merging) = merging.as_mut() {
                merging.execute(&sample, &event);
            }
            if let Some(dump) = dump.as_mut() {
                dump.write(&event)?;
            }
        }
        progress.finish();
    }
    info!("Processed {nevents} events with {njets} jets");
    if nskipped > 0 {
        warn!("Skipped {nskipped} events with invalid records");
    }

    if let Some(mut merging) = merging {
        for plots in merging.djr() {
            let [pos, neg] = plots.total.sum_weights();
            debug!("{}: sum of weights {pos} - {}", plots.total.name(), neg.abs());
        }
        let out = File::create(&opt.output)
            .with_context(|| format!("Failed to create {:?}", opt.output))?;
        merging.finalize(BufWriter::new(out))?;
        info!("Differential jet rates written to {:?}", opt.output);
    }
    if let Some(dump) = dump {
        dump.finish()?;
    }
    info!("done");
    Ok(())
}
