use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use noisy_float::prelude::*;
use serde::Serialize;
use thiserror::Error;

use crate::{event::Event, reco::RecEvent};

/// Writer for reconstructed events as a stream of YAML documents
pub struct EventWriter<W: Write> {
    out: W,
    nevents: usize,
}

impl EventWriter<BufWriter<File>> {
    /// Create the given file for writing
    pub fn create(path: impl AsRef<Path>) -> Result<Self, WriteError> {
        let file = File::create(path).map_err(WriteError::CreateErr)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

#[derive(Serialize)]
struct Record<'a> {
    event: usize,
    weight: N64,
    rec: &'a RecEvent,
}

impl<W: Write> EventWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out, nevents: 0 }
    }

    /// Number of events written so far
    pub fn nevents(&self) -> usize {
        self.nevents
    }

    /// Write the reconstructed record of an event
    ///
    /// Events without a reconstructed record are counted but not
    /// written.
    pub fn write(&mut self, event: &Event) -> Result<(), WriteError> {
        let number = self.nevents;
        self.nevents += 1;
        let Some(rec) = event.rec.as_ref() else {
            return Ok(());
        };
        let record = Record {
            event: number,
            weight: event.weight,
            rec,
        };
        writeln!(self.out, "---").map_err(WriteError::WriteErr)?;
        serde_yaml::to_writer(&mut self.out, &record)?;
        Ok(())
    }

    pub fn finish(mut self) -> Result<W, WriteError> {
        self.out.flush().map_err(WriteError::WriteErr)?;
        Ok(self.out)
    }
}

/// Error writing reconstructed events
#[derive(Debug, Error)]
pub enum WriteError {
    /// Failed to create the output file
    #[error("Failed to create output file")]
    CreateErr(#[source] std::io::Error),
    /// Failed to write
    #[error("Failed to write event")]
    WriteErr(#[source] std::io::Error),
    /// Failed to serialise
    #[error("Failed to serialise event")]
    SerialiseErr(#[from] serde_yaml::Error),
}
