use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use audec::auto_decompress;
use log::{debug, trace};
use noisy_float::prelude::*;
use nom::{
    bytes::complete::take_while1,
    character::complete::{i32, space0, space1, u32},
    multi::count,
    number::complete::double,
    sequence::preceded,
    IResult,
};
use particle_id::ParticleID;
use thiserror::Error;

use crate::{
    event::{Event, EventError, McEventBuilder, McSample, Sample},
    four_vector::FourVector,
};

/// Reader for (potentially compressed) Les Houches Event Files
///
/// The beam information from the `<init>` block is available through
/// [LhefReader::sample]. Iterating yields one [Event] with a
/// generator-level record per `<event>` block.
pub struct LhefReader {
    source: Box<dyn BufRead>,
    sample: Sample,
}

impl LhefReader {
    /// Open the given file
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LhefError> {
        let file = File::open(path)?;
        Self::new(BufReader::new(file))
    }

    /// Read from the given source, which may be compressed
    pub fn new(source: impl BufRead + 'static) -> Result<Self, LhefError> {
        let mut source = auto_decompress(source);
        let header = read_until_tag(&mut source, b"</init>")?;
        let header = String::from_utf8(header)?;
        let Some(start) = header.find("<init>") else {
            return Err(LhefError::MissingInit);
        };
        let init = &header[start + "<init>".len()..];
        let (_, mc) = init_line(init.trim_start())?;
        debug!("beams: {:?} with energies {:?}", mc.beam_id, mc.beam_energy);
        Ok(Self {
            source,
            sample: Sample::with_mc(mc),
        })
    }

    /// Sample information from the `<init>` block
    pub fn sample(&self) -> &Sample {
        &self.sample
    }

    fn read_record(&mut self) -> Option<Result<String, LhefError>> {
        let record = match read_until_tag(&mut self.source, b"</event>") {
            Ok(record) => record,
            Err(err) => return Some(Err(err.into())),
        };
        if !record.ends_with(b"</event>") {
            return None;
        }
        let record = match String::from_utf8(record) {
            Ok(record) => record,
            Err(err) => return Some(Err(err.into())),
        };
        trace!("Read Les Houches Event record:\n{record}");
        Some(Ok(record))
    }
}

impl Iterator for LhefReader {
    type Item = Result<Event, LhefError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_record().map(|r| r.and_then(|record| parse_event(&record)))
    }
}

fn read_until_tag(source: &mut impl BufRead, tag: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    while !buf.ends_with(tag) {
        if source.read_until(b'>', &mut buf)? == 0 {
            break;
        }
    }
    Ok(buf)
}

/// Parse a single `<event>` block
pub fn parse_event(record: &str) -> Result<Event, LhefError> {
    let Some(start) = record.find("<event") else {
        return Err(LhefError::ParseError(format!("No <event> tag in {record}")));
    };
    let record = &record[start..];
    let Some(line_end) = record.find('\n') else {
        return Err(LhefError::NoLineBreak(record.to_string()));
    };
    let record = &record[(1 + line_end)..];
    let (rest, nparticles) = preceded(space0, u32)(record)?;
    let nparticles = nparticles as usize;
    let (rest, _idprup) = any_entry(rest)?;
    let (_, weight) = double_entry(rest)?;

    let mut builder = McEventBuilder::with_capacity(nparticles);
    let lines = record.lines().skip(1).take(nparticles);
    let mut nread = 0;
    for line in lines {
        let (rest, id) = preceded(space0, i32)(line)?;
        let (rest, status) = i32_entry(rest)?;
        let (rest, mothup1) = u32_entry(rest)?;
        let (rest, mothup2) = u32_entry(rest)?;
        // colour
        let (rest, _) = count(any_entry, 2)(rest)?;
        let (rest, px) = double_entry(rest)?;
        let (rest, py) = double_entry(rest)?;
        let (rest, pz) = double_entry(rest)?;
        let (_, e) = double_entry(rest)?;
        builder.add_particle(
            ParticleID::new(id),
            status,
            [mothup1 as usize, mothup2 as usize],
            FourVector::from_pxpypze(px, py, pz, e),
        );
        nread += 1;
    }
    if nread != nparticles {
        return Err(LhefError::ParseError(format!(
            "Expected {nparticles} particles, found {nread}"
        )));
    }
    let mut event = Event::from_mc(builder.build()?);
    event.weight = n64(weight);
    Ok(event)
}

fn init_line(line: &str) -> IResult<&str, McSample> {
    let (rest, id1) = preceded(space0, i32)(line)?;
    let (rest, id2) = i32_entry(rest)?;
    let (rest, e1) = double_entry(rest)?;
    let (rest, e2) = double_entry(rest)?;
    let sample = McSample {
        beam_id: [id1, id2],
        beam_energy: [e1, e2],
    };
    Ok((rest, sample))
}

fn double_entry(line: &str) -> IResult<&str, f64> {
    preceded(space1, double)(line)
}

fn any_entry(line: &str) -> IResult<&str, &str> {
    preceded(space1, non_space)(line)
}

fn u32_entry(line: &str) -> IResult<&str, u32> {
    preceded(space1, u32)(line)
}

fn i32_entry(line: &str) -> IResult<&str, i32> {
    preceded(space1, i32)(line)
}

fn non_space(line: &str) -> IResult<&str, &str> {
    take_while1(|c: char| !c.is_ascii_whitespace())(line)
}

/// Les Houches Event Format error
#[derive(Debug, Error)]
pub enum LhefError {
    /// No `<init>` block
    #[error("No <init> block found")]
    MissingInit,
    /// No line breaks
    #[error("No line breaks in event record {0}")]
    NoLineBreak(String),
    /// Parse error
    #[error("Error parsing entry in event record: {0}")]
    ParseError(String),
    /// Inconsistent mother references
    #[error("Invalid event record")]
    EventError(#[from] EventError),
    /// Invalid UTF-8
    #[error("Record is not valid UTF-8")]
    Utf8Error(#[from] std::string::FromUtf8Error),
    /// I/O error
    #[error("I/O error")]
    IOError(#[from] std::io::Error),
}

impl From<nom::Err<nom::error::Error<&str>>> for LhefError {
    fn from(source: nom::Err<nom::error::Error<&str>>) -> Self {
        Self::ParseError(source.to_string())
    }
}
