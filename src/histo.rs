use std::io::{self, Write};

use serde::{Deserialize, Serialize};

/// Fixed-width histogram with separate positive and negative weights
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Histogram {
    name: String,
    xmin: f64,
    xmax: f64,
    pos: Vec<f64>,
    neg: Vec<f64>,
    underflow: [f64; 2],
    overflow: [f64; 2],
    nentries: [u64; 2],
    sum_w: [f64; 2],
    sum_wx: [f64; 2],
}

impl Histogram {
    /// A new empty histogram with `nbins` bins spanning `[xmin, xmax)`
    pub fn new(name: impl Into<String>, nbins: usize, xmin: f64, xmax: f64) -> Self {
        Self {
            name: name.into(),
            xmin,
            xmax,
            pos: vec![0.; nbins],
            neg: vec![0.; nbins],
            underflow: [0.; 2],
            overflow: [0.; 2],
            nentries: [0; 2],
            sum_w: [0.; 2],
            sum_wx: [0.; 2],
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn nbins(&self) -> usize {
        self.pos.len()
    }

    /// Number of entries with positive and negative weight
    pub fn nentries(&self) -> [u64; 2] {
        self.nentries
    }

    /// Sum of all positive and all negative weights
    pub fn sum_weights(&self) -> [f64; 2] {
        self.sum_w
    }

    /// Weight in the given bin, split into positive and negative parts
    pub fn bin(&self, idx: usize) -> [f64; 2] {
        [self.pos[idx], self.neg[idx]]
    }

    pub fn underflow(&self) -> [f64; 2] {
        self.underflow
    }

    pub fn overflow(&self) -> [f64; 2] {
        self.overflow
    }

    pub fn fill(&mut self, x: f64, weight: f64) {
        let sign = usize::from(weight < 0.);
        let w = weight.abs();
        self.nentries[sign] += 1;
        self.sum_w[sign] += w;
        self.sum_wx[sign] += w * x;
        let index = ((x - self.xmin) / (self.xmax - self.xmin) * self.nbins() as f64).floor();
        if index < 0. {
            self.underflow[sign] += w;
        } else if index >= self.nbins() as f64 {
            self.overflow[sign] += w;
        } else if sign == 0 {
            self.pos[index as usize] += w;
        } else {
            self.neg[index as usize] += w;
        }
    }

    /// Write in a human-readable text format
    pub fn write_text(&self, mut out: impl Write) -> io::Result<()> {
        writeln!(out, "  <Histo>")?;
        writeln!(out, "    <Description>")?;
        writeln!(out, "      \"{}\"", self.name)?;
        writeln!(out, "      # nbins xmin xmax")?;
        writeln!(out, "      {} {:.8e} {:.8e}", self.nbins(), self.xmin, self.xmax)?;
        writeln!(out, "    </Description>")?;
        writeln!(out, "    <Statistics>")?;
        writeln!(out, "      # positive negative")?;
        writeln!(out, "      {} {} # nentries", self.nentries[0], self.nentries[1])?;
        writeln!(out, "      {:.8e} {:.8e} # sum of weights", self.sum_w[0], self.sum_w[1])?;
        writeln!(
            out,
            "      {:.8e} {:.8e} # sum of weights times x",
            self.sum_wx[0], self.sum_wx[1]
        )?;
        writeln!(out, "    </Statistics>")?;
        writeln!(out, "    <Data>")?;
        writeln!(
            out,
            "      {:.8e} {:.8e} # underflow",
            self.underflow[0], self.underflow[1]
        )?;
        for (pos, neg) in self.pos.iter().zip(&self.neg) {
            writeln!(out, "      {pos:.8e} {neg:.8e}")?;
        }
        writeln!(
            out,
            "      {:.8e} {:.8e} # overflow",
            self.overflow[0], self.overflow[1]
        )?;
        writeln!(out, "    </Data>")?;
        writeln!(out, "  </Histo>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill() {
        let mut h = Histogram::new("test", 4, 0., 4.);
        h.fill(0.5, 1.);
        h.fill(0., 2.);
        h.fill(3.99, -1.);
        h.fill(4., 1.);
        h.fill(-0.1, -3.);
        assert_eq!(h.bin(0), [3., 0.]);
        assert_eq!(h.bin(3), [0., 1.]);
        assert_eq!(h.overflow(), [1., 0.]);
        assert_eq!(h.underflow(), [0., 3.]);
        assert_eq!(h.nentries(), [3, 2]);
        assert_eq!(h.sum_weights(), [4., 4.]);
    }

    #[test]
    fn text() {
        let mut h = Histogram::new("DJR1", 2, 0., 1.);
        h.fill(0.25, 1.);
        let mut out = Vec::new();
        h.write_text(&mut out).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(out.starts_with("  <Histo>\n"));
        assert!(out.contains("\"DJR1\""));
        assert!(out.contains("1.00000000e0 0.00000000e0\n"));
        assert!(out.trim_end().ends_with("</Histo>"));
    }
}
