use std::{
    collections::HashMap,
    fmt::{self, Display},
    str::FromStr,
};

use jetty::{
    anti_kt_f, cambridge_aachen_f, distance::Distance, gen_kt_f, kt_f, ClusterHistory,
    ClusterStep, PseudoJet,
};
use log::{trace, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::four_vector::FourVector;

/// Sequential recombination algorithms
#[derive(Deserialize, Serialize, Debug, Copy, Clone, PartialEq)]
pub enum JetAlgorithm {
    /// The [anti-kt](https://arxiv.org/abs/0802.1189) algorithm
    AntiKt,
    /// The [Cambridge](https://arxiv.org/abs/hep-ph/9707323)/[Aachen](https://arxiv.org/abs/hep-ph/9907280) algorithm
    CambridgeAachen,
    /// The [kt](https://arxiv.org/abs/hep-ph/9305266) algorithm
    Kt,
    /// The generalised kt algorithm with the given exponent
    GenKt(f64),
}

impl Display for JetAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AntiKt => write!(f, "antikt"),
            Self::CambridgeAachen => write!(f, "cambridge"),
            Self::Kt => write!(f, "kt"),
            Self::GenKt(p) => write!(f, "genkt:{p}"),
        }
    }
}

/// Placeholder for an unknown jet algorithm
#[derive(Debug, Clone, Error)]
pub struct UnknownJetAlgorithm(String);

impl Display for UnknownJetAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown jet algorithm: {}", self.0)
    }
}

impl FromStr for JetAlgorithm {
    type Err = UnknownJetAlgorithm;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "anti_kt" | "antikt" | "anti-kt" => Ok(Self::AntiKt),
            "kt" => Ok(Self::Kt),
            "cambridge" | "Cambridge/Aachen" | "Cambridge-Aachen"
            | "Cambridge_Aachen" | "cambridge/aachen" | "cambridge-aachen"
            | "cambridge_aachen" => Ok(Self::CambridgeAachen),
            _ => {
                if let Some(p) = s.strip_prefix("genkt") {
                    let p = p.strip_prefix([':', '_']).unwrap_or(p);
                    if let Ok(p) = p.parse() {
                        return Ok(Self::GenKt(p));
                    }
                }
                Err(UnknownJetAlgorithm(s.to_string()))
            }
        }
    }
}

/// Definition of a jet
#[derive(Deserialize, Serialize, Debug, Copy, Clone, PartialEq)]
pub struct JetDefinition {
    /// Jet algorithm
    pub algorithm: JetAlgorithm,
    /// Jet radius parameter
    pub radius: f64,
}

impl JetDefinition {
    pub fn new(algorithm: JetAlgorithm, radius: f64) -> Self {
        Self { algorithm, radius }
    }
}

/// A clustering input tagged with the index of its source
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ClusterInput {
    pub momentum: FourVector,
    pub user_index: usize,
}

impl ClusterInput {
    pub fn new(momentum: FourVector, user_index: usize) -> Self {
        Self {
            momentum,
            user_index,
        }
    }
}

/// A jet extracted from a [ClusterSequence]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Jet {
    pub momentum: FourVector,
    /// Position of the jet in the cluster sequence
    idx: usize,
}

#[derive(Debug, Copy, Clone, PartialEq)]
enum Parent {
    Input,
    Jets(usize, usize),
    Beam(usize),
}

#[derive(Debug, Copy, Clone, PartialEq)]
struct Step {
    parent: Parent,
    dij: f64,
    max_dij_so_far: f64,
}

/// Sequential recombination of clustering inputs
///
/// The clustering itself is done by [jetty]. The full history is
/// recorded so that jets can be extracted with different criteria
/// from the same sequence. Inputs without transverse momentum are
/// not clustered.
#[derive(Debug, Clone)]
pub struct ClusterSequence {
    inputs: Vec<ClusterInput>,
    jets: Vec<FourVector>,
    history: Vec<Step>,
    // for each jet, the history step that created it
    born: Vec<usize>,
}

impl ClusterSequence {
    /// Cluster the inputs completely according to `jet_def`
    pub fn new(inputs: Vec<ClusterInput>, jet_def: &JetDefinition) -> Self {
        let inputs: Vec<_> = inputs
            .into_iter()
            .filter(|input| input.momentum.pt2() > 0.)
            .collect();
        let n = inputs.len();
        let mut seq = Self {
            jets: inputs.iter().map(|i| i.momentum).collect(),
            history: Vec::with_capacity(2 * n),
            born: (0..n).collect(),
            inputs,
        };
        for _ in 0..n {
            seq.history.push(Step {
                parent: Parent::Input,
                dij: 0.,
                max_dij_so_far: 0.,
            });
        }
        let r = jet_def.radius;
        match jet_def.algorithm {
            JetAlgorithm::AntiKt => seq.record(anti_kt_f(r)),
            JetAlgorithm::CambridgeAachen => seq.record(cambridge_aachen_f(r)),
            JetAlgorithm::Kt => seq.record(kt_f(r)),
            JetAlgorithm::GenKt(p) => seq.record(gen_kt_f(r, p)),
        }
        seq
    }

    fn record<D: Distance>(&mut self, distance: D) {
        let partons: Vec<PseudoJet> = self.jets.iter().map(PseudoJet::from).collect();
        // pseudojets still being clustered and their positions in `jets`
        let mut alive: HashMap<PseudoJet, Vec<usize>> = HashMap::new();
        for (idx, parton) in partons.iter().enumerate() {
            alive.entry(*parton).or_default().push(idx);
        }

        let mut max_dij_so_far = 0.;
        for step in ClusterHistory::new(partons, &distance) {
            let (parent, dij, merged) = match step {
                ClusterStep::Combine([p1, p2]) => {
                    let (Some(i), Some(j)) = (take(&mut alive, &p1), take(&mut alive, &p2)) else {
                        warn!("Lost track of pseudojets {p1:?}, {p2:?}");
                        continue;
                    };
                    let dij = f64::from(distance.distance(&p1, &p2));
                    (Parent::Jets(i, j), dij, Some(p1 + p2))
                }
                ClusterStep::Jet(p) => {
                    let Some(i) = take(&mut alive, &p) else {
                        warn!("Lost track of pseudojet {p:?}");
                        continue;
                    };
                    (Parent::Beam(i), f64::from(distance.beam_distance(&p)), None)
                }
            };
            max_dij_so_far = f64::max(max_dij_so_far, dij);
            let pos = self.history.len();
            trace!("step {pos}: {parent:?}, d = {dij}");
            self.history.push(Step {
                parent,
                dij,
                max_dij_so_far,
            });
            if let (Parent::Jets(i, j), Some(merged)) = (parent, merged) {
                let momentum = self.jets[i] + self.jets[j];
                self.jets.push(momentum);
                self.born.push(pos);
                alive.entry(merged).or_default().push(self.jets.len() - 1);
            }
        }
    }

    fn jet(&self, idx: usize) -> Jet {
        Jet {
            momentum: self.jets[idx],
            idx,
        }
    }

    fn sorted_by_pt(mut jets: Vec<Jet>) -> Vec<Jet> {
        jets.sort_by(|a, b| b.momentum.pt().cmp(&a.momentum.pt()));
        jets
    }

    /// Jets that merged with the beam, with transverse momentum of at least `ptmin`
    pub fn inclusive_jets(&self, ptmin: f64) -> Vec<Jet> {
        let ptmin2 = ptmin * ptmin;
        let jets = self
            .history
            .iter()
            .filter_map(|step| match step.parent {
                Parent::Beam(jet) if self.jets[jet].pt2() >= ptmin2 => Some(self.jet(jet)),
                _ => None,
            })
            .collect();
        Self::sorted_by_pt(jets)
    }

    /// Jets obtained by undoing all clustering steps with distance above `dcut`
    pub fn exclusive_jets(&self, dcut: f64) -> Vec<Jet> {
        let n = self.inputs.len();
        let mut stop = self.history.len();
        while stop > n && self.history[stop - 1].max_dij_so_far > dcut {
            stop -= 1;
        }
        self.exclusive_jets_from(stop)
    }

    // the jets alive before history step `stop`
    fn exclusive_jets_from(&self, stop: usize) -> Vec<Jet> {
        let mut jets = Vec::new();
        for step in &self.history[stop..] {
            let parents = match step.parent {
                Parent::Jets(a, b) => [Some(a), Some(b)],
                Parent::Beam(a) => [Some(a), None],
                Parent::Input => [None, None],
            };
            for jet in parents.into_iter().flatten() {
                if self.born[jet] < stop {
                    jets.push(self.jet(jet));
                }
            }
        }
        Self::sorted_by_pt(jets)
    }

    /// The distance at which the clustering went from `njets + 1` to `njets` objects
    ///
    /// Returns zero if there were never more than `njets` objects.
    pub fn exclusive_dmerge(&self, njets: usize) -> f64 {
        let n = self.inputs.len();
        if njets >= n {
            return 0.;
        }
        self.history
            .get(2 * n - njets - 1)
            .map(|step| step.dij)
            .unwrap_or_default()
    }

    /// The inputs making up the given jet
    pub fn constituents(&self, jet: &Jet) -> Vec<ClusterInput> {
        let n = self.inputs.len();
        let mut res = Vec::new();
        let mut stack = vec![jet.idx];
        while let Some(idx) = stack.pop() {
            if idx < n {
                res.push(self.inputs[idx]);
                continue;
            }
            if let Parent::Jets(a, b) = self.history[self.born[idx]].parent {
                stack.push(b);
                stack.push(a);
            }
        }
        res
    }
}

fn take(alive: &mut HashMap<PseudoJet, Vec<usize>>, p: &PseudoJet) -> Option<usize> {
    alive.get_mut(p).and_then(|idx| idx.pop())
}
