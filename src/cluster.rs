use derive_builder::Builder;
use log::debug;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{
    event::{Event, McEvent, Sample},
    four_vector::FourVector,
    physics::{HadronDecayOrigin, PdgClassifier, MUON},
    reco::RecEvent,
    selection::{InputSelector, Selection},
    sequence::{ClusterInput, ClusterSequence, Jet, JetAlgorithm, JetDefinition},
    tagger::{BTagSettings, BTagger, TauTagSettings, TauTagger},
    traits::{Classify, DecayOrigin, Tag},
};

/// Settings for jet reconstruction
#[derive(Deserialize, Serialize, Builder, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ClusteringSettings {
    /// Jet algorithm
    #[builder(default = "JetAlgorithm::AntiKt")]
    #[serde(
        serialize_with = "serialize_algorithm",
        deserialize_with = "deserialize_algorithm"
    )]
    pub algorithm: JetAlgorithm,
    /// Jet radius
    #[builder(default = "0.4")]
    pub radius: f64,
    /// Minimum jet transverse momentum
    #[builder(default = "5.")]
    pub ptmin: f64,
    /// Use exclusive instead of inclusive jets
    #[builder(default)]
    pub exclusive: bool,
    /// Remove leptons, photons, and identified taus from the
    /// clustering inputs
    #[builder(default = "true")]
    pub exclusive_id: bool,
    /// Reconstruct tracks
    #[builder(default)]
    pub fill_tracks: bool,
    #[builder(default)]
    pub btag: BTagSettings,
    #[builder(default)]
    pub tau_tag: TauTagSettings,
    /// Seed for the tagging efficiencies
    #[builder(default)]
    pub seed: u64,
}

impl Default for ClusteringSettings {
    fn default() -> Self {
        Self {
            algorithm: JetAlgorithm::AntiKt,
            radius: 0.4,
            ptmin: 5.,
            exclusive: false,
            exclusive_id: true,
            fill_tracks: false,
            btag: Default::default(),
            tau_tag: Default::default(),
            seed: 0,
        }
    }
}

impl ClusteringSettings {
    pub fn jet_definition(&self) -> JetDefinition {
        JetDefinition::new(self.algorithm, self.radius)
    }
}

fn serialize_algorithm<S: Serializer>(alg: &JetAlgorithm, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(alg)
}

fn deserialize_algorithm<'de, D: Deserializer<'de>>(d: D) -> Result<JetAlgorithm, D::Error> {
    let name = String::deserialize(d)?;
    name.parse().map_err(serde::de::Error::custom)
}

/// Jet reconstruction from the generator-level record
///
/// Leptons, photons, and hadronic taus are reconstructed directly
/// from the generator record. The remaining visible final-state
/// particles are clustered into jets, which are then passed to the b
/// and tau taggers. Missing and total transverse energies are filled
/// along the way.
pub struct JetClusterer<C = PdgClassifier, O = HadronDecayOrigin> {
    settings: ClusteringSettings,
    jet_def: JetDefinition,
    classifier: C,
    origin: O,
    btagger: BTagger,
    tau_tagger: TauTagger,
}

impl JetClusterer {
    /// Jet clusterer with the default particle classification
    pub fn new(settings: ClusteringSettings) -> Self {
        Self::with_services(settings, PdgClassifier::new(), HadronDecayOrigin::new())
    }
}

impl<C: Classify, O: DecayOrigin> JetClusterer<C, O> {
    pub fn with_services(settings: ClusteringSettings, classifier: C, origin: O) -> Self {
        let btagger = BTagger::new(settings.btag, settings.seed);
        let tau_tagger = TauTagger::new(settings.tau_tag, settings.seed.wrapping_add(3));
        Self {
            jet_def: settings.jet_definition(),
            settings,
            classifier,
            origin,
            btagger,
            tau_tagger,
        }
    }

    pub fn jet_definition(&self) -> &JetDefinition {
        &self.jet_def
    }

    /// Reconstruct the event
    ///
    /// Returns `false` if either the sample or the event lack
    /// generator-level information.
    pub fn execute(&mut self, sample: &Sample, event: &mut Event) -> bool {
        let (Some(mc_sample), Some(mc)) = (sample.mc.as_ref(), event.mc.as_ref()) else {
            return false;
        };
        let rec = event.rec.get_or_insert_with(RecEvent::new);
        rec.reset();

        let mut selector = InputSelector {
            classifier: &self.classifier,
            origin: &self.origin,
            tau_id: &mut self.tau_tagger,
            exclusive_id: self.settings.exclusive_id,
            fill_tracks: self.settings.fill_tracks,
        };
        let selection = selector.select(mc, mc_sample, rec);

        let inputs = self.inputs(mc, &selection);
        debug!("clustering {} of {} particles", inputs.len(), mc.len());
        let seq = ClusterSequence::new(inputs, &self.jet_def);
        self.add_unclustered_totals(&seq, rec);
        self.fill_jets(&seq, mc, rec);
        self.subtract_objects(rec);
        rec.met.make_transverse();
        rec.mht.make_transverse();
        debug!(
            "{} jets, MET = {:.3}, TET = {:.3}, THT = {:.3}",
            rec.jets.len(),
            rec.met.pt(),
            rec.tet,
            rec.tht
        );

        self.btagger.execute(sample, event);
        self.tau_tagger.execute(sample, event);
        true
    }

    /// Visible final-state particles not reconstructed as other objects
    pub(crate) fn inputs(&self, mc: &McEvent, selection: &Selection) -> Vec<ClusterInput> {
        mc.particles()
            .iter()
            .enumerate()
            .filter(|(_, p)| self.classifier.is_final_state(p) && !self.classifier.is_invisible(p))
            .filter(|(idx, p)| {
                if self.settings.exclusive_id {
                    !selection.is_vetoed(*idx)
                } else {
                    p.pdg_id().abs() != MUON
                }
            })
            .map(|(idx, p)| ClusterInput::new(p.momentum, idx))
            .collect()
    }

    fn jets(&self, seq: &ClusterSequence, ptmin: f64) -> Vec<Jet> {
        if self.settings.exclusive {
            seq.exclusive_jets(ptmin)
        } else {
            seq.inclusive_jets(ptmin)
        }
    }

    /// Account for all jets without threshold
    pub(crate) fn add_unclustered_totals(&self, seq: &ClusterSequence, rec: &mut RecEvent) {
        for jet in self.jets(seq, 0.) {
            rec.met -= jet.momentum;
            rec.mht -= jet.momentum;
            rec.tht += jet.momentum.pt();
            rec.tet += jet.momentum.pt();
        }
    }

    fn fill_jets(&self, seq: &ClusterSequence, mc: &McEvent, rec: &mut RecEvent) {
        for jet in self.jets(seq, self.settings.ptmin) {
            let constituents: Vec<_> = seq
                .constituents(&jet)
                .into_iter()
                .map(|c| c.user_index)
                .collect();
            let ntracks = constituents
                .iter()
                .filter(|&&idx| self.classifier.is_charged(mc[idx].pid))
                .count();
            let rec_jet = rec.new_jet();
            rec_jet.momentum = jet.momentum;
            rec_jet.ntracks = ntracks as u32;
            rec_jet.constituents = constituents;
        }
    }

    fn subtract_objects(&self, rec: &mut RecEvent) {
        let mut momenta: Vec<FourVector> = Vec::new();
        if self.settings.exclusive_id {
            momenta.extend(rec.electrons.iter().map(|e| e.momentum));
            momenta.extend(rec.photons.iter().map(|p| p.momentum));
            momenta.extend(rec.taus.iter().map(|t| t.momentum));
        }
        momenta.extend(rec.muons.iter().map(|m| m.momentum));
        for p in momenta {
            rec.met -= p;
            rec.tet += p.pt();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{McEventBuilder, McSample};
    use noisy_float::prelude::*;
    use particle_id::ParticleID;

    fn log_init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn p(px: f64, py: f64, pz: f64) -> FourVector {
        FourVector::from_pxpypze(px, py, pz, (px * px + py * py + pz * pz).sqrt())
    }

    fn assert_close(a: &FourVector, b: &FourVector) {
        for i in 0..4 {
            assert!((a[i] - b[i]).abs() < 1e-9, "{a:?} != {b:?}");
        }
    }

    fn sample() -> Sample {
        Sample::with_mc(McSample::default())
    }

    // a muon and two well separated hadrons
    fn three_particles() -> McEvent {
        let mut b = McEventBuilder::new();
        b.add_particle(ParticleID::new(13), 1, [0, 0], p(30., 0., 10.))
            .add_particle(ParticleID::new(211), 1, [0, 0], p(-20., 5., 3.))
            .add_particle(ParticleID::new(130), 1, [0, 0], p(0., -25., -40.));
        b.build().unwrap()
    }

    fn settings(exclusive_id: bool) -> ClusteringSettings {
        ClusteringSettingsBuilder::default()
            .exclusive_id(exclusive_id)
            .ptmin(0.)
            .build()
            .unwrap()
    }

    #[test]
    fn muon_excluded() {
        log_init();
        let mc = three_particles();
        let clusterer = JetClusterer::new(settings(false));
        let selection = Selection {
            vetoed: vec![false; mc.len()],
            ..Default::default()
        };
        let inputs = clusterer.inputs(&mc, &selection);
        let indices: Vec<_> = inputs.iter().map(|i| i.user_index).collect();
        assert_eq!(indices, [1, 2]);

        let seq = ClusterSequence::new(inputs, clusterer.jet_definition());
        let mut rec = RecEvent::new();
        clusterer.add_unclustered_totals(&seq, &mut rec);
        let expected = -(mc[1].momentum + mc[2].momentum);
        assert_close(&rec.met, &expected);
        assert_close(&rec.mht, &expected);
    }

    #[test]
    fn missing_energy() {
        log_init();
        let mc = three_particles();
        let mut event = Event::from_mc(mc);
        let mut clusterer = JetClusterer::new(settings(false));
        assert!(clusterer.execute(&sample(), &mut event));
        let mc = event.mc.as_ref().unwrap();
        let rec = event.rec.as_ref().unwrap();
        assert_eq!(rec.muons.len(), 1);
        assert_eq!(rec.jets.len(), 2);

        let mut expected = -(mc[0].momentum + mc[1].momentum + mc[2].momentum);
        expected.make_transverse();
        assert_close(&rec.met, &expected);
        for v in [&rec.met, &rec.mht] {
            assert_eq!(v.pz(), 0.);
            assert_eq!(v.e(), v.pt());
        }
        let tet: f64 = mc.particles().iter().map(|p| f64::from(p.pt())).sum();
        assert!((f64::from(rec.tet) - tet).abs() < 1e-9);
        let tht = tet - f64::from(mc[0].pt());
        assert!((f64::from(rec.tht) - tht).abs() < 1e-9);
    }

    #[test]
    fn identification_modes() {
        log_init();
        let mut b = McEventBuilder::new();
        b.add_particle(ParticleID::new(11), 1, [0, 0], p(30., 0., 10.))
            .add_particle(ParticleID::new(13), 1, [0, 0], p(0., 30., 10.))
            .add_particle(ParticleID::new(22), 1, [0, 0], p(-30., 0., 10.))
            .add_particle(ParticleID::new(211), 1, [0, 0], p(0., -30., 10.))
            .add_particle(ParticleID::new(12), 1, [0, 0], p(10., 10., 10.));
        let mc = b.build().unwrap();

        let mut event = Event::from_mc(mc.clone());
        let mut exclusive = JetClusterer::new(settings(true));
        assert!(exclusive.execute(&sample(), &mut event));
        let rec = event.rec.unwrap();
        let constituents: Vec<_> = rec.jets.iter().flat_map(|j| j.constituents.clone()).collect();
        assert_eq!(constituents, [3]);
        assert_eq!(rec.electrons.len(), 1);
        assert_eq!(rec.photons.len(), 1);

        let mut event = Event::from_mc(mc);
        let mut inclusive = JetClusterer::new(settings(false));
        assert!(inclusive.execute(&sample(), &mut event));
        let rec = event.rec.unwrap();
        let mut constituents: Vec<_> =
            rec.jets.iter().flat_map(|j| j.constituents.clone()).collect();
        constituents.sort();
        assert_eq!(constituents, [0, 2, 3]);
    }

    #[test]
    fn jet_constituents() {
        log_init();
        let mut b = McEventBuilder::new();
        // two collimated sprays and a soft particle
        b.add_particle(ParticleID::new(211), 1, [0, 0], p(40., 1., 0.))
            .add_particle(ParticleID::new(-211), 1, [0, 0], p(30., -1., 1.))
            .add_particle(ParticleID::new(111), 1, [0, 0], p(20., 0., -1.))
            .add_particle(ParticleID::new(321), 1, [0, 0], p(-25., 0., 0.))
            .add_particle(ParticleID::new(2112), 1, [0, 0], p(-20., 1., 1.))
            .add_particle(ParticleID::new(22), 1, [0, 0], p(0., 1., 0.));
        let mc = b.build().unwrap();
        let mut event = Event::from_mc(mc);
        let settings = ClusteringSettingsBuilder::default()
            .ptmin(10.)
            .build()
            .unwrap();
        let mut clusterer = JetClusterer::new(settings);
        assert!(clusterer.execute(&sample(), &mut event));
        let rec = event.rec.unwrap();
        assert_eq!(rec.jets.len(), 2);
        let mut constituents = rec.jets[0].constituents.clone();
        constituents.sort();
        assert_eq!(constituents, [0, 1, 2]);
        assert_eq!(rec.jets[0].ntracks, 2);
        let mut constituents = rec.jets[1].constituents.clone();
        constituents.sort();
        assert_eq!(constituents, [3, 4]);
        assert_eq!(rec.jets[1].ntracks, 1);
        // the soft photon is promoted and never clustered
        assert!(rec.jets.iter().all(|j| !j.constituents.contains(&5)));
        for jet in &rec.jets {
            assert!(jet.ntracks as usize <= jet.constituents.len());
        }
    }

    #[test]
    fn exclusive_extraction() {
        log_init();
        let mut b = McEventBuilder::new();
        b.add_particle(ParticleID::new(211), 1, [0, 0], p(40., 1., 0.))
            .add_particle(ParticleID::new(-211), 1, [0, 0], p(-30., -1., 1.))
            .add_particle(ParticleID::new(111), 1, [0, 0], p(0., 5., 0.));
        let mc = b.build().unwrap();
        let settings = ClusteringSettingsBuilder::default()
            .algorithm(JetAlgorithm::Kt)
            .exclusive(true)
            .ptmin(10.)
            .build()
            .unwrap();
        let mut clusterer = JetClusterer::new(settings);
        let mut event = Event::from_mc(mc.clone());
        assert!(clusterer.execute(&sample(), &mut event));
        let rec = event.rec.unwrap();
        // the threshold is the merging distance: the soft hadron merges
        // with the beam at d = 25 > 10 and stays a jet
        assert_eq!(rec.jets.len(), 3);
        let mut constituents: Vec<_> =
            rec.jets.iter().flat_map(|j| j.constituents.clone()).collect();
        constituents.sort();
        assert_eq!(constituents, [0, 1, 2]);
        let tet: f64 = [40f64.hypot(1.), 30f64.hypot(1.), 5.].iter().sum();
        assert!((f64::from(rec.tet) - tet).abs() < 1e-9);

        let settings = ClusteringSettingsBuilder::default()
            .algorithm(JetAlgorithm::Kt)
            .exclusive(true)
            .ptmin(100.)
            .build()
            .unwrap();
        let mut clusterer = JetClusterer::new(settings);
        let mut event = Event::from_mc(mc);
        assert!(clusterer.execute(&sample(), &mut event));
        assert_eq!(event.rec.unwrap().jets.len(), 2);
    }

    // electron, photon, hadronic tau, and a charged pion
    fn identified_objects() -> McEvent {
        let mut b = McEventBuilder::new();
        b.add_particle(ParticleID::new(11), 1, [0, 0], p(30., 0., 10.))
            .add_particle(ParticleID::new(22), 1, [0, 0], p(0., 25., 0.))
            .add_particle(ParticleID::new(15), 2, [0, 0], p(-20., 0., 5.))
            .add_particle(ParticleID::new(-211), 1, [3, 0], p(-15., 0., 4.))
            .add_particle(ParticleID::new(16), 1, [3, 0], p(-5., 0., 1.))
            .add_particle(ParticleID::new(211), 1, [0, 0], p(0., -40., 0.));
        b.build().unwrap()
    }

    #[test]
    fn identified_objects_in_totals() {
        log_init();
        let mut event = Event::from_mc(identified_objects());
        let mut exclusive = JetClusterer::new(settings(true));
        assert!(exclusive.execute(&sample(), &mut event));
        let rec = event.rec.unwrap();
        assert_eq!(rec.electrons.len(), 1);
        assert_eq!(rec.photons.len(), 1);
        assert_eq!(rec.taus.len(), 1);
        assert_eq!(rec.jets.len(), 1);
        // identified objects enter MET and TET with their own momenta
        assert!((rec.met.px() - (-10.)).abs() < 1e-9);
        assert!((rec.met.py() - 15.).abs() < 1e-9);
        assert!((rec.tet - 115.).abs() < 1e-9);
        assert!((rec.tht - 40.).abs() < 1e-9);

        let mut event = Event::from_mc(identified_objects());
        let mut inclusive = JetClusterer::new(settings(false));
        assert!(inclusive.execute(&sample(), &mut event));
        let rec = event.rec.unwrap();
        assert_eq!(rec.taus.len(), 1);
        assert_eq!(rec.jets.len(), 4);
        // only the clustered particles contribute
        assert!((rec.met.px() - (-15.)).abs() < 1e-9);
        assert!((rec.met.py() - 15.).abs() < 1e-9);
        assert!((rec.tet - 110.).abs() < 1e-9);
        assert!((rec.tht - 110.).abs() < 1e-9);
    }

    #[test]
    fn without_mc() {
        let mut clusterer = JetClusterer::new(ClusteringSettings::default());
        let mut event = Event::new();
        assert!(!clusterer.execute(&sample(), &mut event));
        assert!(event.rec.is_none());

        let mut event = Event::from_mc(three_particles());
        assert!(!clusterer.execute(&Sample::default(), &mut event));
    }

    #[test]
    fn settings_from_yaml() {
        let yaml = "algorithm: kt\nradius: 1.0\nexclusive: true\nbtag:\n  efficiency: 0.7\n";
        let settings: ClusteringSettings = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(settings.algorithm, JetAlgorithm::Kt);
        assert_eq!(settings.radius, 1.);
        assert!(settings.exclusive);
        assert_eq!(settings.ptmin, 5.);
        assert_eq!(settings.btag.efficiency, 0.7);
        assert_eq!(settings.btag.matching_radius, 0.5);

        let bad: Result<ClusteringSettings, _> = serde_yaml::from_str("algorithm: siscone");
        assert!(bad.is_err());

        let out = serde_yaml::to_string(&settings).unwrap();
        assert!(out.contains("algorithm: kt"));
    }
}
