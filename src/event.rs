use ahash::AHashMap;
use itertools::Itertools;

use crate::btag::{BTaggedJets, BTagger, WorkingPoint};
use crate::config::{Configuration, Objects};
use crate::dnn::{infer, training_sample, NeutrinoScorer};
use crate::error::{ConfigError, Error, ReadError};
use crate::jets::{build_jets, build_large_r_jets, SmallRJets, JET_FIELDS, LARGE_R_JET_FIELDS};
use crate::kinematics::{build_met, Kinematics, MET_FIELDS};
use crate::leptons::{build_leptons, ELECTRON_FIELDS, MUON_FIELDS};
use crate::neutrino::{build_neutrinos, NeutrinoSolver};
use crate::objects::{Jet, Lepton, Met, Neutrino, Parton, Resonance};
use crate::record::{Record, RecordSource};
use crate::resonance::{reconstruct_resonances, ResonanceCandidates, ResonanceReconstructor};
use crate::truth::{build_partons, TruthMatcher, TRUTH_FIELDS};
use crate::weights::{EventWeights, Systematic, WeightModel};

const ID_FIELDS: [&str; 3] = ["eventNumber", "runNumber", "lumiblock"];

/// External reconstruction tools
///
/// Each tool is only needed if the corresponding stage is enabled.
#[derive(Default)]
pub struct Tools {
    pub neutrino_solver: Option<Box<dyn NeutrinoSolver>>,
    pub resonance_reconstructor: Option<Box<dyn ResonanceReconstructor>>,
    /// Optional even with truth enabled, large-radius jets are then
    /// left unmatched
    pub truth_matcher: Option<Box<dyn TruthMatcher>>,
    pub neutrino_scorer: Option<Box<dyn NeutrinoScorer>>,
}

impl Tools {
    pub fn with_neutrino_solver(mut self, solver: impl NeutrinoSolver + 'static) -> Self {
        self.neutrino_solver = Some(Box::new(solver));
        self
    }

    pub fn with_resonance_reconstructor(
        mut self,
        reco: impl ResonanceReconstructor + 'static,
    ) -> Self {
        self.resonance_reconstructor = Some(Box::new(reco));
        self
    }

    pub fn with_truth_matcher(mut self, matcher: impl TruthMatcher + 'static) -> Self {
        self.truth_matcher = Some(Box::new(matcher));
        self
    }

    pub fn with_neutrino_scorer(mut self, scorer: impl NeutrinoScorer + 'static) -> Self {
        self.neutrino_scorer = Some(Box::new(scorer));
        self
    }
}

/// Per-record reconstruction for a fixed configuration
pub struct Reconstruction {
    config: Configuration,
    stages: Objects,
    btagger: BTagger,
    weights: WeightModel,
    tools: Tools,
}

impl Reconstruction {
    /// Validate the configuration and check that every enabled stage
    /// has its tool
    pub fn new(config: Configuration, tools: Tools) -> Result<Self, ConfigError> {
        config.validate()?;
        let btagger = BTagger::new(config.btag_thresholds()?, config.working_point()?);
        let mut stages = config.objects;
        stages.use_truth = config.use_truth();

        let missing = |stage, tool| Err(ConfigError::MissingTool { stage, tool });
        if stages.use_neutrinos && stages.neutrino_reco && tools.neutrino_solver.is_none() {
            return missing("Neutrino reconstruction", "NeutrinoSolver");
        }
        if stages.resonance_reco && tools.resonance_reconstructor.is_none() {
            return missing("Resonance reconstruction", "ResonanceReconstructor");
        }
        if (stages.dnn_inference || stages.dnn_training) && tools.neutrino_scorer.is_none() {
            return missing("Neutrino classification", "NeutrinoScorer");
        }
        if stages.dnn_training && !stages.dnn_inference && !stages.use_truth {
            log::warn!("Classifier training needs truth information, no training inputs will be produced");
        }

        let weights = WeightModel::new(&config);
        Ok(Self {
            config,
            stages,
            btagger,
            weights,
            tools,
        })
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Enabled stages, with truth disabled for real data
    pub fn stages(&self) -> &Objects {
        &self.stages
    }

    /// The declared weight systematics
    pub fn systematics(&self) -> &[Systematic] {
        self.weights.systematics()
    }

    /// Record fields needed by the enabled stages
    pub fn required_fields(&self) -> Vec<&str> {
        let stages = &self.stages;
        let mut fields: Vec<&str> = ID_FIELDS.to_vec();
        fields.extend(self.config.filters.iter().map(String::as_str));
        fields.extend(self.config.triggers.iter().map(String::as_str));
        fields.extend(MET_FIELDS);
        if stages.use_truth {
            fields.extend(TRUTH_FIELDS);
        }
        if stages.use_jets {
            fields.extend(JET_FIELDS);
        }
        if stages.use_large_r_jets {
            fields.extend(LARGE_R_JET_FIELDS);
        }
        if stages.use_leptons {
            fields.extend(MUON_FIELDS);
            fields.extend(ELECTRON_FIELDS);
        }
        fields.extend(self.weights.required_fields());
        fields.into_iter().unique().collect()
    }

    /// Check that a source provides all required fields
    ///
    /// All missing fields are reported at once.
    pub fn check_fields(&self, source: &impl RecordSource) -> Result<(), ConfigError> {
        self.check_with(|field| source.has_field(field))
    }

    /// Check that a single record provides all required fields
    pub fn check_record(&self, record: &Record) -> Result<(), ConfigError> {
        self.check_with(|field| record.contains(field))
    }

    fn check_with(&self, has_field: impl Fn(&str) -> bool) -> Result<(), ConfigError> {
        let missing: Vec<_> = self
            .required_fields()
            .into_iter()
            .filter(|field| !has_field(field))
            .map(str::to_owned)
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::MissingFields(missing))
        }
    }

    /// Open a processing session over all records of a source
    pub fn session<'a, S: RecordSource>(
        &'a self,
        source: &'a mut S,
    ) -> Result<Session<'a, S>, ConfigError> {
        Session::open(self, source)
    }

    /// Reconstruct all objects of a single record
    pub fn build_record(&self, entry: usize, record: &Record) -> Result<RecordState, ReadError> {
        let stages = &self.stages;

        let weights = self.weights.weights(record)?;
        log::debug!("Record {entry}: nominal weight {}", weights.nominal());

        let filters = read_flags(record, &self.config.filters)?;
        let triggers = read_flags(record, &self.config.triggers)?;
        let event_number = record.int("eventNumber")?;
        let run_number = record.int("runNumber")?;
        let lumiblock = record.int("lumiblock")?;
        log::debug!("Record {entry}: event {event_number}, run {run_number}, lumiblock {lumiblock}");

        let partons = if stages.use_truth {
            build_partons(record)?
        } else {
            Vec::new()
        };
        log::debug!("Record {entry}: {} truth partons", partons.len());

        let SmallRJets {
            jets,
            iso_jets,
            btagged,
        } = if stages.use_jets {
            build_jets(record, &self.btagger)?
        } else {
            SmallRJets::default()
        };
        log::debug!(
            "Record {entry}: {} jets, {} isolation jets, {} b-tagged",
            jets.len(),
            iso_jets.len(),
            btagged.get(self.btagger.default_wp).len()
        );

        let large_r_jets = if stages.use_large_r_jets {
            let matcher = self.tools.truth_matcher.as_deref().filter(|_| stages.use_truth);
            build_large_r_jets(record, matcher, &partons)?
        } else {
            Vec::new()
        };
        log::debug!("Record {entry}: {} large-R jets", large_r_jets.len());

        let leptons = if stages.use_leptons {
            build_leptons(record, &iso_jets)?
        } else {
            Vec::new()
        };
        log::debug!("Record {entry}: {} leptons", leptons.len());

        let met = build_met(record, &leptons)?;
        let kinematics = Kinematics::new(
            stages.use_jets,
            &jets,
            &large_r_jets,
            stages.use_leptons,
            &leptons,
            &met,
        )
        .with_stored_ht(record)?;
        log::debug!(
            "Record {entry}: MET {}, HT {}, ST {}",
            met.p.pt(),
            kinematics.ht,
            kinematics.st
        );

        let solver = self
            .tools
            .neutrino_solver
            .as_deref()
            .filter(|_| stages.use_neutrinos && stages.neutrino_reco);
        let mut neutrinos = build_neutrinos(solver, &leptons, &met);
        log::debug!("Record {entry}: neutrino pz {}", neutrinos[0].p.pz());

        let default_btagged = btagged.get(self.btagger.default_wp);
        let resonances = match self.tools.resonance_reconstructor.as_deref() {
            Some(reco) if stages.resonance_reco => {
                reconstruct_resonances(reco, &leptons, &neutrinos, &jets, default_btagged)
            }
            _ => None,
        };
        log::debug!("Record {entry}: resonance reconstructed: {}", resonances.is_some());

        let mut dnn_features = None;
        let mut true_neutrino = None;
        if let Some(scorer) = self.tools.neutrino_scorer.as_deref() {
            if stages.dnn_inference {
                dnn_features = infer(scorer, &mut neutrinos, &met, &leptons, &jets);
            } else if stages.dnn_training && stages.use_truth {
                if let Some(sample) =
                    training_sample(scorer, &neutrinos, &met, &leptons, &jets, &partons)
                {
                    true_neutrino = Some(sample.true_neutrino);
                    dnn_features = Some(sample.features);
                }
            }
        }
        log::debug!("Record {entry}: classifier features: {}", dnn_features.is_some());

        Ok(RecordState {
            entry,
            event_number,
            run_number,
            lumiblock,
            filters,
            triggers,
            partons,
            jets,
            iso_jets,
            btagged,
            default_wp: self.btagger.default_wp,
            large_r_jets,
            leptons,
            met,
            kinematics,
            neutrinos,
            resonances,
            true_neutrino,
            dnn_features,
            weights,
        })
    }
}

/// Flag fields, any non-zero value counts as passed
fn read_flags(record: &Record, names: &[String]) -> Result<AHashMap<String, bool>, ReadError> {
    names
        .iter()
        .map(|name| Ok((name.clone(), record.flag(name)?)))
        .collect()
}

/// Reconstructed objects of a single record
///
/// Built in one go by [`Reconstruction::build_record`] and immutable
/// afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordState {
    entry: usize,
    event_number: i64,
    run_number: i64,
    lumiblock: i64,
    filters: AHashMap<String, bool>,
    triggers: AHashMap<String, bool>,
    partons: Vec<Parton>,
    jets: Vec<Jet>,
    iso_jets: Vec<Jet>,
    btagged: BTaggedJets,
    default_wp: WorkingPoint,
    large_r_jets: Vec<Jet>,
    leptons: Vec<Lepton>,
    met: Met,
    kinematics: Kinematics,
    neutrinos: Vec<Neutrino>,
    resonances: Option<ResonanceCandidates>,
    true_neutrino: Option<Parton>,
    dnn_features: Option<AHashMap<String, f64>>,
    weights: EventWeights,
}

impl RecordState {
    /// Entry number in the record source
    pub fn entry(&self) -> usize {
        self.entry
    }

    pub fn event_number(&self) -> i64 {
        self.event_number
    }

    pub fn run_number(&self) -> i64 {
        self.run_number
    }

    pub fn lumiblock(&self) -> i64 {
        self.lumiblock
    }

    pub fn filters(&self) -> &AHashMap<String, bool> {
        &self.filters
    }

    pub fn triggers(&self) -> &AHashMap<String, bool> {
        &self.triggers
    }

    /// Generator-level particles, empty unless truth is enabled
    pub fn partons(&self) -> &[Parton] {
        &self.partons
    }

    pub fn jets(&self) -> &[Jet] {
        &self.jets
    }

    /// Jets used as reference for lepton isolation
    pub fn iso_jets(&self) -> &[Jet] {
        &self.iso_jets
    }

    pub fn large_r_jets(&self) -> &[Jet] {
        &self.large_r_jets
    }

    /// Muons followed by electrons
    pub fn leptons(&self) -> &[Lepton] {
        &self.leptons
    }

    pub fn muons(&self) -> impl Iterator<Item = &Lepton> {
        self.leptons.iter().filter(|l| l.is_muon())
    }

    pub fn electrons(&self) -> impl Iterator<Item = &Lepton> {
        self.leptons.iter().filter(|l| l.is_electron())
    }

    pub fn met(&self) -> &Met {
        &self.met
    }

    pub fn kinematics(&self) -> &Kinematics {
        &self.kinematics
    }

    pub fn ht(&self) -> f64 {
        self.kinematics.ht
    }

    pub fn st(&self) -> f64 {
        self.kinematics.st
    }

    /// Never empty
    pub fn neutrinos(&self) -> &[Neutrino] {
        &self.neutrinos
    }

    /// Resonance candidates, if the reconstruction was attempted
    pub fn resonances(&self) -> Option<&ResonanceCandidates> {
        self.resonances.as_ref()
    }

    /// Resonance from the standard neutrino solution
    pub fn resonance(&self) -> Resonance {
        self.resonances.map(|r| r.standard).unwrap_or_default()
    }

    /// Resonance from the sampling neutrino solution
    pub fn resonance_sampling(&self) -> Resonance {
        self.resonances.map(|r| r.sampling).unwrap_or_default()
    }

    /// Generator-level neutrino selected for classifier training
    pub fn true_neutrino(&self) -> Option<&Parton> {
        self.true_neutrino.as_ref()
    }

    pub fn dnn_features(&self) -> Option<&AHashMap<String, f64>> {
        self.dnn_features.as_ref()
    }

    pub fn weights(&self) -> &EventWeights {
        &self.weights
    }

    pub fn nominal_weight(&self) -> f64 {
        self.weights.nominal()
    }

    /// Event weight for a systematic variation, see
    /// [`EventWeights::for_systematic`]
    pub fn syst_weight(&self, syst: &Systematic, weight_index: Option<usize>) -> f64 {
        self.weights.for_systematic(syst, weight_index)
    }

    pub fn weight_for_name(&self, name: &str, weight_index: Option<usize>) -> f64 {
        self.weights.weight_for_name(name, weight_index)
    }

    /// Indices of the jets b-tagged at the given working point
    pub fn btag_jets(&self, wp: WorkingPoint) -> &[usize] {
        self.btagged.get(wp)
    }

    pub fn btag_jets_default(&self) -> &[usize] {
        self.btagged.get(self.default_wp)
    }

    /// B-tagged jets for a working point given by name
    ///
    /// Unknown names fall back to the default working point.
    pub fn btag_jets_named(&self, wp: &str) -> &[usize] {
        match wp.parse() {
            Ok(wp) => self.btag_jets(wp),
            Err(err) => {
                log::warn!("{err}, using default working point {}", self.default_wp);
                self.weights.report();
                self.btag_jets_default()
            }
        }
    }

    /// Number of recoverable anomalies reported for this record
    pub fn anomalies(&self) -> usize {
        self.weights.anomalies()
    }
}

/// Processing session over a record source
///
/// The source is borrowed for the lifetime of the session and released
/// when the session is dropped.
pub struct Session<'a, S: RecordSource> {
    reco: &'a Reconstruction,
    source: &'a mut S,
    entry: usize,
}

impl<'a, S: RecordSource> Session<'a, S> {
    /// Check that the source provides all fields needed by the enabled
    /// stages
    pub fn open(
        reco: &'a Reconstruction,
        source: &'a mut S,
    ) -> Result<Self, ConfigError> {
        reco.check_fields(&*source)?;
        let stages = &reco.stages;
        log::info!(
            "Processing {} records (truth: {}, jets: {}, large-R jets: {}, leptons: {}, neutrinos: {}, resonances: {}, classifier: {})",
            source.len(),
            stages.use_truth,
            stages.use_jets,
            stages.use_large_r_jets,
            stages.use_leptons,
            stages.use_neutrinos && stages.neutrino_reco,
            stages.resonance_reco,
            stages.dnn_inference || stages.dnn_training,
        );
        Ok(Self {
            reco,
            source,
            entry: 0,
        })
    }

    /// Entry number of the next record
    pub fn entry(&self) -> usize {
        self.entry
    }
}

impl<'a, S: RecordSource> Iterator for Session<'a, S> {
    type Item = Result<RecordState, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.entry >= self.source.len() {
            return None;
        }
        let entry = self.entry;
        self.entry += 1;
        let state = self
            .source
            .read(entry)
            .and_then(|record| self.reco.build_record(entry, &record));
        Some(state.map_err(Into::into))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.source.len().saturating_sub(self.entry);
        (remaining, Some(remaining))
    }
}
