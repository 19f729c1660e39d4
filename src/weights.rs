//! Event weights and their systematic variations
use std::fmt::{self, Display};
use std::sync::atomic::{AtomicUsize, Ordering};

use ahash::AHashMap;

use crate::config::{Configuration, Normalisation, WeightFields};
use crate::error::ReadError;
use crate::record::Record;

/// A weight systematic, classified by its name
///
/// Names are matched in order: exactly `nominal`, then names containing
/// `pileup`, `leptonSF`, and `bTagSF`. Anything else is unknown.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum Systematic {
    Nominal,
    Pileup(String),
    LeptonSF(String),
    BTagSF(String),
    Unknown(String),
}

impl Systematic {
    pub fn resolve(name: &str) -> Self {
        if name == "nominal" {
            Self::Nominal
        } else if name.contains("pileup") {
            Self::Pileup(name.to_owned())
        } else if name.contains("leptonSF") {
            Self::LeptonSF(name.to_owned())
        } else if name.contains("bTagSF") {
            Self::BTagSF(name.to_owned())
        } else {
            Self::Unknown(name.to_owned())
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Nominal => "nominal",
            Self::Pileup(name)
            | Self::LeptonSF(name)
            | Self::BTagSF(name)
            | Self::Unknown(name) => name,
        }
    }

    /// Whether the weight needs a per-event input named like the systematic
    fn has_input(&self) -> bool {
        matches!(self, Self::Pileup(_) | Self::LeptonSF(_))
    }
}

impl From<&str> for Systematic {
    fn from(name: &str) -> Self {
        Self::resolve(name)
    }
}

impl Display for Systematic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Sample-wide weighting setup
#[derive(Clone, Debug, PartialEq)]
pub struct WeightModel {
    is_mc: bool,
    normalisation: Normalisation,
    fields: WeightFields,
    systematics: Vec<Systematic>,
    vectors: Vec<(String, usize)>,
}

impl WeightModel {
    /// Resolve the declared systematics of a validated configuration
    pub fn new(config: &Configuration) -> Self {
        let is_mc = config.is_mc();
        let systematics: Vec<_> = config.weight_systematics().map(Systematic::resolve).collect();
        for syst in &systematics {
            if let Systematic::Unknown(name) = syst {
                log::warn!("Unsupported weight systematic {name}, its weight will be 1.0");
            }
        }
        Self {
            is_mc,
            normalisation: if is_mc {
                config.normalisation()
            } else {
                Normalisation::default()
            },
            fields: config.weights.clone(),
            systematics,
            vectors: config
                .systematics
                .vectors
                .iter()
                .map(|(name, len)| (name.clone(), *len))
                .collect(),
        }
    }

    pub fn systematics(&self) -> &[Systematic] {
        &self.systematics
    }

    pub fn normalisation(&self) -> &Normalisation {
        &self.normalisation
    }

    /// Record fields read by [`WeightModel::weights`]
    pub(crate) fn required_fields(&self) -> Vec<&str> {
        if !self.is_mc {
            return Vec::new();
        }
        let WeightFields {
            generator,
            pileup,
            btag,
        } = &self.fields;
        [generator, pileup, btag]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .chain(
                self.systematics
                    .iter()
                    .filter(|syst| syst.has_input())
                    .map(Systematic::name),
            )
            .chain(self.vectors.iter().map(|(name, _)| name.as_str()))
            .collect()
    }

    /// Read the weights of one record
    pub fn weights(&self, record: &Record) -> Result<EventWeights, ReadError> {
        if !self.is_mc {
            return Ok(EventWeights {
                normalisation: self.normalisation,
                ..Default::default()
            });
        }
        let read = |field: &Option<String>| match field {
            Some(name) => record.float(name),
            None => Ok(1.),
        };
        let generator = read(&self.fields.generator)?;
        let pileup = read(&self.fields.pileup)?;
        let btag_default = read(&self.fields.btag)?;

        let mut syst_floats = AHashMap::new();
        for syst in self.systematics.iter().filter(|syst| syst.has_input()) {
            let name = syst.name();
            syst_floats.insert(name.to_owned(), record.float(name)?);
        }
        let mut syst_vectors = AHashMap::new();
        for (name, len) in &self.vectors {
            let values = record.aligned_floats("systematic", name, *len)?;
            syst_vectors.insert(name.clone(), values.to_vec());
        }

        Ok(EventWeights {
            nominal: self.normalisation.scale() * generator * pileup,
            generator,
            pileup,
            btag_default,
            normalisation: self.normalisation,
            syst_floats,
            syst_vectors,
            anomalies: AnomalyCount::default(),
        })
    }
}

/// Counter of recoverable anomalies
///
/// Bookkeeping only, it never takes part in comparisons.
#[derive(Debug, Default)]
struct AnomalyCount(AtomicUsize);

impl Clone for AnomalyCount {
    fn clone(&self) -> Self {
        Self(AtomicUsize::new(self.0.load(Ordering::Relaxed)))
    }
}

impl PartialEq for AnomalyCount {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

/// Weights of a single record
#[derive(Clone, Debug, PartialEq)]
pub struct EventWeights {
    nominal: f64,
    generator: f64,
    pileup: f64,
    btag_default: f64,
    normalisation: Normalisation,
    syst_floats: AHashMap<String, f64>,
    syst_vectors: AHashMap<String, Vec<f64>>,
    anomalies: AnomalyCount,
}

impl Default for EventWeights {
    fn default() -> Self {
        Self {
            nominal: 1.,
            generator: 1.,
            pileup: 1.,
            btag_default: 1.,
            normalisation: Normalisation::default(),
            syst_floats: AHashMap::new(),
            syst_vectors: AHashMap::new(),
            anomalies: AnomalyCount::default(),
        }
    }
}

impl EventWeights {
    pub fn nominal(&self) -> f64 {
        self.nominal
    }

    pub fn generator(&self) -> f64 {
        self.generator
    }

    pub fn pileup(&self) -> f64 {
        self.pileup
    }

    /// Scale-factor weight of the default b-tagging working point
    pub fn btag_default(&self) -> f64 {
        self.btag_default
    }

    /// Entry of a vector systematic
    pub fn vector_input(&self, name: &str, index: usize) -> Option<f64> {
        self.syst_vectors.get(name)?.get(index).copied()
    }

    /// Number of recoverable anomalies reported so far
    pub fn anomalies(&self) -> usize {
        self.anomalies.0.load(Ordering::Relaxed)
    }

    pub(crate) fn report(&self) {
        self.anomalies.0.fetch_add(1, Ordering::Relaxed);
    }

    fn input(&self, name: &str) -> f64 {
        match self.syst_floats.get(name) {
            Some(w) => *w,
            None => {
                log::warn!("No per-event input for systematic {name}, using 1.0");
                self.report();
                1.
            }
        }
    }

    /// Event weight for the given systematic
    ///
    /// Only meaningful for the nominal record and for weight
    /// systematics. `weight_index` selects the entry of vector
    /// systematics and is currently not used by any variation.
    pub fn for_systematic(&self, syst: &Systematic, weight_index: Option<usize>) -> f64 {
        let scale = self.normalisation.scale();
        match syst {
            Systematic::Nominal => self.nominal,
            Systematic::Pileup(name) => {
                self.generator * self.btag_default * scale * self.input(name)
            }
            Systematic::LeptonSF(name) => {
                self.pileup * self.generator * self.btag_default * scale * self.input(name)
            }
            Systematic::BTagSF(_) => {
                // TODO: scale by the eigenvector entry at `weight_index`
                let _ = weight_index;
                self.pileup * self.generator * scale
            }
            Systematic::Unknown(name) => {
                log::warn!("Unexpected systematic variation {name}, returning a weight of 1.0");
                self.report();
                1.
            }
        }
    }

    /// Event weight for a systematic given by name
    pub fn weight_for_name(&self, name: &str, weight_index: Option<usize>) -> f64 {
        self.for_systematic(&Systematic::resolve(name), weight_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const CONFIG: &str = r#"
[sample]
primary_dataset = "TTJets"
xsection = 2.0
kfactor = 1.0
sum_of_weights = 5.0
luminosity = 10.0

[systematics]
weight = ["weight_pileup_UP", "leptonSF_UP", "bTagSF_UP", "jvt_UP"]
vectors = { bTagSF_eigen = 2 }
"#;

    fn model() -> WeightModel {
        WeightModel::new(&Configuration::from_toml_str(CONFIG).unwrap())
    }

    fn record() -> Record {
        Record::new()
            .with("weight_pileup_UP", 0.9)
            .with("leptonSF_UP", 1.1)
            .with("bTagSF_eigen", vec![1.02, 0.98])
    }

    #[test]
    fn resolve_names() {
        assert_eq!(Systematic::resolve("nominal"), Systematic::Nominal);
        assert!(matches!(
            Systematic::resolve("weight_pileup_DOWN"),
            Systematic::Pileup(_)
        ));
        assert!(matches!(
            Systematic::resolve("leptonSF_DOWN"),
            Systematic::LeptonSF(_)
        ));
        assert!(matches!(
            Systematic::resolve("bTagSF_eigen"),
            Systematic::BTagSF(_)
        ));
        assert!(matches!(
            Systematic::resolve("nominal_old"),
            Systematic::Unknown(_)
        ));
        assert_eq!(Systematic::resolve("leptonSF_UP").to_string(), "leptonSF_UP");
    }

    #[test]
    fn declared_inputs_are_required() {
        let model = model();
        assert_eq!(
            model.required_fields(),
            ["weight_pileup_UP", "leptonSF_UP", "bTagSF_eigen"]
        );
        assert_eq!(model.systematics().len(), 4);
    }

    #[test]
    fn systematic_weights() {
        let w = model().weights(&record()).unwrap();
        assert_relative_eq!(w.nominal(), 4.);
        assert_relative_eq!(w.weight_for_name("nominal", None), 4.);
        assert_relative_eq!(w.weight_for_name("leptonSF_UP", None), 4.4, max_relative = 1e-12);
        assert_relative_eq!(w.weight_for_name("weight_pileup_UP", None), 3.6, max_relative = 1e-12);
        assert_relative_eq!(w.weight_for_name("bTagSF_eigen", Some(1)), 4.);
        assert_eq!(w.vector_input("bTagSF_eigen", 1), Some(0.98));
        assert_eq!(w.anomalies(), 0);
    }

    #[test]
    fn factors_per_variation() {
        let config = format!(
            "{CONFIG}\n[weights]\ngenerator = \"genWeight\"\npileup = \"puWeight\"\nbtag = \"btagWeight\"\n"
        );
        let model = WeightModel::new(&Configuration::from_toml_str(&config).unwrap());
        let record = record()
            .with("genWeight", 2.)
            .with("puWeight", 3.)
            .with("btagWeight", 5.);
        let w = model.weights(&record).unwrap();
        // scale = 2 * 1 * 10 / 5
        assert_relative_eq!(w.nominal(), 4. * 2. * 3.);
        assert_relative_eq!(
            w.weight_for_name("weight_pileup_UP", None),
            2. * 5. * 4. * 0.9,
            max_relative = 1e-12
        );
        assert_relative_eq!(
            w.weight_for_name("leptonSF_UP", None),
            3. * 2. * 5. * 4. * 1.1,
            max_relative = 1e-12
        );
        assert_relative_eq!(w.weight_for_name("bTagSF_eigen", Some(0)), 3. * 2. * 4.);
        assert_eq!(w.anomalies(), 0);
    }

    #[test]
    fn unknown_systematic_is_reported_once() {
        let w = model().weights(&record()).unwrap();
        assert_eq!(w.weight_for_name("bogusSyst", None), 1.);
        assert_eq!(w.anomalies(), 1);
    }

    #[test]
    fn anomalies_do_not_change_the_weights() {
        let w = model().weights(&record()).unwrap();
        let reported = w.clone();
        reported.weight_for_name("bogusSyst", None);
        assert_eq!(reported.anomalies(), 1);
        assert_eq!(w.anomalies(), 0);
        assert_eq!(w, reported);
    }

    #[test]
    fn missing_input_falls_back() {
        let w = model().weights(&record()).unwrap();
        assert_relative_eq!(w.weight_for_name("leptonSF_DOWN", None), 4.);
        assert_eq!(w.anomalies(), 1);
    }

    #[test]
    fn real_data_has_unit_weight() {
        let config = Configuration::from_toml_str(
            "[sample]\nprimary_dataset = \"SingleElectron\"\n[systematics]\nweight = [\"leptonSF_UP\"]",
        )
        .unwrap();
        let model = WeightModel::new(&config);
        assert!(model.required_fields().is_empty());
        let w = model.weights(&Record::new()).unwrap();
        assert_eq!(w.nominal(), 1.);
    }

    #[test]
    fn wrong_vector_length_is_fatal() {
        let record = record().with("bTagSF_eigen", vec![1.]);
        assert!(matches!(
            model().weights(&record),
            Err(ReadError::LengthMismatch { .. })
        ));
    }
}
