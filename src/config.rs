//! Run configuration
//!
//! The configuration is read once from TOML, validated, and treated as
//! read-only for the rest of the run.
use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::btag::{BTagThresholds, WorkingPoint};
use crate::error::ConfigError;

/// Primary datasets recorded by the detector rather than simulated
const DATA_STREAMS: [&str; 3] = ["SingleElectron", "SingleMuon", "JetHT"];

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Configuration {
    /// Event-level flag fields (non-zero means the event passed)
    pub filters: Vec<String>,
    /// Trigger decision fields
    pub triggers: Vec<String>,
    pub objects: Objects,
    pub btag: BTagConfig,
    pub sample: Sample,
    /// Metadata for known samples, keyed by primary dataset
    pub samples: BTreeMap<String, SampleMetadata>,
    pub weights: WeightFields,
    pub systematics: SystematicsConfig,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            filters: default_filters(),
            triggers: default_triggers(),
            objects: Objects::default(),
            btag: BTagConfig::default(),
            sample: Sample::default(),
            samples: BTreeMap::new(),
            weights: WeightFields::default(),
            systematics: SystematicsConfig::default(),
        }
    }
}

/// Which reconstruction stages run
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Objects {
    pub use_truth: bool,
    pub use_jets: bool,
    pub use_large_r_jets: bool,
    pub use_leptons: bool,
    pub use_neutrinos: bool,
    pub neutrino_reco: bool,
    pub resonance_reco: bool,
    pub dnn_inference: bool,
    pub dnn_training: bool,
}

impl Default for Objects {
    fn default() -> Self {
        Self {
            use_truth: false,
            use_jets: true,
            use_large_r_jets: false,
            use_leptons: true,
            use_neutrinos: true,
            neutrino_reco: false,
            resonance_reco: false,
            dnn_inference: false,
            dnn_training: false,
        }
    }
}

/// B-tagging discriminant thresholds and the default working point
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BTagConfig {
    pub loose: f64,
    pub medium: f64,
    pub tight: f64,
    pub working_point: String,
}

impl Default for BTagConfig {
    fn default() -> Self {
        Self {
            loose: 0.5426,
            medium: 0.8484,
            tight: 0.9535,
            working_point: "M".to_owned(),
        }
    }
}

/// The sample being processed
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Sample {
    pub primary_dataset: String,
    /// Overrides the detection from the primary dataset name
    pub is_mc: Option<bool>,
    pub xsection: Option<f64>,
    pub kfactor: Option<f64>,
    pub sum_of_weights: Option<f64>,
    pub luminosity: f64,
}

impl Default for Sample {
    fn default() -> Self {
        Self {
            primary_dataset: String::new(),
            is_mc: None,
            xsection: None,
            kfactor: None,
            sum_of_weights: None,
            luminosity: 1.,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SampleMetadata {
    pub xsection: f64,
    pub kfactor: f64,
    pub sum_of_weights: f64,
}

impl Default for SampleMetadata {
    fn default() -> Self {
        Self {
            xsection: 1.,
            kfactor: 1.,
            sum_of_weights: 1.,
        }
    }
}

/// Normalisation of simulated events to the integrated luminosity
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Normalisation {
    pub xsection: f64,
    pub kfactor: f64,
    pub sum_of_weights: f64,
    pub luminosity: f64,
}

impl Normalisation {
    /// xsection × k-factor × luminosity / sum of weights
    pub fn scale(&self) -> f64 {
        self.xsection * self.kfactor * self.luminosity / self.sum_of_weights
    }
}

impl Default for Normalisation {
    fn default() -> Self {
        Self {
            xsection: 1.,
            kfactor: 1.,
            sum_of_weights: 1.,
            luminosity: 1.,
        }
    }
}

/// Record fields holding per-event weights
///
/// Weights without a field are taken to be 1.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WeightFields {
    pub generator: Option<String>,
    pub pileup: Option<String>,
    pub btag: Option<String>,
}

/// Systematic variations stored as weights in the nominal records
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SystematicsConfig {
    /// Scalar weight systematics, each one a record field
    pub weight: Vec<String>,
    /// Vector weight systematics with their number of entries
    pub vectors: BTreeMap<String, usize>,
}

impl Configuration {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let s = std::fs::read_to_string(path)?;
        Self::from_toml_str(&s)
    }

    /// Check everything that can be checked without a record source
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.btag_thresholds()?;
        self.working_point()?;
        if self.is_mc() {
            let (norm, _) = self.resolve_normalisation();
            let sumw = norm.sum_of_weights;
            if sumw == 0. || !sumw.is_finite() {
                return Err(ConfigError::SumOfWeights(sumw));
            }
        }
        if self.objects.use_truth && !self.is_mc() {
            log::warn!(
                "Truth information requested for real data sample {}, disabling it",
                self.sample.primary_dataset
            );
        }
        Ok(())
    }

    pub fn btag_thresholds(&self) -> Result<BTagThresholds, ConfigError> {
        BTagThresholds::new(self.btag.loose, self.btag.medium, self.btag.tight)
    }

    pub fn working_point(&self) -> Result<WorkingPoint, ConfigError> {
        self.btag.working_point.parse()
    }

    /// Whether the sample is simulated
    pub fn is_mc(&self) -> bool {
        if let Some(is_mc) = self.sample.is_mc {
            return is_mc;
        }
        let pd = &self.sample.primary_dataset;
        !DATA_STREAMS.iter().any(|stream| pd.starts_with(stream))
    }

    /// Truth processing only makes sense for simulated samples
    pub fn use_truth(&self) -> bool {
        self.objects.use_truth && self.is_mc()
    }

    /// Metadata of a known sample
    pub fn sample_metadata(&self, name: &str) -> Option<&SampleMetadata> {
        self.samples.get(name)
    }

    /// Normalisation for the sample being processed
    ///
    /// Values given directly in `[sample]` take precedence over the
    /// `[samples]` table. Missing metadata is replaced by ones, with a
    /// warning.
    pub fn normalisation(&self) -> Normalisation {
        let (norm, found) = self.resolve_normalisation();
        if !found {
            log::warn!(
                "No metadata for sample {}, using cross section, k-factor and sum of weights of 1.0",
                self.sample.primary_dataset
            );
        }
        norm
    }

    /// Normalisation and whether all needed metadata was available
    fn resolve_normalisation(&self) -> (Normalisation, bool) {
        let sample = &self.sample;
        let needs_table =
            sample.xsection.is_none() || sample.kfactor.is_none() || sample.sum_of_weights.is_none();
        let (meta, found) = match self.sample_metadata(&sample.primary_dataset) {
            Some(meta) => (*meta, true),
            None => (SampleMetadata::default(), !needs_table),
        };
        let norm = Normalisation {
            xsection: sample.xsection.unwrap_or(meta.xsection),
            kfactor: sample.kfactor.unwrap_or(meta.kfactor),
            sum_of_weights: sample.sum_of_weights.unwrap_or(meta.sum_of_weights),
            luminosity: sample.luminosity,
        };
        (norm, found)
    }

    /// Names of the declared scalar weight systematics
    ///
    /// Lepton scale factor variations are only meaningful if leptons
    /// are reconstructed.
    pub fn weight_systematics(&self) -> impl Iterator<Item = &str> {
        let use_leptons = self.objects.use_leptons;
        self.systematics
            .weight
            .iter()
            .map(String::as_str)
            .filter(move |name| use_leptons || !name.contains("leptonSF"))
    }
}

fn default_filters() -> Vec<String> {
    [
        "Flag_goodVertices",
        "Flag_eeBadScFilter",
        "Flag_HBHENoiseFilter",
        "Flag_HBHENoiseIsoFilter",
        "Flag_globalTightHalo2016Filter",
        "Flag_EcalDeadCellTriggerPrimitiveFilter",
    ]
    .map(str::to_owned)
    .to_vec()
}

fn default_triggers() -> Vec<String> {
    [
        "HLT_Ele45_CaloIdVT_GsfTrkIdT_PFJet200_PFJet50",
        "HLT_Ele50_CaloIdVT_GsfTrkIdT_PFJet165",
        "HLT_Ele115_CaloIdVT_GsfTrkIdT",
        "HLT_Mu40_Eta2P1_PFJet200_PFJet50",
        "HLT_Mu50",
        "HLT_TkMu50",
        "HLT_PFHT800",
        "HLT_PFHT900",
        "HLT_AK8PFJet450",
        "HLT_PFHT700TrimMass50",
        "HLT_PFJet360TrimMass30",
    ]
    .map(str::to_owned)
    .to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
filters = ["Flag_goodVertices"]

[objects]
use_large_r_jets = true
neutrino_reco = true

[btag]
working_point = "tight"

[sample]
primary_dataset = "TTJets"
luminosity = 35900.0

[samples.TTJets]
xsection = 831.76
kfactor = 1.0
sum_of_weights = 77081156.0

[systematics]
weight = ["weight_pileup_UP", "leptonSF_UP"]
vectors = { bTagSF_eigen = 3 }
"#;

    #[test]
    fn parse_and_fill_defaults() {
        let config = Configuration::from_toml_str(CONFIG).unwrap();
        config.validate().unwrap();
        assert_eq!(config.filters, ["Flag_goodVertices"]);
        assert_eq!(config.triggers.len(), 11);
        assert!(config.objects.use_jets);
        assert!(config.objects.use_large_r_jets);
        assert_eq!(config.working_point().unwrap(), WorkingPoint::Tight);
        assert!(config.is_mc());
        let norm = config.normalisation();
        assert_eq!(norm.xsection, 831.76);
        assert_eq!(norm.luminosity, 35900.);
        assert_eq!(config.systematics.vectors["bTagSF_eigen"], 3);
    }

    #[test]
    fn empty_flag_lists_are_kept() {
        let config = Configuration::from_toml_str("filters = []\ntriggers = []").unwrap();
        assert!(config.filters.is_empty());
        assert!(config.triggers.is_empty());

        let config = Configuration::from_toml_str("").unwrap();
        assert_eq!(config.filters, default_filters());
        assert_eq!(config.triggers, default_triggers());
    }

    #[test]
    fn metadata_lookup() {
        let config = Configuration::from_toml_str(CONFIG).unwrap();
        assert!(config.sample_metadata("TTJets").is_some());
        assert!(config.sample_metadata("WJets").is_none());

        let unlisted =
            Configuration::from_toml_str("[sample]\nprimary_dataset = \"WJets\"").unwrap();
        let (norm, found) = unlisted.resolve_normalisation();
        assert!(!found);
        assert_eq!(norm.scale(), 1.);
    }

    #[test]
    fn data_streams_are_not_simulated() {
        let config = Configuration::from_toml_str(
            "[objects]\nuse_truth = true\n[sample]\nprimary_dataset = \"SingleMuon\"",
        )
        .unwrap();
        assert!(!config.is_mc());
        assert!(!config.use_truth());
        config.validate().unwrap();
    }

    #[test]
    fn unordered_thresholds_are_fatal() {
        let config =
            Configuration::from_toml_str("[btag]\nloose = 0.9\nmedium = 0.5\ntight = 0.95")
                .unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::BTagOrder { .. })
        ));
    }

    #[test]
    fn unknown_working_point_is_fatal() {
        let config = Configuration::from_toml_str("[btag]\nworking_point = \"XT\"").unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnknownWorkingPoint(wp)) if wp == "XT"
        ));
    }

    #[test]
    fn zero_sum_of_weights_is_fatal() {
        let config = Configuration::from_toml_str("[sample]\nsum_of_weights = 0.0").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::SumOfWeights(_))));
    }

    #[test]
    fn lepton_systematics_need_leptons() {
        let config = Configuration::from_toml_str(
            "[objects]\nuse_leptons = false\n[systematics]\nweight = [\"pileup_UP\", \"leptonSF_DN\"]",
        )
        .unwrap();
        assert_eq!(config.weight_systematics().collect::<Vec<_>>(), ["pileup_UP"]);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(matches!(
            Configuration::from_toml_str("[objects]\nuse_jetz = true"),
            Err(ConfigError::Parse(_))
        ));
    }
}
