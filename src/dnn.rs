//! Neutrino classifier hooks
use ahash::AHashMap;

use crate::objects::{Jet, Lepton, Met, Neutrino, Parton};
use crate::truth::w_neutrinos;

/// Objects handed to the neutrino classifier
#[derive(Copy, Clone, Debug)]
pub struct ScorerInputs<'a> {
    pub neutrino: &'a Neutrino,
    pub met: &'a Met,
    pub lepton: &'a Lepton,
    pub jets: &'a [Jet],
    /// Generator-level neutrino, only set when preparing training data
    pub true_neutrino: Option<&'a Parton>,
}

/// External classifier scoring the reconstructed neutrino
pub trait NeutrinoScorer {
    fn predict(&self, inputs: ScorerInputs<'_>) -> f64;

    /// Input features of the classifier
    fn features(&self, _inputs: ScorerInputs<'_>) -> AHashMap<String, f64> {
        AHashMap::new()
    }
}

/// Score the leading neutrino
///
/// Returns the classifier features if there is at least one neutrino
/// and one lepton.
pub fn infer(
    scorer: &dyn NeutrinoScorer,
    neutrinos: &mut [Neutrino],
    met: &Met,
    leptons: &[Lepton],
    jets: &[Jet],
) -> Option<AHashMap<String, f64>> {
    let lepton = leptons.first()?;
    let neutrino = neutrinos.first_mut()?;
    let inputs = ScorerInputs {
        neutrino: &*neutrino,
        met,
        lepton,
        jets,
        true_neutrino: None,
    };
    let score = scorer.predict(inputs);
    let features = scorer.features(inputs);
    log::debug!("Neutrino score: {score}");
    neutrino.score = Some(score);
    Some(features)
}

/// Training inputs of the neutrino classifier
#[derive(Clone, Debug, PartialEq)]
pub struct TrainingSample {
    pub true_neutrino: Parton,
    pub features: AHashMap<String, f64>,
}

/// Collect training inputs
///
/// Only records with exactly one lepton and exactly one neutrino from
/// a W decay in the generator record are used.
pub fn training_sample(
    scorer: &dyn NeutrinoScorer,
    neutrinos: &[Neutrino],
    met: &Met,
    leptons: &[Lepton],
    jets: &[Jet],
    partons: &[Parton],
) -> Option<TrainingSample> {
    let [lepton] = leptons else {
        return None;
    };
    let neutrino = neutrinos.first()?;
    let truth = w_neutrinos(partons);
    let &[true_neutrino] = truth.as_slice() else {
        return None;
    };
    let features = scorer.features(ScorerInputs {
        neutrino,
        met,
        lepton,
        jets,
        true_neutrino: Some(true_neutrino),
    });
    Some(TrainingSample {
        true_neutrino: *true_neutrino,
        features,
    })
}
