//! Heavy-resonance reconstruction in lepton+jets final states
use crate::objects::{Jet, Lepton, Neutrino, Resonance};

/// Objects handed to the resonance reconstruction
#[derive(Copy, Clone, Debug)]
pub struct ResonanceInputs<'a> {
    pub lepton: &'a Lepton,
    pub neutrino: &'a Neutrino,
    pub jets: &'a [Jet],
    /// Indices of the jets b-tagged at the default working point
    pub btagged: &'a [usize],
}

/// External reconstruction of the resonance four-momentum
pub trait ResonanceReconstructor {
    fn reconstruct(&self, inputs: ResonanceInputs<'_>) -> Resonance;
}

/// Resonance candidates for the two neutrino solutions
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct ResonanceCandidates {
    pub standard: Resonance,
    pub sampling: Resonance,
}

/// Run the resonance reconstruction for both neutrino solutions
///
/// Returns `None` without calling the reconstruction unless there is at
/// least one lepton, one neutrino, and two jets.
pub fn reconstruct_resonances(
    reconstructor: &dyn ResonanceReconstructor,
    leptons: &[Lepton],
    neutrinos: &[Neutrino],
    jets: &[Jet],
    btagged: &[usize],
) -> Option<ResonanceCandidates> {
    let lepton = leptons.first()?;
    let neutrino = neutrinos.first()?;
    if jets.len() < 2 {
        return None;
    }
    let inputs = ResonanceInputs {
        lepton,
        neutrino,
        jets,
        btagged,
    };
    let standard = reconstructor.reconstruct(inputs);

    let sampling_nu = Neutrino {
        p: neutrino.sampling_p(),
        ..Default::default()
    };
    let sampling = reconstructor.reconstruct(ResonanceInputs {
        neutrino: &sampling_nu,
        ..inputs
    });
    log::debug!(
        "Resonance mass: {}, sampling: {}",
        standard.p.m(),
        sampling.p.m()
    );
    Some(ResonanceCandidates { standard, sampling })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::momentum::FourMomentum;
    use crate::objects::{Flavour, LeptonId};
    use std::cell::RefCell;

    /// Sums all inputs and remembers the neutrino pz of every call
    #[derive(Default)]
    struct SumAll {
        pz: RefCell<Vec<f64>>,
    }

    impl ResonanceReconstructor for SumAll {
        fn reconstruct(&self, inputs: ResonanceInputs<'_>) -> Resonance {
            self.pz.borrow_mut().push(inputs.neutrino.p.pz());
            let leptonic = inputs.lepton.p + inputs.neutrino.p;
            let p = inputs
                .jets
                .iter()
                .fold(leptonic, |sum, jet| sum + jet.p);
            Resonance {
                p,
                vlq: leptonic,
                jet_index: inputs.btagged.first().copied(),
            }
        }
    }

    fn lepton() -> Lepton {
        Lepton {
            p: FourMomentum::from_pt_eta_phi_m(100., 0., 0., 0.),
            index: 0,
            charge: 1.,
            flavour: Flavour::Muon,
            iso: None,
            id: LeptonId::default(),
            drmin: 1.,
            ptrel: 0.,
            is_good: true,
        }
    }

    fn neutrino() -> Neutrino {
        Neutrino {
            p: FourMomentum::massless(30., 40., 20.),
            pz_sampling: -60.,
            ..Default::default()
        }
    }

    fn jets(n: usize) -> Vec<Jet> {
        (0..n)
            .map(|index| Jet {
                p: FourMomentum::from_pt_eta_phi_m(80., 0.5, 2., 10.),
                index,
                ..Default::default()
            })
            .collect()
    }

    #[test]
    fn two_candidates() {
        let reco = SumAll::default();
        let res =
            reconstruct_resonances(&reco, &[lepton()], &[neutrino()], &jets(3), &[1]).unwrap();
        assert_eq!(*reco.pz.borrow(), [20., -60.]);
        assert_eq!(res.standard.jet_index, Some(1));
        assert_ne!(res.standard.p, res.sampling.p);
        assert_eq!(res.standard.p.px(), res.sampling.p.px());
    }

    #[test]
    fn insufficient_objects_skip_reconstruction() {
        let reco = SumAll::default();
        assert_eq!(
            reconstruct_resonances(&reco, &[], &[neutrino()], &jets(3), &[]),
            None
        );
        assert_eq!(
            reconstruct_resonances(&reco, &[lepton()], &[neutrino()], &jets(1), &[]),
            None
        );
        assert_eq!(
            reconstruct_resonances(&reco, &[lepton()], &[neutrino()], &[], &[]),
            None
        );
        assert!(reco.pz.borrow().is_empty());
    }
}
