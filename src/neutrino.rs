//! Neutrino reconstruction from the leading lepton and the missing
//! transverse momentum
use crate::momentum::FourMomentum;
use crate::objects::{Lepton, Met, Neutrino};

/// Which root of the W mass constraint to return
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum SolutionMode {
    /// Primary physical root
    Standard,
    /// Secondary root
    Sampling,
}

/// Output of a longitudinal-momentum solver
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PzSolution {
    pub pz: f64,
    /// `pz` is the real part of a complex root
    pub is_imaginary: bool,
    /// All candidate solutions considered by the solver
    pub candidates: Vec<f64>,
}

/// External solver for the neutrino longitudinal momentum
pub trait NeutrinoSolver {
    fn solve(&self, lepton: &Lepton, met: &Met, mode: SolutionMode) -> PzSolution;
}

/// Neutrino with the transverse momentum of the MET and vanishing pz
pub fn dummy_neutrino(met: &Met) -> Neutrino {
    Neutrino {
        p: FourMomentum::from_pt_eta_phi_m(met.p.pt(), 0., met.p.phi(), 0.),
        ..Default::default()
    }
}

/// Build the neutrino collection
///
/// The collection always holds exactly one neutrino. Without a solver
/// or without leptons this is the dummy neutrino.
pub fn build_neutrinos(
    solver: Option<&dyn NeutrinoSolver>,
    leptons: &[Lepton],
    met: &Met,
) -> Vec<Neutrino> {
    let (Some(solver), Some(lepton)) = (solver, leptons.first()) else {
        return vec![dummy_neutrino(met)];
    };
    let standard = solver.solve(lepton, met, SolutionMode::Standard);
    let sampling = solver.solve(lepton, met, SolutionMode::Sampling);
    log::debug!(
        "Neutrino pz: {} (imaginary: {}), sampling: {}",
        standard.pz,
        standard.is_imaginary,
        sampling.pz
    );
    vec![Neutrino {
        p: FourMomentum::massless(met.p.px(), met.p.py(), standard.pz),
        pz_sampling: sampling.pz,
        pz_samplings: sampling.candidates,
        is_imaginary: standard.is_imaginary,
        score: None,
    }]
}
