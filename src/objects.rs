//! Reconstructed physics objects
use particle_id::sm_elementary_particles as sm;
use particle_id::ParticleID;

use crate::btag::{BTagFlags, WorkingPoint};
use crate::momentum::FourMomentum;

/// A jet
///
/// Small-radius jets carry no substructure; large-radius jets always
/// do.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Jet {
    /// Four-momentum
    pub p: FourMomentum,
    /// Position in its collection for the current record
    pub index: usize,
    /// Primary b-tagging discriminant
    pub bdisc: f64,
    /// Secondary b-tagging discriminant
    pub deep_csv: Option<f64>,
    /// Working points passed by `bdisc`
    pub btag: BTagFlags,
    pub area: f64,
    /// Transverse momentum before energy corrections
    pub uncorr_pt: f64,
    /// Energy before energy corrections
    pub uncorr_e: f64,
    /// Passes the kinematic selection of its collection
    pub is_good: bool,
    pub substructure: Option<Substructure>,
}

impl Jet {
    pub fn is_large_r(&self) -> bool {
        self.substructure.is_some()
    }

    pub fn is_btagged(&self, wp: WorkingPoint) -> bool {
        self.btag.passes(wp)
    }
}

/// Substructure of a large-radius jet
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Substructure {
    /// N-subjettiness τ1, τ2, τ3
    pub tau: [f64; 3],
    /// τ2/τ1, `None` if τ1 vanishes
    pub tau21: Option<f64>,
    /// τ3/τ2, `None` if τ2 vanishes
    pub tau32: Option<f64>,
    pub soft_drop_mass: f64,
    pub charge: f64,
    pub subjets: [Subjet; 2],
    /// Scores of the external boosted-object classifier
    pub scores: ClassifierScores,
    /// Result of matching to truth top quarks
    pub truth: Option<TruthMatch>,
}

impl Substructure {
    pub fn tau1(&self) -> f64 {
        self.tau[0]
    }

    pub fn tau2(&self) -> f64 {
        self.tau[1]
    }

    pub fn tau3(&self) -> f64 {
        self.tau[2]
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Subjet {
    pub charge: f64,
    pub bdisc: f64,
    pub mass: f64,
    pub pt: f64,
}

/// Output of the boosted-object classifier
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct ClassifierScores {
    pub top: f64,
    pub w: f64,
    pub z: f64,
    pub higgs: f64,
    pub jet: f64,
    /// Most likely class
    pub class: i64,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct TruthMatch {
    /// Index of the matched truth top quark
    pub top_index: Option<usize>,
    /// The jet contains all decay products of a hadronically decaying top
    pub is_hadronic_top: bool,
}

/// Charged lepton
#[derive(Clone, Debug, PartialEq)]
pub struct Lepton {
    pub p: FourMomentum,
    pub index: usize,
    pub charge: f64,
    pub flavour: Flavour,
    /// Isolation variable as stored in the record
    pub iso: Option<f64>,
    pub id: LeptonId,
    /// ΔR to the closest isolation-reference jet
    pub drmin: f64,
    /// Momentum transverse to the closest isolation-reference jet
    pub ptrel: f64,
    pub is_good: bool,
}

impl Lepton {
    pub fn is_electron(&self) -> bool {
        matches!(self.flavour, Flavour::Electron(_))
    }

    pub fn is_muon(&self) -> bool {
        matches!(self.flavour, Flavour::Muon)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Flavour {
    Electron(ElectronId),
    Muon,
}

/// Identification tiers
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct LeptonId {
    pub loose: bool,
    pub medium: bool,
    pub tight: bool,
}

/// Electron identification tiers without the isolation requirement
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct ElectronId {
    pub loose_no_iso: bool,
    pub medium_no_iso: bool,
    pub tight_no_iso: bool,
}

/// Missing transverse momentum
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Met {
    /// Transverse only, η and mass are zero
    pub p: FourMomentum,
    /// Transverse mass of the leading lepton and the MET
    pub mtw: f64,
    pub uncorr_pt: Option<f64>,
    pub uncorr_phi: Option<f64>,
    pub uncorr_sum_et: Option<f64>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Neutrino {
    pub p: FourMomentum,
    /// Longitudinal momentum of the alternative solution
    pub pz_sampling: f64,
    /// All candidate longitudinal momenta of the alternative solution
    pub pz_samplings: Vec<f64>,
    /// The standard solution is the real part of a complex root
    pub is_imaginary: bool,
    /// Score of the external neutrino classifier
    pub score: Option<f64>,
}

impl Neutrino {
    /// Massless four-momentum of the alternative solution
    pub fn sampling_p(&self) -> FourMomentum {
        FourMomentum::massless(self.p.px(), self.p.py(), self.pz_sampling)
    }
}

/// Particle from the generator record
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Parton {
    pub p: FourMomentum,
    pub id: ParticleID,
    pub status: i64,
    pub index: usize,
    pub parent: Option<usize>,
    pub children: [Option<usize>; 2],
    pub kind: PartonKind,
}

/// Type flags derived from the particle id
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct PartonKind {
    pub is_top: bool,
    pub is_w: bool,
    pub is_z: bool,
    pub is_higgs: bool,
    pub is_wprime: bool,
    pub is_vlq: bool,
    pub is_lepton: bool,
    pub is_electron: bool,
    pub is_muon: bool,
    pub is_tau: bool,
    pub is_neutrino: bool,
    pub is_quark: bool,
    pub is_bottom: bool,
    pub is_light: bool,
}

impl From<ParticleID> for PartonKind {
    fn from(id: ParticleID) -> Self {
        let abs = id.abs();
        let abs_id = abs.id();
        let is_lepton = (11..=16).contains(&abs_id);
        let is_quark = (1..=6).contains(&abs_id);
        Self {
            is_top: abs == sm::top,
            is_w: abs == sm::W_plus,
            is_z: abs == sm::Z,
            is_higgs: abs == sm::Higgs,
            // W' and vector-like quarks as numbered by the signal generator
            is_wprime: abs_id == 9900213,
            is_vlq: abs_id == 8000001 || abs_id == 7000001,
            is_lepton,
            is_electron: abs == sm::electron,
            is_muon: abs == sm::muon,
            is_tau: abs == sm::tau,
            is_neutrino: [sm::nu_e, sm::nu_mu, sm::nu_tau].contains(&abs),
            is_quark,
            is_bottom: abs == sm::bottom,
            is_light: is_quark && abs_id < sm::bottom.id(),
        }
    }
}

/// Heavy resonance decaying to a vector-like quark and a jet
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Resonance {
    pub p: FourMomentum,
    /// Intermediate vector-like quark
    pub vlq: FourMomentum,
    /// Index of the jet recoiling against the vector-like quark
    pub jet_index: Option<usize>,
}
