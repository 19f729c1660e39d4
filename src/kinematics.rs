//! Missing transverse momentum and event-level kinematic sums
use crate::error::ReadError;
use crate::momentum::FourMomentum;
use crate::objects::{Jet, Lepton, Met};
use crate::record::Record;

pub(crate) const MET_FIELDS: [&str; 2] = ["METpt", "METphi"];

/// Transverse mass of a lepton and the missing transverse momentum
///
/// mT = sqrt(2 pT(ℓ) pT(miss) (1 - cos Δφ))
pub fn transverse_mass(lepton: &FourMomentum, met: &FourMomentum) -> f64 {
    let dphi = met.delta_phi(lepton);
    // rounding can push the radicand slightly below zero for Δφ ≈ 0
    (2. * lepton.pt() * met.pt() * (1. - dphi.cos())).max(0.).sqrt()
}

/// Build the missing transverse momentum
///
/// `mtw` is computed with the leading lepton and is zero without
/// leptons.
pub fn build_met(record: &Record, leptons: &[Lepton]) -> Result<Met, ReadError> {
    let pt = record.float("METpt")?;
    let phi = record.float("METphi")?;
    let p = FourMomentum::from_pt_eta_phi_m(pt, 0., phi, 0.);
    let mtw = leptons
        .first()
        .map(|lepton| transverse_mass(&lepton.p, &p))
        .unwrap_or_default();
    Ok(Met {
        p,
        mtw,
        uncorr_pt: record.float_opt("METuncorrPt")?,
        uncorr_phi: record.float_opt("METuncorrPhi")?,
        uncorr_sum_et: record.float_opt("METuncorrSumEt")?,
    })
}

/// Scalar transverse-momentum sums
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Kinematics {
    /// Hadronic transverse energy
    pub ht: f64,
    /// Total transverse energy
    pub st: f64,
    /// Precomputed small-radius jet HT, if stored in the record
    pub ht_ak4: Option<f64>,
    /// Precomputed large-radius jet HT, if stored in the record
    pub ht_ak8: Option<f64>,
}

impl Kinematics {
    /// HT sums the small-radius jets if these are used, otherwise the
    /// large-radius jets. ST adds the missing transverse momentum and,
    /// if leptons are used, the lepton transverse momenta.
    pub fn new(
        use_jets: bool,
        jets: &[Jet],
        large_r_jets: &[Jet],
        use_leptons: bool,
        leptons: &[Lepton],
        met: &Met,
    ) -> Self {
        let hadronic = if use_jets { jets } else { large_r_jets };
        let ht: f64 = hadronic.iter().map(|jet| jet.p.pt()).sum();
        let mut st = ht + met.p.pt();
        if use_leptons {
            st += leptons.iter().map(|lepton| lepton.p.pt()).sum::<f64>();
        }
        Self {
            ht,
            st,
            ..Default::default()
        }
    }

    pub(crate) fn with_stored_ht(mut self, record: &Record) -> Result<Self, ReadError> {
        self.ht_ak4 = record.float_opt("HTak4")?;
        self.ht_ak8 = record.float_opt("HTak8")?;
        Ok(self)
    }
}
