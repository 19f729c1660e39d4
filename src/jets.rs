//! Small- and large-radius jet collections
use itertools::izip;

use crate::btag::{BTaggedJets, BTagger};
use crate::error::ReadError;
use crate::momentum::FourMomentum;
use crate::objects::{ClassifierScores, Jet, Parton, Subjet, Substructure};
use crate::record::Record;
use crate::truth::TruthMatcher;

pub const JET_PT_MIN: f64 = 50.;
/// Minimum transverse momentum of jets used for lepton isolation
pub const ISO_JET_PT_MIN: f64 = 15.;
pub const LARGE_R_JET_PT_MIN: f64 = 400.;
pub const JET_ETA_MAX: f64 = 2.4;

pub(crate) const JET_FIELDS: [&str; 9] = [
    "AK4pt",
    "AK4eta",
    "AK4phi",
    "AK4mass",
    "AK4bDisc",
    "AK4deepCSV",
    "AK4area",
    "AK4uncorrPt",
    "AK4uncorrE",
];

pub(crate) const LARGE_R_JET_FIELDS: [&str; 26] = [
    "AK8pt",
    "AK8eta",
    "AK8phi",
    "AK8mass",
    "AK8SDmass",
    "AK8tau1",
    "AK8tau2",
    "AK8tau3",
    "AK8area",
    "AK8charge",
    "AK8uncorrPt",
    "AK8uncorrE",
    "AK8subjet0charge",
    "AK8subjet0bDisc",
    "AK8subjet0pt",
    "AK8subjet0mass",
    "AK8subjet1charge",
    "AK8subjet1bDisc",
    "AK8subjet1pt",
    "AK8subjet1mass",
    "AK8BEST_t",
    "AK8BEST_w",
    "AK8BEST_z",
    "AK8BEST_h",
    "AK8BEST_j",
    "AK8BEST_class",
];

/// Jets of one record
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SmallRJets {
    /// Jets passing the analysis selection
    pub jets: Vec<Jet>,
    /// Looser selection, only used as reference for lepton isolation
    pub iso_jets: Vec<Jet>,
    pub btagged: BTaggedJets,
}

/// Build the small-radius jet collections and b-tag the selected jets
pub fn build_jets(record: &Record, btagger: &BTagger) -> Result<SmallRJets, ReadError> {
    const CATEGORY: &str = "jet";
    let pt = record.floats("AK4pt")?;
    let n = pt.len();
    let get = |name| record.aligned_floats(CATEGORY, name, n);
    let columns = izip!(
        pt,
        get("AK4eta")?,
        get("AK4phi")?,
        get("AK4mass")?,
        get("AK4bDisc")?,
        get("AK4deepCSV")?,
        get("AK4area")?,
        get("AK4uncorrPt")?,
        get("AK4uncorrE")?,
    );

    let mut out = SmallRJets::default();
    for (&pt, &eta, &phi, &m, &bdisc, &deep_csv, &area, &uncorr_pt, &uncorr_e) in columns {
        let in_acceptance = eta.abs() < JET_ETA_MAX;
        let is_good = in_acceptance && pt > JET_PT_MIN;
        let is_good_iso = in_acceptance && pt > ISO_JET_PT_MIN;
        if !is_good_iso {
            continue;
        }
        let jet = Jet {
            p: FourMomentum::from_pt_eta_phi_m(pt, eta, phi, m),
            bdisc,
            deep_csv: Some(deep_csv),
            area,
            uncorr_pt,
            uncorr_e,
            is_good,
            ..Default::default()
        };
        if is_good {
            let index = out.jets.len();
            let btag = btagger.tag(index, bdisc, &mut out.btagged);
            out.jets.push(Jet {
                index,
                btag,
                ..jet.clone()
            });
        }
        out.iso_jets.push(Jet {
            index: out.iso_jets.len(),
            ..jet
        });
    }
    Ok(out)
}

/// Ratio of n-subjettiness variables, `None` if the denominator vanishes
fn tau_ratio(num: f64, denom: f64) -> Option<f64> {
    if denom == 0. {
        None
    } else {
        Some(num / denom)
    }
}

/// Build the large-radius jet collection
///
/// If a truth matcher is given, every selected jet is matched to the
/// truth partons.
pub fn build_large_r_jets(
    record: &Record,
    matcher: Option<&dyn TruthMatcher>,
    partons: &[Parton],
) -> Result<Vec<Jet>, ReadError> {
    const CATEGORY: &str = "large-R jet";
    let pt = record.floats("AK8pt")?;
    let n = pt.len();
    let get = |name| record.aligned_floats(CATEGORY, name, n);
    let kinematics = izip!(
        pt,
        get("AK8eta")?,
        get("AK8phi")?,
        get("AK8mass")?,
        get("AK8area")?,
        get("AK8uncorrPt")?,
        get("AK8uncorrE")?,
    );
    let shape = izip!(
        get("AK8tau1")?,
        get("AK8tau2")?,
        get("AK8tau3")?,
        get("AK8SDmass")?,
        get("AK8charge")?,
    );
    let subjet = |i: usize| -> Result<_, ReadError> {
        let prefix = format!("AK8subjet{i}");
        let get = |name: &str| record.aligned_floats(CATEGORY, &format!("{prefix}{name}"), n);
        Ok(izip!(get("charge")?, get("bDisc")?, get("mass")?, get("pt")?)
            .map(|(&charge, &bdisc, &mass, &pt)| Subjet {
                charge,
                bdisc,
                mass,
                pt,
            }))
    };
    let scores = izip!(
        get("AK8BEST_t")?,
        get("AK8BEST_w")?,
        get("AK8BEST_z")?,
        get("AK8BEST_h")?,
        get("AK8BEST_j")?,
        record.aligned_ints(CATEGORY, "AK8BEST_class", n)?,
    )
    .map(|(&top, &w, &z, &higgs, &jet, &class)| ClassifierScores {
        top,
        w,
        z,
        higgs,
        jet,
        class,
    });

    let mut ljets = Vec::new();
    let columns = izip!(kinematics, shape, subjet(0)?, subjet(1)?, scores);
    for (kin, shape, subjet0, subjet1, scores) in columns {
        let (&pt, &eta, &phi, &m, &area, &uncorr_pt, &uncorr_e) = kin;
        if pt <= LARGE_R_JET_PT_MIN || eta.abs() >= JET_ETA_MAX {
            continue;
        }
        let (&tau1, &tau2, &tau3, &soft_drop_mass, &charge) = shape;
        let mut jet = Jet {
            p: FourMomentum::from_pt_eta_phi_m(pt, eta, phi, m),
            index: ljets.len(),
            area,
            uncorr_pt,
            uncorr_e,
            is_good: true,
            substructure: Some(Substructure {
                tau: [tau1, tau2, tau3],
                tau21: tau_ratio(tau2, tau1),
                tau32: tau_ratio(tau3, tau2),
                soft_drop_mass,
                charge,
                subjets: [subjet0, subjet1],
                scores,
                truth: None,
            }),
            ..Default::default()
        };
        if let Some(matcher) = matcher {
            let truth = matcher.match_jet(&jet, partons);
            log::debug!("Large-R jet {} matched to truth top {:?}", jet.index, truth.top_index);
            if let Some(sub) = jet.substructure.as_mut() {
                sub.truth = Some(truth);
            }
        }
        ljets.push(jet);
    }
    Ok(ljets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::btag::{BTagThresholds, WorkingPoint};

    fn btagger() -> BTagger {
        BTagger::new(
            BTagThresholds::new(0.5426, 0.8484, 0.9535).unwrap(),
            WorkingPoint::Medium,
        )
    }

    fn jet_record(pt: Vec<f64>, eta: Vec<f64>, bdisc: Vec<f64>) -> Record {
        let n = pt.len();
        Record::new()
            .with("AK4pt", pt)
            .with("AK4eta", eta)
            .with("AK4phi", vec![0.5; n])
            .with("AK4mass", vec![5.; n])
            .with("AK4bDisc", bdisc)
            .with("AK4deepCSV", vec![0.1; n])
            .with("AK4area", vec![0.5; n])
            .with("AK4uncorrPt", vec![40.; n])
            .with("AK4uncorrE", vec![45.; n])
    }

    #[test]
    fn jet_selection_and_indices() {
        let record = jet_record(
            vec![120., 30., 80., 10., 60., 55.],
            vec![0.1, 1.0, -2.5, 0.0, 2.3, -1.2],
            vec![0.99, 0.9, 0.99, 0.99, 0.6, 0.1],
        );
        let out = build_jets(&record, &btagger()).unwrap();
        let pts: Vec<_> = out.jets.iter().map(|j| j.p.pt().round()).collect();
        assert_eq!(pts, [120., 60., 55.]);
        let indices: Vec<_> = out.jets.iter().map(|j| j.index).collect();
        assert_eq!(indices, [0, 1, 2]);
        // the 30 GeV jet only enters the isolation reference
        assert_eq!(out.iso_jets.len(), 4);
        assert!(!out.iso_jets[1].is_good);
        let iso_indices: Vec<_> = out.iso_jets.iter().map(|j| j.index).collect();
        assert_eq!(iso_indices, [0, 1, 2, 3]);

        assert_eq!(out.btagged.get(WorkingPoint::Loose), [0, 1]);
        assert_eq!(out.btagged.get(WorkingPoint::Medium), [0]);
        assert_eq!(out.btagged.get(WorkingPoint::Tight), [0]);
        assert!(out.jets[0].is_btagged(WorkingPoint::Tight));
        assert!(!out.jets[2].is_btagged(WorkingPoint::Loose));
    }

    #[test]
    fn misaligned_arrays_are_rejected() {
        let record = jet_record(vec![120., 60.], vec![0.1], vec![0.5, 0.5]);
        assert!(matches!(
            build_jets(&record, &btagger()),
            Err(ReadError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn tau_ratios() {
        assert_eq!(tau_ratio(4., 2.), Some(2.));
        assert_eq!(tau_ratio(8., 4.), Some(2.));
        assert_eq!(tau_ratio(1., 0.), None);
    }
}
