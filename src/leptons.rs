//! Muon and electron selection
use itertools::izip;

use crate::error::ReadError;
use crate::isolation::isolate;
use crate::momentum::FourMomentum;
use crate::objects::{ElectronId, Flavour, Jet, Lepton, LeptonId};
use crate::record::Record;

pub const LEPTON_PT_MIN: f64 = 60.;
pub const LEPTON_ETA_MAX: f64 = 2.4;

pub(crate) const MUON_FIELDS: [&str; 9] = [
    "MUpt",
    "MUeta",
    "MUphi",
    "MUenergy",
    "MUcharge",
    "MUcorrIso",
    "MUlooseID",
    "MUmediumID",
    "MUtightID",
];

pub(crate) const ELECTRON_FIELDS: [&str; 11] = [
    "ELpt",
    "ELeta",
    "ELphi",
    "ELenergy",
    "ELcharge",
    "ELlooseID",
    "ELmediumID",
    "ELtightID",
    "ELlooseIDnoIso",
    "ELmediumIDnoIso",
    "ELtightIDnoIso",
];

/// Kinematic cuts, applied to the stored pT and eta
fn in_acceptance(pt: f64, eta: f64) -> bool {
    pt > LEPTON_PT_MIN && eta.abs() < LEPTON_ETA_MAX
}

/// Select muons followed by electrons
///
/// Both are required to be isolated from the jets in `iso_jets`, so
/// these have to be built first.
pub fn build_leptons(record: &Record, iso_jets: &[Jet]) -> Result<Vec<Lepton>, ReadError> {
    let mut leptons = Vec::new();
    add_muons(record, iso_jets, &mut leptons)?;
    add_electrons(record, iso_jets, &mut leptons)?;
    Ok(leptons)
}

fn add_muons(
    record: &Record,
    iso_jets: &[Jet],
    leptons: &mut Vec<Lepton>,
) -> Result<(), ReadError> {
    const CATEGORY: &str = "muon";
    let pt = record.floats("MUpt")?;
    let n = pt.len();
    let floats = |name| record.aligned_floats(CATEGORY, name, n);
    let flags = |name| record.aligned_flags(CATEGORY, name, n);
    let columns = izip!(
        pt,
        floats("MUeta")?,
        floats("MUphi")?,
        floats("MUenergy")?,
        floats("MUcharge")?,
        floats("MUcorrIso")?,
        flags("MUlooseID")?,
        flags("MUmediumID")?,
        flags("MUtightID")?,
    );
    for (&pt, &eta, &phi, &e, &charge, &iso, loose, medium, tight) in columns {
        if !(medium && in_acceptance(pt, eta)) {
            continue;
        }
        let p = FourMomentum::from_pt_eta_phi_e(pt, eta, phi, e);
        let isolation = isolate(&p, iso_jets);
        if !isolation.pass {
            continue;
        }
        leptons.push(Lepton {
            p,
            index: leptons.len(),
            charge,
            flavour: Flavour::Muon,
            iso: Some(iso),
            id: LeptonId {
                loose,
                medium,
                tight,
            },
            drmin: isolation.drmin,
            ptrel: isolation.ptrel,
            is_good: true,
        });
    }
    Ok(())
}

fn add_electrons(
    record: &Record,
    iso_jets: &[Jet],
    leptons: &mut Vec<Lepton>,
) -> Result<(), ReadError> {
    const CATEGORY: &str = "electron";
    let pt = record.floats("ELpt")?;
    let n = pt.len();
    let floats = |name| record.aligned_floats(CATEGORY, name, n);
    let flags = |name| record.aligned_flags(CATEGORY, name, n);
    let kinematics = izip!(
        pt,
        floats("ELeta")?,
        floats("ELphi")?,
        floats("ELenergy")?,
        floats("ELcharge")?,
    );
    let ids = izip!(
        flags("ELlooseID")?,
        flags("ELmediumID")?,
        flags("ELtightID")?,
        flags("ELlooseIDnoIso")?,
        flags("ELmediumIDnoIso")?,
        flags("ELtightIDnoIso")?,
    );
    for ((&pt, &eta, &phi, &e, &charge), id) in kinematics.zip(ids) {
        let (loose, medium, tight, loose_no_iso, medium_no_iso, tight_no_iso) = id;
        if !(tight_no_iso && in_acceptance(pt, eta)) {
            continue;
        }
        let p = FourMomentum::from_pt_eta_phi_e(pt, eta, phi, e);
        let isolation = isolate(&p, iso_jets);
        if !isolation.pass {
            continue;
        }
        leptons.push(Lepton {
            p,
            index: leptons.len(),
            charge,
            flavour: Flavour::Electron(ElectronId {
                loose_no_iso,
                medium_no_iso,
                tight_no_iso,
            }),
            iso: None,
            id: LeptonId {
                loose,
                medium,
                tight,
            },
            drmin: isolation.drmin,
            ptrel: isolation.ptrel,
            is_good: true,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iso_jet(eta: f64, phi: f64) -> Jet {
        Jet {
            p: FourMomentum::from_pt_eta_phi_m(30., eta, phi, 0.),
            ..Default::default()
        }
    }

    fn record() -> Record {
        Record::new()
            // isolated, non-isolated, failing ID, too soft
            .with("MUpt", vec![100., 100., 100., 40.])
            .with("MUeta", vec![0., 0., 1., 0.])
            .with("MUphi", vec![0., 2.0, -2.0, 0.])
            .with("MUenergy", vec![100., 100., 154.3, 40.])
            .with("MUcharge", vec![-1., 1., 1., -1.])
            .with("MUcorrIso", vec![0.01, 0.02, 0.03, 0.04])
            .with("MUlooseID", vec![1i64, 1, 1, 1])
            .with("MUmediumID", vec![1i64, 1, 0, 1])
            .with("MUtightID", vec![1i64, 0, 0, 1])
            // isolated, outside acceptance
            .with("ELpt", vec![80., 90.])
            .with("ELeta", vec![-1., 2.6])
            .with("ELphi", vec![-1.5, 1.])
            .with("ELenergy", vec![123.5, 611.])
            .with("ELcharge", vec![1., -1.])
            .with("ELlooseID", vec![1i64, 1])
            .with("ELmediumID", vec![1i64, 1])
            .with("ELtightID", vec![0i64, 1])
            .with("ELlooseIDnoIso", vec![1i64, 1])
            .with("ELmediumIDnoIso", vec![1i64, 1])
            .with("ELtightIDnoIso", vec![1i64, 1])
    }

    #[test]
    fn select_isolated_leptons() {
        let jets = [iso_jet(0., 2.05)];
        let leptons = build_leptons(&record(), &jets).unwrap();
        assert_eq!(leptons.len(), 2);

        let mu = &leptons[0];
        assert!(mu.is_muon() && !mu.is_electron());
        assert_eq!(mu.index, 0);
        assert_eq!(mu.charge, -1.);
        assert!(mu.id.tight);
        assert!(mu.drmin > 0.4);

        let el = &leptons[1];
        assert!(el.is_electron() && !el.is_muon());
        assert_eq!(el.index, 1);
        assert!(!el.id.tight);
        assert!(matches!(el.flavour, Flavour::Electron(ElectronId { tight_no_iso: true, .. })));
    }

    #[test]
    fn no_reference_jets_means_no_leptons() {
        let leptons = build_leptons(&record(), &[]).unwrap();
        assert!(leptons.is_empty());
    }

    fn muons(pt: Vec<f64>, eta: Vec<f64>, phi: Vec<f64>) -> Record {
        let n = pt.len();
        let energy: Vec<f64> = pt.iter().zip(&eta).map(|(pt, eta)| pt * eta.cosh()).collect();
        let empty: Vec<f64> = Vec::new();
        let no_flags: Vec<i64> = Vec::new();
        let mut record = Record::new()
            .with("MUpt", pt)
            .with("MUeta", eta)
            .with("MUphi", phi)
            .with("MUenergy", energy)
            .with("MUcharge", vec![-1.; n])
            .with("MUcorrIso", vec![0.; n]);
        for id in ["MUlooseID", "MUmediumID", "MUtightID"] {
            record.insert(id, vec![1i64; n]);
        }
        for name in ["ELpt", "ELeta", "ELphi", "ELenergy", "ELcharge"] {
            record.insert(name, empty.clone());
        }
        for id in ELECTRON_FIELDS.iter().skip(5) {
            record.insert(*id, no_flags.clone());
        }
        record
    }

    #[test]
    fn cuts_are_strict_at_the_boundary() {
        let jets = [iso_jet(-4., 0.)];
        let phis: Vec<f64> = (0..64).map(|i| -3.1 + 0.1 * i as f64).collect();
        let n = phis.len();

        let at_pt_cut = muons(vec![LEPTON_PT_MIN; n], vec![0.5; n], phis.clone());
        assert!(build_leptons(&at_pt_cut, &jets).unwrap().is_empty());

        let at_eta_cut = muons(vec![100.; n], vec![LEPTON_ETA_MAX; n], phis.clone());
        assert!(build_leptons(&at_eta_cut, &jets).unwrap().is_empty());

        let inside = muons(vec![60.001; n], vec![2.399; n], phis);
        assert_eq!(build_leptons(&inside, &jets).unwrap().len(), n);
    }
}
