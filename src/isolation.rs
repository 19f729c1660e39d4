//! Two-dimensional lepton isolation against nearby jets
use crate::momentum::FourMomentum;
use crate::objects::Jet;

/// Leptons further away than this from the closest jet are isolated
pub const DELTA_R_CUT: f64 = 0.4;
/// Leptons with larger momentum transverse to the closest jet are isolated
pub const PTREL_CUT: f64 = 30.;
/// `drmin` reported when there is no reference jet
pub const DRMIN_NO_JET: f64 = 100.;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Isolation {
    pub drmin: f64,
    pub ptrel: f64,
    pub pass: bool,
}

/// Evaluate the 2D isolation of a lepton
///
/// The lepton passes if the closest reference jet is further away than
/// ΔR = 0.4 or the lepton momentum transverse to that jet exceeds 30.
/// Without any reference jet the lepton cannot be confirmed as isolated
/// and fails.
pub fn isolate(lepton: &FourMomentum, reference_jets: &[Jet]) -> Isolation {
    let closest = reference_jets
        .iter()
        .map(|jet| (lepton.delta_r(&jet.p), jet))
        .fold(None, |closest: Option<(f64, &Jet)>, (dr, jet)| match closest {
            Some((drmin, _)) if drmin <= dr => closest,
            _ => Some((dr, jet)),
        });
    let Some((drmin, jet)) = closest else {
        return Isolation {
            drmin: DRMIN_NO_JET,
            ptrel: 0.,
            pass: false,
        };
    };
    let ptrel = lepton.perp(&jet.p);
    Isolation {
        drmin,
        ptrel,
        pass: drmin > DELTA_R_CUT || ptrel > PTREL_CUT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn jet(pt: f64, eta: f64, phi: f64) -> Jet {
        Jet {
            p: FourMomentum::from_pt_eta_phi_m(pt, eta, phi, 0.),
            ..Default::default()
        }
    }

    fn lepton() -> FourMomentum {
        FourMomentum::from_pt_eta_phi_e(100., 0., 0., 100.)
    }

    #[test]
    fn close_soft_jet_fails() {
        let iso = isolate(&lepton(), &[jet(20., 0., 0.2)]);
        assert_abs_diff_eq!(iso.drmin, 0.2, epsilon = 1e-9);
        assert_abs_diff_eq!(iso.ptrel, 100. * 0.2f64.sin(), epsilon = 1e-9);
        assert!(iso.ptrel <= PTREL_CUT);
        assert!(!iso.pass);
    }

    #[test]
    fn large_ptrel_passes() {
        let iso = isolate(&lepton(), &[jet(20., 0., 0.35)]);
        assert!(iso.drmin < DELTA_R_CUT);
        assert!(iso.ptrel > PTREL_CUT);
        assert!(iso.pass);
    }

    #[test]
    fn closest_jet_decides() {
        let jets = [jet(200., 1.5, 2.), jet(30., 0.1, 0.05), jet(40., -2., -1.)];
        let iso = isolate(&lepton(), &jets);
        assert_abs_diff_eq!(iso.drmin, 0.05f64.hypot(0.1), epsilon = 1e-9);
        assert!(!iso.pass);
    }

    #[test]
    fn distant_jet_passes() {
        let iso = isolate(&lepton(), &[jet(50., 0., 1.)]);
        assert!(iso.pass);
    }

    #[test]
    fn no_reference_jets_fails() {
        let iso = isolate(&lepton(), &[]);
        assert!(!iso.pass);
        assert_eq!(iso.drmin, DRMIN_NO_JET);
    }
}
