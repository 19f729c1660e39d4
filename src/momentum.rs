use std::f64::consts::{PI, TAU};
use std::ops::{Add, AddAssign};

/// Four-momentum in the order (E, px, py, pz)
#[derive(Copy, Clone, Debug, Default, PartialEq, PartialOrd)]
pub struct FourMomentum(pub [f64; 4]);

impl FourMomentum {
    pub const fn new(e: f64, px: f64, py: f64, pz: f64) -> Self {
        Self([e, px, py, pz])
    }

    /// Construct from transverse momentum, pseudorapidity, azimuth and mass
    pub fn from_pt_eta_phi_m(pt: f64, eta: f64, phi: f64, m: f64) -> Self {
        let [px, py, pz] = pt_eta_phi_to_xyz(pt, eta, phi);
        let p2 = px * px + py * py + pz * pz;
        Self([(p2 + m * m).sqrt(), px, py, pz])
    }

    /// Construct from transverse momentum, pseudorapidity, azimuth and energy
    pub fn from_pt_eta_phi_e(pt: f64, eta: f64, phi: f64, e: f64) -> Self {
        let [px, py, pz] = pt_eta_phi_to_xyz(pt, eta, phi);
        Self([e, px, py, pz])
    }

    /// Massless four-momentum with the given three-momentum
    pub fn massless(px: f64, py: f64, pz: f64) -> Self {
        Self([(px * px + py * py + pz * pz).sqrt(), px, py, pz])
    }

    pub fn e(&self) -> f64 {
        self.0[0]
    }

    pub fn px(&self) -> f64 {
        self.0[1]
    }

    pub fn py(&self) -> f64 {
        self.0[2]
    }

    pub fn pz(&self) -> f64 {
        self.0[3]
    }

    pub fn pt(&self) -> f64 {
        self.px().hypot(self.py())
    }

    /// Magnitude of the three-momentum
    pub fn p(&self) -> f64 {
        (self.px() * self.px() + self.py() * self.py() + self.pz() * self.pz()).sqrt()
    }

    /// Pseudorapidity
    ///
    /// Objects without transverse momentum have η = 0 if they are at
    /// rest and ±∞ along the beam axis.
    pub fn eta(&self) -> f64 {
        let pt = self.pt();
        if pt == 0. {
            return match self.pz() {
                pz if pz > 0. => f64::INFINITY,
                pz if pz < 0. => f64::NEG_INFINITY,
                _ => 0.,
            };
        }
        (self.pz() / pt).asinh()
    }

    /// Azimuth in (−π, π]
    pub fn phi(&self) -> f64 {
        if self.px() == 0. && self.py() == 0. {
            return 0.;
        }
        self.py().atan2(self.px())
    }

    /// Invariant mass, negative for space-like momenta
    pub fn m(&self) -> f64 {
        let m2 = self.e() * self.e() - self.p() * self.p();
        if m2 < 0. {
            -(-m2).sqrt()
        } else {
            m2.sqrt()
        }
    }

    /// Azimuthal separation wrapped to (−π, π]
    pub fn delta_phi(&self, other: &Self) -> f64 {
        wrap_phi(self.phi() - other.phi())
    }

    /// Angular separation ΔR = √(Δη² + Δφ²)
    pub fn delta_r(&self, other: &Self) -> f64 {
        let deta = self.eta() - other.eta();
        deta.hypot(self.delta_phi(other))
    }

    /// Component of this three-momentum transverse to the axis of `axis`
    pub fn perp(&self, axis: &Self) -> f64 {
        let p2 = self.p() * self.p();
        let axis2 = axis.p() * axis.p();
        if axis2 <= 0. {
            return p2.sqrt();
        }
        let dot = self.px() * axis.px() + self.py() * axis.py() + self.pz() * axis.pz();
        (p2 - dot * dot / axis2).max(0.).sqrt()
    }
}

impl Add for FourMomentum {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self {
        self += rhs;
        self
    }
}

impl AddAssign for FourMomentum {
    fn add_assign(&mut self, rhs: Self) {
        for (a, b) in self.0.iter_mut().zip(rhs.0) {
            *a += b;
        }
    }
}

impl From<[f64; 4]> for FourMomentum {
    fn from(p: [f64; 4]) -> Self {
        Self(p)
    }
}

impl From<FourMomentum> for [f64; 4] {
    fn from(p: FourMomentum) -> Self {
        p.0
    }
}

pub(crate) fn wrap_phi(dphi: f64) -> f64 {
    let dphi = dphi % TAU;
    if dphi > PI {
        dphi - TAU
    } else if dphi <= -PI {
        dphi + TAU
    } else {
        dphi
    }
}

fn pt_eta_phi_to_xyz(pt: f64, eta: f64, phi: f64) -> [f64; 3] {
    [pt * phi.cos(), pt * phi.sin(), pt * eta.sinh()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn pt_eta_phi_recovered() {
        let p = FourMomentum::from_pt_eta_phi_m(45., -1.3, 2.9, 4.8);
        assert_abs_diff_eq!(p.pt(), 45., epsilon = 1e-9);
        assert_abs_diff_eq!(p.eta(), -1.3, epsilon = 1e-9);
        assert_abs_diff_eq!(p.phi(), 2.9, epsilon = 1e-9);
        assert_abs_diff_eq!(p.m(), 4.8, epsilon = 1e-6);
    }

    #[test]
    fn delta_phi_wraps() {
        let a = FourMomentum::from_pt_eta_phi_m(10., 0., 3.0, 0.);
        let b = FourMomentum::from_pt_eta_phi_m(10., 0., -3.0, 0.);
        assert_abs_diff_eq!(a.delta_phi(&b), 6.0 - TAU, epsilon = 1e-12);
        assert_abs_diff_eq!(b.delta_phi(&a), TAU - 6.0, epsilon = 1e-12);
        assert_eq!(wrap_phi(-PI), PI);
        assert_eq!(wrap_phi(PI), PI);
    }

    #[test]
    fn delta_r_combines_eta_and_phi() {
        let a = FourMomentum::from_pt_eta_phi_m(10., 0.3, 0.1, 0.);
        let b = FourMomentum::from_pt_eta_phi_m(20., 0.0, 0.5, 0.);
        assert_abs_diff_eq!(a.delta_r(&b), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn perp_to_jet_axis() {
        let lep = FourMomentum::from_pt_eta_phi_e(100., 0., 0., 100.);
        let jet = FourMomentum::from_pt_eta_phi_m(20., 0., 0.2, 0.);
        assert_abs_diff_eq!(lep.perp(&jet), 100. * 0.2f64.sin(), epsilon = 1e-9);
        assert_abs_diff_eq!(lep.perp(&lep), 0., epsilon = 1e-6);
    }

    #[test]
    fn massless_energy() {
        let nu = FourMomentum::massless(3., 4., 12.);
        assert_eq!(nu.e(), 13.);
        assert_abs_diff_eq!(nu.m(), 0., epsilon = 1e-9);
    }
}
