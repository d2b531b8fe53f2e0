use jetty::PseudoJet;
use noisy_float::prelude::*;
use serde::{Deserialize, Serialize};

/// Largest absolute (pseudo)rapidity assigned to objects along the beam axis
pub const MAX_RAPIDITY: f64 = 1e5;

/// A basic four-vector
///
/// The zero component is the energy/time component. The remainder are
/// the spatial components
#[derive(
    Deserialize,
    Serialize,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Debug,
    Clone,
    Copy,
    Default,
)]
#[serde(from = "[N64; 4]", into = "[N64; 4]")]
pub struct FourVector {
    pt: N64,
    p: [N64; 4],
}

impl FourVector {
    /// Construct a new four-vector
    pub fn new() -> Self {
        Self::default()
    }

    /// Construct a four-vector from spatial components and energy
    pub fn from_pxpypze(px: f64, py: f64, pz: f64, e: f64) -> Self {
        [n64(e), n64(px), n64(py), n64(pz)].into()
    }

    /// Energy component
    pub fn e(&self) -> N64 {
        self.p[0]
    }

    /// x component of the momentum
    pub fn px(&self) -> N64 {
        self.p[1]
    }

    /// y component of the momentum
    pub fn py(&self) -> N64 {
        self.p[2]
    }

    /// z component of the momentum
    pub fn pz(&self) -> N64 {
        self.p[3]
    }

    /// The spatial norm \sqrt{\sum v_i^2} with i = 1,2,3
    pub fn spatial_norm(&self) -> N64 {
        self.spatial_norm_sq().sqrt()
    }

    /// The square \sum v_i^2 with i = 1,2,3 of the spatial norm
    pub fn spatial_norm_sq(&self) -> N64 {
        self.p.iter().skip(1).map(|e| *e * *e).sum()
    }

    /// The scalar transverse momentum
    pub fn pt(&self) -> N64 {
        self.pt
    }

    /// The square of the transverse momentum
    pub fn pt2(&self) -> N64 {
        self.p[1] * self.p[1] + self.p[2] * self.p[2]
    }

    /// The transverse energy E sin(θ)
    pub fn et(&self) -> N64 {
        let p = self.spatial_norm();
        if p > 0. {
            self.e() * self.pt() / p
        } else {
            n64(0.)
        }
    }

    const fn len() -> usize {
        4
    }

    fn update_pt(&mut self) {
        self.pt = self.pt2().sqrt();
    }

    /// Azimuthal angle in [0, 2π)
    pub fn phi(&self) -> f64 {
        if self.pt2() == 0. {
            return 0.;
        }
        let phi = f64::from(self.py()).atan2(f64::from(self.px()));
        if phi < 0. {
            phi + 2. * std::f64::consts::PI
        } else {
            phi
        }
    }

    /// Rapidity, clamped to ±[MAX_RAPIDITY] for objects along the beam axis
    pub fn rap(&self) -> f64 {
        let e = f64::from(self.e());
        let pz = f64::from(self.pz());
        if self.pt2() == 0. && e == pz.abs() {
            return MAX_RAPIDITY.copysign(pz);
        }
        let num = e + pz;
        let den = e - pz;
        if num <= 0. || den <= 0. {
            return MAX_RAPIDITY.copysign(pz);
        }
        (0.5 * (num / den).ln()).clamp(-MAX_RAPIDITY, MAX_RAPIDITY)
    }

    /// Absolute pseudorapidity with the logarithm argument capped at [MAX_RAPIDITY]
    pub fn abs_eta(&self) -> f64 {
        let pt = f64::from(self.pt());
        let pz = f64::from(self.pz()).abs();
        let ratio = ((pt * pt + pz * pz).sqrt() + pz) / pt;
        ratio.min(MAX_RAPIDITY).ln().abs()
    }

    /// Squared angular distance Δy² + Δφ² to `other`
    pub fn delta_r2(&self, other: &FourVector) -> f64 {
        let dy = self.rap() - other.rap();
        let mut dphi = (self.phi() - other.phi()).abs();
        if dphi > std::f64::consts::PI {
            dphi = 2. * std::f64::consts::PI - dphi;
        }
        dy * dy + dphi * dphi
    }

    /// Drop the longitudinal component and set the energy to the
    /// transverse magnitude
    pub fn make_transverse(&mut self) {
        self.p[3] = n64(0.);
        self.p[0] = self.pt;
    }
}

impl std::convert::From<[N64; 4]> for FourVector {
    fn from(p: [N64; 4]) -> FourVector {
        let mut res = FourVector {
            p,
            pt: std::default::Default::default(),
        };
        res.update_pt();
        res
    }
}

impl From<FourVector> for [N64; 4] {
    fn from(p: FourVector) -> Self {
        p.p
    }
}

impl std::ops::Index<usize> for FourVector {
    type Output = N64;

    fn index(&self, i: usize) -> &Self::Output {
        &self.p[i]
    }
}

impl std::ops::AddAssign for FourVector {
    fn add_assign(&mut self, rhs: FourVector) {
        for i in 0..Self::len() {
            self.p[i] += rhs[i]
        }
        self.update_pt();
    }
}

impl std::ops::SubAssign for FourVector {
    fn sub_assign(&mut self, rhs: FourVector) {
        for i in 0..Self::len() {
            self.p[i] -= rhs[i]
        }
        self.update_pt();
    }
}

impl std::ops::Add for FourVector {
    type Output = Self;

    fn add(mut self, rhs: FourVector) -> Self::Output {
        self += rhs;
        self
    }
}

impl std::ops::Sub for FourVector {
    type Output = Self;

    fn sub(mut self, rhs: FourVector) -> Self::Output {
        self -= rhs;
        self
    }
}

impl std::ops::Neg for FourVector {
    type Output = Self;

    fn neg(self) -> Self::Output {
        [-self.p[0], -self.p[1], -self.p[2], -self.p[3]].into()
    }
}

impl std::iter::Sum for FourVector {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(FourVector::new(), |acc, p| acc + p)
    }
}

impl From<PseudoJet> for FourVector {
    fn from(p: PseudoJet) -> Self {
        [p.e(), p.px(), p.py(), p.pz()].into()
    }
}

impl From<FourVector> for PseudoJet {
    fn from(p: FourVector) -> Self {
        (&p).into()
    }
}

impl From<&FourVector> for PseudoJet {
    fn from(p: &FourVector) -> Self {
        [p[0], p[1], p[2], p[3]].into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transverse_convention() {
        let mut p = FourVector::from_pxpypze(3., -4., 12., 20.);
        assert_eq!(p.pt(), 5.);
        p.make_transverse();
        assert_eq!(p.pz(), 0.);
        assert_eq!(p.e(), 5.);
        assert_eq!(p.e(), p.pt());
    }

    #[test]
    fn beam_axis_kinematics() {
        let p = FourVector::from_pxpypze(0., 0., 100., 100.);
        assert_eq!(p.rap(), MAX_RAPIDITY);
        assert!(p.abs_eta() > 5.);
        let p = FourVector::from_pxpypze(0., 0., -100., 100.);
        assert_eq!(p.rap(), -MAX_RAPIDITY);
    }

    #[test]
    fn angular_distance() {
        let p1 = FourVector::from_pxpypze(1., 0., 0., 1.);
        let p2 = FourVector::from_pxpypze(-1., 0., 0., 1.);
        let dr2 = p1.delta_r2(&p2);
        let pi = std::f64::consts::PI;
        assert!((dr2 - pi * pi).abs() < 1e-12);
        assert_eq!(p1.delta_r2(&p1), 0.);
    }

    #[test]
    fn negation_and_sum() {
        let p1 = FourVector::from_pxpypze(1., 2., 3., 4.);
        let p2 = FourVector::from_pxpypze(-2., 1., 0., 3.);
        let sum: FourVector = [p1, p2].into_iter().sum();
        assert_eq!(sum, FourVector::from_pxpypze(-1., 3., 3., 7.));
        assert_eq!(-p1 + p1, FourVector::new());
    }
}
