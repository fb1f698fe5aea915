//! Four-vectors for particle momenta and vertex positions.
//!
//! One type serves both roles, as in the event-record formats: a momentum is
//! `(px, py, pz, e)` and a position is `(x, y, z, t)`, stored in the same four
//! slots. Units are whatever the record declares (GeV and mm by convention).

use core::ops::{Add, AddAssign, Sub};

use serde::{Deserialize, Serialize};

/// A Lorentz four-vector with the time-like component last.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FourVector {
    /// x component (px for momenta).
    pub x: f64,
    /// y component (py for momenta).
    pub y: f64,
    /// z component (pz for momenta).
    pub z: f64,
    /// Time-like component (energy for momenta).
    pub t: f64,
}

impl FourVector {
    /// The zero vector.
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0, 0.0);

    /// Build a vector from its four components.
    pub const fn new(x: f64, y: f64, z: f64, t: f64) -> Self {
        Self { x, y, z, t }
    }

    /// Build a momentum from a three-momentum and a mass.
    pub fn from_mass(px: f64, py: f64, pz: f64, mass: f64) -> Self {
        let e = px.mul_add(px, py.mul_add(py, pz.mul_add(pz, mass * mass))).sqrt();
        Self::new(px, py, pz, e)
    }

    /// Momentum x component.
    pub const fn px(&self) -> f64 {
        self.x
    }

    /// Momentum y component.
    pub const fn py(&self) -> f64 {
        self.y
    }

    /// Momentum z component.
    pub const fn pz(&self) -> f64 {
        self.z
    }

    /// Energy.
    pub const fn e(&self) -> f64 {
        self.t
    }

    /// Transverse momentum.
    pub fn pt(&self) -> f64 {
        self.x.hypot(self.y)
    }

    /// Magnitude of the three-momentum.
    pub fn p(&self) -> f64 {
        self.pt().hypot(self.z)
    }

    /// Invariant mass squared (may be slightly negative from rounding).
    pub fn m2(&self) -> f64 {
        let p = self.p();
        self.t.mul_add(self.t, -(p * p))
    }

    /// Invariant mass; negative mass-squared is reported as a negative mass.
    pub fn m(&self) -> f64 {
        let m2 = self.m2();
        if m2 < 0.0 { -(-m2).sqrt() } else { m2.sqrt() }
    }

    /// Pseudorapidity. Infinite along the beam axis, zero for the null vector.
    pub fn eta(&self) -> f64 {
        let pt = self.pt();
        if pt > 0.0 {
            (self.z / pt).asinh()
        } else if self.z > 0.0 {
            f64::INFINITY
        } else if self.z < 0.0 {
            f64::NEG_INFINITY
        } else {
            0.0
        }
    }

    /// Azimuthal angle in `(-pi, pi]`.
    pub fn phi(&self) -> f64 {
        self.y.atan2(self.x)
    }

    /// Polar angle measured from the +z axis.
    pub fn theta(&self) -> f64 {
        self.pt().atan2(self.z)
    }

    /// Scale all four components.
    pub fn scaled(&self, factor: f64) -> Self {
        Self::new(self.x * factor, self.y * factor, self.z * factor, self.t * factor)
    }
}

impl Add for FourVector {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z, self.t + rhs.t)
    }
}

impl AddAssign for FourVector {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for FourVector {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z, self.t - rhs.t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-9;

    #[test]
    fn transverse_and_total_momentum() {
        let v = FourVector::new(3.0, 4.0, 12.0, 13.5);
        assert!((v.pt() - 5.0).abs() < TOL);
        assert!((v.p() - 13.0).abs() < TOL);
    }

    #[test]
    fn mass_from_components() {
        let v = FourVector::from_mass(1.0, -2.0, 0.5, 1.019_461);
        assert!((v.m() - 1.019_461).abs() < 1e-6);
    }

    #[test]
    fn eta_is_zero_at_ninety_degrees() {
        let v = FourVector::new(1.0, 0.0, 0.0, 1.0);
        assert!(v.eta().abs() < TOL);
    }

    #[test]
    fn eta_sign_follows_pz() {
        let forward = FourVector::new(1.0, 0.0, 5.0, 6.0);
        let backward = FourVector::new(1.0, 0.0, -5.0, 6.0);
        assert!(forward.eta() > 0.0);
        assert!((forward.eta() + backward.eta()).abs() < TOL);
    }

    #[test]
    fn eta_along_beam_is_infinite() {
        let v = FourVector::new(0.0, 0.0, 10.0, 10.0);
        assert!(v.eta().is_infinite());
        assert!(FourVector::ZERO.eta().abs() < TOL);
    }

    #[test]
    fn addition_is_componentwise() {
        let a = FourVector::new(1.0, 2.0, 3.0, 4.0);
        let b = FourVector::new(0.5, 0.5, 0.5, 0.5);
        let mut c = a + b;
        assert!((c.t - 4.5).abs() < TOL);
        c += b;
        assert!((c.x - 2.0).abs() < TOL);
        let d = c - a;
        assert!((d.y - 1.0).abs() < TOL);
    }
}
