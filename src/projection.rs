//! Map projections between geographic and unit-projection space.
//!
//! Unit-projection space has the projection's natural size (scale 1,
//! centred on the origin) and the device orientation: y grows southward.

use std::f64::consts::PI;

use enum_dispatch::enum_dispatch;

use crate::types::{DevicePoint, LonLat, UnitPoint};

/// Slack allowed at the edge of a projection's domain.
const DOMAIN_EPSILON: f64 = 1e-9;

#[enum_dispatch]
pub trait Projection {
    /// Project `lonlat` (degrees). `None` outside the projection's domain
    /// or for non-finite input.
    fn forward(&self, lonlat: LonLat) -> Option<UnitPoint>;

    /// Invert a unit point back to degrees. `None` if the point lies
    /// outside the projected image of the globe.
    fn inverse(&self, point: UnitPoint) -> Option<LonLat>;

    /// Width of the projected equator from -180° to 180°.
    fn full_width(&self) -> Option<f64> {
        let edge = self.forward(LonLat::new(180.0, 0.0))?;
        let width = 2.0 * edge.x().abs();
        (width.is_finite() && width > 1e-9).then_some(width)
    }
}

#[enum_dispatch(Projection)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ProjectionKind {
    Wagner7,
    Equirectangular,
}

// ============================================================================
// Wagner VII
// ============================================================================

/// Wagner VII (Hammer-Wagner), an equal-area projection derived from the
/// Lambert azimuthal: latitude is compressed by `sin 65°`, longitude by a
/// factor of three, and the result stretched back out.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Wagner7;

impl Wagner7 {
    const SIN_POLE_LINE: f64 = 0.90631;
    const CX: f64 = 2.66723;
    const CY: f64 = 1.24104;
    const LON_FACTOR: f64 = 3.0;
}

impl Projection for Wagner7 {
    fn forward(&self, lonlat: LonLat) -> Option<UnitPoint> {
        if !lonlat.is_finite() {
            return None;
        }
        let lambda = lonlat.lon.to_radians() / Self::LON_FACTOR;
        let s = Self::SIN_POLE_LINE * lonlat.lat.to_radians().sin();
        let c0 = (1.0 - s * s).sqrt();
        let c1 = (2.0 / (1.0 + c0 * lambda.cos())).sqrt();
        let x = Self::CX * c0 * c1 * lambda.sin();
        let y = Self::CY * s * c1;
        let point = UnitPoint::new(x, -y);
        point.is_finite().then_some(point)
    }

    fn inverse(&self, point: UnitPoint) -> Option<LonLat> {
        if !point.is_finite() {
            return None;
        }
        // Back to the underlying Lambert azimuthal plane.
        let x = point.x() / Self::CX;
        let y = -point.y() / Self::CY;
        let rho = x.hypot(y);
        if rho < 1e-15 {
            return Some(LonLat::new(0.0, 0.0));
        }
        if rho > 2.0 + DOMAIN_EPSILON {
            return None;
        }
        let c = 2.0 * (rho / 2.0).min(1.0).asin();
        let sin_phi = y * c.sin() / rho;
        let lambda = (x * c.sin()).atan2(rho * c.cos());

        if lambda.abs() > PI / Self::LON_FACTOR + DOMAIN_EPSILON
            || sin_phi.abs() > Self::SIN_POLE_LINE + DOMAIN_EPSILON
        {
            return None;
        }
        let lat = (sin_phi / Self::SIN_POLE_LINE).clamp(-1.0, 1.0).asin();
        let lon = (lambda * Self::LON_FACTOR).clamp(-PI, PI);
        let lonlat = LonLat::new(lon.to_degrees(), lat.to_degrees());
        lonlat.is_finite().then_some(lonlat)
    }
}

// ============================================================================
// Equirectangular
// ============================================================================

/// Plate carrée: `x = λ`, `y = -φ`, both in radians.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Equirectangular;

impl Projection for Equirectangular {
    fn forward(&self, lonlat: LonLat) -> Option<UnitPoint> {
        lonlat
            .is_finite()
            .then(|| UnitPoint::new(lonlat.lon.to_radians(), -lonlat.lat.to_radians()))
    }

    fn inverse(&self, point: UnitPoint) -> Option<LonLat> {
        if !point.is_finite()
            || point.x().abs() > PI + DOMAIN_EPSILON
            || point.y().abs() > PI / 2.0 + DOMAIN_EPSILON
        {
            return None;
        }
        Some(LonLat::new(point.x().to_degrees(), -point.y().to_degrees()))
    }
}

// ============================================================================
// Scale and translate
// ============================================================================

/// A projection placed on a device canvas: `device = translate + scale · unit`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Scaled<P> {
    pub projection: P,
    pub scale: f64,
    pub translate: DevicePoint,
}

impl<P: Projection> Scaled<P> {
    pub fn new(projection: P, scale: f64, translate: DevicePoint) -> Self {
        Self {
            projection,
            scale,
            translate,
        }
    }

    pub fn forward(&self, lonlat: LonLat) -> Option<DevicePoint> {
        let unit = self.projection.forward(lonlat)?;
        let device = self.translate + unit.0 * self.scale;
        device.is_finite().then_some(device)
    }

    pub fn inverse(&self, device: DevicePoint) -> Option<LonLat> {
        if self.scale == 0.0 {
            return None;
        }
        self.projection
            .inverse(UnitPoint((device - self.translate) / self.scale))
    }
}

impl Scaled<Equirectangular> {
    /// Plate carrée filling a `width` by `height` canvas (nominally 2:1),
    /// scaled so the full 360° of longitude spans the width.
    pub fn plate(width: f64, height: f64) -> Self {
        Self::new(
            Equirectangular,
            width / (2.0 * PI),
            DevicePoint::new(width / 2.0, height / 2.0),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> impl Iterator<Item = LonLat> {
        (-18..=18).flat_map(|i| {
            (-9..=9).map(move |j| LonLat::new(f64::from(i) * 10.0, f64::from(j) * 10.0))
        })
    }

    #[test]
    fn wagner7_round_trips() {
        for ll in grid() {
            let unit = Wagner7.forward(ll).unwrap();
            let back = Wagner7.inverse(unit).unwrap();
            // asin is ill-conditioned at the pole line.
            let tolerance = if ll.lat.abs() == 90.0 { 1e-5 } else { 1e-9 };
            assert!((back.lat - ll.lat).abs() < tolerance, "{ll:?} -> {back:?}");
            if ll.lat.abs() < 90.0 {
                assert!((back.lon - ll.lon).abs() < 1e-9, "{ll:?} -> {back:?}");
            }
        }
    }

    #[test]
    fn wagner7_orientation_and_extent() {
        let origin = Wagner7.forward(LonLat::new(0.0, 0.0)).unwrap();
        assert_eq!(origin, UnitPoint::new(0.0, 0.0));

        let north = Wagner7.forward(LonLat::new(0.0, 45.0)).unwrap();
        assert!(north.y() < 0.0);
        let east = Wagner7.forward(LonLat::new(90.0, 0.0)).unwrap();
        assert!(east.x() > 0.0);

        let width = Wagner7.full_width().unwrap();
        assert!((width / 2.0 - 2.66723).abs() < 1e-4, "{width}");
    }

    #[test]
    fn wagner7_inverse_rejects_points_off_the_globe() {
        assert_eq!(Wagner7.inverse(UnitPoint::new(3.0, 0.0)), None);
        assert_eq!(Wagner7.inverse(UnitPoint::new(0.0, -1.5)), None);
        assert_eq!(Wagner7.inverse(UnitPoint::new(f64::NAN, 0.0)), None);
        assert_eq!(Wagner7.forward(LonLat::new(f64::INFINITY, 0.0)), None);
    }

    #[test]
    fn equirectangular_round_trips() {
        for ll in grid() {
            let unit = Equirectangular.forward(ll).unwrap();
            let back = Equirectangular.inverse(unit).unwrap();
            assert!((back.lon - ll.lon).abs() < 1e-12);
            assert!((back.lat - ll.lat).abs() < 1e-12);
        }
        assert_eq!(Equirectangular.inverse(UnitPoint::new(0.0, 2.0)), None);
    }

    #[test]
    fn plate_fills_the_canvas() {
        let plate = Scaled::plate(1800.0, 900.0);
        let corners = [
            (LonLat::new(-180.0, 90.0), DevicePoint::new(0.0, 0.0)),
            (LonLat::new(180.0, -90.0), DevicePoint::new(1800.0, 900.0)),
            (LonLat::new(0.0, 0.0), DevicePoint::new(900.0, 450.0)),
        ];
        for (ll, want) in corners {
            let got = plate.forward(ll).unwrap();
            assert!((got - want).length() < 1e-9, "{ll:?}: {got:?}");
        }
    }

    #[test]
    fn dispatch_through_kind() {
        let kinds = [ProjectionKind::from(Wagner7), ProjectionKind::from(Equirectangular)];
        for kind in kinds {
            let ll = LonLat::new(30.0, -20.0);
            let back = kind.inverse(kind.forward(ll).unwrap()).unwrap();
            assert!((back.lon - ll.lon).abs() < 1e-9);
        }
        assert!((ProjectionKind::from(Equirectangular).full_width().unwrap() - 2.0 * PI).abs() < 1e-12);
    }
}
