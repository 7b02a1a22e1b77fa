//! Spherical geometry on longitude/latitude degrees
//!
//! Great-circle distance and interpolation, graticule generation and the
//! polygon feature model shared by the world loader and the path builder.

pub mod synth;

use std::f64::consts::{FRAC_PI_2, PI};

/// A geographic coordinate in degrees
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GeoPoint {
    pub lon: f64,
    pub lat: f64,
}

impl GeoPoint {
    pub const fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    pub fn is_finite(&self) -> bool {
        self.lon.is_finite() && self.lat.is_finite()
    }

    /// (lambda, phi) in radians
    #[inline]
    pub fn radians(&self) -> (f64, f64) {
        (self.lon.to_radians(), self.lat.to_radians())
    }

    pub fn from_radians(lambda: f64, phi: f64) -> Self {
        Self::new(lambda.to_degrees(), phi.to_degrees())
    }
}

#[inline]
fn haversin(x: f64) -> f64 {
    let s = (x / 2.0).sin();
    s * s
}

/// Angular great-circle distance in radians.
pub fn distance(a: GeoPoint, b: GeoPoint) -> f64 {
    let (l0, p0) = a.radians();
    let (l1, p1) = b.radians();
    let delta = (l1 - l0).abs();
    let (sin_d, cos_d) = delta.sin_cos();
    let (sin_p0, cos_p0) = p0.sin_cos();
    let (sin_p1, cos_p1) = p1.sin_cos();
    let x = cos_p1 * sin_d;
    let y = cos_p0 * sin_p1 - sin_p0 * cos_p1 * cos_d;
    let z = sin_p0 * sin_p1 + cos_p0 * cos_p1 * cos_d;
    (x * x + y * y).sqrt().atan2(z)
}

/// Great-circle interpolator between two points.
///
/// `at(0.0)` is the start, `at(1.0)` the end. Non-finite endpoints
/// propagate into non-finite samples, which callers treat as unprojectable.
#[derive(Clone, Copy, Debug)]
pub struct GreatCircle {
    start: GeoPoint,
    kx0: f64,
    ky0: f64,
    kz0: f64,
    kx1: f64,
    ky1: f64,
    kz1: f64,
    d: f64,
    k: f64,
}

impl GreatCircle {
    pub fn new(from: GeoPoint, to: GeoPoint) -> Self {
        let (x0, y0) = from.radians();
        let (x1, y1) = to.radians();
        let (cy0, sy0) = (y0.cos(), y0.sin());
        let (cy1, sy1) = (y1.cos(), y1.sin());
        let d = 2.0 * (haversin(y1 - y0) + cy0 * cy1 * haversin(x1 - x0)).sqrt().asin();
        Self {
            start: from,
            kx0: cy0 * x0.cos(),
            ky0: cy0 * x0.sin(),
            kz0: sy0,
            kx1: cy1 * x1.cos(),
            ky1: cy1 * x1.sin(),
            kz1: sy1,
            d,
            k: d.sin(),
        }
    }

    /// Angular length in radians
    pub fn length(&self) -> f64 {
        self.d
    }

    pub fn at(&self, t: f64) -> GeoPoint {
        if self.d == 0.0 {
            return self.start;
        }
        let td = t * self.d;
        let b = td.sin() / self.k;
        let a = (self.d - td).sin() / self.k;
        let x = a * self.kx0 + b * self.kx1;
        let y = a * self.ky0 + b * self.ky1;
        let z = a * self.kz0 + b * self.kz1;
        GeoPoint::from_radians(y.atan2(x), z.atan2((x * x + y * y).sqrt()))
    }
}

/// A closed ring of coordinates (first point repeated last).
pub type Ring = Vec<GeoPoint>;

#[derive(Clone, Debug, PartialEq)]
pub enum Geometry {
    Polygon(Vec<Ring>),
    MultiPolygon(Vec<Vec<Ring>>),
}

impl Geometry {
    pub fn rings(&self) -> Box<dyn Iterator<Item = &Ring> + '_> {
        match self {
            Geometry::Polygon(rings) => Box::new(rings.iter()),
            Geometry::MultiPolygon(polygons) => Box::new(polygons.iter().flatten()),
        }
    }
}

/// A named geographic feature (one country, or the placeholder).
#[derive(Clone, Debug, PartialEq)]
pub struct Feature {
    pub name: Option<String>,
    pub geometry: Geometry,
}

/// Meridians and parallels every `step` degrees.
///
/// Minor lines stop at ±80° latitude; the four major meridians run pole to
/// pole. Each line is sampled every 2.5° so it bends correctly on the globe.
pub fn graticule(step: f64) -> Vec<Vec<GeoPoint>> {
    const SAMPLE: f64 = 2.5;
    let mut lines = Vec::new();
    let step = step.max(1.0);

    let mut lon: f64 = -180.0;
    while lon < 180.0 {
        let major = (lon % 90.0).abs() < f64::EPSILON;
        let extent = if major { 90.0 } else { 80.0 };
        lines.push(sample_range(-extent, extent, SAMPLE, |lat| GeoPoint::new(lon, lat)));
        lon += step;
    }

    let mut lat: f64 = -80.0;
    while lat <= 80.0 {
        lines.push(sample_range(-180.0, 180.0, SAMPLE, |lon| GeoPoint::new(lon, lat)));
        lat += step;
    }

    lines
}

fn sample_range<F: Fn(f64) -> GeoPoint>(from: f64, to: f64, step: f64, point: F) -> Vec<GeoPoint> {
    let count = ((to - from) / step).ceil().max(1.0) as usize;
    (0..=count)
        .map(|i| point((from + i as f64 * step).min(to)))
        .collect()
}

/// Angular radius of the front hemisphere, radians.
pub const HEMISPHERE: f64 = FRAC_PI_2;

/// Wrap longitude radians to [-PI, PI].
#[inline]
pub fn wrap_lambda(lambda: f64) -> f64 {
    if lambda > PI {
        lambda - std::f64::consts::TAU
    } else if lambda < -PI {
        lambda + std::f64::consts::TAU
    } else {
        lambda
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn distance_quarter_turn() {
        let d = distance(GeoPoint::new(0.0, 0.0), GeoPoint::new(90.0, 0.0));
        assert!(close(d, FRAC_PI_2));
        assert!(close(distance(GeoPoint::new(0.0, 90.0), GeoPoint::new(45.0, -90.0)), PI));
    }

    #[test]
    fn great_circle_endpoints_and_midpoint() {
        let a = GeoPoint::new(0.0, 0.0);
        let b = GeoPoint::new(90.0, 0.0);
        let gc = GreatCircle::new(a, b);
        let start = gc.at(0.0);
        let end = gc.at(1.0);
        assert!(close(start.lon, 0.0) && close(start.lat, 0.0));
        assert!(close(end.lon, 90.0) && close(end.lat, 0.0));
        let mid = gc.at(0.5);
        assert!(close(mid.lon, 45.0));
    }

    #[test]
    fn great_circle_degenerate_returns_start() {
        let p = GeoPoint::new(12.0, 34.0);
        let gc = GreatCircle::new(p, p);
        assert_eq!(gc.at(0.7), p);
    }

    #[test]
    fn great_circle_non_finite_input_propagates() {
        let gc = GreatCircle::new(GeoPoint::new(f64::NAN, 0.0), GeoPoint::new(10.0, 0.0));
        assert!(!gc.at(0.5).is_finite());
    }

    #[test]
    fn graticule_has_meridians_and_parallels() {
        let lines = graticule(10.0);
        // 36 meridians + 17 parallels
        assert_eq!(lines.len(), 36 + 17);
        let major = &lines[0];
        assert_eq!(major.first().map(|p| p.lat), Some(-90.0));
        assert_eq!(major.last().map(|p| p.lat), Some(90.0));
        let minor = &lines[1];
        assert_eq!(minor.first().map(|p| p.lon), Some(-170.0));
        assert_eq!(minor.last().map(|p| p.lat), Some(80.0));
    }

    #[test]
    fn wrap_lambda_into_range() {
        assert!(close(wrap_lambda(PI + 0.5), -PI + 0.5));
        assert!(close(wrap_lambda(-PI - 0.5), PI - 0.5));
        assert!(close(wrap_lambda(1.0), 1.0));
    }
}
