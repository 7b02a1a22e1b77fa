//! Cartographic projections and the globe/map blender
//!
//! Two raw kernels (orthographic, equirectangular) work on rotated radians.
//! A projection composes rotation, kernel, then scale and translation into
//! screen units (y grows downward). `BlendedProjection` linearly blends the
//! kernel outputs of two projections by a settable parameter, which is how
//! the globe unrolls into a flat map frame by frame.

use crate::geo::{wrap_lambda, GeoPoint};

/// A point on the logical drawing surface
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

impl ScreenPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    pub fn distance_to(&self, other: ScreenPoint) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Raw projection kernels, radians in, unit-scale plane out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Kernel {
    Orthographic,
    Equirectangular,
}

impl Kernel {
    #[inline]
    pub fn forward(self, lambda: f64, phi: f64) -> (f64, f64) {
        match self {
            Kernel::Orthographic => (phi.cos() * lambda.sin(), phi.sin()),
            Kernel::Equirectangular => (lambda, phi),
        }
    }

    pub fn invert(self, x: f64, y: f64) -> Option<(f64, f64)> {
        match self {
            Kernel::Orthographic => {
                let z = x.hypot(y);
                if z > 1.0 + 1e-9 {
                    return None;
                }
                let c = z.min(1.0).asin();
                let (sc, cc) = c.sin_cos();
                let lambda = (x * sc).atan2(z * cc);
                let phi = if z == 0.0 { 0.0 } else { (y * sc / z).clamp(-1.0, 1.0).asin() };
                Some((lambda, phi))
            }
            Kernel::Equirectangular => Some((x, y)),
        }
    }
}

/// Three-axis sphere rotation in degrees (yaw, pitch, roll).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rotation {
    pub lambda: f64,
    pub phi: f64,
    pub gamma: f64,
}

impl Rotation {
    pub const fn new(lambda: f64, phi: f64) -> Self {
        Self { lambda, phi, gamma: 0.0 }
    }

    fn has_tilt(&self) -> bool {
        self.phi != 0.0 || self.gamma != 0.0
    }

    /// Rotate radians into the view frame.
    pub fn forward(&self, lambda: f64, phi: f64) -> (f64, f64) {
        let lambda = wrap_lambda(lambda + self.lambda.to_radians());
        if !self.has_tilt() {
            return (lambda, phi);
        }
        let (sin_dp, cos_dp) = self.phi.to_radians().sin_cos();
        let (sin_dg, cos_dg) = self.gamma.to_radians().sin_cos();
        let cos_phi = phi.cos();
        let x = lambda.cos() * cos_phi;
        let y = lambda.sin() * cos_phi;
        let z = phi.sin();
        let k = z * cos_dp + x * sin_dp;
        (
            (y * cos_dg - k * sin_dg).atan2(x * cos_dp - z * sin_dp),
            (k * cos_dg + y * sin_dg).clamp(-1.0, 1.0).asin(),
        )
    }

    /// Rotate view-frame radians back to geographic radians.
    pub fn invert(&self, lambda: f64, phi: f64) -> (f64, f64) {
        let (lambda, phi) = if self.has_tilt() {
            let (sin_dp, cos_dp) = self.phi.to_radians().sin_cos();
            let (sin_dg, cos_dg) = self.gamma.to_radians().sin_cos();
            let cos_phi = phi.cos();
            let x = lambda.cos() * cos_phi;
            let y = lambda.sin() * cos_phi;
            let z = phi.sin();
            let k = z * cos_dg - y * sin_dg;
            (
                (y * cos_dg + z * sin_dg).atan2(x * cos_dp + k * sin_dp),
                (k * cos_dp - x * sin_dp).clamp(-1.0, 1.0).asin(),
            )
        } else {
            (lambda, phi)
        };
        (wrap_lambda(lambda - self.lambda.to_radians()), phi)
    }
}

/// Anything that maps geographic points onto the surface.
pub trait Projection {
    /// Screen position of a point, `None` if it has no finite image.
    fn project(&self, point: GeoPoint) -> Option<ScreenPoint>;

    /// Geographic point under a screen position, `None` when the projection
    /// has no usable inverse there.
    fn invert(&self, point: ScreenPoint) -> Option<GeoPoint>;
}

/// Every parameter that drives a projected coordinate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProjectionState {
    pub blend: f64,
    pub scale: f64,
    pub translate: ScreenPoint,
    pub rotation: Rotation,
    pub precision: f64,
}

impl Default for ProjectionState {
    fn default() -> Self {
        Self {
            blend: 0.0,
            scale: 150.0,
            translate: ScreenPoint::new(480.0, 250.0),
            rotation: Rotation::default(),
            precision: 0.5f64.sqrt(),
        }
    }
}

impl ProjectionState {
    #[inline]
    fn to_screen(&self, (x, y): (f64, f64)) -> ScreenPoint {
        ScreenPoint::new(self.translate.x + self.scale * x, self.translate.y - self.scale * y)
    }

    #[inline]
    fn from_screen(&self, point: ScreenPoint) -> (f64, f64) {
        (
            (point.x - self.translate.x) / self.scale,
            (self.translate.y - point.y) / self.scale,
        )
    }
}

/// A plain single-kernel projection.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BaseProjection {
    pub kernel: Kernel,
    pub state: ProjectionState,
}

impl Projection for BaseProjection {
    fn project(&self, point: GeoPoint) -> Option<ScreenPoint> {
        let (lambda, phi) = point.radians();
        let (lambda, phi) = self.state.rotation.forward(lambda, phi);
        let screen = self.state.to_screen(self.kernel.forward(lambda, phi));
        screen.is_finite().then_some(screen)
    }

    fn invert(&self, point: ScreenPoint) -> Option<GeoPoint> {
        let (x, y) = self.state.from_screen(point);
        let (lambda, phi) = self.kernel.invert(x, y)?;
        let (lambda, phi) = self.state.rotation.invert(lambda, phi);
        let geo = GeoPoint::from_radians(lambda, phi);
        geo.is_finite().then_some(geo)
    }
}

const NEWTON_ITERATIONS: usize = 25;
const NEWTON_TOLERANCE: f64 = 1e-10;
const NEWTON_STEP: f64 = 1e-7;

/// Per-point linear blend of two kernels.
///
/// `P(t) = P0 + t * (P1 - P0)` in screen space. Scale, translation, rotation
/// and precision are shared by both ends, so the blend is exact for any
/// state and changing a parameter affects the very next projection call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BlendedProjection {
    from: Kernel,
    to: Kernel,
    state: ProjectionState,
}

impl BlendedProjection {
    pub fn new(from: Kernel, to: Kernel) -> Self {
        Self::with_state(from, to, ProjectionState::default())
    }

    pub fn with_state(from: Kernel, to: Kernel, state: ProjectionState) -> Self {
        let mut projection = Self { from, to, state };
        projection.set_blend(state.blend);
        projection
    }

    /// Globe at t = 0, flat map at t = 1.
    pub fn globe_to_map() -> Self {
        Self::new(Kernel::Orthographic, Kernel::Equirectangular)
    }

    /// Set the blend parameter, clamped to [0, 1].
    pub fn set_blend(&mut self, t: f64) {
        self.state.blend = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
    }

    pub fn blend(&self) -> f64 {
        self.state.blend
    }

    pub fn set_scale(&mut self, scale: f64) {
        self.state.scale = scale;
    }

    pub fn scale(&self) -> f64 {
        self.state.scale
    }

    pub fn set_translate(&mut self, translate: ScreenPoint) {
        self.state.translate = translate;
    }

    pub fn translate(&self) -> ScreenPoint {
        self.state.translate
    }

    pub fn set_rotation(&mut self, rotation: Rotation) {
        self.state.rotation = rotation;
    }

    pub fn rotation(&self) -> Rotation {
        self.state.rotation
    }

    pub fn set_precision(&mut self, precision: f64) {
        self.state.precision = precision;
    }

    pub fn precision(&self) -> f64 {
        self.state.precision
    }

    /// One end of the blend with the current shared parameters.
    pub fn endpoint(&self, at_map: bool) -> BaseProjection {
        BaseProjection {
            kernel: if at_map { self.to } else { self.from },
            state: self.state,
        }
    }

    /// Blended kernel output for view-frame radians.
    #[inline]
    pub fn raw(&self, lambda: f64, phi: f64) -> (f64, f64) {
        let t = self.state.blend;
        let (ax, ay) = self.from.forward(lambda, phi);
        let (bx, by) = self.to.forward(lambda, phi);
        ((1.0 - t) * ax + t * bx, (1.0 - t) * ay + t * by)
    }

    /// Project a point already expressed in the rotated view frame (radians).
    pub fn project_view(&self, lambda: f64, phi: f64) -> Option<ScreenPoint> {
        let screen = self.state.to_screen(self.raw(lambda, phi));
        screen.is_finite().then_some(screen)
    }

    /// Rotate a geographic point into the view frame (radians).
    pub fn to_view(&self, point: GeoPoint) -> (f64, f64) {
        let (lambda, phi) = point.radians();
        self.state.rotation.forward(lambda, phi)
    }

    /// Newton solve of the blended forward map; only used between the ends.
    fn invert_raw(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let (mut lambda, mut phi) = self
            .from
            .invert(x, y)
            .or_else(|| self.to.invert(x, y))
            .unwrap_or((x, y));

        for _ in 0..NEWTON_ITERATIONS {
            let (fx, fy) = self.raw(lambda, phi);
            let (rx, ry) = (fx - x, fy - y);
            if rx.hypot(ry) < NEWTON_TOLERANCE {
                break;
            }
            let (ax, ay) = self.raw(lambda + NEWTON_STEP, phi);
            let (bx, by) = self.raw(lambda, phi + NEWTON_STEP);
            let j11 = (ax - fx) / NEWTON_STEP;
            let j21 = (ay - fy) / NEWTON_STEP;
            let j12 = (bx - fx) / NEWTON_STEP;
            let j22 = (by - fy) / NEWTON_STEP;
            let det = j11 * j22 - j12 * j21;
            if det.abs() < 1e-12 {
                return None;
            }
            lambda -= (j22 * rx - j12 * ry) / det;
            phi -= (j11 * ry - j21 * rx) / det;
        }

        let (fx, fy) = self.raw(lambda, phi);
        let converged = (fx - x).hypot(fy - y) < 1e-6;
        let in_domain = lambda.abs() <= std::f64::consts::PI + 1e-9
            && phi.abs() <= std::f64::consts::FRAC_PI_2 + 1e-9;
        (converged && in_domain).then_some((lambda, phi))
    }
}

impl Projection for BlendedProjection {
    fn project(&self, point: GeoPoint) -> Option<ScreenPoint> {
        let (lambda, phi) = self.to_view(point);
        self.project_view(lambda, phi)
    }

    fn invert(&self, point: ScreenPoint) -> Option<GeoPoint> {
        let t = self.blend();
        if t == 0.0 || t == 1.0 {
            return self.endpoint(t == 1.0).invert(point);
        }
        let (x, y) = self.state.from_screen(point);
        let (lambda, phi) = self.invert_raw(x, y)?;
        let (lambda, phi) = self.rotation().invert(lambda, phi);
        let geo = GeoPoint::from_radians(lambda, phi);
        geo.is_finite().then_some(geo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: ScreenPoint, b: ScreenPoint) -> bool {
        (a.x - b.x).abs() < 1e-9 && (a.y - b.y).abs() < 1e-9
    }

    fn configured(t: f64) -> BlendedProjection {
        let mut p = BlendedProjection::globe_to_map();
        p.set_scale(220.0);
        p.set_translate(ScreenPoint::new(400.0, 250.0));
        p.set_rotation(Rotation::new(30.0, -20.0));
        p.set_blend(t);
        p
    }

    fn samples() -> Vec<GeoPoint> {
        let mut points = Vec::new();
        for lon in (-170..=170).step_by(40) {
            for lat in (-80..=80).step_by(20) {
                points.push(GeoPoint::new(lon as f64, lat as f64));
            }
        }
        points
    }

    #[test]
    fn blend_zero_equals_globe() {
        let p = configured(0.0);
        let globe = p.endpoint(false);
        for point in samples() {
            assert_eq!(p.project(point), globe.project(point));
        }
    }

    #[test]
    fn blend_one_equals_map() {
        let p = configured(1.0);
        let map = p.endpoint(true);
        for point in samples() {
            assert_eq!(p.project(point), map.project(point));
        }
    }

    #[test]
    fn intermediate_blend_is_affine() {
        for t in [0.1, 0.25, 0.5, 0.9] {
            let p = configured(t);
            let globe = p.endpoint(false);
            let map = p.endpoint(true);
            for point in samples() {
                let a = globe.project(point).unwrap();
                let b = map.project(point).unwrap();
                let expected = ScreenPoint::new(a.x + t * (b.x - a.x), a.y + t * (b.y - a.y));
                assert!(close(p.project(point).unwrap(), expected));
            }
        }
    }

    #[test]
    fn blend_accessors_round_trip_and_clamp() {
        let mut p = BlendedProjection::globe_to_map();
        p.set_blend(0.42);
        assert_eq!(p.blend(), 0.42);
        p.set_blend(3.0);
        assert_eq!(p.blend(), 1.0);
        p.set_blend(-1.0);
        assert_eq!(p.blend(), 0.0);
        p.set_blend(f64::NAN);
        assert_eq!(p.blend(), 0.0);
    }

    #[test]
    fn setters_affect_next_projection() {
        let mut p = configured(0.0);
        let point = GeoPoint::new(10.0, 10.0);
        let before = p.project(point).unwrap();
        p.set_translate(ScreenPoint::new(500.0, 250.0));
        let after = p.project(point).unwrap();
        assert!((after.x - before.x - 100.0).abs() < 1e-9);

        p.set_scale(440.0);
        let scaled = p.project(point).unwrap();
        assert!(((scaled.x - 500.0) - 2.0 * (after.x - 500.0)).abs() < 1e-9);

        p.set_precision(2.0);
        assert_eq!(p.precision(), 2.0);
    }

    #[test]
    fn rotation_centers_point() {
        let mut p = BlendedProjection::globe_to_map();
        p.set_translate(ScreenPoint::new(400.0, 250.0));
        p.set_rotation(Rotation::new(122.0, -37.0));
        let center = p.project(GeoPoint::new(-122.0, 37.0)).unwrap();
        assert!(close(center, ScreenPoint::new(400.0, 250.0)));
    }

    #[test]
    fn rotation_round_trips() {
        let r = Rotation { lambda: 40.0, phi: -25.0, gamma: 10.0 };
        let (l, p) = r.forward(0.3, 0.7);
        let (l2, p2) = r.invert(l, p);
        assert!((l2 - 0.3).abs() < 1e-9 && (p2 - 0.7).abs() < 1e-9);
    }

    #[test]
    fn invert_center_at_both_ends_and_between() {
        for t in [0.0, 0.4, 1.0] {
            let p = configured(t);
            let geo = p.invert(ScreenPoint::new(400.0, 250.0)).unwrap();
            let back = p.project(geo).unwrap();
            assert!(close(back, ScreenPoint::new(400.0, 250.0)), "t = {t}");
        }
    }

    #[test]
    fn orthographic_invert_outside_disk_is_none() {
        let p = configured(0.0);
        assert!(p.invert(ScreenPoint::new(400.0 + 500.0, 250.0)).is_none());
    }

    #[test]
    fn non_finite_point_does_not_project() {
        let p = configured(0.5);
        assert!(p.project(GeoPoint::new(f64::NAN, 0.0)).is_none());
    }
}
