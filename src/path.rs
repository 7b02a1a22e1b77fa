//! Geographic lines and rings to screen polylines
//!
//! Lines are densified along great circles, clipped to the visible lune of
//! the blended projection (a hemisphere on the globe, the whole sphere on the
//! map), cut where they jump across the antimeridian, and adaptively
//! resampled until they deviate from the true curve by less than the
//! projection's precision.

use crate::geo::{GeoPoint, GreatCircle, HEMISPHERE};
use crate::projection::{BlendedProjection, Projection, ScreenPoint};
use crate::scene::RenderError;
use std::f64::consts::PI;

/// Longest great-circle step before projecting, radians (2 degrees).
const MAX_STEP: f64 = PI / 90.0;
const MAX_RESAMPLE_DEPTH: u32 = 6;

#[derive(Clone, Debug, PartialEq)]
pub struct Polyline {
    pub points: Vec<ScreenPoint>,
    pub closed: bool,
}

pub struct PathBuilder<'a> {
    projection: &'a BlendedProjection,
    horizon: f64,
}

struct Vertex {
    geo: GeoPoint,
    lambda: f64,
    visible: bool,
    screen: ScreenPoint,
}

impl<'a> PathBuilder<'a> {
    pub fn new(projection: &'a BlendedProjection) -> Self {
        Self {
            projection,
            horizon: HEMISPHERE * (1.0 + projection.blend()),
        }
    }

    pub fn line(&self, points: &[GeoPoint]) -> Result<Vec<Polyline>, RenderError> {
        self.build(points, false)
    }

    /// A closed ring; stays closed only if nothing was clipped away.
    pub fn ring(&self, ring: &[GeoPoint]) -> Result<Vec<Polyline>, RenderError> {
        self.build(ring, true)
    }

    /// Outline of the visible region: the globe's limb, the map's frame, or
    /// the shape in between.
    pub fn sphere(&self) -> Result<Polyline, RenderError> {
        let h = self.horizon.min(PI);
        let mut points = Vec::with_capacity(182);
        for step in 0..=90 {
            let phi = (-90.0 + step as f64 * 2.0).to_radians();
            points.push(self.view_point(-h, phi)?);
        }
        for step in 0..=90 {
            let phi = (90.0 - step as f64 * 2.0).to_radians();
            points.push(self.view_point(h, phi)?);
        }
        Ok(Polyline { points, closed: true })
    }

    fn view_point(&self, lambda: f64, phi: f64) -> Result<ScreenPoint, RenderError> {
        self.projection
            .project_view(lambda, phi)
            .ok_or(RenderError::NonFinite("sphere outline"))
    }

    fn vertex(&self, geo: GeoPoint) -> Result<Vertex, RenderError> {
        if !geo.is_finite() {
            return Err(RenderError::NonFinite("geometry coordinate"));
        }
        let (lambda, phi) = self.projection.to_view(geo);
        let screen = self
            .projection
            .project_view(lambda, phi)
            .ok_or(RenderError::Unprojectable(format!("{:.3},{:.3}", geo.lon, geo.lat)))?;
        Ok(Vertex {
            geo,
            lambda,
            visible: self.horizon >= PI || lambda.abs() < self.horizon,
            screen,
        })
    }

    fn build(&self, points: &[GeoPoint], closed: bool) -> Result<Vec<Polyline>, RenderError> {
        let dense = densify(points)?;
        let mut runs: Vec<Vec<ScreenPoint>> = Vec::new();
        let mut current: Vec<ScreenPoint> = Vec::new();
        let mut previous: Option<Vertex> = None;
        let mut cut = false;

        for geo in dense {
            let vertex = self.vertex(geo)?;
            if !vertex.visible {
                cut = true;
                flush(&mut runs, &mut current);
                previous = None;
                continue;
            }
            match &previous {
                Some(prev) if (vertex.lambda - prev.lambda).abs() > PI => {
                    cut = true;
                    flush(&mut runs, &mut current);
                    current.push(vertex.screen);
                }
                Some(prev) => {
                    self.resample(prev.geo, vertex.geo, prev.screen, vertex.screen, 0, &mut current);
                    current.push(vertex.screen);
                }
                None => current.push(vertex.screen),
            }
            previous = Some(vertex);
        }
        flush(&mut runs, &mut current);

        let whole = closed && !cut && runs.len() == 1;
        Ok(runs
            .into_iter()
            .map(|points| Polyline { points, closed: whole })
            .collect())
    }

    fn resample(
        &self,
        a: GeoPoint,
        b: GeoPoint,
        pa: ScreenPoint,
        pb: ScreenPoint,
        depth: u32,
        out: &mut Vec<ScreenPoint>,
    ) {
        if depth >= MAX_RESAMPLE_DEPTH {
            return;
        }
        let mid = GreatCircle::new(a, b).at(0.5);
        let Some(pm) = self.projection.project(mid) else {
            return;
        };
        let chord = ScreenPoint::new((pa.x + pb.x) / 2.0, (pa.y + pb.y) / 2.0);
        if pm.distance_to(chord) <= self.projection.precision() {
            return;
        }
        self.resample(a, mid, pa, pm, depth + 1, out);
        out.push(pm);
        self.resample(mid, b, pm, pb, depth + 1, out);
    }
}

fn flush(runs: &mut Vec<Vec<ScreenPoint>>, current: &mut Vec<ScreenPoint>) {
    if current.len() >= 2 {
        runs.push(std::mem::take(current));
    } else {
        current.clear();
    }
}

fn densify(points: &[GeoPoint]) -> Result<Vec<GeoPoint>, RenderError> {
    let mut dense = Vec::with_capacity(points.len() * 2);
    let Some(first) = points.first() else {
        return Ok(dense);
    };
    dense.push(*first);
    for pair in points.windows(2) {
        let circle = GreatCircle::new(pair[0], pair[1]);
        let length = circle.length();
        if !length.is_finite() {
            return Err(RenderError::NonFinite("geometry segment"));
        }
        let steps = (length / MAX_STEP).ceil().max(1.0) as usize;
        for i in 1..steps {
            dense.push(circle.at(i as f64 / steps as f64));
        }
        dense.push(pair[1]);
    }
    Ok(dense)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::Rotation;

    fn projection(t: f64) -> BlendedProjection {
        let mut p = BlendedProjection::globe_to_map();
        p.set_scale(200.0);
        p.set_translate(ScreenPoint::new(400.0, 250.0));
        p.set_blend(t);
        p
    }

    #[test]
    fn front_ring_stays_closed() {
        let p = projection(0.0);
        let builder = PathBuilder::new(&p);
        let ring = vec![
            GeoPoint::new(-10.0, -10.0),
            GeoPoint::new(10.0, -10.0),
            GeoPoint::new(10.0, 10.0),
            GeoPoint::new(-10.0, 10.0),
            GeoPoint::new(-10.0, -10.0),
        ];
        let lines = builder.ring(&ring).unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].closed);
    }

    #[test]
    fn back_ring_is_culled_on_globe() {
        let p = projection(0.0);
        let builder = PathBuilder::new(&p);
        let ring = vec![
            GeoPoint::new(170.0, -10.0),
            GeoPoint::new(175.0, -10.0),
            GeoPoint::new(175.0, 10.0),
            GeoPoint::new(170.0, -10.0),
        ];
        assert!(builder.ring(&ring).unwrap().is_empty());
    }

    #[test]
    fn same_ring_shows_on_map() {
        let p = projection(1.0);
        let builder = PathBuilder::new(&p);
        let ring = vec![
            GeoPoint::new(170.0, -10.0),
            GeoPoint::new(175.0, -10.0),
            GeoPoint::new(175.0, 10.0),
            GeoPoint::new(170.0, -10.0),
        ];
        assert_eq!(builder.ring(&ring).unwrap().len(), 1);
    }

    #[test]
    fn antimeridian_crossing_splits_on_map() {
        let p = projection(1.0);
        let builder = PathBuilder::new(&p);
        let line = vec![GeoPoint::new(170.0, 0.0), GeoPoint::new(-170.0, 0.0)];
        let lines = builder.line(&line).unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| !l.closed));
    }

    #[test]
    fn limb_crossing_line_is_cut() {
        let mut p = projection(0.0);
        p.set_rotation(Rotation::new(0.0, 0.0));
        let builder = PathBuilder::new(&p);
        let line = vec![GeoPoint::new(0.0, 0.0), GeoPoint::new(120.0, 0.0)];
        let lines = builder.line(&line).unwrap();
        assert_eq!(lines.len(), 1);
        let last = lines[0].points.last().unwrap();
        // the visible part ends on the right limb
        assert!(last.x <= 600.0 + 1e-6 && last.x > 590.0);
    }

    #[test]
    fn non_finite_geometry_is_an_error() {
        let p = projection(0.0);
        let builder = PathBuilder::new(&p);
        let line = vec![GeoPoint::new(f64::NAN, 0.0), GeoPoint::new(1.0, 0.0)];
        assert!(builder.line(&line).is_err());
    }

    #[test]
    fn sphere_outline_is_globe_radius() {
        let p = projection(0.0);
        let outline = PathBuilder::new(&p).sphere().unwrap();
        let center = ScreenPoint::new(400.0, 250.0);
        assert!(outline.closed);
        assert!(outline.points.iter().all(|pt| (pt.distance_to(center) - 200.0).abs() < 1e-6));
    }

    #[test]
    fn sphere_outline_is_map_frame() {
        let p = projection(1.0);
        let outline = PathBuilder::new(&p).sphere().unwrap();
        let xs: Vec<f64> = outline.points.iter().map(|pt| pt.x).collect();
        let min = xs.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = xs.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        assert!((min - (400.0 - 200.0 * PI)).abs() < 1e-6);
        assert!((max - (400.0 + 200.0 * PI)).abs() < 1e-6);
    }
}
