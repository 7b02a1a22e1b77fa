//! Front-hemisphere visibility and great-circle link curves

use crate::geo::{distance, GeoPoint, GreatCircle, HEMISPHERE};
use crate::projection::{Projection, ScreenPoint};

/// Samples along a link's great circle, endpoints included.
pub const ARC_SAMPLES: usize = 51;

/// Line segments used to flatten each cubic of the smoothed curve.
const BEZIER_STEPS: usize = 6;

/// Whether `point` faces the viewer.
///
/// The point must project, and lie within a quarter turn of whatever sits
/// under the surface `center`. A projection that cannot say what is under
/// the center treats everything as visible.
pub fn is_visible<P: Projection>(projection: &P, point: GeoPoint, center: ScreenPoint) -> bool {
    if projection.project(point).is_none() {
        return false;
    }
    match projection.invert(center) {
        Some(facing) => distance(point, facing) < HEMISPHERE,
        None => true,
    }
}

/// Smoothed screen-space curve along the great circle from `from` to `to`.
///
/// `None` when either endpoint fails to project or fewer than two samples
/// survive projection.
pub fn arc_path<P: Projection>(projection: &P, from: GeoPoint, to: GeoPoint) -> Option<Vec<ScreenPoint>> {
    projection.project(from)?;
    projection.project(to)?;

    let circle = GreatCircle::new(from, to);
    let last = (ARC_SAMPLES - 1) as f64;
    let projected: Vec<ScreenPoint> = (0..ARC_SAMPLES)
        .filter_map(|i| {
            let point = circle.at(i as f64 / last);
            if point.is_finite() {
                projection.project(point)
            } else {
                None
            }
        })
        .collect();

    if projected.len() < 2 {
        return None;
    }
    Some(basis_curve(&projected))
}

/// Uniform cubic B-spline through `points`, flattened to a polyline.
///
/// Starts exactly at the first point and ends exactly at the last; interior
/// points act as control points, as in a basis-curve path generator.
pub fn basis_curve(points: &[ScreenPoint]) -> Vec<ScreenPoint> {
    match points {
        [] => Vec::new(),
        [only] => vec![*only],
        [a, b] => vec![*a, *b],
        _ => {
            let mut out = Vec::with_capacity(points.len() * BEZIER_STEPS + 2);
            out.push(points[0]);
            let (p0, p1) = (points[0], points[1]);
            out.push(weighted(&[(p0, 5.0), (p1, 1.0)], 6.0));

            let mut prev = p0;
            let mut curr = p1;
            for &next in &points[2..] {
                push_segment(&mut out, prev, curr, next);
                prev = curr;
                curr = next;
            }
            push_segment(&mut out, prev, curr, curr);
            out.push(curr);
            out
        }
    }
}

fn push_segment(out: &mut Vec<ScreenPoint>, x0: ScreenPoint, x1: ScreenPoint, x: ScreenPoint) {
    let start = match out.last() {
        Some(p) => *p,
        None => x0,
    };
    let c1 = weighted(&[(x0, 2.0), (x1, 1.0)], 3.0);
    let c2 = weighted(&[(x0, 1.0), (x1, 2.0)], 3.0);
    let end = weighted(&[(x0, 1.0), (x1, 4.0), (x, 1.0)], 6.0);
    for step in 1..=BEZIER_STEPS {
        let t = step as f64 / BEZIER_STEPS as f64;
        out.push(cubic(start, c1, c2, end, t));
    }
}

fn weighted(terms: &[(ScreenPoint, f64)], total: f64) -> ScreenPoint {
    let (x, y) = terms
        .iter()
        .fold((0.0, 0.0), |(x, y), (p, w)| (x + p.x * w, y + p.y * w));
    ScreenPoint::new(x / total, y / total)
}

fn cubic(p0: ScreenPoint, p1: ScreenPoint, p2: ScreenPoint, p3: ScreenPoint, t: f64) -> ScreenPoint {
    let u = 1.0 - t;
    let (a, b, c, d) = (u * u * u, 3.0 * u * u * t, 3.0 * u * t * t, t * t * t);
    ScreenPoint::new(
        a * p0.x + b * p1.x + c * p2.x + d * p3.x,
        a * p0.y + b * p1.y + c * p2.y + d * p3.y,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::{BlendedProjection, Rotation};

    fn globe() -> BlendedProjection {
        let mut p = BlendedProjection::globe_to_map();
        p.set_scale(220.0);
        p.set_translate(ScreenPoint::new(400.0, 250.0));
        p
    }

    /// Projects nothing west of the prime meridian.
    struct HalfWorld;

    impl Projection for HalfWorld {
        fn project(&self, point: GeoPoint) -> Option<ScreenPoint> {
            (point.lon >= 0.0).then(|| ScreenPoint::new(point.lon, -point.lat))
        }

        fn invert(&self, _point: ScreenPoint) -> Option<GeoPoint> {
            None
        }
    }

    #[test]
    fn front_and_back_hemisphere() {
        let p = globe();
        let center = ScreenPoint::new(400.0, 250.0);
        assert!(is_visible(&p, GeoPoint::new(10.0, 10.0), center));
        assert!(!is_visible(&p, GeoPoint::new(150.0, 0.0), center));
    }

    #[test]
    fn visibility_follows_rotation() {
        let mut p = globe();
        let center = ScreenPoint::new(400.0, 250.0);
        p.set_rotation(Rotation::new(-150.0, 0.0));
        assert!(is_visible(&p, GeoPoint::new(150.0, 0.0), center));
        assert!(!is_visible(&p, GeoPoint::new(0.0, 0.0), center));
    }

    #[test]
    fn no_inverse_means_visible() {
        let center = ScreenPoint::new(0.0, 0.0);
        assert!(is_visible(&HalfWorld, GeoPoint::new(100.0, 0.0), center));
        assert!(!is_visible(&HalfWorld, GeoPoint::new(-100.0, 0.0), center));
    }

    #[test]
    fn arc_requires_both_endpoints() {
        let a = GeoPoint::new(10.0, 0.0);
        let b = GeoPoint::new(-10.0, 0.0);
        assert!(arc_path(&HalfWorld, a, b).is_none());
        assert!(arc_path(&HalfWorld, b, a).is_none());
    }

    #[test]
    fn arc_connects_endpoints() {
        let p = globe();
        let from = GeoPoint::new(-122.17, 37.43);
        let to = GeoPoint::new(-0.13, 51.51);
        let curve = arc_path(&p, from, to).unwrap();
        assert!(curve.len() >= 2);
        let start = p.project(from).unwrap();
        let end = p.project(to).unwrap();
        assert!(curve[0].distance_to(start) < 1e-9);
        assert!(curve[curve.len() - 1].distance_to(end) < 1e-9);
    }

    #[test]
    fn arc_between_coincident_points_still_draws() {
        let p = globe();
        let here = GeoPoint::new(5.0, 5.0);
        let curve = arc_path(&p, here, here).unwrap();
        assert!(curve.len() >= 2);
    }

    #[test]
    fn basis_curve_of_two_points_is_a_line() {
        let a = ScreenPoint::new(0.0, 0.0);
        let b = ScreenPoint::new(10.0, 0.0);
        assert_eq!(basis_curve(&[a, b]), vec![a, b]);
    }

    #[test]
    fn basis_curve_stays_in_hull() {
        let points: Vec<ScreenPoint> = (0..10)
            .map(|i| ScreenPoint::new(i as f64 * 10.0, if i % 2 == 0 { 0.0 } else { 20.0 }))
            .collect();
        let curve = basis_curve(&points);
        assert_eq!(curve.first(), points.first());
        assert_eq!(curve.last(), points.last());
        assert!(curve.iter().all(|p| (0.0..=20.0).contains(&p.y) && (0.0..=90.0).contains(&p.x)));
    }
}
