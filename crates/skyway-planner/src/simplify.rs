//! Greedy line-of-sight ("string-pulling") path simplification.
//!
//! From each kept point the scan walks forward while the straight segment
//! from that anchor stays clear, and keeps the last clear point.  The first
//! and last points always survive.  The result is shorter in point count,
//! not guaranteed shortest in length.

use skyway_geometry::{CollisionDetector, Point3};

/// Drop intermediate points that are visible from an earlier kept point.
///
/// Consecutive points of the output are connected by clear segments as long
/// as consecutive points of the input were.
pub fn simplify_path(detector: &CollisionDetector, points: &[Point3]) -> Vec<Point3> {
    if points.len() <= 2 {
        return points.to_vec();
    }

    let last = points.len() - 1;
    let mut out = vec![points[0]];
    let mut anchor = 0;
    while anchor < last {
        let from = points[anchor];
        let mut next = anchor + 1;
        for candidate in (anchor + 2)..=last {
            let to = points[candidate];
            if detector.is_path_clear(from.x, from.y, from.z, to.x, to.y, to.z) {
                next = candidate;
            } else {
                break;
            }
        }
        out.push(points[next]);
        anchor = next;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use skyway_types::BuildingVolume;

    fn p(x: f64, y: f64) -> Point3 {
        Point3::new(x, y, 100.0)
    }

    #[test]
    fn short_paths_are_returned_unchanged() {
        let d = CollisionDetector::new(Vec::new());
        assert!(simplify_path(&d, &[]).is_empty());
        assert_eq!(simplify_path(&d, &[p(0.0, 0.0)]), vec![p(0.0, 0.0)]);
        assert_eq!(
            simplify_path(&d, &[p(0.0, 0.0), p(5.0, 5.0)]),
            vec![p(0.0, 0.0), p(5.0, 5.0)]
        );
    }

    #[test]
    fn open_sky_collapses_to_endpoints() {
        let d = CollisionDetector::new(Vec::new());
        let zigzag = [p(0.0, 0.0), p(20.0, 20.0), p(40.0, 0.0), p(60.0, 20.0), p(80.0, 0.0)];
        assert_eq!(simplify_path(&d, &zigzag), vec![p(0.0, 0.0), p(80.0, 0.0)]);
    }

    #[test]
    fn corner_around_obstacle_is_kept() {
        // Block the direct line from (0,0) to (100,0) but not the dog-leg
        // through (0,100) and (100,100).
        let d = CollisionDetector::new(vec![BuildingVolume::new(40.0, -20.0, 20.0, 60.0, 500.0)]);
        let path = [
            p(0.0, 0.0),
            p(0.0, 50.0),
            p(0.0, 100.0),
            p(50.0, 100.0),
            p(100.0, 100.0),
            p(100.0, 50.0),
            p(100.0, 0.0),
        ];
        let simplified = simplify_path(&d, &path);
        assert_eq!(simplified.first(), Some(&p(0.0, 0.0)));
        assert_eq!(simplified.last(), Some(&p(100.0, 0.0)));
        assert!(simplified.len() < path.len());
        assert!(simplified.len() >= 3, "direct line is blocked");
        for w in simplified.windows(2) {
            assert!(d.is_path_clear(w[0].x, w[0].y, w[0].z, w[1].x, w[1].y, w[1].z));
        }
    }
}
