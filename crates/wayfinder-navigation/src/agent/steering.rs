//! Pure steering math used by [`NavigationAgent`](super::NavigationAgent).
//!
//! All functions work on the horizontal plane; `y` components of inputs are
//! ignored and outputs have `y = 0`.

use wayfinder_common::{Vector3, WorldPointExt};

/// Below this length a horizontal vector is treated as zero.
const EPSILON: f32 = 1e-6;

/// Point reached by walking `distance` along the path from `position`.
///
/// The walk goes straight to `waypoints[0]`, then along each following
/// segment. When the path is shorter than `distance` its last waypoint is
/// returned; with no waypoints, `position` itself.
pub fn lookahead_point(position: &Vector3, waypoints: &[Vector3], distance: f32) -> Vector3 {
    let mut budget = distance.max(0.0);
    let mut from = position.flattened();
    for waypoint in waypoints {
        let to = waypoint.flattened();
        let segment = to - from;
        let length = segment.norm();
        if budget < length {
            return from + segment * (budget / length);
        }
        budget -= length;
        from = to;
    }
    from
}

/// Repulsion away from the barycenter of `neighbors`.
///
/// The magnitude is `force / distance`, so closer crowds push harder. Returns
/// zero when there are no neighbors or the barycenter coincides with `position`.
pub fn avoidance_vector(position: &Vector3, neighbors: &[Vector3], force: f32) -> Vector3 {
    if neighbors.is_empty() {
        return Vector3::zeros();
    }
    let barycenter = neighbors.iter().fold(Vector3::zeros(), |acc, n| acc + n.flattened())
        / neighbors.len() as f32;
    let away = position.flattened() - barycenter;
    let distance = away.norm();
    if distance <= EPSILON {
        return Vector3::zeros();
    }
    away / distance * (force / distance)
}

/// Unit direction towards `steering_point`, bent by `avoidance`.
///
/// Returns zero when the combined direction vanishes.
pub fn desired_direction(position: &Vector3, steering_point: &Vector3, avoidance: &Vector3) -> Vector3 {
    bend_direction(&(steering_point - position), avoidance)
}

/// Unit `heading` bent by `avoidance`, or zero when the two cancel out.
pub fn bend_direction(heading: &Vector3, avoidance: &Vector3) -> Vector3 {
    let heading = heading.flattened().try_normalize(EPSILON).unwrap_or_else(Vector3::zeros);
    (heading + avoidance.flattened())
        .try_normalize(EPSILON)
        .unwrap_or_else(Vector3::zeros)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: &Vector3, b: &Vector3) -> bool {
        (a - b).norm() < 1e-5
    }

    #[test]
    fn test_lookahead_within_first_segment() {
        let waypoints = [Vector3::new(2.0, 0.0, 0.0), Vector3::new(2.0, 0.0, 2.0)];
        let point = lookahead_point(&Vector3::zeros(), &waypoints, 0.5);
        assert!(approx(&point, &Vector3::new(0.5, 0.0, 0.0)));
    }

    #[test]
    fn test_lookahead_cuts_corner() {
        let waypoints = [Vector3::new(0.2, 0.0, 0.0), Vector3::new(0.2, 0.0, 2.0)];
        let point = lookahead_point(&Vector3::zeros(), &waypoints, 0.5);
        assert!(approx(&point, &Vector3::new(0.2, 0.0, 0.3)));
    }

    #[test]
    fn test_lookahead_stops_at_path_end() {
        let waypoints = [Vector3::new(0.1, 5.0, 0.0)];
        let point = lookahead_point(&Vector3::zeros(), &waypoints, 0.5);
        assert!(approx(&point, &Vector3::new(0.1, 0.0, 0.0)));
        assert!(approx(&lookahead_point(&Vector3::new(1.0, 0.0, 1.0), &[], 0.5), &Vector3::new(1.0, 0.0, 1.0)));
    }

    #[test]
    fn test_avoidance_points_away() {
        let position = Vector3::new(0.0, 0.0, 0.0);
        let others = [Vector3::new(2.0, 0.0, 1.0), Vector3::new(2.0, 0.0, -1.0)];
        let push = avoidance_vector(&position, &others, 1.0);
        // Barycenter at (2, 0, 0): push is -x with magnitude 1 / 2
        assert!(approx(&push, &Vector3::new(-0.5, 0.0, 0.0)));

        let stronger = avoidance_vector(&position, &others, 4.0);
        assert!(approx(&stronger, &Vector3::new(-2.0, 0.0, 0.0)));
    }

    #[test]
    fn test_avoidance_degenerate_cases() {
        let position = Vector3::new(1.0, 0.0, 1.0);
        assert_eq!(avoidance_vector(&position, &[], 1.0), Vector3::zeros());
        assert_eq!(avoidance_vector(&position, &[position], 1.0), Vector3::zeros());
    }

    #[test]
    fn test_desired_direction() {
        let dir = desired_direction(&Vector3::zeros(), &Vector3::new(0.0, 3.0, 2.0), &Vector3::zeros());
        assert!(approx(&dir, &Vector3::new(0.0, 0.0, 1.0)));

        let bent = desired_direction(
            &Vector3::zeros(),
            &Vector3::new(0.0, 0.0, 2.0),
            &Vector3::new(1.0, 0.0, 0.0),
        );
        let expected = Vector3::new(1.0, 0.0, 1.0).normalize();
        assert!(approx(&bent, &expected));

        let cancelled = desired_direction(
            &Vector3::zeros(),
            &Vector3::new(0.0, 0.0, 2.0),
            &Vector3::new(0.0, 0.0, -1.0),
        );
        assert_eq!(cancelled, Vector3::zeros());
    }

    #[test]
    fn test_bend_direction() {
        // Length of the heading does not matter, only its direction
        let heading = Vector3::new(0.3, 0.0, 0.0);
        assert!(approx(&bend_direction(&heading, &Vector3::zeros()), &Vector3::x()));

        let bent = bend_direction(&heading, &Vector3::new(0.0, 2.0, -1.0));
        assert!(approx(&bent, &Vector3::new(1.0, 0.0, -1.0).normalize()));
        assert_eq!(bend_direction(&Vector3::zeros(), &Vector3::zeros()), Vector3::zeros());
    }
}
