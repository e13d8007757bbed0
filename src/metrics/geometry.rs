// Geometry primitives for posture metrics
//
// All angles are in degrees. Inputs are normalized image coordinates, so the
// results are only meaningful relative to a baseline captured by the same
// camera.

use super::landmarks::Landmark;

/// Angle at vertex `b` between rays b→a and b→c, folded into [0, 180]
///
/// Direction-agnostic: swapping `a` and `c` gives the same value.
pub fn three_point_angle(a: &Landmark, b: &Landmark, c: &Landmark) -> f64 {
    let to_c = (c.y as f64 - b.y as f64).atan2(c.x as f64 - b.x as f64);
    let to_a = (a.y as f64 - b.y as f64).atan2(a.x as f64 - b.x as f64);
    let angle = (to_c - to_a).to_degrees().abs();
    if angle > 180.0 {
        360.0 - angle
    } else {
        angle
    }
}

/// Signed angle of the segment p1→p2 against the image x axis, in (-180, 180]
pub fn directional_angle(p1: &Landmark, p2: &Landmark) -> f64 {
    (p2.y as f64 - p1.y as f64)
        .atan2(p2.x as f64 - p1.x as f64)
        .to_degrees()
}

/// Smallest absolute difference between two directional angles, in [0, 180]
///
/// Directional angles wrap at ±180, so 179 and -179 are 2 degrees apart.
pub fn angular_difference(a: f64, b: f64) -> f64 {
    let delta = (a - b).rem_euclid(360.0);
    if delta > 180.0 {
        360.0 - delta
    } else {
        delta
    }
}

/// Scale applied to depth differentials so they land in a degree-like range
pub const DEPTH_SCALE: f64 = 100.0;

/// Mean of (shoulder.z - ear.z) over both sides, negated and scaled
///
/// Larger values mean the shoulders have rolled forward of the ears.
pub fn depth_differential(
    left_ear: &Landmark,
    left_shoulder: &Landmark,
    right_ear: &Landmark,
    right_shoulder: &Landmark,
) -> f64 {
    let left = left_shoulder.z as f64 - left_ear.z as f64;
    let right = right_shoulder.z as f64 - right_ear.z as f64;
    -((left + right) / 2.0) * DEPTH_SCALE
}
