//! Hit volumes for every attack shape.
//!
//! These are plain functions over `Vec2` so the rules can be tested without
//! spinning up an App. Enemies are treated as circles (centre + radius).

use std::f32::consts::{PI, TAU};

use bevy::math::{Rect, Vec2};

/// Circle vs circle. Touching counts as overlapping.
pub fn circle_overlaps(a: Vec2, radius_a: f32, b: Vec2, radius_b: f32) -> bool {
    let reach = radius_a + radius_b;
    a.distance_squared(b) <= reach * reach
}

/// Axis-aligned rectangle vs circle. Used by the slam, which is a square
/// centred on the player.
pub fn rect_overlaps_circle(center: Vec2, half_extents: Vec2, point: Vec2, radius: f32) -> bool {
    let rect = Rect::from_center_half_size(center, half_extents);
    let closest = point.clamp(rect.min, rect.max);
    closest.distance_squared(point) <= radius * radius
}

/// Wraps an angle into (-PI, PI].
pub fn wrap_angle(angle: f32) -> f32 {
    let mut wrapped = angle % TAU;
    if wrapped <= -PI {
        wrapped += TAU;
    } else if wrapped > PI {
        wrapped -= TAU;
    }
    wrapped
}

/// Is `point` inside the swing arc?
///
/// The arc is centred on `facing` (any non-zero vector) and opens
/// `arc_angle` radians in total, so a target may deviate by half of it
/// either way. Distance is measured from `origin` to the target's centre and
/// must fall inside [min_radius, arc_radius].
pub fn in_swing_arc(
    origin: Vec2,
    facing: Vec2,
    point: Vec2,
    min_radius: f32,
    arc_radius: f32,
    arc_angle: f32,
) -> bool {
    let offset = point - origin;
    let distance = offset.length();
    if distance < min_radius || distance > arc_radius {
        return false;
    }
    // Standing on top of the player: always inside whatever the direction.
    if distance <= f32::EPSILON {
        return true;
    }

    let deviation = wrap_angle(offset.to_angle() - facing.to_angle());
    deviation.abs() <= arc_angle * 0.5
}

/// Shortest distance from `point` to the segment `a`-`b`.
pub fn distance_to_segment(a: Vec2, b: Vec2, point: Vec2) -> f32 {
    let ab = b - a;
    let length_sq = ab.length_squared();
    if length_sq <= f32::EPSILON {
        return point.distance(a);
    }
    let t = ((point - a).dot(ab) / length_sq).clamp(0.0, 1.0);
    point.distance(a + ab * t)
}

/// Lightning bolt hit test: a thick line from `a` to `b`.
pub fn segment_hits_circle(a: Vec2, b: Vec2, thickness: f32, point: Vec2, radius: f32) -> bool {
    distance_to_segment(a, b, point) <= thickness + radius
}

/// Damage dealt to enemies caught in an explosion around the primary target.
pub fn splash_damage(primary_damage: i32) -> i32 {
    primary_damage.max(0) / 2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circles_touching_count_as_overlap() {
        assert!(circle_overlaps(Vec2::ZERO, 10.0, Vec2::new(20.0, 0.0), 10.0));
        assert!(!circle_overlaps(Vec2::ZERO, 10.0, Vec2::new(20.1, 0.0), 10.0));
    }

    #[test]
    fn rect_catches_circle_near_its_corner() {
        let half = Vec2::splat(32.0);
        // Centre is outside the square but the body reaches the corner
        assert!(rect_overlaps_circle(Vec2::ZERO, half, Vec2::new(38.0, 38.0), 10.0));
        assert!(!rect_overlaps_circle(Vec2::ZERO, half, Vec2::new(45.0, 45.0), 10.0));
        assert!(rect_overlaps_circle(Vec2::ZERO, half, Vec2::new(5.0, -5.0), 1.0));
    }

    #[test]
    fn wrap_angle_stays_in_half_open_range() {
        assert!((wrap_angle(3.0 * PI - 0.1) - (PI - 0.1)).abs() < 1e-4);
        assert!((wrap_angle(-PI) - PI).abs() < 1e-5);
        assert!((wrap_angle(0.5) - 0.5).abs() < 1e-6);
        assert!((wrap_angle(-TAU - 0.25) + 0.25).abs() < 1e-5);
    }

    #[test]
    fn swing_arc_respects_angle() {
        let arc = 120f32.to_radians();
        let facing = Vec2::X;
        assert!(in_swing_arc(Vec2::ZERO, facing, Vec2::new(50.0, 0.0), 0.0, 64.0, arc));
        // 59 degrees off-axis is inside a 120 degree arc, 61 is not
        let inside = Vec2::from_angle(59f32.to_radians()) * 50.0;
        let outside = Vec2::from_angle(61f32.to_radians()) * 50.0;
        assert!(in_swing_arc(Vec2::ZERO, facing, inside, 0.0, 64.0, arc));
        assert!(!in_swing_arc(Vec2::ZERO, facing, outside, 0.0, 64.0, arc));
        // Directly behind
        assert!(!in_swing_arc(Vec2::ZERO, facing, Vec2::new(-30.0, 0.0), 0.0, 64.0, arc));
    }

    #[test]
    fn swing_arc_respects_radius_band() {
        let arc = 90f32.to_radians();
        let facing = Vec2::Y;
        assert!(!in_swing_arc(Vec2::ZERO, facing, Vec2::new(0.0, 10.0), 16.0, 64.0, arc));
        assert!(in_swing_arc(Vec2::ZERO, facing, Vec2::new(0.0, 16.0), 16.0, 64.0, arc));
        assert!(in_swing_arc(Vec2::ZERO, facing, Vec2::new(0.0, 64.0), 16.0, 64.0, arc));
        assert!(!in_swing_arc(Vec2::ZERO, facing, Vec2::new(0.0, 65.0), 16.0, 64.0, arc));
    }

    #[test]
    fn swing_arc_works_across_the_pi_seam() {
        // Facing straight left; targets just above and below the negative x axis
        // sit at angles near +PI and -PI respectively.
        let arc = 60f32.to_radians();
        let facing = Vec2::NEG_X;
        let above = Vec2::from_angle(PI - 0.2) * 40.0;
        let below = Vec2::from_angle(-PI + 0.2) * 40.0;
        assert!(in_swing_arc(Vec2::ZERO, facing, above, 0.0, 64.0, arc));
        assert!(in_swing_arc(Vec2::ZERO, facing, below, 0.0, 64.0, arc));
    }

    #[test]
    fn segment_distance_clamps_to_endpoints() {
        let a = Vec2::ZERO;
        let b = Vec2::new(100.0, 0.0);
        assert!((distance_to_segment(a, b, Vec2::new(50.0, 7.0)) - 7.0).abs() < 1e-4);
        assert!((distance_to_segment(a, b, Vec2::new(-3.0, 4.0)) - 5.0).abs() < 1e-4);
        assert!((distance_to_segment(a, b, Vec2::new(103.0, 4.0)) - 5.0).abs() < 1e-4);
        // Degenerate segment falls back to point distance
        assert!((distance_to_segment(a, a, Vec2::new(3.0, 4.0)) - 5.0).abs() < 1e-4);
    }

    #[test]
    fn bolt_thickness_and_body_radius_both_count() {
        let a = Vec2::ZERO;
        let b = Vec2::new(200.0, 0.0);
        assert!(segment_hits_circle(a, b, 10.0, Vec2::new(120.0, 22.0), 12.0));
        assert!(!segment_hits_circle(a, b, 10.0, Vec2::new(120.0, 23.0), 12.0));
    }

    #[test]
    fn splash_is_half_rounded_down() {
        assert_eq!(splash_damage(20), 10);
        assert_eq!(splash_damage(25), 12);
        assert_eq!(splash_damage(1), 0);
        assert_eq!(splash_damage(-4), 0);
    }
}
