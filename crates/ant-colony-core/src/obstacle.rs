use crate::vector::Vec2;
use rstar::{RTree, RTreeObject, AABB};
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_4, PI};

/// Probe length used when looking for an escape heading.
pub const ESCAPE_PROBE_DISTANCE: f64 = 50.0;
/// Ring spacing of the free-position search.
pub const FREE_POSITION_STEP: f64 = 15.0;
const FREE_POSITION_MAX_RINGS: usize = 200;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Shape {
    Rectangle { half_width: f64, half_height: f64 },
    Circle { radius: f64 },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    pub center: Vec2,
    pub shape: Shape,
}

impl Obstacle {
    pub fn rectangle(center: Vec2, width: f64, height: f64) -> Self {
        Self {
            center,
            shape: Shape::Rectangle {
                half_width: width.abs() * 0.5,
                half_height: height.abs() * 0.5,
            },
        }
    }

    pub fn circle(center: Vec2, radius: f64) -> Self {
        Self {
            center,
            shape: Shape::Circle {
                radius: radius.abs(),
            },
        }
    }

    fn half_extents(&self) -> Vec2 {
        match self.shape {
            Shape::Rectangle {
                half_width,
                half_height,
            } => Vec2::new(half_width, half_height),
            Shape::Circle { radius } => Vec2::new(radius, radius),
        }
    }

    /// Axis-aligned bounds as `(min, max)` corners.
    pub fn bounds(&self) -> (Vec2, Vec2) {
        let h = self.half_extents();
        (self.center - h, self.center + h)
    }

    /// Distance from `point` to the shape's surface, 0 inside.
    pub fn distance_to_point(&self, point: Vec2) -> f64 {
        match self.shape {
            Shape::Circle { radius } => (point.distance(self.center) - radius).max(0.0),
            Shape::Rectangle {
                half_width,
                half_height,
            } => {
                let dx = ((point.x - self.center.x).abs() - half_width).max(0.0);
                let dy = ((point.y - self.center.y).abs() - half_height).max(0.0);
                (dx * dx + dy * dy).sqrt()
            }
        }
    }

    /// Rounded-rectangle / inflated-circle test: the shape grown by `radius`
    /// contains `point`.
    pub fn intersects(&self, point: Vec2, radius: f64) -> bool {
        self.distance_to_point(point) <= radius.max(0.0)
    }

    /// Shortest distance between the segment `from..to` and the shape.
    pub fn distance_to_segment(&self, from: Vec2, to: Vec2) -> f64 {
        match self.shape {
            Shape::Circle { radius } => {
                (point_segment_distance(self.center, from, to) - radius).max(0.0)
            }
            Shape::Rectangle { .. } => {
                let (min, max) = self.bounds();
                if segment_hits_box(from, to, min, max) {
                    return 0.0;
                }
                let corners = [
                    min,
                    Vec2::new(max.x, min.y),
                    max,
                    Vec2::new(min.x, max.y),
                ];
                corners
                    .iter()
                    .map(|&c| point_segment_distance(c, from, to))
                    .fold(
                        self.distance_to_point(from).min(self.distance_to_point(to)),
                        f64::min,
                    )
            }
        }
    }
}

impl RTreeObject for Obstacle {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        let (min, max) = self.bounds();
        AABB::from_corners(min.to_array(), max.to_array())
    }
}

fn point_segment_distance(point: Vec2, from: Vec2, to: Vec2) -> f64 {
    let seg = to - from;
    let len_sq = seg.length_squared();
    if len_sq == 0.0 {
        return point.distance(from);
    }
    let t = ((point - from).dot(seg) / len_sq).clamp(0.0, 1.0);
    point.distance(from + seg * t)
}

/// Slab test of a segment against a closed axis-aligned box.
fn segment_hits_box(from: Vec2, to: Vec2, min: Vec2, max: Vec2) -> bool {
    let d = to - from;
    let mut t_min = 0.0f64;
    let mut t_max = 1.0f64;
    for (origin, dir, lo, hi) in [(from.x, d.x, min.x, max.x), (from.y, d.y, min.y, max.y)] {
        if dir == 0.0 {
            if origin < lo || origin > hi {
                return false;
            }
            continue;
        }
        let (mut t0, mut t1) = ((lo - origin) / dir, (hi - origin) / dir);
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
        }
        t_min = t_min.max(t0);
        t_max = t_max.min(t1);
        if t_min > t_max {
            return false;
        }
    }
    true
}

fn inflated_envelope(min: Vec2, max: Vec2, radius: f64) -> AABB<[f64; 2]> {
    let r = radius.max(0.0);
    AABB::from_corners([min.x - r, min.y - r], [max.x + r, max.y + r])
}

/// Static collision geometry, indexed by an R*-tree of bounding boxes.
#[derive(Clone, Debug, Default)]
pub struct ObstacleField {
    tree: RTree<Obstacle>,
}

impl ObstacleField {
    pub fn new(obstacles: Vec<Obstacle>) -> Self {
        Self {
            tree: RTree::bulk_load(obstacles),
        }
    }

    pub fn insert(&mut self, obstacle: Obstacle) {
        self.tree.insert(obstacle);
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Obstacle> {
        self.tree.iter()
    }

    /// True when a disc of `radius` at `point` overlaps any obstacle.
    pub fn intersects(&self, point: Vec2, radius: f64) -> bool {
        if !point.is_finite() {
            return false;
        }
        let envelope = inflated_envelope(point, point, radius);
        self.tree
            .locate_in_envelope_intersecting(&envelope)
            .any(|o| o.intersects(point, radius))
    }

    /// True when sweeping a disc of `radius` from `from` to `to` touches an
    /// obstacle. A zero-length segment degrades to [`intersects`](Self::intersects).
    pub fn segment_blocked(&self, from: Vec2, to: Vec2, radius: f64) -> bool {
        if !(from.is_finite() && to.is_finite()) {
            return false;
        }
        if from == to {
            return self.intersects(from, radius);
        }
        let min = Vec2::new(from.x.min(to.x), from.y.min(to.y));
        let max = Vec2::new(from.x.max(to.x), from.y.max(to.y));
        let envelope = inflated_envelope(min, max, radius);
        let radius = radius.max(0.0);
        self.tree
            .locate_in_envelope_intersecting(&envelope)
            .any(|o| o.distance_to_segment(from, to) <= radius)
    }

    /// Heading that leaves `position` unobstructed: `desired` turned by +45°,
    /// then -45°, else the reversed heading.
    pub fn find_escape_heading(&self, position: Vec2, desired: Vec2, radius: f64) -> Vec2 {
        let desired = desired.normalized();
        if desired.is_zero() {
            return desired;
        }
        for angle in [FRAC_PI_4, -FRAC_PI_4] {
            let candidate = desired.rotated(angle);
            let probe = position + candidate * ESCAPE_PROBE_DISTANCE;
            if !self.segment_blocked(position, probe, radius) {
                return candidate;
            }
        }
        -desired
    }

    /// Closest free spot found on rings of growing radius around `point`,
    /// restricted to the `width` x `height` map. Falls back to the map centre.
    pub fn nearest_free_position(&self, point: Vec2, radius: f64, width: f64, height: f64) -> Vec2 {
        let inside = |p: Vec2| p.x >= 0.0 && p.y >= 0.0 && p.x <= width && p.y <= height;
        if inside(point) && !self.intersects(point, radius) {
            return point;
        }
        for ring in 1..=FREE_POSITION_MAX_RINGS {
            let distance = ring as f64 * FREE_POSITION_STEP;
            for step in 0..8 {
                let candidate = point + Vec2::from_angle(step as f64 * PI / 4.0) * distance;
                if inside(candidate) && !self.intersects(candidate, radius) {
                    return candidate;
                }
            }
        }
        Vec2::new(width * 0.5, height * 0.5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wall() -> ObstacleField {
        ObstacleField::new(vec![Obstacle::rectangle(Vec2::new(100.0, 100.0), 20.0, 200.0)])
    }

    #[test]
    fn rectangle_uses_rounded_corners() {
        let o = Obstacle::rectangle(Vec2::new(0.0, 0.0), 10.0, 10.0);
        assert!(o.intersects(Vec2::new(0.0, 0.0), 0.0));
        assert!(o.intersects(Vec2::new(7.0, 0.0), 2.0));
        assert!(!o.intersects(Vec2::new(7.1, 0.0), 2.0));
        // corner region: diagonal distance 2.83 is beyond radius 2.5
        assert!(!o.intersects(Vec2::new(7.0, 7.0), 2.5));
        assert!(o.intersects(Vec2::new(7.0, 7.0), 3.0));
    }

    #[test]
    fn circle_compares_distance() {
        let o = Obstacle::circle(Vec2::new(10.0, 10.0), 5.0);
        assert!(o.intersects(Vec2::new(16.0, 10.0), 1.5));
        assert!(!o.intersects(Vec2::new(17.0, 10.0), 1.5));
    }

    #[test]
    fn field_intersects_uses_exact_shape() {
        let field = ObstacleField::new(vec![Obstacle::circle(Vec2::new(0.0, 0.0), 10.0)]);
        // inside the bounding box, outside the circle
        assert!(!field.intersects(Vec2::new(9.0, 9.0), 0.0));
        assert!(field.intersects(Vec2::new(5.0, 5.0), 0.0));
    }

    #[test]
    fn segment_crossing_wall_is_blocked() {
        let field = wall();
        assert!(field.segment_blocked(Vec2::new(50.0, 100.0), Vec2::new(150.0, 100.0), 0.0));
        assert!(!field.segment_blocked(Vec2::new(50.0, 100.0), Vec2::new(85.0, 100.0), 0.0));
        assert!(field.segment_blocked(Vec2::new(50.0, 100.0), Vec2::new(85.0, 100.0), 5.0));
    }

    #[test]
    fn segment_passing_circle_respects_radius() {
        let field = ObstacleField::new(vec![Obstacle::circle(Vec2::new(0.0, 0.0), 10.0)]);
        let from = Vec2::new(-50.0, 12.0);
        let to = Vec2::new(50.0, 12.0);
        assert!(!field.segment_blocked(from, to, 1.0));
        assert!(field.segment_blocked(from, to, 2.5));
    }

    #[test]
    fn zero_length_segment_is_point_test() {
        let field = wall();
        let p = Vec2::new(100.0, 50.0);
        assert!(field.segment_blocked(p, p, 0.0));
        let q = Vec2::new(10.0, 50.0);
        assert!(!field.segment_blocked(q, q, 0.0));
    }

    #[test]
    fn escape_heading_turns_aside_or_reverses() {
        let field = wall();
        let heading = field.find_escape_heading(Vec2::new(80.0, 100.0), Vec2::new(1.0, 0.0), 0.0);
        // both diagonals still cross the 200-tall wall, so the agent reverses
        assert!((heading.x + 1.0).abs() < 1e-12);

        let short = ObstacleField::new(vec![Obstacle::rectangle(
            Vec2::new(100.0, 100.0),
            20.0,
            20.0,
        )]);
        let heading = short.find_escape_heading(Vec2::new(70.0, 100.0), Vec2::new(1.0, 0.0), 0.0);
        assert!(heading.x > 0.0);
        assert!((heading.length() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn free_position_leaves_obstacle() {
        let field = wall();
        let p = field.nearest_free_position(Vec2::new(100.0, 100.0), 0.0, 1000.0, 800.0);
        assert!(!field.intersects(p, 0.0));
        assert!(p.distance(Vec2::new(100.0, 100.0)) <= 15.0);
        let free = Vec2::new(300.0, 300.0);
        assert_eq!(field.nearest_free_position(free, 0.0, 1000.0, 800.0), free);
    }

    #[test]
    fn empty_field_blocks_nothing() {
        let field = ObstacleField::default();
        assert!(field.is_empty());
        assert!(!field.intersects(Vec2::new(1.0, 1.0), 100.0));
        assert!(!field.segment_blocked(Vec2::ZERO, Vec2::new(5.0, 5.0), 1.0));
    }
}
