//! Pure 2-D geometry: orientation, segment intersection, and the ray-casting
//! point-in-polygon test used for hit-testing gate shapes.

#[cfg(test)]
#[path = "geometry_test.rs"]
mod geometry_test;

use crate::consts::RAY_EXTENT;
use crate::coords::Point;

/// Turn direction of an ordered point triplet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Collinear,
    Clockwise,
    CounterClockwise,
}

/// Orientation of the triplet `(p, q, r)` from the sign of `(q - p) × (r - q)`.
#[must_use]
pub fn orientation(p: Point, q: Point, r: Point) -> Orientation {
    let val = (q.y - p.y) * (r.x - q.x) - (q.x - p.x) * (r.y - q.y);
    if val == 0.0 {
        Orientation::Collinear
    } else if val > 0.0 {
        Orientation::Clockwise
    } else {
        Orientation::CounterClockwise
    }
}

/// Whether `q` lies within the bounding box of segment `p`–`r`.
///
/// Only meaningful when the three points are collinear.
#[must_use]
pub fn on_segment(p: Point, q: Point, r: Point) -> bool {
    q.x <= p.x.max(r.x) && q.x >= p.x.min(r.x) && q.y <= p.y.max(r.y) && q.y >= p.y.min(r.y)
}

/// Whether segment `p1`–`q1` intersects segment `p2`–`q2`, touching included.
#[must_use]
pub fn segments_intersect(p1: Point, q1: Point, p2: Point, q2: Point) -> bool {
    let o1 = orientation(p1, q1, p2);
    let o2 = orientation(p1, q1, q2);
    let o3 = orientation(p2, q2, p1);
    let o4 = orientation(p2, q2, q1);

    if o1 != o2 && o3 != o4 {
        return true;
    }

    (o1 == Orientation::Collinear && on_segment(p1, p2, q1))
        || (o2 == Orientation::Collinear && on_segment(p1, q2, q1))
        || (o3 == Orientation::Collinear && on_segment(p2, p1, q2))
        || (o4 == Orientation::Collinear && on_segment(p2, q1, q2))
}

/// Ray-casting point-in-polygon test. Points on the boundary count as inside.
///
/// `polygon` is an ordered vertex loop; the closing edge from the last vertex
/// back to the first is implicit. Fewer than three vertices is never inside.
#[must_use]
pub fn point_in_polygon(polygon: &[Point], p: Point) -> bool {
    let n = polygon.len();
    if n < 3 {
        return false;
    }

    let extreme = Point::new(RAY_EXTENT, p.y);
    let mut crossings = 0usize;

    for i in 0..n {
        let a = polygon[i];
        let b = polygon[(i + 1) % n];

        if orientation(a, p, b) == Orientation::Collinear && on_segment(a, p, b) {
            return true;
        }
        // Half-open: an edge counts only when exactly one endpoint is above
        // the ray, so a ray through a vertex is counted once.
        if (a.y > p.y) != (b.y > p.y) && segments_intersect(a, b, p, extreme) {
            crossings += 1;
        }
    }

    crossings % 2 == 1
}

/// Axis-aligned bounding box of a point set, or `None` when empty.
#[must_use]
pub fn bounds(points: &[Point]) -> Option<(Point, Point)> {
    let first = points.first()?;
    let mut min = *first;
    let mut max = *first;
    for p in &points[1..] {
        min.x = min.x.min(p.x);
        min.y = min.y.min(p.y);
        max.x = max.x.max(p.x);
        max.y = max.y.max(p.y);
    }
    Some((min, max))
}
