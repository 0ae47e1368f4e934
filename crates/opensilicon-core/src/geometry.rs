use serde::{Deserialize, Serialize};

/// Nanometres per millimetre. Board coordinates are stored in nanometres.
pub const NM_PER_MM: f64 = 1_000_000.0;

/// Nanometres per mil (thousandth of an inch).
pub const NM_PER_MIL: f64 = 25_400.0;

/// Convert millimetres to board units.
pub fn mm(value: f64) -> f64 {
    value * NM_PER_MM
}

/// Convert mils to board units.
pub fn mil(value: f64) -> f64 {
    value * NM_PER_MIL
}

/// Convert board units to millimetres.
pub fn to_mm(value: f64) -> f64 {
    value / NM_PER_MM
}

/// A 2D point in board coordinates (nanometers).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn translate(&self, dx: f64, dy: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    fn sub(&self, other: &Point) -> Point {
        Point::new(self.x - other.x, self.y - other.y)
    }

    fn dot(&self, other: &Point) -> f64 {
        self.x * other.x + self.y * other.y
    }

    fn cross(&self, other: &Point) -> f64 {
        self.x * other.y - self.y * other.x
    }

    fn length(&self) -> f64 {
        self.dot(self).sqrt()
    }
}

/// An axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub min: Point,
    pub max: Point,
}

impl BBox {
    pub fn new(min: Point, max: Point) -> Self {
        Self { min, max }
    }

    pub fn from_points(points: &[Point]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let mut min_x = f64::MAX;
        let mut min_y = f64::MAX;
        let mut max_x = f64::MIN;
        let mut max_y = f64::MIN;
        for p in points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Some(Self {
            min: Point::new(min_x, min_y),
            max: Point::new(max_x, max_y),
        })
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.min.x + self.max.x) / 2.0,
            (self.min.y + self.max.y) / 2.0,
        )
    }

    pub fn contains_point(&self, p: &Point) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    pub fn intersects(&self, other: &BBox) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    pub fn union(&self, other: &BBox) -> Self {
        Self {
            min: Point::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            max: Point::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
        }
    }

    /// Grow the box by `margin` on every side.
    pub fn inflate(&self, margin: f64) -> Self {
        Self {
            min: self.min.translate(-margin, -margin),
            max: self.max.translate(margin, margin),
        }
    }

    pub fn corners(&self) -> Vec<Point> {
        vec![
            self.min,
            Point::new(self.max.x, self.min.y),
            self.max,
            Point::new(self.min.x, self.max.y),
        ]
    }
}

/// The copper (or courtyard) outline of an item on one layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    Segment { start: Point, end: Point, width: f64 },
    Circle { center: Point, radius: f64 },
    Rect { bbox: BBox },
    Polygon { points: Vec<Point> },
}

/// A shape reduced to a skeleton plus an inflation radius.
enum Skeleton<'a> {
    Seg(Point, Point),
    Poly(std::borrow::Cow<'a, [Point]>),
}

impl Shape {
    pub fn bbox(&self) -> Option<BBox> {
        match self {
            Shape::Segment { start, end, width } => {
                BBox::from_points(&[*start, *end]).map(|b| b.inflate(width / 2.0))
            }
            Shape::Circle { center, radius } => Some(BBox::new(*center, *center).inflate(*radius)),
            Shape::Rect { bbox } => Some(*bbox),
            Shape::Polygon { points } => BBox::from_points(points),
        }
    }

    fn skeleton(&self) -> (Skeleton<'_>, f64) {
        match self {
            Shape::Segment { start, end, width } => (Skeleton::Seg(*start, *end), width / 2.0),
            Shape::Circle { center, radius } => (Skeleton::Seg(*center, *center), *radius),
            Shape::Rect { bbox } => (Skeleton::Poly(bbox.corners().into()), 0.0),
            Shape::Polygon { points } => (Skeleton::Poly(points.as_slice().into()), 0.0),
        }
    }

    /// Edge-to-edge distance between two shapes; zero when they touch or overlap.
    pub fn distance_to(&self, other: &Shape) -> f64 {
        let (a, ra) = self.skeleton();
        let (b, rb) = other.skeleton();
        let core = match (&a, &b) {
            (Skeleton::Seg(a1, a2), Skeleton::Seg(b1, b2)) => segment_segment_distance(a1, a2, b1, b2),
            (Skeleton::Seg(s1, s2), Skeleton::Poly(poly))
            | (Skeleton::Poly(poly), Skeleton::Seg(s1, s2)) => segment_polygon_distance(s1, s2, poly),
            (Skeleton::Poly(pa), Skeleton::Poly(pb)) => polygon_polygon_distance(pa, pb),
        };
        (core - ra - rb).max(0.0)
    }

    /// Whether `point` lies inside or on the shape.
    pub fn contains_point(&self, point: &Point) -> bool {
        let (skeleton, radius) = self.skeleton();
        match skeleton {
            Skeleton::Seg(a, b) => point_segment_distance(point, &a, &b) <= radius,
            Skeleton::Poly(poly) => {
                point_in_polygon(point, &poly)
                    || polygon_edges(&poly).any(|(a, b)| point_segment_distance(point, a, b) == 0.0)
            }
        }
    }
}

/// Shortest distance from `p` to the segment `a`-`b`.
pub fn point_segment_distance(p: &Point, a: &Point, b: &Point) -> f64 {
    let ab = b.sub(a);
    let len_sq = ab.dot(&ab);
    if len_sq == 0.0 {
        return p.distance_to(a);
    }
    let t = (p.sub(a).dot(&ab) / len_sq).clamp(0.0, 1.0);
    let proj = Point::new(a.x + ab.x * t, a.y + ab.y * t);
    p.distance_to(&proj)
}

fn orientation(a: &Point, b: &Point, c: &Point) -> f64 {
    b.sub(a).cross(&c.sub(a))
}

/// Whether segments `a1`-`a2` and `b1`-`b2` cross or touch.
pub fn segments_intersect(a1: &Point, a2: &Point, b1: &Point, b2: &Point) -> bool {
    let d1 = orientation(b1, b2, a1);
    let d2 = orientation(b1, b2, a2);
    let d3 = orientation(a1, a2, b1);
    let d4 = orientation(a1, a2, b2);
    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
    {
        return true;
    }
    (d1 == 0.0 && point_segment_distance(a1, b1, b2) == 0.0)
        || (d2 == 0.0 && point_segment_distance(a2, b1, b2) == 0.0)
        || (d3 == 0.0 && point_segment_distance(b1, a1, a2) == 0.0)
        || (d4 == 0.0 && point_segment_distance(b2, a1, a2) == 0.0)
}

pub fn segment_segment_distance(a1: &Point, a2: &Point, b1: &Point, b2: &Point) -> f64 {
    if segments_intersect(a1, a2, b1, b2) {
        return 0.0;
    }
    point_segment_distance(a1, b1, b2)
        .min(point_segment_distance(a2, b1, b2))
        .min(point_segment_distance(b1, a1, a2))
        .min(point_segment_distance(b2, a1, a2))
}

/// Even-odd point in polygon test.
pub fn point_in_polygon(p: &Point, poly: &[Point]) -> bool {
    if poly.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = poly.len() - 1;
    for i in 0..poly.len() {
        let (pi, pj) = (&poly[i], &poly[j]);
        if (pi.y > p.y) != (pj.y > p.y) && p.x < (pj.x - pi.x) * (p.y - pi.y) / (pj.y - pi.y) + pi.x {
            inside = !inside;
        }
        j = i;
    }
    inside
}

fn polygon_edges(poly: &[Point]) -> impl Iterator<Item = (&Point, &Point)> {
    let n = poly.len();
    (0..n).map(move |i| (&poly[i], &poly[(i + 1) % n]))
}

fn segment_polygon_distance(a: &Point, b: &Point, poly: &[Point]) -> f64 {
    if point_in_polygon(a, poly) || point_in_polygon(b, poly) {
        return 0.0;
    }
    polygon_edges(poly)
        .map(|(p, q)| segment_segment_distance(a, b, p, q))
        .fold(f64::MAX, f64::min)
}

fn polygon_polygon_distance(pa: &[Point], pb: &[Point]) -> f64 {
    if pa.iter().any(|p| point_in_polygon(p, pb)) || pb.iter().any(|p| point_in_polygon(p, pa)) {
        return 0.0;
    }
    polygon_edges(pa)
        .flat_map(|(a1, a2)| polygon_edges(pb).map(move |(b1, b2)| segment_segment_distance(a1, a2, b1, b2)))
        .fold(f64::MAX, f64::min)
}

/// Angle in degrees (0..=180) between two direction vectors leaving a common point.
///
/// Returns `None` when either vector has zero length.
pub fn angle_between(origin: &Point, a: &Point, b: &Point) -> Option<f64> {
    let va = a.sub(origin);
    let vb = b.sub(origin);
    let (la, lb) = (va.length(), vb.length());
    if la == 0.0 || lb == 0.0 {
        return None;
    }
    let cos = (va.dot(&vb) / (la * lb)).clamp(-1.0, 1.0);
    Some(cos.acos().to_degrees())
}
