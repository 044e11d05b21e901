use serde::{Deserialize, Serialize};

use carelink_core::ZoneId;

/// A 2D point in the household's local coordinate frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// One geofence zone, a simple closed polygon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub id: ZoneId,
    pub polygon: Vec<Point>,
}

impl Zone {
    /// Point-in-polygon via the even-odd (ray casting) rule.
    ///
    /// Points exactly on an edge count as inside, which errs toward the
    /// stricter zone when a reading sits on a boundary.
    #[must_use]
    pub fn contains(&self, p: Point) -> bool {
        let n = self.polygon.len();
        if n < 3 {
            return false;
        }
        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let a = self.polygon[i];
            let b = self.polygon[j];
            if on_segment(a, b, p) {
                return true;
            }
            if (a.y > p.y) != (b.y > p.y) {
                let x_cross = (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x;
                if p.x < x_cross {
                    inside = !inside;
                }
            }
            j = i;
        }
        inside
    }
}

/// Find the first zone containing the point, in declaration order.
#[must_use]
pub fn locate(zones: &[Zone], p: Point) -> Option<&ZoneId> {
    zones.iter().find(|z| z.contains(p)).map(|z| &z.id)
}

fn on_segment(a: Point, b: Point, p: Point) -> bool {
    let cross = (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x);
    if cross.abs() > 1e-9 {
        return false;
    }
    let within_x = p.x >= a.x.min(b.x) - 1e-9 && p.x <= a.x.max(b.x) + 1e-9;
    let within_y = p.y >= a.y.min(b.y) - 1e-9 && p.y <= a.y.max(b.y) + 1e-9;
    within_x && within_y
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square() -> Zone {
        Zone {
            id: ZoneId::new("home"),
            polygon: vec![
                Point::new(0.0, 0.0),
                Point::new(1.0, 0.0),
                Point::new(1.0, 1.0),
                Point::new(0.0, 1.0),
            ],
        }
    }

    #[test]
    fn inside_and_outside() {
        let zone = unit_square();
        assert!(zone.contains(Point::new(0.5, 0.5)));
        assert!(!zone.contains(Point::new(1.5, 0.5)));
        assert!(!zone.contains(Point::new(-0.1, 0.5)));
    }

    #[test]
    fn boundary_counts_as_inside() {
        let zone = unit_square();
        assert!(zone.contains(Point::new(1.0, 0.5)));
        assert!(zone.contains(Point::new(0.0, 0.0)));
    }

    #[test]
    fn degenerate_polygon_contains_nothing() {
        let zone = Zone {
            id: ZoneId::new("line"),
            polygon: vec![Point::new(0.0, 0.0), Point::new(1.0, 1.0)],
        };
        assert!(!zone.contains(Point::new(0.5, 0.5)));
    }

    #[test]
    fn locate_finds_first_match() {
        let zones = vec![
            unit_square(),
            Zone {
                id: ZoneId::new("garden"),
                polygon: vec![
                    Point::new(1.0, 0.0),
                    Point::new(3.0, 0.0),
                    Point::new(3.0, 2.0),
                    Point::new(1.0, 2.0),
                ],
            },
        ];
        assert_eq!(
            locate(&zones, Point::new(2.0, 1.0)).map(ZoneId::as_str),
            Some("garden")
        );
        assert!(locate(&zones, Point::new(9.0, 9.0)).is_none());
    }

    #[test]
    fn concave_polygon() {
        // L-shaped zone.
        let zone = Zone {
            id: ZoneId::new("l"),
            polygon: vec![
                Point::new(0.0, 0.0),
                Point::new(2.0, 0.0),
                Point::new(2.0, 1.0),
                Point::new(1.0, 1.0),
                Point::new(1.0, 2.0),
                Point::new(0.0, 2.0),
            ],
        };
        assert!(zone.contains(Point::new(0.5, 1.5)));
        assert!(!zone.contains(Point::new(1.5, 1.5)));
    }
}
