use crate::{
    constants::{EPS_DENOM, EPS_POS},
    types::{Point, Rect, Ring},
};

fn clamp_to(rect: &Rect, point: Point) -> Point {
    Point::new(
        point.x.clamp(rect.min.x, rect.max.x),
        point.y.clamp(rect.min.y, rect.max.y),
    )
}

/// Liang–Barsky clipping of a single segment.
pub(crate) fn clip_segment(a: Point, b: Point, rect: &Rect) -> Option<(Point, Point)> {
    let dx = b.x - a.x;
    let dy = b.y - a.y;

    let mut t0: f64 = 0.0;
    let mut t1: f64 = 1.0;

    for (p, q) in [
        (-dx, a.x - rect.min.x),
        (dx, rect.max.x - a.x),
        (-dy, a.y - rect.min.y),
        (dy, rect.max.y - a.y),
    ] {
        if p.abs() <= EPS_DENOM {
            // Parallel to this boundary: either fully outside or irrelevant.
            if q < 0.0 {
                return None;
            }
            continue;
        }

        let r = q / p;
        if p < 0.0 {
            if r > t1 {
                return None;
            }
            t0 = t0.max(r);
        } else {
            if r < t0 {
                return None;
            }
            t1 = t1.min(r);
        }
    }

    if t0 > t1 {
        return None;
    }

    let start = Point::new(a.x + t0 * dx, a.y + t0 * dy);
    let end = Point::new(a.x + t1 * dx, a.y + t1 * dy);

    Some((clamp_to(rect, start), clamp_to(rect, end)))
}

/// Clips a polyline to `rect`, returning every connected run that lies inside.
pub(crate) fn clip_polyline(points: &[Point], rect: &Rect) -> Vec<Vec<Point>> {
    let mut runs: Vec<Vec<Point>> = Vec::new();
    let mut current: Vec<Point> = Vec::new();

    for pair in points.windows(2) {
        let Some((start, end)) = clip_segment(pair[0], pair[1], rect) else {
            if current.len() >= 2 {
                runs.push(std::mem::take(&mut current));
            }
            current.clear();
            continue;
        };

        if start.distance(&end) <= EPS_POS {
            continue;
        }

        match current.last() {
            Some(last) if last.distance(&start) <= EPS_POS => current.push(end),
            _ => {
                if current.len() >= 2 {
                    runs.push(std::mem::take(&mut current));
                }
                current = vec![start, end];
            }
        }
    }

    if current.len() >= 2 {
        runs.push(current);
    }

    runs
}

#[derive(Clone, Copy)]
enum Boundary {
    Left,
    Right,
    Bottom,
    Top,
}

impl Boundary {
    fn inside(&self, rect: &Rect, point: &Point) -> bool {
        match self {
            Boundary::Left => point.x >= rect.min.x,
            Boundary::Right => point.x <= rect.max.x,
            Boundary::Bottom => point.y >= rect.min.y,
            Boundary::Top => point.y <= rect.max.y,
        }
    }

    fn crossing(&self, rect: &Rect, a: &Point, b: &Point) -> Point {
        match self {
            Boundary::Left | Boundary::Right => {
                let x = if matches!(self, Boundary::Left) {
                    rect.min.x
                } else {
                    rect.max.x
                };
                let t = (x - a.x) / (b.x - a.x);
                Point::new(x, a.y + t * (b.y - a.y))
            }
            Boundary::Bottom | Boundary::Top => {
                let y = if matches!(self, Boundary::Bottom) {
                    rect.min.y
                } else {
                    rect.max.y
                };
                let t = (y - a.y) / (b.y - a.y);
                Point::new(a.x + t * (b.x - a.x), y)
            }
        }
    }
}

/// Sutherland–Hodgman clipping of an open ring. Concave rings may come back with degenerate
/// edges running along the frame; ring repair removes them.
pub(crate) fn clip_ring(ring: &[Point], rect: &Rect) -> Ring {
    let mut output = ring.to_vec();

    for boundary in [
        Boundary::Left,
        Boundary::Right,
        Boundary::Bottom,
        Boundary::Top,
    ] {
        let input = std::mem::take(&mut output);
        let Some(mut previous) = input.last().copied() else {
            break;
        };

        for current in input {
            let current_inside = boundary.inside(rect, &current);
            let previous_inside = boundary.inside(rect, &previous);

            if current_inside {
                if !previous_inside {
                    output.push(boundary.crossing(rect, &previous, &current));
                }
                output.push(current);
            } else if previous_inside {
                output.push(boundary.crossing(rect, &previous, &current));
            }

            previous = current;
        }
    }

    output
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::types::signed_area;

    fn frame() -> Rect {
        Rect::centered(Point::ZERO, 10.0, 5.0)
    }

    #[test]
    fn segment_crossing_the_frame_is_cut_at_both_sides() {
        let (a, b) = clip_segment(Point::new(-20.0, 0.0), Point::new(20.0, 0.0), &frame()).unwrap();

        assert_eq!(a, Point::new(-10.0, 0.0));
        assert_eq!(b, Point::new(10.0, 0.0));
    }

    #[test]
    fn segment_outside_is_dropped() {
        assert!(clip_segment(Point::new(-20.0, 6.0), Point::new(20.0, 6.0), &frame()).is_none());
        assert!(clip_segment(Point::new(11.0, -20.0), Point::new(30.0, 20.0), &frame()).is_none());
    }

    #[test]
    fn polyline_leaving_and_reentering_splits_into_runs() {
        let points = vec![
            Point::new(-5.0, 0.0),
            Point::new(-5.0, 10.0),
            Point::new(5.0, 10.0),
            Point::new(5.0, 0.0),
        ];

        let runs = clip_polyline(&points, &frame());
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0], vec![Point::new(-5.0, 0.0), Point::new(-5.0, 5.0)]);
        assert_eq!(runs[1], vec![Point::new(5.0, 5.0), Point::new(5.0, 0.0)]);
    }

    #[test]
    fn ring_is_cut_to_the_frame() {
        let ring = vec![
            Point::new(0.0, 0.0),
            Point::new(20.0, 0.0),
            Point::new(20.0, 20.0),
            Point::new(0.0, 20.0),
        ];

        let clipped = clip_ring(&ring, &frame());
        assert!((signed_area(&clipped) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn ring_outside_vanishes() {
        let ring = vec![
            Point::new(30.0, 30.0),
            Point::new(40.0, 30.0),
            Point::new(40.0, 40.0),
        ];

        assert!(clip_ring(&ring, &frame()).is_empty());
    }
}
