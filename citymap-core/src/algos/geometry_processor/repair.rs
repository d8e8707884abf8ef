use crate::{
    constants::{EPS_ANG, EPS_POS, MIN_RING_AREA_M2},
    types::{Point, Ring, signed_area},
};

fn cross(o: &Point, a: &Point, b: &Point) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

fn dedup_consecutive(ring: &mut Ring) {
    ring.dedup_by(|b, a| a.distance(b) <= EPS_POS);

    while ring.len() > 1 && ring[0].distance(&ring[ring.len() - 1]) <= EPS_POS {
        ring.pop();
    }
}

// Drops vertices whose two edges are collinear: straight-through points and spikes alike.
fn drop_collinear(ring: &mut Ring) -> bool {
    let n = ring.len();
    if n < 3 {
        return false;
    }

    let mut keep = vec![true; n];
    let mut changed = false;

    for i in 0..n {
        let prev = ring[(i + n - 1) % n];
        let next = ring[(i + 1) % n];
        let cur = ring[i];

        let scale = prev.distance(&cur) * cur.distance(&next);
        if cross(&prev, &cur, &next).abs() <= EPS_ANG * scale.max(EPS_POS) {
            keep[i] = false;
            changed = true;
            // One vertex per pass, its neighbours are re-evaluated on the next one.
            break;
        }
    }

    if changed {
        let mut idx = 0;
        ring.retain(|_| {
            let kept = keep[idx];
            idx += 1;
            kept
        });
    }

    changed
}

/// Best-effort ring repair: non-finite and duplicate vertices go, the implicit closing vertex
/// is removed, spikes and collinear vertices are collapsed. Fails when what is left cannot
/// bound an area.
pub(crate) fn repair_ring(ring: &[Point]) -> Result<Ring, String> {
    let mut ring = ring
        .iter()
        .copied()
        .filter(Point::is_finite)
        .collect::<Ring>();

    dedup_consecutive(&mut ring);

    loop {
        let changed = drop_collinear(&mut ring);
        dedup_consecutive(&mut ring);

        if !changed {
            break;
        }
    }

    if ring.len() < 3 {
        return Err("fewer than three distinct vertices".to_string());
    }

    let area = signed_area(&ring).abs();
    if area < MIN_RING_AREA_M2 {
        return Err(format!("degenerate area of {area:.3} m2"));
    }

    Ok(ring)
}

/// Reorients `ring` counter-clockwise (or clockwise) in place.
pub(crate) fn orient(ring: &mut Ring, counter_clockwise: bool) {
    if (signed_area(ring) > 0.0) != counter_clockwise {
        ring.reverse();
    }
}

/// Rotates `ring` so that it starts at its smallest vertex.
pub(crate) fn canonical_start(ring: &mut Ring) {
    let start = ring
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(idx, _)| idx)
        .unwrap_or_default();

    ring.rotate_left(start);
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn closing_and_duplicate_vertices_are_removed() {
        let ring = vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
            Point::new(0.0, 0.0),
        ];

        let repaired = repair_ring(&ring).unwrap();
        assert_eq!(repaired.len(), 4);
    }

    #[test]
    fn spikes_are_collapsed() {
        // A dangling spike from (10, 5) out to (15, 5) and back.
        let ring = vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 5.0),
            Point::new(15.0, 5.0),
            Point::new(10.0, 5.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
        ];

        let repaired = repair_ring(&ring).unwrap();
        assert_eq!(
            repaired,
            vec![
                Point::new(0.0, 0.0),
                Point::new(10.0, 0.0),
                Point::new(10.0, 10.0),
                Point::new(0.0, 10.0),
            ]
        );
    }

    #[test]
    fn degenerate_rings_fail() {
        let line = vec![
            Point::new(0.0, 0.0),
            Point::new(5.0, 0.0),
            Point::new(10.0, 0.0),
        ];
        assert!(repair_ring(&line).is_err());

        let sliver = vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 0.01),
        ];
        assert!(repair_ring(&sliver).unwrap_err().contains("degenerate area"));

        let broken = vec![Point::new(f64::NAN, 0.0), Point::new(1.0, 1.0)];
        assert!(repair_ring(&broken).is_err());
    }

    #[test]
    fn canonical_start_and_orientation() {
        let mut ring = vec![
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
        ];

        canonical_start(&mut ring);
        assert_eq!(ring[0], Point::new(0.0, 0.0));

        orient(&mut ring, false);
        assert!(signed_area(&ring) < 0.0);
        orient(&mut ring, true);
        assert!(signed_area(&ring) > 0.0);
    }
}
