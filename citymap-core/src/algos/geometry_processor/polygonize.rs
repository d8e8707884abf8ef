use super::planarize::Arrangement;
use crate::types::{Polygon, Rect, Ring, ring_contains, signed_area};

use std::collections::VecDeque;

struct Components {
    parent: Vec<usize>,
}

impl Components {
    fn new(size: usize) -> Self {
        Components {
            parent: (0..size).collect(),
        }
    }

    fn find(&mut self, mut node: usize) -> usize {
        while self.parent[node] != node {
            self.parent[node] = self.parent[self.parent[node]];
            node = self.parent[node];
        }
        node
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            // The smaller root wins so labels do not depend on union order.
            let (low, high) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[high] = low;
        }
    }
}

// Removes dangling edges until every remaining vertex closes at least one cycle.
fn prune_dangles(vertex_count: usize, edges: &[(usize, usize)]) -> Vec<(usize, usize)> {
    let mut incident = vec![Vec::new(); vertex_count];
    for (id, (u, v)) in edges.iter().enumerate() {
        incident[*u].push(id);
        incident[*v].push(id);
    }

    let mut degree = incident.iter().map(Vec::len).collect::<Vec<_>>();
    let mut alive = vec![true; edges.len()];
    let mut queue = (0..vertex_count)
        .filter(|v| degree[*v] == 1)
        .collect::<VecDeque<_>>();

    while let Some(vertex) = queue.pop_front() {
        if degree[vertex] != 1 {
            continue;
        }

        let Some(&edge) = incident[vertex].iter().find(|e| alive[**e]) else {
            continue;
        };
        alive[edge] = false;

        let (u, v) = edges[edge];
        let other = if u == vertex { v } else { u };
        degree[vertex] -= 1;
        degree[other] -= 1;

        if degree[other] == 1 {
            queue.push_back(other);
        }
    }

    edges
        .iter()
        .zip(alive)
        .filter_map(|(edge, alive)| alive.then_some(*edge))
        .collect()
}

struct Face {
    ring: Ring,
    component: usize,
    area: f64,
    bounds: Option<Rect>,
    holes: Vec<Ring>,
}

/// Extracts the bounded faces of a planar arrangement as polygons.
///
/// Faces are traced on half-edges by always turning to the next edge clockwise around the
/// reached vertex, which walks bounded faces counter-clockwise. The clockwise outline of a
/// connected component becomes a hole of the smallest face of another component containing it,
/// or is dropped when nothing contains it.
pub(crate) fn polygonize(arrangement: &Arrangement) -> Vec<Polygon> {
    let vertices = &arrangement.vertices;
    let edges = prune_dangles(vertices.len(), &arrangement.edges);

    // Half-edge 2k runs along edge k, 2k + 1 runs back.
    let half_edge_count = edges.len() * 2;
    let endpoints = |he: usize| -> (usize, usize) {
        let (u, v) = edges[he / 2];
        if he % 2 == 0 { (u, v) } else { (v, u) }
    };

    let mut outgoing: Vec<Vec<(f64, usize, usize)>> = vec![Vec::new(); vertices.len()];
    for he in 0..half_edge_count {
        let (from, to) = endpoints(he);
        let angle = (vertices[to].y - vertices[from].y).atan2(vertices[to].x - vertices[from].x);
        outgoing[from].push((angle, to, he));
    }

    let mut position = vec![0_usize; half_edge_count];
    for list in outgoing.iter_mut() {
        list.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        for (pos, (_, _, he)) in list.iter().enumerate() {
            position[*he] = pos;
        }
    }

    let next = |he: usize| -> usize {
        let (_, to) = endpoints(he);
        let around = &outgoing[to];
        let back = position[he ^ 1];
        around[(back + around.len() - 1) % around.len()].2
    };

    let mut components = Components::new(vertices.len());
    for (u, v) in &edges {
        components.union(*u, *v);
    }

    let mut faces = Vec::new();
    let mut outlines = Vec::new();
    let mut used = vec![false; half_edge_count];

    for start in 0..half_edge_count {
        if used[start] {
            continue;
        }

        let mut ring = Vec::new();
        let mut he = start;
        loop {
            used[he] = true;
            ring.push(vertices[endpoints(he).0]);
            he = next(he);
            if he == start || used[he] {
                break;
            }
        }

        let area = signed_area(&ring);
        let component = components.find(endpoints(start).0);

        if area > 0.0 {
            faces.push(Face {
                bounds: Rect::bounding(&ring),
                ring,
                component,
                area,
                holes: Vec::new(),
            });
        } else if area < 0.0 {
            outlines.push((component, ring));
        }
    }

    for (component, outline) in outlines {
        let Some(sample) = outline.first().copied() else {
            continue;
        };

        let container = faces
            .iter_mut()
            .filter(|face| face.component != component)
            .filter(|face| face.bounds.is_some_and(|b| b.contains(&sample)))
            .filter(|face| ring_contains(&face.ring, &sample))
            .min_by(|a, b| a.area.total_cmp(&b.area));

        if let Some(face) = container {
            face.holes.push(outline);
        }
    }

    faces
        .into_iter()
        .map(|face| Polygon::new(face.ring, face.holes))
        .collect()
}
