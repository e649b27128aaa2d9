//! Bounded Voronoi cells by half-plane intersection.
//!
//! Each cell starts as a large box and is clipped by the perpendicular
//! bisector against every other site. A cell that still touches the box
//! afterwards is unbounded in the true tessellation.

use crate::models::Point2;

const EPS: f64 = 1e-9;

/// Voronoi cell of one site.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Bounded(Vec<Point2>),
    Unbounded,
}

/// Keep the part of convex `polygon` on `site`'s side of the bisector
/// between `site` and `other` (Sutherland–Hodgman against one half-plane).
fn clip_by_bisector(polygon: &[Point2], site: Point2, other: Point2) -> Vec<Point2> {
    let nx = other.x - site.x;
    let ny = other.y - site.y;
    let mid_x = (site.x + other.x) / 2.0;
    let mid_y = (site.y + other.y) / 2.0;
    // <= 0 means at least as close to `site` as to `other`
    let side = |p: &Point2| (p.x - mid_x) * nx + (p.y - mid_y) * ny;

    let mut out = Vec::with_capacity(polygon.len() + 1);
    for (i, current) in polygon.iter().enumerate() {
        let next = &polygon[(i + 1) % polygon.len()];
        let (sc, sn) = (side(current), side(next));
        if sc <= EPS {
            out.push(*current);
        }
        if (sc < -EPS && sn > EPS) || (sc > EPS && sn < -EPS) {
            let t = sc / (sc - sn);
            out.push(Point2::new(
                current.x + t * (next.x - current.x),
                current.y + t * (next.y - current.y),
            ));
        }
    }
    out
}

fn touches_box(polygon: &[Point2], half: f64) -> bool {
    let tol = half * 1e-9 + EPS;
    polygon
        .iter()
        .any(|p| (p.x.abs() - half).abs() <= tol || (p.y.abs() - half).abs() <= tol)
}

/// Cells for `sites` in input order. `bound` is the half-size of the
/// starting box and must enclose every finite vertex of interest.
pub fn voronoi_cells(sites: &[Point2], bound: f64) -> Vec<Cell> {
    let start = vec![
        Point2::new(-bound, -bound),
        Point2::new(bound, -bound),
        Point2::new(bound, bound),
        Point2::new(-bound, bound),
    ];

    sites
        .iter()
        .enumerate()
        .map(|(i, &site)| {
            let mut polygon = start.clone();
            for (j, &other) in sites.iter().enumerate() {
                if i == j || ((other.x - site.x).abs() < EPS && (other.y - site.y).abs() < EPS) {
                    continue;
                }
                polygon = clip_by_bisector(&polygon, site, other);
                if polygon.is_empty() {
                    break;
                }
            }
            if polygon.len() < 3 || touches_box(&polygon, bound) {
                Cell::Unbounded
            } else {
                Cell::Bounded(polygon)
            }
        })
        .collect()
}

/// Clamp every vertex into `[-limit, limit]²`.
pub fn clip_to_extent(polygon: &[Point2], limit: f64) -> Vec<Point2> {
    polygon
        .iter()
        .map(|p| Point2::new(p.x.clamp(-limit, limit), p.y.clamp(-limit, limit)))
        .collect()
}
