//! Graph edges to simplified strokes, with continuation merging.
//!
//! Every edge's pixel chain is turned into points (optionally nudged by
//! the offset field) and simplified on its own. Those per-edge polylines
//! supply the tangents used to decide merges at each node:
//!
//! - two edge ends at a node always continue into each other,
//! - at three ends, the pair bending least from a straight line continues
//!   when its bend is under the merge angle tolerance,
//! - four or more ends are a crossing and never merge.
//!
//! Merged edges are concatenated at the pixel level and simplified again
//! as one chain. Isolated nodes become two-point dots.

use std::f64::consts::PI;

use crate::graph::SkeletonGraph;
use crate::raster::OffsetField;
use crate::simplify::simplify_points;
use crate::types::{PipelineConfig, Pixel, Point, Polyline};

/// A simplified stroke and the skeleton pixels it was built from.
#[derive(Debug, Clone, PartialEq)]
pub struct Stroke {
    /// Simplified geometry, at least two points.
    pub polyline: Polyline,
    /// The source pixel chain in stroke order.
    pub pixels: Vec<Pixel>,
    /// Indices of the graph edges this stroke covers, in stroke order.
    /// Empty for a dot.
    pub source_edges: Vec<usize>,
}

/// Output of [`extract`].
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// Strokes in deterministic order: by lowest source edge, then dots
    /// in node order.
    pub strokes: Vec<Stroke>,
    /// Number of node continuations that joined two edges.
    pub merges: usize,
    /// Number of dot strokes from isolated nodes.
    pub dots: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum End {
    Source,
    Target,
}

impl End {
    const fn slot(self, edge: usize) -> usize {
        match self {
            Self::Source => edge * 2,
            Self::Target => edge * 2 + 1,
        }
    }
}

/// One edge in a merged chain, with the direction it is traversed in.
#[derive(Debug, Clone, Copy)]
struct Step {
    edge: usize,
    forward: bool,
}

impl Step {
    const fn entry(self) -> End {
        if self.forward { End::Source } else { End::Target }
    }

    const fn exit(self) -> End {
        if self.forward { End::Target } else { End::Source }
    }
}

/// Turn `graph` into strokes.
///
/// Offsets are added to pixel positions only when `config.apply_offsets`
/// is set and a field is supplied.
#[must_use = "returns the extracted strokes"]
pub fn extract(
    graph: &SkeletonGraph,
    offsets: Option<&OffsetField>,
    config: &PipelineConfig,
) -> Extraction {
    let offsets = offsets.filter(|_| config.apply_offsets);
    let tolerance = config.simplify_tolerance_px;
    let to_point = |p: Pixel| {
        let base = p.to_point();
        offsets.map_or(base, |field| {
            let (dx, dy) = field.get(p);
            Point::new(base.x + dx, base.y + dy)
        })
    };

    let chains: Vec<&[Pixel]> = graph.edges().map(|(_, _, _, e)| e.pixels.as_slice()).collect();
    let simplified: Vec<Vec<Point>> = chains
        .iter()
        .map(|chain| {
            let points: Vec<Point> = chain.iter().map(|&p| to_point(p)).collect();
            simplify_points(&points, tolerance)
        })
        .collect();

    // Edge ends incident to each node, in edge order.
    let mut ends_at: Vec<Vec<(usize, End)>> = vec![Vec::new(); graph.node_count()];
    for (id, source, target, _) in graph.edges() {
        ends_at[source.index()].push((id.index(), End::Source));
        ends_at[target.index()].push((id.index(), End::Target));
    }

    let max_deviation = config.merge_angle_tolerance_deg.to_radians();
    let mut partner: Vec<Option<(usize, End)>> = vec![None; chains.len() * 2];
    let mut merges = 0;
    for ends in &ends_at {
        let pair = match ends.as_slice() {
            [a, b] if a.0 != b.0 => Some((*a, *b)),
            [_, _, _] => straightest_pair(ends, &simplified, max_deviation),
            _ => None,
        };
        if let Some((a, b)) = pair {
            partner[a.1.slot(a.0)] = Some(b);
            partner[b.1.slot(b.0)] = Some(a);
            merges += 1;
        }
    }

    let mut strokes = Vec::new();
    let mut used = vec![false; chains.len()];
    for edge in 0..chains.len() {
        if used[edge] {
            continue;
        }
        let steps = chain_steps(edge, &partner, &mut used);
        let stroke = if steps.len() == 1 {
            let pixels = oriented(chains[edge], steps[0].forward);
            let mut points = simplified[edge].clone();
            if !steps[0].forward {
                points.reverse();
            }
            Stroke {
                polyline: Polyline::new(points),
                pixels,
                source_edges: vec![edge],
            }
        } else {
            let mut pixels: Vec<Pixel> = Vec::new();
            for step in &steps {
                let part = oriented(chains[step.edge], step.forward);
                let skip = usize::from(!pixels.is_empty());
                pixels.extend(part.into_iter().skip(skip));
            }
            let points: Vec<Point> = pixels.iter().map(|&p| to_point(p)).collect();
            Stroke {
                polyline: Polyline::new(simplify_points(&points, tolerance)),
                pixels,
                source_edges: steps.iter().map(|s| s.edge).collect(),
            }
        };
        strokes.push(stroke);
    }

    let mut dots = 0;
    for (index, node) in graph.nodes() {
        if ends_at[index.index()].is_empty() {
            let point = to_point(node.pixel);
            strokes.push(Stroke {
                polyline: Polyline::new(vec![point, point]),
                pixels: vec![node.pixel],
                source_edges: Vec::new(),
            });
            dots += 1;
        }
    }

    tracing::debug!(
        edges = chains.len(),
        strokes = strokes.len(),
        merges,
        dots,
        "extracted strokes"
    );

    Extraction {
        strokes,
        merges,
        dots,
    }
}

/// The pair of distinct edges at a three-way node that continues most
/// straight, if its bend is below `max_deviation` radians. Ties keep the
/// first pair in end order.
fn straightest_pair(
    ends: &[(usize, End)],
    simplified: &[Vec<Point>],
    max_deviation: f64,
) -> Option<((usize, End), (usize, End))> {
    let mut best: Option<(f64, (usize, End), (usize, End))> = None;
    for (i, &a) in ends.iter().enumerate() {
        for &b in &ends[i + 1..] {
            if a.0 == b.0 {
                continue;
            }
            let (Some(ta), Some(tb)) = (tangent(&simplified[a.0], a.1), tangent(&simplified[b.0], b.1))
            else {
                continue;
            };
            let deviation = PI - angle_between(ta, tb);
            if deviation < max_deviation && best.is_none_or(|(d, _, _)| deviation < d) {
                best = Some((deviation, a, b));
            }
        }
    }
    best.map(|(_, a, b)| (a, b))
}

/// Outward direction of an edge at one of its ends: from the node point
/// toward the next simplified vertex. `None` when degenerate.
fn tangent(points: &[Point], end: End) -> Option<(f64, f64)> {
    let (node, next) = match end {
        End::Source => (points.first()?, points.get(1)?),
        End::Target => (points.last()?, points.get(points.len().checked_sub(2)?)?),
    };
    let v = (next.x - node.x, next.y - node.y);
    (v.0 != 0.0 || v.1 != 0.0).then_some(v)
}

fn angle_between(a: (f64, f64), b: (f64, f64)) -> f64 {
    let dot = a.0.mul_add(b.0, a.1 * b.1);
    let norms = a.0.hypot(a.1) * b.0.hypot(b.1);
    (dot / norms).clamp(-1.0, 1.0).acos()
}

/// Collect the merged chain containing `edge`, marking its edges used.
fn chain_steps(edge: usize, partner: &[Option<(usize, End)>], used: &mut [bool]) -> Vec<Step> {
    // Walk backward to the start of the chain (or around a cycle).
    let mut start = Step {
        edge,
        forward: true,
    };
    let mut seen = vec![edge];
    while let Some((prev, prev_end)) = partner[start.entry().slot(start.edge)] {
        if seen.contains(&prev) || used[prev] {
            break;
        }
        seen.push(prev);
        start = Step {
            edge: prev,
            forward: prev_end == End::Target,
        };
    }

    let mut steps = vec![start];
    used[start.edge] = true;
    let mut current = start;
    while let Some((next, next_end)) = partner[current.exit().slot(current.edge)] {
        if used[next] {
            break;
        }
        used[next] = true;
        current = Step {
            edge: next,
            forward: next_end == End::Source,
        };
        steps.push(current);
    }
    steps
}

fn oriented(chain: &[Pixel], forward: bool) -> Vec<Pixel> {
    if forward {
        chain.to_vec()
    } else {
        chain.iter().rev().copied().collect()
    }
}
