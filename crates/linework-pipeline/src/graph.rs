//! Skeleton pixels to an undirected graph of nodes and pixel chains.
//!
//! Pixels are linked by m-adjacency: 4-neighbors always, diagonal
//! neighbors only when neither of the two 4-neighbors they share is
//! foreground. That drops the redundant diagonal shortcuts around corners
//! and junctions, so a plus has one junction of degree 4 instead of a
//! cluster of degree-3 pixels, while connectivity stays exactly that of
//! the 8-connected skeleton.
//!
//! Every pixel whose degree is not 2 becomes a node. Chains of degree-2
//! pixels are walked from the nodes into edges. Components with no node
//! at all are closed loops; each gets its row-major-first pixel promoted
//! to an anchor node and becomes a single self-loop edge.

use std::collections::BTreeSet;

use petgraph::graph::{EdgeIndex, NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};

use crate::raster::{BinaryMask, RING};
use crate::skeleton::Skeleton;
use crate::types::{Dimensions, Pixel};

/// What a node is, by its degree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Degree 0: a lone pixel.
    Isolated,
    /// Degree 1: the end of a stroke.
    Endpoint,
    /// Degree 3 or more.
    Junction,
    /// Degree 2 pixel chosen to represent a closed loop.
    LoopAnchor,
}

/// A graph node: one skeleton pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    /// Pixel position.
    pub pixel: Pixel,
    /// Number of m-adjacent skeleton neighbors.
    pub degree: usize,
    /// Node classification.
    pub kind: NodeKind,
}

/// A graph edge: the ordered pixel chain between two nodes, both node
/// pixels included. For a self-loop the anchor appears at both ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    /// Chain pixels from the source node to the target node.
    pub pixels: Vec<Pixel>,
}

/// The skeleton graph plus the dimensions of the raster it came from.
#[derive(Debug, Clone)]
pub struct SkeletonGraph {
    graph: UnGraph<GraphNode, GraphEdge>,
    dimensions: Dimensions,
}

impl SkeletonGraph {
    /// The underlying petgraph graph.
    #[must_use]
    pub const fn graph(&self) -> &UnGraph<GraphNode, GraphEdge> {
        &self.graph
    }

    /// Raster dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Node weight by index.
    #[must_use]
    pub fn node(&self, index: NodeIndex) -> Option<&GraphNode> {
        self.graph.node_weight(index)
    }

    /// Nodes in index order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeIndex, &GraphNode)> + '_ {
        self.graph
            .node_indices()
            .map(move |i| (i, &self.graph[i]))
    }

    /// Edges in index order as `(index, source, target, edge)`.
    pub fn edges(&self) -> impl Iterator<Item = (EdgeIndex, NodeIndex, NodeIndex, &GraphEdge)> + '_ {
        self.graph
            .edge_references()
            .map(|e| (e.id(), e.source(), e.target(), e.weight()))
    }

    /// Number of nodes of `kind`.
    #[must_use]
    pub fn count_kind(&self, kind: NodeKind) -> usize {
        self.graph
            .node_weights()
            .filter(|n| n.kind == kind)
            .count()
    }
}

/// Build the graph of `skeleton`.
///
/// Node and edge order follow row-major pixel order and the fixed
/// neighbor order, so the result is fully deterministic. An empty
/// skeleton gives an empty graph.
#[must_use = "returns the skeleton graph"]
pub fn build_graph(skeleton: &Skeleton) -> SkeletonGraph {
    let mask = skeleton.mask();
    let dims = mask.dimensions();
    let mut graph = UnGraph::<GraphNode, GraphEdge>::new_undirected();

    // Node lookup by pixel index, and chain membership for degree-2 pixels.
    let mut node_at: Vec<Option<NodeIndex>> = vec![None; dims.pixel_count()];
    let mut visited = vec![false; dims.pixel_count()];

    for pixel in mask.foreground_pixels() {
        let degree = m_neighbors(mask, pixel).len();
        let kind = match degree {
            0 => NodeKind::Isolated,
            1 => NodeKind::Endpoint,
            2 => continue,
            _ => NodeKind::Junction,
        };
        if let Some(i) = dims.index_of(pixel) {
            node_at[i] = Some(graph.add_node(GraphNode {
                pixel,
                degree,
                kind,
            }));
        }
    }

    let node_of = |pixel: Pixel, node_at: &[Option<NodeIndex>]| {
        dims.index_of(pixel).and_then(|i| node_at[i])
    };

    let mut direct_links = BTreeSet::new();
    let starts: Vec<NodeIndex> = graph.node_indices().collect();
    for start in starts {
        let origin = graph[start].pixel;
        for first in m_neighbors(mask, origin) {
            if let Some(other) = node_of(first, &node_at) {
                let key = (start.min(other), start.max(other));
                if direct_links.insert(key) {
                    graph.add_edge(
                        start,
                        other,
                        GraphEdge {
                            pixels: vec![origin, first],
                        },
                    );
                }
                continue;
            }
            let Some(first_index) = dims.index_of(first) else {
                continue;
            };
            if visited[first_index] {
                continue;
            }
            let (pixels, end) = walk_chain(mask, origin, first, &mut visited, |p| {
                node_of(p, &node_at)
            });
            if let Some(end) = end {
                graph.add_edge(start, end, GraphEdge { pixels });
            }
        }
    }

    // Whatever degree-2 pixels remain unvisited form closed loops.
    for pixel in mask.foreground_pixels() {
        let Some(i) = dims.index_of(pixel) else {
            continue;
        };
        if visited[i] || node_at[i].is_some() {
            continue;
        }
        let neighbors = m_neighbors(mask, pixel);
        let anchor = graph.add_node(GraphNode {
            pixel,
            degree: neighbors.len(),
            kind: NodeKind::LoopAnchor,
        });
        node_at[i] = Some(anchor);
        visited[i] = true;
        if let Some(&first) = neighbors.first() {
            let (pixels, end) = walk_chain(mask, pixel, first, &mut visited, |p| {
                node_of(p, &node_at)
            });
            if end == Some(anchor) {
                graph.add_edge(anchor, anchor, GraphEdge { pixels });
            }
        }
    }

    tracing::debug!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        "built skeleton graph"
    );

    SkeletonGraph {
        graph,
        dimensions: dims,
    }
}

/// Follow a degree-2 run from `origin` through `first` until a node.
///
/// Returns the chain (both ends included) and the node it reached, or
/// `None` if the run dead-ended on an already visited pixel, which a
/// well-formed skeleton never produces.
fn walk_chain(
    mask: &BinaryMask,
    origin: Pixel,
    first: Pixel,
    visited: &mut [bool],
    node_of: impl Fn(Pixel) -> Option<NodeIndex>,
) -> (Vec<Pixel>, Option<NodeIndex>) {
    let dims = mask.dimensions();
    let mut chain = vec![origin];
    let mut prev = origin;
    let mut current = first;
    loop {
        if let Some(node) = node_of(current) {
            chain.push(current);
            return (chain, Some(node));
        }
        let Some(i) = dims.index_of(current) else {
            return (chain, None);
        };
        if visited[i] {
            return (chain, None);
        }
        visited[i] = true;
        chain.push(current);
        let Some(next) = m_neighbors(mask, current)
            .into_iter()
            .find(|&n| n != prev)
        else {
            return (chain, None);
        };
        prev = current;
        current = next;
    }
}

/// The m-adjacent foreground neighbors of `pixel`, in ring order.
#[must_use]
pub fn m_neighbors(mask: &BinaryMask, pixel: Pixel) -> Vec<Pixel> {
    let (x, y) = (i64::from(pixel.x), i64::from(pixel.y));
    RING.iter()
        .filter(|&&(dx, dy)| {
            mask.is_set(x + dx, y + dy)
                && (dx == 0 || dy == 0 || (!mask.is_set(x + dx, y) && !mask.is_set(x, y + dy)))
        })
        .filter_map(|&(dx, dy)| {
            let nx = u32::try_from(x + dx).ok()?;
            let ny = u32::try_from(y + dy).ok()?;
            Some(Pixel::new(nx, ny))
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::skeleton::skeletonize;

    fn graph_of(dims: Dimensions, pixels: impl IntoIterator<Item = Pixel>) -> SkeletonGraph {
        build_graph(&skeletonize(&BinaryMask::from_pixels(dims, pixels)))
    }

    /// Every skeleton pixel is exactly one node or interior to exactly one edge.
    fn assert_complete(graph: &SkeletonGraph, skeleton: &Skeleton) {
        let mut seen: BTreeMap<Pixel, usize> = BTreeMap::new();
        for (_, node) in graph.nodes() {
            *seen.entry(node.pixel).or_default() += 1;
        }
        for (_, source, target, edge) in graph.edges() {
            assert_eq!(edge.pixels.first(), Some(&graph.node(source).unwrap().pixel));
            assert_eq!(edge.pixels.last(), Some(&graph.node(target).unwrap().pixel));
            for &p in &edge.pixels[1..edge.pixels.len() - 1] {
                *seen.entry(p).or_default() += 1;
            }
        }
        let expected: BTreeMap<Pixel, usize> = skeleton.pixels().map(|p| (p, 1)).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn empty_skeleton_gives_empty_graph() {
        let graph = graph_of(Dimensions::new(4, 4), []);
        assert_eq!(graph.node_count(), 0);
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn lone_pixel_is_an_isolated_node() {
        let graph = graph_of(Dimensions::new(3, 3), [Pixel::new(1, 1)]);
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.edge_count(), 0);
        assert_eq!(graph.count_kind(NodeKind::Isolated), 1);
    }

    #[test]
    fn straight_line_is_one_edge() {
        let graph = graph_of(Dimensions::new(10, 3), (0..10).map(|x| Pixel::new(x, 1)));
        assert_eq!(graph.count_kind(NodeKind::Endpoint), 2);
        assert_eq!(graph.edge_count(), 1);
        let (_, _, _, edge) = graph.edges().next().unwrap();
        let expected: Vec<Pixel> = (0..10).map(|x| Pixel::new(x, 1)).collect();
        assert_eq!(edge.pixels, expected);
    }

    #[test]
    fn plus_has_one_junction_and_four_arms() {
        let dims = Dimensions::new(9, 9);
        let pixels = (0..9).flat_map(|i| [Pixel::new(i, 4), Pixel::new(4, i)]);
        let graph = graph_of(dims, pixels);
        assert_eq!(graph.count_kind(NodeKind::Junction), 1);
        assert_eq!(graph.count_kind(NodeKind::Endpoint), 4);
        assert_eq!(graph.edge_count(), 4);
        let junction = graph
            .nodes()
            .find(|(_, n)| n.kind == NodeKind::Junction)
            .map(|(_, n)| *n)
            .unwrap();
        assert_eq!(junction.pixel, Pixel::new(4, 4));
        assert_eq!(junction.degree, 4);
    }

    #[test]
    fn adjacent_nodes_are_linked_directly() {
        // A short T. Thinning pulls the junction up next to the stem tip,
        // so one edge is a bare node-to-node link.
        let dims = Dimensions::new(5, 3);
        let pixels = [Pixel::new(2, 0), Pixel::new(2, 1)]
            .into_iter()
            .chain((0..5).map(|x| Pixel::new(x, 2)));
        let skeleton = skeletonize(&BinaryMask::from_pixels(dims, pixels));
        let graph = build_graph(&skeleton);
        assert_eq!(graph.count_kind(NodeKind::Junction), 1);
        assert_eq!(graph.count_kind(NodeKind::Endpoint), 3);
        assert_eq!(graph.edge_count(), 3);
        assert!(graph.edges().any(|(_, _, _, e)| e.pixels.len() == 2));
        assert_complete(&graph, &skeleton);
    }

    #[test]
    fn closed_ring_becomes_anchored_self_loop() {
        let dims = Dimensions::new(7, 7);
        let ring = BinaryMask::from_fn(dims, |x, y| {
            (1..6).contains(&x) && (1..6).contains(&y) && (x == 1 || x == 5 || y == 1 || y == 5)
        });
        let skeleton = skeletonize(&ring);
        let graph = build_graph(&skeleton);
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.edge_count(), 1);
        let (_, anchor) = graph.nodes().next().unwrap();
        assert_eq!(anchor.kind, NodeKind::LoopAnchor);
        assert_eq!(anchor.pixel, skeleton.pixels().next().unwrap());
        let (_, source, target, edge) = graph.edges().next().unwrap();
        assert_eq!(source, target);
        assert_eq!(edge.pixels.len(), skeleton.pixel_count() + 1);
        assert_complete(&graph, &skeleton);
    }

    #[test]
    fn diamond_loop_of_diagonals() {
        let dims = Dimensions::new(3, 3);
        let pixels = [
            Pixel::new(1, 0),
            Pixel::new(0, 1),
            Pixel::new(2, 1),
            Pixel::new(1, 2),
        ];
        let graph = graph_of(dims, pixels);
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.nodes().next().unwrap().1.pixel, Pixel::new(1, 0));
    }

    #[test]
    fn lasso_has_a_self_loop_at_its_junction() {
        // A ring with a tail hanging off its bottom-middle pixel.
        let dims = Dimensions::new(7, 10);
        let mask = BinaryMask::from_fn(dims, |x, y| {
            let ring = (1..6).contains(&x) && (1..6).contains(&y) && (x == 1 || x == 5 || y == 1 || y == 5);
            let tail = x == 3 && (6..9).contains(&y);
            ring || tail
        });
        let skeleton = skeletonize(&mask);
        let graph = build_graph(&skeleton);
        assert_eq!(graph.count_kind(NodeKind::Junction), 1);
        assert_eq!(graph.count_kind(NodeKind::Endpoint), 1);
        assert_eq!(graph.edge_count(), 2);
        assert!(graph.edges().any(|(_, s, t, _)| s == t));
        assert_complete(&graph, &skeleton);
    }

    #[test]
    fn thinned_shapes_are_fully_covered() {
        let dims = Dimensions::new(24, 16);
        let mask = BinaryMask::from_fn(dims, |x, y| {
            let bar = (2..22).contains(&x) && (6..9).contains(&y);
            let post = (10..13).contains(&x) && (1..15).contains(&y);
            let blob = (18..21).contains(&x) && (12..15).contains(&y);
            bar || post || blob
        });
        let skeleton = skeletonize(&mask);
        let graph = build_graph(&skeleton);
        assert_complete(&graph, &skeleton);
    }

    #[test]
    fn diagonal_shortcuts_are_not_counted() {
        let dims = Dimensions::new(3, 3);
        let mask = BinaryMask::from_pixels(dims, [Pixel::new(0, 0), Pixel::new(1, 0), Pixel::new(1, 1)]);
        let corner = m_neighbors(&mask, Pixel::new(0, 0));
        assert_eq!(corner, vec![Pixel::new(1, 0)]);
    }
}
