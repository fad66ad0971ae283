//! Memoized spatial and overlay lookups over the [`Graph`].
//!
//! Network bounds and the "which grid nodes target this node" map only
//! depend on graph structure, so they are rebuilt whenever
//! [`Graph::version`] moves past the version they were built for.

use slotmap::SecondaryMap;
use waypoint_core::{Bounds, Graph, NetworkId, NodeId, Vec3};

use crate::filter::SeekerFilter;

#[derive(Debug, Default)]
pub struct TopologyIndex {
    origin: Vec3,
    version: Option<u64>,
    bounds: SecondaryMap<NetworkId, Bounds>,
    grid_nodes: SecondaryMap<NodeId, Vec<NodeId>>,
}

impl TopologyIndex {
    /// An index for networks placed relative to `origin`.
    pub fn new(origin: Vec3) -> Self {
        Self {
            origin,
            ..Self::default()
        }
    }

    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    /// Whether the memoized data matches `graph`.
    pub fn is_current(&self, graph: &Graph) -> bool {
        self.version == Some(graph.version())
    }

    /// Rebuild the memoized data if `graph` changed structurally.
    pub fn refresh(&mut self, graph: &Graph) {
        if self.is_current(graph) {
            return;
        }
        self.bounds.clear();
        self.grid_nodes.clear();

        for (id, net) in graph.networks() {
            self.bounds.insert(id, net.bounds().translate(self.origin));
            if !net.is_grid() {
                continue;
            }
            for &grid_node in net.nodes() {
                let Some(target) = graph.node(grid_node).and_then(|n| n.target()) else {
                    continue;
                };
                if let Some(list) = self.grid_nodes.entry(target) {
                    list.or_default().push(grid_node);
                }
            }
        }

        log::trace!(
            "topology index rebuilt for version {} ({} networks, {} targeted nodes)",
            graph.version(),
            self.bounds.len(),
            self.grid_nodes.len()
        );
        self.version = Some(graph.version());
    }

    /// World-space bounding box of a network.
    pub fn bounds(&self, network: NetworkId) -> Option<Bounds> {
        self.bounds.get(network).copied()
    }

    /// Grid-overlay nodes whose target is `node`.
    pub fn grid_nodes(&self, node: NodeId) -> &[NodeId] {
        self.grid_nodes.get(node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Position of `node` in world space.
    pub fn world_position(&self, graph: &Graph, node: NodeId) -> Option<Vec3> {
        graph.offset_position(node).map(|p| p + self.origin)
    }

    /// The node nearest to `point` that `filter` accepts.
    ///
    /// Only regular networks whose bounds contain `point` are scanned; grid
    /// networks are reachable through overlay connections only. Ties keep
    /// the first node found.
    pub fn nearest_node(
        &self,
        graph: &Graph,
        point: Vec3,
        filter: &SeekerFilter,
    ) -> Option<NodeId> {
        let mut nearest: Option<(NodeId, f32)> = None;

        for (id, net) in graph.networks() {
            if !filter.valid_network(net) {
                continue;
            }
            let Some(bounds) = self.bounds(id) else {
                continue;
            };
            if !bounds.contains(point) {
                continue;
            }

            let offset = net.position() + self.origin;
            for &node_id in net.nodes() {
                let Some(node) = graph.node(node_id) else {
                    continue;
                };
                if !filter.valid_node(node) {
                    continue;
                }
                let d = (node.position() + offset).distance_squared(point);
                if nearest.is_none_or(|(_, best)| d < best) {
                    nearest = Some((node_id, d));
                }
            }
        }

        nearest.map(|(id, _)| id)
    }
}
