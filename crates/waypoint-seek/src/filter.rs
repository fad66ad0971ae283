use waypoint_core::{ConnectionId, Graph, Network, Node, NodeId, TagFilter};

/// The validity constraints of one search request: agent size, tags, and
/// whether network tags are checked too.
///
/// The same predicate decides nearest-node candidates, which connections a
/// search may take, and whether a cached path is still usable.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SeekerFilter {
    pub radius: f32,
    pub tags: TagFilter,
    pub validate_networks: bool,
}

impl SeekerFilter {
    /// A node is usable when it is enabled and passes the tag filter.
    #[inline]
    pub fn valid_node(&self, node: &Node) -> bool {
        node.is_enabled() && self.tags.accepts(node.tags())
    }

    /// A network is a nearest-node candidate when it is a regular, enabled
    /// network and, if network validation is on, passes the tag filter.
    pub fn valid_network(&self, network: &Network) -> bool {
        !network.is_grid()
            && network.is_enabled()
            && (!self.validate_networks || self.tags.accepts(network.tags()))
    }

    /// A connection may be traversed when it and its target are enabled,
    /// it is at least as wide as the agent, and both it and its target pass
    /// the tag filter. Unknown ids are never valid.
    pub fn valid_connection(&self, graph: &Graph, id: ConnectionId) -> bool {
        let Some(conn) = graph.connection(id) else {
            return false;
        };
        let Some(to) = graph.node(conn.to()) else {
            return false;
        };
        conn.is_enabled()
            && to.is_enabled()
            && conn.width() >= self.radius * 2.0
            && self.tags.accepts(conn.tags())
            && self.tags.accepts(to.tags())
    }

    /// Whether every connection of `path` is currently valid.
    pub fn valid_path(&self, graph: &Graph, path: &[ConnectionId]) -> bool {
        path.iter().all(|&c| self.valid_connection(graph, c))
    }

    /// Shorthand for [`valid_node`](Self::valid_node) by id.
    pub fn valid_node_id(&self, graph: &Graph, id: NodeId) -> bool {
        graph.node(id).is_some_and(|n| self.valid_node(n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use waypoint_core::{ConnectionSpec, NetworkBuilder, NetworkHandle, NodeSpec, Vec3};

    fn corridor() -> (Graph, NetworkHandle) {
        let mut b = NetworkBuilder::new("corridor").tag("indoor");
        let a = b.add_node(NodeSpec::at(Vec3::ZERO));
        let c = b.add_node(NodeSpec::at(Vec3::new(1.0, 0.0, 0.0)).tag("wet"));
        b.connect(ConnectionSpec::new(a, c).width(1.0));
        b.connect(ConnectionSpec::new(c, a).width(4.0).tag("stairs"));
        let mut graph = Graph::new();
        let h = graph.register(b).unwrap();
        (graph, h)
    }

    #[test]
    fn width_must_fit_agent_diameter() {
        let (graph, h) = corridor();
        let narrow = h.connection(0);
        let fits = SeekerFilter {
            radius: 0.5,
            ..Default::default()
        };
        let too_big = SeekerFilter {
            radius: 0.51,
            ..Default::default()
        };
        assert!(fits.valid_connection(&graph, narrow));
        assert!(!too_big.valid_connection(&graph, narrow));
    }

    #[test]
    fn tags_apply_to_connection_and_target() {
        let (graph, h) = corridor();
        let dry = SeekerFilter {
            tags: TagFilter::any().exclude("wet"),
            ..Default::default()
        };
        // Target node is wet.
        assert!(!dry.valid_connection(&graph, h.connection(0)));
        assert!(dry.valid_connection(&graph, h.connection(1)));

        let no_stairs = SeekerFilter {
            tags: TagFilter::any().exclude("stairs"),
            ..Default::default()
        };
        assert!(no_stairs.valid_connection(&graph, h.connection(0)));
        assert!(!no_stairs.valid_connection(&graph, h.connection(1)));
    }

    #[test]
    fn disabled_connection_or_target_is_invalid() {
        let (mut graph, h) = corridor();
        let filter = SeekerFilter::default();
        assert!(filter.valid_path(&graph, &h.connections));

        graph.set_node_enabled(h.node(1), false).unwrap();
        assert!(!filter.valid_connection(&graph, h.connection(0)));
        assert!(!filter.valid_path(&graph, &h.connections));
        assert!(!filter.valid_node_id(&graph, h.node(1)));

        graph.set_node_enabled(h.node(1), true).unwrap();
        graph.set_connection_enabled(h.connection(1), false).unwrap();
        assert!(!filter.valid_connection(&graph, h.connection(1)));
    }

    #[test]
    fn network_validation_is_opt_in() {
        let (graph, h) = corridor();
        let net = graph.network(h.network).unwrap();
        let outdoor = SeekerFilter {
            tags: TagFilter::any().require("outdoor"),
            ..Default::default()
        };
        assert!(outdoor.valid_network(net));
        let strict = SeekerFilter {
            validate_networks: true,
            ..outdoor
        };
        assert!(!strict.valid_network(net));
    }
}
