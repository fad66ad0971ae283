use slotmap::SlotMap;

use crate::builder::{Endpoint, NetworkBuilder, NetworkHandle};
use crate::geom::{Bounds, Vec3};
use crate::id::{ConnectionId, NetworkId, NodeId};
use crate::tags::TagSet;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur during graph operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("network not found: {0:?}")]
    NetworkNotFound(NetworkId),
    #[error("node not found: {0:?}")]
    NodeNotFound(NodeId),
    #[error("connection not found: {0:?}")]
    ConnectionNotFound(ConnectionId),
    #[error("network {network:?}: node index {index} out of range ({len} nodes)")]
    NodeIndexOutOfRange {
        network: String,
        index: usize,
        len: usize,
    },
    #[error("network {network:?}: node {index} has a target but the network is not a grid network")]
    TargetOutsideGrid { network: String, index: usize },
}

// ---------------------------------------------------------------------------
// Graph elements
// ---------------------------------------------------------------------------

/// The two kinds of network.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NetworkKind {
    /// Nodes are nearest-node candidates and carry ordinary connections.
    #[default]
    Regular,
    /// Overlay lattice. Its nodes target nodes of regular networks and their
    /// connections extend the edges of those targets; they are never
    /// nearest-node candidates.
    Grid,
}

/// A named container of nodes with a position offset and a bounding size.
#[derive(Clone, Debug)]
pub struct Network {
    name: String,
    kind: NetworkKind,
    position: Vec3,
    size: Vec3,
    enabled: bool,
    tags: TagSet,
    nodes: Vec<NodeId>,
}

impl Network {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> NetworkKind {
        self.kind
    }

    #[inline]
    pub fn is_grid(&self) -> bool {
        self.kind == NetworkKind::Grid
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn size(&self) -> Vec3 {
        self.size
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn tags(&self) -> &TagSet {
        &self.tags
    }

    /// Nodes of this network in registration order.
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    /// Bounding box relative to the host origin.
    pub fn bounds(&self) -> Bounds {
        Bounds::new(self.position, self.size)
    }
}

/// A graph vertex.
#[derive(Clone, Debug)]
pub struct Node {
    network: NetworkId,
    position: Vec3,
    enabled: bool,
    tags: TagSet,
    connections: Vec<ConnectionId>,
    target: Option<NodeId>,
}

impl Node {
    pub fn network(&self) -> NetworkId {
        self.network
    }

    /// Position local to the owning network.
    pub fn position(&self) -> Vec3 {
        self.position
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn tags(&self) -> &TagSet {
        &self.tags
    }

    /// Outgoing connections in registration order.
    pub fn connections(&self) -> &[ConnectionId] {
        &self.connections
    }

    /// For grid-overlay nodes, the node this one projects onto.
    pub fn target(&self) -> Option<NodeId> {
        self.target
    }
}

/// A directed, costed edge.
#[derive(Clone, Debug)]
pub struct Connection {
    from: NodeId,
    to: NodeId,
    cost: f32,
    width: f32,
    enabled: bool,
    tags: TagSet,
}

impl Connection {
    pub fn from(&self) -> NodeId {
        self.from
    }

    pub fn to(&self) -> NodeId {
        self.to
    }

    pub fn cost(&self) -> f32 {
        self.cost
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn tags(&self) -> &TagSet {
        &self.tags
    }
}

/// Reference to one element of the graph, used to scope invalidation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum GraphElement {
    Network(NetworkId),
    Node(NodeId),
    Connection(ConnectionId),
}

impl From<NetworkId> for GraphElement {
    fn from(id: NetworkId) -> Self {
        Self::Network(id)
    }
}

impl From<NodeId> for GraphElement {
    fn from(id: NodeId) -> Self {
        Self::Node(id)
    }
}

impl From<ConnectionId> for GraphElement {
    fn from(id: ConnectionId) -> Self {
        Self::Connection(id)
    }
}

impl GraphElement {
    /// Whether `node` is this element or lies inside it.
    pub fn contains_node(self, graph: &Graph, node: NodeId) -> bool {
        match self {
            Self::Node(n) => n == node,
            Self::Network(net) => graph.node(node).is_some_and(|n| n.network == net),
            Self::Connection(_) => false,
        }
    }

    /// Whether traversing `connection` depends on this element: the
    /// connection itself, the node it leaves, or the network of that node.
    pub fn touches_connection(self, graph: &Graph, connection: ConnectionId) -> bool {
        match self {
            Self::Connection(c) => c == connection,
            _ => graph
                .connection(connection)
                .is_some_and(|c| self.contains_node(graph, c.from)),
        }
    }
}

// ---------------------------------------------------------------------------
// Graph
// ---------------------------------------------------------------------------

/// All registered networks with their nodes and connections.
///
/// Elements are never removed, so ids stay valid for the lifetime of the
/// graph. Structural changes (registration, moving or resizing a network)
/// bump [`version`](Self::version); enabled flags and tags do not, since
/// nothing memoized depends on them.
#[derive(Debug, Default)]
pub struct Graph {
    networks: SlotMap<NetworkId, Network>,
    nodes: SlotMap<NodeId, Node>,
    connections: SlotMap<ConnectionId, Connection>,
    order: Vec<NetworkId>,
    version: u64,
}

impl Graph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Topology version, incremented on every structural change.
    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Validate and insert a fully described network.
    ///
    /// Nothing is inserted if the description is invalid.
    pub fn register(&mut self, builder: NetworkBuilder) -> Result<NetworkHandle, GraphError> {
        self.validate(&builder)?;

        let NetworkBuilder {
            name,
            kind,
            position,
            size,
            enabled,
            tags,
            nodes,
            connections,
        } = builder;

        let network = self.networks.insert(Network {
            name,
            kind,
            position,
            size,
            enabled,
            tags,
            nodes: Vec::with_capacity(nodes.len()),
        });

        let node_ids: Vec<NodeId> = nodes
            .into_iter()
            .map(|spec| {
                self.nodes.insert(Node {
                    network,
                    position: spec.position,
                    enabled: spec.enabled,
                    tags: spec.tags,
                    connections: Vec::new(),
                    target: spec.target,
                })
            })
            .collect();
        self.networks[network].nodes = node_ids.clone();

        let mut connection_ids = Vec::with_capacity(connections.len());
        for spec in connections {
            let from = node_ids[spec.from];
            let to = match spec.to {
                Endpoint::Local(i) => node_ids[i],
                Endpoint::External(id) => id,
            };
            let cost = match spec.cost {
                Some(cost) => cost,
                None => self.straight_line(from, to),
            };
            let id = self.connections.insert(Connection {
                from,
                to,
                cost,
                width: spec.width,
                enabled: spec.enabled,
                tags: spec.tags,
            });
            self.nodes[from].connections.push(id);
            connection_ids.push(id);
        }

        self.order.push(network);
        self.version += 1;

        Ok(NetworkHandle {
            network,
            nodes: node_ids,
            connections: connection_ids,
        })
    }

    fn validate(&self, builder: &NetworkBuilder) -> Result<(), GraphError> {
        let len = builder.nodes.len();
        let out_of_range = |index: usize| GraphError::NodeIndexOutOfRange {
            network: builder.name.clone(),
            index,
            len,
        };

        for (index, spec) in builder.nodes.iter().enumerate() {
            if let Some(target) = spec.target {
                if builder.kind != NetworkKind::Grid {
                    return Err(GraphError::TargetOutsideGrid {
                        network: builder.name.clone(),
                        index,
                    });
                }
                if !self.nodes.contains_key(target) {
                    return Err(GraphError::NodeNotFound(target));
                }
            }
        }

        for spec in &builder.connections {
            if spec.from >= len {
                return Err(out_of_range(spec.from));
            }
            match spec.to {
                Endpoint::Local(i) if i >= len => return Err(out_of_range(i)),
                Endpoint::External(id) if !self.nodes.contains_key(id) => {
                    return Err(GraphError::NodeNotFound(id));
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn straight_line(&self, a: NodeId, b: NodeId) -> f32 {
        match (self.offset_position(a), self.offset_position(b)) {
            (Some(a), Some(b)) => a.distance(b),
            _ => 0.0,
        }
    }

    // -----------------------------------------------------------------------
    // Lookups
    // -----------------------------------------------------------------------

    #[inline]
    pub fn network(&self, id: NetworkId) -> Option<&Network> {
        self.networks.get(id)
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    #[inline]
    pub fn connection(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(id)
    }

    /// Networks in registration order.
    pub fn networks(&self) -> impl Iterator<Item = (NetworkId, &Network)> + '_ {
        self.order.iter().map(|&id| (id, &self.networks[id]))
    }

    pub fn network_count(&self) -> usize {
        self.networks.len()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Position of `node` with its network's offset applied. Adding the host
    /// origin gives the world position.
    pub fn offset_position(&self, node: NodeId) -> Option<Vec3> {
        let n = self.nodes.get(node)?;
        let net = self.networks.get(n.network)?;
        Some(n.position + net.position)
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Set a network's enabled flag, returning the previous value.
    pub fn set_network_enabled(
        &mut self,
        id: NetworkId,
        enabled: bool,
    ) -> Result<bool, GraphError> {
        let net = self
            .networks
            .get_mut(id)
            .ok_or(GraphError::NetworkNotFound(id))?;
        Ok(std::mem::replace(&mut net.enabled, enabled))
    }

    /// Set a node's enabled flag, returning the previous value.
    pub fn set_node_enabled(&mut self, id: NodeId, enabled: bool) -> Result<bool, GraphError> {
        let node = self.nodes.get_mut(id).ok_or(GraphError::NodeNotFound(id))?;
        Ok(std::mem::replace(&mut node.enabled, enabled))
    }

    /// Set a connection's enabled flag, returning the previous value.
    pub fn set_connection_enabled(
        &mut self,
        id: ConnectionId,
        enabled: bool,
    ) -> Result<bool, GraphError> {
        let conn = self
            .connections
            .get_mut(id)
            .ok_or(GraphError::ConnectionNotFound(id))?;
        Ok(std::mem::replace(&mut conn.enabled, enabled))
    }

    /// Move a network. Bumps the topology version.
    pub fn set_network_position(
        &mut self,
        id: NetworkId,
        position: Vec3,
    ) -> Result<(), GraphError> {
        let net = self
            .networks
            .get_mut(id)
            .ok_or(GraphError::NetworkNotFound(id))?;
        net.position = position;
        self.version += 1;
        Ok(())
    }

    /// Resize a network's bounding box. Bumps the topology version.
    pub fn set_network_size(&mut self, id: NetworkId, size: Vec3) -> Result<(), GraphError> {
        let net = self
            .networks
            .get_mut(id)
            .ok_or(GraphError::NetworkNotFound(id))?;
        net.size = size;
        self.version += 1;
        Ok(())
    }

    pub fn network_tags_mut(&mut self, id: NetworkId) -> Result<&mut TagSet, GraphError> {
        self.networks
            .get_mut(id)
            .map(|n| &mut n.tags)
            .ok_or(GraphError::NetworkNotFound(id))
    }

    pub fn node_tags_mut(&mut self, id: NodeId) -> Result<&mut TagSet, GraphError> {
        self.nodes
            .get_mut(id)
            .map(|n| &mut n.tags)
            .ok_or(GraphError::NodeNotFound(id))
    }

    pub fn connection_tags_mut(&mut self, id: ConnectionId) -> Result<&mut TagSet, GraphError> {
        self.connections
            .get_mut(id)
            .map(|c| &mut c.tags)
            .ok_or(GraphError::ConnectionNotFound(id))
    }
}
