//! Assembly of a complete network before it is handed to the
//! [`Graph`](crate::Graph).
//!
//! Nodes and connections are addressed by their local insertion index while
//! building. [`Graph::register`](crate::Graph::register) validates the whole
//! description and returns a [`NetworkHandle`] mapping those indices to the
//! ids the graph assigned.

use crate::geom::Vec3;
use crate::graph::NetworkKind;
use crate::id::{ConnectionId, NetworkId, NodeId};
use crate::tags::TagSet;

/// Description of one node.
#[derive(Clone, Debug)]
pub struct NodeSpec {
    pub(crate) position: Vec3,
    pub(crate) enabled: bool,
    pub(crate) tags: TagSet,
    pub(crate) target: Option<NodeId>,
}

impl NodeSpec {
    /// An enabled, untagged node at `position` (local to its network).
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            enabled: true,
            tags: TagSet::new(),
            target: None,
        }
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Make this a grid-overlay node projecting onto `target`. Only valid in
    /// a grid network.
    pub fn targeting(mut self, target: NodeId) -> Self {
        self.target = Some(target);
        self
    }
}

/// Where a connection leads.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Endpoint {
    /// A node of the network being built, by local index.
    Local(usize),
    /// A node already registered in the graph.
    External(NodeId),
}

/// Description of one directed connection.
#[derive(Clone, Debug)]
pub struct ConnectionSpec {
    pub(crate) from: usize,
    pub(crate) to: Endpoint,
    pub(crate) cost: Option<f32>,
    pub(crate) width: f32,
    pub(crate) enabled: bool,
    pub(crate) tags: TagSet,
}

impl ConnectionSpec {
    /// A connection between two nodes of the same network.
    ///
    /// Unless [`cost`](Self::cost) is set, the cost is the distance between
    /// the two nodes. The width is unlimited unless [`width`](Self::width)
    /// is set.
    pub fn new(from: usize, to: usize) -> Self {
        Self::with_endpoint(from, Endpoint::Local(to))
    }

    /// A connection leaving this network towards an already registered node.
    pub fn external(from: usize, to: NodeId) -> Self {
        Self::with_endpoint(from, Endpoint::External(to))
    }

    fn with_endpoint(from: usize, to: Endpoint) -> Self {
        Self {
            from,
            to,
            cost: None,
            width: f32::INFINITY,
            enabled: true,
            tags: TagSet::new(),
        }
    }

    pub fn cost(mut self, cost: f32) -> Self {
        self.cost = Some(cost);
        self
    }

    pub fn width(mut self, width: f32) -> Self {
        self.width = width;
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// A network under construction.
#[derive(Clone, Debug)]
pub struct NetworkBuilder {
    pub(crate) name: String,
    pub(crate) kind: NetworkKind,
    pub(crate) position: Vec3,
    pub(crate) size: Vec3,
    pub(crate) enabled: bool,
    pub(crate) tags: TagSet,
    pub(crate) nodes: Vec<NodeSpec>,
    pub(crate) connections: Vec<ConnectionSpec>,
}

impl NetworkBuilder {
    /// Start a regular network.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_kind(name, NetworkKind::Regular)
    }

    /// Start a grid-overlay network.
    pub fn grid(name: impl Into<String>) -> Self {
        Self::with_kind(name, NetworkKind::Grid)
    }

    fn with_kind(name: impl Into<String>, kind: NetworkKind) -> Self {
        Self {
            name: name.into(),
            kind,
            position: Vec3::ZERO,
            size: Vec3::ZERO,
            enabled: true,
            tags: TagSet::new(),
            nodes: Vec::new(),
            connections: Vec::new(),
        }
    }

    /// Offset applied to every node of the network; also the center of its
    /// bounding box.
    pub fn position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    /// Full size of the bounding box used for nearest-node containment.
    pub fn size(mut self, size: Vec3) -> Self {
        self.size = size;
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Add a node and return its local index.
    pub fn add_node(&mut self, spec: NodeSpec) -> usize {
        self.nodes.push(spec);
        self.nodes.len() - 1
    }

    /// Add a connection and return its local index.
    pub fn connect(&mut self, spec: ConnectionSpec) -> usize {
        self.connections.push(spec);
        self.connections.len() - 1
    }

    /// Add a pair of opposite connections with the same cost and width.
    pub fn connect_both(&mut self, a: usize, b: usize, cost: f32, width: f32) -> (usize, usize) {
        let ab = self.connect(ConnectionSpec::new(a, b).cost(cost).width(width));
        let ba = self.connect(ConnectionSpec::new(b, a).cost(cost).width(width));
        (ab, ba)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

/// Ids assigned to a registered network, its nodes and its connections, in
/// builder index order.
#[derive(Clone, Debug)]
pub struct NetworkHandle {
    pub network: NetworkId,
    pub nodes: Vec<NodeId>,
    pub connections: Vec<ConnectionId>,
}

impl NetworkHandle {
    /// Id of the node added at local index `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` was not returned by the builder.
    pub fn node(&self, index: usize) -> NodeId {
        self.nodes[index]
    }

    /// Id of the connection added at local index `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` was not returned by the builder.
    pub fn connection(&self, index: usize) -> ConnectionId {
        self.connections[index]
    }
}
