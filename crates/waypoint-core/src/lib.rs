//! **waypoint-core** — navigation graph model for the *waypoint* pathfinding
//! engine.
//!
//! This crate provides the types the search engine reads: geometry
//! primitives, tag sets, and a [`Graph`] of [`Network`]s holding [`Node`]s and
//! directed [`Connection`]s. Content is added one complete network at a time
//! through [`NetworkBuilder`]; afterwards only enabled flags, tags and
//! network placement change.

pub mod builder;
pub mod geom;
pub mod graph;
pub mod id;
pub mod tags;

pub use builder::{ConnectionSpec, Endpoint, NetworkBuilder, NetworkHandle, NodeSpec};
pub use geom::{Bounds, Vec3};
pub use graph::{Connection, Graph, GraphElement, GraphError, Network, NetworkKind, Node};
pub use id::{ConnectionId, NetworkId, NodeId};
pub use tags::{TagFilter, TagSet};
