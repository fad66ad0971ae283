//! The resumable A* loop.
//!
//! Open and closed sets are keyed by connection, not by node: a node
//! reached through two different incoming connections is expanded once per
//! connection. An entry already in the open set keeps its first-seen score
//! (there is no relaxation), and the open set is scanned linearly with ties
//! going to the entry queued first.

use std::collections::HashSet;
use std::time::Duration;

use waypoint_core::{ConnectionId, Graph, GraphElement, NodeId, Vec3};

use crate::clock::Clock;
use crate::filter::SeekerFilter;
use crate::path::{PathArena, PathNodeId};
use crate::topology::TopologyIndex;

/// Everything a search reads but does not own.
pub(crate) struct SearchContext<'a> {
    pub graph: &'a Graph,
    pub topology: &'a TopologyIndex,
    pub filter: &'a SeekerFilter,
    pub end: NodeId,
    pub end_position: Vec3,
}

impl SearchContext<'_> {
    fn heuristic(&self, connection: ConnectionId) -> f32 {
        self.graph
            .connection(connection)
            .and_then(|c| self.topology.world_position(self.graph, c.to()))
            .map_or(0.0, |p| p.distance(self.end_position))
    }

    fn cost(&self, connection: ConnectionId) -> f32 {
        self.graph.connection(connection).map_or(0.0, |c| c.cost())
    }
}

/// Result of running the loop until the deadline.
#[derive(Debug, PartialEq)]
pub(crate) enum Advance {
    /// The end node was reached; connections in travel order.
    Found(Vec<ConnectionId>),
    /// The open set ran dry.
    Exhausted,
    /// The deadline passed; call again to continue.
    Suspended,
}

/// Open/closed bookkeeping of one search. Survives suspension untouched.
#[derive(Debug, Default)]
pub(crate) struct SearchState {
    arena: PathArena,
    open: Vec<PathNodeId>,
    queued: HashSet<ConnectionId>,
    closed: HashSet<ConnectionId>,
    // scratch buffer for candidate connections
    candidates: Vec<ConnectionId>,
    expansions: usize,
}

impl SearchState {
    /// Seed the open set with every valid connection leaving `start`.
    pub(crate) fn seed(ctx: &SearchContext<'_>, start: NodeId) -> Self {
        let mut state = Self::default();
        if let Some(node) = ctx.graph.node(start) {
            for &connection in node.connections() {
                if ctx.filter.valid_connection(ctx.graph, connection)
                    && !state.queued.contains(&connection)
                {
                    state.enqueue(ctx, None, connection);
                }
            }
        }
        state
    }

    fn enqueue(
        &mut self,
        ctx: &SearchContext<'_>,
        parent: Option<PathNodeId>,
        connection: ConnectionId,
    ) {
        let id = self
            .arena
            .push(parent, connection, ctx.cost(connection), ctx.heuristic(connection));
        self.open.push(id);
        self.queued.insert(connection);
    }

    /// Slot in `open` of the entry with the lowest f. Earlier entries win
    /// ties.
    fn lowest(&self) -> Option<usize> {
        let mut best: Option<(usize, f32)> = None;
        for (slot, &id) in self.open.iter().enumerate() {
            let f = self.arena.get(id).f();
            if best.is_none_or(|(_, bf)| f < bf) {
                best = Some((slot, f));
            }
        }
        best.map(|(slot, _)| slot)
    }

    /// Collect every connection leaving `node`: its own, its projection
    /// target's if it is a grid node, then those of grid nodes targeting it.
    fn gather(&mut self, ctx: &SearchContext<'_>, node: NodeId) {
        self.candidates.clear();
        let Some(n) = ctx.graph.node(node) else {
            return;
        };
        self.candidates.extend_from_slice(n.connections());
        if let Some(target) = n.target().and_then(|t| ctx.graph.node(t)) {
            self.candidates.extend_from_slice(target.connections());
        }
        for &grid_node in ctx.topology.grid_nodes(node) {
            if let Some(g) = ctx.graph.node(grid_node) {
                self.candidates.extend_from_slice(g.connections());
            }
        }
    }

    /// Run expansion steps until the end is found, the open set is empty,
    /// or `clock` reaches `deadline`. The clock is read after every full
    /// expansion step, so at least one step runs per call.
    pub(crate) fn advance(
        &mut self,
        ctx: &SearchContext<'_>,
        clock: &dyn Clock,
        deadline: Duration,
    ) -> Advance {
        loop {
            let Some(slot) = self.lowest() else {
                return Advance::Exhausted;
            };
            let current = self.open[slot];
            let record = *self.arena.get(current);

            let (from, to) = match ctx.graph.connection(record.connection) {
                Some(c) => (c.from(), c.to()),
                None => {
                    // Not reachable with the current graph, which never
                    // removes connections; drop the entry rather than loop.
                    self.open.remove(slot);
                    continue;
                }
            };

            if to == ctx.end {
                return Advance::Found(self.arena.reconstruct(current));
            }

            self.open.remove(slot);
            self.queued.remove(&record.connection);
            self.closed.insert(record.connection);

            self.gather(ctx, to);
            let candidates = std::mem::take(&mut self.candidates);
            for &candidate in &candidates {
                if self.closed.contains(&candidate)
                    || self.queued.contains(&candidate)
                    || !ctx.filter.valid_connection(ctx.graph, candidate)
                {
                    continue;
                }
                // Stepping straight back to where the current connection
                // started.
                if ctx.graph.connection(candidate).is_some_and(|c| c.to() == from) {
                    continue;
                }
                self.enqueue(ctx, Some(current), candidate);
            }
            self.candidates = candidates;
            self.expansions += 1;

            if clock.now() >= deadline {
                return Advance::Suspended;
            }
        }
    }

    /// Whether any connection this search has recorded depends on
    /// `element`, or arrives at a node inside it.
    pub(crate) fn touches(&self, graph: &Graph, element: GraphElement) -> bool {
        self.arena.iter().any(|record| {
            element.touches_connection(graph, record.connection)
                || graph
                    .connection(record.connection)
                    .is_some_and(|c| element.contains_node(graph, c.to()))
        })
    }

    pub(crate) fn progress(&self) -> SearchProgress {
        SearchProgress {
            open: self.open.len(),
            closed: self.closed.len(),
            records: self.arena.len(),
            expansions: self.expansions,
        }
    }

    #[cfg(test)]
    pub(crate) fn open_connections(&self) -> Vec<ConnectionId> {
        self.open.iter().map(|&id| self.arena.get(id).connection).collect()
    }

    #[cfg(test)]
    pub(crate) fn closed_connections(&self) -> &HashSet<ConnectionId> {
        &self.closed
    }

    #[cfg(test)]
    pub(crate) fn record_scores(&self) -> Vec<(ConnectionId, f32, f32)> {
        self.arena.iter().map(|r| (r.connection, r.g, r.h)).collect()
    }
}

/// Size of an in-progress search.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchProgress {
    pub open: usize,
    pub closed: usize,
    /// Records created so far (open, closed, and superseded).
    pub records: usize,
    /// Completed expansion steps.
    pub expansions: usize,
}
