//! The registry that owns the graph, every seeker, and the path cache.
//!
//! A host drives it cooperatively: [`Control::tick`] resumes each active
//! seeker once, within that seeker's time budget, and then sweeps expired
//! cache entries. Graph mutations that can break a route go through
//! `Control` so the affected seekers and cache entries are invalidated.

use std::collections::BTreeSet;
use std::time::Duration;

use slotmap::SlotMap;
use thiserror::Error;
use waypoint_core::{
    ConnectionId, Graph, GraphElement, GraphError, NetworkBuilder, NetworkHandle, NetworkId, NodeId,
    TagSet, Vec3,
};

use crate::cache::{CacheLifespan, PathCache};
use crate::clock::{Clock, SystemClock};
use crate::filter::SeekerFilter;
use crate::monitor::Notification;
use crate::seeker::{Membership, SearchOutcome, Seeker, SeekerConfig, SeekerId, SeekerState, Step};
use crate::topology::TopologyIndex;

// ---------------------------------------------------------------------------
// Errors and configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SeekError {
    #[error("seeker {0:?} not found")]
    UnknownSeeker(SeekerId),
    #[error("seeker {0:?} is already seeking")]
    Busy(SeekerId),
}

/// Settings of a [`Control`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ControlConfig {
    /// World offset added to every network position.
    pub origin: Vec3,
    /// Lifespan given to newly created seekers.
    pub default_cache_lifespan: CacheLifespan,
    /// Invalidate dependents automatically when an element is disabled.
    pub auto_recalculate: bool,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            origin: Vec3::ZERO,
            default_cache_lifespan: CacheLifespan::NoCache,
            auto_recalculate: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Registry index
// ---------------------------------------------------------------------------

/// Idle/active/used sets, kept in step with each seeker's state.
#[derive(Debug, Default)]
struct RegistryIndex {
    idle: BTreeSet<SeekerId>,
    active: BTreeSet<SeekerId>,
    used: BTreeSet<SeekerId>,
}

impl RegistryIndex {
    fn set(&self, membership: Membership) -> &BTreeSet<SeekerId> {
        match membership {
            Membership::Idle => &self.idle,
            Membership::Active => &self.active,
            Membership::Used => &self.used,
        }
    }

    fn set_mut(&mut self, membership: Membership) -> &mut BTreeSet<SeekerId> {
        match membership {
            Membership::Idle => &mut self.idle,
            Membership::Active => &mut self.active,
            Membership::Used => &mut self.used,
        }
    }

    fn insert(&mut self, id: SeekerId, state: SeekerState) {
        if let Some(m) = state.membership() {
            self.set_mut(m).insert(id);
        }
    }

    fn remove(&mut self, id: SeekerId, state: SeekerState) {
        if let Some(m) = state.membership() {
            self.set_mut(m).remove(&id);
        }
    }
}

// ---------------------------------------------------------------------------
// Control
// ---------------------------------------------------------------------------

pub struct Control {
    config: ControlConfig,
    graph: Graph,
    topology: TopologyIndex,
    seekers: SlotMap<SeekerId, Seeker>,
    index: RegistryIndex,
    cache: PathCache,
    clock: Box<dyn Clock>,
}

impl Control {
    /// A registry timed by the system clock.
    pub fn new(config: ControlConfig) -> Self {
        Self::with_clock(config, SystemClock::new())
    }

    pub fn with_clock(config: ControlConfig, clock: impl Clock + 'static) -> Self {
        log::info!(
            "pathfinding control online (origin {}, cache {:?})",
            config.origin,
            config.default_cache_lifespan
        );
        Self {
            topology: TopologyIndex::new(config.origin),
            config,
            graph: Graph::new(),
            seekers: SlotMap::with_key(),
            index: RegistryIndex::default(),
            cache: PathCache::new(),
            clock: Box::new(clock),
        }
    }

    pub fn config(&self) -> &ControlConfig {
        &self.config
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn now(&self) -> Duration {
        self.clock.now()
    }

    pub fn set_default_cache_lifespan(&mut self, lifespan: CacheLifespan) {
        self.config.default_cache_lifespan = lifespan;
    }

    pub fn set_auto_recalculate(&mut self, enabled: bool) {
        self.config.auto_recalculate = enabled;
    }

    // -----------------------------------------------------------------------
    // Graph
    // -----------------------------------------------------------------------

    pub fn register_network(
        &mut self,
        builder: NetworkBuilder,
    ) -> Result<NetworkHandle, GraphError> {
        let handle = self.graph.register(builder)?;
        self.topology.refresh(&self.graph);
        log::info!(
            "registered network {:?} ({} nodes, {} networks total)",
            handle.network,
            handle.nodes.len(),
            self.graph.network_count()
        );
        Ok(handle)
    }

    /// First registered network named `name`.
    pub fn network_by_name(&self, name: &str) -> Option<NetworkId> {
        self.graph.networks().find(|(_, n)| n.name() == name).map(|(id, _)| id)
    }

    /// Every network named `name`, in registration order.
    pub fn networks_by_name(&self, name: &str) -> Vec<NetworkId> {
        self.graph
            .networks()
            .filter(|(_, n)| n.name() == name)
            .map(|(id, _)| id)
            .collect()
    }

    pub fn world_position(&self, node: NodeId) -> Option<Vec3> {
        self.topology.world_position(&self.graph, node)
    }

    pub fn nearest_node(&self, point: Vec3, filter: &SeekerFilter) -> Option<NodeId> {
        self.topology.nearest_node(&self.graph, point, filter)
    }

    /// Grid-overlay nodes whose target is `node`.
    pub fn grid_nodes(&self, node: NodeId) -> &[NodeId] {
        self.topology.grid_nodes(node)
    }

    pub fn set_network_position(
        &mut self,
        id: NetworkId,
        position: Vec3,
    ) -> Result<(), GraphError> {
        self.graph.set_network_position(id, position)?;
        self.topology.refresh(&self.graph);
        Ok(())
    }

    pub fn set_network_size(&mut self, id: NetworkId, size: Vec3) -> Result<(), GraphError> {
        self.graph.set_network_size(id, size)?;
        self.topology.refresh(&self.graph);
        Ok(())
    }

    pub fn network_tags_mut(&mut self, id: NetworkId) -> Result<&mut TagSet, GraphError> {
        self.graph.network_tags_mut(id)
    }

    pub fn node_tags_mut(&mut self, id: NodeId) -> Result<&mut TagSet, GraphError> {
        self.graph.node_tags_mut(id)
    }

    pub fn connection_tags_mut(&mut self, id: ConnectionId) -> Result<&mut TagSet, GraphError> {
        self.graph.connection_tags_mut(id)
    }

    /// Enable or disable a network. Disabling an enabled network runs
    /// [`on_network_disabled`](Self::on_network_disabled). Returns the
    /// previous flag.
    pub fn set_network_enabled(
        &mut self,
        id: NetworkId,
        enabled: bool,
    ) -> Result<bool, GraphError> {
        let was = self.graph.set_network_enabled(id, enabled)?;
        if was && !enabled {
            self.on_network_disabled(id);
        }
        Ok(was)
    }

    pub fn set_node_enabled(&mut self, id: NodeId, enabled: bool) -> Result<bool, GraphError> {
        let was = self.graph.set_node_enabled(id, enabled)?;
        if was && !enabled {
            self.on_node_disabled(id);
        }
        Ok(was)
    }

    pub fn set_connection_enabled(
        &mut self,
        id: ConnectionId,
        enabled: bool,
    ) -> Result<bool, GraphError> {
        let was = self.graph.set_connection_enabled(id, enabled)?;
        if was && !enabled {
            self.on_connection_disabled(id);
        }
        Ok(was)
    }

    // -----------------------------------------------------------------------
    // Invalidation
    // -----------------------------------------------------------------------

    /// Hook for a network that was just disabled. Recalculates it when
    /// auto-recalculation is on; returns the number of invalidated seekers.
    pub fn on_network_disabled(&mut self, id: NetworkId) -> usize {
        if self.config.auto_recalculate {
            self.recalculate(id)
        } else {
            0
        }
    }

    pub fn on_node_disabled(&mut self, id: NodeId) -> usize {
        if self.config.auto_recalculate {
            self.recalculate(id)
        } else {
            0
        }
    }

    pub fn on_connection_disabled(&mut self, id: ConnectionId) -> usize {
        if self.config.auto_recalculate {
            self.recalculate(id)
        } else {
            0
        }
    }

    pub fn recalculate_network(&mut self, id: NetworkId) -> usize {
        self.recalculate(id)
    }

    pub fn recalculate_node(&mut self, id: NodeId) -> usize {
        self.recalculate(id)
    }

    pub fn recalculate_connection(&mut self, id: ConnectionId) -> usize {
        self.recalculate(id)
    }

    pub fn recalculate_networks(&mut self, ids: impl IntoIterator<Item = NetworkId>) -> usize {
        ids.into_iter().map(|id| self.recalculate(id)).sum()
    }

    pub fn recalculate_nodes(&mut self, ids: impl IntoIterator<Item = NodeId>) -> usize {
        ids.into_iter().map(|id| self.recalculate(id)).sum()
    }

    pub fn recalculate_connections(
        &mut self,
        ids: impl IntoIterator<Item = ConnectionId>,
    ) -> usize {
        ids.into_iter().map(|id| self.recalculate(id)).sum()
    }

    /// Evict cache entries depending on `element`, then invalidate every
    /// completed seeker that uses it and every in-progress search that has
    /// reached it. Returns the number of invalidated seekers.
    pub fn recalculate(&mut self, element: impl Into<GraphElement>) -> usize {
        let element = element.into();
        let evicted = self.cache.evict(&self.graph, element);

        let graph = &self.graph;
        let seekers = &self.seekers;
        let mut affected: Vec<SeekerId> = self
            .index
            .used
            .iter()
            .copied()
            .filter(|&id| seekers.get(id).is_some_and(|s| s.does_use(graph, element)))
            .collect();
        affected.extend(
            self.index
                .active
                .iter()
                .copied()
                .filter(|&id| seekers.get(id).is_some_and(|s| s.search_touches(graph, element))),
        );

        let invalidated = affected.into_iter().filter(|&id| self.invalidate_seeker(id)).count();
        log::debug!(
            "recalculated {element:?}: {evicted} cache entries, {invalidated} seekers dropped"
        );
        invalidated
    }

    // -----------------------------------------------------------------------
    // Seekers
    // -----------------------------------------------------------------------

    /// Register a seeker. Its endpoints are resolved now, with the full
    /// filter; a seeker whose endpoints do not resolve is still registered
    /// and fails when searched.
    pub fn create_seeker(&mut self, config: SeekerConfig) -> SeekerId {
        let start = self.nearest_node(config.from, &config.filter);
        let end = self.nearest_node(config.to, &config.filter);
        let lifespan = self.config.default_cache_lifespan;
        let id = self
            .seekers
            .insert_with_key(|id| Seeker::new(id, config, start, end, lifespan));
        self.index.insert(id, SeekerState::Idle);
        log::debug!("seeker {id:?} registered ({start:?} -> {end:?})");
        id
    }

    pub fn seeker(&self, id: SeekerId) -> Option<&Seeker> {
        self.seekers.get(id)
    }

    pub fn seeker_mut(&mut self, id: SeekerId) -> Option<&mut Seeker> {
        self.seekers.get_mut(id)
    }

    pub fn seekers(&self) -> impl Iterator<Item = (SeekerId, &Seeker)> {
        self.seekers.iter()
    }

    /// Seekers currently in one registry set, in id order.
    pub fn seekers_in(&self, membership: Membership) -> impl Iterator<Item = SeekerId> + '_ {
        self.index.set(membership).iter().copied()
    }

    fn get_mut(&mut self, id: SeekerId) -> Result<&mut Seeker, SeekError> {
        self.seekers.get_mut(id).ok_or(SeekError::UnknownSeeker(id))
    }

    /// Begin a search.
    ///
    /// Requests that can be answered at once (unresolved endpoints, start
    /// equal to end, a usable cache entry) finish here and notify
    /// monitors before returning. Otherwise the seeker becomes active and
    /// the work happens in [`resume`](Self::resume).
    pub fn start_search(&mut self, id: SeekerId) -> Result<Step, SeekError> {
        let seeker = self.seekers.get(id).ok_or(SeekError::UnknownSeeker(id))?;
        if seeker.is_seeking() {
            log::error!("seeker {id:?} is already seeking");
            return Err(SeekError::Busy(id));
        }
        let (Some(start), Some(end)) = (seeker.start(), seeker.end()) else {
            log::error!("seeker {id:?} has no valid start or end node");
            return Ok(self.finish(id, SearchOutcome::Failed));
        };

        if start == end {
            let seeker = self.get_mut(id)?;
            seeker.search = None;
            seeker.solution = Some(Vec::new());
            return Ok(self.finish(id, SearchOutcome::Completed));
        }

        let now = self.clock.now();
        if let Some(path) = self.cache.lookup(&self.graph, seeker, now) {
            log::debug!("seeker {id:?} adopted a cached path of {} connections", path.len());
            let seeker = self.get_mut(id)?;
            seeker.search = None;
            seeker.solution = Some(path);
            seeker.set_cache_lifespan(CacheLifespan::NoCache);
            return Ok(self.finish(id, SearchOutcome::Completed));
        }
        log::debug!("seeker {id:?} missed the cache");

        let Self {
            graph,
            topology,
            seekers,
            ..
        } = self;
        if let Some(seeker) = seekers.get_mut(id) {
            seeker.begin(graph, topology);
        }
        self.set_state(id, SeekerState::Seeking);
        Ok(Step::Pending)
    }

    /// Run one time slice of an active search. A seeker that is not
    /// seeking reports the outcome implied by its state, so a stopped
    /// search reads as [`SearchOutcome::Cancelled`].
    pub fn resume(&mut self, id: SeekerId) -> Result<Step, SeekError> {
        let Self {
            graph,
            topology,
            seekers,
            clock,
            ..
        } = self;
        let seeker = seekers.get_mut(id).ok_or(SeekError::UnknownSeeker(id))?;
        if !seeker.is_seeking() {
            return Ok(Step::Done(seeker.settled_outcome()));
        }
        match seeker.step(graph, topology, &**clock) {
            Step::Pending => {
                log::trace!("seeker {id:?} suspended after its time slice");
                Ok(Step::Pending)
            }
            Step::Done(outcome) => Ok(self.finish(id, outcome)),
        }
    }

    /// Cancel an in-progress search without notifying anyone. Returns
    /// whether a search was running.
    pub fn stop(&mut self, id: SeekerId) -> Result<bool, SeekError> {
        let seeker = self.get_mut(id)?;
        if !seeker.is_seeking() {
            return Ok(false);
        }
        seeker.search = None;
        self.set_state(id, SeekerState::Idle);
        log::debug!("seeker {id:?} stopped");
        Ok(true)
    }

    /// Stop the seeker, mark it invalidated, and notify its monitors.
    /// Returns `false` if it was already invalidated.
    pub fn invalidate(&mut self, id: SeekerId) -> Result<bool, SeekError> {
        if !self.seekers.contains_key(id) {
            return Err(SeekError::UnknownSeeker(id));
        }
        Ok(self.invalidate_seeker(id))
    }

    fn invalidate_seeker(&mut self, id: SeekerId) -> bool {
        let Some(seeker) = self.seekers.get_mut(id) else {
            return false;
        };
        if seeker.state() == SeekerState::Invalidated {
            return false;
        }
        seeker.search = None;
        seeker.solution = None;
        self.set_state(id, SeekerState::Invalidated);
        log::debug!("seeker {id:?} invalidated");
        self.notify(id, Notification::Invalidated);
        true
    }

    /// Remove a seeker from the registry and drop its monitors.
    pub fn kill(&mut self, id: SeekerId) -> Result<(), SeekError> {
        let mut seeker = self.seekers.remove(id).ok_or(SeekError::UnknownSeeker(id))?;
        self.index.remove(id, seeker.state());
        seeker.clear_monitors();
        log::debug!("seeker {id:?} killed");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Scheduling
    // -----------------------------------------------------------------------

    /// Resume every active seeker once, then sweep the cache. Returns the
    /// seekers that finished during this tick.
    pub fn tick(&mut self) -> Vec<(SeekerId, SearchOutcome)> {
        let active: Vec<SeekerId> = self.index.active.iter().copied().collect();
        let mut finished = Vec::new();
        for id in active {
            if let Ok(Step::Done(outcome)) = self.resume(id) {
                finished.push((id, outcome));
            }
        }
        self.maintain_cache();
        finished
    }

    /// Remove expired cache entries. Returns how many were removed.
    pub fn maintain_cache(&mut self) -> usize {
        let removed = self.cache.expire(self.clock.now());
        if removed > 0 {
            log::debug!("{removed} cache entries expired");
        }
        removed
    }

    pub fn cache(&self) -> &PathCache {
        &self.cache
    }

    pub fn seeker_count(&self) -> usize {
        self.seekers.len()
    }

    pub fn idle_count(&self) -> usize {
        self.index.idle.len()
    }

    pub fn active_count(&self) -> usize {
        self.index.active.len()
    }

    pub fn used_count(&self) -> usize {
        self.index.used.len()
    }

    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    /// The only place a seeker's state changes once registered.
    fn set_state(&mut self, id: SeekerId, state: SeekerState) {
        let Some(seeker) = self.seekers.get_mut(id) else {
            return;
        };
        self.index.remove(id, seeker.state);
        seeker.state = state;
        self.index.insert(id, state);
    }

    fn finish(&mut self, id: SeekerId, outcome: SearchOutcome) -> Step {
        match outcome {
            SearchOutcome::Completed => {
                self.set_state(id, SeekerState::Completed);
                self.store_solution(id);
                self.notify(id, Notification::Completed);
            }
            SearchOutcome::Failed => {
                if let Some(seeker) = self.seekers.get_mut(id) {
                    seeker.search = None;
                    seeker.solution = None;
                }
                self.set_state(id, SeekerState::Failed);
                log::debug!("seeker {id:?} failed");
                self.notify(id, Notification::Failed);
            }
            SearchOutcome::Cancelled | SearchOutcome::Invalidated => {}
        }
        Step::Done(outcome)
    }

    fn store_solution(&mut self, id: SeekerId) {
        let Some(seeker) = self.seekers.get(id) else {
            return;
        };
        let (Some(start), Some(end), Some(solution)) =
            (seeker.start(), seeker.end(), seeker.solution())
        else {
            return;
        };
        log::debug!("seeker {id:?} found a path of {} connections", solution.len());
        if solution.is_empty() {
            return;
        }
        let now = self.clock.now();
        if self
            .cache
            .insert(start, end, solution.to_vec(), seeker.cache_lifespan(), now)
        {
            log::debug!("cached path {start:?} -> {end:?} ({:?})", seeker.cache_lifespan());
        }
    }

    /// Deliver to a snapshot of the seeker's monitors.
    fn notify(&self, id: SeekerId, notification: Notification) {
        let Some(seeker) = self.seekers.get(id) else {
            return;
        };
        for monitor in seeker.monitors().snapshot() {
            notification.deliver(&*monitor, seeker);
        }
    }
}

impl std::fmt::Debug for Control {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Control")
            .field("config", &self.config)
            .field("networks", &self.graph.network_count())
            .field("seekers", &self.seekers.len())
            .field("index", &self.index)
            .field("cached", &self.cache.len())
            .finish_non_exhaustive()
    }
}
