use std::any::Any;
use std::rc::Rc;
use std::time::Duration;

use slotmap::new_key_type;
use waypoint_core::{ConnectionId, Graph, GraphElement, NodeId, TagFilter, Vec3};

use crate::cache::CacheLifespan;
use crate::clock::Clock;
use crate::filter::SeekerFilter;
use crate::monitor::{Monitors, SearchMonitor};
use crate::search::{Advance, SearchContext, SearchProgress, SearchState};
use crate::topology::TopologyIndex;

new_key_type! {
    /// Identifies a seeker registered with a [`Control`](crate::Control).
    pub struct SeekerId;
}

/// Default time budget of one resumption.
pub const DEFAULT_TIME_BUDGET: Duration = Duration::from_millis(2);

// ---------------------------------------------------------------------------
// States and results
// ---------------------------------------------------------------------------

/// Lifecycle of a seeker. This is the only record of where a seeker is;
/// the registry's idle/active/used sets are derived from it.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum SeekerState {
    /// Registered, never searched or stopped.
    #[default]
    Idle,
    /// A search is in progress and waiting to be resumed.
    Seeking,
    /// The last search found a solution.
    Completed,
    /// The last search found nothing.
    Failed,
    /// The graph changed under the seeker after it was registered.
    Invalidated,
}

/// Registry set a state belongs to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Membership {
    Idle,
    Active,
    Used,
}

impl SeekerState {
    /// The registry set for this state; invalidated seekers are in none.
    pub fn membership(self) -> Option<Membership> {
        match self {
            Self::Idle | Self::Failed => Some(Membership::Idle),
            Self::Seeking => Some(Membership::Active),
            Self::Completed => Some(Membership::Used),
            Self::Invalidated => None,
        }
    }
}

/// How a search ended.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SearchOutcome {
    Completed,
    Failed,
    /// Stopped before finishing; no monitor was notified.
    Cancelled,
    Invalidated,
}

/// Result of one unit of search work.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Step {
    /// More work remains; resume on a later tick.
    Pending,
    Done(SearchOutcome),
}

impl Step {
    pub fn is_pending(self) -> bool {
        self == Self::Pending
    }
}

// ---------------------------------------------------------------------------
// SeekerConfig
// ---------------------------------------------------------------------------

/// Parameters of a search request, consumed by
/// [`Control::create_seeker`](crate::Control::create_seeker).
pub struct SeekerConfig {
    pub(crate) from: Vec3,
    pub(crate) to: Vec3,
    pub(crate) time_budget: Duration,
    pub(crate) filter: SeekerFilter,
    pub(crate) data: Option<Box<dyn Any>>,
}

impl SeekerConfig {
    /// A request from `from` to `to` (world space) for a point-sized agent
    /// with no tag constraints.
    pub fn new(from: Vec3, to: Vec3) -> Self {
        Self {
            from,
            to,
            time_budget: DEFAULT_TIME_BUDGET,
            filter: SeekerFilter::default(),
            data: None,
        }
    }

    /// Maximum time one resumption may spend before yielding.
    pub fn time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = budget;
        self
    }

    /// Agent radius; connections narrower than twice this are skipped.
    pub fn radius(mut self, radius: f32) -> Self {
        self.filter.radius = radius;
        self
    }

    pub fn require_tag(mut self, tag: impl Into<String>) -> Self {
        self.filter.tags.required.push(tag.into());
        self
    }

    pub fn exclude_tag(mut self, tag: impl Into<String>) -> Self {
        self.filter.tags.excluded.push(tag.into());
        self
    }

    pub fn tags(mut self, tags: TagFilter) -> Self {
        self.filter.tags = tags;
        self
    }

    /// Also apply the tag filter to networks when resolving endpoints.
    pub fn validate_networks(mut self, validate: bool) -> Self {
        self.filter.validate_networks = validate;
        self
    }

    /// Attach arbitrary caller data to the seeker.
    pub fn data<T: Any>(mut self, data: T) -> Self {
        self.data = Some(Box::new(data));
        self
    }
}

// ---------------------------------------------------------------------------
// Seeker
// ---------------------------------------------------------------------------

/// One pathfinding request.
///
/// Endpoints are resolved once, when the seeker is created. The seeker owns
/// its open and closed sets while a search is in progress; everything else
/// about its lifecycle is driven by [`Control`](crate::Control).
pub struct Seeker {
    pub(crate) id: SeekerId,
    from: Vec3,
    to: Vec3,
    start: Option<NodeId>,
    end: Option<NodeId>,
    time_budget: Duration,
    filter: SeekerFilter,
    cache_lifespan: CacheLifespan,
    monitors: Monitors,
    pub(crate) solution: Option<Vec<ConnectionId>>,
    pub(crate) state: SeekerState,
    pub(crate) search: Option<SearchState>,
    data: Option<Box<dyn Any>>,
}

impl Seeker {
    pub(crate) fn new(
        id: SeekerId,
        config: SeekerConfig,
        start: Option<NodeId>,
        end: Option<NodeId>,
        cache_lifespan: CacheLifespan,
    ) -> Self {
        Self {
            id,
            from: config.from,
            to: config.to,
            start,
            end,
            time_budget: config.time_budget,
            filter: config.filter,
            cache_lifespan,
            monitors: Monitors::default(),
            solution: None,
            state: SeekerState::Idle,
            search: None,
            data: config.data,
        }
    }

    pub fn id(&self) -> SeekerId {
        self.id
    }

    /// Requested origin in world space.
    pub fn from(&self) -> Vec3 {
        self.from
    }

    /// Requested destination in world space.
    pub fn to(&self) -> Vec3 {
        self.to
    }

    /// Node nearest to [`from`](Self::from), if any was valid.
    pub fn start(&self) -> Option<NodeId> {
        self.start
    }

    /// Node nearest to [`to`](Self::to), if any was valid.
    pub fn end(&self) -> Option<NodeId> {
        self.end
    }

    pub fn state(&self) -> SeekerState {
        self.state
    }

    #[inline]
    pub fn is_seeking(&self) -> bool {
        self.state == SeekerState::Seeking
    }

    /// Whether both endpoints resolved.
    pub fn is_solvable(&self) -> bool {
        self.start.is_some() && self.end.is_some()
    }

    /// Connections of the last found path in travel order. Empty when start
    /// and end are the same node; `None` before a search completes, after
    /// one fails, and once the seeker is invalidated.
    pub fn solution(&self) -> Option<&[ConnectionId]> {
        self.solution.as_deref()
    }

    pub fn time_budget(&self) -> Duration {
        self.time_budget
    }

    pub fn set_time_budget(&mut self, budget: Duration) {
        self.time_budget = budget;
    }

    pub fn filter(&self) -> &SeekerFilter {
        &self.filter
    }

    pub fn radius(&self) -> f32 {
        self.filter.radius
    }

    /// Replace the tag filter. Endpoints are not re-resolved.
    pub fn set_tags(&mut self, tags: TagFilter) {
        self.filter.tags = tags;
    }

    pub fn validate_networks(&self) -> bool {
        self.filter.validate_networks
    }

    pub fn set_validate_networks(&mut self, validate: bool) {
        self.filter.validate_networks = validate;
    }

    pub fn cache_lifespan(&self) -> CacheLifespan {
        self.cache_lifespan
    }

    pub fn set_cache_lifespan(&mut self, lifespan: CacheLifespan) {
        self.cache_lifespan = lifespan;
    }

    /// Caller data attached at creation, if it has type `T`.
    pub fn data<T: Any>(&self) -> Option<&T> {
        self.data.as_deref().and_then(|d| d.downcast_ref())
    }

    pub fn data_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.data.as_deref_mut().and_then(|d| d.downcast_mut())
    }

    pub fn set_data<T: Any>(&mut self, data: T) {
        self.data = Some(Box::new(data));
    }

    /// Add an observer. Adding the same `Rc` twice has no effect.
    pub fn add_monitor(&mut self, monitor: Rc<dyn SearchMonitor>) {
        self.monitors.add(monitor);
    }

    pub fn remove_monitor(&mut self, monitor: &Rc<dyn SearchMonitor>) {
        self.monitors.remove(monitor);
    }

    pub fn monitor_count(&self) -> usize {
        self.monitors.len()
    }

    pub(crate) fn monitors(&self) -> &Monitors {
        &self.monitors
    }

    pub(crate) fn clear_monitors(&mut self) {
        self.monitors.clear();
    }

    /// Whether this seeker may traverse `connection` right now.
    pub fn valid_connection(&self, graph: &Graph, connection: ConnectionId) -> bool {
        self.filter.valid_connection(graph, connection)
    }

    /// Whether every connection of `path` is currently valid for this
    /// seeker.
    pub fn valid_path(&self, graph: &Graph, path: &[ConnectionId]) -> bool {
        self.filter.valid_path(graph, path)
    }

    /// Whether the destination or the current solution depends on
    /// `element`.
    ///
    /// A seeker whose end node lies in the element always answers `true`,
    /// solved or not.
    pub fn does_use(&self, graph: &Graph, element: impl Into<GraphElement>) -> bool {
        route_uses(graph, self.end, self.solution.as_deref().unwrap_or(&[]), element.into())
    }

    /// Whether the in-progress search has recorded anything depending on
    /// `element`, or is heading for a node inside it. `false` when not
    /// seeking.
    pub fn search_touches(&self, graph: &Graph, element: impl Into<GraphElement>) -> bool {
        let element = element.into();
        self.search.as_ref().is_some_and(|s| s.touches(graph, element))
            || (self.is_seeking() && self.end.is_some_and(|e| element.contains_node(graph, e)))
    }

    /// Size of the in-progress search, if any.
    pub fn search_progress(&self) -> Option<SearchProgress> {
        self.search.as_ref().map(SearchState::progress)
    }

    // -----------------------------------------------------------------------
    // Search driving (called by Control)
    // -----------------------------------------------------------------------

    fn context<'a>(
        &'a self,
        graph: &'a Graph,
        topology: &'a TopologyIndex,
        end: NodeId,
    ) -> SearchContext<'a> {
        SearchContext {
            graph,
            topology,
            filter: &self.filter,
            end,
            end_position: topology.world_position(graph, end).unwrap_or(self.to),
        }
    }

    /// Seed a fresh search. Requires both endpoints.
    pub(crate) fn begin(&mut self, graph: &Graph, topology: &TopologyIndex) {
        self.solution = None;
        self.search = match (self.start, self.end) {
            (Some(start), Some(end)) => {
                Some(SearchState::seed(&self.context(graph, topology, end), start))
            }
            _ => None,
        };
    }

    /// Run until the time budget is spent or the search ends. On an end the
    /// search state is dropped and the solution recorded; the caller
    /// performs the state transition.
    pub(crate) fn step(
        &mut self,
        graph: &Graph,
        topology: &TopologyIndex,
        clock: &dyn Clock,
    ) -> Step {
        let (Some(mut search), Some(end)) = (self.search.take(), self.end) else {
            return Step::Done(SearchOutcome::Failed);
        };
        let deadline = clock.now().saturating_add(self.time_budget);
        let advance = search.advance(&self.context(graph, topology, end), clock, deadline);
        match advance {
            Advance::Found(path) => {
                self.solution = Some(path);
                Step::Done(SearchOutcome::Completed)
            }
            Advance::Exhausted => {
                self.solution = None;
                Step::Done(SearchOutcome::Failed)
            }
            Advance::Suspended => {
                self.search = Some(search);
                Step::Pending
            }
        }
    }

    /// Outcome implied by the current state, for a seeker that is not
    /// seeking.
    pub(crate) fn settled_outcome(&self) -> SearchOutcome {
        match self.state {
            SeekerState::Completed => SearchOutcome::Completed,
            SeekerState::Failed => SearchOutcome::Failed,
            SeekerState::Invalidated => SearchOutcome::Invalidated,
            SeekerState::Idle | SeekerState::Seeking => SearchOutcome::Cancelled,
        }
    }
}

impl std::fmt::Debug for Seeker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Seeker")
            .field("id", &self.id)
            .field("from", &self.from)
            .field("to", &self.to)
            .field("start", &self.start)
            .field("end", &self.end)
            .field("state", &self.state)
            .field("solution", &self.solution)
            .field("cache_lifespan", &self.cache_lifespan)
            .field("monitors", &self.monitors)
            .finish_non_exhaustive()
    }
}

/// Whether a route ending at `end` along `path` depends on `element`. Both
/// endpoints of every connection count, since an overlay hop can leave a
/// node through a connection that does not start there.
pub(crate) fn route_uses(
    graph: &Graph,
    end: Option<NodeId>,
    path: &[ConnectionId],
    element: GraphElement,
) -> bool {
    end.is_some_and(|e| element.contains_node(graph, e))
        || path.iter().any(|&c| {
            element.touches_connection(graph, c)
                || graph
                    .connection(c)
                    .is_some_and(|conn| element.contains_node(graph, conn.to()))
        })
}
