//! Shared store of completed paths.
//!
//! Entries are matched on (start, end) and only adopted when the stored
//! solution is still traversable under the requesting seeker's filter, so
//! a stale entry degrades into a miss instead of a wrong answer.

use std::time::Duration;

use waypoint_core::{ConnectionId, Graph, GraphElement, NodeId};

use crate::seeker::{Seeker, route_uses};

/// How long a completed path stays in the cache.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CacheLifespan {
    /// Never cached.
    #[default]
    NoCache,
    /// Cached until invalidated.
    Indefinite,
    /// Cached for this long after insertion or the latest hit.
    Expires(Duration),
}

impl CacheLifespan {
    /// Map a seconds value onto a lifespan: zero means no caching, a
    /// negative value means forever.
    pub fn from_secs_f32(secs: f32) -> Self {
        if secs.is_nan() || secs == 0.0 {
            Self::NoCache
        } else if secs < 0.0 {
            Self::Indefinite
        } else {
            Duration::try_from_secs_f32(secs).map_or(Self::Indefinite, Self::Expires)
        }
    }

    #[inline]
    pub fn is_cached(self) -> bool {
        self != Self::NoCache
    }

    fn expiry(self, now: Duration) -> Option<Duration> {
        match self {
            Self::Expires(d) => Some(now.saturating_add(d)),
            Self::NoCache | Self::Indefinite => None,
        }
    }
}

/// A frozen copy of one solved (start, end) request.
#[derive(Clone, Debug, PartialEq)]
pub struct CacheEntry {
    pub start: NodeId,
    pub end: NodeId,
    pub solution: Vec<ConnectionId>,
    pub lifespan: CacheLifespan,
    /// Clock reading after which the entry is dead; `None` never expires.
    pub expires_at: Option<Duration>,
}

impl CacheEntry {
    pub fn new(
        start: NodeId,
        end: NodeId,
        solution: Vec<ConnectionId>,
        lifespan: CacheLifespan,
        now: Duration,
    ) -> Self {
        Self {
            start,
            end,
            solution,
            lifespan,
            expires_at: lifespan.expiry(now),
        }
    }

    pub fn is_live(&self, now: Duration) -> bool {
        self.expires_at.is_none_or(|t| now < t)
    }

    /// Reset the expiry as if the entry had just been inserted with
    /// `lifespan`.
    pub fn restart(&mut self, lifespan: CacheLifespan, now: Duration) {
        self.lifespan = lifespan;
        self.expires_at = lifespan.expiry(now);
    }

    /// Whether the destination or the stored path depends on `element`.
    pub fn uses(&self, graph: &Graph, element: impl Into<GraphElement>) -> bool {
        route_uses(graph, Some(self.end), &self.solution, element.into())
    }
}

#[derive(Debug, Default)]
pub struct PathCache {
    entries: Vec<CacheEntry>,
}

impl PathCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the first live entry matching the seeker's endpoints whose
    /// path the seeker may still traverse. A hit is restarted with the
    /// seeker's lifespan unless that lifespan is `NoCache`.
    pub fn lookup(
        &mut self,
        graph: &Graph,
        seeker: &Seeker,
        now: Duration,
    ) -> Option<Vec<ConnectionId>> {
        let (start, end) = (seeker.start()?, seeker.end()?);
        let entry = self.entries.iter_mut().find(|e| {
            e.start == start
                && e.end == end
                && e.is_live(now)
                && seeker.valid_path(graph, &e.solution)
        })?;
        let lifespan = seeker.cache_lifespan();
        if lifespan.is_cached() {
            entry.restart(lifespan, now);
        }
        Some(entry.solution.clone())
    }

    /// Store a solution. Returns `false` without storing when `lifespan`
    /// is `NoCache`.
    pub fn insert(
        &mut self,
        start: NodeId,
        end: NodeId,
        solution: Vec<ConnectionId>,
        lifespan: CacheLifespan,
        now: Duration,
    ) -> bool {
        if !lifespan.is_cached() {
            return false;
        }
        self.entries.push(CacheEntry::new(start, end, solution, lifespan, now));
        true
    }

    /// Drop dead entries and return how many were removed.
    pub fn expire(&mut self, now: Duration) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| e.is_live(now));
        before - self.entries.len()
    }

    /// Drop entries that depend on `element` and return how many were
    /// removed.
    pub fn evict(&mut self, graph: &Graph, element: GraphElement) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| !e.uses(graph, element));
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CacheEntry> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seeker::{SeekerConfig, SeekerId};
    use slotmap::SlotMap;
    use waypoint_core::{NetworkBuilder, NetworkHandle, NodeSpec, Vec3};

    const SEC: Duration = Duration::from_secs(1);

    /// 0 ⇄ 1 ⇄ 2, the 1–2 pair only one unit wide.
    fn strip() -> (Graph, NetworkHandle) {
        let mut b = NetworkBuilder::new("strip").size(Vec3::splat(10.0));
        let n0 = b.add_node(NodeSpec::at(Vec3::ZERO));
        let n1 = b.add_node(NodeSpec::at(Vec3::new(1.0, 0.0, 0.0)));
        let n2 = b.add_node(NodeSpec::at(Vec3::new(2.0, 0.0, 0.0)));
        b.connect_both(n0, n1, 1.0, 4.0);
        b.connect_both(n1, n2, 1.0, 1.0);
        let mut graph = Graph::new();
        let h = graph.register(b).unwrap();
        (graph, h)
    }

    fn seeker(h: &NetworkHandle, radius: f32, lifespan: CacheLifespan) -> Seeker {
        let mut ids: SlotMap<SeekerId, ()> = SlotMap::with_key();
        let config = SeekerConfig::new(Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0)).radius(radius);
        Seeker::new(ids.insert(()), config, Some(h.node(0)), Some(h.node(2)), lifespan)
    }

    fn route(h: &NetworkHandle) -> Vec<ConnectionId> {
        vec![h.connection(0), h.connection(2)]
    }

    #[test]
    fn lifespan_from_seconds() {
        assert_eq!(CacheLifespan::from_secs_f32(0.0), CacheLifespan::NoCache);
        assert_eq!(CacheLifespan::from_secs_f32(-1.0), CacheLifespan::Indefinite);
        assert_eq!(
            CacheLifespan::from_secs_f32(2.5),
            CacheLifespan::Expires(Duration::from_millis(2500))
        );
        assert_eq!(CacheLifespan::from_secs_f32(f32::INFINITY), CacheLifespan::Indefinite);
        assert_eq!(CacheLifespan::from_secs_f32(f32::NAN), CacheLifespan::NoCache);
        assert!(!CacheLifespan::default().is_cached());
    }

    #[test]
    fn no_cache_lifespan_is_not_stored() {
        let (_, h) = strip();
        let mut cache = PathCache::new();
        let stored = cache.insert(
            h.node(0),
            h.node(2),
            route(&h),
            CacheLifespan::NoCache,
            Duration::ZERO,
        );
        assert!(!stored);
        assert!(cache.is_empty());
    }

    #[test]
    fn hit_returns_a_copy_and_restarts_expiry() {
        let (graph, h) = strip();
        let mut cache = PathCache::new();
        cache.insert(h.node(0), h.node(2), route(&h), CacheLifespan::Expires(SEC), Duration::ZERO);

        let s = seeker(&h, 0.0, CacheLifespan::Expires(SEC * 10));
        let hit = cache.lookup(&graph, &s, SEC / 2).unwrap();
        assert_eq!(hit, route(&h));
        let entry = cache.iter().next().unwrap();
        assert_eq!(entry.lifespan, CacheLifespan::Expires(SEC * 10));
        assert_eq!(entry.expires_at, Some(SEC / 2 + SEC * 10));
    }

    #[test]
    fn hit_with_no_cache_request_keeps_expiry() {
        let (graph, h) = strip();
        let mut cache = PathCache::new();
        cache.insert(h.node(0), h.node(2), route(&h), CacheLifespan::Expires(SEC), Duration::ZERO);
        let s = seeker(&h, 0.0, CacheLifespan::NoCache);
        assert!(cache.lookup(&graph, &s, SEC / 2).is_some());
        assert_eq!(cache.iter().next().unwrap().expires_at, Some(SEC));
    }

    #[test]
    fn path_invalid_for_seeker_is_a_miss() {
        let (mut graph, h) = strip();
        let mut cache = PathCache::new();
        cache.insert(h.node(0), h.node(2), route(&h), CacheLifespan::Indefinite, Duration::ZERO);

        // Too wide for the 1–2 connection.
        assert!(cache.lookup(&graph, &seeker(&h, 0.6, CacheLifespan::NoCache), SEC).is_none());
        assert!(cache.lookup(&graph, &seeker(&h, 0.5, CacheLifespan::NoCache), SEC).is_some());

        graph.set_connection_enabled(h.connection(2), false).unwrap();
        assert!(cache.lookup(&graph, &seeker(&h, 0.0, CacheLifespan::NoCache), SEC).is_none());
        // A miss leaves the entry in place.
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn dead_entries_miss_and_are_swept() {
        let (graph, h) = strip();
        let mut cache = PathCache::new();
        cache.insert(h.node(0), h.node(2), route(&h), CacheLifespan::Expires(SEC), Duration::ZERO);
        let back = vec![h.connection(3), h.connection(1)];
        cache.insert(h.node(2), h.node(0), back, CacheLifespan::Indefinite, Duration::ZERO);

        let s = seeker(&h, 0.0, CacheLifespan::NoCache);
        assert!(cache.lookup(&graph, &s, SEC).is_none());
        assert_eq!(cache.expire(SEC / 2), 0);
        assert_eq!(cache.expire(SEC), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.expire(SEC * 1000), 0);
    }

    #[test]
    fn evict_removes_entries_using_element() {
        let (graph, h) = strip();
        let mut cache = PathCache::new();
        cache.insert(h.node(0), h.node(2), route(&h), CacheLifespan::Indefinite, Duration::ZERO);
        let first_hop = vec![h.connection(0)];
        cache.insert(h.node(0), h.node(1), first_hop, CacheLifespan::Indefinite, Duration::ZERO);

        // The reverse connection is on neither path.
        assert_eq!(cache.evict(&graph, h.connection(3).into()), 0);
        // Node 2 is the end of the first entry only.
        assert_eq!(cache.evict(&graph, h.node(2).into()), 1);
        assert_eq!(cache.iter().next().unwrap().end, h.node(1));
        assert_eq!(cache.evict(&graph, h.network.into()), 1);
        assert!(cache.is_empty());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn lifespan_serde_round_trip() {
        let lifespan = CacheLifespan::Expires(Duration::from_millis(1500));
        let json = serde_json::to_string(&lifespan).unwrap();
        let back: CacheLifespan = serde_json::from_str(&json).unwrap();
        assert_eq!(back, lifespan);
    }
}
