//! Property-based tests for search and registry bookkeeping.
//!
//! Random directed graphs are laid out on a small lattice so every node can
//! be addressed exactly by its position, then searched through `Control`.

use std::collections::{BTreeSet, HashSet, VecDeque};
use std::time::Duration;

use proptest::prelude::*;
use waypoint_core::{
    ConnectionId, ConnectionSpec, Graph, NetworkBuilder, NetworkHandle, NodeId, NodeSpec, Vec3,
};
use waypoint_seek::{
    CacheLifespan, Control, ControlConfig, ManualClock, Membership, SearchOutcome, SeekerConfig,
    SeekerId, SeekerState, Step,
};

// ===========================================================================
// Generators
// ===========================================================================

/// Node count and (from, to, cost) triples.
fn arb_graph(
    max_nodes: usize,
    max_edges: usize,
) -> impl Strategy<Value = (usize, Vec<(usize, usize, u8)>)> {
    (2..=max_nodes).prop_flat_map(move |n| {
        (
            Just(n),
            proptest::collection::vec((0..n, 0..n, 1..10u8), 0..=max_edges),
        )
    })
}

#[derive(Debug, Clone)]
enum Op {
    Start(usize),
    Resume(usize),
    Stop(usize),
    Invalidate(usize),
    Kill(usize),
    Disable(usize),
    Enable(usize),
    Tick,
}

fn arb_ops(max_ops: usize) -> impl Strategy<Value = Vec<Op>> {
    proptest::collection::vec(
        prop_oneof![
            (0..8usize).prop_map(Op::Start),
            (0..8usize).prop_map(Op::Resume),
            (0..8usize).prop_map(Op::Stop),
            (0..8usize).prop_map(Op::Invalidate),
            (0..8usize).prop_map(Op::Kill),
            (0..40usize).prop_map(Op::Disable),
            (0..40usize).prop_map(Op::Enable),
            Just(Op::Tick),
        ],
        1..=max_ops,
    )
}

// ===========================================================================
// Helpers
// ===========================================================================

fn position(i: usize) -> Vec3 {
    Vec3::new((i % 4) as f32 * 2.0, (i / 4) as f32 * 2.0, 0.0)
}

fn build(
    n: usize,
    edges: &[(usize, usize, u8)],
    config: ControlConfig,
) -> (Control, NetworkHandle) {
    let mut control = Control::with_clock(config, ManualClock::new());
    let mut b = NetworkBuilder::new("lattice").size(Vec3::splat(100.0));
    for i in 0..n {
        b.add_node(NodeSpec::at(position(i)));
    }
    for &(from, to, cost) in edges {
        if from != to {
            b.connect(ConnectionSpec::new(from, to).cost(f32::from(cost)));
        }
    }
    let handle = control.register_network(b).unwrap();
    (control, handle)
}

/// Breadth-first reachability over connections, never stepping straight
/// back along the connection just taken.
fn reachable(graph: &Graph, start: NodeId, end: NodeId) -> bool {
    if start == end {
        return true;
    }
    let mut seen = HashSet::new();
    let mut queue = VecDeque::new();
    for &c in graph.node(start).unwrap().connections() {
        if seen.insert(c) {
            queue.push_back(c);
        }
    }
    while let Some(c) = queue.pop_front() {
        let conn = graph.connection(c).unwrap();
        if conn.to() == end {
            return true;
        }
        for &next in graph.node(conn.to()).unwrap().connections() {
            if graph.connection(next).unwrap().to() == conn.from() {
                continue;
            }
            if seen.insert(next) {
                queue.push_back(next);
            }
        }
    }
    false
}

fn run(control: &mut Control, id: SeekerId) -> SearchOutcome {
    let mut step = control.start_search(id).unwrap();
    while step.is_pending() {
        step = control.resume(id).unwrap();
    }
    match step {
        Step::Done(outcome) => outcome,
        Step::Pending => unreachable!(),
    }
}

fn assert_chain(graph: &Graph, start: NodeId, end: NodeId, path: &[ConnectionId]) {
    if start == end {
        assert!(path.is_empty());
        return;
    }
    let conns: Vec<_> = path.iter().map(|&c| graph.connection(c).unwrap()).collect();
    assert_eq!(conns.first().unwrap().from(), start);
    assert_eq!(conns.last().unwrap().to(), end);
    for pair in conns.windows(2) {
        assert_eq!(pair[0].to(), pair[1].from(), "chain is not contiguous");
        assert_ne!(pair[1].to(), pair[0].from(), "path steps straight back");
    }
    let distinct: HashSet<_> = path.iter().collect();
    assert_eq!(distinct.len(), path.len(), "connection used twice");
}

fn assert_index_consistent(control: &Control) {
    let mut total = 0;
    for m in [Membership::Idle, Membership::Active, Membership::Used] {
        let expected: BTreeSet<SeekerId> = control
            .seekers()
            .filter(|(_, s)| s.state().membership() == Some(m))
            .map(|(id, _)| id)
            .collect();
        let actual: BTreeSet<SeekerId> = control.seekers_in(m).collect();
        assert_eq!(actual, expected);
        total += actual.len();
    }
    let invalidated = control
        .seekers()
        .filter(|(_, s)| s.state() == SeekerState::Invalidated)
        .count();
    assert_eq!(total + invalidated, control.seeker_count());
}

// ===========================================================================
// Properties
// ===========================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// A search completes exactly when the end is reachable, and a found
    /// path is a contiguous chain from start to end.
    #[test]
    fn completes_iff_reachable(
        (n, edges) in arb_graph(12, 40),
        s in 0..12usize,
        e in 0..12usize,
    ) {
        let (s, e) = (s % n, e % n);
        let (mut control, h) = build(n, &edges, ControlConfig::default());
        let id = control.create_seeker(SeekerConfig::new(position(s), position(e)));
        prop_assert_eq!(control.seeker(id).unwrap().start(), Some(h.node(s)));
        prop_assert_eq!(control.seeker(id).unwrap().end(), Some(h.node(e)));

        let outcome = run(&mut control, id);
        let expected = reachable(control.graph(), h.node(s), h.node(e));
        prop_assert_eq!(outcome == SearchOutcome::Completed, expected);
        if expected {
            let path = control.seeker(id).unwrap().solution().unwrap().to_vec();
            assert_chain(control.graph(), h.node(s), h.node(e), &path);
        } else {
            prop_assert!(control.seeker(id).unwrap().solution().is_none());
        }
    }

    /// Slicing a search into single expansions yields the same answer as
    /// running it in one go.
    #[test]
    fn time_slicing_does_not_change_result(
        (n, edges) in arb_graph(12, 40),
        s in 0..12usize,
        e in 0..12usize,
    ) {
        let (s, e) = (s % n, e % n);
        let (mut control, _) = build(n, &edges, ControlConfig::default());
        let whole = control.create_seeker(SeekerConfig::new(position(s), position(e)));
        let sliced = control.create_seeker(
            SeekerConfig::new(position(s), position(e)).time_budget(Duration::ZERO),
        );

        let a = run(&mut control, whole);
        let b = run(&mut control, sliced);
        prop_assert_eq!(a, b);
        prop_assert_eq!(
            control.seeker(whole).unwrap().solution(),
            control.seeker(sliced).unwrap().solution()
        );
    }

    /// Arbitrary lifecycle and mutation sequences keep the idle/active/used
    /// sets in step with seeker states.
    #[test]
    fn registry_sets_follow_states((n, edges) in arb_graph(8, 24), ops in arb_ops(40)) {
        let config = ControlConfig {
            default_cache_lifespan: CacheLifespan::Indefinite,
            ..Default::default()
        };
        let (mut control, h) = build(n, &edges, config);
        let mut ids: Vec<SeekerId> = (0..8)
            .map(|i| {
                let config = SeekerConfig::new(position(i % n), position((i * 3 + 1) % n))
                    .time_budget(Duration::ZERO);
                control.create_seeker(config)
            })
            .collect();

        for op in ops {
            match op {
                Op::Start(i) => {
                    let _ = control.start_search(ids[i]);
                }
                Op::Resume(i) => {
                    let _ = control.resume(ids[i]);
                }
                Op::Stop(i) => {
                    let _ = control.stop(ids[i]);
                }
                Op::Invalidate(i) => {
                    let _ = control.invalidate(ids[i]);
                }
                Op::Kill(i) => {
                    if control.kill(ids[i]).is_ok() {
                        let config = SeekerConfig::new(position(0), position(n - 1));
                        ids[i] = control.create_seeker(config);
                    }
                }
                Op::Disable(c) => {
                    if let Some(&conn) = h.connections.get(c) {
                        control.set_connection_enabled(conn, false).unwrap();
                    }
                }
                Op::Enable(c) => {
                    if let Some(&conn) = h.connections.get(c) {
                        control.set_connection_enabled(conn, true).unwrap();
                    }
                }
                Op::Tick => {
                    control.tick();
                }
            }
            assert_index_consistent(&control);
        }

        // Every cached path is still made of enabled connections, since
        // disabling one evicts the entries using it.
        for entry in control.cache().iter() {
            for &c in &entry.solution {
                prop_assert!(control.graph().connection(c).unwrap().is_enabled());
            }
        }
    }
}
