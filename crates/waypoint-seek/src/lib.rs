//! Incremental, time-sliced A* search over a [`waypoint_core::Graph`].
//!
//! A [`Control`] owns the graph, every [`Seeker`], and a shared path cache.
//! Searches are cooperative: each call to [`Control::tick`] resumes every
//! active seeker for at most its time budget, so a host can spread
//! expensive searches over many frames without threads.
//!
//! # Lifecycle
//!
//! | State | Registry set | Reached by |
//! |---|---|---|
//! | [`SeekerState::Idle`] | idle | creation, [`Control::stop`] |
//! | [`SeekerState::Seeking`] | active | [`Control::start_search`] |
//! | [`SeekerState::Completed`] | used | a found path or a cache hit |
//! | [`SeekerState::Failed`] | idle | unresolved endpoints, exhausted search |
//! | [`SeekerState::Invalidated`] | none | graph changes under the seeker |
//!
//! Outcomes are reported to [`SearchMonitor`]s attached to each seeker.
//!
//! # Example
//!
//! ```
//! use waypoint_core::{NetworkBuilder, NodeSpec, Vec3};
//! use waypoint_seek::{Control, ControlConfig, SeekerConfig};
//!
//! let mut control = Control::new(ControlConfig::default());
//! let mut room = NetworkBuilder::new("room").size(Vec3::splat(10.0));
//! let a = room.add_node(NodeSpec::at(Vec3::ZERO));
//! let b = room.add_node(NodeSpec::at(Vec3::new(3.0, 0.0, 0.0)));
//! room.connect_both(a, b, 3.0, 1.0);
//! control.register_network(room).unwrap();
//!
//! let id = control.create_seeker(SeekerConfig::new(Vec3::ZERO, Vec3::new(3.0, 0.0, 0.0)));
//! control.start_search(id).unwrap();
//! while control.active_count() > 0 {
//!     control.tick();
//! }
//! assert_eq!(control.seeker(id).unwrap().solution().map(<[_]>::len), Some(1));
//! ```

mod cache;
mod clock;
mod control;
mod filter;
mod monitor;
mod path;
mod search;
mod seeker;
mod topology;

pub use cache::{CacheEntry, CacheLifespan, PathCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use control::{Control, ControlConfig, SeekError};
pub use filter::SeekerFilter;
pub use monitor::SearchMonitor;
pub use path::{PathArena, PathNode, PathNodeId};
pub use search::SearchProgress;
pub use seeker::{
    DEFAULT_TIME_BUDGET, Membership, SearchOutcome, Seeker, SeekerConfig, SeekerId, SeekerState,
    Step,
};
pub use topology::TopologyIndex;
