use std::rc::Rc;

use crate::seeker::Seeker;

/// Observer of a [`Seeker`]'s outcome.
///
/// Callbacks run synchronously on the thread driving [`Control`](crate::Control),
/// after the registry has already recorded the transition. All three have
/// empty default bodies.
pub trait SearchMonitor {
    /// The seeker found a path (possibly empty, or adopted from the cache).
    fn on_search_completed(&self, _seeker: &Seeker) {}

    /// The seeker could not resolve its endpoints or exhausted the graph.
    fn on_search_failed(&self, _seeker: &Seeker) {}

    /// The graph changed under the seeker's destination, solution, or
    /// in-progress search.
    fn on_seeker_invalidated(&self, _seeker: &Seeker) {}
}

/// Which callback to deliver.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Notification {
    Completed,
    Failed,
    Invalidated,
}

impl Notification {
    pub(crate) fn deliver(self, monitor: &dyn SearchMonitor, seeker: &Seeker) {
        match self {
            Self::Completed => monitor.on_search_completed(seeker),
            Self::Failed => monitor.on_search_failed(seeker),
            Self::Invalidated => monitor.on_seeker_invalidated(seeker),
        }
    }
}

/// Ordered set of monitors, compared by allocation.
#[derive(Clone, Default)]
pub(crate) struct Monitors(Vec<Rc<dyn SearchMonitor>>);

impl Monitors {
    fn position(&self, monitor: &Rc<dyn SearchMonitor>) -> Option<usize> {
        self.0
            .iter()
            .position(|m| std::ptr::addr_eq(Rc::as_ptr(m), Rc::as_ptr(monitor)))
    }

    /// Returns `false` if the monitor was already present.
    pub(crate) fn add(&mut self, monitor: Rc<dyn SearchMonitor>) -> bool {
        if self.position(&monitor).is_some() {
            return false;
        }
        self.0.push(monitor);
        true
    }

    /// Returns `false` if the monitor was not present.
    pub(crate) fn remove(&mut self, monitor: &Rc<dyn SearchMonitor>) -> bool {
        match self.position(monitor) {
            Some(i) => {
                self.0.remove(i);
                true
            }
            None => false,
        }
    }

    pub(crate) fn clear(&mut self) {
        self.0.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.0.len()
    }

    /// A snapshot of the current monitors, so delivery is unaffected by
    /// changes made while callbacks run.
    pub(crate) fn snapshot(&self) -> Vec<Rc<dyn SearchMonitor>> {
        self.0.clone()
    }
}

impl std::fmt::Debug for Monitors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Monitors").field(&self.0.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Quiet;
    impl SearchMonitor for Quiet {}

    #[test]
    fn add_is_idempotent_per_allocation() {
        let a: Rc<dyn SearchMonitor> = Rc::new(Quiet);
        let b: Rc<dyn SearchMonitor> = Rc::new(Quiet);
        let mut monitors = Monitors::default();
        assert!(monitors.add(a.clone()));
        assert!(!monitors.add(a.clone()));
        assert!(monitors.add(b.clone()));
        assert_eq!(monitors.len(), 2);

        assert!(monitors.remove(&a));
        assert!(!monitors.remove(&a));
        assert_eq!(monitors.len(), 1);
        assert_eq!(monitors.snapshot().len(), 1);

        monitors.clear();
        assert_eq!(monitors.len(), 0);
    }
}
