use slotmap::new_key_type;

new_key_type! {
    /// Identifies a network in the [`Graph`](crate::Graph).
    pub struct NetworkId;

    /// Identifies a node. Stable for the lifetime of the graph.
    pub struct NodeId;

    /// Identifies a directed connection between two nodes.
    ///
    /// Two connections are the same connection exactly when their ids are
    /// equal; caches and searches match on this identity.
    pub struct ConnectionId;
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;
    use std::collections::HashSet;

    #[test]
    fn ids_are_distinct_and_hashable() {
        let mut sm: SlotMap<ConnectionId, ()> = SlotMap::with_key();
        let a = sm.insert(());
        let b = sm.insert(());
        assert_ne!(a, b);
        let set: HashSet<ConnectionId> = [a, b, a].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn default_id_is_null() {
        let mut sm: SlotMap<NodeId, ()> = SlotMap::with_key();
        let a = sm.insert(());
        assert!(NodeId::default() != a);
        assert!(!sm.contains_key(NodeId::default()));
    }
}
