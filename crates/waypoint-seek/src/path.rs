use waypoint_core::ConnectionId;

/// Index of a [`PathNode`] in its [`PathArena`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PathNodeId(u32);

impl PathNodeId {
    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// One search record: the connection just taken and the scores accumulated
/// along the chain that led to it. Immutable once pushed.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PathNode {
    pub connection: ConnectionId,
    /// Cost so far, including `connection`.
    pub g: f32,
    /// Heuristic estimates summed along the chain.
    pub h: f32,
    /// Record of the previous connection; `None` for a connection leaving
    /// the start node.
    pub parent: Option<PathNodeId>,
}

impl PathNode {
    /// Priority score.
    #[inline]
    pub fn f(&self) -> f32 {
        self.g + self.h
    }
}

/// Append-only storage for the records of a single search.
#[derive(Clone, Debug, Default)]
pub struct PathArena {
    nodes: Vec<PathNode>,
}

impl PathArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a record extending `parent` (or starting a chain when `None`)
    /// with `connection`. `g` and `h` are the increments for this step.
    pub fn push(
        &mut self,
        parent: Option<PathNodeId>,
        connection: ConnectionId,
        g: f32,
        h: f32,
    ) -> PathNodeId {
        let (base_g, base_h) = match parent {
            Some(p) => {
                let p = &self.nodes[p.index()];
                (p.g, p.h)
            }
            None => (0.0, 0.0),
        };
        let id = PathNodeId(self.nodes.len() as u32);
        self.nodes.push(PathNode {
            connection,
            g: base_g + g,
            h: base_h + h,
            parent,
        });
        id
    }

    #[inline]
    pub fn get(&self, id: PathNodeId) -> &PathNode {
        &self.nodes[id.index()]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Walk parent links from `last` back to the start and return the
    /// connections in travel order.
    pub fn reconstruct(&self, last: PathNodeId) -> Vec<ConnectionId> {
        let mut path = Vec::new();
        let mut cur = Some(last);
        while let Some(id) = cur {
            let node = self.get(id);
            path.push(node.connection);
            cur = node.parent;
        }
        path.reverse();
        path
    }

    pub fn iter(&self) -> impl Iterator<Item = &PathNode> {
        self.nodes.iter()
    }
}
