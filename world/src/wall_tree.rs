//! Spanning forest over wall tiles.
//!
//! Nodes live in an arena addressed by [`NodeId`] and are recycled through a
//! free list. Only registered nodes appear in the location index; nodes still
//! queued during a merge are allocated but unregistered until they are
//! confirmed, which is how loop closures are recognised.

use std::{
    collections::HashMap,
    ops::{Index, IndexMut},
};

use warren_core::{Direction, Location, RoomId};

/// Arena index of a wall node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct NodeId(u32);

/// One wall tile's place in its tree.
#[derive(Clone, Debug)]
pub(crate) struct WallNode {
    pub(crate) at: Location,
    pub(crate) parent: Option<NodeId>,
    /// Direction from this node toward its parent.
    pub(crate) to_parent: Direction,
    /// Children indexed by the direction from this node toward them.
    pub(crate) children: [Option<NodeId>; 4],
    pub(crate) root: NodeId,
    pub(crate) depth: u32,
    /// Rooms whose loop closed against this node, with the direction from
    /// the discarded duplicate toward this node.
    pub(crate) links: Vec<(RoomId, Direction)>,
}

impl WallNode {
    fn vacant(id: NodeId) -> Self {
        Self {
            at: Location::default(),
            parent: None,
            to_parent: Direction::None,
            children: [None; 4],
            root: id,
            depth: 0,
            links: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct WallForest {
    nodes: Vec<WallNode>,
    free: Vec<NodeId>,
    by_location: HashMap<Location, NodeId>,
    tree_sizes: HashMap<NodeId, usize>,
}

impl WallForest {
    /// Registered node at `at`.
    pub(crate) fn at(&self, at: Location) -> Option<NodeId> {
        self.by_location.get(&at).copied()
    }

    pub(crate) fn contains(&self, at: Location) -> bool {
        self.by_location.contains_key(&at)
    }

    /// Number of registered nodes.
    pub(crate) fn len(&self) -> usize {
        self.by_location.len()
    }

    /// Tracked tile count of the tree rooted at `root`.
    pub(crate) fn tree_size(&self, root: NodeId) -> usize {
        self.tree_sizes.get(&root).copied().unwrap_or(0)
    }

    /// Tracked tree sizes keyed by root.
    pub(crate) fn tree_sizes(&self) -> impl Iterator<Item = (NodeId, usize)> + '_ {
        self.tree_sizes.iter().map(|(&root, &size)| (root, size))
    }

    /// Registered nodes ordered by location.
    pub(crate) fn registered(&self) -> Vec<(Location, NodeId)> {
        let mut nodes: Vec<_> = self.by_location.iter().map(|(&at, &id)| (at, id)).collect();
        nodes.sort();
        nodes
    }

    /// Allocates and registers a singleton tree.
    pub(crate) fn plant(&mut self, at: Location) -> NodeId {
        let id = self.allocate(at, None);
        self.register(id);
        id
    }

    /// Allocates an unregistered node, optionally as a child reached from
    /// `parent` by stepping opposite to `to_parent`.
    pub(crate) fn allocate(&mut self, at: Location, parent: Option<(NodeId, Direction)>) -> NodeId {
        let id = match self.free.pop() {
            Some(id) => id,
            None => {
                let id = NodeId(self.nodes.len() as u32);
                self.nodes.push(WallNode::vacant(id));
                id
            }
        };
        let mut node = WallNode::vacant(id);
        node.at = at;
        if let Some((parent, to_parent)) = parent {
            let (root, depth) = (self[parent].root, self[parent].depth);
            node.parent = Some(parent);
            node.to_parent = to_parent;
            node.root = root;
            node.depth = depth + 1;
            self[parent].children[to_parent.reverse().index()] = Some(id);
        }
        self[id] = node;
        id
    }

    /// Makes an allocated node visible through the location index.
    pub(crate) fn register(&mut self, id: NodeId) {
        let (at, root) = (self[id].at, self[id].root);
        let _ = self.by_location.insert(at, id);
        *self.tree_sizes.entry(root).or_insert(0) += 1;
    }

    /// Unlinks `id` from its parent; it keeps its subtree.
    pub(crate) fn detach(&mut self, id: NodeId) {
        let Some(parent) = self[id].parent.take() else {
            return;
        };
        let slot = self[id].to_parent.reverse().index();
        if self[parent].children[slot] == Some(id) {
            self[parent].children[slot] = None;
        }
    }

    /// Drops an unregistered duplicate.
    pub(crate) fn discard(&mut self, id: NodeId) {
        self.detach(id);
        self.free.push(id);
    }

    /// Unregisters and frees a node, keeping tree sizes current.
    pub(crate) fn release(&mut self, id: NodeId) {
        let (at, root) = (self[id].at, self[id].root);
        if self.by_location.get(&at) == Some(&id) {
            let _ = self.by_location.remove(&at);
            if root == id {
                let _ = self.tree_sizes.remove(&root);
            } else if let Some(size) = self.tree_sizes.get_mut(&root) {
                *size = size.saturating_sub(1);
            }
        }
        self[id] = WallNode::vacant(id);
        self.free.push(id);
    }

    pub(crate) fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self[id].children.iter().flatten().copied()
    }

    /// Nearest node shared by the ancestor chains of `a` and `b`.
    pub(crate) fn common_ancestor(&self, mut a: NodeId, mut b: NodeId) -> Option<NodeId> {
        if self[a].root != self[b].root {
            return None;
        }
        while self[a].depth > self[b].depth {
            a = self[a].parent?;
        }
        while self[b].depth > self[a].depth {
            b = self[b].parent?;
        }
        while a != b {
            a = self[a].parent?;
            b = self[b].parent?;
        }
        Some(a)
    }

    /// Tiles from `from` up to and including `ancestor`.
    pub(crate) fn path(&self, from: NodeId, ancestor: NodeId) -> Vec<Location> {
        let mut tiles = vec![self[from].at];
        let mut current = from;
        while current != ancestor {
            let Some(parent) = self[current].parent else {
                break;
            };
            tiles.push(self[parent].at);
            current = parent;
        }
        tiles
    }
}

impl Index<NodeId> for WallForest {
    type Output = WallNode;

    fn index(&self, id: NodeId) -> &WallNode {
        &self.nodes[id.0 as usize]
    }
}

impl IndexMut<NodeId> for WallForest {
    fn index_mut(&mut self, id: NodeId) -> &mut WallNode {
        &mut self.nodes[id.0 as usize]
    }
}
