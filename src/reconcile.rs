//! Keyed list reconciliation.
//!
//! A [`Reconciler`] owns one node per key (MAC address). Every poll hands it
//! the fresh list; nodes for keys that are still present keep their
//! [`NodeId`] and only bump their revision when the content actually changed,
//! new keys get new nodes, and vanished keys fade for a fixed delay before
//! being evicted by [`Reconciler::sweep`]. The browser mirrors node ids onto
//! DOM elements, so a stable id means a stable element.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NodeId(u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Live,
    Fading { since: Instant },
}

#[derive(Debug, Clone)]
pub struct Node<T> {
    pub id: NodeId,
    pub key: String,
    pub content: T,
    /// Bumped whenever `content` is replaced by a different value
    pub revision: u64,
    pub phase: Phase,
}

impl<T> Node<T> {
    pub fn is_fading(&self) -> bool {
        matches!(self.phase, Phase::Fading { .. })
    }
}

/// What a reconcile pass did, by node id.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Patch {
    pub created: Vec<NodeId>,
    pub updated: Vec<NodeId>,
    pub fading: Vec<NodeId>,
    pub removed: Vec<NodeId>,
}

impl Patch {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty()
            && self.updated.is_empty()
            && self.fading.is_empty()
            && self.removed.is_empty()
    }
}

#[derive(Debug)]
pub struct Reconciler<T> {
    fade: Duration,
    next_id: u64,
    // NodeIds are allocated in increasing order, so iteration order is
    // insertion order: new rows are appended, existing rows stay in place.
    nodes: BTreeMap<NodeId, Node<T>>,
    index: HashMap<String, NodeId>,
}

impl<T: Clone + PartialEq> Reconciler<T> {
    /// `fade` is how long a vanished node lingers before eviction. A zero
    /// delay removes it within the same pass.
    pub fn new(fade: Duration) -> Self {
        Self {
            fade,
            next_id: 1,
            nodes: BTreeMap::new(),
            index: HashMap::new(),
        }
    }

    pub fn reconcile<I>(&mut self, items: I, now: Instant) -> Patch
    where
        I: IntoIterator<Item = (String, T)>,
    {
        let items: Vec<(String, T)> = items.into_iter().collect();
        let present: HashSet<&str> = items.iter().map(|(k, _)| k.as_str()).collect();
        let mut patch = Patch::default();

        let vanished: Vec<String> = self
            .index
            .keys()
            .filter(|k| !present.contains(k.as_str()))
            .cloned()
            .collect();
        for key in vanished {
            self.start_fade(&key, now, &mut patch);
        }

        for (key, content) in items {
            match self.index.get(&key).copied() {
                Some(id) => {
                    let Some(node) = self.nodes.get_mut(&id) else {
                        continue;
                    };
                    let revived = node.is_fading();
                    node.phase = Phase::Live;
                    if node.content != content {
                        node.content = content;
                        node.revision += 1;
                        patch.updated.push(id);
                    } else if revived {
                        patch.updated.push(id);
                    }
                }
                None => {
                    let id = self.allocate();
                    self.index.insert(key.clone(), id);
                    self.nodes.insert(
                        id,
                        Node {
                            id,
                            key,
                            content,
                            revision: 0,
                            phase: Phase::Live,
                        },
                    );
                    patch.created.push(id);
                }
            }
        }

        patch.removed.extend(self.sweep(now));
        patch
    }

    /// Evict nodes whose fade delay has elapsed.
    pub fn sweep(&mut self, now: Instant) -> Vec<NodeId> {
        let expired: Vec<NodeId> = self
            .nodes
            .values()
            .filter(|n| match n.phase {
                Phase::Fading { since } => now.saturating_duration_since(since) >= self.fade,
                Phase::Live => false,
            })
            .map(|n| n.id)
            .collect();
        for id in &expired {
            if let Some(node) = self.nodes.remove(id) {
                self.index.remove(&node.key);
            }
        }
        expired
    }

    /// Start fading one node ahead of the next poll. Returns false when the
    /// key is unknown or already fading.
    pub fn fade(&mut self, key: &str, now: Instant) -> bool {
        let mut patch = Patch::default();
        self.start_fade(key, now, &mut patch);
        !patch.fading.is_empty() || !patch.removed.is_empty()
    }

    pub fn fade_all(&mut self, now: Instant) -> usize {
        let keys: Vec<String> = self.index.keys().cloned().collect();
        keys.into_iter().filter(|k| self.fade(k, now)).count()
    }

    /// Drop every node immediately.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.index.clear();
    }

    /// Mutate every live node in place. `f` returns whether it changed
    /// anything; changed nodes get a new revision.
    pub fn update_each<F>(&mut self, mut f: F) -> Vec<NodeId>
    where
        F: FnMut(&mut T) -> bool,
    {
        self.nodes
            .values_mut()
            .filter(|n| !n.is_fading())
            .filter_map(|n| {
                if f(&mut n.content) {
                    n.revision += 1;
                    Some(n.id)
                } else {
                    None
                }
            })
            .collect()
    }

    pub fn get(&self, key: &str) -> Option<&Node<T>> {
        self.index.get(key).and_then(|id| self.nodes.get(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node<T>> {
        self.nodes.values()
    }

    pub fn live_len(&self) -> usize {
        self.nodes.values().filter(|n| !n.is_fading()).count()
    }

    fn start_fade(&mut self, key: &str, now: Instant, patch: &mut Patch) {
        let Some(id) = self.index.get(key).copied() else {
            return;
        };
        let Some(node) = self.nodes.get_mut(&id) else {
            return;
        };
        if node.is_fading() {
            return;
        }
        if self.fade.is_zero() {
            self.nodes.remove(&id);
            self.index.remove(key);
            patch.removed.push(id);
        } else {
            node.phase = Phase::Fading { since: now };
            patch.fading.push(id);
        }
    }

    fn allocate(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }
}
