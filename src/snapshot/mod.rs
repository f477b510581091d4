pub mod build;
pub mod format;
pub mod node;

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub use node::{RefId, SemanticNode, CLICKABLE_ROLES, INPUT_ROLES};

/// The addressable view of one page at one moment.
pub struct SemanticSnapshot {
    /// Every extracted node in accessibility-tree order, unfiltered.
    pub nodes: Vec<SemanticNode>,
    /// RefID lookup into `nodes`. Refs are unique within a snapshot.
    pub ref_map: BTreeMap<RefId, usize>,
    /// Backend node id lookup into `nodes`.
    pub by_backend: HashMap<i64, usize>,
    /// Clickable view, in ref-assignment order.
    pub clickable: Vec<RefId>,
    /// Input view, in ref-assignment order.
    pub inputs: Vec<RefId>,
    pub generation: u64,
    pub created_at: Instant,
    pub url: String,
}

impl SemanticSnapshot {
    pub fn get(&self, ref_id: RefId) -> Option<&SemanticNode> {
        self.ref_map.get(&ref_id).map(|&i| &self.nodes[i])
    }

    pub fn by_backend_id(&self, backend_node_id: i64) -> Option<&SemanticNode> {
        self.by_backend.get(&backend_node_id).map(|&i| &self.nodes[i])
    }

    /// Nth entry of the clickable view (zero-based), the legacy
    /// `Clickable Element [N]` addressing form.
    pub fn nth_clickable(&self, n: usize) -> Option<&SemanticNode> {
        self.clickable.get(n).and_then(|&r| self.get(r))
    }

    pub fn nth_input(&self, n: usize) -> Option<&SemanticNode> {
        self.inputs.get(n).and_then(|&r| self.get(r))
    }

    /// The wire form consumed by the tool surface.
    pub fn render(&self) -> String {
        format::render(self)
    }
}

/// Per-page snapshot cache. Single writer (the builder), many readers.
/// Invalidation is lazy: it only clears the slot, the next consumer
/// rebuilds.
pub struct SnapshotCache {
    ttl: Duration,
    current: parking_lot::Mutex<Option<Arc<SemanticSnapshot>>>,
    generation: AtomicU64,
}

impl SnapshotCache {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            ttl: Duration::from_secs(ttl_secs),
            current: parking_lot::Mutex::new(None),
            generation: AtomicU64::new(0),
        }
    }

    /// The current snapshot, unless it aged out.
    pub fn current(&self) -> Option<Arc<SemanticSnapshot>> {
        let guard = self.current.lock();
        match guard.as_ref() {
            Some(snap) if snap.created_at.elapsed() < self.ttl => Some(Arc::clone(snap)),
            _ => None,
        }
    }

    /// Replace the current snapshot atomically.
    pub fn store(&self, snapshot: Arc<SemanticSnapshot>) {
        *self.current.lock() = Some(snapshot);
    }

    /// Called after DOM-mutating operations and explicit snapshot requests.
    pub fn invalidate(&self) {
        *self.current.lock() = None;
    }

    pub fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::Relaxed) + 1
    }
}
