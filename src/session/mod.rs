//! Read-only import sessions over scene archives.
//!
//! A [`Session`] owns one archive's open state: the archive handle,
//! the stream handles it reads through, the materialized node tree,
//! and the per-archive time-sampling list. Sessions are created and
//! destroyed through a [`SessionRegistry`], keyed by an external
//! integer id, and refreshed once per frame with
//! [`Session::update_samples`].

mod node;
mod opener;
mod path;
mod registry;
mod task;

pub use node::{NodeId, NodeSampler, SceneNode, UpdateContext};
pub use path::normalize_path;
pub use registry::SessionRegistry;
pub use task::{AsyncDispatcher, AsyncTask, RayonDispatcher, TaskLatch};

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::archive::Archive;
use crate::core::{SampleSelector, TimeSamplingInfo};
use crate::ogawa::FileStream;
use crate::util::{Chrono, Error, Result};

/// External session key, supplied by the host. Unique per live session.
pub type SessionId = i32;

/// Host-tunable session options.
///
/// The one piece of session state that survives [`Session::reset`], so
/// options configured before a load persist across reloads.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SessionConfig {
    /// Select floor samples so the host can interpolate toward the
    /// following sample; otherwise the nearest sample is selected.
    pub interpolate_samples: bool,
    /// Scale applied to incoming times before sample selection.
    pub time_scale: f64,
    /// Offset applied after scaling.
    pub time_offset: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            interpolate_samples: false,
            time_scale: 1.0,
            time_offset: 0.0,
        }
    }
}

/// One read-only session over a scene archive.
///
/// Either *empty* (no path, no archive, no tree) or *loaded* (path
/// recorded, archive open, tree materialized); [`load`](Self::load)
/// moves between the two states and [`reset`](Self::reset) always
/// returns to empty. There are no other states, and a failed load
/// never leaves partial state behind.
pub struct Session {
    id: SessionId,
    path: String,
    archive: Option<Archive>,
    streams: Vec<Arc<FileStream>>,
    nodes: Vec<SceneNode>,
    samplers: HashMap<NodeId, Box<dyn NodeSampler>>,
    time_samplings: Vec<Arc<TimeSamplingInfo>>,
    pending: Vec<Arc<dyn AsyncTask>>,
    dispatcher: Arc<dyn AsyncDispatcher>,
    config: SessionConfig,
}

impl Session {
    /// Create an empty session. Hosts normally go through
    /// [`SessionRegistry::get_or_create`] instead.
    pub fn new(id: SessionId, dispatcher: Arc<dyn AsyncDispatcher>) -> Self {
        Self {
            id,
            path: String::new(),
            archive: None,
            streams: Vec::new(),
            nodes: Vec::new(),
            samplers: HashMap::new(),
            time_samplings: Vec::new(),
            pending: Vec::new(),
            dispatcher,
            config: SessionConfig::default(),
        }
    }

    /// Load the archive at `raw_path`.
    ///
    /// Loading the path that is already open is a no-op returning
    /// `true`. Any other call resets the session first; an empty
    /// normalized path returns `false` with no open attempt. Open and
    /// materialization faults never escape: they are logged and
    /// converted into a `false` return with the session back in the
    /// empty state.
    pub fn load(&mut self, raw_path: &str) -> bool {
        let path = normalize_path(raw_path);
        debug!(id = self.id, path = %path, "session load");

        if path == self.path && self.archive.is_some() {
            debug!(id = self.id, "archive already loaded");
            return true;
        }

        self.reset();

        let opened = match opener::open_archive(&path) {
            Ok(opened) => opened,
            Err(Error::PathInvalid) => return false,
            Err(e) => {
                warn!(id = self.id, path = %path, error = %e, "failed to open archive");
                self.reset();
                return false;
            }
        };

        self.streams = opened.streams;
        self.archive = Some(opened.archive);
        self.path = path;

        if let Err(e) = self.materialize() {
            warn!(id = self.id, path = %self.path, error = %e, "failed to materialize scene tree");
            self.reset();
            return false;
        }

        if let Some(archive) = &self.archive {
            self.time_samplings = archive.time_samplings().to_vec();
        }

        debug!(
            id = self.id,
            nodes = self.nodes.len(),
            time_samplings = self.time_samplings.len(),
            "session loaded"
        );
        true
    }

    /// Build one node per reachable archive object, depth-first
    /// pre-order: parent before children, full subtree before the next
    /// sibling, children in archive-native order.
    fn materialize(&mut self) -> Result<()> {
        let top = match &self.archive {
            Some(archive) => archive.top().clone(),
            None => return Ok(()),
        };
        self.nodes
            .push(SceneNode::new(NodeId(0), None, String::new(), top));
        self.gather_nodes(NodeId(0))
            .map_err(|e| Error::TreeMaterialization(Box::new(e)))
    }

    fn gather_nodes(&mut self, parent: NodeId) -> Result<()> {
        let object = self.nodes[parent.0].object().clone();
        for i in 0..object.num_children() {
            let child = object.child(i)?;
            let id = NodeId(self.nodes.len());
            let full_path = format!("{}/{}", self.nodes[parent.0].full_path(), child.name());
            self.nodes
                .push(SceneNode::new(id, Some(parent), full_path, child));
            self.nodes[parent.0].push_child(id);
            self.gather_nodes(id)?;
        }
        Ok(())
    }

    /// Return to the empty state.
    ///
    /// Joins every pending async task first, so no resource is
    /// released while deferred work is still in flight. Config is the
    /// one field left untouched.
    pub fn reset(&mut self) {
        self.wait_async();
        self.nodes.clear();
        self.samplers.clear();
        self.time_samplings.clear();
        self.archive = None;
        self.path.clear();
        // The archive above held clones of these handles; clearing the
        // list closes the files.
        self.streams.clear();
        // config intentionally survives
    }

    /// Drive one frame of sample refresh.
    ///
    /// Joins the batch dispatched by the previous call, runs every
    /// node's synchronous update in materialization order, then hands
    /// the newly queued tasks to the dispatcher as one batch and
    /// returns without waiting for them.
    pub fn update_samples(&mut self, time: Chrono) {
        self.wait_async();

        let mapped = time * self.config.time_scale + self.config.time_offset;
        let selector = if self.config.interpolate_samples {
            SampleSelector::time_floor(mapped)
        } else {
            SampleSelector::time_near(mapped)
        };

        let mut ctx = UpdateContext::new();
        for i in 0..self.nodes.len() {
            if let Some(sampler) = self.samplers.get_mut(&NodeId(i)) {
                sampler.update_sample(&self.nodes[i], selector, &mut ctx);
            }
        }

        let batch = ctx.into_batch();
        if !batch.is_empty() {
            debug!(id = self.id, tasks = batch.len(), "dispatching async batch");
            self.dispatcher.dispatch(&batch);
            self.pending = batch;
        }
    }

    /// Full barrier: join every pending task and clear the queue.
    /// No-op when nothing is pending.
    pub fn wait_async(&mut self) {
        for task in self.pending.drain(..) {
            task.wait();
        }
    }

    /// Install the host's sampler for a node. Returns `false` when the
    /// node id does not belong to the current tree.
    pub fn set_sampler(&mut self, id: NodeId, sampler: Box<dyn NodeSampler>) -> bool {
        if id.0 >= self.nodes.len() {
            return false;
        }
        self.samplers.insert(id, sampler);
        true
    }

    /// Aggregate time range over samplings 1..N-1.
    ///
    /// Index 0 is the archive's reserved default sampling and is not
    /// representative of animation, so it is excluded; with fewer than
    /// two samplings the range is (0, 0).
    pub fn time_range(&self) -> (Chrono, Chrono) {
        let mut begin = 0.0;
        let mut end = 0.0;
        for (i, ts) in self.time_samplings.iter().enumerate().skip(1) {
            let (b, e) = ts.time_range();
            if i == 1 {
                begin = b;
                end = e;
            } else {
                begin = b.min(begin);
                end = e.max(end);
            }
        }
        (begin, end)
    }

    /// Archive index of a sampling descriptor, matched by identity.
    /// Returns 0 (the default sampling) when the descriptor is not one
    /// of this archive's.
    pub fn time_sampling_index(&self, descriptor: &Arc<TimeSamplingInfo>) -> usize {
        for (i, ts) in self.time_samplings.iter().enumerate() {
            if Arc::ptr_eq(ts, descriptor) {
                return i;
            }
        }
        0
    }

    /// External id this session is registered under.
    #[inline]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Canonical path of the loaded archive; empty when unloaded.
    #[inline]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// True when an archive is open.
    #[inline]
    pub fn is_loaded(&self) -> bool {
        self.archive.is_some()
    }

    /// The open archive, if any.
    #[inline]
    pub fn archive(&self) -> Option<&Archive> {
        self.archive.as_ref()
    }

    #[inline]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: SessionConfig) {
        self.config = config;
    }

    /// Number of time samplings reported by the loaded archive.
    #[inline]
    pub fn time_sampling_count(&self) -> usize {
        self.time_samplings.len()
    }

    /// Time sampling descriptor by archive index.
    pub fn time_sampling(&self, index: usize) -> Option<&Arc<TimeSamplingInfo>> {
        self.time_samplings.get(index)
    }

    /// The top node of the materialized tree, if loaded.
    pub fn top_node(&self) -> Option<NodeId> {
        if self.nodes.is_empty() {
            None
        } else {
            Some(NodeId(0))
        }
    }

    /// Node lookup by arena id.
    pub fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id.0)
    }

    /// All nodes in materialization (pre-)order.
    pub fn nodes(&self) -> impl Iterator<Item = &SceneNode> {
        self.nodes.iter()
    }

    /// Total node count, top node included.
    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // Joins in-flight tasks before any owned resource goes away.
        self.reset();
    }
}
