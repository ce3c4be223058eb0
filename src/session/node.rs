//! In-memory scene tree.
//!
//! Nodes live in an arena owned by the session, pushed in depth-first
//! pre-order during materialization, so iterating the arena front to
//! back visits the tree in materialization order. Parent and child
//! links are arena indices; nothing here owns a reference cycle.

use std::sync::Arc;

use crate::archive::ObjectHandle;
use crate::core::SampleSelector;
use crate::session::task::AsyncTask;

/// Stable arena index of a scene node within one loaded session.
///
/// Indices are only meaningful for the session and load generation
/// that produced them; `reset()` invalidates all of them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Raw arena index.
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

/// One materialized scene object.
pub struct SceneNode {
    id: NodeId,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    full_path: String,
    object: ObjectHandle,
}

impl SceneNode {
    pub(crate) fn new(
        id: NodeId,
        parent: Option<NodeId>,
        full_path: String,
        object: ObjectHandle,
    ) -> Self {
        Self {
            id,
            parent,
            children: Vec::new(),
            full_path,
            object,
        }
    }

    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Back-reference to the owning parent; `None` for the top node.
    #[inline]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in archive-native order.
    #[inline]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub(crate) fn push_child(&mut self, child: NodeId) {
        self.children.push(child);
    }

    /// Object name (empty for the top node).
    #[inline]
    pub fn name(&self) -> &str {
        self.object.name()
    }

    /// Full hierarchy path, e.g. `/group/mesh`.
    #[inline]
    pub fn full_path(&self) -> &str {
        &self.full_path
    }

    /// Backing archive object.
    #[inline]
    pub fn object(&self) -> &ObjectHandle {
        &self.object
    }
}

/// Per-node synchronous sample update, installed by the host.
///
/// Invoked once per node per `update_samples` call, in materialization
/// order. The decode itself is the host's concern; a sampler that
/// needs deferred I/O queues it through the [`UpdateContext`].
pub trait NodeSampler: Send {
    fn update_sample(&mut self, node: &SceneNode, selector: SampleSelector, ctx: &mut UpdateContext);
}

/// Task collection point for the synchronous phase of one
/// `update_samples` call. Queuing is only possible through this
/// context, which keeps it confined to that phase.
pub struct UpdateContext {
    tasks: Vec<Arc<dyn AsyncTask>>,
}

impl UpdateContext {
    pub(crate) fn new() -> Self {
        Self { tasks: Vec::new() }
    }

    /// Append a deferred fetch to this frame's batch.
    pub fn queue_async(&mut self, task: Arc<dyn AsyncTask>) {
        self.tasks.push(task);
    }

    /// Number of tasks queued so far this frame.
    #[inline]
    pub fn queued(&self) -> usize {
        self.tasks.len()
    }

    pub(crate) fn into_batch(self) -> Vec<Arc<dyn AsyncTask>> {
        self.tasks
    }
}
