//! # abc-import
//!
//! Read-only session runtime for Alembic-style (.abc) scene archives.
//!
//! A host that creates and destroys scene objects unpredictably across
//! frames drives this crate through a [`session::SessionRegistry`]:
//! each external id maps to one [`session::Session`], which owns an
//! open archive, its materialized node tree, and its time-sampling
//! metadata, and refreshes per-frame samples with a
//! synchronous-plus-asynchronous update cycle.
//!
//! ## Modules
//!
//! - [`util`] - Basic types (time, errors)
//! - [`ogawa`] - Low-level Ogawa binary container
//! - [`core`] - Time sampling and sample selection
//! - [`archive`] - Archive structure over the container
//! - [`session`] - Sessions, registry, async batching
//!
//! ## Example
//!
//! ```ignore
//! use abc_import::session::SessionRegistry;
//!
//! let mut registry = SessionRegistry::new();
//! let session = registry.get_or_create(1);
//! if session.load("scene.abc") {
//!     println!("{} nodes", session.node_count());
//!     session.update_samples(0.5);
//! }
//! ```

pub mod archive;
pub mod core;
pub mod ogawa;
pub mod session;
pub mod util;

// Re-export commonly used types
pub use session::{Session, SessionRegistry};
pub use util::{Chrono, Error, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::archive::{Archive, ObjectHandle};
    pub use crate::core::{SampleSelector, TimeSampling, TimeSamplingInfo};
    pub use crate::session::{
        AsyncDispatcher, AsyncTask, NodeId, NodeSampler, SceneNode, Session, SessionConfig,
        SessionId, SessionRegistry, TaskLatch, UpdateContext,
    };
    pub use crate::util::{Chrono, Error, Result};
}
