//! ganttsync-core library.
//!
//! Keeps an in-memory Gantt task tree editable while persisting every edit
//! to a remote backend. A [`session::Session`] owns the tree and turns each
//! tree notification into at most one persistence request.
//!
//! # Conventions
//!
//! - **Errors**: module errors use `thiserror` and map to an
//!   [`error::ErrorCode`]; `anyhow::Result` at the config layer.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `debug!`, `trace!`).

pub mod cascade;
pub mod codec;
pub mod config;
pub mod error;
pub mod form;
pub mod intent;
pub mod model;
pub mod persist;
pub mod reconcile;
pub mod router;
pub mod session;
pub mod tree;

pub use codec::TimestampCodec;
pub use model::TaskId;
pub use session::Session;
pub use tree::TaskTree;
