//! # deco-error
//!
//! Unified error handling for the LLM-DECO workspace.
//!
//! ## Design Philosophy
//!
//! - **ErrorKind**: Know what went wrong (e.g., NodeNotFound, ConstraintViolated)
//! - **ErrorStatus**: Decide how to handle it (Permanent, Temporary, Persistent)
//! - **Error Context**: Key-value pairs that locate the cause
//! - **Error Source**: Wrap underlying errors without leaking raw types
//!
//! ## Usage
//!
//! ```rust
//! use deco_error::{Error, ErrorKind};
//!
//! fn example() -> Result<(), Error> {
//!     Err(Error::new(ErrorKind::NodeNotFound, "node 'Node_7' not in network")
//!         .with_operation("executor::dispatch")
//!         .with_context("node_id", "Node_7"))
//! }
//! ```
//!
//! ## Principles
//!
//! - Library functions return `Result<T, deco_error::Error>`
//! - External errors are wrapped with `set_source(err)`
//! - Same error handled once, callers only append context

mod error;
mod kind;
mod status;

pub use error::Error;
pub use kind::ErrorKind;
pub use status::ErrorStatus;

/// Result type alias using the deco Error
pub type Result<T> = std::result::Result<T, Error>;
