//! Express-style routing.
//!
//! - **`pattern`**: compiles route paths into exact or prefix matchers
//! - **`middleware`**: the `Middleware` trait and its closure flavours
//! - **`router`**: per-method ordered middleware tables
//! - **`pipeline`**: walks a table for one request (`Next`)

pub mod middleware;
pub mod pattern;
pub mod pipeline;
pub mod router;

pub use middleware::{ErrorHandler, Middleware};
pub use pattern::{PathMatch, PathPattern, PatternError};
pub use pipeline::Next;
pub use router::Router;
