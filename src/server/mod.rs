//! TCP serving on a single-threaded tokio runtime.
//!
//! Connections share `Rc` state, so everything here must run inside a
//! [`tokio::task::LocalSet`].

pub mod driver;
pub mod listener;
