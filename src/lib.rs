//! Expressway - embeddable HTTP/1.x server with Express-style routing
//!
//! Core library for connection handling, routing and serving.

pub mod config;
pub mod http;
pub mod routing;
pub mod server;

pub use config::{Config, HttpConfig};
pub use http::connection::{Connection, RequestProcessor};
pub use http::method::Method;
pub use http::request::Request;
pub use http::response::Response;
pub use routing::{ErrorHandler, Middleware, Next, Router};
