//! HTTP/1.x protocol implementation.
//!
//! # Architecture
//!
//! - **`connection`**: per-connection state machine (parsing, pipelining, timers, close)
//! - **`parser`**: parses request heads and validates `Content-Length`
//! - **`request`** / **`response`**: the two halves of one exchange, shared with middleware
//! - **`writer`**: response serialization and the outgoing byte queue
//! - **`timer`**: one-shot timers driven by the connection's owner
//! - **`method`**, **`status`**, **`headers`**, **`cookie`**: protocol vocabulary
//!
//! # Connection State Machine
//!
//! ```text
//!        ┌─────────────┐
//!        │    Idle     │ ← keep-alive timer running
//!        └──────┬──────┘
//!               │ bytes arrive
//!               ▼
//!        ┌──────────────────┐
//!        │ ParsingHeaders   │ ← request timer while the head is incomplete
//!        └──────┬───────────┘
//!               │ head complete, Content-Length > 0
//!               ▼
//!        ┌──────────────────┐
//!        │  AwaitingBody    │ ← request timer while body bytes are missing
//!        └──────┬───────────┘
//!               │ request reaches the front of the queue
//!               ▼
//!        ┌──────────────────┐
//!        │   Dispatched     │ ← response timer until the response ends
//!        └──────┬───────────┘
//!               │ response ended
//!               ├─ more queued → Dispatched
//!               ├─ persistent → Idle
//!               └─ otherwise → ShuttingDown → Closed
//! ```
//!
//! # Example
//!
//! ```ignore
//! let conn = Connection::new(config, Rc::new(router), Instant::now());
//! conn.handle_read(Instant::now(), b"GET / HTTP/1.1\r\nHost: x\r\n\r\n");
//! while let Some(bytes) = conn.poll_transmit() {
//!     socket.write_all(&bytes).await?;
//! }
//! ```

pub mod connection;
pub mod cookie;
pub mod headers;
pub mod method;
pub mod parser;
pub mod request;
pub mod response;
pub mod status;
pub mod timer;
pub mod writer;
