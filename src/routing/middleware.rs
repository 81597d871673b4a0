use crate::http::request::Request;
use crate::http::response::Response;
use crate::routing::pipeline::Next;

/// A step in a routing table.
///
/// `emit` handles the request: it either finishes the response or hands
/// control on through `next`. Returning `Err` is the same as calling
/// `next.error(..)` with the error's message.
pub trait Middleware: 'static {
    fn emit(&self, req: Request, res: Response, next: Next) -> anyhow::Result<()>;

    /// Error-handling middleware is only reached through `Next::error`.
    fn is_error_handling(&self) -> bool {
        false
    }
}

impl<F> Middleware for F
where
    F: Fn(Request, Response, Next) -> anyhow::Result<()> + 'static,
{
    fn emit(&self, req: Request, res: Response, next: Next) -> anyhow::Result<()> {
        self(req, res, next)
    }
}

/// Wraps a function as error-handling middleware. The function receives
/// the recorded error message first. Reached through `next` or
/// `next_route`, it passes straight on.
///
/// ```
/// # use expressway::routing::{ErrorHandler, Middleware};
/// # use expressway::{Next, Request, Response};
/// let handler = ErrorHandler(
///     |msg: String, _req: Request, res: Response, _next: Next| -> anyhow::Result<()> {
///         res.status(500).send(format!("failed: {msg}"));
///         Ok(())
///     },
/// );
/// assert!(handler.is_error_handling());
/// ```
pub struct ErrorHandler<F>(pub F);

impl<F> Middleware for ErrorHandler<F>
where
    F: Fn(String, Request, Response, Next) -> anyhow::Result<()> + 'static,
{
    fn emit(&self, req: Request, res: Response, next: Next) -> anyhow::Result<()> {
        if !next.is_erroring() {
            next.next();
            return Ok(());
        }
        (self.0)(req.error(), req, res, next)
    }

    fn is_error_handling(&self) -> bool {
        true
    }
}
