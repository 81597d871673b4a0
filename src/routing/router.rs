use std::collections::HashMap;
use std::rc::Rc;

use crate::http::connection::RequestProcessor;
use crate::http::method::Method;
use crate::http::request::Request;
use crate::http::response::Response;
use crate::routing::middleware::{ErrorHandler, Middleware};
use crate::routing::pattern::PathPattern;
use crate::routing::pipeline::{Next, Pipeline};

/// One routing table entry.
#[derive(Clone)]
pub(crate) struct Layer {
    pub(crate) pattern: PathPattern,
    pub(crate) middleware: Rc<dyn Middleware>,
}

/// Ordered middleware tables, one per method.
///
/// Entries are tried in registration order. Verb methods (`get`, `post`,
/// ...) match the whole path; `mount` and `middleware` match a prefix and
/// pass the remainder on, which is how sub-routers see paths relative to
/// their mount point. A `Router` is itself middleware, so it can be
/// mounted inside another one.
///
/// ```
/// # use expressway::{Next, Request, Response, Router};
/// let users = Router::new().get("/:id", |req: Request, res: Response, _next: Next| {
///     res.send(format!("user {}", req.param("id").unwrap_or_default()));
///     Ok(())
/// });
/// let app = Router::new().mount("/users", users);
/// ```
///
/// Registering an invalid path panics.
#[derive(Clone, Default)]
pub struct Router {
    table: HashMap<Method, Rc<Vec<Layer>>>,
    error_handling: bool,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `middleware` for `method` on exactly `path`.
    pub fn on(self, method: Method, path: &str, middleware: impl Middleware) -> Self {
        self.add(&[method], path, false, Rc::new(middleware))
    }

    /// Registers `middleware` for every method on exactly `path`.
    pub fn all_methods(self, path: &str, middleware: impl Middleware) -> Self {
        self.add(&Method::ALL, path, false, Rc::new(middleware))
    }

    /// Registers `middleware` for every method on `path` and everything
    /// below it.
    pub fn mount(self, path: &str, middleware: impl Middleware) -> Self {
        self.add(&Method::ALL, path, true, Rc::new(middleware))
    }

    /// Registers `middleware` for every request.
    pub fn middleware(self, middleware: impl Middleware) -> Self {
        self.mount("/", middleware)
    }

    /// Registers an error handler for every request.
    pub fn error_handler<F>(self, f: F) -> Self
    where
        F: Fn(String, Request, Response, Next) -> anyhow::Result<()> + 'static,
    {
        self.middleware(ErrorHandler(f))
    }

    pub fn get<F>(self, path: &str, f: F) -> Self
    where
        F: Fn(Request, Response, Next) -> anyhow::Result<()> + 'static,
    {
        self.on(Method::GET, path, f)
    }

    pub fn post<F>(self, path: &str, f: F) -> Self
    where
        F: Fn(Request, Response, Next) -> anyhow::Result<()> + 'static,
    {
        self.on(Method::POST, path, f)
    }

    pub fn put<F>(self, path: &str, f: F) -> Self
    where
        F: Fn(Request, Response, Next) -> anyhow::Result<()> + 'static,
    {
        self.on(Method::PUT, path, f)
    }

    pub fn delete<F>(self, path: &str, f: F) -> Self
    where
        F: Fn(Request, Response, Next) -> anyhow::Result<()> + 'static,
    {
        self.on(Method::DELETE, path, f)
    }

    pub fn patch<F>(self, path: &str, f: F) -> Self
    where
        F: Fn(Request, Response, Next) -> anyhow::Result<()> + 'static,
    {
        self.on(Method::PATCH, path, f)
    }

    pub fn head<F>(self, path: &str, f: F) -> Self
    where
        F: Fn(Request, Response, Next) -> anyhow::Result<()> + 'static,
    {
        self.on(Method::HEAD, path, f)
    }

    pub fn options<F>(self, path: &str, f: F) -> Self
    where
        F: Fn(Request, Response, Next) -> anyhow::Result<()> + 'static,
    {
        self.on(Method::OPTIONS, path, f)
    }

    pub fn all<F>(self, path: &str, f: F) -> Self
    where
        F: Fn(Request, Response, Next) -> anyhow::Result<()> + 'static,
    {
        self.all_methods(path, f)
    }

    /// Registers a precompiled pattern for the given methods.
    pub fn route(mut self, methods: &[Method], pattern: PathPattern, middleware: impl Middleware) -> Self {
        self.insert(methods, pattern, Rc::new(middleware));
        self
    }

    /// Whether any registered middleware handles errors.
    pub fn has_error_handling(&self) -> bool {
        self.error_handling
    }

    fn add(mut self, methods: &[Method], path: &str, partial: bool, mw: Rc<dyn Middleware>) -> Self {
        let pattern = PathPattern::parse(path, partial)
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self.insert(methods, pattern, mw);
        self
    }

    fn insert(&mut self, methods: &[Method], pattern: PathPattern, middleware: Rc<dyn Middleware>) {
        if middleware.is_error_handling() {
            self.error_handling = true;
        }

        for method in methods {
            Rc::make_mut(self.table.entry(*method).or_default()).push(Layer {
                pattern: pattern.clone(),
                middleware: Rc::clone(&middleware),
            });
        }
    }

    pub(crate) fn layers(&self, method: Method) -> Rc<Vec<Layer>> {
        self.table.get(&method).cloned().unwrap_or_default()
    }
}

impl Middleware for Router {
    fn emit(&self, req: Request, res: Response, next: Next) -> anyhow::Result<()> {
        let error = Some(req.error()).filter(|e| !e.is_empty());
        let layers = self.layers(req.method());
        let path = req.relative_path();
        Pipeline::start(req, res, layers, path, Some(next), error);
        Ok(())
    }

    fn is_error_handling(&self) -> bool {
        self.error_handling
    }
}

impl RequestProcessor for Router {
    fn process(&self, req: Request, res: Response) {
        let layers = self.layers(req.method());
        let path = req.path();
        Pipeline::start(req, res, layers, path, None, None);
    }
}
