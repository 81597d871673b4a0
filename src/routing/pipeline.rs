use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::{debug, warn};

use crate::http::request::Request;
use crate::http::response::{Completion, Response};
use crate::http::status::StatusCode;
use crate::routing::middleware::Middleware;
use crate::routing::pattern::PathMatch;
use crate::routing::router::Layer;

enum Verb {
    Next,
    NextRoute,
    Error(String),
}

/// Walks one routing table for one request.
///
/// A pipeline lives until its response ends. Mounted routers run their
/// own pipeline with the enclosing one as parent; when the nested table
/// runs out, control returns to the parent and the nested pipeline is
/// released.
pub(crate) struct Pipeline {
    req: Request,
    res: Response,
    layers: Rc<Vec<Layer>>,
    cursor: Cell<usize>,
    /// Path the table is matched against, fixed when the pipeline starts.
    match_path: String,
    parent: Option<Next>,
    /// Whether the entry being run was reached through `Next::error`.
    erroring: Cell<bool>,
    /// Completion of the enclosing pipeline, run after this one finishes.
    outer_completion: RefCell<Option<Completion>>,
    released: Cell<bool>,
}

impl Pipeline {
    pub(crate) fn start(
        req: Request,
        res: Response,
        layers: Rc<Vec<Layer>>,
        match_path: String,
        parent: Option<Next>,
        error: Option<String>,
    ) {
        let outer = res.take_completion();
        let pipeline = Rc::new(Pipeline {
            req,
            res: res.clone(),
            layers,
            cursor: Cell::new(0),
            match_path,
            parent,
            erroring: Cell::new(false),
            outer_completion: RefCell::new(outer),
            released: Cell::new(false),
        });

        let finished = Rc::clone(&pipeline);
        res.set_completion(Some(Box::new(move || finished.finish())));

        let next = Next { pipeline };
        match error {
            Some(message) => next.error(message),
            None => next.next(),
        }
    }

    fn finish(&self) {
        let outer = self.outer_completion.borrow_mut().take();
        if let Some(done) = outer {
            done();
        }
        self.released.set(true);
    }

    /// Finds the next entry to run and applies its match to the request.
    fn find(&self, skip_same_path: bool, error_only: bool) -> Option<Rc<dyn Middleware>> {
        let mut skipping = skip_same_path;
        let mut idx = self.cursor.get();

        while idx < self.layers.len() {
            let layer = &self.layers[idx];
            idx += 1;

            if skipping && idx >= 2 && layer.pattern == self.layers[idx - 2].pattern {
                continue;
            }
            skipping = false;

            if error_only && !layer.middleware.is_error_handling() {
                continue;
            }

            if let Some(found) = layer.pattern.matches(&self.match_path) {
                self.cursor.set(idx);
                self.apply(found);
                return Some(Rc::clone(&layer.middleware));
            }
        }

        self.cursor.set(idx);
        None
    }

    fn apply(&self, found: PathMatch) {
        self.req.set_params(found.params);
        self.req.set_base_path(found.base);
        match found.rest {
            Some(rest) if rest.is_empty() => self.req.set_relative_path("/"),
            Some(rest) => self.req.set_relative_path(rest),
            None => self.req.set_relative_path(self.match_path.clone()),
        }
    }
}

/// Continuation handed to every middleware.
///
/// `next` moves on to the following matching entry, `next_route` also
/// skips the entries registered on the same path as the current one, and
/// `error` jumps to the next error-handling entry. Once the request's
/// response has ended, all three do nothing.
#[derive(Clone)]
pub struct Next {
    pipeline: Rc<Pipeline>,
}

impl Next {
    pub fn next(&self) {
        self.run(Verb::Next);
    }

    pub fn next_route(&self) {
        self.run(Verb::NextRoute);
    }

    /// Records `message` on the request and continues with error handling.
    pub fn error(&self, message: impl Into<String>) {
        self.run(Verb::Error(message.into()));
    }

    /// True while the current entry runs on the error path.
    pub(crate) fn is_erroring(&self) -> bool {
        self.pipeline.erroring.get()
    }

    fn run(&self, verb: Verb) {
        let p = &self.pipeline;
        if p.released.get() {
            return;
        }
        if !p.req.is_alive() || !p.res.is_alive() {
            p.res.end();
            return;
        }

        let found = match &verb {
            Verb::Next => p.find(false, false),
            Verb::NextRoute => p.find(true, false),
            Verb::Error(message) => {
                p.req.clear_body_callbacks();
                p.req.set_error(message.clone());
                p.find(false, true)
            }
        };

        let Some(middleware) = found else {
            self.exhausted(verb);
            return;
        };

        p.erroring.set(matches!(verb, Verb::Error(_)));
        if !p.erroring.get() {
            if p.res.mark_handled() {
                p.res.status(StatusCode::Ok.as_u16());
            }
            p.req.set_error(String::new());
        }

        debug!(path = %p.match_path, base = %p.req.base_path(), "entering middleware");

        if let Err(e) = middleware.emit(p.req.clone(), p.res.clone(), self.clone()) {
            warn!(error = %e, "middleware failed");
            self.error(e.to_string());
        }
    }

    fn exhausted(&self, verb: Verb) {
        let p = &self.pipeline;

        match &p.parent {
            Some(parent) => {
                let outer = p.outer_completion.borrow_mut().take();
                p.res.set_completion(outer);
                p.released.set(true);

                match verb {
                    Verb::Next => parent.next(),
                    Verb::NextRoute => parent.next_route(),
                    Verb::Error(message) => parent.error(message),
                }
            }
            None => {
                if !p.res.headers_sent() {
                    let status = match verb {
                        Verb::Error(_) => StatusCode::InternalServerError,
                        _ => StatusCode::NotFound,
                    };
                    p.res.status(status.as_u16());
                }
                p.res.end();
            }
        }
    }
}
