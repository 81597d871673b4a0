use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Instant;

use bytes::{Bytes, BytesMut};
use tracing::{debug, warn};

use crate::config::HttpConfig;
use crate::http::parser::{ParseError, body_length, parse_request_head};
use crate::http::request::Request;
use crate::http::response::Response;
use crate::http::status::StatusCode;
use crate::http::timer::Timer;
use crate::http::writer::Wire;

/// Receives every request that made it through parsing.
pub trait RequestProcessor {
    fn process(&self, req: Request, res: Response);
}

/// Socket operation the driver must perform for the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketCommand {
    /// Flush and half-close, then report back with `handle_shutdown`.
    Shutdown,
    /// Close the socket, then report back with `handle_socket_closed`.
    Close,
}

/// Protocol state of one client connection.
///
/// The connection never touches a socket or a clock itself. The driver
/// feeds it reads, socket events and the current time, and drains the
/// bytes to send, the socket commands to run and the next timer deadline.
/// Requests parsed ahead of the one being processed wait in a queue, so
/// responses always go out in request order.
pub struct Connection {
    config: Rc<HttpConfig>,
    processor: Rc<dyn RequestProcessor>,
    wire: Rc<Wire>,

    /// Unparsed tail of an incomplete request head.
    pending: BytesMut,
    request: Option<Request>,
    response: Option<Response>,
    queue: VecDeque<Request>,
    requests_accepted: u32,
    /// Body bytes still to skip for a request that already finished.
    last_content_left: u64,

    need_more_headers: bool,
    need_more_body: bool,
    has_active_request: bool,
    active: bool,
    reading: bool,
    shutting_down: bool,
    closing: bool,
    socket_present: bool,
    commands: VecDeque<SocketCommand>,

    request_timer: Timer,
    response_timer: Timer,
    keep_alive_timer: Timer,
}

impl Connection {
    pub fn new(config: Rc<HttpConfig>, processor: Rc<dyn RequestProcessor>, now: Instant) -> Self {
        let mut conn = Self {
            request_timer: Timer::new(config.request_timeout()),
            response_timer: Timer::new(config.response_timeout()),
            keep_alive_timer: Timer::new(config.keep_alive_timeout()),
            config,
            processor,
            wire: Rc::new(Wire::new()),
            pending: BytesMut::new(),
            request: None,
            response: None,
            queue: VecDeque::new(),
            requests_accepted: 0,
            last_content_left: 0,
            need_more_headers: false,
            need_more_body: false,
            has_active_request: false,
            active: true,
            reading: true,
            shutting_down: false,
            closing: false,
            socket_present: true,
            commands: VecDeque::new(),
        };
        conn.start_keep_alive_timer(now);
        conn
    }

    /// Handles bytes read from the client.
    pub fn handle_read(&mut self, now: Instant, data: &[u8]) {
        if !self.reading || self.closing || self.shutting_down {
            return;
        }

        self.pending.extend_from_slice(data);
        let buf = self.pending.split().freeze();
        let mut pos = 0;

        self.need_more_headers = false;
        self.keep_alive_timer.stop();
        self.request_timer.stop();

        if self.need_more_body {
            self.need_more_body = false;
            self.feed_body(&buf, &mut pos);
        }

        while pos < buf.len() && !self.limit_reached() {
            if !self.parse_request(&buf, &mut pos) {
                self.reading = false;
                break;
            }
        }

        if self.limit_reached() && !self.need_more_body {
            self.reading = false;
        }

        self.advance(now);

        if self.need_more_body || self.need_more_headers {
            self.request_timer.start(now);
        }
    }

    /// Handles the client half-closing its side.
    pub fn handle_eof(&mut self, now: Instant) {
        debug!("client finished sending");
        self.reading = false;
        self.need_more_headers = false;
        self.pending.clear();

        if let Some(req) = self.body_target() {
            req.handle_data_end();
        }

        if !self.has_active_request && self.queue.is_empty() {
            self.close();
        } else {
            self.advance(now);
        }
    }

    /// Handles a failed read or write.
    pub fn handle_error(&mut self) {
        if self.has_active_request {
            if let Some(req) = &self.request {
                req.handle_data_end();
            }
            if let Some(res) = &self.response {
                res.invalidate();
            }
        }

        self.active = false;
        self.shutting_down = false;
        self.close();
    }

    /// The half-close requested by [`SocketCommand::Shutdown`] finished.
    pub fn handle_shutdown(&mut self) {
        self.shutting_down = false;
        self.close();
    }

    /// The socket is gone.
    pub fn handle_socket_closed(&mut self) {
        self.closing = false;
        self.socket_present = false;
        self.close_timers();
    }

    /// Fires every timer whose deadline has passed.
    pub fn handle_timeout(&mut self, now: Instant) {
        if self.request_timer.expire(now) {
            self.on_request_timeout(now);
        }
        if self.response_timer.expire(now) {
            self.on_response_timeout(now);
        }
        if self.keep_alive_timer.expire(now) {
            self.on_keep_alive_timeout();
        }
    }

    /// Picks up a response that ended outside the connection's own calls.
    pub fn handle_wakeup(&mut self, now: Instant) {
        if self.has_active_request {
            self.advance(now);
        }
    }

    /// Closes the connection. Safe to call any number of times.
    pub fn close(&mut self) {
        self.close_timers();
        self.reading = false;

        if self.closing || self.shutting_down {
            return;
        }

        if let Some(req) = &self.request {
            req.invalidate();
        }
        if let Some(res) = &self.response {
            res.invalidate();
        }
        for req in self.queue.drain(..) {
            req.invalidate();
        }

        if self.socket_present {
            if self.active {
                self.active = false;
                self.shutting_down = true;
                self.commands.push_back(SocketCommand::Shutdown);
                return;
            }

            self.closing = true;
            self.commands.push_back(SocketCommand::Close);
        }
    }

    pub fn poll_transmit(&mut self) -> Option<Bytes> {
        self.wire.take_output()
    }

    pub fn poll_socket_command(&mut self) -> Option<SocketCommand> {
        self.commands.pop_front()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        [
            self.request_timer.deadline(),
            self.response_timer.deadline(),
            self.keep_alive_timer.deadline(),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    /// Completes timer closes requested earlier.
    pub fn reap_timers(&mut self) {
        self.request_timer.reap();
        self.response_timer.reap();
        self.keep_alive_timer.reap();
    }

    pub fn is_reading(&self) -> bool {
        self.reading
    }

    /// True once the socket and every timer are closed.
    pub fn is_released(&self) -> bool {
        !self.socket_present
            && self.request_timer.is_closed()
            && self.response_timer.is_closed()
            && self.keep_alive_timer.is_closed()
    }

    /// The outgoing side, for drivers waiting on asynchronous responses.
    pub fn wire(&self) -> Rc<Wire> {
        Rc::clone(&self.wire)
    }

    fn limit_reached(&self) -> bool {
        self.requests_accepted >= self.config.request_limit()
    }

    fn enqueue(&mut self, req: Request) {
        self.requests_accepted += 1;
        self.queue.push_back(req);
    }

    fn fail(&mut self, status: StatusCode) {
        let req = Request::failed(status.as_u16(), 1, &self.config.protocol);
        self.enqueue(req);
    }

    /// The request body bytes currently belong to.
    fn body_target(&self) -> Option<Request> {
        self.queue.back().or(self.request.as_ref()).cloned()
    }

    /// Parses one request starting at `pos`. Returns `false` when the
    /// rest of this read must not be parsed.
    fn parse_request(&mut self, buf: &Bytes, pos: &mut usize) -> bool {
        let rest = &buf[*pos..];

        let (head, consumed) = match parse_request_head(rest, self.config.max_header_size) {
            Ok(parsed) => parsed,
            Err(ParseError::Incomplete) => {
                self.need_more_headers = true;
                self.pending.extend_from_slice(rest);
                *pos = buf.len();
                return true;
            }
            Err(e) => {
                warn!(error = %e, "rejecting request");
                self.fail(e.status().unwrap_or(StatusCode::BadRequest));
                return false;
            }
        };
        *pos += consumed;

        let path_too_long = head.target.len() > self.config.max_path_length;
        let length = body_length(&head.headers, self.config.max_request_body_length);
        let req = Request::new(head, &self.config.protocol);

        debug!(method = %req.method(), path = %req.path(), "request parsed");

        if path_too_long {
            req.set_request_error(StatusCode::UriTooLong.as_u16());
        }

        let length = match length {
            Ok(length) => length,
            Err(e) => {
                warn!(error = %e, path = %req.path(), "rejecting request body");
                req.set_request_error(e.status().unwrap_or(StatusCode::BadRequest).as_u16());
                self.enqueue(req);
                return false;
            }
        };

        req.set_content_length(length);
        self.enqueue(req);

        if length > 0 {
            self.feed_body(buf, pos);
        }
        true
    }

    /// Hands body bytes at `pos` to the request they belong to.
    fn feed_body(&mut self, buf: &Bytes, pos: &mut usize) {
        let available = (buf.len() - *pos) as u64;

        let Some(req) = self.body_target() else {
            let skipped = self.last_content_left.min(available);
            *pos += skipped as usize;
            self.last_content_left -= skipped;
            self.need_more_body = self.last_content_left > 0;
            return;
        };

        let left = req.body_remaining();
        let taken = left.min(available);
        let chunk = buf.slice(*pos..*pos + taken as usize);
        *pos += taken as usize;
        self.last_content_left = left - taken;

        req.handle_data(chunk);

        if taken == left {
            req.handle_data_end();
        } else {
            self.need_more_body = true;
        }
    }

    /// Retires ended exchanges and dispatches queued requests until one
    /// is still in progress or the queue is empty.
    fn advance(&mut self, now: Instant) {
        loop {
            if self.has_active_request {
                if !self.wire.take_ended() {
                    return;
                }
                let close_delimited = self.response.as_ref().is_some_and(Response::closes_connection);
                self.finish_exchange();

                if !self.config.persistent_connections || close_delimited {
                    self.close();
                    return;
                }
            }

            if !self.dispatch_next(now) {
                return;
            }
        }
    }

    fn finish_exchange(&mut self) {
        self.response_timer.stop();
        self.has_active_request = false;

        if let Some(req) = self.request.take() {
            req.invalidate();
        }
        if let Some(res) = self.response.take() {
            res.invalidate();
        }
    }

    /// Starts the next queued request. Returns `false` if there was none.
    fn dispatch_next(&mut self, now: Instant) -> bool {
        if self.has_active_request || self.closing || self.shutting_down || !self.socket_present {
            return false;
        }

        let Some(req) = self.queue.pop_front() else {
            if !self.reading {
                self.close();
            } else if !self.need_more_headers && !self.need_more_body {
                self.start_keep_alive_timer(now);
            }
            return false;
        };

        let status = req
            .request_error()
            .unwrap_or(StatusCode::InternalServerError.as_u16());
        let res = Response::new(
            Rc::clone(&self.config),
            Rc::clone(&self.wire),
            req.http_minor_version(),
            status,
        );

        self.has_active_request = true;
        self.request = Some(req.clone());
        self.response = Some(res.clone());

        if let Some(code) = req.request_error() {
            debug!(status = code, "answering failed request");
            res.end();
            return true;
        }

        self.response_timer.start(now);
        debug!(method = %req.method(), path = %req.path(), "dispatching request");
        self.processor.process(req, res);
        true
    }

    fn start_keep_alive_timer(&mut self, now: Instant) {
        if self.config.persistent_connections {
            self.keep_alive_timer.start(now);
        }
    }

    fn close_timers(&mut self) {
        self.request_timer.close();
        self.response_timer.close();
        self.keep_alive_timer.close();
    }

    fn on_request_timeout(&mut self, now: Instant) {
        self.reading = false;

        if self.need_more_headers {
            warn!("timed out waiting for request headers");
            self.need_more_headers = false;
            self.pending.clear();
            self.fail(StatusCode::RequestTimeout);
            self.advance(now);
            return;
        }

        if !self.need_more_body {
            return;
        }

        warn!("timed out waiting for request body");
        self.need_more_body = false;

        if let Some(req) = self.queue.back() {
            req.set_request_error(StatusCode::RequestTimeout.as_u16());
            return;
        }

        if let (Some(req), Some(res)) = (&self.request, &self.response) {
            res.status(StatusCode::RequestTimeout.as_u16());
            req.handle_data_end();
            res.end();
        }
        self.advance(now);
    }

    fn on_response_timeout(&mut self, now: Instant) {
        if let Some(res) = &self.response {
            warn!("timed out waiting for a response");
            res.status(StatusCode::InternalServerError.as_u16());
            res.end();
        }
        self.advance(now);
    }

    fn on_keep_alive_timeout(&mut self) {
        self.reading = false;

        if self.has_active_request || !self.queue.is_empty() {
            return;
        }

        debug!("keep-alive timeout");
        self.close();
    }
}
