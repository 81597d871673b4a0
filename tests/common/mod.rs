#![allow(dead_code)]

use std::rc::Rc;
use std::time::{Duration, Instant};

use expressway::http::connection::SocketCommand;
use expressway::{Connection, HttpConfig, Router};

/// Drives a `Connection` without a socket, with a hand-moved clock.
pub struct Harness {
    pub conn: Connection,
    pub now: Instant,
}

impl Harness {
    pub fn new(app: Router) -> Self {
        Self::with_config(HttpConfig::default(), app)
    }

    pub fn with_config(config: HttpConfig, app: Router) -> Self {
        let now = Instant::now();
        Self {
            conn: Connection::new(Rc::new(config), Rc::new(app), now),
            now,
        }
    }

    pub fn send(&mut self, bytes: &[u8]) {
        self.conn.handle_read(self.now, bytes);
    }

    /// Moves the clock forward and fires due timers.
    pub fn sleep(&mut self, ms: u64) {
        self.now += Duration::from_millis(ms);
        self.conn.handle_timeout(self.now);
    }

    pub fn wakeup(&mut self) {
        self.conn.handle_wakeup(self.now);
    }

    pub fn output(&mut self) -> String {
        let mut out = Vec::new();
        while let Some(bytes) = self.conn.poll_transmit() {
            out.extend_from_slice(&bytes);
        }
        String::from_utf8(out).expect("responses are utf-8 in tests")
    }

    pub fn commands(&mut self) -> Vec<SocketCommand> {
        let mut commands = Vec::new();
        while let Some(c) = self.conn.poll_socket_command() {
            commands.push(c);
        }
        commands
    }
}

/// Status codes of every response in `out`, in order.
pub fn statuses(out: &str) -> Vec<u16> {
    out.split("\r\n")
        .filter(|line| line.starts_with("HTTP/1."))
        .filter_map(|line| line.get(9..12)?.parse().ok())
        .collect()
}

/// Bodies of `Content-Length` framed responses in `out`, in order.
pub fn bodies(out: &str) -> Vec<String> {
    let mut found = Vec::new();
    let mut rest = out;

    while let Some(head_end) = rest.find("\r\n\r\n") {
        let head = &rest[..head_end];
        let length = head
            .split("\r\n")
            .find_map(|l| l.strip_prefix("Content-Length: "))
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(0);
        let start = head_end + 4;
        let end = (start + length).min(rest.len());
        found.push(rest[start..end].to_string());
        rest = &rest[end..];
    }

    found
}

pub fn get(path: &str) -> Vec<u8> {
    format!("GET {} HTTP/1.1\r\nHost: test\r\n\r\n", path).into_bytes()
}
