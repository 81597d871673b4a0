use std::rc::Rc;
use std::time::Duration;

use expressway::server::listener::serve;
use expressway::{HttpConfig, Next, Request, Response, Router};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::LocalSet;

fn app() -> Router {
    Router::new()
        .get("/hello/:name", |req: Request, res: Response, _next: Next| {
            res.send(format!("hello {}", req.param("name").unwrap_or_default()));
            Ok(())
        })
        .post("/echo", |req: Request, res: Response, _next: Next| {
            let body = Rc::new(std::cell::RefCell::new(Vec::new()));
            let sink = Rc::clone(&body);
            req.on_data(move |chunk| sink.borrow_mut().extend_from_slice(&chunk));

            let reply = res.clone();
            req.on_end(move || reply.send(body.borrow().as_slice()));
            Ok(())
        })
}

async fn start(config: HttpConfig) -> std::net::SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::task::spawn_local(serve(listener, config, Rc::new(app())));
    addr
}

async fn read_until(stream: &mut TcpStream, needle: &str) -> String {
    let mut out = Vec::new();
    let mut buf = [0u8; 4096];

    while !String::from_utf8_lossy(&out).contains(needle) {
        let n = stream.read(&mut buf).await.unwrap();
        assert!(n > 0, "connection closed early: {}", String::from_utf8_lossy(&out));
        out.extend_from_slice(&buf[..n]);
    }

    String::from_utf8(out).unwrap()
}

#[tokio::test]
async fn test_pipelined_round_trip() {
    LocalSet::new()
        .run_until(async {
            let addr = start(HttpConfig::default()).await;
            let mut stream = TcpStream::connect(addr).await.unwrap();

            stream
                .write_all(
                    b"GET /hello/ada HTTP/1.1\r\nHost: test\r\n\r\n\
                      POST /echo HTTP/1.1\r\nHost: test\r\nContent-Length: 5\r\n\r\nab",
                )
                .await
                .unwrap();
            stream.write_all(b"cde").await.unwrap();

            let out = tokio::time::timeout(Duration::from_secs(5), read_until(&mut stream, "abcde"))
                .await
                .unwrap();

            let first = out.find("hello ada").unwrap();
            let second = out.find("abcde").unwrap();
            assert!(first < second);
            assert_eq!(out.matches("HTTP/1.1 200 OK\r\n").count(), 2);
        })
        .await;
}

#[tokio::test]
async fn test_non_persistent_connection_is_closed() {
    LocalSet::new()
        .run_until(async {
            let config = HttpConfig {
                persistent_connections: false,
                ..HttpConfig::default()
            };
            let addr = start(config).await;
            let mut stream = TcpStream::connect(addr).await.unwrap();

            stream
                .write_all(b"GET /hello/bob HTTP/1.1\r\nHost: test\r\n\r\n")
                .await
                .unwrap();

            let mut out = String::new();
            tokio::time::timeout(Duration::from_secs(5), stream.read_to_string(&mut out))
                .await
                .unwrap()
                .unwrap();

            assert!(out.starts_with("HTTP/1.1 200 OK\r\n"));
            assert!(out.contains("Connection: close\r\n"));
            assert!(out.ends_with("hello bob"));
        })
        .await;
}

#[tokio::test]
async fn test_not_found_over_tcp() {
    LocalSet::new()
        .run_until(async {
            let addr = start(HttpConfig::default()).await;
            let mut stream = TcpStream::connect(addr).await.unwrap();

            stream
                .write_all(b"GET /missing HTTP/1.1\r\nHost: test\r\n\r\n")
                .await
                .unwrap();

            let out = tokio::time::timeout(Duration::from_secs(5), read_until(&mut stream, "\r\n\r\n"))
                .await
                .unwrap();
            assert!(out.starts_with("HTTP/1.1 404 Not Found\r\n"));
        })
        .await;
}

#[tokio::test]
async fn test_idle_connection_closed_after_keep_alive() {
    LocalSet::new()
        .run_until(async {
            let config = HttpConfig {
                keep_alive_timeout_ms: 100,
                ..HttpConfig::default()
            };
            let addr = start(config).await;
            let mut stream = TcpStream::connect(addr).await.unwrap();

            let mut out = Vec::new();
            let n = tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut out))
                .await
                .unwrap()
                .unwrap();
            assert_eq!(n, 0);
        })
        .await;
}
