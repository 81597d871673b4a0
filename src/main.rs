use std::cell::RefCell;
use std::rc::Rc;

use expressway::{Config, Next, Request, Response, Router, server};

fn api() -> Router {
    Router::new()
        .get("/echo/:word", |req: Request, res: Response, _next: Next| {
            res.send(req.param("word").unwrap_or_default());
            Ok(())
        })
        .post("/echo", |req: Request, res: Response, _next: Next| {
            let body = Rc::new(RefCell::new(Vec::new()));

            let sink = Rc::clone(&body);
            req.on_data(move |chunk| sink.borrow_mut().extend_from_slice(&chunk));

            let reply = res.clone();
            req.on_end(move || reply.status(200).send(body.borrow().as_slice()));
            Ok(())
        })
}

fn app() -> Router {
    Router::new()
        .middleware(|req: Request, res: Response, next: Next| -> anyhow::Result<()> {
            tracing::info!(method = %req.method(), path = %req.path(), "request");
            res.set_header("X-Powered-By", "expressway");
            next.next();
            Ok(())
        })
        .mount("/api", api())
        .mount("/check", |req: Request, res: Response, _next: Next| -> anyhow::Result<()> {
            res.send(format!("base={} rest={}", req.base_path(), req.relative_path()));
            Ok(())
        })
        .get("/", |_req: Request, res: Response, _next: Next| {
            res.status(200);
            res.write("Hello ");
            res.write("from expressway\n");
            res.end();
            Ok(())
        })
        .get("/fail", |_req: Request, _res: Response, _next: Next| {
            anyhow::bail!("this route always fails")
        })
        .error_handler(|msg: String, _req: Request, res: Response, _next: Next| {
            res.status(500).send(format!("error: {}\n", msg));
            Ok(())
        })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let cfg = Config::load()?;
    let local = tokio::task::LocalSet::new();

    local
        .run_until(async move {
            tokio::select! {
                res = server::listener::run(&cfg, app()) => {
                    res?;
                }

                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Shutdown signal received");
                }
            }

            Ok::<(), anyhow::Error>(())
        })
        .await
}
