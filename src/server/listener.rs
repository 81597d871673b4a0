use std::rc::Rc;
use std::time::Instant;

use tokio::net::TcpListener;
use tracing::info;

use crate::config::{Config, HttpConfig};
use crate::http::connection::{Connection, RequestProcessor};
use crate::server::driver;

/// Binds `cfg.listen_addr` and serves `app` until accepting fails.
pub async fn run(cfg: &Config, app: impl RequestProcessor + 'static) -> anyhow::Result<()> {
    let listener = TcpListener::bind(&cfg.listen_addr).await?;
    info!("Listening on {}", cfg.listen_addr);

    serve(listener, cfg.http.clone(), Rc::new(app)).await
}

/// Accepts connections on an already bound listener.
pub async fn serve(
    listener: TcpListener,
    http: HttpConfig,
    app: Rc<dyn RequestProcessor>,
) -> anyhow::Result<()> {
    let http = Rc::new(http);

    loop {
        let (socket, peer) = listener.accept().await?;
        info!("Accepted connection from {}", peer);

        let conn = Connection::new(Rc::clone(&http), Rc::clone(&app), Instant::now());
        tokio::task::spawn_local(async move {
            if let Err(e) = driver::drive(socket, conn).await {
                tracing::error!("Connection error from {}: {}", peer, e);
            }
        });
    }
}
