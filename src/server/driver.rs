use std::time::Instant;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tracing::{debug, warn};

use crate::http::connection::{Connection, SocketCommand};

const READ_CHUNK: usize = 16 * 1024;

enum Event {
    Read(std::io::Result<usize>),
    Wakeup,
    Timeout,
}

async fn read_some(half: Option<&mut OwnedReadHalf>, buf: &mut [u8]) -> std::io::Result<usize> {
    match half {
        Some(half) => half.read(buf).await,
        None => std::future::pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at.into()).await,
        None => std::future::pending().await,
    }
}

/// Runs one connection over `stream` until the connection is released.
pub async fn drive(stream: TcpStream, mut conn: Connection) -> anyhow::Result<()> {
    let (read_half, write_half) = stream.into_split();
    let mut reader: Option<OwnedReadHalf> = Some(read_half);
    let mut writer: Option<OwnedWriteHalf> = Some(write_half);
    let wire = conn.wire();
    let mut buf = vec![0u8; READ_CHUNK];

    loop {
        while let Some(bytes) = conn.poll_transmit() {
            let Some(w) = writer.as_mut() else {
                break;
            };
            if let Err(e) = w.write_all(&bytes).await {
                warn!(error = %e, "write failed");
                writer = None;
                conn.handle_error();
            }
        }

        while let Some(command) = conn.poll_socket_command() {
            match command {
                SocketCommand::Shutdown => {
                    if let Some(w) = writer.as_mut() {
                        if let Err(e) = w.shutdown().await {
                            debug!(error = %e, "shutdown failed");
                        }
                    }
                    conn.handle_shutdown();
                }
                SocketCommand::Close => {
                    reader = None;
                    writer = None;
                    conn.handle_socket_closed();
                }
            }
        }

        conn.reap_timers();
        if conn.is_released() {
            break;
        }

        let reading = conn.is_reading() && reader.is_some();
        let deadline = conn.next_deadline();

        let event = tokio::select! {
            res = read_some(reader.as_mut(), &mut buf), if reading => Event::Read(res),
            _ = wire.notified() => Event::Wakeup,
            _ = sleep_until(deadline) => Event::Timeout,
        };

        let now = Instant::now();
        match event {
            Event::Read(Ok(0)) => conn.handle_eof(now),
            Event::Read(Ok(n)) => conn.handle_read(now, &buf[..n]),
            Event::Read(Err(e)) => {
                warn!(error = %e, "read failed");
                conn.handle_error();
            }
            Event::Wakeup => conn.handle_wakeup(now),
            Event::Timeout => conn.handle_timeout(now),
        }
    }

    debug!("connection released");
    Ok(())
}
