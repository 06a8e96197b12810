//! Built-in demo worker: a tiny TCP health responder.
//!
//! Worker in slot `n` listens on `127.0.0.1:(PORT + n)` (default `PORT=3000`)
//! and answers every connection with `HTTP/1.1 200 OK` and body `ok`.

use std::net::SocketAddr;

use procvisor::{EntryFn, WorkerContext, WorkerError, WorkerRef};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info};

const DEFAULT_PORT: u16 = 3000;
const RESPONSE: &[u8] =
    b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok";

pub fn entry() -> WorkerRef {
    EntryFn::arc("health", serve)
}

async fn serve(ctx: WorkerContext) -> Result<(), WorkerError> {
    let addr = listen_addr(ctx.slot())?;
    let listener = TcpListener::bind(addr).await.map_err(|e| WorkerError::Fatal {
        error: format!("bind {addr}: {e}"),
    })?;
    info!(%addr, slot = ctx.slot(), pid = std::process::id(), "health worker listening");

    loop {
        tokio::select! {
            _ = ctx.cancelled() => {
                info!(%addr, "health worker stopped accepting");
                return Ok(());
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    tokio::spawn(respond(stream, peer));
                }
                Err(e) => {
                    return Err(WorkerError::Fail {
                        error: format!("accept on {addr}: {e}"),
                    });
                }
            }
        }
    }
}

async fn respond(mut stream: TcpStream, peer: SocketAddr) {
    if let Err(e) = stream.write_all(RESPONSE).await {
        debug!(%peer, error = %e, "health response not delivered");
        return;
    }
    let _ = stream.shutdown().await;
}

fn listen_addr(slot: usize) -> Result<SocketAddr, WorkerError> {
    let base = match std::env::var("PORT") {
        Ok(raw) => raw.trim().parse::<u16>().map_err(|_| WorkerError::Fatal {
            error: format!("PORT={raw:?} is not a valid port"),
        })?,
        Err(_) => DEFAULT_PORT,
    };
    let port = u16::try_from(slot)
        .ok()
        .and_then(|s| base.checked_add(s))
        .ok_or_else(|| WorkerError::Fatal {
            error: format!("no port left for slot {slot} above {base}"),
        })?;
    Ok(SocketAddr::from(([127, 0, 0, 1], port)))
}
