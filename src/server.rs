//! TCP accept loop and per-connection read/write driver: a `tokio::select!`
//! accept loop plus, per connection, a single task `select!`-ing between the
//! socket's inbound frames and its session's outbound push channel so the
//! connection's writer half has exactly one owner.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::acceptor;
use crate::coordinator::{submit, Coordinator};
use crate::protocol::{method, Request, Response, SubmitParams};
use crate::session::PUSH_QUEUE_CAPACITY;
use crate::transport::{read_frame, write_frame, FrameError, OpCode};

const AUTHORIZE_DEADLINE: Duration = Duration::from_secs(10);

/// Accept connections on `addr` until `shutdown` reports `true`. Each
/// accepted connection is driven on its own task; the loop itself never
/// blocks on a single connection's lifetime.
pub async fn run(
    coordinator: Arc<Coordinator>,
    addr: &str,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "accept loop listening");

    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("accept loop stopping");
                    return Ok(());
                }
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((socket, peer)) => {
                        let coordinator = Arc::clone(&coordinator);
                        let shutdown = shutdown.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(coordinator, socket, shutdown).await {
                                debug!(%peer, error = %e, "connection closed");
                            }
                        });
                    }
                    Err(e) => warn!(error = %e, "accept failed"),
                }
            }
        }
    }
}

async fn handle_connection(
    coordinator: Arc<Coordinator>,
    mut socket: TcpStream,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let (mut read_half, mut write_half) = socket.split();

    let (push_tx, mut push_rx) = mpsc::channel::<Vec<u8>>(PUSH_QUEUE_CAPACITY);
    let (channel_id, session) = acceptor::accept(
        &coordinator,
        &mut read_half,
        &mut write_half,
        AUTHORIZE_DEADLINE,
        push_tx,
    )
    .await?;

    info!(%channel_id, username = %session.username, "session authorized");

    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
            pushed = push_rx.recv() => {
                match pushed {
                    Some(frame) => {
                        if write_half.write_all(&frame).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            frame = read_frame(&mut read_half) => {
                match frame {
                    Ok(frame) => {
                        if frame.opcode != OpCode::Binary {
                            continue;
                        }
                        if let Some(response) = dispatch(&coordinator, &channel_id, &frame.payload).await {
                            let payload = serde_json::to_vec(&response)?;
                            write_frame(&mut write_half, OpCode::Binary, &payload).await?;
                        }
                    }
                    Err(FrameError::Closed) => break,
                    Err(e) => {
                        debug!(%channel_id, error = %e, "frame read error");
                        break;
                    }
                }
            }
        }
    }

    coordinator.sessions.unregister(&channel_id).await;
    info!(%channel_id, "session closed");
    Ok(())
}

/// Decode and route one inbound envelope. `submit` is the only mid-session
/// client method; anything else (including malformed JSON) yields
/// `Invalid result` if it at least carried a request `id`, and is otherwise
/// silently ignored, matching "unknown methods are ignored".
async fn dispatch(coordinator: &Coordinator, channel_id: &str, payload: &[u8]) -> Option<Response> {
    let request: Request = match serde_json::from_slice(payload) {
        Ok(r) => r,
        Err(_) => return None,
    };

    if request.method != method::SUBMIT {
        return None;
    }
    let id = request.id?;

    let params: SubmitParams = match serde_json::from_value(request.params) {
        Ok(p) => p,
        Err(_) => {
            coordinator.metrics.submits_rejected.fetch_add(1, Ordering::Relaxed);
            return Some(Response::err(id, crate::errors::RejectReason::InvalidResult.wire_str()));
        }
    };

    let outcome = submit::validate(
        coordinator,
        channel_id,
        params.job_id,
        &params.client_nonce,
        &params.result,
    )
    .await;

    Some(match outcome.reason {
        None => Response::ok(id),
        Some(reason) => {
            coordinator.metrics.submits_rejected.fetch_add(1, Ordering::Relaxed);
            Response::err(id, reason.wire_str())
        }
    })
}
