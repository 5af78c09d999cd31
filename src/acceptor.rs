//! Acceptor: validates the initial `authorize` frame and mints a session.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tracing::warn;

use crate::coordinator::Coordinator;
use crate::protocol::{method, AuthorizeParams, Request, Response};
use crate::session::{ChannelId, Session};
use crate::transport::{read_frame, write_frame, FrameError, OpCode};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum AcceptError {
    #[error("timed out waiting for authorize")]
    Timeout,
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),
    #[error("malformed authorize request")]
    Malformed,
}

/// Read exactly one frame within `deadline`, require it to be a valid
/// `authorize` request, mint a channel ID, and register the session. The
/// caller supplies `push_tx` (the sending half of the channel its writer
/// task already owns the receiving half of) so this function never has to
/// construct or discard a channel of its own. On success, returns the
/// channel ID and the registered session handle; the caller owns driving
/// that session's read/write loop thereafter.
pub async fn accept<R, W>(
    coordinator: &Coordinator,
    reader: &mut R,
    writer: &mut W,
    deadline: Duration,
    push_tx: mpsc::Sender<Vec<u8>>,
) -> Result<(ChannelId, Arc<Session>), AcceptError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let frame = tokio::time::timeout(deadline, read_frame(reader))
        .await
        .map_err(|_| AcceptError::Timeout)??;

    if frame.opcode != OpCode::Binary {
        return Err(AcceptError::Malformed);
    }

    let request: Request = serde_json::from_slice(&frame.payload).map_err(|e| {
        warn!(error = %e, "authorize payload was not valid JSON");
        AcceptError::Malformed
    })?;
    if request.method != method::AUTHORIZE {
        return Err(AcceptError::Malformed);
    }
    let params: AuthorizeParams =
        serde_json::from_value(request.params).map_err(|_| AcceptError::Malformed)?;
    if params.username.trim().is_empty() {
        return Err(AcceptError::Malformed);
    }

    let channel_id = crate::crypto::random_hex_id();
    let session = coordinator
        .sessions
        .register(channel_id.clone(), params.username, push_tx)
        .await;

    let response = Response::ok(request.id.unwrap_or_default());
    let payload = serde_json::to_vec(&response).map_err(|_| AcceptError::Malformed)?;
    write_frame(writer, OpCode::Binary, &payload).await?;

    Ok((channel_id, session))
}
