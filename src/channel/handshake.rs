//! Engine.IO open and Socket.IO namespace connect

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};

use crate::error::{AdaError, Result};
use crate::protocol::{Frame, Handshake, SocketCodec};
use crate::transport::Transport;

/// Frames of a connection that completed its handshake
pub(super) type FrameStream = mpsc::UnboundedReceiver<Result<String>>;

/// Connect the transport, wait for `open`, then join the namespace
///
/// The caller bounds the whole exchange with the connect timeout. Frames that
/// arrive after the namespace ack stay in the returned stream.
pub(super) async fn connect_and_handshake<T: Transport>(
    transport: &Arc<Mutex<T>>,
    codec: &SocketCodec,
) -> Result<(FrameStream, Handshake)> {
    let mut frames = {
        let mut guard = transport.lock().await;
        guard.connect().await?;
        guard.read_frames()
    };

    let open = loop {
        match next_frame(&mut frames, codec).await? {
            Frame::Open(handshake) => break handshake,
            Frame::Close => return Err(AdaError::connection("server closed during handshake")),
            other => log::debug!("Ignoring frame before open: {other:?}"),
        }
    };
    log::debug!(
        "Engine.IO session {} (ping every {}ms, timeout {}ms)",
        open.sid,
        open.ping_interval,
        open.ping_timeout
    );

    transport.lock().await.write(&codec.connect_frame()).await?;

    loop {
        match next_frame(&mut frames, codec).await? {
            Frame::Connected { sid } => {
                log::debug!(
                    "Joined namespace {} (sid {})",
                    codec.namespace(),
                    sid.as_deref().unwrap_or("-")
                );
                return Ok((frames, open));
            }
            Frame::ConnectRefused(message) => {
                return Err(AdaError::connection(format!(
                    "namespace {} refused: {message}",
                    codec.namespace()
                )));
            }
            Frame::Ping(data) => {
                transport
                    .lock()
                    .await
                    .write(&SocketCodec::pong_frame(&data))
                    .await?;
            }
            Frame::Close | Frame::Disconnect => {
                return Err(AdaError::connection("server closed during handshake"));
            }
            other => log::debug!("Ignoring frame before namespace ack: {other:?}"),
        }
    }
}

async fn next_frame(frames: &mut FrameStream, codec: &SocketCodec) -> Result<Frame> {
    match frames.recv().await {
        Some(Ok(raw)) => codec.deserialize_frame(&raw),
        Some(Err(e)) => Err(e),
        None => Err(AdaError::connection("connection closed during handshake")),
    }
}
