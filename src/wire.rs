//! # Wire framing for real worker channels.
//!
//! Envelopes cross process boundaries as newline-delimited JSON: one envelope
//! per line, no length prefix, bounded by `max_frame_len`. The format is the
//! informally-versioned contract between orchestrator and workers; this layer
//! only frames and unframes it.
//!
//! [`spawn_io_link`] adapts any `AsyncRead`/`AsyncWrite` pair (typically a
//! spawned child's pipes) into the same in-memory channel shape the rest of
//! the bus speaks:
//!
//! ```text
//!   outbound mpsc ──► writer task ──► AsyncWrite (child stdin)
//!   inbound  mpsc ◄── reader task ◄── AsyncRead  (child stdout)
//! ```
//!
//! ## Failure discipline
//! Malformed framing (oversized line, invalid JSON) is fatal to that one
//! channel: the reader task logs and stops, the inbound side closes, and the
//! owning relay purges the registry entry. The process itself keeps running.

use futures::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, LinesCodec};

use crate::config::TransportConfig;
use crate::envelope::Envelope;
use crate::error::TransportError;

/// Both ends of an adapted I/O channel, in in-memory form.
pub(crate) struct IoLink {
    /// Hand envelopes here to have them framed and written out.
    pub(crate) outbound: mpsc::Sender<Envelope>,
    /// Envelopes decoded off the read side arrive here.
    pub(crate) inbound: mpsc::Receiver<Envelope>,
}

/// Serializes one envelope into its frame body (no trailing newline).
pub(crate) fn encode_frame(env: &Envelope) -> Result<String, TransportError> {
    Ok(serde_json::to_string(env)?)
}

/// Parses one frame body back into an envelope.
pub(crate) fn decode_frame(line: &str) -> Result<Envelope, TransportError> {
    serde_json::from_str(line).map_err(|err| TransportError::Frame {
        detail: err.to_string(),
    })
}

/// Spawns the reader/writer tasks bridging a raw I/O pair to envelope queues.
///
/// Both tasks end on their own: the writer when the outbound queue closes or
/// a write fails, the reader on EOF or the first framing fault.
pub(crate) fn spawn_io_link<R, W>(reader: R, mut writer: W, config: &TransportConfig) -> IoLink
where
    R: AsyncRead + Send + Unpin + 'static,
    W: AsyncWrite + Send + Unpin + 'static,
{
    let capacity = config.channel_capacity_clamped();
    let max_frame = config.max_frame_len_resolved();

    let (out_tx, mut out_rx) = mpsc::channel::<Envelope>(capacity);
    let (in_tx, in_rx) = mpsc::channel::<Envelope>(capacity);

    tokio::spawn(async move {
        while let Some(env) = out_rx.recv().await {
            let line = match encode_frame(&env) {
                Ok(line) => line,
                Err(err) => {
                    tracing::warn!(error = %err, "dropping unserializable envelope");
                    continue;
                }
            };
            if let Err(err) = write_line(&mut writer, &line).await {
                tracing::warn!(error = %err, "worker channel write failed; closing outbound side");
                break;
            }
        }
    });

    tokio::spawn(async move {
        let mut frames = FramedRead::new(reader, LinesCodec::new_with_max_length(max_frame));
        while let Some(frame) = frames.next().await {
            let line = match frame {
                Ok(line) => line,
                Err(err) => {
                    tracing::error!(error = %err, "malformed frame; killing this channel");
                    break;
                }
            };
            if line.is_empty() {
                continue;
            }
            match decode_frame(&line) {
                Ok(env) => {
                    if in_tx.send(env).await.is_err() {
                        break;
                    }
                }
                Err(err) => {
                    tracing::error!(error = %err, "malformed frame; killing this channel");
                    break;
                }
            }
        }
    });

    IoLink {
        outbound: out_tx,
        inbound: in_rx,
    }
}

async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, line: &str) -> std::io::Result<()> {
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}
