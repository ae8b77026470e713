use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::oneshot;
use tracing::debug;

/// One-shot readiness signal shared by the node's output watchers.
///
/// Only the first `fire` resolves the receiver; later calls are no-ops. When
/// every clone is dropped without firing, the receiver sees a closed channel.
#[derive(Clone)]
pub struct ReadySignal {
    slot: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

impl ReadySignal {
    pub fn new() -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        let signal = Self {
            slot: Arc::new(Mutex::new(Some(tx))),
        };
        (signal, rx)
    }

    /// Returns true only for the call that actually resolved the signal
    pub fn fire(&self) -> bool {
        let sender = match self.slot.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        match sender {
            // The receiver may be gone if the race was already lost to the timer
            Some(tx) => tx.send(()).is_ok(),
            None => false,
        }
    }
}

/// Read `stream` until EOF, firing `ready` once the current line contains
/// `marker`. With a `mirror` sink, every byte is copied to it as it arrives.
///
/// The marker is matched against the line read so far, so a marker printed
/// without a trailing newline is seen as soon as it is written. Keeps draining
/// after the signal fires so the node never blocks on a full pipe.
pub async fn watch_stream<R, W>(
    stream: R,
    marker: Arc<str>,
    ready: ReadySignal,
    mut mirror: Option<W>,
) where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut reader = BufReader::new(stream);
    // Current line, possibly still missing its newline
    let mut line = Vec::new();

    loop {
        let chunk = match reader.fill_buf().await {
            Ok(chunk) => chunk,
            Err(e) => {
                debug!("Node output stream closed with error: {}", e);
                break;
            }
        };
        if chunk.is_empty() {
            break;
        }

        let (len, line_done) = match chunk.iter().position(|&b| b == b'\n') {
            Some(pos) => (pos + 1, true),
            None => (chunk.len(), false),
        };
        let start = line.len();
        line.extend_from_slice(&chunk[..len]);
        reader.consume(len);

        if let Some(sink) = mirror.as_mut() {
            let _ = sink.write_all(&line[start..]).await;
            let _ = sink.flush().await;
        }
        if String::from_utf8_lossy(&line).contains(&*marker) && ready.fire() {
            debug!("Readiness marker observed");
        }
        if line_done {
            line.clear();
        }
    }
}
