//! Host bridge loop
//!
//! One owner drives the engine. Host commands (stdin) and finished vector
//! fetches arrive on a single channel and are handled one at a time.

use std::sync::Arc;

use anyhow::Result;
use dig_core::{Command, MapEngine, MapSurface, OverlayDescriptor};
use dig_data::{OverlayFetcher, VectorOverlay};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::surface::LineWriter;

/// Everything the owner loop reacts to
#[derive(Debug)]
pub enum HostMessage {
    Command(Command),
    Rejected { line: String, error: String },
    VectorLoaded(VectorOverlay),
    VectorFailed { name: String, error: String },
    InputClosed,
}

/// Start one fetch task per vector overlay
fn spawn_fetches(
    fetcher: Arc<dyn OverlayFetcher>,
    pending: Vec<OverlayDescriptor>,
    tx: &mpsc::UnboundedSender<HostMessage>,
) -> usize {
    let count = pending.len();
    for descriptor in pending {
        let fetcher = fetcher.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            let message = match fetcher.fetch(&descriptor).await {
                Ok(overlay) => HostMessage::VectorLoaded(overlay),
                Err(e) => HostMessage::VectorFailed {
                    name: descriptor.name.clone(),
                    error: e.to_string(),
                },
            };
            // The owner may already be gone at shutdown
            let _ = tx.send(message);
        });
    }
    count
}

/// Forward input lines to the owner as parsed commands
fn spawn_reader<R>(input: R, tx: mpsc::UnboundedSender<HostMessage>)
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = input.lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => {
                    let message = match Command::parse(&line) {
                        Ok(command) => HostMessage::Command(command),
                        Err(e) => HostMessage::Rejected { line, error: e.to_string() },
                    };
                    if tx.send(message).is_err() {
                        return;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "host input failed");
                    break;
                }
            }
        }
        let _ = tx.send(HostMessage::InputClosed);
    });
}

/// Run until the host closes its input and every vector fetch has reported
pub async fn run<S, R>(
    engine: &mut MapEngine<S>,
    pending: Vec<OverlayDescriptor>,
    fetcher: Arc<dyn OverlayFetcher>,
    input: R,
    writer: LineWriter,
) -> Result<()>
where
    S: MapSurface,
    R: AsyncBufRead + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut outstanding = spawn_fetches(fetcher, pending, &tx);
    spawn_reader(input, tx);

    let mut input_open = true;
    while input_open || outstanding > 0 {
        let Some(message) = rx.recv().await else {
            break;
        };

        match message {
            HostMessage::Command(command) => {
                if let Err(e) = engine.dispatch(command) {
                    warn!(error = %e, "command rejected");
                    writer.error(&e.to_string());
                }
            }
            HostMessage::Rejected { line, error } => {
                warn!(%line, %error, "unparseable host command");
                writer.error(&error);
            }
            HostMessage::VectorLoaded(overlay) => {
                outstanding -= 1;
                debug!(overlay = %overlay.name, "vector overlay arrived");
                engine.vector_loaded(&overlay.name, overlay.data, overlay.bounds);
            }
            HostMessage::VectorFailed { name, error } => {
                outstanding -= 1;
                engine.vector_failed(&name, &error);
            }
            HostMessage::InputClosed => {
                debug!(outstanding, "host input closed");
                input_open = false;
            }
        }
    }

    info!("host bridge finished");
    Ok(())
}
