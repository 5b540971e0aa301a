//! Spawning the relay under test as a child process.

use std::io;
use std::path::Path;
use std::process::Stdio;

use anyhow::Context as _;
use futures_util::{Stream, StreamExt as _};
use tokio::io::{AsyncBufReadExt as _, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tokio_stream::wrappers::LinesStream;

use crate::http::READY_MESSAGE;

/// Start `program` with `args` and wait until it reports readiness.
///
/// The child is killed when the returned handle is dropped. Its stdout and
/// stderr are echoed for as long as it runs.
pub async fn spawn_relay(program: &Path, args: &[String]) -> anyhow::Result<Child> {
    let mut child = Command::new(program)
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("failed to spawn {}", program.display()))?;

    // Readiness may be reported on either stream depending on log setup.
    let stdout = child.stdout.take().context("child stdout not captured")?;
    let stderr = child.stderr.take().context("child stderr not captured")?;
    let lines = futures_util::stream::select(
        LinesStream::new(BufReader::new(stdout).lines()),
        LinesStream::new(BufReader::new(stderr).lines()),
    );

    let (ready_tx, ready_rx) = oneshot::channel();
    tokio::spawn(echo_output(lines, READY_MESSAGE, ready_tx));

    ready_rx
        .await
        .with_context(|| format!("{} exited before reporting readiness", program.display()))?;

    if let Some(pid) = child.id() {
        tracing::info!(pid, "Relay process ready");
    }
    Ok(child)
}

/// Print every line; signal `ready` at the first line containing `marker`.
///
/// `ready` is dropped unsent if the output ends or fails first.
pub async fn echo_output<S>(lines: S, marker: &str, ready: oneshot::Sender<()>)
where
    S: Stream<Item = io::Result<String>>,
{
    let mut lines = std::pin::pin!(lines);
    let mut ready = Some(ready);

    while let Some(line) = lines.next().await {
        match line {
            Ok(line) => {
                println!("{line}");
                if line.contains(marker) {
                    if let Some(ready) = ready.take() {
                        let _ = ready.send(());
                    }
                }
            }
            Err(e) => {
                tracing::error!(error = ?e, "Error reading child output");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ready_on_marker_line() {
        let lines = futures_util::stream::iter(vec![
            Ok("starting".to_string()),
            Ok(format!("INFO upstream_relay: {READY_MESSAGE} address=127.0.0.1:1")),
            Ok("after".to_string()),
        ]);
        let (tx, rx) = oneshot::channel();
        echo_output(lines, READY_MESSAGE, tx).await;
        assert!(rx.await.is_ok());
    }

    #[tokio::test]
    async fn not_ready_when_output_ends_first() {
        let lines = futures_util::stream::iter(vec![Ok("starting".to_string())]);
        let (tx, rx) = oneshot::channel();
        echo_output(lines, READY_MESSAGE, tx).await;
        assert!(rx.await.is_err());
    }

    #[tokio::test]
    async fn read_error_stops_echo() {
        let lines = futures_util::stream::iter(vec![
            Err(io::Error::other("broken pipe")),
            Ok(READY_MESSAGE.to_string()),
        ]);
        let (tx, rx) = oneshot::channel();
        echo_output(lines, READY_MESSAGE, tx).await;
        assert!(rx.await.is_err());
    }
}
