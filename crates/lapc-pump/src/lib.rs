//! LAPC Pump — the bidirectional stdio pump that ties framing, dispatch,
//! and subprocess lifecycle together into the running proxy (§5).
//!
//! [`run`] spawns the upstream child and drives three cooperative tasks:
//! Pump-In (client stdin → upstream stdin), Pump-Out (upstream stdout →
//! client stdout), and a verbatim stderr forwarder. Client EOF drives the
//! graceful-shutdown sequence in [`child`]; upstream EOF tears down
//! Pump-Out and, transitively, the whole proxy.

pub mod child;
pub mod context;
pub mod dispatch;
pub mod framing;
pub mod metrics_annotation;

use std::sync::Arc;

use lapc_core::config::ProxyConfig;
use lapc_core::tokens::TokenCounter;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::Child;
use tokio::sync::Mutex;

pub use context::PumpContext;

use crate::dispatch::ClientOutcome;
use crate::framing::{read_frame, write_frame, Frame};

/// Serializes writes to the client so no two frames interleave mid-line
/// (§5 "client_write_lock").
struct ClientWriter<W> {
    inner: Mutex<W>,
}

impl<W: AsyncWrite + Unpin> ClientWriter<W> {
    fn new(writer: W) -> Self {
        Self { inner: Mutex::new(writer) }
    }

    async fn write_line(&self, line: &str) -> std::io::Result<()> {
        let mut guard = self.inner.lock().await;
        write_frame(&mut *guard, line).await
    }
}

/// Pump-In: client stdin → upstream stdin, intercepting and possibly
/// short-circuiting per [`dispatch::handle_client_line`].
async fn pump_in<R, W>(
    ctx: Arc<PumpContext>,
    client_in: R,
    mut upstream_in: W,
    client_writer: Arc<ClientWriter<impl AsyncWrite + Unpin>>,
) where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut reader = BufReader::new(client_in);
    loop {
        match read_frame(&mut reader).await {
            Ok(Frame::Line(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                match dispatch::handle_client_line(&ctx, &line).await {
                    ClientOutcome::Answered(response) => {
                        if let Err(e) = client_writer.write_line(&response).await {
                            tracing::error!(error = %e, "failed to write local response to client");
                            break;
                        }
                    }
                    ClientOutcome::Forward(info) => {
                        ctx.stats.record_upstream_request(info.tokens as u64, info.bytes as u64);
                        if let Err(e) = write_frame(&mut upstream_in, &info.line).await {
                            tracing::warn!(error = %e, "failed to forward frame upstream, stopping pump-in");
                            break;
                        }
                    }
                    ClientOutcome::Drop => {}
                }
            }
            Ok(Frame::Oversized) => {
                tracing::warn!("skipping oversized client frame");
            }
            Ok(Frame::Eof) => {
                tracing::info!("client closed stdin, shutting down");
                break;
            }
            Err(e) => {
                tracing::error!(error = %e, "error reading from client stdin");
                break;
            }
        }
    }
    // Dropping the upstream stdin handle closes it, signalling EOF to the
    // child; the caller awaits the child's graceful-shutdown sequence.
    let _ = upstream_in.shutdown().await;
}

/// Pump-Out: upstream stdout → client stdout, post-processing each
/// response per [`dispatch::handle_upstream_line`].
async fn pump_out<R>(
    ctx: Arc<PumpContext>,
    upstream_out: R,
    client_writer: Arc<ClientWriter<impl AsyncWrite + Unpin>>,
) where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(upstream_out);
    loop {
        match read_frame(&mut reader).await {
            Ok(Frame::Line(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                if let Some(out) = dispatch::handle_upstream_line(&ctx, &line).await {
                    if let Err(e) = client_writer.write_line(&out).await {
                        tracing::error!(error = %e, "failed to write upstream response to client");
                        break;
                    }
                }
            }
            Ok(Frame::Oversized) => {
                tracing::warn!("skipping oversized upstream frame");
            }
            Ok(Frame::Eof) => {
                tracing::info!("upstream closed stdout");
                break;
            }
            Err(e) => {
                tracing::error!(error = %e, "error reading from upstream stdout");
                break;
            }
        }
    }
}

/// Stderr-Forwarder: streams upstream stderr bytes to this process's
/// stderr unchanged (§2, §5).
async fn forward_stderr<R>(upstream_err: R)
where
    R: AsyncRead + Unpin,
{
    let mut reader = upstream_err;
    let mut stderr = tokio::io::stderr();
    if let Err(e) = tokio::io::copy(&mut reader, &mut stderr).await {
        tracing::debug!(error = %e, "stderr forwarding ended");
    }
}

/// Run the proxy to completion: spawn `program args...`, pump both
/// directions against the process's own stdio, and return the upstream's
/// exit status (or `None` if it could not be determined), per §6.5 "exit
/// code follows the upstream's".
pub async fn run(
    config: Arc<ProxyConfig>,
    tokens: Box<dyn TokenCounter>,
    program: &str,
    args: &[String],
) -> lapc_core::error::Result<Option<i32>> {
    let mut child: Child = child::spawn_upstream(program, args)?;
    let upstream_stdin = child.stdin.take().expect("piped stdin");
    let upstream_stdout = child.stdout.take().expect("piped stdout");
    let upstream_stderr = child.stderr.take().expect("piped stderr");

    let ctx = Arc::new(PumpContext::new(config.clone(), tokens));
    let client_writer = Arc::new(ClientWriter::new(tokio::io::stdout()));

    let stderr_task = tokio::spawn(forward_stderr(upstream_stderr));
    let pump_out_task = tokio::spawn(pump_out(ctx.clone(), upstream_stdout, client_writer.clone()));
    let pump_in_task = tokio::spawn(pump_in(ctx.clone(), tokio::io::stdin(), upstream_stdin, client_writer.clone()));

    // Pump-In finishing (client EOF, or a forward failure) drives the
    // graceful-shutdown sequence; Pump-Out and the stderr forwarder are
    // left to finish on their own as the child tears down.
    let _ = pump_in_task.await;
    let status = child::shutdown_gracefully(&mut child).await;
    let _ = pump_out_task.await;
    let _ = stderr_task.await;

    if config.stats {
        tracing::info!("{}", ctx.stats.summary_line());
    }

    Ok(status.and_then(|s| s.code()))
}
