use tokio::io::{split, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tracing::{debug, instrument};

use crate::server::connection::ConnectionHandler;
use crate::utils::error::EchoError;

/// Line written to a peer whose connection has been idle for a full read
/// timeout. The connection stays open afterwards.
pub const KEEPALIVE_PROBE: &str = "Are you alive?\n";

/// Read chunk size for the echo loop.
const READ_CHUNK_SIZE: usize = 1024;

/// Runs the read/echo/timeout loop for one connection until EOF, a stop
/// request, or a fatal I/O error.
///
/// The stream is generic so tests can inject an in-memory duplex pipe in
/// place of a TCP socket. `run` owns the stream: both halves are released
/// before it returns, and dropping the stream closes the connection on
/// every exit path, including the error path.
///
/// # Errors
/// Returns `EchoError::Io` for any I/O failure other than a read timeout.
/// The caller is responsible for cleanup; nothing is swallowed here.
#[instrument(skip(handler, stream), fields(peer = %handler.addr))]
pub async fn run<S>(handler: &ConnectionHandler, stream: S) -> Result<(), EchoError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut read_half, mut write_half) = split(stream);

    let result = echo_loop(handler, &mut read_half, &mut write_half).await;

    // Release the write side gracefully before the stream is dropped. The
    // loop may have ended with the peer already gone, so a failure here is
    // ignored.
    let _ = write_half.shutdown().await;

    result
}

/// The echo state machine: Running until EOF, a stop request, or a fatal
/// I/O error, then Terminating (the caller closes the stream).
///
/// The timeout wraps a raw `read`, which is cancel safe: when the timer
/// fires no bytes have been taken from the stream, so nothing is lost to
/// the keepalive path. Line assembly happens in `pending`, which this loop
/// owns across iterations.
async fn echo_loop<R, W>(
    handler: &ConnectionHandler,
    reader: &mut R,
    writer: &mut W,
) -> Result<(), EchoError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    // Bytes received but not yet terminated by a newline. A read timeout
    // leaves this buffer intact, so a line interrupted by an idle gap is
    // still echoed whole once its newline arrives.
    let mut pending: Vec<u8> = Vec::new();
    let mut chunk = [0u8; READ_CHUNK_SIZE];

    loop {
        if handler.is_stopped() {
            debug!("Stop requested, ending echo loop");
            return Ok(());
        }

        match timeout(handler.read_timeout(), reader.read(&mut chunk)).await {
            Ok(Ok(0)) => {
                // Orderly close by the peer. Anything left in `pending` was
                // never newline-terminated and is not echoed.
                debug!("Connection closed by peer");
                return Ok(());
            }
            Ok(Ok(n)) => {
                pending.extend_from_slice(&chunk[..n]);
                // Echo every completed line; the unterminated tail stays in
                // `pending` for the next pass.
                while let Some(pos) = pending.iter().position(|&b| b == b'\n') {
                    let line: Vec<u8> = pending.drain(..=pos).collect();
                    debug!("Read {:?}", String::from_utf8_lossy(&line[..pos]));
                    writer.write_all(&line).await?;
                    writer.flush().await?;
                }
            }
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                // Idle past the read timeout. Not fatal: probe the peer and
                // keep the connection open. A stop request that arrived
                // while the read was blocked wins over the probe.
                if handler.is_stopped() {
                    debug!("Stop requested during idle wait, ending echo loop");
                    return Ok(());
                }
                debug!("Connection timeout, sending keepalive probe");
                writer.write_all(KEEPALIVE_PROBE.as_bytes()).await?;
                writer.flush().await?;
            }
        }
    }
}
