//! TCP upload listeners.
//!
//! Coordinators push uploads over plain TCP, one upload per connection, and
//! the port alone selects the wire format. A connection is read in 256 byte
//! chunks until EOF or until a chunk that starts with CRLF arrives, then the
//! whole buffer goes to the ingestion pipeline. Connections that stay silent
//! past the read timeout are dropped without processing.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{timeout, Instant};
use tracing::{debug, error, info, warn};

use crate::ingest::Ingestor;
use crate::models::FormatVersion;

const CHUNK_SIZE: usize = 256;

/// Accept connections forever, one spawned task per connection.
pub async fn serve(
    listener: TcpListener,
    version: FormatVersion,
    ingestor: Arc<Ingestor>,
    read_timeout: Duration,
) {
    match listener.local_addr() {
        Ok(addr) => info!(%addr, version = version.as_i64(), "uplink listener started"),
        Err(e) => warn!("uplink listener local_addr unavailable: {e}"),
    }

    loop {
        match listener.accept().await {
            Ok((socket, addr)) => {
                let ingestor = ingestor.clone();
                tokio::spawn(async move {
                    handle_connection(socket, addr, version, ingestor, read_timeout).await;
                });
            }
            Err(e) => error!("accept failed: {e}"),
        }
    }
}

async fn handle_connection(
    mut socket: TcpStream,
    addr: SocketAddr,
    version: FormatVersion,
    ingestor: Arc<Ingestor>,
    read_timeout: Duration,
) {
    debug!(%addr, version = version.as_i64(), "connection opened");

    let payload = match timeout(read_timeout, read_upload(&mut socket)).await {
        Ok(Ok(payload)) => payload,
        Ok(Err(e)) => {
            warn!(%addr, "read failed: {e}");
            return;
        }
        Err(_) => {
            warn!(%addr, "upload timed out, discarding buffer");
            return;
        }
    };

    let started = Instant::now();
    match ingestor.handle_upload(version, &payload).await {
        Ok(()) => {
            info!(
                %addr,
                version = version.as_i64(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "upload processed"
            );
        }
        Err(e) => warn!(%addr, version = version.as_i64(), "upload rejected: {e}"),
    }
}

/// Read chunks until EOF or a terminating chunk. The terminator itself stays
/// in the buffer, exactly as received.
async fn read_upload<R>(socket: &mut R) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut payload = Vec::new();
    loop {
        let mut chunk = [0u8; CHUNK_SIZE];
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        payload.extend_from_slice(&chunk[..n]);
        if terminates_upload(&chunk[..n]) {
            break;
        }
    }
    Ok(payload)
}

/// An upload ends when a freshly read chunk opens with CRLF. The marker is
/// chunk-relative: CRLF in the middle of a chunk does not terminate.
fn terminates_upload(chunk: &[u8]) -> bool {
    chunk.len() >= 2 && chunk[0] == b'\r' && chunk[1] == b'\n'
}
