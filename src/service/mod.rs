//! Demo service built and deployed by the sample pipeline
//!
//! Answers `GET /hello` with a fixed greeting. Any other path is a 404 and any
//! other method on `/hello` is a 405. Connections are closed after one response.

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Exact body returned by `GET /hello`
pub const HELLO_BODY: &str = "Hello, DevOps World from Java!";

/// How long a client may take to send its request head
pub const HEAD_TIMEOUT: Duration = Duration::from_secs(10);

const MAX_HEAD_BYTES: usize = 8 * 1024;

/// Status line and body for a request line
pub fn route(method: &str, path: &str) -> (u16, &'static str, &'static str) {
    // Query strings do not change the route
    let path = path.split('?').next().unwrap_or(path);
    match (method, path) {
        ("GET", "/hello") => (200, "OK", HELLO_BODY),
        (_, "/hello") => (405, "Method Not Allowed", "Method Not Allowed"),
        _ => (404, "Not Found", "Not Found"),
    }
}

/// Bind `addr` and serve until the task is cancelled
pub async fn serve(addr: &str) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on {}", listener.local_addr()?);
    run(listener).await
}

/// Accept loop over an already bound listener
pub async fn run(listener: TcpListener) -> Result<()> {
    run_with_timeout(listener, HEAD_TIMEOUT).await
}

/// Accept loop where each client gets `head_timeout` to send its request head
pub async fn run_with_timeout(listener: TcpListener, head_timeout: Duration) -> Result<()> {
    loop {
        let (stream, peer) = listener.accept().await.context("Failed to accept connection")?;
        tokio::spawn(async move {
            if let Err(e) = handle(stream, head_timeout).await {
                warn!("Connection from {} failed: {}", peer, e);
            }
        });
    }
}

/// Read until the blank line ending the head. `None` if the head is too large.
async fn read_head(stream: &mut TcpStream) -> Result<Option<Vec<u8>>> {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];

    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.len() > MAX_HEAD_BYTES {
            return Ok(None);
        }
    }

    Ok(Some(buf))
}

/// Read one request head and write one response
pub async fn handle(mut stream: TcpStream, head_timeout: Duration) -> Result<()> {
    let buf = match timeout(head_timeout, read_head(&mut stream)).await {
        Ok(head) => head?,
        Err(_) => {
            debug!("No request head within {:?}", head_timeout);
            return respond(&mut stream, 408, "Request Timeout", "").await;
        }
    };
    let Some(buf) = buf else {
        return respond(&mut stream, 431, "Request Header Fields Too Large", "").await;
    };

    let head = String::from_utf8_lossy(&buf);
    let mut parts = head.lines().next().unwrap_or_default().split_whitespace();
    let (Some(method), Some(path)) = (parts.next(), parts.next()) else {
        return respond(&mut stream, 400, "Bad Request", "Bad Request").await;
    };

    let (status, reason, body) = route(method, path);
    debug!("{} {} -> {}", method, path, status);
    respond(&mut stream, status, reason, body).await
}

async fn respond(stream: &mut TcpStream, status: u16, reason: &str, body: &str) -> Result<()> {
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: text/plain;charset=UTF-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        reason,
        body.len(),
        body
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await?;
    Ok(())
}
