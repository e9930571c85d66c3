//! UNIX socket server for daemon mode.
//!
//! Listens on a UNIX socket and answers one NDJSON request per connection.
//! Each connection gets its own thread; all of them share one DaemonService.
//!
//! CHANGELOG:
//! - 10/18/2026 - Read timeout so idle clients release their thread
//! - 10/18/2026 - Thread per connection
//! - 10/18/2026 - Initial implementation

use anyhow::{Context, Result};
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::daemon::protocol::{ErrorInfo, Request, Response};
use crate::daemon::service::DaemonService;

/// How long a connection may sit without sending its request line.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Daemon server listening on UNIX socket.
pub struct DaemonServer {
    service: Arc<DaemonService>,
    socket_path: PathBuf,
    read_timeout: Duration,
}

impl DaemonServer {
    pub fn new(service: DaemonService, socket_path: impl AsRef<Path>) -> Self {
        Self {
            service: Arc::new(service),
            socket_path: socket_path.as_ref().to_path_buf(),
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    /// Bind the socket (owner-only permissions), replacing a stale one.
    pub fn bind(&self) -> Result<UnixListener> {
        let _ = std::fs::remove_file(&self.socket_path);

        let listener = UnixListener::bind(&self.socket_path)
            .with_context(|| format!("Failed to bind socket {:?}", self.socket_path))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.socket_path, std::fs::Permissions::from_mode(0o600))?;
        }

        Ok(listener)
    }

    /// Bind and serve requests (blocking).
    pub fn serve(&self) -> Result<()> {
        let listener = self.bind()?;
        self.serve_on(listener)
    }

    /// Serve requests on an already bound listener (blocking).
    pub fn serve_on(&self, listener: UnixListener) -> Result<()> {
        tracing::info!(socket = %self.socket_path.display(), "daemon listening");

        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    let service = Arc::clone(&self.service);
                    let read_timeout = self.read_timeout;
                    std::thread::spawn(move || {
                        if let Err(e) = handle_connection(&service, stream, read_timeout) {
                            tracing::warn!(error = %e, "connection error");
                        }
                    });
                }
                Err(e) => {
                    tracing::warn!(error = %e, "accept error");
                }
            }
        }

        Ok(())
    }
}

/// Handle a single client connection.
fn handle_connection(
    service: &DaemonService,
    stream: UnixStream,
    read_timeout: Duration,
) -> Result<()> {
    stream.set_read_timeout(Some(read_timeout))?;
    let mut writer = stream.try_clone()?;
    let mut reader = BufReader::new(&stream);

    let mut line = String::new();
    reader.read_line(&mut line)?;

    if line.trim().is_empty() {
        return Ok(()); // Client disconnected
    }

    let start = Instant::now();
    let elapsed_ms = |start: Instant| start.elapsed().as_secs_f64() * 1000.0;

    let response = match Request::from_ndjson_line(&line) {
        Ok(request) => {
            tracing::debug!(method = %request.method, id = %request.id, "request");
            match service.dispatch(&request.method, request.params) {
                Ok(result) => Response::success(request.id, result, elapsed_ms(start)),
                Err(error) => Response::error(request.id, error, elapsed_ms(start)),
            }
        }
        Err(e) => Response::error(
            String::new(),
            ErrorInfo::new("INVALID_JSON", format!("{:#}", e)),
            elapsed_ms(start),
        ),
    };

    let response_line = response.to_ndjson_line()?;
    writer.write_all(response_line.as_bytes())?;
    writer.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use evoapi_core::{EvolutionClient, FakeTransport};

    fn service() -> DaemonService {
        DaemonService::new(EvolutionClient::with_transport(
            Arc::new(FakeTransport::new()),
            "http://evo.local",
            "secret",
            "main",
            Duration::from_secs(30),
        ))
    }

    #[test]
    fn test_silent_client_times_out() {
        let (_client, server_side) = UnixStream::pair().unwrap();

        let start = Instant::now();
        let result = handle_connection(&service(), server_side, Duration::from_millis(50));

        assert!(result.is_err());
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_request_line_is_answered() {
        let (client, server_side) = UnixStream::pair().unwrap();
        let mut writer = &client;
        writer.write_all(b"{\"id\":\"1\",\"method\":\"health\"}\n").unwrap();

        handle_connection(&service(), server_side, Duration::from_secs(1)).unwrap();

        let mut line = String::new();
        BufReader::new(&client).read_line(&mut line).unwrap();
        let response = Response::from_ndjson_line(&line).unwrap();
        assert!(response.ok);
        assert_eq!(response.id, "1");
    }
}
