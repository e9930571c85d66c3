//! Unix socket client for the evoapi daemon.

use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::daemon::protocol::{Request, Response};

/// Errors that can occur when communicating with the daemon.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Socket not found: {0}")]
    SocketNotFound(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(String),

    #[error("Empty response from daemon")]
    EmptyResponse,
}

/// A client for the evoapi daemon.
pub struct DaemonClient {
    socket_path: PathBuf,
    timeout: Duration,
}

impl DaemonClient {
    pub fn new(socket_path: impl AsRef<Path>, timeout: Duration) -> Self {
        Self {
            socket_path: socket_path.as_ref().to_path_buf(),
            timeout,
        }
    }

    /// Send a request to the daemon and receive a response.
    pub fn call(&self, request: &Request) -> Result<Response, ClientError> {
        if !self.socket_path.exists() {
            return Err(ClientError::SocketNotFound(
                self.socket_path.display().to_string(),
            ));
        }

        let stream = UnixStream::connect(&self.socket_path)?;
        stream.set_read_timeout(Some(self.timeout))?;
        stream.set_write_timeout(Some(self.timeout))?;

        let mut writer = &stream;
        let line = request
            .to_ndjson_line()
            .map_err(|e| ClientError::Json(e.to_string()))?;
        writer.write_all(line.as_bytes())?;
        writer.flush()?;

        let mut reader = BufReader::new(&stream);
        let mut line = String::new();
        let bytes_read = reader.read_line(&mut line)?;

        if bytes_read == 0 {
            return Err(ClientError::EmptyResponse);
        }

        Response::from_ndjson_line(&line).map_err(|e| ClientError::Json(e.to_string()))
    }
}
