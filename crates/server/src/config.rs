use std::time::Duration;

use crate::ServerError;
use crate::transport::Transport;

/// Listening socket, connection socket and threading options.
///
/// Construct with struct update syntax:
///
/// ```
/// use shuttle::ServerConfig;
///
/// let config = ServerConfig { workers: Some(4), ..Default::default() };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Queue depth for pending connections
    pub backlog: u32,
    /// Threads accepting connections, they also process connections when `workers` is unset
    pub acceptor_threads: usize,
    /// Threads processing accepted connections
    pub workers: Option<usize>,
    pub tcp_nodelay: bool,
    /// Only meaningful for outbound connections, accepted for completeness
    pub connect_timeout: Option<Duration>,
    /// Bound on waiting for the next inbound frame of a connection
    pub read_timeout: Duration,
    /// `SO_KEEPALIVE`, the system default is kept when unset
    pub keep_alive: Option<bool>,
    pub send_buffer_size: Option<usize>,
    pub recv_buffer_size: Option<usize>,
    /// `SO_REUSEADDR` on the listening socket
    pub reuse_address: Option<bool>,
    /// Pins an I/O backend, it must be available on this platform
    pub transport: Option<Transport>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            backlog: 128,
            acceptor_threads: 1,
            workers: None,
            tcp_nodelay: true,
            connect_timeout: None,
            read_timeout: Duration::from_secs(15),
            keep_alive: None,
            send_buffer_size: Some(64 * 1024),
            recv_buffer_size: Some(64 * 1024),
            reuse_address: None,
            transport: None,
        }
    }
}

impl ServerConfig {
    /// Checks thread counts, sizes and transport availability.
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.acceptor_threads == 0 {
            return Err(ServerError::invalid_config("acceptor_threads must be greater than 0"));
        }

        if self.workers == Some(0) {
            return Err(ServerError::invalid_config("workers must be greater than 0 when set"));
        }

        if self.read_timeout.is_zero() {
            return Err(ServerError::invalid_config("read_timeout must not be zero"));
        }

        if self.send_buffer_size == Some(0) || self.recv_buffer_size == Some(0) {
            return Err(ServerError::invalid_config("socket buffer sizes must be greater than 0 when set"));
        }

        match self.transport {
            Some(transport) if !transport.is_available() => Err(ServerError::TransportUnavailable { transport }),
            _ => Ok(()),
        }
    }

    /// The configured transport, or the one detected for this platform.
    pub fn transport(&self) -> Transport {
        self.transport.unwrap_or_else(Transport::detect)
    }
}
