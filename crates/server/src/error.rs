use std::io;
use std::net::SocketAddr;

use thiserror::Error;

use crate::transport::Transport;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("invalid server configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("transport {transport} is not available on this platform")]
    TransportUnavailable { transport: Transport },

    #[error("failed to bind {}: {source}", display_addr(.addr.as_ref()))]
    Bind {
        addr: Option<SocketAddr>,
        #[source]
        source: io::Error,
    },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl ServerError {
    pub fn invalid_config<S: ToString>(str: S) -> Self {
        Self::InvalidConfig { reason: str.to_string() }
    }

    pub fn bind(addr: Option<SocketAddr>, source: io::Error) -> Self {
        Self::Bind { addr, source }
    }
}

fn display_addr(addr: Option<&SocketAddr>) -> String {
    addr.map_or_else(|| "unresolved address".to_string(), ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_error_keeps_cause() {
        let addr: SocketAddr = "127.0.0.1:80".parse().unwrap();
        let error = ServerError::bind(Some(addr), io::Error::from(io::ErrorKind::AddrInUse));
        assert!(error.to_string().starts_with("failed to bind 127.0.0.1:80"));

        let source = std::error::Error::source(&error).unwrap();
        assert_eq!(source.downcast_ref::<io::Error>().unwrap().kind(), io::ErrorKind::AddrInUse);
    }

    #[test]
    fn unresolved_bind_error() {
        let error = ServerError::bind(None, io::Error::other("no address"));
        assert_eq!(error.to_string(), "failed to bind unresolved address: no address");
    }
}
