//! Per-connection request lifecycle.
//!
//! [`HttpConnection`] owns the decoding and encoding halves of one transport
//! connection and runs the exchanges on it strictly one after another.

mod http_connection;

pub use http_connection::{DEFAULT_READ_TIMEOUT, HttpConnection};
