//! Multi-threaded TCP server for the `shuttle-http` engine.
//!
//! ```no_run
//! use std::sync::Arc;
//! use shuttle::ServerConfig;
//! use shuttle_http::handler::make_handler;
//! use shuttle_http::protocol::{BoxError, Request, Response};
//!
//! async fn hello_world(_request: Request) -> Result<Response, BoxError> {
//!     Ok(Response::text("Hello World"))
//! }
//!
//! let config = ServerConfig { workers: Some(4), ..Default::default() };
//! shuttle::serve("127.0.0.1:8080", config, Arc::new(make_handler(hello_world))).unwrap();
//! ```

mod config;
mod error;
mod event_loop;
mod server;
mod transport;

pub use config::ServerConfig;
pub use error::ServerError;
pub use server::{Server, ShutdownHandle, serve};
pub use transport::Transport;
