//! Request handlers.
//!
//! A handler is called exactly once per request and returns the response to
//! send. [`LocalHandler`] is what a connection drives: its future may hold
//! non-`Send` state because a connection never leaves its thread.
//! [`Handler`] is the `Send` flavour, every `Handler` is also a `LocalHandler`.
//!
//! [`make_handler`] turns an async function into a handler:
//!
//! ```
//! use shuttle_http::handler::make_handler;
//! use shuttle_http::protocol::{BoxError, Request, Response};
//!
//! async fn hello(_request: Request) -> Result<Response, BoxError> {
//!     Ok(Response::text("Hello World"))
//! }
//!
//! let handler = make_handler(hello);
//! ```

use crate::protocol::{BoxError, Request, Response};

#[trait_variant::make(Handler: Send)]
pub trait LocalHandler {
    type Error: Into<BoxError>;

    async fn call(&self, request: Request) -> Result<Response, Self::Error>;
}

/// A handler backed by a function returning a future.
#[derive(Debug)]
pub struct HandlerFn<F> {
    f: F,
}

impl<F, Fut, Err> Handler for HandlerFn<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response, Err>> + Send,
    Err: Into<BoxError>,
{
    type Error = Err;

    async fn call(&self, request: Request) -> Result<Response, Self::Error> {
        (self.f)(request).await
    }
}

pub fn make_handler<F, Fut, Err>(f: F) -> HandlerFn<F>
where
    F: Fn(Request) -> Fut,
    Fut: Future<Output = Result<Response, Err>>,
    Err: Into<BoxError>,
{
    HandlerFn { f }
}
