use std::sync::Arc;

use shuttle::ServerConfig;
use shuttle_http::handler::make_handler;
use shuttle_http::protocol::{BoxError, Request, Response};
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

async fn hello_world(request: Request) -> Result<Response, BoxError> {
    info!(method = %request.method(), path = request.path(), "receive request");

    let body = request.into_body().collect().await?;
    if !body.is_empty() {
        info!(size = body.len(), "receive request body");
    }

    Ok(Response::text("Hello World"))
}

fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let config = ServerConfig { workers: Some(4), ..Default::default() };
    if let Err(e) = shuttle::serve("127.0.0.1:8080", config, Arc::new(make_handler(hello_world))) {
        error!(cause = %e, "server stopped with error");
    }
}
