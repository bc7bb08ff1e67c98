//! Event loops: single-threaded runtimes owning the connections they process.
//!
//! Every loop is a thread running a current-thread tokio runtime with a
//! [`LocalSet`]. A connection handed to a loop stays on that thread for its
//! whole lifetime, which lets handler futures stay `!Send`.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use shuttle_http::connection::HttpConnection;
use shuttle_http::handler::LocalHandler;
use socket2::SockRef;
use tokio::net::TcpStream;
use tokio::runtime::{Builder, Runtime};
use tokio::select;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::task::LocalSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::ServerConfig;

pub(crate) fn runtime() -> io::Result<Runtime> {
    Builder::new_current_thread().enable_all().build()
}

/// Worker loops receiving accepted connections round-robin.
#[derive(Debug)]
pub(crate) struct EventLoopGroup {
    senders: Vec<UnboundedSender<std::net::TcpStream>>,
    next: AtomicUsize,
}

impl EventLoopGroup {
    /// Starts `size` worker threads, their join handles are pushed to `threads`.
    pub(crate) fn start<H>(
        size: usize,
        handler: &Arc<H>,
        read_timeout: Duration,
        shutdown: &CancellationToken,
        threads: &mut Vec<JoinHandle<()>>,
    ) -> io::Result<Self>
    where
        H: LocalHandler + Send + Sync + 'static,
    {
        let mut senders = Vec::with_capacity(size);

        for index in 0..size {
            let (sender, receiver) = unbounded_channel();
            let runtime = runtime()?;
            let handler = Arc::clone(handler);
            let shutdown = shutdown.clone();

            let thread = thread::Builder::new()
                .name(format!("shuttle/worker-{index}"))
                .spawn(move || run_worker(&runtime, receiver, handler, read_timeout, &shutdown))?;

            senders.push(sender);
            threads.push(thread);
        }

        Ok(Self { senders, next: AtomicUsize::new(0) })
    }

    /// Hands `stream` to the next worker.
    pub(crate) fn dispatch(&self, stream: std::net::TcpStream) {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.senders.len();
        if self.senders[index].send(stream).is_err() {
            warn!(worker = index, "worker is gone, dropping connection");
        }
    }
}

fn run_worker<H>(
    runtime: &Runtime,
    mut receiver: UnboundedReceiver<std::net::TcpStream>,
    handler: Arc<H>,
    read_timeout: Duration,
    shutdown: &CancellationToken,
) where
    H: LocalHandler + 'static,
{
    let local = LocalSet::new();
    local.block_on(runtime, async move {
        loop {
            let stream = select! {
                () = shutdown.cancelled() => break,
                stream = receiver.recv() => match stream {
                    Some(stream) => stream,
                    None => break,
                },
            };

            let stream = match TcpStream::from_std(stream) {
                Ok(stream) => stream,
                Err(e) => {
                    warn!(cause = %e, "failed to register connection");
                    continue;
                }
            };

            tokio::task::spawn_local(serve_connection(stream, Arc::clone(&handler), read_timeout));
        }
    });
    info!("worker stopped");
}

/// Applies the per-connection socket options of `config`.
pub(crate) fn configure_stream(stream: &TcpStream, config: &ServerConfig) -> io::Result<()> {
    stream.set_nodelay(config.tcp_nodelay)?;

    let socket = SockRef::from(stream);
    if let Some(keep_alive) = config.keep_alive {
        socket.set_keepalive(keep_alive)?;
    }
    if let Some(size) = config.send_buffer_size {
        socket.set_send_buffer_size(size)?;
    }
    if let Some(size) = config.recv_buffer_size {
        socket.set_recv_buffer_size(size)?;
    }
    Ok(())
}

/// Runs the request lifecycle of one connection to its end.
pub(crate) async fn serve_connection<H>(stream: TcpStream, handler: Arc<H>, read_timeout: Duration)
where
    H: LocalHandler,
{
    let peer = stream.peer_addr().ok();
    let (reader, writer) = stream.into_split();

    match HttpConnection::new(reader, writer).read_timeout(read_timeout).process(handler).await {
        Ok(()) => debug!(?peer, "finished process, connection shutdown"),
        Err(e) if e.is_disconnect() => debug!(?peer, cause = %e, "connection closed"),
        Err(e) => error!(?peer, cause = %e, "service has error, connection shutdown"),
    }
}
