use std::io;
use std::net::{SocketAddr, TcpListener as StdTcpListener, ToSocketAddrs};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use shuttle_http::handler::LocalHandler;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::TcpListener;
use tokio::runtime::Runtime;
use tokio::select;
use tokio::task::LocalSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::event_loop::{self, EventLoopGroup};
use crate::{ServerConfig, ServerError};

/// Binds `addr` and serves connections with `handler` until shut down.
///
/// The configuration is validated before any socket is created.
pub fn serve<A, H>(addr: A, config: ServerConfig, handler: Arc<H>) -> Result<(), ServerError>
where
    A: ToSocketAddrs,
    H: LocalHandler + Send + Sync + 'static,
{
    Server::bind(addr, config, handler)?.wait();
    Ok(())
}

/// A running server.
///
/// Acceptor threads accept connections on a shared listening socket. With
/// `workers` configured, accepted connections are dispatched round-robin to
/// the worker event loops, otherwise every acceptor processes the
/// connections it accepted.
#[derive(Debug)]
pub struct Server {
    local_addr: SocketAddr,
    shutdown: ShutdownHandle,
    threads: Vec<JoinHandle<()>>,
}

/// Stops a [`Server`] from any thread.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    token: CancellationToken,
}

impl ShutdownHandle {
    /// Closes the listening socket and stops every event loop. Connections
    /// still open are dropped.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Server {
    pub fn bind<A, H>(addr: A, config: ServerConfig, handler: Arc<H>) -> Result<Self, ServerError>
    where
        A: ToSocketAddrs,
        H: LocalHandler + Send + Sync + 'static,
    {
        config.validate()?;
        if config.connect_timeout.is_some() {
            warn!("connect_timeout has no effect on accepted connections");
        }

        let listener = listen(addr, &config)?;
        let local_addr = listener.local_addr()?;
        info!(%local_addr, transport = %config.transport(), "start listening");

        let token = CancellationToken::new();
        let mut threads = Vec::with_capacity(config.acceptor_threads + config.workers.unwrap_or(0));

        let workers = match config.workers {
            Some(size) => match EventLoopGroup::start(size, &handler, config.read_timeout, &token, &mut threads) {
                Ok(group) => Some(Arc::new(group)),
                Err(e) => {
                    token.cancel();
                    return Err(e.into());
                }
            },
            None => None,
        };

        spawn_threads(config.acceptor_threads, &token, &mut threads, |index| {
            let listener = listener.try_clone()?;
            let runtime = event_loop::runtime()?;
            let acceptor = Acceptor {
                config: config.clone(),
                handler: Arc::clone(&handler),
                workers: workers.clone(),
                shutdown: token.clone(),
            };

            let thread = thread::Builder::new()
                .name(format!("shuttle/acceptor-{index}"))
                .spawn(move || acceptor.run(&runtime, listener))?;
            Ok(thread)
        })?;

        Ok(Self { local_addr, shutdown: ShutdownHandle { token }, threads })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Blocks until every acceptor and worker thread has stopped.
    pub fn wait(self) {
        for thread in self.threads {
            let name = thread.thread().name().unwrap_or_default().to_string();
            if thread.join().is_err() {
                error!(thread = %name, "event loop thread panicked");
            }
        }
        info!(local_addr = %self.local_addr, "server stopped");
    }
}

/// Starts `count` threads with `spawn`. When one fails to start, the threads
/// already running are cancelled through `shutdown` before the error returns.
fn spawn_threads<F>(count: usize, shutdown: &CancellationToken, threads: &mut Vec<JoinHandle<()>>, mut spawn: F) -> Result<(), ServerError>
where
    F: FnMut(usize) -> Result<JoinHandle<()>, ServerError>,
{
    for index in 0..count {
        match spawn(index) {
            Ok(thread) => threads.push(thread),
            Err(e) => {
                warn!(index, cause = %e, "failed to start event loop thread, stopping the others");
                shutdown.cancel();
                return Err(e);
            }
        }
    }
    Ok(())
}

fn listen<A: ToSocketAddrs>(addr: A, config: &ServerConfig) -> Result<StdTcpListener, ServerError> {
    let addrs = addr.to_socket_addrs().map_err(|e| ServerError::bind(None, e))?;

    let mut last_error = None;
    for addr in addrs {
        match bind_socket(addr, config) {
            Ok(listener) => return Ok(listener),
            Err(e) => {
                warn!(%addr, cause = %e, "bind failed");
                last_error = Some(ServerError::bind(Some(addr), e));
            }
        }
    }

    Err(last_error.unwrap_or_else(|| {
        ServerError::bind(None, io::Error::new(io::ErrorKind::InvalidInput, "address resolved to nothing"))
    }))
}

fn bind_socket(addr: SocketAddr, config: &ServerConfig) -> io::Result<StdTcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    if let Some(reuse_address) = config.reuse_address {
        socket.set_reuse_address(reuse_address)?;
    }
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(i32::try_from(config.backlog).unwrap_or(i32::MAX))?;
    Ok(socket.into())
}

struct Acceptor<H> {
    config: ServerConfig,
    handler: Arc<H>,
    workers: Option<Arc<EventLoopGroup>>,
    shutdown: CancellationToken,
}

impl<H> Acceptor<H>
where
    H: LocalHandler + 'static,
{
    fn run(self, runtime: &Runtime, listener: StdTcpListener) {
        let local = LocalSet::new();
        local.block_on(runtime, async move {
            let listener = match TcpListener::from_std(listener) {
                Ok(listener) => listener,
                Err(e) => {
                    error!(cause = %e, "failed to register listener");
                    return;
                }
            };

            loop {
                let (stream, _remote_addr) = select! {
                    () = self.shutdown.cancelled() => break,
                    accepted = listener.accept() => match accepted {
                        Ok(stream_and_addr) => stream_and_addr,
                        Err(e) => {
                            warn!(cause = %e, "failed to accept");
                            continue;
                        }
                    },
                };

                if let Err(e) = event_loop::configure_stream(&stream, &self.config) {
                    warn!(cause = %e, "failed to apply socket options");
                }

                match &self.workers {
                    Some(workers) => match stream.into_std() {
                        Ok(stream) => workers.dispatch(stream),
                        Err(e) => warn!(cause = %e, "failed to hand over connection"),
                    },
                    None => {
                        let handler = Arc::clone(&self.handler);
                        tokio::task::spawn_local(event_loop::serve_connection(stream, handler, self.config.read_timeout));
                    }
                }
            }
        });
        info!("acceptor stopped");
    }
}
