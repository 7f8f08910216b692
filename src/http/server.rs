//! Listening socket lifecycle and the accept loop.
//!
//! One dedicated thread accepts connections; every accepted connection is
//! served to completion on its own detached thread. Shutdown is
//! best-effort: `stop` joins the accept thread only, in-flight connection
//! threads finish (or time out) on their own.

use super::connection;
use super::router::Router;
use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// How often the accept loop re-checks the running flag while idle. Bounds
/// the latency of `stop` observing the shutdown request.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("server is already running")]
    AlreadyRunning,
    #[error("bind {addr} failed: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },
    #[error("set_nonblocking failed: {0}")]
    SetNonblocking(std::io::Error),
    #[error("local_addr failed: {0}")]
    LocalAddr(std::io::Error),
    #[error("spawn accept thread failed: {0}")]
    Spawn(std::io::Error),
}

#[derive(Default)]
pub struct HttpServer {
    running: Arc<AtomicBool>,
    accept_thread: Option<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
}

impl HttpServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `host:port` and begin accepting connections, dispatching them
    /// through `router`. Fails if already running; on any failure the
    /// partially created listener is released before returning.
    pub fn start(
        &mut self,
        host: &str,
        port: u16,
        router: Arc<Router>,
    ) -> Result<(), ServerError> {
        if self.is_running() {
            return Err(ServerError::AlreadyRunning);
        }

        let addr = format!("{host}:{port}");
        let listener = TcpListener::bind(&addr).map_err(|source| ServerError::Bind {
            addr: addr.clone(),
            source,
        })?;
        // Non-blocking accept lets the loop poll the running flag instead
        // of parking in accept() where stop() could not reach it.
        listener
            .set_nonblocking(true)
            .map_err(ServerError::SetNonblocking)?;
        let local_addr = listener.local_addr().map_err(ServerError::LocalAddr)?;

        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let accept_thread = thread::Builder::new()
            .name("http-accept".to_string())
            .spawn(move || accept_loop(listener, running, router))
            .map_err(|err| {
                self.running.store(false, Ordering::SeqCst);
                ServerError::Spawn(err)
            })?;

        self.accept_thread = Some(accept_thread);
        self.local_addr = Some(local_addr);
        log::info!(target: "server", "listening on {local_addr}");
        Ok(())
    }

    /// Stop accepting connections and join the accept thread. No-op when
    /// not running; safe to call repeatedly. Does not wait for in-flight
    /// connection threads.
    pub fn stop(&mut self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = self.accept_thread.take() {
            if handle.join().is_err() {
                log::error!(target: "server", "accept thread panicked");
            }
        }
        self.local_addr = None;
        log::info!(target: "server", "server stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// The bound address while running. Binding port 0 yields the actual
    /// ephemeral port here.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }
}

impl Drop for HttpServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn accept_loop(listener: TcpListener, running: Arc<AtomicBool>, router: Arc<Router>) {
    while running.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, peer)) => {
                log::debug!(target: "server", "accepted connection from {peer}");
                let router = Arc::clone(&router);
                let spawned = thread::Builder::new()
                    .name("http-conn".to_string())
                    .spawn(move || connection::handle(stream, &router));
                if let Err(err) = spawned {
                    log::warn!(target: "server", "failed to spawn connection thread: {err}");
                }
            }
            Err(err) if err.kind() == ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_POLL_INTERVAL);
            }
            Err(err) => {
                // One bad accept must not kill the listener.
                if running.load(Ordering::SeqCst) {
                    log::warn!(target: "server", "accept failed: {err}");
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
            }
        }
    }
    // Listener drops here, releasing the port once stop() has joined us.
}
