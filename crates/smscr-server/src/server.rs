//! The HTTP server: accept loop, connection handling and session sweeping.

use std::collections::HashMap;
use std::io::{BufReader, BufWriter, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use scoped_thread_pool::{Pool, ThreadConfig};
use tracing::{debug, error, info, warn};

use smscr_exec::RequestContext;

use crate::config::{ConfigError, ServerConfig};
use crate::dispatch::{DispatchError, Router};
use crate::http::{self, HttpError, RequestLine};
use crate::session::{SessionStore, SESSION_COOKIE};
use crate::template_cache::TemplateCache;
use crate::workers::{Worker, WorkerError, WorkerRegistry};

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },

    #[error("Invalid document root {path}: {source}")]
    DocumentRoot {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Path {path} is mapped to unknown worker '{name}'")]
    UnknownWorker { path: String, name: String },

    #[error("Failed to create worker '{name}': {source}")]
    Worker { name: String, source: WorkerError },

    #[error("Session timeout of {0} seconds is out of range")]
    SessionTimeout(u64),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A worker bound to a fixed path by configuration.
struct MappedWorker {
    name: String,
    worker: Box<dyn Worker>,
}

/// State shared by all connection handlers.
pub struct ServerState {
    pub(crate) config: ServerConfig,
    /// Canonical document root.
    pub(crate) document_root: PathBuf,
    pub(crate) sessions: SessionStore,
    pub(crate) templates: TemplateCache,
    pub(crate) registry: WorkerRegistry,
    mapped_workers: HashMap<String, MappedWorker>,
}

impl ServerState {
    pub fn new(config: ServerConfig, registry: WorkerRegistry) -> Result<Self, ServerError> {
        config.validate()?;
        let document_root = config
            .document_root
            .canonicalize()
            .map_err(|source| ServerError::DocumentRoot {
                path: config.document_root.clone(),
                source,
            })?;

        let mut mapped_workers = HashMap::new();
        for (path, name) in &config.workers {
            let worker = registry
                .create(name)
                .ok_or_else(|| ServerError::UnknownWorker {
                    path: path.clone(),
                    name: name.clone(),
                })?
                .map_err(|source| ServerError::Worker {
                    name: name.clone(),
                    source,
                })?;
            debug!(path, worker = %name, "mapped worker");
            mapped_workers.insert(
                path.clone(),
                MappedWorker {
                    name: name.clone(),
                    worker,
                },
            );
        }

        let timeout = chrono::Duration::from_std(Duration::from_secs(config.session_timeout_secs))
            .map_err(|_| ServerError::SessionTimeout(config.session_timeout_secs))?;
        Ok(Self {
            document_root,
            sessions: SessionStore::new(timeout),
            templates: TemplateCache::new(),
            registry,
            mapped_workers,
            config,
        })
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub(crate) fn mapped_worker(&self, path: &str) -> Option<(&str, &dyn Worker)> {
        self.mapped_workers
            .get(path)
            .map(|mapped| (mapped.name.as_str(), mapped.worker.as_ref()))
    }
}

/// A configured server that has not been started yet.
pub struct SmartHttpServer {
    state: Arc<ServerState>,
}

impl SmartHttpServer {
    pub fn new(config: ServerConfig) -> Result<Self, ServerError> {
        Self::with_registry(config, WorkerRegistry::builtin())
    }

    pub fn with_registry(config: ServerConfig, registry: WorkerRegistry) -> Result<Self, ServerError> {
        Ok(Self {
            state: Arc::new(ServerState::new(config, registry)?),
        })
    }

    /// Bind the listener and start the accept loop and the session sweeper.
    pub fn start(self) -> Result<RunningServer, ServerError> {
        let address = self.state.config.bind_address();
        let listener = TcpListener::bind(&address).map_err(|source| ServerError::Bind {
            address: address.clone(),
            source,
        })?;
        let local_addr = listener.local_addr()?;
        let running = Arc::new(AtomicBool::new(true));

        let accept_thread = thread::Builder::new().name("smscr-accept".into()).spawn({
            let state = Arc::clone(&self.state);
            let running = Arc::clone(&running);
            move || accept_loop(&state, listener, &running)
        })?;

        let (stop_sweeper, stop_signal) = mpsc::channel::<()>();
        let sweeper_thread = thread::Builder::new().name("smscr-sweeper".into()).spawn({
            let state = Arc::clone(&self.state);
            let interval = Duration::from_secs(self.state.config.session_sweep_interval_secs.max(1));
            move || loop {
                match stop_signal.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        state.sessions.sweep();
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        })?;

        info!(%local_addr, root = %self.state.document_root.display(), "server started");
        Ok(RunningServer {
            local_addr,
            state: self.state,
            running,
            stop_sweeper,
            accept_thread,
            sweeper_thread,
        })
    }
}

/// Handle to a server that is accepting connections.
pub struct RunningServer {
    local_addr: SocketAddr,
    state: Arc<ServerState>,
    running: Arc<AtomicBool>,
    stop_sweeper: Sender<()>,
    accept_thread: JoinHandle<()>,
    sweeper_thread: JoinHandle<()>,
}

impl RunningServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn state(&self) -> &ServerState {
        &self.state
    }

    /// Stop accepting, stop the sweeper and wait for in-flight requests.
    pub fn stop(self) {
        self.running.store(false, Ordering::SeqCst);
        // Wake the accept loop so it notices the flag.
        if let Err(err) = TcpStream::connect(self.local_addr) {
            warn!(%err, "failed to wake accept loop");
        }
        let _ = self.stop_sweeper.send(());
        if self.accept_thread.join().is_err() {
            error!("accept thread panicked");
        }
        if self.sweeper_thread.join().is_err() {
            error!("sweeper thread panicked");
        }
        info!(local_addr = %self.local_addr, "server stopped");
    }

    /// Block until the accept loop exits.
    pub fn wait(self) {
        if self.accept_thread.join().is_err() {
            error!("accept thread panicked");
        }
        let _ = self.stop_sweeper.send(());
        let _ = self.sweeper_thread.join();
    }
}

fn accept_loop(state: &ServerState, listener: TcpListener, running: &AtomicBool) {
    let pool = Pool::with_thread_config(state.config.worker_threads, ThreadConfig::new().prefix("smscr-worker"));
    pool.scoped(|scope| {
        for stream in listener.incoming() {
            if !running.load(Ordering::SeqCst) {
                break;
            }
            match stream {
                Ok(stream) => scope.execute(move || handle_connection(state, stream)),
                Err(err) => warn!(%err, "failed to accept connection"),
            }
        }
    });
    pool.shutdown();
}

fn handle_connection(state: &ServerState, stream: TcpStream) {
    let peer = stream.peer_addr().ok();
    debug!(?peer, "accepted connection");
    if let Err(err) = serve_client(state, &stream) {
        warn!(?peer, %err, "request failed");
    }
}

#[derive(Debug, thiserror::Error)]
enum ConnectionError {
    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn serve_client(state: &ServerState, stream: &TcpStream) -> Result<(), ConnectionError> {
    let timeout = state.config.read_timeout_secs;
    stream.set_read_timeout((timeout > 0).then(|| Duration::from_secs(timeout)))?;

    let mut reader = BufReader::new(stream);
    let mut writer = BufWriter::new(stream);

    let header = match http::read_request_header(&mut reader) {
        Ok(Some(header)) => header,
        Ok(None) => return Ok(()),
        Err(err @ (HttpError::HeaderTooLarge | HttpError::BadRequest(_))) => {
            send_error(&mut writer, 400, "Bad Request", &err.to_string())?;
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };

    let text = String::from_utf8_lossy(&header);
    let headers = http::split_headers(&text);
    let request = match headers.first().map(|line| RequestLine::parse(line)) {
        Some(Ok(request)) => request,
        Some(Err(err)) => return bad_request(&mut writer, &err),
        None => return bad_request(&mut writer, &HttpError::BadRequest("empty request".into())),
    };
    if let Err(err) = request.validate() {
        return bad_request(&mut writer, &err);
    }
    info!(method = %request.method, target = %request.target, "request");

    let host = http::host(&headers).unwrap_or_else(|| state.config.domain_name.clone());
    let sid = http::cookie(&headers, SESSION_COOKIE);
    let session = state.sessions.resolve(sid.as_deref(), &host);

    let (path, query) = request.path_and_query();
    let (params, rejected) = match http::parse_query(query.unwrap_or("")) {
        Ok(params) => (params, None),
        Err(err) => (HashMap::new(), Some(err)),
    };

    let cookies = session.cookie.into_iter().collect();
    let mut context =
        RequestContext::new(&mut writer, params, session.parameters, cookies).with_session_id(session.id);
    if let Some(err) = rejected {
        // The cookie of a freshly created session goes out with the 400.
        debug!(%err, "rejecting request");
        write_error(&mut context, 400, "Bad Request", &err.to_string())?;
    } else if let Err(err) = Router::new(state).route(path, &mut context, true) {
        report_dispatch_error(&mut context, path, &err)?;
    }
    debug!(
        sid = ?context.session_id(),
        status = context.status_code(),
        mime = context.mime_type(),
        "response"
    );
    context.flush()?;
    Ok(())
}

fn bad_request(writer: &mut impl Write, err: &HttpError) -> Result<(), ConnectionError> {
    debug!(%err, "rejecting request");
    send_error(writer, 400, "Bad Request", &err.to_string())?;
    Ok(())
}

fn report_dispatch_error(
    context: &mut RequestContext<'_>,
    path: &str,
    err: &DispatchError,
) -> std::io::Result<()> {
    let (status, reason) = err.status();
    if status >= 500 {
        error!(path, %err, "request failed");
    } else {
        debug!(path, status, %err, "request rejected");
    }
    if context.header_generated() {
        // Part of the body is already out; nothing sensible to add.
        return Ok(());
    }
    context.set_status_code(status);
    context.set_status_text(reason);
    context.set_mime_type("text/plain");
    context.set_content_length(None);
    context.write_str(&format!("{status} {reason}\n"))
}

/// Send a complete plain-text error response outside of any session.
fn send_error(writer: &mut impl Write, status: u16, reason: &str, detail: &str) -> std::io::Result<()> {
    let mut context = RequestContext::standalone(&mut *writer);
    write_error(&mut context, status, reason, detail)?;
    context.flush()
}

fn write_error(context: &mut RequestContext<'_>, status: u16, reason: &str, detail: &str) -> std::io::Result<()> {
    context.set_status_code(status);
    context.set_status_text(reason);
    context.set_mime_type("text/plain");
    context.set_content_length(None);
    context.write_str(&format!("{status} {reason}: {detail}\n"))
}
