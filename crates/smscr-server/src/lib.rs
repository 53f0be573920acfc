//! SmartScript HTTP server
//!
//! A small multi-threaded HTTP/1.1 server that serves static files, executes
//! `.smscr` templates and runs web workers, with cookie-based sessions.
//!
//! ```text
//! request → http (parse) → session → dispatch → worker | template | static file
//! ```

pub mod config;
pub mod dispatch;
pub mod http;
pub mod server;
pub mod session;
pub mod template_cache;
pub mod workers;

pub use config::{ConfigError, ServerConfig};
pub use dispatch::{DispatchError, Dispatcher, Router};
pub use server::{RunningServer, ServerError, ServerState, SmartHttpServer};
pub use session::{Session, SessionStore};
pub use template_cache::{TemplateCache, TemplateError};
pub use workers::{Worker, WorkerError, WorkerRegistry};
