//! Web workers: request handlers implemented in Rust.
//!
//! Workers are looked up by name in a [`WorkerRegistry`]. Every registered
//! worker is reachable as `/ext/<Name>`; the configuration may additionally map
//! fixed paths to workers.

mod bg_color;
mod circle;
mod echo_params;
mod hello;
mod home;
mod sum;

use std::collections::BTreeMap;

use smscr_exec::RequestContext;

use crate::dispatch::{DispatchError, Dispatcher};

pub use bg_color::BgColorWorker;
pub use circle::CircleWorker;
pub use echo_params::EchoParams;
pub use hello::HelloWorker;
pub use home::Home;
pub use sum::SumWorker;

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Redispatch failed: {0}")]
    Dispatch(#[from] Box<DispatchError>),

    #[error("{0}")]
    Failed(String),
}

impl From<DispatchError> for WorkerError {
    fn from(err: DispatchError) -> Self {
        WorkerError::Dispatch(Box::new(err))
    }
}

/// A request handler.
pub trait Worker: Send + Sync {
    fn process_request(
        &self,
        context: &mut RequestContext<'_>,
        dispatcher: &dyn Dispatcher,
    ) -> Result<(), WorkerError>;
}

/// Builds a fresh worker instance.
pub type WorkerConstructor = fn() -> Result<Box<dyn Worker>, WorkerError>;

/// Name to constructor table.
#[derive(Clone)]
pub struct WorkerRegistry {
    constructors: BTreeMap<&'static str, WorkerConstructor>,
}

impl WorkerRegistry {
    pub fn empty() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    /// Registry with every worker shipped with the server.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register("HelloWorker", || Ok(Box::new(HelloWorker)));
        registry.register("EchoParams", || Ok(Box::new(EchoParams)));
        registry.register("SumWorker", || Ok(Box::new(SumWorker)));
        registry.register("BgColorWorker", || Ok(Box::new(BgColorWorker)));
        registry.register("Home", || Ok(Box::new(Home)));
        registry.register("CircleWorker", || Ok(Box::new(CircleWorker)));
        registry
    }

    pub fn register(&mut self, name: &'static str, constructor: WorkerConstructor) {
        self.constructors.insert(name, constructor);
    }

    /// Instantiate worker `name`; `None` if no such worker is registered.
    pub fn create(&self, name: &str) -> Option<Result<Box<dyn Worker>, WorkerError>> {
        self.constructors.get(name).map(|constructor| constructor())
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.constructors.keys().copied()
    }
}

impl Default for WorkerRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Escape text for inclusion in HTML.
pub(crate) fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
