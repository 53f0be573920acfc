//! Request routing: private paths, workers, templates and static files.

use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use smscr_exec::{execute, ExecError, RequestContext};

use crate::server::ServerState;
use crate::template_cache::TemplateError;
use crate::workers::{Worker, WorkerError};

/// Prefix reserved for internal pages; only reachable through redispatch.
pub const PRIVATE_PREFIX: &str = "/private";

/// Prefix under which every registered worker is reachable by name.
pub const WORKER_PREFIX: &str = "/ext/";

/// Extension of files executed as templates.
pub const TEMPLATE_EXTENSION: &str = "smscr";

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("Template execution failed: {0}")]
    Exec(#[from] ExecError),

    #[error("Worker '{name}' failed: {source}")]
    Worker { name: String, source: WorkerError },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DispatchError {
    /// HTTP status code and reason phrase for this error.
    pub fn status(&self) -> (u16, &'static str) {
        match self {
            DispatchError::NotFound(_) => (404, "Not Found"),
            DispatchError::Forbidden(_) => (403, "Forbidden"),
            DispatchError::Worker {
                source: WorkerError::Dispatch(inner),
                ..
            } => inner.status(),
            _ => (500, "Internal Server Error"),
        }
    }
}

/// Entry point for dispatching a request path into a context.
///
/// Workers receive a dispatcher so they can hand rendering over to another
/// path, including paths under the private prefix.
pub trait Dispatcher {
    fn dispatch_request(&self, path: &str, context: &mut RequestContext<'_>) -> Result<(), DispatchError>;
}

/// Routes paths against the shared server state.
pub struct Router<'s> {
    state: &'s ServerState,
}

impl<'s> Router<'s> {
    pub fn new(state: &'s ServerState) -> Self {
        Self { state }
    }

    /// Route `path`. Direct requests from clients may not reach private paths.
    pub fn route(&self, path: &str, context: &mut RequestContext<'_>, direct: bool) -> Result<(), DispatchError> {
        if direct && is_private(path) {
            return Err(DispatchError::NotFound(path.to_string()));
        }

        if let Some(name) = path.strip_prefix(WORKER_PREFIX) {
            let worker = self
                .state
                .registry
                .create(name)
                .ok_or_else(|| DispatchError::NotFound(path.to_string()))?
                .map_err(|source| DispatchError::Worker {
                    name: name.to_string(),
                    source,
                })?;
            debug!(path, worker = name, "routing to worker");
            return self.run_worker(name, worker.as_ref(), context);
        }

        if let Some((name, worker)) = self.state.mapped_worker(path) {
            debug!(path, worker = name, "routing to mapped worker");
            return self.run_worker(name, worker, context);
        }

        let file = self.resolve_file(path)?;
        let is_template = file
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(TEMPLATE_EXTENSION));
        if is_template {
            debug!(path, "routing to template");
            let document = self.state.templates.load(&file)?;
            execute(&document, context)?;
        } else {
            debug!(path, "routing to static file");
            self.serve_file(&file, context)?;
        }
        Ok(())
    }

    fn run_worker(&self, name: &str, worker: &dyn Worker, context: &mut RequestContext<'_>) -> Result<(), DispatchError> {
        worker
            .process_request(context, self)
            .map_err(|source| DispatchError::Worker {
                name: name.to_string(),
                source,
            })
    }

    /// Map a request path to an existing file under the document root.
    fn resolve_file(&self, path: &str) -> Result<PathBuf, DispatchError> {
        let root = &self.state.document_root;
        let relative = normalize(path).ok_or_else(|| DispatchError::Forbidden(path.to_string()))?;
        let candidate = root.join(relative);

        let Ok(canonical) = candidate.canonicalize() else {
            return Err(DispatchError::NotFound(path.to_string()));
        };
        if !canonical.starts_with(root) {
            return Err(DispatchError::Forbidden(path.to_string()));
        }
        if !canonical.is_file() {
            return Err(DispatchError::NotFound(path.to_string()));
        }
        Ok(canonical)
    }

    fn serve_file(&self, file: &Path, context: &mut RequestContext<'_>) -> Result<(), DispatchError> {
        let content = fs::read(file)?;
        let extension = file.extension().and_then(|ext| ext.to_str()).unwrap_or("");
        context.set_mime_type(self.state.config.mime_type(extension));
        context.set_status_code(200);
        context.set_status_text("OK");
        context.set_content_length(Some(content.len() as u64));
        context.write(&content)?;
        Ok(())
    }
}

impl Dispatcher for Router<'_> {
    fn dispatch_request(&self, path: &str, context: &mut RequestContext<'_>) -> Result<(), DispatchError> {
        self.route(path, context, false)
    }
}

fn is_private(path: &str) -> bool {
    normalize(path).is_some_and(|relative| relative.starts_with(PRIVATE_PREFIX.trim_start_matches('/')))
}

/// Lexically normalize a request path into a relative path.
///
/// Returns `None` if `..` segments climb above the root.
fn normalize(path: &str) -> Option<PathBuf> {
    let mut normalized = PathBuf::new();
    for component in Path::new(path.trim_start_matches('/')).components() {
        match component {
            Component::Normal(segment) => normalized.push(segment),
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    return None;
                }
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("/index.html"), Some(PathBuf::from("index.html")));
        assert_eq!(normalize("/a/./b/../c.txt"), Some(PathBuf::from("a/c.txt")));
        assert_eq!(normalize("/"), Some(PathBuf::new()));
        assert_eq!(normalize("/../../etc/passwd"), None);
        assert_eq!(normalize("/a/../../b"), None);
    }

    #[test]
    fn test_is_private() {
        assert!(is_private("/private"));
        assert!(is_private("/private/pages/home.smscr"));
        assert!(!is_private("/privateer.html"));
        assert!(!is_private("/ext/private"));
        assert!(is_private("/pages/../private/pages/calc.smscr"));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(DispatchError::NotFound("/x".into()).status(), (404, "Not Found"));
        assert_eq!(DispatchError::Forbidden("/x".into()).status(), (403, "Forbidden"));
        let nested = DispatchError::Worker {
            name: "SumWorker".into(),
            source: WorkerError::Dispatch(Box::new(DispatchError::NotFound("/private/x".into()))),
        };
        assert_eq!(nested.status(), (404, "Not Found"));
        let failed = DispatchError::Worker {
            name: "Home".into(),
            source: WorkerError::Failed("boom".into()),
        };
        assert_eq!(failed.status().0, 500);
    }
}
