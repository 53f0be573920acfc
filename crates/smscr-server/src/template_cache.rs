//! Parsed-template cache keyed by file path.
//!
//! Entries are re-parsed when the file's modification time changes.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::RwLock;
use tracing::debug;

use smscr_parser::{DocumentNode, ParseError, Parser};

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("Failed to read template {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse template {path}: {source}")]
    Parse { path: PathBuf, source: ParseError },
}

struct CachedTemplate {
    modified: Option<SystemTime>,
    document: Arc<DocumentNode>,
}

#[derive(Default)]
pub struct TemplateCache {
    entries: RwLock<HashMap<PathBuf, CachedTemplate>>,
}

impl TemplateCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&self, path: &Path) -> Result<Arc<DocumentNode>, TemplateError> {
        let io_error = |source| TemplateError::Io {
            path: path.to_path_buf(),
            source,
        };
        let modified = fs::metadata(path).map_err(io_error)?.modified().ok();

        if let Some(cached) = self.entries.read().get(path) {
            if modified.is_some() && cached.modified == modified {
                return Ok(Arc::clone(&cached.document));
            }
        }

        let source = fs::read_to_string(path).map_err(io_error)?;
        let document = Arc::new(Parser::parse(&source).map_err(|source| TemplateError::Parse {
            path: path.to_path_buf(),
            source,
        })?);
        debug!(path = %path.display(), "parsed template");

        self.entries.write().insert(
            path.to_path_buf(),
            CachedTemplate {
                modified,
                document: Arc::clone(&document),
            },
        );
        Ok(document)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
