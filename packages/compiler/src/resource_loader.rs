//! Resource Loader
//!
//! Fetches external templates and style sheets. These fetches are the only
//! suspension points of the compiler.

use futures::future::{self, LocalBoxFuture};
use std::cell::RefCell;
use std::collections::HashMap;
use thiserror::Error;

/// Resource load error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ResourceError {
    pub url: String,
    pub message: String,
}

impl ResourceError {
    pub fn not_found(url: &str) -> Self {
        Self {
            url: url.to_string(),
            message: format!("Resource not found: {}", url),
        }
    }

    pub fn load_failed(url: &str, reason: &str) -> Self {
        Self {
            url: url.to_string(),
            message: format!("Failed to load {}: {}", url, reason),
        }
    }
}

/// Resource loader trait.
///
/// Implementations must reject, never hang, on missing resources.
pub trait ResourceLoader {
    fn get(&self, url: &str) -> LocalBoxFuture<'static, Result<String, ResourceError>>;
}

/// In-memory resource loader. Counts requests per URL.
#[derive(Default)]
pub struct InMemoryResourceLoader {
    resources: HashMap<String, String>,
    requests: RefCell<Vec<String>>,
}

impl InMemoryResourceLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, url: &str, content: &str) {
        self.resources.insert(url.to_string(), content.to_string());
    }

    pub fn with(mut self, url: &str, content: &str) -> Self {
        self.add(url, content);
        self
    }

    /// Every URL requested so far, in request order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }

    pub fn request_count(&self, url: &str) -> usize {
        self.requests.borrow().iter().filter(|u| *u == url).count()
    }
}

impl ResourceLoader for InMemoryResourceLoader {
    fn get(&self, url: &str) -> LocalBoxFuture<'static, Result<String, ResourceError>> {
        self.requests.borrow_mut().push(url.to_string());
        let result = self
            .resources
            .get(url)
            .cloned()
            .ok_or_else(|| ResourceError::not_found(url));
        Box::pin(future::ready(result))
    }
}

/// File-based resource loader rooted at a directory.
pub struct FileResourceLoader {
    root_dir: String,
}

impl FileResourceLoader {
    pub fn new(root_dir: impl Into<String>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }
}

impl ResourceLoader for FileResourceLoader {
    fn get(&self, url: &str) -> LocalBoxFuture<'static, Result<String, ResourceError>> {
        let path = std::path::Path::new(&self.root_dir).join(url.trim_start_matches('/'));
        let result =
            std::fs::read_to_string(&path).map_err(|e| ResourceError::load_failed(url, &e.to_string()));
        Box::pin(future::ready(result))
    }
}
