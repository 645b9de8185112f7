//! Scheme registry.
//!
//! A [`StreamRegistry`] maps URL schemes to wrappers so callers can resolve any
//! `<scheme>://bucket/key` URL to the wrapper serving it. Registries are plain values;
//! the process-wide one is reachable only through [`register_global`],
//! [`unregister_global`] and [`global`].

use std::io;
use std::sync::{Arc, LazyLock};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::info;

use crate::error::{FsError, report};
use crate::url::{ObjectUrl, is_valid_scheme};
use crate::wrapper::StreamWrapper;

static GLOBAL: LazyLock<StreamRegistry> = LazyLock::new(StreamRegistry::new);

/// Maps schemes to stream wrappers.
#[derive(Debug, Default)]
pub struct StreamRegistry {
    wrappers: DashMap<String, Arc<StreamWrapper>>,
}

impl StreamRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `wrapper` for `scheme`.
    ///
    /// # Errors
    ///
    /// Returns [`FsError::InvalidUrl`] for a malformed scheme and
    /// [`FsError::SchemeTaken`] when the scheme is already registered.
    pub fn register(&self, scheme: &str, wrapper: Arc<StreamWrapper>) -> Result<(), FsError> {
        if !is_valid_scheme(scheme) {
            return Err(FsError::InvalidUrl(format!("invalid scheme: {scheme}")));
        }
        match self.wrappers.entry(scheme.to_ascii_lowercase()) {
            Entry::Occupied(_) => Err(FsError::SchemeTaken(scheme.to_owned())),
            Entry::Vacant(slot) => {
                slot.insert(wrapper);
                info!(scheme, "registered stream wrapper");
                Ok(())
            }
        }
    }

    /// Remove the wrapper of `scheme`, returning it.
    pub fn unregister(&self, scheme: &str) -> Option<Arc<StreamWrapper>> {
        let removed = self
            .wrappers
            .remove(&scheme.to_ascii_lowercase())
            .map(|(_, wrapper)| wrapper);
        if removed.is_some() {
            info!(scheme, "unregistered stream wrapper");
        }
        removed
    }

    /// The wrapper of `scheme`.
    #[must_use]
    pub fn get(&self, scheme: &str) -> Option<Arc<StreamWrapper>> {
        self.wrappers
            .get(&scheme.to_ascii_lowercase())
            .map(|w| w.value().clone())
    }

    /// Registered schemes, sorted.
    #[must_use]
    pub fn schemes(&self) -> Vec<String> {
        let mut schemes: Vec<String> = self.wrappers.iter().map(|e| e.key().clone()).collect();
        schemes.sort();
        schemes
    }

    /// Resolve a URL to its wrapper.
    pub fn resolve(&self, url: &str) -> io::Result<(Arc<StreamWrapper>, ObjectUrl)> {
        let resolved = ObjectUrl::parse(url).and_then(|parsed| {
            let wrapper = self
                .get(parsed.scheme())
                .ok_or_else(|| FsError::NotFound(format!("no wrapper registered for {url}")))?;
            Ok((wrapper, parsed))
        });
        resolved.map_err(|err| report("resolve", url, err))
    }
}

/// Register `wrapper` for `scheme` in the process-wide registry.
///
/// # Errors
///
/// See [`StreamRegistry::register`].
pub fn register_global(scheme: &str, wrapper: Arc<StreamWrapper>) -> Result<(), FsError> {
    GLOBAL.register(scheme, wrapper)
}

/// Remove `scheme` from the process-wide registry.
pub fn unregister_global(scheme: &str) -> Option<Arc<StreamWrapper>> {
    GLOBAL.unregister(scheme)
}

/// The process-wide registry.
#[must_use]
pub fn global() -> &'static StreamRegistry {
    &GLOBAL
}
