//! A fully layered manifest document and its application list.

use std::path::PathBuf;

use tracing::debug;

use bgd_core::{AppSpec, PlatformDomains};

use crate::app::{app_entries, app_spec};
use crate::error::{ManifestError, ManifestResult};
use crate::expand::expand_properties;
use crate::node::Mapping;
use crate::reader::parse_document;

/// A manifest with every `inherit` layer already merged in.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    /// File the manifest was read from, if any.
    pub path: Option<PathBuf>,
    pub data: Mapping,
}

impl Manifest {
    pub fn new(data: Mapping) -> Self {
        Self { path: None, data }
    }

    /// Parse a single in-memory YAML document (no inheritance).
    pub fn from_yaml(yaml: &str) -> ManifestResult<Self> {
        Ok(Self::new(parse_document(yaml)?))
    }

    /// Resolve every application in the manifest.
    ///
    /// Property expansion runs first; then each entry is merged with the
    /// global properties and validated. All problems across all entries are
    /// reported together.
    pub fn applications(&self, domains: &PlatformDomains) -> ManifestResult<Vec<AppSpec>> {
        let data = expand_properties(&self.data).map_err(ManifestError::Validation)?;
        let entries = app_entries(&data).map_err(ManifestError::Validation)?;

        let mut apps = Vec::with_capacity(entries.len());
        let mut errors = Vec::new();
        for entry in &entries {
            match app_spec(entry, domains) {
                Ok(app) => apps.push(app),
                Err(entry_errors) => errors.extend(entry_errors),
            }
        }

        if !errors.is_empty() {
            return Err(ManifestError::Validation(errors));
        }
        debug!(count = apps.len(), "resolved manifest applications");
        Ok(apps)
    }

    /// The first application that is named `app_name` or has no name.
    ///
    /// Entries without any routes are still selected so their scale applies.
    pub fn app_params(
        &self,
        app_name: &str,
        domains: &PlatformDomains,
    ) -> ManifestResult<Option<AppSpec>> {
        Ok(self
            .applications(domains)?
            .into_iter()
            .find(|app| app.applies_to(app_name)))
    }
}

/// Anything that can produce the manifest for a deploy.
pub trait ManifestSource: Send + Sync {
    /// `Ok(None)` when no manifest exists at the implicit default location.
    fn load(&self) -> ManifestResult<Option<Manifest>>;
}

impl ManifestSource for Manifest {
    fn load(&self) -> ManifestResult<Option<Manifest>> {
        Ok(Some(self.clone()))
    }
}

impl<T: ManifestSource> ManifestSource for Option<T> {
    fn load(&self) -> ManifestResult<Option<Manifest>> {
        match self {
            Some(source) => source.load(),
            None => Ok(None),
        }
    }
}
