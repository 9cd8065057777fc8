//! Manifest file discovery, parsing, and `inherit` layering.

use std::fs;
use std::path::{Path, PathBuf};

use serde_yaml::Value;
use tracing::debug;

use crate::error::{ManifestError, ManifestResult};
use crate::manifest::{Manifest, ManifestSource};
use crate::merge::deep_merge;
use crate::node::{ManifestNode, Mapping};

/// Names looked up, in order, when a directory is given.
pub const MANIFEST_FILE_NAMES: [&str; 2] = ["manifest.yml", "manifest.yaml"];

const INHERIT: &str = "inherit";

/// Reads a manifest from disk.
#[derive(Debug, Clone, Default)]
pub struct ManifestReader {
    /// File or directory. `None` means the current directory.
    pub path: Option<PathBuf>,
}

impl ManifestReader {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    /// Read the manifest, following `inherit` chains.
    pub fn read(&self) -> ManifestResult<Manifest> {
        let input = self.path.clone().unwrap_or_else(|| PathBuf::from("./"));
        let path = locate(&input)?;
        let data = read_layered(&path, &mut Vec::new())?;
        debug!(path = %path.display(), "manifest read");
        Ok(Manifest {
            path: Some(path),
            data,
        })
    }
}

impl ManifestSource for ManifestReader {
    fn load(&self) -> ManifestResult<Option<Manifest>> {
        if self.path.is_none() && locate(Path::new("./")).is_err() {
            debug!("no manifest in working directory");
            return Ok(None);
        }
        self.read().map(Some)
    }
}

/// Resolve a user-supplied path to a manifest file.
///
/// A directory is searched for `manifest.yml`, then `manifest.yaml`; any
/// other path is taken as the manifest file itself.
pub fn locate(input: &Path) -> ManifestResult<PathBuf> {
    let meta = fs::metadata(input)
        .map_err(|e| ManifestError::Read(format!("{}: {e}", input.display())))?;
    if !meta.is_dir() {
        return Ok(input.to_path_buf());
    }
    MANIFEST_FILE_NAMES
        .iter()
        .map(|name| input.join(name))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| {
            ManifestError::Read(format!(
                "no manifest.yml or manifest.yaml found in {}",
                input.display()
            ))
        })
}

/// Read `path` and every layer it inherits from; the child wins on conflict.
fn read_layered(path: &Path, chain: &mut Vec<PathBuf>) -> ManifestResult<Mapping> {
    let identity = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    if chain.contains(&identity) {
        return Err(ManifestError::validation(format!(
            "manifest inherit cycle through {}",
            path.display()
        )));
    }

    let text = fs::read_to_string(path)
        .map_err(|e| ManifestError::Read(format!("{}: {e}", path.display())))?;
    let doc = parse_document(&text)?;

    let Some(inherit) = doc.get(INHERIT) else {
        return Ok(doc);
    };
    let Some(inherit) = inherit.as_str() else {
        return Err(ManifestError::validation("invalid inherit path in manifest"));
    };

    let mut parent_path = PathBuf::from(inherit);
    if !parent_path.is_absolute() {
        let dir = path.parent().unwrap_or_else(|| Path::new(""));
        parent_path = dir.join(parent_path);
    }
    debug!(child = %path.display(), parent = %parent_path.display(), "inheriting manifest");

    chain.push(identity);
    let parent = read_layered(&parent_path, chain)?;
    chain.pop();

    Ok(deep_merge([&parent, &doc]))
}

/// Parse one YAML document whose top level must be a non-empty mapping.
pub fn parse_document(text: &str) -> ManifestResult<Mapping> {
    let value: Value =
        serde_yaml::from_str(text).map_err(|e| ManifestError::Parse(e.to_string()))?;
    match ManifestNode::from(value) {
        ManifestNode::Mapping(map) if !map.is_empty() => Ok(map),
        _ => Err(ManifestError::Parse(
            "Invalid manifest. Expected a map".to_string(),
        )),
    }
}
