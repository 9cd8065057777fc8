//! Manifest engine for blue-green deploys.
//!
//! Turns a declarative YAML manifest into per-application route and scale
//! data.
//!
//! # Pipeline
//!
//! 1. **`reader`**: locate the file, parse it, and resolve `inherit`
//!    chains (parent first, child layered on top)
//! 2. **`expand`**: substitute `${random-word}`, reject any other property
//! 3. **`app`**: split `applications`, merge globals into each entry,
//!    validate, and extract scale parameters
//! 4. **`routes`**: resolve `host`/`domain` products or decompose
//!    `routes:` strings against the platform's domains
//!
//! Merging is structural recursion over [`ManifestNode`] (see `merge`).

pub mod app;
pub mod error;
pub mod expand;
pub mod manifest;
pub mod merge;
pub mod node;
pub mod reader;
pub mod routes;

pub use error::{ManifestError, ManifestResult};
pub use manifest::{Manifest, ManifestSource};
pub use merge::deep_merge;
pub use node::{ManifestNode, Mapping, Scalar};
pub use reader::ManifestReader;
