//! Deep merge of manifest layers.
//!
//! Layers are reduced left to right. For a key present in both the merged
//! result and the next layer:
//! - two mappings are merged recursively,
//! - two sequences are concatenated (earlier elements first),
//! - anything else is replaced by the later layer's value.

use crate::node::{ManifestNode, Mapping};

/// Merge `layers` into a single mapping; later layers win on conflicts.
pub fn deep_merge<'a, I>(layers: I) -> Mapping
where
    I: IntoIterator<Item = &'a Mapping>,
{
    let mut merged = Mapping::new();
    for layer in layers {
        merge_into(&mut merged, layer);
    }
    merged
}

/// Merge one layer on top of `target` in place.
pub fn merge_into(target: &mut Mapping, layer: &Mapping) {
    for (key, value) in layer {
        match target.get_mut(key) {
            None => {
                target.insert(key.clone(), value.clone());
            }
            Some(existing) => merge_node(existing, value),
        }
    }
}

fn merge_node(existing: &mut ManifestNode, later: &ManifestNode) {
    match (existing, later) {
        (ManifestNode::Mapping(base), ManifestNode::Mapping(top)) => merge_into(base, top),
        (ManifestNode::Sequence(base), ManifestNode::Sequence(top)) => {
            base.extend(top.iter().cloned())
        }
        (slot, later) => *slot = later.clone(),
    }
}
