//! `${...}` property expansion.
//!
//! Only `${random-word}` is supported. Any other property is an error; every
//! such error in the document is collected before failing.

use rand::seq::SliceRandom;
use regex::Regex;

use crate::node::{ManifestNode, Mapping, Scalar};

pub const RANDOM_WORD: &str = "${random-word}";

const PROPERTY_PATTERN: &str = r"\$\{[\w-]+\}";

const ADJECTIVES: &[&str] = &[
    "brave", "chirpy", "dapper", "fuzzy", "giddy", "jolly", "lanky", "merry", "nimble", "quirky",
    "rusty", "sleepy", "sunny", "wobbly", "zesty",
];

const NOUNS: &[&str] = &[
    "badger", "bison", "gecko", "heron", "koala", "lemur", "marmot", "narwhal", "otter",
    "panda", "quokka", "rabbit", "tapir", "walrus", "yak",
];

/// A lower-case silly name such as `jollymarmot`.
pub fn random_word() -> String {
    let mut rng = rand::thread_rng();
    let adjective = ADJECTIVES.choose(&mut rng).copied().unwrap_or("brave");
    let noun = NOUNS.choose(&mut rng).copied().unwrap_or("badger");
    format!("{adjective}{noun}")
}

/// Expand properties in every string of `doc` using [`random_word`].
pub fn expand_properties(doc: &Mapping) -> Result<Mapping, Vec<String>> {
    expand_with(doc, &mut random_word)
}

/// Expand properties using `next_word` to generate each random word.
pub fn expand_with(
    doc: &Mapping,
    next_word: &mut dyn FnMut() -> String,
) -> Result<Mapping, Vec<String>> {
    let property = Regex::new(PROPERTY_PATTERN).map_err(|e| vec![e.to_string()])?;
    let mut errors = Vec::new();
    let expanded = expand_mapping(doc, &property, next_word, &mut errors);
    if errors.is_empty() {
        Ok(expanded)
    } else {
        Err(errors)
    }
}

fn expand_mapping(
    map: &Mapping,
    property: &Regex,
    next_word: &mut dyn FnMut() -> String,
    errors: &mut Vec<String>,
) -> Mapping {
    map.iter()
        .map(|(k, v)| (k.clone(), expand_node(v, property, next_word, errors)))
        .collect()
}

fn expand_node(
    node: &ManifestNode,
    property: &Regex,
    next_word: &mut dyn FnMut() -> String,
    errors: &mut Vec<String>,
) -> ManifestNode {
    match node {
        ManifestNode::Scalar(Scalar::Str(s)) => {
            ManifestNode::str(expand_str(s, property, next_word, errors))
        }
        ManifestNode::Sequence(items) => ManifestNode::Sequence(
            items
                .iter()
                .map(|item| expand_node(item, property, next_word, errors))
                .collect(),
        ),
        ManifestNode::Mapping(map) => {
            ManifestNode::Mapping(expand_mapping(map, property, next_word, errors))
        }
        other => other.clone(),
    }
}

fn expand_str(
    s: &str,
    property: &Regex,
    next_word: &mut dyn FnMut() -> String,
    errors: &mut Vec<String>,
) -> String {
    let mut uses_random_word = false;
    for found in property.find_iter(s) {
        if found.as_str() == RANDOM_WORD {
            uses_random_word = true;
        } else {
            errors.push(format!(
                "Property '{}' found in manifest. This feature is no longer supported. \
                 Please remove it and try again.",
                found.as_str()
            ));
        }
    }
    if uses_random_word {
        s.replace(RANDOM_WORD, &next_word())
    } else {
        s.to_string()
    }
}
