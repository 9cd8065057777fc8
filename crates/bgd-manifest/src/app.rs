//! Per-application resolution of a manifest document.
//!
//! Each entry of `applications` is merged on top of the document's global
//! properties, then converted to an [`AppSpec`]. Problems are collected per
//! entry so one manifest read reports everything that is wrong with it.

use bgd_core::{AppSpec, PlatformDomains, Route, ScaleParameters};

use crate::merge::deep_merge;
use crate::node::{ManifestNode, Mapping, Scalar};
use crate::routes::{parse_route, routes_from_hosts};

const APPLICATIONS: &str = "applications";

/// Keys that may be explicitly null in an app entry.
const NULLABLE_KEYS: &[&str] = &["command", "buildpack"];

const MEGABYTE: u64 = 1024 * 1024;

/// Split a document into one merged mapping per application.
///
/// Without an `applications` key the whole document is a single app.
pub(crate) fn app_entries(doc: &Mapping) -> Result<Vec<Mapping>, Vec<String>> {
    let Some(apps) = doc.get(APPLICATIONS) else {
        return Ok(vec![doc.clone()]);
    };
    let Some(apps) = apps.as_sequence() else {
        return Err(vec!["Expected applications to be a list".to_string()]);
    };

    let globals: Mapping = doc
        .iter()
        .filter(|(key, _)| key.as_str() != APPLICATIONS)
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    let mut entries = Vec::with_capacity(apps.len());
    let mut errors = Vec::new();
    for app in apps {
        match app {
            ManifestNode::Mapping(app) => entries.push(deep_merge([&globals, app])),
            ManifestNode::Null => entries.push(globals.clone()),
            other => errors.push(format!(
                "Expected application to be a list of key/value pairs, got a {}",
                other.kind()
            )),
        }
    }

    if errors.is_empty() { Ok(entries) } else { Err(errors) }
}

/// Convert one merged app entry into an [`AppSpec`].
pub(crate) fn app_spec(entry: &Mapping, domains: &PlatformDomains) -> Result<AppSpec, Vec<String>> {
    let mut errors = null_errors(entry);
    if !errors.is_empty() {
        return Err(errors);
    }

    let name = string_val(entry, "name", &mut errors);

    let mut domain_names = string_list(entry, "domains", &mut errors).unwrap_or_default();
    domain_names.extend(string_val(entry, "domain", &mut errors));
    let domain_names = dedup(domain_names);

    let mut hosts = string_list(entry, "hosts", &mut errors).unwrap_or_default();
    hosts.extend(string_val(entry, "host", &mut errors));
    let hosts = dedup(hosts);

    let composite = routes_from_hosts(&domains.default_domain, &hosts, &domain_names);
    let declared = route_entries(entry, domains, &mut errors);

    let routes = match declared {
        None => composite,
        Some(declared) if composite.is_empty() => declared,
        Some(_) => {
            errors.push("Cannot have both 'routes' and 'host'/'hosts' in the same application".to_string());
            Vec::new()
        }
    };

    let scale = ScaleParameters {
        instance_count: instances_val(entry, &mut errors).unwrap_or_default(),
        memory_mb: megabytes_val(entry, "memory", &mut errors).unwrap_or_default(),
        disk_quota_mb: megabytes_val(entry, "disk_quota", &mut errors).unwrap_or_default(),
    };

    if !errors.is_empty() {
        return Err(errors);
    }
    Ok(AppSpec {
        name,
        routes: routes.into_iter().collect(),
        scale,
    })
}

/// Every key except the allow-listed ones must be non-null.
fn null_errors(entry: &Mapping) -> Vec<String> {
    entry
        .iter()
        .filter(|(key, value)| value.is_null() && !NULLABLE_KEYS.contains(&key.as_str()))
        .map(|(key, _)| format!("{key} should not be null"))
        .collect()
}

fn string_val(entry: &Mapping, key: &str, errors: &mut Vec<String>) -> Option<String> {
    match entry.get(key)? {
        ManifestNode::Scalar(Scalar::Str(s)) => Some(s.clone()),
        _ => {
            errors.push(format!("{key} must be a string value"));
            None
        }
    }
}

fn string_list(entry: &Mapping, key: &str, errors: &mut Vec<String>) -> Option<Vec<String>> {
    let items = entry.get(key)?;
    let strings = items.as_sequence().and_then(|items| {
        items
            .iter()
            .map(|item| item.as_str().map(str::to_string))
            .collect::<Option<Vec<_>>>()
    });
    if strings.is_none() {
        errors.push(format!("Expected {key} to be a list of strings."));
    }
    strings
}

fn instances_val(entry: &Mapping, errors: &mut Vec<String>) -> Option<u32> {
    let node = entry.get("instances")?;
    let parsed = match node {
        ManifestNode::Scalar(Scalar::Int(i)) => u32::try_from(*i).ok(),
        ManifestNode::Scalar(Scalar::Str(s)) => s.trim().parse::<u32>().ok(),
        _ => None,
    };
    if parsed.is_none() {
        errors.push(format!(
            "Expected instances to be a non-negative number, but it was a {}.",
            node.kind()
        ));
    }
    parsed
}

fn megabytes_val(entry: &Mapping, key: &str, errors: &mut Vec<String>) -> Option<u64> {
    let raw = match entry.get(key)? {
        ManifestNode::Scalar(scalar) => scalar.to_string(),
        other => other.kind().to_string(),
    };
    match to_megabytes(&raw) {
        Ok(mb) => Some(mb),
        Err(reason) => {
            errors.push(format!("Invalid value for '{key}': {raw}\n{reason}"));
            None
        }
    }
}

/// Convert a byte quantity like `512M`, `1G` or `256MB` to megabytes.
pub fn to_megabytes(raw: &str) -> Result<u64, String> {
    const INVALID: &str =
        "Byte quantity must be an integer with a unit of measurement like M, MB, G, or GB";

    let upper = raw.trim().to_ascii_uppercase();
    let without_b = upper.strip_suffix('B').unwrap_or(&upper);
    let Some(unit) = without_b.chars().last() else {
        return Err(INVALID.to_string());
    };
    let multiplier: u64 = match unit {
        'K' => 1024,
        'M' => MEGABYTE,
        'G' => MEGABYTE * 1024,
        'T' => MEGABYTE * 1024 * 1024,
        _ => return Err(INVALID.to_string()),
    };
    let digits = &without_b[..without_b.len() - 1];
    let value: u64 = digits.parse().map_err(|_| INVALID.to_string())?;
    if value == 0 {
        return Err(INVALID.to_string());
    }
    value
        .checked_mul(multiplier)
        .map(|bytes| bytes / MEGABYTE)
        .ok_or_else(|| INVALID.to_string())
}

/// Parse the `routes:` key. `None` when the key is absent.
fn route_entries(
    entry: &Mapping,
    domains: &PlatformDomains,
    errors: &mut Vec<String>,
) -> Option<Vec<Route>> {
    let declared = entry.get("routes")?;
    let Some(declared) = declared.as_sequence() else {
        errors.push("'routes' should be a list".to_string());
        return None;
    };

    let mut routes = Vec::with_capacity(declared.len());
    for item in declared {
        let Some(raw) = item
            .as_mapping()
            .and_then(|m| m.get("route"))
            .and_then(ManifestNode::as_str)
        else {
            errors.push("each route in 'routes' must have a 'route' property".to_string());
            continue;
        };
        match parse_route(raw, domains) {
            Ok(route) => routes.push(route),
            Err(e) => errors.push(e),
        }
    }
    Some(routes)
}

/// Drop repeated values, keeping the first occurrence.
fn dedup(values: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    values
        .into_iter()
        .filter(|v| seen.insert(v.clone()))
        .collect()
}
