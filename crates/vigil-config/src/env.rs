//! Environment variable fallbacks.
//!
//! Variables are a fallback, not an override: they only fill fields that no
//! config file set.

use std::collections::{HashMap, HashSet};

use tracing::debug;

struct EnvMapping {
    var_name: &'static str,
    field_path: &'static str,
}

const ENV_MAPPINGS: &[EnvMapping] = &[
    EnvMapping {
        var_name: "VIGIL_LOG_LEVEL",
        field_path: "logging.level",
    },
    EnvMapping {
        var_name: "VIGIL_CACHE_CAPACITY",
        field_path: "cache.capacity",
    },
    EnvMapping {
        var_name: "VIGIL_STORAGE_PATH",
        field_path: "storage.path",
    },
];

/// Dotted paths of every leaf in `val`, e.g. `audit.num_pre_probes`.
pub(crate) fn collect_leaf_paths(val: &toml::Value, prefix: &str, out: &mut HashSet<String>) {
    match val {
        toml::Value::Table(table) => {
            for (key, child) in table {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                collect_leaf_paths(child, &path, out);
            }
        },
        _ => {
            out.insert(prefix.to_owned());
        },
    }
}

/// Apply fallbacks for fields not in `file_set`. Returns how many applied.
pub(crate) fn apply_env_fallbacks<S: std::hash::BuildHasher>(
    merged: &mut toml::Value,
    file_set: &HashSet<String>,
    env_vars: &HashMap<String, String, S>,
) -> usize {
    let mut count: usize = 0;
    for mapping in ENV_MAPPINGS {
        if file_set.contains(mapping.field_path) {
            continue;
        }
        let Some(val) = env_vars.get(mapping.var_name) else {
            continue;
        };
        debug!(
            var = mapping.var_name,
            field = mapping.field_path,
            "applying env var fallback"
        );
        set_field(merged, mapping.field_path, coerce(mapping.field_path, val));
        count = count.saturating_add(1);
    }
    count
}

/// Collect the process environment.
pub(crate) fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars().collect()
}

fn coerce(path: &str, val: &str) -> toml::Value {
    if path == "cache.capacity"
        && let Ok(i) = val.trim().parse::<i64>()
    {
        return toml::Value::Integer(i);
    }
    toml::Value::String(val.to_owned())
}

fn set_field(root: &mut toml::Value, path: &str, leaf_val: toml::Value) {
    let mut segments: Vec<&str> = path.split('.').collect();
    let Some(leaf) = segments.pop() else {
        return;
    };

    let mut current = root;
    for segment in segments {
        let Some(table) = current.as_table_mut() else {
            return;
        };
        current = table
            .entry(segment)
            .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
    }
    if let Some(table) = current.as_table_mut() {
        table.insert(leaf.to_owned(), leaf_val);
    }
}
