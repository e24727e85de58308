//! `canopy.toml` parsing: deserializes the driver-facing config file into
//! `canopy_query::CanopyConfig`, the shape every crate below the driver
//! actually consumes. An absent file is not an error — a repository with
//! no `canopy.toml` still indexes and queries, just with the documented
//! defaults (spec §6 ambient config).

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use canopy_core::{CheckerConfig, Severity};
use canopy_query::{BloomConfig, CanopyConfig, QueryConfig};
use serde::Deserialize;

#[derive(Debug, Deserialize, Default)]
struct RawConfig {
    #[serde(default)]
    bloom: RawBloom,
    #[serde(default)]
    query: RawQuery,
    #[serde(default)]
    invariants: HashMap<String, RawChecker>,
}

#[derive(Debug, Deserialize, Default)]
struct RawBloom {
    expected_items: Option<u64>,
    false_positive_rate: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
struct RawQuery {
    default_max_depth: Option<usize>,
    soft_deadline_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct RawChecker {
    enabled: Option<bool>,
    severity_override: Option<String>,
    threshold: Option<usize>,
}

/// Load `<root>/canopy.toml`, falling back to defaults for any table or
/// field it omits.
pub fn load(root: &Path) -> Result<CanopyConfig> {
    let path = root.join("canopy.toml");
    let raw: RawConfig = if path.exists() {
        let text = std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?
    } else {
        RawConfig::default()
    };

    let bloom_defaults = BloomConfig::default();
    let bloom = BloomConfig {
        expected_items: raw.bloom.expected_items.unwrap_or(bloom_defaults.expected_items),
        false_positive_rate: raw.bloom.false_positive_rate.unwrap_or(bloom_defaults.false_positive_rate),
    };

    let query_defaults = QueryConfig::default();
    let query = QueryConfig {
        default_max_depth: raw.query.default_max_depth.unwrap_or(query_defaults.default_max_depth),
        soft_deadline_ms: raw.query.soft_deadline_ms.unwrap_or(query_defaults.soft_deadline_ms),
    };

    let mut invariants = HashMap::new();
    for (name, checker) in raw.invariants {
        let severity_override = match checker.severity_override.as_deref() {
            Some("critical") => Some(Severity::Critical),
            Some("high") => Some(Severity::High),
            Some("medium") => Some(Severity::Medium),
            Some("low") => Some(Severity::Low),
            Some(other) => anyhow::bail!("unknown severity '{other}' for checker '{name}'"),
            None => None,
        };
        invariants.insert(
            name,
            CheckerConfig {
                enabled: checker.enabled.unwrap_or(true),
                severity_override,
                threshold: checker.threshold,
            },
        );
    }

    Ok(CanopyConfig { bloom, query, invariants })
}
