// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::debug;

use crate::Config;

/// Ordered list of config file locations searched from lowest to highest priority.
/// Later files override earlier ones.
fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    // 1. System-wide default
    paths.push(PathBuf::from("/etc/kasa/config.yaml"));

    // 2. XDG / home
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".config/kasa/config.yaml"));
    }
    if let Some(cfg) = dirs::config_dir() {
        let p = cfg.join("kasa/config.yaml");
        if !paths.contains(&p) {
            paths.push(p);
        }
    }

    // 3. Directory-local
    paths.push(PathBuf::from(".kasa/config.yaml"));

    paths
}

/// Load configuration by merging all discovered YAML files.
/// The `extra` argument may provide an explicit path (e.g. `--config` CLI flag).
pub fn load(extra: Option<&Path>) -> anyhow::Result<Config> {
    let mut merged = serde_yaml::Value::Mapping(serde_yaml::Mapping::new());

    let explicit = extra.map(Path::to_path_buf);
    for path in config_search_paths().into_iter().chain(explicit) {
        let is_explicit = extra == Some(path.as_path());
        if !is_explicit && !path.is_file() {
            continue;
        }
        debug!(path = %path.display(), "loading config layer");
        merge_yaml(&mut merged, read_layer(&path)?);
    }

    serde_yaml::from_value(merged).context("invalid configuration")
}

fn read_layer(path: &Path) -> anyhow::Result<serde_yaml::Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let layer: serde_yaml::Value = serde_yaml::from_str(&text)
        .with_context(|| format!("parsing {}", path.display()))?;
    // An empty file parses as null.
    Ok(match layer {
        serde_yaml::Value::Null => serde_yaml::Value::Mapping(serde_yaml::Mapping::new()),
        other => other,
    })
}

/// Deep-merge `src` into `dst`; src wins on scalar conflicts.
fn merge_yaml(dst: &mut serde_yaml::Value, src: serde_yaml::Value) {
    match (dst, src) {
        (serde_yaml::Value::Mapping(d), serde_yaml::Value::Mapping(s)) => {
            for (k, v) in s {
                let entry = d
                    .entry(k)
                    .or_insert(serde_yaml::Value::Mapping(serde_yaml::Mapping::new()));
                merge_yaml(entry, v);
            }
        }
        (dst, src) => *dst = src,
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn val(s: &str) -> serde_yaml::Value {
        serde_yaml::from_str(s).unwrap()
    }

    #[test]
    fn merge_scalar_src_wins() {
        let mut dst = val("x: 1");
        merge_yaml(&mut dst, val("x: 2"));
        assert_eq!(dst["x"].as_i64(), Some(2));
    }

    #[test]
    fn merge_nested_mappings() {
        let mut dst = val("cloud:\n  url: http://a/\n  timeout_secs: 5\n");
        merge_yaml(&mut dst, val("cloud:\n  url: http://b/\n"));
        assert_eq!(dst["cloud"]["url"].as_str(), Some("http://b/"));
        assert_eq!(dst["cloud"]["timeout_secs"].as_u64(), Some(5));
    }

    #[test]
    fn load_missing_explicit_path_fails() {
        let result = load(Some(Path::new("/tmp/kasa_nonexistent_config_xyz.yaml")));
        assert!(result.is_err());
    }

    #[test]
    fn load_explicit_file_overrides_defaults() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "account:\n  email: a@x.com\ncloud:\n  timeout_secs: 10").unwrap();
        let cfg = load(Some(f.path())).unwrap();
        assert_eq!(cfg.account.email.as_deref(), Some("a@x.com"));
        assert_eq!(cfg.cloud.timeout_secs, Some(10));
        assert_eq!(cfg.cloud.app_type, "Kasa_Android");
    }

    #[test]
    fn load_empty_explicit_file_gives_defaults() {
        let f = tempfile::NamedTempFile::new().unwrap();
        let cfg = load(Some(f.path())).unwrap();
        assert_eq!(cfg.cloud.url, "https://wap.tplinkcloud.com/");
    }

    #[test]
    fn load_rejects_malformed_yaml() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "cloud: [unclosed").unwrap();
        assert!(load(Some(f.path())).is_err());
    }
}
