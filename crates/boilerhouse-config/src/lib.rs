//! Loads and validates the Workload YAML document.
//!
//! A layered YAML loader: parse each file to `serde_json::Value`,
//! deep-merge in order, canonicalize (sorted object keys) and hash the
//! result, then deserialize the canonical form into
//! `boilerhouse_types::Workload` and run structural validation.

use anyhow::{Context, Result};
use boilerhouse_types::{BoilerhouseError, Workload};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::path::Path;

/// A loaded, merged, hashed Workload document.
#[derive(Debug, Clone)]
pub struct LoadedWorkload {
    pub workload: Workload,
    pub canonical_json: String,
    pub config_hash: String,
}

/// Load a single workload YAML file. Equivalent to `load_layered_workload`
/// with one path and no overrides.
pub fn load_workload_yaml(path: impl AsRef<Path>) -> Result<LoadedWorkload> {
    load_layered_workload(&[path.as_ref()])
}

/// Load + deep-merge a sequence of YAML files, later files overriding
/// earlier ones, then canonicalize, hash, and validate the merged document
/// as a `Workload`.
///
/// Layering lets an operator split a workload definition across a base file
/// and environment-specific overrides the way the original config layers
/// base/env/local files; Boilerhouse workload specs use the same mechanism
/// for a base spec plus a deployment-local override.
pub fn load_layered_workload(paths: &[&Path]) -> Result<LoadedWorkload> {
    let mut merged = Value::Object(Default::default());

    for p in paths {
        let raw = std::fs::read_to_string(p)
        .with_context(|| format!("read workload spec: {}", p.display()))?;
        let yaml_val: serde_yaml::Value =
        serde_yaml::from_str(&raw).with_context(|| format!("parse yaml: {}", p.display()))?;
        let json_val =
        serde_json::to_value(yaml_val).context("workload yaml -> json conversion failed")?;
        deep_merge(&mut merged, json_val);
    }

    let canonical = canonicalize_json(&merged);

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let config_hash = hex::encode(hasher.finalize());

    let workload: Workload = serde_json::from_str(&canonical).map_err(|e| {
        anyhow::anyhow!(BoilerhouseError::InvalidWorkload {
            reason: e.to_string()
        })
    })?;

    validate_workload(&workload)?;

    Ok(LoadedWorkload {
        workload,
        canonical_json: canonical,
        config_hash,
    })
}

/// Structural checks beyond what serde already enforces: id format,
/// non-empty image, pool sizing sanity.
pub fn validate_workload(w: &Workload) -> Result<()> {
    if !Workload::validate_id(&w.id) {
        return Err(BoilerhouseError::InvalidWorkload {
            reason: format!("workload id {:?} must be lowercase alphanumeric/hyphen", w.id),
            }
            .into());
    }
    if w.image.trim().is_empty() {
        return Err(BoilerhouseError::InvalidWorkload {
            reason: "image must not be empty".into(),
            }
            .into());
    }
    if w.pool.max_size == 0 {
        return Err(BoilerhouseError::InvalidWorkload {
            reason: "pool.max_size must be >= 1".into(),
            }
            .into());
    }
    if w.pool.min_idle > w.pool.max_size {
        return Err(BoilerhouseError::InvalidWorkload {
            reason: "pool.min_idle must not exceed pool.max_size".into(),
            }
            .into());
    }
    if let Some(sync) = &w.sync {
        if sync.mappings.is_empty() {
            return Err(BoilerhouseError::InvalidWorkload {
                reason: "sync.mappings must not be empty".into(),
                }
                .into());
        }
    }
    Ok(())
}

/// Deep-merge: objects merge recursively; arrays and scalars are replaced.
fn deep_merge(dst: &mut Value, src: Value) {
    match (dst, src) {
        (Value::Object(dst_map), Value::Object(src_map)) => {
            for (k, v) in src_map {
                match dst_map.get_mut(&k) {
                    Some(existing) => deep_merge(existing, v),
                    None => {
                        dst_map.insert(k, v);
                    }
                }
            }
        }
        (dst_slot, src_val) => {
            *dst_slot = src_val;
        }
    }
}

fn canonicalize_json(v: &Value) -> String {
    let sorted = sort_keys(v);
    serde_json::to_string(&sorted).expect("json serialization must not fail")
}

fn sort_keys(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut keys: Vec<_> = map.keys().cloned().collect();
            keys.sort();
            let mut new = serde_json::Map::new();
            for k in keys {
                new.insert(k.clone(), sort_keys(&map[&k]));
            }
            Value::Object(new)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_keys).collect()),
        _ => v.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    const BASE: &str = r#"
        id: worker-a
        name: Worker A
        image: registry.local/worker:latest
        healthcheck:
          test: ["CMD", "true"]
          interval: 10s
          timeout: 2s
          retries: 3
        pool:
          min_idle: 1
          max_size: 4
          idle_timeout: 5m
        "#;

    #[test]
    fn loads_and_hashes_a_single_file() {
        let f = write_temp(BASE);
        let loaded = load_workload_yaml(f.path()).expect("load");
        assert_eq!(loaded.workload.id, "worker-a");
        assert_eq!(loaded.workload.pool.max_size, 4);
        assert_eq!(loaded.config_hash.len(), 64);
    }

    #[test]
    fn same_content_hashes_identically() {
        let a = write_temp(BASE);
        let b = write_temp(BASE);
        let la = load_workload_yaml(a.path()).unwrap();
        let lb = load_workload_yaml(b.path()).unwrap();
        assert_eq!(la.config_hash, lb.config_hash);
    }

    #[test]
    fn override_layer_replaces_scalar_fields() {
        let base = write_temp(BASE);
        let overlay = write_temp("pool:\n max_size: 8\n");
        let loaded = load_layered_workload(&[base.path(), overlay.path()]).unwrap();
        assert_eq!(loaded.workload.pool.max_size, 8);
        assert_eq!(loaded.workload.pool.min_idle, 1);
    }

    #[test]
    fn rejects_bad_id() {
        let f = write_temp(&BASE.replace("worker-a", "Worker_A"));
        let err = load_workload_yaml(f.path()).unwrap_err();
        assert!(err.to_string().contains("lowercase"));
    }

    #[test]
    fn rejects_min_idle_above_max_size() {
        let f = write_temp(&BASE.replace("max_size: 4", "max_size: 1").replace("min_idle: 1", "min_idle: 2"));
        let err = load_workload_yaml(f.path()).unwrap_err();
        assert!(err.to_string().contains("min_idle"));
    }
}
