//! Workload: the immutable, declarative unit of deployment a pool is built
//! from.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// A single named volume mount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeMount {
    pub target: String,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub seed: Option<String>,
}

/// The `state` / `secrets` / `comm` / `custom[]` volume block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Volumes {
    pub state: Option<VolumeMount>,
    pub secrets: Option<VolumeMount>,
    pub comm: Option<VolumeMount>,
    #[serde(default)]
    pub custom: BTreeMap<String, VolumeMount>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheck {
    pub test: Vec<String>,
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    pub retries: u32,
    #[serde(default, with = "humantime_serde::option")]
    pub start_period: Option<Duration>,
}

/// A memory quantity in bytes, accepting `"512m"` / `"1g"` style literals on
/// the YAML side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MemoryBytes(pub u64);

impl MemoryBytes {
    /// Parse a Docker-Compose-style memory literal: an integer optionally
    /// suffixed with `b`/`k`/`m`/`g` (case-insensitive), 1024-based. A bare
    /// integer is interpreted as bytes.
    pub fn parse(input: &str) -> Result<Self, String> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(format!("empty memory literal: {input:?}"));
        }
        let (digits, mult) = match trimmed.chars().last().unwrap().to_ascii_lowercase() {
            'b' => (&trimmed[..trimmed.len() - 1], 1u64),
            'k' => (&trimmed[..trimmed.len() - 1], 1024u64),
            'm' => (&trimmed[..trimmed.len() - 1], 1024 * 1024),
            'g' => (&trimmed[..trimmed.len() - 1], 1024 * 1024 * 1024),
            _ => (trimmed, 1u64),
        };
        let n: u64 = digits
        .trim()
        .parse()
        .map_err(|_| format!("invalid memory literal: {input:?}"))?;
        Ok(Self(n * mult))
    }
}

impl Serialize for MemoryBytes {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(self.0)
    }
}

impl<'de> Deserialize<'de> for MemoryBytes {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        use serde::de::Error;
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Int(u64),
            Str(String),
        }
        match Repr::deserialize(d)? {
            Repr::Int(n) => Ok(MemoryBytes(n)),
            Repr::Str(s) => MemoryBytes::parse(&s).map_err(D::Error::custom),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceLimits {
    pub cpus: Option<f64>,
    pub memory: Option<MemoryBytes>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeployResources {
    #[serde(default)]
    pub limits: ResourceLimits,
    #[serde(default)]
    pub reservations: ResourceLimits,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Deploy {
    #[serde(default)]
    pub resources: DeployResources,
}

/// Security posture applied to every container created for a workload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityPosture {
    #[serde(default = "default_true")]
    pub read_only: bool,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub network_mode: Option<String>,
    #[serde(default)]
    pub networks: Vec<String>,
    #[serde(default)]
    pub dns: Vec<String>,
}

impl Default for SecurityPosture {
    fn default() -> Self {
        Self {
            read_only: true,
            user: None,
            network_mode: None,
            networks: Vec::new(),
            dns: Vec::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Pool sizing/timeout defaults carried on the workload; a `Pool` created
/// from this workload inherits these unless explicitly overridden.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolDefaults {
    #[serde(default = "default_min_idle")]
    pub min_idle: u32,
    #[serde(default = "default_max_size")]
    pub max_size: u32,
    #[serde(with = "humantime_serde")]
    pub idle_timeout: Duration,
    #[serde(default, with = "humantime_serde::option")]
    pub file_idle_ttl: Option<Duration>,
    #[serde(default)]
    pub networks: Option<Vec<String>>,
    #[serde(default)]
    pub dns: Option<Vec<String>>,
}

fn default_min_idle() -> u32 {
    0
}

fn default_max_size() -> u32 {
    1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncDirection {
    Upload,
    Download,
    Bidirectional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    Sync,
    Copy,
}

/// One unit of sync: a container path mapped to a sink path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncMapping {
    pub container_path: String,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub sink_path: Option<String>,
    pub direction: SyncDirection,
    #[serde(default = "default_sync_mode")]
    pub mode: SyncMode,
}

fn default_sync_mode() -> SyncMode {
    SyncMode::Sync
}

/// The sink a workload's mappings copy to/from. Tagged by `type`; the
/// initial implementation supports only `s3`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Sink {
    S3 {
        bucket: String,
        #[serde(default)]
        prefix: String,
        #[serde(default)]
        region: Option<String>,
        #[serde(default)]
        endpoint: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncPolicy {
    #[serde(default = "default_true_field")]
    pub on_claim: bool,
    #[serde(default = "default_true_field")]
    pub on_release: bool,
    #[serde(default, with = "humantime_serde::option")]
    pub interval: Option<Duration>,
    #[serde(default = "default_true_field")]
    pub manual: bool,
}

fn default_true_field() -> bool {
    true
}

impl Default for SyncPolicy {
    fn default() -> Self {
        Self {
            on_claim: true,
            on_release: true,
            interval: None,
            manual: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    pub sink: Sink,
    pub mappings: Vec<SyncMapping>,
    #[serde(default)]
    pub policy: SyncPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HookErrorPolicy {
    Fail,
    Continue,
    Retry,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hook {
    pub command: Vec<String>,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    #[serde(default = "default_on_error")]
    pub on_error: HookErrorPolicy,
    #[serde(default = "default_retries")]
    pub retries: u32,
}

fn default_on_error() -> HookErrorPolicy {
    HookErrorPolicy::Fail
}

fn default_retries() -> u32 {
    1
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Hooks {
    #[serde(default)]
    pub post_claim: Vec<Hook>,
    #[serde(default)]
    pub pre_release: Vec<Hook>,
}

/// The full, validated Workload spec. Immutable after registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workload {
    pub id: String,
    pub name: String,
    pub image: String,
    #[serde(default)]
    pub command: Option<Vec<String>>,
    #[serde(default)]
    pub volumes: Volumes,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
    pub healthcheck: HealthCheck,
    #[serde(default)]
    pub deploy: Deploy,
    #[serde(default)]
    pub security: SecurityPosture,
    pub pool: PoolDefaults,
    #[serde(default)]
    pub sync: Option<SyncConfig>,
    #[serde(default)]
    pub hooks: Hooks,
}

impl Workload {
    /// `id` must be lowercase alphanumeric + hyphen.
    pub fn validate_id(id: &str) -> bool {
        !id.is_empty()
        && id
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    }
}
