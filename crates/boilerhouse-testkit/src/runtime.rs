//! Deterministic in-memory `ContainerRuntime`. Assigns
//! sequential runtime ids, tracks running/labels state, and never touches
//! an actual container engine — grounded on the deterministic paper broker
//! pattern used elsewhere in this workspace: no randomness, no network I/O,
//! counters drive identity.

use async_trait::async_trait;
use boilerhouse_runtime_api::{
    ContainerInspect, ContainerRuntime, ContainerSpec, ExecResult, HealthState, RuntimeError,
};
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

struct FakeContainer {
    spec: ContainerSpec,
    running: bool,
}

/// In-memory fake implementing [`ContainerRuntime`]. All operations succeed
/// unless explicitly scripted to fail via `fail_create`.
#[derive(Default)]
pub struct FakeRuntime {
    next_id: Mutex<u64>,
    containers: Mutex<BTreeMap<String, FakeContainer>>,
    fail_create: Mutex<bool>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `create` call (and every one after, until reset) fail
    /// with `ImageUnavailable`.
    pub fn fail_next_create(&self) {
        *self.fail_create.lock().unwrap() = true;
    }

    pub fn running_count(&self) -> usize {
        self.containers.lock().unwrap().values().filter(|c| c.running).count()
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn create(&self, spec: &ContainerSpec) -> Result<String, RuntimeError> {
        if *self.fail_create.lock().unwrap() {
            return Err(RuntimeError::ImageUnavailable(spec.image.clone()));
        }
        let mut next_id = self.next_id.lock().unwrap();
        let id = format!("rt-{}", *next_id);
        *next_id += 1;
        self.containers.lock().unwrap().insert(
            id.clone(),
            FakeContainer {
                spec: spec.clone(),
                running: false,
        });
        Ok(id)
    }

    async fn start(&self, runtime_id: &str) -> Result<(), RuntimeError> {
        let mut containers = self.containers.lock().unwrap();
        let c = containers
        .get_mut(runtime_id)
        .ok_or_else(|| RuntimeError::NotFound(runtime_id.to_string()))?;
        c.running = true;
        Ok(())
    }

    async fn stop(&self, runtime_id: &str, _grace: Duration) -> Result<(), RuntimeError> {
        let mut containers = self.containers.lock().unwrap();
        let c = containers
        .get_mut(runtime_id)
        .ok_or_else(|| RuntimeError::NotFound(runtime_id.to_string()))?;
        c.running = false;
        Ok(())
    }

    async fn remove(&self, runtime_id: &str) -> Result<(), RuntimeError> {
        // Idempotent: removing an unknown id is not an error (specification
        // §4.C9 "call C2.remove (idempotent)").
        self.containers.lock().unwrap().remove(runtime_id);
        Ok(())
    }

    async fn inspect(&self, runtime_id: &str) -> Result<ContainerInspect, RuntimeError> {
        let containers = self.containers.lock().unwrap();
        let c = containers
        .get(runtime_id)
        .ok_or_else(|| RuntimeError::NotFound(runtime_id.to_string()))?;
        Ok(ContainerInspect {
            runtime_id: runtime_id.to_string(),
            running: c.running,
            health: if c.running { HealthState::Healthy } else { HealthState::None },
            labels: c.spec.labels.clone(),
        })
    }

    async fn exec(&self, runtime_id: &str, _command: &[String]) -> Result<ExecResult, RuntimeError> {
        let containers = self.containers.lock().unwrap();
        if !containers.contains_key(runtime_id) {
            return Err(RuntimeError::NotFound(runtime_id.to_string()));
        }
        Ok(ExecResult {
            exit_code: 0,
            stdout: Vec::new(),
            stderr: Vec::new(),
        })
    }

    async fn list_by_labels(
        &self,
        labels: &BTreeMap<String, String>) -> Result<Vec<ContainerInspect>, RuntimeError> {
        let containers = self.containers.lock().unwrap();
        Ok(containers
            .iter()
            .filter(|(_, c)| labels.iter().all(|(k, v)| c.spec.labels.get(k) == Some(v)))
            .map(|(runtime_id, c)| ContainerInspect {
                runtime_id: runtime_id.clone(),
                running: c.running,
                health: if c.running { HealthState::Healthy } else { HealthState::None },
                labels: c.spec.labels.clone(),
            })
            .collect())
    }
}
