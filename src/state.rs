use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::PathBuf;
use tracing::warn;

use crate::models::EndpointKey;

/// Durable last-known UP/DOWN state, replaced wholesale each cycle.
///
/// The file is a JSON object mapping canonical endpoint keys to booleans,
/// kept sorted and pretty-printed so operators can read it. Reads fail open
/// (missing or corrupt content means "no prior data") and write errors are
/// logged, never fatal: the in-memory state for the running process still
/// reflects the latest sweep.
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn load(&self) -> HashMap<EndpointKey, bool> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(_) => return HashMap::new(),
        };
        let raw: BTreeMap<String, bool> = match serde_json::from_str(&content) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(
                    "state file {} is corrupt, starting fresh: {err}",
                    self.path.display()
                );
                return HashMap::new();
            }
        };
        raw.into_iter()
            .filter_map(|(encoded, up)| {
                let key = EndpointKey::from_canonical(&encoded);
                if key.is_none() {
                    warn!("skipping undecodable state key {encoded:?}");
                }
                key.map(|key| (key, up))
            })
            .collect()
    }

    pub fn save(&self, state: &HashMap<EndpointKey, bool>) {
        if let Err(err) = self.try_save(state) {
            warn!(
                "failed to persist state to {}: {err:#}",
                self.path.display()
            );
        }
    }

    fn try_save(&self, state: &HashMap<EndpointKey, bool>) -> anyhow::Result<()> {
        let raw: BTreeMap<String, bool> = state
            .iter()
            .map(|(key, up)| (key.canonical(), *up))
            .collect();
        let content = serde_json::to_string_pretty(&raw)?;

        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        // Write-then-rename so a crash mid-write never leaves a torn file.
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
