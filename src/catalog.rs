//! Gold task catalog: load the read-only task set once at startup and
//! filter it per assessment request.

use std::collections::HashSet;
use std::path::Path;

use crate::error::CoreError;
use crate::types::{AssessmentConfig, GoldTask};

#[derive(Debug, Clone)]
pub struct GoldTaskCatalog {
    tasks: Vec<GoldTask>,
}

impl GoldTaskCatalog {
    /// Reads and parses the catalog file. A malformed file or duplicate id
    /// is a configuration error.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| CoreError::Configuration(format!("reading gold task catalog {path:?}: {e}")))?;

        let tasks: Vec<GoldTask> = serde_json::from_str(&raw)
            .map_err(|e| CoreError::Configuration(format!("parsing gold task catalog {path:?}: {e}")))?;

        if tasks.is_empty() {
            return Err(CoreError::Configuration(format!(
                "gold task catalog {path:?} is empty"
            )));
        }

        let mut seen = HashSet::new();
        for task in &tasks {
            if !seen.insert(task.id.clone()) {
                return Err(CoreError::Configuration(format!(
                    "gold task catalog {path:?} contains duplicate id '{}'",
                    task.id
                )));
            }
        }

        Ok(Self { tasks })
    }

    pub fn all(&self) -> &[GoldTask] {
        &self.tasks
    }

    /// Filters tasks by configured difficulty/tags and stops once
    /// `task_count` tasks have been selected, preserving catalog order.
    pub fn filter(&self, config: &AssessmentConfig) -> Vec<&GoldTask> {
        self.tasks
            .iter()
            .filter(|task| config.difficulties.contains(&task.difficulty))
            .filter(|task| config.tags.is_empty() || task.tags.iter().any(|t| config.tags.contains(t)))
            .take(config.task_count)
            .collect()
    }
}
