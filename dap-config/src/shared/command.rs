use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::shared::ValidationError;

/// Default name of the replication client executable.
const DEFAULT_PROGRAM: &str = "dap";

/// How the replication client executable is invoked.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CommandConfig {
    /// Executable name or path.
    #[serde(default = "default_program")]
    pub program: String,
    /// Working directory for the client, which writes temporary files while loading.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
}

impl CommandConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.program.trim().is_empty() {
            return Err(ValidationError::EmptyCommandProgram);
        }

        Ok(())
    }
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            working_dir: None,
        }
    }
}

fn default_program() -> String {
    DEFAULT_PROGRAM.to_owned()
}
