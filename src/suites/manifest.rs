use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::config::MANIFEST_FILE;

/// The parts of a suite's `package.json` the runner cares about
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SuiteManifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Script name -> definition. Usually a command line, but only the names
    /// are checked, so other JSON values are tolerated
    pub scripts: BTreeMap<String, serde_json::Value>,
}

impl SuiteManifest {
    /// Read and parse `<suite_dir>/package.json`
    pub async fn load(suite_dir: &Path) -> Result<Self> {
        let path = suite_dir.join(MANIFEST_FILE);

        let contents = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;

        Self::parse(&contents).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let manifest: SuiteManifest = serde_json::from_str(contents)?;
        Ok(manifest)
    }

    /// Required scripts absent from this manifest, in the order asked
    pub fn missing_scripts<'a>(&self, required: &[&'a str]) -> Vec<&'a str> {
        required
            .iter()
            .copied()
            .filter(|s| !self.scripts.contains_key(*s))
            .collect()
    }

    /// Scripts whose definition is a command line
    pub fn command_lines(&self) -> BTreeMap<String, String> {
        self.scripts
            .iter()
            .filter_map(|(name, value)| Some((name.clone(), value.as_str()?.to_string())))
            .collect()
    }
}

/// A suite that passed discovery. Read-only after startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuiteDescriptor {
    /// Directory name, used as the suite's identifier
    pub id: String,
    pub dir: PathBuf,
    /// Command lines of the manifest's string-valued scripts
    pub scripts: BTreeMap<String, String>,
}

impl SuiteDescriptor {
    /// Command line declared for `script`, if any
    pub fn script(&self, script: &str) -> Option<&str> {
        self.scripts.get(script).map(String::as_str)
    }
}
