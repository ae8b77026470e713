use std::path::Path;

use anyhow::{Context, Result};
use tokio::fs;
use tracing::{debug, info, warn};

use super::manifest::{SuiteDescriptor, SuiteManifest};
use crate::config::{
    EXTERNAL_NETWORK_SCRIPT, LOCAL_NETWORK_SCRIPT, MANIFEST_FILE, TEST_ENTRY_DIR,
};

/// Entries every suite directory must contain
const REQUIRED_ENTRIES: [&str; 2] = [MANIFEST_FILE, TEST_ENTRY_DIR];

/// Scripts every suite manifest must declare
const REQUIRED_SCRIPTS: [&str; 2] = [EXTERNAL_NETWORK_SCRIPT, LOCAL_NETWORK_SCRIPT];

/// Find the runnable suites under `suites_root`.
///
/// Candidates are visited in file-name order. A candidate that is not a
/// directory, lacks a required entry, has an unreadable manifest, or is
/// missing a required script is skipped with a warning; it never fails the
/// scan. Only an unreadable `suites_root` is an error.
///
/// When `only_test` is given the result is narrowed to those names, keeping
/// discovery order. Names that were not discovered are ignored.
pub async fn discover_suites(
    suites_root: &Path,
    only_test: Option<&[String]>,
) -> Result<Vec<SuiteDescriptor>> {
    let mut entries = fs::read_dir(suites_root)
        .await
        .with_context(|| format!("Failed to list suites in {}", suites_root.display()))?;

    let mut candidates = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .with_context(|| format!("Failed to list suites in {}", suites_root.display()))?
    {
        candidates.push(entry.path());
    }
    candidates.sort();

    let mut suites = Vec::new();
    for path in candidates {
        if let Some(suite) = validate_suite(&path).await {
            suites.push(suite);
        }
    }

    info!("Discovered {} valid test suites", suites.len());

    if let Some(allowed) = only_test {
        suites.retain(|s| allowed.contains(&s.id));
        debug!("{} suites left after allow-list", suites.len());
    }

    Ok(suites)
}

/// Run the structural checks on one candidate, warning on the first failure
async fn validate_suite(path: &Path) -> Option<SuiteDescriptor> {
    let Some(id) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
        warn!(
            "{} has a non UTF-8 name. Skip this test suite.",
            path.display()
        );
        return None;
    };

    // 1. Must be a directory
    match fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => {}
        _ => {
            warn!("{} is not a directory. Skip this test suite.", id);
            return None;
        }
    }

    // 2. Must contain the manifest and the test entry directory
    for required in REQUIRED_ENTRIES {
        if !fs::try_exists(path.join(required)).await.unwrap_or(false) {
            warn!(
                "{} does not contain file/dir: {}. Skip this test suite.",
                id, required
            );
            return None;
        }
    }

    // 3. Manifest must parse
    let manifest = match SuiteManifest::load(path).await {
        Ok(manifest) => manifest,
        Err(e) => {
            warn!(
                "{} test {} load failed: {:#}. Skip this test suite.",
                id, MANIFEST_FILE, e
            );
            return None;
        }
    };

    // 4. Manifest must declare both run scripts
    if let Some(script) = manifest.missing_scripts(&REQUIRED_SCRIPTS).first() {
        warn!(
            "{} does not have test script: `{}`. Skip this test suite.",
            id, script
        );
        return None;
    }

    Some(SuiteDescriptor {
        id,
        dir: path.to_path_buf(),
        scripts: manifest.command_lines(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const GOOD_MANIFEST: &str = r#"{
        "scripts": { "test-ganache": "exit 0", "test-cosmos": "exit 0" }
    }"#;

    fn write_suite(root: &Path, name: &str, manifest: Option<&str>, with_test_dir: bool) {
        let dir = root.join(name);
        std::fs::create_dir_all(&dir).unwrap();
        if let Some(manifest) = manifest {
            std::fs::write(dir.join(MANIFEST_FILE), manifest).unwrap();
        }
        if with_test_dir {
            std::fs::create_dir_all(dir.join(TEST_ENTRY_DIR)).unwrap();
        }
    }

    fn ids(suites: &[SuiteDescriptor]) -> Vec<&str> {
        suites.iter().map(|s| s.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_discovers_valid_suites_in_name_order() {
        let root = TempDir::new().unwrap();
        write_suite(root.path(), "storage", Some(GOOD_MANIFEST), true);
        write_suite(root.path(), "basic", Some(GOOD_MANIFEST), true);
        write_suite(root.path(), "opcode", Some(GOOD_MANIFEST), true);

        let suites = discover_suites(root.path(), None).await.unwrap();
        assert_eq!(ids(&suites), vec!["basic", "opcode", "storage"]);
        assert_eq!(suites[0].dir, root.path().join("basic"));
        assert_eq!(suites[0].script("test-cosmos"), Some("exit 0"));
    }

    #[tokio::test]
    async fn test_skips_invalid_candidates_without_failing() {
        let root = TempDir::new().unwrap();
        write_suite(root.path(), "good", Some(GOOD_MANIFEST), true);
        write_suite(root.path(), "no_manifest", None, true);
        write_suite(root.path(), "no_test_dir", Some(GOOD_MANIFEST), false);
        write_suite(root.path(), "bad_json", Some("{ scripts: "), true);
        write_suite(
            root.path(),
            "missing_script",
            Some(r#"{ "scripts": { "test-ganache": "exit 0" } }"#),
            true,
        );
        std::fs::write(root.path().join("README.md"), "not a suite").unwrap();

        let suites = discover_suites(root.path(), None).await.unwrap();
        assert_eq!(ids(&suites), vec!["good"]);
    }

    #[tokio::test]
    async fn test_accepts_manifest_with_non_string_scripts() {
        let root = TempDir::new().unwrap();
        write_suite(
            root.path(),
            "configured",
            Some(
                r#"{
                    "scripts": {
                        "test-ganache": "exit 0",
                        "test-cosmos": "exit 0",
                        "fixtures": { "accounts": 10 }
                    }
                }"#,
            ),
            true,
        );

        let suites = discover_suites(root.path(), None).await.unwrap();
        assert_eq!(ids(&suites), vec!["configured"]);
        assert_eq!(suites[0].script("test-ganache"), Some("exit 0"));
        assert_eq!(suites[0].script("fixtures"), None);
    }

    #[tokio::test]
    async fn test_allow_list_keeps_discovery_order() {
        let root = TempDir::new().unwrap();
        for name in ["a", "b", "c", "d"] {
            write_suite(root.path(), name, Some(GOOD_MANIFEST), true);
        }

        let allowed = vec!["d".to_string(), "unknown".to_string(), "b".to_string()];
        let suites = discover_suites(root.path(), Some(&allowed)).await.unwrap();
        assert_eq!(ids(&suites), vec!["b", "d"]);
    }

    #[tokio::test]
    async fn test_missing_root_is_an_error() {
        let root = TempDir::new().unwrap();
        let result = discover_suites(&root.path().join("nope"), None).await;
        assert!(result.is_err());
    }
}
