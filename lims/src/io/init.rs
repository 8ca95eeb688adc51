//! `.lims/` scaffolding.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};

use super::config::{LabConfig, write_config};
use super::request_store::{REQUEST_STORE_SCHEMA, write_ledger};
use crate::repository::RequestLedger;

/// Canonical paths within `.lims/` for a lab root.
#[derive(Debug, Clone)]
pub struct LimsPaths {
    pub root: PathBuf,
    pub lims_dir: PathBuf,
    pub state_dir: PathBuf,
    pub store_path: PathBuf,
    pub schema_path: PathBuf,
    pub config_path: PathBuf,
    pub audit_path: PathBuf,
}

impl LimsPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let lims_dir = root.join(".lims");
        let state_dir = lims_dir.join("state");
        Self {
            root,
            lims_dir: lims_dir.clone(),
            state_dir: state_dir.clone(),
            store_path: state_dir.join("requests.json"),
            schema_path: state_dir.join("schema.json"),
            config_path: lims_dir.join("config.toml"),
            audit_path: lims_dir.join("audit.jsonl"),
        }
    }

    /// Fail unless `lims init` has been run in this root.
    pub fn ensure_initialized(&self) -> Result<()> {
        if !self.store_path.is_file() || !self.schema_path.is_file() {
            return Err(anyhow!(
                "{} is not an initialized lab (run `lims init`)",
                self.root.display()
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    /// Overwrite an existing `.lims/`, discarding its requests.
    pub force: bool,
}

/// Create `.lims/` scaffolding in `root`.
///
/// Fails if `.lims/` already exists unless `options.force` is set. A forced
/// init keeps an existing `config.toml` and truncates the audit log.
pub fn init_lab(root: &Path, options: &InitOptions) -> Result<LimsPaths> {
    let paths = LimsPaths::new(root);
    if paths.lims_dir.exists() && !paths.lims_dir.is_dir() {
        return Err(anyhow!("lims init: .lims exists but is not a directory"));
    }
    if paths.lims_dir.exists() && !options.force {
        return Err(anyhow!(
            "lims init: .lims already exists (use --force to overwrite)"
        ));
    }

    fs::create_dir_all(&paths.state_dir)
        .with_context(|| format!("create directory {}", paths.state_dir.display()))?;
    fs::write(&paths.schema_path, REQUEST_STORE_SCHEMA)
        .with_context(|| format!("write file {}", paths.schema_path.display()))?;
    write_ledger(&paths.store_path, &RequestLedger::default())?;
    if !paths.config_path.exists() {
        write_config(&paths.config_path, &LabConfig::default())?;
    }
    fs::write(&paths.audit_path, "")
        .with_context(|| format!("write file {}", paths.audit_path.display()))?;

    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::config::load_config;
    use crate::io::request_store::load_ledger;
    use crate::service::ValidationMode;

    #[test]
    fn init_creates_expected_layout() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = init_lab(temp.path(), &InitOptions::default()).expect("init");

        assert!(paths.state_dir.is_dir());
        assert!(paths.config_path.is_file());
        assert!(paths.audit_path.is_file());
        paths.ensure_initialized().expect("initialized");

        let ledger = load_ledger(&paths.schema_path, &paths.store_path).expect("load");
        assert_eq!(ledger, RequestLedger::default());
        assert_eq!(
            fs::read_to_string(&paths.store_path).expect("read"),
            "{\n  \"version\": 1,\n  \"next_seq\": 1,\n  \"requests\": []\n}\n"
        );
    }

    #[test]
    fn init_without_force_refuses_existing_dir() {
        let temp = tempfile::tempdir().expect("tempdir");
        init_lab(temp.path(), &InitOptions::default()).expect("init");
        let err = init_lab(temp.path(), &InitOptions::default()).unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    /// A forced re-init resets state but leaves a customised config alone.
    #[test]
    fn init_with_force_resets_store_and_keeps_config() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = init_lab(temp.path(), &InitOptions::default()).expect("init");
        fs::write(&paths.config_path, "validation = \"lenient\"\n").expect("write");
        fs::write(&paths.audit_path, "junk\n").expect("write");

        init_lab(temp.path(), &InitOptions { force: true }).expect("re-init");

        let cfg = load_config(&paths.config_path).expect("config");
        assert_eq!(cfg.validation, ValidationMode::Lenient);
        assert_eq!(fs::read_to_string(&paths.audit_path).expect("read"), "");
    }

    #[test]
    fn uninitialized_root_is_reported() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = LimsPaths::new(temp.path()).ensure_initialized().unwrap_err();
        assert!(err.to_string().contains("lims init"));
    }
}
