//! Lab configuration stored under `.lims/config.toml`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::service::ValidationMode;

/// Lab configuration (TOML).
///
/// This file is intended to be edited by humans. Missing fields default to
/// the values below.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LabConfig {
    /// Printed on request summaries.
    pub lab_name: String,

    /// ISO 4217 code shown next to amounts.
    pub currency: String,

    /// `strict` rejects invalid input, `lenient` lets billing clamp it.
    pub validation: ValidationMode,

    /// Prefix for generated request ids (`REQ` -> `REQ-000001`).
    pub id_prefix: String,
}

impl Default for LabConfig {
    fn default() -> Self {
        Self {
            lab_name: "Laboratory".to_string(),
            currency: "USD".to_string(),
            validation: ValidationMode::Strict,
            id_prefix: "REQ".to_string(),
        }
    }
}

impl LabConfig {
    pub fn validate(&self) -> Result<()> {
        if self.lab_name.trim().is_empty() {
            return Err(anyhow!("lab_name must not be empty"));
        }
        if self.currency.len() != 3 || !self.currency.bytes().all(|b| b.is_ascii_uppercase()) {
            return Err(anyhow!(
                "currency must be a 3-letter uppercase code (got '{}')",
                self.currency
            ));
        }
        if self.id_prefix.is_empty() || !self.id_prefix.bytes().all(|b| b.is_ascii_alphanumeric())
        {
            return Err(anyhow!(
                "id_prefix must be non-empty and alphanumeric (got '{}')",
                self.id_prefix
            ));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `LabConfig::default()`.
pub fn load_config(path: &Path) -> Result<LabConfig> {
    if !path.exists() {
        let cfg = LabConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: LabConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &LabConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    super::write_atomic(path, &buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, LabConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        let cfg = LabConfig {
            lab_name: "Northside Diagnostics".to_string(),
            currency: "KES".to_string(),
            validation: ValidationMode::Lenient,
            id_prefix: "NSD".to_string(),
        };
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "validation = \"lenient\"\n").expect("write");

        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.validation, ValidationMode::Lenient);
        assert_eq!(cfg.currency, "USD");
    }

    #[test]
    fn rejects_bad_currency_and_prefix() {
        let cfg = LabConfig {
            currency: "usd".to_string(),
            ..LabConfig::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = LabConfig {
            id_prefix: "R-Q".to_string(),
            ..LabConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn unknown_validation_mode_fails_to_parse() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "validation = \"loose\"\n").expect("write");
        assert!(load_config(&path).is_err());
    }
}
