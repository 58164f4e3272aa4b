//! Runtime settings read from the environment.
//!
//! Every setting is one row of [`SETTINGS`]: the field it fills, the
//! environment variable it is read from, and the rule that converts the
//! raw text. Adding a setting means adding a row; nothing is discovered by
//! reflection.

use pbix_archive::Compression;
use pbix_model::PartKind;

use crate::error::{ConversionError, Result};
use crate::requirements::PartRequirements;

/// Settings shared by the library and the CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Log filter directive, e.g. `info` or `pbix_core=debug`.
    pub log_level: Option<String>,
    /// One of `pretty`, `compact`, `json`.
    pub log_format: Option<String>,
    /// Part kinds whose failures are skipped instead of failing the run.
    pub optional_parts: Vec<PartKind>,
    /// Rewrite regenerated identifiers to their recorded stable values.
    pub stable_ids: bool,
    /// Compression of written packages.
    pub compression: Compression,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: None,
            log_format: None,
            optional_parts: Vec::new(),
            stable_ids: true,
            compression: Compression::Deflated,
        }
    }
}

type Rule = fn(&mut Settings, &str) -> std::result::Result<(), String>;

/// One environment-backed setting.
pub struct SettingDef {
    pub field: &'static str,
    pub variable: &'static str,
    pub description: &'static str,
    rule: Rule,
}

pub const SETTINGS: &[SettingDef] = &[
    SettingDef {
        field: "log_level",
        variable: "PBIXPROJ_LOG_LEVEL",
        description: "Log filter (error, warn, info, debug, trace or a directive list)",
        rule: |settings, raw| {
            settings.log_level = Some(raw.to_string());
            Ok(())
        },
    },
    SettingDef {
        field: "log_format",
        variable: "PBIXPROJ_LOG_FORMAT",
        description: "Log output format: pretty, compact or json",
        rule: |settings, raw| match raw.to_ascii_lowercase().as_str() {
            format @ ("pretty" | "compact" | "json") => {
                settings.log_format = Some(format.to_string());
                Ok(())
            }
            _ => Err("expected pretty, compact or json".to_string()),
        },
    },
    SettingDef {
        field: "optional_parts",
        variable: "PBIXPROJ_OPTIONAL_PARTS",
        description: "Comma-separated part kinds whose failures are skipped",
        rule: |settings, raw| {
            settings.optional_parts =
                PartRequirements::parse_kinds(raw).map_err(|e| e.to_string())?;
            Ok(())
        },
    },
    SettingDef {
        field: "stable_ids",
        variable: "PBIXPROJ_STABLE_IDS",
        description: "Keep identifiers stable across extractions (true/false)",
        rule: |settings, raw| {
            settings.stable_ids = parse_bool(raw)?;
            Ok(())
        },
    },
    SettingDef {
        field: "compression",
        variable: "PBIXPROJ_COMPRESSION",
        description: "Compression of written packages: deflated or stored",
        rule: |settings, raw| {
            settings.compression = raw.parse()?;
            Ok(())
        },
    },
];

impl Settings {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read settings through `lookup`. Unset and blank variables keep their
    /// defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut settings = Self::default();
        for def in SETTINGS {
            let Some(raw) = lookup(def.variable) else {
                continue;
            };
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }
            (def.rule)(&mut settings, raw).map_err(|reason| ConversionError::InvalidSetting {
                variable: def.variable,
                value: raw.to_string(),
                reason,
            })?;
            tracing::debug!(field = def.field, variable = def.variable, "setting from environment");
        }
        Ok(settings)
    }

    pub fn requirements(&self) -> PartRequirements {
        PartRequirements::with_optional(&self.optional_parts)
    }
}

fn parse_bool(raw: &str) -> std::result::Result<bool, String> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err("expected true or false".to_string()),
    }
}
