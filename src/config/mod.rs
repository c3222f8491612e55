//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{path::PathBuf, str::FromStr};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use uuid::Uuid;

pub use cli::{CliArgs, Command, GlobalOverrides, ImportArgs, KeysArgs, LookupArgs, TreeArgs};

use crate::{
    application::{
        events::OriginatorId,
        module::ModuleOptions,
        provider::{DEFAULT_PROVIDER_NAME, ProviderOptions},
    },
    domain::Language,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "glossa";
const ENV_PREFIX: &str = "GLOSSA";
const DEFAULT_SITE_ID: &str = "default";
const DEFAULT_MASTER_LANGUAGE: &str = "en";
const DEFAULT_MASTER_LANGUAGE_NAME: &str = "English";

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub localization: LocalizationSettings,
    pub tree: TreeSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct LocalizationSettings {
    pub enabled: bool,
    pub is_primary_provider: bool,
    pub provider_name: String,
    pub site_id: String,
    pub master_language: Language,
    pub originator_id: Option<Uuid>,
}

impl LocalizationSettings {
    pub fn module_options(&self) -> ModuleOptions {
        ModuleOptions {
            enabled: self.enabled,
            is_primary_provider: self.is_primary_provider,
            provider: self.provider_options(),
            originator: self.originator_id.map(OriginatorId),
        }
    }

    pub fn provider_options(&self) -> ProviderOptions {
        ProviderOptions {
            name: self.provider_name.clone(),
            site_id: self.site_id.clone(),
            master: self.master_language.clone(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TreeSettings {
    pub snapshot: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_global_overrides(&cli.overrides);
    if let Some(tree) = cli.command.tree_args().tree.as_ref() {
        raw.tree.snapshot = Some(tree.clone());
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    localization: RawLocalizationSettings,
    tree: RawTreeSettings,
}

impl RawSettings {
    fn apply_global_overrides(&mut self, overrides: &GlobalOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(site_id) = overrides.site_id.as_ref() {
            self.localization.site_id = Some(site_id.clone());
        }
        if let Some(code) = overrides.master_language.as_ref() {
            self.localization.master_language = Some(code.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            localization,
            tree,
        } = raw;

        let logging = build_logging_settings(logging)?;
        let localization = build_localization_settings(localization)?;
        let tree = build_tree_settings(tree);

        Ok(Self {
            logging,
            localization,
            tree,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_localization_settings(
    localization: RawLocalizationSettings,
) -> Result<LocalizationSettings, LoadError> {
    let provider_name = non_blank(localization.provider_name, "localization.provider_name")?
        .unwrap_or_else(|| DEFAULT_PROVIDER_NAME.to_string());
    let site_id = non_blank(localization.site_id, "localization.site_id")?
        .unwrap_or_else(|| DEFAULT_SITE_ID.to_string());
    let master_code = non_blank(localization.master_language, "localization.master_language")?
        .unwrap_or_else(|| DEFAULT_MASTER_LANGUAGE.to_string());
    let master_name = non_blank(
        localization.master_language_name,
        "localization.master_language_name",
    )?
    .unwrap_or_else(|| DEFAULT_MASTER_LANGUAGE_NAME.to_string());

    let originator_id = localization
        .originator_id
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .map(|value| {
            Uuid::parse_str(&value).map_err(|err| {
                LoadError::invalid("localization.originator_id", format!("not a UUID: {err}"))
            })
        })
        .transpose()?;

    Ok(LocalizationSettings {
        enabled: localization.enabled.unwrap_or(false),
        is_primary_provider: localization.is_primary_provider.unwrap_or(false),
        provider_name,
        site_id,
        master_language: Language::new(master_code, master_name.clone(), master_name),
        originator_id,
    })
}

fn build_tree_settings(tree: RawTreeSettings) -> TreeSettings {
    TreeSettings {
        snapshot: tree
            .snapshot
            .filter(|path| !path.as_os_str().is_empty()),
    }
}

fn non_blank(value: Option<String>, key: &'static str) -> Result<Option<String>, LoadError> {
    match value {
        Some(value) if value.trim().is_empty() => {
            Err(LoadError::invalid(key, "must not be blank"))
        }
        Some(value) => Ok(Some(value.trim().to_string())),
        None => Ok(None),
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLocalizationSettings {
    enabled: Option<bool>,
    is_primary_provider: Option<bool>,
    provider_name: Option<String>,
    site_id: Option<String>,
    master_language: Option<String>,
    master_language_name: Option<String>,
    originator_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawTreeSettings {
    snapshot: Option<PathBuf>,
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
