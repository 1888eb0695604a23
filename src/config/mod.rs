use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// A reference to a secret value.
///
/// Supports three YAML forms:
///   - Plain string:  `token: "123:abc"`
///   - Env reference: `token: $BOT_TOKEN` or `token: "@BOT_TOKEN"`
///   - Pointer object: `token: { key: "BOT_TOKEN", source: "env" }`
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum SecretRef {
    /// Plain string or env-var / at-prefixed reference.
    Plain(String),
    /// Structured pointer: key + source (only "env" is supported).
    Pointer { key: String, source: String },
}

impl SecretRef {
    /// Resolve the reference to its value.  `$NAME` / `@NAME` strings
    /// and `source: env` pointers read the environment; anything else
    /// is returned verbatim.
    pub fn resolve(&self) -> anyhow::Result<String> {
        match self {
            SecretRef::Plain(s) => {
                if let Some(name) = s.strip_prefix('$').or_else(|| s.strip_prefix('@')) {
                    std::env::var(name).with_context(|| format!("env var {name} not set"))
                } else {
                    Ok(s.clone())
                }
            }
            SecretRef::Pointer { key, source } => {
                if source != "env" {
                    anyhow::bail!("unsupported secret source: {source}");
                }
                std::env::var(key).with_context(|| format!("env var {key} not set"))
            }
        }
    }
}

/// Top-level configuration loaded from `config.yaml`.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Channel (gateway) settings.
    #[serde(default)]
    pub channels: ChannelsConfig,
    /// Event-log directory override.  Relative paths resolve against
    /// the cogni home; default is `<cogni_home>/logs`.
    #[serde(default)]
    pub data_dir: Option<String>,
}

/// Channel connector settings.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelsConfig {
    /// Telegram gateway configuration.  Optional so the demo can run
    /// without any transport attached.
    #[serde(default)]
    pub telegram: Option<TelegramConfig>,
}

/// Telegram-specific channel config.
#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TelegramConfig {
    /// Bot token - plain string, env-var ref, or secret pointer.
    pub token: SecretRef,
}

impl Config {
    /// Read and parse a YAML configuration file.
    ///
    /// When `path` is the relative default (`config.yaml`) and missing,
    /// falls back to `<cogni_home>/config.yaml`; when that is missing
    /// too, returns the built-in defaults so the demo runs unconfigured.
    pub async fn load(path: &Path) -> anyhow::Result<Config> {
        let contents = match tokio::fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let filename = path.file_name().and_then(|f| f.to_str());
                let eligible = filename == Some("config.yaml") && path.is_relative();
                if eligible {
                    let home_path = crate::cogni_home().join("config.yaml");
                    match tokio::fs::read_to_string(&home_path).await {
                        Ok(c) => {
                            tracing::warn!(
                                attempted = %path.display(),
                                found = %home_path.display(),
                                "config file not found, falling back to cogni home"
                            );
                            c
                        }
                        Err(_) => {
                            tracing::warn!(
                                attempted = %path.display(),
                                "no config file found, using defaults"
                            );
                            return Ok(Config::default());
                        }
                    }
                } else {
                    return Err(e)
                        .with_context(|| format!("failed to read config file: {}", path.display()));
                }
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("failed to read config file: {}", path.display()));
            }
        };

        let mut config: Config =
            serde_yaml::from_str(&contents).context("failed to parse config YAML")?;
        config.validate()?;

        // Resolve a relative data_dir against cogni home.
        if let Some(ref dir) = config.data_dir {
            let p = Path::new(dir);
            if p.is_relative() {
                config.data_dir = Some(
                    crate::cogni_home()
                        .join(p)
                        .to_string_lossy()
                        .to_string(),
                );
            }
        }

        tracing::debug!(
            telegram = config.channels.telegram.is_some(),
            "configuration loaded"
        );

        Ok(config)
    }

    /// Validate semantic constraints that serde cannot enforce.
    fn validate(&self) -> anyhow::Result<()> {
        if let Some(ref tg) = self.channels.telegram {
            if let SecretRef::Plain(ref s) = tg.token {
                if s.trim().is_empty() {
                    anyhow::bail!("config: channels.telegram.token is empty");
                }
            }
        }
        if let Some(ref dir) = self.data_dir {
            if dir.trim().is_empty() {
                anyhow::bail!("config: data_dir is empty");
            }
        }
        Ok(())
    }

    /// Directory the event log should write under.
    pub fn event_log_dir(&self) -> PathBuf {
        self.data_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(crate::utils::logs_dir)
    }

    /// Serialize and write the configuration back to a YAML file.
    pub async fn save(&self, path: &Path) -> anyhow::Result<()> {
        let contents = serde_yaml::to_string(self).context("serialize config YAML")?;
        tokio::fs::write(path, &contents)
            .await
            .with_context(|| format!("failed to write config file: {}", path.display()))?;
        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }
}
