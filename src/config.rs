#![forbid(unsafe_code)]

use anyhow::{Context, Result, anyhow};
use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

pub const DEFAULT_ENV_PATH: &str = ".env";
pub const DEFAULT_DB_PATH: &str = "transcripts.db";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 20;
pub const DEFAULT_CAPTION_LANG: &str = "en";
pub const DEFAULT_SUMMARY_MAX_TOKENS: u32 = 50;
pub const DEFAULT_TRANSCRIPT_MAX_TOKENS: u32 = 200;

/// Credentials and endpoint for the text generation provider. Passed
/// explicitly into the generator instead of living in process-wide state.
#[derive(Clone)]
pub struct GenerationCredentials {
    pub api_key: String,
    pub api_url: String,
    pub model: String,
}

impl std::fmt::Debug for GenerationCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationCredentials")
            .field("api_key", &"<redacted>")
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .finish()
    }
}

/// Token budgets handed to the generator for each prompt kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationLimits {
    pub summary_max_tokens: u32,
    pub transcript_max_tokens: u32,
}

impl Default for GenerationLimits {
    fn default() -> Self {
        Self {
            summary_max_tokens: DEFAULT_SUMMARY_MAX_TOKENS,
            transcript_max_tokens: DEFAULT_TRANSCRIPT_MAX_TOKENS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub credentials: GenerationCredentials,
    pub provider_timeout: Duration,
    pub caption_lang: String,
    pub limits: GenerationLimits,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub db_path: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub env_path: Option<PathBuf>,
}

pub fn resolve_service_config(overrides: ConfigOverrides) -> Result<ServiceConfig> {
    let env_path = overrides
        .env_path
        .as_deref()
        .unwrap_or_else(|| Path::new(DEFAULT_ENV_PATH));
    let file_vars = read_env_file(env_path)?;
    build_service_config_with_overrides(&file_vars, env_var_string, overrides)
}

#[cfg(test)]
fn build_service_config(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
) -> Result<ServiceConfig> {
    build_service_config_with_overrides(file_vars, env_lookup, ConfigOverrides::default())
}

fn build_service_config_with_overrides(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
    overrides: ConfigOverrides,
) -> Result<ServiceConfig> {
    let api_key = lookup_value("OPENAI_API_KEY", file_vars, &env_lookup)
        .ok_or_else(|| anyhow!("OPENAI_API_KEY not set"))?;
    let api_url = lookup_value("OPENAI_API_URL", file_vars, &env_lookup)
        .unwrap_or_else(|| DEFAULT_OPENAI_API_URL.to_string());
    let model = lookup_value("OPENAI_MODEL", file_vars, &env_lookup)
        .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string());

    let db_path = overrides
        .db_path
        .or_else(|| lookup_value("TUBESCRIBE_DB_PATH", file_vars, &env_lookup).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH));
    let port = overrides
        .port
        .or_else(|| parsed_value("TUBESCRIBE_PORT", file_vars, &env_lookup))
        .unwrap_or(DEFAULT_PORT);
    let host = overrides
        .host
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .or_else(|| lookup_value("TUBESCRIBE_HOST", file_vars, &env_lookup))
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_HOST.to_string());

    let timeout_secs = parsed_value::<u64>("TUBESCRIBE_PROVIDER_TIMEOUT_SECS", file_vars, &env_lookup)
        .filter(|secs| *secs > 0)
        .unwrap_or(DEFAULT_PROVIDER_TIMEOUT_SECS);
    let caption_lang = lookup_value("TUBESCRIBE_CAPTION_LANG", file_vars, &env_lookup)
        .unwrap_or_else(|| DEFAULT_CAPTION_LANG.to_string());
    let limits = GenerationLimits {
        summary_max_tokens: parsed_value::<u32>("TUBESCRIBE_SUMMARY_MAX_TOKENS", file_vars, &env_lookup)
            .filter(|tokens| *tokens > 0)
            .unwrap_or(DEFAULT_SUMMARY_MAX_TOKENS),
        transcript_max_tokens: parsed_value::<u32>(
            "TUBESCRIBE_TRANSCRIPT_MAX_TOKENS",
            file_vars,
            &env_lookup,
        )
        .filter(|tokens| *tokens > 0)
        .unwrap_or(DEFAULT_TRANSCRIPT_MAX_TOKENS),
    };

    Ok(ServiceConfig {
        db_path,
        host,
        port,
        credentials: GenerationCredentials {
            api_key,
            api_url,
            model,
        },
        provider_timeout: Duration::from_secs(timeout_secs),
        caption_lang,
        limits,
    })
}

fn env_var_string(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn lookup_value(
    key: &str,
    file_vars: &HashMap<String, String>,
    env_lookup: &impl Fn(&str) -> Option<String>,
) -> Option<String> {
    env_lookup(key)
        .or_else(|| file_vars.get(key).cloned())
        .filter(|value| !value.trim().is_empty())
}

fn parsed_value<T: std::str::FromStr>(
    key: &str,
    file_vars: &HashMap<String, String>,
    env_lookup: &impl Fn(&str) -> Option<String>,
) -> Option<T> {
    lookup_value(key, file_vars, env_lookup).and_then(|value| value.trim().parse::<T>().ok())
}

pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    let mut vars = HashMap::new();
    if !path.exists() {
        return Ok(vars);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let line = trimmed.strip_prefix("export ").unwrap_or(trimmed);
        let Some((key, value_raw)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let value = value_raw.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|value| value.strip_suffix('"'))
            .or_else(|| {
                value
                    .strip_prefix('\'')
                    .and_then(|value| value.strip_suffix('\''))
            })
            .unwrap_or(value);
        vars.insert(key.to_string(), value.to_string());
    }
    Ok(vars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn make_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", contents).unwrap();
        file
    }

    fn config_from(contents: &str) -> ServiceConfig {
        let cfg = make_config(contents);
        let vars = read_env_file(cfg.path()).unwrap();
        build_service_config(&vars, |_| None).unwrap()
    }

    #[test]
    fn missing_api_key_is_an_error() {
        let err = build_service_config(&HashMap::new(), |_| None).unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY not set"));
    }

    #[test]
    fn defaults_fill_optional_values() {
        let config = config_from("OPENAI_API_KEY=\"sk-test\"\n");
        assert_eq!(config.credentials.api_key, "sk-test");
        assert_eq!(config.credentials.api_url, DEFAULT_OPENAI_API_URL);
        assert_eq!(config.credentials.model, DEFAULT_OPENAI_MODEL);
        assert_eq!(config.db_path, PathBuf::from(DEFAULT_DB_PATH));
        assert_eq!(config.host, DEFAULT_HOST);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(
            config.provider_timeout,
            Duration::from_secs(DEFAULT_PROVIDER_TIMEOUT_SECS)
        );
        assert_eq!(config.caption_lang, "en");
        assert_eq!(config.limits, GenerationLimits::default());
    }

    #[test]
    fn reads_every_key_from_file() {
        let config = config_from(
            "OPENAI_API_KEY=k\nOPENAI_API_URL=http://llm.local/v1\nOPENAI_MODEL=tiny\n\
             TUBESCRIBE_DB_PATH=/data/t.db\nTUBESCRIBE_HOST=0.0.0.0\nTUBESCRIBE_PORT=9090\n\
             TUBESCRIBE_PROVIDER_TIMEOUT_SECS=5\nTUBESCRIBE_CAPTION_LANG=de\n\
             TUBESCRIBE_SUMMARY_MAX_TOKENS=80\nTUBESCRIBE_TRANSCRIPT_MAX_TOKENS=400\n",
        );
        assert_eq!(config.credentials.api_url, "http://llm.local/v1");
        assert_eq!(config.credentials.model, "tiny");
        assert_eq!(config.db_path, PathBuf::from("/data/t.db"));
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 9090);
        assert_eq!(config.provider_timeout, Duration::from_secs(5));
        assert_eq!(config.caption_lang, "de");
        assert_eq!(config.limits.summary_max_tokens, 80);
        assert_eq!(config.limits.transcript_max_tokens, 400);
    }

    #[test]
    fn env_wins_over_file() {
        let vars = read_env_file(make_config("OPENAI_API_KEY=file\nTUBESCRIBE_PORT=7000\n").path())
            .unwrap();
        let config = build_service_config(&vars, |key| match key {
            "OPENAI_API_KEY" => Some("env".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.credentials.api_key, "env");
        assert_eq!(config.port, 7000);
    }

    #[test]
    fn overrides_win_over_env_and_file() {
        let mut vars = HashMap::new();
        vars.insert("OPENAI_API_KEY".to_string(), "k".to_string());
        vars.insert("TUBESCRIBE_HOST".to_string(), "file-host".to_string());
        vars.insert("TUBESCRIBE_DB_PATH".to_string(), "/file.db".to_string());

        let config = build_service_config_with_overrides(
            &vars,
            |key| {
                if key == "TUBESCRIBE_PORT" {
                    Some("8000".to_string())
                } else {
                    None
                }
            },
            ConfigOverrides {
                db_path: Some(PathBuf::from("/override.db")),
                host: Some("override-host".into()),
                port: Some(9000),
                env_path: None,
            },
        )
        .unwrap();

        assert_eq!(config.db_path, PathBuf::from("/override.db"));
        assert_eq!(config.host, "override-host");
        assert_eq!(config.port, 9000);
    }

    #[test]
    fn blank_host_override_falls_back() {
        let vars = read_env_file(make_config("OPENAI_API_KEY=k\n").path()).unwrap();
        let config = build_service_config_with_overrides(
            &vars,
            |_| None,
            ConfigOverrides {
                host: Some("   ".into()),
                ..ConfigOverrides::default()
            },
        )
        .unwrap();
        assert_eq!(config.host, DEFAULT_HOST);
    }

    #[test]
    fn invalid_numbers_use_defaults() {
        let config = config_from(
            "OPENAI_API_KEY=k\nTUBESCRIBE_PORT=nope\nTUBESCRIBE_PROVIDER_TIMEOUT_SECS=0\n\
             TUBESCRIBE_SUMMARY_MAX_TOKENS=-3\n",
        );
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(
            config.provider_timeout,
            Duration::from_secs(DEFAULT_PROVIDER_TIMEOUT_SECS)
        );
        assert_eq!(config.limits.summary_max_tokens, DEFAULT_SUMMARY_MAX_TOKENS);
    }

    #[test]
    fn read_env_file_handles_export_and_quotes() {
        let cfg = make_config(
            r#"
            export OPENAI_API_KEY="sk-1"
            TUBESCRIBE_DB_PATH='/srv/t.db'
            TUBESCRIBE_HOST =  "0.0.0.0"
            # comment
            INVALID_LINE
            "#,
        );
        let vars = read_env_file(cfg.path()).unwrap();
        assert_eq!(vars.get("OPENAI_API_KEY").unwrap(), "sk-1");
        assert_eq!(vars.get("TUBESCRIBE_DB_PATH").unwrap(), "/srv/t.db");
        assert_eq!(vars.get("TUBESCRIBE_HOST").unwrap(), "0.0.0.0");
        assert!(!vars.contains_key("INVALID_LINE"));
    }

    #[test]
    fn read_env_file_missing_file_returns_empty() {
        let dir = tempfile::tempdir().unwrap();
        let vars = read_env_file(&dir.path().join("missing.env")).unwrap();
        assert!(vars.is_empty());
    }

    #[test]
    fn credentials_debug_hides_key() {
        let config = config_from("OPENAI_API_KEY=super-secret\n");
        let rendered = format!("{:?}", config.credentials);
        assert!(!rendered.contains("super-secret"));
    }
}
