#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "https://freetsa.org/tsr";
pub const DEFAULT_TIMEOUT_SECS: f64 = 10.0;
pub const DEFAULT_RETRY_DELAYS: [f64; 3] = [0.5, 1.0, 2.0];

const MAX_TIMEOUT_SECS: f64 = 120.0;
const MAX_RETRY_DELAY_SECS: f64 = 60.0;
const MAX_RETRIES: usize = 10;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TsaMode {
    #[default]
    Mock,
    Real,
}

impl TsaMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "mock" => Some(Self::Mock),
            "real" => Some(Self::Real),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mock => "mock",
            Self::Real => "real",
        }
    }
}

/// Partial TSA settings. Used for the JSON config file, runtime overrides and
/// `POST /api/tsa/config` bodies alike.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TsaPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<TsaMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<f64>,
    /// Seconds to wait before each retry; its length bounds the number of attempts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<Vec<f64>>,
}

impl TsaPatch {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(endpoint) = self.endpoint.as_deref().map(str::trim)
            && !endpoint.is_empty()
            && !(endpoint.starts_with("http://") || endpoint.starts_with("https://"))
        {
            return Err("endpoint must be an http(s) URL".to_string());
        }
        if let Some(timeout) = self.timeout
            && !(timeout > 0.0 && timeout <= MAX_TIMEOUT_SECS)
        {
            return Err(format!("timeout must be in (0, {MAX_TIMEOUT_SECS}] seconds"));
        }
        if let Some(retries) = self.retries.as_ref() {
            if retries.len() > MAX_RETRIES {
                return Err(format!("at most {MAX_RETRIES} retry delays are allowed"));
            }
            if retries
                .iter()
                .any(|d| !(*d >= 0.0 && *d <= MAX_RETRY_DELAY_SECS))
            {
                return Err(format!(
                    "retry delays must be in [0, {MAX_RETRY_DELAY_SECS}] seconds"
                ));
            }
        }
        Ok(())
    }

    /// Layers `other` on top of `self`; blank strings in `other` leave the value untouched.
    pub fn merged(&self, other: &TsaPatch) -> TsaPatch {
        TsaPatch {
            mode: other.mode.or(self.mode),
            endpoint: non_blank(&other.endpoint).or_else(|| self.endpoint.clone()),
            api_key: non_blank(&other.api_key).or_else(|| self.api_key.clone()),
            timeout: other.timeout.or(self.timeout),
            retries: other.retries.clone().or_else(|| self.retries.clone()),
        }
    }

    fn endpoint(&self) -> Option<String> {
        non_blank(&self.endpoint)
    }

    fn api_key(&self) -> Option<String> {
        non_blank(&self.api_key)
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// `TSA_ENDPOINT` / `TSA_API_KEY`, captured once at startup.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TsaEnv {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
}

impl TsaEnv {
    pub fn from_process() -> Self {
        Self {
            endpoint: std::env::var("TSA_ENDPOINT").ok(),
            api_key: std::env::var("TSA_API_KEY").ok(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Layer {
    Override,
    Env,
    File,
    Default,
}

impl Layer {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Override => "override",
            Self::Env => "env",
            Self::File => "file",
            Self::Default => "default",
        }
    }
}

/// Effective settings after layering.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedTsa {
    pub mode: TsaMode,
    pub endpoint: String,
    pub endpoint_source: Layer,
    pub api_key: Option<String>,
    pub api_key_source: Layer,
    pub timeout: Duration,
    pub retry_delays: Vec<Duration>,
}

impl ResolvedTsa {
    /// Total attempts: one per retry delay, never fewer than one.
    pub fn max_attempts(&self) -> usize {
        self.retry_delays.len().max(1)
    }

    pub fn api_key_masked(&self) -> Option<String> {
        self.api_key.as_deref().map(|key| {
            let chars: Vec<char> = key.chars().collect();
            if chars.len() <= 4 {
                return "****".to_string();
            }
            let tail: String = chars[chars.len() - 4..].iter().collect();
            format!("****{tail}")
        })
    }
}

/// Runtime TSA configuration.
///
/// `endpoint` and `api_key` resolve as runtime override > environment > config file > default;
/// the other fields as override > file > default.
#[derive(Clone, Debug, Default)]
pub struct TsaSettings {
    env: TsaEnv,
    file: TsaPatch,
    overrides: TsaPatch,
    file_path: Option<PathBuf>,
}

impl TsaSettings {
    pub fn new(env: TsaEnv, file: TsaPatch, file_path: Option<PathBuf>) -> Self {
        Self {
            env,
            file,
            overrides: TsaPatch::default(),
            file_path,
        }
    }

    /// Reads the config file when present. A missing file is an empty layer; a malformed file is
    /// reported alongside an empty layer so startup can continue.
    pub fn load(env: TsaEnv, file_path: Option<PathBuf>) -> (Self, Option<String>) {
        let Some(path) = file_path.clone() else {
            return (Self::new(env, TsaPatch::default(), None), None);
        };
        match read_file(&path) {
            Ok(file) => (Self::new(env, file, file_path), None),
            Err(message) => (Self::new(env, TsaPatch::default(), file_path), Some(message)),
        }
    }

    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    pub fn resolve(&self) -> ResolvedTsa {
        let (endpoint, endpoint_source) = if let Some(v) = self.overrides.endpoint() {
            (v, Layer::Override)
        } else if let Some(v) = non_blank(&self.env.endpoint) {
            (v, Layer::Env)
        } else if let Some(v) = self.file.endpoint() {
            (v, Layer::File)
        } else {
            (DEFAULT_ENDPOINT.to_string(), Layer::Default)
        };

        let (api_key, api_key_source) = if let Some(v) = self.overrides.api_key() {
            (Some(v), Layer::Override)
        } else if let Some(v) = non_blank(&self.env.api_key) {
            (Some(v), Layer::Env)
        } else if let Some(v) = self.file.api_key() {
            (Some(v), Layer::File)
        } else {
            (None, Layer::Default)
        };

        let layered = self.file.merged(&self.overrides);
        let timeout = layered
            .timeout
            .filter(|t| *t > 0.0)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        let retry_delays = layered
            .retries
            .unwrap_or_else(|| DEFAULT_RETRY_DELAYS.to_vec())
            .into_iter()
            .map(|d| Duration::from_secs_f64(d.max(0.0)))
            .collect();

        ResolvedTsa {
            mode: layered.mode.unwrap_or_default(),
            endpoint,
            endpoint_source,
            api_key,
            api_key_source,
            timeout: Duration::from_secs_f64(timeout),
            retry_delays,
        }
    }

    /// Applies a validated patch as a runtime override.
    pub fn apply(&mut self, patch: &TsaPatch) -> Result<ResolvedTsa, String> {
        patch.validate()?;
        self.overrides = self.overrides.merged(patch);
        Ok(self.resolve())
    }

    /// Writes the file layer merged with the runtime overrides. Returns `Ok(false)` when no
    /// config file is configured.
    pub fn persist(&mut self) -> std::io::Result<bool> {
        let Some(path) = self.file_path.clone() else {
            return Ok(false);
        };
        let merged = self.file.merged(&self.overrides);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let body = serde_json::to_string_pretty(&merged).map_err(std::io::Error::other)?;
        std::fs::write(&path, body)?;
        self.file = merged;
        Ok(true)
    }
}

fn read_file(path: &Path) -> Result<TsaPatch, String> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(TsaPatch::default()),
        Err(err) => return Err(format!("read {}: {err}", path.display())),
    };
    if raw.trim().is_empty() {
        return Ok(TsaPatch::default());
    }
    let patch: TsaPatch =
        serde_json::from_str(&raw).map_err(|err| format!("parse {}: {err}", path.display()))?;
    patch
        .validate()
        .map_err(|err| format!("{}: {err}", path.display()))?;
    Ok(patch)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(endpoint: Option<&str>, api_key: Option<&str>) -> TsaEnv {
        TsaEnv {
            endpoint: endpoint.map(str::to_string),
            api_key: api_key.map(str::to_string),
        }
    }

    fn file_layer() -> TsaPatch {
        TsaPatch {
            endpoint: Some("https://file.example/tsa".to_string()),
            api_key: Some("file-key".to_string()),
            timeout: Some(3.0),
            retries: Some(vec![0.0, 0.1]),
            ..TsaPatch::default()
        }
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let resolved = TsaSettings::default().resolve();
        assert_eq!(resolved.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(resolved.endpoint_source, Layer::Default);
        assert_eq!(resolved.api_key, None);
        assert_eq!(resolved.mode, TsaMode::Mock);
        assert_eq!(resolved.timeout, Duration::from_secs(10));
        assert_eq!(resolved.max_attempts(), 3);
    }

    #[test]
    fn file_then_env_then_override() {
        let mut settings = TsaSettings::new(env(None, None), file_layer(), None);
        let resolved = settings.resolve();
        assert_eq!(resolved.endpoint, "https://file.example/tsa");
        assert_eq!(resolved.endpoint_source, Layer::File);
        assert_eq!(resolved.max_attempts(), 2);

        settings = TsaSettings::new(
            env(Some("https://env.example/tsa"), Some("env-key")),
            file_layer(),
            None,
        );
        let resolved = settings.resolve();
        assert_eq!(resolved.endpoint, "https://env.example/tsa");
        assert_eq!(resolved.api_key.as_deref(), Some("env-key"));
        assert_eq!(resolved.api_key_source, Layer::Env);

        let resolved = settings
            .apply(&TsaPatch {
                endpoint: Some("https://override.example/tsa".to_string()),
                ..TsaPatch::default()
            })
            .expect("apply");
        assert_eq!(resolved.endpoint, "https://override.example/tsa");
        assert_eq!(resolved.endpoint_source, Layer::Override);
        assert_eq!(resolved.api_key.as_deref(), Some("env-key"));
        assert_eq!(resolved.timeout, Duration::from_secs(3));
    }

    #[test]
    fn invalid_patches_are_rejected() {
        let mut settings = TsaSettings::default();
        for patch in [
            TsaPatch {
                endpoint: Some("ftp://nope".to_string()),
                ..TsaPatch::default()
            },
            TsaPatch {
                timeout: Some(0.0),
                ..TsaPatch::default()
            },
            TsaPatch {
                retries: Some(vec![-1.0]),
                ..TsaPatch::default()
            },
            TsaPatch {
                retries: Some(vec![0.0; 11]),
                ..TsaPatch::default()
            },
        ] {
            assert!(settings.apply(&patch).is_err(), "{patch:?}");
        }
        assert_eq!(settings.resolve(), TsaSettings::default().resolve());
    }

    #[test]
    fn empty_retry_list_still_makes_one_attempt() {
        let mut settings = TsaSettings::default();
        let resolved = settings
            .apply(&TsaPatch {
                retries: Some(Vec::new()),
                ..TsaPatch::default()
            })
            .expect("apply");
        assert_eq!(resolved.max_attempts(), 1);
    }

    #[test]
    fn persist_round_trips_through_the_file() {
        let dir = std::env::temp_dir().join(format!(
            "vu_tsa_settings_{}_{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        ));
        let path = dir.join("tsa_config.json");
        let (mut settings, warning) = TsaSettings::load(TsaEnv::default(), Some(path.clone()));
        assert!(warning.is_none());
        settings
            .apply(&TsaPatch {
                mode: Some(TsaMode::Real),
                endpoint: Some("https://persisted.example/tsa".to_string()),
                retries: Some(vec![0.25]),
                ..TsaPatch::default()
            })
            .expect("apply");
        assert!(settings.persist().expect("persist"));

        let (reloaded, warning) = TsaSettings::load(TsaEnv::default(), Some(path));
        assert!(warning.is_none());
        let resolved = reloaded.resolve();
        assert_eq!(resolved.mode, TsaMode::Real);
        assert_eq!(resolved.endpoint, "https://persisted.example/tsa");
        assert_eq!(resolved.endpoint_source, Layer::File);
        assert_eq!(resolved.retry_delays, vec![Duration::from_millis(250)]);
    }

    #[test]
    fn malformed_file_is_reported_not_fatal() {
        let dir = std::env::temp_dir().join(format!("vu_tsa_bad_{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("dir");
        let path = dir.join("bad.json");
        std::fs::write(&path, "{not json").expect("write");
        let (settings, warning) = TsaSettings::load(TsaEnv::default(), Some(path));
        assert!(warning.is_some());
        assert_eq!(settings.resolve().endpoint, DEFAULT_ENDPOINT);
    }

    #[test]
    fn api_key_is_masked() {
        let mut settings = TsaSettings::default();
        let resolved = settings
            .apply(&TsaPatch {
                api_key: Some("secret-1234".to_string()),
                ..TsaPatch::default()
            })
            .expect("apply");
        assert_eq!(resolved.api_key_masked().as_deref(), Some("****1234"));
    }
}
