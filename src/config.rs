//! Configuration types for finetune-gateway

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
    time::Duration,
};

/// Main configuration for the gateway
///
/// Every field has a documented default, so `Config::default()` is a working
/// local setup. [`Config::from_env`] layers environment variables on top.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Where uploads and artifacts live
    #[serde(default)]
    pub storage: StorageConfig,

    /// External transformation steps
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// HTTP server settings
    #[serde(default)]
    pub server: ApiConfig,
}

/// Storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Working directory for uploads and step outputs (default: "uploads")
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
        }
    }
}

/// Pipeline configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Interpreter used to run the transformation scripts (default: "python3")
    #[serde(default = "default_interpreter")]
    pub interpreter: PathBuf,

    /// Directory containing the transformation scripts (default: "scripts")
    #[serde(default = "default_scripts_dir")]
    pub scripts_dir: PathBuf,

    /// Per-step time limit, `None` waits forever (default: 10 minutes)
    #[serde(default = "default_step_timeout", with = "optional_duration_serde")]
    pub step_timeout: Option<Duration>,

    /// Time between the polite termination signal and the hard kill (default: 5 seconds)
    #[serde(default = "default_kill_grace", with = "duration_serde")]
    pub kill_grace: Duration,

    /// What to verify about a step's output after a zero exit code
    #[serde(default)]
    pub output_check: OutputCheck,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            interpreter: default_interpreter(),
            scripts_dir: default_scripts_dir(),
            step_timeout: default_step_timeout(),
            kill_grace: default_kill_grace(),
            output_check: OutputCheck::default(),
        }
    }
}

impl PipelineConfig {
    /// Resolve the interpreter through PATH when it is a bare program name
    ///
    /// Falls back to the configured value so that spawning reports the real
    /// error later instead of failing at startup.
    pub fn resolve_interpreter(&self) -> PathBuf {
        if self.interpreter.components().count() > 1 {
            return self.interpreter.clone();
        }
        match which::which(&self.interpreter) {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!(
                    interpreter = ?self.interpreter,
                    error = %e,
                    "interpreter not found in PATH"
                );
                self.interpreter.clone()
            }
        }
    }
}

/// Output verification policy applied after a step exits with status 0
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputCheck {
    /// Trust the exit code alone
    Trust,
    /// Require the declared output file to exist
    #[default]
    Exists,
    /// Require the declared output file to exist and be non-empty
    NonEmpty,
}

impl std::str::FromStr for OutputCheck {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trust" => Ok(OutputCheck::Trust),
            "exists" => Ok(OutputCheck::Exists),
            "non-empty" | "nonempty" | "non_empty" => Ok(OutputCheck::NonEmpty),
            other => Err(Error::Config {
                message: format!(
                    "unknown output check {other:?}, expected trust, exists or non-empty"
                ),
                key: Some("OUTPUT_CHECK".to_string()),
            }),
        }
    }
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Address to bind to (default: 0.0.0.0:4000)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Enable Swagger UI at /swagger-ui (default: true)
    #[serde(default = "default_true")]
    pub swagger_ui: bool,

    /// Maximum request body size for uploads in bytes (default: 100 MiB)
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            swagger_ui: true,
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl Config {
    /// Build a configuration from process environment variables
    ///
    /// Unset variables keep their defaults. See [`Config::from_lookup`].
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable lookup
    ///
    /// Recognized keys: `UPLOAD_DIR`, `PYTHON_PATH`, `SCRIPTS_DIR`,
    /// `STEP_TIMEOUT_SECS` (0 disables the limit), `KILL_GRACE_SECS`,
    /// `OUTPUT_CHECK`, `HOST`, `PORT`, `CORS_ORIGINS` (comma separated),
    /// `MAX_UPLOAD_BYTES`. Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Config::default();

        if let Some(dir) = get("UPLOAD_DIR") {
            config.storage.upload_dir = PathBuf::from(dir);
        }
        if let Some(python) = get("PYTHON_PATH") {
            config.pipeline.interpreter = PathBuf::from(python);
        }
        if let Some(dir) = get("SCRIPTS_DIR") {
            config.pipeline.scripts_dir = PathBuf::from(dir);
        }
        if let Some(secs) = get("STEP_TIMEOUT_SECS") {
            let secs: u64 = parse_var("STEP_TIMEOUT_SECS", &secs)?;
            config.pipeline.step_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(secs) = get("KILL_GRACE_SECS") {
            config.pipeline.kill_grace = Duration::from_secs(parse_var("KILL_GRACE_SECS", &secs)?);
        }
        if let Some(check) = get("OUTPUT_CHECK") {
            config.pipeline.output_check = check.parse()?;
        }
        if let Some(host) = get("HOST") {
            let ip: IpAddr = parse_var("HOST", &host)?;
            config.server.bind_address.set_ip(ip);
        }
        if let Some(port) = get("PORT") {
            config.server.bind_address.set_port(parse_var("PORT", &port)?);
        }
        if let Some(origins) = get("CORS_ORIGINS") {
            config.server.cors_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(bytes) = get("MAX_UPLOAD_BYTES") {
            config.server.max_upload_bytes = parse_var("MAX_UPLOAD_BYTES", &bytes)?;
        }

        Ok(config)
    }

    /// Upload/working directory
    pub fn upload_dir(&self) -> &PathBuf {
        &self.storage.upload_dir
    }
}

fn parse_var<T>(key: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| Error::Config {
        message: format!("invalid value {value:?} for {key}: {e}"),
        key: Some(key.to_string()),
    })
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_interpreter() -> PathBuf {
    PathBuf::from("python3")
}

fn default_scripts_dir() -> PathBuf {
    PathBuf::from("scripts")
}

fn default_step_timeout() -> Option<Duration> {
    Some(Duration::from_secs(600))
}

fn default_kill_grace() -> Duration {
    Duration::from_secs(5)
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 4000)
}

fn default_true() -> bool {
    true
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_max_upload_bytes() -> usize {
    100 * 1024 * 1024
}

// Duration serialization helper (as seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Optional Duration serialization helper
mod optional_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<u64>::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.storage.upload_dir, PathBuf::from("uploads"));
        assert_eq!(config.pipeline.interpreter, PathBuf::from("python3"));
        assert_eq!(config.pipeline.scripts_dir, PathBuf::from("scripts"));
        assert_eq!(config.pipeline.step_timeout, Some(Duration::from_secs(600)));
        assert_eq!(config.pipeline.output_check, OutputCheck::Exists);
        assert_eq!(config.server.bind_address.port(), 4000);
        assert_eq!(config.server.cors_origins, vec!["*".to_string()]);
        assert!(config.server.cors_enabled);
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let config = Config::from_lookup(|_| None).unwrap();
        assert_eq!(config.upload_dir(), &PathBuf::from("uploads"));
        assert_eq!(config.server.bind_address, default_bind_address());
    }

    #[test]
    fn environment_overrides_are_applied() {
        let config = Config::from_lookup(lookup_from(&[
            ("UPLOAD_DIR", "/srv/data"),
            ("PYTHON_PATH", "/opt/venv/bin/python"),
            ("SCRIPTS_DIR", "/srv/scripts"),
            ("STEP_TIMEOUT_SECS", "30"),
            ("KILL_GRACE_SECS", "2"),
            ("OUTPUT_CHECK", "non-empty"),
            ("HOST", "127.0.0.1"),
            ("PORT", "8080"),
            ("CORS_ORIGINS", "https://a.example, https://b.example"),
            ("MAX_UPLOAD_BYTES", "1024"),
        ]))
        .unwrap();

        assert_eq!(config.storage.upload_dir, PathBuf::from("/srv/data"));
        assert_eq!(
            config.pipeline.interpreter,
            PathBuf::from("/opt/venv/bin/python")
        );
        assert_eq!(config.pipeline.scripts_dir, PathBuf::from("/srv/scripts"));
        assert_eq!(config.pipeline.step_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.pipeline.kill_grace, Duration::from_secs(2));
        assert_eq!(config.pipeline.output_check, OutputCheck::NonEmpty);
        assert_eq!(
            config.server.bind_address,
            "127.0.0.1:8080".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(
            config.server.cors_origins,
            vec!["https://a.example", "https://b.example"]
        );
        assert_eq!(config.server.max_upload_bytes, 1024);
    }

    #[test]
    fn zero_timeout_disables_limit() {
        let config = Config::from_lookup(lookup_from(&[("STEP_TIMEOUT_SECS", "0")])).unwrap();
        assert_eq!(config.pipeline.step_timeout, None);
    }

    #[test]
    fn blank_values_are_ignored() {
        let config = Config::from_lookup(lookup_from(&[("PORT", "  "), ("UPLOAD_DIR", "")])).unwrap();
        assert_eq!(config.server.bind_address.port(), 4000);
        assert_eq!(config.storage.upload_dir, PathBuf::from("uploads"));
    }

    #[test]
    fn invalid_port_is_a_config_error() {
        let err = Config::from_lookup(lookup_from(&[("PORT", "not-a-port")])).unwrap_err();
        match err {
            Error::Config { key, message } => {
                assert_eq!(key.as_deref(), Some("PORT"));
                assert!(message.contains("not-a-port"));
            }
            other => panic!("expected Config error, got {other:?}"),
        }
    }

    #[test]
    fn invalid_output_check_is_a_config_error() {
        let err = Config::from_lookup(lookup_from(&[("OUTPUT_CHECK", "maybe")])).unwrap_err();
        assert!(matches!(err, Error::Config { key: Some(ref k), .. } if k == "OUTPUT_CHECK"));
    }

    #[test]
    fn output_check_parses_aliases() {
        assert_eq!("trust".parse::<OutputCheck>().unwrap(), OutputCheck::Trust);
        assert_eq!("EXISTS".parse::<OutputCheck>().unwrap(), OutputCheck::Exists);
        assert_eq!(
            "non_empty".parse::<OutputCheck>().unwrap(),
            OutputCheck::NonEmpty
        );
    }

    #[test]
    fn deserializes_partial_json_with_defaults() {
        let json = r#"{
            "pipeline": { "interpreter": "/usr/bin/python3", "step_timeout": null, "output_check": "trust" },
            "server": { "bind_address": "127.0.0.1:9000" }
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.pipeline.interpreter, PathBuf::from("/usr/bin/python3"));
        assert_eq!(config.pipeline.step_timeout, None);
        assert_eq!(config.pipeline.output_check, OutputCheck::Trust);
        assert_eq!(config.pipeline.kill_grace, Duration::from_secs(5));
        assert_eq!(config.server.bind_address.port(), 9000);
        assert!(config.server.swagger_ui);
        assert_eq!(config.storage.upload_dir, PathBuf::from("uploads"));
    }

    #[test]
    fn durations_serialize_as_seconds() {
        let config = Config::default();
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["pipeline"]["step_timeout"], 600);
        assert_eq!(json["pipeline"]["kill_grace"], 5);
        assert_eq!(json["pipeline"]["output_check"], "exists");
    }

    #[test]
    fn explicit_interpreter_path_is_not_resolved() {
        let mut pipeline = PipelineConfig::default();
        pipeline.interpreter = PathBuf::from("/nonexistent/bin/python");
        assert_eq!(
            pipeline.resolve_interpreter(),
            PathBuf::from("/nonexistent/bin/python")
        );
    }

    #[test]
    fn missing_interpreter_falls_back_to_configured_name() {
        let mut pipeline = PipelineConfig::default();
        pipeline.interpreter = PathBuf::from("nonexistent-interpreter-xyz");
        assert_eq!(
            pipeline.resolve_interpreter(),
            PathBuf::from("nonexistent-interpreter-xyz")
        );
    }
}
