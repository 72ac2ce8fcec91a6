//! Loader for the `heft` configuration: YAML files plus environment overlays.
//!
//! Precedence, lowest first:
//! 1. built-in defaults (every section is optional),
//! 2. YAML files in the order they were attached,
//! 3. `HEFT__SECTION__KEY` environment variables (e.g. `HEFT__SEARCH__RATE__QPS=2`),
//! 4. the bare `BRAVE_TOKEN`, `OPENAI_ENDPOINT`, `OPENAI_TOKEN` and `AI_MODEL` variables.
//!
//! String values may reference other variables as `${VAR}`; expansion happens
//! after merging and is repeated up to a fixed depth so chained references resolve.
use config::{Config, Environment, File, FileFormat};
use heft_common::JudgmentErrorPolicy;
use heft_common::observability::LogFormat;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;
const ENV_PREFIX: &str = "HEFT";
const ENV_SEPARATOR: &str = "__";

pub const DEFAULT_CONFIG_FILE: &str = "heft.yaml";
pub const DEFAULT_SEARCH_ENDPOINT: &str = "https://api.search.brave.com/";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/126.0 Safari/537.36";

/// Bare variable name -> config key.
const LEGACY_ENV: &[(&str, &str)] = &[
    ("BRAVE_TOKEN", "search.token"),
    ("OPENAI_ENDPOINT", "llm.endpoint"),
    ("OPENAI_TOKEN", "llm.token"),
    ("AI_MODEL", "llm.model"),
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Source(#[from] config::ConfigError),
    #[error("missing required setting {0}")]
    Missing(&'static str),
    #[error("invalid setting: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HeftConfig {
    pub search: SearchConfig,
    pub llm: LlmConfig,
    pub scraper: ScraperConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Brave subscription token.
    pub token: String,
    pub endpoint: String,
    pub rate: RateConfig,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            endpoint: DEFAULT_SEARCH_ENDPOINT.to_string(),
            rate: RateConfig::default(),
        }
    }
}

impl fmt::Debug for SearchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchConfig")
            .field("token", &redacted(&self.token))
            .field("endpoint", &self.endpoint)
            .field("rate", &self.rate)
            .finish()
    }
}

/// Steady request rate and burst for the search provider.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct RateConfig {
    pub qps: f64,
    pub burst: u32,
}

impl Default for RateConfig {
    fn default() -> Self {
        Self { qps: 1.0, burst: 1 }
    }
}

/// OpenAI-compatible chat completion endpoint.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub endpoint: String,
    pub token: String,
    pub model: String,
    pub temperature: Option<f32>,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            token: String::new(),
            model: String::new(),
            temperature: None,
            timeout_secs: 60,
        }
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("endpoint", &self.endpoint)
            .field("token", &redacted(&self.token))
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    /// Page fetches in flight at once.
    pub concurrency: usize,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            timeout_secs: 15,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl ScraperConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// URLs requested from the search provider per run.
    pub candidates: usize,
    pub on_judgment_error: JudgmentErrorPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            candidates: 5,
            on_judgment_error: JudgmentErrorPolicy::Abort,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Used when `RUST_LOG` is unset.
    pub filter: String,
    pub dir: Option<PathBuf>,
    pub stderr: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Text,
            filter: "info".to_string(),
            dir: None,
            stderr: true,
        }
    }
}

impl HeftConfig {
    /// Reject configurations the pipeline cannot run with.
    ///
    /// The four credentials are checked first so a bare environment reports
    /// the setting to supply rather than a downstream URL error.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require(&self.search.token, "search.token (BRAVE_TOKEN)")?;
        require(&self.llm.endpoint, "llm.endpoint (OPENAI_ENDPOINT)")?;
        require(&self.llm.token, "llm.token (OPENAI_TOKEN)")?;
        require(&self.llm.model, "llm.model (AI_MODEL)")?;

        check_url("search.endpoint", &self.search.endpoint)?;
        check_url("llm.endpoint", &self.llm.endpoint)?;

        let rate = self.search.rate;
        if !rate.qps.is_finite() || rate.qps <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "search.rate.qps must be positive, got {}",
                rate.qps
            )));
        }
        if rate.burst == 0 {
            return Err(ConfigError::Invalid(
                "search.rate.burst must be at least 1".into(),
            ));
        }
        if self.scraper.concurrency == 0 {
            return Err(ConfigError::Invalid(
                "scraper.concurrency must be at least 1".into(),
            ));
        }
        if self.scraper.timeout_secs == 0 || self.llm.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeouts must be non-zero".into()));
        }
        if self.pipeline.candidates == 0 {
            return Err(ConfigError::Invalid(
                "pipeline.candidates must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

fn require(value: &str, name: &'static str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        Err(ConfigError::Missing(name))
    } else {
        Ok(())
    }
}

fn check_url(name: &str, value: &str) -> Result<(), ConfigError> {
    let parsed =
        url::Url::parse(value).map_err(|e| ConfigError::Invalid(format!("{name}: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ConfigError::Invalid(format!(
            "{name}: unsupported scheme {other}"
        ))),
    }
}

fn redacted(secret: &str) -> &'static str {
    if secret.is_empty() { "<unset>" } else { "<redacted>" }
}

/// First existing candidate among `./heft.yaml` and `<config dir>/heft/heft.yaml`.
pub fn discover_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(DEFAULT_CONFIG_FILE);
    if local.is_file() {
        return Some(local);
    }
    dirs::config_dir()
        .map(|dir| dir.join("heft").join(DEFAULT_CONFIG_FILE))
        .filter(|p| p.is_file())
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder over the `config` crate. Environment sources are attached in
/// [`HeftConfigLoader::load`] so they always outrank files.
pub struct HeftConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for HeftConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl HeftConfigLoader {
    /// ```
    /// use heft_config::HeftConfigLoader;
    ///
    /// let cfg = HeftConfigLoader::new()
    ///     .with_yaml_str(
    ///         r#"
    /// search: { token: "brave" }
    /// llm: { endpoint: "http://localhost:8080/v1", token: "sk", model: "gpt-4o-mini" }
    /// "#,
    ///     )
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(cfg.pipeline.candidates, 5);
    /// assert_eq!(cfg.search.endpoint, "https://api.search.brave.com/");
    /// ```
    pub fn new() -> Self {
        Self {
            builder: Config::builder(),
        }
    }

    /// Attach a file that must exist; the format is inferred from the suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Attach a file that is skipped when absent, for deployments configured
    /// purely through the environment.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self.builder.add_source(File::from_str(yaml, FileFormat::Yaml));
        self
    }

    /// Merge every source, expand `${VAR}` placeholders and validate.
    pub fn load(self) -> Result<HeftConfig, ConfigError> {
        let mut builder = self.builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator(ENV_SEPARATOR)
                .separator(ENV_SEPARATOR),
        );
        for (var, key) in LEGACY_ENV {
            let value = std::env::var(var).ok().filter(|v| !v.trim().is_empty());
            builder = builder.set_override_option(*key, value)?;
        }

        let mut merged: Value = builder.build()?.try_deserialize()?;
        expand_env_in_value(&mut merged);

        // Round-trip through `config` so env-sourced strings like "4" still
        // deserialize into numeric fields.
        let typed: HeftConfig = Config::try_from(&merged)?.try_deserialize()?;
        typed.validate()?;
        Ok(typed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use serial_test::serial;

    const MINIMAL: &str = r#"
search: { token: "brave" }
llm: { endpoint: "https://llm.example/v1", token: "sk", model: "m" }
"#;

    #[test]
    fn expands_placeholders_inside_strings() {
        temp_env::with_var("HEFT_TEST_MODEL", Some("gpt-4o-mini"), || {
            let mut v = json!("model=${HEFT_TEST_MODEL}!");
            expand_env_in_value(&mut v);
            assert_eq!(v, json!("model=gpt-4o-mini!"));
        });
    }

    #[test]
    fn expands_nested_values_and_leaves_others_alone() {
        temp_env::with_vars(
            [("HEFT_T_HOST", Some("llm.local")), ("HEFT_T_PORT", Some("8080"))],
            || {
                let mut v = json!({
                    "llm": { "endpoint": "http://${HEFT_T_HOST}:${HEFT_T_PORT}/v1" },
                    "list": ["$HEFT_T_HOST", 3, false, null]
                });
                expand_env_in_value(&mut v);
                assert_eq!(
                    v,
                    json!({
                        "llm": { "endpoint": "http://llm.local:8080/v1" },
                        "list": ["llm.local", 3, false, null]
                    })
                );
            },
        );
    }

    #[test]
    fn chained_references_resolve() {
        temp_env::with_vars(
            [
                ("HEFT_T_INNER", Some("sk-123")),
                ("HEFT_T_OUTER", Some("Bearer ${HEFT_T_INNER}")),
            ],
            || {
                let mut v = json!("${HEFT_T_OUTER}");
                expand_env_in_value(&mut v);
                assert_eq!(v, json!("Bearer sk-123"));
            },
        );
    }

    #[test]
    fn cyclic_references_terminate() {
        temp_env::with_vars(
            [("HEFT_T_A", Some("${HEFT_T_B}")), ("HEFT_T_B", Some("${HEFT_T_A}"))],
            || {
                let mut v = json!("<${HEFT_T_A}>");
                expand_env_in_value(&mut v);
                let s = v.as_str().unwrap();
                assert!(s.starts_with('<') && s.ends_with('>'));
                assert!(s.contains("${"));
            },
        );
    }

    #[test]
    fn unknown_placeholders_survive() {
        let mut v = json!("${HEFT_T_DOES_NOT_EXIST}");
        expand_env_in_value(&mut v);
        assert_eq!(v, json!("${HEFT_T_DOES_NOT_EXIST}"));
    }

    #[test]
    fn debug_output_hides_tokens() {
        let cfg = HeftConfig {
            search: SearchConfig {
                token: "brave-secret".into(),
                ..Default::default()
            },
            ..Default::default()
        };
        let dbg = format!("{cfg:?}");
        assert!(!dbg.contains("brave-secret"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    #[serial]
    fn defaults_fill_optional_sections() {
        let cfg = temp_env::with_vars_unset(
            ["BRAVE_TOKEN", "OPENAI_ENDPOINT", "OPENAI_TOKEN", "AI_MODEL"],
            || HeftConfigLoader::new().with_yaml_str(MINIMAL).load(),
        )
        .unwrap();
        assert_eq!(cfg.search.rate, RateConfig { qps: 1.0, burst: 1 });
        assert_eq!(cfg.scraper.concurrency, 4);
        assert_eq!(cfg.scraper.timeout(), Duration::from_secs(15));
        assert_eq!(cfg.llm.timeout(), Duration::from_secs(60));
        assert_eq!(cfg.pipeline.on_judgment_error, JudgmentErrorPolicy::Abort);
        assert_eq!(cfg.logging.format, LogFormat::Text);
        assert!(cfg.logging.stderr);
    }

    #[test]
    fn validate_names_the_first_missing_credential() {
        let mut cfg = HeftConfig::default();
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Missing("search.token (BRAVE_TOKEN)"))
        ));
        cfg.search.token = "t".into();
        cfg.llm.endpoint = "https://llm.example/v1".into();
        cfg.llm.token = "  ".into();
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Missing("llm.token (OPENAI_TOKEN)"))
        ));
    }

    #[test]
    fn validate_rejects_bad_rate_and_urls() {
        let mut cfg = HeftConfig::default();
        cfg.search.token = "t".into();
        cfg.llm.endpoint = "https://llm.example/v1".into();
        cfg.llm.token = "t".into();
        cfg.llm.model = "m".into();
        assert!(cfg.validate().is_ok());

        cfg.search.rate.qps = 0.0;
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
        cfg.search.rate.qps = 1.0;
        cfg.search.rate.burst = 0;
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
        cfg.search.rate.burst = 1;
        cfg.llm.endpoint = "ftp://llm.example".into();
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }
}
