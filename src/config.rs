//! Settings
//!
//! Layered configuration with this precedence (lowest first):
//! 1. Built-in defaults
//! 2. `~/.proposal-forge/config.toml`
//! 3. `./proposal-forge.toml`
//! 4. A file passed with `--config`
//! 5. Environment variables prefixed with `PROPOSAL_FORGE__`, nested with `__`
//!    (for example `PROPOSAL_FORGE__LLM__MODEL`)
//!
//! `.env` files are read first so their variables take part in step 5. When
//! no API key is configured, the provider's conventional variable
//! (`GOOGLE_API_KEY` or `OPENAI_API_KEY`) is used.

use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use proposal_forge_llm::{ProviderConfig, ProviderType, DEFAULT_MODEL};

use crate::services::agent_composer::AgentConfig;
use crate::services::proposal::PipelineOptions;
use crate::utils::error::{AppError, AppResult};
use crate::utils::paths;

/// Prefix of the environment variables read as settings.
pub const ENV_PREFIX: &str = "PROPOSAL_FORGE";
/// Separator between the prefix and nested keys.
pub const ENV_SEPARATOR: &str = "__";

/// All settings of the application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub llm: LlmSettings,
    pub pipeline: PipelineSettings,
    pub session: SessionSettings,
    pub logging: LoggingSettings,
}

/// Model provider settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub provider: ProviderType,
    /// API key; falls back to the provider's conventional variable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    pub timeout_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_url: Option<String>,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: ProviderType::Gemini,
            api_key: None,
            base_url: None,
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 8192,
            temperature: None,
            timeout_secs: 120,
            proxy_url: None,
        }
    }
}

/// Behaviour of the proposal pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Cap on writer/evaluator rounds
    pub max_refinements: u32,
    /// Evaluator answer that ends refinement
    pub approval_sentinel: String,
    /// Cap on model calls within one agent turn
    pub max_tool_rounds: u32,
    /// Query used instead of the built-in one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_refinements: 3,
            approval_sentinel: "APPROVED".to_string(),
            max_tool_rounds: 10,
            query: None,
        }
    }
}

/// Identity of the session a run happens in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub app_name: String,
    pub user_id: String,
    pub session_id: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            app_name: "ResearchProposalSystem".to_string(),
            user_id: "student_researcher".to_string(),
            session_id: "research_session".to_string(),
        }
    }
}

/// Log file settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub file: PathBuf,
    /// Filter directive, e.g. `debug` or `proposal_forge=trace`
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            file: PathBuf::from("agent.log"),
            level: "debug".to_string(),
        }
    }
}

/// Where loaded settings came from.
///
/// Settings are read before logging is configured, so the caller logs this
/// once the subscriber is installed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigSources {
    /// `.env` file whose variables were loaded.
    pub env_file: Option<PathBuf>,
    /// Config files that existed and were layered in, lowest precedence first.
    pub files: Vec<PathBuf>,
}

impl ConfigSources {
    pub fn log(&self) {
        match &self.env_file {
            Some(path) => tracing::debug!(path = %path.display(), "loaded .env file"),
            None => tracing::debug!("no .env file"),
        }
        tracing::info!(files = ?self.files, "configuration loaded");
    }
}

impl Settings {
    /// Load settings from every layer.
    pub fn load(explicit: Option<&Path>) -> AppResult<Self> {
        Self::load_with_sources(explicit).map(|(settings, _)| settings)
    }

    /// Load settings from every layer and report the sources used.
    pub fn load_with_sources(explicit: Option<&Path>) -> AppResult<(Self, ConfigSources)> {
        let env_file = Self::load_env_file()?;

        let mut files = Vec::new();
        if let Ok(path) = paths::config_path() {
            files.push(path);
        }
        files.push(paths::local_config_path());

        let env = Environment::with_prefix(ENV_PREFIX)
            .prefix_separator(ENV_SEPARATOR)
            .separator(ENV_SEPARATOR)
            .try_parsing(true);

        let mut settings = Self::load_from(&files, explicit, Some(env))?;
        settings.apply_api_key_fallback(|name| std::env::var(name).ok());

        let mut used: Vec<PathBuf> = files.into_iter().filter(|p| p.exists()).collect();
        used.extend(explicit.map(Path::to_path_buf));
        Ok((
            settings,
            ConfigSources {
                env_file,
                files: used,
            },
        ))
    }

    /// Load from the given optional files, a required explicit file and an
    /// optional environment source.
    pub fn load_from(
        files: &[PathBuf],
        explicit: Option<&Path>,
        env: Option<Environment>,
    ) -> AppResult<Self> {
        let defaults = Config::try_from(&Settings::default())?;
        let mut builder = Config::builder().add_source(defaults);

        for path in files {
            builder = builder.add_source(File::from(path.as_path()).required(false));
        }
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(AppError::config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            builder = builder.add_source(File::from(path));
        }
        if let Some(env) = env {
            builder = builder.add_source(env);
        }

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read `.env` from the working directory or its parents, if present.
    pub fn load_env_file() -> AppResult<Option<PathBuf>> {
        match dotenvy::dotenv() {
            Ok(path) => Ok(Some(path)),
            Err(e) if e.not_found() => Ok(None),
            Err(e) => Err(AppError::config(format!("Failed to read .env file: {}", e))),
        }
    }

    /// Fill a missing API key from the provider's conventional variable.
    pub fn apply_api_key_fallback<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.llm.api_key.as_deref().map_or(true, str::is_empty) {
            self.llm.api_key = lookup(self.llm.provider.api_key_env()).filter(|k| !k.is_empty());
        }
    }

    fn validate(&self) -> AppResult<()> {
        if self.llm.model.trim().is_empty() {
            return Err(AppError::config("llm.model cannot be empty"));
        }
        if self.pipeline.approval_sentinel.trim().is_empty() {
            return Err(AppError::config("pipeline.approval_sentinel cannot be empty"));
        }
        if self.pipeline.max_tool_rounds == 0 {
            return Err(AppError::config("pipeline.max_tool_rounds must be at least 1"));
        }
        Ok(())
    }

    /// Whether an API key is available.
    pub fn has_api_key(&self) -> bool {
        self.llm.api_key.is_some()
    }

    /// Provider configuration for the LLM crate.
    pub fn provider_config(&self) -> ProviderConfig {
        ProviderConfig {
            provider: self.llm.provider,
            api_key: self.llm.api_key.clone(),
            base_url: self.llm.base_url.clone(),
            model: self.llm.model.clone(),
            max_tokens: self.llm.max_tokens,
            temperature: self.llm.temperature,
            timeout_secs: self.llm.timeout_secs,
            proxy_url: self.llm.proxy_url.clone(),
            ..ProviderConfig::default()
        }
    }

    /// Options of the default proposal pipeline.
    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            model: self.llm.model.clone(),
            max_refinements: self.pipeline.max_refinements,
            approval_sentinel: self.pipeline.approval_sentinel.clone(),
        }
    }

    /// Configuration handed to every agent by the runner.
    pub fn agent_config(&self) -> AgentConfig {
        AgentConfig {
            max_iterations: self.pipeline.max_tool_rounds,
            temperature: self.llm.temperature,
        }
    }

    /// Render as TOML, without the API key.
    pub fn to_toml(&self) -> AppResult<String> {
        let mut redacted = self.clone();
        redacted.llm.api_key = None;
        Ok(toml::to_string_pretty(&redacted)?)
    }

    /// Write a starter config file. Refuses to overwrite unless `force`.
    pub fn write_starter(path: &Path, force: bool) -> AppResult<()> {
        if path.exists() && !force {
            return Err(AppError::validation(format!(
                "{} already exists (use --force to overwrite)",
                path.display()
            )));
        }
        paths::ensure_parent_dir(path)?;
        std::fs::write(path, Settings::default().to_toml()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::load_from(&[], None, None).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.llm.model, "gemini-2.5-flash-lite");
        assert_eq!(settings.pipeline.max_refinements, 3);
        assert_eq!(settings.session.user_id, "student_researcher");
        assert_eq!(settings.logging.file, PathBuf::from("agent.log"));
    }

    #[test]
    fn test_file_layers_override_in_order() {
        let dir = TempDir::new().unwrap();
        let global = write_file(
            &dir,
            "global.toml",
            "[llm]\nmodel = \"gemini-2.5-pro\"\n[pipeline]\nmax_refinements = 5\n",
        );
        let local = write_file(&dir, "local.toml", "[pipeline]\nmax_refinements = 2\n");
        let explicit = write_file(
            &dir,
            "explicit.toml",
            "[session]\nuser_id = \"alice\"\n[logging]\nlevel = \"info\"\n",
        );

        let settings = Settings::load_from(&[global, local], Some(&explicit), None).unwrap();
        assert_eq!(settings.llm.model, "gemini-2.5-pro");
        assert_eq!(settings.pipeline.max_refinements, 2);
        assert_eq!(settings.session.user_id, "alice");
        assert_eq!(settings.session.app_name, "ResearchProposalSystem");
        assert_eq!(settings.logging.level, "info");
    }

    #[test]
    fn test_missing_optional_files_are_skipped() {
        let dir = TempDir::new().unwrap();
        let settings =
            Settings::load_from(&[dir.path().join("absent.toml")], None, None).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let dir = TempDir::new().unwrap();
        let result = Settings::load_from(&[], Some(&dir.path().join("nope.toml")), None);
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_environment_overrides_files() {
        let dir = TempDir::new().unwrap();
        let file = write_file(&dir, "c.toml", "[llm]\nmodel = \"from-file\"\n");
        let env = Environment::with_prefix(ENV_PREFIX)
            .prefix_separator(ENV_SEPARATOR)
            .separator(ENV_SEPARATOR)
            .try_parsing(true)
            .source(Some(
                [
                    ("PROPOSAL_FORGE__LLM__MODEL".to_string(), "from-env".to_string()),
                    (
                        "PROPOSAL_FORGE__PIPELINE__MAX_REFINEMENTS".to_string(),
                        "4".to_string(),
                    ),
                ]
                .into_iter()
                .collect(),
            ));

        let settings = Settings::load_from(&[file], None, Some(env)).unwrap();
        assert_eq!(settings.llm.model, "from-env");
        assert_eq!(settings.pipeline.max_refinements, 4);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let dir = TempDir::new().unwrap();
        let file = write_file(&dir, "bad.toml", "[pipeline]\napproval_sentinel = \"  \"\n");
        assert!(Settings::load_from(&[file], None, None).is_err());
    }

    #[test]
    fn test_api_key_fallback() {
        let mut settings = Settings::default();
        settings.apply_api_key_fallback(|name| {
            (name == "GOOGLE_API_KEY").then(|| "google-key".to_string())
        });
        assert_eq!(settings.llm.api_key.as_deref(), Some("google-key"));

        let mut openai = Settings::default();
        openai.llm.provider = ProviderType::OpenAI;
        openai.apply_api_key_fallback(|name| {
            (name == "OPENAI_API_KEY").then(|| "openai-key".to_string())
        });
        assert_eq!(openai.llm.api_key.as_deref(), Some("openai-key"));

        let mut configured = Settings::default();
        configured.llm.api_key = Some("explicit".into());
        configured.apply_api_key_fallback(|_| Some("ignored".into()));
        assert_eq!(configured.llm.api_key.as_deref(), Some("explicit"));

        let mut none = Settings::default();
        none.apply_api_key_fallback(|_| None);
        assert!(!none.has_api_key());
    }

    #[test]
    fn test_to_toml_redacts_key_and_round_trips() {
        let mut settings = Settings::default();
        settings.llm.api_key = Some("secret".into());
        let text = settings.to_toml().unwrap();
        assert!(!text.contains("secret"));

        let parsed: Settings = toml::from_str(&text).unwrap();
        assert_eq!(parsed, Settings::default());
    }

    #[test]
    fn test_write_starter_refuses_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("proposal-forge.toml");
        Settings::write_starter(&path, false).unwrap();
        assert!(path.exists());
        assert!(Settings::write_starter(&path, false).is_err());
        Settings::write_starter(&path, true).unwrap();
    }

    #[test]
    fn test_load_reports_explicit_file_as_last_source() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.toml");
        std::fs::write(&path, "[pipeline]\nmax_refinements = 2\n").unwrap();

        let (settings, sources) = Settings::load_with_sources(Some(&path)).unwrap();
        assert_eq!(settings.pipeline.max_refinements, 2);
        assert_eq!(sources.files.last(), Some(&path));
    }

    #[test]
    fn test_derived_configs() {
        let mut settings = Settings::default();
        settings.llm.model = "gemini-2.5-pro".into();
        settings.pipeline.max_tool_rounds = 4;

        assert_eq!(settings.provider_config().model, "gemini-2.5-pro");
        assert_eq!(settings.pipeline_options().model, "gemini-2.5-pro");
        assert_eq!(settings.agent_config().max_iterations, 4);
    }
}
