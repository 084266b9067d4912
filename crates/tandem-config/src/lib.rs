use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[cfg(test)]
mod tests;

/// Built-in provider names. Anything else must be an `openai_compatible` entry.
pub const BUILTIN_PROVIDERS: [&str; 4] = ["openai", "anthropic", "gemini", "openrouter"];

/// Developer role candidates, in preference order.
const DEVELOPER_PREFERENCE: [&str; 3] = ["openai", "anthropic", "openrouter"];

const LOCAL_CONFIG_FILE: &str = "./tandem.toml";
const USER_CONFIG_FILE: &str = "tandem/config.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub providers: ProvidersConfig,
    pub agent: AgentConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    /// Provider that answers interactive requests
    pub default_provider: String,

    /// Provider for the architect role in autonomous mode
    pub architect: Option<String>,

    /// Provider for the developer role in autonomous mode
    pub developer: Option<String>,

    pub openai: OpenAIConfig,
    pub anthropic: AnthropicConfig,
    pub gemini: GeminiConfig,
    pub openrouter: OpenRouterConfig,

    /// Additional chat-completions endpoints (e.g., groq, mistral)
    pub openai_compatible: HashMap<String, OpenAICompatibleConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAIConfig {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnthropicConfig {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenRouterConfig {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub http_referer: Option<String>,
    pub x_title: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAICompatibleConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    /// Environment variable holding the key when `api_key` is absent
    pub api_key_env: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Ceiling on provider round trips per request before giving up
    pub max_tool_rounds: usize,
    pub enable_streaming: bool,
    pub timeout_seconds: u64,
    pub max_retry_attempts: u32,
    /// Directory the agent edits, relative to the workspace
    pub project_dir: String,
    /// Optional file whose contents replace the built-in system prompt
    pub system_prompt_file: Option<String>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            default_provider: "openai".to_string(),
            architect: None,
            developer: None,
            openai: OpenAIConfig::default(),
            anthropic: AnthropicConfig::default(),
            gemini: GeminiConfig::default(),
            openrouter: OpenRouterConfig::default(),
            openai_compatible: HashMap::new(),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: 25,
            enable_streaming: false,
            timeout_seconds: 60,
            max_retry_attempts: 3,
            project_dir: "project".to_string(),
            system_prompt_file: Some("prompt.md".to_string()),
        }
    }
}

/// Architect/developer assignment after matching against registered providers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleAssignment {
    pub architect: Option<String>,
    pub developer: Option<String>,
}

/// Config files tried when no path is given, in order: the working
/// directory, the platform config dir, then `~/.config` if that differs.
pub fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(LOCAL_CONFIG_FILE)];
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join(USER_CONFIG_FILE));
    }

    let xdg = PathBuf::from(shellexpand::tilde("~/.config").as_ref()).join(USER_CONFIG_FILE);
    if !paths.contains(&xdg) {
        paths.push(xdg);
    }
    paths
}

impl Config {
    /// Load configuration from `config_path`, or the first default location
    /// that exists. No file at all yields the built-in defaults.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path_to_load = match config_path {
            Some(path) => {
                let expanded = shellexpand::tilde(path).to_string();
                if !Path::new(&expanded).exists() {
                    anyhow::bail!("Config file not found: {}", expanded);
                }
                Some(expanded)
            }
            None => default_config_paths()
                .into_iter()
                .find(|path| path.exists())
                .map(|path| path.to_string_lossy().to_string()),
        };

        let Some(path) = path_to_load else {
            debug!("No config file found, using defaults");
            return Ok(Self::default());
        };

        debug!("Loading config from {}", path);
        let config_content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path))?;
        let config: Config = toml::from_str(&config_content)
            .with_context(|| format!("Failed to parse config file {}", path))?;

        config.validate()?;
        Ok(config)
    }

    /// Load and apply command-line overrides on top.
    pub fn load_with_overrides(
        config_path: Option<&str>,
        overrides: &Overrides,
    ) -> Result<Self> {
        let mut config = Self::load(config_path)?;
        config.apply_overrides(overrides)?;
        Ok(config)
    }

    pub fn apply_overrides(&mut self, overrides: &Overrides) -> Result<()> {
        if let Some(provider) = &overrides.provider {
            self.validate_provider_name(provider)?;
            self.providers.default_provider = provider.clone();
        }

        if let Some(model) = &overrides.model {
            let provider = self.providers.default_provider.clone();
            self.set_model(&provider, model.clone())?;
        }

        if let Some(architect) = &overrides.architect {
            self.validate_provider_name(architect)?;
            self.providers.architect = Some(architect.clone());
        }

        if let Some(developer) = &overrides.developer {
            self.validate_provider_name(developer)?;
            self.providers.developer = Some(developer.clone());
        }

        Ok(())
    }

    fn validate(&self) -> Result<()> {
        self.validate_provider_name(&self.providers.default_provider)?;
        if let Some(architect) = &self.providers.architect {
            self.validate_provider_name(architect)?;
        }
        if let Some(developer) = &self.providers.developer {
            self.validate_provider_name(developer)?;
        }
        if self.agent.max_tool_rounds == 0 {
            anyhow::bail!("agent.max_tool_rounds must be at least 1");
        }
        Ok(())
    }

    fn validate_provider_name(&self, name: &str) -> Result<()> {
        if BUILTIN_PROVIDERS.contains(&name) || self.providers.openai_compatible.contains_key(name) {
            return Ok(());
        }
        anyhow::bail!(
            "Unknown provider '{}'. Valid providers: {}, or an openai_compatible name ({:?})",
            name,
            BUILTIN_PROVIDERS.join(", "),
            self.providers.openai_compatible.keys().collect::<Vec<_>>()
        )
    }

    /// Set the configured model of a provider section.
    pub fn set_model(&mut self, provider: &str, model: String) -> Result<()> {
        match provider {
            "openai" => self.providers.openai.model = Some(model),
            "anthropic" => self.providers.anthropic.model = Some(model),
            "gemini" => self.providers.gemini.model = Some(model),
            "openrouter" => self.providers.openrouter.model = Some(model),
            other => match self.providers.openai_compatible.get_mut(other) {
                Some(compat) => compat.model = model,
                None => anyhow::bail!("Unknown provider type: {}", other),
            },
        }
        Ok(())
    }

    /// Match explicit role assignments against the providers that actually
    /// registered, falling back to the defaults: architect is gemini,
    /// developer is the first of openai, anthropic, openrouter, then any
    /// other registered provider.
    pub fn resolve_roles(&self, registered: &[&str]) -> RoleAssignment {
        let is_registered = |name: &str| registered.contains(&name);

        let architect = match &self.providers.architect {
            Some(name) if is_registered(name.as_str()) => Some(name.clone()),
            Some(name) => {
                warn!("Architect provider '{}' is not available", name);
                None
            }
            None if is_registered("gemini") => Some("gemini".to_string()),
            None => None,
        };

        let developer = match &self.providers.developer {
            Some(name) if is_registered(name.as_str()) => Some(name.clone()),
            Some(name) => {
                warn!("Developer provider '{}' is not available", name);
                None
            }
            None => DEVELOPER_PREFERENCE
                .iter()
                .copied()
                .find(|name| is_registered(*name))
                .or_else(|| {
                    registered
                        .iter()
                        .copied()
                        .find(|name| *name != "gemini" && Some(*name) != architect.as_deref())
                })
                .map(str::to_string),
        };

        RoleAssignment { architect, developer }
    }

    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.agent.timeout_seconds)
    }

    /// Project directory resolved against `workspace`.
    pub fn project_dir(&self, workspace: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(&self.agent.project_dir).to_string();
        let path = PathBuf::from(expanded);
        if path.is_absolute() {
            path
        } else {
            workspace.join(path)
        }
    }
}

/// Command-line overrides applied after the file is loaded.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub architect: Option<String>,
    pub developer: Option<String>,
}

/// Provider credentials, captured once at startup.
///
/// A provider whose key cannot be resolved is skipped at registration.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    keys: HashMap<String, String>,
}

impl Credentials {
    pub const OPENAI: &'static str = "OPENAI_API_KEY";
    pub const ANTHROPIC: &'static str = "ANTHROPIC_API_KEY";
    pub const GEMINI: &'static str = "GEMINI_API_KEY";
    pub const OPENROUTER: &'static str = "OPENROUTER_API_KEY";

    /// Read the known key variables plus any `api_key_env` named in the config.
    pub fn from_env(config: &Config) -> Self {
        let mut names: Vec<String> = [Self::OPENAI, Self::ANTHROPIC, Self::GEMINI, Self::OPENROUTER]
            .iter()
            .map(|s| s.to_string())
            .collect();
        names.extend(
            config
                .providers
                .openai_compatible
                .values()
                .filter_map(|c| c.api_key_env.clone()),
        );

        Self::from_pairs(
            names
                .into_iter()
                .filter_map(|name| std::env::var(&name).ok().map(|value| (name, value))),
        )
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            keys: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .filter(|(_, v): &(String, String)| !v.trim().is_empty())
                .collect(),
        }
    }

    pub fn get(&self, env_var: &str) -> Option<&str> {
        self.keys.get(env_var).map(|s| s.as_str())
    }

    /// An explicit key from the config file wins over the environment.
    pub fn resolve(&self, explicit: Option<&str>, env_var: &str) -> Option<String> {
        explicit
            .filter(|k| !k.trim().is_empty())
            .or_else(|| self.get(env_var))
            .map(str::to_string)
    }
}

/// Load a `.env` file from the working directory (or a parent) if one exists.
pub fn load_dotenv() -> Option<PathBuf> {
    match dotenvy::dotenv() {
        Ok(path) => {
            debug!("Loaded environment from {}", path.display());
            Some(path)
        }
        Err(e) if e.not_found() => None,
        Err(e) => {
            warn!("Failed to load .env file: {}", e);
            None
        }
    }
}
