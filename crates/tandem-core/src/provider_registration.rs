//! Provider registration from configuration and credentials.
//!
//! A provider whose API key cannot be resolved, or whose client fails to
//! build, is skipped with a warning. Registration itself never fails; an
//! empty registry is for the caller to report.

use tandem_config::{Config, Credentials};
use tandem_providers::{
    AnthropicProvider, GeminiProvider, LLMProvider, OpenAIProvider, OpenRouterProvider,
    ProviderRegistry,
};
use tracing::{debug, info, warn};

/// Build the registry: openai, anthropic, gemini, openrouter, then
/// openai-compatible entries by name.
pub fn register_providers(config: &Config, credentials: &Credentials) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();

    register_openai_provider(config, credentials, &mut registry);
    register_anthropic_provider(config, credentials, &mut registry);
    register_gemini_provider(config, credentials, &mut registry);
    register_openrouter_provider(config, credentials, &mut registry);
    register_openai_compatible_providers(config, credentials, &mut registry);

    let default = &config.providers.default_provider;
    if registry.contains(default) {
        if let Err(e) = registry.set_default(default) {
            warn!("Could not set default provider {}: {}", default, e);
        }
    } else if !registry.is_empty() {
        warn!(
            "Default provider '{}' is not available; using '{}'",
            default,
            registry.list_providers()[0]
        );
    }

    info!("Registered providers: {:?}", registry.list_providers());
    registry
}

fn add<P: LLMProvider + 'static>(registry: &mut ProviderRegistry, name: &str, provider: anyhow::Result<P>) {
    match provider {
        Ok(provider) => {
            debug!("Registered provider {}", name);
            registry.register(provider);
        }
        Err(e) => warn!("Provider '{}' disabled: {:#}", name, e),
    }
}

fn missing_key(name: &str, env_var: &str) {
    warn!("Provider '{}' disabled: no API key (set {} or providers.{}.api_key)", name, env_var, name);
}

fn register_openai_provider(config: &Config, credentials: &Credentials, registry: &mut ProviderRegistry) {
    let section = &config.providers.openai;
    let Some(api_key) = credentials.resolve(section.api_key.as_deref(), Credentials::OPENAI) else {
        return missing_key("openai", Credentials::OPENAI);
    };

    add(
        registry,
        "openai",
        OpenAIProvider::new(
            api_key,
            section.model.clone(),
            section.base_url.clone(),
            section.max_tokens,
            section.temperature,
            Some(config.timeout()),
        ),
    );
}

fn register_anthropic_provider(config: &Config, credentials: &Credentials, registry: &mut ProviderRegistry) {
    let section = &config.providers.anthropic;
    let Some(api_key) = credentials.resolve(section.api_key.as_deref(), Credentials::ANTHROPIC) else {
        return missing_key("anthropic", Credentials::ANTHROPIC);
    };

    add(
        registry,
        "anthropic",
        AnthropicProvider::new(
            api_key,
            section.model.clone(),
            section.max_tokens,
            section.temperature,
            Some(config.timeout()),
        ),
    );
}

fn register_gemini_provider(config: &Config, credentials: &Credentials, registry: &mut ProviderRegistry) {
    let section = &config.providers.gemini;
    let Some(api_key) = credentials.resolve(section.api_key.as_deref(), Credentials::GEMINI) else {
        return missing_key("gemini", Credentials::GEMINI);
    };

    add(
        registry,
        "gemini",
        GeminiProvider::new(
            api_key,
            section.model.clone(),
            section.max_tokens,
            section.temperature,
            Some(config.timeout()),
        ),
    );
}

fn register_openrouter_provider(config: &Config, credentials: &Credentials, registry: &mut ProviderRegistry) {
    let section = &config.providers.openrouter;
    let Some(api_key) = credentials.resolve(section.api_key.as_deref(), Credentials::OPENROUTER) else {
        return missing_key("openrouter", Credentials::OPENROUTER);
    };

    add(
        registry,
        "openrouter",
        OpenRouterProvider::new(
            api_key,
            section.model.clone(),
            section.http_referer.clone(),
            section.x_title.clone(),
            section.max_tokens,
            section.temperature,
            Some(config.timeout()),
        ),
    );
}

/// Register OpenAI-compatible providers (e.g., Groq, Mistral) from configuration.
fn register_openai_compatible_providers(
    config: &Config,
    credentials: &Credentials,
    registry: &mut ProviderRegistry,
) {
    let mut names: Vec<&String> = config.providers.openai_compatible.keys().collect();
    names.sort();

    for name in names {
        let section = &config.providers.openai_compatible[name];
        let env_var = section.api_key_env.as_deref().unwrap_or_default();
        let Some(api_key) = credentials.resolve(section.api_key.as_deref(), env_var) else {
            missing_key(name, env_var);
            continue;
        };

        add(
            registry,
            name,
            OpenAIProvider::new_with_name(
                name.clone(),
                api_key,
                Some(section.model.clone()),
                Some(section.base_url.clone()),
                section.max_tokens,
                section.temperature,
                Some(config.timeout()),
            ),
        );
    }
}
