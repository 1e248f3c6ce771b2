use crate::domain::{CredentialsProvider, RegistryCredentials};
use crate::infra::podman_adapter::EngineEndpoint;
use crate::services::{ClassifierPolicy, DEFAULT_CALL_TIMEOUT};
use anyhow::{Context, Result, bail};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_TOML_NAME: &str = "imagebox.toml";
pub const DEFAULT_CONFIG_TOML: &str = include_str!("../../config/default_imagebox.toml");
pub const DEFAULT_TIMEOUT: Duration = DEFAULT_CALL_TIMEOUT;

pub const ENV_REGISTRY_USERNAME: &str = "IMAGEBOX_REGISTRY_USERNAME";
pub const ENV_REGISTRY_PASSWORD: &str = "IMAGEBOX_REGISTRY_PASSWORD";
pub const ENV_REGISTRY_EMAIL: &str = "IMAGEBOX_REGISTRY_EMAIL";

pub fn default_config_dir() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/root"))
        .join(".config/imagebox")
}

pub fn ensure_config_dir(config_dir: &Path) -> Result<()> {
    fs::create_dir_all(config_dir).with_context(|| format!("criando {:?}", config_dir))
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct EngineConfig {
    pub program: Option<String>,
    pub url: Option<String>,
    pub connection: Option<String>,
    pub identity: Option<PathBuf>,
    pub timeout: Option<String>,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct RegistryConfig {
    pub username: Option<String>,
    pub password: Option<SecretString>,
    pub email: Option<String>,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct ErrorsConfig {
    pub split_not_found: Option<bool>,
    pub split_unauthorized: Option<bool>,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub errors: ErrorsConfig,
}

impl AppConfig {
    /// Merges another AppConfig into self.
    /// Values from `other` overwrite values in `self` if present.
    pub fn merge(&mut self, other: AppConfig) {
        if let Some(program) = other.engine.program {
            self.engine.program = Some(program);
        }
        if let Some(url) = other.engine.url {
            self.engine.url = Some(url);
        }
        if let Some(connection) = other.engine.connection {
            self.engine.connection = Some(connection);
        }
        if let Some(identity) = other.engine.identity {
            self.engine.identity = Some(identity);
        }
        if let Some(timeout) = other.engine.timeout {
            self.engine.timeout = Some(timeout);
        }

        if let Some(username) = other.registry.username {
            self.registry.username = Some(username);
        }
        if let Some(password) = other.registry.password {
            self.registry.password = Some(password);
        }
        if let Some(email) = other.registry.email {
            self.registry.email = Some(email);
        }

        if let Some(split) = other.errors.split_not_found {
            self.errors.split_not_found = Some(split);
        }
        if let Some(split) = other.errors.split_unauthorized {
            self.errors.split_unauthorized = Some(split);
        }
    }

    /// Registry values from the environment win over both config files
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(username) = lookup(ENV_REGISTRY_USERNAME) {
            self.registry.username = Some(username);
        }
        if let Some(password) = lookup(ENV_REGISTRY_PASSWORD) {
            self.registry.password = Some(SecretString::new(password));
        }
        if let Some(email) = lookup(ENV_REGISTRY_EMAIL) {
            self.registry.email = Some(email);
        }
    }

    pub fn endpoint(&self) -> EngineEndpoint {
        let defaults = EngineEndpoint::default();
        EngineEndpoint {
            program: self.engine.program.clone().unwrap_or(defaults.program),
            url: non_blank(self.engine.url.as_deref()),
            connection: non_blank(self.engine.connection.as_deref()),
            identity: self
                .engine
                .identity
                .as_ref()
                .map(|p| PathBuf::from(shellexpand::tilde(&p.to_string_lossy()).into_owned())),
        }
    }

    pub fn timeout(&self) -> Result<Duration> {
        match self.engine.timeout.as_deref() {
            Some(raw) => parse_duration(raw).with_context(|| format!("engine.timeout = {raw:?}")),
            None => Ok(DEFAULT_TIMEOUT),
        }
    }

    pub fn credentials(&self) -> RegistryCredentials {
        RegistryCredentials {
            username: self.registry.username.clone().unwrap_or_default(),
            password: self.registry.password.clone(),
            email: self.registry.email.clone().unwrap_or_default(),
        }
    }

    pub fn policy(&self) -> ClassifierPolicy {
        ClassifierPolicy {
            split_not_found: self.errors.split_not_found.unwrap_or(false),
            split_unauthorized: self.errors.split_unauthorized.unwrap_or(false),
        }
    }

    /// Effective settings as TOML with the password masked
    pub fn render_redacted(&self) -> Result<String> {
        let endpoint = self.endpoint();
        let policy = self.policy();
        let password = self
            .registry
            .password
            .as_ref()
            .filter(|p| !p.expose_secret().is_empty())
            .map(|_| "***".to_string())
            .unwrap_or_default();

        let view = RedactedConfig {
            engine: RedactedEngine {
                program: endpoint.program,
                url: endpoint.url,
                connection: endpoint.connection,
                identity: endpoint.identity,
                timeout: format!("{:?}", self.timeout()?),
            },
            registry: RedactedRegistry {
                username: self.registry.username.clone().unwrap_or_default(),
                password,
                email: self.registry.email.clone().unwrap_or_default(),
            },
            errors: RedactedErrors {
                split_not_found: policy.split_not_found,
                split_unauthorized: policy.split_unauthorized,
            },
        };

        toml::to_string_pretty(&view).context("serializando config efetiva")
    }
}

#[derive(Serialize)]
struct RedactedConfig {
    engine: RedactedEngine,
    registry: RedactedRegistry,
    errors: RedactedErrors,
}

#[derive(Serialize)]
struct RedactedEngine {
    program: String,
    url: Option<String>,
    connection: Option<String>,
    identity: Option<PathBuf>,
    timeout: String,
}

#[derive(Serialize)]
struct RedactedRegistry {
    username: String,
    password: String,
    email: String,
}

#[derive(Serialize)]
struct RedactedErrors {
    split_not_found: bool,
    split_unauthorized: bool,
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Credentials fixed at startup and used for every pull
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    credentials: RegistryCredentials,
}

impl StaticCredentials {
    pub fn new(credentials: RegistryCredentials) -> Self {
        Self { credentials }
    }
}

impl CredentialsProvider for StaticCredentials {
    fn registry_credentials(&self) -> RegistryCredentials {
        self.credentials.clone()
    }
}

/// Parses "500ms", "30s", "5m" or "1h"
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    let (number, unit_secs) = if let Some(stripped) = s.strip_suffix("ms") {
        let millis: u64 = stripped.trim().parse()?;
        return Ok(Duration::from_millis(millis));
    } else if let Some(stripped) = s.strip_suffix('s') {
        (stripped, 1)
    } else if let Some(stripped) = s.strip_suffix('m') {
        (stripped, 60)
    } else if let Some(stripped) = s.strip_suffix('h') {
        (stripped, 3600)
    } else {
        bail!("Formato de duração inválido: {}", s)
    };

    let value: u64 = number.trim().parse()?;
    match value.checked_mul(unit_secs) {
        Some(secs) => Ok(Duration::from_secs(secs)),
        None => bail!("Duração grande demais: {}", s),
    }
}

/// Writes the default template unless a config already exists. Returns whether it wrote.
pub fn install_default_config(target_dir: &Path) -> Result<bool> {
    ensure_config_dir(target_dir)?;

    let target = target_dir.join(DEFAULT_CONFIG_TOML_NAME);
    if target.exists() {
        return Ok(false);
    }

    fs::write(&target, DEFAULT_CONFIG_TOML)
        .with_context(|| format!("escrevendo template em {:?}", target))?;

    Ok(true)
}

fn read_config_file(path: &Path) -> Result<Option<AppConfig>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path).with_context(|| format!("lendo {:?}", path))?;
    let config: AppConfig =
        toml::from_str(&content).with_context(|| format!("parse de {:?}", path))?;

    Ok(Some(config))
}

/// Global config from `config_dir`, overlaid by `./imagebox.toml`, overlaid by the environment
pub fn load_app_config(config_dir: &Path) -> Result<AppConfig> {
    let local_dir = PathBuf::from("./");
    let mut config = load_layered(config_dir, &local_dir)?;
    config.apply_env_overrides(|key| std::env::var(key).ok());
    Ok(config)
}

pub fn load_layered(global_dir: &Path, local_dir: &Path) -> Result<AppConfig> {
    let mut app_config = read_config_file(&global_dir.join(DEFAULT_CONFIG_TOML_NAME))
        .context("lendo config global")?
        .unwrap_or_default();

    if let Some(local) = read_config_file(&local_dir.join(DEFAULT_CONFIG_TOML_NAME))
        .context("lendo config local")?
    {
        app_config.merge(local);
    }

    Ok(app_config)
}
