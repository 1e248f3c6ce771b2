use crate::domain::{CallContext, ImagePullRequest};
use crate::infra::config::{AppConfig, StaticCredentials, load_app_config, parse_duration};
use crate::infra::{PodmanAdapter, TracingTracer};
use crate::services::ImageService;
use anyhow::{Context, Result};
use clap::Subcommand;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ImageCommand {
    /// Baixa uma imagem do registry
    Pull {
        /// Repositório, ex: docker.io/library/alpine
        repository: String,
        /// Tag ou digest (vazio = padrão do engine)
        #[arg(long, short, default_value = "")]
        tag: String,
        /// Plataforma alvo, ex: linux/arm64
        #[arg(long, default_value = "")]
        platform: String,
    },
    /// Lista todas as imagens locais, incluindo camadas intermediárias
    List,
    /// Mostra detalhes de uma imagem
    Inspect { id: String },
    /// Remove uma imagem local
    Rm { id: String },
    /// Mostra o histórico de camadas, mais recente primeiro
    History { name: String },
}

/// Wires the podman adapter, tracer and credentials from `config`, bounding every engine
/// call by `call_timeout`
pub fn build_service(config: &AppConfig, call_timeout: Duration) -> ImageService {
    let engine = Arc::new(PodmanAdapter::with_endpoint(config.endpoint()));
    let tracer = Arc::new(TracingTracer::new("imagebox"));
    let credentials = Arc::new(StaticCredentials::new(config.credentials()));

    ImageService::new(engine, tracer, credentials)
        .with_policy(config.policy())
        .with_call_timeout(call_timeout)
}

/// `--timeout` when given, otherwise `engine.timeout` from the config
pub fn effective_timeout(config: &AppConfig, timeout: Option<&str>) -> Result<Duration> {
    match timeout {
        Some(raw) => parse_duration(raw).with_context(|| format!("--timeout {raw:?}")),
        None => config.timeout(),
    }
}

pub fn run(command: ImageCommand, config_dir: &Path, timeout: Option<&str>) -> Result<()> {
    let config = load_app_config(config_dir)?;
    let timeout = effective_timeout(&config, timeout)?;
    let service = build_service(&config, timeout);
    let ctx = CallContext::with_timeout(timeout);

    execute(&service, &ctx, command)
}

/// Runs one command and prints its result as JSON on stdout
pub fn execute(service: &ImageService, ctx: &CallContext, command: ImageCommand) -> Result<()> {
    match command {
        ImageCommand::Pull {
            repository,
            tag,
            platform,
        } => {
            let request = ImagePullRequest::new(repository, tag).with_platform(platform);
            service.create(ctx, &request)?;
            println!("✅ {}", request.reference());
        }
        ImageCommand::List => print_json(&service.list(ctx)?)?,
        ImageCommand::Inspect { id } => print_json(&service.inspect(ctx, &id)?)?,
        ImageCommand::Rm { id } => {
            service.delete(ctx, &id)?;
            println!("🗑️  {}", id);
        }
        ImageCommand::History { name } => print_json(&service.history(ctx, &name)?)?,
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("serializando resposta")?;
    println!("{rendered}");
    Ok(())
}
