use crate::infra::PodmanAdapter;
use crate::infra::config::{
    DEFAULT_CONFIG_TOML_NAME, ensure_config_dir, install_default_config, load_app_config,
};
use anyhow::Result;
use clap::Subcommand;
use std::path::Path;
use tracing::info;

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigCommand {
    /// Instala o template de config padrão no diretório de configuração
    Init,
    /// Mostra a config efetiva (arquivos + ambiente), sem a senha
    Show,
}

pub fn run(command: ConfigCommand, config_dir: &Path) -> Result<()> {
    match command {
        ConfigCommand::Init => install(config_dir),
        ConfigCommand::Show => show(config_dir),
    }
}

pub fn install(config_dir: &Path) -> Result<()> {
    info!("Preparando config em {:?}", config_dir);

    ensure_config_dir(config_dir)?;
    if install_default_config(config_dir)? {
        println!(
            "✅ Template criado em {:?}",
            config_dir.join(DEFAULT_CONFIG_TOML_NAME)
        );
    } else {
        println!("✅ Config já existe em {:?}, nada a fazer", config_dir);
    }

    Ok(())
}

fn show(config_dir: &Path) -> Result<()> {
    let config = load_app_config(config_dir)?;
    print!("{}", config.render_redacted()?);
    Ok(())
}

/// Checks the engine binary, the config directory and that the config parses
pub fn doctor(config_dir: &Path) -> Result<()> {
    println!("🔍 Checando dependências e configuração...");

    let config_file = config_dir.join(DEFAULT_CONFIG_TOML_NAME);
    if config_file.exists() {
        println!("✅ Config: {:?}", config_file);
    } else {
        println!(
            "⚠️  Config ausente em {:?} (use `imagebox config init`)",
            config_file
        );
    }

    let config = match load_app_config(config_dir) {
        Ok(config) => config,
        Err(e) => {
            println!("⚠️  Config inválida: {e:#}");
            return Ok(());
        }
    };

    let endpoint = config.endpoint();
    let adapter = PodmanAdapter::with_endpoint(endpoint.clone());
    if adapter.is_available() {
        println!("✅ {} disponível", endpoint.program);
    } else {
        println!("⚠️  {} não encontrado no PATH", endpoint.program);
    }

    if let Some(url) = &endpoint.url {
        println!("ℹ️  Engine remoto: {url}");
    }
    if let Some(connection) = &endpoint.connection {
        println!("ℹ️  Conexão nomeada: {connection}");
    }
    if let Some(identity) = &endpoint.identity
        && !identity.exists()
    {
        println!("⚠️  Chave de identidade ausente: {:?}", identity);
    }

    match config.timeout() {
        Ok(timeout) => println!("✅ Timeout por chamada: {:?}", timeout),
        Err(e) => println!("⚠️  {e:#}"),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn install_writes_template_once() {
        let dir = TempDir::new().unwrap();
        let config_dir = dir.path().join("imagebox");

        install(&config_dir).unwrap();
        let path = config_dir.join(DEFAULT_CONFIG_TOML_NAME);
        std::fs::write(&path, "[engine]\nprogram = \"podman-remote\"\n").unwrap();

        install(&config_dir).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("podman-remote"));
    }

    #[test]
    fn doctor_tolerates_missing_config_dir() {
        let dir = TempDir::new().unwrap();
        assert!(doctor(&dir.path().join("nao-existe")).is_ok());
    }
}
