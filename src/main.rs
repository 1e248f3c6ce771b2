use clap::{Parser, Subcommand};
use imagebox::cli::{self, ConfigCommand, ImageCommand};
use imagebox::infra::config::default_config_dir;
use imagebox::infra::telemetry::init_logging;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(
    name = "imagebox",
    version,
    about = "Pull, lista, inspeciona e remove imagens de containers via podman"
)]
struct Cli {
    /// Diretório de configuração (default: ~/.config/imagebox)
    #[arg(long, env = "IMAGEBOX_CONFIG_DIR", default_value_os_t = default_config_dir())]
    config_dir: PathBuf,

    /// Logs de debug (RUST_LOG tem precedência)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Limite de tempo por comando, ex: 30s, 5m (default: engine.timeout)
    #[arg(long, global = true, env = "IMAGEBOX_TIMEOUT")]
    timeout: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Image(ImageCommand),
    /// Verifica o engine e a existência do arquivo de config
    Doctor,
    /// Gerencia o arquivo de configuração
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

fn main() -> ExitCode {
    let args = Cli::parse();

    if let Err(e) = init_logging(args.verbose) {
        eprintln!("{e:#}");
    }

    let result = match args.command {
        Commands::Image(cmd) => cli::image::run(cmd, &args.config_dir, args.timeout.as_deref()),
        Commands::Doctor => cli::setup::doctor(&args.config_dir),
        Commands::Config { command } => cli::setup::run(command, &args.config_dir),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            cli::report_error(&e);
            ExitCode::from(cli::exit_code(&e))
        }
    }
}
