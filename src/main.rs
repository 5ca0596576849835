use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use parley_gateway::api::ApiServerBuilder;
use parley_gateway::config::{SttBackend, config_file_path};
use parley_gateway::{Config, InboundRequest, PcmAudio, Pipeline};

/// Parley - spoken answers for typed or spoken prompts
#[derive(Parser)]
#[command(name = "parley", version, about)]
struct Cli {
    /// Path to the TOML config file (defaults to the per-user config dir)
    #[arg(short, long, env = "PARLEY_CONFIG")]
    config: Option<PathBuf>,

    /// Host to bind (overrides config)
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (overrides config)
    #[arg(long)]
    port: Option<u16>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Answer a prompt once and write the PCM16 reply to a file
    Ask {
        /// Prompt text
        prompt: String,
        /// Where to write the raw audio/L16 bytes
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Transcribe a raw PCM16 mono 16 kHz file
    Transcribe {
        /// Path to the raw audio
        file: PathBuf,
    },
    /// Print the default config file location
    ConfigPath,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG wins over -v
    let filter = match cli.verbose {
        0 => "info,parley_gateway=info",
        1 => "info,parley_gateway=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Some(cmd) = cli.command {
        return match cmd {
            Command::Ask { prompt, output } => ask(cli.config.as_deref(), prompt, &output).await,
            Command::Transcribe { file } => transcribe(cli.config.as_deref(), &file).await,
            Command::ConfigPath => {
                match config_file_path() {
                    Some(path) => println!("{}", path.display()),
                    None => anyhow::bail!("could not determine a home directory"),
                }
                Ok(())
            }
        };
    }

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        language = %config.language,
        stt = config.stt.backend.as_ref().map_or("none", SttBackend::name),
        "starting parley gateway"
    );

    let pipeline = Arc::new(Pipeline::from_config(&config)?);
    if pipeline.transcriber_name().is_none() {
        tracing::warn!("no speech recognition configured; raw audio requests will fail");
    }

    ApiServerBuilder::new(pipeline)
        .server_config(&config.server)
        .build()
        .run()
        .await?;

    Ok(())
}

/// Run the text pipeline once, outside the server
async fn ask(config_path: Option<&Path>, prompt: String, output: &Path) -> anyhow::Result<()> {
    let request = InboundRequest::text_prompt(prompt)?;
    let config = Config::load(config_path)?;
    let pipeline = Pipeline::from_config(&config)?;

    let audio = pipeline.run(request).await?;
    let len = audio.len();
    tokio::fs::write(output, audio.into_bytes()).await?;

    println!("Wrote {len} bytes of audio/L16 (16 kHz mono) to {}", output.display());
    Ok(())
}

/// Run only speech recognition on a raw PCM16 file
async fn transcribe(config_path: Option<&Path>, file: &Path) -> anyhow::Result<()> {
    let config = Config::load(config_path)?;
    let pipeline = Pipeline::from_config(&config)?;

    let bytes = tokio::fs::read(file).await?;
    let transcript = pipeline.transcribe(&PcmAudio::client_capture(bytes)).await?;

    println!("{transcript}");
    Ok(())
}
