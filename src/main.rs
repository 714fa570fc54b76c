use api_pipeline::api::start_api_server;
use api_pipeline::config::{ExecutionMode, RuntimeSettings};
use api_pipeline::pipeline::run_pipeline;
use api_pipeline::{Error, Result, telemetry};
use clap::{Parser, Subcommand};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::process::ExitCode;

/// Port used by `serve` when neither `--bind` nor `PORT` is given
const DEFAULT_PORT: u16 = 8080;

#[derive(Parser)]
#[command(name = "api-pipeline", version)]
#[command(
    about = "Fetch API endpoints, write JSON/CSV/TXT files and upload them to Cloud Storage",
    long_about = None
)]
struct Cli {
    /// Environment whose `{env}.toml` is run
    #[arg(long, default_value = "dev", global = true)]
    env: String,

    /// Directory holding the per-environment config files
    #[arg(long, default_value = "config", global = true)]
    config_dir: PathBuf,

    /// Directory for run log files
    #[arg(long, default_value = "logs", global = true)]
    log_dir: PathBuf,

    /// Default directory for output files
    #[arg(long, default_value = "output", global = true)]
    output_dir: PathBuf,

    /// Write every file to the system temp directory, as in a serverless sandbox
    #[arg(long, global = true)]
    ephemeral: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the pipeline once (default)
    Run,
    /// Serve the HTTP trigger
    Serve {
        /// Listen address (default: 0.0.0.0:$PORT, or port 8080)
        #[arg(long)]
        bind: Option<SocketAddr>,
    },
}

impl Cli {
    fn settings(&self) -> RuntimeSettings {
        let execution_mode = if self.ephemeral {
            ExecutionMode::Ephemeral
        } else {
            ExecutionMode::detect()
        };

        RuntimeSettings {
            config_dir: self.config_dir.clone(),
            output_dir: self.output_dir.clone(),
            log_dir: self.log_dir.clone(),
            execution_mode,
            ..Default::default()
        }
    }
}

fn resolve_bind(bind: Option<SocketAddr>, port_var: Option<String>) -> Result<SocketAddr> {
    if let Some(bind) = bind {
        return Ok(bind);
    }

    let port = match port_var {
        Some(raw) => raw
            .trim()
            .parse::<u16>()
            .map_err(|e| Error::config(format!("invalid PORT '{raw}': {e}"), "PORT"))?,
        None => DEFAULT_PORT,
    };
    Ok(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)))
}

async fn execute(cli: Cli, settings: RuntimeSettings) -> Result<()> {
    match cli.command {
        None | Some(Command::Run) => {
            let report = run_pipeline(&cli.env, &settings).await?;
            tracing::info!(
                env = %report.env,
                files = report.files_written(),
                uploaded = report.objects_uploaded(),
                "run finished"
            );
            Ok(())
        }
        Some(Command::Serve { bind }) => {
            let bind = resolve_bind(bind, std::env::var("PORT").ok())?;
            start_api_server(bind, settings).await
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let settings = cli.settings();

    let session = match telemetry::init(&settings.effective_log_dir()) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("failed to initialise logging: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = execute(cli, settings).await;
    let code = match &result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "pipeline failed");
            ExitCode::FAILURE
        }
    };

    session.finish();
    code
}
