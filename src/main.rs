use alloy_primitives::utils::format_ether;
use clap::{
    Parser,
    Subcommand,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use nation_panels::{
    OperationExecutor,
    OperationKind,
    OperationOutcome,
    SessionManager,
    Value,
    config::{
        self,
        AppConfig,
    },
    panels::Panel,
    provider::SESSION_ACCOUNT_TOKEN,
    rpc::JsonRpcWallet,
};
use std::path::{
    Path,
    PathBuf,
};
use tokio::sync::mpsc;
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling,
};
use tracing_subscriber::{
    EnvFilter,
    fmt,
};

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Play the nations game from the command line through a JSON-RPC wallet",
    long_about = None,
    arg_required_else_help = true
)]
struct Cli {
    /// Config file (defaults to ~/.nation-panels/config.json)
    #[arg(long)]
    config: Option<String>,

    /// Override the wallet JSON-RPC endpoint
    #[arg(long)]
    rpc_url: Option<String>,

    /// Write logs to a daily rolling file in this directory instead of stderr
    #[arg(long)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List configured panels and their methods
    Panels,
    /// Execute a panel method and print the outcome as JSON
    Call {
        panel: String,
        method: String,
        args: Vec<String>,
        /// Read to re-run after a confirmed write: `--refresh <method> [args...]`.
        /// Repeatable; `@account` stands for the connected account.
        #[arg(long, num_args = 1.., value_names = ["METHOD", "ARGS"])]
        refresh: Vec<Vec<String>>,
    },
}

fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match log_dir {
        Some(dir) => {
            let (writer, guard) =
                tracing_appender::non_blocking(rolling::daily(dir, "nation-panels.log"));
            let _ = fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .try_init();
            Some(guard)
        }
        None => {
            let _ = fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .try_init();
            None
        }
    }
}

fn print_panels(panels: &[Panel]) {
    for panel in panels {
        println!(
            "{} {} (network {})",
            panel.name, panel.address, panel.required_network
        );
        for method in panel.methods() {
            let kind = match method.kind {
                OperationKind::Read => "read",
                OperationKind::Write => "write",
            };
            let fee = method
                .fee
                .map(|fee| format!(" [fee {} ETH]", format_ether(fee)))
                .unwrap_or_default();
            println!("  {kind:<5} {}{fee}", method.signature);
        }
    }
}

fn print_outcome(outcome: &OperationOutcome) -> Result<()> {
    let json =
        serde_json::to_string_pretty(outcome).wrap_err("failed to render outcome")?;
    println!("{json}");
    Ok(())
}

fn to_values(args: Vec<String>) -> Vec<Value> {
    args.into_iter()
        .map(|arg| {
            if arg == SESSION_ACCOUNT_TOKEN {
                Value::SessionAccount
            } else {
                Value::String(arg)
            }
        })
        .collect()
}

async fn call(
    config: &AppConfig,
    panel: &str,
    method: &str,
    args: Vec<String>,
    refresh: Vec<Vec<String>>,
) -> Result<OperationOutcome> {
    let panel = config.panel(panel)?;
    let mut request = panel.request(method, to_values(args))?;
    for mut read in refresh {
        if read.is_empty() {
            return Err(eyre!("--refresh needs a method name"));
        }
        let name = read.remove(0);
        if panel.method(&name)?.kind != OperationKind::Read {
            return Err(eyre!("--refresh must name a read method, got '{name}'"));
        }
        request = request.then_read(panel.request(&name, to_values(read))?);
    }

    let wallet = JsonRpcWallet::new(&config.rpc_url, config.poll_interval())
        .map_err(|e| eyre!(e))?;
    tracing::info!("Using wallet endpoint {}", config.rpc_url);
    let session = SessionManager::new(wallet);
    let executor = OperationExecutor::with_config(
        &session,
        panel.required_network,
        config.executor_config(),
    );

    let (progress, mut updates) = mpsc::unbounded_channel();
    let execution = executor.execute_with_progress(&request, &progress);
    tokio::pin!(execution);
    let outcome = loop {
        tokio::select! {
            outcome = &mut execution => break outcome,
            Some(update) = updates.recv() => print_outcome(&update)?,
        }
    };
    while let Ok(update) = updates.try_recv() {
        print_outcome(&update)?;
    }
    print_outcome(&outcome)?;
    Ok(outcome)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    let log_guard = init_tracing(cli.log_dir.as_deref());

    let path = config::resolve_config_path(cli.config.as_deref())?;
    let mut app_config = AppConfig::load_or_default(&path)?;
    if let Some(url) = cli.rpc_url {
        app_config.rpc_url = url;
    }

    match cli.command {
        Commands::Panels => {
            print_panels(&app_config.panels()?);
            Ok(())
        }
        Commands::Call {
            panel,
            method,
            args,
            refresh,
        } => {
            let outcome = call(&app_config, &panel, &method, args, refresh).await?;
            for stale in outcome.refreshed().iter().filter(|r| r.payload().is_none()) {
                tracing::warn!(?stale, "{panel}.{method} succeeded but a refresh read failed");
            }
            if let Some(kind) = outcome.failure_kind() {
                tracing::error!("{panel}.{method} failed: {kind}");
                drop(log_guard);
                std::process::exit(1);
            }
            Ok(())
        }
    }
}
