//! LAPC CLI
//!
//! Command-line entry point for the LAPC proxy core. The `proxy`
//! subcommand is the invocation contract implemented directly by this
//! crate (§6.5); `install`/`uninstall`/`status`/`watch`/`wrap-cloud` rewrite
//! host MCP client configuration files and are external collaborators —
//! recognized here only so the full CLI surface is documented, failing
//! fast with a clear message instead of silently doing nothing.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use lapc_core::config::ProxyConfig;
use lapc_core::tokens::DefaultTokenCounter;

#[derive(Parser)]
#[command(name = "lapc")]
#[command(about = "LAPC — a token-shrinking proxy for MCP JSON-RPC traffic", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the stdio proxy in front of an upstream MCP server.
    Proxy(ProxyArgs),
    /// Rewrite a host MCP client config to route through the proxy.
    Install,
    /// Undo a prior `install`.
    Uninstall,
    /// Report which host configs are currently proxied.
    Status,
    /// Watch host configs and keep the proxy wrapper in sync.
    Watch,
    /// Wrap a cloud-hosted MCP endpoint instead of a local command.
    WrapCloud,
}

#[derive(clap::Args)]
struct ProxyArgs {
    /// Emit a stderr summary line and annotate responses with runtime metrics.
    #[arg(long)]
    stats: bool,
    /// Single-source TOML or YAML config file.
    #[arg(long)]
    config: Option<PathBuf>,
    /// The upstream command and its arguments, after `--`.
    #[arg(last = true, required = true)]
    upstream_cmd: Vec<String>,
}

/// Host-config-rewriting subcommands are out of scope for the core (§1); they
/// fail fast rather than silently no-op.
fn unimplemented_host_config_command(name: &str) -> anyhow::Result<()> {
    anyhow::bail!(
        "`lapc {name}` rewrites host MCP client configuration files and is not implemented by \
         this core crate; see the project's config-management tooling."
    )
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Proxy(args) => run_proxy(args).await,
        Commands::Install => unimplemented_host_config_command("install"),
        Commands::Uninstall => unimplemented_host_config_command("uninstall"),
        Commands::Status => unimplemented_host_config_command("status"),
        Commands::Watch => unimplemented_host_config_command("watch"),
        Commands::WrapCloud => unimplemented_host_config_command("wrap-cloud"),
    }
}

async fn run_proxy(args: ProxyArgs) -> anyhow::Result<()> {
    let mut config = match &args.config {
        Some(path) => ProxyConfig::load_from_file(path)?,
        None => ProxyConfig::default(),
    };
    config.stats = config.stats || args.stats;

    let (program, upstream_args) = args
        .upstream_cmd
        .split_first()
        .ok_or_else(|| anyhow::anyhow!("missing upstream command after `--`"))?;
    let upstream_args: Vec<String> = upstream_args.to_vec();

    let tokens = Box::new(DefaultTokenCounter::new(config.strict_token_counting)?);
    let config = Arc::new(config);

    tracing::info!(program = %program, "starting lapc proxy");
    let exit_code = lapc_pump::run(config, tokens, program, &upstream_args).await?;

    match exit_code {
        Some(code) => std::process::exit(code),
        None => std::process::exit(1),
    }
}
