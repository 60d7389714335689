//! ODR-DabMux management CLI
//!
//! Reads statistics and configuration from the multiplexer's stats server,
//! inspects and changes remote control parameters, and doubles as a munin
//! multigraph plugin.

mod munin;
mod table;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use odr_mgmt::{ClientSettings, ConfigReply, ConfigTree, RemoteControlClient, StatsClient, views};
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// ODR-DabMux management CLI
#[derive(Parser)]
#[command(name = "odr-mgmt")]
#[command(about = "Query and control a running ODR-DabMux")]
#[command(version)]
#[command(after_help = "\
Examples:
  odr-mgmt info                        Show which multiplexer answers
  odr-mgmt stats                       Input buffer, audio level and state table
  odr-mgmt --legacy config dump        Full configuration from an old release
  odr-mgmt config services             Services in the running configuration
  odr-mgmt config write mux.json       Replace the running configuration
  odr-mgmt rc list                     Remote control modules and parameters
  odr-mgmt rc set sub-fu enable 0      Change one parameter
  odr-mgmt --host mux1 munin           Munin plugin fetch
  odr-mgmt munin config                Munin plugin graph definitions

Logging goes to stderr. Set RUST_LOG (e.g. RUST_LOG=odr=debug) or pass -v.
")]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,

    /// Log protocol traffic to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ConnectionArgs {
    /// Settings file (JSON); a missing file means defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Multiplexer host
    #[arg(long, global = true)]
    host: Option<String>,

    /// Stats server port (also used for the legacy server)
    #[arg(long, global = true)]
    stats_port: Option<u16>,

    /// Remote control server port
    #[arg(long, global = true)]
    rc_port: Option<u16>,

    /// Talk to the line-based management server of old releases
    #[arg(long, global = true)]
    legacy: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the service identity of the stats server
    Info,

    /// Show input statistics
    Stats,

    /// List the inputs the stats server tracks
    Inputs,

    /// Read or replace the running configuration
    #[command(name = "config")]
    Configuration {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Remote control
    Rc {
        #[command(subcommand)]
        command: RcCommand,
    },

    /// Munin multigraph plugin output
    Munin {
        #[command(subcommand)]
        command: Option<MuninCommand>,
    },
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print the whole configuration tree as JSON
    Dump,
    Services,
    Subchannels,
    Components,
    /// General options and the remote control port
    General,
    /// Replace the running configuration with a JSON file
    Write {
        /// Configuration tree, as printed by `config dump`
        file: PathBuf,
    },
}

#[derive(Subcommand)]
enum RcCommand {
    /// List modules and their parameters
    List,

    /// Read one parameter
    Get { module: String, parameter: String },

    /// Change one parameter
    Set {
        module: String,
        parameter: String,
        value: String,
    },
}

#[derive(Subcommand)]
enum MuninCommand {
    /// Print graph definitions
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let settings = resolve_settings(&cli.connection)?;
    let legacy = cli.connection.legacy;

    match cli.command {
        Commands::Info => run_info(&settings, legacy).await,
        Commands::Stats => run_stats(&settings, legacy).await,
        Commands::Inputs => run_inputs(&settings, legacy).await,
        Commands::Configuration { command } => run_config(&settings, legacy, command).await,
        Commands::Rc { command } => run_rc(&settings, command).await,
        Commands::Munin { command: None } => run_munin_values(&settings, legacy).await,
        Commands::Munin {
            command: Some(MuninCommand::Config),
        } => run_munin_config(&settings, legacy).await,
    }
}

fn setup_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("odr={default_level}")));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn resolve_settings(args: &ConnectionArgs) -> Result<ClientSettings> {
    let mut settings = match &args.config {
        Some(path) => ClientSettings::load(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => ClientSettings::default(),
    };

    if let Some(host) = &args.host {
        settings.host.clone_from(host);
    }
    if let Some(port) = args.stats_port {
        settings.stats_port = port;
        settings.legacy_port = port;
    }
    if let Some(port) = args.rc_port {
        settings.rc_port = port;
    }
    Ok(settings)
}

async fn connect_stats(settings: &ClientSettings, legacy: bool) -> Result<StatsClient> {
    let client = if legacy {
        StatsClient::connect_legacy(settings).await
    } else {
        StatsClient::connect(settings).await
    };
    client.context("Failed to connect to the stats server. Is ODR-DabMux running?")
}

async fn connect_rc(settings: &ClientSettings) -> Result<RemoteControlClient> {
    RemoteControlClient::connect(settings)
        .await
        .context("Failed to connect to the remote control server. Is it enabled?")
}

async fn run_info(settings: &ClientSettings, legacy: bool) -> Result<()> {
    let client = connect_stats(settings, legacy).await?;
    let identity = client.identity();

    println!("Service: {}", identity.service_name);
    println!("Version: {}", identity.version);
    println!("Endpoint: {}", client.session().endpoint());
    client.close();
    Ok(())
}

async fn run_stats(settings: &ClientSettings, legacy: bool) -> Result<()> {
    let mut client = connect_stats(settings, legacy).await?;
    let snapshot = client.values().await.context("Failed to read statistics")?;

    print!("{}", table::stats(&snapshot));
    Ok(())
}

/// Input identifiers from either generation of `config` reply.
async fn input_idents(client: &mut StatsClient) -> Result<Vec<String>> {
    match client.config().await.context("Failed to read input list")? {
        ConfigReply::Inputs(idents) => Ok(idents),
        ConfigReply::Tree(tree) => Ok(views::subchannels(&tree)
            .context("Configuration has no subchannels")?
            .into_iter()
            .map(|s| s.name)
            .collect()),
    }
}

async fn run_inputs(settings: &ClientSettings, legacy: bool) -> Result<()> {
    let mut client = connect_stats(settings, legacy).await?;
    for ident in input_idents(&mut client).await? {
        println!("{ident}");
    }
    Ok(())
}

fn read_tree_file(path: &Path) -> Result<ConfigTree> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("Invalid JSON in {}", path.display()))?;
    ConfigTree::from_value(value)
        .with_context(|| format!("{} does not hold a configuration tree", path.display()))
}

async fn read_tree(client: &mut StatsClient) -> Result<ConfigTree> {
    client
        .read_tree()
        .await
        .context("Failed to read configuration")
}

async fn write_config(client: &mut StatsClient, file: &Path) -> Result<()> {
    let tree = read_tree_file(file)?;
    let accepted = client
        .write_tree(&tree)
        .await
        .context("Failed to send configuration")?;
    if !accepted {
        bail!(
            "The multiplexer did not accept the configuration; run 'config dump' to see the active one"
        );
    }
    println!("Configuration accepted");
    Ok(())
}

async fn run_config(settings: &ClientSettings, legacy: bool, command: ConfigCommand) -> Result<()> {
    let mut client = connect_stats(settings, legacy).await?;

    let output = match command {
        ConfigCommand::Write { file } => return write_config(&mut client, &file).await,
        ConfigCommand::Dump => {
            serde_json::to_string_pretty(&read_tree(&mut client).await?)? + "\n"
        }
        ConfigCommand::Services => {
            table::services(&views::services(&read_tree(&mut client).await?)?)
        }
        ConfigCommand::Subchannels => {
            table::subchannels(&views::subchannels(&read_tree(&mut client).await?)?)
        }
        ConfigCommand::Components => {
            table::components(&views::components(&read_tree(&mut client).await?)?)
        }
        ConfigCommand::General => {
            table::general(&views::general_options(&read_tree(&mut client).await?)?)
        }
    };
    print!("{output}");
    Ok(())
}

async fn run_rc(settings: &ClientSettings, command: RcCommand) -> Result<()> {
    let mut client = connect_rc(settings).await?;

    match command {
        RcCommand::List => {
            let modules = client
                .load_modules()
                .await
                .context("Failed to list modules")?;
            print!("{}", table::modules(&modules));
        }
        RcCommand::Get { module, parameter } => {
            let value = client
                .get(&module, &parameter)
                .await
                .with_context(|| format!("Failed to read {module}.{parameter}"))?;
            println!("{value}");
        }
        RcCommand::Set {
            module,
            parameter,
            value,
        } => {
            client
                .set(&module, &parameter, &value)
                .await
                .with_context(|| format!("Failed to set {module}.{parameter}"))?;
            println!("{module}.{parameter} = {value}");
        }
    }
    Ok(())
}

/// `clocktai expiry`, or `None` when the multiplexer cannot tell.
async fn clocktai_expiry(settings: &ClientSettings) -> Result<Option<String>> {
    let mut rc = connect_rc(settings).await?;
    match rc.get("clocktai", "expiry").await {
        Ok(value) => Ok(Some(value)),
        Err(e) if !e.is_fatal() => {
            tracing::warn!("get clocktai expiry failed: {e}");
            Ok(None)
        }
        Err(e) => Err(e).context("Failed to read clocktai expiry"),
    }
}

async fn run_munin_values(settings: &ClientSettings, legacy: bool) -> Result<()> {
    let expiry = clocktai_expiry(settings).await?;

    let mut client = connect_stats(settings, legacy).await?;
    let snapshot = client.values().await.context("Failed to read statistics")?;

    println!("{}", munin::values(expiry.as_deref(), &snapshot));
    Ok(())
}

async fn run_munin_config(settings: &ClientSettings, legacy: bool) -> Result<()> {
    let mut client = connect_stats(settings, legacy).await?;
    let idents = input_idents(&mut client).await?;

    println!("{}", munin::config(&idents));
    Ok(())
}
