use anyhow::Result;
use clap::{Parser, Subcommand};
use jcr_schemas::BarKind;

mod commands;

#[derive(Parser)]
#[command(name = "jcr")]
#[command(about = "JCR admin portal CLI", long_about = None)]
struct Cli {
    /// Layered config paths in merge order (base -> site -> local)
    #[arg(long = "config", global = true)]
    config_paths: Vec<String>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether the current session may open an admin route
    Verify {
        /// Admin route, e.g. /admin/events
        #[arg(long)]
        route: String,
    },

    /// Open an admin route and print the data it loads
    Fetch {
        #[arg(long)]
        route: String,

        /// REST path fetched once the gate has granted, e.g. /api/events
        #[arg(long)]
        path: String,
    },

    /// Follow a live order board; rings the terminal bell on new orders
    Watch {
        /// toastie | drinks
        #[arg(long)]
        bar: BarKind,

        /// Print the board once the snapshot arrives, then exit
        #[arg(long, default_value_t = false)]
        once: bool,
    },

    /// Mark an outstanding order as completed
    Complete {
        #[arg(long)]
        bar: BarKind,

        /// Order id as shown by `watch`
        #[arg(long)]
        order: u64,
    },

    /// Open or close a bar for new orders
    SetOpen {
        #[arg(long)]
        bar: BarKind,

        /// true | false
        #[arg(long, action = clap::ArgAction::Set)]
        open: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Silent if the file does not exist.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let cli = Cli::parse();
    let cfg = commands::load_config(&cli.config_paths)?;

    match cli.cmd {
        Commands::Verify { route } => commands::access::verify(&cfg, &route).await,
        Commands::Fetch { route, path } => commands::access::fetch(&cfg, &route, &path).await,
        Commands::Watch { bar, once } => commands::live::watch(&cfg, bar, once).await,
        Commands::Complete { bar, order } => commands::live::complete(&cfg, bar, order).await,
        Commands::SetOpen { bar, open } => commands::live::set_open(&cfg, bar, open).await,
    }
}

fn init_tracing() {
    // Logs go to stderr; stdout carries command output only.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}
