pub mod daemon_path;
pub mod process;
pub mod report;

use std::env;

use anyhow::Result;
use chrono::Local;
use clap::{Parser, Subcommand};
use process::{restart_server, stop_server};
use tracing::level_filters::LevelFilter;

use crate::{
    config::{load_env, StoreArgs, TrackingArgs},
    daemon::start_daemon,
    utils::{
        dir::create_application_default_path,
        logging::{enable_logging, CLI_PREFIX, DAEMON_PREFIX},
    },
};

#[derive(Parser, Debug)]
#[command(name = "apptally", version, long_about = None)]
#[command(about = "Tracks time spent in focused applications and reports on it", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(long, help = "Enable logging")]
    log: bool,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(about = "Starts a daemon for the application, stopping any previous one")]
    Init {
        #[command(flatten)]
        store: StoreArgs,
        #[command(flatten)]
        tracking: TrackingArgs,
    },
    #[command(about = "Run the tracker directly in current console. Used for debugging")]
    Serve {
        #[command(flatten)]
        store: StoreArgs,
        #[command(flatten)]
        tracking: TrackingArgs,
    },
    #[command(about = "Stop currently running daemon.")]
    Stop {},
    #[command(about = "Total hours per application, or for a single one")]
    Stats {
        #[arg(help = "Exact application name, for example Code.exe")]
        app: Option<String>,
        #[arg(
            long,
            value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..),
            help = "Only show the applications with the most usage"
        )]
        top: Option<usize>,
        #[command(flatten)]
        store: StoreArgs,
    },
    #[command(about = "Hours per application for sessions started today")]
    Today {
        #[command(flatten)]
        store: StoreArgs,
    },
    #[command(about = "Every application with a stored session")]
    Apps {
        #[command(flatten)]
        store: StoreArgs,
    },
}

impl Commands {
    fn store(&self) -> Option<&StoreArgs> {
        match self {
            Commands::Init { store, .. }
            | Commands::Serve { store, .. }
            | Commands::Stats { store, .. }
            | Commands::Today { store }
            | Commands::Apps { store } => Some(store),
            Commands::Stop {} => None,
        }
    }
}

/// Arguments following `init`, handed to the daemon binary as they are.
fn forwarded_daemon_args() -> Vec<String> {
    env::args()
        .skip(1)
        .skip_while(|v| v != "init")
        .skip(1)
        .collect()
}

pub async fn run_cli() -> Result<()> {
    load_env()?;
    let args = Args::parse();

    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };
    let app_dir = match args.commands.store() {
        Some(store) => store.application_dir()?,
        None => create_application_default_path()?,
    };
    let prefix = match args.commands {
        Commands::Serve { .. } => DAEMON_PREFIX,
        _ => CLI_PREFIX,
    };
    enable_logging(prefix, &app_dir.join("logs"), logging_level, args.log)?;

    match args.commands {
        Commands::Init { .. } => {
            restart_server(forwarded_daemon_args())?;
            println!("Daemon started");
            Ok(())
        }
        Commands::Stop {} => {
            let stopped = stop_server()?;
            println!("Stopped {stopped} daemon(s)");
            Ok(())
        }
        Commands::Serve { store, tracking } => start_daemon(&store, &tracking).await,
        Commands::Stats { app, top, store } => {
            let sink = store.open()?;
            let output = match app {
                Some(app) => report::application_usage(&*sink, &app).await,
                None => report::all_usage(&*sink, top).await,
            };
            println!("{output}");
            Ok(())
        }
        Commands::Today { store } => {
            let sink = store.open()?;
            println!(
                "{}",
                report::today_usage(&*sink, Local::now().date_naive()).await
            );
            Ok(())
        }
        Commands::Apps { store } => {
            let sink = store.open()?;
            println!("{}", report::tracked_applications(&*sink).await);
            Ok(())
        }
    }
}
