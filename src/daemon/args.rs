use clap::Parser;
use tracing::level_filters::LevelFilter;

use crate::config::{StoreArgs, TrackingArgs};

#[derive(Parser)]
#[command(name = "apptally-daemon", version, about = "Tracks focused applications in the background")]
pub struct DaemonArgs {
    #[arg(long, help = "Run in the current process instead of detaching")]
    pub force: bool,
    #[command(flatten)]
    pub store: StoreArgs,
    #[command(flatten)]
    pub tracking: TrackingArgs,
    /// This option is for debugging purposes only.
    #[arg(long = "log-console")]
    pub log_console: bool,
    #[arg(long = "log-filter")]
    pub log: Option<LevelFilter>,
}
