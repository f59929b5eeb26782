//! Settings shared by the daemon and the report commands. Everything can come from flags or
//! the environment, and a `.env` file in the working directory is loaded first.

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{bail, Result};
use clap::Args;

use crate::{
    daemon::{
        collection::filter::{GameLibraryMarkers, TrackingFilter},
        storage::{
            local_storage::LocalSessionStore,
            remote_storage::{RemoteSessionStore, DEFAULT_TABLE},
            session_storage::SessionSink,
        },
    },
    utils::dir::create_application_default_path,
};

pub const DEFAULT_TRACKED_APPS: [&str; 10] = [
    "chrome.exe",
    "firefox.exe",
    "Code.exe",
    "idea64.exe",
    "pycharm64.exe",
    "Discord.exe",
    "Teams.exe",
    "VALORANT.exe",
    "spotify.exe",
    "stremio-shell-ng.exe",
];

/// Loads `.env` from the working directory, if there is one.
pub fn load_env() -> Result<()> {
    match dotenvy::dotenv() {
        Ok(_) => Ok(()),
        Err(e) if e.not_found() => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    #[arg(
        long,
        env = "SUPABASE_URL",
        help = "Supabase project url. Without it sessions are stored in the application directory"
    )]
    pub supabase_url: Option<String>,
    #[arg(long, env = "SUPABASE_KEY", hide_env_values = true, help = "Supabase api key")]
    pub supabase_key: Option<String>,
    #[arg(long, env = "APPTALLY_TABLE", default_value = DEFAULT_TABLE, help = "Table holding sessions")]
    pub table: String,
    #[arg(
        long,
        env = "APPTALLY_REQUEST_TIMEOUT_SECS",
        default_value_t = 30,
        value_parser = clap::value_parser!(u64).range(1..),
        help = "Seconds before a request to the remote store is given up"
    )]
    pub request_timeout_secs: u64,
    #[arg(
        long,
        help = "Application directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
    )]
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    Remote {
        url: String,
        key: String,
        table: String,
        timeout: Duration,
    },
    Local {
        record_dir: PathBuf,
    },
}

impl StoreArgs {
    pub fn application_dir(&self) -> Result<PathBuf> {
        match &self.dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                Ok(dir.clone())
            }
            None => create_application_default_path(),
        }
    }

    pub fn location(&self) -> Result<StoreLocation> {
        match (&self.supabase_url, &self.supabase_key) {
            (Some(url), Some(key)) if !url.is_empty() && !key.is_empty() => {
                Ok(StoreLocation::Remote {
                    url: url.clone(),
                    key: key.clone(),
                    table: self.table.clone(),
                    timeout: Duration::from_secs(self.request_timeout_secs),
                })
            }
            (Some(url), _) if !url.is_empty() => {
                bail!("SUPABASE_URL is set but SUPABASE_KEY is missing")
            }
            (_, Some(key)) if !key.is_empty() => {
                bail!("SUPABASE_KEY is set but SUPABASE_URL is missing")
            }
            _ => Ok(StoreLocation::Local {
                record_dir: self.application_dir()?.join("sessions"),
            }),
        }
    }

    pub fn open(&self) -> Result<Box<dyn SessionSink>> {
        Ok(match self.location()? {
            StoreLocation::Remote {
                url,
                key,
                table,
                timeout,
            } => Box::new(RemoteSessionStore::new(&url, &key, &table, timeout)?),
            StoreLocation::Local { record_dir } => Box::new(LocalSessionStore::new(record_dir)?),
        })
    }
}

#[derive(Args, Debug, Clone)]
pub struct TrackingArgs {
    #[arg(
        long,
        env = "APPTALLY_USER_ID",
        help = "Identifier stored with every session. Defaults to the host name"
    )]
    pub user_id: Option<String>,
    #[arg(
        long = "track",
        env = "APPTALLY_TRACKED_APPS",
        value_delimiter = ',',
        default_values = DEFAULT_TRACKED_APPS,
        help = "Process names to track, case-insensitive"
    )]
    pub tracked_apps: Vec<String>,
    #[arg(
        long,
        env = "APPTALLY_MIN_SESSION_SECS",
        default_value_t = 120,
        help = "Sessions this long or shorter are not stored"
    )]
    pub min_session_secs: u64,
    #[arg(
        long,
        env = "APPTALLY_GRACE_SECS",
        default_value_t = 120,
        help = "Returning to an application within this time continues its session"
    )]
    pub grace_secs: u64,
    #[arg(
        long,
        env = "APPTALLY_POLL_SECS",
        default_value_t = 10,
        value_parser = clap::value_parser!(u64).range(1..),
        help = "Seconds between checks of the focused application"
    )]
    pub poll_secs: u64,
    #[arg(
        long,
        env = "APPTALLY_SINK_TIMEOUT_SECS",
        default_value_t = 10,
        value_parser = clap::value_parser!(u64).range(1..),
        help = "Seconds to wait for the store before a session is given up"
    )]
    pub sink_timeout_secs: u64,
    #[arg(long, env = "APPTALLY_GAME_PLATFORM_MARKER", default_value = "steam")]
    pub game_platform_marker: String,
    #[arg(long, env = "APPTALLY_GAME_LIBRARY_MARKER", default_value = "steamapps")]
    pub game_library_marker: String,
    #[arg(long, help = "Only track applications from the list")]
    pub no_game_detection: bool,
}

/// Tracking settings after defaults are resolved.
#[derive(Debug, Clone)]
pub struct TrackerSettings {
    pub user_id: Arc<str>,
    pub filter: TrackingFilter,
    pub min_session: chrono::Duration,
    pub grace_period: chrono::Duration,
    pub poll_interval: Duration,
    pub sink_timeout: Duration,
}

impl TrackingArgs {
    pub fn settings(&self) -> TrackerSettings {
        let user_id = self
            .user_id
            .clone()
            .filter(|v| !v.is_empty())
            .or_else(sysinfo::System::host_name)
            .unwrap_or_else(|| "local".to_string());

        let games = (!self.no_game_detection).then(|| {
            GameLibraryMarkers::new(&self.game_platform_marker, &self.game_library_marker)
        });

        TrackerSettings {
            user_id: user_id.into(),
            filter: TrackingFilter::new(&self.tracked_apps, games),
            min_session: seconds(self.min_session_secs),
            grace_period: seconds(self.grace_secs),
            poll_interval: Duration::from_secs(self.poll_secs),
            sink_timeout: Duration::from_secs(self.sink_timeout_secs),
        }
    }
}

fn seconds(value: u64) -> chrono::Duration {
    i64::try_from(value)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .unwrap_or(chrono::Duration::MAX)
}
