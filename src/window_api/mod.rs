//! Contains logic for finding out which application the user is focused on in different
//! environments. [GenericSignalSource] is the main artifact of this module that abstracts
//! the operations.

#[cfg(feature = "win")]
pub mod win;
#[cfg(feature = "x11")]
pub mod x11;

#[cfg(feature = "win")]
extern crate windows;

#[cfg(feature = "x11")]
extern crate xcb;

use std::{path::Path, sync::Arc};

use anyhow::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveApplication {
    /// Process name as the user knows it. For example 'Code.exe' or 'firefox'.
    pub name: Arc<str>,
    /// Full path to an executable when the platform exposes it. For example
    /// 'C:\Program Files (x86)\Steam\steamapps\common\Game\game.exe'
    pub executable: Option<Arc<str>>,
}

impl ActiveApplication {
    pub fn from_executable(executable: &str) -> Self {
        let name = Path::new(executable)
            .file_name()
            .map(|v| v.to_string_lossy().to_string())
            .unwrap_or_else(|| executable.to_string());
        Self {
            name: name.into(),
            executable: Some(executable.into()),
        }
    }
}

/// Intended to serve as a contract windows and linux systems must implement.
#[cfg_attr(test, mockall::automock)]
pub trait SignalSource {
    /// Returns the focused application, or [None] when nothing is focused (desktop, lock
    /// screen). An error means the platform couldn't be asked at all.
    fn active_application(&mut self) -> Result<Option<ActiveApplication>>;
}

/// Serves as a cross-compatible SignalSource implementation.
pub struct GenericSignalSource {
    inner: Box<dyn SignalSource>,
}

impl GenericSignalSource {
    pub fn new() -> Result<Self> {
        cfg_if::cfg_if! {
            if #[cfg(feature = "win")] {
                use win::WindowsSignalSource;
                Ok(Self {
                    inner: Box::new(WindowsSignalSource::new()),
                })
            }
            else if #[cfg(feature = "x11")] {
                use x11::X11SignalSource;
                Ok(Self {
                    inner: Box::new(X11SignalSource::new()?),
                })
            }
            else {
                Err(anyhow::anyhow!(
                    "No signal source was compiled in. Build with the `win` or `x11` feature"
                ))
            }
        }
    }
}

impl SignalSource for GenericSignalSource {
    fn active_application(&mut self) -> Result<Option<ActiveApplication>> {
        self.inner.active_application()
    }
}
