use std::collections::HashSet;

use crate::window_api::ActiveApplication;

/// Substrings that mark an executable as a game started through a game library. Both must be
/// present, e.g. `steam` and `steamapps` for `...\Steam\steamapps\common\...`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameLibraryMarkers {
    platform: String,
    library: String,
}

impl GameLibraryMarkers {
    pub fn new(platform: &str, library: &str) -> Self {
        Self {
            platform: platform.to_lowercase(),
            library: library.to_lowercase(),
        }
    }

    fn matches(&self, value: &str) -> bool {
        if self.platform.is_empty() || self.library.is_empty() {
            return false;
        }
        let value = value.to_lowercase();
        value.contains(&self.platform) && value.contains(&self.library)
    }
}

impl Default for GameLibraryMarkers {
    fn default() -> Self {
        Self::new("steam", "steamapps")
    }
}

/// Decides which observed applications count toward tracking.
#[derive(Debug, Clone)]
pub struct TrackingFilter {
    allowed: HashSet<String>,
    games: Option<GameLibraryMarkers>,
}

impl TrackingFilter {
    pub fn new<S: AsRef<str>>(
        allowed: impl IntoIterator<Item = S>,
        games: Option<GameLibraryMarkers>,
    ) -> Self {
        Self {
            allowed: allowed
                .into_iter()
                .map(|v| v.as_ref().trim().to_lowercase())
                .filter(|v| !v.is_empty())
                .collect(),
            games,
        }
    }

    /// Case-insensitive allow-list check, falling back to game library detection on the name.
    pub fn is_tracked(&self, name: Option<&str>) -> bool {
        match name {
            None => false,
            Some(name) if name.is_empty() => false,
            Some(name) => self.is_allowed(name) || self.is_game(name),
        }
    }

    /// Same as [Self::is_tracked], but also looks for game library markers in the executable
    /// path on platforms that report one.
    pub fn is_tracked_application(&self, application: Option<&ActiveApplication>) -> bool {
        let Some(application) = application else {
            return false;
        };
        if application.name.is_empty() {
            return false;
        }
        self.is_tracked(Some(&*application.name))
            || application
                .executable
                .as_deref()
                .is_some_and(|path| self.is_game(path))
    }

    pub fn is_allowed(&self, name: &str) -> bool {
        self.allowed.contains(&name.to_lowercase())
    }

    pub fn is_game(&self, value: &str) -> bool {
        self.games.as_ref().is_some_and(|v| v.matches(value))
    }
}
