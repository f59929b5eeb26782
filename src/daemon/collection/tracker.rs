//! The session state machine. It turns a sampled "what is focused right now" signal into
//! completed usage spans, bridging short interruptions with a grace period.

use std::{mem, sync::Arc};

use chrono::{DateTime, Duration, Local};
use tracing::{debug, info};

/// Usage of one application from `start` to `end` as decided by the state machine. Whether it
/// is long enough to be stored is decided later by the committer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSpan {
    pub application_name: Arc<str>,
    pub start: DateTime<Local>,
    pub end: DateTime<Local>,
}

impl SessionSpan {
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

/// Between ticks the tracker is idle, inside a session, or waiting out a grace period for the
/// application that was active before. The session start survives the grace period.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TrackingState {
    #[default]
    Idle,
    Active {
        app: Arc<str>,
        started_at: DateTime<Local>,
    },
    Grace {
        app: Arc<str>,
        started_at: DateTime<Local>,
        grace_started_at: DateTime<Local>,
    },
}

impl TrackingState {
    pub fn current_app(&self) -> Option<&Arc<str>> {
        match self {
            TrackingState::Active { app, .. } => Some(app),
            _ => None,
        }
    }

    pub fn pending_app(&self) -> Option<&Arc<str>> {
        match self {
            TrackingState::Grace { app, .. } => Some(app),
            _ => None,
        }
    }

    pub fn session_start(&self) -> Option<DateTime<Local>> {
        match self {
            TrackingState::Idle => None,
            TrackingState::Active { started_at, .. } | TrackingState::Grace { started_at, .. } => {
                Some(*started_at)
            }
        }
    }

    pub fn grace_started_at(&self) -> Option<DateTime<Local>> {
        match self {
            TrackingState::Grace {
                grace_started_at, ..
            } => Some(*grace_started_at),
            _ => None,
        }
    }

    /// Applies one observation. `tracked` is the focused application if it passed the tracking
    /// filter. Returns the next state and the span that ended on this tick, if any.
    pub fn transition(
        self,
        tracked: Option<&Arc<str>>,
        now: DateTime<Local>,
        grace_window: Duration,
    ) -> (TrackingState, Option<SessionSpan>) {
        match (self, tracked) {
            (TrackingState::Idle, None) => (TrackingState::Idle, None),
            (TrackingState::Active { app, started_at }, None) => {
                info!("Grace period started for {app}");
                (
                    TrackingState::Grace {
                        app,
                        started_at,
                        grace_started_at: now,
                    },
                    None,
                )
            }
            (
                TrackingState::Grace {
                    app,
                    started_at,
                    grace_started_at,
                },
                None,
            ) => {
                if now - grace_started_at > grace_window {
                    debug!("Grace period for {app} expired");
                    let span = SessionSpan {
                        application_name: app,
                        start: started_at,
                        end: grace_started_at,
                    };
                    (TrackingState::Idle, Some(span))
                } else {
                    (
                        TrackingState::Grace {
                            app,
                            started_at,
                            grace_started_at,
                        },
                        None,
                    )
                }
            }
            (
                TrackingState::Grace {
                    app,
                    started_at,
                    grace_started_at,
                },
                Some(tracked),
            ) => {
                if app == *tracked {
                    info!("Returned to {app} within grace period, continuing session");
                    (TrackingState::Active { app, started_at }, None)
                } else {
                    let span = SessionSpan {
                        application_name: app,
                        start: started_at,
                        end: grace_started_at,
                    };
                    (start_session(tracked, now), Some(span))
                }
            }
            (TrackingState::Active { app, started_at }, Some(tracked)) => {
                if app == *tracked {
                    (TrackingState::Active { app, started_at }, None)
                } else {
                    let span = SessionSpan {
                        application_name: app,
                        start: started_at,
                        end: now,
                    };
                    (start_session(tracked, now), Some(span))
                }
            }
            (TrackingState::Idle, Some(tracked)) => (start_session(tracked, now), None),
        }
    }

    /// Closes whatever is outstanding at shutdown. An active session ends now. A session
    /// waiting in its grace period is dropped, since it was already interrupted and can no
    /// longer be resumed.
    pub fn flush(self, now: DateTime<Local>) -> Option<SessionSpan> {
        match self {
            TrackingState::Idle => None,
            TrackingState::Active { app, started_at } => Some(SessionSpan {
                application_name: app,
                start: started_at,
                end: now,
            }),
            TrackingState::Grace { app, .. } => {
                info!("Dropping {app}, it was in a grace period at shutdown");
                None
            }
        }
    }
}

fn start_session(app: &Arc<str>, now: DateTime<Local>) -> TrackingState {
    info!("Now tracking {app}");
    TrackingState::Active {
        app: app.clone(),
        started_at: now,
    }
}

/// Owns the single [TrackingState] of a running tracker.
#[derive(Debug)]
pub struct SessionTracker {
    state: TrackingState,
    grace_window: Duration,
}

impl SessionTracker {
    pub fn new(grace_window: Duration) -> Self {
        Self {
            state: TrackingState::Idle,
            grace_window,
        }
    }

    pub fn state(&self) -> &TrackingState {
        &self.state
    }

    pub fn observe(&mut self, tracked: Option<&Arc<str>>, now: DateTime<Local>) -> Option<SessionSpan> {
        let (next, span) = mem::take(&mut self.state).transition(tracked, now, self.grace_window);
        self.state = next;
        span
    }

    /// Leaves the tracker idle, so calling it again yields nothing.
    pub fn shutdown(&mut self, now: DateTime<Local>) -> Option<SessionSpan> {
        mem::take(&mut self.state).flush(now)
    }
}
