//!  Completed sessions end up in a [session_storage::SessionSink].
//!  The basic idea is:
//!   - Sessions are appended once and never edited.
//!   - Every store keeps the same row shape, [entities::SessionRecord].
//!   - With Supabase credentials sessions go to [remote_storage::RemoteSessionStore], otherwise
//!     to day files handled by [local_storage::LocalSessionStore].

pub mod entities;
pub mod local_storage;
#[cfg(test)]
pub mod memory;
pub mod remote_storage;
pub mod session_storage;
