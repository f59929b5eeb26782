//! Tracks which application is focused, turns the samples into usage sessions and stores them
//! either in a Supabase table or in local files. A grace period keeps short interruptions from
//! splitting one session in two.
//!

pub mod cli;
pub mod config;
pub mod daemon;
pub mod error;
pub mod utils;
pub mod window_api;
