pub mod collector;
pub mod filter;
pub mod tracker;
