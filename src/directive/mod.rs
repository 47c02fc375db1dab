//! The directive engine: parsing, resolution, scoring, search, and sync.

pub mod finder;
pub mod loader;
pub mod lockfile;
pub mod parser;
pub mod score;
pub mod search;
pub mod sync;
pub mod types;
pub mod validate;
