//! Cadenza Headless
//!
//! Runs the Cadenza player without an audio backend: a TOML manifest stands in
//! for the library database, simulated pipelines play on a virtual clock and
//! player state is kept in a JSON file between runs.
//!
//! This library exposes the components for testing purposes.

pub mod config;
pub mod error;
pub mod library;
pub mod session;
pub mod settings;

// Re-export commonly used types for convenience
pub use config::{parse_scope, HeadlessConfig};
pub use error::{HeadlessError, Result};
pub use library::{ManifestLibrary, PlaylistInfo};
pub use session::{Played, Report, Session, Start};
pub use settings::JsonSettingsStore;
