/// Headless driver configuration
use crate::error::{HeadlessError, Result};
use cadenza_core::{Scope, ShuffleMode};
use cadenza_playback::PlayerConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HeadlessConfig {
    #[serde(default = "default_library")]
    pub library: LibrarySettings,

    #[serde(default = "default_player")]
    pub player: PlayerSettings,

    #[serde(default = "default_state")]
    pub state: StateSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LibrarySettings {
    /// TOML manifest describing albums, playlists and radio stations
    #[serde(default = "default_manifest")]
    pub manifest: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlayerSettings {
    #[serde(default = "default_gapless_lead_ms")]
    pub gapless_lead_ms: u64,

    #[serde(default = "default_error_skip_delay_ms")]
    pub error_skip_delay_ms: u64,

    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    #[serde(default = "default_volume")]
    pub volume: f64,

    #[serde(default)]
    pub shuffle: ShuffleMode,

    /// Party buckets as `genre:<id>`, `popular` or `recent`
    #[serde(default)]
    pub party_scopes: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StateSettings {
    #[serde(default = "default_state_path")]
    pub path: PathBuf,

    #[serde(default = "default_save_state")]
    pub save_state: bool,
}

impl HeadlessConfig {
    /// Load configuration from `config.toml` (or `path`) and environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = config::Config::builder();

        let config_path = path.map_or_else(|| PathBuf::from("config.toml"), Path::to_path_buf);
        if config_path.exists() {
            settings = settings.add_source(config::File::from(config_path));
        } else if path.is_some() {
            return Err(HeadlessError::Config(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }

        // Override with environment variables (prefixed with CADENZA_)
        settings = settings.add_source(
            config::Environment::with_prefix("CADENZA")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = settings
            .build()
            .map_err(|e| HeadlessError::Config(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| HeadlessError::Config(e.to_string()))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.player.volume) {
            return Err(HeadlessError::Config(format!(
                "Volume must be between 0.0 and 1.0, got {}",
                self.player.volume
            )));
        }

        if self.player.error_skip_delay_ms == 0 {
            return Err(HeadlessError::Config(
                "Error skip delay must be positive".to_string(),
            ));
        }

        self.party_scopes()?;
        Ok(())
    }

    /// Parsed party buckets
    pub fn party_scopes(&self) -> Result<Vec<Scope>> {
        self.player
            .party_scopes
            .iter()
            .map(|s| parse_scope(s))
            .collect()
    }

    /// Player configuration for an application-driven session
    pub fn player_config(&self) -> Result<PlayerConfig> {
        Ok(PlayerConfig {
            gapless_lead_ms: self.player.gapless_lead_ms,
            error_skip_delay_ms: self.player.error_skip_delay_ms,
            history_limit: self.player.history_limit,
            volume: self.player.volume,
            shuffle: self.player.shuffle,
            party_scopes: self.party_scopes()?,
            background_worker: false,
        })
    }
}

/// Parse `all`, `popular`, `recent`, `random`, `compilations`, `genre:<id>`
/// or `artist:<id>`
pub fn parse_scope(text: &str) -> Result<Scope> {
    let invalid = || HeadlessError::Config(format!("Invalid scope: {text}"));
    let (kind, id) = match text.split_once(':') {
        Some((kind, id)) => (kind, Some(id.trim().parse::<i64>().map_err(|_| invalid())?)),
        None => (text, None),
    };

    match (kind.trim().to_ascii_lowercase().as_str(), id) {
        ("all", None) => Ok(Scope::All),
        ("popular", None) => Ok(Scope::Popular),
        ("recent", None) => Ok(Scope::Recent),
        ("random", None) => Ok(Scope::Random),
        ("compilations", None) => Ok(Scope::Compilations),
        ("genre", Some(id)) => Ok(Scope::Genre(id.into())),
        ("artist", Some(id)) => Ok(Scope::Artist(id.into())),
        _ => Err(invalid()),
    }
}

// Default values
fn default_library() -> LibrarySettings {
    LibrarySettings {
        manifest: default_manifest(),
    }
}

fn default_manifest() -> PathBuf {
    PathBuf::from("library.toml")
}

fn default_player() -> PlayerSettings {
    PlayerSettings {
        gapless_lead_ms: default_gapless_lead_ms(),
        error_skip_delay_ms: default_error_skip_delay_ms(),
        history_limit: default_history_limit(),
        volume: default_volume(),
        shuffle: ShuffleMode::None,
        party_scopes: Vec::new(),
    }
}

fn default_gapless_lead_ms() -> u64 {
    100
}

fn default_error_skip_delay_ms() -> u64 {
    2000
}

fn default_history_limit() -> usize {
    500
}

fn default_volume() -> f64 {
    1.0
}

fn default_state() -> StateSettings {
    StateSettings {
        path: default_state_path(),
        save_state: default_save_state(),
    }
}

fn default_state_path() -> PathBuf {
    PathBuf::from("./data/state.json")
}

fn default_save_state() -> bool {
    true
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            library: default_library(),
            player: default_player(),
            state: default_state(),
        }
    }
}
