//! Browsing scopes that define an album universe

use crate::types::{ArtistId, GenreId};
use serde::{Deserialize, Serialize};

/// Album universe selector passed to the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum Scope {
    /// Every album, compilations first
    All,

    /// Most played albums
    Popular,

    /// Recently added albums
    Recent,

    /// Cached random selection of albums
    Random,

    /// Compilations regardless of genre
    Compilations,

    /// Compilations and albums of one genre
    Genre(GenreId),

    /// Albums of one album artist
    Artist(ArtistId),
}

impl Scope {
    /// Genre filter to apply when listing an album's tracks
    pub fn genre_filter(&self) -> Option<GenreId> {
        match self {
            Scope::Genre(genre) => Some(*genre),
            _ => None,
        }
    }

    /// Scopes whose album list is defined by album attributes alone, so the
    /// playing album must be part of it
    pub fn is_anchored(&self) -> bool {
        matches!(self, Scope::All | Scope::Genre(_) | Scope::Artist(_))
    }

    /// Scopes accepted as party buckets
    pub fn is_party_bucket(&self) -> bool {
        matches!(self, Scope::Genre(_) | Scope::Popular | Scope::Recent)
    }
}
