//! ID types for Cadenza entities
//!
//! Library identifiers are plain integers assigned by the catalog. Negative
//! track ids are reserved for sentinels (see [`TrackId::NONE`]).

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! integer_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Create an ID from its raw value
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// Get the raw value
            pub const fn as_i64(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }
    };
}

integer_id!(
    /// Track identifier
    TrackId
);
integer_id!(
    /// Album identifier
    AlbumId
);
integer_id!(
    /// Artist identifier (album artist)
    ArtistId
);
integer_id!(
    /// Genre identifier
    GenreId
);
integer_id!(
    /// User playlist identifier
    PlaylistId
);

impl TrackId {
    /// No track
    pub const NONE: TrackId = TrackId(-1);

    /// Internet radio stream (metadata synthesized from the station)
    pub const RADIO: TrackId = TrackId(-6);

    /// File played from outside the library (never scanned)
    pub const EXTERNAL: TrackId = TrackId(-7);

    /// True for ids assigned by the catalog
    pub const fn is_library(self) -> bool {
        self.0 >= 0
    }

    /// True for the radio sentinel
    pub const fn is_radio(self) -> bool {
        self.0 == Self::RADIO.0
    }

    /// True for the external sentinel
    pub const fn is_external(self) -> bool {
        self.0 == Self::EXTERNAL.0
    }

    /// True for the "no track" sentinel
    pub const fn is_none(self) -> bool {
        self.0 == Self::NONE.0
    }
}
