mod ids;
mod modes;
mod radio;
mod scope;
mod state;
mod track;

pub use ids::{AlbumId, ArtistId, GenreId, PlaylistId, TrackId};
pub use modes::{NextDisposition, ShuffleMode};
pub use radio::RadioStation;
pub use scope::Scope;
pub use state::PersistedState;
pub use track::Track;
