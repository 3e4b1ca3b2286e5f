//! Internet radio station

use serde::{Deserialize, Serialize};

/// Entry of the radio directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RadioStation {
    /// Display name, unique within the directory
    pub name: String,

    /// Stream URI
    pub uri: String,
}

impl RadioStation {
    /// Create a new station
    pub fn new(name: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uri: uri.into(),
        }
    }
}
