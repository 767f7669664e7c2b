//! Names for transient files in the remote session's scratch directory.

use serde::Serialize;
use uuid::Uuid;

/// Extension carried by every uploaded data file.
pub const REMOTE_FILE_EXTENSION: &str = "data";

/// A uniquely named transient file in the remote session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RemoteFileHandle(String);

impl RemoteFileHandle {
    /// Generate a fresh `<uuid-v4>.data` name.
    pub fn generate() -> Self {
        Self(format!("{}.{}", Uuid::new_v4(), REMOTE_FILE_EXTENSION))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RemoteFileHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
