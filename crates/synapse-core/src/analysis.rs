use serde::{Deserialize, Serialize};

/// Latest AI analysis saved for a room. One snapshot per room code; a new
/// upload replaces the previous one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomAnalysis {
    pub room_code: String,
    #[serde(default)]
    pub file_name: String,
    /// Opaque structured result of the summarization service.
    pub analysis: serde_json::Value,
    /// Unix milliseconds of the last write.
    pub last_updated: u64,
}
