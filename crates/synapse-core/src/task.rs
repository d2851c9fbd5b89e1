use serde::{Deserialize, Deserializer, Serialize};

/// Identity of a group task. Browsers often mint numeric ids, so both JSON
/// strings and numbers are accepted and normalised to their string form.
pub type TaskId = String;

/// A shared, room-scoped to-do item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupTask {
    #[serde(deserialize_with = "task_id")]
    pub id: TaskId,
    #[serde(default, alias = "description")]
    pub text: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    /// Client-defined fields (type, timestamp, ...) carried through untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl GroupTask {
    pub fn new(id: impl Into<TaskId>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            completed: false,
            created_by: None,
            extra: serde_json::Map::new(),
        }
    }
}

/// Deserialize a task id from either a JSON string or a JSON number.
pub fn task_id<'de, D>(deserializer: D) -> Result<TaskId, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Number(n) => n.to_string(),
    })
}
