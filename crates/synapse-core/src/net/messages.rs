use serde::{Deserialize, Serialize};

use crate::analysis::RoomAnalysis;
use crate::call::CallKind;
use crate::task::{GroupTask, TaskId, task_id};

/// Server-allocated identity of one socket connection.
pub type ConnectionId = u64;

// ---------------------------------------------------------------------------
// Client -> Server
// ---------------------------------------------------------------------------

/// Events a client may send over its socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    Join(JoinMsg),
    Leave(RoomRefMsg),
    Chat(ChatMsg),
    CallStart(CallStartMsg),
    CallJoin(RoomRefMsg),
    CallLeave(RoomRefMsg),
    SignalOffer(SignalMsg),
    SignalAnswer(SignalMsg),
    SignalIce(SignalMsg),
    TaskAdd(TaskAddMsg),
    TaskToggle(TaskToggleMsg),
    TaskDelete(TaskDeleteMsg),
    VoiceMessage(VoiceMessageMsg),
}

impl ClientEvent {
    /// Wire name of the event, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Join(_) => "join",
            Self::Leave(_) => "leave",
            Self::Chat(_) => "chat",
            Self::CallStart(_) => "call-start",
            Self::CallJoin(_) => "call-join",
            Self::CallLeave(_) => "call-leave",
            Self::SignalOffer(_) => "signal-offer",
            Self::SignalAnswer(_) => "signal-answer",
            Self::SignalIce(_) => "signal-ice",
            Self::TaskAdd(_) => "task-add",
            Self::TaskToggle(_) => "task-toggle",
            Self::TaskDelete(_) => "task-delete",
            Self::VoiceMessage(_) => "voice-message",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinMsg {
    pub room_code: String,
    pub display_name: String,
}

/// Payload carrying only a room code (leave, call-join, call-leave).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomRefMsg {
    pub room_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMsg {
    pub room_code: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallStartMsg {
    pub room_code: String,
    pub kind: CallKind,
}

/// Offer, answer or ICE candidate addressed to one connection. The payload is
/// never inspected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalMsg {
    pub room_code: String,
    pub payload: serde_json::Value,
    pub target_connection_id: ConnectionId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskAddMsg {
    pub room_code: String,
    pub task: GroupTask,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskToggleMsg {
    pub room_code: String,
    #[serde(deserialize_with = "task_id")]
    pub task_id: TaskId,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDeleteMsg {
    pub room_code: String,
    #[serde(deserialize_with = "task_id")]
    pub task_id: TaskId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceMessageMsg {
    pub room_code: String,
    /// Encoded audio clip (base64 in practice), passed through untouched.
    #[serde(alias = "audioBlob")]
    pub audio: String,
    /// Clip length in seconds.
    #[serde(default)]
    pub duration: f64,
}

// ---------------------------------------------------------------------------
// Server -> Client
// ---------------------------------------------------------------------------

/// Events the server pushes to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    Connected(ConnectedMsg),
    /// Display names live in the room, in join order.
    Participants(Vec<String>),
    Notice(NoticeMsg),
    ChatReceived(ChatReceivedMsg),
    CallStarted(CallStartedMsg),
    CallJoined(CallJoinedMsg),
    UserJoinedCall(CallMemberMsg),
    UserLeftCall(CallMemberMsg),
    CallEnded(CallEndedMsg),
    CallError(CallErrorMsg),
    SignalOffer(RelayedSignalMsg),
    SignalAnswer(RelayedSignalMsg),
    SignalIce(RelayedSignalMsg),
    /// Full task board of a room, in insertion order.
    TasksUpdated(Vec<GroupTask>),
    TaskToggled(TaskToggledMsg),
    VoiceMessage(VoiceClipMsg),
    AnalysisUpdated(AnalysisUpdatedMsg),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedMsg {
    pub connection_id: ConnectionId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoticeMsg {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReceivedMsg {
    pub id: String,
    pub sender: String,
    pub content: String,
    /// Unix milliseconds at which the server accepted the message.
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallStartedMsg {
    pub room_code: String,
    pub kind: CallKind,
    pub initiator: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallJoinedMsg {
    pub kind: CallKind,
    pub participants: Vec<ConnectionId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallMemberMsg {
    pub connection_id: ConnectionId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallEndedMsg {
    pub room_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallErrorMsg {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayedSignalMsg {
    pub payload: serde_json::Value,
    pub sender_connection_id: ConnectionId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskToggledMsg {
    pub task_id: TaskId,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceClipMsg {
    pub id: String,
    pub sender: String,
    pub audio: String,
    pub duration: f64,
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisUpdatedMsg {
    pub room_code: String,
    pub file_name: String,
    pub analysis: serde_json::Value,
    pub timestamp: u64,
}

impl From<RoomAnalysis> for AnalysisUpdatedMsg {
    fn from(snapshot: RoomAnalysis) -> Self {
        Self {
            room_code: snapshot.room_code,
            file_name: snapshot.file_name,
            analysis: snapshot.analysis,
            timestamp: snapshot.last_updated,
        }
    }
}
