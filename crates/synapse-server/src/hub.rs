use std::collections::{BTreeSet, HashMap};

use bytes::Bytes;
use tokio::sync::mpsc;
use uuid::Uuid;

use synapse_core::net::messages::{
    CallErrorMsg, CallJoinedMsg, CallMemberMsg, CallStartMsg, CallStartedMsg, CallEndedMsg,
    ChatMsg, ChatReceivedMsg, ClientEvent, ConnectedMsg, ConnectionId, JoinMsg, NoticeMsg,
    RelayedSignalMsg, RoomRefMsg, ServerEvent, SignalMsg, TaskAddMsg, TaskDeleteMsg,
    TaskToggleMsg, TaskToggledMsg, VoiceClipMsg, VoiceMessageMsg,
};
use synapse_core::net::protocol::{MAX_CHAT_LEN, encode_server_event};
use synapse_core::room::{normalize_display_name, normalize_room_code};
use synapse_core::time::unix_millis;

use crate::calls::{CallError, CallSessions, LeaveOutcome};
use crate::registry::RoomRegistry;
use crate::tasks::TaskBoards;
use crate::voice::VoiceBuffers;

/// Per-connection sender for outbound JSON text frames.
/// Bounded so a slow client cannot exhaust memory; uses `Bytes` so one
/// encoded frame is shared by every recipient of a broadcast.
pub type ConnectionSender = mpsc::Sender<Bytes>;

/// Sender label used when a connection is not (or no longer) live in the room.
const UNKNOWN_SENDER: &str = "Unknown";

struct Connection {
    sender: ConnectionSender,
    /// Rooms this connection has joined and receives broadcasts for.
    rooms: BTreeSet<String>,
}

/// Work a handler could not finish under the hub lock because it awaits the
/// room store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FollowUp {
    /// Deliver the room's latest analysis snapshot to a newly joined connection.
    CatchUp {
        connection_id: ConnectionId,
        room_code: String,
    },
}

/// Counters for the health endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubStats {
    pub connections: usize,
    pub live_rooms: usize,
    pub participants: usize,
    pub active_calls: usize,
}

/// Owns every piece of real-time state: connections and their room
/// subscriptions, live rosters, calls, task boards and voice buffers.
///
/// All mutation goes through [`Hub::dispatch`] and [`Hub::disconnect`]; the
/// caller serializes access (one writer at a time), and each event is handled
/// to completion, broadcasts included, before the next one.
pub struct Hub {
    connections: HashMap<ConnectionId, Connection>,
    subscribers: HashMap<String, BTreeSet<ConnectionId>>,
    registry: RoomRegistry,
    calls: CallSessions,
    tasks: TaskBoards,
    voice: VoiceBuffers,
    next_connection_id: ConnectionId,
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

impl Hub {
    pub fn new() -> Self {
        Self {
            connections: HashMap::new(),
            subscribers: HashMap::new(),
            registry: RoomRegistry::new(),
            calls: CallSessions::new(),
            tasks: TaskBoards::new(),
            voice: VoiceBuffers::new(),
            next_connection_id: 1,
        }
    }

    fn alloc_connection_id(&mut self) -> ConnectionId {
        let id = self.next_connection_id;
        self.next_connection_id += 1;
        id
    }

    /// Register a new connection and greet it with its id.
    pub fn connect(&mut self, sender: ConnectionSender) -> ConnectionId {
        let connection_id = self.alloc_connection_id();
        self.connections.insert(
            connection_id,
            Connection {
                sender,
                rooms: BTreeSet::new(),
            },
        );
        self.send_to_connection(
            connection_id,
            &ServerEvent::Connected(ConnectedMsg { connection_id }),
        );
        connection_id
    }

    /// Route one client event to its handler.
    pub fn dispatch(
        &mut self,
        connection_id: ConnectionId,
        event: ClientEvent,
    ) -> Option<FollowUp> {
        if !self.connections.contains_key(&connection_id) {
            tracing::debug!(
                connection_id,
                event = event.name(),
                "Event from unknown connection"
            );
            return None;
        }
        match event {
            ClientEvent::Join(msg) => return self.on_join(connection_id, msg),
            ClientEvent::Leave(msg) => self.on_leave(connection_id, msg),
            ClientEvent::Chat(msg) => self.on_chat(connection_id, msg),
            ClientEvent::CallStart(msg) => self.on_call_start(connection_id, msg),
            ClientEvent::CallJoin(msg) => self.on_call_join(connection_id, msg),
            ClientEvent::CallLeave(msg) => self.on_call_leave(connection_id, msg),
            ClientEvent::SignalOffer(msg) => {
                self.on_signal(connection_id, msg, ServerEvent::SignalOffer)
            },
            ClientEvent::SignalAnswer(msg) => {
                self.on_signal(connection_id, msg, ServerEvent::SignalAnswer)
            },
            ClientEvent::SignalIce(msg) => {
                self.on_signal(connection_id, msg, ServerEvent::SignalIce)
            },
            ClientEvent::TaskAdd(msg) => self.on_task_add(connection_id, msg),
            ClientEvent::TaskToggle(msg) => self.on_task_toggle(connection_id, msg),
            ClientEvent::TaskDelete(msg) => self.on_task_delete(connection_id, msg),
            ClientEvent::VoiceMessage(msg) => self.on_voice_message(connection_id, msg),
        }
        None
    }

    /// Tear down everything a connection touched: its calls, its live
    /// entries and its subscriptions, in every room.
    pub fn disconnect(&mut self, connection_id: ConnectionId) {
        let Some(connection) = self.connections.remove(&connection_id) else {
            return;
        };
        for room_code in &connection.rooms {
            self.unsubscribe(connection_id, room_code);
        }

        for (room_code, outcome) in self.calls.remove_from_all_calls(connection_id) {
            self.announce_call_departure(&room_code, connection_id, outcome);
        }

        for (room_code, departed) in self.registry.leave_all(connection_id) {
            tracing::info!(
                connection_id,
                room = %room_code,
                name = %departed.display_name,
                "Participant left"
            );
            self.broadcast_to_room(
                &room_code,
                &ServerEvent::Notice(NoticeMsg {
                    text: format!("{} left the room", departed.display_name),
                }),
            );
            self.broadcast_participants(&room_code);
        }
    }

    // ---- Handlers --------------------------------------------------------

    fn on_join(&mut self, connection_id: ConnectionId, msg: JoinMsg) -> Option<FollowUp> {
        let (Some(room_code), Some(name)) = (
            normalize_room_code(&msg.room_code),
            normalize_display_name(&msg.display_name),
        ) else {
            tracing::debug!(connection_id, "Dropping join with invalid room code or name");
            return None;
        };
        let room_code = room_code.to_string();

        self.subscribe(connection_id, &room_code);
        if let Some(stale) = self.registry.join(&room_code, connection_id, name) {
            tracing::info!(
                connection_id,
                stale_connection_id = stale.connection_id,
                room = %room_code,
                name,
                "Replaced stale participant with the same name"
            );
        }
        tracing::info!(connection_id, room = %room_code, name, "Participant joined");

        self.broadcast_to_room_except(
            &room_code,
            connection_id,
            &ServerEvent::Notice(NoticeMsg {
                text: format!("{name} joined the room"),
            }),
        );
        self.broadcast_participants(&room_code);

        // Late joiners see the shared board, any call in progress and the
        // voice clips sent so far.
        let board = self.tasks.list(&room_code);
        if !board.is_empty() {
            self.send_to_connection(connection_id, &ServerEvent::TasksUpdated(board.to_vec()));
        }
        if let Some(call) = self.calls.get(&room_code) {
            self.send_to_connection(
                connection_id,
                &ServerEvent::CallStarted(CallStartedMsg {
                    room_code: room_code.clone(),
                    kind: call.kind,
                    initiator: call.initiator.clone(),
                }),
            );
        }
        for clip in self.voice.clips(&room_code) {
            self.send_to_connection(connection_id, &ServerEvent::VoiceMessage(clip.clone()));
        }

        Some(FollowUp::CatchUp {
            connection_id,
            room_code,
        })
    }

    fn on_leave(&mut self, connection_id: ConnectionId, msg: RoomRefMsg) {
        let Some(room_code) = self.joined_room(connection_id, &msg.room_code) else {
            return;
        };
        self.unsubscribe(connection_id, &room_code);
        if let Some(conn) = self.connections.get_mut(&connection_id) {
            conn.rooms.remove(&room_code);
        }

        let outcome = self.calls.leave(&room_code, connection_id);
        self.announce_call_departure(&room_code, connection_id, outcome);

        if let Some(departed) = self.registry.leave(&room_code, connection_id) {
            tracing::info!(
                connection_id,
                room = %room_code,
                name = %departed.display_name,
                "Participant left"
            );
            self.broadcast_to_room(
                &room_code,
                &ServerEvent::Notice(NoticeMsg {
                    text: format!("{} left the room", departed.display_name),
                }),
            );
            self.broadcast_participants(&room_code);
        }
    }

    fn on_chat(&mut self, connection_id: ConnectionId, msg: ChatMsg) {
        let Some(room_code) = self.joined_room(connection_id, &msg.room_code) else {
            return;
        };
        if !is_acceptable_chat(&msg.text) {
            tracing::debug!(connection_id, room = %room_code, "Dropping invalid chat message");
            return;
        }
        let sender = self.sender_name(&room_code, connection_id);
        let event = ServerEvent::ChatReceived(ChatReceivedMsg {
            id: Uuid::new_v4().to_string(),
            sender,
            content: msg.text,
            timestamp: unix_millis(),
        });
        self.broadcast_to_room(&room_code, &event);
    }

    fn on_call_start(&mut self, connection_id: ConnectionId, msg: CallStartMsg) {
        let Some(room_code) = self.joined_room(connection_id, &msg.room_code) else {
            return;
        };
        if !self.registry.is_live(&room_code) {
            tracing::debug!(
                connection_id,
                room = %room_code,
                "Call start in room with no live roster"
            );
            return;
        }
        let initiator = self.sender_name(&room_code, connection_id);
        match self
            .calls
            .start(&room_code, msg.kind, connection_id, &initiator)
        {
            Ok(()) => {
                tracing::info!(connection_id, room = %room_code, kind = %msg.kind, "Call started");
                self.broadcast_to_room_except(
                    &room_code,
                    connection_id,
                    &ServerEvent::CallStarted(CallStartedMsg {
                        room_code: room_code.clone(),
                        kind: msg.kind,
                        initiator,
                    }),
                );
            },
            Err(e) => self.send_call_error(connection_id, e),
        }
    }

    fn on_call_join(&mut self, connection_id: ConnectionId, msg: RoomRefMsg) {
        let Some(room_code) = self.joined_room(connection_id, &msg.room_code) else {
            return;
        };
        match self.calls.join(&room_code, connection_id) {
            Ok(join) => {
                if join.newly_joined {
                    tracing::info!(connection_id, room = %room_code, "Joined call");
                    self.broadcast_to_room_except(
                        &room_code,
                        connection_id,
                        &ServerEvent::UserJoinedCall(CallMemberMsg { connection_id }),
                    );
                }
                self.send_to_connection(
                    connection_id,
                    &ServerEvent::CallJoined(CallJoinedMsg {
                        kind: join.kind,
                        participants: join.participants,
                    }),
                );
            },
            Err(e) => self.send_call_error(connection_id, e),
        }
    }

    fn on_call_leave(&mut self, connection_id: ConnectionId, msg: RoomRefMsg) {
        let Some(room_code) = self.joined_room(connection_id, &msg.room_code) else {
            return;
        };
        let outcome = self.calls.leave(&room_code, connection_id);
        self.announce_call_departure(&room_code, connection_id, outcome);
    }

    fn on_signal(
        &self,
        connection_id: ConnectionId,
        msg: SignalMsg,
        wrap: fn(RelayedSignalMsg) -> ServerEvent,
    ) {
        if self.joined_room(connection_id, &msg.room_code).is_none() {
            return;
        }
        if !self.connections.contains_key(&msg.target_connection_id) {
            tracing::debug!(
                connection_id,
                target = msg.target_connection_id,
                "Signal target is gone"
            );
            return;
        }
        let event = wrap(RelayedSignalMsg {
            payload: msg.payload,
            sender_connection_id: connection_id,
        });
        self.send_to_connection(msg.target_connection_id, &event);
    }

    fn on_task_add(&mut self, connection_id: ConnectionId, msg: TaskAddMsg) {
        let Some(room_code) = self.joined_room(connection_id, &msg.room_code) else {
            return;
        };
        let mut task = msg.task;
        if task.id.trim().is_empty() {
            tracing::debug!(connection_id, room = %room_code, "Dropping task without id");
            return;
        }
        if task.created_by.is_none() {
            task.created_by = Some(self.sender_name(&room_code, connection_id));
        }
        let task_id = task.id.clone();
        match self.tasks.add(&room_code, task).map(<[_]>::to_vec) {
            Some(board) => {
                tracing::debug!(connection_id, room = %room_code, %task_id, "Task added");
                self.broadcast_to_room(&room_code, &ServerEvent::TasksUpdated(board));
            },
            None => {
                tracing::debug!(connection_id, room = %room_code, %task_id, "Duplicate task id");
            },
        }
    }

    fn on_task_toggle(&mut self, connection_id: ConnectionId, msg: TaskToggleMsg) {
        let Some(room_code) = self.joined_room(connection_id, &msg.room_code) else {
            return;
        };
        if !self.tasks.toggle(&room_code, &msg.task_id, msg.completed) {
            tracing::debug!(
                connection_id,
                room = %room_code,
                task_id = %msg.task_id,
                "Toggle of unknown task"
            );
            return;
        }
        self.broadcast_to_room(
            &room_code,
            &ServerEvent::TaskToggled(TaskToggledMsg {
                task_id: msg.task_id,
                completed: msg.completed,
            }),
        );
    }

    fn on_task_delete(&mut self, connection_id: ConnectionId, msg: TaskDeleteMsg) {
        let Some(room_code) = self.joined_room(connection_id, &msg.room_code) else {
            return;
        };
        match self.tasks.delete(&room_code, &msg.task_id).map(<[_]>::to_vec) {
            Some(board) => self.broadcast_to_room(&room_code, &ServerEvent::TasksUpdated(board)),
            None => {
                tracing::debug!(
                    connection_id,
                    room = %room_code,
                    task_id = %msg.task_id,
                    "Delete of unknown task"
                );
            },
        }
    }

    fn on_voice_message(&mut self, connection_id: ConnectionId, msg: VoiceMessageMsg) {
        let Some(room_code) = self.joined_room(connection_id, &msg.room_code) else {
            return;
        };
        if msg.audio.is_empty() {
            return;
        }
        let clip = VoiceClipMsg {
            id: Uuid::new_v4().to_string(),
            sender: self.sender_name(&room_code, connection_id),
            audio: msg.audio,
            duration: msg.duration,
            timestamp: unix_millis(),
        };
        self.voice.append(&room_code, clip.clone());
        self.broadcast_to_room(&room_code, &ServerEvent::VoiceMessage(clip));
    }

    // ---- Helpers ---------------------------------------------------------

    /// Normalized room code if the connection has joined that room.
    fn joined_room(&self, connection_id: ConnectionId, raw: &str) -> Option<String> {
        let room_code = normalize_room_code(raw)?;
        let joined = self
            .connections
            .get(&connection_id)
            .is_some_and(|c| c.rooms.contains(room_code));
        if !joined {
            tracing::debug!(connection_id, room = room_code, "Event for a room not joined");
            return None;
        }
        Some(room_code.to_string())
    }

    fn sender_name(&self, room_code: &str, connection_id: ConnectionId) -> String {
        self.registry
            .display_name(room_code, connection_id)
            .unwrap_or(UNKNOWN_SENDER)
            .to_string()
    }

    fn subscribe(&mut self, connection_id: ConnectionId, room_code: &str) {
        if let Some(conn) = self.connections.get_mut(&connection_id) {
            conn.rooms.insert(room_code.to_string());
        }
        self.subscribers
            .entry(room_code.to_string())
            .or_default()
            .insert(connection_id);
    }

    fn unsubscribe(&mut self, connection_id: ConnectionId, room_code: &str) {
        if let Some(subs) = self.subscribers.get_mut(room_code) {
            subs.remove(&connection_id);
            if subs.is_empty() {
                self.subscribers.remove(room_code);
            }
        }
    }

    fn announce_call_departure(
        &self,
        room_code: &str,
        connection_id: ConnectionId,
        outcome: LeaveOutcome,
    ) {
        if outcome == LeaveOutcome::NotInCall {
            return;
        }
        self.broadcast_to_room_except(
            room_code,
            connection_id,
            &ServerEvent::UserLeftCall(CallMemberMsg { connection_id }),
        );
        if outcome == LeaveOutcome::Ended {
            tracing::info!(room = room_code, "Call ended, no participants left");
            self.broadcast_to_room(
                room_code,
                &ServerEvent::CallEnded(CallEndedMsg {
                    room_code: room_code.to_string(),
                }),
            );
        }
    }

    fn send_call_error(&self, connection_id: ConnectionId, error: CallError) {
        tracing::debug!(connection_id, %error, "Call request refused");
        self.send_to_connection(
            connection_id,
            &ServerEvent::CallError(CallErrorMsg {
                message: error.to_string(),
            }),
        );
    }

    // ---- Delivery --------------------------------------------------------

    fn encode(event: &ServerEvent) -> Option<Bytes> {
        match encode_server_event(event) {
            Ok(text) => Some(Bytes::from(text)),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to encode server event");
                None
            },
        }
    }

    /// Send an event to one connection. Silently skipped if it is gone.
    pub fn send_to_connection(&self, connection_id: ConnectionId, event: &ServerEvent) {
        let Some(conn) = self.connections.get(&connection_id) else {
            return;
        };
        if let Some(data) = Self::encode(event)
            && let Err(e) = conn.sender.try_send(data)
        {
            tracing::debug!(
                connection_id, error = %e,
                "Failed to send to connection (slow or disconnected)"
            );
        }
    }

    /// Send an event to every connection joined to a room.
    pub fn broadcast_to_room(&self, room_code: &str, event: &ServerEvent) {
        self.fan_out(room_code, None, event);
    }

    /// Send an event to every connection joined to a room except one.
    pub fn broadcast_to_room_except(
        &self,
        room_code: &str,
        exclude: ConnectionId,
        event: &ServerEvent,
    ) {
        self.fan_out(room_code, Some(exclude), event);
    }

    fn fan_out(&self, room_code: &str, exclude: Option<ConnectionId>, event: &ServerEvent) {
        let Some(subs) = self.subscribers.get(room_code) else {
            return;
        };
        let Some(data) = Self::encode(event) else {
            return;
        };
        for &id in subs {
            if Some(id) == exclude {
                continue;
            }
            if let Some(conn) = self.connections.get(&id)
                && let Err(e) = conn.sender.try_send(data.clone())
            {
                tracing::debug!(
                    connection_id = id, room = room_code, error = %e,
                    "Skipping broadcast to slow client"
                );
            }
        }
    }

    /// Build and broadcast the live roster of a room.
    pub fn broadcast_participants(&self, room_code: &str) {
        let names = self.registry.list_names(room_code);
        tracing::debug!(room = room_code, ?names, "Broadcasting participants");
        self.broadcast_to_room(room_code, &ServerEvent::Participants(names));
    }

    pub fn stats(&self) -> HubStats {
        HubStats {
            connections: self.connections.len(),
            live_rooms: self.registry.room_count(),
            participants: self.registry.participant_count(),
            active_calls: self.calls.active_count(),
        }
    }

    #[cfg(test)]
    pub fn registry(&self) -> &RoomRegistry {
        &self.registry
    }

    #[cfg(test)]
    pub fn calls(&self) -> &CallSessions {
        &self.calls
    }

    #[cfg(test)]
    pub fn tasks(&self) -> &TaskBoards {
        &self.tasks
    }

    #[cfg(test)]
    pub fn voice(&self) -> &VoiceBuffers {
        &self.voice
    }
}

fn is_acceptable_chat(text: &str) -> bool {
    !text.trim().is_empty()
        && text.len() <= MAX_CHAT_LEN
        && !text.chars().any(|c| c.is_control() && c != '\n')
}
