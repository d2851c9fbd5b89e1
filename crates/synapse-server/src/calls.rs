use std::collections::{BTreeSet, HashMap};

use synapse_core::call::CallKind;
use synapse_core::net::messages::ConnectionId;

/// The single ongoing call of a room.
#[derive(Debug, Clone)]
pub struct ActiveCall {
    pub kind: CallKind,
    pub initiator: String,
    participants: BTreeSet<ConnectionId>,
}

impl ActiveCall {
    pub fn participants(&self) -> Vec<ConnectionId> {
        self.participants.iter().copied().collect()
    }

    pub fn contains(&self, connection_id: ConnectionId) -> bool {
        self.participants.contains(&connection_id)
    }
}

/// Refused call transitions. Reported to the requesting connection only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallError {
    AlreadyActive(CallKind),
    NoActiveCall,
}

impl std::fmt::Display for CallError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyActive(kind) => {
                write!(f, "A {kind} call is already active in this room")
            },
            Self::NoActiveCall => write!(f, "No active call in this room"),
        }
    }
}

/// Snapshot handed to a connection that joined a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallJoin {
    /// False if the connection was already in the call.
    pub newly_joined: bool,
    pub kind: CallKind,
    pub participants: Vec<ConnectionId>,
}

/// What removing a connection from a call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    NotInCall,
    /// Removed; others remain in the call.
    Left,
    /// Removed and the call is over.
    Ended,
}

/// Room code -> active call. A room has either no entry or exactly one call.
#[derive(Debug, Default)]
pub struct CallSessions {
    calls: HashMap<String, ActiveCall>,
}

impl CallSessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a call with the starter as its only participant. Refused while
    /// another call is active in the room.
    pub fn start(
        &mut self,
        room_code: &str,
        kind: CallKind,
        starter: ConnectionId,
        starter_name: &str,
    ) -> Result<(), CallError> {
        if let Some(active) = self.calls.get(room_code) {
            return Err(CallError::AlreadyActive(active.kind));
        }
        self.calls.insert(
            room_code.to_string(),
            ActiveCall {
                kind,
                initiator: starter_name.to_string(),
                participants: BTreeSet::from([starter]),
            },
        );
        Ok(())
    }

    pub fn join(
        &mut self,
        room_code: &str,
        connection_id: ConnectionId,
    ) -> Result<CallJoin, CallError> {
        let call = self
            .calls
            .get_mut(room_code)
            .ok_or(CallError::NoActiveCall)?;
        let newly_joined = call.participants.insert(connection_id);
        Ok(CallJoin {
            newly_joined,
            kind: call.kind,
            participants: call.participants(),
        })
    }

    /// Remove a connection from the room's call, ending the call when its
    /// participant set becomes empty.
    pub fn leave(&mut self, room_code: &str, connection_id: ConnectionId) -> LeaveOutcome {
        let Some(call) = self.calls.get_mut(room_code) else {
            return LeaveOutcome::NotInCall;
        };
        if !call.participants.remove(&connection_id) {
            return LeaveOutcome::NotInCall;
        }
        if call.participants.is_empty() {
            self.calls.remove(room_code);
            return LeaveOutcome::Ended;
        }
        LeaveOutcome::Left
    }

    /// Remove a connection from every call it takes part in. Only rooms where
    /// it was actually removed are returned.
    pub fn remove_from_all_calls(
        &mut self,
        connection_id: ConnectionId,
    ) -> Vec<(String, LeaveOutcome)> {
        let codes: Vec<String> = self
            .calls
            .iter()
            .filter(|(_, call)| call.contains(connection_id))
            .map(|(code, _)| code.clone())
            .collect();
        codes
            .into_iter()
            .map(|code| {
                let outcome = self.leave(&code, connection_id);
                (code, outcome)
            })
            .collect()
    }

    pub fn get(&self, room_code: &str) -> Option<&ActiveCall> {
        self.calls.get(room_code)
    }

    pub fn active_count(&self) -> usize {
        self.calls.len()
    }
}
