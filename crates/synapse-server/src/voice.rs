use std::collections::HashMap;

use synapse_core::net::messages::VoiceClipMsg;

/// Per-room, append-only buffer of voice clips. Lives for the process lifetime.
#[derive(Debug, Default)]
pub struct VoiceBuffers {
    rooms: HashMap<String, Vec<VoiceClipMsg>>,
}

impl VoiceBuffers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, room_code: &str, clip: VoiceClipMsg) {
        self.rooms
            .entry(room_code.to_string())
            .or_default()
            .push(clip);
    }

    pub fn clips(&self, room_code: &str) -> &[VoiceClipMsg] {
        self.rooms.get(room_code).map(Vec::as_slice).unwrap_or(&[])
    }
}
