//! Durable room records, analysis snapshots, roadmaps and user points.
//!
//! The real-time layer only reads the latest snapshot on join; the HTTP API
//! owns the rest. [`MemoryStore`] is the in-process backend.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use synapse_core::analysis::RoomAnalysis;
use synapse_core::roadmap::Roadmap;
use synapse_core::room::generate_room_code;

/// Attempts at drawing an unused room code before giving up.
const MAX_CODE_ATTEMPTS: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    NotFound(String),
    Conflict(String),
    Backend(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(what) => write!(f, "{what} not found"),
            Self::Conflict(msg) => write!(f, "conflict: {msg}"),
            Self::Backend(msg) => write!(f, "store backend error: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// A persisted room: who created it and which users have joined it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRoom {
    pub room_code: String,
    pub host_id: String,
    pub participants: Vec<String>,
}

/// Result of marking a roadmap task completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskCompletion {
    /// The task is now completed and the user was credited.
    Awarded { points: u32, total: u64 },
    /// The task was completed before; nothing changed.
    AlreadyCompleted,
}

#[async_trait]
pub trait RoomStore: Send + Sync {
    /// Create a room with a fresh unique code; the host is its first participant.
    async fn create_room(&self, host_id: &str) -> Result<StoredRoom, StoreError>;

    /// Add a user to a room. The flag is false if the user was already a member.
    async fn join_room(
        &self,
        room_code: &str,
        user_id: &str,
    ) -> Result<(StoredRoom, bool), StoreError>;

    async fn get_room(&self, room_code: &str) -> Result<Option<StoredRoom>, StoreError>;

    /// Latest analysis snapshot of a room, if any.
    async fn latest_analysis(&self, room_code: &str) -> Result<Option<RoomAnalysis>, StoreError>;

    /// Insert or replace the room's snapshot (one per room).
    async fn upsert_analysis(&self, snapshot: RoomAnalysis) -> Result<RoomAnalysis, StoreError>;

    /// Store a new roadmap under a fresh id.
    async fn save_roadmap(&self, roadmap: Roadmap) -> Result<Roadmap, StoreError>;

    /// Mark a roadmap task completed and credit its award to the user.
    async fn complete_task(
        &self,
        roadmap_id: &str,
        task_id: &str,
        user_id: &str,
    ) -> Result<TaskCompletion, StoreError>;

    /// Running point total of a user; 0 if never credited.
    async fn user_points(&self, user_id: &str) -> Result<u64, StoreError>;
}

#[derive(Default)]
pub struct MemoryStore {
    rooms: RwLock<HashMap<String, StoredRoom>>,
    analyses: RwLock<HashMap<String, RoomAnalysis>>,
    roadmaps: RwLock<HashMap<String, Roadmap>>,
    points: RwLock<HashMap<String, u64>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoomStore for MemoryStore {
    async fn create_room(&self, host_id: &str) -> Result<StoredRoom, StoreError> {
        let mut rooms = self.rooms.write().await;
        for _ in 0..MAX_CODE_ATTEMPTS {
            let room_code = generate_room_code();
            if rooms.contains_key(&room_code) {
                tracing::debug!(room = %room_code, "Room code collision, regenerating");
                continue;
            }
            let room = StoredRoom {
                room_code: room_code.clone(),
                host_id: host_id.to_string(),
                participants: vec![host_id.to_string()],
            };
            rooms.insert(room_code, room.clone());
            return Ok(room);
        }
        Err(StoreError::Conflict(
            "could not allocate a unique room code".into(),
        ))
    }

    async fn join_room(
        &self,
        room_code: &str,
        user_id: &str,
    ) -> Result<(StoredRoom, bool), StoreError> {
        let mut rooms = self.rooms.write().await;
        let room = rooms
            .get_mut(room_code)
            .ok_or_else(|| StoreError::NotFound(format!("Room {room_code}")))?;
        let added = !room.participants.iter().any(|p| p == user_id);
        if added {
            room.participants.push(user_id.to_string());
        }
        Ok((room.clone(), added))
    }

    async fn get_room(&self, room_code: &str) -> Result<Option<StoredRoom>, StoreError> {
        Ok(self.rooms.read().await.get(room_code).cloned())
    }

    async fn latest_analysis(&self, room_code: &str) -> Result<Option<RoomAnalysis>, StoreError> {
        Ok(self.analyses.read().await.get(room_code).cloned())
    }

    async fn upsert_analysis(&self, snapshot: RoomAnalysis) -> Result<RoomAnalysis, StoreError> {
        self.analyses
            .write()
            .await
            .insert(snapshot.room_code.clone(), snapshot.clone());
        Ok(snapshot)
    }

    async fn save_roadmap(&self, mut roadmap: Roadmap) -> Result<Roadmap, StoreError> {
        roadmap.id = Uuid::new_v4().to_string();
        self.roadmaps
            .write()
            .await
            .insert(roadmap.id.clone(), roadmap.clone());
        Ok(roadmap)
    }

    async fn complete_task(
        &self,
        roadmap_id: &str,
        task_id: &str,
        user_id: &str,
    ) -> Result<TaskCompletion, StoreError> {
        // Lock order: roadmaps, then points.
        let mut roadmaps = self.roadmaps.write().await;
        let roadmap = roadmaps
            .get_mut(roadmap_id)
            .ok_or_else(|| StoreError::NotFound(format!("Roadmap {roadmap_id}")))?;
        let task = roadmap
            .task_mut(task_id)
            .ok_or_else(|| StoreError::NotFound(format!("Task {task_id}")))?;
        if task.completed {
            return Ok(TaskCompletion::AlreadyCompleted);
        }
        task.completed = true;
        let points = task.award();

        let mut totals = self.points.write().await;
        let total = totals.entry(user_id.to_string()).or_default();
        *total = total.saturating_add(u64::from(points));
        Ok(TaskCompletion::Awarded {
            points,
            total: *total,
        })
    }

    async fn user_points(&self, user_id: &str) -> Result<u64, StoreError> {
        Ok(self.points.read().await.get(user_id).copied().unwrap_or(0))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use synapse_core::roadmap::{Milestone, RoadmapTask};
    use synapse_core::room::is_valid_room_code;

    /// Backend that fails every call, for exercising degraded paths.
    pub(crate) struct FailingStore;

    #[async_trait]
    impl RoomStore for FailingStore {
        async fn create_room(&self, _host_id: &str) -> Result<StoredRoom, StoreError> {
            Err(StoreError::Backend("offline".into()))
        }

        async fn join_room(
            &self,
            _room_code: &str,
            _user_id: &str,
        ) -> Result<(StoredRoom, bool), StoreError> {
            Err(StoreError::Backend("offline".into()))
        }

        async fn get_room(&self, _room_code: &str) -> Result<Option<StoredRoom>, StoreError> {
            Err(StoreError::Backend("offline".into()))
        }

        async fn latest_analysis(
            &self,
            _room_code: &str,
        ) -> Result<Option<RoomAnalysis>, StoreError> {
            Err(StoreError::Backend("offline".into()))
        }

        async fn upsert_analysis(
            &self,
            _snapshot: RoomAnalysis,
        ) -> Result<RoomAnalysis, StoreError> {
            Err(StoreError::Backend("offline".into()))
        }

        async fn save_roadmap(&self, _roadmap: Roadmap) -> Result<Roadmap, StoreError> {
            Err(StoreError::Backend("offline".into()))
        }

        async fn complete_task(
            &self,
            _roadmap_id: &str,
            _task_id: &str,
            _user_id: &str,
        ) -> Result<TaskCompletion, StoreError> {
            Err(StoreError::Backend("offline".into()))
        }

        async fn user_points(&self, _user_id: &str) -> Result<u64, StoreError> {
            Err(StoreError::Backend("offline".into()))
        }
    }

    fn snapshot(room: &str, file: &str, at: u64) -> RoomAnalysis {
        RoomAnalysis {
            room_code: room.into(),
            file_name: file.into(),
            analysis: serde_json::json!({"summary": file}),
            last_updated: at,
        }
    }

    #[tokio::test]
    async fn create_room_makes_host_a_member() {
        let store = MemoryStore::new();
        let room = store.create_room("u1").await.unwrap();
        assert!(is_valid_room_code(&room.room_code));
        assert_eq!(room.host_id, "u1");
        assert_eq!(room.participants, vec!["u1"]);
        assert_eq!(store.get_room(&room.room_code).await.unwrap(), Some(room));
    }

    #[tokio::test]
    async fn created_codes_are_unique() {
        let store = MemoryStore::new();
        let mut codes = std::collections::HashSet::new();
        for i in 0..100 {
            let room = store.create_room(&format!("u{i}")).await.unwrap();
            assert!(codes.insert(room.room_code));
        }
    }

    #[tokio::test]
    async fn join_room_is_idempotent() {
        let store = MemoryStore::new();
        let room = store.create_room("u1").await.unwrap();

        let (joined, added) = store.join_room(&room.room_code, "u2").await.unwrap();
        assert!(added);
        assert_eq!(joined.participants, vec!["u1", "u2"]);

        let (again, added) = store.join_room(&room.room_code, "u2").await.unwrap();
        assert!(!added);
        assert_eq!(again.participants, vec!["u1", "u2"]);
    }

    #[tokio::test]
    async fn join_unknown_room_is_not_found() {
        let store = MemoryStore::new();
        let err = store.join_room("NOPE00", "u1").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert_eq!(err.to_string(), "Room NOPE00 not found");
    }

    #[tokio::test]
    async fn analysis_upsert_keeps_one_snapshot_per_room() {
        let store = MemoryStore::new();
        assert_eq!(store.latest_analysis("AB12CD").await.unwrap(), None);

        store
            .upsert_analysis(snapshot("AB12CD", "notes.pdf", 1))
            .await
            .unwrap();
        store
            .upsert_analysis(snapshot("AB12CD", "slides.pdf", 2))
            .await
            .unwrap();
        store
            .upsert_analysis(snapshot("ZZZZZZ", "other.pdf", 3))
            .await
            .unwrap();

        let latest = store.latest_analysis("AB12CD").await.unwrap().unwrap();
        assert_eq!(latest.file_name, "slides.pdf");
        assert_eq!(latest.last_updated, 2);
    }

    fn roadmap() -> Roadmap {
        let task = |id: &str, points: Option<u32>, hours: Option<f64>| RoadmapTask {
            task_id: id.into(),
            title: format!("Task {id}"),
            estimated_hours: hours,
            points,
            completed: false,
        };
        Roadmap {
            id: String::new(),
            room_code: Some("AB12CD".into()),
            summary: "Cell biology".into(),
            milestones: vec![Milestone {
                milestone_id: "m1".into(),
                title: "Basics".into(),
                tasks: vec![task("t1", Some(10), None), task("t2", None, Some(3.0))],
            }],
        }
    }

    #[tokio::test]
    async fn saved_roadmaps_get_distinct_ids() {
        let store = MemoryStore::new();
        let a = store.save_roadmap(roadmap()).await.unwrap();
        let b = store.save_roadmap(roadmap()).await.unwrap();
        assert!(!a.id.is_empty());
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn completing_tasks_credits_the_user_once() {
        let store = MemoryStore::new();
        let id = store.save_roadmap(roadmap()).await.unwrap().id;

        assert_eq!(
            store.complete_task(&id, "t1", "u1").await.unwrap(),
            TaskCompletion::Awarded {
                points: 10,
                total: 10
            }
        );
        assert_eq!(
            store.complete_task(&id, "t2", "u1").await.unwrap(),
            TaskCompletion::Awarded {
                points: 15,
                total: 25
            }
        );
        assert_eq!(
            store.complete_task(&id, "t1", "u2").await.unwrap(),
            TaskCompletion::AlreadyCompleted
        );
        assert_eq!(store.user_points("u1").await.unwrap(), 25);
        assert_eq!(store.user_points("u2").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn completing_unknown_roadmap_or_task_is_not_found() {
        let store = MemoryStore::new();
        let id = store.save_roadmap(roadmap()).await.unwrap().id;

        let err = store.complete_task("nope", "t1", "u1").await.unwrap_err();
        assert_eq!(err.to_string(), "Roadmap nope not found");
        let err = store.complete_task(&id, "t9", "u1").await.unwrap_err();
        assert_eq!(err.to_string(), "Task t9 not found");
        assert_eq!(store.user_points("u1").await.unwrap(), 0);
    }
}
