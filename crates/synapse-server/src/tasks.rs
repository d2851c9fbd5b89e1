use std::collections::HashMap;

use synapse_core::task::GroupTask;

/// Room code -> shared task list in insertion order.
///
/// Boards are independent of who is connected: they outlive participant
/// churn and are only lost when the process stops.
#[derive(Debug, Default)]
pub struct TaskBoards {
    boards: HashMap<String, Vec<GroupTask>>,
}

impl TaskBoards {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a task, creating the board on first use. Returns the updated
    /// board, or `None` if a task with the same id is already on it.
    pub fn add(&mut self, room_code: &str, task: GroupTask) -> Option<&[GroupTask]> {
        let board = self.boards.entry(room_code.to_string()).or_default();
        if board.iter().any(|t| t.id == task.id) {
            return None;
        }
        board.push(task);
        Some(board.as_slice())
    }

    /// Set the completion flag of a task. Returns false if the task is unknown.
    pub fn toggle(&mut self, room_code: &str, task_id: &str, completed: bool) -> bool {
        let Some(task) = self
            .boards
            .get_mut(room_code)
            .and_then(|board| board.iter_mut().find(|t| t.id == task_id))
        else {
            return false;
        };
        task.completed = completed;
        true
    }

    /// Remove a task. Returns the updated board, or `None` if the task is unknown.
    pub fn delete(&mut self, room_code: &str, task_id: &str) -> Option<&[GroupTask]> {
        let board = self.boards.get_mut(room_code)?;
        let before = board.len();
        board.retain(|t| t.id != task_id);
        if board.len() == before {
            return None;
        }
        Some(board.as_slice())
    }

    pub fn list(&self, room_code: &str) -> &[GroupTask] {
        self.boards.get(room_code).map(Vec::as_slice).unwrap_or(&[])
    }
}
