use serde::{Deserialize, Serialize};

/// Smallest award for a completed task without explicit points.
pub const MIN_TASK_POINTS: u32 = 5;

/// Points per estimated hour of work.
pub const POINTS_PER_HOUR: f64 = 5.0;

/// A study plan built from an uploaded document: milestones of tasks that
/// earn points when completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Roadmap {
    /// Assigned by the store; ignored on input.
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_code: Option<String>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub milestones: Vec<Milestone>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Milestone {
    #[serde(default, alias = "milestone_id")]
    pub milestone_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub tasks: Vec<RoadmapTask>,
}

/// Field aliases accept the snake_case shape the summarization service emits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoadmapTask {
    #[serde(alias = "task_id")]
    pub task_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(
        default,
        alias = "estimated_hours",
        skip_serializing_if = "Option::is_none"
    )]
    pub estimated_hours: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<u32>,
    #[serde(default)]
    pub completed: bool,
}

impl RoadmapTask {
    /// Points earned by completing this task: its own `points` when set and
    /// non-zero, otherwise five per estimated hour (one hour if unknown),
    /// never less than [`MIN_TASK_POINTS`].
    pub fn award(&self) -> u32 {
        if let Some(points) = self.points
            && points > 0
        {
            return points;
        }
        let hours = self
            .estimated_hours
            .filter(|h| h.is_finite() && *h != 0.0)
            .unwrap_or(1.0);
        // Saturating cast: negative estimates land on the floor below.
        ((hours * POINTS_PER_HOUR).round() as u32).max(MIN_TASK_POINTS)
    }
}

impl Roadmap {
    /// First task with this id across all milestones.
    pub fn task_mut(&mut self, task_id: &str) -> Option<&mut RoadmapTask> {
        self.milestones
            .iter_mut()
            .flat_map(|m| m.tasks.iter_mut())
            .find(|t| t.task_id == task_id)
    }
}
