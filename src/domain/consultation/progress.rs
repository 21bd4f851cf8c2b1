//! Progress block returned with every template-guided turn.

use serde::{Deserialize, Serialize};

use super::template::{Stage, StageType, Template};
use crate::domain::foundation::{Percentage, StageId};

/// Summary of the stage a session moved on to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextStageInfo {
    pub id: StageId,
    pub name: String,
    #[serde(rename = "type")]
    pub stage_type: StageType,
    pub description: String,
}

impl From<&Stage> for NextStageInfo {
    fn from(stage: &Stage) -> Self {
        Self {
            id: stage.id.clone(),
            name: stage.name.clone(),
            stage_type: stage.stage_type,
            description: stage.description.clone(),
        }
    }
}

/// Where a session stands in its template after a turn or an advance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageProgress {
    /// Stage that was evaluated (or forced) in this call.
    pub current_stage: StageId,
    pub stage_name: String,
    pub stage_type: StageType,
    pub progress_percentage: Percentage,
    /// True when `current_stage` was completed by this call.
    pub stage_completed: bool,
    /// True once the whole consultation is complete.
    pub is_complete: bool,
    pub completed_stages: Vec<StageId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_stage: Option<NextStageInfo>,
}

impl StageProgress {
    /// Builds the block for `stage`, describing the stage now active (if it differs).
    pub fn for_stage(
        template: &Template,
        stage: &Stage,
        progress: Percentage,
        stage_completed: bool,
        is_complete: bool,
        completed_stages: &[StageId],
        now_active: Option<&StageId>,
    ) -> Self {
        let next_stage = now_active
            .filter(|active| *active != &stage.id)
            .and_then(|active| template.stage(active))
            .map(NextStageInfo::from);

        Self {
            current_stage: stage.id.clone(),
            stage_name: stage.name.clone(),
            stage_type: stage.stage_type,
            progress_percentage: progress,
            stage_completed,
            is_complete,
            completed_stages: completed_stages.to_vec(),
            next_stage,
        }
    }
}
