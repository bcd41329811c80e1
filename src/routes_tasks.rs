// --------------------------------------------------
// Handles API endpoints related to task CRUD operations
// and workload scoring.
//
// Responsibilities:
// - Create / read / update / delete tasks (owner-scoped)
// - Score tasks on create, re-score on update when asked
// - Preview scoring without persisting
// - List tasks with filters in schedule order
// --------------------------------------------------

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::{AppError, JsonBody};
use crate::levels::{normalize_level, CriterionMap, Level, RawLevelInput};
use crate::logic::{self, TaskFilter};
use crate::models::{ScoringDetails, Subtask, Task, TaskStatus};
use crate::scoring::{
    self, ScoringError, ScoringResult, ScoringSource, TagResult, TagSource, WorkTag,
};
use crate::AppState;

fn default_true() -> bool {
    true
}

// Distinguishes an explicit `null` (Some(None)) from an absent key (None)
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtaskInput {
    pub title: Option<String>,
    #[serde(default)]
    pub is_completed: bool,
}

// Drops entries without a title, trims the rest
fn sanitize_subtasks(input: Vec<SubtaskInput>) -> Vec<Subtask> {
    input
        .into_iter()
        .filter_map(|s| {
            let title = s.title?.trim().to_string();
            (!title.is_empty()).then_some(Subtask {
                title,
                is_completed: s.is_completed,
            })
        })
        .collect()
}

fn required_text(value: Option<String>, message: &str) -> Result<String, AppError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::validation(message))
}

fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// Empty strings count as "not provided"
fn provided_levels(
    levels: &CriterionMap<Option<RawLevelInput>>,
) -> CriterionMap<Option<RawLevelInput>> {
    levels.map(|v| v.clone().filter(|raw| !raw.is_blank()))
}

fn parse_task_id(id: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(id).map_err(|_| AppError::validation("Invalid task id."))
}

fn apply_scoring(task: &mut Task, result: ScoringResult, supplied_count: usize) {
    task.levels = result.normalized_levels;
    task.raw_score = Some(result.raw_score);
    task.mana_cost = Some(result.mana_cost);
    task.energy_zone = Some(result.energy_zone);
    task.scoring_source = ScoringSource::from_usage(result.ai_used, supplied_count);
    task.scoring_details = ScoringDetails {
        auto_filled: result.auto_filled,
        evaluated_at: Some(result.evaluated_at),
    };
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskInput {
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub ai_schedule: bool,
    pub date: Option<String>, // "YYYY-MM-DD" or RFC3339
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub repeat: Option<String>,
    pub note: Option<String>,
    #[serde(default)]
    pub subtasks: Vec<SubtaskInput>,
    pub status: Option<TaskStatus>,
    pub use_ai_scoring: Option<bool>,
    pub use_ai_tagging: Option<bool>,
    pub tag: Option<String>,
    #[serde(default = "default_true")]
    pub enable_energy_rating: bool,
    #[serde(default)]
    pub locked: bool,
    #[serde(flatten)]
    pub levels: CriterionMap<Option<RawLevelInput>>,
}

// -----------------------------
// POST /api/tasks
// Scores, tags and stores a new task
// -----------------------------
pub async fn create_task(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    JsonBody(input): JsonBody<CreateTaskInput>,
) -> Result<impl IntoResponse, AppError> {
    let description = required_text(input.description, "Task title (description) is required.")?;
    let start_time = required_text(input.start_time, "Start time is required.")?;
    let end_time = required_text(input.end_time, "End time is required.")?;

    let provided = provided_levels(&input.levels);
    let supplied_count = provided.supplied().len();
    let now = Utc::now();

    let mut task = Task {
        id: Uuid::new_v4(),
        user_id,
        description,
        ai_schedule: input.ai_schedule,
        date: input.date.as_deref().and_then(logic::parse_instant),
        start_time,
        end_time,
        levels: CriterionMap::from_fn(|_| Level::Low),
        raw_score: None,
        mana_cost: None,
        energy_zone: None,
        scoring_source: ScoringSource::Manual,
        scoring_details: ScoringDetails {
            auto_filled: CriterionMap::default(),
            evaluated_at: Some(now),
        },
        tag: WorkTag::Admin,
        tag_source: TagSource::Manual,
        repeat: optional_text(input.repeat),
        note: optional_text(input.note),
        subtasks: sanitize_subtasks(input.subtasks),
        status: input.status.unwrap_or_default(),
        locked: input.locked,
        enable_energy_rating: input.enable_energy_rating,
        created_at: now,
        updated_at: now,
    };

    if input.enable_energy_rating {
        let allow_ai = input.use_ai_scoring.unwrap_or(input.ai_schedule);
        let result = scoring::score_task(&task.description, &provided, allow_ai)?;
        apply_scoring(&mut task, result, supplied_count);
    } else {
        // No energy metrics; levels still stored, unset ones as low
        task.levels = CriterionMap::try_from_fn(|c| {
            normalize_level(provided.get(c).as_ref(), Some(Level::Low))
                .map_err(|source| ScoringError::InvalidLevel { criterion: c, source })
        })?;
    }

    let allow_ai_tagging = input.use_ai_tagging.unwrap_or(input.ai_schedule);
    let tag = match scoring::classify_tag(&task.description, input.tag.as_deref(), allow_ai_tagging) {
        Ok(tag) => tag,
        Err(ScoringError::TagRequired) => TagResult {
            tag: WorkTag::Admin,
            source: TagSource::Manual,
        },
        Err(e) => return Err(e.into()),
    };
    task.tag = tag.tag;
    task.tag_source = tag.source;

    state.store.insert_task(task.clone()).await?;

    info!(
        task_id = %task.id,
        user_id = %user_id,
        energy_zone = ?task.energy_zone,
        scoring_source = ?task.scoring_source,
        "task created"
    );

    Ok((StatusCode::CREATED, Json(json!({ "task": task }))))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTasksQuery {
    pub energy_zone: Option<String>,
    pub status: Option<String>,
    pub tag: Option<String>,
    pub date: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub count: usize,
}

impl<T> From<Vec<T>> for ListResponse<T> {
    fn from(items: Vec<T>) -> Self {
        let count = items.len();
        ListResponse { items, count }
    }
}

// -----------------------------
// GET /api/tasks
// Filters the caller's tasks and returns them in schedule order
// -----------------------------
pub async fn list_tasks(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<ListTasksQuery>,
) -> Result<Json<ListResponse<Task>>, AppError> {
    let filter = TaskFilter {
        date_range: logic::date_range(q.date.as_deref(), q.from.as_deref(), q.to.as_deref()),
        energy_zone: optional_text(q.energy_zone),
        status: optional_text(q.status),
        tag: optional_text(q.tag),
    };

    let tasks: Vec<Task> = state
        .store
        .list_tasks(user_id)
        .await
        .into_iter()
        .filter(|t| filter.matches(t))
        .collect();

    Ok(Json(logic::order_tasks(tasks).into()))
}

// -----------------------------
// GET /api/tasks/subtasks/templates
// Subtask lists from earlier tasks, for reuse
// -----------------------------
pub async fn list_subtask_templates(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let tasks = state.store.list_tasks(user_id).await;
    Ok(Json(ListResponse::from(logic::subtask_templates(&tasks))))
}

// -----------------------------
// GET /api/tasks/:id
// -----------------------------
pub async fn get_task(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_task_id(&id)?;
    let task = state
        .store
        .find_task(user_id, id)
        .await
        .ok_or_else(|| AppError::not_found("Task not found."))?;

    Ok(Json(json!({ "task": task })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskInput {
    pub description: Option<String>,
    pub ai_schedule: Option<bool>,
    #[serde(default, deserialize_with = "present")]
    pub date: Option<Option<String>>, // null, blank or unparsable clears the date
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub tag: Option<String>,
    pub repeat: Option<String>,
    pub note: Option<String>,
    pub status: Option<TaskStatus>,
    pub locked: Option<bool>,
    pub enable_energy_rating: Option<bool>,
    pub subtasks: Option<Vec<SubtaskInput>>,
    pub use_ai_scoring: Option<bool>,
    pub use_ai_tagging: Option<bool>,
    #[serde(default)]
    pub force_recalculate: bool,
    #[serde(flatten)]
    pub levels: CriterionMap<Option<RawLevelInput>>,
}

// -----------------------------
// PUT /api/tasks/:id
// Applies a partial update; re-scores only when asked to
// or when a criterion is supplied
// -----------------------------
pub async fn update_task(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
    JsonBody(input): JsonBody<UpdateTaskInput>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_task_id(&id)?;
    let mut task = state
        .store
        .find_task(user_id, id)
        .await
        .ok_or_else(|| AppError::not_found("Task not found."))?;

    // Policy decisions use the task as it was before this edit
    let stored_ai_schedule = task.ai_schedule;

    if let Some(description) = input.description {
        task.description = required_text(Some(description), "Task title (description) is required.")?;
    }
    if let Some(ai_schedule) = input.ai_schedule {
        task.ai_schedule = ai_schedule;
    }
    if let Some(date) = input.date {
        task.date = date.as_deref().and_then(logic::parse_instant);
    }
    if let Some(start_time) = input.start_time {
        task.start_time = required_text(Some(start_time), "Start time is required.")?;
    }
    if let Some(end_time) = input.end_time {
        task.end_time = required_text(Some(end_time), "End time is required.")?;
    }
    if input.repeat.is_some() {
        task.repeat = optional_text(input.repeat);
    }
    if input.note.is_some() {
        task.note = optional_text(input.note);
    }
    if let Some(status) = input.status {
        task.status = status;
    }
    if let Some(locked) = input.locked {
        task.locked = locked;
    }
    if let Some(enable) = input.enable_energy_rating {
        task.enable_energy_rating = enable;
    }
    if let Some(subtasks) = input.subtasks {
        task.subtasks = sanitize_subtasks(subtasks);
    }

    let supplied = provided_levels(&input.levels);
    if scoring::needs_rescore(input.use_ai_scoring, input.force_recalculate, &supplied) {
        let ai_forced = input.use_ai_scoring == Some(true);
        let provided = scoring::rescore_inputs(&supplied, &task.levels, ai_forced);
        let allow_ai = input.use_ai_scoring.unwrap_or(stored_ai_schedule);

        debug!(task_id = %task.id, ai_forced, allow_ai, "re-scoring task");

        let result = scoring::score_task(&task.description, &provided, allow_ai)?;
        apply_scoring(&mut task, result, supplied.supplied().len());
    }

    if input.tag.is_some() || input.use_ai_tagging == Some(true) {
        let allow_ai = input
            .use_ai_tagging
            .or(input.use_ai_scoring)
            .unwrap_or(stored_ai_schedule);
        let tag = scoring::classify_tag(&task.description, input.tag.as_deref(), allow_ai)?;
        task.tag = tag.tag;
        task.tag_source = tag.source;
    }

    task.updated_at = Utc::now();

    if !state.store.save_task(&task).await? {
        return Err(AppError::not_found("Task not found."));
    }

    info!(task_id = %task.id, user_id = %user_id, "task updated");

    Ok(Json(json!({ "task": task })))
}

// -----------------------------
// DELETE /api/tasks/:id
// Removes a task permanently
// -----------------------------
pub async fn delete_task(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_task_id(&id)?;

    if !state.store.delete_task(user_id, id).await? {
        return Err(AppError::not_found("Task not found."));
    }

    info!(task_id = %id, user_id = %user_id, "task deleted");

    Ok(Json(json!({ "message": "Task deleted successfully." })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewInput {
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub use_ai_scoring: bool,
    #[serde(default = "default_true")]
    pub use_ai_tagging: bool,
    pub tag: Option<String>,
    #[serde(flatten)]
    pub levels: CriterionMap<Option<RawLevelInput>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResponse {
    #[serde(flatten)]
    pub scoring: ScoringResult,
    pub scoring_source: ScoringSource,
    pub tag: WorkTag,
    pub tag_source: TagSource,
}

// -----------------------------
// POST /api/tasks/ai/preview
// Scores and tags a description without storing anything
// -----------------------------
pub async fn preview_score(
    AuthUser(_): AuthUser,
    JsonBody(input): JsonBody<PreviewInput>,
) -> Result<Json<PreviewResponse>, AppError> {
    let description = input.description.unwrap_or_default();
    let provided = provided_levels(&input.levels);

    let scoring = scoring::score_task(&description, &provided, input.use_ai_scoring)?;
    let tag = scoring::classify_tag(&description, input.tag.as_deref(), input.use_ai_tagging)?;
    let scoring_source = ScoringSource::from_usage(scoring.ai_used, provided.supplied().len());

    Ok(Json(PreviewResponse {
        scoring,
        scoring_source,
        tag: tag.tag,
        tag_source: tag.source,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn subtasks_without_title_dropped() {
        let input: Vec<SubtaskInput> = serde_json::from_value(json!([
            { "title": "  outline " },
            { "title": "" },
            { "isCompleted": true },
            { "title": "draft", "isCompleted": true }
        ]))
        .unwrap();

        assert_eq!(
            sanitize_subtasks(input),
            vec![
                Subtask { title: "outline".into(), is_completed: false },
                Subtask { title: "draft".into(), is_completed: true },
            ]
        );
    }

    #[test]
    fn create_input_collects_criteria() {
        let input: CreateTaskInput = serde_json::from_value(json!({
            "description": "Gym session",
            "startTime": "07:00",
            "endTime": "08:00",
            "focusLevel": 2,
            "movement": "",
            "urgency": "high"
        }))
        .unwrap();

        assert!(input.ai_schedule);
        assert!(input.enable_energy_rating);
        let provided = provided_levels(&input.levels);
        assert_eq!(provided.supplied().len(), 2);
        assert_eq!(provided.movement, None);
    }

    #[test]
    fn update_date_null_differs_from_absent() {
        let absent: UpdateTaskInput = serde_json::from_value(json!({ "note": "x" })).unwrap();
        assert_eq!(absent.date, None);

        let cleared: UpdateTaskInput = serde_json::from_value(json!({ "date": null })).unwrap();
        assert_eq!(cleared.date, Some(None));

        let set: UpdateTaskInput =
            serde_json::from_value(json!({ "date": "2025-03-10" })).unwrap();
        assert_eq!(set.date, Some(Some("2025-03-10".to_string())));
    }

    #[test]
    fn task_ids_must_be_uuids() {
        assert!(parse_task_id("not-a-uuid").is_err());
        assert!(parse_task_id(&Uuid::new_v4().to_string()).is_ok());
    }
}
