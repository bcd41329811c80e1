/*
Task list filtering and ordering.
Module was independently written from HTTP / Axum for testing
*/

use std::cmp::Ordering;
use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Serialize;

use crate::models::Task;

// Inclusive window on `Task::date`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start.is_none_or(|s| at >= s) && self.end.is_none_or(|e| at <= e)
    }
}

// Parse "YYYY-MM-DD" (UTC midnight) or an RFC3339 timestamp.
pub fn parse_instant(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(day) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(start_of_day(day));
    }
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn start_of_day(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(NaiveTime::MIN).and_utc()
}

fn end_of_day(day: NaiveDate) -> DateTime<Utc> {
    let last = NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN);
    day.and_time(last).and_utc()
}

fn nonblank(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.trim().is_empty())
}

/// Build the date window for a list request.
///
/// - `date` wins over `from`/`to` and expands to its whole UTC day
/// - `from` is used as given, `to` runs through the end of its UTC day
/// - unparsable values are ignored
pub fn date_range(date: Option<&str>, from: Option<&str>, to: Option<&str>) -> Option<DateRange> {
    let range = if let Some(date) = nonblank(date) {
        parse_instant(date).map(|day| {
            let day = day.date_naive();
            DateRange {
                start: Some(start_of_day(day)),
                end: Some(end_of_day(day)),
            }
        })?
    } else {
        DateRange {
            start: nonblank(from).and_then(parse_instant),
            end: nonblank(to)
                .and_then(parse_instant)
                .map(|t| end_of_day(t.date_naive())),
        }
    };

    (range.start.is_some() || range.end.is_some()).then_some(range)
}

// Equality filters compare against the stored wire value
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub energy_zone: Option<String>,
    pub status: Option<String>,
    pub tag: Option<String>,
    pub date_range: Option<DateRange>,
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        if let Some(zone) = &self.energy_zone {
            if task.energy_zone.map(|z| z.as_str()) != Some(zone.as_str()) {
                return false;
            }
        }
        if let Some(status) = &self.status {
            if task.status.as_str() != status {
                return false;
            }
        }
        if let Some(tag) = &self.tag {
            if task.tag.as_str() != tag {
                return false;
            }
        }
        if let Some(range) = &self.date_range {
            // undated tasks never fall inside a date window
            match task.date {
                Some(date) if range.contains(date) => {}
                _ => return false,
            }
        }
        true
    }
}

fn zone_rank(task: &Task) -> u8 {
    task.energy_zone.map_or(99, |z| z.sort_rank())
}

fn date_millis(task: &Task) -> i64 {
    task.date.map_or(0, |d| d.timestamp_millis())
}

// Scheduled ordering:
// 1) energy zone Peak < Balance < Low (unknown last)
// 2) mana cost desc
// 3) date asc (undated first)
// 4) most recently updated first
fn compare_scheduled(a: &Task, b: &Task) -> Ordering {
    zone_rank(a)
        .cmp(&zone_rank(b))
        .then_with(|| b.mana_cost.unwrap_or(0).cmp(&a.mana_cost.unwrap_or(0)))
        .then_with(|| date_millis(a).cmp(&date_millis(b)))
        .then_with(|| b.updated_at.cmp(&a.updated_at))
}

/// Order a fetched task list: AI-scheduled tasks first, then manual ones
/// oldest-first.
pub fn order_tasks(tasks: Vec<Task>) -> Vec<Task> {
    let (mut scheduled, mut manual): (Vec<Task>, Vec<Task>) =
        tasks.into_iter().partition(|t| t.ai_schedule);

    scheduled.sort_by(compare_scheduled);
    manual.sort_by(|a, b| a.created_at.cmp(&b.created_at));

    scheduled.extend(manual);
    scheduled
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SubtaskTemplate {
    pub description: String,
    pub subtasks: Vec<String>,
}

/// Distinct subtask lists, most recently updated task first.
pub fn subtask_templates(tasks: &[Task]) -> Vec<SubtaskTemplate> {
    let mut recent: Vec<&Task> = tasks.iter().filter(|t| !t.subtasks.is_empty()).collect();
    recent.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

    let mut seen: HashSet<Vec<String>> = HashSet::new();
    recent
        .into_iter()
        .filter_map(|t| {
            let titles: Vec<String> = t.subtasks.iter().map(|s| s.title.clone()).collect();
            seen.insert(titles.clone()).then(|| SubtaskTemplate {
                description: t.description.clone(),
                subtasks: titles,
            })
        })
        .collect()
}
