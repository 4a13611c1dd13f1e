//! Plain-text rendering of page data. `--json` output bypasses this module.

use std::{collections::BTreeMap, fmt::Write};

use chrono::{DateTime, Local, NaiveDate, Utc};
use db::models::{task::Task, user::User};
use serde::Serialize;
use tasks::{
    Notification,
    calendar::DayMarker,
    pages::{AnalyticsPage, ProfilePage, TeamPage},
    stats::TaskStats,
};

pub fn json<T: Serialize>(value: &T) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

pub fn notification(note: &Notification) -> String {
    if note.is_error() {
        format!("error: {}", note.description)
    } else {
        format!("{}: {}", note.title, note.description)
    }
}

fn local_day(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d").to_string()
}

pub fn task_line(task: &Task) -> String {
    let mut line = format!(
        "{}  [{}] [{}] {}",
        task.id,
        task.status.label(),
        task.priority.label(),
        task.title
    );
    if let Some(assignee) = &task.assigned_to {
        let _ = write!(line, "  @{}", assignee.display_name());
    }
    if let Some(due) = task.due_date {
        let _ = write!(line, "  due {}", local_day(due));
    }
    line
}

pub fn task_list(tasks: &[&Task]) -> String {
    if tasks.is_empty() {
        return "No tasks found.".to_string();
    }
    tasks
        .iter()
        .map(|task| task_line(task))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn stats(stats: &TaskStats) -> String {
    format!(
        "Total: {}  Completed: {}  In progress: {}  Pending: {}  Due soon: {}  Completion: {}%",
        stats.total,
        stats.completed,
        stats.in_progress,
        stats.pending,
        stats.due_soon,
        stats.completion_rate
    )
}

pub fn team(page: &TeamPage) -> String {
    let mut out = page.member_count_label();
    for member in &page.members {
        let _ = write!(out, "\n{}", user_line(member));
    }
    out
}

fn user_line(user: &User) -> String {
    format!(
        "{:<2}  {}  <{}>  {}",
        user.initials(),
        user.username,
        user.email,
        user.role
    )
}

pub fn analytics(page: &AnalyticsPage) -> String {
    let report = page.report();
    let mut out = String::from("By status:");
    for slice in &report.status {
        let _ = write!(out, "\n  {:<12} {}", slice.name, slice.value);
    }
    out.push_str("\nBy priority:");
    for slice in &report.priority {
        let _ = write!(out, "\n  {:<12} {}", slice.name, slice.value);
    }
    out.push_str("\nWorkload:");
    if report.workload.is_empty() {
        out.push_str("\n  (no assigned tasks)");
    }
    for row in &report.workload {
        let _ = write!(
            out,
            "\n  {:<12} {} assigned, {} completed",
            row.name, row.assigned, row.completed
        );
    }
    out
}

pub fn profile(page: &ProfilePage) -> String {
    let role = page
        .role
        .map(|role| role.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    format!(
        "Username: {}\nEmail:    {}\nRole:     {}",
        page.username, page.email, role
    )
}

pub fn month(markers: &BTreeMap<NaiveDate, DayMarker>) -> String {
    if markers.is_empty() {
        return "No tasks due this month.".to_string();
    }
    markers
        .iter()
        .map(|(day, marker)| {
            let tag = match marker {
                DayMarker::High => "high priority",
                DayMarker::HasTasks => "tasks due",
            };
            format!("{day}  {tag}")
        })
        .collect::<Vec<_>>()
        .join("\n")
}
