use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, TimeZone};
use db::{models::task::Task, types::TaskPriority};
use serde::Serialize;

/// How a calendar day is highlighted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DayMarker {
    HasTasks,
    High,
}

fn due_day<Tz: TimeZone>(task: &Task, tz: &Tz) -> Option<NaiveDate> {
    task.due_date.map(|due| due.with_timezone(tz).date_naive())
}

/// Tasks due on `day` in the viewer's timezone.
pub fn tasks_on<'a, Tz: TimeZone>(tasks: &'a [Task], day: NaiveDate, tz: &Tz) -> Vec<&'a Task> {
    tasks
        .iter()
        .filter(|task| due_day(task, tz) == Some(day))
        .collect()
}

pub fn day_marker<Tz: TimeZone>(tasks: &[Task], day: NaiveDate, tz: &Tz) -> Option<DayMarker> {
    tasks_on(tasks, day, tz)
        .into_iter()
        .map(marker_for)
        .max()
}

/// Marker for every marked day of the month.
pub fn month_markers<Tz: TimeZone>(
    tasks: &[Task],
    year: i32,
    month: u32,
    tz: &Tz,
) -> BTreeMap<NaiveDate, DayMarker> {
    let mut markers = BTreeMap::new();
    for task in tasks {
        let Some(day) = due_day(task, tz) else {
            continue;
        };
        if day.year() != year || day.month() != month {
            continue;
        }
        let marker = marker_for(task);
        markers
            .entry(day)
            .and_modify(|existing: &mut DayMarker| *existing = (*existing).max(marker))
            .or_insert(marker);
    }
    markers
}

fn marker_for(task: &Task) -> DayMarker {
    if task.priority == TaskPriority::High {
        DayMarker::High
    } else {
        DayMarker::HasTasks
    }
}

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, Utc};
    use db::types::TaskStatus;

    use super::*;
    use crate::board::test_tasks::{due, task};

    fn at(y: i32, m: u32, d: u32, h: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn day_selection_follows_viewer_timezone() {
        let late_evening_utc = due(
            task(TaskStatus::Pending, TaskPriority::Low),
            at(2025, 3, 10, 23),
        );
        let tasks = vec![late_evening_utc];
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        let mar_10 = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let mar_11 = NaiveDate::from_ymd_opt(2025, 3, 11).unwrap();

        assert_eq!(tasks_on(&tasks, mar_10, &Utc).len(), 1);
        assert!(tasks_on(&tasks, mar_10, &plus_two).is_empty());
        assert_eq!(tasks_on(&tasks, mar_11, &plus_two).len(), 1);
    }

    #[test]
    fn high_priority_wins_the_day() {
        let tasks = vec![
            due(task(TaskStatus::Pending, TaskPriority::Low), at(2025, 3, 10, 9)),
            due(task(TaskStatus::Pending, TaskPriority::High), at(2025, 3, 10, 15)),
            due(task(TaskStatus::Pending, TaskPriority::Medium), at(2025, 3, 12, 9)),
            due(task(TaskStatus::Pending, TaskPriority::High), at(2025, 4, 1, 9)),
            task(TaskStatus::Pending, TaskPriority::High),
        ];
        let day = |d| NaiveDate::from_ymd_opt(2025, 3, d).unwrap();

        assert_eq!(day_marker(&tasks, day(10), &Utc), Some(DayMarker::High));
        assert_eq!(day_marker(&tasks, day(12), &Utc), Some(DayMarker::HasTasks));
        assert_eq!(day_marker(&tasks, day(11), &Utc), None);

        let march = month_markers(&tasks, 2025, 3, &Utc);
        assert_eq!(march.len(), 2);
        assert_eq!(march.get(&day(10)), Some(&DayMarker::High));
        assert_eq!(march.get(&day(12)), Some(&DayMarker::HasTasks));
    }
}
