//! Task list filters used by the query replies

use chrono::{Days, NaiveDateTime};

use crate::dates::start_of_day;
use crate::text::contains_folded;
use crate::types::Task;

pub fn pending(tasks: &[Task]) -> Vec<&Task> {
    tasks.iter().filter(|t| !t.completed).collect()
}

/// Incomplete tasks due on the same calendar day as `now`
pub fn due_today(tasks: &[Task], now: NaiveDateTime) -> Vec<&Task> {
    let today = start_of_day(now);
    tasks
        .iter()
        .filter(|t| !t.completed && start_of_day(t.due_date) == today)
        .collect()
}

/// Incomplete tasks whose subject contains `keyword` (case and accent insensitive)
pub fn by_subject<'a>(tasks: &'a [Task], keyword: &str) -> Vec<&'a Task> {
    tasks
        .iter()
        .filter(|t| !t.completed && contains_folded(&t.subject, keyword))
        .collect()
}

/// Incomplete tasks due strictly between `now` and `now + 7 days`
pub fn due_within_week(tasks: &[Task], now: NaiveDateTime) -> Vec<&Task> {
    let week_end = now + Days::new(7);
    tasks
        .iter()
        .filter(|t| !t.completed && t.due_date > now && t.due_date < week_end)
        .collect()
}
