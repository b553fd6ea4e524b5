//! Derived numbers for the dashboard and the financial view.
//!
//! Everything here is a pure function of the task list and "now"; the state
//! store decides when to recompute.

use std::{cmp::Ordering, collections::BTreeMap};

use board_protocol::task::{PaymentStatus, Stage, Task};
use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;
use utils_core::deadline::{HOUR_MS, resolve_deadline};

/// Sort key for urgent tasks whose deadline cannot be resolved.
pub const MISSING_DEADLINE_HOURS: f64 = 999.0;
pub const PROJECTION_MONTHS: u32 = 12;
/// Share of the open pipeline expected to close in each of the next months.
pub const PIPELINE_SPREAD: [f64; 3] = [0.5, 0.3, 0.2];
pub const VELOCITY_WINDOW_MONTHS: u32 = 6;
pub const MONTHLY_GROWTH: f64 = 1.02;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct MonthKey {
    pub year: i32,
    pub month: u32,
}

impl MonthKey {
    pub fn of(instant: DateTime<Utc>) -> Self {
        Self {
            year: instant.year(),
            month: instant.month(),
        }
    }

    /// Moves by whole months; negative goes back.
    pub fn offset(self, months: i32) -> Self {
        let index = self.year * 12 + self.month as i32 - 1 + months;
        Self {
            year: index.div_euclid(12),
            month: index.rem_euclid(12) as u32 + 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UrgentTask {
    pub task_id: i64,
    pub client: String,
    pub stage: Stage,
    pub deadline_ms: Option<i64>,
    /// Negative when overdue; `MISSING_DEADLINE_HOURS` when there is no deadline.
    pub hours_left: f64,
    pub is_overdue: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyRevenue {
    pub month: MonthKey,
    pub revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectedMonth {
    pub month: MonthKey,
    pub recurring: f64,
    pub pipeline: f64,
    pub new_projects: f64,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageSummary {
    pub stage: Stage,
    pub label: &'static str,
    pub count: usize,
    pub total_price: f64,
}

/// Everything the views read, computed in one pass over the task list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metrics {
    pub mrr: f64,
    pub active_projects: usize,
    pub urgent: Vec<UrgentTask>,
    pub distribution: Vec<StageSummary>,
    pub total_received: f64,
    pub pending_receivable: f64,
    pub monthly_history: Vec<MonthlyRevenue>,
    pub projection: Vec<ProjectedMonth>,
}

impl Metrics {
    pub fn compute(tasks: &[Task], hosting_price: f64, urgent_hours: i64, now: DateTime<Utc>) -> Self {
        Self {
            mrr: mrr(tasks, hosting_price),
            active_projects: tasks.iter().filter(|t| t.col_id != Stage::Live).count(),
            urgent: urgent_tasks(tasks, now.timestamp_millis(), urgent_hours),
            distribution: status_distribution(tasks),
            total_received: total_received(tasks),
            pending_receivable: pending_receivable(tasks),
            monthly_history: monthly_revenue(tasks),
            projection: revenue_projection(tasks, now, hosting_price),
        }
    }
}

pub fn live_hosted_count(tasks: &[Task]) -> usize {
    tasks.iter().filter(|t| t.is_live_hosted()).count()
}

pub fn mrr(tasks: &[Task], hosting_price: f64) -> f64 {
    live_hosted_count(tasks) as f64 * hosting_price
}

/// Absolute deadline: the stored timestamp, else a relative token counted
/// from creation.
pub fn deadline_ms(task: &Task) -> Option<i64> {
    task.deadline_timestamp.or_else(|| {
        task.deadline
            .as_deref()
            .and_then(|d| resolve_deadline(d, task.created_at.timestamp_millis()))
    })
}

fn has_deadline_text(task: &Task) -> bool {
    task.deadline
        .as_deref()
        .is_some_and(|d| !d.trim().is_empty())
}

/// A task in Build without any deadline is always urgent. Otherwise a task is
/// urgent when its deadline is at most `urgent_hours` away, overdue included.
pub fn urgency(task: &Task, now_ms: i64, urgent_hours: i64) -> Option<UrgentTask> {
    let entry = |deadline_ms: Option<i64>, hours_left: f64, is_overdue: bool| UrgentTask {
        task_id: task.id,
        client: task.client.clone(),
        stage: task.col_id,
        deadline_ms,
        hours_left,
        is_overdue,
    };

    match deadline_ms(task) {
        Some(deadline) => {
            let remaining = deadline - now_ms;
            (remaining <= urgent_hours * HOUR_MS).then(|| {
                entry(
                    Some(deadline),
                    remaining as f64 / HOUR_MS as f64,
                    remaining < 0,
                )
            })
        }
        None if task.col_id == Stage::Build && !has_deadline_text(task) => {
            Some(entry(None, MISSING_DEADLINE_HOURS, false))
        }
        None => None,
    }
}

/// Overdue first, then soonest deadline; tasks without one last.
pub fn urgent_tasks(tasks: &[Task], now_ms: i64, urgent_hours: i64) -> Vec<UrgentTask> {
    let mut urgent: Vec<UrgentTask> = tasks
        .iter()
        .filter_map(|t| urgency(t, now_ms, urgent_hours))
        .collect();
    urgent.sort_by(|a, b| match (a.is_overdue, b.is_overdue) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => a
            .hours_left
            .total_cmp(&b.hours_left)
            .then(a.task_id.cmp(&b.task_id)),
    });
    urgent
}

/// Money already in: full price when paid, half after approval.
pub fn received(task: &Task) -> f64 {
    task.price * task.payment_status.received_ratio()
}

pub fn total_received(tasks: &[Task]) -> f64 {
    tasks.iter().map(received).sum()
}

pub fn pending_receivable(tasks: &[Task]) -> f64 {
    tasks.iter().map(|t| t.price - received(t)).sum()
}

/// Received revenue grouped by the month each task was created, oldest first.
pub fn monthly_revenue(tasks: &[Task]) -> Vec<MonthlyRevenue> {
    let mut months: BTreeMap<MonthKey, f64> = BTreeMap::new();
    for task in tasks.iter().filter(|t| t.payment_status.counts_as_revenue()) {
        *months.entry(MonthKey::of(task.created_at)).or_default() += received(task);
    }
    months
        .into_iter()
        .map(|(month, revenue)| MonthlyRevenue { month, revenue })
        .collect()
}

/// Twelve months starting next month.
///
/// recurring: live hosted projects times the hosting price.
/// pipeline: unpaid Agreement/Build value spread 50/30/20 over three months.
/// new projects: trailing six-month deal rate times average ticket, growing 2% a month.
pub fn revenue_projection(tasks: &[Task], now: DateTime<Utc>, hosting_price: f64) -> Vec<ProjectedMonth> {
    let current = MonthKey::of(now);
    let recurring = mrr(tasks, hosting_price);
    let paid: Vec<&Task> = tasks
        .iter()
        .filter(|t| t.payment_status.counts_as_revenue())
        .collect();

    let zero = |month| ProjectedMonth {
        month,
        recurring: 0.0,
        pipeline: 0.0,
        new_projects: 0.0,
        total: 0.0,
    };
    if recurring == 0.0 && paid.is_empty() {
        return (1..=PROJECTION_MONTHS as i32)
            .map(|ahead| zero(current.offset(ahead)))
            .collect();
    }

    let pipeline_total: f64 = tasks
        .iter()
        .filter(|t| {
            t.payment_status == PaymentStatus::Pending
                && matches!(t.col_id, Stage::Agreement | Stage::Build)
        })
        .map(|t| t.price)
        .sum();

    // The current month is the last of the window.
    let window_start = current.offset(1 - VELOCITY_WINDOW_MONTHS as i32);
    let recent: Vec<&&Task> = paid
        .iter()
        .filter(|t| {
            let month = MonthKey::of(t.created_at);
            month >= window_start && month <= current
        })
        .collect();
    let velocity = recent.len() as f64 / VELOCITY_WINDOW_MONTHS as f64;
    let average_ticket = if recent.is_empty() {
        0.0
    } else {
        recent.iter().map(|t| t.price).sum::<f64>() / recent.len() as f64
    };

    (1..=PROJECTION_MONTHS as i32)
        .map(|ahead| {
            let pipeline = PIPELINE_SPREAD
                .get(ahead as usize - 1)
                .map_or(0.0, |share| pipeline_total * share);
            let new_projects = velocity * average_ticket * MONTHLY_GROWTH.powi(ahead);
            ProjectedMonth {
                month: current.offset(ahead),
                recurring,
                pipeline,
                new_projects,
                total: recurring + pipeline + new_projects,
            }
        })
        .collect()
}

/// Count and summed price per stage, in pipeline order.
pub fn status_distribution(tasks: &[Task]) -> Vec<StageSummary> {
    Stage::ALL
        .iter()
        .map(|&stage| {
            let in_stage = tasks.iter().filter(|t| t.col_id == stage);
            StageSummary {
                stage,
                label: stage.label(),
                count: in_stage.clone().count(),
                total_price: in_stage.map(|t| t.price).sum(),
            }
        })
        .collect()
}
