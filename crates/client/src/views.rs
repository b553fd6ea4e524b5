//! Render-ready view models. Renderers read these and nothing else.

use board_protocol::task::{Stage, Task};
use serde::Serialize;

use crate::metrics::{Metrics, MonthlyRevenue, ProjectedMonth, StageSummary, UrgentTask};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoardColumn {
    pub stage: Stage,
    pub label: &'static str,
    pub tasks: Vec<Task>,
    pub total_price: f64,
}

/// One column per stage, cards sorted by `order_position`.
pub fn board_columns(tasks: &[Task]) -> Vec<BoardColumn> {
    Stage::ALL
        .iter()
        .map(|&stage| {
            let mut column: Vec<Task> = tasks.iter().filter(|t| t.col_id == stage).cloned().collect();
            column.sort_by_key(|t| (t.order_position, t.id));
            BoardColumn {
                stage,
                label: stage.label(),
                total_price: column.iter().map(|t| t.price).sum(),
                tasks: column,
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub mrr: f64,
    pub active_projects: usize,
    pub urgent: Vec<UrgentTask>,
    pub overdue_count: usize,
    pub distribution: Vec<StageSummary>,
}

impl DashboardView {
    pub fn from_metrics(metrics: &Metrics) -> Self {
        Self {
            mrr: metrics.mrr,
            active_projects: metrics.active_projects,
            overdue_count: metrics.urgent.iter().filter(|u| u.is_overdue).count(),
            urgent: metrics.urgent.clone(),
            distribution: metrics.distribution.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinancialView {
    /// "Receita Total".
    pub total_received: f64,
    pub pending_receivable: f64,
    pub monthly_history: Vec<MonthlyRevenue>,
    pub projection: Vec<ProjectedMonth>,
    pub projected_total: f64,
}

impl FinancialView {
    pub fn from_metrics(metrics: &Metrics) -> Self {
        Self {
            total_received: metrics.total_received,
            pending_receivable: metrics.pending_receivable,
            monthly_history: metrics.monthly_history.clone(),
            projected_total: metrics.projection.iter().map(|m| m.total).sum(),
            projection: metrics.projection.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeaderView {
    pub user_name: Option<String>,
    pub user_avatar_url: Option<String>,
    pub task_count: usize,
    pub urgent_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::tests::{now, task};

    #[test]
    fn columns_are_sorted_per_stage() {
        let mut a = task(1, Stage::Build);
        a.order_position = 2;
        let mut b = task(2, Stage::Build);
        b.order_position = 0;
        let c = task(3, Stage::Live);

        let columns = board_columns(&[a, b, c]);
        assert_eq!(columns.len(), 4);
        assert!(columns[0].tasks.is_empty());
        let build: Vec<i64> = columns[2].tasks.iter().map(|t| t.id).collect();
        assert_eq!(build, vec![2, 1]);
        assert_eq!(columns[2].total_price, 2000.0);
        assert_eq!(columns[3].label, "Suporte / Live");
    }

    #[test]
    fn financial_view_sums_projection() {
        let mut paid = task(1, Stage::Live);
        paid.payment_status = board_protocol::task::PaymentStatus::Paid;
        let metrics = Metrics::compute(&[paid], 29.0, 48, now());
        let view = FinancialView::from_metrics(&metrics);
        assert_eq!(view.total_received, 1000.0);
        let expected: f64 = metrics.projection.iter().map(|m| m.total).sum();
        assert_eq!(view.projected_total, expected);
        assert!(view.projected_total > 0.0);
    }
}
