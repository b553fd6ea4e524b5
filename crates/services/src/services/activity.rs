//! Human-readable activity descriptions and the best-effort activity writer.

use board_protocol::{
    task::{PaymentStatus, Stage, Task},
    user::ActivityAction,
};
use db::{
    DbPool,
    models::activity::{ActivityRepository, NewActivity},
};
use serde_json::Value;
use tokio::task::JoinHandle;

/// At most this many field changes are spelled out; the rest become "and N more".
const MAX_LISTED_CHANGES: usize = 3;

fn price_label(price: f64) -> String {
    format!("R$ {price:.2}")
}

fn optional_change(field: &str, new: Option<&str>) -> String {
    match new {
        Some(value) => format!("set {field} to {value}"),
        None => format!("removed {field}"),
    }
}

/// Field-by-field changes between two versions of a task, in display order.
/// Stage moves are not listed; they have their own description.
pub fn tracked_changes(old: &Task, new: &Task) -> Vec<String> {
    let mut changes = Vec::new();

    if old.client != new.client {
        changes.push(format!("renamed {} to {}", old.client, new.client));
    }
    if (old.price - new.price).abs() >= 0.005 {
        changes.push(format!(
            "changed price from {} to {}",
            price_label(old.price),
            price_label(new.price)
        ));
    }
    if old.payment_status != new.payment_status {
        let change = match (old.payment_status, new.payment_status) {
            (_, PaymentStatus::Paid) => "marked as paid".to_string(),
            (PaymentStatus::Paid, _) => "unmarked as paid".to_string(),
            (from, to) => format!("changed payment from {from} to {to}"),
        };
        changes.push(change);
    }
    if old.contact != new.contact {
        changes.push(optional_change("contact", new.contact.as_deref()));
    }
    if old.domain != new.domain {
        changes.push(optional_change("domain", new.domain.as_deref()));
    }
    if old.deadline != new.deadline {
        changes.push(optional_change("deadline", new.deadline.as_deref()));
    }

    changes
}

pub fn describe_update(old: &Task, new: &Task) -> String {
    let changes = tracked_changes(old, new);
    if changes.is_empty() {
        return format!("edited project {}", new.client);
    }

    let listed = changes
        .iter()
        .take(MAX_LISTED_CHANGES)
        .cloned()
        .collect::<Vec<_>>()
        .join(", ");
    let hidden = changes.len().saturating_sub(MAX_LISTED_CHANGES);
    if hidden > 0 {
        format!("updated {}: {listed} and {hidden} more", new.client)
    } else {
        format!("updated {}: {listed}", new.client)
    }
}

pub fn describe_create(task: &Task) -> String {
    format!("created project {}", task.client)
}

pub fn describe_delete(client: &str) -> String {
    format!("deleted project {client}")
}

pub fn describe_move(client: &str, from: Stage, to: Stage) -> String {
    if from == to {
        format!("reordered {client} in {}", to.label())
    } else {
        format!("moved {client} from {} to {}", from.label(), to.label())
    }
}

pub fn describe_recurring_clone(task: &Task) -> String {
    format!("created next cycle of recurring project {}", task.client)
}

pub fn describe_lead(task: &Task) -> String {
    format!("received lead from {}", task.client)
}

pub fn snapshot(task: &Task) -> Option<Value> {
    serde_json::to_value(task).ok()
}

/// Writes activity rows on a detached task. Failures are logged and never
/// reach the request that caused them.
#[derive(Clone)]
pub struct ActivityLogger {
    db: DbPool,
}

impl ActivityLogger {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub fn log(
        &self,
        user_id: i64,
        task_id: Option<i64>,
        action_type: ActivityAction,
        action_description: String,
        old_data: Option<Value>,
        new_data: Option<Value>,
    ) -> JoinHandle<()> {
        let db = self.db.clone();
        let entry = NewActivity {
            user_id,
            task_id,
            action_type,
            action_description,
            old_data,
            new_data,
        };
        events::spawn_detached("activity_log", async move {
            ActivityRepository::insert(&db, &entry).await.map(|_| ())
        })
    }
}

#[cfg(test)]
mod tests {
    use board_protocol::task::Hosting;
    use chrono::Utc;

    use super::*;

    fn task(client: &str) -> Task {
        let now = Utc::now();
        Task {
            id: 1,
            client: client.to_string(),
            contact: None,
            project_type: None,
            stack: None,
            domain: None,
            description: None,
            price: 1000.0,
            payment_status: PaymentStatus::Pending,
            deadline: None,
            deadline_timestamp: None,
            hosting: Hosting::Nao,
            col_id: Stage::Discovery,
            order_position: 0,
            is_recurring: false,
            assets_link: None,
            public_uuid: None,
            uptime_status: None,
            user_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn no_tracked_change_falls_back_to_generic_message() {
        let old = task("Acme");
        let mut new = old.clone();
        new.stack = Some("Astro".to_string());
        new.col_id = Stage::Live;
        assert_eq!(describe_update(&old, &new), "edited project Acme");
    }

    #[test]
    fn payment_transitions_use_paid_phrasing() {
        let old = task("Acme");
        let mut paid = old.clone();
        paid.payment_status = PaymentStatus::Paid;
        assert_eq!(describe_update(&old, &paid), "updated Acme: marked as paid");
        assert_eq!(describe_update(&paid, &old), "updated Acme: unmarked as paid");

        let mut half = old.clone();
        half.payment_status = PaymentStatus::HalfOnApproval;
        assert_eq!(
            describe_update(&old, &half),
            "updated Acme: changed payment from Pendente to 50% Após Aprovação"
        );
    }

    #[test]
    fn lists_three_changes_then_counts_the_rest() {
        let old = task("Acme");
        let mut new = old.clone();
        new.client = "Acme Corp".to_string();
        new.price = 1500.0;
        new.payment_status = PaymentStatus::Paid;
        new.contact = Some("ana@acme.com".to_string());
        new.domain = Some("acme.com".to_string());

        assert_eq!(
            describe_update(&old, &new),
            "updated Acme Corp: renamed Acme to Acme Corp, \
             changed price from R$ 1000.00 to R$ 1500.00, marked as paid and 2 more"
        );
    }

    #[test]
    fn exactly_three_changes_have_no_suffix() {
        let old = task("Acme");
        let mut new = old.clone();
        new.contact = Some("@acme".to_string());
        new.domain = Some("acme.com".to_string());
        new.deadline = Some("48h".to_string());

        assert_eq!(
            describe_update(&old, &new),
            "updated Acme: set contact to @acme, set domain to acme.com, set deadline to 48h"
        );
    }

    #[test]
    fn move_descriptions_name_stages() {
        assert_eq!(
            describe_move("Acme", Stage::Discovery, Stage::Agreement),
            "moved Acme from Descoberta to Acordo"
        );
        assert_eq!(
            describe_move("Acme", Stage::Live, Stage::Live),
            "reordered Acme in Suporte / Live"
        );
    }
}
