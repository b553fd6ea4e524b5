use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use strum_macros::{Display, EnumString};
use thiserror::Error;

/// Pipeline position of a task (`col_id` on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Stage {
    Discovery = 0,
    Agreement = 1,
    Build = 2,
    Live = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("col_id must be 0, 1, 2 or 3 (got {0})")]
pub struct UnknownStage(pub i64);

impl Stage {
    pub const ALL: [Stage; 4] = [Stage::Discovery, Stage::Agreement, Stage::Build, Stage::Live];

    pub fn index(self) -> i64 {
        self as i64
    }

    pub fn label(self) -> &'static str {
        match self {
            Stage::Discovery => "Descoberta",
            Stage::Agreement => "Acordo",
            Stage::Build => "Construir e Entregar",
            Stage::Live => "Suporte / Live",
        }
    }
}

impl TryFrom<i64> for Stage {
    type Error = UnknownStage;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Stage::Discovery),
            1 => Ok(Stage::Agreement),
            2 => Ok(Stage::Build),
            3 => Ok(Stage::Live),
            other => Err(UnknownStage(other)),
        }
    }
}

impl From<Stage> for i64 {
    fn from(stage: Stage) -> Self {
        stage.index()
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, EnumString, Display,
)]
pub enum PaymentStatus {
    #[default]
    #[serde(rename = "Pendente")]
    #[strum(serialize = "Pendente")]
    Pending,
    #[serde(rename = "50% Após Aprovação")]
    #[strum(serialize = "50% Após Aprovação")]
    HalfOnApproval,
    #[serde(rename = "Pago 100%")]
    #[strum(serialize = "Pago 100%")]
    Paid,
}

impl PaymentStatus {
    /// Share of the price already received.
    pub fn received_ratio(self) -> f64 {
        match self {
            PaymentStatus::Pending => 0.0,
            PaymentStatus::HalfOnApproval => 0.5,
            PaymentStatus::Paid => 1.0,
        }
    }

    pub fn counts_as_revenue(self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Hosting {
    #[default]
    Nao,
    Sim,
    Depois,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum UptimeStatus {
    Up,
    Down,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub client: String,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(rename = "type", default)]
    pub project_type: Option<String>,
    #[serde(default)]
    pub stack: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub price: f64,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub deadline: Option<String>,
    /// Absolute deadline in epoch milliseconds.
    #[serde(default)]
    pub deadline_timestamp: Option<i64>,
    #[serde(default)]
    pub hosting: Hosting,
    pub col_id: Stage,
    pub order_position: i64,
    #[serde(default, deserialize_with = "bool_from_int_or_bool")]
    pub is_recurring: bool,
    /// JSON array of URLs, kept as its serialized string.
    #[serde(default)]
    pub assets_link: Option<String>,
    #[serde(default)]
    pub public_uuid: Option<String>,
    #[serde(default)]
    pub uptime_status: Option<UptimeStatus>,
    #[serde(default)]
    pub user_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn is_live_hosted(&self) -> bool {
        self.col_id == Stage::Live && self.hosting == Hosting::Sim
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtask {
    pub id: i64,
    pub task_id: i64,
    pub title: String,
    #[serde(deserialize_with = "bool_from_int_or_bool")]
    pub completed: bool,
    pub order_position: i64,
    pub created_at: DateTime<Utc>,
}

/// What the unauthenticated status page is allowed to see.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicTaskView {
    pub client: String,
    pub status: String,
    pub progress: u8,
    pub updated_at: DateTime<Utc>,
}

/// SQLite stores booleans as 0/1 and older clients send them that way too.
fn bool_from_int_or_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(value) => value,
        Flag::Int(value) => value != 0,
    })
}
