use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "tasks")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i64,
    pub client: String,
    pub contact: Option<String>,
    #[sea_orm(column_name = "type")]
    pub project_type: Option<String>,
    pub stack: Option<String>,
    pub domain: Option<String>,
    pub description: Option<String>,
    #[sea_orm(column_type = "Double")]
    pub price: f64,
    pub payment_status: String,
    pub deadline: Option<String>,
    pub deadline_timestamp: Option<i64>,
    pub hosting: String,
    pub col_id: i64,
    pub order_position: i64,
    pub is_recurring: bool,
    pub assets_link: Option<String>,
    #[sea_orm(unique)]
    pub public_uuid: Option<String>,
    pub uptime_status: Option<String>,
    pub user_id: Option<i64>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::subtask::Entity")]
    Subtasks,
}

impl Related<super::subtask::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Subtasks.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
