use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "activity_log")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub user_id: i64,
    pub task_id: Option<i64>,
    pub action_type: String,
    #[sea_orm(column_type = "Text")]
    pub action_description: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub old_data: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub new_data: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
