use sea_orm::entity::prelude::*;

/// Unique on `(name, parent_id)`, see the blog migration.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "categories")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub name: String,

    pub parent_id: Option<i32>,

    pub is_deleted: bool,

    pub created_at: String,

    pub modified_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
