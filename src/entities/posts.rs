use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "posts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub title: String,

    pub brief: String,

    pub content: String,

    #[sea_orm(unique)]
    pub slug: String,

    pub image: String,

    pub is_draft: bool,

    /// Earlier part of a multi-part post
    pub previous_id: Option<i32>,

    pub publisher_id: i32,

    pub category_id: i32,

    pub visited: i32,

    pub is_deleted: bool,

    pub created_at: String,

    pub modified_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::PublisherId",
        to = "super::users::Column::Id",
        on_delete = "Cascade"
    )]
    Publisher,
    #[sea_orm(
        belongs_to = "super::categories::Entity",
        from = "Column::CategoryId",
        to = "super::categories::Column::Id"
    )]
    Category,
}

impl ActiveModelBehavior for ActiveModel {}
