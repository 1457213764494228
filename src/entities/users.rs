use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub username: Option<String>,

    #[sea_orm(unique)]
    pub mobile: String,

    /// Argon2id password hash
    pub password_hash: String,

    pub email: String,

    pub first_name: String,

    pub last_name: String,

    pub image: String,

    /// Flipped by verification-code redemption; login is refused while false.
    pub is_active: bool,

    pub is_staff: bool,

    pub is_superuser: bool,

    pub mobile_verified: bool,

    pub email_verified: bool,

    pub last_login: Option<String>,

    pub date_joined: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
