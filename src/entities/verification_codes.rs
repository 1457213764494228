use sea_orm::entity::prelude::*;

/// Database backend of the verification code cache.
///
/// No foreign key on `user_id`: a code outliving its user must still be
/// reported as "user not found" on redemption.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "verification_codes")]
pub struct Model {
    /// Ciphertext handed to the notifier
    #[sea_orm(primary_key, auto_increment = false)]
    pub code: String,

    pub user_id: i32,

    pub expires_at: String,

    pub created_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
