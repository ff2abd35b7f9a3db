use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "LISTITEMS")]
pub struct Model {
    #[sea_orm(primary_key, column_name = "Id")]
    pub id: i64,
    #[sea_orm(column_name = "ListId")]
    pub list_id: i64,
    #[sea_orm(column_name = "MusicId")]
    pub music_id: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
