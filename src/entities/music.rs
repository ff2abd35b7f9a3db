use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "MUSIC")]
pub struct Model {
    #[sea_orm(primary_key, column_name = "Id")]
    pub id: i64,
    #[sea_orm(column_name = "Title")]
    pub title: Option<String>,
    #[sea_orm(column_name = "Album")]
    pub album: Option<String>,
    #[sea_orm(column_name = "Artist")]
    pub artist: Option<String>,
    #[sea_orm(column_name = "AlbumArtist")]
    pub album_artist: Option<String>,
    #[sea_orm(column_name = "Composer")]
    pub composer: Option<String>,
    #[sea_orm(column_name = "Genre")]
    pub genre: Option<String>,
    #[sea_orm(column_name = "Year")]
    pub year: Option<i32>,
    /// Duration in milliseconds
    #[sea_orm(column_name = "Duration")]
    pub duration: Option<i64>,
    #[sea_orm(column_name = "TrackCount")]
    pub track_count: Option<i32>,
    #[sea_orm(column_name = "TrackNumber")]
    pub track_number: Option<i32>,
    #[sea_orm(column_name = "DiscCount")]
    pub disc_count: Option<i32>,
    #[sea_orm(column_name = "DiscNumber")]
    pub disc_number: Option<i32>,
    #[sea_orm(column_name = "Compilation")]
    pub compilation: Option<i32>,
    /// Raw AES key for the cached object
    #[sea_orm(column_name = "CpData")]
    pub cp_data: Option<Vec<u8>>,
    #[sea_orm(column_name = "AlbumArtLocation")]
    pub album_art_location: Option<String>,
    #[sea_orm(column_name = "LocalCopyPath")]
    pub local_copy_path: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
