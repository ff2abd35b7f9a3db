use std::collections::HashMap;
use std::path::Path;

use color_eyre::{Result, eyre::Context};
use sea_orm::{
    ColumnTrait, ConnectOptions, Database as SeaDatabase, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect,
};

use crate::entities;
use crate::ports::catalog::Catalog;

/// Everything the pipeline needs to know about one cached object.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MetadataRecord {
    pub id: i64,
    pub title: String,
    pub album: String,
    pub artist: String,
    pub album_artist: String,
    pub composer: String,
    pub genre: String,
    pub year: i32,
    /// Duration in milliseconds
    pub duration_ms: i64,
    pub track_count: i32,
    pub track_number: i32,
    pub disc_count: i32,
    pub disc_number: i32,
    pub compilation: bool,
    pub cp_data: Option<Vec<u8>>,
    pub album_art_location: Option<String>,
}

impl MetadataRecord {
    pub fn duration_secs(&self) -> i64 {
        self.duration_ms / 1000
    }
}

impl From<entities::music::Model> for MetadataRecord {
    fn from(model: entities::music::Model) -> Self {
        Self {
            id: model.id,
            title: model.title.unwrap_or_default(),
            album: model.album.unwrap_or_default(),
            artist: model.artist.unwrap_or_default(),
            album_artist: model.album_artist.unwrap_or_default(),
            composer: model.composer.unwrap_or_default(),
            genre: model.genre.unwrap_or_default(),
            year: model.year.unwrap_or_default(),
            duration_ms: model.duration.unwrap_or_default(),
            track_count: model.track_count.unwrap_or_default(),
            track_number: model.track_number.unwrap_or_default(),
            disc_count: model.disc_count.unwrap_or_default(),
            disc_number: model.disc_number.unwrap_or_default(),
            compilation: model.compilation.unwrap_or_default() != 0,
            cp_data: model.cp_data.filter(|key| !key.is_empty()),
            album_art_location: model.album_art_location.filter(|uri| !uri.trim().is_empty()),
        }
    }
}

/// Catalog backed by the vendor's SQLite music database.
pub struct SqliteCatalog {
    pub(crate) conn: DatabaseConnection,
}

impl SqliteCatalog {
    /// Open an existing catalog database read-only and check that it can be
    /// queried.
    pub async fn open(path: &Path) -> Result<Self> {
        log::debug!("Opening catalog at: {}", path.display());

        if !path.is_file() {
            return Err(color_eyre::eyre::eyre!(
                "Catalog database not found: {}",
                path.display()
            ));
        }

        let url = format!("sqlite://{}?mode=ro", path.display());
        let mut opt = ConnectOptions::new(url);
        opt.max_connections(1).sqlx_logging(false);

        let conn = SeaDatabase::connect(opt)
            .await
            .context(format!("Failed to open catalog: {}", path.display()))?;

        let catalog = Self::from_connection(conn);
        catalog.probe().await?;

        log::info!("Catalog ready at: {}", path.display());
        Ok(catalog)
    }

    pub fn from_connection(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Fail early when the music table cannot be read at all.
    async fn probe(&self) -> Result<()> {
        entities::music::Entity::find()
            .limit(1u64)
            .all(&self.conn)
            .await
            .context("Failed to query music table")?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Catalog for SqliteCatalog {
    async fn lookup(&self, file_name: &str) -> Result<Option<MetadataRecord>> {
        let music = entities::music::Entity::find()
            .filter(entities::music::Column::LocalCopyPath.eq(file_name))
            .one(&self.conn)
            .await
            .context(format!("Failed to query music by file name: {}", file_name))?;

        Ok(music.map(MetadataRecord::from))
    }

    async fn playlist_names(&self, music_id: i64) -> Result<Vec<String>> {
        let items = entities::list_item::Entity::find()
            .filter(entities::list_item::Column::MusicId.eq(music_id))
            .order_by_asc(entities::list_item::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to query list items")?;

        if items.is_empty() {
            return Ok(Vec::new());
        }

        let names: HashMap<i64, String> = entities::list::Entity::find()
            .filter(entities::list::Column::Id.is_in(items.iter().map(|item| item.list_id)))
            .all(&self.conn)
            .await
            .context("Failed to query lists")?
            .into_iter()
            .map(|list| (list.id, list.name))
            .collect();

        Ok(items
            .iter()
            .filter_map(|item| names.get(&item.list_id).cloned())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{TrackFixture, add_to_list, insert_list, insert_track, test_catalog};

    #[tokio::test]
    async fn test_lookup_by_file_name() {
        let catalog = test_catalog().await;
        insert_track(
            &catalog,
            TrackFixture {
                id: 7,
                file_name: "7.mp3",
                title: "Paranoid Android",
                album: "OK Computer",
                album_artist: "Radiohead",
                track_number: 2,
                cp_data: Some(vec![1; 16]),
                ..Default::default()
            },
        )
        .await;

        let record = catalog.lookup("7.mp3").await.unwrap().unwrap();
        assert_eq!(record.id, 7);
        assert_eq!(record.title, "Paranoid Android");
        assert_eq!(record.album_artist, "Radiohead");
        assert_eq!(record.track_number, 2);
        assert_eq!(record.cp_data, Some(vec![1; 16]));
    }

    #[tokio::test]
    async fn test_lookup_missing() {
        let catalog = test_catalog().await;
        assert!(catalog.lookup("nope.mp3").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_lookup_requires_exact_match() {
        let catalog = test_catalog().await;
        insert_track(
            &catalog,
            TrackFixture {
                id: 1,
                file_name: "12.mp3",
                ..Default::default()
            },
        )
        .await;

        assert!(catalog.lookup("2.mp3").await.unwrap().is_none());
        assert!(catalog.lookup("12.mp3").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_null_columns_become_defaults() {
        let catalog = test_catalog().await;
        entities::music::Entity::insert(entities::music::ActiveModel {
            id: sea_orm::ActiveValue::Set(3),
            local_copy_path: sea_orm::ActiveValue::Set(Some("3.mp3".to_string())),
            album_art_location: sea_orm::ActiveValue::Set(Some("  ".to_string())),
            cp_data: sea_orm::ActiveValue::Set(Some(Vec::new())),
            ..Default::default()
        })
        .exec(&catalog.conn)
        .await
        .unwrap();

        let record = catalog.lookup("3.mp3").await.unwrap().unwrap();
        assert_eq!(record.title, "");
        assert_eq!(record.year, 0);
        assert!(!record.compilation);
        assert!(record.cp_data.is_none());
        assert!(record.album_art_location.is_none());
    }

    #[tokio::test]
    async fn test_playlist_names_in_membership_order() {
        let catalog = test_catalog().await;
        insert_track(
            &catalog,
            TrackFixture {
                id: 1,
                file_name: "1.mp3",
                ..Default::default()
            },
        )
        .await;
        insert_list(&catalog, 10, "Road Trip").await;
        insert_list(&catalog, 11, "Favourites").await;
        insert_list(&catalog, 12, "Unrelated").await;
        add_to_list(&catalog, 100, 11, 1).await;
        add_to_list(&catalog, 101, 10, 1).await;

        let names = catalog.playlist_names(1).await.unwrap();
        assert_eq!(names, vec!["Favourites", "Road Trip"]);
        assert!(catalog.playlist_names(2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_open_missing_database() {
        let dir = tempfile::tempdir().unwrap();
        let result = SqliteCatalog::open(&dir.path().join("music.db")).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_duration_secs_truncates() {
        let record = MetadataRecord {
            duration_ms: 215_999,
            ..Default::default()
        };
        assert_eq!(record.duration_secs(), 215);
    }
}
