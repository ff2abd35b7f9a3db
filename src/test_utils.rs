use sea_orm::{ActiveModelTrait, ActiveValue, ConnectionTrait, Database as SeaDatabase};

use crate::catalog::SqliteCatalog;
use crate::entities;

pub async fn test_catalog() -> SqliteCatalog {
    let conn = SeaDatabase::connect("sqlite::memory:").await.unwrap();

    let schema = include_str!("../catalog_schema.sql");
    for stmt in schema.split(';') {
        // Strip comment-only lines
        let without_comments: String = stmt
            .lines()
            .filter(|line| !line.trim_start().starts_with("--"))
            .collect::<Vec<_>>()
            .join("\n");
        let without_comments = without_comments.trim();
        if !without_comments.is_empty() {
            conn.execute_unprepared(without_comments)
                .await
                .unwrap_or_else(|e| {
                    panic!(
                        "Failed to execute SQL: {}\nStatement: {}",
                        e, without_comments
                    )
                });
        }
    }

    SqliteCatalog::from_connection(conn)
}

#[derive(Debug, Clone, Default)]
pub struct TrackFixture {
    pub id: i64,
    pub file_name: &'static str,
    pub title: &'static str,
    pub album: &'static str,
    pub artist: &'static str,
    pub album_artist: &'static str,
    pub track_number: i32,
    pub duration_ms: i64,
    pub cp_data: Option<Vec<u8>>,
    pub album_art_location: Option<&'static str>,
}

pub async fn insert_track(catalog: &SqliteCatalog, track: TrackFixture) {
    entities::music::ActiveModel {
        id: ActiveValue::Set(track.id),
        title: ActiveValue::Set(Some(track.title.to_string())),
        album: ActiveValue::Set(Some(track.album.to_string())),
        artist: ActiveValue::Set(Some(track.artist.to_string())),
        album_artist: ActiveValue::Set(Some(track.album_artist.to_string())),
        composer: ActiveValue::Set(None),
        genre: ActiveValue::Set(Some("Rock".to_string())),
        year: ActiveValue::Set(Some(1997)),
        duration: ActiveValue::Set(Some(track.duration_ms)),
        track_count: ActiveValue::Set(Some(12)),
        track_number: ActiveValue::Set(Some(track.track_number)),
        disc_count: ActiveValue::Set(Some(1)),
        disc_number: ActiveValue::Set(Some(1)),
        compilation: ActiveValue::Set(Some(0)),
        cp_data: ActiveValue::Set(track.cp_data),
        album_art_location: ActiveValue::Set(track.album_art_location.map(String::from)),
        local_copy_path: ActiveValue::Set(Some(track.file_name.to_string())),
    }
    .insert(&catalog.conn)
    .await
    .unwrap();
}

pub async fn insert_list(catalog: &SqliteCatalog, id: i64, name: &str) {
    entities::list::ActiveModel {
        id: ActiveValue::Set(id),
        name: ActiveValue::Set(name.to_string()),
    }
    .insert(&catalog.conn)
    .await
    .unwrap();
}

pub async fn add_to_list(catalog: &SqliteCatalog, id: i64, list_id: i64, music_id: i64) {
    entities::list_item::ActiveModel {
        id: ActiveValue::Set(id),
        list_id: ActiveValue::Set(list_id),
        music_id: ActiveValue::Set(music_id),
    }
    .insert(&catalog.conn)
    .await
    .unwrap();
}
