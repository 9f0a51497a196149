
use crate::db::*;

/// A manga row with only a romaji title
pub(super) async fn insert_test_manga(db: &Database, anilist_id: i64, title: &str) -> MangaId {
    db.insert_manga(&NewManga {
        anilist_id,
        title_romaji: Some(title.to_string()),
        monitored: true,
        ..Default::default()
    })
    .await
    .unwrap()
}
