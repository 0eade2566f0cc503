use std::collections::{HashMap, HashSet};

use tracing::{debug, instrument};
use uuid::Uuid;

use crate::{
    db::LessonSongExt,
    error::{AccessError, StoreStage},
    models::SongStatus,
};

/// Song id to the status recorded against it in the caller's lessons.
pub type StatusMap = HashMap<Uuid, SongStatus>;

/// Collect the lesson-song statuses recorded for `lesson_ids`.
///
/// When a song appears in several of the lessons, the row returned last by
/// the store wins. The store applies no ordering, so this is not a "most
/// recent status" rule; product has not defined one yet.
#[instrument(skip(store, lesson_ids), fields(lessons = lesson_ids.len()))]
pub async fn join_statuses<S: LessonSongExt>(
    store: &S,
    lesson_ids: &HashSet<Uuid>,
) -> Result<StatusMap, AccessError> {
    if lesson_ids.is_empty() {
        return Ok(StatusMap::new());
    }

    let ids: Vec<Uuid> = lesson_ids.iter().copied().collect();
    let rows = store
        .lesson_songs_for(&ids)
        .await
        .map_err(AccessError::data_access(StoreStage::LessonSongs))?;

    let mut statuses = StatusMap::with_capacity(rows.len());
    for row in rows {
        statuses.insert(row.song_id, row.song_status);
    }

    debug!(songs = statuses.len(), "Joined lesson song statuses");
    Ok(statuses)
}

/// The song ids present in a status map, i.e. the caller's visible songs.
pub fn songs_in_lessons(statuses: &StatusMap) -> HashSet<Uuid> {
    statuses.keys().copied().collect()
}
