use tracing::{info, instrument};
use uuid::Uuid;

use super::Capabilities;
use super::membership::visible_lesson;
use crate::{
    db::{LessonChanges, LessonExt, LessonSongExt, NewSong, ProfileExt, SongChanges, SongExt},
    error::{AccessError, ErrorMessage, StoreStage, is_unique_violation},
    models::{Lesson, LessonSong, Profile, Song, SongStatus},
};

/// Admins edit any lesson; teachers only the lessons they teach.
pub fn can_edit_lesson(capabilities: Capabilities, caller_id: Uuid, lesson: &Lesson) -> bool {
    capabilities.is_admin || (capabilities.is_teacher && lesson.teacher_id == caller_id)
}

/// Load a lesson the caller may modify.
///
/// Lessons outside the caller's reach read as missing. A party without edit
/// rights gets Forbidden.
async fn editable_lesson<S: LessonExt>(
    store: &S,
    capabilities: Capabilities,
    caller_id: Uuid,
    lesson_id: Uuid,
) -> Result<Lesson, AccessError> {
    let lesson = visible_lesson(store, capabilities, caller_id, lesson_id).await?;
    if can_edit_lesson(capabilities, caller_id, &lesson) {
        Ok(lesson)
    } else {
        Err(AccessError::forbidden())
    }
}

#[instrument(skip(store, capabilities, changes))]
pub async fn update_lesson<S: LessonExt>(
    store: &S,
    capabilities: Capabilities,
    caller_id: Uuid,
    lesson_id: Uuid,
    changes: LessonChanges,
) -> Result<Lesson, AccessError> {
    editable_lesson(store, capabilities, caller_id, lesson_id).await?;

    store
        .update_lesson(lesson_id, &changes)
        .await
        .map_err(AccessError::data_access(StoreStage::SaveLesson))?
        .ok_or_else(|| AccessError::NotFound(ErrorMessage::LessonNotFound.to_string()))
}

#[instrument(skip(store, capabilities))]
pub async fn delete_lesson<S: LessonExt>(
    store: &S,
    capabilities: Capabilities,
    caller_id: Uuid,
    lesson_id: Uuid,
) -> Result<(), AccessError> {
    editable_lesson(store, capabilities, caller_id, lesson_id).await?;

    let deleted = store
        .delete_lesson(lesson_id)
        .await
        .map_err(AccessError::data_access(StoreStage::SaveLesson))?;
    if !deleted {
        return Err(AccessError::NotFound(ErrorMessage::LessonNotFound.to_string()));
    }

    info!("Lesson deleted");
    Ok(())
}

/// Assign a song to a lesson or change its status there.
///
/// Editors may add and update rows. The lesson's student may only move the
/// status of a song already assigned to the lesson.
#[instrument(skip(store, capabilities))]
pub async fn set_song_status<S: LessonExt + LessonSongExt + SongExt>(
    store: &S,
    capabilities: Capabilities,
    caller_id: Uuid,
    lesson_id: Uuid,
    song_id: Uuid,
    status: SongStatus,
) -> Result<LessonSong, AccessError> {
    let lesson = visible_lesson(store, capabilities, caller_id, lesson_id).await?;

    if can_edit_lesson(capabilities, caller_id, &lesson) {
        store
            .get_song(song_id)
            .await
            .map_err(AccessError::data_access(StoreStage::Songs))?
            .ok_or_else(|| AccessError::NotFound(ErrorMessage::SongNotFound.to_string()))?;
    } else if lesson.student_id == caller_id {
        store
            .get_lesson_song(lesson_id, song_id)
            .await
            .map_err(AccessError::data_access(StoreStage::LessonSongs))?
            .ok_or_else(AccessError::forbidden)?;
    } else {
        return Err(AccessError::forbidden());
    }

    store
        .upsert_lesson_song(lesson_id, song_id, status)
        .await
        .map_err(AccessError::data_access(StoreStage::SaveLessonSong))
}

#[instrument(skip(store, capabilities))]
pub async fn remove_song_from_lesson<S: LessonExt + LessonSongExt>(
    store: &S,
    capabilities: Capabilities,
    caller_id: Uuid,
    lesson_id: Uuid,
    song_id: Uuid,
) -> Result<(), AccessError> {
    editable_lesson(store, capabilities, caller_id, lesson_id).await?;

    let removed = store
        .delete_lesson_song(lesson_id, song_id)
        .await
        .map_err(AccessError::data_access(StoreStage::SaveLessonSong))?;
    if removed {
        Ok(())
    } else {
        Err(AccessError::NotFound(ErrorMessage::SongNotFound.to_string()))
    }
}

#[instrument(skip(store, capabilities, song), fields(title = %song.title))]
pub async fn create_song<S: SongExt>(
    store: &S,
    capabilities: Capabilities,
    song: NewSong,
) -> Result<Song, AccessError> {
    capabilities.require_lesson_manager()?;

    let created = store
        .create_song(&song)
        .await
        .map_err(AccessError::data_access(StoreStage::SaveSong))?
        .ok_or_else(|| AccessError::Conflict(ErrorMessage::DuplicateSongTitle.to_string()))?;

    info!(song_id = %created.id, "Song created");
    Ok(created)
}

#[instrument(skip(store, capabilities, changes))]
pub async fn update_song<S: SongExt>(
    store: &S,
    capabilities: Capabilities,
    song_id: Uuid,
    changes: SongChanges,
) -> Result<Song, AccessError> {
    capabilities.require_lesson_manager()?;

    match store.update_song(song_id, &changes).await {
        Ok(Some(song)) => Ok(song),
        Ok(None) => Err(AccessError::NotFound(ErrorMessage::SongNotFound.to_string())),
        Err(err) if is_unique_violation(&err) => Err(AccessError::Conflict(
            ErrorMessage::DuplicateSongTitle.to_string(),
        )),
        Err(err) => Err(AccessError::DataAccess {
            stage: StoreStage::SaveSong,
            source: err,
        }),
    }
}

#[instrument(skip(store, capabilities))]
pub async fn delete_song<S: SongExt>(
    store: &S,
    capabilities: Capabilities,
    song_id: Uuid,
) -> Result<(), AccessError> {
    capabilities.require_admin()?;

    let deleted = store
        .delete_song(song_id)
        .await
        .map_err(AccessError::data_access(StoreStage::SaveSong))?;
    if !deleted {
        return Err(AccessError::NotFound(ErrorMessage::SongNotFound.to_string()));
    }

    info!("Song deleted");
    Ok(())
}

#[instrument(skip(store, first_name, last_name))]
pub async fn update_profile_names<S: ProfileExt>(
    store: &S,
    user_id: Uuid,
    first_name: Option<&str>,
    last_name: Option<&str>,
) -> Result<Profile, AccessError> {
    store
        .update_profile_names(user_id, first_name, last_name)
        .await
        .map_err(AccessError::data_access(StoreStage::SaveProfile))
}
