use std::collections::{BTreeSet, HashMap, HashSet};

use serde::Serialize;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::{
    Capabilities,
    catalog::{SongPage, resolve_songs},
    membership::{find_lessons, lesson_ids, visible_lesson},
    merge::{merge, with_status},
    statuses::{StatusMap, join_statuses, songs_in_lessons},
};
use crate::{
    db::{LessonExt, LessonListOptions, LessonSongExt, ProfileExt, SongExt, SongQuery},
    error::{AccessError, ErrorMessage, StoreStage},
    models::{Lesson, Profile, SongLevel, SongWithStatus},
};

/// Display fields of a lesson party.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Party {
    pub id: Uuid,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl From<&Profile> for Party {
    fn from(profile: &Profile) -> Self {
        Party {
            id: profile.user_id,
            email: profile.email.clone(),
            first_name: profile.first_name.clone(),
            last_name: profile.last_name.clone(),
        }
    }
}

/// A lesson enriched with both parties. A party whose profile is gone is
/// reported as `null` rather than failing the whole listing.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LessonView {
    #[serde(flatten)]
    pub lesson: Lesson,
    pub teacher: Option<Party>,
    pub student: Option<Party>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LessonDetail {
    #[serde(flatten)]
    pub view: LessonView,
    pub songs: Vec<SongWithStatus>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Default)]
pub struct SongFilterOptions {
    pub levels: Vec<SongLevel>,
    pub keys: Vec<String>,
    pub authors: Vec<String>,
}

/// Whose data a read is about.
///
/// `Ok(None)` is the unrestricted catalog and only admins without a target
/// get it. Non-admins may name themselves or nobody.
pub fn read_subject(
    capabilities: Capabilities,
    caller_id: Uuid,
    target: Option<Uuid>,
) -> Result<Option<Uuid>, AccessError> {
    match target {
        None if capabilities.is_admin => Ok(None),
        None => Ok(Some(caller_id)),
        Some(user_id) if capabilities.is_admin || user_id == caller_id => Ok(Some(user_id)),
        Some(_) => Err(AccessError::forbidden()),
    }
}

/// Statuses recorded in every lesson `user_id` is a party to.
async fn member_statuses<S: LessonExt + LessonSongExt>(
    store: &S,
    user_id: Uuid,
) -> Result<StatusMap, AccessError> {
    let lessons = find_lessons(store, user_id, &LessonListOptions::default()).await?;
    if lessons.is_empty() {
        return Ok(StatusMap::new());
    }
    join_statuses(store, &lesson_ids(&lessons)).await
}

/// Songs visible to the read subject, each with its lesson status.
///
/// Admins without a target read the catalog; every other read goes through
/// membership, statuses, catalog and merge in that order.
#[instrument(skip(store, capabilities, query))]
pub async fn songs_for_user<S: LessonExt + LessonSongExt + SongExt>(
    store: &S,
    capabilities: Capabilities,
    caller_id: Uuid,
    target: Option<Uuid>,
    query: &SongQuery,
) -> Result<SongPage<SongWithStatus>, AccessError> {
    let Some(subject) = read_subject(capabilities, caller_id, target)? else {
        let page = resolve_songs(store, capabilities, None, query).await?;
        return Ok(SongPage {
            songs: merge(page.songs, &StatusMap::new()),
            total: page.total,
        });
    };

    let statuses = member_statuses(store, subject).await?;
    if statuses.is_empty() {
        debug!(%subject, "No lesson songs for subject");
        return Ok(SongPage::empty());
    }

    let page = resolve_songs(store, capabilities, Some(songs_in_lessons(&statuses)), query).await?;
    Ok(SongPage {
        songs: merge(page.songs, &statuses),
        total: page.total,
    })
}

/// Single song in the caller's context.
///
/// Admins may open any song; others only songs used in their lessons. The
/// status comes from the caller's own lessons, defaulting when absent.
#[instrument(skip(store, capabilities))]
pub async fn visible_song<S: LessonExt + LessonSongExt + SongExt>(
    store: &S,
    capabilities: Capabilities,
    caller_id: Uuid,
    song_id: Uuid,
) -> Result<SongWithStatus, AccessError> {
    let statuses = member_statuses(store, caller_id).await?;
    if !capabilities.is_admin && !statuses.contains_key(&song_id) {
        return Err(AccessError::NotFound(ErrorMessage::SongNotFound.to_string()));
    }

    let song = store
        .get_song(song_id)
        .await
        .map_err(AccessError::data_access(StoreStage::Songs))?
        .ok_or_else(|| AccessError::NotFound(ErrorMessage::SongNotFound.to_string()))?;

    Ok(with_status(song, &statuses))
}

async fn parties_by_id<S: ProfileExt>(
    store: &S,
    lessons: &[Lesson],
) -> Result<HashMap<Uuid, Party>, AccessError> {
    let ids: BTreeSet<Uuid> = lessons
        .iter()
        .flat_map(|lesson| [lesson.teacher_id, lesson.student_id])
        .collect();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let ids: Vec<Uuid> = ids.into_iter().collect();
    let profiles = store
        .get_profiles(&ids)
        .await
        .map_err(AccessError::data_access(StoreStage::Profiles))?;

    Ok(profiles
        .iter()
        .map(|profile| (profile.user_id, Party::from(profile)))
        .collect())
}

fn enrich(lessons: Vec<Lesson>, parties: &HashMap<Uuid, Party>) -> Vec<LessonView> {
    lessons
        .into_iter()
        .map(|lesson| LessonView {
            teacher: parties.get(&lesson.teacher_id).cloned(),
            student: parties.get(&lesson.student_id).cloned(),
            lesson,
        })
        .collect()
}

/// Lessons of the read subject, enriched with both parties in one batch.
#[instrument(skip(store, capabilities, options))]
pub async fn lessons_for_user<S: LessonExt + ProfileExt>(
    store: &S,
    capabilities: Capabilities,
    caller_id: Uuid,
    target: Option<Uuid>,
    options: &LessonListOptions,
) -> Result<Vec<LessonView>, AccessError> {
    let lessons = match read_subject(capabilities, caller_id, target)? {
        None => store
            .all_lessons(options)
            .await
            .map_err(AccessError::data_access(StoreStage::Lessons))?,
        Some(subject) => find_lessons(store, subject, options).await?,
    };

    let parties = parties_by_id(store, &lessons).await?;
    Ok(enrich(lessons, &parties))
}

/// A visible lesson with its parties and the songs assigned to it.
#[instrument(skip(store, capabilities))]
pub async fn lesson_detail<S: LessonExt + LessonSongExt + ProfileExt + SongExt>(
    store: &S,
    capabilities: Capabilities,
    caller_id: Uuid,
    lesson_id: Uuid,
) -> Result<LessonDetail, AccessError> {
    let lesson = visible_lesson(store, capabilities, caller_id, lesson_id).await?;
    let parties = parties_by_id(store, std::slice::from_ref(&lesson)).await?;

    let statuses = join_statuses(store, &HashSet::from([lesson.id])).await?;
    let song_ids = songs_in_lessons(&statuses);
    let query = SongQuery {
        limit: song_ids.len().max(1) as u32,
        ..Default::default()
    };
    let page = resolve_songs(store, capabilities, Some(song_ids), &query).await?;

    let view = enrich(vec![lesson], &parties)
        .pop()
        .ok_or_else(|| AccessError::NotFound(ErrorMessage::LessonNotFound.to_string()))?;

    Ok(LessonDetail {
        view,
        songs: merge(page.songs, &statuses),
    })
}

/// Distinct filter values over the songs the caller can see.
///
/// Admins query the three catalog columns concurrently. Everyone else gets
/// values computed from their own visible songs.
#[instrument(skip(store, capabilities))]
pub async fn song_filter_options<S: LessonExt + LessonSongExt + SongExt>(
    store: &S,
    capabilities: Capabilities,
    caller_id: Uuid,
) -> Result<SongFilterOptions, AccessError> {
    if capabilities.is_admin {
        let (levels, keys, authors) = tokio::try_join!(
            store.distinct_song_levels(),
            store.distinct_song_keys(),
            store.distinct_song_authors(),
        )
        .map_err(AccessError::data_access(StoreStage::Songs))?;

        return Ok(SongFilterOptions {
            levels,
            keys,
            authors,
        });
    }

    let statuses = member_statuses(store, caller_id).await?;
    let song_ids = songs_in_lessons(&statuses);
    let query = SongQuery {
        limit: song_ids.len().max(1) as u32,
        ..Default::default()
    };
    let page = resolve_songs(store, capabilities, Some(song_ids), &query).await?;

    let levels: BTreeSet<SongLevel> = page.songs.iter().map(|song| song.level).collect();
    let keys: BTreeSet<String> = page
        .songs
        .iter()
        .filter_map(|song| song.key.clone())
        .filter(|key| !key.is_empty())
        .collect();
    let authors: BTreeSet<String> = page.songs.iter().map(|song| song.author.clone()).collect();

    Ok(SongFilterOptions {
        levels: levels.into_iter().collect(),
        keys: keys.into_iter().collect(),
        authors: authors.into_iter().collect(),
    })
}
