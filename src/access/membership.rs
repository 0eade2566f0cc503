use std::collections::HashSet;

use tracing::{debug, instrument};
use uuid::Uuid;

use super::Capabilities;
use crate::{
    db::{LessonExt, LessonListOptions},
    error::{AccessError, ErrorMessage, StoreStage},
    models::Lesson,
};

/// Every lesson where `user_id` is the teacher or the student.
///
/// An empty list is a valid answer, not an error. Lessons are deduplicated by
/// id so a row listing the same user on both sides still appears once.
#[instrument(skip(store))]
pub async fn find_lessons<S: LessonExt>(
    store: &S,
    user_id: Uuid,
    options: &LessonListOptions,
) -> Result<Vec<Lesson>, AccessError> {
    let lessons = store
        .lessons_for_member(user_id, options)
        .await
        .map_err(AccessError::data_access(StoreStage::Lessons))?;

    let mut seen = HashSet::with_capacity(lessons.len());
    let lessons: Vec<Lesson> = lessons
        .into_iter()
        .filter(|lesson| seen.insert(lesson.id))
        .collect();

    debug!(count = lessons.len(), "Resolved lesson membership");
    Ok(lessons)
}

pub fn lesson_ids(lessons: &[Lesson]) -> HashSet<Uuid> {
    lessons.iter().map(|lesson| lesson.id).collect()
}

/// Load a lesson the caller is allowed to see.
///
/// Admins see every lesson; everyone else only lessons they are a party to.
/// A lesson outside the caller's reach is reported exactly like a missing
/// one so its existence does not leak.
#[instrument(skip(store, capabilities))]
pub async fn visible_lesson<S: LessonExt>(
    store: &S,
    capabilities: Capabilities,
    caller_id: Uuid,
    lesson_id: Uuid,
) -> Result<Lesson, AccessError> {
    let lesson = store
        .get_lesson(lesson_id)
        .await
        .map_err(AccessError::data_access(StoreStage::Lessons))?
        .ok_or_else(|| AccessError::NotFound(ErrorMessage::LessonNotFound.to_string()))?;

    if capabilities.is_admin || lesson.has_party(caller_id) {
        Ok(lesson)
    } else {
        Err(AccessError::NotFound(ErrorMessage::LessonNotFound.to_string()))
    }
}
