use chrono::{NaiveDate, NaiveTime};
use tracing::{info, instrument};
use uuid::Uuid;

use super::Capabilities;
use crate::{
    db::{LessonExt, NewLesson, ProfileExt},
    error::{AccessError, StoreStage},
    models::{Lesson, LessonStatus},
};

/// Next lesson number for a (teacher, student) pair.
///
/// The increment happens in a single store statement, so concurrent callers
/// for the same pair always receive distinct, increasing numbers. Different
/// pairs never contend.
#[instrument(skip(store))]
pub async fn next_number<S: LessonExt>(
    store: &S,
    teacher_id: Uuid,
    student_id: Uuid,
) -> Result<i32, AccessError> {
    store
        .next_lesson_number(teacher_id, student_id)
        .await
        .map_err(AccessError::data_access(StoreStage::LessonNumber))
}

/// Validated input for scheduling a lesson.
#[derive(Debug, Clone)]
pub struct NewLessonInput {
    pub teacher_id: Uuid,
    pub student_id: Uuid,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub title: Option<String>,
    pub notes: Option<String>,
    pub status: Option<LessonStatus>,
}

/// Schedule a lesson with the pair's next number.
///
/// A failed insert after allocation leaves a gap in the pair's numbering.
/// Numbers are never handed out twice, so a gap is the only visible effect.
#[instrument(skip(store, capabilities, input), fields(teacher_id = %input.teacher_id, student_id = %input.student_id))]
pub async fn create_lesson<S: LessonExt + ProfileExt>(
    store: &S,
    capabilities: Capabilities,
    creator_id: Uuid,
    input: NewLessonInput,
) -> Result<Lesson, AccessError> {
    capabilities.require_lesson_manager()?;

    let parties = store
        .get_profiles(&[input.teacher_id, input.student_id])
        .await
        .map_err(AccessError::data_access(StoreStage::Profiles))?;
    for party in [input.teacher_id, input.student_id] {
        if !parties.iter().any(|profile| profile.user_id == party) {
            return Err(AccessError::NotFound(format!(
                "No profile found for user {}",
                party
            )));
        }
    }

    let lesson_number = next_number(store, input.teacher_id, input.student_id).await?;

    let lesson = store
        .insert_lesson(&NewLesson {
            teacher_id: input.teacher_id,
            student_id: input.student_id,
            creator_user_id: creator_id,
            lesson_number,
            date: input.date,
            time: input.time,
            title: input.title,
            notes: input.notes,
            status: input.status.unwrap_or_default(),
        })
        .await
        .map_err(AccessError::data_access(StoreStage::SaveLesson))?;

    info!(
        lesson_id = %lesson.id,
        lesson_number = lesson.lesson_number,
        "Lesson created"
    );
    Ok(lesson)
}
