use chrono::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Profile row, one per identity.
///
/// Created lazily the first time an authenticated caller is classified
/// (see `access::roles::ensure_profile`) and never deleted by this service.
/// The three role flags are independent: a teacher may also be a student.
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone, PartialEq)]
pub struct Profile {
    pub user_id: Uuid, // Stable id issued by the identity provider
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_admin: bool,
    pub is_teacher: bool,
    pub is_student: bool,
    pub can_edit: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Lifecycle of a scheduled lesson.
///
/// Stored in PostgreSQL as the `lesson_status` ENUM with upper-case labels.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq, Eq, Default)]
#[sqlx(type_name = "lesson_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LessonStatus {
    #[default]
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
    Rescheduled,
}

/// Lesson row.
///
/// `lesson_number` is unique within the (`teacher_id`, `student_id`) pair and
/// is only ever assigned by the lesson counter, never by callers.
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone, PartialEq)]
pub struct Lesson {
    pub id: Uuid,
    pub teacher_id: Uuid,
    pub student_id: Uuid,
    pub creator_user_id: Uuid,
    pub lesson_number: i32,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub title: Option<String>,
    pub notes: Option<String>,
    pub status: LessonStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lesson {
    /// True when `user_id` is the teacher or the student of this lesson.
    pub fn has_party(&self, user_id: Uuid) -> bool {
        self.teacher_id == user_id || self.student_id == user_id
    }
}

/// Per-lesson learning progress of a song.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "song_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SongStatus {
    ToLearn,
    Started,
    Remembered,
    WithAuthor,
    Mastered,
}

/// Join row between a lesson and a song.
///
/// The status belongs to the lesson, not to the song: the same song can be
/// `started` in one lesson and `mastered` in another.
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone, PartialEq)]
pub struct LessonSong {
    pub lesson_id: Uuid,
    pub song_id: Uuid,
    pub song_status: SongStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[sqlx(type_name = "song_level", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SongLevel {
    Beginner,
    Intermediate,
    Advanced,
}

/// Song catalog entry. Titles are unique across the catalog.
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone, PartialEq)]
pub struct Song {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub level: SongLevel,
    pub key: Option<String>,
    pub chords: Option<String>,
    pub audio_files: Vec<String>,
    pub ultimate_guitar_link: Option<String>,
    pub short_title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A song annotated with the status resolved for the requesting context.
///
/// Read-time projection only, never written back.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct SongWithStatus {
    #[serde(flatten)]
    pub song: Song,
    pub status: SongStatus,
}
