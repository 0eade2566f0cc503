use super::{DBClient, SortOrder};
use crate::models::{Lesson, LessonStatus};
use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

const LESSON_COLUMNS: &str = "id, teacher_id, student_id, creator_user_id, lesson_number, date, time, title, notes, status, created_at, updated_at";

// Seeds a missing counter row from the pair's highest existing number, so
// lessons written before the counter existed are never renumbered.
const NEXT_LESSON_NUMBER_SQL: &str = r#"
    INSERT INTO lesson_counters (teacher_id, student_id, last_number)
    SELECT $1, $2, COALESCE(MAX(lesson_number), 0) + 1
    FROM lessons
    WHERE teacher_id = $1 AND student_id = $2
    ON CONFLICT (teacher_id, student_id)
    DO UPDATE SET last_number = lesson_counters.last_number + 1
    RETURNING last_number
"#;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LessonSort {
    #[default]
    CreatedAt,
    Date,
    LessonNumber,
}

impl LessonSort {
    fn as_sql(&self) -> &'static str {
        match self {
            LessonSort::CreatedAt => "created_at",
            LessonSort::Date => "date",
            LessonSort::LessonNumber => "lesson_number",
        }
    }
}

/// Narrowing and ordering applied to lesson listings.
#[derive(Debug, Clone, PartialEq)]
pub struct LessonListOptions {
    pub student_id: Option<Uuid>,
    pub sort: LessonSort,
    pub order: SortOrder,
}

impl Default for LessonListOptions {
    fn default() -> Self {
        LessonListOptions {
            student_id: None,
            sort: LessonSort::CreatedAt,
            order: SortOrder::Desc,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewLesson {
    pub teacher_id: Uuid,
    pub student_id: Uuid,
    pub creator_user_id: Uuid,
    pub lesson_number: i32,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub title: Option<String>,
    pub notes: Option<String>,
    pub status: LessonStatus,
}

/// Partial update. The parties and the number of a lesson are immutable.
#[derive(Debug, Clone, Default)]
pub struct LessonChanges {
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub title: Option<String>,
    pub notes: Option<String>,
    pub status: Option<LessonStatus>,
}

pub trait LessonExt {
    /// Lessons where `user_id` is the teacher OR the student, in one query
    async fn lessons_for_member(
        &self,
        user_id: Uuid,
        options: &LessonListOptions,
    ) -> Result<Vec<Lesson>, sqlx::Error>;

    /// Every lesson (admin listing)
    async fn all_lessons(&self, options: &LessonListOptions) -> Result<Vec<Lesson>, sqlx::Error>;

    async fn get_lesson(&self, lesson_id: Uuid) -> Result<Option<Lesson>, sqlx::Error>;

    /// Atomically advance the pair's counter and return the new value
    async fn next_lesson_number(
        &self,
        teacher_id: Uuid,
        student_id: Uuid,
    ) -> Result<i32, sqlx::Error>;

    /// Insert a lesson whose number was already allocated
    async fn insert_lesson(&self, lesson: &NewLesson) -> Result<Lesson, sqlx::Error>;

    async fn update_lesson(
        &self,
        lesson_id: Uuid,
        changes: &LessonChanges,
    ) -> Result<Option<Lesson>, sqlx::Error>;

    /// Returns false when no lesson had this id
    async fn delete_lesson(&self, lesson_id: Uuid) -> Result<bool, sqlx::Error>;
}

fn push_order_by(builder: &mut QueryBuilder<'_, Postgres>, options: &LessonListOptions) {
    // sort and order come from closed enums, never from raw input
    builder.push(" ORDER BY ");
    builder.push(options.sort.as_sql());
    builder.push(" ");
    builder.push(options.order.as_sql());
    builder.push(", id ASC");
}

impl LessonExt for DBClient {
    async fn lessons_for_member(
        &self,
        user_id: Uuid,
        options: &LessonListOptions,
    ) -> Result<Vec<Lesson>, sqlx::Error> {
        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM lessons WHERE (teacher_id = ",
            LESSON_COLUMNS
        ));
        builder.push_bind(user_id);
        builder.push(" OR student_id = ");
        builder.push_bind(user_id);
        builder.push(")");

        if let Some(student_id) = options.student_id {
            builder.push(" AND student_id = ");
            builder.push_bind(student_id);
        }

        push_order_by(&mut builder, options);

        let lessons = builder
            .build_query_as::<Lesson>()
            .fetch_all(&self.pool)
            .await?;

        Ok(lessons)
    }

    async fn all_lessons(&self, options: &LessonListOptions) -> Result<Vec<Lesson>, sqlx::Error> {
        let mut builder =
            QueryBuilder::<Postgres>::new(format!("SELECT {} FROM lessons", LESSON_COLUMNS));

        if let Some(student_id) = options.student_id {
            builder.push(" WHERE student_id = ");
            builder.push_bind(student_id);
        }

        push_order_by(&mut builder, options);

        let lessons = builder
            .build_query_as::<Lesson>()
            .fetch_all(&self.pool)
            .await?;

        Ok(lessons)
    }

    async fn get_lesson(&self, lesson_id: Uuid) -> Result<Option<Lesson>, sqlx::Error> {
        let query = format!("SELECT {} FROM lessons WHERE id = $1", LESSON_COLUMNS);

        let lesson = sqlx::query_as::<_, Lesson>(&query)
            .bind(lesson_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(lesson)
    }

    async fn next_lesson_number(
        &self,
        teacher_id: Uuid,
        student_id: Uuid,
    ) -> Result<i32, sqlx::Error> {
        sqlx::query_scalar::<_, i32>(NEXT_LESSON_NUMBER_SQL)
            .bind(teacher_id)
            .bind(student_id)
            .fetch_one(&self.pool)
            .await
    }

    async fn insert_lesson(&self, lesson: &NewLesson) -> Result<Lesson, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO lessons (teacher_id, student_id, creator_user_id, lesson_number, date, time, title, notes, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {}
            "#,
            LESSON_COLUMNS
        );

        let created = sqlx::query_as::<_, Lesson>(&query)
            .bind(lesson.teacher_id)
            .bind(lesson.student_id)
            .bind(lesson.creator_user_id)
            .bind(lesson.lesson_number)
            .bind(lesson.date)
            .bind(lesson.time)
            .bind(lesson.title.as_deref())
            .bind(lesson.notes.as_deref())
            .bind(lesson.status)
            .fetch_one(&self.pool)
            .await?;

        Ok(created)
    }

    async fn update_lesson(
        &self,
        lesson_id: Uuid,
        changes: &LessonChanges,
    ) -> Result<Option<Lesson>, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE lessons
            SET date = COALESCE($1, date),
                time = COALESCE($2, time),
                title = COALESCE($3, title),
                notes = COALESCE($4, notes),
                status = COALESCE($5, status),
                updated_at = NOW()
            WHERE id = $6
            RETURNING {}
            "#,
            LESSON_COLUMNS
        );

        let lesson = sqlx::query_as::<_, Lesson>(&query)
            .bind(changes.date)
            .bind(changes.time)
            .bind(changes.title.as_deref())
            .bind(changes.notes.as_deref())
            .bind(changes.status)
            .bind(lesson_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(lesson)
    }

    async fn delete_lesson(&self, lesson_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM lessons WHERE id = $1")
            .bind(lesson_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
