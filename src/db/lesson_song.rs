use super::DBClient;
use crate::models::{LessonSong, SongStatus};
use uuid::Uuid;

pub trait LessonSongExt {
    /// All join rows whose lesson is in `lesson_ids`, in store order
    async fn lesson_songs_for(&self, lesson_ids: &[Uuid]) -> Result<Vec<LessonSong>, sqlx::Error>;

    async fn get_lesson_song(
        &self,
        lesson_id: Uuid,
        song_id: Uuid,
    ) -> Result<Option<LessonSong>, sqlx::Error>;

    /// Insert or overwrite the status of a song within a lesson
    async fn upsert_lesson_song(
        &self,
        lesson_id: Uuid,
        song_id: Uuid,
        status: SongStatus,
    ) -> Result<LessonSong, sqlx::Error>;

    async fn delete_lesson_song(&self, lesson_id: Uuid, song_id: Uuid) -> Result<bool, sqlx::Error>;
}

impl LessonSongExt for DBClient {
    async fn lesson_songs_for(&self, lesson_ids: &[Uuid]) -> Result<Vec<LessonSong>, sqlx::Error> {
        if lesson_ids.is_empty() {
            return Ok(Vec::new());
        }

        // No ORDER BY: duplicate songs across lessons resolve in store order
        let rows = sqlx::query_as::<_, LessonSong>(
            r#"
            SELECT lesson_id, song_id, song_status, created_at, updated_at
            FROM lesson_songs
            WHERE lesson_id = ANY($1)
            "#,
        )
        .bind(lesson_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn get_lesson_song(
        &self,
        lesson_id: Uuid,
        song_id: Uuid,
    ) -> Result<Option<LessonSong>, sqlx::Error> {
        let row = sqlx::query_as::<_, LessonSong>(
            r#"
            SELECT lesson_id, song_id, song_status, created_at, updated_at
            FROM lesson_songs
            WHERE lesson_id = $1 AND song_id = $2
            "#,
        )
        .bind(lesson_id)
        .bind(song_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn upsert_lesson_song(
        &self,
        lesson_id: Uuid,
        song_id: Uuid,
        status: SongStatus,
    ) -> Result<LessonSong, sqlx::Error> {
        let row = sqlx::query_as::<_, LessonSong>(
            r#"
            INSERT INTO lesson_songs (lesson_id, song_id, song_status)
            VALUES ($1, $2, $3)
            ON CONFLICT (lesson_id, song_id)
            DO UPDATE SET song_status = EXCLUDED.song_status, updated_at = NOW()
            RETURNING lesson_id, song_id, song_status, created_at, updated_at
            "#,
        )
        .bind(lesson_id)
        .bind(song_id)
        .bind(status)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn delete_lesson_song(&self, lesson_id: Uuid, song_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM lesson_songs WHERE lesson_id = $1 AND song_id = $2")
            .bind(lesson_id)
            .bind(song_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
