use super::DBClient;
use crate::models::Profile;
use uuid::Uuid;

const PROFILE_COLUMNS: &str = "user_id, email, first_name, last_name, is_admin, is_teacher, is_student, can_edit, created_at, updated_at";

/// Profile table operations
pub trait ProfileExt {
    /// Get a profile by user id. `None` when the identity has never been seen.
    async fn get_profile(&self, user_id: Uuid) -> Result<Option<Profile>, sqlx::Error>;

    /// Insert a profile with default flags unless one already exists.
    ///
    /// Returns `None` when another request created the row first; the caller
    /// re-reads instead of treating that as an error.
    async fn insert_default_profile(
        &self,
        user_id: Uuid,
        email: &str,
    ) -> Result<Option<Profile>, sqlx::Error>;

    /// Batch lookup used to decorate lessons with party details
    async fn get_profiles(&self, user_ids: &[Uuid]) -> Result<Vec<Profile>, sqlx::Error>;

    /// Update display names
    async fn update_profile_names(
        &self,
        user_id: Uuid,
        first_name: Option<&str>,
        last_name: Option<&str>,
    ) -> Result<Profile, sqlx::Error>;
}

impl ProfileExt for DBClient {
    async fn get_profile(&self, user_id: Uuid) -> Result<Option<Profile>, sqlx::Error> {
        let query = format!("SELECT {} FROM profiles WHERE user_id = $1", PROFILE_COLUMNS);

        let profile = sqlx::query_as::<_, Profile>(&query)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(profile)
    }

    async fn insert_default_profile(
        &self,
        user_id: Uuid,
        email: &str,
    ) -> Result<Option<Profile>, sqlx::Error> {
        // ON CONFLICT DO NOTHING returns no row for the losing insert
        let query = format!(
            r#"
            INSERT INTO profiles (user_id, email, is_admin, is_teacher, is_student, can_edit)
            VALUES ($1, $2, FALSE, FALSE, TRUE, FALSE)
            ON CONFLICT (user_id) DO NOTHING
            RETURNING {}
            "#,
            PROFILE_COLUMNS
        );

        let profile = sqlx::query_as::<_, Profile>(&query)
            .bind(user_id)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(profile)
    }

    async fn get_profiles(&self, user_ids: &[Uuid]) -> Result<Vec<Profile>, sqlx::Error> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }

        let query = format!(
            "SELECT {} FROM profiles WHERE user_id = ANY($1)",
            PROFILE_COLUMNS
        );

        let profiles = sqlx::query_as::<_, Profile>(&query)
            .bind(user_ids)
            .fetch_all(&self.pool)
            .await?;

        Ok(profiles)
    }

    async fn update_profile_names(
        &self,
        user_id: Uuid,
        first_name: Option<&str>,
        last_name: Option<&str>,
    ) -> Result<Profile, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE profiles
            SET first_name = COALESCE($1, first_name),
                last_name = COALESCE($2, last_name),
                updated_at = NOW()
            WHERE user_id = $3
            RETURNING {}
            "#,
            PROFILE_COLUMNS
        );

        let profile = sqlx::query_as::<_, Profile>(&query)
            .bind(first_name)
            .bind(last_name)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(profile)
    }
}
