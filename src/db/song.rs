use super::{DBClient, SortOrder};
use crate::models::{Song, SongLevel};
use serde::Deserialize;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

const SONG_COLUMNS: &str = "id, title, author, level, key, chords, audio_files, ultimate_guitar_link, short_title, created_at, updated_at";

/// Predicates over the catalog. Level and key match exactly; author and
/// search (over the title) are case-insensitive substrings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SongFilter {
    pub level: Option<SongLevel>,
    pub key: Option<String>,
    pub author: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SongSort {
    #[default]
    Title,
    Author,
    Level,
    CreatedAt,
}

impl SongSort {
    fn as_sql(&self) -> &'static str {
        match self {
            SongSort::Title => "title",
            SongSort::Author => "author",
            SongSort::Level => "level",
            SongSort::CreatedAt => "created_at",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SongQuery {
    pub filter: SongFilter,
    pub sort: SongSort,
    pub order: SortOrder,
    pub page: u32,
    pub limit: u32,
}

impl Default for SongQuery {
    fn default() -> Self {
        SongQuery {
            filter: SongFilter::default(),
            sort: SongSort::Title,
            order: SortOrder::Asc,
            page: 1,
            limit: 20,
        }
    }
}

impl SongQuery {
    /// Rows skipped before this page. Widened so any page times any limit
    /// fits.
    pub fn offset(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(self.limit)
    }
}

#[derive(Debug, Clone)]
pub struct NewSong {
    pub title: String,
    pub author: String,
    pub level: SongLevel,
    pub key: Option<String>,
    pub chords: Option<String>,
    pub audio_files: Vec<String>,
    pub ultimate_guitar_link: Option<String>,
    pub short_title: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SongChanges {
    pub title: Option<String>,
    pub author: Option<String>,
    pub level: Option<SongLevel>,
    pub key: Option<String>,
    pub chords: Option<String>,
    pub audio_files: Option<Vec<String>>,
    pub ultimate_guitar_link: Option<String>,
    pub short_title: Option<String>,
}

pub trait SongExt {
    /// One page of songs plus the total number of matches.
    ///
    /// `scope = None` means the whole catalog; `Some(ids)` restricts to those
    /// ids. Callers decide which one applies, this layer does not.
    async fn list_songs(
        &self,
        scope: Option<&[Uuid]>,
        query: &SongQuery,
    ) -> Result<(Vec<Song>, i64), sqlx::Error>;

    async fn get_song(&self, song_id: Uuid) -> Result<Option<Song>, sqlx::Error>;

    /// `None` when the title is already taken
    async fn create_song(&self, song: &NewSong) -> Result<Option<Song>, sqlx::Error>;

    async fn update_song(
        &self,
        song_id: Uuid,
        changes: &SongChanges,
    ) -> Result<Option<Song>, sqlx::Error>;

    async fn delete_song(&self, song_id: Uuid) -> Result<bool, sqlx::Error>;

    async fn distinct_song_levels(&self) -> Result<Vec<SongLevel>, sqlx::Error>;

    async fn distinct_song_keys(&self) -> Result<Vec<String>, sqlx::Error>;

    async fn distinct_song_authors(&self) -> Result<Vec<String>, sqlx::Error>;
}

/// Escape LIKE wildcards so user input only ever matches literally
fn like_pattern(input: &str) -> String {
    let escaped = input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn push_song_filters<'a>(
    builder: &mut QueryBuilder<'a, Postgres>,
    scope: Option<&'a [Uuid]>,
    filter: &'a SongFilter,
) {
    builder.push(" WHERE TRUE");

    if let Some(ids) = scope {
        builder.push(" AND id = ANY(");
        builder.push_bind(ids);
        builder.push(")");
    }
    if let Some(level) = filter.level {
        builder.push(" AND level = ");
        builder.push_bind(level);
    }
    if let Some(key) = &filter.key {
        builder.push(" AND key = ");
        builder.push_bind(key.as_str());
    }
    if let Some(author) = &filter.author {
        builder.push(" AND author ILIKE ");
        builder.push_bind(like_pattern(author));
    }
    if let Some(search) = &filter.search {
        builder.push(" AND title ILIKE ");
        builder.push_bind(like_pattern(search));
    }
}

impl SongExt for DBClient {
    async fn list_songs(
        &self,
        scope: Option<&[Uuid]>,
        query: &SongQuery,
    ) -> Result<(Vec<Song>, i64), sqlx::Error> {
        let mut count_builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM songs");
        push_song_filters(&mut count_builder, scope, &query.filter);
        let total = count_builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut builder =
            QueryBuilder::<Postgres>::new(format!("SELECT {} FROM songs", SONG_COLUMNS));
        push_song_filters(&mut builder, scope, &query.filter);
        builder.push(" ORDER BY ");
        builder.push(query.sort.as_sql());
        builder.push(" ");
        builder.push(query.order.as_sql());
        builder.push(", id ASC LIMIT ");
        builder.push_bind(i64::from(query.limit));
        builder.push(" OFFSET ");
        builder.push_bind(query.offset());

        let songs = builder
            .build_query_as::<Song>()
            .fetch_all(&self.pool)
            .await?;

        Ok((songs, total))
    }

    async fn get_song(&self, song_id: Uuid) -> Result<Option<Song>, sqlx::Error> {
        let query = format!("SELECT {} FROM songs WHERE id = $1", SONG_COLUMNS);

        let song = sqlx::query_as::<_, Song>(&query)
            .bind(song_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(song)
    }

    async fn create_song(&self, song: &NewSong) -> Result<Option<Song>, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO songs (title, author, level, key, chords, audio_files, ultimate_guitar_link, short_title)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (title) DO NOTHING
            RETURNING {}
            "#,
            SONG_COLUMNS
        );

        let created = sqlx::query_as::<_, Song>(&query)
            .bind(&song.title)
            .bind(&song.author)
            .bind(song.level)
            .bind(song.key.as_deref())
            .bind(song.chords.as_deref())
            .bind(&song.audio_files)
            .bind(song.ultimate_guitar_link.as_deref())
            .bind(song.short_title.as_deref())
            .fetch_optional(&self.pool)
            .await?;

        Ok(created)
    }

    async fn update_song(
        &self,
        song_id: Uuid,
        changes: &SongChanges,
    ) -> Result<Option<Song>, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE songs
            SET title = COALESCE($1, title),
                author = COALESCE($2, author),
                level = COALESCE($3, level),
                key = COALESCE($4, key),
                chords = COALESCE($5, chords),
                audio_files = COALESCE($6, audio_files),
                ultimate_guitar_link = COALESCE($7, ultimate_guitar_link),
                short_title = COALESCE($8, short_title),
                updated_at = NOW()
            WHERE id = $9
            RETURNING {}
            "#,
            SONG_COLUMNS
        );

        let song = sqlx::query_as::<_, Song>(&query)
            .bind(changes.title.as_deref())
            .bind(changes.author.as_deref())
            .bind(changes.level)
            .bind(changes.key.as_deref())
            .bind(changes.chords.as_deref())
            .bind(changes.audio_files.as_ref())
            .bind(changes.ultimate_guitar_link.as_deref())
            .bind(changes.short_title.as_deref())
            .bind(song_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(song)
    }

    async fn delete_song(&self, song_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM songs WHERE id = $1")
            .bind(song_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn distinct_song_levels(&self) -> Result<Vec<SongLevel>, sqlx::Error> {
        sqlx::query_scalar::<_, SongLevel>("SELECT DISTINCT level FROM songs ORDER BY level")
            .fetch_all(&self.pool)
            .await
    }

    async fn distinct_song_keys(&self) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT key FROM songs WHERE key IS NOT NULL AND key <> '' ORDER BY key",
        )
        .fetch_all(&self.pool)
        .await
    }

    async fn distinct_song_authors(&self) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT author FROM songs WHERE author <> '' ORDER BY author",
        )
        .fetch_all(&self.pool)
        .await
    }
}
