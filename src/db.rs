use serde::Deserialize;
use sqlx::{Pool, Postgres};

mod profile;
pub use profile::ProfileExt;

mod lesson;
pub use lesson::{LessonChanges, LessonExt, LessonListOptions, LessonSort, NewLesson};

mod lesson_song;
pub use lesson_song::LessonSongExt;

mod song;
pub use song::{NewSong, SongChanges, SongExt, SongFilter, SongQuery, SongSort};

#[derive(Debug, Clone)]
pub struct DBClient {
    pool: Pool<Postgres>,
}
impl DBClient {
    pub fn new(pool: Pool<Postgres>) -> Self {
        DBClient { pool }
    }
}

/// Direction for any sortable listing.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}
