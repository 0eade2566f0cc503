use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use sqlx::error::{DatabaseError, ErrorKind};
use uuid::Uuid;

use crate::db::{
    LessonChanges, LessonExt, LessonListOptions, LessonSongExt, LessonSort, NewLesson, NewSong,
    ProfileExt, SongChanges, SongExt, SongFilter, SongQuery, SongSort, SortOrder,
};
use crate::models::{Lesson, LessonSong, Profile, Song, SongLevel, SongStatus};

/// Tables that can be failed and counted independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Profiles,
    Lessons,
    LessonSongs,
    Songs,
    LessonCounters,
}

#[derive(Default)]
struct Tables {
    profiles: Vec<Profile>,
    lessons: Vec<Lesson>,
    lesson_songs: Vec<LessonSong>,
    songs: Vec<Song>,
    counters: HashMap<(Uuid, Uuid), i32>,
    failing: HashSet<Table>,
    calls: HashMap<Table, usize>,
}

/// Store fake implementing every store trait over shared vectors.
///
/// Each operation counts as one call to its table, fails with
/// `PoolTimedOut` while the table is marked failing, and yields once before
/// touching data so concurrent tests actually interleave. The lock is only
/// held inside synchronous blocks, mirroring a single-statement write.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

/// Unique-constraint error shaped like the one Postgres returns.
#[derive(Debug)]
struct UniqueViolation(&'static str);

impl fmt::Display for UniqueViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "duplicate key value violates unique constraint \"{}\"", self.0)
    }
}

impl std::error::Error for UniqueViolation {}

impl DatabaseError for UniqueViolation {
    fn message(&self) -> &str {
        "duplicate key value violates unique constraint"
    }

    fn code(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed("23505"))
    }

    fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self
    }

    fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
        self
    }

    fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
        self
    }

    fn constraint(&self) -> Option<&str> {
        Some(self.0)
    }

    fn kind(&self) -> ErrorKind {
        ErrorKind::UniqueViolation
    }
}

fn directed(ordering: Ordering, order: SortOrder) -> Ordering {
    match order {
        SortOrder::Asc => ordering,
        SortOrder::Desc => ordering.reverse(),
    }
}

fn compare_lessons(a: &Lesson, b: &Lesson, options: &LessonListOptions) -> Ordering {
    let primary = match options.sort {
        LessonSort::CreatedAt => a.created_at.cmp(&b.created_at),
        LessonSort::Date => (a.date, a.time).cmp(&(b.date, b.time)),
        LessonSort::LessonNumber => a.lesson_number.cmp(&b.lesson_number),
    };
    directed(primary, options.order).then_with(|| a.id.cmp(&b.id))
}

/// In-memory equivalent of the catalog's SQL predicates: level and key match
/// exactly, author and search (over the title) are case-insensitive
/// substrings.
fn filter_matches(filter: &SongFilter, song: &Song) -> bool {
    if filter.level.is_some_and(|level| level != song.level) {
        return false;
    }
    if let Some(key) = &filter.key {
        if song.key.as_deref() != Some(key.as_str()) {
            return false;
        }
    }
    if let Some(author) = &filter.author {
        if !song.author.to_lowercase().contains(&author.to_lowercase()) {
            return false;
        }
    }
    if let Some(search) = &filter.search {
        if !song.title.to_lowercase().contains(&search.to_lowercase()) {
            return false;
        }
    }
    true
}

fn compare_songs(a: &Song, b: &Song, query: &SongQuery) -> Ordering {
    let primary = match query.sort {
        SongSort::Title => a.title.cmp(&b.title),
        SongSort::Author => a.author.cmp(&b.author),
        SongSort::Level => a.level.cmp(&b.level),
        SongSort::CreatedAt => a.created_at.cmp(&b.created_at),
    };
    directed(primary, query.order).then_with(|| a.id.cmp(&b.id))
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().expect("memory store lock poisoned")
    }

    /// Register a call and fail it when the table is marked failing.
    async fn enter(&self, table: Table) -> Result<(), sqlx::Error> {
        {
            let mut tables = self.lock();
            *tables.calls.entry(table).or_default() += 1;
            if tables.failing.contains(&table) {
                return Err(sqlx::Error::PoolTimedOut);
            }
        }
        tokio::task::yield_now().await;
        Ok(())
    }

    pub fn fail(&self, table: Table) {
        self.lock().failing.insert(table);
    }

    pub fn recover(&self, table: Table) {
        self.lock().failing.remove(&table);
    }

    pub fn calls_to(&self, table: Table) -> usize {
        self.lock().calls.get(&table).copied().unwrap_or(0)
    }

    pub fn profile_count(&self) -> usize {
        self.lock().profiles.len()
    }

    pub fn lesson_count(&self) -> usize {
        self.lock().lessons.len()
    }

    pub fn add_profile(
        &self,
        user_id: Uuid,
        email: &str,
        is_admin: bool,
        is_teacher: bool,
        is_student: bool,
    ) -> Profile {
        let now = Utc::now();
        let profile = Profile {
            user_id,
            email: email.to_string(),
            first_name: None,
            last_name: None,
            is_admin,
            is_teacher,
            is_student,
            can_edit: is_admin || is_teacher,
            created_at: now,
            updated_at: now,
        };
        self.lock().profiles.push(profile.clone());
        profile
    }

    pub fn add_song(&self, title: &str, author: &str, level: SongLevel, key: Option<&str>) -> Song {
        let now = Utc::now();
        let song = Song {
            id: Uuid::new_v4(),
            title: title.to_string(),
            author: author.to_string(),
            level,
            key: key.map(String::from),
            chords: None,
            audio_files: Vec::new(),
            ultimate_guitar_link: None,
            short_title: None,
            created_at: now,
            updated_at: now,
        };
        self.lock().songs.push(song.clone());
        song
    }

    /// Insert a lesson numbered after the pair's highest existing lesson,
    /// without touching the counter table.
    pub fn add_lesson(&self, teacher_id: Uuid, student_id: Uuid) -> Lesson {
        let now = Utc::now();
        let mut tables = self.lock();
        let lesson_number = tables
            .lessons
            .iter()
            .filter(|l| l.teacher_id == teacher_id && l.student_id == student_id)
            .map(|l| l.lesson_number)
            .max()
            .unwrap_or(0)
            + 1;
        let lesson = Lesson {
            id: Uuid::new_v4(),
            teacher_id,
            student_id,
            creator_user_id: teacher_id,
            lesson_number,
            date: now.date_naive(),
            time: now.time(),
            title: None,
            notes: None,
            status: Default::default(),
            created_at: now,
            updated_at: now,
        };
        tables.lessons.push(lesson.clone());
        lesson
    }

    pub fn add_lesson_song(&self, lesson_id: Uuid, song_id: Uuid, status: SongStatus) {
        let now = Utc::now();
        self.lock().lesson_songs.push(LessonSong {
            lesson_id,
            song_id,
            song_status: status,
            created_at: now,
            updated_at: now,
        });
    }
}

impl ProfileExt for MemoryStore {
    async fn get_profile(&self, user_id: Uuid) -> Result<Option<Profile>, sqlx::Error> {
        self.enter(Table::Profiles).await?;
        Ok(self
            .lock()
            .profiles
            .iter()
            .find(|p| p.user_id == user_id)
            .cloned())
    }

    async fn insert_default_profile(
        &self,
        user_id: Uuid,
        email: &str,
    ) -> Result<Option<Profile>, sqlx::Error> {
        self.enter(Table::Profiles).await?;
        let mut tables = self.lock();
        if tables.profiles.iter().any(|p| p.user_id == user_id) {
            return Ok(None);
        }
        let now = Utc::now();
        let profile = Profile {
            user_id,
            email: email.to_string(),
            first_name: None,
            last_name: None,
            is_admin: false,
            is_teacher: false,
            is_student: true,
            can_edit: false,
            created_at: now,
            updated_at: now,
        };
        tables.profiles.push(profile.clone());
        Ok(Some(profile))
    }

    async fn get_profiles(&self, user_ids: &[Uuid]) -> Result<Vec<Profile>, sqlx::Error> {
        self.enter(Table::Profiles).await?;
        Ok(self
            .lock()
            .profiles
            .iter()
            .filter(|p| user_ids.contains(&p.user_id))
            .cloned()
            .collect())
    }

    async fn update_profile_names(
        &self,
        user_id: Uuid,
        first_name: Option<&str>,
        last_name: Option<&str>,
    ) -> Result<Profile, sqlx::Error> {
        self.enter(Table::Profiles).await?;
        let mut tables = self.lock();
        let profile = tables
            .profiles
            .iter_mut()
            .find(|p| p.user_id == user_id)
            .ok_or(sqlx::Error::RowNotFound)?;
        if let Some(first_name) = first_name {
            profile.first_name = Some(first_name.to_string());
        }
        if let Some(last_name) = last_name {
            profile.last_name = Some(last_name.to_string());
        }
        profile.updated_at = Utc::now();
        Ok(profile.clone())
    }
}

impl LessonExt for MemoryStore {
    async fn lessons_for_member(
        &self,
        user_id: Uuid,
        options: &LessonListOptions,
    ) -> Result<Vec<Lesson>, sqlx::Error> {
        self.enter(Table::Lessons).await?;
        let mut lessons: Vec<Lesson> = self
            .lock()
            .lessons
            .iter()
            .filter(|l| l.has_party(user_id))
            .filter(|l| options.student_id.is_none_or(|s| l.student_id == s))
            .cloned()
            .collect();
        lessons.sort_by(|a, b| compare_lessons(a, b, options));
        Ok(lessons)
    }

    async fn all_lessons(&self, options: &LessonListOptions) -> Result<Vec<Lesson>, sqlx::Error> {
        self.enter(Table::Lessons).await?;
        let mut lessons: Vec<Lesson> = self
            .lock()
            .lessons
            .iter()
            .filter(|l| options.student_id.is_none_or(|s| l.student_id == s))
            .cloned()
            .collect();
        lessons.sort_by(|a, b| compare_lessons(a, b, options));
        Ok(lessons)
    }

    async fn get_lesson(&self, lesson_id: Uuid) -> Result<Option<Lesson>, sqlx::Error> {
        self.enter(Table::Lessons).await?;
        Ok(self.lock().lessons.iter().find(|l| l.id == lesson_id).cloned())
    }

    async fn next_lesson_number(
        &self,
        teacher_id: Uuid,
        student_id: Uuid,
    ) -> Result<i32, sqlx::Error> {
        self.enter(Table::LessonCounters).await?;
        let mut tables = self.lock();
        let seed = tables
            .lessons
            .iter()
            .filter(|l| l.teacher_id == teacher_id && l.student_id == student_id)
            .map(|l| l.lesson_number)
            .max()
            .unwrap_or(0);
        let counter = tables
            .counters
            .entry((teacher_id, student_id))
            .or_insert(seed);
        *counter += 1;
        Ok(*counter)
    }

    async fn insert_lesson(&self, lesson: &NewLesson) -> Result<Lesson, sqlx::Error> {
        self.enter(Table::Lessons).await?;
        let mut tables = self.lock();
        if tables.lessons.iter().any(|l| {
            l.teacher_id == lesson.teacher_id
                && l.student_id == lesson.student_id
                && l.lesson_number == lesson.lesson_number
        }) {
            return Err(sqlx::Error::Database(Box::new(UniqueViolation(
                "lessons_teacher_id_student_id_lesson_number_key",
            ))));
        }
        let now = Utc::now();
        let created = Lesson {
            id: Uuid::new_v4(),
            teacher_id: lesson.teacher_id,
            student_id: lesson.student_id,
            creator_user_id: lesson.creator_user_id,
            lesson_number: lesson.lesson_number,
            date: lesson.date,
            time: lesson.time,
            title: lesson.title.clone(),
            notes: lesson.notes.clone(),
            status: lesson.status,
            created_at: now,
            updated_at: now,
        };
        tables.lessons.push(created.clone());
        Ok(created)
    }

    async fn update_lesson(
        &self,
        lesson_id: Uuid,
        changes: &LessonChanges,
    ) -> Result<Option<Lesson>, sqlx::Error> {
        self.enter(Table::Lessons).await?;
        let mut tables = self.lock();
        let Some(lesson) = tables.lessons.iter_mut().find(|l| l.id == lesson_id) else {
            return Ok(None);
        };
        if let Some(date) = changes.date {
            lesson.date = date;
        }
        if let Some(time) = changes.time {
            lesson.time = time;
        }
        if let Some(title) = &changes.title {
            lesson.title = Some(title.clone());
        }
        if let Some(notes) = &changes.notes {
            lesson.notes = Some(notes.clone());
        }
        if let Some(status) = changes.status {
            lesson.status = status;
        }
        lesson.updated_at = Utc::now();
        Ok(Some(lesson.clone()))
    }

    async fn delete_lesson(&self, lesson_id: Uuid) -> Result<bool, sqlx::Error> {
        self.enter(Table::Lessons).await?;
        let mut tables = self.lock();
        let before = tables.lessons.len();
        tables.lessons.retain(|l| l.id != lesson_id);
        let deleted = tables.lessons.len() < before;
        if deleted {
            tables.lesson_songs.retain(|row| row.lesson_id != lesson_id);
        }
        Ok(deleted)
    }
}

impl LessonSongExt for MemoryStore {
    async fn lesson_songs_for(&self, lesson_ids: &[Uuid]) -> Result<Vec<LessonSong>, sqlx::Error> {
        self.enter(Table::LessonSongs).await?;
        Ok(self
            .lock()
            .lesson_songs
            .iter()
            .filter(|row| lesson_ids.contains(&row.lesson_id))
            .cloned()
            .collect())
    }

    async fn get_lesson_song(
        &self,
        lesson_id: Uuid,
        song_id: Uuid,
    ) -> Result<Option<LessonSong>, sqlx::Error> {
        self.enter(Table::LessonSongs).await?;
        Ok(self
            .lock()
            .lesson_songs
            .iter()
            .find(|row| row.lesson_id == lesson_id && row.song_id == song_id)
            .cloned())
    }

    async fn upsert_lesson_song(
        &self,
        lesson_id: Uuid,
        song_id: Uuid,
        status: SongStatus,
    ) -> Result<LessonSong, sqlx::Error> {
        self.enter(Table::LessonSongs).await?;
        let mut tables = self.lock();
        let now = Utc::now();
        if let Some(row) = tables
            .lesson_songs
            .iter_mut()
            .find(|row| row.lesson_id == lesson_id && row.song_id == song_id)
        {
            row.song_status = status;
            row.updated_at = now;
            return Ok(row.clone());
        }
        let row = LessonSong {
            lesson_id,
            song_id,
            song_status: status,
            created_at: now,
            updated_at: now,
        };
        tables.lesson_songs.push(row.clone());
        Ok(row)
    }

    async fn delete_lesson_song(&self, lesson_id: Uuid, song_id: Uuid) -> Result<bool, sqlx::Error> {
        self.enter(Table::LessonSongs).await?;
        let mut tables = self.lock();
        let before = tables.lesson_songs.len();
        tables
            .lesson_songs
            .retain(|row| !(row.lesson_id == lesson_id && row.song_id == song_id));
        Ok(tables.lesson_songs.len() < before)
    }
}

impl SongExt for MemoryStore {
    async fn list_songs(
        &self,
        scope: Option<&[Uuid]>,
        query: &SongQuery,
    ) -> Result<(Vec<Song>, i64), sqlx::Error> {
        self.enter(Table::Songs).await?;
        let mut songs: Vec<Song> = self
            .lock()
            .songs
            .iter()
            .filter(|song| scope.is_none_or(|ids| ids.contains(&song.id)))
            .filter(|song| filter_matches(&query.filter, song))
            .cloned()
            .collect();
        songs.sort_by(|a, b| compare_songs(a, b, query));

        let total = songs.len() as i64;
        let page = songs
            .into_iter()
            .skip(usize::try_from(query.offset()).unwrap_or(usize::MAX))
            .take(query.limit as usize)
            .collect();
        Ok((page, total))
    }

    async fn get_song(&self, song_id: Uuid) -> Result<Option<Song>, sqlx::Error> {
        self.enter(Table::Songs).await?;
        Ok(self.lock().songs.iter().find(|s| s.id == song_id).cloned())
    }

    async fn create_song(&self, song: &NewSong) -> Result<Option<Song>, sqlx::Error> {
        self.enter(Table::Songs).await?;
        let mut tables = self.lock();
        if tables.songs.iter().any(|s| s.title == song.title) {
            return Ok(None);
        }
        let now = Utc::now();
        let created = Song {
            id: Uuid::new_v4(),
            title: song.title.clone(),
            author: song.author.clone(),
            level: song.level,
            key: song.key.clone(),
            chords: song.chords.clone(),
            audio_files: song.audio_files.clone(),
            ultimate_guitar_link: song.ultimate_guitar_link.clone(),
            short_title: song.short_title.clone(),
            created_at: now,
            updated_at: now,
        };
        tables.songs.push(created.clone());
        Ok(Some(created))
    }

    async fn update_song(
        &self,
        song_id: Uuid,
        changes: &SongChanges,
    ) -> Result<Option<Song>, sqlx::Error> {
        self.enter(Table::Songs).await?;
        let mut tables = self.lock();
        if let Some(title) = &changes.title {
            if tables.songs.iter().any(|s| s.id != song_id && &s.title == title) {
                return Err(sqlx::Error::Database(Box::new(UniqueViolation(
                    "songs_title_key",
                ))));
            }
        }
        let Some(song) = tables.songs.iter_mut().find(|s| s.id == song_id) else {
            return Ok(None);
        };
        if let Some(title) = &changes.title {
            song.title = title.clone();
        }
        if let Some(author) = &changes.author {
            song.author = author.clone();
        }
        if let Some(level) = changes.level {
            song.level = level;
        }
        if let Some(key) = &changes.key {
            song.key = Some(key.clone());
        }
        if let Some(chords) = &changes.chords {
            song.chords = Some(chords.clone());
        }
        if let Some(audio_files) = &changes.audio_files {
            song.audio_files = audio_files.clone();
        }
        if let Some(link) = &changes.ultimate_guitar_link {
            song.ultimate_guitar_link = Some(link.clone());
        }
        if let Some(short_title) = &changes.short_title {
            song.short_title = Some(short_title.clone());
        }
        song.updated_at = Utc::now();
        Ok(Some(song.clone()))
    }

    async fn delete_song(&self, song_id: Uuid) -> Result<bool, sqlx::Error> {
        self.enter(Table::Songs).await?;
        let mut tables = self.lock();
        let before = tables.songs.len();
        tables.songs.retain(|s| s.id != song_id);
        let deleted = tables.songs.len() < before;
        if deleted {
            tables.lesson_songs.retain(|row| row.song_id != song_id);
        }
        Ok(deleted)
    }

    async fn distinct_song_levels(&self) -> Result<Vec<SongLevel>, sqlx::Error> {
        self.enter(Table::Songs).await?;
        let levels: BTreeSet<SongLevel> = self.lock().songs.iter().map(|s| s.level).collect();
        Ok(levels.into_iter().collect())
    }

    async fn distinct_song_keys(&self) -> Result<Vec<String>, sqlx::Error> {
        self.enter(Table::Songs).await?;
        let keys: BTreeSet<String> = self
            .lock()
            .songs
            .iter()
            .filter_map(|s| s.key.clone())
            .filter(|key| !key.is_empty())
            .collect();
        Ok(keys.into_iter().collect())
    }

    async fn distinct_song_authors(&self) -> Result<Vec<String>, sqlx::Error> {
        self.enter(Table::Songs).await?;
        let authors: BTreeSet<String> = self
            .lock()
            .songs
            .iter()
            .map(|s| s.author.clone())
            .filter(|author| !author.is_empty())
            .collect();
        Ok(authors.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wonderwall() -> Song {
        MemoryStore::new().add_song("Wonderwall", "Oasis", SongLevel::Beginner, Some("F#m"))
    }

    #[test]
    fn substring_predicates_ignore_case() {
        let filter = SongFilter {
            author: Some("oAsIs".into()),
            search: Some("WONDER".into()),
            ..Default::default()
        };
        assert!(filter_matches(&filter, &wonderwall()));
    }

    #[test]
    fn categorical_predicates_are_exact() {
        let song = wonderwall();

        let wrong_case_key = SongFilter {
            key: Some("f#m".into()),
            ..Default::default()
        };
        assert!(!filter_matches(&wrong_case_key, &song));

        let other_level = SongFilter {
            level: Some(SongLevel::Advanced),
            ..Default::default()
        };
        assert!(!filter_matches(&other_level, &song));
    }
}
