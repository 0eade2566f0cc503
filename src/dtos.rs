use chrono::{NaiveDate, NaiveTime};
use serde::de::{DeserializeOwned, IntoDeserializer, value::StrDeserializer};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    access::{
        Capabilities,
        catalog::SongPage,
        pipeline::LessonView,
        sequencer::NewLessonInput,
    },
    db::{LessonChanges, LessonListOptions, LessonSort, NewSong, SongChanges, SongFilter, SongQuery, SongSort, SortOrder},
    error::{ErrorMessage, HttpError},
    models::{LessonStatus, Profile, SongLevel, SongStatus, SongWithStatus},
};

// DTOs define what crosses the HTTP boundary. Query ids, numbers and enums
// arrive as strings so a malformed value gets its own JSON message instead
// of a plain-text extractor rejection.

/// Highest page number a song listing accepts.
pub const MAX_PAGE: u32 = 10_000;

/// Highest page size a song listing accepts.
pub const MAX_LIMIT: u32 = 100;

/// Blank query values mean "not given".
fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

pub fn parse_uuid(value: &str, message: ErrorMessage) -> Result<Uuid, HttpError> {
    Uuid::parse_str(value).map_err(|_| HttpError::bad_request(message.to_string()))
}

fn parse_optional_uuid(value: Option<&str>, message: ErrorMessage) -> Result<Option<Uuid>, HttpError> {
    value.map(|v| parse_uuid(v, message)).transpose()
}

/// Parse a query value into one of our serde enums, using the same names the
/// JSON bodies use.
fn parse_enum<T: DeserializeOwned>(value: Option<&str>, message: ErrorMessage) -> Result<Option<T>, HttpError> {
    value
        .map(|v| {
            let deserializer: StrDeserializer<'_, serde::de::value::Error> = v.trim().into_deserializer();
            T::deserialize(deserializer).map_err(|_| HttpError::bad_request(message.to_string()))
        })
        .transpose()
}

fn parse_bounded(
    value: Option<&str>,
    max: u32,
    message: ErrorMessage,
) -> Result<Option<u32>, HttpError> {
    value
        .map(|v| match v.trim().parse::<u32>() {
            Ok(n) if (1..=max).contains(&n) => Ok(n),
            _ => Err(HttpError::bad_request(message.to_string())),
        })
        .transpose()
}

pub fn parse_date(value: &str) -> Result<NaiveDate, HttpError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| HttpError::bad_request(ErrorMessage::InvalidDate.to_string()))
}

/// Accepts `HH:MM` and `HH:MM:SS`.
pub fn parse_time(value: &str) -> Result<NaiveTime, HttpError> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|_| HttpError::bad_request(ErrorMessage::InvalidTime.to_string()))
}

// ============================================================================
// Song DTOs
// ============================================================================

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SongsQueryParams {
    pub user_id: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
    pub level: Option<String>,

    #[validate(length(max = 10))]
    pub key: Option<String>,

    #[validate(length(max = 200))]
    pub author: Option<String>,

    #[validate(length(max = 200))]
    pub search: Option<String>,

    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

impl SongsQueryParams {
    pub fn target(&self) -> Result<Option<Uuid>, HttpError> {
        parse_optional_uuid(self.user_id.as_deref(), ErrorMessage::InvalidUserId)
    }

    pub fn song_query(&self) -> Result<SongQuery, HttpError> {
        let defaults = SongQuery::default();
        let owned = |value: &Option<String>| non_blank(value).map(str::to_owned);

        Ok(SongQuery {
            filter: SongFilter {
                level: parse_enum(non_blank(&self.level), ErrorMessage::InvalidSongLevel)?,
                key: owned(&self.key),
                author: owned(&self.author),
                search: owned(&self.search),
            },
            sort: parse_enum::<SongSort>(non_blank(&self.sort_by), ErrorMessage::InvalidSortField)?
                .unwrap_or(defaults.sort),
            order: parse_enum::<SortOrder>(non_blank(&self.sort_order), ErrorMessage::InvalidSortOrder)?
                .unwrap_or(defaults.order),
            page: parse_bounded(non_blank(&self.page), MAX_PAGE, ErrorMessage::InvalidPage)?
                .unwrap_or(defaults.page),
            limit: parse_bounded(non_blank(&self.limit), MAX_LIMIT, ErrorMessage::InvalidLimit)?
                .unwrap_or(defaults.limit),
        })
    }
}

/// Pagination metadata
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct PaginationDto {
    pub page: u32,
    pub limit: u32,
    pub total: i64,
    #[serde(rename = "totalPages")]
    pub total_pages: i64,
}

impl PaginationDto {
    pub fn new(page: u32, limit: u32, total: i64) -> Self {
        let limit_i64 = i64::from(limit.max(1));
        PaginationDto {
            page,
            limit,
            total,
            total_pages: (total + limit_i64 - 1) / limit_i64,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SongsPaginationResponseDto {
    pub songs: Vec<SongWithStatus>,
    pub pagination: PaginationDto,
}

impl SongsPaginationResponseDto {
    pub fn new(page: SongPage<SongWithStatus>, query: &SongQuery) -> Self {
        SongsPaginationResponseDto {
            pagination: PaginationDto::new(query.page, query.limit, page.total),
            songs: page.songs,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateSongDto {
    #[validate(length(min = 1, max = 200, message = "Title is required"))]
    pub title: String,

    #[validate(length(min = 1, max = 200, message = "Author is required"))]
    pub author: String,

    pub level: SongLevel,

    #[validate(length(max = 10))]
    pub key: Option<String>,

    pub chords: Option<String>,

    #[serde(default)]
    pub audio_files: Vec<String>,

    #[validate(url(message = "Ultimate Guitar link must be a URL"))]
    pub ultimate_guitar_link: Option<String>,

    #[validate(length(max = 100))]
    pub short_title: Option<String>,
}

impl From<CreateSongDto> for NewSong {
    fn from(dto: CreateSongDto) -> Self {
        NewSong {
            title: dto.title.trim().to_string(),
            author: dto.author.trim().to_string(),
            level: dto.level,
            key: dto.key,
            chords: dto.chords,
            audio_files: dto.audio_files,
            ultimate_guitar_link: dto.ultimate_guitar_link,
            short_title: dto.short_title,
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSongDto {
    #[validate(length(min = 1, max = 200, message = "Title must not be empty"))]
    pub title: Option<String>,

    #[validate(length(min = 1, max = 200, message = "Author must not be empty"))]
    pub author: Option<String>,

    pub level: Option<SongLevel>,

    #[validate(length(max = 10))]
    pub key: Option<String>,

    pub chords: Option<String>,

    pub audio_files: Option<Vec<String>>,

    #[validate(url(message = "Ultimate Guitar link must be a URL"))]
    pub ultimate_guitar_link: Option<String>,

    #[validate(length(max = 100))]
    pub short_title: Option<String>,
}

impl From<UpdateSongDto> for SongChanges {
    fn from(dto: UpdateSongDto) -> Self {
        SongChanges {
            title: dto.title.map(|t| t.trim().to_string()),
            author: dto.author.map(|a| a.trim().to_string()),
            level: dto.level,
            key: dto.key,
            chords: dto.chords,
            audio_files: dto.audio_files,
            ultimate_guitar_link: dto.ultimate_guitar_link,
            short_title: dto.short_title,
        }
    }
}

// ============================================================================
// Lesson DTOs
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonsQueryParams {
    pub user_id: Option<String>,
    pub student_id: Option<String>,
    pub sort: Option<String>,
    pub order: Option<String>,
}

impl LessonsQueryParams {
    pub fn target(&self) -> Result<Option<Uuid>, HttpError> {
        parse_optional_uuid(self.user_id.as_deref(), ErrorMessage::InvalidUserId)
    }

    pub fn list_options(&self) -> Result<LessonListOptions, HttpError> {
        let defaults = LessonListOptions::default();
        Ok(LessonListOptions {
            student_id: parse_optional_uuid(self.student_id.as_deref(), ErrorMessage::InvalidStudentId)?,
            sort: parse_enum::<LessonSort>(non_blank(&self.sort), ErrorMessage::InvalidSortField)?
                .unwrap_or(defaults.sort),
            order: parse_enum::<SortOrder>(non_blank(&self.order), ErrorMessage::InvalidSortOrder)?
                .unwrap_or(defaults.order),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct LessonsResponseDto {
    pub lessons: Vec<LessonView>,
}

/// Every field is optional at the serde level so a missing field is
/// reported by validation as a 400 with our message.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateLessonDto {
    #[validate(required(message = "teacherId is required"))]
    pub teacher_id: Option<String>,

    #[validate(required(message = "studentId is required"))]
    pub student_id: Option<String>,

    #[validate(required(message = "date is required"))]
    pub date: Option<String>,

    #[validate(required(message = "time is required"))]
    pub time: Option<String>,

    #[validate(length(max = 200))]
    pub title: Option<String>,

    pub notes: Option<String>,

    pub status: Option<LessonStatus>,
}

impl CreateLessonDto {
    /// Validate presence, then shape. Never touches the store.
    pub fn into_input(self) -> Result<NewLessonInput, HttpError> {
        self.validate()
            .map_err(|e| HttpError::bad_request(e.to_string()))?;

        let required = |value: Option<String>| value.ok_or_else(|| HttpError::bad_request("Missing required field"));

        let teacher_id = parse_uuid(&required(self.teacher_id)?, ErrorMessage::InvalidTeacherId)?;
        let student_id = parse_uuid(&required(self.student_id)?, ErrorMessage::InvalidStudentId)?;
        let date = parse_date(&required(self.date)?)?;
        let time = parse_time(&required(self.time)?)?;

        Ok(NewLessonInput {
            teacher_id,
            student_id,
            date,
            time,
            title: self.title,
            notes: self.notes,
            status: self.status,
        })
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLessonDto {
    pub date: Option<String>,
    pub time: Option<String>,

    #[validate(length(max = 200))]
    pub title: Option<String>,

    pub notes: Option<String>,
    pub status: Option<LessonStatus>,
}

impl UpdateLessonDto {
    pub fn into_changes(self) -> Result<LessonChanges, HttpError> {
        self.validate()
            .map_err(|e| HttpError::bad_request(e.to_string()))?;

        Ok(LessonChanges {
            date: self.date.as_deref().map(parse_date).transpose()?,
            time: self.time.as_deref().map(parse_time).transpose()?,
            title: self.title,
            notes: self.notes,
            status: self.status,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct LessonSongStatusDto {
    pub status: SongStatus,
}

// ============================================================================
// Profile DTOs
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ProfileResponseDto {
    pub profile: Profile,
    pub capabilities: Capabilities,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileDto {
    #[validate(length(min = 1, max = 100, message = "First name must be 1-100 characters"))]
    pub first_name: Option<String>,

    #[validate(length(min = 1, max = 100, message = "Last name must be 1-100 characters"))]
    pub last_name: Option<String>,
}
