use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error body sent to clients.
///
/// Example JSON response:
/// ```text
/// { "error": "Invalid student ID format" }
/// ```
///
/// Kept separate from `HttpError` so internal details (store errors, stage
/// sources) never reach the wire.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(s) => write!(f, "{}", s),
            Err(_) => Err(fmt::Error),
        }
    }
}

/// Fixed client-facing messages.
#[derive(Debug, PartialEq)]
pub enum ErrorMessage {
    // Authentication errors
    InvalidToken,
    TokenNotProvided,

    // Authorization errors
    PermissionDenied,

    // Validation errors
    InvalidStudentId,
    InvalidUserId,
    InvalidTeacherId,
    InvalidLessonId,
    InvalidSongId,
    InvalidDate,
    InvalidTime,
    InvalidPage,
    InvalidLimit,
    InvalidSongLevel,
    InvalidSortField,
    InvalidSortOrder,

    // Lookups
    LessonNotFound,
    SongNotFound,
    DuplicateSongTitle,

    //Else
    ServerError,
}

impl fmt::Display for ErrorMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            ErrorMessage::InvalidToken => "Token is invalid or expired",
            ErrorMessage::TokenNotProvided => "You are not logged in, please provide a token",
            ErrorMessage::PermissionDenied => "You are not allowed to perform this action",
            ErrorMessage::InvalidStudentId => "Invalid student ID format",
            ErrorMessage::InvalidUserId => "Invalid user ID format",
            ErrorMessage::InvalidTeacherId => "Invalid teacher ID format",
            ErrorMessage::InvalidLessonId => "Invalid lesson ID format",
            ErrorMessage::InvalidSongId => "Invalid song ID format",
            ErrorMessage::InvalidDate => "Invalid date format, expected YYYY-MM-DD",
            ErrorMessage::InvalidTime => "Invalid time format, expected HH:MM",
            ErrorMessage::InvalidPage => "Page must be a number between 1 and 10000",
            ErrorMessage::InvalidLimit => "Limit must be a number between 1 and 100",
            ErrorMessage::InvalidSongLevel => "Invalid song level",
            ErrorMessage::InvalidSortField => "Invalid sort field",
            ErrorMessage::InvalidSortOrder => "Invalid sort order, expected asc or desc",
            ErrorMessage::LessonNotFound => "Lesson not found",
            ErrorMessage::SongNotFound => "Song not found",
            ErrorMessage::DuplicateSongTitle => "A song with this title already exists",
            ErrorMessage::ServerError => "Server Error. Please try again later",
        };
        write!(f, "{}", message)
    }
}

/// Internal HTTP error type returned by handlers and middleware.
///
/// Bundles the client message with its status code so the two cannot drift
/// apart. Axum turns it into a response through `IntoResponse`.
#[derive(Debug, Clone)]
pub struct HttpError {
    pub message: String,
    pub status: StatusCode,
}

impl HttpError {
    pub fn new(message: impl Into<String>, status: StatusCode) -> Self {
        HttpError {
            message: message.into(),
            status,
        }
    }

    /// 500 Internal Server Error
    pub fn server_error(message: impl Into<String>) -> Self {
        HttpError {
            message: message.into(),
            status: StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 400 Bad Request
    pub fn bad_request(message: impl Into<String>) -> Self {
        HttpError {
            message: message.into(),
            status: StatusCode::BAD_REQUEST,
        }
    }

    /// 401 Unauthorized (i.e. unauthenticated)
    pub fn unauthorized(message: impl Into<String>) -> Self {
        HttpError {
            message: message.into(),
            status: StatusCode::UNAUTHORIZED,
        }
    }

    pub fn into_http_response(self) -> Response {
        let json_response = Json(ErrorResponse {
            error: self.message.clone(),
        });

        (self.status, json_response).into_response()
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "HttpError: message: {}, status: {}",
            self.message, self.status
        )
    }
}

impl std::error::Error for HttpError {}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        self.into_http_response()
    }
}

/// The logical store operation a data-access failure happened in.
///
/// Only this label reaches the client; the store error stays in the logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreStage {
    Profiles,
    Lessons,
    LessonSongs,
    Songs,
    LessonNumber,
    SaveProfile,
    SaveLesson,
    SaveLessonSong,
    SaveSong,
}

impl fmt::Display for StoreStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            StoreStage::Profiles => "fetch profiles",
            StoreStage::Lessons => "fetch lessons",
            StoreStage::LessonSongs => "fetch lesson songs",
            StoreStage::Songs => "fetch songs",
            StoreStage::LessonNumber => "allocate lesson number",
            StoreStage::SaveProfile => "save profile",
            StoreStage::SaveLesson => "save lesson",
            StoreStage::SaveLessonSong => "save lesson song",
            StoreStage::SaveSong => "save song",
        };
        write!(f, "{}", stage)
    }
}

/// Errors produced by the access and aggregation engine.
#[derive(Debug, Error)]
pub enum AccessError {
    #[error("Authentication required. Please log in.")]
    Unauthenticated,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Failed to {stage}")]
    DataAccess {
        stage: StoreStage,
        #[source]
        source: sqlx::Error,
    },

    #[error("Failed to classify caller")]
    Classification(#[source] sqlx::Error),
}

impl AccessError {
    pub fn data_access(stage: StoreStage) -> impl FnOnce(sqlx::Error) -> AccessError {
        move |source| AccessError::DataAccess { stage, source }
    }

    pub fn forbidden() -> Self {
        AccessError::Forbidden(ErrorMessage::PermissionDenied.to_string())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AccessError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AccessError::Forbidden(_) => StatusCode::FORBIDDEN,
            AccessError::NotFound(_) => StatusCode::NOT_FOUND,
            AccessError::Conflict(_) => StatusCode::CONFLICT,
            AccessError::DataAccess { .. } | AccessError::Classification(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<AccessError> for HttpError {
    fn from(err: AccessError) -> Self {
        match &err {
            AccessError::DataAccess { stage, source } => {
                tracing::error!(stage = %stage, db_error = %source, "Data access failure");
            }
            AccessError::Classification(source) => {
                tracing::error!(db_error = %source, "Profile lookup failed during classification");
            }
            AccessError::Unauthenticated | AccessError::Forbidden(_) => {
                tracing::warn!(error = %err, "Access denied");
            }
            _ => {}
        }
        HttpError::new(err.to_string(), err.status_code())
    }
}

/// True when the store rejected a write because of a unique constraint.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    // Postgres unique violation has SQLSTATE code 23505
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code == "23505"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_access_message_names_only_the_stage() {
        let err = AccessError::DataAccess {
            stage: StoreStage::LessonSongs,
            source: sqlx::Error::Protocol("connection reset by peer 10.0.0.3".into()),
        };
        let http: HttpError = err.into();

        assert_eq!(http.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(http.message, "Failed to fetch lesson songs");
    }

    #[test]
    fn taxonomy_maps_to_distinct_statuses() {
        assert_eq!(AccessError::Unauthenticated.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AccessError::forbidden().status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            AccessError::NotFound("gone".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AccessError::Conflict("dup".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AccessError::Classification(sqlx::Error::PoolTimedOut).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn error_response_serializes_as_error_field() {
        let body = ErrorResponse {
            error: ErrorMessage::InvalidStudentId.to_string(),
        };
        assert_eq!(body.to_string(), r#"{"error":"Invalid student ID format"}"#);
    }

    #[test]
    fn non_database_errors_are_not_unique_violations() {
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
    }
}
