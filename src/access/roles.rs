use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    db::ProfileExt,
    error::{AccessError, StoreStage},
    models::Profile,
};

/// Caller identity as resolved by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
}

/// What a caller may do, derived from the profile flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    pub is_admin: bool,
    pub is_teacher: bool,
    pub is_student: bool,
}

impl Capabilities {
    /// The capability set of a freshly created profile.
    pub const STUDENT_ONLY: Capabilities = Capabilities {
        is_admin: false,
        is_teacher: false,
        is_student: true,
    };

    pub fn from_profile(profile: &Profile) -> Self {
        Capabilities {
            is_admin: profile.is_admin,
            is_teacher: profile.is_teacher,
            is_student: profile.is_student,
        }
    }

    /// Admins and teachers schedule, edit and delete lessons.
    pub fn can_manage_lessons(&self) -> bool {
        self.is_admin || self.is_teacher
    }

    pub fn require_admin(&self) -> Result<(), AccessError> {
        if self.is_admin {
            Ok(())
        } else {
            Err(AccessError::forbidden())
        }
    }

    pub fn require_lesson_manager(&self) -> Result<(), AccessError> {
        if self.can_manage_lessons() {
            Ok(())
        } else {
            Err(AccessError::forbidden())
        }
    }
}

/// How a profile lookup failure is treated for a class of endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupPolicy {
    /// Propagate the failure as a classification error (500).
    Strict,
    /// Log it and continue with student-only capabilities. Only list reads
    /// use this; a downgraded caller can see at most their own lessons.
    DowngradeOnRead,
}

#[derive(Debug, Clone)]
pub struct Classification {
    pub identity: Identity,
    /// `None` only when the lookup failed under [`LookupPolicy::DowngradeOnRead`]
    pub profile: Option<Profile>,
    pub capabilities: Capabilities,
}

/// Return the caller's profile, creating a default one on first sight.
///
/// Insert-or-fetch: when two requests race on a new identity, the losing
/// insert yields no row and the winner's row is read back.
#[instrument(skip(store), fields(user_id = %identity.id))]
pub async fn ensure_profile<S: ProfileExt>(
    store: &S,
    identity: &Identity,
) -> Result<Profile, AccessError> {
    if let Some(profile) = store
        .get_profile(identity.id)
        .await
        .map_err(AccessError::Classification)?
    {
        return Ok(profile);
    }

    let inserted = store
        .insert_default_profile(identity.id, &identity.email)
        .await
        .map_err(AccessError::data_access(StoreStage::SaveProfile))?;

    match inserted {
        Some(profile) => {
            info!("Created default profile");
            Ok(profile)
        }
        None => {
            info!("Profile created concurrently, reading it back");
            store
                .get_profile(identity.id)
                .await
                .map_err(AccessError::Classification)?
                .ok_or(AccessError::Classification(sqlx::Error::RowNotFound))
        }
    }
}

/// Resolve the capability set for a caller.
#[instrument(skip(store, identity))]
pub async fn classify<S: ProfileExt>(
    store: &S,
    identity: Option<&Identity>,
    policy: LookupPolicy,
) -> Result<Classification, AccessError> {
    let identity = identity.ok_or(AccessError::Unauthenticated)?;

    match ensure_profile(store, identity).await {
        Ok(profile) => Ok(Classification {
            identity: identity.clone(),
            capabilities: Capabilities::from_profile(&profile),
            profile: Some(profile),
        }),
        Err(AccessError::Classification(source)) if policy == LookupPolicy::DowngradeOnRead => {
            warn!(
                user_id = %identity.id,
                db_error = %source,
                "Profile lookup failed, continuing with student-only capabilities"
            );
            Ok(Classification {
                identity: identity.clone(),
                profile: None,
                capabilities: Capabilities::STUDENT_ONLY,
            })
        }
        Err(err) => Err(err),
    }
}
