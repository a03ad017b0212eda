//! Rendering dispositions as HTTP decisions

use crate::policy::Disposition;
use serde::{Deserialize, Serialize};

/// 204: build proceeds
pub const STATUS_NO_CONTENT: u16 = 204;

/// 400: build rejected
pub const STATUS_BAD_REQUEST: u16 = 400;

/// 498: build blocked pending manual verification
///
/// Non-standard, but the upstream validator protocol branches on it.
pub const STATUS_NEEDS_VERIFICATION: u16 = 498;

/// Status code and optional message returned to the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    /// HTTP status code
    pub status: u16,
    /// Human-readable message, absent for allowed builds
    pub message: Option<String>,
}

impl Decision {
    /// Structured body for non-empty decisions
    pub fn body(&self) -> Option<ErrorBody> {
        self.message.as_ref().map(|message| ErrorBody {
            code: self.status,
            message: message.clone(),
        })
    }
}

/// Error object written for rejected builds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Same as the HTTP status
    pub code: u16,
    /// Reason shown to the user
    pub message: String,
}

/// Map a disposition for `author` to its HTTP decision
pub fn encode(disposition: Disposition, author: &str) -> Decision {
    let (status, message) = match disposition {
        Disposition::AutoBuild => (STATUS_NO_CONTENT, None),
        Disposition::NoBuild => (
            STATUS_BAD_REQUEST,
            Some(format!("The user:<{}> has no build rights", author)),
        ),
        Disposition::SkipBuild => (
            STATUS_NEEDS_VERIFICATION,
            Some(format!("The user:<{}> builds are skiped", author)),
        ),
        Disposition::ManualBuild => (
            STATUS_NEEDS_VERIFICATION,
            Some(format!("The user:<{}> builds needs to be verified", author)),
        ),
    };

    Decision { status, message }
}
