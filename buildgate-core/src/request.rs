//! Build request payload sent by the CI server

use crate::error::Result;
use serde::{Deserialize, Deserializer, Serialize};

/// Decoded validator payload
///
/// Only `build.author` drives the decision; the other fields are kept for
/// log context. Unlisted payload fields are ignored, and `null` reads as
/// absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRequest {
    /// Build being validated
    #[serde(default, alias = "Build", deserialize_with = "null_as_default")]
    pub build: Build,

    /// Repository the build belongs to
    #[serde(default, alias = "Repo", skip_serializing_if = "Option::is_none")]
    pub repo: Option<Repo>,
}

/// Build section of the payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Build {
    /// Login of the user who triggered the build
    #[serde(default, alias = "Author", deserialize_with = "null_as_default")]
    pub author: String,

    /// Build number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<i64>,

    /// Trigger event (push, pull_request, tag, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
}

/// Repository section of the payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repo {
    /// `owner/name`
    #[serde(default)]
    pub slug: String,
}

impl BuildRequest {
    /// Author the decision is made for
    pub fn author(&self) -> &str {
        &self.build.author
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Decode an authenticated request body
pub fn decode(body: &[u8]) -> Result<BuildRequest> {
    Ok(serde_json::from_slice(body)?)
}
