//! Mapping of identity-provider profiles onto local user fields.

use serde::{Deserialize, Serialize};

/// Subset of the GitHub `/user` document we care about.
#[derive(Debug, Clone, Deserialize)]
pub struct GithubProfile {
    pub id: Option<serde_json::Value>,
    pub login: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalUserFields {
    pub name: String,
    pub email: Option<String>,
    pub image: Option<String>,
    pub username: String,
}

/// Display name falls back to the login when the profile has none.
pub fn map_github_profile(profile: &GithubProfile) -> LocalUserFields {
    let name = profile
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(&profile.login)
        .to_string();

    LocalUserFields {
        name,
        email: profile.email.clone(),
        image: profile.avatar_url.clone(),
        username: profile.login.clone(),
    }
}
