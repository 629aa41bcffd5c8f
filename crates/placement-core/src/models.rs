//! Wire types and small domain enums shared by the client crates.

use serde::Deserialize;

/// Reachability of the backend as reported by `/health`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Online,
    Unreachable,
}

impl HealthStatus {
    pub fn label(&self) -> &'static str {
        match self {
            HealthStatus::Online => "online",
            HealthStatus::Unreachable => "unreachable",
        }
    }
}

/// `/info` payload
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerInfo {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub gemini_configured: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HealthResponse {
    #[serde(default)]
    pub ok: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CurrentUserResponse {
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GenerateResponse {
    pub text: String,
}

/// Assessment modules exposed by the backend, revealed once logged in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureModule {
    Chat,
    Speaking,
    Listening,
    Reading,
    Writing,
    Vocabulary,
}

impl FeatureModule {
    pub const ALL: [FeatureModule; 6] = [
        FeatureModule::Chat,
        FeatureModule::Speaking,
        FeatureModule::Listening,
        FeatureModule::Reading,
        FeatureModule::Writing,
        FeatureModule::Vocabulary,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            FeatureModule::Chat => "Chat",
            FeatureModule::Speaking => "Speaking",
            FeatureModule::Listening => "Listening",
            FeatureModule::Reading => "Reading",
            FeatureModule::Writing => "Writing",
            FeatureModule::Vocabulary => "Vocabulary",
        }
    }

    /// Backend router prefix serving this module
    pub fn api_prefix(&self) -> &'static str {
        match self {
            FeatureModule::Chat => "/gemini",
            FeatureModule::Speaking => "/speaking",
            FeatureModule::Listening => "/listen",
            FeatureModule::Reading => "/read",
            FeatureModule::Writing => "/write",
            FeatureModule::Vocabulary => "/vocabulary",
        }
    }

    /// Browser entry point of the module's page in the web frontend
    pub fn page_url(&self, base_url: &str) -> String {
        let base = base_url.trim_end_matches('/');
        match self {
            FeatureModule::Chat => format!("{}/app/", base),
            other => format!("{}/app/{}/", base, other.title().to_lowercase()),
        }
    }

    /// Position in `ALL`, used for numeric shortcuts
    pub fn index(&self) -> usize {
        Self::ALL.iter().position(|m| m == self).unwrap_or(0)
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Get the next module (wrapping around)
    pub fn next(&self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    /// Get the previous module (wrapping around)
    pub fn prev(&self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}
