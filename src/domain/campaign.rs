//! Campaign identity and runtime lifecycle states

use serde::{Deserialize, Serialize};

/// The external campaign a runtime services
///
/// Business fields (keywords, targets, quotas) belong to the storage layer;
/// the engine only needs identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub name: String,
}

impl Campaign {
    pub fn new(id: impl Into<String>, user_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            name: name.into(),
        }
    }
}

/// Campaign status written back through the persistence collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    Active,
    Paused,
}

impl std::fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Paused => write!(f, "paused"),
        }
    }
}

/// Lifecycle state of a campaign's runtime
///
/// `stopped -> active <-> paused -> stopping -> stopped`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeStatus {
    #[default]
    Stopped,
    Active,
    Paused,
    Stopping,
}

impl RuntimeStatus {
    /// Whether the runtime holds a live loop (anything but stopped)
    pub fn is_live(&self) -> bool {
        !matches!(self, Self::Stopped)
    }

    /// Whether new operations may be enqueued
    pub fn accepts_work(&self) -> bool {
        matches!(self, Self::Active | Self::Paused)
    }
}

impl std::fmt::Display for RuntimeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stopped => write!(f, "stopped"),
            Self::Active => write!(f, "active"),
            Self::Paused => write!(f, "paused"),
            Self::Stopping => write!(f, "stopping"),
        }
    }
}
