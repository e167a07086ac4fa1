//! Placement records exchanged with the persistence collaborator

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// State of a link placement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlacementStatus {
    #[default]
    Posted,
    Verified,
    Broken,
    Removed,
}

impl std::fmt::Display for PlacementStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Posted => write!(f, "posted"),
            Self::Verified => write!(f, "verified"),
            Self::Broken => write!(f, "broken"),
            Self::Removed => write!(f, "removed"),
        }
    }
}

/// A backlink placed on a source domain pointing at a campaign target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementRecord {
    /// Assigned by the store on insert; empty until then
    #[serde(default)]
    pub id: String,
    pub campaign_id: String,
    pub target_url: String,
    pub source_domain: String,
    #[serde(default)]
    pub anchor_text: String,
    #[serde(default)]
    pub status: PlacementStatus,
    pub domain_authority: u32,
    pub quality_score: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_verified_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub removal_reason: Option<String>,
}

impl PlacementRecord {
    /// New unsaved record in `posted` state
    pub fn new(
        campaign_id: impl Into<String>,
        target_url: impl Into<String>,
        source_domain: impl Into<String>,
        anchor_text: impl Into<String>,
        domain_authority: u32,
        quality_score: u32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            campaign_id: campaign_id.into(),
            target_url: target_url.into(),
            source_domain: source_domain.into(),
            anchor_text: anchor_text.into(),
            status: PlacementStatus::Posted,
            domain_authority,
            quality_score,
            created_at: now,
            updated_at: now,
            last_verified_at: None,
            removal_reason: None,
        }
    }
}
