use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Company;

/// What happened to a company record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

impl ChangeKind {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Created => "company.created",
            Self::Updated => "company.updated",
            Self::Deleted => "company.deleted",
        }
    }
}

/// Notification body sent to subscribers after a successful write
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEvent {
    /// Unique identifier for this notification
    pub id: Uuid,
    /// When the change was persisted
    pub occurred_at: DateTime<Utc>,
    /// Type of event (e.g. "company.created")
    pub event_type: String,
    /// Id of the affected company
    pub company_id: String,
    /// Record after the change; absent for deletions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<Company>,
}

impl NotificationEvent {
    pub fn new(kind: ChangeKind, company_id: impl Into<String>, company: Option<Company>) -> Self {
        Self {
            id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            event_type: kind.event_type().to_string(),
            company_id: company_id.into(),
            company,
        }
    }

    pub fn created(company: &Company) -> Self {
        Self::new(ChangeKind::Created, company.id.clone(), Some(company.clone()))
    }

    pub fn updated(company: &Company) -> Self {
        Self::new(ChangeKind::Updated, company.id.clone(), Some(company.clone()))
    }

    pub fn deleted(company_id: &str) -> Self {
        Self::new(ChangeKind::Deleted, company_id, None)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
