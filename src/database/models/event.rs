use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImpersonationAction {
    Start,
    Stop,
}

impl ImpersonationAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImpersonationAction::Start => "start",
            ImpersonationAction::Stop => "stop",
        }
    }
}

/// One append-only audit record of an impersonation transition. Rows are
/// written once and never mutated or deleted by ordinary code paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpersonationEvent {
    pub real_user_id: Uuid,
    pub tenant_id: Uuid,
    pub action: ImpersonationAction,
    pub origin: String,
    pub created_at: DateTime<Utc>,
}

impl ImpersonationEvent {
    pub fn now(
        real_user_id: Uuid,
        tenant_id: Uuid,
        action: ImpersonationAction,
        origin: impl Into<String>,
    ) -> Self {
        Self {
            real_user_id,
            tenant_id,
            action,
            origin: origin.into(),
            created_at: Utc::now(),
        }
    }
}
