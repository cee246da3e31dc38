use serde::{Deserialize, Serialize};

use crate::{
    domain::{CredentialToken, RejectReason, RoomMode},
    identity::RoomKey,
};

/// Body of a join request. `target` is the declared peer in direct mode and
/// the room id in group mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmissionRequest {
    pub requester: String,
    pub mode: RoomMode,
    #[serde(default, alias = "peer", alias = "room_id")]
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmissionGrant {
    pub credential: CredentialToken,
    pub room_key: RoomKey,
    pub mode: RoomMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AdmissionResponse {
    Admitted(AdmissionGrant),
    Rejected { reason: RejectReason },
}
