use std::sync::Arc;

use call_backend::{CredentialIssuer, IdentityDirectory, RoomBackend};
use shared::{
    domain::{RejectReason, RoomMode},
    identity::{Identity, RoomKey},
    protocol::{AdmissionGrant, AdmissionRequest},
};
use tracing::{debug, info, warn};

use crate::{
    error::{AdmissionError, AdmissionStage},
    exclusion::ExclusionQueue,
    policy::{evaluate, AdmissionDecision, SeatPolicy},
    reconcile::reconcile,
    snapshot::SnapshotReader,
};

#[derive(Debug, Clone)]
pub struct AdmissionSettings {
    pub group_capacity: usize,
    pub members_page_size: usize,
    pub credential_ttl_seconds: i64,
}

impl Default for AdmissionSettings {
    fn default() -> Self {
        Self {
            group_capacity: 8,
            members_page_size: 100,
            credential_ttl_seconds: 3600,
        }
    }
}

#[derive(Debug, Clone)]
pub enum AdmissionOutcome {
    Admitted(AdmissionGrant),
    Rejected(RejectReason),
}

/// A validated request, normalized and bound to its room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionPlan {
    pub requester: Identity,
    pub display_name: Option<String>,
    pub room: RoomKey,
    pub policy: SeatPolicy,
}

impl AdmissionPlan {
    pub fn from_request(
        request: &AdmissionRequest,
        group_capacity: usize,
    ) -> Result<Self, AdmissionError> {
        let requester = request.requester.trim();
        if requester.is_empty() {
            return Err(AdmissionError::invalid("requester is required"));
        }
        let requester = Identity::normalize(requester);

        let target = request.target.trim();
        let (room, policy) = match request.mode {
            RoomMode::Direct => {
                if target.is_empty() {
                    return Err(AdmissionError::invalid("peer is required for direct calls"));
                }
                let peer = Identity::normalize(target);
                if peer == requester {
                    return Err(AdmissionError::invalid("peer must differ from requester"));
                }
                (RoomKey::direct(&requester, &peer), SeatPolicy::Direct { peer })
            }
            RoomMode::Group => {
                if target.is_empty() {
                    return Err(AdmissionError::invalid("room id is required for group calls"));
                }
                (
                    RoomKey::group(target),
                    SeatPolicy::Group {
                        capacity: group_capacity,
                    },
                )
            }
        };

        let display_name = request
            .display_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string);

        Ok(Self {
            requester,
            display_name,
            room,
            policy,
        })
    }
}

/// Runs join requests end to end.
///
/// Everything between reading the room and seating the requester happens
/// while holding the room's exclusion; identity upserts, room creation and
/// credential issuance happen outside it.
pub struct AdmissionEngine {
    directory: Arc<dyn IdentityDirectory>,
    rooms: Arc<dyn RoomBackend>,
    credentials: Arc<dyn CredentialIssuer>,
    exclusion: ExclusionQueue,
    reader: SnapshotReader,
    settings: AdmissionSettings,
}

impl AdmissionEngine {
    pub fn new(
        directory: Arc<dyn IdentityDirectory>,
        rooms: Arc<dyn RoomBackend>,
        credentials: Arc<dyn CredentialIssuer>,
        exclusion: ExclusionQueue,
        settings: AdmissionSettings,
    ) -> Self {
        Self {
            directory,
            rooms,
            credentials,
            exclusion,
            reader: SnapshotReader::new(settings.members_page_size),
            settings,
        }
    }

    pub fn settings(&self) -> &AdmissionSettings {
        &self.settings
    }

    pub fn exclusion(&self) -> &ExclusionQueue {
        &self.exclusion
    }

    pub async fn request_admission(
        &self,
        request: AdmissionRequest,
    ) -> Result<AdmissionOutcome, AdmissionError> {
        let plan = AdmissionPlan::from_request(&request, self.settings.group_capacity)?;
        debug!(
            requester = %plan.requester,
            room = %plan.room,
            capacity = plan.policy.capacity(),
            "admission validated"
        );

        self.ensure_room(&plan)
            .await
            .map_err(AdmissionError::collaborator(AdmissionStage::EnsuringRoom))?;

        debug!(
            room = %plan.room,
            stage = %AdmissionStage::AwaitingExclusiveSection,
            "waiting for room"
        );
        let decision = self
            .exclusion
            .run_exclusive(&plan.room.exclusion_key(), || self.decide_and_seat(&plan))
            .await
            .inspect_err(|err| {
                warn!(room = %plan.room, stage = %err.stage(), error = %err, "admission failed");
            })?;

        if let AdmissionDecision::Reject(reason) = decision {
            info!(requester = %plan.requester, room = %plan.room, %reason, "admission rejected");
            return Ok(AdmissionOutcome::Rejected(reason));
        }

        let credential = self
            .credentials
            .issue_credential(&plan.requester, self.settings.credential_ttl_seconds)
            .await
            .map_err(AdmissionError::collaborator(AdmissionStage::IssuingCredential))?;

        info!(requester = %plan.requester, room = %plan.room, "admission granted");
        Ok(AdmissionOutcome::Admitted(AdmissionGrant {
            credential,
            mode: plan.room.mode(),
            room_key: plan.room,
        }))
    }

    async fn ensure_room(&self, plan: &AdmissionPlan) -> anyhow::Result<()> {
        self.directory
            .upsert_identity(&plan.requester, plan.display_name.as_deref())
            .await?;
        if let SeatPolicy::Direct { peer } = &plan.policy {
            self.directory.upsert_identity(peer, None).await?;
        }
        self.rooms
            .ensure_room_exists(&plan.room, &plan.requester)
            .await
    }

    /// Scan, evaluate and reconcile as one uninterrupted step for the room.
    async fn decide_and_seat(
        &self,
        plan: &AdmissionPlan,
    ) -> Result<AdmissionDecision, AdmissionError> {
        let snapshot = self
            .reader
            .scan(self.rooms.as_ref(), &plan.room, plan.policy.capacity())
            .await
            .map_err(AdmissionError::collaborator(AdmissionStage::Scanning))?;

        let decision = evaluate(&snapshot, &plan.requester, &plan.policy);
        debug!(
            room = %plan.room,
            stage = %AdmissionStage::Evaluating,
            seated = snapshot.len(),
            truncated = snapshot.truncated,
            ?decision,
            "admission evaluated"
        );
        if decision != AdmissionDecision::Admit {
            return Ok(decision);
        }

        reconcile(self.rooms.as_ref(), &plan.room, &snapshot, &plan.requester)
            .await
            .map_err(AdmissionError::collaborator(AdmissionStage::Reconciling))?;
        Ok(decision)
    }
}

#[cfg(test)]
#[path = "tests/engine_tests.rs"]
mod tests;
