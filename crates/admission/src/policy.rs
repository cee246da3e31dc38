use shared::{
    domain::{RejectReason, RoomMode},
    identity::Identity,
};

use crate::snapshot::MembershipSnapshot;

/// Seats in a direct room.
pub const DIRECT_CAPACITY: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeatPolicy {
    /// Exactly the requester and the declared peer may sit in the room.
    Direct { peer: Identity },
    Group { capacity: usize },
}

impl SeatPolicy {
    pub fn mode(&self) -> RoomMode {
        match self {
            Self::Direct { .. } => RoomMode::Direct,
            Self::Group { .. } => RoomMode::Group,
        }
    }

    pub fn capacity(&self) -> usize {
        match self {
            Self::Direct { .. } => DIRECT_CAPACITY,
            Self::Group { capacity } => *capacity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionDecision {
    Admit,
    Reject(RejectReason),
}

/// Decides whether `requester` may take a seat given what the room holds now.
///
/// A requester who is already seated is always admitted; re-joining never
/// consumes a seat.
pub fn evaluate(
    snapshot: &MembershipSnapshot,
    requester: &Identity,
    policy: &SeatPolicy,
) -> AdmissionDecision {
    let already_seated = snapshot.contains(requester);

    match policy {
        SeatPolicy::Direct { peer } => {
            let stranger = snapshot
                .identities()
                .any(|identity| identity != requester && identity != peer);
            if stranger {
                return AdmissionDecision::Reject(RejectReason::IdentityMismatch);
            }
            if snapshot.len() >= DIRECT_CAPACITY && !already_seated {
                return AdmissionDecision::Reject(RejectReason::RoomFull);
            }
            AdmissionDecision::Admit
        }
        SeatPolicy::Group { capacity } => {
            if snapshot.len() >= *capacity && !already_seated {
                return AdmissionDecision::Reject(RejectReason::RoomFull);
            }
            AdmissionDecision::Admit
        }
    }
}

#[cfg(test)]
#[path = "tests/policy_tests.rs"]
mod tests;
