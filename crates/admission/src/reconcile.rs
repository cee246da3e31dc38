use anyhow::Context;
use call_backend::{MemberMutation, RoomBackend};
use shared::{
    domain::{Role, RoomMember},
    identity::{Identity, RoomKey},
};
use tracing::debug;

use crate::snapshot::MembershipSnapshot;

/// Role every admitted identity ends up with.
pub const ADMITTED_ROLE: Role = Role::CallMember;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    Added,
    RoleUpdated { previous: Role },
    AlreadyMember,
}

/// Seats an admitted requester with the member role.
///
/// Must run in the same exclusive section that produced `snapshot`.
pub async fn reconcile(
    backend: &dyn RoomBackend,
    room: &RoomKey,
    snapshot: &MembershipSnapshot,
    requester: &Identity,
) -> anyhow::Result<Reconciliation> {
    let seat = RoomMember::new(requester.clone(), ADMITTED_ROLE);
    let (mutation, outcome) = match snapshot.role_of(requester) {
        None => (MemberMutation::Add(seat), Reconciliation::Added),
        Some(role) if role == ADMITTED_ROLE => return Ok(Reconciliation::AlreadyMember),
        Some(previous) => (
            MemberMutation::UpdateRole(seat),
            Reconciliation::RoleUpdated { previous },
        ),
    };

    backend
        .mutate_member(room, mutation)
        .await
        .with_context(|| format!("failed to seat {requester} in {room}"))?;
    debug!(room = %room, requester = %requester, ?outcome, "membership reconciled");
    Ok(outcome)
}

#[cfg(test)]
#[path = "tests/reconcile_tests.rs"]
mod tests;
