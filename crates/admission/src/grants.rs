//! Keeps the join capability reserved for the member role on a call type.

use std::collections::BTreeSet;

use anyhow::anyhow;
use call_backend::{CallTypeAdmin, CallTypeGrants, JOIN_CALL};
use shared::domain::Role;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantLockOutcome {
    AlreadyLocked,
    Updated,
}

/// Drops `join-call` from the bare user role and gives it to call members.
/// Grants of every other role are carried over untouched.
pub fn restrict_join_to_members(grants: &CallTypeGrants) -> CallTypeGrants {
    let mut locked = grants.clone();

    locked
        .entry(Role::User.as_str().to_string())
        .or_default()
        .retain(|grant| grant != JOIN_CALL);

    let member = locked
        .entry(Role::CallMember.as_str().to_string())
        .or_default();
    let mut seen = BTreeSet::new();
    member.retain(|grant| seen.insert(grant.clone()));
    if !seen.contains(JOIN_CALL) {
        member.push(JOIN_CALL.to_string());
    }

    locked
}

fn role_set<'a>(grants: &'a CallTypeGrants, role: Role) -> BTreeSet<&'a str> {
    grants
        .get(role.as_str())
        .map(|list| list.iter().map(String::as_str).collect())
        .unwrap_or_default()
}

fn same_role_grants(a: &CallTypeGrants, b: &CallTypeGrants) -> bool {
    [Role::User, Role::CallMember]
        .into_iter()
        .all(|role| role_set(a, role) == role_set(b, role))
}

pub async fn lock_join_to_members(
    admin: &dyn CallTypeAdmin,
    call_type: &str,
) -> anyhow::Result<GrantLockOutcome> {
    let grants = admin
        .call_type_grants(call_type)
        .await?
        .ok_or_else(|| anyhow!("call type not found: {call_type}"))?;

    let locked = restrict_join_to_members(&grants);
    if same_role_grants(&grants, &locked) {
        info!(%call_type, "join grants already restricted to call members");
        return Ok(GrantLockOutcome::AlreadyLocked);
    }

    admin.update_call_type_grants(call_type, locked).await?;
    info!(%call_type, "restricted {JOIN_CALL} to call members");
    Ok(GrantLockOutcome::Updated)
}

#[cfg(test)]
#[path = "tests/grants_tests.rs"]
mod tests;
