use std::{collections::HashMap, time::Duration};

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use shared::{
    domain::{Role, RoomMember},
    identity::{Identity, RoomKey},
};
use tokio::sync::Mutex;
use tracing::debug;

use crate::{
    CallTypeAdmin, CallTypeGrants, IdentityDirectory, MemberMutation, MembersPage, RoomBackend,
    JOIN_CALL, MAX_MEMBERS_PAGE_SIZE,
};

#[derive(Debug, Clone)]
struct StoredRoom {
    created_by: Identity,
    members: Vec<RoomMember>,
}

#[derive(Default)]
struct BackendState {
    identities: HashMap<Identity, Option<String>>,
    rooms: HashMap<RoomKey, StoredRoom>,
    call_types: HashMap<String, CallTypeGrants>,
    rooms_created: usize,
    mutations: Vec<(RoomKey, MemberMutation)>,
    fail_next_fetch: Option<String>,
    fail_next_mutation: Option<String>,
}

/// Process-local call backend.
///
/// Every operation yields to the scheduler (or sleeps for the configured
/// latency) before touching state, so concurrent callers interleave the way
/// they would against a remote service. Failures can be queued for the next
/// page fetch or member mutation.
#[derive(Default)]
pub struct InMemoryCallBackend {
    state: Mutex<BackendState>,
    latency: Option<Duration>,
}

impl InMemoryCallBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self {
            state: Mutex::new(BackendState::default()),
            latency: Some(latency),
        }
    }

    /// Seeds a call type whose bare `user` role may still join calls.
    pub async fn with_open_call_type(self, call_type: &str) -> Self {
        let grants = CallTypeGrants::from([
            (
                Role::User.as_str().to_string(),
                vec!["create-call".to_string(), JOIN_CALL.to_string(), "read-call".to_string()],
            ),
            (
                Role::CallMember.as_str().to_string(),
                vec!["read-call".to_string(), "send-audio".to_string()],
            ),
        ]);
        self.state
            .lock()
            .await
            .call_types
            .insert(call_type.to_string(), grants);
        self
    }

    async fn round_trip(&self) {
        match self.latency {
            Some(latency) => tokio::time::sleep(latency).await,
            None => tokio::task::yield_now().await,
        }
    }

    /// Seats `identity` without going through admission, creating the room if needed.
    pub async fn seat(&self, room: &RoomKey, identity: &Identity, role: Role) {
        let mut state = self.state.lock().await;
        let stored = state.rooms.entry(room.clone()).or_insert_with(|| StoredRoom {
            created_by: identity.clone(),
            members: Vec::new(),
        });
        match stored.members.iter_mut().find(|m| &m.identity == identity) {
            Some(existing) => existing.role = role,
            None => stored.members.push(RoomMember::new(identity.clone(), role)),
        }
    }

    pub async fn members(&self, room: &RoomKey) -> Vec<RoomMember> {
        self.state
            .lock()
            .await
            .rooms
            .get(room)
            .map(|stored| stored.members.clone())
            .unwrap_or_default()
    }

    pub async fn room_creator(&self, room: &RoomKey) -> Option<Identity> {
        self.state
            .lock()
            .await
            .rooms
            .get(room)
            .map(|stored| stored.created_by.clone())
    }

    pub async fn rooms_created(&self) -> usize {
        self.state.lock().await.rooms_created
    }

    pub async fn mutations(&self) -> Vec<(RoomKey, MemberMutation)> {
        self.state.lock().await.mutations.clone()
    }

    pub async fn display_name(&self, identity: &Identity) -> Option<String> {
        self.state
            .lock()
            .await
            .identities
            .get(identity)
            .cloned()
            .flatten()
    }

    pub async fn has_identity(&self, identity: &Identity) -> bool {
        self.state.lock().await.identities.contains_key(identity)
    }

    pub async fn fail_next_fetch(&self, message: impl Into<String>) {
        self.state.lock().await.fail_next_fetch = Some(message.into());
    }

    pub async fn fail_next_mutation(&self, message: impl Into<String>) {
        self.state.lock().await.fail_next_mutation = Some(message.into());
    }
}

#[async_trait]
impl IdentityDirectory for InMemoryCallBackend {
    async fn upsert_identity(&self, identity: &Identity, display_name: Option<&str>) -> Result<()> {
        self.round_trip().await;
        let mut state = self.state.lock().await;
        let entry = state.identities.entry(identity.clone()).or_default();
        if let Some(name) = display_name {
            *entry = Some(name.to_string());
        }
        Ok(())
    }
}

#[async_trait]
impl RoomBackend for InMemoryCallBackend {
    async fn ensure_room_exists(&self, room: &RoomKey, creator: &Identity) -> Result<()> {
        self.round_trip().await;
        let mut state = self.state.lock().await;
        if state.rooms.contains_key(room) {
            return Ok(());
        }
        state.rooms.insert(
            room.clone(),
            StoredRoom {
                created_by: creator.clone(),
                members: Vec::new(),
            },
        );
        state.rooms_created += 1;
        debug!(room = %room, creator = %creator, "room created");
        Ok(())
    }

    async fn fetch_members_page(
        &self,
        room: &RoomKey,
        page_size: usize,
        cursor: Option<&str>,
    ) -> Result<MembersPage> {
        self.round_trip().await;
        let mut state = self.state.lock().await;
        if let Some(message) = state.fail_next_fetch.take() {
            bail!("{message}");
        }

        let offset = match cursor {
            Some(raw) => raw
                .parse::<usize>()
                .with_context(|| format!("invalid members cursor '{raw}'"))?,
            None => 0,
        };
        let stored = state
            .rooms
            .get(room)
            .ok_or_else(|| anyhow!("room {room} not found"))?;

        let page_size = page_size.clamp(1, MAX_MEMBERS_PAGE_SIZE);
        let end = offset.saturating_add(page_size).min(stored.members.len());
        let members = stored
            .members
            .get(offset..end)
            .map(<[RoomMember]>::to_vec)
            .unwrap_or_default();
        let next_cursor = (end < stored.members.len()).then(|| end.to_string());

        Ok(MembersPage {
            members,
            next_cursor,
        })
    }

    async fn mutate_member(&self, room: &RoomKey, mutation: MemberMutation) -> Result<()> {
        self.round_trip().await;
        let mut state = self.state.lock().await;
        if let Some(message) = state.fail_next_mutation.take() {
            bail!("{message}");
        }

        let stored = state
            .rooms
            .get_mut(room)
            .ok_or_else(|| anyhow!("room {room} not found"))?;
        let member = mutation.member().clone();
        match stored
            .members
            .iter_mut()
            .find(|m| m.identity == member.identity)
        {
            Some(existing) => existing.role = member.role,
            None => stored.members.push(member),
        }
        state.mutations.push((room.clone(), mutation));
        Ok(())
    }
}

#[async_trait]
impl CallTypeAdmin for InMemoryCallBackend {
    async fn call_type_grants(&self, call_type: &str) -> Result<Option<CallTypeGrants>> {
        self.round_trip().await;
        Ok(self.state.lock().await.call_types.get(call_type).cloned())
    }

    async fn update_call_type_grants(&self, call_type: &str, grants: CallTypeGrants) -> Result<()> {
        self.round_trip().await;
        let mut state = self.state.lock().await;
        let Some(existing) = state.call_types.get_mut(call_type) else {
            bail!("call type not found: {call_type}");
        };
        *existing = grants;
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/memory_tests.rs"]
mod tests;
