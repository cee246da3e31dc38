use std::collections::BTreeMap;

use async_trait::async_trait;
use shared::{
    domain::{CredentialToken, RoomMember},
    identity::{Identity, RoomKey},
};

mod jwt;
mod memory;

pub use jwt::{CredentialClaims, JwtCredentialIssuer};
pub use memory::InMemoryCallBackend;

/// Capability that lets a role join a call.
pub const JOIN_CALL: &str = "join-call";

/// Upper bound the backend accepts for a single members page.
pub const MAX_MEMBERS_PAGE_SIZE: usize = 100;

/// Longest lifetime a join credential may be issued with (30 days).
pub const MAX_CREDENTIAL_TTL_SECONDS: i64 = 30 * 24 * 60 * 60;

/// Role name to capability list, as stored on a call type.
pub type CallTypeGrants = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembersPage {
    pub members: Vec<RoomMember>,
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberMutation {
    Add(RoomMember),
    UpdateRole(RoomMember),
}

impl MemberMutation {
    pub fn member(&self) -> &RoomMember {
        match self {
            Self::Add(member) | Self::UpdateRole(member) => member,
        }
    }
}

#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    async fn upsert_identity(
        &self,
        identity: &Identity,
        display_name: Option<&str>,
    ) -> anyhow::Result<()>;
}

#[async_trait]
pub trait RoomBackend: Send + Sync {
    /// Creates the room unless it already exists. Calling it twice is harmless.
    async fn ensure_room_exists(&self, room: &RoomKey, creator: &Identity) -> anyhow::Result<()>;
    async fn fetch_members_page(
        &self,
        room: &RoomKey,
        page_size: usize,
        cursor: Option<&str>,
    ) -> anyhow::Result<MembersPage>;
    async fn mutate_member(&self, room: &RoomKey, mutation: MemberMutation) -> anyhow::Result<()>;
}

#[async_trait]
pub trait CredentialIssuer: Send + Sync {
    async fn issue_credential(
        &self,
        identity: &Identity,
        ttl_seconds: i64,
    ) -> anyhow::Result<CredentialToken>;
}

#[async_trait]
pub trait CallTypeAdmin: Send + Sync {
    async fn call_type_grants(&self, call_type: &str) -> anyhow::Result<Option<CallTypeGrants>>;
    async fn update_call_type_grants(
        &self,
        call_type: &str,
        grants: CallTypeGrants,
    ) -> anyhow::Result<()>;
}
