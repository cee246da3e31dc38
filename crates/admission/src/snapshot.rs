use std::{collections::HashSet, pin::pin};

use anyhow::Context;
use call_backend::{MembersPage, RoomBackend, MAX_MEMBERS_PAGE_SIZE};
use futures::{stream, Stream, TryStreamExt};
use shared::{
    domain::{Role, RoomMember},
    identity::{Identity, RoomKey},
};
use tracing::debug;

/// Room membership as observed by one bounded scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipSnapshot {
    pub members: Vec<RoomMember>,
    /// The scan stopped at the capacity threshold while the backend still had
    /// more pages to offer.
    pub truncated: bool,
}

impl MembershipSnapshot {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, identity: &Identity) -> bool {
        self.role_of(identity).is_some()
    }

    pub fn role_of(&self, identity: &Identity) -> Option<Role> {
        self.members
            .iter()
            .find(|m| &m.identity == identity)
            .map(|m| m.role)
    }

    pub fn identities(&self) -> impl Iterator<Item = &Identity> {
        self.members.iter().map(|m| &m.identity)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SnapshotReader {
    page_size: usize,
}

impl Default for SnapshotReader {
    fn default() -> Self {
        Self {
            page_size: MAX_MEMBERS_PAGE_SIZE,
        }
    }
}

impl SnapshotReader {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.clamp(1, MAX_MEMBERS_PAGE_SIZE),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Reads pages until the backend runs out of cursor or at least
    /// `capacity_hint` distinct members have been seen.
    ///
    /// The threshold is checked after a page has been folded in, so every
    /// member of the page that crosses it is part of the snapshot.
    pub async fn scan(
        &self,
        backend: &dyn RoomBackend,
        room: &RoomKey,
        capacity_hint: usize,
    ) -> anyhow::Result<MembershipSnapshot> {
        let mut pages = pin!(member_pages(backend, room, self.page_size));
        let mut seen = HashSet::new();
        let mut members = Vec::new();
        let mut fetched = 0usize;

        while let Some(page) = pages.try_next().await? {
            fetched += 1;
            let exhausted = page.next_cursor.is_none();
            for member in page.members {
                if seen.insert(member.identity.clone()) {
                    members.push(member);
                }
            }

            if members.len() >= capacity_hint {
                debug!(
                    room = %room,
                    pages = fetched,
                    seen = members.len(),
                    exhausted,
                    "scan reached capacity threshold"
                );
                return Ok(MembershipSnapshot {
                    members,
                    truncated: !exhausted,
                });
            }
        }

        debug!(
            room = %room,
            pages = fetched,
            seen = members.len(),
            "scan exhausted members"
        );
        Ok(MembershipSnapshot {
            members,
            truncated: false,
        })
    }
}

/// Lazily fetches pages in cursor order. Ends after the page without a cursor.
fn member_pages<'a>(
    backend: &'a dyn RoomBackend,
    room: &'a RoomKey,
    page_size: usize,
) -> impl Stream<Item = anyhow::Result<MembersPage>> + 'a {
    // `None` once the last page has been yielded; `Some(cursor)` otherwise.
    stream::try_unfold(Some(None::<String>), move |cursor| async move {
        let Some(cursor) = cursor else {
            return Ok::<_, anyhow::Error>(None);
        };
        let page = backend
            .fetch_members_page(room, page_size, cursor.as_deref())
            .await
            .with_context(|| format!("failed to fetch members of {room}"))?;
        let next = page.next_cursor.clone().map(Some);
        Ok(Some((page, next)))
    })
}

#[cfg(test)]
#[path = "tests/snapshot_tests.rs"]
mod tests;
