use super::*;
use async_trait::async_trait;
use call_backend::{InMemoryCallBackend, MemberMutation};
use std::sync::Mutex;

fn id(raw: &str) -> Identity {
    Identity::normalize(raw)
}

fn member(raw: &str) -> RoomMember {
    RoomMember::new(id(raw), Role::CallMember)
}

/// Serves fixed pages and records the cursors it was asked for.
struct ScriptedPages {
    pages: Vec<MembersPage>,
    requested: Mutex<Vec<Option<String>>>,
}

impl ScriptedPages {
    fn new(pages: Vec<Vec<&str>>) -> Self {
        let count = pages.len();
        let pages = pages
            .into_iter()
            .enumerate()
            .map(|(index, names)| MembersPage {
                members: names.into_iter().map(member).collect(),
                next_cursor: (index + 1 < count).then(|| (index + 1).to_string()),
            })
            .collect();
        Self {
            pages,
            requested: Mutex::new(Vec::new()),
        }
    }

    fn fetches(&self) -> usize {
        self.requested.lock().expect("requested").len()
    }
}

#[async_trait]
impl RoomBackend for ScriptedPages {
    async fn ensure_room_exists(&self, _room: &RoomKey, _creator: &Identity) -> anyhow::Result<()> {
        Ok(())
    }

    async fn fetch_members_page(
        &self,
        _room: &RoomKey,
        _page_size: usize,
        cursor: Option<&str>,
    ) -> anyhow::Result<MembersPage> {
        self.requested
            .lock()
            .expect("requested")
            .push(cursor.map(str::to_string));
        let index = cursor.map_or(Ok(0), str::parse::<usize>)?;
        self.pages
            .get(index)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no page {index}"))
    }

    async fn mutate_member(
        &self,
        _room: &RoomKey,
        _mutation: MemberMutation,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn reads_every_page_when_below_threshold() {
    let backend = ScriptedPages::new(vec![vec!["a", "b"], vec!["c"], vec![]]);
    let snapshot = SnapshotReader::new(2)
        .scan(&backend, &RoomKey::group("r"), 10)
        .await
        .expect("scan");

    assert_eq!(backend.fetches(), 3);
    assert_eq!(snapshot.len(), 3);
    assert!(!snapshot.truncated);
    assert_eq!(
        *backend.requested.lock().expect("requested"),
        vec![None, Some("1".to_string()), Some("2".to_string())]
    );
}

#[tokio::test]
async fn stops_once_threshold_is_reached_and_marks_truncated() {
    let backend = ScriptedPages::new(vec![vec!["a"], vec!["b", "c"], vec!["d"]]);
    let snapshot = SnapshotReader::new(2)
        .scan(&backend, &RoomKey::group("r"), 2)
        .await
        .expect("scan");

    assert_eq!(backend.fetches(), 2);
    assert!(snapshot.truncated);
    // the crossing page is kept whole
    assert_eq!(snapshot.len(), 3);
    assert!(snapshot.contains(&id("c")));
}

#[tokio::test]
async fn threshold_on_last_page_is_not_truncation() {
    let backend = ScriptedPages::new(vec![vec!["a"], vec!["b"]]);
    let snapshot = SnapshotReader::new(1)
        .scan(&backend, &RoomKey::group("r"), 2)
        .await
        .expect("scan");

    assert_eq!(snapshot.len(), 2);
    assert!(!snapshot.truncated);
}

#[tokio::test]
async fn duplicate_members_across_pages_count_once() {
    let backend = ScriptedPages::new(vec![vec!["a", "b"], vec!["b", "a"], vec!["c"]]);
    let snapshot = SnapshotReader::new(2)
        .scan(&backend, &RoomKey::group("r"), 3)
        .await
        .expect("scan");

    assert_eq!(backend.fetches(), 3);
    assert_eq!(
        snapshot.identities().cloned().collect::<Vec<_>>(),
        vec![id("a"), id("b"), id("c")]
    );
}

#[tokio::test]
async fn zero_threshold_still_reads_first_page() {
    let backend = ScriptedPages::new(vec![vec!["a"], vec!["b"]]);
    let snapshot = SnapshotReader::new(1)
        .scan(&backend, &RoomKey::group("r"), 0)
        .await
        .expect("scan");

    assert_eq!(backend.fetches(), 1);
    assert!(snapshot.contains(&id("a")));
    assert!(snapshot.truncated);
}

#[tokio::test]
async fn fetch_failure_surfaces_with_room_context() {
    let backend = InMemoryCallBackend::new();
    let room = RoomKey::group("team");
    backend.seat(&room, &id("g1"), Role::User).await;
    backend.fail_next_fetch("upstream timeout").await;

    let err = SnapshotReader::default()
        .scan(&backend, &room, 4)
        .await
        .expect_err("injected failure");
    let chain = format!("{err:#}");
    assert!(chain.contains("group:team"), "{chain}");
    assert!(chain.contains("upstream timeout"), "{chain}");
}

#[tokio::test]
async fn reports_roles_from_backend() {
    let backend = InMemoryCallBackend::new();
    let room = RoomKey::group("team");
    backend.seat(&room, &id("g1"), Role::User).await;
    backend.seat(&room, &id("g2"), Role::CallMember).await;

    let snapshot = SnapshotReader::default()
        .scan(&backend, &room, 10)
        .await
        .expect("scan");
    assert_eq!(snapshot.role_of(&id("g1")), Some(Role::User));
    assert_eq!(snapshot.role_of(&id("g2")), Some(Role::CallMember));
    assert_eq!(snapshot.role_of(&id("g3")), None);
}

#[test]
fn page_size_is_clamped_to_backend_limit() {
    assert_eq!(SnapshotReader::new(0).page_size(), 1);
    assert_eq!(SnapshotReader::new(500).page_size(), MAX_MEMBERS_PAGE_SIZE);
    assert_eq!(SnapshotReader::default().page_size(), MAX_MEMBERS_PAGE_SIZE);
}
