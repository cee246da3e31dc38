use super::*;
use call_backend::InMemoryCallBackend;

fn grants(entries: &[(&str, Vec<&str>)]) -> CallTypeGrants {
    entries
        .iter()
        .map(|(role, list)| {
            (
                role.to_string(),
                list.iter().map(|g| g.to_string()).collect(),
            )
        })
        .collect()
}

#[test]
fn moves_join_from_user_to_call_member() {
    let before = grants(&[
        ("user", vec!["read-call", "join-call"]),
        ("call_member", vec!["send-audio"]),
        ("admin", vec!["join-call", "end-call"]),
    ]);
    let after = restrict_join_to_members(&before);

    assert_eq!(after["user"], vec!["read-call".to_string()]);
    assert_eq!(
        after["call_member"],
        vec!["send-audio".to_string(), "join-call".to_string()]
    );
    assert_eq!(after["admin"], before["admin"]);
}

#[test]
fn missing_roles_are_created() {
    let after = restrict_join_to_members(&CallTypeGrants::new());
    assert!(after["user"].is_empty());
    assert_eq!(after["call_member"], vec![JOIN_CALL.to_string()]);
}

#[test]
fn member_grants_are_deduplicated() {
    let before = grants(&[("call_member", vec!["join-call", "read-call", "join-call"])]);
    let after = restrict_join_to_members(&before);
    assert_eq!(
        after["call_member"],
        vec!["join-call".to_string(), "read-call".to_string()]
    );
}

#[tokio::test]
async fn open_call_type_is_locked_once() {
    let backend = InMemoryCallBackend::new().with_open_call_type("default").await;

    let first = lock_join_to_members(&backend, "default")
        .await
        .expect("lock");
    assert_eq!(first, GrantLockOutcome::Updated);

    let stored = backend
        .call_type_grants("default")
        .await
        .expect("grants")
        .expect("call type");
    assert!(!stored["user"].iter().any(|g| g == JOIN_CALL));
    assert!(stored["call_member"].iter().any(|g| g == JOIN_CALL));

    let second = lock_join_to_members(&backend, "default")
        .await
        .expect("lock again");
    assert_eq!(second, GrantLockOutcome::AlreadyLocked);
}

#[tokio::test]
async fn unknown_call_type_is_an_error() {
    let backend = InMemoryCallBackend::new();
    let err = lock_join_to_members(&backend, "livestream")
        .await
        .expect_err("missing call type");
    assert!(err.to_string().contains("call type not found"));
}
