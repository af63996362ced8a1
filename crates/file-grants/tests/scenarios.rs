//! End-to-end grant scenarios.
//!
//! Each test drives the engine the way a browser would: the user picks a
//! file, the site reads and writes through its key, and the outside world
//! edits, renames, moves or deletes the file in between.

use std::sync::Arc;

use file_grants::core::{AccessMode, DenyReason, DirtyPolicy, GrantState};
use file_grants::store::GrantStore;
use file_grants::{FileGrants, GrantsConfig, GrantsError};
use file_grants_testkit::{origin, MemoryFileSystem, TestGrants};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

#[tokio::test]
async fn force_write_over_external_change() {
    init_tracing();
    let t = TestGrants::new();
    let site = origin("editor.example");
    let key = t
        .grant_file(&site, "/docs/a.txt", b"v1", AccessMode::ReadWrite)
        .await;

    // Someone else edits the file.
    t.fs.write("/docs/a.txt", b"v2 from elsewhere").unwrap();

    let denied = t.grants.validate_write(&site, &key, false).await.unwrap();
    assert_eq!(denied.deny_reason(), Some(DenyReason::FileChanged));

    let ticket = t
        .grants
        .validate_write(&site, &key, true)
        .await
        .unwrap()
        .into_ticket()
        .unwrap();
    t.fs.write(ticket.path(), b"v3 from the site").unwrap();
    assert!(t.grants.finish_write(ticket).await.unwrap());

    let read = t.grants.validate_read(&site, &key, false).await.unwrap();
    assert!(read.is_allowed());
}

#[tokio::test]
async fn dirty_read_round_trip() {
    let t = TestGrants::new();
    let site = origin("viewer.example");
    let key = t
        .grant_file(&site, "/docs/a.txt", b"v1", AccessMode::ReadOnly)
        .await;

    t.fs.write("/docs/a.txt", b"v2").unwrap();

    for _ in 0..2 {
        let stale = t.grants.validate_read(&site, &key, false).await.unwrap();
        assert_eq!(stale.deny_reason(), Some(DenyReason::StaleRead));
    }

    let accepted = t.grants.validate_read(&site, &key, true).await.unwrap();
    assert_eq!(
        accepted.into_ticket().unwrap().signature(),
        t.fs.signature_of("/docs/a.txt").unwrap()
    );

    let fresh = t.grants.validate_read(&site, &key, false).await.unwrap();
    assert!(fresh.is_allowed());
}

#[tokio::test]
async fn rename_in_place_keeps_grant() {
    let t = TestGrants::new();
    let site = origin("editor.example");
    let key = t
        .grant_file(&site, "/docs/draft.md", b"text", AccessMode::ReadWrite)
        .await;

    t.fs.rename("/docs/draft.md", "/docs/final.md").unwrap();

    let ticket = t
        .grants
        .validate_read(&site, &key, false)
        .await
        .unwrap()
        .into_ticket()
        .unwrap();
    assert_eq!(ticket.path(), std::path::PathBuf::from("/docs/final.md"));

    let listed = t.grants.list_grants(&site).collect_all().await.unwrap();
    assert_eq!(listed[0].display_name, "final.md");
    assert_eq!(listed[0].state, GrantState::Active);
}

#[tokio::test]
async fn move_invalidates_idempotently() {
    let t = TestGrants::new();
    let site = origin("editor.example");
    let key = t
        .grant_file(&site, "/docs/a.txt", b"text", AccessMode::ReadWrite)
        .await;

    t.fs.rename("/docs/a.txt", "/archive/a.txt").unwrap();

    for _ in 0..3 {
        let read = t.grants.validate_read(&site, &key, true).await.unwrap();
        assert_eq!(read.deny_reason(), Some(DenyReason::FileNotFound));
    }

    // Moving it back does not resurrect the grant.
    t.fs.rename("/archive/a.txt", "/docs/a.txt").unwrap();
    let read = t.grants.validate_read(&site, &key, true).await.unwrap();
    assert_eq!(read.deny_reason(), Some(DenyReason::FileNotFound));

    let listed = t.grants.list_grants(&site).collect_all().await.unwrap();
    assert_eq!(listed[0].state, GrantState::Invalid);
}

#[tokio::test]
async fn deleted_file_is_not_found() {
    let t = TestGrants::new();
    let site = origin("editor.example");
    let key = t
        .grant_file(&site, "/docs/a.txt", b"text", AccessMode::ReadWrite)
        .await;

    t.fs.remove("/docs/a.txt").unwrap();
    let write = t.grants.validate_write(&site, &key, true).await.unwrap();
    assert_eq!(write.deny_reason(), Some(DenyReason::FileNotFound));

    // A new file at the same path is a different identity.
    t.fs.create("/docs/a.txt", b"new");
    let write = t.grants.validate_write(&site, &key, true).await.unwrap();
    assert_eq!(write.deny_reason(), Some(DenyReason::FileNotFound));
}

#[tokio::test]
async fn origins_are_isolated() {
    let t = TestGrants::new();
    let owner = origin("owner.example");
    let intruder = origin("intruder.example");
    let key = t
        .grant_file(&owner, "/docs/a.txt", b"secret", AccessMode::ReadWrite)
        .await;

    let read = t.grants.validate_read(&intruder, &key, true).await.unwrap();
    assert_eq!(read.deny_reason(), Some(DenyReason::NoSuchGrant));
    assert!(!t.grants.revoke(&intruder, &key).await.unwrap());
    assert!(!t.grants.confirm_revocation(&intruder, &key).await.unwrap());
    assert_eq!(t.grants.purge(&intruder).await.unwrap(), 0);
    assert!(t.grants.list_grants(&intruder).collect_all().await.unwrap().is_empty());

    let read = t.grants.validate_read(&owner, &key, false).await.unwrap();
    assert!(read.is_allowed());
}

#[tokio::test]
async fn revocation_is_final() {
    let t = TestGrants::new();
    let site = origin("editor.example");
    let key = t
        .grant_file(&site, "/docs/a.txt", b"text", AccessMode::ReadWrite)
        .await;

    assert!(t.grants.revoke(&site, &key).await.unwrap());

    for force in [false, true] {
        let read = t.grants.validate_read(&site, &key, force).await.unwrap();
        let write = t.grants.validate_write(&site, &key, force).await.unwrap();
        assert_eq!(read.deny_reason(), Some(DenyReason::Revoked));
        assert_eq!(write.deny_reason(), Some(DenyReason::Revoked));
    }

    // Confirming drops the record; the key is never handed out again.
    assert!(t.grants.confirm_revocation(&site, &key).await.unwrap());
    let read = t.grants.validate_read(&site, &key, false).await.unwrap();
    assert_eq!(read.deny_reason(), Some(DenyReason::NoSuchGrant));
    assert!(t.grants.store().is_retired(&key).await.unwrap());
}

#[tokio::test]
async fn purge_clears_one_origin() {
    let t = TestGrants::new();
    let a = origin("a.example");
    let b = origin("b.example");
    let a1 = t.grant_file(&a, "/docs/1.txt", b"1", AccessMode::ReadOnly).await;
    t.grant_file(&a, "/docs/2.txt", b"2", AccessMode::ReadWrite).await;
    let b1 = t.grant_file(&b, "/docs/3.txt", b"3", AccessMode::ReadOnly).await;

    assert_eq!(t.grants.purge(&a).await.unwrap(), 2);

    let read = t.grants.validate_read(&a, &a1, false).await.unwrap();
    assert_eq!(read.deny_reason(), Some(DenyReason::NoSuchGrant));
    let read = t.grants.validate_read(&b, &b1, false).await.unwrap();
    assert!(read.is_allowed());
}

#[tokio::test]
async fn garbage_collection_respects_retention() {
    let config = GrantsConfig {
        revoked_retention_ms: 0,
        ..GrantsConfig::default()
    };
    let t = TestGrants::with_config(config);
    let site = origin("editor.example");
    let revoked = t.grant_file(&site, "/docs/1.txt", b"1", AccessMode::ReadOnly).await;
    let live = t.grant_file(&site, "/docs/2.txt", b"2", AccessMode::ReadOnly).await;

    t.grants.revoke(&site, &revoked).await.unwrap();
    assert_eq!(t.grants.collect_garbage().await.unwrap(), 1);

    let listed = t.grants.list_grants(&site).collect_all().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].key, live);
}

#[tokio::test]
async fn default_retention_keeps_recent_revocations() {
    let t = TestGrants::new();
    let site = origin("editor.example");
    let key = t.grant_file(&site, "/docs/1.txt", b"1", AccessMode::ReadOnly).await;

    t.grants.revoke(&site, &key).await.unwrap();
    assert_eq!(t.grants.collect_garbage().await.unwrap(), 0);

    let read = t.grants.validate_read(&site, &key, false).await.unwrap();
    assert_eq!(read.deny_reason(), Some(DenyReason::Revoked));
}

#[tokio::test]
async fn never_dirty_still_guards_writes() {
    let t = TestGrants::with_config(
        GrantsConfig::default().with_dirty_policy(DirtyPolicy::NeverDirty),
    );
    let site = origin("editor.example");
    let key = t
        .grant_file(&site, "/docs/a.txt", b"v1", AccessMode::ReadWrite)
        .await;

    t.fs.write("/docs/a.txt", b"v2").unwrap();
    assert!(t.grants.validate_read(&site, &key, false).await.unwrap().is_allowed());

    t.fs.write("/docs/a.txt", b"v3").unwrap();
    let write = t.grants.validate_write(&site, &key, false).await.unwrap();
    assert_eq!(write.deny_reason(), Some(DenyReason::FileChanged));
    assert!(t.grants.validate_write(&site, &key, true).await.unwrap().is_allowed());
}

#[tokio::test]
async fn always_dirty_requires_acceptance_after_first_access() {
    let t = TestGrants::with_config(
        GrantsConfig::default().with_dirty_policy(DirtyPolicy::AlwaysDirty),
    );
    let site = origin("viewer.example");
    let key = t
        .grant_file(&site, "/docs/a.txt", b"v1", AccessMode::ReadOnly)
        .await;

    assert!(t.grants.validate_read(&site, &key, false).await.unwrap().is_allowed());
    let second = t.grants.validate_read(&site, &key, false).await.unwrap();
    assert_eq!(second.deny_reason(), Some(DenyReason::StaleRead));
    assert!(t.grants.validate_read(&site, &key, true).await.unwrap().is_allowed());
}

#[tokio::test]
async fn content_hashing_signatures_flag_edits() {
    let config = GrantsConfig {
        hash_contents: true,
        ..GrantsConfig::default()
    };
    let t = TestGrants::with_config(config);
    let site = origin("editor.example");
    let key = t
        .grant_file(&site, "/docs/a.txt", b"aaaa", AccessMode::ReadOnly)
        .await;

    let before = t.fs.signature_of("/docs/a.txt").unwrap();
    assert!(before.digest.is_some());

    t.fs.write("/docs/a.txt", b"bbbb").unwrap();
    let read = t.grants.validate_read(&site, &key, false).await.unwrap();
    assert_eq!(read.deny_reason(), Some(DenyReason::StaleRead));
}

#[tokio::test]
async fn listing_is_restartable() {
    let config = GrantsConfig {
        list_page_size: 2,
        ..GrantsConfig::default()
    };
    let t = TestGrants::with_config(config);
    let site = origin("editor.example");
    for i in 0..5 {
        t.grant_file(&site, format!("/docs/{}.txt", i), b"x", AccessMode::ReadOnly)
            .await;
    }

    let mut listing = t.grants.list_grants(&site);
    let first = listing.next().await.unwrap().unwrap();
    listing.restart();
    let all = listing.collect_all().await.unwrap();

    assert_eq!(all.len(), 5);
    assert_eq!(all[0].key, first.key);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_revoke_and_validate() {
    init_tracing();
    let t = Arc::new(TestGrants::new());
    let site = origin("editor.example");
    let key = t
        .grant_file(&site, "/docs/a.txt", b"text", AccessMode::ReadWrite)
        .await;

    let mut racing = Vec::new();
    for i in 0..32 {
        let t = Arc::clone(&t);
        let site = site.clone();
        racing.push(tokio::spawn(async move {
            if i % 2 == 0 {
                t.grants.validate_read(&site, &key, true).await
            } else {
                t.grants.validate_write(&site, &key, true).await
            }
        }));
    }

    assert!(t.grants.revoke(&site, &key).await.unwrap());

    for task in racing {
        let decision = task.await.unwrap().unwrap();
        if let Some(reason) = decision.deny_reason() {
            assert_eq!(reason, DenyReason::Revoked);
        }
    }

    // Once the revocation has committed, nothing gets through.
    let mut after = Vec::new();
    for _ in 0..16 {
        let t = Arc::clone(&t);
        let site = site.clone();
        after.push(tokio::spawn(async move {
            t.grants.validate_read(&site, &key, true).await
        }));
    }
    for task in after {
        let decision = task.await.unwrap().unwrap();
        assert_eq!(decision.deny_reason(), Some(DenyReason::Revoked));
    }
}

#[tokio::test]
async fn grants_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("grants.db");
    let fs = Arc::new(MemoryFileSystem::new());
    let site = origin("editor.example");

    fs.create("/docs/kept.txt", b"kept");
    fs.create("/docs/revoked.txt", b"revoked");
    fs.create("/docs/confirmed.txt", b"confirmed");

    let (kept, revoked, confirmed) = {
        let grants = FileGrants::open(&db, Arc::clone(&fs), GrantsConfig::default()).unwrap();
        let kept = grants
            .create_grant(&site, "/docs/kept.txt", AccessMode::ReadWrite)
            .await
            .unwrap();
        let revoked = grants
            .create_grant(&site, "/docs/revoked.txt", AccessMode::ReadOnly)
            .await
            .unwrap();
        let confirmed = grants
            .create_grant(&site, "/docs/confirmed.txt", AccessMode::ReadOnly)
            .await
            .unwrap();

        grants.revoke(&site, &revoked).await.unwrap();
        grants.revoke(&site, &confirmed).await.unwrap();
        grants.confirm_revocation(&site, &confirmed).await.unwrap();
        grants.close().await.unwrap();
        (kept, revoked, confirmed)
    };

    let grants = FileGrants::open(&db, Arc::clone(&fs), GrantsConfig::default()).unwrap();

    assert!(grants.validate_write(&site, &kept, false).await.unwrap().is_allowed());
    let read = grants.validate_read(&site, &revoked, false).await.unwrap();
    assert_eq!(read.deny_reason(), Some(DenyReason::Revoked));
    let read = grants.validate_read(&site, &confirmed, false).await.unwrap();
    assert_eq!(read.deny_reason(), Some(DenyReason::NoSuchGrant));

    assert!(grants.store().is_retired(&confirmed).await.unwrap());
    assert_eq!(grants.store().count().await.unwrap(), 2);
    grants.close().await.unwrap();
}

#[cfg(unix)]
#[tokio::test]
async fn local_file_system_end_to_end() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("notes.md");
    std::fs::write(&file, b"# notes").unwrap();

    let config = GrantsConfig {
        hash_contents: true,
        ..GrantsConfig::default()
    };
    let grants = FileGrants::open_local(dir.path().join("grants.db"), config).unwrap();
    let site = origin("notes.example");

    let key = grants
        .create_grant(&site, &file, AccessMode::ReadWrite)
        .await
        .unwrap();

    let ticket = grants
        .validate_write(&site, &key, false)
        .await
        .unwrap()
        .into_ticket()
        .unwrap();
    std::fs::write(ticket.path(), b"# notes\n\nmore").unwrap();
    assert!(grants.finish_write(ticket).await.unwrap());
    assert!(grants.validate_read(&site, &key, false).await.unwrap().is_allowed());

    std::fs::write(&file, b"changed outside").unwrap();
    let read = grants.validate_read(&site, &key, false).await.unwrap();
    assert_eq!(read.deny_reason(), Some(DenyReason::StaleRead));

    std::fs::remove_file(&file).unwrap();
    let read = grants.validate_read(&site, &key, true).await.unwrap();
    assert_eq!(read.deny_reason(), Some(DenyReason::FileNotFound));

    grants.close().await.unwrap();
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn non_utf8_file_names_are_not_granted() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let dir = tempfile::tempdir().unwrap();
    let picked = dir.path().join(OsStr::from_bytes(b"caf\xE9.txt"));
    let bystander = dir.path().join("caf\u{FFFD}.txt");
    std::fs::write(&picked, b"picked").unwrap();
    std::fs::write(&bystander, b"bystander").unwrap();

    let grants = FileGrants::open_local(dir.path().join("grants.db"), GrantsConfig::default())
        .unwrap();
    let site = origin("editor.example");

    let err = grants
        .create_grant(&site, &picked, AccessMode::ReadWrite)
        .await
        .unwrap_err();
    assert!(matches!(err, GrantsError::IdentityUnavailable { .. }));
    assert!(grants.list_grants(&site).collect_all().await.unwrap().is_empty());
    assert_eq!(std::fs::read(&bystander).unwrap(), b"bystander");
}
