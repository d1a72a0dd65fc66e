//! End-to-end tests: replicas writing, discovering each other, and adopting
//! newer branch states.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use mirrorsync::store::{io, Branch};
use mirrorsync::sync::{memory, Connection, Message, SyncError};
use mirrorsync::{ErrorKind, ObjectId, RepoError, Repository, RepositoryConfig, UserId};
use mirrorsync_testkit::{replicas, Replica};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

fn open(replica: &Replica) -> Result<Repository> {
    Ok(Repository::open(RepositoryConfig::under(replica.root()), replica.user)?)
}

fn copy_object(from: &Replica, to: &Replica, id: &ObjectId) -> Result<()> {
    let bytes = io::read_verified(&from.object_dir(), id)?;
    let target = io::object_path(&to.object_dir(), id);
    if let Some(dir) = target.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(target, bytes)?;
    Ok(())
}

/// Run one discovery pass from `client` against `server`.
async fn discover(
    server: &Repository,
    client: &Repository,
) -> Result<mirrorsync::SyncReport> {
    let (a, b) = memory::pair(&server.config().sync);
    let cancel = CancellationToken::new();
    let (served, report) = tokio::join!(server.serve(a, &cancel), client.sync_with(b, &cancel));
    served?;
    Ok(report?)
}

#[tokio::test]
async fn fresh_replicas_see_each_others_empty_branches() -> Result<()> {
    init_tracing();
    let mut all = replicas(2);
    let b = all.pop().unwrap();
    let a = all.pop().unwrap();
    let alice = open(&a)?;
    let bob = open(&b)?;

    let report = discover(&alice, &bob).await?;

    assert_eq!(report.remote_branches, 1);
    // Alice's empty branch equals the zero state Bob assumes for unknown
    // branches.
    assert_eq!(report.up_to_date, vec![a.user]);
    assert!(report.is_caught_up());
    Ok(())
}

#[tokio::test]
async fn writer_shows_up_as_ahead() -> Result<()> {
    init_tracing();
    let a = Replica::with_seed(1);
    let b = Replica::with_seed(2);
    let alice = open(&a)?;
    let bob = open(&b)?;

    assert!(alice.write("docs/readme", &b"hello"[..]).await?);
    let report = discover(&alice, &bob).await?;

    assert_eq!(report.ahead.len(), 1);
    let (user, state) = &report.ahead[0];
    assert_eq!(*user, a.user);
    assert_eq!(state.version_vector.get(&a.user), 1);
    assert_eq!(Some(state.clone()), alice.branch_state(&a.user).await);
    Ok(())
}

#[tokio::test]
async fn discovery_then_adopt_over_shared_objects() -> Result<()> {
    init_tracing();
    let a = Replica::with_seed(1);
    let b = Replica::with_seed(2);
    let alice = open(&a)?;

    // Bob shares Alice's object store but keeps his own branch files.
    let bob = Repository::open(
        RepositoryConfig {
            object_dir: a.object_dir(),
            ..RepositoryConfig::under(b.root())
        },
        b.user,
    )?;

    alice.write("notes/one", &b"first"[..]).await?;
    alice.write("notes/two", &b"second"[..]).await?;

    let report = discover(&alice, &bob).await?;
    for (user, state) in &report.ahead {
        assert!(bob.adopt(*user, &state.version_vector, state.root_id).await?);
    }

    assert_eq!(
        bob.read_branch(&a.user, "notes/two").await?,
        Bytes::from_static(b"second")
    );

    // A second pass finds nothing new.
    let again = discover(&alice, &bob).await?;
    assert!(again.is_caught_up());
    assert!(again.up_to_date.contains(&a.user));

    // Bob's copy survives a reopen.
    drop(bob);
    let reopened = Repository::open(
        RepositoryConfig {
            object_dir: a.object_dir(),
            ..RepositoryConfig::under(b.root())
        },
        b.user,
    )?;
    assert_eq!(
        reopened.branch_state(&a.user).await,
        alice.branch_state(&a.user).await
    );
    Ok(())
}

#[tokio::test]
async fn adopt_without_objects_is_not_found() -> Result<()> {
    let a = Replica::with_seed(1);
    let b = Replica::with_seed(2);
    let alice = open(&a)?;
    let bob = open(&b)?;

    alice.write("f", &b"x"[..]).await?;
    let state = alice.branch_state(&a.user).await.unwrap();

    let err = bob
        .adopt(a.user, &state.version_vector, state.root_id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    // Copy the reachable objects over and try again.
    copy_object(&a, &b, &state.root_id)?;
    let tree: mirrorsync::Tree = io::load(&b.object_dir(), &state.root_id)?;
    for (_, child) in tree.iter() {
        copy_object(&a, &b, child)?;
    }

    assert!(bob.adopt(a.user, &state.version_vector, state.root_id).await?);
    assert_eq!(bob.read_branch(&a.user, "f").await?, Bytes::from_static(b"x"));
    Ok(())
}

#[tokio::test]
async fn concurrent_writes_are_reported_concurrent() -> Result<()> {
    let shared = Replica::with_seed(9);
    let a = Replica::with_seed(1);
    let b = Replica::with_seed(2);
    let config_for = |r: &Replica| RepositoryConfig {
        object_dir: shared.object_dir(),
        ..RepositoryConfig::under(r.root())
    };
    let alice = Repository::open(config_for(&a), a.user)?;
    let bob = Repository::open(config_for(&b), b.user)?;

    // Bob learns Alice's first state.
    alice.write("f", &b"1"[..]).await?;
    let first = alice.branch_state(&a.user).await.unwrap();
    assert!(bob.adopt(a.user, &first.version_vector, first.root_id).await?);

    // Alice moves on; Bob's copy is now strictly older.
    alice.write("f", &b"2"[..]).await?;
    let report = discover(&alice, &bob).await?;
    assert_eq!(report.ahead.len(), 1);

    // A third replica that adopted a different history looks concurrent.
    let c = Replica::with_seed(3);
    let carol = Repository::open(config_for(&c), c.user)?;
    let forged = first.version_vector.incremented(c.user);
    assert!(carol.adopt(a.user, &forged, first.root_id).await?);

    let report = discover(&alice, &carol).await?;
    assert_eq!(report.concurrent.len(), 1);
    assert_eq!(report.concurrent[0].0, a.user);
    Ok(())
}

#[tokio::test]
async fn local_ahead_of_peer_is_behind() -> Result<()> {
    let shared = Replica::with_seed(9);
    let a = Replica::with_seed(1);
    let b = Replica::with_seed(2);
    let config_for = |r: &Replica| RepositoryConfig {
        object_dir: shared.object_dir(),
        ..RepositoryConfig::under(r.root())
    };
    let alice = Repository::open(config_for(&a), a.user)?;
    let bob = Repository::open(config_for(&b), b.user)?;

    bob.write("mine", &b"bob"[..]).await?;
    let bob_state = bob.branch_state(&b.user).await.unwrap();
    bob.write("mine", &b"bob again"[..]).await?;

    // Alice only has Bob's older state.
    assert!(alice.adopt(b.user, &bob_state.version_vector, bob_state.root_id).await?);

    let report = discover(&alice, &bob).await?;
    assert!(report.behind.contains(&b.user));
    Ok(())
}

#[tokio::test]
async fn stale_handle_write_is_rejected() -> Result<()> {
    let a = Replica::with_seed(1);
    let repo = open(&a)?;

    // Another writer moves the branch file forward behind the repository's back.
    let mut other = Branch::load_or_create(a.branch_dir(), a.object_dir(), a.user)?;
    assert!(other.maybe_store(Path::new("x"), &b"other"[..])?);

    assert!(!repo.write("x", &b"mine"[..]).await?);
    Ok(())
}

#[tokio::test]
async fn cancelled_sync_reports_cancelled() -> Result<()> {
    let a = Replica::with_seed(1);
    let alice = open(&a)?;
    let (conn, _peer) = memory::pair(&alice.config().sync);

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = alice.sync_with(conn, &cancel).await.unwrap_err();

    assert!(matches!(err, RepoError::Sync(SyncError::Cancelled)));
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    Ok(())
}

#[tokio::test]
async fn serve_rejects_peer_that_sends_responses() -> Result<()> {
    let a = Replica::with_seed(1);
    let alice = open(&a)?;
    let (server, mut client) = memory::pair(&alice.config().sync);
    let cancel = CancellationToken::new();

    let rogue = async {
        client
            .send(&Message::RsBranchList(vec![UserId::random()]), &cancel)
            .await
    };
    let (served, sent) = tokio::join!(alice.serve(server, &cancel), rogue);
    sent?;

    let err = served.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Corrupt);
    Ok(())
}

#[tokio::test]
async fn peer_disappearing_mid_sync_is_an_error() -> Result<()> {
    let a = Replica::with_seed(1);
    let mut config = RepositoryConfig::under(a.root());
    config.sync.message_timeout = Duration::from_secs(5);
    let alice = Repository::open(config, a.user)?;

    let (raw_client, raw_server) = tokio::io::duplex(1024);
    let conn = Connection::new(raw_client, &alice.config().sync);
    drop(raw_server);

    let err = alice
        .sync_with(conn, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
    Ok(())
}
