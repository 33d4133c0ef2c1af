//! Scenarios that drive a real server with the extension installed.
//!
//! These require `initdb`, `pg_ctl` and an OrioleDB-enabled installation
//! (resolved through `PG_BIN` or `PATH`), so they are ignored by default and
//! run explicitly with `cargo test --features test-utils,live-tests -- --ignored`.

use std::time::Duration;

use testkit::concurrency::spawn_query;
use testkit::oriole::SOURCES_FILE;
use testkit::sync::{wait_catchup, wait_for_checkpointer_stopevent, wait_for_stopevent};
use testkit::test_utils::assert::assert_pg_error_message;
use testkit::test_utils::cluster::TestCluster;
use testkit::test_utils::data::generate_string;
use testkit::test_utils::tracing::init_test_tracing;
use testkit_config::shared::HarnessConfig;
use testkit_postgres::node::POSTMASTER_PID_FILE;
use testkit_postgres::version::{POSTGRES_14, pg_major_version};

const MODULE_FILE: &str = "live_test.rs";

fn siblings() -> Vec<String> {
    vec![MODULE_FILE.to_string()]
}

async fn started_cluster() -> TestCluster {
    let mut cluster = TestCluster::setup(MODULE_FILE, &siblings()).await.unwrap();
    cluster.node().start().await.unwrap();
    cluster
        .node()
        .execute("CREATE EXTENSION IF NOT EXISTS orioledb;")
        .await
        .unwrap();
    cluster
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires a local OrioleDB-enabled Postgres installation"]
async fn server_version_is_supported() {
    init_test_tracing();
    let harness = HarnessConfig::load().unwrap();

    let major = pg_major_version(harness.pg_bin.as_deref()).await.unwrap();
    assert!(major >= POSTGRES_14, "unsupported major version {major}");
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires a local OrioleDB-enabled Postgres installation"]
async fn replica_sees_rows_from_before_and_after_the_backup() {
    init_test_tracing();
    let mut cluster = started_cluster().await;

    cluster
        .node()
        .execute("CREATE TABLE t (id int PRIMARY KEY, v text) USING orioledb;")
        .await
        .unwrap();
    let payload = generate_string(32, Some(1));
    cluster
        .node()
        .execute(&format!(
            "INSERT INTO t SELECT i, '{payload}' FROM generate_series(1, 5) i;"
        ))
        .await
        .unwrap();

    cluster.replica().await.unwrap().start().await.unwrap();

    cluster
        .node()
        .execute(&format!(
            "INSERT INTO t SELECT i, '{payload}' FROM generate_series(6, 10) i;"
        ))
        .await
        .unwrap();

    let replica = cluster.replica().await.unwrap();
    wait_catchup(replica).await.unwrap();

    let rows = replica.execute("SELECT count(*) FROM t;").await.unwrap();
    assert_eq!(rows[0].get(0), Some("10"));

    cluster.finish(true).await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires a local OrioleDB-enabled Postgres installation"]
async fn branch_diverges_from_the_primary() {
    init_test_tracing();
    let mut cluster = started_cluster().await;

    cluster
        .node()
        .execute("CREATE TABLE t (id int PRIMARY KEY) USING orioledb;")
        .await
        .unwrap();
    cluster
        .node()
        .execute("INSERT INTO t SELECT i FROM generate_series(1, 5) i;")
        .await
        .unwrap();

    let primary_data_dir = cluster.node().data_dir();
    let branch = cluster.branch().await.unwrap();
    let recorded =
        std::fs::read_to_string(branch.data_dir().join(SOURCES_FILE)).unwrap();
    assert_eq!(recorded, format!("{}\n", primary_data_dir.display()));

    branch.start().await.unwrap();
    branch
        .execute("INSERT INTO t SELECT i FROM generate_series(6, 20) i;")
        .await
        .unwrap();

    let on_branch = branch.execute("SELECT count(*) FROM t;").await.unwrap();
    assert_eq!(on_branch[0].get(0), Some("20"));

    let on_primary = cluster
        .node()
        .execute("SELECT count(*) FROM t;")
        .await
        .unwrap();
    assert_eq!(on_primary[0].get(0), Some("5"));

    cluster.finish(true).await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires a local OrioleDB-enabled Postgres installation"]
async fn hot_backup_never_contains_the_postmaster_pid_file() {
    init_test_tracing();
    let mut cluster = started_cluster().await;
    cluster.node().restart().await.unwrap();

    let replica = cluster.replica().await.unwrap();
    assert!(!replica.data_dir().join(POSTMASTER_PID_FILE).exists());

    cluster.finish(true).await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires a local OrioleDB-enabled Postgres installation"]
async fn server_errors_surface_their_primary_message() {
    init_test_tracing();
    let mut cluster = started_cluster().await;

    cluster
        .node()
        .execute("CREATE TABLE t (id int PRIMARY KEY) USING orioledb;")
        .await
        .unwrap();
    let error = cluster
        .node()
        .execute("CREATE TABLE t (id int PRIMARY KEY) USING orioledb;")
        .await
        .unwrap_err();

    assert_pg_error_message(&error, "relation \"t\" already exists");

    cluster.finish(true).await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires a local OrioleDB-enabled Postgres installation"]
async fn checkpointer_rendezvous_at_a_stopevent() {
    init_test_tracing();
    let mut cluster = started_cluster().await;

    cluster
        .node()
        .execute("SELECT pg_stopevent_set('checkpoint_step', 'true');")
        .await
        .unwrap();

    let client = cluster.node().connect().await.unwrap();
    let checkpoint = spawn_query(&client, "CHECKPOINT;");

    wait_for_checkpointer_stopevent(cluster.node()).await.unwrap();

    cluster
        .node()
        .execute("SELECT pg_stopevent_reset('checkpoint_step');")
        .await
        .unwrap();
    checkpoint.join().await.unwrap();

    cluster.finish(true).await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires a local OrioleDB-enabled Postgres installation"]
async fn waiting_on_a_pid_that_never_blocks_does_not_return() {
    init_test_tracing();
    let mut cluster = started_cluster().await;

    let rows = cluster
        .node()
        .execute("SELECT pg_backend_pid();")
        .await
        .unwrap();
    let idle_pid: i32 = rows[0].get(0).unwrap().parse().unwrap();

    let node = cluster.node();
    let wait = wait_for_stopevent(node, idle_pid);
    let bounded = tokio::time::timeout(Duration::from_millis(500), wait).await;
    assert!(bounded.is_err(), "wait returned for a pid that never blocks");

    cluster.finish(true).await.unwrap();
}
