#![cfg(target_os = "linux")]

use dap::concurrency::shutdown::create_shutdown_channel;
use dap::error::ErrorKind;
use dap::replicator::base::Replicator;
use dap::replicator::command::CommandReplicator;
use dap::types::{ResultLabel, TableName};
use dap::workers::pool::TableWorkerPool;
use dap_config::shared::{
    ApiConfig, CommandConfig, DatabaseConfig, ReplicationConfig, ReplicatorConfig,
};
use dap_telemetry::init_test_tracing;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Stand-in for the `dap` client.
///
/// Appends its arguments and the environment it received to `calls.log` in
/// its working directory, then answers like the real client would:
/// `students` was never initialized, `missing_table` does not exist and
/// `slow` starts a long running grandchild and waits for it.
const FAKE_CLIENT: &str = r#"#!/bin/sh
echo "$* | $DAP_API_URL | $DAP_CLIENT_ID | $DAP_CLIENT_SECRET | $DAP_CONNECTION_STRING" >> calls.log

case "$1:$5" in
    syncdb:students)
        echo "ValueError: table not initialized, use initdb" >&2
        exit 1
        ;;
    syncdb:missing_table)
        echo "NonExistingTableError: missing_table" >&2
        exit 1
        ;;
    syncdb:slow)
        sleep 30 &
        echo $! > slow_child.pid
        wait
        ;;
    list:)
        printf 'users\n\ncourses\n'
        ;;
esac

exit 0
"#;

const API_URL: &str = "https://api.example.com";
const CONNECTION_STRING: &str = "postgresql://replicator@localhost/canvas";

fn install_fake_client(dir: &Path) -> String {
    let program = dir.join("dap");
    std::fs::write(&program, FAKE_CLIENT).unwrap();
    std::fs::set_permissions(&program, std::fs::Permissions::from_mode(0o755)).unwrap();

    program.to_string_lossy().into_owned()
}

fn replicator_config(dir: &TempDir, program: String, tables: &[&str]) -> ReplicatorConfig {
    ReplicatorConfig {
        api: ApiConfig {
            base_url: API_URL.to_owned(),
            client_id: "client".to_owned(),
            client_secret: "s3cr3t".into(),
        },
        database: DatabaseConfig {
            connection_string: CONNECTION_STRING.into(),
        },
        replication: ReplicationConfig {
            tables: tables.iter().map(|t| t.to_string()).collect(),
            ..ReplicationConfig::default()
        },
        command: CommandConfig {
            program,
            working_dir: Some(dir.path().to_path_buf()),
        },
        sentry: None,
    }
}

fn tables(names: &[&str]) -> Vec<TableName> {
    names.iter().map(|name| TableName::from(*name)).collect()
}

fn read_calls(dir: &TempDir) -> Vec<String> {
    let calls = std::fs::read_to_string(dir.path().join("calls.log")).unwrap_or_default();
    let mut calls = calls.lines().map(str::to_owned).collect::<Vec<_>>();
    calls.sort();

    calls
}

fn expected_call(args: &str) -> String {
    format!("{args} | {API_URL} | client | s3cr3t | {CONNECTION_STRING}")
}

/// A process that exited but was not reaped yet counts as gone.
fn is_running(pid: &str) -> bool {
    let Ok(stat) = std::fs::read_to_string(format!("/proc/{pid}/stat")) else {
        return false;
    };

    stat.rsplit_once(')')
        .and_then(|(_, rest)| rest.trim_start().chars().next())
        .is_some_and(|state| state != 'Z' && state != 'X')
}

#[tokio::test(flavor = "multi_thread")]
async fn each_step_runs_its_own_client_call() {
    init_test_tracing();
    let dir = tempfile::tempdir().unwrap();
    let program = install_fake_client(dir.path());

    let names = ["students", "courses", "missing_table"];
    let config = replicator_config(&dir, program, &names);
    let replicator = CommandReplicator::new(&config);
    let (_shutdown_tx, shutdown_rx) = create_shutdown_channel();
    let pool = TableWorkerPool::new(replicator, Arc::new(config.replication), shutdown_rx);

    let report = pool.run(tables(&names)).await;

    assert_eq!(
        report.get("students").unwrap().result(),
        ResultLabel::Completed
    );
    assert_eq!(
        report.get("courses").unwrap().result(),
        ResultLabel::Completed
    );
    assert_eq!(
        report.get("missing_table").unwrap().result(),
        ResultLabel::NoTable
    );

    assert_eq!(
        read_calls(&dir),
        vec![
            expected_call("initdb --namespace canvas --table students"),
            expected_call("syncdb --namespace canvas --table courses"),
            expected_call("syncdb --namespace canvas --table missing_table"),
            expected_call("syncdb --namespace canvas --table students"),
        ]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn client_diagnostics_are_tagged() {
    init_test_tracing();
    let dir = tempfile::tempdir().unwrap();
    let program = install_fake_client(dir.path());
    let replicator = CommandReplicator::new(&replicator_config(&dir, program, &["students"]));

    let err = replicator
        .synchronize(&TableName::from("students"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TableNotInitialized);

    let err = replicator
        .synchronize(&TableName::from("missing_table"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TableNotFound);

    replicator
        .initialize(&TableName::from("students"))
        .await
        .unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn listing_reads_one_table_per_line() {
    init_test_tracing();
    let dir = tempfile::tempdir().unwrap();
    let program = install_fake_client(dir.path());
    let replicator = CommandReplicator::new(&replicator_config(&dir, program, &["users"]));

    let listed = replicator.list_tables().await.unwrap();

    assert_eq!(listed, tables(&["users", "courses"]));
    assert_eq!(read_calls(&dir), vec![expected_call("list --namespace canvas")]);
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_program_fails_the_table() {
    init_test_tracing();
    let dir = tempfile::tempdir().unwrap();
    let program = dir.path().join("not-installed").to_string_lossy().into_owned();

    let config = replicator_config(&dir, program, &["users"]);
    let replicator = CommandReplicator::new(&config);

    let err = replicator
        .synchronize(&TableName::from("users"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CommandSpawnFailed);

    let (_shutdown_tx, shutdown_rx) = create_shutdown_channel();
    let pool = TableWorkerPool::new(replicator, Arc::new(config.replication), shutdown_rx);
    let report = pool.run(tables(&["users"])).await;

    let users = report.get("users").unwrap();
    assert_eq!(users.result(), ResultLabel::Failed);
    assert!(users.detail().unwrap().contains("CommandSpawnFailed"));
}

#[tokio::test(flavor = "multi_thread")]
async fn cancelled_call_kills_the_whole_client_process_group() {
    init_test_tracing();
    let dir = tempfile::tempdir().unwrap();
    let program = install_fake_client(dir.path());

    let names = ["courses", "slow"];
    let mut config = replicator_config(&dir, program, &names);
    config.replication.run_timeout_ms = Some(1000);
    let replicator = CommandReplicator::new(&config);
    let (_shutdown_tx, shutdown_rx) = create_shutdown_channel();
    let pool = TableWorkerPool::new(replicator, Arc::new(config.replication), shutdown_rx);

    let report = pool.run(tables(&names)).await;

    assert_eq!(
        report.get("courses").unwrap().result(),
        ResultLabel::Completed
    );
    let slow = report.get("slow").unwrap();
    assert_eq!(slow.result(), ResultLabel::Failed);
    assert!(slow.detail().unwrap().contains("run deadline exceeded"));

    let grandchild = std::fs::read_to_string(dir.path().join("slow_child.pid")).unwrap();
    let grandchild = grandchild.trim();

    let mut running = is_running(grandchild);
    for _ in 0..50 {
        if !running {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        running = is_running(grandchild);
    }
    assert!(!running, "client grandchild {grandchild} outlived the cancelled call");
}
