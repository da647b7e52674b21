use dap_config::shared::ReplicatorConfig;
use nix::errno::Errno;
use nix::sys::signal::{Signal, killpg};
use nix::unistd::Pid;
use secrecy::{ExposeSecret, SecretString};
use std::path::PathBuf;
use std::process::{Output, Stdio};
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::dap_error;
use crate::error::{DapError, DapResult, ErrorKind};
use crate::replicator::base::Replicator;
use crate::types::TableName;

/// Environment variables through which the replication client reads its endpoint and secrets.
const API_URL_ENV: &str = "DAP_API_URL";
const CLIENT_ID_ENV: &str = "DAP_CLIENT_ID";
const CLIENT_SECRET_ENV: &str = "DAP_CLIENT_SECRET";
const CONNECTION_STRING_ENV: &str = "DAP_CONNECTION_STRING";

/// Diagnostics printed by the client when the table does not exist at the source.
const TABLE_NOT_FOUND_MARKERS: &[&str] = &["NonExistingTableError", "table does not exist"];

/// Diagnostics printed by the client when `syncdb` runs before `initdb`.
const TABLE_NOT_INITIALIZED_MARKERS: &[&str] = &["table not initialized"];

/// Subcommands of the replication client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClientCommand {
    SyncDb,
    InitDb,
    List,
}

impl ClientCommand {
    fn as_str(&self) -> &'static str {
        match self {
            ClientCommand::SyncDb => "syncdb",
            ClientCommand::InitDb => "initdb",
            ClientCommand::List => "list",
        }
    }
}

#[derive(Debug)]
struct Inner {
    program: String,
    working_dir: Option<PathBuf>,
    namespace: String,
    base_url: String,
    client_id: String,
    client_secret: SecretString,
    connection_string: SecretString,
}

/// [`Replicator`] backed by the `dap` command-line client.
///
/// Each call runs the client as a child process, which authenticates, opens
/// its own database connection and exits. The child is started in its own
/// process group and the whole group is killed when the call's future is
/// dropped, so a cancelled table leaves no session behind even when `program`
/// is a wrapper launching the client.
#[derive(Debug, Clone)]
pub struct CommandReplicator {
    inner: Arc<Inner>,
}

impl CommandReplicator {
    pub fn new(config: &ReplicatorConfig) -> Self {
        let inner = Inner {
            program: config.command.program.clone(),
            working_dir: config.command.working_dir.clone(),
            namespace: config.replication.namespace.clone(),
            base_url: config.api.base_url.clone(),
            client_id: config.api.client_id.clone(),
            client_secret: (*config.api.client_secret).clone(),
            connection_string: (*config.database.connection_string).clone(),
        };

        Self {
            inner: Arc::new(inner),
        }
    }

    fn command(&self, client_command: ClientCommand, table_name: Option<&TableName>) -> Command {
        let mut command = Command::new(&self.inner.program);
        command
            .arg(client_command.as_str())
            .arg("--namespace")
            .arg(&self.inner.namespace);

        if let Some(table_name) = table_name {
            command.arg("--table").arg(table_name.as_str());
        }

        command
            .env(API_URL_ENV, &self.inner.base_url)
            .env(CLIENT_ID_ENV, &self.inner.client_id)
            .env(CLIENT_SECRET_ENV, self.inner.client_secret.expose_secret())
            .env(
                CONNECTION_STRING_ENV,
                self.inner.connection_string.expose_secret(),
            )
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true);

        if let Some(working_dir) = &self.inner.working_dir {
            command.current_dir(working_dir);
        }

        command
    }

    async fn execute(
        &self,
        client_command: ClientCommand,
        table_name: Option<&TableName>,
    ) -> DapResult<Output> {
        debug!(
            program = self.inner.program,
            command = client_command.as_str(),
            namespace = self.inner.namespace,
            table_name = table_name.map(|t| t.as_str()),
            "running replication client"
        );

        let child = self
            .command(client_command, table_name)
            .spawn()
            .map_err(|err| {
                dap_error!(
                    ErrorKind::CommandSpawnFailed,
                    "Failed to run the replication client",
                    format!("{}: {err}", self.inner.program)
                )
            })?;

        let process_group = ProcessGroup::new(child.id());
        let output = child.wait_with_output().await?;
        process_group.release();

        if !output.status.success() {
            return Err(classify_failure(&output));
        }

        Ok(output)
    }
}

impl Replicator for CommandReplicator {
    async fn synchronize(&self, table_name: &TableName) -> DapResult<()> {
        self.execute(ClientCommand::SyncDb, Some(table_name)).await?;

        Ok(())
    }

    async fn initialize(&self, table_name: &TableName) -> DapResult<()> {
        self.execute(ClientCommand::InitDb, Some(table_name)).await?;

        Ok(())
    }

    async fn list_tables(&self) -> DapResult<Vec<TableName>> {
        let output = self.execute(ClientCommand::List, None).await?;

        parse_table_list(output.stdout)
    }
}

/// Process group of a running client, killed on drop unless released.
struct ProcessGroup {
    pgid: Option<Pid>,
}

impl ProcessGroup {
    /// The client leads its own group, so its pid is the group id.
    fn new(pid: Option<u32>) -> Self {
        let pgid = pid
            .and_then(|pid| i32::try_from(pid).ok())
            .map(Pid::from_raw);

        Self { pgid }
    }

    /// Leaves the group alone, the client exited on its own.
    fn release(mut self) {
        self.pgid = None;
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        let Some(pgid) = self.pgid.take() else {
            return;
        };

        match killpg(pgid, Signal::SIGKILL) {
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(err) => {
                warn!(
                    pgid = pgid.as_raw(),
                    error = %err,
                    "failed to kill the replication client process group"
                );
            }
        }
    }
}

/// Maps a failed client run to a tagged error.
///
/// This is the only place where the client's diagnostic text is inspected.
fn classify_failure(output: &Output) -> DapError {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let diagnostics = format!("{stderr}\n{stdout}");

    let detail = format!(
        "{}: {}",
        output.status,
        last_line(&stderr)
            .or_else(|| last_line(&stdout))
            .unwrap_or("no output")
    );

    if contains_any(&diagnostics, TABLE_NOT_FOUND_MARKERS) {
        return dap_error!(
            ErrorKind::TableNotFound,
            "Table does not exist at the source",
            detail
        );
    }

    if contains_any(&diagnostics, TABLE_NOT_INITIALIZED_MARKERS) {
        return dap_error!(
            ErrorKind::TableNotInitialized,
            "Table is not initialized in the target database",
            detail
        );
    }

    dap_error!(ErrorKind::CommandFailed, "Replication client failed", detail)
}

fn contains_any(diagnostics: &str, markers: &[&str]) -> bool {
    let diagnostics = diagnostics.to_lowercase();
    markers
        .iter()
        .any(|marker| diagnostics.contains(&marker.to_lowercase()))
}

fn last_line(text: &str) -> Option<&str> {
    text.lines().map(str::trim).rfind(|line| !line.is_empty())
}

/// Parses the `list` output, one table name per line.
fn parse_table_list(stdout: Vec<u8>) -> DapResult<Vec<TableName>> {
    let stdout = String::from_utf8(stdout).map_err(|err| {
        dap_error!(
            ErrorKind::InvalidData,
            "Table list is not valid UTF-8",
            err
        )
    })?;

    Ok(stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(TableName::from)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::process::ExitStatusExt;
    use std::process::ExitStatus;

    fn failed_output(stderr: &str) -> Output {
        Output {
            status: ExitStatus::from_raw(1 << 8),
            stdout: Vec::new(),
            stderr: stderr.as_bytes().to_vec(),
        }
    }

    #[test]
    fn not_initialized_diagnostic_is_tagged() {
        let err = classify_failure(&failed_output(
            "Traceback (most recent call last):\n  ...\nValueError: table not initialized, use `initdb`\n",
        ));

        assert_eq!(err.kind(), ErrorKind::TableNotInitialized);
        assert!(
            err.detail()
                .unwrap()
                .ends_with("ValueError: table not initialized, use `initdb`")
        );
    }

    #[test]
    fn missing_table_takes_precedence() {
        let err = classify_failure(&failed_output(
            "NonExistingTableError: table not initialized and missing at source\n",
        ));

        assert_eq!(err.kind(), ErrorKind::TableNotFound);
    }

    #[test]
    fn other_failures_are_command_failures() {
        let err = classify_failure(&failed_output("\nHTTP 401: invalid client credentials\n\n"));

        assert_eq!(err.kind(), ErrorKind::CommandFailed);
        assert!(
            err.detail()
                .unwrap()
                .ends_with("HTTP 401: invalid client credentials")
        );
    }

    #[test]
    fn failures_without_output_still_have_detail() {
        let err = classify_failure(&failed_output(""));

        assert_eq!(err.kind(), ErrorKind::CommandFailed);
        assert!(err.detail().unwrap().ends_with("no output"));
    }

    #[test]
    fn table_list_skips_blank_lines() {
        let tables = parse_table_list(b"users\n\n  courses \nenrollments\n".to_vec()).unwrap();

        assert_eq!(
            tables,
            vec![
                TableName::from("users"),
                TableName::from("courses"),
                TableName::from("enrollments")
            ]
        );
    }

    #[test]
    fn invalid_table_list_is_rejected() {
        let err = parse_table_list(vec![0xff, 0xfe]).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }
}
