//! Typed bindings for the process-supervisor XML-RPC API.
//!
//! Method names and result shapes follow the `supervisor.*` namespace served
//! at `/RPC2` (see <https://supervisord.org/api.html>).

use serde::Serialize;
use sprpc_common::protocol::schema::{self, Schema};
use sprpc_common::protocol::{MethodCall, Value};

use crate::bound::BoundMethod;
use crate::client::XmlRpcClient;

/// Supervisor daemon states, by name and code.
pub const SUPERVISOR_STATES: [(&str, i32); 4] = [
    ("FATAL", 2),
    ("RUNNING", 1),
    ("RESTARTING", 0),
    ("SHUTDOWN", -1),
];

/// Managed process states, by name and code.
pub const PROCESS_STATES: [(&str, i32); 8] = [
    ("STOPPED", 0),
    ("STARTING", 10),
    ("RUNNING", 20),
    ("BACKOFF", 30),
    ("STOPPING", 40),
    ("EXITED", 100),
    ("FATAL", 200),
    ("UNKNOWN", 1000),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SupervisorState {
    pub statecode: i32,
    pub statename: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessInfo {
    pub name: String,
    pub group: String,
    pub description: String,
    /// UNIX timestamp of the last start
    pub start: i32,
    /// UNIX timestamp of the last stop, 0 if never stopped
    pub stop: i32,
    pub now: i32,
    pub state: i32,
    pub statename: String,
    pub spawnerr: String,
    pub exitstatus: i32,
    pub logfile: String,
    pub stdout_logfile: String,
    pub stderr_logfile: String,
    pub pid: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigInfo {
    pub autostart: bool,
    pub directory: String,
    pub uid: String,
    pub command: String,
    pub exitcodes: Vec<i32>,
    pub group: String,
    pub group_prio: i32,
    pub inuse: bool,
    pub killasgroup: bool,
    pub name: String,
    pub process_prio: i32,
    pub redirect_stderr: bool,
    pub startretries: i32,
    pub startsecs: i32,
    pub stdout_capture_maxbytes: i32,
    pub stdout_events_enabled: bool,
    pub stdout_logfile: String,
    pub stdout_logfile_backups: i32,
    pub stdout_logfile_maxbytes: i32,
    pub stdout_syslog: bool,
    pub stopsignal: i32,
    pub stopwaitsecs: i32,
    pub stderr_capture_maxbytes: i32,
    pub stderr_events_enabled: bool,
    pub stderr_logfile: String,
    pub stderr_logfile_backups: i32,
    pub stderr_logfile_maxbytes: i32,
    pub stderr_syslog: bool,
    pub serverurl: String,
}

/// Per-process outcome of a group or all-processes operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessStatus {
    pub name: String,
    pub group: String,
    /// Fault code, 80 (`SUCCESS`) when the operation succeeded
    pub status: i32,
    pub description: String,
}

/// A slice of a process log returned by `tailProcess*Log`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogTail {
    pub bytes: String,
    /// Offset to pass to the next tail call
    pub offset: i32,
    /// Whether more than the requested length was written since `offset`
    pub overflow: bool,
}

/// Process groups affected by `reloadConfig`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReloadChanges {
    pub added: Vec<String>,
    pub changed: Vec<String>,
    pub removed: Vec<String>,
}

/// A signal given by name (`"HUP"`) or by number (`1`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    Name(String),
    Number(i32),
}

impl From<Signal> for Value {
    fn from(signal: Signal) -> Self {
        match signal {
            Signal::Name(name) => Value::Str(name),
            Signal::Number(number) => Value::Int32(number),
        }
    }
}

impl From<&str> for Signal {
    fn from(name: &str) -> Self {
        Signal::Name(name.to_owned())
    }
}

impl From<i32> for Signal {
    fn from(number: i32) -> Self {
        Signal::Number(number)
    }
}

pub fn supervisor_state_schema() -> Schema<SupervisorState> {
    let codes = schema::one_of(schema::i4(), SUPERVISOR_STATES.map(|(_, code)| code));
    let names = schema::one_of(
        schema::string(),
        SUPERVISOR_STATES.map(|(name, _)| name.to_string()),
    );
    schema::record(move |m| {
        Ok(SupervisorState {
            statecode: m.field("statecode", &codes)?,
            statename: m.field("statename", &names)?,
        })
    })
}

pub fn process_info_schema() -> Schema<ProcessInfo> {
    let states = schema::one_of(schema::i4(), PROCESS_STATES.map(|(_, code)| code));
    let names = schema::one_of(
        schema::string(),
        PROCESS_STATES.map(|(name, _)| name.to_string()),
    );
    let s = schema::string();
    let i = schema::i4();

    schema::record(move |m| {
        Ok(ProcessInfo {
            name: m.field("name", &s)?,
            group: m.field("group", &s)?,
            description: m.field("description", &s)?,
            start: m.field("start", &i)?,
            stop: m.field("stop", &i)?,
            now: m.field("now", &i)?,
            state: m.field("state", &states)?,
            statename: m.field("statename", &names)?,
            spawnerr: m.field("spawnerr", &s)?,
            exitstatus: m.field("exitstatus", &i)?,
            logfile: m.field("logfile", &s)?,
            stdout_logfile: m.field("stdout_logfile", &s)?,
            stderr_logfile: m.field("stderr_logfile", &s)?,
            pid: m.field("pid", &i)?,
        })
    })
}

pub fn config_info_schema() -> Schema<ConfigInfo> {
    let s = schema::string();
    let i = schema::i4();
    let b = schema::boolean();
    let codes = schema::array(schema::i4());

    schema::record(move |m| {
        Ok(ConfigInfo {
            autostart: m.field("autostart", &b)?,
            directory: m.field("directory", &s)?,
            uid: m.field("uid", &s)?,
            command: m.field("command", &s)?,
            exitcodes: m.field("exitcodes", &codes)?,
            group: m.field("group", &s)?,
            group_prio: m.field("group_prio", &i)?,
            inuse: m.field("inuse", &b)?,
            killasgroup: m.field("killasgroup", &b)?,
            name: m.field("name", &s)?,
            process_prio: m.field("process_prio", &i)?,
            redirect_stderr: m.field("redirect_stderr", &b)?,
            startretries: m.field("startretries", &i)?,
            startsecs: m.field("startsecs", &i)?,
            stdout_capture_maxbytes: m.field("stdout_capture_maxbytes", &i)?,
            stdout_events_enabled: m.field("stdout_events_enabled", &b)?,
            stdout_logfile: m.field("stdout_logfile", &s)?,
            stdout_logfile_backups: m.field("stdout_logfile_backups", &i)?,
            stdout_logfile_maxbytes: m.field("stdout_logfile_maxbytes", &i)?,
            stdout_syslog: m.field("stdout_syslog", &b)?,
            stopsignal: m.field("stopsignal", &i)?,
            stopwaitsecs: m.field("stopwaitsecs", &i)?,
            stderr_capture_maxbytes: m.field("stderr_capture_maxbytes", &i)?,
            stderr_events_enabled: m.field("stderr_events_enabled", &b)?,
            stderr_logfile: m.field("stderr_logfile", &s)?,
            stderr_logfile_backups: m.field("stderr_logfile_backups", &i)?,
            stderr_logfile_maxbytes: m.field("stderr_logfile_maxbytes", &i)?,
            stderr_syslog: m.field("stderr_syslog", &b)?,
            serverurl: m.field("serverurl", &s)?,
        })
    })
}

pub fn process_status_schema() -> Schema<ProcessStatus> {
    let s = schema::string();
    let i = schema::i4();
    schema::record(move |m| {
        Ok(ProcessStatus {
            name: m.field("name", &s)?,
            group: m.field("group", &s)?,
            status: m.field("status", &i)?,
            description: m.field("description", &s)?,
        })
    })
}

pub fn log_tail_schema() -> Schema<LogTail> {
    schema::tuple3(schema::string(), schema::i4(), schema::boolean()).map(
        |(bytes, offset, overflow)| LogTail {
            bytes,
            offset,
            overflow,
        },
    )
}

/// `reloadConfig` answers `[[added, changed, removed]]`.
pub fn reload_changes_schema() -> Schema<ReloadChanges> {
    let names = || schema::array(schema::string());
    schema::tuple1(schema::tuple3(names(), names(), names())).map(|((added, changed, removed),)| {
        ReloadChanges {
            added,
            changed,
            removed,
        }
    })
}

fn named(method: &'static str) -> impl Fn(()) -> MethodCall + Send + Sync + 'static {
    move |()| MethodCall::new(method)
}

fn with_name(method: &'static str) -> impl Fn(String) -> MethodCall + Send + Sync + 'static {
    move |name| MethodCall::new(method).arg(name)
}

fn with_wait(method: &'static str) -> impl Fn((String, Option<bool>)) -> MethodCall + Send + Sync + 'static {
    move |(name, wait)| MethodCall::new(method).arg(name).opt_arg(wait)
}

fn with_signal(method: &'static str) -> impl Fn((String, Signal)) -> MethodCall + Send + Sync + 'static {
    move |(name, signal)| MethodCall::new(method).arg(name).arg(signal)
}

fn with_log_range(
    method: &'static str,
) -> impl Fn((String, i32, i32)) -> MethodCall + Send + Sync + 'static {
    move |(name, offset, length)| MethodCall::new(method).arg(name).arg(offset).arg(length)
}

/// The `supervisor.*` methods bound to one client.
///
/// # Example
///
/// ```no_run
/// use sprpc_client::{ClientConfig, Supervisor, XmlRpcClient};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let client = XmlRpcClient::connect(&ClientConfig::default()).await?;
/// let supervisor = Supervisor::bind(&client);
///
/// println!("{:?}", supervisor.get_state.call(()).await?);
/// supervisor.start_process.call(("web".to_string(), Some(true))).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Supervisor {
    // Status and control
    pub get_api_version: BoundMethod<(), String>,
    pub get_supervisor_version: BoundMethod<(), String>,
    pub get_identification: BoundMethod<(), String>,
    pub get_state: BoundMethod<(), SupervisorState>,
    pub get_pid: BoundMethod<(), i32>,
    /// `(offset, length)`
    pub read_log: BoundMethod<(i32, i32), String>,
    pub clear_log: BoundMethod<(), bool>,
    pub shutdown: BoundMethod<(), bool>,
    pub restart: BoundMethod<(), bool>,

    // Process control
    pub get_process_info: BoundMethod<String, ProcessInfo>,
    pub get_all_process_info: BoundMethod<(), Vec<ProcessInfo>>,
    pub get_all_config_info: BoundMethod<(), Vec<ConfigInfo>>,
    /// `(name, wait)`
    pub start_process: BoundMethod<(String, Option<bool>), bool>,
    /// `(name, wait)`
    pub stop_process: BoundMethod<(String, Option<bool>), bool>,
    pub signal_process: BoundMethod<(String, Signal), bool>,
    /// `(name, chars)`
    pub send_process_stdin: BoundMethod<(String, String), bool>,
    pub start_process_group: BoundMethod<(String, Option<bool>), Vec<ProcessStatus>>,
    pub stop_process_group: BoundMethod<(String, Option<bool>), Vec<ProcessStatus>>,
    pub signal_process_group: BoundMethod<(String, Signal), Vec<ProcessStatus>>,
    pub add_process_group: BoundMethod<String, bool>,
    pub remove_process_group: BoundMethod<String, bool>,
    pub start_all_processes: BoundMethod<Option<bool>, Vec<ProcessStatus>>,
    pub stop_all_processes: BoundMethod<Option<bool>, Vec<ProcessStatus>>,
    pub signal_all_processes: BoundMethod<Signal, Vec<ProcessStatus>>,
    /// `(type, data)`
    pub send_remote_comm_event: BoundMethod<(String, String), bool>,
    pub reload_config: BoundMethod<(), ReloadChanges>,

    // Process logging, `(name, offset, length)`
    pub read_process_stdout_log: BoundMethod<(String, i32, i32), String>,
    pub read_process_stderr_log: BoundMethod<(String, i32, i32), String>,
    pub tail_process_stdout_log: BoundMethod<(String, i32, i32), LogTail>,
    pub tail_process_stderr_log: BoundMethod<(String, i32, i32), LogTail>,
    pub clear_process_logs: BoundMethod<String, bool>,
    pub clear_all_process_logs: BoundMethod<(), Vec<ProcessStatus>>,
}

impl Supervisor {
    pub fn bind(client: &XmlRpcClient) -> Self {
        let ok = schema::boolean_true;
        let infos = || schema::array(process_info_schema());
        let statuses = || schema::array(process_status_schema());

        Self {
            get_api_version: client.bind(named("supervisor.getAPIVersion"), schema::string()),
            get_supervisor_version: client
                .bind(named("supervisor.getSupervisorVersion"), schema::string()),
            get_identification: client
                .bind(named("supervisor.getIdentification"), schema::string()),
            get_state: client.bind(named("supervisor.getState"), supervisor_state_schema()),
            get_pid: client.bind(named("supervisor.getPID"), schema::i4()),
            read_log: client.bind(
                |(offset, length): (i32, i32)| {
                    MethodCall::new("supervisor.readLog").arg(offset).arg(length)
                },
                schema::string(),
            ),
            clear_log: client.bind(named("supervisor.clearLog"), ok()),
            shutdown: client.bind(named("supervisor.shutdown"), ok()),
            restart: client.bind(named("supervisor.restart"), ok()),

            get_process_info: client
                .bind(with_name("supervisor.getProcessInfo"), process_info_schema()),
            get_all_process_info: client.bind(named("supervisor.getAllProcessInfo"), infos()),
            get_all_config_info: client.bind(
                named("supervisor.getAllConfigInfo"),
                schema::array(config_info_schema()),
            ),
            start_process: client.bind(with_wait("supervisor.startProcess"), ok()),
            stop_process: client.bind(with_wait("supervisor.stopProcess"), ok()),
            signal_process: client.bind(with_signal("supervisor.signalProcess"), ok()),
            send_process_stdin: client.bind(
                |(name, chars): (String, String)| {
                    MethodCall::new("supervisor.sendProcessStdin").arg(name).arg(chars)
                },
                ok(),
            ),
            start_process_group: client.bind(with_wait("supervisor.startProcessGroup"), statuses()),
            stop_process_group: client.bind(with_wait("supervisor.stopProcessGroup"), statuses()),
            signal_process_group: client
                .bind(with_signal("supervisor.signalProcessGroup"), statuses()),
            add_process_group: client.bind(with_name("supervisor.addProcessGroup"), ok()),
            remove_process_group: client.bind(with_name("supervisor.removeProcessGroup"), ok()),
            start_all_processes: client.bind(
                |wait: Option<bool>| MethodCall::new("supervisor.startAllProcesses").opt_arg(wait),
                statuses(),
            ),
            stop_all_processes: client.bind(
                |wait: Option<bool>| MethodCall::new("supervisor.stopAllProcesses").opt_arg(wait),
                statuses(),
            ),
            signal_all_processes: client.bind(
                |signal: Signal| MethodCall::new("supervisor.signalAllProcesses").arg(signal),
                statuses(),
            ),
            send_remote_comm_event: client.bind(
                |(kind, data): (String, String)| {
                    MethodCall::new("supervisor.sendRemoteCommEvent").arg(kind).arg(data)
                },
                ok(),
            ),
            reload_config: client.bind(named("supervisor.reloadConfig"), reload_changes_schema()),

            read_process_stdout_log: client
                .bind(with_log_range("supervisor.readProcessStdoutLog"), schema::string()),
            read_process_stderr_log: client
                .bind(with_log_range("supervisor.readProcessStderrLog"), schema::string()),
            tail_process_stdout_log: client
                .bind(with_log_range("supervisor.tailProcessStdoutLog"), log_tail_schema()),
            tail_process_stderr_log: client
                .bind(with_log_range("supervisor.tailProcessStderrLog"), log_tail_schema()),
            clear_process_logs: client.bind(with_name("supervisor.clearProcessLogs"), ok()),
            clear_all_process_logs: client
                .bind(named("supervisor.clearAllProcessLogs"), statuses()),
        }
    }
}
