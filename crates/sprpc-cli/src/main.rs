//! # sprpc CLI Entry Point
//!
//! A supervisorctl-style command line for process-supervisor daemons,
//! talking XML-RPC over TCP or a local unix socket.
//!
//! ## Usage
//!
//! ```bash
//! # Daemon state and version
//! sprpc state
//! sprpc version
//!
//! # Process control over the unix socket
//! sprpc --socket /var/run/supervisor.sock status
//! sprpc --socket /var/run/supervisor.sock start web
//!
//! # Raw call, JSON arguments in, JSON out
//! sprpc --url http://127.0.0.1:9001/RPC2 call supervisor.readLog 0 500
//! ```
//!
//! `--url` and `--socket` fall back to `SPRPC_URL` and `SPRPC_SOCKET`.
//! Logs go to stderr and are controlled with `RUST_LOG` (default `warn`).

use anyhow::{Context, Result};
use argh::FromArgs;
use sprpc_client::{ClientConfig, ProcessInfo, ProcessStatus, Supervisor, XmlRpcClient};
use sprpc_common::protocol::lift::{method_call_from_json, to_json};

/// Fault code reported in a status struct when the operation succeeded.
const SUCCESS: i32 = 80;

#[derive(FromArgs)]
/// sprpc - XML-RPC client for process-supervisor daemons
struct Cli {
    /// endpoint URL (default: $SPRPC_URL or http://localhost:9001/RPC2)
    #[argh(option)]
    url: Option<String>,

    /// path of a unix socket to connect to instead of the URL's host
    /// (default: $SPRPC_SOCKET)
    #[argh(option)]
    socket: Option<String>,

    /// timeout per request in milliseconds
    #[argh(option, default = "30000")]
    timeout_ms: u64,

    #[argh(subcommand)]
    command: Commands,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Commands {
    State(StateArgs),
    Pid(PidArgs),
    Version(VersionArgs),
    Status(StatusArgs),
    Start(StartArgs),
    Stop(StopArgs),
    RestartAll(RestartAllArgs),
    Reload(ReloadArgs),
    Tail(TailArgs),
    Call(CallArgs),
}

#[derive(FromArgs)]
#[argh(subcommand, name = "state")]
/// print the daemon state
struct StateArgs {}

#[derive(FromArgs)]
#[argh(subcommand, name = "pid")]
/// print the daemon PID
struct PidArgs {}

#[derive(FromArgs)]
#[argh(subcommand, name = "version")]
/// print API version, daemon version and identification
struct VersionArgs {}

#[derive(FromArgs)]
#[argh(subcommand, name = "status")]
/// print the status of one or all processes
struct StatusArgs {
    /// process name (all processes when omitted)
    #[argh(positional)]
    name: Option<String>,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "start")]
/// start a process
struct StartArgs {
    /// process name
    #[argh(positional)]
    name: String,

    /// return as soon as the start was requested
    #[argh(switch)]
    no_wait: bool,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "stop")]
/// stop a process
struct StopArgs {
    /// process name
    #[argh(positional)]
    name: String,

    /// return as soon as the stop was requested
    #[argh(switch)]
    no_wait: bool,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "restart-all")]
/// stop then start every process
struct RestartAllArgs {}

#[derive(FromArgs)]
#[argh(subcommand, name = "reload")]
/// reload the daemon configuration and print the changed groups
struct ReloadArgs {}

#[derive(FromArgs)]
#[argh(subcommand, name = "tail")]
/// print the end of a process's stdout log
struct TailArgs {
    /// process name
    #[argh(positional)]
    name: String,

    /// number of bytes to read from the end of the log
    #[argh(option, default = "1600")]
    bytes: i32,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "call")]
/// call any method; arguments are JSON, the result is printed as JSON
struct CallArgs {
    /// method name, e.g. supervisor.getProcessInfo
    #[argh(positional)]
    method: String,

    /// JSON arguments, e.g. '"web"' or 'true'
    #[argh(positional, greedy)]
    args: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli: Cli = argh::from_env();

    // Stderr keeps stdout clean for piping.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let client = connect(&cli).await?;
    run(client, cli.command).await
}

/// Resolves the endpoint from flags, then the environment, then defaults.
fn client_config(url: Option<&str>, env_url: Option<String>, timeout_ms: u64) -> ClientConfig {
    let config = ClientConfig::default().with_timeout_ms(timeout_ms);
    match url.map(str::to_owned).or(env_url) {
        Some(url) => config.with_url(url),
        None => config,
    }
}

async fn connect(cli: &Cli) -> Result<XmlRpcClient> {
    let config = client_config(
        cli.url.as_deref(),
        std::env::var("SPRPC_URL").ok(),
        cli.timeout_ms,
    );
    let socket = cli
        .socket
        .clone()
        .or_else(|| std::env::var("SPRPC_SOCKET").ok());

    match socket {
        #[cfg(unix)]
        Some(path) => {
            tracing::debug!(%path, url = %config.url, "connecting over unix socket");
            XmlRpcClient::connect_unix(&config, &path)
                .await
                .with_context(|| format!("cannot connect to {}", path))
        }
        #[cfg(not(unix))]
        Some(_) => Err(anyhow::anyhow!("unix sockets are not supported on this platform")),
        None => {
            tracing::debug!(url = %config.url, "connecting over TCP");
            XmlRpcClient::connect(&config)
                .await
                .with_context(|| format!("cannot connect to {}", config.url))
        }
    }
}

async fn run(client: XmlRpcClient, command: Commands) -> Result<()> {
    let supervisor = Supervisor::bind(&client);

    match command {
        Commands::State(_) => {
            print_json(&supervisor.get_state.call(()).await?)?;
        }
        Commands::Pid(_) => {
            println!("{}", supervisor.get_pid.call(()).await?);
        }
        Commands::Version(_) => {
            let (api, daemon, identification) = client
                .multicall((
                    supervisor.get_api_version.build(()),
                    supervisor.get_supervisor_version.build(()),
                    supervisor.get_identification.build(()),
                ))
                .await?;
            print_json(&serde_json::json!({
                "api_version": api,
                "supervisor_version": daemon,
                "identification": identification,
            }))?;
        }
        Commands::Status(args) => {
            let infos = match args.name {
                Some(name) => vec![supervisor.get_process_info.call(name).await?],
                None => supervisor.get_all_process_info.call(()).await?,
            };
            for info in &infos {
                println!("{}", status_line(info));
            }
        }
        Commands::Start(args) => {
            supervisor
                .start_process
                .call((args.name.clone(), Some(!args.no_wait)))
                .await?;
            println!("{}: started", args.name);
        }
        Commands::Stop(args) => {
            supervisor
                .stop_process
                .call((args.name.clone(), Some(!args.no_wait)))
                .await?;
            println!("{}: stopped", args.name);
        }
        Commands::RestartAll(_) => {
            let stopped = supervisor.stop_all_processes.call(Some(true)).await?;
            report_statuses("stopped", &stopped);
            let started = supervisor.start_all_processes.call(Some(true)).await?;
            report_statuses("started", &started);
        }
        Commands::Reload(_) => {
            print_json(&supervisor.reload_config.call(()).await?)?;
        }
        Commands::Tail(args) => {
            let tail = supervisor
                .tail_process_stdout_log
                .call((args.name, 0, args.bytes))
                .await?;
            print!("{}", tail.bytes);
        }
        Commands::Call(args) => {
            let json_args = args
                .args
                .iter()
                .map(|arg| {
                    serde_json::from_str(arg)
                        .map_err(|e| anyhow::anyhow!("Invalid JSON in argument '{}': {}", arg, e))
                })
                .collect::<Result<Vec<serde_json::Value>>>()?;
            let call = method_call_from_json(args.method, &json_args)?;
            let result = client.call(&call).await?;
            println!("{}", serde_json::to_string(&to_json(&result))?);
        }
    }

    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn status_line(info: &ProcessInfo) -> String {
    let name = if info.group == info.name {
        info.name.clone()
    } else {
        format!("{}:{}", info.group, info.name)
    };
    format!("{:<33} {:<10} {}", name, info.statename, info.description)
}

fn report_statuses(action: &str, statuses: &[ProcessStatus]) {
    for status in statuses {
        if status.status == SUCCESS {
            println!("{}: {}", status.name, action);
        } else {
            tracing::warn!(name = %status.name, code = status.status, "{}", status.description);
            println!("{}: ERROR ({})", status.name, status.description);
        }
    }
}

/// CLI argument parsing tests.
#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::from_args(&["sprpc"], args).unwrap()
    }

    #[test]
    fn test_cli_parse_defaults() {
        let cli = parse(&["state"]);
        assert!(cli.url.is_none());
        assert!(cli.socket.is_none());
        assert_eq!(cli.timeout_ms, 30000);
        assert!(matches!(cli.command, Commands::State(_)));
    }

    #[test]
    fn test_cli_parse_endpoint_options() {
        let cli = parse(&["--url", "http://127.0.0.1:9001/RPC2", "--socket", "/tmp/s.sock", "pid"]);
        assert_eq!(cli.url.as_deref(), Some("http://127.0.0.1:9001/RPC2"));
        assert_eq!(cli.socket.as_deref(), Some("/tmp/s.sock"));
        assert!(matches!(cli.command, Commands::Pid(_)));
    }

    #[test]
    fn test_cli_parse_status() {
        match parse(&["status"]).command {
            Commands::Status(StatusArgs { name }) => assert!(name.is_none()),
            _ => panic!("Expected Status command"),
        }
        match parse(&["status", "web"]).command {
            Commands::Status(StatusArgs { name }) => assert_eq!(name.as_deref(), Some("web")),
            _ => panic!("Expected Status command"),
        }
    }

    #[test]
    fn test_cli_parse_start_stop() {
        match parse(&["start", "web"]).command {
            Commands::Start(StartArgs { name, no_wait }) => {
                assert_eq!(name, "web");
                assert!(!no_wait);
            }
            _ => panic!("Expected Start command"),
        }
        match parse(&["stop", "web", "--no-wait"]).command {
            Commands::Stop(StopArgs { name, no_wait }) => {
                assert_eq!(name, "web");
                assert!(no_wait);
            }
            _ => panic!("Expected Stop command"),
        }
    }

    #[test]
    fn test_cli_parse_tail() {
        match parse(&["tail", "web"]).command {
            Commands::Tail(TailArgs { name, bytes }) => {
                assert_eq!(name, "web");
                assert_eq!(bytes, 1600); // default
            }
            _ => panic!("Expected Tail command"),
        }
        match parse(&["tail", "web", "--bytes", "10"]).command {
            Commands::Tail(TailArgs { bytes, .. }) => assert_eq!(bytes, 10),
            _ => panic!("Expected Tail command"),
        }
    }

    #[test]
    fn test_cli_parse_call() {
        match parse(&["call", "supervisor.readLog", "0", "500"]).command {
            Commands::Call(CallArgs { method, args }) => {
                assert_eq!(method, "supervisor.readLog");
                assert_eq!(args, vec!["0".to_string(), "500".to_string()]);
            }
            _ => panic!("Expected Call command"),
        }
    }

    #[test]
    fn test_cli_parse_rejects_unknown_command() {
        assert!(Cli::from_args(&["sprpc"], &["explode"]).is_err());
    }

    #[test]
    fn test_client_config_precedence() {
        let config = client_config(Some("http://flag/RPC2"), Some("http://env/RPC2".into()), 5);
        assert_eq!(config.url, "http://flag/RPC2");
        assert_eq!(config.timeout_ms, 5);

        let config = client_config(None, Some("http://env/RPC2".into()), 5);
        assert_eq!(config.url, "http://env/RPC2");

        let config = client_config(None, None, 5);
        assert_eq!(config.url, ClientConfig::default().url);
    }

    #[test]
    fn test_status_line() {
        let info = ProcessInfo {
            name: "web_0".into(),
            group: "web".into(),
            description: "pid 42, uptime 0:01:00".into(),
            start: 0,
            stop: 0,
            now: 0,
            state: 20,
            statename: "RUNNING".into(),
            spawnerr: String::new(),
            exitstatus: 0,
            logfile: String::new(),
            stdout_logfile: String::new(),
            stderr_logfile: String::new(),
            pid: 42,
        };
        let line = status_line(&info);
        assert!(line.starts_with("web:web_0 "));
        assert!(line.contains("RUNNING"));
        assert!(line.ends_with("pid 42, uptime 0:01:00"));
    }
}
