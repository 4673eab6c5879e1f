use clap::{Parser, Subcommand};
use log::{debug, error, info};
use rcon::{Session, Timeouts};
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use watchdog::config::{
    PollerConfig, WatchdogConfig, DEFAULT_FAILURE_INTERVAL, DEFAULT_SUCCESS_INTERVAL,
};
use watchdog::error::WatchdogError;
use watchdog::http::{self, AppState};
use watchdog::poller::Poller;
use watchdog::probe::{self, Protocol};
use watchdog::status::StatusStore;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Exit successfully only if a local port is listening
    Islisten {
        /// tcp or udp
        protocol: String,
        port: u16,
    },

    /// Send one RCON command and print the response
    Send {
        host: String,
        port: u16,
        password: String,
        command: String,
    },

    /// Poll the server's player list and serve its status over HTTP
    Watchdog {
        /// Address for the HTTP status server, e.g. 0.0.0.0:8080
        listen_addr: String,
        /// RCON server address, host:port
        rcon_addr: String,
        password: String,
        /// Log file exposed at /log
        log_path: Option<PathBuf>,

        /// Seconds between polls while the server is healthy
        #[arg(long, default_value_t = DEFAULT_SUCCESS_INTERVAL.as_secs())]
        success_interval_secs: u64,

        /// Seconds before retrying after a failed poll
        #[arg(long, default_value_t = DEFAULT_FAILURE_INTERVAL.as_secs())]
        failure_interval_secs: u64,

        #[command(flatten)]
        timeouts: TimeoutArgs,
    },
}

#[derive(clap::Args, Debug)]
struct TimeoutArgs {
    /// Seconds allowed for connecting to the RCON server
    #[arg(long, default_value = "10")]
    dial_timeout_secs: u64,

    /// Seconds allowed for each RCON write
    #[arg(long, default_value = "10")]
    io_timeout_secs: u64,

    /// Seconds allowed for each RCON response packet
    #[arg(long, default_value = "30")]
    read_timeout_secs: u64,

    /// Seconds allowed for a whole command exchange
    #[arg(long, default_value = "60")]
    command_timeout_secs: u64,
}

impl From<TimeoutArgs> for Timeouts {
    fn from(args: TimeoutArgs) -> Self {
        Timeouts {
            dial: Duration::from_secs(args.dial_timeout_secs),
            write: Duration::from_secs(args.io_timeout_secs),
            read: Duration::from_secs(args.read_timeout_secs),
            command: Duration::from_secs(args.command_timeout_secs),
        }
    }
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    if let Err(e) = run(cli.command).await {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

async fn run(command: Command) -> Result<(), WatchdogError> {
    match command {
        Command::Islisten { protocol, port } => {
            let protocol: Protocol = protocol.parse()?;
            probe::check_listening(protocol, port)?;
            Ok(())
        }
        Command::Send {
            host,
            port,
            password,
            command,
        } => send_command(&format!("{}:{}", host, port), &password, &command).await,
        Command::Watchdog {
            listen_addr,
            rcon_addr,
            password,
            log_path,
            success_interval_secs,
            failure_interval_secs,
            timeouts,
        } => {
            let mut poller = PollerConfig::new(rcon_addr, password);
            poller.timeouts = timeouts.into();
            poller.success_interval = Duration::from_secs(success_interval_secs);
            poller.failure_interval = Duration::from_secs(failure_interval_secs);

            let mut config = WatchdogConfig::new(listen_addr, poller);
            config.log_path = log_path;

            run_watchdog(config).await
        }
    }
}

/// Dials, runs a single command, and prints whatever came back.
async fn send_command(addr: &str, password: &str, command: &str) -> Result<(), WatchdogError> {
    let mut session = Session::dial(addr, password, Timeouts::default()).await?;
    let response = session.execute(command).await;
    if let Err(e) = session.close().await {
        debug!("Error while closing RCON session: {}", e);
    }

    print!("{}", response?);
    Ok(())
}

/// Runs the poller and the HTTP server until Ctrl+C or a server failure.
async fn run_watchdog(config: WatchdogConfig) -> Result<(), WatchdogError> {
    let listener = TcpListener::bind(&config.listen_addr)
        .await
        .map_err(|source| WatchdogError::Bind {
            addr: config.listen_addr.clone(),
            source,
        })?;

    let store = StatusStore::new();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let app = http::router(AppState::new(store.clone(), config.log_path.clone()));
    let poller = Poller::new(config.poller.clone(), store);

    let poller_handle = tokio::spawn(poller.run(shutdown_rx.clone()));
    let mut server_handle = tokio::spawn(http::serve(
        listener,
        app,
        config.header_read_timeout,
        shutdown_rx,
    ));

    let finished = tokio::select! {
        joined = &mut server_handle => Some(joined),
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
            None
        }
    };

    // Receivers may already be gone if both tasks ended
    let _ = shutdown_tx.send(true);

    if let Err(e) = poller_handle.await {
        error!("Roster poller task failed: {}", e);
    }

    let joined = match finished {
        Some(joined) => joined,
        None => server_handle.await,
    };

    match joined {
        Ok(result) => result.map_err(WatchdogError::from),
        Err(e) => Err(WatchdogError::Task(e.to_string())),
    }
}
