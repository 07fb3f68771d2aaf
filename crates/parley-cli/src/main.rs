//! Parley terminal client.
//!
//! # Usage
//!
//! ```bash
//! # Plaintext chat against a local relay
//! parley --username alice
//!
//! # RSA variant, keys next to the binary
//! parley --host 10.0.0.5 --port 1234 --username bob --mode rsa
//!
//! # AES pairwise variant, encrypting for carol from the start
//! parley --username alice --mode aes --to carol --encrypt --key-dir /srv/parley
//! ```
//!
//! Chat output goes to stdout, logs go to stderr.

mod input;

use std::{io, path::PathBuf, time::Duration};

use clap::Parser;
use parley_client::{ChatSession, ClientConfig, SessionEvents, SessionState};
use parley_crypto::StrategyKind;
use parley_proto::Username;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin, Stdout},
    sync::mpsc,
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::input::{Composer, parse_line};

/// Parley chat client
#[derive(Parser, Debug)]
#[command(name = "parley")]
#[command(about = "Terminal client for Parley chat relays")]
#[command(version)]
struct Args {
    /// Relay host name or IP address
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Relay TCP port
    #[arg(short, long, default_value_t = 1234)]
    port: u16,

    /// Username (prompted for if omitted)
    #[arg(short, long)]
    username: Option<String>,

    /// Encryption mode (plain, rsa, aes)
    #[arg(short, long, default_value = "plain")]
    mode: StrategyKind,

    /// Directory for key files
    #[arg(long, default_value = ".")]
    key_dir: PathBuf,

    /// Width of the frame length header
    #[arg(long, default_value_t = 10)]
    header_width: usize,

    /// Seconds to wait for the relay to accept the connection
    #[arg(long, default_value_t = 10)]
    connect_timeout: u64,

    /// Initial recipient for encrypted messages
    #[arg(short, long)]
    to: Option<String>,

    /// Encrypt messages from the start
    #[arg(short, long)]
    encrypt: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

impl Args {
    fn client_config(&self) -> ClientConfig {
        ClientConfig {
            relay_host: self.host.clone(),
            relay_port: self.port,
            header_width: self.header_width,
            key_dir: self.key_dir.clone(),
            connect_timeout: Duration::from_secs(self.connect_timeout),
            ..ClientConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer().with_writer(io::stderr)).with(filter).init();

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    let username = match args.username.clone() {
        Some(name) => name,
        None => match prompt_username(&mut stdin, &mut stdout).await? {
            Some(name) => name,
            None => return Ok(()),
        },
    };

    tracing::info!(mode = %args.mode, relay = %args.client_config().relay_addr(), "starting");

    let session = ChatSession::new(args.client_config(), &username, args.mode)?;
    let (handle, events) = session.connect().await?;
    write_line(&mut stdout, &format!("Вы вошли как: {}", handle.username())).await?;

    // Session events and local feedback share one writer so lines never interleave
    let (local, local_lines) = mpsc::unbounded_channel();
    let printer = tokio::spawn(print_output(events, local_lines));

    let mut composer = Composer::new(args.to.clone(), args.encrypt);
    let mut state = handle.subscribe_state();

    loop {
        let line = tokio::select! {
            line = stdin.next_line() => line?,
            _ = state.wait_for(|s| *s == SessionState::Closed) => break,
        };

        // EOF on stdin ends the session like /quit
        let Some(line) = line else { break };

        let outcome = composer.apply(parse_line(&line));
        if let Some(output) = outcome.output {
            if local.send(output).is_err() {
                break;
            }
        }
        for command in outcome.commands {
            handle.submit(command).await;
        }
    }

    handle.exit().await;
    printer.await??;

    Ok(())
}

/// Write session events and local lines to stdout until the session closes.
async fn print_output(
    mut events: SessionEvents,
    mut local: mpsc::UnboundedReceiver<String>,
) -> io::Result<()> {
    let mut stdout = tokio::io::stdout();

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { return Ok(()) };
                write_line(&mut stdout, &event.to_string()).await?;
                if event.is_closed() {
                    return Ok(());
                }
            },
            Some(line) = local.recv() => write_line(&mut stdout, &line).await?,
        }
    }
}

/// Ask for a username until a valid one is entered. `None` on EOF.
async fn prompt_username(
    stdin: &mut Lines<BufReader<Stdin>>,
    stdout: &mut Stdout,
) -> io::Result<Option<String>> {
    loop {
        stdout.write_all("Введите имя пользователя: ".as_bytes()).await?;
        stdout.flush().await?;

        let Some(line) = stdin.next_line().await? else {
            return Ok(None);
        };

        match Username::new(&line) {
            Ok(name) => return Ok(Some(name.to_string())),
            Err(e) => write_line(stdout, &format!("Ошибка: {e}")).await?,
        }
    }
}

async fn write_line(stdout: &mut Stdout, line: &str) -> io::Result<()> {
    stdout.write_all(line.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await
}
