//! `roomfeed` binary.

use std::{error::Error, io::Write, time::Duration};

use clap::Parser;
use roomfeed_cli::{Args, Command, TimelinePrinter, commands, render};
use roomfeed_client::{
    ClientConfig, ClientError, HttpHistoryStore, SessionHandle, WebSocketTransport,
};
use roomfeed_core::{ConnectionState, SystemEnv};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast::error::RecvError,
};
use tracing_subscriber::EnvFilter;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&args.log_level))?;
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let transport = WebSocketTransport::new(args.broker_url.clone());
    let mut history = HttpHistoryStore::new(args.history_url.clone());
    if let Some(token) = &args.token {
        history = history.with_bearer(token.clone());
    }
    let config = ClientConfig::new(args.author());
    let handshake_timeout = config.session.connection.handshake_timeout;
    let handle = roomfeed_client::spawn(transport, history, SystemEnv, config);
    tokio::spawn(print_updates(handle.clone()));

    if !args.offline {
        handle.connect(args.credentials()).await?;
        if let Some(room_id) = args.initial_room() {
            let mut state = handle.state();
            let connected = tokio::time::timeout(
                handshake_timeout,
                state.wait_for(|state| *state != ConnectionState::Connecting),
            )
            .await;
            if matches!(connected, Ok(Ok(state)) if *state == ConnectionState::Connected) {
                report(handle.switch_room(room_id).await);
            }
        }
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match commands::parse(&line) {
            Command::Connect => report(handle.connect(args.credentials()).await),
            Command::Disconnect => report(handle.disconnect().await),
            Command::Join { room_id } => report(handle.switch_room(room_id).await),
            Command::Room => {
                let room_id = handle.timeline().borrow().room_id;
                match room_id {
                    Some(room_id) => say(&format!("in room {room_id}")),
                    None => say("not in a room"),
                }
            },
            Command::Help => say(commands::HELP),
            Command::Quit => break,
            Command::Message { content } if content.is_empty() => {},
            Command::Message { content } => report(handle.send(content).await),
            Command::Unknown { input } => say(&format!("unknown command: {input} (try /help)")),
            Command::InvalidArgs { command, error } => say(&format!("/{command}: {error}")),
        }
    }

    shutdown(&handle).await;
    Ok(())
}

/// Leave cleanly if connected, giving the broker a moment to confirm.
async fn shutdown(handle: &SessionHandle) {
    if handle.connection_state() != ConnectionState::Connected {
        return;
    }
    report(handle.disconnect().await);
    let mut state = handle.state();
    let _ = tokio::time::timeout(
        SHUTDOWN_GRACE,
        state.wait_for(|state| *state != ConnectionState::Disconnecting),
    )
    .await;
}

async fn print_updates(handle: SessionHandle) {
    let mut state = handle.state();
    let mut timeline = handle.timeline();
    let mut notices = handle.notices();
    let mut printer = TimelinePrinter::new();
    drop(handle);

    loop {
        tokio::select! {
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *state.borrow_and_update();
                say(&render::state_line(current));
            },
            changed = timeline.changed() => {
                if changed.is_err() {
                    break;
                }
                let lines = printer.update(&timeline.borrow_and_update());
                for line in lines {
                    say(&line);
                }
            },
            notice = notices.recv() => match notice {
                Ok(notice) => say(&render::notice_line(&notice)),
                Err(RecvError::Lagged(missed)) => tracing::warn!(missed, "notices dropped"),
                Err(RecvError::Closed) => break,
            },
        }
    }
}

fn report(result: Result<(), ClientError>) {
    if let Err(err) = result {
        say(&format!("! {err}"));
    }
}

fn say(line: &str) {
    let mut out = std::io::stdout().lock();
    if writeln!(out, "{line}").is_err() {
        tracing::debug!("stdout closed");
    }
}
