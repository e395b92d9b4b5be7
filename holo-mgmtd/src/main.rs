//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

mod config;

use clap::{App, Arg};
use config::{Config, LoggingFileRotation, LoggingFmtStyle};
use holo_mgmt::Master;
use holo_mgmt::datastore::MemoryDatastore;
use holo_mgmt::show::ShowRequest;
use holo_mgmt::tasks::messages::input::ShowMsg;
use holo_mgmt::txn::TxnManager;
use holo_utils::Sender;
use nix::unistd::{Uid, User};
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::{mpsc, oneshot};
use tracing::level_filters::LevelFilter;
use tracing::{error, info};
use tracing_appender::rolling;
use tracing_subscriber::Layer;
use tracing_subscriber::prelude::*;

fn init_tracing(config: &config::Logging) {
    // Enable logging to journald.
    let journald = config.journald.enabled.then(|| {
        tracing_journald::layer().expect("couldn't connect to journald")
    });

    // Enable logging to a file.
    let file = config.file.enabled.then(|| {
        let file_appender = match config.file.rotation {
            LoggingFileRotation::Never => {
                rolling::never(&config.file.dir, &config.file.name)
            }
            LoggingFileRotation::Hourly => {
                rolling::hourly(&config.file.dir, &config.file.name)
            }
            LoggingFileRotation::Daily => {
                rolling::daily(&config.file.dir, &config.file.name)
            }
        };

        let log_level_filter = LevelFilter::from_level(tracing::Level::TRACE);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(file_appender)
            .with_target(false)
            .with_thread_ids(config.file.fmt.show_thread_id)
            .with_file(config.file.fmt.show_source)
            .with_line_number(config.file.fmt.show_source)
            .with_ansi(config.file.fmt.colors);
        let layer = match config.file.fmt.style {
            LoggingFmtStyle::Compact => layer.compact().boxed(),
            LoggingFmtStyle::Full => layer.boxed(),
            LoggingFmtStyle::Json => layer.json().boxed(),
            LoggingFmtStyle::Pretty => layer.pretty().boxed(),
        };
        layer.with_filter(log_level_filter)
    });

    // Enable logging to stdout.
    let stdout = config.stdout.enabled.then(|| {
        let log_level_filter = LevelFilter::from_level(tracing::Level::TRACE);
        let layer = tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_ids(config.stdout.fmt.show_thread_id)
            .with_file(config.stdout.fmt.show_source)
            .with_line_number(config.stdout.fmt.show_source)
            .with_ansi(config.stdout.fmt.colors);
        let layer = match config.stdout.fmt.style {
            LoggingFmtStyle::Compact => layer.compact().boxed(),
            LoggingFmtStyle::Full => layer.boxed(),
            LoggingFmtStyle::Json => layer.json().boxed(),
            LoggingFmtStyle::Pretty => layer.pretty().boxed(),
        };
        layer.with_filter(log_level_filter)
    });

    let env_filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive("holo=debug".parse().unwrap())
        .from_env_lossy();
    tracing_subscriber::registry()
        .with(env_filter)
        .with(journald)
        .with(file)
        .with(stdout)
        .init();
}

fn load_startup_config(path: Option<&str>) -> MemoryDatastore {
    let Some(path) = path else {
        return MemoryDatastore::default();
    };

    let datastore = std::fs::read_to_string(path)
        .map_err(|error| error.to_string())
        .and_then(|data| {
            MemoryDatastore::from_json(&data).map_err(|error| error.to_string())
        });
    match datastore {
        Ok(datastore) => {
            info!(%path, entries = datastore.len(), "loaded startup config");
            datastore
        }
        Err(error) => {
            error!(%path, %error, "failed to load startup config");
            MemoryDatastore::default()
        }
    }
}

fn privdrop(user: &str) -> nix::Result<()> {
    // Drop to unprivileged user and group.
    if let Some(user) = User::from_name(user)? {
        nix::unistd::setgroups(&[user.gid])?;
        nix::unistd::setresgid(user.gid, user.gid, user.gid)?;
        nix::unistd::setresuid(user.uid, user.uid, user.uid)?;
    } else {
        error!(name = %user, "failed to find user");
        std::process::exit(1);
    }

    Ok(())
}

fn signal_listener() -> mpsc::Receiver<()> {
    let (signal_tx, signal_rx) = mpsc::channel(1);

    tokio::task::spawn(async move {
        let mut sigint = signal(SignalKind::interrupt()).unwrap();
        let mut sigterm = signal(SignalKind::terminate()).unwrap();

        tokio::select! {
            _ = sigint.recv() => {
                info!("received SIGINT");
                let _ = signal_tx.send(()).await;
            },
            _ = sigterm.recv() => {
                info!("received SIGTERM");
                let _ = signal_tx.send(()).await;
            }
        }
    });

    signal_rx
}

// Dumps the adapter and registration state on SIGUSR1.
fn show_listener(showp: Sender<ShowMsg>) {
    tokio::task::spawn(async move {
        let mut sigusr1 = signal(SignalKind::user_defined1()).unwrap();

        while sigusr1.recv().await.is_some() {
            info!("received SIGUSR1");
            for request in [
                ShowRequest::AdapterStatus,
                ShowRequest::XpathRegistry,
                ShowRequest::XpathSubscrInfo("/".to_owned()),
            ] {
                let (responder_tx, responder_rx) = oneshot::channel();
                let msg = ShowMsg {
                    request,
                    responder: responder_tx,
                };
                if showp.send(msg).await.is_err() {
                    return;
                }
                let Ok(reply) = responder_rx.await else {
                    return;
                };
                match serde_json::to_string(&reply) {
                    Ok(reply) => info!(%reply, "backend state"),
                    Err(error) => error!(%error, "failed to encode report"),
                }
            }
        }
    });
}

fn build_version() -> String {
    const VERSION: &str = env!("CARGO_PKG_VERSION");
    match rustc_tools_util::get_version_info!().commit_hash {
        Some(hash) => format!("{VERSION} ({hash})"),
        None => VERSION.to_owned(),
    }
}

// ===== main =====

fn main() {
    // Parse command-line parameters.
    let matches = App::new("Holo management daemon")
        .version(build_version().as_str())
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("file")
                .help("Specify an alternative configuration file."),
        )
        .get_matches();

    // Read configuration file.
    let config_file = matches.value_of("config");
    let config = Config::load(config_file);

    // Check for root privileges.
    if !Uid::effective().is_root() {
        eprintln!("need privileged user");
        std::process::exit(1);
    }

    // Initialize tracing.
    init_tracing(&config.logging);

    // We're ready to go!
    info!("starting up");

    // Main loop.
    let main = || async {
        // Spawn signal listener.
        let mut signal_rx = signal_listener();

        // Initialize the backend adapter registry.
        let datastore = load_startup_config(config.startup_config.as_deref());
        let (mut master, rx) = Master::new(
            config.backend.clone(),
            Box::new(datastore),
            Box::new(TxnManager::default()),
        );
        if let Err(error) = master.listen() {
            error!(%error, "failed to listen for backend clients");
            std::process::exit(1);
        }

        // Drop privileges.
        if let Err(error) = privdrop(&config.user) {
            error!(%error, "failed to drop root privileges");
            std::process::exit(1);
        }

        show_listener(master.tx.show.clone());

        // Serve backend clients until a termination signal arrives.
        tokio::select! {
            _ = master.run(rx) => {},
            _ = signal_rx.recv() => {},
        }
        master.destroy();
    };
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to create async runtime")
        .block_on(async {
            main().await;
        });

    info!("exiting");
}
