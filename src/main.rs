use clap::{Arg, Command};
use log::{debug, info, warn};
use std::sync::Arc;
use std::{panic, process};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use videoscramble::config::{self, RunConfig, parse_key};
use videoscramble::display::PreviewChannel;
use videoscramble::pipeline::ScrambleCoordinator;
use videoscramble::scramble::Direction;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let matches = Command::new(config::app_name())
        .version(config::version())
        .author(env!("CARGO_PKG_AUTHORS"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .arg(
            Arg::new("input")
                .short('i')
                .long("input")
                .value_name("FILE")
                .help("Video file to process.")
                .required(true),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FILE")
                .help("Where the processed stream is written.")
                .default_value("output.avi"),
        )
        .arg(
            Arg::new("key")
                .short('k')
                .long("key")
                .value_name("KEY")
                .help("Integer scramble key; the same key restores the stream.")
                .default_value("4"),
        )
        .arg(
            Arg::new("mode")
                .short('m')
                .long("mode")
                .value_name("MODE")
                .help("encrypt scrambles rows, decrypt restores them.")
                .value_parser(["encrypt", "decrypt"])
                .ignore_case(true)
                .default_value("encrypt"),
        )
        .get_matches();

    let key = match parse_key(matches.get_one::<String>("key").unwrap()) {
        Ok(key) => key,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(2);
        }
    };
    let direction = if matches
        .get_one::<String>("mode")
        .unwrap()
        .eq_ignore_ascii_case("decrypt")
    {
        Direction::Inverse
    } else {
        Direction::Forward
    };
    let config = RunConfig::new(
        matches.get_one::<String>("input").unwrap().into(),
        matches.get_one::<String>("output").unwrap().into(),
        direction,
    );

    // kill the main thread as soon as a secondary thread panics
    let orig_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        orig_hook(panic_info);
        process::exit(105);
    }));

    // SIGINT/SIGTERM funnel into the coordinator's stop path
    let shutdown = CancellationToken::new();
    let shutdown_signal = shutdown.clone();
    ctrlc::set_handler(move || {
        shutdown_signal.cancel();
    })
    .expect("Error setting Ctrl-C handler");

    // Headless presentation surface: drain previews and log progress.
    let (preview, mut preview_rx) = PreviewChannel::new(8);
    tokio::spawn(async move {
        let mut frames = 0u64;
        while let Some(pair) = preview_rx.recv().await {
            frames += 1;
            if frames % 30 == 0 {
                info!("processed {} frames ({})", frames, pair.processed.geometry());
            }
        }
    });

    let mut coordinator = ScrambleCoordinator::new(config, key, Arc::new(preview));
    coordinator.start()?;
    println!("{}", coordinator.status_line());
    println!("Type a new key and press enter to change it mid-run.");

    let mut state_rx = coordinator.subscribe_state();
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        // The run may already have wound down (a short input hits
        // end-of-stream on its first tick); check before blocking on the
        // next transition.
        if state_rx.borrow_and_update().is_idle() {
            break;
        }

        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("shutdown requested");
                coordinator.request_shutdown().await;
                break;
            }
            line = stdin.next_line(), if stdin_open => {
                match line {
                    Ok(Some(text)) if !text.trim().is_empty() => {
                        match coordinator.update_key_from_text(&text) {
                            Ok(key) => println!("Key updated to: {}", key),
                            Err(e) => warn!("{}, keeping key {}", e, coordinator.key()),
                        }
                    }
                    Ok(Some(_)) => {}
                    _ => {
                        debug!("stdin closed, key edits disabled");
                        stdin_open = false;
                    }
                }
            }
            changed = state_rx.changed() => {
                if changed.is_err() || state_rx.borrow_and_update().is_idle() {
                    break;
                }
            }
        }
    }

    // Joins the worker and finalizes handles; a no-op after end-of-stream.
    coordinator.stop().await;
    println!("{}", coordinator.status_line());
    Ok(())
}
