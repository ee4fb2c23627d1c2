use anyhow::Result;
use colored::Colorize;
use rustyline::highlight::Highlighter;
use rustyline::Editor;
use rustyline_derive::{Completer, Helper, Hinter, Validator};
use sceew::prelude::*;
use sceew::{ENGINE_NAME, VERSION as LIB_VERSION};
use std::borrow::Cow;
use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const SHELL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// A custom helper struct for rustyline that enables syntax highlighting.
#[derive(Completer, Helper, Hinter, Validator)]
struct ShellHighlighter;

impl Highlighter for ShellHighlighter {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if let Some((command, rest)) = line.split_once(' ') {
            Cow::Owned(format!("{} {}", command.yellow().bold(), rest.yellow()))
        } else {
            Cow::Owned(line.yellow().bold().to_string())
        }
    }
    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

fn print_banner() {
    if env::var("QUIET_MODE").is_ok() {
        return;
    }
    println!("{}", "  SCEEW  Sichuan earthquake early-warning client".cyan().bold());
    println!(
        "{}",
        "-----------------------------------------------------------------------".dimmed()
    );
    println!(
        "          Shell   v{:<8} Library   v{:<8}",
        SHELL_VERSION, LIB_VERSION
    );
    let license_blurb = "
    This software is provided 'as is', without warranty of any kind.
    Estimates are advisory only. Follow official instructions.
    ";
    println!("{}", license_blurb.dimmed());
    println!(
        "{}",
        "-----------------------------------------------------------------------".dimmed()
    );
}

/// Prints system events always and alert events while `watch` is on.
fn spawn_event_listeners(engine: &SceewEngine, watching: Arc<AtomicBool>) {
    let mut system_rx = engine.subscribe_system_events();
    tokio::spawn(async move {
        while let Ok(event) = system_rx.recv().await {
            println!("\n<-- [SYSTEM EVENT] {:?}", event);
        }
    });

    let mut alert_rx = engine.subscribe_alert_events();
    tokio::spawn(async move {
        while let Ok(event) = alert_rx.recv().await {
            if !watching.load(Ordering::Relaxed) {
                continue;
            }
            match event {
                AlertEvent::Triggered { .. } => println!("\n<-- {} {:?}", "[ALERT]".red().bold(), event),
                other => println!("\n<-- [ALERT] {:?}", other),
            }
        }
    });
}

fn parse_switch(arg: Option<&&str>) -> Option<bool> {
    match arg.copied() {
        Some("on") => Some(true),
        Some("off") => Some(false),
        _ => None,
    }
}

fn print_observer(observer: &ObserverConfig) {
    println!(
        "    observer  {} ({:.4}, {:.4})  audio={} window={} notify={}",
        observer.name,
        observer.latitude,
        observer.longitude,
        observer.audio_enabled,
        observer.auto_window,
        observer.notifications
    );
}

/// Reads the engine's observer, applies `edit`, and saves the result.
async fn edit_observer(handle: &EngineHandle, edit: impl FnOnce(&mut ObserverConfig)) {
    let mut observer = match handle.observer().await {
        Ok(observer) => observer,
        Err(e) => {
            println!("Error: {}", e);
            return;
        }
    };
    edit(&mut observer);
    match handle.save_observer(observer.clone()).await {
        Ok(()) => {
            println!("--> Observer saved. The next report will not raise an alert.");
            print_observer(&observer);
        }
        Err(e) => println!("Error: {}", e),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    print_banner();

    let path = env::args_os().nth(1).map(std::path::PathBuf::from);
    let config = SceewConfig::load(path.as_deref())?;
    sceew::logging::init(&config.logging)?;

    let engine = SceewEngine::new(config, Services::console());
    let handle = engine.handle();

    let watching = Arc::new(AtomicBool::new(true));
    spawn_event_listeners(&engine, watching.clone());

    info!("Spawning {} in the background...", ENGINE_NAME.cyan());
    tokio::spawn(async move {
        if let Err(e) = engine.run().await {
            eprintln!("\nEngine stopped with an error: {}", e);
        }
    });

    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut rl = Editor::new()?;
    rl.set_helper(Some(ShellHighlighter));

    println!("{} is running. Type 'help' for commands or 'exit' to quit.", ENGINE_NAME.cyan());

    loop {
        let prompt = format!("{}", ">> ".cyan().bold());
        match rl.readline(&prompt) {
            Ok(line) => {
                rl.add_history_entry(line.as_str())?;
                let args = line.split_whitespace().collect::<Vec<_>>();

                let Some(command) = args.first() else {
                    continue;
                };
                match *command {
                    "status" => match handle.snapshot().await {
                        Ok(snapshot) => {
                            let feed = if handle.is_connected() {
                                "connected".green()
                            } else {
                                "disconnected".red()
                            };
                            println!("    feed      {}", feed);
                            println!(
                                "    session   active={} event_time={} suppress_next={}",
                                snapshot.active,
                                snapshot
                                    .event_time
                                    .map(|t| t.to_rfc3339())
                                    .unwrap_or_else(|| "-".to_string()),
                                snapshot.suppressed_once
                            );
                            match handle.observer().await {
                                Ok(observer) => print_observer(&observer),
                                Err(e) => println!("    observer  unavailable: {}", e),
                            }
                        }
                        Err(e) => println!("Error: {}", e),
                    },
                    "observer" => {
                        let lat = args.get(1).and_then(|s| s.parse::<f64>().ok());
                        let lon = args.get(2).and_then(|s| s.parse::<f64>().ok());
                        match (lat, lon) {
                            (Some(lat), Some(lon))
                                if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon) =>
                            {
                                let name = (args.len() > 3).then(|| args[3..].join(" "));
                                edit_observer(&handle, |observer| {
                                    observer.latitude = lat;
                                    observer.longitude = lon;
                                    if let Some(name) = name {
                                        observer.name = name;
                                    }
                                })
                                .await;
                            }
                            _ => println!("Usage: observer <LAT> <LON> [NAME...]"),
                        }
                    }
                    "audio" | "window" | "notify" => match parse_switch(args.get(1)) {
                        Some(on) => {
                            let switch = *command;
                            edit_observer(&handle, |observer| match switch {
                                "audio" => observer.audio_enabled = on,
                                "window" => observer.auto_window = on,
                                _ => observer.notifications = on,
                            })
                            .await;
                        }
                        None => println!("Usage: {} on|off", command),
                    },
                    "resync" => match handle.resync().await {
                        Ok(()) => println!("--> Resync requested."),
                        Err(e) => println!("Error: {}", e),
                    },
                    "inject" => {
                        let payload = line.trim_start().trim_start_matches("inject").trim();
                        if let Err(e) = serde_json::from_str::<serde_json::Value>(payload) {
                            println!("Error: not valid JSON: {}", e);
                        } else if let Err(e) = handle.inject(payload).await {
                            println!("Error: {}", e);
                        }
                    }
                    "watch" => match parse_switch(args.get(1)) {
                        Some(on) => {
                            watching.store(on, Ordering::Relaxed);
                            println!("--> Alert events {}.", if on { "shown" } else { "hidden" });
                        }
                        None => println!("Usage: watch on|off"),
                    },
                    "help" => {
                        println!("Available commands:");
                        println!("  status                    - Shows feed, session and observer state.");
                        println!("  observer <LAT> <LON> [N]  - Moves the observer (and renames it).");
                        println!("  audio on|off              - Toggles audio cues.");
                        println!("  window on|off             - Toggles raising the window on alert.");
                        println!("  notify on|off             - Toggles notifications.");
                        println!("  resync                    - Asks the feed for its latest report.");
                        println!("  inject <JSON>             - Processes a payload as if received.");
                        println!("  watch on|off              - Shows or hides alert events.");
                        println!("  exit                      - Quits the shell.");
                    }
                    "exit" => break,
                    _ => println!("Unknown command: '{}'. Type 'help'.", line),
                }
            }
            Err(_) => break,
        }
    }

    println!("Exiting sceew-shell...");
    handle.shutdown().await.ok();
    tokio::time::sleep(Duration::from_millis(100)).await;
    Ok(())
}
