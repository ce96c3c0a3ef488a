use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use log::{info, warn};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

mod args;

use args::Args;
use rusty_focus::alert::{AlertDispatcher, AlertSink, HttpAlertSink, LogAlertSink};
use rusty_focus::control::{duration_from_secs, ControlCommand, ControlReply};
use rusty_focus::recording::RecordingSource;
use rusty_focus::session::{SessionCoordinator, SessionReport, SessionStatus};
use rusty_focus::source::{BoxedFeed, FeedFactory};
use rusty_focus::synthetic::SyntheticSource;
use rusty_focus::FocusConfig;

fn feed_factory(recording: Option<PathBuf>, looping: bool, fps: usize) -> Arc<dyn FeedFactory> {
    Arc::new(move |_user: &str| -> Result<BoxedFeed> {
        match &recording {
            Some(path) => Ok(Box::new(RecordingSource::open(path)?.with_looping(looping).feed())),
            None => Ok(Box::new(SyntheticSource::attention_drill(fps).repeating().feed())),
        }
    })
}

fn print_report(report: &SessionReport) {
    let s = &report.stats;
    println!("{}", "=== Session Summary ===".bold());
    println!("User:            {}", report.user_id);
    println!("Session length:  {:.1}s", s.session_duration);
    println!("Times looked away: {}", s.times_looked_away.to_string().yellow());
    println!("Unfocused time:  {}", s.total_unfocused_formatted().yellow());
    match &report.status {
        SessionStatus::Failed(e) => println!("Status:          {}", format!("failed: {}", e).red()),
        _ => println!("Status:          {}", "completed".green()),
    }
    if report.forced {
        println!("{}", "Worker did not stop in time, stats are a live snapshot".red());
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    // 0. Config
    let mut config = FocusConfig::load_from(&args.config)?;
    if let Some(url) = &args.backend_url {
        config.alert.backend_url = url.clone();
    }
    let fps = config.tracking.frame_rate(args.fps);
    let duration = args
        .duration
        .map(duration_from_secs)
        .transpose()
        .context("Invalid --duration")?;

    // 1. Alerts
    let sink: Arc<dyn AlertSink> = if config.alert.enabled && !args.no_alerts {
        let http = HttpAlertSink::from_config(&config.alert);
        info!("Alerts go to {}", http.url());
        Arc::new(http)
    } else {
        Arc::new(LogAlertSink)
    };
    let dispatcher = Arc::new(
        AlertDispatcher::spawn(sink, config.alert.queue_depth).context("Failed to start alert worker")?,
    );

    // 2. Frame feed
    if args.recording.is_none() && !args.synthetic {
        info!("No recording given, using the synthetic face");
    }
    let feeds = feed_factory(args.recording.clone(), args.looping, fps as usize);

    // 3. Session
    let coordinator = SessionCoordinator::new(config, feeds, Some(dispatcher.clone()));
    coordinator.start(&args.user_id, duration)?;
    println!("{}", format!("Tracking '{}'", args.user_id).green());
    println!("Commands: stats | status | reset | calibrate | threshold x|y <delta> | headpose on|off | mode locked|relaxed | stop | quit");
    println!("Keys: [c] calibrate [h] head pose [w/s] Y threshold [a/d] X threshold [r] reset [q] quit");

    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let interrupted = interrupted.clone();
        ctrlc::set_handler(move || interrupted.store(true, Ordering::SeqCst))
            .context("Failed to install Ctrl-C handler")?;
    }

    // Stdin commands arrive on a channel so the loop can also watch the session
    let (tx_cmd, rx_cmd) = mpsc::channel::<String>();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines().map_while(|l| l.ok()) {
            if tx_cmd.send(line).is_err() {
                break;
            }
        }
    });

    // 4. Loop
    let mut final_report = None;
    while !interrupted.load(Ordering::SeqCst) {
        match rx_cmd.recv_timeout(Duration::from_millis(200)) {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => {
                let cmd = match line.parse::<ControlCommand>() {
                    Ok(cmd) => cmd,
                    Err(e) => {
                        println!("{}", e.to_string().red());
                        continue;
                    }
                };
                match cmd.apply(&coordinator, &args.user_id) {
                    Ok(ControlReply::Quit) => break,
                    Ok(ControlReply::Stopped(report)) => {
                        final_report = Some(report);
                        break;
                    }
                    Ok(reply) => println!("{}", reply.to_string().cyan()),
                    Err(e) => println!("{}", e.to_string().red()),
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                // stdin closed, keep tracking until the session ends or Ctrl-C
                thread::sleep(Duration::from_millis(200));
            }
        }

        match coordinator.status(&args.user_id) {
            Ok(SessionStatus::Active) => {}
            Ok(_) | Err(_) => break,
        }
    }

    // 5. Shutdown
    let report = match final_report {
        Some(report) => Some(report),
        None => match coordinator.stop(&args.user_id) {
            Ok(report) => Some(report),
            Err(e) => {
                warn!("{}", e);
                None
            }
        },
    };
    if let Some(report) = report {
        print_report(&report);
    }
    drop(coordinator);
    dispatcher.shutdown();

    Ok(())
}
