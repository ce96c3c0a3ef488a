use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::time::Instant;

use rusty_focus::control::duration_from_secs;
use rusty_focus::recording::RecordingSource;
use rusty_focus::source::FrameSource;
use rusty_focus::{FocusConfig, FocusPipeline};

// Replays a landmark recording on a virtual clock and prints where the
// smoothed decision changed, so thresholds can be tuned without a camera.
//
// usage: analyze_recording <recording.jsonl> [fps] [config.json]

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        bail!("usage: {} <recording.jsonl> [fps] [config.json]", args[0]);
    }
    let path = PathBuf::from(&args[1]);
    let fps: f64 = match args.get(2) {
        Some(s) => s.parse().with_context(|| format!("bad fps '{}'", s))?,
        None => 30.0,
    };
    if !(fps > 0.0) {
        bail!("fps must be positive");
    }
    let config = match args.get(3) {
        Some(p) => FocusConfig::load_from(Path::new(p))?,
        None => FocusConfig::default(),
    };

    let mut source = RecordingSource::open(&path)?;
    let mut pipeline = FocusPipeline::new(&config);
    if config.calibration.auto_calibrate {
        pipeline.start_calibration();
    }

    println!("Analyzing {} at {} fps", path.display(), fps);
    let t = config.gaze.thresholds();
    println!("Thresholds X: ±{:.2}, Y: ±{:.2}, EAR: {:.2}", t.x, t.y, t.min_ear);
    println!("{}", "-".repeat(60));

    let start = Instant::now();
    let step = duration_from_secs(1.0 / fps).context("fps out of range")?;
    let mut frame_idx = 0u32;
    let mut bad_frames = 0u32;
    let mut no_face = 0u32;
    let mut segment_start = 0.0;
    let mut current: Option<bool> = None;

    loop {
        let frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(e) => {
                println!("  ! {}", e);
                bad_frames += 1;
                continue;
            }
        };
        let now = start + step * frame_idx;
        let secs = (now - start).as_secs_f64();
        frame_idx += 1;
        if frame.is_none() {
            no_face += 1;
        }

        let out = pipeline.process(frame.as_ref(), now);
        if let Some(b) = out.calibrated {
            println!("{:>8.2}s  calibrated to ({:.3}, {:.3})", secs, b.center_x, b.center_y);
        }
        if current != Some(out.looking) {
            if let Some(prev) = current {
                println!(
                    "{:>8.2}s  {:<12} for {:.2}s",
                    segment_start,
                    if prev { "looking" } else { "away" },
                    secs - segment_start
                );
            }
            current = Some(out.looking);
            segment_start = secs;
        }
        if let Some(e) = out.event {
            println!("{:>8.2}s  look-away #{} ({:.2}s)", secs, e.event_number, e.duration_secs);
        }
        if let Some(a) = out.alert {
            println!("{:>8.2}s  ALERT after {} look-aways", secs, a.look_away_count);
        }
    }

    let end = start + step * frame_idx;
    pipeline.finish(end);
    let stats = pipeline.stats(start, end);

    println!("{}", "-".repeat(60));
    println!("Frames:            {} ({} without a face, {} unreadable)", frame_idx, no_face, bad_frames);
    println!("Duration:          {:.2}s", stats.session_duration);
    println!("Times looked away: {}", stats.times_looked_away);
    println!("Unfocused time:    {}", stats.total_unfocused_formatted());
    Ok(())
}
