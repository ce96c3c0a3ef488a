use anyhow::{anyhow, Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::source::{DetectorFeed, FrameSource, PrecomputedDetector};
use crate::types::FaceDetection;

/// One line of a JSON-lines landmark recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedFrame {
    #[serde(default)]
    pub face: Option<FaceDetection>,
}

/// Replays a landmark recording captured from a real detector.
///
/// Lines are read lazily. A line that fails to parse is reported as a
/// transient frame failure; blank lines are skipped.
pub struct RecordingSource {
    path: PathBuf,
    lines: std::io::Lines<BufReader<File>>,
    line_no: usize,
    looping: bool,
}

impl RecordingSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let lines = Self::reader(&path)?;
        info!("Replaying landmark recording {}", path.display());
        Ok(Self {
            path,
            lines,
            line_no: 0,
            looping: false,
        })
    }

    fn reader(path: &Path) -> Result<std::io::Lines<BufReader<File>>> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open recording {}", path.display()))?;
        Ok(BufReader::new(file).lines())
    }

    /// Start over at the end instead of reporting exhaustion.
    pub fn with_looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn feed(self) -> DetectorFeed<Self, PrecomputedDetector> {
        DetectorFeed::new(self, PrecomputedDetector)
    }

    fn rewind(&mut self) -> Result<()> {
        debug!("Recording {} rewound", self.path.display());
        self.lines = Self::reader(&self.path)?;
        self.line_no = 0;
        Ok(())
    }
}

impl FrameSource for RecordingSource {
    type Frame = Option<FaceDetection>;

    fn name(&self) -> String {
        format!("recording:{}", self.path.display())
    }

    fn next_frame(&mut self) -> Result<Option<Self::Frame>> {
        let mut rewound = false;
        loop {
            let Some(line) = self.lines.next() else {
                // An empty recording would otherwise loop forever
                if !self.looping || rewound || self.line_no == 0 {
                    return Ok(None);
                }
                self.rewind()?;
                rewound = true;
                continue;
            };
            self.line_no += 1;
            let line = line.with_context(|| format!("Failed to read line {}", self.line_no))?;
            if line.trim().is_empty() {
                continue;
            }
            let frame: RecordedFrame = serde_json::from_str(&line)
                .map_err(|e| anyhow!("Malformed frame at line {}: {}", self.line_no, e))?;
            return Ok(Some(frame.face));
        }
    }
}

/// Writes frames in the format [`RecordingSource`] reads.
pub fn write_recording<'a>(
    path: impl AsRef<Path>,
    frames: impl IntoIterator<Item = Option<&'a FaceDetection>>,
) -> Result<usize> {
    let path = path.as_ref();
    let file = File::create(path)
        .with_context(|| format!("Failed to create recording {}", path.display()))?;
    let mut out = BufWriter::new(file);
    let mut count = 0;
    for face in frames {
        let frame = RecordedFrame { face: face.cloned() };
        serde_json::to_writer(&mut out, &frame)?;
        out.write_all(b"\n")?;
        count += 1;
    }
    out.flush()?;
    Ok(count)
}
