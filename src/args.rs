use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Configuration file (created with defaults if missing)
    #[arg(short, long, default_value = "focus_config.json")]
    pub config: PathBuf,

    /// User the session is tracked for
    #[arg(short, long, default_value = "local")]
    pub user_id: String,

    /// Stop automatically after this many seconds
    #[arg(short, long)]
    pub duration: Option<f64>,

    /// Replay a JSON-lines landmark recording instead of simulating a face
    #[arg(long, conflicts_with = "synthetic")]
    pub recording: Option<PathBuf>,

    /// Start the recording over when it ends
    #[arg(long = "loop", requires = "recording")]
    pub looping: bool,

    /// Use the scripted synthetic face (default when no recording is given)
    #[arg(long)]
    pub synthetic: bool,

    /// Frame rate of the synthetic script and recording replay
    /// (defaults to the config's frame interval)
    #[arg(long)]
    pub fps: Option<u32>,

    /// Log alerts instead of sending them to the backend
    #[arg(long)]
    pub no_alerts: bool,

    /// Override the alert backend base URL
    #[arg(long)]
    pub backend_url: Option<String>,
}
