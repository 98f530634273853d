// Command line / environment configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::service::QueueSettings;
use crate::stroke::DEFAULT_BRUSH_RADIUS;

#[derive(Parser, Debug)]
#[command(name = "magic-animate", about = "Paint over a photo and animate the painted area")]
pub struct Args {
    /// JPEG or PNG photo to animate
    pub image: PathBuf,

    /// Queue endpoint (or a relay that forwards requests unchanged)
    #[arg(long, env = "MAGIC_ANIMATE_ENDPOINT", default_value = "https://queue.fal.run")]
    pub endpoint: String,

    /// Generation app to run
    #[arg(long, default_value = "110602490-svd")]
    pub app_id: String,

    /// API key sent as `Authorization: Key <key>`
    #[arg(long, env = "FAL_KEY", hide_env_values = true)]
    pub fal_key: Option<String>,

    /// Interval between status checks while a job is pending
    #[arg(long, default_value_t = 4000)]
    pub poll_interval_ms: u64,

    /// Brush radius in pixels
    #[arg(long, default_value_t = DEFAULT_BRUSH_RADIUS)]
    pub brush_radius: i32,

    /// Also write each submitted mask to this PNG (for inspection)
    #[arg(long)]
    pub save_mask: Option<PathBuf>,

    /// Initial window width
    #[arg(long, default_value_t = 800)]
    pub width: usize,

    /// Initial window height
    #[arg(long, default_value_t = 600)]
    pub height: usize,
}

pub const MIN_POLL_INTERVAL_MS: u64 = 250;
pub const MAX_BRUSH_RADIUS: i32 = 200;

#[derive(Clone, Debug)]
pub struct Config {
    pub image: PathBuf,
    pub queue: QueueSettings,
    pub brush_radius: i32,
    pub window: (usize, usize),
    pub save_mask: Option<PathBuf>,
}

impl Config {
    pub fn from_args(args: Args) -> anyhow::Result<Self> {
        if args.poll_interval_ms < MIN_POLL_INTERVAL_MS {
            anyhow::bail!("--poll-interval-ms must be at least {MIN_POLL_INTERVAL_MS}");
        }
        if !(1..=MAX_BRUSH_RADIUS).contains(&args.brush_radius) {
            anyhow::bail!("--brush-radius must be between 1 and {MAX_BRUSH_RADIUS}");
        }
        if args.width == 0 || args.height == 0 {
            anyhow::bail!("window size must be non-zero");
        }
        if args.fal_key.is_none() {
            tracing::warn!("FAL_KEY is not set; requests are sent without credentials");
        }

        Ok(Self {
            image: args.image,
            queue: QueueSettings {
                endpoint: args.endpoint,
                app_id: args.app_id,
                key: args.fal_key.filter(|k| !k.trim().is_empty()),
                poll_interval: Duration::from_millis(args.poll_interval_ms),
            },
            brush_radius: args.brush_radius,
            window: (args.width, args.height),
            save_mask: args.save_mask,
        })
    }
}
