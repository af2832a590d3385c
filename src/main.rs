use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use textvision::text::{Lexicon, Normalizer, SAMPLE_TEXT, TextReport, Tokenizer, default_cache_dir};
use textvision::vision::{DetectorConfig, YoloDetector, infer_image, infer_video, infer_webcam};

const DEFAULT_MODEL: &str = "weights/yolov8s.rten";

#[derive(Parser)]
#[command(name = "textvision")]
#[command(about = "Tokenize and normalize text, or run YOLO object detection on media")]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Tokenize text three ways, then stem and lemmatize the tokens
    Text {
        /// Text to process (defaults to a Vietnamese sample sentence)
        #[arg(value_name = "TEXT")]
        text: Option<String>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// Directory holding the cached lemma table
        #[arg(long, value_name = "DIR")]
        cache_dir: Option<PathBuf>,
    },

    /// Write the lemma table into the cache directory (no-op if already present)
    InitResources {
        #[arg(long, value_name = "DIR")]
        cache_dir: Option<PathBuf>,

        /// WordNet database directory (with index.noun and noun.exc) to import
        /// in place of the bundled table
        #[arg(long, value_name = "DIR")]
        wordnet: Option<PathBuf>,
    },

    /// Detect objects in an image
    Image {
        #[arg(value_name = "IMAGE")]
        image_path: PathBuf,

        #[command(flatten)]
        detection: DetectionArgs,

        /// Annotated image path (default: <name>_output.<ext>)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },

    /// Detect objects in every frame of a video
    Video {
        #[arg(value_name = "VIDEO")]
        video_path: PathBuf,

        #[command(flatten)]
        detection: DetectionArgs,

        /// Annotated video path (default: <name>_output.<ext>)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },

    /// Detect objects on a live camera feed; press q in the window to quit
    Webcam {
        /// Camera device index
        #[arg(short, long, default_value_t = 0)]
        device: u32,

        #[command(flatten)]
        detection: DetectionArgs,
    },
}

#[derive(clap::Args)]
struct DetectionArgs {
    /// Path to the .rten model weights
    #[arg(short, long, value_name = "PATH", default_value = DEFAULT_MODEL)]
    model: PathBuf,

    /// Minimum confidence for a detection to be kept
    #[arg(short, long, default_value_t = 0.5)]
    conf: f32,

    /// Overlap above which same-class boxes are merged
    #[arg(long, default_value_t = 0.45)]
    iou: f32,
}

impl DetectionArgs {
    fn load_detector(&self) -> anyhow::Result<YoloDetector> {
        let config = DetectorConfig {
            iou_threshold: self.iou,
            ..DetectorConfig::default()
        };
        Ok(YoloDetector::load(&self.model)?.with_config(config))
    }
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match args.command {
        Command::Text { text, json, cache_dir } => {
            let cache_dir = cache_dir.or_else(|| default_cache_dir().ok());
            let tokenizer = Tokenizer::new()?;
            let normalizer = Normalizer::new(Lexicon::load(cache_dir.as_deref()));

            let text = text.as_deref().unwrap_or(SAMPLE_TEXT);
            let report = TextReport::build(text, &tokenizer, &normalizer);

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", report);
            }
        }
        Command::InitResources { cache_dir, wordnet } => {
            let cache_dir = match cache_dir {
                Some(dir) => dir,
                None => default_cache_dir()?,
            };
            let path = match wordnet {
                Some(wordnet_dir) => Lexicon::import_wordnet(&wordnet_dir, &cache_dir)?,
                None => Lexicon::ensure_cached(&cache_dir)?,
            };
            println!("Lexicon available at {}", path.display());
        }
        Command::Image { image_path, detection, output } => {
            let detector = detection.load_detector()?;
            let written = infer_image(&detector, &image_path, detection.conf, output.as_deref())?;
            println!("Results saved to {}", written.display());
        }
        Command::Video { video_path, detection, output } => {
            let detector = detection.load_detector()?;
            let (written, summary) =
                infer_video(&detector, &video_path, detection.conf, output.as_deref())?;
            println!(
                "Processed {} frames ({} detections). Results saved to {}",
                summary.frames,
                summary.detections,
                written.display()
            );
        }
        Command::Webcam { device, detection } => {
            let detector = detection.load_detector()?;
            info!("Starting webcam {} (press q in the window to quit)", device);
            let summary = infer_webcam(&detector, device, detection.conf)?;
            println!("Processed {} frames", summary.frames);
        }
    }

    Ok(())
}
