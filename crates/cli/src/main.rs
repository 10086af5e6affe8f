//! mediafy - capture a camera frame onto a canvas and export it as PNG.

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, ValueEnum};
use parking_lot::{Mutex, RwLock};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;
use url::Url;

use dom::Document;
use mediafy::util::decode_data_url;
use mediafy::{Canvas, Coords, ElementWrapper, Environment, MediafyConfig, Video};
use web_apis::{CameraApis, Navigator, PermissionState, SyntheticCamera};

/// Camera entry point the simulated host exposes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Api {
    /// navigator.mediaDevices.getUserMedia
    Standard,
    /// navigator.getUserMedia
    Legacy,
    Webkit,
    Moz,
    Ms,
    /// No camera access at all
    None,
}

impl Api {
    fn flags(self) -> CameraApis {
        match self {
            Api::Standard => CameraApis::MEDIA_DEVICES,
            Api::Legacy => CameraApis::LEGACY,
            Api::Webkit => CameraApis::WEBKIT,
            Api::Moz => CameraApis::MOZ,
            Api::Ms => CameraApis::MS,
            Api::None => CameraApis::empty(),
        }
    }
}

/// Capture a frame from a synthetic camera, draw it onto a canvas and save
/// the exported PNG
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Canvas and video width
    #[arg(long, default_value = "320")]
    width: u32,

    /// Canvas and video height
    #[arg(long, default_value = "240")]
    height: u32,

    /// Scale factor applied to the drawn frame
    #[arg(long, default_value = "1.0")]
    scale: f64,

    /// Offset of the drawn frame, as "dx,dy"
    #[arg(long, default_value = "0,0", value_parser = parse_offset, allow_hyphen_values = true)]
    offset: (f64, f64),

    /// Output PNG path
    #[arg(short, long, default_value = "capture.png")]
    out: PathBuf,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Camera API the host exposes
    #[arg(long, value_enum, default_value = "standard")]
    api: Api,

    /// Answer the camera permission prompt with "deny"
    #[arg(long)]
    deny_camera: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Dump the document after capturing
    #[arg(long)]
    dump_dom: bool,
}

fn parse_offset(s: &str) -> Result<(f64, f64), String> {
    let (dx, dy) = s
        .split_once(',')
        .ok_or_else(|| format!("expected \"dx,dy\", got {:?}", s))?;
    let parse = |v: &str| {
        v.trim()
            .parse::<f64>()
            .map_err(|e| format!("invalid offset {:?}: {}", v, e))
    };
    Ok((parse(dx)?, parse(dy)?))
}

fn load_config(args: &Args) -> Result<MediafyConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            MediafyConfig::from_json(&json).with_context(|| format!("parsing {}", path.display()))?
        }
        None => MediafyConfig::default(),
    };
    if config.video.width.is_none() && config.video.height.is_none() {
        config = config.with_video_size(args.width, args.height);
    }
    Ok(config)
}

fn build_environment(args: &Args, config: MediafyConfig) -> Result<Environment> {
    let navigator = Navigator::new().with_camera_apis(args.api.flags());
    navigator
        .devices()
        .add_device(Arc::new(SyntheticCamera::new("Synthetic Camera")));
    navigator.devices().set_permission(if args.deny_camera {
        PermissionState::Denied
    } else {
        PermissionState::Granted
    });

    let url = Url::parse(&config.document_url)
        .with_context(|| format!("invalid document URL {}", config.document_url))?;
    let document = Arc::new(RwLock::new(Document::with_skeleton(url)));
    Ok(Environment::with_host(document, navigator, config))
}

async fn capture(args: &Args, env: &Environment) -> Result<Vec<u8>> {
    let video = Video::new(env, (args.width, args.height))?;
    let canvas = Canvas::new(env, (args.width, args.height))?;
    video.toggle_visibility()?;

    let (tx, loaded) = oneshot::channel();
    let tx = Mutex::new(Some(tx));
    video
        .load_user_media(move |_| {
            if let Some(tx) = tx.lock().take() {
                let _ = tx.send(());
            }
        })
        .await
        .context("camera access failed")?;
    loaded.await.context("camera stream ended before metadata")?;
    video.play()?;
    let frame_width = video.object().property("videoWidth")?;
    let frame_height = video.object().property("videoHeight")?;
    info!(width = ?frame_width, height = ?frame_height, "camera ready");

    let mut coords = Coords::of(&video)?;
    coords.scale(args.scale).translate([args.offset.0, args.offset.1]);
    debug!(?coords, "drawing frame");
    canvas.clear(None)?.put_image(&video, Some(coords))?;

    let window_id = canvas.export_image()?;
    video.stop()?;

    let opened = env
        .window()
        .read()
        .opened()
        .into_iter()
        .find(|w| w.read().id() == window_id)
        .ok_or_else(|| anyhow!("exported window {} not found", window_id.get()))?;
    let location = opened.read().location.to_string();
    let (mime, bytes) = decode_data_url(&location)?;
    if mime != "image/png" {
        bail!("export produced {} instead of image/png", mime);
    }
    Ok(bytes)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("mediafy v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args)?;
    let env = build_environment(&args, config)?;
    info!(api = ?env.user_media().api(), "camera access");

    let png = capture(&args, &env).await?;
    std::fs::write(&args.out, &png).with_context(|| format!("writing {}", args.out.display()))?;
    info!(bytes = png.len(), "saved {}", args.out.display());

    if args.dump_dom {
        println!("{}", env.document().read().to_html());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_default() {
        let args = Args::parse_from(["mediafy"]);
        assert_eq!((args.width, args.height), (320, 240));
        assert_eq!(args.scale, 1.0);
        assert_eq!(args.offset, (0.0, 0.0));
        assert_eq!(args.api, Api::Standard);
        assert!(!args.deny_camera);
    }

    #[test]
    fn test_args_offset() {
        let args = Args::parse_from(["mediafy", "--offset", "-10,5.5", "--api", "webkit"]);
        assert_eq!(args.offset, (-10.0, 5.5));
        assert_eq!(args.api, Api::Webkit);
        assert!(parse_offset("10").is_err());
    }

    #[test]
    fn test_config_takes_cli_size() {
        let args = Args::parse_from(["mediafy", "--width", "64", "--height", "48"]);
        let config = load_config(&args).unwrap();
        assert_eq!(config.video.width, Some(64));
        assert_eq!(config.video.height, Some(48));
    }

    #[tokio::test]
    async fn test_capture_png() {
        let args = Args::parse_from(["mediafy", "--width", "32", "--height", "16", "--scale", "0.5"]);
        let env = build_environment(&args, load_config(&args).unwrap()).unwrap();
        let png = capture(&args, &env).await.unwrap();

        let image = image::load_from_memory(&png).unwrap().to_rgba8();
        assert_eq!(image.dimensions(), (32, 16));
        assert!(SyntheticCamera::BARS.contains(&image.get_pixel(0, 0).0));
        // Outside the half-size frame nothing was drawn.
        assert_eq!(image.get_pixel(31, 15).0, [0, 0, 0, 0]);
    }

    #[tokio::test]
    async fn test_capture_denied() {
        let args = Args::parse_from(["mediafy", "--deny-camera"]);
        let env = build_environment(&args, load_config(&args).unwrap()).unwrap();
        assert!(capture(&args, &env).await.is_err());
    }

    #[tokio::test]
    async fn test_capture_without_api() {
        let args = Args::parse_from(["mediafy", "--api", "none"]);
        let env = build_environment(&args, load_config(&args).unwrap()).unwrap();
        assert!(env.user_media().api().is_none());
        assert!(capture(&args, &env).await.is_err());
    }
}
