use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use image::RgbImage;
use sendeagle_contracts::events::EventLog;
use sendeagle_contracts::params::{OutputFormat, RequestParams, DEFAULT_FILENAME_TEMPLATE};
use sendeagle_contracts::tags::TagPolicy;
use sendeagle_engine::{EagleClient, SendEagle, SendEagleConfig};
use serde_json::{Map, Value};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "sendeagle", version, about = "Save generated images and send them to Eagle")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Save a batch locally and add each image to Eagle.
    Save(SaveArgs),
    /// List every Eagle folder as `id<TAB>name`.
    Folders,
}

#[derive(Debug, Parser)]
struct SaveArgs {
    #[arg(long = "image", required = true)]
    images: Vec<PathBuf>,
    #[arg(long)]
    out: PathBuf,
    /// Host prompt graph (JSON).
    #[arg(long)]
    prompt: Option<PathBuf>,
    /// Host extra metadata (JSON object).
    #[arg(long)]
    extra_pnginfo: Option<PathBuf>,
    #[arg(long, default_value = "")]
    positive: String,
    #[arg(long, default_value = "")]
    negative: String,
    #[arg(long, default_value = "webp")]
    format: OutputFormat,
    #[arg(long, default_value_t = 90, value_parser = clap::value_parser!(u8).range(1..=100))]
    compression: u8,
    /// Lossy WebP instead of lossless.
    #[arg(long)]
    lossy: bool,
    #[arg(long, default_value = "None")]
    save_tags: String,
    #[arg(long, default_value = DEFAULT_FILENAME_TEMPLATE)]
    filename_template: String,
    #[arg(long, default_value = "")]
    eagle_folder: String,
    #[arg(long)]
    no_preview: bool,
    #[arg(long)]
    save_only: bool,
    #[arg(long, default_value = "")]
    memo: String,
    #[arg(long)]
    events: Option<PathBuf>,
}

fn main() {
    init_tracing();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("sendeagle error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Save(args) => run_save(args),
        Command::Folders => run_folders(),
    }
}

fn run_save(args: SaveArgs) -> Result<i32> {
    let config = SendEagleConfig::from_env(&args.out);
    let images = args
        .images
        .iter()
        .map(|path| load_rgb(path))
        .collect::<Result<Vec<RgbImage>>>()?;
    let params = RequestParams {
        format: args.format,
        compression: args.compression,
        lossless_webp: !args.lossy,
        save_tags: TagPolicy::from_label(&args.save_tags),
        filename_template: args.filename_template,
        eagle_folder: args.eagle_folder,
        preview: !args.no_preview,
        save_only: args.save_only,
        memo_text: args.memo,
        positive: args.positive,
        negative: args.negative,
        prompt: args.prompt.as_deref().map(read_json).transpose()?,
        extra_pnginfo: args
            .extra_pnginfo
            .as_deref()
            .map(read_json_object)
            .transpose()?,
    };

    let mut pipeline = SendEagle::new(config)?;
    if let Some(path) = args.events {
        pipeline = pipeline.with_events(EventLog::new(path));
    }
    let outcome = pipeline.add_items(&images, &params)?;
    println!("{}", serde_json::to_string(&outcome.host_payload())?);
    Ok(if outcome.upload_failures.is_empty() { 0 } else { 2 })
}

fn run_folders() -> Result<i32> {
    let config = SendEagleConfig::from_env(".");
    let client = EagleClient::connect(&config.eagle_server_url)?;
    for folder in client.fetch_folders()? {
        println!("{}\t{}", folder.id, folder.name);
    }
    Ok(0)
}

fn load_rgb(path: &Path) -> Result<RgbImage> {
    let image =
        image::open(path).with_context(|| format!("failed to decode image {}", path.display()))?;
    Ok(image.to_rgb8())
}

fn read_json(path: &Path) -> Result<Value> {
    let raw =
        fs::read_to_string(path).with_context(|| format!("failed reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid JSON in {}", path.display()))
}

fn read_json_object(path: &Path) -> Result<Map<String, Value>> {
    match read_json(path)? {
        Value::Object(map) => Ok(map),
        _ => bail!("{} must contain a JSON object", path.display()),
    }
}
