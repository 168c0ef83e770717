//! Command-line interface for the watermarker

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use tracing::{debug, info, warn};
use watermarker_core::batch::save_image;
use watermarker_core::compositor::sample_canvas;
use watermarker_core::utils::{format, validation};
use watermarker_core::{
    init, render_preview, version, AnchorPosition, AppConfig, BatchJob, BatchObserver,
    BatchReport, BatchRunner, Color, ConfigManager, FontDescriptor, OnSaveError, ProfileStore,
    SaveFailureAction, Watermark, WatermarkError, WatermarkKind, WatermarkProfile,
    DEFAULT_PROFILE_NAME,
};

const SAMPLE_WIDTH: u32 = 800;
const SAMPLE_HEIGHT: u32 = 600;

#[derive(Parser)]
#[command(name = "watermarker")]
#[command(about = "Stamp a text or image watermark onto every picture in a folder")]
#[command(version = version())]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Profile store file (overrides the configured one)
    #[arg(long, global = true)]
    store: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage watermark profiles
    Profile {
        #[command(subcommand)]
        action: ProfileCommand,
    },

    /// Watermark every image in a folder
    Run {
        /// Source folder (defaults to the last one used)
        #[arg(short, long)]
        source: Option<PathBuf>,

        /// Destination folder (defaults to the last one used)
        #[arg(short, long)]
        destination: Option<PathBuf>,

        /// Profile name (defaults to the last one used)
        #[arg(short, long)]
        profile: Option<String>,

        /// Watermark position, e.g. lower-right
        #[arg(short, long)]
        anchor: Option<AnchorPosition>,

        /// Descend into subfolders
        #[arg(short, long, conflicts_with = "no_recursive")]
        recursive: bool,

        /// Only process the folder's direct children
        #[arg(long)]
        no_recursive: bool,

        /// What to do when a file cannot be saved
        #[arg(long)]
        on_error: Option<OnSaveError>,

        /// Encoder quality (1-100)
        #[arg(short, long)]
        quality: Option<u8>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Render a watermarked, scaled preview
    Preview {
        /// Where to write the preview image
        #[arg(short, long)]
        output: PathBuf,

        /// Image to stamp (defaults to a checkerboard)
        #[arg(long)]
        sample: Option<PathBuf>,

        #[arg(short, long)]
        profile: Option<String>,

        #[arg(short, long)]
        anchor: Option<AnchorPosition>,

        /// Preview height in percent of the sample
        #[arg(short, long)]
        zoom: Option<u32>,
    },

    /// Show or change the application settings
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },

    /// Show version, paths and available fonts
    Info,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print the active settings as TOML
    Show,

    /// Write the current settings to the config file
    Init,

    /// Change settings and save them
    Set {
        /// Encoder quality (1-100)
        #[arg(long)]
        quality: Option<u8>,

        /// What to do when a file cannot be saved
        #[arg(long)]
        on_error: Option<OnSaveError>,

        /// Log level, e.g. info or debug
        #[arg(long)]
        log_level: Option<String>,

        /// Also write logs to this file
        #[arg(long)]
        log_file: Option<PathBuf>,

        /// Profile store file
        #[arg(long)]
        profile_store: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ProfileCommand {
    /// List stored profiles
    List,

    /// Print a profile's settings
    Show {
        #[arg(default_value = DEFAULT_PROFILE_NAME)]
        name: String,

        #[arg(long)]
        json: bool,
    },

    /// Create or edit a profile
    Set {
        name: String,

        /// text or image
        #[arg(long)]
        kind: Option<WatermarkKind>,

        #[arg(long)]
        text: Option<String>,

        /// Overlay image for image watermarks
        #[arg(long)]
        image: Option<PathBuf>,

        #[arg(long, allow_negative_numbers = true)]
        margin_h: Option<i32>,

        #[arg(long, allow_negative_numbers = true)]
        margin_v: Option<i32>,

        /// Opacity from 0.0 to 1.0
        #[arg(long)]
        transparency: Option<f64>,

        /// "family,size,bold,italic,underline"
        #[arg(long)]
        font: Option<FontDescriptor>,

        #[arg(long)]
        main_color: Option<Color>,

        #[arg(long)]
        outline_color: Option<Color>,
    },

    /// Delete a profile
    Remove { name: String },

    /// Rename a profile
    Rename { old: String, new: String },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut manager = match &cli.config {
        Some(path) => ConfigManager::with_path(path.clone())?,
        None => ConfigManager::new()?,
    };
    let mut config = manager.config().clone();
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    let _guard = init(&config)?;

    let store_path = match &cli.store {
        Some(path) => path.clone(),
        None => config.profile_store_path()?,
    };
    let store = ProfileStore::open(store_path);
    debug!("Watermarker CLI v{} using {}", version(), store.path().display());

    match cli.command {
        Commands::Profile { action } => profile_command(&store, action),

        Commands::Run {
            source,
            destination,
            profile,
            anchor,
            recursive,
            no_recursive,
            on_error,
            quality,
            json,
        } => {
            let recursive = if recursive {
                Some(true)
            } else if no_recursive {
                Some(false)
            } else {
                None
            };
            let options = RunOptions {
                source,
                destination,
                profile,
                anchor,
                recursive,
                on_error,
                quality,
                json,
            };
            run_command(&store, &config, options)
        }

        Commands::Preview {
            output,
            sample,
            profile,
            anchor,
            zoom,
        } => preview_command(&store, &config, &output, sample.as_deref(), profile, anchor, zoom),

        Commands::Config { action } => config_command(&mut manager, action),

        Commands::Info => {
            info_command(&manager, &config, &store);
            Ok(())
        }
    }
}

fn config_command(manager: &mut ConfigManager, action: ConfigCommand) -> Result<()> {
    match action {
        ConfigCommand::Show => {
            print!("{}", manager.config().to_toml()?);
        }

        ConfigCommand::Init => {
            manager.save()?;
            println!("Configuration written to {}", manager.path().display());
        }

        ConfigCommand::Set {
            quality,
            on_error,
            log_level,
            log_file,
            profile_store,
        } => {
            let mut config = manager.config().clone();
            if let Some(quality) = quality {
                config.batch.quality = quality;
            }
            if let Some(on_error) = on_error {
                config.batch.on_save_error = on_error;
            }
            if let Some(level) = log_level {
                config.logging.level = level;
            }
            if log_file.is_some() {
                config.logging.output_path = log_file;
            }
            if profile_store.is_some() {
                config.storage.profile_store = profile_store;
            }

            manager.update_config(config)?;
            println!("Configuration saved to {}", manager.path().display());
        }
    }
    Ok(())
}

fn profile_command(store: &ProfileStore, action: ProfileCommand) -> Result<()> {
    match action {
        ProfileCommand::List => {
            for name in store.list() {
                println!("{}", name);
            }
        }

        ProfileCommand::Show { name, json } => {
            let profile = known_profile(store, &name)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&profile)?);
            } else {
                print_profile(&profile);
            }
        }

        ProfileCommand::Set {
            name,
            kind,
            text,
            image,
            margin_h,
            margin_v,
            transparency,
            font,
            main_color,
            outline_color,
        } => {
            let original = store.load(&name);
            let mut profile = original.clone();

            if let Some(kind) = kind {
                profile.set_kind(kind);
            }
            if let Some(text) = text {
                profile.set_text(text);
            }
            if let Some(image) = image {
                profile.set_image_path(image);
            }
            if let Some(margin) = margin_h {
                profile.set_margin_horizontal(margin);
            }
            if let Some(margin) = margin_v {
                profile.set_margin_vertical(margin);
            }
            if let Some(transparency) = transparency {
                validation::validate_transparency(transparency)?;
                profile.set_transparency(transparency);
            }
            if let Some(font) = font {
                profile.set_font(font);
            }
            if let Some(color) = main_color {
                profile.set_main_color(color);
            }
            if let Some(color) = outline_color {
                profile.set_outline_color(color);
            }

            if let Err(e) = profile.validate() {
                warn!("{}", e);
            }

            if profile != original || !store.contains(&name) {
                store.save(&profile)?;
                println!("Saved profile '{}'", name);
            } else {
                println!("Profile '{}' unchanged", name);
            }
        }

        ProfileCommand::Remove { name } => {
            if !store.contains(&name) {
                bail!("No stored profile named '{}'", name);
            }
            store.remove(&name)?;
            println!("Removed profile '{}'", name);
        }

        ProfileCommand::Rename { old, new } => {
            known_profile(store, &old)?;
            store.rename(&old, &new)?;
            println!("Renamed profile '{}' to '{}'", old, new);
        }
    }

    Ok(())
}

fn known_profile(store: &ProfileStore, name: &str) -> Result<WatermarkProfile> {
    if name != DEFAULT_PROFILE_NAME && !store.contains(name) {
        bail!("Unknown profile '{}'", name);
    }
    Ok(store.load(name))
}

fn print_profile(profile: &WatermarkProfile) {
    println!("Name:          {}", profile.name());
    println!("Type:          {}", profile.kind());
    println!("Text:          {}", profile.text());
    println!("Image:         {}", profile.image_path().display());
    println!(
        "Margins:       {} x {}",
        profile.margin_horizontal(),
        profile.margin_vertical()
    );
    println!("Transparency:  {}", profile.transparency());
    println!("Font:          {}", profile.font());
    println!("Main color:    {}", profile.main_color());
    println!("Outline color: {}", profile.outline_color());
    if let Err(e) = profile.validate() {
        println!("Warning:       {}", e);
    }
}

struct RunOptions {
    source: Option<PathBuf>,
    destination: Option<PathBuf>,
    profile: Option<String>,
    anchor: Option<AnchorPosition>,
    recursive: Option<bool>,
    on_error: Option<OnSaveError>,
    quality: Option<u8>,
    json: bool,
}

fn run_command(store: &ProfileStore, config: &AppConfig, options: RunOptions) -> Result<()> {
    let mut session = store.load_session();

    let source = options
        .source
        .or_else(|| session.source_path.clone())
        .context("No source folder given and none remembered")?;
    let destination = options
        .destination
        .or_else(|| session.destination_path.clone())
        .context("No destination folder given and none remembered")?;
    let profile_name = options.profile.unwrap_or_else(|| session.profile.clone());
    let anchor = options.anchor.unwrap_or(session.anchor);
    let recursive = options.recursive.unwrap_or(session.recursive);

    let profile = known_profile(store, &profile_name)?;
    let job = BatchJob::new(&source, &destination)
        .recursive(recursive)
        .anchor(anchor)
        .quality(options.quality.unwrap_or(config.batch.quality));

    let runner = BatchRunner::new();
    let cancel = runner.cancel_flag();
    if let Err(e) = ctrlc::set_handler(move || cancel.store(true, Ordering::SeqCst)) {
        warn!("Could not install Ctrl-C handler: {}", e);
    }

    let mut observer = ConsoleObserver {
        policy: options.on_error.unwrap_or(config.batch.on_save_error),
        quiet: options.json,
        total: 0,
    };
    let report = runner.run(&job, &profile, &config.font_resolver(), &mut observer)?;

    session.source_path = Some(source);
    session.destination_path = Some(destination);
    session.profile = profile_name;
    session.anchor = anchor;
    session.recursive = recursive;
    if let Err(e) = store.save_session(&session) {
        warn!("Could not remember session: {}", e);
    }

    if options.json {
        println!("{}", report.to_json()?);
    } else {
        print_summary(&report);
    }

    if report.aborted {
        bail!("Processing aborted after a save error");
    }
    if report.cancelled {
        bail!("Processing cancelled");
    }
    if !report.is_success() {
        bail!("{} file(s) could not be saved", report.failures);
    }
    Ok(())
}

fn print_summary(report: &BatchReport) {
    let elapsed = report.finished_at - report.started_at;
    println!(
        "Processed {} of {} image(s) in {}ms",
        report.files.len(),
        report.candidates,
        elapsed.num_milliseconds()
    );
    println!("  Written: {}", report.written());
    println!("  Skipped: {}", report.skipped());
    println!("  Failed:  {}", report.failures);
}

/// Progress on stderr; asks on stdin when a save fails
struct ConsoleObserver {
    policy: OnSaveError,
    quiet: bool,
    total: usize,
}

impl BatchObserver for ConsoleObserver {
    fn on_start(&mut self, job: &BatchJob, total: usize) {
        self.total = total;
        if !self.quiet {
            eprintln!(
                "Watermarking {} image(s) from {} into {}",
                total,
                job.source_root.display(),
                job.destination_root.display()
            );
        }
    }

    fn on_file(&mut self, index: usize, path: &Path) {
        if !self.quiet {
            eprintln!("[{}/{}] {}", index + 1, self.total, path.display());
        }
    }

    fn on_save_failure(&mut self, target: &Path, error: &WatermarkError) -> SaveFailureAction {
        eprintln!("Error saving {}: {}", target.display(), error);
        match self.policy {
            OnSaveError::Continue => SaveFailureAction::Continue,
            OnSaveError::Abort => SaveFailureAction::Abort,
            OnSaveError::Ask => ask_continue(),
        }
    }
}

/// Anything but an explicit yes (or an empty answer) aborts
fn ask_continue() -> SaveFailureAction {
    eprint!("Continue processing? [Y/n] ");
    let _ = std::io::stderr().flush();

    let mut answer = String::new();
    match std::io::stdin().lock().read_line(&mut answer) {
        Ok(0) | Err(_) => SaveFailureAction::Abort,
        Ok(_) => match answer.trim().to_ascii_lowercase().as_str() {
            "" | "y" | "yes" => SaveFailureAction::Continue,
            _ => SaveFailureAction::Abort,
        },
    }
}

fn preview_command(
    store: &ProfileStore,
    config: &AppConfig,
    output: &Path,
    sample: Option<&Path>,
    profile: Option<String>,
    anchor: Option<AnchorPosition>,
    zoom: Option<u32>,
) -> Result<()> {
    let mut session = store.load_session();
    let profile_name = profile.unwrap_or_else(|| session.profile.clone());
    let anchor = anchor.unwrap_or(session.anchor);
    let zoom = zoom.unwrap_or(session.zoom);
    validation::validate_zoom(zoom)?;

    let output_format = image::ImageFormat::from_path(output)
        .with_context(|| format!("Cannot tell the image format of {}", output.display()))?;

    let profile = known_profile(store, &profile_name)?;
    let watermark = Watermark::prepare(&profile, &config.font_resolver())?;

    let sample = match sample {
        Some(path) => format::open_image(path)
            .with_context(|| format!("Failed to open sample {}", path.display()))?,
        None => sample_canvas(SAMPLE_WIDTH, SAMPLE_HEIGHT),
    };

    let preview = render_preview(&sample, &watermark, anchor, zoom);
    save_image(&preview, output, output_format, config.batch.quality)?;
    info!("Preview written to {}", output.display());

    session.profile = profile_name;
    session.anchor = anchor;
    session.zoom = zoom;
    if let Err(e) = store.save_session(&session) {
        warn!("Could not remember session: {}", e);
    }

    println!(
        "Preview {}x{} written to {}",
        preview.width(),
        preview.height(),
        output.display()
    );
    Ok(())
}

fn info_command(manager: &ConfigManager, config: &AppConfig, store: &ProfileStore) {
    println!("Watermarker v{}", version());
    println!("Batch image watermarking tool");
    println!("\nPaths:");
    println!("  Config:        {}", manager.path().display());
    println!("  Profile store: {}", store.path().display());
    println!("\nFont directories:");
    for directory in &config.fonts.directories {
        println!("  {}", directory.display());
    }
    println!(
        "  Fonts found: {}",
        config.font_resolver().scan().len()
    );
    println!("\nAnchors:");
    for anchor in AnchorPosition::ALL {
        println!("  {}", anchor);
    }
    println!("\nSystem Information:");
    println!("  Platform: {}", std::env::consts::OS);
    println!("  Architecture: {}", std::env::consts::ARCH);
}
