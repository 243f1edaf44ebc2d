mod assets;
mod detached;
mod logs;
#[cfg(unix)]
mod mpv;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};
use tvbackground::{
    BackgroundRepository, BackgroundSetting, BackgroundSettingsState, BackgroundSourceType,
    BackgroundStateMachine, BackgroundType, DirectoryMediaIndex, LifecycleEvent, LinkVariant,
    MediaStoreFetchState, MediaStoreScanner, PlaybackController, PlaybackEvent, PlayerFactory,
    resolver,
};
use tvbconfig::Config;
use tvbthumbs::ThumbnailGenerator;

use crate::assets::AssetFactory;
use crate::detached::DetachedFactory;

#[derive(Parser, Debug)]
#[command(name = "tvbackdrop", version, about = "Dynamic TV home-screen backgrounds")]
struct Cli {
    /// Configuration directory (defaults to $TVBACKDROP_CONFIG, ./.tvbackdrop or ~/.tvbackdrop)
    #[arg(long, global = true)]
    config_dir: Option<String>,

    /// Log level, overrides host.logger.min_level
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the selected background
    Current,
    /// List bundled and imported backgrounds
    List,
    /// Select a background by path or link
    Select {
        locator: String,
        /// Media kind, guessed from the extension when omitted
        #[arg(long, value_enum)]
        kind: Option<Kind>,
        #[arg(long)]
        name: Option<String>,
        /// Treat the locator as a remote link even without an http scheme
        #[arg(long)]
        url: bool,
    },
    /// Copy a local file into the import directory and select it
    Import {
        file: PathBuf,
        #[arg(long, value_enum)]
        kind: Option<Kind>,
    },
    /// List images and videos found under the media roots
    Scan {
        /// Extra directory to scan, may be repeated
        #[arg(long)]
        root: Vec<PathBuf>,
        /// Import and select the n-th result (1-based)
        #[arg(long)]
        pick: Option<usize>,
    },
    /// Print the renderable locator of a path or link
    Resolve {
        locator: String,
        /// Print the preview link instead of the direct one
        #[arg(long)]
        thumbnail: bool,
    },
    /// Write a square preview of a background
    Thumbnail {
        path: String,
        #[arg(short, long)]
        output: PathBuf,
        #[arg(long)]
        size: Option<u32>,
    },
    /// Render the selected background until interrupted
    Run,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Kind {
    Image,
    Video,
}

impl From<Kind> for BackgroundType {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Image => BackgroundType::Image,
            Kind::Video => BackgroundType::Video,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Arc::new(
        Config::load_config(cli.config_dir.as_deref().unwrap_or(""))
            .context("cannot load configuration")?,
    );
    logs::init_logging(&config, cli.log_level.as_deref());

    match cli.command {
        Commands::Current => {
            let machine = state_machine(&config, Arc::new(DetachedFactory), Vec::new())?;
            let current = loaded(&machine).await?.0;
            print_setting(&current, true);
        }
        Commands::List => {
            let machine = state_machine(&config, Arc::new(DetachedFactory), Vec::new())?;
            let (current, available) = loaded(&machine).await?;
            for setting in &available {
                print_setting(setting, setting.is_same_resource(&current));
            }
        }
        Commands::Select {
            locator,
            kind,
            name,
            url,
        } => {
            let setting = setting_for(&locator, kind, name, url)?;
            let machine = state_machine(&config, Arc::new(DetachedFactory), Vec::new())?;
            machine.select(setting).await;
            let current = loaded(&machine).await?.0;
            print_setting(&current, true);
        }
        Commands::Import { file, kind } => {
            let kind = kind_for(&file.to_string_lossy(), kind)?;
            let machine = state_machine(&config, Arc::new(DetachedFactory), Vec::new())?;
            machine.select_local(&file.to_string_lossy(), kind).await;
            let current = loaded(&machine).await?.0;
            print_setting(&current, true);
        }
        Commands::Scan { root, pick } => {
            let machine = state_machine(&config, Arc::new(DetachedFactory), root)?;
            machine.scan().await;
            let items = match machine.scan_state() {
                MediaStoreFetchState::Success { items } => items,
                MediaStoreFetchState::Empty => {
                    println!("No image or video found");
                    return Ok(());
                }
                MediaStoreFetchState::Error { message } => bail!(message),
                other => bail!("unexpected scan state {other:?}"),
            };
            for (i, item) in items.iter().enumerate() {
                println!("{:>3}  {:<5}  {}", i + 1, item.kind, item.path);
            }
            if let Some(n) = pick {
                let item = n
                    .checked_sub(1)
                    .and_then(|i| items.get(i))
                    .ok_or_else(|| anyhow!("no item #{n}"))?;
                machine.select_media_item(item).await;
                let current = loaded(&machine).await?.0;
                print_setting(&current, true);
            }
        }
        Commands::Resolve { locator, thumbnail } => {
            let source_type = source_type_for(&locator, false);
            let variant = if thumbnail {
                LinkVariant::Thumbnail
            } else {
                LinkVariant::DirectView
            };
            println!("{}", resolver::resolve_locator(source_type, &locator, variant));
        }
        Commands::Thumbnail { path, output, size } => {
            let mut generator = ThumbnailGenerator::from_config(&config);
            if let Some(size) = size {
                generator = generator.with_size(size);
            }
            let assets_dir = config.get_assets_dir()?;
            let thumbnail = generator
                .generate(&assets::locate(Path::new(&assets_dir), &path))
                .await
                .ok_or_else(|| anyhow!("no thumbnail for {path}"))?;
            thumbnail
                .save(&output)
                .with_context(|| format!("cannot write {}", output.display()))?;
            println!("{}", output.display());
        }
        Commands::Run => run(&config).await?,
    }

    Ok(())
}

#[cfg(unix)]
async fn run(config: &Arc<Config>) -> Result<()> {
    let ipc_dir = config.get_ipc_dir()?;
    let factory = Arc::new(mpv::MpvFactory::new(config.get_player_command(), ipc_dir));
    let machine = state_machine(config, factory, Vec::new())?;

    let events = machine.playback().subscribe();
    std::thread::spawn(move || {
        for event in events {
            match event {
                PlaybackEvent::Ready { url } => info!(url = %url, "Background playing"),
                PlaybackEvent::Failed { url, message } => {
                    warn!(url = %url, error = %message, "Background playback failed")
                }
                other => tracing::debug!(?other, "Playback event"),
            }
        }
    });

    machine.load().await;
    match machine.state() {
        BackgroundSettingsState::Loaded { current, .. } => {
            info!(name = current.name(), kind = %current.background_type(), "Background active");
        }
        BackgroundSettingsState::Error { message } => bail!(message),
        other => bail!("unexpected state {other:?}"),
    }

    info!("Press Ctrl+C to stop...");
    tokio::signal::ctrl_c().await?;
    machine.handle_lifecycle(LifecycleEvent::Destroyed);
    Ok(())
}

#[cfg(not(unix))]
async fn run(_config: &Arc<Config>) -> Result<()> {
    bail!("video rendering needs a unix platform")
}

fn state_machine(
    config: &Arc<Config>,
    factory: Arc<dyn PlayerFactory>,
    extra_roots: Vec<PathBuf>,
) -> Result<BackgroundStateMachine> {
    let repository = BackgroundRepository::from_config(config.clone())?;

    let index = DirectoryMediaIndex::from_config(config);
    let mut roots = index.roots().to_vec();
    roots.extend(extra_roots);
    let scanner = MediaStoreScanner::new(Arc::new(DirectoryMediaIndex::new(roots)));

    let factory = Arc::new(AssetFactory::new(factory, config.get_assets_dir()?));
    let playback = Arc::new(PlaybackController::new(factory));
    Ok(BackgroundStateMachine::new(repository, scanner, playback))
}

/// Loads when needed and returns (current, available).
async fn loaded(
    machine: &BackgroundStateMachine,
) -> Result<(BackgroundSetting, Vec<BackgroundSetting>)> {
    if matches!(machine.state(), BackgroundSettingsState::Initial) {
        machine.load().await;
    }
    match machine.state() {
        BackgroundSettingsState::Loaded { available, current } => Ok((current, available)),
        BackgroundSettingsState::Error { message } => bail!(message),
        other => bail!("unexpected state {other:?}"),
    }
}

fn source_type_for(locator: &str, force_url: bool) -> BackgroundSourceType {
    let lower = locator.to_ascii_lowercase();
    if force_url || lower.starts_with("http://") || lower.starts_with("https://") {
        BackgroundSourceType::Url
    } else {
        BackgroundSourceType::Local
    }
}

fn kind_for(locator: &str, kind: Option<Kind>) -> Result<BackgroundType> {
    kind.map(BackgroundType::from)
        .or_else(|| BackgroundType::from_locator(locator))
        .ok_or_else(|| anyhow!("cannot guess the media kind of {locator}, use --kind"))
}

fn setting_for(
    locator: &str,
    kind: Option<Kind>,
    name: Option<String>,
    force_url: bool,
) -> Result<BackgroundSetting> {
    let source_type = source_type_for(locator, force_url);
    let background_type = match (kind, source_type) {
        (Some(kind), _) => kind.into(),
        // Sharing links rarely carry an extension
        (None, BackgroundSourceType::Url) => {
            BackgroundType::from_locator(locator).unwrap_or(BackgroundType::Video)
        }
        (None, BackgroundSourceType::Local) => kind_for(locator, None)?,
    };
    let name = name
        .or_else(|| resolver::extract_file_id(locator))
        .unwrap_or_else(|| {
            Path::new(locator.split(['?', '#']).next().unwrap_or(locator))
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default()
        });
    Ok(BackgroundSetting::new(
        background_type,
        source_type,
        locator,
        name,
    )?)
}

fn print_setting(setting: &BackgroundSetting, selected: bool) {
    println!(
        "{} {:<5} {:<5} {:<20} {}",
        if selected { "*" } else { " " },
        setting.background_type(),
        setting.source_type(),
        setting.name(),
        setting.resource_path()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_type_from_scheme() {
        assert_eq!(
            source_type_for("https://drive.example.com/open?id=1", false),
            BackgroundSourceType::Url
        );
        assert_eq!(source_type_for("/data/a.mp4", false), BackgroundSourceType::Local);
        assert_eq!(source_type_for("/data/a.mp4", true), BackgroundSourceType::Url);
    }

    #[test]
    fn sharing_link_defaults_to_video() {
        let setting =
            setting_for("https://drive.example.com/file/d/ABC/view", None, None, false).unwrap();
        assert_eq!(setting.background_type(), BackgroundType::Video);
        assert_eq!(setting.source_type(), BackgroundSourceType::Url);
        assert_eq!(setting.name(), "ABC");
    }

    #[test]
    fn local_kind_must_be_known() {
        assert!(setting_for("/data/notes.txt", None, None, false).is_err());
        let image = setting_for("/data/beach.png", None, Some("Beach".into()), false).unwrap();
        assert_eq!(image.background_type(), BackgroundType::Image);
        assert_eq!(image.name(), "Beach");
    }

    #[test]
    fn cli_parses_select() {
        let cli = Cli::try_parse_from([
            "tvbackdrop",
            "--config-dir",
            "/tmp/tvb",
            "select",
            "/data/a.jpg",
            "--kind",
            "image",
        ])
        .unwrap();
        assert_eq!(cli.config_dir.as_deref(), Some("/tmp/tvb"));
        assert!(matches!(
            cli.command,
            Commands::Select {
                kind: Some(Kind::Image),
                url: false,
                ..
            }
        ));
    }
}
