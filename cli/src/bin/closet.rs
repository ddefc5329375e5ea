use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use cli::{StrokeInput, display_summary, parse_category, parse_viewport, resolve_api_key};
use color_eyre::eyre::{Result, eyre};
use cutout::{FillRule, MaskExtractor, MaskingSession, PreviewRenderer, compose_preview, encode_png};
use tracing::{error, info, warn};
use tracing_subscriber::{self, EnvFilter};
use tryon::HttpTryOnApi;
use wardrobe::{AppConfig, FsImageProvider, Studio, StudioUpdate, load_photo};
use wardrobe_common::{GarmentCategory, JobStatus, OutfitState, Size};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a .toml or .json configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Try-on API key (or set the variable named by api.api_key_env, TRYON_API_KEY by default)
    #[arg(long, global = true)]
    api_key: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Cut a garment out of a photo along a recorded lasso
    Extract {
        /// Source photo
        #[arg(short, long)]
        image: PathBuf,
        /// JSON file with the lasso points, in view coordinates
        #[arg(short, long)]
        stroke: PathBuf,
        /// Viewport the lasso was drawn in, e.g. 390x844
        #[arg(long, value_parser = parse_viewport)]
        viewport: Size,
        /// Also write what the user saw (photo + overlay)
        #[arg(long)]
        preview: Option<PathBuf>,
        /// Fill rule for self-intersecting lassos
        #[arg(long, default_value = "non-zero")]
        fill_rule: FillRule,
        /// Output PNG path
        #[arg(short, long)]
        output: PathBuf,
    },
    /// File a cut-out PNG in the wardrobe
    AddItem {
        #[arg(long)]
        cutout: PathBuf,
        #[arg(long, value_parser = parse_category)]
        category: GarmentCategory,
    },
    /// Render one garment onto one photo
    TryOn {
        #[arg(long)]
        model: PathBuf,
        #[arg(long)]
        garment: PathBuf,
        #[arg(long, value_parser = parse_category)]
        category: GarmentCategory,
    },
    /// Render a wardrobe top and bottom onto a base photo
    Outfit {
        #[arg(long)]
        base: PathBuf,
        /// Wardrobe item id of the top
        #[arg(long)]
        top: String,
        /// Wardrobe item id of the bottom
        #[arg(long)]
        bottom: String,
        /// Accessory item ids recorded alongside the outfit
        #[arg(long)]
        accessory: Vec<String>,
    },
    /// Print wardrobe items, outfits and try-on results
    List,
    /// Delete a wardrobe item, outfit or try-on result and its image
    Delete { id: String },
    /// Print the configuration JSON schema
    Schema,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::default(),
    };

    match cli.command {
        Commands::Extract {
            image,
            stroke,
            viewport,
            preview,
            fill_rule,
            output,
        } => {
            extract(&config, &image, &stroke, viewport, preview.as_deref(), fill_rule, &output)?;
        }
        Commands::AddItem { cutout, category } => {
            let mut studio = open_studio(&config, String::new())?;
            let image = image::open(&cutout)?.to_rgba8();
            let item = studio.wardrobe_mut().add_cutout(&image, category)?;
            info!("Added {} {} -> {}", item.category, item.id, item.local_path);
        }
        Commands::TryOn { model, garment, category } => {
            let mut studio = open_studio(&config, resolve_api_key(cli.api_key.as_deref(), &config.api.api_key_env)?)?;
            let photos = FsImageProvider::new();
            let model = load_photo(&photos, &model.to_string_lossy())?;
            let garment = load_photo(&photos, &garment.to_string_lossy())?;

            let record = studio.start_try_on(model, garment, category).await?;
            info!("Try-on {} pending", record.id);
            wait_for(&mut studio, &record.id).await?;

            match studio.result(&record.id).map(|r| &r.status) {
                Some(JobStatus::Completed { local_path, image_url }) => {
                    info!("✅ Try-on ready: {} ({})", local_path.as_deref().unwrap_or(image_url), image_url);
                }
                Some(JobStatus::Failed { reason }) => return Err(eyre!("Try-on failed: {reason}")),
                _ => return Err(eyre!("Try-on {} ended without a result", record.id)),
            }
        }
        Commands::Outfit {
            base,
            top,
            bottom,
            accessory,
        } => {
            let mut studio = open_studio(&config, resolve_api_key(cli.api_key.as_deref(), &config.api.api_key_env)?)?;
            let base = load_photo(&FsImageProvider::new(), &base.to_string_lossy())?;

            let record = studio.start_outfit(base, &top, &bottom, accessory)?;
            info!("Outfit {} processing", record.id);
            let update = wait_for(&mut studio, &record.id).await?;

            match studio.outfit(&record.id).map(|o| &o.state) {
                Some(OutfitState::Ready { local_path, .. }) => info!("✅ Outfit ready: {local_path}"),
                _ => match update {
                    StudioUpdate::OutfitDiscarded { reason, .. } => {
                        return Err(eyre!("Outfit discarded: {reason}"));
                    }
                    _ => return Err(eyre!("Outfit {} ended without an image", record.id)),
                },
            }
        }
        Commands::List => {
            let studio = open_studio(&config, String::new())?;
            list(&studio);
        }
        Commands::Delete { id } => {
            let mut studio = open_studio(&config, String::new())?;
            let removed = studio.wardrobe_mut().remove(&id)?
                || studio.delete_outfit(&id)?
                || studio.delete_result(&id)?;
            if removed {
                info!("Deleted {id}");
            } else {
                warn!("Nothing with id {id}");
            }
        }
        Commands::Schema => {
            println!("{}", serde_json::to_string_pretty(&AppConfig::schema())?);
        }
    }

    Ok(())
}

/// Local-only commands pass an empty key; they never reach the API
fn open_studio(config: &AppConfig, api_key: String) -> Result<Studio> {
    let api = HttpTryOnApi::new(&config.api.base_url, api_key, config.api.request_timeout())?;
    Ok(Studio::open(config, Arc::new(api))?)
}

/// Apply updates until the chain for `id` reports back
async fn wait_for(studio: &mut Studio, id: &str) -> Result<StudioUpdate> {
    while let Some(update) = studio.next_update().await {
        let done = update.record_id() == id;
        if let Err(err) = studio.apply(update.clone()) {
            error!("Could not record outcome for {}: {err}", update.record_id());
            if done {
                return Err(err.into());
            }
        }
        if done {
            return Ok(update);
        }
    }
    Err(eyre!("Studio closed before {id} finished"))
}

fn extract(
    config: &AppConfig,
    image_path: &Path,
    stroke_path: &Path,
    viewport: Size,
    preview: Option<&Path>,
    fill_rule: FillRule,
    output: &Path,
) -> Result<()> {
    let photo = load_photo(&FsImageProvider::new(), &image_path.to_string_lossy())?;
    let stroke = StrokeInput::from_json_file(stroke_path)?;

    let mut session = MaskingSession::with_renderer(
        &photo,
        viewport,
        config.masking.control_bar_height,
        PreviewRenderer::new(viewport),
    )?
    .with_extractor(MaskExtractor::new(fill_rule));
    stroke.replay(&mut session)?;

    info!("{}", display_summary(photo.width(), photo.height(), &session.display_rect()));

    if let Some(path) = preview {
        let layer = session.tracker().renderer().layer();
        compose_preview(session.source(), session.mapper(), layer).save(path)?;
        info!("Preview written to {:?}", path);
    }

    let cutout = match session.extract() {
        Ok(cutout) => cutout,
        Err(err) if err.is_user_correctable() => {
            return Err(eyre!("{err}; redraw the lasso around the garment"));
        }
        Err(err) => return Err(err.into()),
    };
    std::fs::write(output, encode_png(&cutout)?)?;
    info!("✅ Cut-out {}x{} written to {:?}", cutout.width(), cutout.height(), output);
    Ok(())
}

fn list(studio: &Studio) {
    println!("Wardrobe ({} items)", studio.wardrobe().items().len());
    for item in studio.wardrobe().items() {
        println!("  {}  {:<10} {}", item.id, item.category, item.local_path);
    }

    println!("Outfits ({})", studio.outfits().len());
    for outfit in studio.outfits() {
        let state = match &outfit.state {
            OutfitState::Processing => "processing".to_string(),
            OutfitState::Ready { local_path, .. } => local_path.clone(),
        };
        println!("  {}  top={} bottom={}  {}", outfit.id, outfit.top_item_id, outfit.bottom_item_id, state);
    }

    println!("Try-on results ({})", studio.results().len());
    for result in studio.results() {
        let status = match &result.status {
            JobStatus::Pending => "pending".to_string(),
            JobStatus::Completed { local_path, image_url } => local_path.clone().unwrap_or_else(|| image_url.clone()),
            JobStatus::Failed { reason } => format!("failed: {reason}"),
        };
        println!("  {}  {:<10} {}", result.id, result.category, status);
    }
}
