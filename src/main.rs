use anyhow::Context;
use capamap::models::capa::{CapaKind, parse_batch};
use capamap::overlay::thematic::ThematicKind;
use capamap::services::{CapaStore, GraphicsClient, HttpCapaStore};
use capamap::{App, Config, HeadlessWidget, MapWidget};
use clap::{Parser, Subcommand};
use comfy_table::{Attribute, Cell, CellAlignment, Table};
use geojson::{Feature, GeoJson};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "capamap", version, about = "Manage and inspect capas for the city-planning map")]
struct Cli {
    /// Base URL of the capa persistence service
    #[arg(long, default_value = "http://localhost:8081/api/capas")]
    api_url: String,

    /// Base URL of the population-graphics service
    #[arg(long, default_value = "http://localhost:8081/api/graphics")]
    graphics_url: String,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List saved capas
    List {
        /// Restrict to one kind (pob, vivienda, transport, green, expansion)
        #[arg(long)]
        kind: Option<CapaKind>,
    },
    /// Save the features of a GeoJSON file as a new capa
    Save {
        #[arg(long)]
        kind: CapaKind,
        file: PathBuf,
    },
    /// Delete a capa by id
    Delete { id: i64 },
    /// Population-graphics image URLs for a year
    Graphics {
        #[arg(long, default_value_t = 2020)]
        year: i32,
    },
    /// Load everything onto a headless map and print what ends up on it
    Summary,
}

/// Default level is `info`; `--debug` raises it to `debug` and lets
/// `RUST_LOG` override.
fn init_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::new("info")
    };
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Accept either a FeatureCollection document or a bare JSON array of
/// features, which is the shape the persistence service stores.
fn read_features(path: &Path) -> anyhow::Result<Vec<Feature>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    if let Ok(features) = serde_json::from_str::<Vec<Feature>>(&raw) {
        return Ok(features);
    }
    match raw
        .parse::<GeoJson>()
        .with_context(|| format!("{} is not valid GeoJSON", path.display()))?
    {
        GeoJson::FeatureCollection(collection) => Ok(collection.features),
        GeoJson::Feature(feature) => Ok(vec![feature]),
        GeoJson::Geometry(_) => {
            anyhow::bail!("{} holds a bare geometry, not features", path.display())
        }
    }
}

fn bold(text: &str) -> Cell {
    Cell::new(text).add_attribute(Attribute::Bold)
}

async fn list_capas(store: &HttpCapaStore, kind: Option<CapaKind>) -> anyhow::Result<()> {
    let dtos = match kind {
        Some(kind) => store.list_by_kind(kind).await?,
        None => store.list_all().await?,
    };
    let (capas, failures) = parse_batch(&dtos);
    for failure in &failures {
        tracing::warn!(error = %failure, "skipping malformed capa record");
    }

    let mut table = Table::new();
    table
        .set_header(vec![
            bold("Id").set_alignment(CellAlignment::Right),
            bold("Tipo"),
            bold("Features").set_alignment(CellAlignment::Right),
            bold("Creado"),
        ])
        .load_preset(comfy_table::presets::ASCII_BORDERS_ONLY_CONDENSED);
    for capa in &capas {
        table.add_row(vec![
            Cell::new(capa.id).set_alignment(CellAlignment::Right),
            Cell::new(capa.kind.label()),
            Cell::new(capa.features.len()).set_alignment(CellAlignment::Right),
            Cell::new(capa.created_at.as_deref().unwrap_or("-")),
        ]);
    }
    println!("{table}");
    println!("{} capas", capas.len());
    Ok(())
}

/// Run the full client stack against an in-memory widget: load the saved
/// capas, show them, enable every thematic overlay, then report what the
/// widget ended up holding.
async fn summary(config: Config) -> anyhow::Result<()> {
    let store: Arc<dyn CapaStore> = Arc::new(HttpCapaStore::new(config.capas_url.clone()));
    let mut widget = HeadlessWidget::new();
    let mut app = App::new(config, store);

    // Attach before the style is ready so the deferred paths run too.
    app.attach(&mut widget);
    widget.finish_style_load();
    drain(&mut widget, &mut app);

    app.refresh_capas(&mut widget).await?;
    app.set_show_saved(&mut widget, true);
    for kind in ThematicKind::ALL {
        app.toggle_thematic(&mut widget, kind, true);
        widget.finish_source_load(kind.source_id());
    }
    drain(&mut widget, &mut app);

    let mut table = Table::new();
    table
        .set_header(vec![
            bold("Overlay"),
            bold("Features").set_alignment(CellAlignment::Right),
            bold("Layers"),
        ])
        .load_preset(comfy_table::presets::ASCII_BORDERS_ONLY_CONDENSED);
    for overlay in app.registry().desired() {
        let layers = [overlay.fill_layer_id(), overlay.line_layer_id()]
            .iter()
            .filter(|id| widget.has_layer(id))
            .cloned()
            .collect::<Vec<_>>()
            .join(", ");
        table.add_row(vec![
            Cell::new(&overlay.id),
            Cell::new(overlay.features.len()).set_alignment(CellAlignment::Right),
            Cell::new(layers),
        ]);
    }
    for kind in ThematicKind::ALL {
        let layers = kind
            .layer_ids()
            .into_iter()
            .filter(|id| widget.has_layer(id))
            .collect::<Vec<_>>()
            .join(", ");
        table.add_row(vec![
            Cell::new(kind.label()),
            Cell::new("-").set_alignment(CellAlignment::Right),
            Cell::new(layers),
        ]);
    }
    println!("{table}");
    println!(
        "{} sources, {} layers on the widget",
        widget.source_ids().len(),
        widget.layer_ids().len()
    );

    app.teardown(&mut widget);
    Ok(())
}

fn drain(widget: &mut HeadlessWidget, app: &mut App) {
    while let Some(event) = widget.poll_event() {
        app.handle_event(widget, &event);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let config = Config {
        capas_url: cli.api_url.clone(),
        graphics_url: cli.graphics_url.clone(),
        ..Config::default()
    };

    match cli.command {
        Command::List { kind } => {
            list_capas(&HttpCapaStore::new(config.capas_url.clone()), kind).await?;
        }
        Command::Save { kind, file } => {
            let features = read_features(&file)?;
            let store = HttpCapaStore::new(config.capas_url.clone());
            let saved = store.save(&features, kind).await?;
            println!("{} (id {})", saved.message, saved.id);
        }
        Command::Delete { id } => {
            let store = HttpCapaStore::new(config.capas_url.clone());
            store.delete(id).await?;
            println!("capa {} eliminada", id);
        }
        Command::Graphics { year } => {
            let client = GraphicsClient::new(config.graphics_url.clone());
            let urls = client.urls_for_year(year).await?;
            if urls.is_empty() {
                println!("sin gráficas para {}", year);
            } else {
                for url in urls {
                    println!("{url}");
                }
            }
        }
        Command::Summary => summary(config).await?,
    }
    Ok(())
}
