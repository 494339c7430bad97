//! Varia CLI - composition root for the variation render pipeline

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use varia_core::application::{
    combination_count, generate_combinations, project, resolve_name, AxisService, NamingConfig,
    QueueConfig, RenderQueue,
};
use varia_core::domain::{
    Axis, ElementKind, JobStatus, NodeContent, Template, SPEED_ELEMENT_ID,
};
use varia_core::port::id_provider::UuidProvider;
use varia_core::port::time_provider::SystemTimeProvider;
use varia_core::port::AxisRecord;
use varia_infra_render::{FsArtifactStore, HttpRenderBackend, HttpVariationStore};
use varia_infra_sqlite::{create_pool, run_migrations, SqliteJobRepository};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const DEFAULT_DB_PATH: &str = "varia.db";
const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8090";
const DEFAULT_OUTPUT_DIR: &str = "renders";
const DEFAULT_PLAN_CAP: u64 = 500;

#[derive(Parser)]
#[command(name = "varia")]
#[command(about = "Template variation enumeration and batch rendering", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// SQLite database path
    #[arg(long, env = "VARIA_DB_PATH", default_value = DEFAULT_DB_PATH)]
    db_path: String,

    /// Render backend base URL
    #[arg(long, env = "VARIA_BACKEND_URL", default_value = DEFAULT_BACKEND_URL)]
    backend_url: String,

    /// Directory where finished artifacts are written
    #[arg(long, env = "VARIA_OUTPUT_DIR", default_value = DEFAULT_OUTPUT_DIR)]
    output_dir: String,

    /// Variation API base URL (when variations are not given as a file)
    #[arg(long, env = "VARIA_VARIATIONS_URL")]
    variations_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Enumerate combinations and resolved names without rendering
    Plan {
        /// Template JSON file
        #[arg(short, long)]
        template: PathBuf,

        /// Variation records JSON file (array of per-element records)
        #[arg(short, long)]
        variations: Option<PathBuf>,

        /// Warn when the combination count exceeds this cap
        #[arg(long, default_value_t = DEFAULT_PLAN_CAP)]
        cap: u64,
    },

    /// Enumerate, enqueue, and render every combination
    Render {
        /// Template JSON file
        #[arg(short, long)]
        template: PathBuf,

        /// Variation records JSON file (array of per-element records)
        #[arg(short, long)]
        variations: Option<PathBuf>,

        /// Concurrent render ceiling (persisted)
        #[arg(short, long)]
        concurrency: Option<usize>,

        /// Filename format string ({project}, {text}, {speed}, {font}, {tokens})
        #[arg(long)]
        format: Option<String>,
    },

    /// List persisted render jobs
    Jobs,

    /// Remove all completed jobs
    Clear,
}

fn init_tracing() {
    let log_format = std::env::var("VARIA_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("varia=info"))
        .expect("Failed to create env filter");

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty())
                .init();
        }
    }
}

fn load_template(path: &Path) -> Result<Template> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read template file {}", path.display()))?;
    serde_json::from_str(&raw).context("Invalid template JSON")
}

/// Build axes from local records: same orphan and kind rules as the axis
/// service, element order taken from the template
fn axes_from_records(template: &Template, records: Vec<AxisRecord>) -> Result<Vec<Axis>> {
    let mut by_key: HashMap<(String, ElementKind), AxisRecord> = records
        .into_iter()
        .map(|r| ((r.element_id.clone(), r.kind), r))
        .collect();

    let mut axes = Vec::new();
    for element in template.elements() {
        let mut kinds = vec![element.kind];
        if matches!(element.content, NodeContent::Text { .. }) {
            kinds.push(ElementKind::Font);
        }
        for kind in kinds {
            let Some(record) = by_key.remove(&(element.id.clone(), kind)) else {
                continue;
            };
            axes.push(Axis::with_variations(
                record.element_id,
                record.kind,
                record.original_value,
                record.variations,
            )?);
        }
    }

    // The template-wide speed axis rides under a synthetic element id
    if let Some(record) = by_key.remove(&(SPEED_ELEMENT_ID.to_string(), ElementKind::Speed)) {
        axes.push(Axis::with_variations(
            record.element_id,
            record.kind,
            record.original_value,
            record.variations,
        )?);
    }

    if !by_key.is_empty() {
        let orphans: Vec<String> = by_key
            .keys()
            .map(|(id, kind)| format!("{}/{}", id, kind))
            .collect();
        warn!(orphans = ?orphans, "variation records reference elements not in the template");
    }

    Ok(axes)
}

async fn load_axes(
    template: &Template,
    variations: Option<&Path>,
    variations_url: Option<&str>,
) -> Result<Vec<Axis>> {
    match (variations, variations_url) {
        (Some(path), _) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read variations file {}", path.display()))?;
            let records: Vec<AxisRecord> =
                serde_json::from_str(&raw).context("Invalid variations JSON")?;
            axes_from_records(template, records)
        }
        (None, Some(url)) => {
            let store = Arc::new(HttpVariationStore::new(url)?);
            let service = AxisService::new(store);
            service
                .load_axes(&template.project, template)
                .await
                .map_err(Into::into)
        }
        (None, None) => {
            info!("no variations supplied; planning the original only");
            Ok(Vec::new())
        }
    }
}

async fn build_queue(cli: &Cli) -> Result<RenderQueue> {
    let pool = create_pool(&cli.db_path)
        .await
        .map_err(|e| anyhow::anyhow!("DB pool creation failed: {}", e))?;
    run_migrations(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("Migration failed: {}", e))?;

    let repo = Arc::new(SqliteJobRepository::new(pool));
    let backend = Arc::new(HttpRenderBackend::new(&cli.backend_url)?);
    let artifacts = Arc::new(FsArtifactStore::new(&cli.output_dir));

    let queue = RenderQueue::load(
        repo,
        backend,
        artifacts,
        Arc::new(SystemTimeProvider),
        Arc::new(UuidProvider),
        QueueConfig::default(),
    )
    .await?;

    Ok(queue)
}

fn print_job_line(job: &varia_core::domain::RenderJob) {
    let detail = match job.status {
        JobStatus::Completed => job.artifact_path.clone().unwrap_or_default(),
        JobStatus::Failed => job.error.clone().unwrap_or_default(),
        _ => format!("{}%", job.progress),
    };
    println!(
        "  {:<38} {:<10} {:<30} {}",
        job.id,
        job.status.to_string(),
        job.name,
        detail
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    info!("varia v{}", VERSION);

    match &cli.command {
        Commands::Plan {
            template,
            variations,
            cap,
        } => {
            let template = load_template(template)?;
            let axes = load_axes(&template, variations.as_deref(), cli.variations_url.as_deref())
                .await?;

            let count = combination_count(&axes);
            if count > *cap {
                warn!(count = count, cap = *cap, "combination count exceeds cap");
            }

            println!("Project:      {}", template.project);
            println!("Axes:         {}", axes.len());
            println!("Combinations: {}", count);
            println!();

            let naming = NamingConfig::new(&template.project, "mp4");
            for combination in generate_combinations(&axes)? {
                println!("  {}", resolve_name(&combination, &naming, &template));
            }
        }

        Commands::Render {
            template,
            variations,
            concurrency,
            format,
        } => {
            let template = load_template(template)?;
            let axes = load_axes(&template, variations.as_deref(), cli.variations_url.as_deref())
                .await?;

            let combinations = generate_combinations(&axes)?;
            info!(combinations = combinations.len(), "enqueuing render batch");

            let queue = build_queue(&cli).await?;
            if let Some(n) = concurrency {
                queue.set_concurrency(*n).await?;
            }

            let mut naming = NamingConfig::new(&template.project, "mp4");
            naming.format = format.clone();

            let mut batch = Vec::with_capacity(combinations.len());
            for combination in &combinations {
                let name = resolve_name(combination, &naming, &template);
                let descriptor = project(&template, combination);
                let id = queue.enqueue(name, descriptor).await?;
                batch.push(id);
            }

            // Drive this batch to completion
            loop {
                let jobs = queue.jobs();
                let done = batch.iter().all(|id| {
                    jobs.iter()
                        .find(|j| &j.id == id)
                        .map_or(true, |j| j.status.is_terminal())
                });
                if done {
                    break;
                }
                tokio::time::sleep(std::time::Duration::from_millis(500)).await;
            }

            let jobs = queue.jobs();
            let mut failed = 0usize;
            println!();
            for id in &batch {
                if let Some(job) = jobs.iter().find(|j| &j.id == id) {
                    if job.status == JobStatus::Failed {
                        failed += 1;
                    }
                    print_job_line(job);
                }
            }
            println!();
            println!("{} rendered, {} failed", batch.len() - failed, failed);

            if failed > 0 {
                std::process::exit(1);
            }
        }

        Commands::Jobs => {
            let queue = build_queue(&cli).await?;
            let jobs = queue.jobs();
            if jobs.is_empty() {
                println!("No render jobs");
            } else {
                for job in &jobs {
                    print_job_line(job);
                }
            }
        }

        Commands::Clear => {
            let queue = build_queue(&cli).await?;
            let cleared = queue.clear_completed().await?;
            println!("{} completed jobs removed", cleared);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use varia_core::domain::{ElementNode, FontSpec, TemplateNode, Variation, VariationValue};

    fn text_template() -> Template {
        Template {
            id: "tpl".to_string(),
            project: "demo".to_string(),
            platform: None,
            duration_ms: 1000.0,
            nodes: vec![TemplateNode::Element(ElementNode {
                id: "headline".to_string(),
                kind: ElementKind::Text,
                content: NodeContent::Text {
                    text: "Buy now".to_string(),
                    font: FontSpec {
                        family: "Inter".to_string(),
                        size: 32.0,
                    },
                },
                window: None,
                playback_rate: 1.0,
            })],
        }
    }

    #[test]
    fn test_axes_from_records_loads_font_and_speed_alongside_text() {
        let records = vec![
            AxisRecord {
                element_id: "headline".to_string(),
                kind: ElementKind::Text,
                original_value: VariationValue::Text {
                    text: "Buy now".to_string(),
                },
                variations: vec![Variation {
                    id: "headline-v1".to_string(),
                    element_id: "headline".to_string(),
                    kind: ElementKind::Text,
                    value: VariationValue::Text {
                        text: "Act fast".to_string(),
                    },
                    order: 1,
                }],
            },
            AxisRecord {
                element_id: "headline".to_string(),
                kind: ElementKind::Font,
                original_value: VariationValue::Font {
                    font: FontSpec {
                        family: "Inter".to_string(),
                        size: 32.0,
                    },
                },
                variations: vec![],
            },
            AxisRecord {
                element_id: SPEED_ELEMENT_ID.to_string(),
                kind: ElementKind::Speed,
                original_value: VariationValue::Speed { multiplier: 1.0 },
                variations: vec![Variation {
                    id: "speed-v1".to_string(),
                    element_id: SPEED_ELEMENT_ID.to_string(),
                    kind: ElementKind::Speed,
                    value: VariationValue::Speed { multiplier: 2.0 },
                    order: 1,
                }],
            },
        ];

        let axes = axes_from_records(&text_template(), records).unwrap();
        let kinds: Vec<ElementKind> = axes.iter().map(|a| a.kind).collect();
        assert_eq!(
            kinds,
            vec![ElementKind::Text, ElementKind::Font, ElementKind::Speed]
        );
        assert_eq!(axes[2].element_id, SPEED_ELEMENT_ID);
    }

    #[test]
    fn test_axes_from_records_drops_orphans() {
        let records = vec![AxisRecord {
            element_id: "deleted".to_string(),
            kind: ElementKind::Text,
            original_value: VariationValue::Text {
                text: "gone".to_string(),
            },
            variations: vec![],
        }];

        let axes = axes_from_records(&text_template(), records).unwrap();
        assert!(axes.is_empty());
    }
}
