use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use slide_client::SlideApi;
use slide_common::{SearchRequest, SlideConfig};
use slide_core::{
    reference_file_name, GenerationMode, GenerationWorkflow, LibraryWorkflow, SlideViewModel,
    TemplateFile,
};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "slide")]
#[command(about = "Compose, generate and browse slide decks through the slide service")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Service base URL (overrides SLIDE_API_BASE_URL and the config file)
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Enable debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(clap::Args)]
pub struct ContextArgs {
    /// Markdown context document (repeatable, kept in the given order)
    #[arg(short, long = "context")]
    pub context: Vec<PathBuf>,

    /// Directory whose .md files are all added as context, by file name
    #[arg(long)]
    pub context_dir: Option<PathBuf>,

    /// Server-side output directory
    #[arg(long)]
    pub output_dir: Option<String>,

    /// Download every returned file into this directory
    #[arg(long)]
    pub fetch_into: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build a deck from a literal outline
    Compose {
        /// Outline text
        #[arg(long)]
        outline: Option<String>,
        /// Read the outline from a file
        #[arg(long, conflicts_with = "outline")]
        outline_file: Option<PathBuf>,
        /// Slide-count hint
        #[arg(short, long)]
        num_slides: Option<u32>,
        #[command(flatten)]
        context: ContextArgs,
    },
    /// Generate a deck from a prompt and a .pptx template
    Generate {
        /// What the deck should achieve
        #[arg(short, long, default_value = "")]
        prompt: String,
        /// Template presentation (.pptx)
        #[arg(short, long)]
        template: Option<PathBuf>,
        #[command(flatten)]
        context: ContextArgs,
    },
    /// Work with the slide library
    #[command(subcommand)]
    Slides(SlidesCommand),
    /// Download a file reference returned by compose/generate
    Fetch {
        reference: String,
        /// Destination path (default: the reference's file name)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Browse the slide library interactively
    Library {
        /// Where downloaded slides are saved
        #[arg(long, default_value = ".")]
        download_dir: PathBuf,
    },
    /// Check that the service is reachable
    Health,
}

#[derive(Subcommand)]
pub enum SlidesCommand {
    /// List library slides in the order the service returns them
    List {
        #[arg(long, default_value = "0")]
        skip: usize,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Search slides by description or tags
    Search {
        query: String,
        /// Show retrieval scores
        #[arg(long)]
        scores: bool,
    },
    /// Import a .pptx into the library
    Import { file: PathBuf },
    /// Download one slide as .pptx
    Download {
        id: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Download a slide's preview image
    Preview {
        id: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    // The library browser owns the terminal; logging would draw over it.
    if !matches!(cli.command, Commands::Library { .. }) {
        init_logging(cli.verbose);
    }

    let mut config = SlideConfig::load().await?;
    if let Some(url) = &cli.base_url {
        config = config.with_base_url(url);
    }
    let api = SlideApi::from_config(&config)?;
    tracing::debug!("using slide service at {}", api.base_url());

    match cli.command {
        Commands::Compose {
            outline,
            outline_file,
            num_slides,
            context,
        } => {
            let outline = match outline_file {
                Some(path) => tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("reading outline {}", path.display()))?,
                None => outline.unwrap_or_default(),
            };
            let mut workflow = GenerationWorkflow::new(api.clone(), &config);
            workflow.set_outline(outline);
            workflow.set_num_slides(num_slides);
            run_generation(workflow, &api, context).await?;
        }
        Commands::Generate {
            prompt,
            template,
            context,
        } => {
            let mut workflow = GenerationWorkflow::new(api.clone(), &config);
            workflow.set_mode(GenerationMode::Generate);
            workflow.set_prompt(prompt);
            if let Some(path) = template {
                workflow.select_template(TemplateFile::load(&path).await?);
            }
            run_generation(workflow, &api, context).await?;
        }
        Commands::Slides(command) => run_slides(command, api, &config).await?,
        Commands::Fetch { reference, output } => {
            let bytes = api.fetch_file(&reference).await?;
            let target = output.unwrap_or_else(|| PathBuf::from(reference_file_name(&reference)));
            write_file(&target, &bytes).await?;
        }
        Commands::Library { download_dir } => {
            slide_tui::run_library(&config, download_dir).await?;
        }
        Commands::Health => {
            let health = api.health().await?;
            println!("{}: {}", api.base_url(), health.status);
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .try_init();
}

async fn run_generation(
    mut workflow: GenerationWorkflow,
    api: &SlideApi,
    args: ContextArgs,
) -> Result<()> {
    if let Some(dir) = &args.output_dir {
        workflow.set_output_dir(dir.clone());
    }
    for path in &args.context {
        workflow.add_context_file(path).await?;
    }
    if let Some(dir) = &args.context_dir {
        let paths = list_dir(dir).await?;
        workflow.add_context_drop(&paths).await?;
    }
    if !workflow.context().is_empty() {
        eprintln!("Context files: {}", workflow.context().display_names());
    }

    workflow.submit().await?;

    if let Some(result) = workflow.result() {
        println!("{}", result.to_display_string());
    }
    if let Some(degradation) = workflow.degradation() {
        eprintln!("warning: {degradation}");
    }
    for reference in workflow.file_references() {
        println!("file: {reference}  ({})", workflow.reference_url(reference));
    }

    if let Some(dir) = &args.fetch_into {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("creating {}", dir.display()))?;
        for reference in workflow.file_references() {
            let bytes = api
                .fetch_file(reference)
                .await
                .with_context(|| format!("fetching {reference}"))?;
            write_file(&dir.join(reference_file_name(reference)), &bytes).await?;
        }
    }
    Ok(())
}

async fn run_slides(command: SlidesCommand, api: SlideApi, config: &SlideConfig) -> Result<()> {
    match command {
        SlidesCommand::List { skip, limit } => {
            let listing = api
                .list_slides(skip, limit.unwrap_or(config.list_limit))
                .await?;
            for meta in &listing.items {
                print_slide(&SlideViewModel::from_metadata(meta, &api), None);
            }
            println!("{} slides", listing.count);
        }
        SlidesCommand::Search { query, scores } => {
            let hits = api
                .search_slides(&SearchRequest {
                    query,
                    limit: config.search_limit,
                    retrieval_limit: config.retrieval_limit,
                    return_scores: scores,
                })
                .await?;
            for hit in &hits {
                print_slide(&SlideViewModel::from_metadata(hit.metadata(), &api), hit.score());
            }
            println!("{} results", hits.len());
        }
        SlidesCommand::Import { file } => {
            let mut library = LibraryWorkflow::new(api, config);
            let ingested = library.import(&file).await?;
            println!("Imported {} slides from {}", ingested.count, file.display());
            for meta in &ingested.slides {
                print_slide(&SlideViewModel::from_metadata(meta, library.api()), None);
            }
        }
        SlidesCommand::Download { id, output } => {
            let bytes = api.download_slide(&id).await?;
            write_file(&output.unwrap_or_else(|| PathBuf::from(format!("{id}.pptx"))), &bytes)
                .await?;
        }
        SlidesCommand::Preview { id, output } => {
            let bytes = api.slide_preview(&id).await?;
            write_file(&output.unwrap_or_else(|| PathBuf::from(format!("{id}.png"))), &bytes)
                .await?;
        }
    }
    Ok(())
}

fn print_slide(item: &SlideViewModel, score: Option<f64>) {
    let score = score.map(|s| format!(" [{s:.3}]")).unwrap_or_default();
    println!("{}{score}  {} · Updated {}", item.id, item.subtitle, item.updated_display);
    println!("    {}", item.description);
    if !item.tags.is_empty() {
        println!("    tags: {}", item.tags.join(", "));
    }
}

/// Files directly inside `dir`, sorted by name.
async fn list_dir(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("reading {}", dir.display()))?;
    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            paths.push(entry.path());
        }
    }
    paths.sort();
    Ok(paths)
}

async fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    tokio::fs::write(path, bytes)
        .await
        .with_context(|| format!("writing {}", path.display()))?;
    println!("Saved {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_generate_with_context() {
        let cli = Cli::try_parse_from([
            "slide", "generate", "-p", "Pitch", "-t", "brand.pptx", "-c", "a.md", "-c", "b.md",
        ])
        .unwrap();
        let Commands::Generate {
            prompt,
            template,
            context,
        } = cli.command
        else {
            panic!("expected generate");
        };
        assert_eq!(prompt, "Pitch");
        assert_eq!(template, Some(PathBuf::from("brand.pptx")));
        assert_eq!(context.context, vec![PathBuf::from("a.md"), PathBuf::from("b.md")]);
    }

    #[test]
    fn outline_and_outline_file_conflict() {
        assert!(Cli::try_parse_from([
            "slide",
            "compose",
            "--outline",
            "x",
            "--outline-file",
            "o.md"
        ])
        .is_err());
    }

    #[tokio::test]
    async fn list_dir_is_sorted_and_skips_directories() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("b.md"), "b").unwrap();
        std::fs::write(tmp.path().join("a.md"), "a").unwrap();
        std::fs::create_dir(tmp.path().join("sub.md")).unwrap();
        let paths = list_dir(tmp.path()).await.unwrap();
        let names: Vec<_> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.md", "b.md"]);
    }
}
