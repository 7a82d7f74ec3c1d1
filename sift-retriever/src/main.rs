use clap::{Parser, Subcommand};
use sift_retriever::{
    RagService, SiftConfig,
    service::{AddDocumentRequest, QueryRequest},
    storage::FileType,
};
use std::path::PathBuf;
use std::process;

/// Index a directory of documents and query it by meaning.
#[derive(Parser, Debug)]
#[command(name = "sift", author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file; defaults apply when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Corpus directory, overriding the configuration file
    #[arg(short = 'd', long, global = true)]
    corpus_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build the index and report what was loaded
    Index {
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
    /// Retrieve the chunks most relevant to a question
    Query {
        question: String,
        /// Number of chunks to return
        #[arg(short, long)]
        k: Option<usize>,
        /// Keep only the best chunk per source
        #[arg(short, long)]
        unique: bool,
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
    /// Add a document to the corpus
    Add {
        #[arg(short, long)]
        title: String,
        /// Document body
        #[arg(long, conflicts_with = "file", required_unless_present = "file")]
        content: Option<String>,
        /// Read the document body from a file
        #[arg(long)]
        file: Option<PathBuf>,
        /// text or markdown
        #[arg(long, default_value = "text")]
        file_type: FileType,
    },
    /// List corpus documents
    List {
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
    /// Index the corpus and show statistics
    Stats {
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum OutputFormat {
    Summary,
    Full,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "summary" => Ok(OutputFormat::Summary),
            "full" => Ok(OutputFormat::Full),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid format: {s}")),
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

async fn open_service(args: &Args) -> anyhow::Result<RagService> {
    let mut config = match &args.config {
        Some(path) => SiftConfig::load(path).await?,
        None => SiftConfig::default(),
    };
    if let Some(corpus_dir) = &args.corpus_dir {
        config = config.with_corpus_dir(corpus_dir);
    }

    let embedder = sift_embed::create_provider(&config.embedder).await?;
    Ok(RagService::open(config, embedder)?)
}

async fn run() -> anyhow::Result<()> {
    let args = Args::parse();
    let service = open_service(&args).await?;

    match args.command {
        Commands::Index { format } => {
            let report = service.rebuild().await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
                OutputFormat::Summary | OutputFormat::Full => {
                    println!("Indexed generation {}:", report.generation);
                    println!("  Documents loaded: {}", report.documents_loaded);
                    println!("  Chunks indexed: {}", report.chunks_indexed);
                    println!("  Elapsed: {:.2?}", report.elapsed);
                    if !report.failures.is_empty() {
                        println!("  Skipped documents:");
                        for failure in &report.failures {
                            println!("    {}: {}", failure.path.display(), failure.reason);
                        }
                    }
                }
            }
            Ok(())
        }
        Commands::Query {
            question,
            k,
            unique,
            format,
        } => {
            service.rebuild().await?;
            let mut request = QueryRequest::new(question).with_unique_sources(unique);
            if let Some(k) = k {
                request = request.with_k(k);
            }
            let response = service.query(request).await?;

            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&response)?),
                OutputFormat::Summary => {
                    println!("Found {} chunks:", response.results.len());
                    for (result, source) in response.results.iter().zip(&response.sources) {
                        println!(
                            "  Score: {:.3} | File: {} | Reference: {}",
                            result.score, source.filename, source.reference
                        );
                    }
                }
                OutputFormat::Full => {
                    for (result, source) in response.results.iter().zip(&response.sources) {
                        println!("Score: {:.3}", result.score);
                        println!("File: {}", source.filename);
                        println!("Reference: {}", source.reference);
                        println!("Content:\n{}", result.text);
                        println!("---");
                    }
                }
            }
            Ok(())
        }
        Commands::Add {
            title,
            content,
            file,
            file_type,
        } => {
            let content = match (content, file) {
                (Some(content), _) => content,
                (None, Some(path)) => tokio::fs::read_to_string(&path).await?,
                (None, None) => anyhow::bail!("either --content or --file is required"),
            };
            let response = service
                .add_document(AddDocumentRequest {
                    title,
                    content,
                    file_type,
                })
                .await?;

            println!("Stored {}", response.path.display());
            println!(
                "Index generation {} now holds {} chunks from {} documents",
                response.report.generation,
                response.report.chunks_indexed,
                response.report.documents_loaded
            );
            Ok(())
        }
        Commands::List { format } => {
            let documents = service.list_documents().await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&documents)?),
                OutputFormat::Summary => {
                    println!("Found {} documents:", documents.len());
                    for document in documents {
                        println!(
                            "  {} | {} | {} bytes",
                            document.name, document.kind, document.size
                        );
                    }
                }
                OutputFormat::Full => {
                    for document in documents {
                        println!("Name: {}", document.name);
                        println!("Type: {}", document.kind);
                        println!("Size: {} bytes", document.size);
                        match document.created {
                            Some(created) => println!("Created: {}", created.to_rfc3339()),
                            None => println!("Created: unknown"),
                        }
                        println!("Path: {}", document.path.display());
                        println!("---");
                    }
                }
            }
            Ok(())
        }
        Commands::Stats { format } => {
            service.rebuild().await?;
            let stats = service.stats().await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
                OutputFormat::Summary | OutputFormat::Full => {
                    println!("Corpus Statistics:");
                    println!("  Generation: {}", stats.generation);
                    println!("  Model: {}", stats.model);
                    println!("  Documents indexed: {}", stats.document_count);
                    println!("  Chunks indexed: {}", stats.chunk_count);
                    println!(
                        "  Files: {} ({} text, {} markdown)",
                        stats.file_stats.total,
                        stats.file_stats.text_files,
                        stats.file_stats.markdown_files
                    );
                    if !stats.last_build.failures.is_empty() {
                        println!("  Skipped documents: {}", stats.last_build.failures.len());
                    }
                }
            }
            Ok(())
        }
    }
}
