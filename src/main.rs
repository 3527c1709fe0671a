use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use syllabot::cli::{render_answer, Cli, Commands, ConfigAction};
use syllabot::config::Config;
use syllabot::embedding::FastEmbedProvider;
use syllabot::error::{Result, SyllabotError};
use syllabot::pipeline::{self, Pipeline, PipelineCell, QaResponse};
use syllabot::session::ChatSession;
use syllabot::storage::IndexStore;
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() -> ExitCode {
    // .env is optional
    let dotenv = dotenvy::dotenv();

    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Initialize logging
    init_logging(cli.verbose);

    if let Ok(path) = dotenv {
        tracing::debug!("Loaded environment from {}", path.display());
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_error(&e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Ask { question, k, json } => {
            let mut config = load_config(cli.config, cli.document, cli.persist_dir)?;
            if let Some(k) = k {
                config.retrieval.k = k;
            }
            cmd_ask(config, &question, json).await
        }
        Commands::Chat { transcript } => {
            let config = load_config(cli.config, cli.document, cli.persist_dir)?;
            cmd_chat(config, transcript).await
        }
        Commands::Index { rebuild } => {
            let config = load_config(cli.config, cli.document, cli.persist_dir)?;
            cmd_index(config, rebuild).await
        }
        Commands::Config { action } => cmd_config(cli.config, action),
    }
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "syllabot=debug" } else { "syllabot=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn report_error(e: &SyllabotError) {
    match e {
        SyllabotError::NotFound { path } => {
            eprintln!(
                "找不到資料檔案 {}，請將課程 PDF 放到該位置，或以 --document 指定路徑。",
                path.display()
            );
        }
        e if e.is_construction_error() => eprintln!("Error: {}", e),
        e => eprintln!("產生回答時發生錯誤：{}", e),
    }
}

async fn shared_pipeline(config: Config) -> Result<Arc<Pipeline>> {
    PipelineCell::global()
        .get_or_build(move || Pipeline::build(&config))
        .await
}

async fn cmd_ask(config: Config, question: &str, json: bool) -> Result<()> {
    let pipeline = shared_pipeline(config).await?;
    let exchange = pipeline.exchange(question).await?;
    let response = QaResponse::from(exchange);

    if json {
        let json = serde_json::to_string_pretty(&response)
            .map_err(|e| SyllabotError::json(e, "Failed to serialize answer"))?;
        println!("{}", json);
    } else {
        print!("{}", render_answer(&response.result, &response.source_documents));
    }

    Ok(())
}

async fn cmd_chat(config: Config, transcript: Option<PathBuf>) -> Result<()> {
    println!("正在載入知識庫與模型...");
    let pipeline = shared_pipeline(config).await?;
    println!(
        "知識庫與模型載入完成（{} 個段落），開始提問吧！輸入 exit 離開。",
        pipeline.index().len()
    );

    let mut session = ChatSession::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("\n> ");
        std::io::stdout()
            .flush()
            .map_err(|e| SyllabotError::io(e, "Failed to flush stdout"))?;

        let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| SyllabotError::io(e, "Failed to read from stdin"))?
        else {
            break;
        };

        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if matches!(question, "exit" | "quit" | ":q") {
            break;
        }

        match pipeline.exchange(question).await {
            Ok(exchange) => {
                let sources: Vec<_> = exchange.retrieval.chunks().cloned().collect();
                print!("\n{}", render_answer(&exchange.answer, &sources));
                session.record(exchange);

                if let Some(path) = &transcript {
                    if let Err(e) = session.save(path) {
                        tracing::warn!("Failed to save transcript: {}", e);
                    }
                }
            }
            Err(e) => {
                println!("產生回答時發生錯誤：{}", e);
            }
        }
    }

    if let Some(path) = &transcript {
        session.save(path)?;
        println!("對話紀錄已儲存至 {}", path.display());
    }

    Ok(())
}

async fn cmd_index(config: Config, rebuild: bool) -> Result<()> {
    pipeline::ensure_document(&config)?;

    if rebuild {
        IndexStore::new(&config.index.persist_dir).remove()?;
    }

    let (index, origin) = tokio::task::spawn_blocking(move || -> Result<_> {
        let embedder = FastEmbedProvider::new(&config.embedding.model)?;
        pipeline::open_index(&config, Arc::new(embedder))
    })
    .await
    .map_err(|e| SyllabotError::Other(anyhow::anyhow!("Index task failed: {}", e)))??;

    let manifest = serde_json::to_string_pretty(index.manifest())
        .map_err(|e| SyllabotError::json(e, "Failed to serialize index manifest"))?;

    println!("✓ Index {:?}: {} chunks", origin, index.len());
    println!("{}", manifest);

    Ok(())
}

fn cmd_config(config_path: Option<PathBuf>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(config_path, None, None)?;
            let json = serde_json::to_string_pretty(&config)
                .map_err(|e| SyllabotError::json(e, "Failed to serialize config"))?;
            println!("{}", json);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = Config::load(&path)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            // Create parent directory
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| {
                    SyllabotError::io(e, format!("Failed to create config directory: {:?}", parent))
                })?;
            }

            Config::default().save(&path)?;
            println!("✓ Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}

fn load_config(
    config_path: Option<PathBuf>,
    document: Option<PathBuf>,
    persist_dir: Option<PathBuf>,
) -> Result<Config> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    let mut config = if path.exists() {
        Config::load(&path)?
    } else {
        tracing::warn!(
            "Config file not found, using defaults. Run 'syllabot config init' to create one."
        );
        Config::from_env()?
    };

    if let Some(document) = document {
        config.document.path = document;
    }
    if let Some(persist_dir) = persist_dir {
        config.index.persist_dir = persist_dir;
    }

    Ok(config)
}
