#![forbid(unsafe_code)]

use std::io::{BufRead, Read, Write};
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use counselor::config::Config;
use counselor::embed::{EmbedPool, HttpEmbedder};
use counselor::gateway::{EndpointAdapter, GatewayConfig, LlmGateway, RetryingGateway};
use counselor::ingest::Ingestor;
use counselor::ledger::Ledger;
use counselor::registry::BookRegistry;
use counselor::router::{CounselRequest, Engine, EngineError};
use counselor::types::{Domain, Mode, OutcomeResult, Reversibility, Stakes};
use counselor::vector_store::VectorStore;

/// Exit code for invalid arguments or unknown ids.
const EXIT_USER_ERROR: u8 = 2;
/// Exit code when the war gate blocks the goal.
const EXIT_BLOCKED: u8 = 3;

#[derive(Parser)]
#[command(name = "counselor", version, about = "Doctrine-grounded decision counsel")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask the council for a verdict. Reads the situation from stdin.
    Counsel {
        /// Deliberation mode: quick, normal, or war
        mode: String,

        /// Decision domain (one of the fifteen doctrine domains)
        #[arg(long)]
        domain: String,

        /// Stakes: low, medium, high, existential
        #[arg(long, default_value = "medium")]
        stakes: String,

        /// Urgency in [0,1]
        #[arg(long, default_value_t = 0.5)]
        urgency: f64,

        /// Emotional load in [0,1]
        #[arg(long = "emotional-load", default_value_t = 0.0)]
        emotional_load: f64,

        /// Fatigue in [0,1]
        #[arg(long, default_value_t = 0.0)]
        fatigue: f64,

        /// Arena (required for war mode)
        #[arg(long)]
        arena: Option<String>,

        /// reversible, partially_reversible, or irreversible (required for war mode)
        #[arg(long)]
        reversibility: Option<String>,

        /// Extra constraints, comma-separated
        #[arg(long, value_delimiter = ',')]
        constraints: Vec<String>,

        /// Also report detected ledger patterns
        #[arg(long)]
        analyze_patterns: bool,

        /// Record the decision event and print its id
        #[arg(long)]
        log_memory: bool,
    },
    /// Resolve a past decision. Prompts for result, damage, benefit, lessons.
    Outcome {
        /// The event id printed by `counsel --log-memory`
        event_id: String,

        /// Mode the decision ran under
        #[arg(long)]
        mode: String,
    },
    /// Ingest a book from pre-extracted text into the doctrine store.
    Ingest {
        /// Stable book identifier
        #[arg(long)]
        book_id: String,

        /// Path to the book's plain text
        #[arg(long)]
        text: std::path::PathBuf,
    },
}

fn user_error(message: impl std::fmt::Display) -> ExitCode {
    eprintln!("error: {message}");
    ExitCode::from(EXIT_USER_ERROR)
}

fn parse_or_exit<T: FromStr<Err = String>>(raw: &str, what: &str) -> Result<T, ExitCode> {
    raw.parse()
        .map_err(|e| user_error(format!("invalid {what}: {e}")))
}

fn build_engine(config: Config) -> Result<Engine, Box<dyn std::error::Error>> {
    let backend = EndpointAdapter::new(&config.llm_endpoint, config.call_timeout)?;
    let gateway: Arc<dyn LlmGateway> = Arc::new(RetryingGateway::new(
        backend,
        GatewayConfig {
            call_timeout: config.call_timeout,
            ..GatewayConfig::default()
        },
    ));

    let embedder = Arc::new(HttpEmbedder::new(
        &config.embed_endpoint,
        &config.embed_model,
        config.call_timeout,
    )?);
    let pool = Arc::new(EmbedPool::new(
        embedder,
        config.embed_concurrency,
        config.call_timeout,
    ));

    let store = VectorStore::open(config.vector_store_dir())?;
    let registry = BookRegistry::load(config.metadata_dir())?;
    let ledger = Ledger::open(config.ledger_path())?;

    Ok(Engine {
        gateway,
        pool,
        store,
        registry,
        ledger,
        config,
    })
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = Config::from_env();

    match cli.command {
        Commands::Counsel {
            mode,
            domain,
            stakes,
            urgency,
            emotional_load,
            fatigue,
            arena,
            reversibility,
            constraints,
            analyze_patterns,
            log_memory,
        } => {
            let mode: Mode = match parse_or_exit(&mode, "mode") {
                Ok(m) => m,
                Err(code) => return code,
            };
            let domain: Domain = match parse_or_exit(&domain, "domain") {
                Ok(d) => d,
                Err(code) => return code,
            };
            let stakes: Stakes = match parse_or_exit(&stakes, "stakes") {
                Ok(s) => s,
                Err(code) => return code,
            };
            let reversibility: Option<Reversibility> = match reversibility
                .as_deref()
                .map(|r| parse_or_exit::<Reversibility>(r, "reversibility"))
                .transpose()
            {
                Ok(r) => r,
                Err(code) => return code,
            };

            eprint!("Describe the situation, end with EOF (ctrl-d):\n> ");
            let mut situation = String::new();
            if std::io::stdin().read_to_string(&mut situation).is_err() || situation.trim().is_empty()
            {
                return user_error("a situation description is required on stdin");
            }

            let engine = match build_engine(config) {
                Ok(engine) => engine,
                Err(e) => return user_error(e),
            };

            let request = CounselRequest {
                situation: situation.trim().to_string(),
                domain,
                mode,
                stakes,
                urgency,
                emotional_load,
                fatigue,
                arena,
                reversibility,
                constraints,
                log_memory,
                analyze_patterns,
            };

            match engine.counsel(request).await {
                Ok(reply) => {
                    if reply.blocked {
                        let assessment = reply.war_assessment.as_ref();
                        println!("feasibility: blocked");
                        if let Some(a) = assessment {
                            for signal in &a.matched_signals {
                                println!("matched: {signal}");
                            }
                        }
                        println!("recommended_posture: halt");
                        if let Some(event_id) = &reply.event_id {
                            println!("event_id: {event_id}");
                        }
                        return ExitCode::from(EXIT_BLOCKED);
                    }

                    if let Some(proceedings) = &reply.proceedings {
                        println!("{}", proceedings.final_verdict);
                    }
                    println!("posture: {}", reply.posture);
                    if let Some(war) = &reply.war_proceedings {
                        println!(
                            "council: {}",
                            war.council
                                .iter()
                                .map(|m| m.as_str())
                                .collect::<Vec<_>>()
                                .join(", ")
                        );
                        println!("shelf: {}", war.shelf.join(", "));
                        let filtered = war.filter_audits.iter().filter(|a| a.was_filtered).count();
                        println!("filtered_positions: {filtered}");
                    }
                    if let Some(patterns) = &reply.patterns {
                        println!("patterns: {}", patterns.len());
                        for pattern in patterns {
                            println!("  - {}", pattern.description);
                        }
                    }
                    if let Some(event_id) = &reply.event_id {
                        println!("event_id: {event_id}");
                    }
                    ExitCode::SUCCESS
                }
                Err(EngineError::InvalidRequest(message)) => user_error(message),
                Err(e) => {
                    eprintln!("error: {e}");
                    ExitCode::FAILURE
                }
            }
        }

        Commands::Outcome { event_id, mode } => {
            if let Err(code) = parse_or_exit::<Mode>(&mode, "mode") {
                return code;
            }

            let stdin = std::io::stdin();
            let mut lines = stdin.lock().lines();
            let mut ask = |prompt: &str| -> Option<String> {
                eprint!("{prompt}: ");
                let _ = std::io::stderr().flush();
                lines.next().and_then(|l| l.ok()).map(|l| l.trim().to_string())
            };

            let result: OutcomeResult = match ask("result (success|partial|failure)")
                .ok_or_else(|| "result is required".to_string())
                .and_then(|raw| raw.parse())
            {
                Ok(result) => result,
                Err(e) => return user_error(e),
            };
            let damage: f64 = ask("damage [0,1]")
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(0.0);
            let benefit: f64 = ask("benefit [0,1]")
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(0.0);
            let lessons: Vec<String> = ask("lessons (semicolon-separated)")
                .map(|raw| {
                    raw.split(';')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default();

            let engine = match build_engine(config) {
                Ok(engine) => engine,
                Err(e) => return user_error(e),
            };

            match engine
                .record_outcome(&event_id, result, damage, benefit, lessons)
                .await
            {
                Ok(summary) => {
                    println!("{summary}");
                    ExitCode::SUCCESS
                }
                Err(EngineError::UnknownEvent(id)) => user_error(format!("event not found: {id}")),
                Err(e) => {
                    eprintln!("error: {e}");
                    ExitCode::FAILURE
                }
            }
        }

        Commands::Ingest { book_id, text } => {
            let book_text = match std::fs::read_to_string(&text) {
                Ok(t) => t,
                Err(e) => return user_error(format!("cannot read {}: {e}", text.display())),
            };

            let backend = match EndpointAdapter::new(&config.llm_endpoint, config.call_timeout) {
                Ok(b) => b,
                Err(e) => return user_error(e),
            };
            let gateway: Arc<dyn LlmGateway> = Arc::new(RetryingGateway::new(
                backend,
                GatewayConfig {
                    call_timeout: config.call_timeout,
                    ..GatewayConfig::default()
                },
            ));
            let embedder = match HttpEmbedder::new(
                &config.embed_endpoint,
                &config.embed_model,
                config.call_timeout,
            ) {
                Ok(e) => Arc::new(e),
                Err(e) => return user_error(e),
            };
            let pool = Arc::new(EmbedPool::new(
                embedder,
                config.embed_concurrency,
                config.call_timeout,
            ));
            let mut store = match VectorStore::open(config.vector_store_dir()) {
                Ok(s) => s,
                Err(e) => return user_error(e),
            };

            let ingestor = Ingestor::new(gateway, pool, config);

            // Cooperative cancellation: first ctrl-c stops dispatching new
            // units; in-flight ones drain and commit.
            let cancel = ingestor.cancel_flag();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    eprintln!("[ingest] cancellation requested; draining in-flight work");
                    cancel.store(true, std::sync::atomic::Ordering::SeqCst);
                }
            });

            match ingestor.ingest_book(&book_id, &book_text, &mut store).await {
                Ok(report) => {
                    println!(
                        "{}: {} chapters, {} chunks ({} inserted, {} skipped)",
                        report.book_id,
                        report.chapters,
                        report.total_chunks,
                        report.inserted,
                        report.skipped_duplicate
                    );
                    if report.fully_resolved() {
                        ExitCode::SUCCESS
                    } else {
                        eprintln!(
                            "unresolved: {} chapter(s) {:?}, {} chunk(s); re-run to retry",
                            report.failed_chapters.len(),
                            report.failed_chapters,
                            report.failed_chunks
                        );
                        ExitCode::FAILURE
                    }
                }
                Err(e) => {
                    eprintln!("error: {e}");
                    ExitCode::FAILURE
                }
            }
        }
    }
}
