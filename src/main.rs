use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use idloom_review::model::AttendeeDraft;
use idloom_review::queue::{self, ApproveOutcome, DuplicateDecision};
use idloom_review::{config, db};
use serde::Deserialize;
use std::path::PathBuf;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Stage vendor payloads (a JSON array of objects) as pending raw records.
    Ingest {
        #[arg(long)]
        file: PathBuf,
    },
    /// List pending raw records, newest first.
    List {
        #[arg(long)]
        limit: Option<i64>,
        #[arg(long, default_value_t = 0)]
        offset: i64,
    },
    /// Transform a record into reviewable drafts without changing its status.
    Review { id: i64 },
    /// Approve a record, persisting the attendee (and spouse) rows.
    Approve {
        id: i64,
        /// Reviewer-edited drafts as JSON: {"main": {...}, "spouse": {...}?}.
        /// Defaults to the unedited transformer output.
        #[arg(long)]
        draft: Option<PathBuf>,
        /// Import even if a high-confidence duplicate exists.
        #[arg(long)]
        import_anyway: bool,
        /// Resolve a reported duplicate by updating this existing attendee.
        #[arg(long, conflicts_with = "import_anyway")]
        update: Option<i64>,
    },
    /// Reject a record, keeping it for audit.
    Reject {
        id: i64,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Delete a junk/test record outright.
    Ignore { id: i64 },
    /// Per-status record counts.
    Stats,
}

/// Reviewer-edited drafts accepted by `approve --draft`.
#[derive(Debug, Deserialize)]
struct EditedDrafts {
    main: AttendeeDraft,
    #[serde(default)]
    spouse: Option<AttendeeDraft>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    cfg.ensure_dirs()?;

    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| format!("sqlite://{}/review.db", cfg.app.data_dir));

    let pool = db::init_pool(&database_url).await?;
    db::run_migrations(&pool).await?;

    match args.command {
        Command::Ingest { file } => {
            let content = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("failed to read {}", file.display()))?;
            let payloads: Vec<serde_json::Value> =
                serde_json::from_str(&content).context("expected a JSON array of objects")?;
            let batch_id = Uuid::new_v4().to_string();
            let mut staged = 0usize;
            for payload in &payloads {
                let guest_uid = payload
                    .get("guest_uid")
                    .or_else(|| payload.get("uid"))
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
                    .unwrap_or_else(|| Uuid::new_v4().to_string());
                db::insert_raw_record(&pool, &guest_uid, &cfg.event.uid, &batch_id, payload)
                    .await?;
                staged += 1;
            }
            info!(staged, %batch_id, "staged vendor payloads");
            println!("{}", serde_json::json!({ "staged": staged, "batch_id": batch_id }));
        }
        Command::List { limit, offset } => {
            let limit = limit.unwrap_or(cfg.app.page_size);
            let page = queue::list_pending(&pool, limit, offset).await?;
            println!("{}", serde_json::to_string_pretty(&page)?);
        }
        Command::Review { id } => {
            let outcome = queue::review(&pool, id).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Command::Approve {
            id,
            draft,
            import_anyway,
            update,
        } => {
            let (main, spouse) = match draft {
                Some(path) => {
                    let content = tokio::fs::read_to_string(&path)
                        .await
                        .with_context(|| format!("failed to read {}", path.display()))?;
                    let edited: EditedDrafts =
                        serde_json::from_str(&content).context("invalid draft JSON")?;
                    (edited.main, edited.spouse)
                }
                None => {
                    let outcome = queue::review(&pool, id).await?;
                    if !outcome.success {
                        return Err(anyhow!(
                            "record {} does not transform cleanly: {}",
                            id,
                            outcome.errors.join("; ")
                        ));
                    }
                    (outcome.main_attendee, outcome.spouse_attendee)
                }
            };

            let decision = if let Some(attendee_id) = update {
                DuplicateDecision::Update { attendee_id }
            } else if import_anyway {
                DuplicateDecision::ImportAnyway
            } else {
                DuplicateDecision::Abort
            };

            match queue::approve(&pool, id, &main, spouse.as_ref(), decision).await? {
                ApproveOutcome::Approved {
                    attendee_id,
                    spouse_id,
                } => println!(
                    "{}",
                    serde_json::json!({
                        "approved": true,
                        "attendee_id": attendee_id,
                        "spouse_id": spouse_id,
                    })
                ),
                ApproveOutcome::DuplicateFound(matches) => {
                    eprintln!(
                        "possible duplicates found; re-run with --import-anyway or --update <id>"
                    );
                    println!("{}", serde_json::to_string_pretty(&matches)?);
                    std::process::exit(2);
                }
                ApproveOutcome::ValidationFailed(errors) => {
                    return Err(anyhow!("validation failed: {}", errors.join("; ")));
                }
                ApproveOutcome::NotPending => {
                    return Err(anyhow!("record {} is no longer pending", id));
                }
            }
        }
        Command::Reject { id, reason } => {
            if !queue::reject(&pool, id, reason.as_deref()).await? {
                return Err(anyhow!("record {} is no longer pending", id));
            }
            println!("{}", serde_json::json!({ "rejected": id }));
        }
        Command::Ignore { id } => {
            if !queue::ignore(&pool, id).await? {
                return Err(anyhow!("record {} not found", id));
            }
            println!("{}", serde_json::json!({ "ignored": id }));
        }
        Command::Stats => {
            let stats = queue::stats(&pool).await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }

    Ok(())
}
