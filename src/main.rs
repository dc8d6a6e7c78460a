use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use feature_queue::client::QueueClient;
use feature_queue::config::{Settings, DEFAULT_PORT};
use feature_queue::models::{
    CreateFeatureInput, Feature, FeatureStatus, Placement, UpdateConfigInput, DEFAULT_LOG_WINDOW,
};
use feature_queue::observer::Observer;
use feature_queue::queue::{OperatorAction, QueueSnapshot};
use feature_queue::{api, db};

#[derive(Parser)]
#[command(name = "fq")]
#[command(about = "Control surface for an autonomous build pipeline's feature backlog")]
struct Cli {
    /// API base URL (overrides FEATURE_QUEUE_URL)
    #[arg(long, global = true)]
    url: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the queue server
    Serve {
        /// Port for HTTP API
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,

        /// Database file (overrides FEATURE_QUEUE_DB)
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Print the queue, engine status and progress
    Status {
        /// Only list features in this status
        #[arg(long, value_parser = parse_status)]
        status: Option<FeatureStatus>,
    },
    /// Show one feature in full
    Show { id: Uuid },
    /// Poll the queue and print changes as they happen
    Watch {
        /// Seconds between polls (overrides FEATURE_QUEUE_POLL_SECS)
        #[arg(short, long)]
        interval: Option<u64>,
    },
    /// Add features from a file in the NAME:/--- text format ("-" for stdin),
    /// or a single feature given by --name
    Add {
        #[arg(required_unless_present = "name", conflicts_with = "name")]
        file: Option<PathBuf>,

        #[arg(long)]
        name: Option<String>,

        #[arg(long, requires = "name")]
        description: Option<String>,

        #[arg(long, requires = "name")]
        category: Option<String>,

        #[arg(long, requires = "name")]
        instructions: Option<String>,

        /// Put the new features ahead of everything pending
        #[arg(long)]
        front: bool,
    },
    /// Skip a pending or failed feature
    Skip { id: Uuid },
    /// Send a failed feature back to pending
    Retry { id: Uuid },
    /// Mark a pending feature completed without building it
    Complete { id: Uuid },
    /// Send a skipped feature back to pending
    Requeue { id: Uuid },
    /// Delete a feature that is not in progress
    Delete { id: Uuid },
    /// Move a pending feature to the front of the queue
    Top { id: Uuid },
    /// Move a pending feature up one step
    Up { id: Uuid },
    /// Pause the engine after the current feature
    Pause,
    /// Resume the engine
    Resume,
    /// Show or change engine settings
    Config {
        #[arg(long)]
        auto_approve: Option<bool>,

        #[arg(long)]
        skip_on_error: Option<bool>,

        #[arg(long)]
        notification_email: Option<String>,
    },
    /// Show recent worker log entries
    Logs {
        #[arg(short, long, default_value_t = DEFAULT_LOG_WINDOW)]
        limit: usize,
    },
    /// Respace pending priorities to 1, 2, 3, ...
    Compact,
}

fn parse_status(s: &str) -> Result<FeatureStatus, String> {
    FeatureStatus::from_str(s).ok_or_else(|| {
        let known: Vec<&str> = FeatureStatus::ALL.iter().map(|status| status.as_str()).collect();
        format!("expected one of: {}", known.join(", "))
    })
}

/// Initialize tracing. Client commands log to stderr so stdout only carries
/// their output.
fn init_tracing(use_stderr: bool) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG")
            .unwrap_or_else(|_| "feature_queue=debug,fq=debug,tower_http=debug".into()),
    );

    if use_stderr {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn serve(port: u16, db_path: Option<PathBuf>) -> anyhow::Result<()> {
    let path = match db_path {
        Some(path) => path,
        None => db::Database::default_path()?,
    };
    tracing::info!("Opening database at {}", path.display());
    let db = db::Database::open(path)?;
    db.migrate()?;

    let app = api::create_router(db);

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    tracing::info!("Feature queue listening on http://127.0.0.1:{}", port);

    axum::serve(listener, app).await?;
    Ok(())
}

fn print_snapshot(snapshot: &QueueSnapshot) {
    let counts = &snapshot.counts;
    println!(
        "Engine: {}    Progress: {:.0}% ({}/{} completed)",
        snapshot.engine_status,
        snapshot.progress * 100.0,
        counts.completed,
        counts.total
    );
    println!(
        "pending {}  in_progress {}  completed {}  failed {}  skipped {}",
        counts.pending, counts.in_progress, counts.completed, counts.failed, counts.skipped
    );
    for feature in &snapshot.in_progress {
        println!("Building: {} ({})", feature.name, feature.id);
    }
    println!();
    print_features(&snapshot.features);
}

fn print_features(features: &[Feature]) {
    for (i, feature) in features.iter().enumerate() {
        print!(
            "{:>3}. [{}] {}  {}",
            i + 1,
            feature.status,
            feature.name,
            feature.id
        );
        match feature.error_message {
            Some(ref error) => println!("  ({})", error),
            None => println!(),
        }
    }
}

fn read_document(file: &Path) -> anyhow::Result<String> {
    if file.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        Ok(text)
    } else {
        Ok(std::fs::read_to_string(file)?)
    }
}

async fn transition(client: &QueueClient, id: Uuid, action: OperatorAction) -> anyhow::Result<()> {
    let feature = client.transition(id, action).await?;
    println!("{} is now {}", feature.name, feature.status);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let is_server = matches!(cli.command, None | Some(Commands::Serve { .. }));
    init_tracing(!is_server);

    let mut settings = Settings::from_env();
    if let Some(url) = cli.url {
        settings.api_url = url;
    }
    let client = QueueClient::new(settings.api_url.clone());

    match cli.command {
        Some(Commands::Serve { port, db }) => {
            serve(port, db.or(settings.database_path)).await?;
        }
        None => {
            serve(DEFAULT_PORT, settings.database_path).await?;
        }
        Some(Commands::Status { status: None }) => {
            let snapshot = client.snapshot(Some(0)).await?;
            print_snapshot(&snapshot);
        }
        Some(Commands::Status {
            status: Some(status),
        }) => {
            print_features(&client.list_features(Some(status)).await?);
        }
        Some(Commands::Show { id }) => {
            let feature = client.get_feature(id).await?;
            println!("{}", serde_json::to_string_pretty(&feature)?);
        }
        Some(Commands::Watch { interval }) => {
            let interval = interval
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(settings.poll_interval);
            println!("Watching {} every {:?}", client.base_url(), interval);

            let mut observer = Observer::new(client, interval);
            let shutdown = async {
                let _ = tokio::signal::ctrl_c().await;
            };
            let mut first = true;
            observer
                .run(shutdown, |snapshot, changes| {
                    if first {
                        print_snapshot(snapshot);
                        first = false;
                    }
                    for change in changes {
                        println!("{}", change);
                    }
                })
                .await;
        }
        Some(Commands::Add {
            file,
            name,
            description,
            category,
            instructions,
            front,
        }) => {
            let placement = if front {
                Placement::Front
            } else {
                Placement::Back
            };
            let features = match (name, file) {
                (Some(name), _) => {
                    let input = CreateFeatureInput {
                        name,
                        description,
                        category,
                        instructions,
                        placement,
                    };
                    vec![client.create_feature(&input).await?]
                }
                (None, Some(file)) => {
                    let text = read_document(&file)?;
                    client.import_features(&text, placement).await?
                }
                (None, None) => anyhow::bail!("either a file or --name is required"),
            };
            for feature in &features {
                println!("Added {} ({})", feature.name, feature.id);
            }
        }
        Some(Commands::Skip { id }) => transition(&client, id, OperatorAction::Skip).await?,
        Some(Commands::Retry { id }) => transition(&client, id, OperatorAction::Retry).await?,
        Some(Commands::Complete { id }) => {
            transition(&client, id, OperatorAction::Complete).await?
        }
        Some(Commands::Requeue { id }) => {
            transition(&client, id, OperatorAction::Requeue).await?
        }
        Some(Commands::Delete { id }) => {
            client.delete_feature(id).await?;
            println!("Deleted {}", id);
        }
        Some(Commands::Top { id }) => {
            let feature = client.move_to_top(id).await?;
            println!("{} moved to priority {}", feature.name, feature.priority);
        }
        Some(Commands::Up { id }) => {
            let feature = client.move_up(id).await?;
            println!("{} moved to priority {}", feature.name, feature.priority);
        }
        Some(Commands::Pause) => {
            client.set_paused(true).await?;
            let status = client.snapshot(Some(0)).await?.engine_status;
            println!("Engine {}", status);
        }
        Some(Commands::Resume) => {
            client.set_paused(false).await?;
            println!("Engine resumed");
        }
        Some(Commands::Config {
            auto_approve,
            skip_on_error,
            notification_email,
        }) => {
            let input = UpdateConfigInput {
                auto_approve,
                skip_on_error,
                notification_email,
                ..UpdateConfigInput::default()
            };
            let config = if input.auto_approve.is_none()
                && input.skip_on_error.is_none()
                && input.notification_email.is_none()
            {
                client.get_config().await?
            } else {
                client.update_config(&input).await?
            };
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Some(Commands::Logs { limit }) => {
            // Newest first from the API; print oldest first like a log file.
            for entry in client.list_logs(limit).await?.iter().rev() {
                println!(
                    "{} [{}] {}",
                    entry.created_at.format("%Y-%m-%d %H:%M:%S"),
                    entry.level.as_str(),
                    entry.message
                );
            }
        }
        Some(Commands::Compact) => {
            let rewritten = client.compact().await?;
            println!("Rewrote {} priorities", rewritten);
        }
    }

    Ok(())
}
