use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info};

use gtasks_cli::auth::{self, ClientCredentials, CredentialStore, GoogleAuthorizer};
use gtasks_cli::config::{self, Config};
use gtasks_cli::google_api::{
    parse_due_date, GoogleTasksClient, NewTask, Task, TaskPatch, TaskStatus, TasksApi,
    DEFAULT_LIST,
};
use gtasks_cli::{logging, tui};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file (defaults to config.toml in the config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// OAuth client secret downloaded from Google Cloud Console
    #[arg(long, global = true)]
    credentials: Option<PathBuf>,

    /// Where cached tokens are stored
    #[arg(long, global = true)]
    token: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Open the interactive view (the default)
    Ui,
    /// Print all task lists
    Lists,
    /// Print the tasks of one list
    Tasks {
        #[arg(long, default_value = DEFAULT_LIST)]
        list: String,
    },
    /// Print one task in full
    Show {
        #[arg(long, default_value = DEFAULT_LIST)]
        list: String,
        task: String,
    },
    /// Create a task
    Add {
        #[arg(long, default_value = DEFAULT_LIST)]
        list: String,
        /// Due date as YYYY-MM-DD
        #[arg(long)]
        due: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        title: String,
    },
    /// Mark a task as completed
    Complete {
        #[arg(long, default_value = DEFAULT_LIST)]
        list: String,
        task: String,
    },
    /// Delete a task
    Delete {
        #[arg(long, default_value = DEFAULT_LIST)]
        list: String,
        task: String,
    },
    /// Forget the cached token; the next run asks for consent again
    Logout,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("fatal: {e:#}");
            eprintln!("Error: {:?}", e);
            if let Some(path) = logging::log_file() {
                eprintln!("Log: {}", path.display());
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let mut config = config::load_config(args.config.as_deref())?;
    apply_overrides(&mut config, &args);

    logging::init_logging(&config::get_log_file()?, &config.log_filter)?;
    info!(version = env!("CARGO_PKG_VERSION"), "starting");

    let token_path = config.token_path()?;
    let command = args.command.unwrap_or(Commands::Ui);

    if let Commands::Logout = command {
        if auth::forget_token(&token_path).await? {
            println!("Removed {}", token_path.display());
        } else {
            println!("No cached token at {}", token_path.display());
        }
        return Ok(());
    }

    // Missing or malformed client secrets stop us here, before any request.
    let credentials = ClientCredentials::load(&config.credentials_path)
        .context("Cannot start without OAuth client credentials")?;
    let authorizer = GoogleAuthorizer::new(
        credentials,
        Duration::from_secs(config.consent_timeout_secs),
    );
    let store = CredentialStore::new(token_path, Box::new(authorizer));
    let client = GoogleTasksClient::new(&config.api_base, config.page_size, store)?;

    // Consent prints to the terminal, so it has to finish before the UI takes over.
    client
        .authorize()
        .await
        .context("Authorization with Google failed")?;

    match command {
        Commands::Ui => tui::run(client).await?,
        Commands::Lists => {
            for list in client.list_task_lists().await? {
                println!("{}\t{}", list.id, list.title);
            }
        }
        Commands::Tasks { list } => {
            let tasks = client
                .list_tasks(&list)
                .await
                .with_context(|| format!("Could not load tasks of list {list}"))?;
            if tasks.is_empty() {
                println!("No tasks in this list");
            }
            for task in &tasks {
                println!("{}", summary(task));
            }
        }
        Commands::Show { list, task } => {
            let task = client.get_task(&list, &task).await?;
            println!("{}", summary(&task));
            if let Some(notes) = &task.notes {
                println!();
                println!("{notes}");
            }
        }
        Commands::Add {
            list,
            due,
            notes,
            title,
        } => {
            let new_task = NewTask {
                title,
                status: TaskStatus::NeedsAction,
                due: due.as_deref().map(parse_due).transpose()?,
                notes,
            };
            let task = client.insert_task(&list, &new_task).await?;
            println!("Task '{}' added successfully ({})", task.title, task.id);
        }
        Commands::Complete { list, task } => {
            let task = client
                .patch_task(&list, &task, &TaskPatch::status(TaskStatus::Completed))
                .await?;
            println!("Task '{}' marked as completed", task.title);
        }
        Commands::Delete { list, task } => {
            client.delete_task(&list, &task).await?;
            println!("Task deleted successfully");
        }
        Commands::Logout => unreachable!("handled before authorization"),
    }

    Ok(())
}

fn apply_overrides(config: &mut Config, args: &Args) {
    if let Some(path) = &args.credentials {
        config.credentials_path = path.clone();
    }
    if let Some(path) = &args.token {
        config.token_path = Some(path.clone());
    }
}

fn parse_due(input: &str) -> Result<chrono::DateTime<chrono::Utc>> {
    parse_due_date(input).with_context(|| format!("Invalid due date '{input}', expected YYYY-MM-DD"))
}

fn summary(task: &Task) -> String {
    let mark = if task.is_completed() { "x" } else { " " };
    let due = task
        .due
        .map(|d| format!(" (due {})", d.format("%Y-%m-%d")))
        .unwrap_or_default();
    format!("[{mark}] {}{due}\t{}", task.title, task.id)
}
