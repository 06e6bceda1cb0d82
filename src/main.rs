use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use appeears::config::{Credentials, credentials_path, save_credentials};
use appeears::{
    Client, Geometry, MonitorOutcome, PollOptions, StatusReport, TaskParams, TokenProvider,
};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(name = "appeears", version, about = "Simple CLI for NASA AppEEARS API")]
struct Cli {
    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Set username and password for authentication
    Auth,
    /// Print product list for all products or keyword match
    Products {
        /// Product keyword, for example ecostress
        #[arg(long)]
        keyword: Option<String>,
    },
    /// Print layer list for product with Product ID
    Layers {
        /// Product ID from products tool
        #[arg(long)]
        pid: String,
    },
    /// List all supported spatial projections
    Spatial,
    /// Submit your task
    TaskSubmit {
        /// Task name
        #[arg(long)]
        name: String,
        /// Product ID returned from product tool
        #[arg(long)]
        product: String,
        /// Path to a GeoJSON file with a point or a single polygon
        #[arg(long)]
        geometry: PathBuf,
        /// Start date in format YYYY-MM-DD
        #[arg(long)]
        start: String,
        /// End date in format YYYY-MM-DD
        #[arg(long)]
        end: String,
        /// Spatial projection
        #[arg(long, default_value = "geographic")]
        projection: String,
        /// Repeat the date range every year
        #[arg(long)]
        recurring: bool,
    },
    /// Get task information for all tasks, one task, or one status type
    TaskInfo {
        /// Task ID
        #[arg(long)]
        tid: Option<String>,
        /// Task status processing|done|pending
        #[arg(long)]
        status: Option<String>,
        /// Stop waiting for a processing task after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Delete a specific task with task ID
    Delete {
        /// Task ID to delete
        #[arg(long)]
        tid: String,
    },
    /// Download all files for specific task with task ID
    Download {
        /// Task ID to download
        #[arg(long)]
        tid: String,
        /// Destination directory
        #[arg(long)]
        dest: PathBuf,
        /// Abort the transfer after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(
            fmt::layer()
                .without_time()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => match err.downcast_ref::<appeears::Error>() {
            Some(e) if !e.is_fatal() => {
                println!("{}", e);
                ExitCode::SUCCESS
            }
            _ => {
                eprintln!("{:#}", err);
                ExitCode::FAILURE
            }
        },
    }
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Auth => {
            prompt_credentials()?;
        }
        Command::Products { keyword } => {
            for product in client()?.products(keyword.as_deref())? {
                println!("{}", serde_json::to_string_pretty(&product)?);
            }
        }
        Command::Layers { pid } => {
            for layer in client()?.layers(&pid)? {
                println!("{}", layer);
            }
        }
        Command::Spatial => {
            let projections = client()?.spatial_projections()?;
            println!("{}", serde_json::to_string_pretty(&projections)?);
        }
        Command::TaskSubmit {
            name,
            product,
            geometry,
            start,
            end,
            projection,
            recurring,
        } => {
            let geometry = Geometry::from_path(&geometry)
                .with_context(|| format!("failed to read geometry {}", geometry.display()))?;
            let params = TaskParams::new(name, product, start, end)
                .with_projection(projection)
                .with_recurring(recurring);
            let task = authenticated_client()?.submit(&params, &geometry)?;
            println!("Submitted task with task ID {}", task.task_id);
        }
        Command::TaskInfo {
            tid,
            status,
            timeout,
        } => {
            let client = authenticated_client()?;
            match tid {
                Some(tid) => {
                    let opts = PollOptions {
                        max_wait: timeout.map(Duration::from_secs),
                        ..PollOptions::default()
                    };
                    print_status(&tid, client.task_status(&tid, &opts)?)?;
                }
                None => {
                    for (status, tasks) in client.tasks_by_status(status.as_deref())? {
                        println!("\nTask Status :{}", status.to_uppercase());
                        for task in tasks {
                            println!("{}", serde_json::to_string_pretty(&task)?);
                        }
                    }
                }
            }
        }
        Command::Delete { tid } => {
            authenticated_client()?.delete_task(&tid)?;
            println!("Task with task id {} deleted", tid);
        }
        Command::Download { tid, dest, timeout } => {
            let cancel = CancellationToken::new();
            if let Some(secs) = timeout {
                let deadline = cancel.clone();
                std::thread::spawn(move || {
                    std::thread::sleep(Duration::from_secs(secs));
                    deadline.cancel();
                });
            }
            let report = authenticated_client()?.download(&tid, &dest, &cancel)?;
            println!(
                "Downloaded {} file(s), skipped {} existing, {} failed",
                report.downloaded,
                report.skipped,
                report.failed.len()
            );
            for name in &report.failed {
                warn!("not downloaded: {}", name);
            }
        }
    }
    Ok(())
}

fn print_status(tid: &str, report: StatusReport) -> Result<()> {
    match report {
        StatusReport::Pending => println!("Task status {} is pending", tid),
        StatusReport::Finished { status, task } => {
            println!("Task status is {}", status);
            if let Some(task) = task {
                println!("{}", serde_json::to_string_pretty(&task)?);
            }
        }
        StatusReport::Monitored(MonitorOutcome::Completed) => {
            println!("Task {} finished processing", tid)
        }
        StatusReport::Monitored(MonitorOutcome::Finished(status)) => {
            println!("Task status is {}", status)
        }
    }
    Ok(())
}

fn client() -> Result<Client> {
    Client::from_env().context("failed to configure client")
}

// Like the login flow of the service's own tooling: prompt once when no
// credentials are configured anywhere.
fn authenticated_client() -> Result<Client> {
    let client = client()?;
    if client.has_token_provider() {
        return Ok(client);
    }
    let creds = prompt_credentials()?;
    Ok(client.with_token_provider(TokenProvider::Login(creds)))
}

fn prompt_credentials() -> Result<Credentials> {
    print!("Enter username: ");
    std::io::stdout().flush()?;
    let mut username = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut username)
        .context("failed to read username")?;

    let password = rpassword::prompt_password("Enter password: ")?;

    let path = credentials_path()?;
    let creds = store_credentials(&username, &password, &path)?;
    warn!(
        "credentials stored in plain text at {}",
        path.display()
    );
    Ok(creds)
}

fn store_credentials(username: &str, password: &str, path: &Path) -> Result<Credentials> {
    let username = username.trim();
    if username.is_empty() {
        bail!("no username given");
    }
    let creds = Credentials {
        username: username.to_string(),
        password: password.trim_end_matches(['\r', '\n']).to_string(),
    };
    save_credentials(path, &creds)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(creds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use appeears::config::read_credentials;

    #[test]
    fn prompted_credentials_are_trimmed_and_saved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("appeears.json");

        let creds = store_credentials("  alice\n", "s3cret \r\n", &path).unwrap();
        assert_eq!(creds.username, "alice");
        assert_eq!(creds.password, "s3cret ");

        let saved = read_credentials(&path).unwrap();
        assert_eq!(saved.username, "alice");
        assert_eq!(saved.password, "s3cret ");
    }

    #[test]
    fn blank_username_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("appeears.json");
        assert!(store_credentials(" \n", "pw", &path).is_err());
        assert!(!path.exists());
    }
}
