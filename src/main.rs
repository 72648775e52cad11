//! `resolver-sync` command line.
//!
//! Every option can also come from the environment, using the variable names
//! of the original deployment scripts (`MAIN_FILE_PATH`, `REPLICAS_IPS`, ...).

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tracing::{error, info};

use resolver_sync::config::{PullConfig, PushConfig};
use resolver_sync::logging::{self, LogConfig};
use resolver_sync::reload::DEFAULT_RELOAD_COMMAND;
use resolver_sync::remote::repository::DEFAULT_API_BASE;
use resolver_sync::remote::{RepositoryConfig, RepositorySource, SshConfig};
use resolver_sync::{CommandReload, LocalStore, Report, Result};

#[derive(Parser)]
#[command(name = "resolver-sync")]
#[command(version)]
#[command(about = "Keep DNS resolver config files in sync and reload only on change")]
struct Cli {
    /// Log filter (`info`, `debug`, `WARNING`, `resolver_sync=trace`, ...)
    #[arg(long, global = true, env = "LOGGING_LEVEL")]
    log_level: Option<String>,

    /// Also append logs to this file
    #[arg(long, global = true, env = "LOGGING_FILE_PATH")]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Push one authoritative file to SSH replicas
    Push(PushArgs),
    /// Mirror a repository folder into a local directory
    Pull(PullArgs),
}

#[derive(Args)]
struct PushArgs {
    /// Authoritative local file
    #[arg(long, env = "MAIN_FILE_PATH")]
    file: PathBuf,

    /// Replica hosts, comma separated
    #[arg(long, env = "REPLICAS_IPS", value_delimiter = ',', required = true)]
    replicas: Vec<String>,

    /// Remote login user
    #[arg(long, env = "SSH_USER")]
    user: String,

    /// Private key file; the SSH agent is used when omitted
    #[arg(long, env = "SSH_KEY_PATH")]
    key: Option<PathBuf>,

    /// SSH port
    #[arg(long, env = "SSH_PORT", default_value_t = 22)]
    port: u16,

    /// Path on the replicas (defaults to --file)
    #[arg(long, env = "REMOTE_FILE_PATH")]
    remote_path: Option<String>,

    /// Reload command run on a replica after its file changed
    #[arg(long, env = "RELOAD_COMMAND", default_value = DEFAULT_RELOAD_COMMAND)]
    reload_command: String,

    /// Replicas processed concurrently
    #[arg(long, env = "MAX_PARALLEL", default_value_t = resolver_sync::engine::DEFAULT_MAX_PARALLEL)]
    max_parallel: usize,

    /// Seconds allowed per replica
    #[arg(long, env = "UNIT_TIMEOUT_SECS", default_value_t = 60)]
    timeout: u64,
}

#[derive(Args)]
struct PullArgs {
    /// Repository as owner/name
    #[arg(long, env = "GITHUB_REPO")]
    repo: String,

    /// Branch, tag or commit to mirror
    #[arg(long, env = "GITHUB_BRANCH")]
    branch: String,

    /// Folder inside the repository
    #[arg(long, env = "GITHUB_PATH", default_value = "")]
    remote_dir: String,

    /// Local mirror directory
    #[arg(long, env = "LOCAL_DIR")]
    local_dir: PathBuf,

    /// Only files whose names end with this are mirrored
    #[arg(long, env = "FILE_SUFFIX")]
    suffix: String,

    /// API token for private repositories
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Repository API base URL
    #[arg(long, env = "GITHUB_API_URL", default_value = DEFAULT_API_BASE)]
    api_base: String,

    /// Local reload command run after each changed file
    #[arg(long, env = "RELOAD_COMMAND", default_value = DEFAULT_RELOAD_COMMAND)]
    reload_command: String,

    /// Seconds allowed per file
    #[arg(long, env = "UNIT_TIMEOUT_SECS", default_value_t = 60)]
    timeout: u64,
}

impl PushArgs {
    fn into_config(self) -> PushConfig {
        let mut ssh = SshConfig::new(self.user)
            .with_port(self.port)
            .with_reload_command(self.reload_command);
        if let Some(key) = self.key {
            ssh = ssh.with_identity(key);
        }
        let replicas = self.replicas.into_iter().map(|h| h.trim().to_string()).collect();
        let mut config = PushConfig::new(self.file, replicas, ssh)
            .with_max_parallel(self.max_parallel)
            .with_unit_timeout(Duration::from_secs(self.timeout));
        if let Some(path) = self.remote_path {
            config = config.with_remote_path(path);
        }
        config
    }
}

impl PullArgs {
    fn into_config(self) -> PullConfig {
        let mut repository = RepositoryConfig::new(self.repo, self.branch)
            .with_path(self.remote_dir)
            .with_suffix(self.suffix)
            .with_api_base(self.api_base);
        if let Some(token) = self.token.filter(|t| !t.is_empty()) {
            repository = repository.with_token(token);
        }
        PullConfig::new(repository, self.local_dir)
            .with_reload_command(self.reload_command)
            .with_unit_timeout(Duration::from_secs(self.timeout))
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let log = LogConfig {
        level: cli.log_level,
        file: cli.log_file,
    };
    if let Err(e) = logging::init(&log) {
        eprintln!("resolver-sync: {e}");
        return ExitCode::FAILURE;
    }

    let result = match cli.command {
        Commands::Push(args) => push(args.into_config()).await,
        Commands::Pull(args) => pull(args.into_config()).await,
    };

    match result {
        Ok(report) => {
            if report.failures() > 0 {
                info!(failed = report.failures(), "Some units failed; see log above");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Sync aborted");
            ExitCode::FAILURE
        }
    }
}

async fn push(config: PushConfig) -> Result<Report> {
    config.validate()?;
    info!(
        file = %config.source.display(),
        replicas = config.replicas.len(),
        "Starting push sync"
    );
    Ok(config.engine().run(config.replicas()).await)
}

async fn pull(config: PullConfig) -> Result<Report> {
    config.validate()?;
    info!(
        repo = %config.repository.repo,
        reference = %config.repository.reference,
        dir = %config.local_dir.display(),
        "Starting pull sync"
    );
    let source = RepositorySource::new(config.repository.clone())?;
    let store = LocalStore::new(&config.local_dir);
    let reload = CommandReload::new(&config.reload_command)?;
    config.engine().run(&source, &store, &reload).await
}
