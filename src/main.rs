// src/main.rs

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use pkcore::backend;
use pkcore::config::{DEFAULT_DB_PATH, EngineConfig};
use pkcore::db::SqliteDatabase;
use pkcore::db::models::{Changeset, Repository};
use pkcore::filter::FilterSpec;
use pkcore::job::JobSink;
use pkcore::package::PackageId;
use pkcore::query::PackageEvent;
use pkcore::{JobError, repository};
use std::io;
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "pkcore")]
#[command(author, version, about = "Package query and transaction engine", long_about = None)]
struct Cli {
    /// Database path
    #[arg(short, long, global = true, env = "PKCORE_DB", default_value = DEFAULT_DB_PATH)]
    db_path: String,

    /// Native architecture (defaults to the build target)
    #[arg(long, global = true, env = "PKCORE_ARCH")]
    arch: Option<String>,

    /// The package manager's own package, updated before anything else
    #[arg(long, global = true, env = "PKCORE_CORE_PACKAGE")]
    core_package: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the package database
    Init,
    /// Add a repository (a directory holding index.json)
    RepoAdd {
        name: String,
        url: String,
        /// Priority (higher = preferred)
        #[arg(short, long, default_value_t = 0)]
        priority: i32,
        /// Add the repository disabled
        #[arg(long)]
        disabled: bool,
    },
    /// List repositories
    RepoList {
        /// Include disabled repositories
        #[arg(short, long)]
        all: bool,
    },
    /// Remove a repository
    RepoRemove { name: String },
    /// Enable a repository
    RepoEnable { name: String },
    /// Disable a repository
    RepoDisable { name: String },
    /// Synchronize repository indexes
    Refresh {
        /// Sync even if the index has not expired
        #[arg(short, long)]
        force: bool,
    },
    /// List packages
    GetPackages {
        /// Filters, e.g. "installed;~arch"
        #[arg(short, long, default_value = "none")]
        filter: FilterSpec,
    },
    /// Search package names
    SearchName {
        #[arg(required = true)]
        terms: Vec<String>,
        #[arg(short, long, default_value = "none")]
        filter: FilterSpec,
    },
    /// Search package names and descriptions
    SearchDetails {
        #[arg(required = true)]
        terms: Vec<String>,
        #[arg(short, long, default_value = "none")]
        filter: FilterSpec,
    },
    /// Look up packages by exact name
    Resolve {
        #[arg(required = true)]
        names: Vec<String>,
        #[arg(short, long, default_value = "none")]
        filter: FilterSpec,
    },
    /// List available updates
    GetUpdates {
        #[arg(short, long, default_value = "none")]
        filter: FilterSpec,
    },
    /// Install packages by id (name;version;arch;repository)
    Install {
        #[arg(required = true)]
        ids: Vec<PackageId>,
    },
    /// Remove packages by id
    Remove {
        #[arg(required = true)]
        ids: Vec<PackageId>,
        /// Also remove packages that depend on them
        #[arg(long)]
        allow_deps: bool,
        /// Also remove automatically installed dependencies left unused
        #[arg(long)]
        autoremove: bool,
    },
    /// Update packages to the newest repository version
    Update {
        #[arg(required = true)]
        ids: Vec<PackageId>,
    },
    /// Show changeset history
    History,
    /// Generate shell completion scripts
    Completions { shell: Shell },
}

/// Prints notifications the way a host would receive them
#[derive(Default)]
struct ConsoleSink {
    failed: bool,
}

impl JobSink for ConsoleSink {
    fn package(&mut self, event: &PackageEvent) {
        println!("{}\t{}\t{}", event.info, event.id, event.summary);
    }

    fn error(&mut self, error: &JobError) {
        self.failed = true;
        eprintln!("error: {}", error);
    }

    fn finished(&mut self) {
        debug!("Job finished");
    }
}

impl Cli {
    fn engine_config(&self) -> EngineConfig {
        let mut config = EngineConfig::new(self.db_path.clone())
            .with_core_package(self.core_package.clone());
        if let Some(arch) = &self.arch {
            config = config.with_arch(arch.clone());
        }
        config
    }

    fn open(&self) -> Result<SqliteDatabase> {
        SqliteDatabase::open(&self.engine_config())
            .with_context(|| format!("failed to open package database {}", self.db_path))
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let mut sink = ConsoleSink::default();

    match &cli.command {
        Some(Commands::Init) => {
            info!("Initializing package database at: {}", cli.db_path);
            pkcore::db::init(&cli.db_path)?;
            println!("Database initialized successfully at: {}", cli.db_path);
        }
        Some(Commands::RepoAdd {
            name,
            url,
            priority,
            disabled,
        }) => {
            let db = cli.open()?;
            let repo = repository::add_repository(
                db.connection(),
                name.clone(),
                url.clone(),
                !disabled,
                *priority,
            )?;
            println!("Added repository {} ({})", repo.name, repo.url);
        }
        Some(Commands::RepoList { all }) => {
            let db = cli.open()?;
            let repos = if *all {
                Repository::list_all(db.connection())?
            } else {
                Repository::list_enabled(db.connection())?
            };

            if repos.is_empty() {
                println!("No repositories configured.");
            } else {
                for repo in &repos {
                    println!(
                        "  {} {} (priority {}, {}, last sync: {})",
                        repo.name,
                        repo.url,
                        repo.priority,
                        if repo.enabled { "enabled" } else { "disabled" },
                        repo.last_sync.as_deref().unwrap_or("never"),
                    );
                }
                println!("\nTotal: {} repository(ies)", repos.len());
            }
        }
        Some(Commands::RepoRemove { name }) => {
            let db = cli.open()?;
            repository::remove_repository(db.connection(), name)?;
            println!("Removed repository {}", name);
        }
        Some(Commands::RepoEnable { name }) => {
            let db = cli.open()?;
            repository::set_repository_enabled(db.connection(), name, true)?;
            println!("Enabled repository {}", name);
        }
        Some(Commands::RepoDisable { name }) => {
            let db = cli.open()?;
            repository::set_repository_enabled(db.connection(), name, false)?;
            println!("Disabled repository {}", name);
        }
        Some(Commands::Refresh { force }) => {
            let mut db = cli.open()?;
            backend::refresh_cache(&mut db, *force, &mut sink);
        }
        Some(Commands::GetPackages { filter }) => {
            let db = cli.open()?;
            backend::get_packages(&db, *filter, &mut sink);
        }
        Some(Commands::SearchName { terms, filter }) => {
            let db = cli.open()?;
            backend::search_names(&db, *filter, terms, &mut sink);
        }
        Some(Commands::SearchDetails { terms, filter }) => {
            let db = cli.open()?;
            backend::search_details(&db, *filter, terms, &mut sink);
        }
        Some(Commands::Resolve { names, filter }) => {
            let db = cli.open()?;
            backend::resolve(&db, *filter, names, &mut sink);
        }
        Some(Commands::GetUpdates { filter }) => {
            let db = cli.open()?;
            backend::get_updates(&db, *filter, &mut sink);
        }
        Some(Commands::Install { ids }) => {
            let mut db = cli.open()?;
            backend::install_packages(&mut db, ids, &mut sink);
        }
        Some(Commands::Remove {
            ids,
            allow_deps,
            autoremove,
        }) => {
            let mut db = cli.open()?;
            backend::remove_packages(&mut db, ids, *allow_deps, *autoremove, &mut sink);
        }
        Some(Commands::Update { ids }) => {
            let mut db = cli.open()?;
            backend::update_packages(&mut db, ids, &mut sink);
        }
        Some(Commands::History) => {
            let db = cli.open()?;
            let changesets = Changeset::list_all(db.connection())?;

            if changesets.is_empty() {
                println!("No changeset history.");
            } else {
                println!("Changeset history:");
                for changeset in &changesets {
                    let timestamp = changeset
                        .applied_at
                        .as_deref()
                        .or(changeset.created_at.as_deref())
                        .unwrap_or("pending");
                    println!(
                        "  [{}] {} - {} ({})",
                        changeset.id.unwrap_or_default(),
                        timestamp,
                        changeset.description,
                        changeset.status.as_str()
                    );
                }
                println!("\nTotal: {} changeset(s)", changesets.len());
            }
        }
        Some(Commands::Completions { shell }) => {
            let mut command = Cli::command();
            clap_complete::generate(*shell, &mut command, "pkcore", &mut io::stdout());
        }
        None => {
            println!("pkcore: package query and transaction engine");
            println!("Run 'pkcore --help' for usage information");
        }
    }

    if sink.failed {
        std::process::exit(1);
    }
    Ok(())
}
