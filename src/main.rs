use std::path::Path;

use clap::{Parser, Subcommand};
use taskboard::catalog::UserCreate;
use taskboard::commands;
use taskboard::filter::TaskFilter;
use taskboard::output::Format;
use taskboard::update::TaskCreate;

#[derive(Parser)]
#[command(
    name = "taskboard",
    version,
    about = "Task tracker with sparse updates and composable filters"
)]
struct Cli {
    /// Output format
    #[arg(long, global = true, value_enum, default_value = "json")]
    format: Format,
    /// Shorthand for --format pretty
    #[arg(long, global = true, hide = true)]
    pretty: bool,
    /// Log debug output to stderr
    #[arg(long, short, global = true, conflicts_with = "quiet")]
    verbose: bool,
    /// Only log errors
    #[arg(long, short, global = true)]
    quiet: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new .taskboard/ directory here
    Init,
    /// Rebuild the SQLite index from the record files
    Reindex,
    /// Manage tasks
    Task {
        #[command(subcommand)]
        action: TaskAction,
    },
    /// Manage task statuses
    Status {
        #[command(subcommand)]
        action: StatusAction,
    },
    /// Manage labels
    Label {
        #[command(subcommand)]
        action: LabelAction,
    },
    /// Manage users
    User {
        #[command(subcommand)]
        action: UserAction,
    },
}

#[derive(Subcommand)]
enum TaskAction {
    /// List tasks matching every given filter
    List {
        #[arg(long)]
        assignee_id: Option<u64>,
        /// Case-insensitive substring of the title
        #[arg(long)]
        title_cont: Option<String>,
        /// Status slug
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        label_id: Option<u64>,
        /// Page number, starting at 1
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Display a single task
    Show { id: u64 },
    /// Create a task
    Create {
        title: String,
        /// Status slug
        #[arg(long)]
        status: String,
        #[arg(long)]
        content: Option<String>,
        #[arg(long)]
        index: Option<i64>,
        #[arg(long)]
        assignee_id: Option<u64>,
        /// Label ids (comma-separated)
        #[arg(long, value_delimiter = ',')]
        label_id: Vec<u64>,
    },
    /// Apply a sparse JSON update; omitted keys are kept, null clears
    Update {
        id: u64,
        /// JSON object, or `-` to read stdin
        #[arg(long)]
        data: String,
    },
    /// Delete a task
    Delete { id: u64 },
}

#[derive(Subcommand)]
enum StatusAction {
    List,
    Show { id: u64 },
    Create { name: String, slug: String },
    Update {
        id: u64,
        #[arg(long)]
        data: String,
    },
    Delete { id: u64 },
}

#[derive(Subcommand)]
enum LabelAction {
    List,
    Show { id: u64 },
    Create { name: String },
    Update {
        id: u64,
        #[arg(long)]
        data: String,
    },
    Delete { id: u64 },
}

#[derive(Subcommand)]
enum UserAction {
    List,
    Show { id: u64 },
    Create {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
    },
    Update {
        id: u64,
        #[arg(long)]
        data: String,
    },
    Delete { id: u64 },
    /// Check an email/password pair
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
}

fn init_tracing(quiet: bool, verbose: bool) {
    let level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "warn"
    };

    let filter = tracing_subscriber::EnvFilter::try_from_env("TASKBOARD_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    // A second init only happens under test harnesses; keep the first.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run(cli: Cli, format: Format) -> taskboard::error::Result<()> {
    if let Commands::Init = cli.command {
        let cwd = std::env::current_dir()?;
        return commands::init::run(&cwd);
    }

    let root = taskboard::store::repo::find_board_root()?;
    let root: &Path = &root;

    match cli.command {
        Commands::Init => unreachable!(),
        Commands::Reindex => commands::reindex::run(root),
        Commands::Task { action } => match action {
            TaskAction::List {
                assignee_id,
                title_cont,
                status,
                label_id,
                page,
            } => {
                let filter = TaskFilter {
                    assignee_id,
                    title_cont,
                    status,
                    label_id,
                };
                commands::task::list(root, filter, page, format)
            }
            TaskAction::Show { id } => commands::task::show(root, id, format),
            TaskAction::Create {
                title,
                status,
                content,
                index,
                assignee_id,
                label_id,
            } => {
                let request = TaskCreate {
                    index,
                    description: content,
                    assignee: assignee_id,
                    labels: label_id,
                    ..TaskCreate::new(title, status)
                };
                commands::task::create(root, request, format)
            }
            TaskAction::Update { id, data } => commands::task::update(root, id, &data, format),
            TaskAction::Delete { id } => commands::task::delete(root, id, format),
        },
        Commands::Status { action } => match action {
            StatusAction::List => commands::status::list(root, format),
            StatusAction::Show { id } => commands::status::show(root, id, format),
            StatusAction::Create { name, slug } => {
                commands::status::create(root, name, slug, format)
            }
            StatusAction::Update { id, data } => commands::status::update(root, id, &data, format),
            StatusAction::Delete { id } => commands::status::delete(root, id, format),
        },
        Commands::Label { action } => match action {
            LabelAction::List => commands::label::list(root, format),
            LabelAction::Show { id } => commands::label::show(root, id, format),
            LabelAction::Create { name } => commands::label::create(root, name, format),
            LabelAction::Update { id, data } => commands::label::update(root, id, &data, format),
            LabelAction::Delete { id } => commands::label::delete(root, id, format),
        },
        Commands::User { action } => match action {
            UserAction::List => commands::user::list(root, format),
            UserAction::Show { id } => commands::user::show(root, id, format),
            UserAction::Create {
                email,
                password,
                first_name,
                last_name,
            } => {
                let request = UserCreate {
                    email,
                    password,
                    first_name,
                    last_name,
                };
                commands::user::create(root, request, format)
            }
            UserAction::Update { id, data } => commands::user::update(root, id, &data, format),
            UserAction::Delete { id } => commands::user::delete(root, id, format),
            UserAction::Login { email, password } => {
                commands::user::login(root, &email, &password, format)
            }
        },
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose);
    let format = if cli.pretty {
        Format::Pretty
    } else {
        cli.format
    };
    if let Err(e) = run(cli, format) {
        match format {
            Format::Json => {
                eprintln!(
                    "{}",
                    serde_json::json!({
                        "error": e.code(),
                        "message": e.to_string()
                    })
                );
            }
            _ => eprintln!("error: {e}"),
        }
        std::process::exit(1);
    }
}
