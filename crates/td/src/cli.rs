use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use db::types::{TaskPriority, TaskStatus};
use tasks::TaskView;
use uuid::Uuid;

/// Team task tracker client
#[derive(Debug, Parser)]
#[command(name = "td")]
#[command(about = "Track team tasks from the terminal", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// One line typed at the `td shell` prompt.
#[derive(Debug, Parser)]
#[command(no_binary_name = true, disable_version_flag = true)]
pub struct ShellLine {
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sign in with email and password
    Login(LoginArgs),

    /// Sign out and forget the stored session
    Logout,

    /// Email a password reset link
    ForgotPassword {
        email: String,
    },

    /// Set a new password from a recovery link
    ResetPassword(ResetPasswordArgs),

    /// Finish a sign-in or recovery redirect
    ///
    /// Pass the full url the identity service redirected to, fragment included.
    Callback {
        url: String,
    },

    /// Task stats, due-soon tasks and recent tasks
    Dashboard {
        #[arg(long, value_enum, default_value_t = ViewArg::All)]
        view: ViewArg,
    },

    /// List, create and update tasks
    Tasks {
        #[command(subcommand)]
        command: TasksCommand,
    },

    /// List team members
    Team,

    /// Status, priority and workload breakdowns
    Analytics,

    /// Show or edit your profile
    Profile {
        #[command(subcommand)]
        command: ProfileCommand,
    },

    /// Run several commands against one session
    Shell,
}

#[derive(Debug, Args)]
pub struct LoginArgs {
    #[arg(long)]
    pub email: String,

    /// Read from stdin when omitted
    #[arg(long, env = "TASKDESK_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

#[derive(Debug, Args)]
pub struct ResetPasswordArgs {
    /// Recovery link from the reset email
    #[arg(long)]
    pub link: Option<String>,

    #[arg(long, env = "TASKDESK_NEW_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Defaults to `--password`
    #[arg(long)]
    pub confirm: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum TasksCommand {
    /// List visible tasks, newest first
    List {
        #[arg(long, value_enum, default_value_t = ViewArg::All)]
        view: ViewArg,
    },

    /// Refetch the task list
    Refresh,

    /// Create a task
    Create(CreateTaskArgs),

    /// Move a task to pending, in-progress or completed
    Status {
        id: Uuid,
        status: TaskStatus,
    },

    /// Tasks by due day for one month
    Calendar {
        /// Month to show as YYYY-MM (defaults to this month)
        #[arg(long)]
        month: Option<String>,

        /// List the tasks due on this day (YYYY-MM-DD)
        #[arg(long)]
        day: Option<NaiveDate>,
    },
}

#[derive(Debug, Args)]
pub struct CreateTaskArgs {
    #[arg(long)]
    pub title: String,

    #[arg(long, default_value = "")]
    pub description: String,

    #[arg(long, default_value_t = TaskPriority::Medium)]
    pub priority: TaskPriority,

    /// Username or user id
    #[arg(long)]
    pub assign: Option<String>,

    /// Due day (YYYY-MM-DD), local time
    #[arg(long)]
    pub due: Option<NaiveDate>,
}

#[derive(Debug, Subcommand)]
pub enum ProfileCommand {
    Show,
    Update {
        #[arg(long)]
        username: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ViewArg {
    All,
    Mine,
    Unassigned,
}

impl From<ViewArg> for TaskView {
    fn from(value: ViewArg) -> Self {
        match value {
            ViewArg::All => TaskView::All,
            ViewArg::Mine => TaskView::Mine,
            ViewArg::Unassigned => TaskView::Unassigned,
        }
    }
}
