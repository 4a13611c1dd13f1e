use std::path::PathBuf;

use anyhow::{Context, bail};
use chrono::{Datelike, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use db::{RestBackend, models::user::User};
use serde_json::json;
use tasks::{
    Notification, SessionContext, TaskDeskClient, TaskForm, TaskView,
    calendar,
    pages::{AnalyticsPage, DashboardPage, ProfilePage, TasksPage, TeamPage},
    session::{load_session, remove_session, save_session},
};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    sync::Mutex,
};
use uuid::Uuid;

use crate::{
    cli::{Command, CreateTaskArgs, LoginArgs, ProfileCommand, ResetPasswordArgs, TasksCommand},
    render,
};

/// How many tasks the dashboard lists under "recent".
const RECENT_TASKS: usize = 5;

/// One loaded config plus the session stored next to it.
pub struct App {
    client: TaskDeskClient,
    session_path: PathBuf,
    /// The shell keeps the task page mounted between commands.
    tasks_page: Option<Mutex<Option<TasksPage>>>,
}

impl App {
    pub async fn load() -> anyhow::Result<Self> {
        let config_path = config::config_path().context("Failed to resolve config path")?;
        let config = config::load_config_from_file(&config_path)
            .await
            .with_env_overrides();
        let session_path = config::session_path().context("Failed to resolve session path")?;
        let session = load_session(&session_path).await;
        let client = TaskDeskClient::from_config(&config, session)
            .with_context(|| format!("Invalid configuration in {}", config_path.display()))?;
        Ok(Self {
            client,
            session_path,
            tasks_page: None,
        })
    }

    pub fn keep_task_page(mut self) -> Self {
        self.tasks_page = Some(Mutex::new(None));
        self
    }

    async fn unmount_task_page(&self) {
        if let Some(slot) = &self.tasks_page {
            slot.lock().await.take();
        }
    }

    /// Mirror the in-memory session onto disk.
    async fn persist_session(&self) -> anyhow::Result<()> {
        match self.client.auth().store().current() {
            Some(session) => save_session(&self.session_path, &session).await?,
            None => remove_session(&self.session_path).await?,
        }
        Ok(())
    }

    async fn signed_in(&self) -> anyhow::Result<(SessionContext, RestBackend)> {
        let signed_in = self.client.signed_in().await;
        self.persist_session().await?;
        signed_in.context("Not signed in. Run `td login` first")
    }

    /// Run one command. Returns false when it raised an error notification.
    pub async fn execute(&self, command: Command, json: bool) -> anyhow::Result<bool> {
        let notes = match command {
            Command::Login(args) => {
                self.unmount_task_page().await;
                self.login(args, json).await?
            }
            Command::Logout => {
                self.unmount_task_page().await;
                self.logout().await?
            }
            Command::ForgotPassword { email } => self.forgot_password(&email).await?,
            Command::ResetPassword(args) => self.reset_password(args).await?,
            Command::Callback { url } => {
                self.unmount_task_page().await;
                self.callback(&url, json).await?
            }
            Command::Dashboard { view } => self.dashboard(view.into(), json).await?,
            Command::Tasks { command } => self.tasks(command, json).await?,
            Command::Team => self.team(json).await?,
            Command::Analytics => self.analytics(json).await?,
            Command::Profile { command } => self.profile(command, json).await?,
            Command::Shell => bail!("Already in a shell"),
        };

        let mut ok = true;
        for note in &notes {
            ok &= !note.is_error();
            eprintln!("{}", render::notification(note));
        }
        Ok(ok)
    }

    async fn login(&self, args: LoginArgs, json: bool) -> anyhow::Result<Vec<Notification>> {
        let password = match args.password {
            Some(password) => password,
            None => prompt("Password: ").await?,
        };
        let session = self.client.auth().sign_in(&args.email, &password).await?;
        self.persist_session().await?;
        if json {
            println!(
                "{}",
                render::json(&json!({ "userId": session.user_id(), "email": session.email() }))?
            );
        } else {
            println!("Signed in as {}", session.email());
        }
        Ok(Vec::new())
    }

    async fn logout(&self) -> anyhow::Result<Vec<Notification>> {
        let note = self.client.auth().sign_out().await;
        self.persist_session().await?;
        Ok(vec![note])
    }

    async fn forgot_password(&self, email: &str) -> anyhow::Result<Vec<Notification>> {
        self.client.auth().request_password_reset(email).await?;
        Ok(vec![Notification::info(
            "Check your email",
            "We've sent you a password reset link.",
        )])
    }

    async fn reset_password(&self, args: ResetPasswordArgs) -> anyhow::Result<Vec<Notification>> {
        if let Some(link) = &args.link {
            let outcome = self.client.auth().complete_callback(link).await;
            self.persist_session().await?;
            if let Some(error) = outcome.error {
                bail!(error);
            }
        }
        let password = match args.password {
            Some(password) => password,
            None => prompt("New password: ").await?,
        };
        let confirm = match args.confirm {
            Some(confirm) => confirm,
            None => password.clone(),
        };
        let result = self.client.auth().reset_password(&password, &confirm).await;
        self.persist_session().await?;
        Ok(vec![result?])
    }

    async fn callback(&self, url: &str, json: bool) -> anyhow::Result<Vec<Notification>> {
        let outcome = self.client.auth().complete_callback(url).await;
        self.persist_session().await?;
        if json {
            println!(
                "{}",
                render::json(&json!({
                    "route": outcome.route,
                    "userId": outcome.session.as_ref().map(|s| s.user_id()),
                    "error": outcome.error,
                }))?
            );
        } else {
            println!("Continue at {}", outcome.route);
        }
        Ok(outcome
            .error
            .into_iter()
            .map(Notification::error)
            .collect())
    }

    async fn dashboard(&self, view: TaskView, json: bool) -> anyhow::Result<Vec<Notification>> {
        let (session, db) = self.signed_in().await?;
        let mut page = DashboardPage::load(&db, &session, self.client.due_soon_window()).await;
        let now = Utc::now();

        if json {
            println!(
                "{}",
                render::json(&json!({
                    "page": &page,
                    "stats": page.stats(now),
                    "dueSoon": page.due_soon(now),
                }))?
            );
        } else {
            println!("{}", render::stats(&page.stats(now)));
            println!("\nDue soon:\n{}", render::task_list(&page.due_soon(now)));
            let recent: Vec<_> = page.view(view).into_iter().take(RECENT_TASKS).collect();
            println!("\nRecent tasks:\n{}", render::task_list(&recent));
        }
        Ok(page.drain_notifications())
    }

    async fn tasks(&self, command: TasksCommand, json: bool) -> anyhow::Result<Vec<Notification>> {
        let (session, db) = self.signed_in().await?;
        let Some(slot) = &self.tasks_page else {
            let mut page = TasksPage::load(&db, &session).await;
            self.run_tasks(&mut page, &db, command, json).await?;
            return Ok(page.drain_notifications());
        };

        let mut mounted = slot.lock().await;
        let mut page = match mounted.take() {
            Some(page) if page.user_id == session.user_id() => page,
            _ => TasksPage::load(&db, &session).await,
        };
        let result = self.run_tasks(&mut page, &db, command, json).await;
        let notes = page.drain_notifications();
        *mounted = Some(page);
        result?;
        Ok(notes)
    }

    async fn run_tasks(
        &self,
        page: &mut TasksPage,
        db: &RestBackend,
        command: TasksCommand,
        json: bool,
    ) -> anyhow::Result<()> {
        match command {
            TasksCommand::List { view } => {
                let tasks = page.view(view.into());
                if json {
                    println!("{}", render::json(&tasks)?);
                } else {
                    println!("{}", render::task_list(&tasks));
                }
            }
            TasksCommand::Refresh => {
                page.refresh(db).await;
                println!("{} tasks", page.board.tasks().len());
            }
            TasksCommand::Create(args) => {
                let form = task_form(args, &page.users)?;
                if let Some(row) = page.create_task(db, &form).await {
                    match page.board.get(row.id) {
                        Some(task) if json => println!("{}", render::json(task)?),
                        Some(task) => println!("{}", render::task_line(task)),
                        None if json => println!("{}", render::json(&row)?),
                        None => println!("Created {}", row.id),
                    }
                }
            }
            TasksCommand::Status { id, status } => {
                page.change_status(db, id, status).await;
                if let Some(task) = page.board.get(id) {
                    if json {
                        println!("{}", render::json(task)?);
                    } else {
                        println!("{}", render::task_line(task));
                    }
                }
            }
            TasksCommand::Calendar { month, day } => {
                let (year, month) = match month {
                    Some(month) => parse_month(&month)?,
                    None => {
                        let today = Local::now().date_naive();
                        (today.year(), today.month())
                    }
                };
                let tasks = page.board.tasks();
                let markers = calendar::month_markers(tasks, year, month, &Local);
                let due = day.map(|day| calendar::tasks_on(tasks, day, &Local));
                if json {
                    println!(
                        "{}",
                        render::json(&json!({ "markers": markers, "tasks": due }))?
                    );
                } else {
                    println!("{}", render::month(&markers));
                    if let (Some(day), Some(due)) = (day, due) {
                        println!("\nDue {day}:\n{}", render::task_list(&due));
                    }
                }
            }
        }
        Ok(())
    }

    async fn team(&self, json: bool) -> anyhow::Result<Vec<Notification>> {
        let (_, db) = self.signed_in().await?;
        let mut page = TeamPage::load(&db).await;
        if json {
            println!("{}", render::json(&page)?);
        } else {
            println!("{}", render::team(&page));
        }
        Ok(page.drain_notifications())
    }

    async fn analytics(&self, json: bool) -> anyhow::Result<Vec<Notification>> {
        let (_, db) = self.signed_in().await?;
        let mut page = AnalyticsPage::load(&db).await;
        if json {
            println!("{}", render::json(&page.report())?);
        } else {
            println!("{}", render::analytics(&page));
        }
        Ok(page.drain_notifications())
    }

    async fn profile(&self, command: ProfileCommand, json: bool) -> anyhow::Result<Vec<Notification>> {
        let (session, db) = self.signed_in().await?;
        let mut page = ProfilePage::load(&db, &session).await;
        if let ProfileCommand::Update { username } = command {
            page.update_username(&db, &username).await;
        }
        if json {
            println!("{}", render::json(&page)?);
        } else {
            println!("{}", render::profile(&page));
        }
        Ok(page.drain_notifications())
    }
}

fn task_form(args: CreateTaskArgs, users: &[User]) -> anyhow::Result<TaskForm> {
    let assigned_to = args
        .assign
        .as_deref()
        .map(|who| resolve_user(who, users))
        .transpose()?;
    let due_date = match args.due {
        Some(day) => Some(local_midnight(day)?),
        None => None,
    };
    Ok(TaskForm {
        title: args.title,
        description: args.description,
        priority: args.priority,
        assigned_to,
        due_date,
    })
}

fn resolve_user(who: &str, users: &[User]) -> anyhow::Result<Uuid> {
    if let Ok(id) = who.parse::<Uuid>() {
        return Ok(id);
    }
    users
        .iter()
        .find(|user| user.username == who)
        .map(|user| user.id)
        .with_context(|| format!("No team member named `{who}`"))
}

fn local_midnight(day: NaiveDate) -> anyhow::Result<chrono::DateTime<Utc>> {
    Local
        .from_local_datetime(&day.and_time(NaiveTime::MIN))
        .earliest()
        .map(|at| at.with_timezone(&Utc))
        .with_context(|| format!("{day} has no local midnight"))
}

fn parse_month(value: &str) -> anyhow::Result<(i32, u32)> {
    let first = NaiveDate::parse_from_str(&format!("{value}-01"), "%Y-%m-%d")
        .with_context(|| format!("Invalid month `{value}`, expected YYYY-MM"))?;
    Ok((first.year(), first.month()))
}

async fn prompt(label: &str) -> anyhow::Result<String> {
    let mut stderr = tokio::io::stderr();
    stderr.write_all(label.as_bytes()).await?;
    stderr.flush().await?;
    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
