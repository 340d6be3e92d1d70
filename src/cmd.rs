//! Command implementations for the CLI interface.
//!
//! Every handler goes through a [`BoardSession`], so the command line gets
//! the same validation, permission errors and status-change semantics as the
//! board. Handlers print their results and return `anyhow::Result`; the
//! binary turns an error into a message and a non-zero exit.

use std::rc::Rc;

use anyhow::{anyhow, bail, Context};
use clap::Subcommand;
use clap_complete::{generate, Shell};

use crate::fields::Status;
use crate::notify::{Level, ToastQueue};
use crate::orchestrator::Resolution;
use crate::project::{resolve_project_identifier, resolve_task_identifier, Project, ProjectForm};
use crate::session::{BoardSession, DropOutcome};
use crate::task::{NoteForm, PasswordForm, ProfileForm, TaskForm, TeamMember};
use crate::tui::run::run_board_tui;

#[derive(Subcommand)]
pub enum Commands {
    /// Open the interactive kanban board for a project.
    Ui {
        /// Project ID or name (default: first project).
        project: Option<String>,
    },

    /// List the projects you manage or collaborate on.
    Projects,

    /// Manage projects.
    Project {
        #[command(subcommand)]
        action: ProjectAction,
    },

    /// Print a project's board, one section per status.
    Board {
        /// Project ID or name.
        project: String,
        /// Only show tasks whose name or description contains this text.
        #[arg(long)]
        filter: Option<String>,
    },

    /// Move a task to another status column.
    Move {
        /// Project ID or name.
        project: String,
        /// Task ID or name.
        task: String,
        /// Target status: pending | on-hold | in-progress | under-review | completed.
        #[arg(value_enum)]
        status: Status,
    },

    /// Manage tasks.
    Task {
        #[command(subcommand)]
        action: TaskAction,
    },

    /// Manage task notes.
    Note {
        #[command(subcommand)]
        action: NoteAction,
    },

    /// Manage a project's team.
    Team {
        #[command(subcommand)]
        action: TeamAction,
    },

    /// Show the authenticated user.
    Whoami,

    /// Update your name or email.
    Profile {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },

    /// Change your password.
    Password {
        /// Current password.
        #[arg(long)]
        current: String,
        /// New password (at least 8 characters).
        #[arg(long = "new")]
        password: String,
        /// New password again.
        #[arg(long)]
        confirm: String,
    },

    /// End the session on the server.
    Logout,

    /// Generate shell completion scripts.
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum ProjectAction {
    /// Create a project.
    Add {
        /// Project name.
        name: String,
        /// Client name.
        #[arg(long)]
        client: String,
        /// Description.
        #[arg(long)]
        desc: String,
    },
    /// Edit a project's details (manager only).
    Edit {
        /// Project ID or name.
        project: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        client: Option<String>,
        #[arg(long)]
        desc: Option<String>,
    },
    /// Delete a project and its tasks (manager only).
    Delete {
        /// Project ID or name.
        project: String,
        /// Confirm with your password before deleting.
        #[arg(long, env = "TASKBOARD_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Show a project with per-status counts.
    View {
        /// Project ID or name.
        project: String,
    },
}

#[derive(Subcommand)]
pub enum TaskAction {
    /// Create a task (manager only). New tasks start as pending.
    Add {
        /// Project ID or name.
        project: String,
        /// Task name.
        name: String,
        /// Description.
        #[arg(long)]
        desc: String,
    },
    /// Show a task with its notes and status history.
    View {
        project: String,
        task: String,
    },
    /// Edit a task's name or description (manager only).
    Edit {
        project: String,
        task: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        desc: Option<String>,
    },
    /// Delete a task (manager only).
    Delete {
        project: String,
        task: String,
    },
}

#[derive(Subcommand)]
pub enum NoteAction {
    /// Add a note to a task.
    Add {
        project: String,
        task: String,
        /// Note text.
        content: String,
    },
    /// Delete one of your notes.
    Delete {
        project: String,
        task: String,
        /// Note ID.
        note: String,
    },
}

#[derive(Subcommand)]
pub enum TeamAction {
    /// List team members.
    List { project: String },
    /// Add a registered user to the team by email (manager only).
    Add { project: String, email: String },
    /// Remove a member by ID or email (manager only).
    Remove { project: String, member: String },
}

/// Run a command against the session. `Completions` is handled by the
/// binary before a session exists.
pub async fn dispatch(command: Commands, session: Rc<BoardSession>, toasts: Rc<ToastQueue>) -> anyhow::Result<()> {
    let result = match command {
        Commands::Ui { project } => cmd_ui(Rc::clone(&session), Rc::clone(&toasts), project).await,
        Commands::Projects => cmd_projects(&session).await,
        Commands::Project { action } => cmd_project(&session, action).await,
        Commands::Board { project, filter } => cmd_board(&session, &project, filter.as_deref()).await,
        Commands::Move { project, task, status } => cmd_move(&session, &project, &task, status).await,
        Commands::Task { action } => cmd_task(&session, action).await,
        Commands::Note { action } => cmd_note(&session, action).await,
        Commands::Team { action } => cmd_team(&session, action).await,
        Commands::Whoami => cmd_whoami(&session).await,
        Commands::Profile { name, email } => cmd_profile(&session, name, email).await,
        Commands::Password { current, password, confirm } => {
            let form = PasswordForm { current_password: current, password, password_confirmation: confirm };
            session.update_password(&form).await.map(drop).map_err(Into::into)
        }
        Commands::Logout => session.logout().await.map_err(Into::into),
        Commands::Completions { shell } => {
            cmd_completions(shell);
            Ok(())
        }
    };
    print_toasts(&toasts);
    result
}

/// Echo success notifications. Failures come back as errors instead.
fn print_toasts(toasts: &ToastQueue) {
    for toast in toasts.drain() {
        if toast.level == Level::Success {
            println!("{}", toast.message);
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}

async fn resolve_project(session: &BoardSession, identifier: &str) -> anyhow::Result<Project> {
    let projects = session.projects().await?;
    let project_id = resolve_project_identifier(identifier, &projects).map_err(|e| anyhow!(e))?;
    Ok(session.project(&project_id).await?)
}

async fn resolve_task(session: &BoardSession, project: &str, task: &str) -> anyhow::Result<(Project, String)> {
    let project = resolve_project(session, project).await?;
    let task_id = resolve_task_identifier(task, &project).map_err(|e| anyhow!(e))?;
    Ok((project, task_id))
}

/// Launch the board for a project.
pub async fn cmd_ui(session: Rc<BoardSession>, toasts: Rc<ToastQueue>, project: Option<String>) -> anyhow::Result<()> {
    let project = match project {
        Some(identifier) => resolve_project(&session, &identifier).await?,
        None => {
            let projects = session.projects().await?;
            let first = projects.first().context("No projects yet. Create one with `tb project add`.")?;
            session.project(&first.id).await?
        }
    };
    run_board_tui(session, toasts, &project).await.context("UI error")
}

/// List projects with the current user's role in each.
pub async fn cmd_projects(session: &BoardSession) -> anyhow::Result<()> {
    let user = session.current_user().await?;
    let projects = session.projects().await?;
    if projects.is_empty() {
        println!("No projects.");
        return Ok(());
    }
    println!("{:<32} {:<24} {:<16} {}", "ID", "Project", "Client", "Role");
    for p in projects {
        let role = if p.is_manager(&user.id) { "Manager" } else { "Collaborator" };
        println!("{:<32} {:<24} {:<16} {}", p.id, truncate(&p.name, 24), truncate(&p.client_name, 16), role);
    }
    Ok(())
}

/// Handle project management commands.
pub async fn cmd_project(session: &BoardSession, action: ProjectAction) -> anyhow::Result<()> {
    match action {
        ProjectAction::Add { name, client, desc } => {
            session.create_project(&ProjectForm { name, client_name: client, description: desc }).await?;
        }
        ProjectAction::Edit { project, name, client, desc } => {
            let current = resolve_project(session, &project).await?;
            let form = ProjectForm {
                name: name.unwrap_or(current.name),
                client_name: client.unwrap_or(current.client_name),
                description: desc.unwrap_or(current.description),
            };
            session.update_project(&current.id, &form).await?;
        }
        ProjectAction::Delete { project, password } => {
            let current = resolve_project(session, &project).await?;
            match password {
                Some(password) => session.delete_project_checked(&current.id, &password).await?,
                None => session.delete_project(&current.id).await?,
            };
        }
        ProjectAction::View { project } => {
            let project = resolve_project(session, &project).await?;
            let counts = session.board(&project.id).unwrap_or_default().counts();
            println!("ID:           {}", project.id);
            println!("Project:      {}", project.name);
            println!("Client:       {}", project.client_name);
            println!("Team:         {} member(s)", project.team.len());
            println!("Description:\n{}\n", project.description);
            println!("{:<14} {}", "Status", "Tasks");
            for status in Status::ALL {
                println!("{:<14} {}", status.label(), counts.get(status));
            }
            println!("{:<14} {}", "Total", counts.total());
        }
    }
    Ok(())
}

/// Print the board, one section per status column.
pub async fn cmd_board(session: &BoardSession, project: &str, filter: Option<&str>) -> anyhow::Result<()> {
    let project = resolve_project(session, project).await?;
    let board = session.board(&project.id).unwrap_or_default().filter(filter.unwrap_or(""));
    println!("{} [{}]", project.name, project.client_name);
    for (status, tasks) in board.iter() {
        println!();
        println!("{} ({})", status.label(), tasks.len());
        if tasks.is_empty() {
            println!("  -");
        }
        for t in tasks {
            println!("  - {} (#{})", t.name, t.id);
        }
    }
    Ok(())
}

/// Move a task to another column through the status-change orchestrator.
pub async fn cmd_move(session: &BoardSession, project: &str, task: &str, status: Status) -> anyhow::Result<()> {
    let (project, task_id) = resolve_task(session, project, task).await?;
    match session.select_status(&project.id, &task_id, status).await {
        DropOutcome::Settled(Resolution::Committed { .. }) => Ok(()),
        DropOutcome::Settled(Resolution::RolledBack { reason }) => bail!("Status change failed: {reason}"),
        DropOutcome::Settled(Resolution::Discarded) => bail!("Status change superseded"),
        DropOutcome::Ignored(rejected) => {
            println!("Nothing to do: {rejected}.");
            Ok(())
        }
    }
}

/// Handle task commands.
pub async fn cmd_task(session: &BoardSession, action: TaskAction) -> anyhow::Result<()> {
    match action {
        TaskAction::Add { project, name, desc } => {
            let project = resolve_project(session, &project).await?;
            session.create_task(&project.id, &TaskForm { name, description: desc }).await?;
        }
        TaskAction::View { project, task } => {
            let (project, task_id) = resolve_task(session, &project, &task).await?;
            let task = session.task(&project.id, &task_id).await?;
            println!("ID:           {}", task.id);
            println!("Name:         {}", task.name);
            println!("Status:       {}", task.status.label());
            println!("Project:      {}", project.name);
            println!("Created UTC:  {}", task.created_at.to_rfc3339());
            println!("Updated UTC:  {}", task.updated_at.to_rfc3339());
            println!("Description:\n{}\n", task.description);
            if task.status_log.is_empty() {
                println!("History: -");
            } else {
                println!("History:");
                for entry in &task.status_log {
                    println!("  {} -> {}", entry.user.name, entry.status.label());
                }
            }
            println!("Notes:");
            if task.notes.is_empty() {
                println!("  -");
            }
            for note in &task.notes {
                println!("  [{}] {} ({}): {}", note.id, note.author.name, note.created_at.format("%Y-%m-%d %H:%M"), note.content);
            }
        }
        TaskAction::Edit { project, task, name, desc } => {
            let (project, task_id) = resolve_task(session, &project, &task).await?;
            let current = session.task(&project.id, &task_id).await?;
            let form = TaskForm {
                name: name.unwrap_or(current.name),
                description: desc.unwrap_or(current.description),
            };
            session.update_task(&project.id, &task_id, &form).await?;
        }
        TaskAction::Delete { project, task } => {
            let (project, task_id) = resolve_task(session, &project, &task).await?;
            session.delete_task(&project.id, &task_id).await?;
        }
    }
    Ok(())
}

/// Handle note commands.
pub async fn cmd_note(session: &BoardSession, action: NoteAction) -> anyhow::Result<()> {
    match action {
        NoteAction::Add { project, task, content } => {
            let (project, task_id) = resolve_task(session, &project, &task).await?;
            session.add_note(&project.id, &task_id, &NoteForm { content }).await?;
        }
        NoteAction::Delete { project, task, note } => {
            let (project, task_id) = resolve_task(session, &project, &task).await?;
            // Load the author check inputs so foreign notes are refused locally.
            session.current_user().await?;
            session.task(&project.id, &task_id).await?;
            session.delete_note(&project.id, &task_id, &note).await?;
        }
    }
    Ok(())
}

fn find_in_team<'a>(team: &'a [TeamMember], member: &str) -> Option<&'a TeamMember> {
    team.iter().find(|m| m.id == member || m.email.eq_ignore_ascii_case(member))
}

/// Handle team commands.
pub async fn cmd_team(session: &BoardSession, action: TeamAction) -> anyhow::Result<()> {
    match action {
        TeamAction::List { project } => {
            let project = resolve_project(session, &project).await?;
            let team = session.team(&project.id).await?;
            if team.is_empty() {
                println!("No team members.");
                return Ok(());
            }
            println!("{:<32} {:<20} {}", "ID", "Name", "Email");
            for m in team {
                println!("{:<32} {:<20} {}", m.id, truncate(&m.name, 20), m.email);
            }
        }
        TeamAction::Add { project, email } => {
            let project = resolve_project(session, &project).await?;
            let user = session.find_member(&project.id, &email).await?;
            session.add_member(&project.id, &user.id).await?;
        }
        TeamAction::Remove { project, member } => {
            let project = resolve_project(session, &project).await?;
            let team = session.team(&project.id).await?;
            let Some(found) = find_in_team(&team, &member) else {
                bail!("No team member with id or email '{member}'");
            };
            session.remove_member(&project.id, &found.id).await?;
        }
    }
    Ok(())
}

pub async fn cmd_whoami(session: &BoardSession) -> anyhow::Result<()> {
    let user = session.current_user().await?;
    println!("{} <{}> (#{})", user.name, user.email, user.id);
    Ok(())
}

/// Update the profile; fields not given keep their current value.
pub async fn cmd_profile(session: &BoardSession, name: Option<String>, email: Option<String>) -> anyhow::Result<()> {
    if name.is_none() && email.is_none() {
        bail!("Nothing to update: pass --name and/or --email");
    }
    let user = session.current_user().await?;
    let form = ProfileForm { name: name.unwrap_or(user.name), email: email.unwrap_or(user.email) };
    session.update_profile(&form).await?;
    Ok(())
}

/// Generate shell completion scripts.
pub fn cmd_completions(shell: Shell) {
    use clap::CommandFactory;
    use crate::cli::Cli;

    let mut app = Cli::command();
    let app_name = app.get_name().to_string();
    generate(shell, &mut app, app_name, &mut std::io::stdout());
}
