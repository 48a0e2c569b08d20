use std::io::{self, Write};

use anyhow::Result;
use ausvisa_core::chat::{ask, AnswerSource, APOLOGY};
use ausvisa_core::models::RegisterRequest;
use ausvisa_core::{ApiError, AuthSession, BackendClient, StatusFilter, UserFilter, UserStatus};
use clap::Subcommand;
use colored::*;
use dialoguer::{theme::ColorfulTheme, Input, Password};

#[derive(Subcommand)]
pub enum Command {
    /// Ask the advisor a question (streams the answer)
    Ask {
        /// Your question
        #[arg(required = true)]
        question: Vec<String>,
    },
    /// Sign in and remember the session
    Login {
        /// Account email (prompted if omitted)
        #[arg(short, long)]
        email: Option<String>,
    },
    /// Forget the stored session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Create an account
    Register,
    /// Check the backend and knowledge graph connection
    Health,
    /// Show knowledge base statistics
    Stats,
    /// List users (admin)
    Users {
        /// Filter by username, email or role
        #[arg(short, long)]
        search: Option<String>,
        /// all, active, pending or suspended
        #[arg(long, default_value = "all")]
        status: String,
    },
    /// Show knowledge graph node and link counts (admin)
    Graph,
}

pub async fn run(command: Command, client: BackendClient) -> Result<()> {
    match command {
        Command::Ask { question } => ask_question(&client, &question.join(" ")).await,
        Command::Login { email } => login(AuthSession::new(client), email).await,
        Command::Logout => {
            AuthSession::new(client).logout();
            println!("{}", "Logged out".green());
            Ok(())
        }
        Command::Whoami => whoami(AuthSession::new(client)).await,
        Command::Register => register(AuthSession::new(client)).await,
        Command::Health => health(&client).await,
        Command::Stats => stats(&client).await,
        Command::Users { search, status } => list_users(&client, search, &status).await,
        Command::Graph => graph(&client).await,
    }
}

fn print_failure(context: &str, error: &ApiError) {
    println!("{}: {}", context.red(), error.user_message());
    if matches!(error, ApiError::Unauthenticated) || error.is_auth_rejection() {
        println!("Sign in first: {}", "ausvisa login".bold());
    }
}

async fn ask_question(client: &BackendClient, question: &str) -> Result<()> {
    println!("{} {}\n", "You:".bold().cyan(), question);
    println!("{}", "AusVisa:".bold().yellow());

    let result = ask(client, question, |chunk| {
        print!("{}", chunk);
        let _ = io::stdout().flush();
    })
    .await;

    match result {
        Ok(answer) => {
            if answer.source == AnswerSource::Fallback {
                print!("{}", answer.text);
            }
            println!();
        }
        Err(e) => {
            println!();
            println!("{}", APOLOGY.red());
            tracing::warn!(error = %e, "answer failed");
        }
    }
    Ok(())
}

async fn login(mut auth: AuthSession, email: Option<String>) -> Result<()> {
    let theme = ColorfulTheme::default();
    let email = match email {
        Some(email) => email,
        None => Input::<String>::with_theme(&theme)
            .with_prompt("Email")
            .interact_text()?,
    };
    let password = Password::with_theme(&theme)
        .with_prompt("Password")
        .interact()?;

    // The session manager keeps the message to show on failure
    let signed_in = auth.login(email.trim(), &password).await.is_ok();
    match auth.user() {
        Some(user) if signed_in => println!(
            "Logged in as {} ({})",
            user.username.bold().green(),
            user.role.dimmed()
        ),
        _ => println!(
            "{}: {}",
            "Login failed".red(),
            auth.error().unwrap_or("Login failed")
        ),
    }
    Ok(())
}

async fn whoami(mut auth: AuthSession) -> Result<()> {
    auth.restore().await;
    match auth.user() {
        Some(user) => {
            println!("{} <{}>", user.username.bold().green(), user.email);
            if let Some(name) = &user.full_name {
                println!("  name:   {}", name);
            }
            println!("  role:   {}", user.role);
            println!("  joined: {}", user.created_at.dimmed());
        }
        None => println!("{}", "Not logged in".yellow()),
    }
    Ok(())
}

async fn register(auth: AuthSession) -> Result<()> {
    let theme = ColorfulTheme::default();
    let email: String = Input::with_theme(&theme).with_prompt("Email").interact_text()?;
    let username: String = Input::with_theme(&theme).with_prompt("Username").interact_text()?;
    let full_name: String = Input::with_theme(&theme)
        .with_prompt("Full name (optional)")
        .allow_empty(true)
        .interact_text()?;
    let password = Password::with_theme(&theme)
        .with_prompt("Password")
        .with_confirmation("Confirm password", "Passwords do not match")
        .interact()?;

    let registration = RegisterRequest {
        email: email.trim().to_string(),
        username: username.trim().to_string(),
        password,
        full_name: Some(full_name.trim().to_string()).filter(|n| !n.is_empty()),
    };

    match auth.register(&registration).await {
        Ok(user) => {
            println!("Account created for {}", user.username.bold().green());
            println!("Sign in with: {}", "ausvisa login".bold());
        }
        Err(e) => print_failure("Registration failed", &e),
    }
    Ok(())
}

async fn health(client: &BackendClient) -> Result<()> {
    match client.health().await {
        Ok(health) => {
            let status = if health.status == "ok" || health.status == "healthy" {
                health.status.green()
            } else {
                health.status.yellow()
            };
            println!("{} {}", "backend:".bold(), status);
            println!("{} {}", "graph:  ".bold(), health.neo4j);
            println!("{}", client.base_url().dimmed());
        }
        Err(e) => print_failure("Backend unavailable", &e),
    }
    Ok(())
}

async fn stats(client: &BackendClient) -> Result<()> {
    match client.chatbot_stats().await {
        Ok(stats) => {
            println!("\n{}", "Knowledge base".bold().blue());
            println!("{}", "=".repeat(30).dimmed());
            println!("  Universities  {}", stats.universities.to_string().bold());
            println!("  Programs      {}", stats.programs.to_string().bold());
            println!("  Visas         {}", stats.visas.to_string().bold());
        }
        Err(e) => print_failure("Failed to get stats", &e),
    }
    Ok(())
}

async fn list_users(client: &BackendClient, search: Option<String>, status: &str) -> Result<()> {
    let Some(status) = StatusFilter::from_str(status) else {
        println!(
            "{}: {} (expected all, active, pending or suspended)",
            "Unknown status".red(),
            status
        );
        return Ok(());
    };
    let filter = UserFilter {
        keyword: search.unwrap_or_default(),
        status,
    };

    let (users, stats) = tokio::join!(client.admin_users(), client.admin_stats());
    let users = match users {
        Ok(users) => users,
        Err(e) => {
            print_failure("Failed to load users", &e);
            return Ok(());
        }
    };

    if let Ok(stats) = stats {
        println!(
            "{} total, {} active, {} pending, {} suspended\n",
            stats.total_users.to_string().bold(),
            stats.active_users.to_string().green(),
            stats.pending_users.to_string().yellow(),
            stats.suspended_users.to_string().red()
        );
    }

    let shown = filter.apply(&users);
    if shown.is_empty() {
        println!("{}", "No users match".yellow());
        return Ok(());
    }

    println!(
        "{:>5}  {:<16} {:<30} {:<9} {:<10} {}",
        "ID".bold(),
        "USERNAME".bold(),
        "EMAIL".bold(),
        "ROLE".bold(),
        "STATUS".bold(),
        "SESSIONS".bold()
    );
    for user in &shown {
        let status = UserStatus::of(user);
        let status_text = format!("{:<10}", status);
        let status_text = match status {
            UserStatus::Active => status_text.green(),
            UserStatus::Pending => status_text.yellow(),
            UserStatus::Suspended => status_text.red(),
        };
        println!(
            "{:>5}  {:<16} {:<30} {:<9} {} {}",
            user.id, user.username, user.email, user.role, status_text, user.session_count
        );
    }
    println!("\n{} of {} users shown", shown.len(), users.len());
    Ok(())
}

async fn graph(client: &BackendClient) -> Result<()> {
    let stats = match client.graph_stats().await {
        Ok(stats) => stats,
        Err(e) => {
            print_failure("Failed to load knowledge graph stats", &e);
            return Ok(());
        }
    };

    println!("\n{}", "Knowledge graph".bold().blue());
    println!("{}", "=".repeat(40).dimmed());

    let widest = stats.node_counts.iter().map(|c| c.count).max().unwrap_or(0).max(1);
    for c in &stats.node_counts {
        let bar = "█".repeat(((c.count * 30) / widest) as usize);
        println!("  {:<18} {:>7} {}", c.label, c.count, bar.cyan());
    }
    if !stats.rel_counts.is_empty() {
        println!("\n{}", "Links".bold());
        for r in &stats.rel_counts {
            println!("  {:<18} {:>7}", r.kind, r.count);
        }
    }
    println!(
        "\n{} nodes, {} links",
        stats.total_nodes().to_string().bold(),
        stats.total_relationships().to_string().bold()
    );
    Ok(())
}
