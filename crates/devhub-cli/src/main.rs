//! `devhub` - developer hub from the command line.
//!
//! ```bash
//! devhub signup --email ada@example.com --password 'correct horse'
//! devhub channel create --name "Ada Builds" --handle ada
//! devhub channel show @ada
//! devhub channel follow @ada
//! devhub team create --name Core
//! devhub team show <team-id>
//! ```

mod commands;
mod config;
mod render;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use devhub_types::models::Visibility;
use devhub_views::NewProject;

use commands::Hub;
use config::Config;

#[derive(Parser)]
#[command(name = "devhub")]
#[command(about = "Channels, projects and teams for developers")]
#[command(version)]
struct Cli {
    /// SQLite database file (overrides DEVHUB_DB_PATH)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Session cache file (overrides DEVHUB_SESSION_CACHE)
    #[arg(long, global = true)]
    cache: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Credentials {
    #[arg(short, long)]
    email: String,
    #[arg(short, long, env = "DEVHUB_PASSWORD", hide_env_values = true)]
    password: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account and sign in
    Signup(Credentials),
    /// Sign in to an existing account
    Login(Credentials),
    /// Sign out and forget the cached session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Channels and follows
    #[command(subcommand)]
    Channel(ChannelCommand),
    /// Projects
    #[command(subcommand)]
    Project(ProjectCommand),
    /// Teams and invites
    #[command(subcommand)]
    Team(TeamCommand),
}

#[derive(Subcommand)]
enum ChannelCommand {
    /// Create or update your channel
    Create {
        #[arg(short, long)]
        name: String,
        /// Handle, with or without the leading @
        #[arg(long)]
        handle: String,
        #[arg(short, long, default_value = "")]
        description: String,
        #[arg(long, default_value = "")]
        logo_url: String,
    },
    /// Show a channel by handle
    Show { handle: String },
    /// Follow a channel
    Follow { handle: String },
    /// Unfollow a channel
    Unfollow { handle: String },
    /// Roll back half-written follows (checks every channel unless ids are given)
    Repair { channels: Vec<String> },
}

#[derive(Subcommand)]
enum ProjectCommand {
    /// Publish a new project
    Publish {
        #[arg(short, long)]
        title: String,
        #[arg(short, long, default_value = "")]
        description: String,
        #[arg(long, default_value = "")]
        thumbnail_url: String,
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long = "lang")]
        languages: Vec<String>,
        /// Hide the project from your channel
        #[arg(long)]
        private: bool,
    },
    /// Show a project
    Show { id: String },
    /// Like a project, or remove your like
    Like { id: String },
    /// Make a project private
    Hide { id: String },
    /// Make a project public
    Unhide { id: String },
}

#[derive(Subcommand)]
enum TeamCommand {
    /// Create a team you own
    Create {
        #[arg(short, long)]
        name: String,
        #[arg(short, long, default_value = "")]
        bio: String,
    },
    /// Show a team and its members
    Show { id: String },
    /// Invite a user into a team
    Invite {
        team: String,
        user: String,
        #[arg(short, long, default_value = "member")]
        role: String,
    },
    /// List your pending invites
    Invites,
    /// Accept an invite
    Accept { team: String },
    /// Leave a team
    Leave { team: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "devhub=warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = Config::load()?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    if let Some(cache) = cli.cache {
        config.session_cache = cache;
    }

    let hub = Hub::open(&config).await?;

    match cli.command {
        Commands::Signup(c) => hub.sign_up(&c.email, &c.password).await,
        Commands::Login(c) => hub.sign_in(&c.email, &c.password).await,
        Commands::Logout => hub.sign_out().await,
        Commands::Whoami => {
            hub.whoami();
            Ok(())
        }
        Commands::Channel(cmd) => match cmd {
            ChannelCommand::Create {
                name,
                handle,
                description,
                logo_url,
            } => hub.create_channel(&name, &handle, &description, &logo_url).await,
            ChannelCommand::Show { handle } => hub.show_channel(&handle).await,
            ChannelCommand::Follow { handle } => hub.set_following(&handle, true).await,
            ChannelCommand::Unfollow { handle } => hub.set_following(&handle, false).await,
            ChannelCommand::Repair { channels } => hub.repair_follows(&channels).await,
        },
        Commands::Project(cmd) => match cmd {
            ProjectCommand::Publish {
                title,
                description,
                thumbnail_url,
                tags,
                languages,
                private,
            } => {
                hub.publish_project(NewProject {
                    title,
                    description,
                    thumbnail_url,
                    tags,
                    programming_languages: languages,
                    private,
                })
                .await
            }
            ProjectCommand::Show { id } => hub.show_project(&id).await,
            ProjectCommand::Like { id } => hub.like_project(&id).await,
            ProjectCommand::Hide { id } => hub.set_visibility(&id, Visibility::Private).await,
            ProjectCommand::Unhide { id } => hub.set_visibility(&id, Visibility::Public).await,
        },
        Commands::Team(cmd) => match cmd {
            TeamCommand::Create { name, bio } => hub.create_team(&name, &bio).await,
            TeamCommand::Show { id } => hub.show_team(&id).await,
            TeamCommand::Invite { team, user, role } => hub.invite(&team, &user, &role).await,
            TeamCommand::Invites => hub.pending_invites().await,
            TeamCommand::Accept { team } => hub.accept_invite(&team).await,
            TeamCommand::Leave { team } => hub.leave_team(&team).await,
        },
    }
}
