use anyhow::Result;
use clap::{Parser, Subcommand};
use eventdeck::api::{ApiClient, EventApi};
use eventdeck::config;
use eventdeck::logging;
use eventdeck::session::SessionStore;
use eventdeck::tui::App;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "eventdeck")]
#[command(version = env!("EVENTDECK_VERSION"))]
#[command(about = "Terminal dashboard for the event management backend")]
struct Args {
    /// Override the API base URL (default from config or
    /// http://localhost:5000/api)
    #[arg(long, global = true)]
    api_base: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and persist the session, without starting the dashboard
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },

    /// Clear the persisted session
    Logout,

    /// Print the identity of the persisted session
    Whoami,

    /// Print the config file path
    ConfigPath,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    logging::init();
    logging::cleanup_old_logs();

    let base_url = args
        .api_base
        .unwrap_or_else(|| config::config().api.base_url.clone());
    let api = Arc::new(ApiClient::new(&base_url));

    match args.command {
        None => {
            let app = App::new(api);
            app.run().await
        }
        Some(Command::Login { email, password }) => {
            let seam: Arc<dyn EventApi> = api;
            let mut session = SessionStore::new(seam);
            match session.login(&email, &password).await {
                Ok(identity) => {
                    println!("Signed in as {} ({})", identity.name, identity.role.as_str());
                    Ok(())
                }
                Err(e) => {
                    eprintln!("Login failed: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Some(Command::Logout) => {
            let seam: Arc<dyn EventApi> = api;
            let mut session = SessionStore::new(seam);
            session.logout();
            println!("Logged out");
            Ok(())
        }
        Some(Command::Whoami) => {
            let seam: Arc<dyn EventApi> = api;
            let mut session = SessionStore::new(seam);
            session.bootstrap().await;
            match session.identity() {
                Some(identity) => {
                    println!(
                        "{} <{}> ({})",
                        identity.name,
                        identity.email,
                        identity.role.as_str()
                    );
                    Ok(())
                }
                None => {
                    eprintln!("Not signed in");
                    std::process::exit(1);
                }
            }
        }
        Some(Command::ConfigPath) => {
            match config::config_path() {
                Some(path) => println!("{}", path.display()),
                None => eprintln!("No home directory"),
            }
            Ok(())
        }
    }
}
