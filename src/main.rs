use clap::Parser;
use color_eyre::Result;
use focuspilot::assistant::{GeminiAssistant, GeminiConfig};
use focuspilot::auth::{Auth, AuthError};
use focuspilot::cli::{self, Cli, Commands};
use focuspilot::{Config, Database, Profile, Store};

fn main() -> Result<()> {
    // Set up error reporting with color-eyre
    color_eyre::install()?;

    // Service-boundary logging, controlled by RUST_LOG
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Determine profile: --dev flag enables dev mode, otherwise use prod
    let profile = if cli.dev { Profile::Dev } else { Profile::Prod };

    // Load configuration with the determined profile
    // Note: --config option is parsed but not yet used to override config path
    let config = Config::load_with_profile(profile)?;

    // Initialize database
    let db_path = config.get_database_path();
    let db = Database::new(
        db_path
            .to_str()
            .ok_or_else(|| color_eyre::eyre::eyre!("Database path contains invalid UTF-8"))?,
    )?;
    let auth = Auth::new(&db);

    // Dispatch to appropriate command handler
    match cli.command {
        Commands::Register {
            name,
            email,
            password,
        } => match auth.register(&name, &email, &password) {
            Ok(user) => {
                // First access seeds the new partition.
                Store::new(&db, user.id.clone()).get(chrono::Utc::now())?;
                println!("Welcome, {}! You are signed in.", user.name);
            }
            Err(e @ AuthError::DuplicateEmail) => println!("{e}"),
            Err(e) => return Err(e.into()),
        },
        Commands::Login { email, password } => match auth.login(&email, &password) {
            Ok(user) => {
                Store::new(&db, user.id.clone()).get(chrono::Utc::now())?;
                println!("Signed in as {}.", user.email);
            }
            Err(e @ AuthError::InvalidCredentials) => println!("{e}"),
            Err(e) => return Err(e.into()),
        },
        Commands::Logout => {
            auth.logout()?;
            println!("Signed out.");
        }
        Commands::Whoami => match auth.current_user()? {
            Some(user) => println!("{} <{}>", user.name, user.email),
            None => println!("Not signed in."),
        },
        Commands::Do { text } => {
            let user = cli::require_user(&auth)?;
            let mut store = Store::new(&db, user.id);
            let assistant = build_assistant(&config)?;
            cli::handle_do(&text, &mut store, &assistant)?;
        }
        Commands::Chat => {
            let user = cli::require_user(&auth)?;
            let mut store = Store::new(&db, user.id);
            let assistant = build_assistant(&config)?;
            cli::handle_chat(&mut store, &assistant, &user.name)?;
        }
        Commands::AddTask {
            title,
            due,
            priority,
            tags,
            notes,
            project,
        } => {
            let user = cli::require_user(&auth)?;
            let mut store = Store::new(&db, user.id);
            cli::handle_add_task(title, due, priority, tags, notes, project, &mut store)?;
        }
        Commands::AddBill {
            payee,
            amount,
            due,
            time,
            currency,
            autopay,
            recurrence,
        } => {
            let user = cli::require_user(&auth)?;
            let mut store = Store::new(&db, user.id);
            cli::handle_add_bill(
                payee, amount, due, time, currency, autopay, recurrence, &mut store,
            )?;
        }
        Commands::AddNote { content, tags } => {
            let user = cli::require_user(&auth)?;
            let mut store = Store::new(&db, user.id);
            cli::handle_add_note(content, tags, &mut store)?;
        }
        Commands::Receipt { image } => {
            let user = cli::require_user(&auth)?;
            let mut store = Store::new(&db, user.id);
            let assistant = build_assistant(&config)?;
            cli::handle_receipt(image, &mut store, &assistant)?;
        }
        Commands::Tasks => {
            let user = cli::require_user(&auth)?;
            let mut store = Store::new(&db, user.id);
            cli::handle_tasks(&mut store)?;
        }
        Commands::Bills => {
            let user = cli::require_user(&auth)?;
            let mut store = Store::new(&db, user.id);
            cli::handle_bills(&mut store)?;
        }
        Commands::Notes => {
            let user = cli::require_user(&auth)?;
            let mut store = Store::new(&db, user.id);
            cli::handle_notes(&mut store)?;
        }
        Commands::Complete { id } => {
            let user = cli::require_user(&auth)?;
            let mut store = Store::new(&db, user.id);
            cli::handle_complete(id, &mut store)?;
        }
        Commands::Pay { id } => {
            let user = cli::require_user(&auth)?;
            let mut store = Store::new(&db, user.id);
            cli::handle_pay(id, &mut store)?;
        }
        Commands::Snooze { id } => {
            let user = cli::require_user(&auth)?;
            let mut store = Store::new(&db, user.id);
            cli::handle_snooze(id, &mut store)?;
        }
        Commands::Delete { collection, id } => {
            let user = cli::require_user(&auth)?;
            let mut store = Store::new(&db, user.id);
            cli::handle_delete(collection, id, &mut store)?;
        }
        Commands::Summary => {
            let user = cli::require_user(&auth)?;
            let mut store = Store::new(&db, user.id);
            cli::handle_summary(&mut store)?;
        }
        Commands::Remind { watch } => {
            let user = cli::require_user(&auth)?;
            let mut store = Store::new(&db, user.id);
            cli::handle_remind(watch, &config, &mut store)?;
        }
        Commands::Settings {
            timezone,
            currency,
            work_start,
            work_end,
            notifications,
        } => {
            let user = cli::require_user(&auth)?;
            let mut store = Store::new(&db, user.id);
            cli::handle_settings(
                timezone,
                currency,
                work_start,
                work_end,
                notifications,
                &mut store,
            )?;
        }
        Commands::Erase { force } => {
            let user = cli::require_user(&auth)?;
            let mut store = Store::new(&db, user.id);
            cli::handle_erase(force, &mut store)?;
        }
    }

    Ok(())
}

/// Build the hosted-model client: endpoint and model names from the config
/// file, API key strictly from the environment.
fn build_assistant(config: &Config) -> Result<GeminiAssistant> {
    let mut gemini = GeminiConfig::from_env()?;
    gemini.api_url = config.assistant.api_url.clone();
    gemini.fast_model = config.assistant.fast_model.clone();
    gemini.chat_model = config.assistant.chat_model.clone();
    Ok(GeminiAssistant::new(gemini)?)
}
