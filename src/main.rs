use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use gharzo_client::api::{ApiClient, HttpTransport};
use gharzo_client::auth::decode_and_validate;
use gharzo_client::config::{normalize_base_url, ClientConfig};
use gharzo_client::error::AppError;
use gharzo_client::notify::{ToastLevel, ToastQueue};
use gharzo_client::session::{FileSessionStore, Role, SessionStore};
use gharzo_client::views::dues::{AssignDueForm, CategoryForm, DueType, DuesManager, DuesScope};
use gharzo_client::views::hostels::{HostelBrowser, HostelGender, HostelQuery};
use gharzo_client::views::managers::{ManagerDirectory, ManagerScope};
use gharzo_client::views::reels::ReelsFeed;
use gharzo_client::views::rent::RentLedger;
use gharzo_client::views::visits::{VisitBoard, VisitStatus};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "gharzo", about = "Gharzo property dashboards from the terminal")]
struct Cli {
    #[arg(long, env = "GHARZO_API_BASE_URL")]
    base_url: Option<String>,

    #[arg(long, env = "GHARZO_ROLE", default_value = "landlord")]
    role: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Stores a bearer token for the selected role.
    Login {
        #[arg(long, env = "GHARZO_TOKEN")]
        token: String,
    },
    Logout,
    Whoami,
    Dues(DuesCommand),
    Reels {
        #[arg(long, default_value_t = 1)]
        pages: u32,
    },
    Managers {
        #[arg(long, default_value = "regional")]
        scope: String,
        #[arg(long, default_value = "")]
        search: String,
        #[arg(long, default_value = "")]
        region: String,
        #[arg(long, default_value_t = 1)]
        page: usize,
    },
    Hostels {
        #[arg(long)]
        city: Option<String>,
        #[arg(long)]
        gender: Option<String>,
        #[arg(long)]
        min_price: Option<f64>,
        #[arg(long)]
        max_price: Option<f64>,
        #[arg(long, default_value_t = 1)]
        page: usize,
    },
    Rent(RentCommand),
    Visits(VisitsCommand),
}

#[derive(Args, Debug)]
struct DuesCommand {
    #[command(subcommand)]
    command: DuesSubcommand,
}

#[derive(Subcommand, Debug)]
enum DuesSubcommand {
    List,
    Create {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "fixed")]
        due_type: String,
        #[arg(long, default_value = "")]
        amount: String,
    },
    Toggle {
        category_id: String,
    },
    Assign {
        #[arg(long)]
        tenant: String,
        #[arg(long)]
        category: String,
        #[arg(long)]
        amount: String,
        #[arg(long)]
        due_date: String,
    },
}

#[derive(Args, Debug)]
struct RentCommand {
    #[command(subcommand)]
    command: RentSubcommand,
}

#[derive(Subcommand, Debug)]
enum RentSubcommand {
    Bills,
    Receipt {
        payment_id: String,
        #[arg(long)]
        out: PathBuf,
    },
}

#[derive(Args, Debug)]
struct VisitsCommand {
    #[command(subcommand)]
    command: VisitsSubcommand,
}

#[derive(Subcommand, Debug)]
enum VisitsSubcommand {
    List {
        #[arg(long)]
        status: Option<String>,
    },
    Confirm {
        visit_id: String,
    },
    Cancel {
        visit_id: String,
        #[arg(long)]
        reason: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let mut config = ClientConfig::from_env();
    if let Some(base_url) = cli.base_url.as_deref() {
        config.api_base_url = normalize_base_url(base_url);
    }
    let role = Role::parse(&cli.role)
        .ok_or_else(|| AppError::BadRequest(format!("Unknown role: {}", cli.role)))?;

    let session = Arc::new(FileSessionStore::open(&config.session_path)?);
    let transport = Arc::new(HttpTransport::new(&config)?);
    let api = ApiClient::new(transport, session.clone(), role);
    let toasts = ToastQueue::from_config(&config);

    if config.is_production() && config.api_base_url.starts_with("http://") {
        tracing::warn!(base_url = %config.api_base_url, "Plain HTTP API origin in production");
    }
    tracing::debug!(
        app_name = %config.app_name,
        environment = %config.environment,
        base_url = %config.api_base_url,
        role = role.as_str(),
        "Client configured"
    );

    if let Err(error) = run(cli.command, &config, &api, session.as_ref(), role, toasts).await {
        tracing::debug!(error = ?error, "Command failed");
        eprintln!("error: {}", error.user_message());
        std::process::exit(1);
    }
    Ok(())
}

async fn run(
    command: Command,
    config: &ClientConfig,
    api: &ApiClient,
    session: &dyn SessionStore,
    role: Role,
    toasts: ToastQueue,
) -> Result<(), AppError> {
    match command {
        Command::Login { token } => {
            let claims = decode_and_validate(&token, Utc::now())?;
            session.set_token(role, token.trim())?;
            println!(
                "Logged in as {} ({})",
                claims.email.as_deref().unwrap_or("unknown"),
                role.as_str()
            );
            Ok(())
        }
        Command::Logout => {
            session.clear_token(role)?;
            println!("Logged out of {}", role.as_str());
            Ok(())
        }
        Command::Whoami => {
            let claims = api.claims()?;
            print_json(&serde_json::json!({
                "role": role.as_str(),
                "id": claims.subject_id(),
                "email": claims.email,
                "expiresAt": claims.expires_at().map(|at| at.to_rfc3339()),
            }))
        }
        Command::Dues(dues) => run_dues(dues, api, role, toasts).await,
        Command::Reels { pages } => {
            let mut feed = ReelsFeed::new(
                api.clone(),
                config.reels_page_size,
                config.playback_threshold,
                toasts,
            );
            for _ in 0..pages.max(1) {
                if !feed.load_next_page().await? {
                    break;
                }
            }
            print_json(&feed.reels)
        }
        Command::Managers {
            scope,
            search,
            region,
            page,
        } => {
            let scope = match scope.trim().to_ascii_lowercase().as_str() {
                "regional" | "rm" => ManagerScope::Regional,
                "property" | "pm" => ManagerScope::Property,
                other => return Err(AppError::BadRequest(format!("Unknown manager scope: {other}"))),
            };
            let mut directory = ManagerDirectory::new(api.clone(), scope, config.list_page_size, toasts);
            directory.set_search(&search);
            directory.set_region(&region);
            directory.load().await?;
            let visible = directory.visible(page);
            eprintln!("page {} of {} ({} managers)", visible.page, visible.total_pages, visible.total_items);
            print_json(&visible.items)
        }
        Command::Hostels {
            city,
            gender,
            min_price,
            max_price,
            page,
        } => {
            let gender = match gender.as_deref() {
                Some(raw) => Some(
                    HostelGender::parse(raw)
                        .ok_or_else(|| AppError::BadRequest(format!("Unknown gender: {raw}")))?,
                ),
                None => None,
            };
            let mut browser = HostelBrowser::new(api, config, toasts);
            browser.set_price_range(min_price, max_price)?;
            browser.search(&HostelQuery { city, gender }).await?;
            let visible = browser.visible(page);
            eprintln!("page {} of {} ({} hostels)", visible.page, visible.total_pages, visible.total_items);
            print_json(&visible.items)
        }
        Command::Rent(rent) => {
            let mut ledger = RentLedger::new(api.clone(), toasts);
            match rent.command {
                RentSubcommand::Bills => {
                    ledger.load_bills().await?;
                    eprintln!("outstanding: {:.2}", ledger.outstanding());
                    print_json(&ledger.bills)
                }
                RentSubcommand::Receipt { payment_id, out } => {
                    let size = ledger.download_receipt(&payment_id, &out).await?;
                    println!("Saved {size} bytes to {}", out.display());
                    Ok(())
                }
            }
        }
        Command::Visits(visits) => {
            let mut board = VisitBoard::new(api.clone(), config.list_page_size, toasts);
            board.load().await?;
            match visits.command {
                VisitsSubcommand::List { status } => {
                    let status = status.as_deref().map(parse_visit_status).transpose()?;
                    board.filter(status);
                    let visible = board.visible(1);
                    print_json(&visible.items)
                }
                VisitsSubcommand::Confirm { visit_id } => {
                    board.confirm(&visit_id).await?;
                    report(&board.toasts);
                    Ok(())
                }
                VisitsSubcommand::Cancel { visit_id, reason } => {
                    board.cancel(&visit_id, &reason).await?;
                    report(&board.toasts);
                    Ok(())
                }
            }
        }
    }
}

async fn run_dues(dues: DuesCommand, api: &ApiClient, role: Role, toasts: ToastQueue) -> Result<(), AppError> {
    let scope = match role {
        Role::Landlord => DuesScope::Landlord,
        Role::PropertyManager => DuesScope::PropertyManager,
        Role::RegionalManager => DuesScope::RegionalManager,
        other => {
            return Err(AppError::Forbidden(format!(
                "Dues are not available for the {} role",
                other.as_str()
            )))
        }
    };
    let mut manager = DuesManager::new(api.clone(), scope, toasts);
    manager.mount().await?;

    match dues.command {
        DuesSubcommand::List => print_json(&manager.categories),
        DuesSubcommand::Create {
            name,
            due_type,
            amount,
        } => {
            let due_type = match due_type.trim().to_ascii_lowercase().as_str() {
                "fixed" => DueType::Fixed,
                "variable" => DueType::Variable,
                other => return Err(AppError::BadRequest(format!("Unknown due type: {other}"))),
            };
            manager.open_create();
            if let Some(modal) = manager.modal.as_mut() {
                *modal.form_mut() = CategoryForm {
                    name,
                    due_type,
                    amount,
                };
            }
            manager.submit_category().await?;
            report(&manager.toasts);
            Ok(())
        }
        DuesSubcommand::Toggle { category_id } => {
            let status = manager.toggle_status(&category_id).await?;
            println!("{category_id}: {status:?}");
            Ok(())
        }
        DuesSubcommand::Assign {
            tenant,
            category,
            amount,
            due_date,
        } => {
            let assigned = manager
                .assign_due(&AssignDueForm {
                    tenant_id: tenant,
                    category_id: category,
                    amount,
                    due_date,
                })
                .await?;
            print_json(&assigned)
        }
    }
}

fn parse_visit_status(raw: &str) -> Result<VisitStatus, AppError> {
    VisitStatus::ALL
        .into_iter()
        .find(|status| {
            serde_json::to_value(status)
                .ok()
                .and_then(|value| value.as_str().map(|name| name.eq_ignore_ascii_case(raw.trim())))
                .unwrap_or(false)
        })
        .ok_or_else(|| AppError::BadRequest(format!("Unknown visit status: {raw}")))
}

fn report(toasts: &ToastQueue) {
    for toast in toasts.all() {
        match toast.level {
            ToastLevel::Success | ToastLevel::Info => println!("{}", toast.message),
            ToastLevel::Warning | ToastLevel::Error => eprintln!("{}", toast.message),
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), AppError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,gharzo_client=info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .with_writer(std::io::stderr)
        .init();
}
