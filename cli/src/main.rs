mod terminal;

#[cfg(test)]
#[path = "main_test.rs"]
mod main_test;

use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use portal::auth::{self, LoginError, RegisterForm};
use portal::config::ConfigError;
use portal::hooks::{AdminPanel, CommandError, ProjectForm, ProjectStats, Referrals, Transactions, UserData};
use portal::net::api;
use portal::session::notifier::PromptState;
use portal::session::token::{decode, is_expired, role_of};
use portal::session::{GuardOutcome, Notice, NoticeSurface, RouteAccess};
use portal::storage::{FileStore, StorageError};
use portal::validation::{ValidationError, parse_amount};
use portal::{ApiError, PortalConfig, PortalContext};
use serde::Serialize;
use serde_json::json;
use tracing_subscriber::EnvFilter;

use crate::terminal::{TerminalNavigator, TerminalSurface, wait_for_acknowledgment};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("session storage: {0}")]
    Storage(#[from] StorageError),
    #[error("{}", .0.user_message("request failed"))]
    Api(#[from] ApiError),
    #[error("login failed: {0}")]
    Login(#[from] LoginError),
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("not signed in; run `portal-cli login` first")]
    NotSignedIn,
    #[error("this command requires an administrator account")]
    NotAdmin,
    #[error("unknown project `{0}`")]
    UnknownProject(String),
    #[error("invalid JSON output: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "portal-cli", about = "Investment portal client")]
struct Cli {
    /// Overrides `PORTAL_API_BASE_URL`.
    #[arg(long)]
    base_url: Option<String>,

    /// Overrides `PORTAL_SESSION_FILE`.
    #[arg(long)]
    session_file: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Login {
        email: String,
        #[arg(long, env = "PORTAL_PASSWORD", hide_env_values = true)]
        password: String,
    },
    Register(RegisterArgs),
    Logout,
    /// Show the stored session without contacting the server.
    Whoami,
    #[command(flatten)]
    Account(AccountCommand),
    Referrals(ReferralsCommand),
    Projects(ProjectsCommand),
    Admin(AdminCommand),
}

/// Signed-in user's own money and history.
#[derive(Subcommand, Debug)]
enum AccountCommand {
    Dashboard,
    Transactions,
    Withdraw {
        #[arg(long)]
        amount: String,
        #[arg(long)]
        phone: String,
    },
    Deposit {
        #[arg(long)]
        amount: String,
    },
    Invest {
        #[arg(long)]
        project: String,
        #[arg(long)]
        amount: String,
    },
}

#[derive(Args, Debug)]
struct RegisterArgs {
    #[arg(long)]
    full_name: String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    phone: String,
    #[arg(long, env = "PORTAL_PASSWORD", hide_env_values = true)]
    password: String,
    #[arg(long, default_value = "")]
    referral_code: String,
}

#[derive(Args, Debug)]
struct ReferralsCommand {
    #[command(subcommand)]
    command: ReferralsSubcommand,
}

#[derive(Subcommand, Debug)]
enum ReferralsSubcommand {
    Summary,
    List,
    Earnings,
    GenerateCode,
    ClaimBonus { bonus_id: String },
}

#[derive(Args, Debug)]
struct ProjectsCommand {
    #[command(subcommand)]
    command: ProjectsSubcommand,
}

#[derive(Subcommand, Debug)]
enum ProjectsSubcommand {
    List {
        #[arg(long, default_value_t = false)]
        active: bool,
    },
    Stats {
        /// Single project; all projects when omitted.
        project_id: Option<String>,
        #[arg(long, default_value_t = false)]
        active: bool,
    },
}

#[derive(Args, Debug)]
struct AdminCommand {
    #[command(subcommand)]
    command: AdminSubcommand,
}

#[derive(Subcommand, Debug)]
enum AdminSubcommand {
    Pending,
    Approve { transaction_id: String },
    Reject { transaction_id: String },
    Projects,
    ToggleProject { project_id: String },
    CreateProject {
        #[arg(long)]
        name: String,
        #[arg(long)]
        expected_return_rate: String,
        #[arg(long)]
        min_amount: String,
        #[arg(long)]
        max_amount: String,
        #[arg(long)]
        end_date: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let surface = Arc::new(TerminalSurface);
    let ctx = match build_context(&cli, surface.clone()) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = run(&ctx, surface.as_ref(), cli.command).await;

    if ctx.notifier().state() == PromptState::Showing {
        wait_for_acknowledgment().await;
        ctx.notifier().acknowledge();
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn build_context(cli: &Cli, surface: Arc<TerminalSurface>) -> Result<PortalContext, CliError> {
    let mut config = PortalConfig::from_env()?;
    if let Some(base_url) = &cli.base_url {
        config = config.with_base_url(base_url)?;
    }
    if let Some(session_file) = &cli.session_file {
        config.session_file.clone_from(session_file);
    }

    let storage = FileStore::open(&config.session_file)?;
    let login_path = config.login_path.clone();
    let ctx = PortalContext::new(config, Arc::new(storage), surface)?;
    ctx.set_navigator(Arc::new(TerminalNavigator { login_path }));
    Ok(ctx)
}

async fn run(ctx: &PortalContext, surface: &dyn NoticeSurface, command: Command) -> Result<(), CliError> {
    match command {
        Command::Login { email, password } => {
            let session = auth::login(ctx.client(), ctx.store(), &email, &password).await?;
            print_json(&json!({ "userId": session.user_id, "role": session.role }))
        }
        Command::Register(args) => {
            let form = RegisterForm {
                full_name: args.full_name,
                email: args.email,
                phone_number: args.phone,
                password: args.password,
                referral_code: args.referral_code,
            };
            let outcome = auth::register(ctx.client(), form).await?;
            report(surface, &outcome.message_or("Registration complete, you can now sign in"))
        }
        Command::Logout => {
            auth::logout(ctx.store())?;
            report(surface, "Signed out")
        }
        Command::Whoami => whoami(ctx),
        Command::Referrals(referrals) => {
            require(ctx, RouteAccess::Authenticated)?;
            run_referrals(ctx, surface, referrals.command).await
        }
        Command::Projects(projects) => {
            require(ctx, RouteAccess::Authenticated)?;
            run_projects(ctx, projects.command).await
        }
        Command::Admin(admin) => {
            require(ctx, RouteAccess::Admin)?;
            run_admin(ctx, surface, admin.command).await
        }
        Command::Account(account) => {
            require(ctx, RouteAccess::Authenticated)?;
            run_account(ctx, surface, account).await
        }
    }
}

/// Apply the route guard; a redirect becomes the matching error.
fn require(ctx: &PortalContext, access: RouteAccess) -> Result<(), CliError> {
    match ctx.guard().check(access) {
        GuardOutcome::Render => Ok(()),
        GuardOutcome::Redirect(path) if path == ctx.config().login_path => Err(CliError::NotSignedIn),
        GuardOutcome::Redirect(_) => Err(CliError::NotAdmin),
    }
}

fn whoami(ctx: &PortalContext) -> Result<(), CliError> {
    let Some(session) = ctx.store().get() else {
        return Err(CliError::NotSignedIn);
    };
    let payload = decode(&session.token);
    print_json(&json!({
        "userId": session.user_id,
        "role": role_of(payload.as_ref()).or(session.role),
        "admin": auth::is_admin(ctx.store()),
        "expired": is_expired(payload.as_ref()),
    }))
}

async fn run_account(ctx: &PortalContext, surface: &dyn NoticeSurface, command: AccountCommand) -> Result<(), CliError> {
    match command {
        AccountCommand::Dashboard => {
            let user = UserData::new(ctx.clone());
            user.mount().await?;
            print_json(&json!({
                "profile": user.profile.data(),
                "dashboard": user.dashboard.data(),
                "balance": user.balance.data(),
                "withdrawal": eligibility_json(&user),
            }))
        }
        AccountCommand::Transactions => {
            let transactions = Transactions::new(ctx.clone());
            print_json(&transactions.mount().await?)
        }
        AccountCommand::Withdraw { amount, phone } => {
            let amount = parse_amount(&amount)?;
            let user = UserData::new(ctx.clone());
            user.fetch_balance().await?;
            let cap = user.withdrawal_eligibility().withdrawal_cap;
            let message = Transactions::new(ctx.clone()).withdraw(amount, &phone, cap).await?;
            report(surface, &message)
        }
        AccountCommand::Deposit { amount } => {
            let amount = parse_amount(&amount)?;
            let message = Transactions::new(ctx.clone()).top_up(amount).await?;
            report(surface, &message)
        }
        AccountCommand::Invest { project, amount } => {
            let amount = parse_amount(&amount)?;
            let projects = api::projects(ctx.client()).await?;
            let target = projects
                .into_iter()
                .find(|p| p.id == project)
                .ok_or(CliError::UnknownProject(project))?;
            let transactions = Transactions::new(ctx.clone());
            match transactions.invest(&target, amount).await {
                Ok(message) => report(surface, &message),
                Err(err) => {
                    if err.needs_reconciliation {
                        surface.show(&Notice::info("Check your transaction history to confirm the investment status"));
                        print_json(&transactions.list.data())?;
                    }
                    Err(err.into())
                }
            }
        }
    }
}

fn eligibility_json(user: &UserData) -> serde_json::Value {
    let e = user.withdrawal_eligibility();
    json!({
        "available": e.available,
        "withdrawableNow": e.withdrawable_now,
        "canWithdrawNow": e.can_withdraw_now,
        "restrictedUntil": e.restricted_until,
    })
}

async fn run_referrals(
    ctx: &PortalContext,
    surface: &dyn NoticeSurface,
    command: ReferralsSubcommand,
) -> Result<(), CliError> {
    let referrals = Referrals::new(ctx.clone());
    match command {
        ReferralsSubcommand::Summary => print_json(&referrals.fetch_summary().await?),
        ReferralsSubcommand::List => print_json(&referrals.fetch_list().await?),
        ReferralsSubcommand::Earnings => print_json(&referrals.fetch_earnings().await?),
        ReferralsSubcommand::GenerateCode => {
            let outcome = referrals.generate_code().await?;
            report(surface, &outcome.message_or("Referral code generated"))?;
            print_json(&json!({ "referralCode": outcome.referral_code }))
        }
        ReferralsSubcommand::ClaimBonus { bonus_id } => {
            let outcome = referrals.claim_bonus(&bonus_id).await?;
            report(surface, &outcome.message_or("Bonus claimed"))
        }
    }
}

async fn run_projects(ctx: &PortalContext, command: ProjectsSubcommand) -> Result<(), CliError> {
    match command {
        ProjectsSubcommand::List { active } => {
            let user = UserData::new(ctx.clone());
            let projects = user.fetch_projects().await?;
            if active { print_json(&user.active_projects()) } else { print_json(&projects) }
        }
        ProjectsSubcommand::Stats { project_id: Some(id), .. } => {
            print_json(&ProjectStats::new(ctx.clone()).fetch_one(&id).await?)
        }
        ProjectsSubcommand::Stats { project_id: None, active } => {
            let stats = ProjectStats::new(ctx.clone());
            if active { print_json(&stats.fetch_active().await?) } else { print_json(&stats.fetch_all().await?) }
        }
    }
}

async fn run_admin(ctx: &PortalContext, surface: &dyn NoticeSurface, command: AdminSubcommand) -> Result<(), CliError> {
    let panel = AdminPanel::new(ctx.clone());
    match command {
        AdminSubcommand::Pending => print_json(&panel.fetch_pending().await?),
        AdminSubcommand::Projects => print_json(&panel.fetch_projects().await?),
        AdminSubcommand::Approve { transaction_id } => report(surface, &panel.approve(&transaction_id).await?),
        AdminSubcommand::Reject { transaction_id } => report(surface, &panel.reject(&transaction_id).await?),
        AdminSubcommand::ToggleProject { project_id } => {
            let projects = panel.fetch_projects().await?;
            let current = projects
                .iter()
                .find(|p| p.id == project_id)
                .ok_or_else(|| CliError::UnknownProject(project_id.clone()))?;
            report(surface, &panel.toggle_project(&project_id, current.status).await?)
        }
        AdminSubcommand::CreateProject { name, expected_return_rate, min_amount, max_amount, end_date } => {
            let form = ProjectForm { name, expected_return_rate, min_amount, max_amount, end_date };
            report(surface, &panel.create_project(&form).await?)
        }
    }
}

fn report(surface: &dyn NoticeSurface, message: &str) -> Result<(), CliError> {
    surface.show(&Notice::success(message));
    print_json(&json!({ "message": message }))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
