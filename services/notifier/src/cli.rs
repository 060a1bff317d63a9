use crate::infra::parse_date;
use crate::remind::{run_migrations, run_once, RemindArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use kost_reminder::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Kost Billing Notifier",
    about = "Send daily billing reminders to kost tenants over WhatsApp",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service and the daily scheduler (default command)
    Serve(ServeArgs),
    /// Run the billing reminder job once and print the run summary
    Remind(RemindArgs),
    /// Apply tenant ledger migrations and exit
    Migrate,
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Remind(args) => run_once(args).await,
        Command::Migrate => run_migrations().await,
    }
}
