mod cli;
mod infra;
mod remind;
mod routes;
mod server;

use kost_reminder::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
