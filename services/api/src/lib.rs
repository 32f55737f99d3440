mod cli;
mod infra;
mod report;
mod routes;
mod server;

use quiz_funnel::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
