use crate::report::{run_catalog, run_score, CatalogArgs, ScoreArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use quiz_funnel::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Quiz Funnel",
    about = "Serve the quiz funnel or score answers against fixture data from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Score a sequence of answers and show which condition wins
    Score(ScoreArgs),
    /// Print the landing page cards in display rows
    Catalog(CatalogArgs),
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
        Command::Score(args) => run_score(args).await,
        Command::Catalog(args) => run_catalog(args).await,
    }
}
