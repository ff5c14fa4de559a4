use crate::demo::{run_demo, run_premium, DemoArgs, PremiumArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use eventcover::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "EventCover",
    about = "Quote, bind and settle event insurance from the command line",
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
    /// Price a coverage selection without creating a quote
    Premium(PremiumArgs),
    /// Walk a sample quote through every wizard step to an issued policy
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Persist to this SQLite file instead of APP_DATABASE_PATH
    #[arg(long)]
    pub(crate) database: Option<std::path::PathBuf>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Premium(args) => run_premium(args),
        Command::Demo(args) => run_demo(args),
    }
}
