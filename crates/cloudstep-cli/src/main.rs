mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::{Context, appengine, functions, source};

#[derive(Parser)]
#[command(
    name = "cloudstep",
    about = "Package and deploy artifacts to App Engine and Cloud Functions"
)]
#[command(version)]
struct Cli {
    /// OAuth access token (defaults to `gcloud auth print-access-token`)
    #[arg(long, global = true, env = "CLOUDSTEP_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    /// Path to cloudstep.toml (defaults to ./cloudstep.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// App Engine flexible deployments
    Appengine {
        #[command(subcommand)]
        action: AppEngineAction,
    },
    /// Cloud Functions deployments
    Functions {
        #[command(subcommand)]
        action: FunctionsAction,
    },
    /// Source archives
    Source {
        #[command(subcommand)]
        action: SourceAction,
    },
}

#[derive(Subcommand)]
enum AppEngineAction {
    /// Deploy a new version from a source directory, archive or container image
    Deploy(appengine::DeployArgs),
}

#[derive(Subcommand)]
enum FunctionsAction {
    /// Create or update a function from a source directory or archive
    Deploy(functions::DeployArgs),
}

#[derive(Subcommand)]
enum SourceAction {
    /// Archive a directory into a local zip and print its digest
    Package(source::PackageArgs),
    /// Archive a directory and upload it to a Cloud Storage bucket
    Publish(source::PublishArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let ctx = Context::load(cli.config.as_deref(), cli.access_token)?;
    ctx.cancel_on_ctrl_c();

    match cli.command {
        Commands::Appengine { action } => match action {
            AppEngineAction::Deploy(args) => appengine::deploy(&ctx, args).await?,
        },
        Commands::Functions { action } => match action {
            FunctionsAction::Deploy(args) => functions::deploy(&ctx, args).await?,
        },
        Commands::Source { action } => match action {
            SourceAction::Package(args) => source::package(args)?,
            SourceAction::Publish(args) => source::publish(&ctx, args).await?,
        },
    }

    Ok(())
}
