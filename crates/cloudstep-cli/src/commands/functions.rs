use std::path::PathBuf;

use clap::Args;

use cloudstep_cloud::functions::location_name;
use cloudstep_cloud::{FunctionDeploy, FunctionsApi, SignedUrlStager};
use cloudstep_core::DeployRequest;

use super::{Context, check_provenance, write_provenance};

#[derive(Args)]
pub struct DeployArgs {
    /// GCP project ID (defaults to [project].id in cloudstep.toml)
    #[arg(long)]
    pub project: Option<String>,

    /// Region (defaults to [project].region in cloudstep.toml)
    #[arg(long)]
    pub region: Option<String>,

    /// Function name
    #[arg(long)]
    pub name: String,

    /// Runtime, e.g. nodejs20 or python312
    #[arg(long)]
    pub runtime: Option<String>,

    /// Function entry point in the source
    #[arg(long)]
    pub entry_point: Option<String>,

    /// Source directory to archive, or gs://bucket/object of an uploaded archive
    #[arg(long)]
    pub source: PathBuf,

    /// Labels as key=value, comma separated
    #[arg(long, value_delimiter = ',')]
    pub labels: Vec<String>,

    /// Environment variable as KEY=VALUE (repeatable)
    #[arg(long = "env", short = 'e')]
    pub env: Vec<String>,

    /// Seconds to wait for the deploy to finish
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Write a provenance record for the uploaded archive to this path
    #[arg(long)]
    pub provenance: Option<PathBuf>,
}

pub async fn deploy(ctx: &Context, args: DeployArgs) -> anyhow::Result<()> {
    check_provenance(args.provenance.as_deref())?;

    let mut builder = DeployRequest::builder(ctx.project(args.project))
        .region(ctx.region(args.region))
        .resource_name(args.name)
        .entry_point(args.entry_point)
        .source(args.source)
        .labels(args.labels)
        .env(args.env)
        .reserved_label_prefix(ctx.config.deploy.reserved_label_prefix.as_str());
    if let Some(runtime) = args.runtime {
        builder = builder.runtime(runtime);
    }
    let request = builder.build()?;

    let api = FunctionsApi::new(ctx.rest(&ctx.config.endpoints.functions)?);
    let parent = location_name(request.project_id(), request.region());
    let stager = SignedUrlStager::new(api.clone(), parent);
    let pipeline = FunctionDeploy::new(api, stager, ctx.poller());

    println!(
        "Deploying function {} to {}...",
        request.resource_name(),
        request.region()
    );
    let outcome = pipeline.deploy(&request, &ctx.scope(args.timeout)).await?;

    println!("Function {}d: {}", outcome.action, outcome.name);
    if let Some(url) = &outcome.resource.url {
        println!("URL: {url}");
    }

    if let Some(staged) = &outcome.staged {
        write_provenance(
            args.provenance.as_deref(),
            &staged.reference.gcs_uri(),
            &staged.digest,
        )?;
    }
    Ok(())
}
