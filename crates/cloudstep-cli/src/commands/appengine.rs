use std::path::PathBuf;

use clap::Args;

use cloudstep_cloud::{AppEngineApi, AppEngineDeploy, BucketStager, DeployAction, appengine_request};
use cloudstep_core::{AppManifest, DeployRequest};

use super::{Context, check_provenance, write_provenance};

#[derive(Args)]
pub struct DeployArgs {
    /// GCP project ID (defaults to [project].id in cloudstep.toml)
    #[arg(long)]
    pub project: Option<String>,

    /// App Engine manifest
    #[arg(long, default_value = "app.yaml")]
    pub manifest: PathBuf,

    /// Source directory to archive, or gs://bucket/object of an uploaded archive
    #[arg(long, conflicts_with = "image_url")]
    pub source: Option<PathBuf>,

    /// Prebuilt container image to deploy instead of source
    #[arg(long)]
    pub image_url: Option<String>,

    /// Version ID (defaults to a timestamp such as 20240102t030405)
    #[arg(long)]
    pub version: Option<String>,

    /// Deploy without routing traffic to the new version
    #[arg(long)]
    pub no_promote: bool,

    /// Bucket for source archives (defaults to staging.<project>.appspot.com)
    #[arg(long)]
    pub staging_bucket: Option<String>,

    /// Seconds to wait for the deploy to finish
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Write a provenance record for the uploaded archive to this path
    #[arg(long)]
    pub provenance: Option<PathBuf>,
}

pub async fn deploy(ctx: &Context, args: DeployArgs) -> anyhow::Result<()> {
    check_provenance(args.provenance.as_deref())?;

    let manifest = AppManifest::load(&args.manifest)?;

    let mut builder = DeployRequest::builder(ctx.project(args.project))
        .region(ctx.config.project.region.as_str())
        .reserved_label_prefix(ctx.config.deploy.reserved_label_prefix.as_str())
        .promote(!args.no_promote);
    if let Some(source) = args.source {
        builder = builder.source(source);
    }
    if let Some(image) = args.image_url {
        builder = builder.image(image);
    }
    if let Some(version) = args.version {
        builder = builder.version_id(version);
    }
    let request = appengine_request(&manifest, builder)?;

    let version = request.version_id().unwrap_or_default();
    let bucket = args
        .staging_bucket
        .unwrap_or_else(|| ctx.config.deploy.staging_bucket_for(request.project_id()));
    let object = format!("cloudstep/{}/{version}.zip", request.resource_name());

    let api = AppEngineApi::new(ctx.rest(&ctx.config.endpoints.appengine)?);
    let stager = BucketStager::new(ctx.rest(&ctx.config.endpoints.storage)?, bucket, object);
    let pipeline = AppEngineDeploy::new(api, stager, ctx.poller());

    println!(
        "Deploying {}/{version} to App Engine ({})...",
        request.resource_name(),
        request.project_id()
    );
    let outcome = pipeline
        .deploy(&request, &manifest, &ctx.scope(args.timeout))
        .await?;

    match outcome.action {
        DeployAction::Created => println!("Version {version} created: {}", outcome.name),
        DeployAction::Updated => println!(
            "Version {version} already exists; serving status updated, source not redeployed: {}",
            outcome.name
        ),
    }
    if let Some(url) = &outcome.resource.version_url {
        println!("URL: {url}");
    }

    match &outcome.staged {
        Some(staged) => write_provenance(
            args.provenance.as_deref(),
            &staged.reference.gcs_uri(),
            &staged.digest,
        )?,
        None if args.provenance.is_some() => {
            tracing::warn!("no archive was uploaded, skipping provenance");
        }
        None => {}
    }

    let outcome = outcome.require_promotion()?;
    if outcome.promoted() {
        println!("Version {version} is serving all traffic");
    }
    Ok(())
}
