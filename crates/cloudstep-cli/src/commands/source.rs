use std::path::PathBuf;

use clap::Args;

use cloudstep_build::{archive_to_file, archive_to_temp, sha256_file};
use cloudstep_cloud::{BucketStager, Stager};

use super::{Context, check_provenance, write_provenance};

#[derive(Args)]
pub struct PackageArgs {
    /// Directory to archive
    #[arg(long)]
    pub source: PathBuf,

    /// Zip file to create
    #[arg(long)]
    pub output: PathBuf,

    /// Write a provenance record for the archive to this path
    #[arg(long)]
    pub provenance: Option<PathBuf>,
}

#[derive(Args)]
pub struct PublishArgs {
    /// Directory to archive
    #[arg(long)]
    pub source: PathBuf,

    /// Destination bucket
    #[arg(long)]
    pub bucket: String,

    /// Destination object name
    #[arg(long)]
    pub object: String,

    /// Write a provenance record for the uploaded archive to this path
    #[arg(long)]
    pub provenance: Option<PathBuf>,
}

/// Archive locally. Never touches the network.
pub fn package(args: PackageArgs) -> anyhow::Result<()> {
    check_provenance(args.provenance.as_deref())?;

    let summary = archive_to_file(&args.source, &args.output)?;
    let digest = sha256_file(&args.output)?;

    println!(
        "Packaged {} files into {} ({digest})",
        summary.files,
        args.output.display()
    );

    let uri = std::path::absolute(&args.output)?;
    write_provenance(
        args.provenance.as_deref(),
        &uri.display().to_string(),
        &digest,
    )
}

pub async fn publish(ctx: &Context, args: PublishArgs) -> anyhow::Result<()> {
    check_provenance(args.provenance.as_deref())?;

    let archive = archive_to_temp(&args.source)?;
    let digest = sha256_file(archive.path())?;

    let stager = BucketStager::new(
        ctx.rest(&ctx.config.endpoints.storage)?,
        args.bucket,
        args.object,
    );
    let reference = stager.stage(archive.path()).await?;
    let uri = reference.gcs_uri();

    println!(
        "Published {} files to {uri} ({digest})",
        archive.summary().files
    );
    write_provenance(args.provenance.as_deref(), &uri, &digest)
}
