// Copyright (c) 2024 The image-attestor Authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! One-shot attestation of container images.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use image_attestor::{
    registry::RegistryManifestFetcher, signature::cosign::CosignVerifier, AttestorConfig,
    ContainerStatus, SigstoreAttestor,
};
use log::info;

#[derive(Parser)]
#[command(name = "image-attestor")]
#[command(bin_name = "image-attestor")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    operation: Operation,

    /// Config file path
    #[arg(short, long)]
    config: Option<String>,

    /// Rekor URL, overrides the one in the config file
    #[arg(long)]
    rekor_url: Option<String>,
}

#[derive(Subcommand)]
#[command(author, version, about, long_about = None)]
enum Operation {
    /// Print the selectors of one container
    Attest(AttestArgs),

    /// Print the subjects of the verified signatures of an image
    Subjects(SubjectsArgs),
}

#[derive(Args)]
#[command(author, version, about, long_about = None)]
struct AttestArgs {
    /// Image ID as reported in the container status
    #[arg(short, long)]
    image_id: String,

    /// Container ID used to scope the selectors
    #[arg(short, long)]
    container_id: String,
}

#[derive(Args)]
#[command(author, version, about, long_about = None)]
struct SubjectsArgs {
    /// Digest qualified image reference
    #[arg(short, long)]
    image: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let env = env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info");
    env_logger::Builder::from_env(env).init();

    let args = Cli::parse();
    let mut config = AttestorConfig::new(args.config).context("load config")?;
    if let Some(rekor_url) = args.rekor_url {
        config.rekor_url = rekor_url;
    }

    let attestor = SigstoreAttestor::from_config(
        config,
        Arc::new(CosignVerifier::default()),
        Arc::new(RegistryManifestFetcher::default()),
    )
    .await
    .context("initialize attestor")?;

    match args.operation {
        Operation::Attest(args) => {
            let status = ContainerStatus {
                image_id: args.image_id,
                container_id: args.container_id,
            };
            let selectors = attestor
                .attest_container_signatures(&status)
                .await
                .context("attest container")?;
            info!("{} selector(s) for {}", selectors.len(), status.image_id);
            for selector in selectors {
                println!("{selector}");
            }
        }
        Operation::Subjects(args) => {
            let signatures = attestor
                .fetch_image_signatures(&args.image)
                .await
                .context("fetch image signatures")?;
            for selector in attestor.extract_selectors_from_signatures(&signatures) {
                println!("{}", selector.subject);
            }
        }
    }

    Ok(())
}
