//! ingress-manager - reconciles App resources into a Deployment, Service and Ingress

use clap::Parser;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client, CustomResourceExt};

use ingress_manager::config::OperatorConfig;
use ingress_manager::crd::{crd_manifest, App};
use ingress_manager::{router, telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = OperatorConfig::parse();

    if config.crd {
        println!("{}", crd_manifest()?);
        return Ok(());
    }

    telemetry::init(config.log_format)?;
    config.validate()?;

    let client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;

    if config.install_crd {
        ensure_crd_installed(&client, &config.field_manager).await?;
    }

    router::run(client, &config).await?;
    Ok(())
}

/// Install or update the App CRD using server-side apply
async fn ensure_crd_installed(client: &Client, field_manager: &str) -> anyhow::Result<()> {
    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    let params = PatchParams::apply(field_manager).force();

    tracing::info!("Installing App CRD...");
    crds.patch("apps.ing.igtest.com", &params, &Patch::Apply(&App::crd()))
        .await
        .map_err(|e| anyhow::anyhow!("Failed to install App CRD: {}", e))?;

    Ok(())
}
