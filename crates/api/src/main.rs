use std::process::ExitCode;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};

use fulfillment_api::{AppConfig, FulfillmentService};

#[derive(Parser, Debug)]
#[command(name = "fulfillment", version, about = "Order reconciliation and shipment stock allocation")]
pub struct Arguments {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Rewrite purchase_status of every order matched to the sourcing sheet
    #[clap(name = "reconcile")]
    Reconcile {
        /// Tenant id (UUID)
        #[arg(short, long)]
        tenant: String,
    },
    /// Set the exact quantity reserved for a barcode
    #[clap(name = "set-target")]
    SetTarget(ShipmentParams),
    /// Reserve more units from unclaimed stock
    #[clap(name = "increase")]
    Increase(ShipmentParams),
    /// Release reserved units, newest first
    #[clap(name = "decrease")]
    Decrease(ShipmentParams),
}

#[derive(Debug, Args)]
pub struct ShipmentParams {
    /// Tenant id (UUID)
    #[arg(short, long)]
    tenant: String,
    /// Product barcode
    #[arg(short, long)]
    barcode: String,
    /// Target quantity (set-target) or delta (increase/decrease)
    #[arg(short, long, allow_negative_numbers = true)]
    quantity: i64,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();
    let args = Arguments::parse();

    let config = AppConfig::from_env().context("invalid configuration")?;
    fulfillment_observability::init_with(config.log_format);

    let service = FulfillmentService::from_config(&config)
        .await
        .context("failed to initialize stores")?;

    let (body, ok) = match args.command {
        Command::Reconcile { tenant } => match service.reconcile_purchase_status(&tenant).await {
            Ok(report) => (serde_json::to_string_pretty(&report)?, true),
            Err(err) => {
                tracing::error!(code = err.code(), error = %err, "reconciliation failed");
                (serde_json::to_string_pretty(&err.to_body())?, false)
            }
        },
        Command::SetTarget(p) => {
            let response = service.set_shipment_target(&p.tenant, &p.barcode, p.quantity).await;
            (serde_json::to_string_pretty(&response)?, response.success)
        }
        Command::Increase(p) => {
            let response = service.increase_shipment(&p.tenant, &p.barcode, p.quantity).await;
            (serde_json::to_string_pretty(&response)?, response.success)
        }
        Command::Decrease(p) => {
            let response = service.decrease_shipment(&p.tenant, &p.barcode, p.quantity).await;
            (serde_json::to_string_pretty(&response)?, response.success)
        }
    };

    println!("{body}");
    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
