//! End-to-end run against the in-process devnet

use std::time::Duration;

use anyhow::Context;
use clap::Args;
use tracing::info;

use cloak_config::CloakConfig;
use cloak_core::{ControllerSettings, CreateRequest, LifecycleController, StatusBoard};
use cloak_devnet::Devnet;
use cloak_gateway::ContractAddress;
use cloak_record::Address;

#[derive(Args, Debug)]
pub struct DemoArgs {
    /// Request title
    #[arg(long, default_value = "Tuition assistance")]
    title: String,

    /// Amount to encrypt; non-digits are ignored
    #[arg(long, default_value = "1250")]
    amount: String,

    /// Category selector (1 = donation, 2 = assistance)
    #[arg(long, default_value = "2")]
    category: String,

    /// Simulated latency of every ledger call
    #[arg(long, default_value = "0")]
    latency_ms: u64,

    /// Also race a verification from a second session
    #[arg(long)]
    race: bool,
}

fn print_status(status: &StatusBoard) {
    if let Some(n) = status.latest() {
        println!("  [{:?}] {}", n.kind, n.message);
    }
}

fn controller(devnet: &Devnet, settings: &ControllerSettings) -> LifecycleController {
    LifecycleController::new(
        devnet.ledger.clone(),
        devnet.encryptor.clone(),
        devnet.kms.clone(),
        settings.clone(),
    )
}

pub async fn run(config: &CloakConfig, args: DemoArgs) -> anyhow::Result<()> {
    let context = ContractAddress::new(config.ledger.contract_address.clone());
    let devnet = if args.latency_ms > 0 {
        Devnet::with_latency(context, Duration::from_millis(args.latency_ms))
    } else {
        Devnet::new(context)
    };
    let settings = ControllerSettings::from_config(config);
    let session = controller(&devnet, &settings);

    let identity = Address::from_bytes(&[0xa1; 20]);
    info!("Demo identity {}", identity);

    println!("1. Checking availability");
    session.check_availability().await?;
    print_status(session.status());

    println!("2. Connecting {}", identity);
    session.connect(identity).await?;

    println!("3. Creating \"{}\"", args.title);
    let request = CreateRequest::from_form(&args.title, &args.amount, &args.category)?;
    let created = session.create(request).await;
    print_status(session.status());
    let created = created.context("create failed")?;
    println!("  id {} in block {}", created.record_id, created.receipt.block);

    println!("4. Verifying {}", created.record_id);
    if args.race {
        let rival = controller(&devnet, &settings);
        rival.connect(Address::from_bytes(&[0xb0; 20])).await?;
        let (mine, theirs) = tokio::join!(
            session.verify(&created.record_id),
            rival.verify(&created.record_id)
        );
        print_status(session.status());
        println!("  this session: {:?}", mine?.path);
        println!("  rival session: {:?}", theirs?.path);
    } else {
        let report = session.verify(&created.record_id).await;
        print_status(session.status());
        let report = report.context("verify failed")?;
        println!("  path {:?}, reveal {:?}", report.path, report.reveal);
    }

    println!("5. Verifying again");
    let again = session.verify(&created.record_id).await?;
    print_status(session.status());
    println!("  path {:?}", again.path);

    println!(
        "  ledger accepted {} verification write(s), height {}",
        devnet.ledger.verification_writes().await,
        devnet.ledger.block_height().await
    );

    let view = session.view().await;
    println!();
    println!(
        "{} request(s): {} verified, {} pending",
        view.stats.total, view.stats.verified, view.stats.pending
    );
    for record in &view.records {
        let amount = match record.confirmed_value() {
            Some(value) => value.to_string(),
            None => "<encrypted>".to_string(),
        };
        println!(
            "  {} [{}] {} : {}",
            record.id,
            record.category_label(),
            record.title,
            amount
        );
    }

    println!();
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}
