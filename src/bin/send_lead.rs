//! Script to submit a single lead from the command line.
//!
//! Usage: `send_lead <lead name> [email] [phone] [contact name]`

use amo_form_sync::config::Config;
use amo_form_sync::crm_client::AmoHttpClient;
use amo_form_sync::models::Submission;
use amo_form_sync::submitter::FormSubmitter;
use std::env;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "amo_form_sync=info".into()),
        )
        .init();

    let config = Config::from_env()?;

    let mut args = env::args().skip(1);
    let lead_name = args.next().ok_or_else(|| {
        anyhow::anyhow!("usage: send_lead <lead name> [email] [phone] [contact name]")
    })?;
    let mut submission = Submission::new(lead_name);
    submission.email = args.next().filter(|v| !v.is_empty());
    submission.phone = args.next().filter(|v| !v.is_empty());
    submission.contact_name = args.next().filter(|v| !v.is_empty());

    let client = AmoHttpClient::from_config(&config)?;
    let submitter = FormSubmitter::new(client);

    let lead_id = submitter.submit(&submission).await?;
    tracing::info!("Lead {} created", lead_id);
    println!("{}", lead_id);

    Ok(())
}
