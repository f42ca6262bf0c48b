//! Command handlers for the CLI

use std::sync::Arc;

use flex_connector::{ConnectorConfig, LedgerConnector, StaticContextResolver};
use flex_core::types::{CallerContext, OrganizationRole};

use crate::{Cli, Commands};

type CmdResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

pub async fn run(cli: Cli) -> CmdResult {
    let mut config = ConnectorConfig::from_env();
    if let Some(path) = &cli.profile {
        config.profile_path = path.clone();
    }

    let role = OrganizationRole::from_str(&cli.role)
        .ok_or_else(|| format!("Unknown role: {}", cli.role))?;
    let context = CallerContext {
        organization_id: cli.organization.clone(),
        role,
    };
    let connector =
        LedgerConnector::initialize(&config, Arc::new(StaticContextResolver::new(context))).await?;

    let outcome = match &cli.command {
        Commands::Invoke {
            function,
            args,
            channel,
        } => handle_invoke(&connector, function, args, channel).await,
        Commands::Query {
            function,
            args,
            channel,
        } => handle_query(&connector, function, args, channel).await,
        Commands::Status {
            transaction_id,
            channel,
        } => handle_status(&connector, transaction_id, channel).await,
    };

    connector.shutdown().await;
    outcome
}

async fn handle_invoke(
    connector: &LedgerConnector,
    function: &str,
    args: &str,
    channel: &str,
) -> CmdResult {
    let args: Vec<serde_json::Value> = serde_json::from_str(args)?;
    let result = connector.invoke(function, &args, channel).await?;

    println!("status:         {}", result.status);
    println!("transaction id: {}", result.transaction_id);
    if !result.info.is_empty() {
        println!("info:           {}", result.info);
    }
    println!("{}", serde_json::to_string_pretty(&result.payload)?);
    Ok(())
}

async fn handle_query(
    connector: &LedgerConnector,
    function: &str,
    args: &str,
    channel: &str,
) -> CmdResult {
    let args: Vec<serde_json::Value> = serde_json::from_str(args)?;
    let result = connector.query(function, &args, channel).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn handle_status(
    connector: &LedgerConnector,
    transaction_id: &str,
    channel: &str,
) -> CmdResult {
    match connector.commit_status(channel, transaction_id).await? {
        Some(notification) => {
            println!("status: {}", notification.status);
            if let Some(block) = &notification.block {
                println!("block:  {}", block.block_number);
            }
        }
        None => {
            println!(
                "No commit notification observed for {} on channel {}",
                transaction_id, channel
            );
        }
    }
    Ok(())
}
