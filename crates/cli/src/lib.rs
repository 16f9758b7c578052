#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]

pub mod cli;
pub mod config;
pub mod files;

use std::fs;
use std::sync::Arc;

use anyhow::{Context, Result};
use psbt_swap::{
    EsploraClient, FirstAvailable, HttpSigner, LargestValue, RawReply, SelectionPolicy,
    SignerClient, SwapCoordinator, SwapRecipients, SwapRequest, UtxoSource, WalletAccount,
    classify, negotiate, prepare_swap,
};
use serde::Serialize;
use tracing::info;

use crate::cli::{
    BuildArgs, ClassifyArgs, Cli, Command, ConnectArgs, SelectionArg, SignArgs, SwapArgs,
    UtxosArgs,
};
use crate::config::CliConfig;
use crate::files::{load_spendable, read_json};

pub async fn run(cli: Cli) -> Result<()> {
    let mut config = CliConfig::from_env(cli.network)?;
    if let Some(url) = cli.esplora_url {
        config.esplora_url = url;
    }
    if let Some(url) = cli.signer_url {
        config.signer_url = url;
    }
    config.validate()?;

    match cli.command {
        Command::Capabilities => run_capabilities(&config).await,
        Command::Connect(args) => run_connect(&config, &args).await,
        Command::Utxos(args) => run_utxos(&config, &args).await,
        Command::Build(args) => run_build(&config, &args),
        Command::Sign(args) => run_sign(&config, &args).await,
        Command::Classify(args) => run_classify(&args),
    }
}

fn signer_client(config: &CliConfig) -> Result<SignerClient<HttpSigner>> {
    let signer = HttpSigner::new(config.signer_url.clone(), config.http_timeout())
        .context("failed to build signer HTTP client")?;
    Ok(SignerClient::new(signer))
}

fn esplora_client(config: &CliConfig) -> Result<EsploraClient> {
    EsploraClient::with_base_url(&config.esplora_url, config.http_timeout())
        .context("failed to build Esplora HTTP client")
}

fn coordinator(
    config: &CliConfig,
    selection: SelectionArg,
) -> Result<SwapCoordinator<EsploraClient, HttpSigner>> {
    Ok(
        SwapCoordinator::new(esplora_client(config)?, signer_client(config)?)
            .with_selection(selection_policy(selection)),
    )
}

fn selection_policy(selection: SelectionArg) -> Arc<dyn SelectionPolicy + Send + Sync> {
    match selection {
        SelectionArg::First => Arc::new(FirstAvailable),
        SelectionArg::Largest => Arc::new(LargestValue),
    }
}

fn swap_request(config: &CliConfig, args: &SwapArgs) -> Result<SwapRequest> {
    let account: WalletAccount = read_json(&args.account)?;
    let defaults = SwapRecipients::between(&account.roles);

    let mut request = SwapRequest::between_roles(config.network, account.roles);
    request.recipients = SwapRecipients {
        ordinals_recipient: args
            .ordinals_recipient
            .clone()
            .unwrap_or(defaults.ordinals_recipient),
        payment_recipient: args
            .payment_recipient
            .clone()
            .unwrap_or(defaults.payment_recipient),
        fee_sats: args.fee_sats,
    };
    if let Some(message) = &args.message {
        request.message.clone_from(message);
    }

    Ok(request)
}

async fn run_capabilities(config: &CliConfig) -> Result<()> {
    let client = signer_client(config)?;
    let snapshot = negotiate(&client, config.network, config.retry_policy()).await;

    info!(network = %config.network, attempts = snapshot.attempts, "capability check finished");
    print_json(&snapshot)
}

async fn run_connect(config: &CliConfig, args: &ConnectArgs) -> Result<()> {
    let outcome = coordinator(config, SelectionArg::First)?
        .connect(&args.message)
        .await?;
    print_json(&outcome)
}

async fn run_utxos(config: &CliConfig, args: &UtxosArgs) -> Result<()> {
    let outputs = esplora_client(config)?
        .fetch_spendable(config.network, &args.address)
        .await?;
    print_json(&outputs)
}

fn run_build(config: &CliConfig, args: &BuildArgs) -> Result<()> {
    let request = swap_request(config, &args.swap)?;
    let spendable = load_spendable(&args.utxos, config.network, &request.roles)?;

    let prepared = prepare_swap(
        &spendable,
        &request,
        selection_policy(args.swap.selection).as_ref(),
    )?;
    print_json(&prepared)
}

async fn run_sign(config: &CliConfig, args: &SignArgs) -> Result<()> {
    let request = swap_request(config, &args.swap)?;
    let coordinator = coordinator(config, args.swap.selection)?;

    let capabilities =
        negotiate(coordinator.signer(), config.network, config.retry_policy()).await;
    let result = coordinator.sign(&capabilities, &request).await?;

    print_json(&result)
}

fn run_classify(args: &ClassifyArgs) -> Result<()> {
    let body = fs::read_to_string(&args.reply_file)
        .with_context(|| format!("failed to read '{}'", args.reply_file.display()))?;

    print_json(&classify(RawReply::Text(body)))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("failed to render JSON")?;
    println!("{rendered}");
    Ok(())
}
