use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use psbt_swap::Network;

#[derive(Debug, Parser)]
#[command(
    name = "psbt-swap",
    version,
    about = "Build and sign two-address ordinals swaps with an external wallet signer"
)]
pub struct Cli {
    /// Network every address and request is scoped to
    #[arg(long, global = true, env = "PSBT_SWAP_NETWORK", default_value = "testnet")]
    pub network: Network,

    /// Esplora API base URL (defaults to mempool.space for the network)
    #[arg(long, global = true)]
    pub esplora_url: Option<String>,

    /// JSON-RPC endpoint of the wallet signer bridge
    #[arg(long, global = true)]
    pub signer_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the capability check and print the final state
    Capabilities,
    /// Ask the wallet for its payment and ordinals addresses
    Connect(ConnectArgs),
    /// List spendable outputs of an address
    Utxos(UtxosArgs),
    /// Assemble a swap from a stored UTXO file and print the signing request
    Build(BuildArgs),
    /// Run the full swap flow against the signer
    Sign(SignArgs),
    /// Classify a stored signer reply
    Classify(ClassifyArgs),
}

#[derive(Debug, Args)]
pub struct ConnectArgs {
    /// Message shown by the wallet
    #[arg(long, default_value = "Share your payment and ordinals addresses")]
    pub message: String,
}

#[derive(Debug, Args)]
pub struct UtxosArgs {
    #[arg(long)]
    pub address: String,
}

#[derive(Debug, Args)]
pub struct SwapArgs {
    /// Wallet account JSON as printed by `connect`
    #[arg(long)]
    pub account: PathBuf,

    /// Receives the payment input's value (defaults to the account's ordinals address)
    #[arg(long)]
    pub ordinals_recipient: Option<String>,

    /// Receives the ordinals input's value (defaults to the account's payment address)
    #[arg(long)]
    pub payment_recipient: Option<String>,

    /// Fee deducted from the payment-funded output
    #[arg(long, default_value_t = 0)]
    pub fee_sats: u64,

    /// Which output of each address is spent
    #[arg(long, value_enum, default_value_t = SelectionArg::First)]
    pub selection: SelectionArg,

    /// Message shown by the wallet when signing
    #[arg(long)]
    pub message: Option<String>,
}

#[derive(Debug, Args)]
pub struct BuildArgs {
    #[command(flatten)]
    pub swap: SwapArgs,

    /// JSON file with `payment` and `ordinals` arrays of `{txid, vout, value}`
    #[arg(long)]
    pub utxos: PathBuf,
}

#[derive(Debug, Args)]
pub struct SignArgs {
    #[command(flatten)]
    pub swap: SwapArgs,
}

#[derive(Debug, Args)]
pub struct ClassifyArgs {
    /// Raw JSON-RPC reply body
    #[arg(long)]
    pub reply_file: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SelectionArg {
    First,
    Largest,
}
