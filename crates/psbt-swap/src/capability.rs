//! Signer capability negotiation.
//!
//! [`CapabilityNegotiator`] is the pure state machine, [`negotiate`] drives it to a terminal
//! state with timed retries, and [`CapabilityWatcher`] runs that loop as a background task
//! that restarts from scratch when the network changes.

use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::SwapError;
use crate::network::Network;
use crate::outcome::SignerOutcome;
use crate::signer::{ExternalSigner, SignerClient};

/// Method name a signer reports as supported.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capability(Cow<'static, str>);

impl Capability {
    pub const GET_ADDRESSES: Self = Self(Cow::Borrowed("getAddresses"));
    pub const SIGN_TRANSACTION: Self = Self(Cow::Borrowed("signTransaction"));

    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "capabilities", rename_all = "snake_case")]
pub enum CapabilityState {
    Loading,
    Loaded(BTreeSet<Capability>),
    Cancelled,
    Missing,
}

impl CapabilityState {
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Loading)
    }

    /// Gate a flow on `capability` being reported by a loaded signer.
    pub fn require(&self, capability: &Capability) -> Result<(), SwapError> {
        match self {
            Self::Loaded(set) if set.contains(capability) => Ok(()),
            Self::Loaded(_) => Err(SwapError::CapabilityUnsupported(capability.clone())),
            Self::Loading => Err(SwapError::CapabilityPending),
            Self::Cancelled => Err(SwapError::CapabilityCancelled),
            Self::Missing => Err(SwapError::CapabilityMissing),
        }
    }

    const fn name(&self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Loaded(_) => "loaded",
            Self::Cancelled => "cancelled",
            Self::Missing => "missing",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 20,
            delay: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CapabilityError {
    #[error("capability state is already {0} for this network")]
    AlreadyTerminal(&'static str),

    #[error("reply for {reply} arrived while negotiating {current}")]
    StaleNetwork { current: Network, reply: Network },
}

/// Forward-only capability state for one network.
#[derive(Debug, Clone)]
pub struct CapabilityNegotiator {
    network: Network,
    policy: RetryPolicy,
    attempts: u32,
    state: CapabilityState,
}

impl CapabilityNegotiator {
    #[must_use]
    pub const fn new(network: Network, policy: RetryPolicy) -> Self {
        Self {
            network,
            policy,
            attempts: 0,
            state: CapabilityState::Loading,
        }
    }

    #[must_use]
    pub const fn network(&self) -> Network {
        self.network
    }

    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    #[must_use]
    pub const fn state(&self) -> &CapabilityState {
        &self.state
    }

    #[must_use]
    pub fn into_state(self) -> CapabilityState {
        self.state
    }

    /// Drop all progress and start over on `network`.
    pub fn reset(&mut self, network: Network) {
        self.network = network;
        self.attempts = 0;
        self.state = CapabilityState::Loading;
    }

    /// Record the reply to one capability query.
    ///
    /// Structured rejections and transport failures count against the attempt budget; the
    /// state turns `Missing` once it is spent.
    pub fn on_reply(
        &mut self,
        network: Network,
        outcome: SignerOutcome<BTreeSet<Capability>>,
    ) -> Result<&CapabilityState, CapabilityError> {
        if network != self.network {
            return Err(CapabilityError::StaleNetwork {
                current: self.network,
                reply: network,
            });
        }
        if self.state.is_terminal() {
            return Err(CapabilityError::AlreadyTerminal(self.state.name()));
        }

        self.attempts += 1;

        self.state = match outcome {
            SignerOutcome::Finished(capabilities) => {
                info!(%network, attempts = self.attempts, "signer capabilities loaded");
                CapabilityState::Loaded(capabilities)
            }
            SignerOutcome::UserCancelled => {
                info!(%network, "capability check cancelled in wallet");
                CapabilityState::Cancelled
            }
            SignerOutcome::Rejected { code, message } => {
                debug!(%network, attempt = self.attempts, code, %message, "signer not ready");
                self.exhausted_or_loading()
            }
            SignerOutcome::TransportError(message) => {
                debug!(%network, attempt = self.attempts, %message, "signer unreachable");
                self.exhausted_or_loading()
            }
        };

        Ok(&self.state)
    }

    fn exhausted_or_loading(&self) -> CapabilityState {
        if self.attempts >= self.policy.max_attempts {
            warn!(
                network = %self.network,
                attempts = self.attempts,
                "no signer answered the capability check"
            );
            CapabilityState::Missing
        } else {
            CapabilityState::Loading
        }
    }
}

/// Query `client` until the negotiator for `network` reaches a terminal state.
pub async fn negotiate<S>(
    client: &SignerClient<S>,
    network: Network,
    policy: RetryPolicy,
) -> CapabilitySnapshot
where
    S: ExternalSigner + Sync,
{
    let mut negotiator = CapabilityNegotiator::new(network, policy);
    run(client, &mut negotiator, |_, _| {}).await;
    CapabilitySnapshot {
        network,
        generation: 0,
        attempts: negotiator.attempts(),
        state: negotiator.into_state(),
    }
}

async fn run<S, F>(client: &SignerClient<S>, negotiator: &mut CapabilityNegotiator, mut observe: F)
where
    S: ExternalSigner + Sync,
    F: FnMut(u32, &CapabilityState),
{
    let network = negotiator.network();
    loop {
        let outcome = client.get_capabilities(network).await;
        if negotiator.on_reply(network, outcome).is_err() {
            return;
        }
        observe(negotiator.attempts(), negotiator.state());
        if negotiator.state().is_terminal() {
            return;
        }
        tokio::time::sleep(negotiator.policy.delay).await;
    }
}

/// Negotiation progress for one network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySnapshot {
    pub network: Network,
    /// Bumped on every network switch of a [`CapabilityWatcher`].
    pub generation: u64,
    pub attempts: u32,
    pub state: CapabilityState,
}

impl CapabilitySnapshot {
    /// Gate a flow on `network` and `capability`; a snapshot of another network never passes.
    pub fn require(&self, network: Network, capability: &Capability) -> Result<(), SwapError> {
        if self.network != network {
            return Err(CapabilityError::StaleNetwork {
                current: network,
                reply: self.network,
            }
            .into());
        }
        self.state.require(capability)
    }
}

/// Background negotiation that follows the selected network.
///
/// Switching networks aborts the running loop and starts a fresh one. A loop only publishes
/// while its generation is current, so replies of an aborted loop never land.
pub struct CapabilityWatcher<S> {
    client: Arc<SignerClient<S>>,
    policy: RetryPolicy,
    state_tx: Arc<watch::Sender<CapabilitySnapshot>>,
    state_rx: watch::Receiver<CapabilitySnapshot>,
    task: JoinHandle<()>,
}

impl<S> CapabilityWatcher<S>
where
    S: ExternalSigner + Send + Sync + 'static,
{
    /// Start negotiating on `network`. Must be called inside a tokio runtime.
    pub fn spawn(client: Arc<SignerClient<S>>, network: Network, policy: RetryPolicy) -> Self {
        let (state_tx, state_rx) = watch::channel(CapabilitySnapshot {
            network,
            generation: 0,
            attempts: 0,
            state: CapabilityState::Loading,
        });
        let state_tx = Arc::new(state_tx);
        let task = Self::start(&client, policy, &state_tx, network, 0);

        Self {
            client,
            policy,
            state_tx,
            state_rx,
            task,
        }
    }

    fn start(
        client: &Arc<SignerClient<S>>,
        policy: RetryPolicy,
        state_tx: &Arc<watch::Sender<CapabilitySnapshot>>,
        network: Network,
        generation: u64,
    ) -> JoinHandle<()> {
        let client = Arc::clone(client);
        let state_tx = Arc::clone(state_tx);

        tokio::spawn(async move {
            let mut negotiator = CapabilityNegotiator::new(network, policy);
            run(&client, &mut negotiator, |attempts, state| {
                state_tx.send_if_modified(|snapshot| {
                    if snapshot.generation != generation {
                        return false;
                    }
                    snapshot.attempts = attempts;
                    snapshot.state = state.clone();
                    true
                });
            })
            .await;
        })
    }

    #[must_use]
    pub fn snapshot(&self) -> CapabilitySnapshot {
        self.state_rx.borrow().clone()
    }

    #[must_use]
    pub fn state(&self) -> CapabilityState {
        self.state_rx.borrow().state.clone()
    }

    #[must_use]
    pub fn network(&self) -> Network {
        self.state_rx.borrow().network
    }

    /// Abort the current negotiation and restart at attempt 0 on `network`.
    pub fn switch_network(&mut self, network: Network) {
        self.task.abort();

        let generation = self.state_rx.borrow().generation + 1;
        self.state_tx.send_replace(CapabilitySnapshot {
            network,
            generation,
            attempts: 0,
            state: CapabilityState::Loading,
        });

        debug!(%network, generation, "restarting capability check");
        self.task = Self::start(&self.client, self.policy, &self.state_tx, network, generation);
    }

    /// Wait until the current network's negotiation is terminal.
    pub async fn wait_terminal(&mut self) -> CapabilityState {
        if let Ok(snapshot) = self
            .state_rx
            .wait_for(|snapshot| snapshot.state.is_terminal())
            .await
        {
            return snapshot.state.clone();
        }
        self.state()
    }
}

impl<S> Drop for CapabilityWatcher<S> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use serde_json::json;

    use super::*;
    use crate::fixtures::{FnSigner, requested_network};
    use crate::outcome::RawReply;

    fn available_on(attempt: u32) -> FnSigner {
        let calls = AtomicU32::new(0);
        FnSigner::new(move |_, _| {
            if calls.fetch_add(1, Ordering::SeqCst) + 1 >= attempt {
                FnSigner::ok(json!(["getAddresses", "signTransaction"]))
            } else {
                RawReply::Failed("no wallet injected".to_string())
            }
        })
    }

    #[test]
    fn negotiator_is_forward_only() {
        let mut negotiator = CapabilityNegotiator::new(Network::Testnet, RetryPolicy::default());
        negotiator
            .on_reply(Network::Testnet, SignerOutcome::UserCancelled)
            .expect("first reply");
        assert_eq!(negotiator.state(), &CapabilityState::Cancelled);

        let err = negotiator
            .on_reply(Network::Testnet, SignerOutcome::Finished(BTreeSet::new()))
            .expect_err("terminal");
        assert_eq!(err, CapabilityError::AlreadyTerminal("cancelled"));

        let err = negotiator
            .on_reply(Network::Mainnet, SignerOutcome::UserCancelled)
            .expect_err("other network");
        assert!(matches!(err, CapabilityError::StaleNetwork { .. }));

        negotiator.reset(Network::Mainnet);
        assert_eq!(negotiator.attempts(), 0);
        assert_eq!(negotiator.state(), &CapabilityState::Loading);
    }

    #[tokio::test(start_paused = true)]
    async fn loads_when_signer_appears_within_budget() {
        for k in [1, 7, 20] {
            let client = SignerClient::new(available_on(k));

            let snapshot = negotiate(&client, Network::Testnet, RetryPolicy::default()).await;

            assert!(matches!(snapshot.state, CapabilityState::Loaded(_)), "k = {k}");
            assert_eq!(snapshot.attempts, k);
            assert_eq!(client.signer().calls(), k);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn missing_after_exactly_max_attempts() {
        let client = SignerClient::new(available_on(21));
        let started = tokio::time::Instant::now();

        let snapshot = negotiate(&client, Network::Testnet, RetryPolicy::default()).await;

        assert_eq!(snapshot.state, CapabilityState::Missing);
        assert_eq!(snapshot.attempts, 20);
        assert_eq!(client.signer().calls(), 20);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(19 * 100), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(20 * 100), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn dismissal_cancels_without_retry() {
        let client = SignerClient::new(FnSigner::new(|_, _| {
            FnSigner::error(-32000, "User rejected request")
        }));

        let snapshot = negotiate(&client, Network::Mainnet, RetryPolicy::default()).await;

        assert_eq!(snapshot.state, CapabilityState::Cancelled);
        assert_eq!(client.signer().calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn network_switch_restarts_from_attempt_zero() {
        let testnet_calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&testnet_calls);
        let signer = FnSigner::new(move |_, params| match requested_network(params) {
            Some(Network::Mainnet) => FnSigner::ok(json!(["signTransaction"])),
            _ => {
                counter.fetch_add(1, Ordering::SeqCst);
                RawReply::Failed("wallet locked".to_string())
            }
        });
        let mut watcher = CapabilityWatcher::spawn(
            Arc::new(SignerClient::new(signer)),
            Network::Testnet,
            RetryPolicy::default(),
        );

        tokio::time::sleep(Duration::from_millis(450)).await;
        let before_switch = watcher.snapshot();
        assert_eq!(before_switch.state, CapabilityState::Loading);
        assert!(before_switch.attempts >= 4, "{before_switch:?}");
        assert_eq!(watcher.network(), Network::Testnet);

        watcher.switch_network(Network::Mainnet);
        let restarted = watcher.snapshot();
        assert_eq!(watcher.network(), Network::Mainnet);
        assert_eq!(restarted.generation, 1);
        assert_eq!(restarted.attempts, 0);

        let state = watcher.wait_terminal().await;
        assert_eq!(
            state,
            CapabilityState::Loaded(BTreeSet::from([Capability::SIGN_TRANSACTION]))
        );
        assert_eq!(watcher.snapshot().attempts, 1);

        let frozen = testnet_calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(testnet_calls.load(Ordering::SeqCst), frozen);
    }

    #[test]
    fn gating_requires_sign_transaction() {
        let loaded = CapabilityState::Loaded(BTreeSet::from([Capability::GET_ADDRESSES]));

        assert!(matches!(
            loaded.require(&Capability::SIGN_TRANSACTION),
            Err(SwapError::CapabilityUnsupported(_))
        ));
        assert!(matches!(
            CapabilityState::Missing.require(&Capability::SIGN_TRANSACTION),
            Err(SwapError::CapabilityMissing)
        ));
        assert!(matches!(
            CapabilityState::Loading.require(&Capability::SIGN_TRANSACTION),
            Err(SwapError::CapabilityPending)
        ));

        let snapshot = CapabilitySnapshot {
            network: Network::Testnet,
            generation: 0,
            attempts: 1,
            state: CapabilityState::Loaded(BTreeSet::from([Capability::SIGN_TRANSACTION])),
        };
        assert!(
            snapshot
                .require(Network::Testnet, &Capability::SIGN_TRANSACTION)
                .is_ok()
        );
        assert!(matches!(
            snapshot.require(Network::Mainnet, &Capability::SIGN_TRANSACTION),
            Err(SwapError::Capability(CapabilityError::StaleNetwork { .. }))
        ));
    }
}
