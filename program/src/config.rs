// Raffle VRF - Configuration
use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{msg, native_token::LAMPORTS_PER_SOL, pubkey::Pubkey};

use crate::{error::RaffleError, state::SubscriptionId};

/// Random words requested per round
pub const NUM_WORDS: u32 = 1;
/// Confirmations the oracle waits before answering
pub const REQUEST_CONFIRMATIONS: u16 = 3;
/// Amount a development subscription is funded with
pub const SUBSCRIPTION_FUND_AMOUNT: u64 = 100 * LAMPORTS_PER_SOL;

/// Networks on which the coordinator is deployed locally
pub const DEVELOPMENT_NETWORKS: [&str; 2] = ["localnet", "development"];

// Gas lane shared by the development and live presets
const DEFAULT_KEY_HASH: [u8; 32] = [
    0x78, 0x7d, 0x74, 0xca, 0xea, 0x10, 0xb2, 0xb3, 0x57, 0x79, 0x0d, 0x5b, 0x52, 0x47, 0xc2, 0xf6,
    0x3d, 0x1d, 0x91, 0x57, 0x2a, 0x98, 0x46, 0xf7, 0x80, 0x60, 0x6e, 0x4d, 0x95, 0x36, 0x77, 0xae,
];

pub fn is_development_network(name: &str) -> bool {
    DEVELOPMENT_NETWORKS.contains(&name)
}

/// Per-network deployment values. Anything optional must be supplied on
/// live networks and is created locally on development networks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetworkConfig {
    pub name: String,
    pub entrance_fee: Option<u64>,
    pub interval: Option<u64>,
    pub key_hash: Option<[u8; 32]>,
    pub callback_gas_limit: Option<u32>,
    /// Address of an already deployed coordinator
    pub coordinator: Option<Pubkey>,
    pub subscription_id: Option<SubscriptionId>,
}

impl NetworkConfig {
    pub fn development() -> Self {
        Self {
            name: "development".to_string(),
            entrance_fee: Some(LAMPORTS_PER_SOL / 1_000),
            interval: Some(30),
            key_hash: Some(DEFAULT_KEY_HASH),
            callback_gas_limit: Some(200_000),
            coordinator: None,
            subscription_id: None,
        }
    }

    /// Preset for a known network name
    pub fn for_network(name: &str) -> Option<Self> {
        if is_development_network(name) {
            return Some(Self {
                name: name.to_string(),
                ..Self::development()
            });
        }
        None
    }

    pub fn is_development(&self) -> bool {
        is_development_network(&self.name)
    }
}

/// Values the raffle engine is constructed with
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct RaffleConfig {
    /// Minimum entry in lamports
    pub entrance_fee: u64,
    /// Seconds between rounds
    pub interval: u64,
    pub subscription_id: SubscriptionId,
    /// Oracle gas lane
    pub key_hash: [u8; 32],
    /// Gas budget for the fulfillment callback
    pub callback_gas_limit: u32,
}

impl RaffleConfig {
    /// Builds the config from network values. Values are checked for
    /// presence only; `subscription_id` overrides the network's.
    pub fn from_network(
        network: &NetworkConfig,
        subscription_id: Option<SubscriptionId>,
    ) -> Result<Self, RaffleError> {
        let config = Self {
            entrance_fee: network
                .entrance_fee
                .ok_or(RaffleError::MissingConfig("entrance_fee"))?,
            interval: network.interval.ok_or(RaffleError::MissingConfig("interval"))?,
            subscription_id: subscription_id
                .or(network.subscription_id)
                .ok_or(RaffleError::MissingConfig("subscription_id"))?,
            key_hash: network.key_hash.ok_or(RaffleError::MissingConfig("key_hash"))?,
            callback_gas_limit: network
                .callback_gas_limit
                .ok_or(RaffleError::MissingConfig("callback_gas_limit"))?,
        };
        msg!(
            "Raffle config for {}: fee={} interval={} subscription={}",
            network.name,
            config.entrance_fee,
            config.interval,
            config.subscription_id
        );
        Ok(config)
    }
}

/// Pricing and limits of a randomness coordinator
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Flat lamports charged per fulfillment
    pub base_fee: u64,
    /// Lamports charged per unit of callback gas budget
    pub gas_price: u64,
    /// Balance a subscription needs before it may request
    pub minimum_request_balance: u64,
    pub max_num_words: u32,
    pub max_callback_gas_limit: u32,
    pub max_consumers: usize,
}

impl CoordinatorConfig {
    /// Pricing used by the local coordinator deployment
    pub fn development() -> Self {
        let base_fee = LAMPORTS_PER_SOL / 10;
        Self {
            base_fee,
            gas_price: 1_000,
            minimum_request_balance: base_fee,
            max_num_words: 500,
            max_callback_gas_limit: 2_500_000,
            max_consumers: 100,
        }
    }

    /// Lamports charged for fulfilling a request with this gas budget
    pub fn fulfillment_cost(&self, callback_gas_limit: u32) -> u64 {
        self.gas_price
            .saturating_mul(callback_gas_limit as u64)
            .saturating_add(self.base_fee)
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self::development()
    }
}
