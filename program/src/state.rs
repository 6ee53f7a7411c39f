use arrayref::{array_mut_ref, array_ref, array_refs, mut_array_refs};
use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    clock::UnixTimestamp,
    program_error::ProgramError,
    program_pack::{IsInitialized, Pack, Sealed},
    pubkey::Pubkey,
};
use std::collections::BTreeSet;
use std::convert::TryFrom;

/// Correlation token binding a randomness request to its fulfillment
pub type RequestId = u64;
/// Identifier of an oracle subscription
pub type SubscriptionId = u64;

/// Reserved "no request" value, real ids start above it
pub const NO_REQUEST: RequestId = 0;

/// Status of a raffle round
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RaffleState {
    /// Accepting entries
    Open,
    /// Waiting for the oracle to deliver randomness
    Calculating,
}

impl TryFrom<u8> for RaffleState {
    type Error = &'static str;

    fn try_from(val: u8) -> Result<Self, Self::Error> {
        match val {
            0 => Ok(RaffleState::Open),
            1 => Ok(RaffleState::Calculating),
            _ => Err("Invalid raffle state"),
        }
    }
}

impl From<RaffleState> for u8 {
    fn from(state: RaffleState) -> Self {
        match state {
            RaffleState::Open => 0,
            RaffleState::Calculating => 1,
        }
    }
}

/// Raffle data, one per engine, reset in place every round
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct Raffle {
    /// Is the raffle initialized
    pub is_initialized: bool,
    /// Current round status
    pub state: RaffleState,
    /// Entrants in entry order, duplicates allowed
    pub players: Vec<Pubkey>,
    /// Lamports collected since the last payout
    pub pool_balance: u64,
    /// Minimum entry in lamports
    pub entrance_fee: u64,
    /// Seconds that must pass between rounds
    pub interval: u64,
    /// Time of construction or of the last payout
    pub last_timestamp: UnixTimestamp,
    /// Winner of the last resolved round
    pub recent_winner: Option<Pubkey>,
    /// Outstanding randomness request, set only while calculating
    pub pending_request_id: Option<RequestId>,
}

impl IsInitialized for Raffle {
    fn is_initialized(&self) -> bool {
        self.is_initialized
    }
}

impl Raffle {
    pub fn new(entrance_fee: u64, interval: u64, now: UnixTimestamp) -> Self {
        Self {
            is_initialized: true,
            state: RaffleState::Open,
            players: Vec::new(),
            pool_balance: 0,
            entrance_fee,
            interval,
            last_timestamp: now,
            recent_winner: None,
            pending_request_id: None,
        }
    }

    /// Seconds elapsed since the last reset, zero if the clock went backwards
    pub fn elapsed(&self, now: UnixTimestamp) -> u64 {
        now.saturating_sub(self.last_timestamp).max(0) as u64
    }

    /// Whether a new randomness request may be issued at `now`
    pub fn upkeep_needed(&self, now: UnixTimestamp) -> bool {
        self.state == RaffleState::Open
            && self.elapsed(now) >= self.interval
            && !self.players.is_empty()
            && self.pool_balance > 0
    }

    /// A pending request exists exactly while calculating
    pub fn is_consistent(&self) -> bool {
        match (self.state, self.pending_request_id) {
            (RaffleState::Open, None) => true,
            (RaffleState::Calculating, Some(id)) => id != NO_REQUEST,
            _ => false,
        }
    }

    /// Close the round in favour of `winner` and reopen for entries
    pub fn reset_round(&mut self, winner: Pubkey, now: UnixTimestamp) {
        self.recent_winner = Some(winner);
        self.players.clear();
        self.pool_balance = 0;
        self.last_timestamp = now;
        self.state = RaffleState::Open;
        self.pending_request_id = None;
    }
}

/// Oracle subscription: a funded, consumer-scoped authorization
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Subscription {
    pub id: SubscriptionId,
    /// Account that created the subscription and may cancel it
    pub owner: Pubkey,
    /// Lamports available to pay for fulfillments
    pub balance: u64,
    /// Number of requests issued against the subscription
    pub request_count: u64,
    /// Consumers allowed to request randomness
    pub consumers: BTreeSet<Pubkey>,
}

impl Subscription {
    pub fn new(id: SubscriptionId, owner: Pubkey) -> Self {
        Self {
            id,
            owner,
            ..Self::default()
        }
    }

    pub fn is_consumer(&self, consumer: &Pubkey) -> bool {
        self.consumers.contains(consumer)
    }
}

/// Randomness request record kept by the coordinator
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingRequest {
    pub request_id: RequestId,
    pub subscription_id: SubscriptionId,
    /// Consumer that will receive the callback
    pub consumer: Pubkey,
    pub num_words: u32,
    pub callback_gas_limit: u32,
    pub key_hash: [u8; 32],
    /// Set once a fulfillment has been attempted, never cleared
    pub fulfilled: bool,
    /// Outcome of the consumer callback, meaningful once fulfilled
    pub callback_succeeded: bool,
}

impl Sealed for PendingRequest {}

impl IsInitialized for PendingRequest {
    fn is_initialized(&self) -> bool {
        self.request_id != NO_REQUEST
    }
}

impl Pack for PendingRequest {
    const LEN: usize = 8 + 8 + 32 + 4 + 4 + 32 + 1 + 1;

    fn unpack_from_slice(src: &[u8]) -> Result<Self, ProgramError> {
        let src = array_ref![src, 0, PendingRequest::LEN];
        let (
            request_id,
            subscription_id,
            consumer,
            num_words,
            callback_gas_limit,
            key_hash,
            fulfilled,
            callback_succeeded,
        ) = array_refs![src, 8, 8, 32, 4, 4, 32, 1, 1];

        let flag = |byte: &[u8; 1]| match byte[0] {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(ProgramError::InvalidAccountData),
        };

        Ok(PendingRequest {
            request_id: u64::from_le_bytes(*request_id),
            subscription_id: u64::from_le_bytes(*subscription_id),
            consumer: Pubkey::new_from_array(*consumer),
            num_words: u32::from_le_bytes(*num_words),
            callback_gas_limit: u32::from_le_bytes(*callback_gas_limit),
            key_hash: *key_hash,
            fulfilled: flag(fulfilled)?,
            callback_succeeded: flag(callback_succeeded)?,
        })
    }

    fn pack_into_slice(&self, dst: &mut [u8]) {
        let dst = array_mut_ref![dst, 0, PendingRequest::LEN];
        let (
            request_id_dst,
            subscription_id_dst,
            consumer_dst,
            num_words_dst,
            callback_gas_limit_dst,
            key_hash_dst,
            fulfilled_dst,
            callback_succeeded_dst,
        ) = mut_array_refs![dst, 8, 8, 32, 4, 4, 32, 1, 1];

        *request_id_dst = self.request_id.to_le_bytes();
        *subscription_id_dst = self.subscription_id.to_le_bytes();
        consumer_dst.copy_from_slice(self.consumer.as_ref());
        *num_words_dst = self.num_words.to_le_bytes();
        *callback_gas_limit_dst = self.callback_gas_limit.to_le_bytes();
        key_hash_dst.copy_from_slice(&self.key_hash);
        fulfilled_dst[0] = self.fulfilled as u8;
        callback_succeeded_dst[0] = self.callback_succeeded as u8;
    }
}
