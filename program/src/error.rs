// Raffle VRF - Errors
use solana_program::{program_error::ProgramError, pubkey::Pubkey};
use thiserror::Error;

use crate::state::{RequestId, SubscriptionId};

/// How a caller is expected to react to a failure
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    /// Caller error, nothing changed, retry with corrected input
    InputRejected,
    /// Wait and recheck later
    PreconditionFailed,
    /// Mismatched or foreign request/consumer, likely an integration bug
    ProtocolViolation,
    /// Subscription underfunded, operator must fund it
    ResourceExhaustion,
    /// Payout could not complete, everything was rolled back
    FatalDuringPayout,
}

/// Errors returned by the raffle engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RaffleError {
    #[error("Entry of {amount} lamports is below the entrance fee of {entrance_fee}")]
    NotEnoughFunds { amount: u64, entrance_fee: u64 },

    #[error("Raffle is not open")]
    NotOpen,

    #[error("Upkeep not needed (balance={balance}, players={players}, state={state})")]
    UpkeepNotNeeded { balance: u64, players: u64, state: u8 },

    #[error("Fulfillment does not match a pending request (request {0})")]
    InvalidRequest(RequestId),

    #[error("Only the randomness coordinator can fulfill requests")]
    OnlyCoordinatorCanFulfill,

    #[error("Prize transfer failed")]
    TransferFailed,

    #[error("Randomness request failed: {0}")]
    RandomnessRequestFailed(#[from] OracleError),

    #[error("Entry payment failed: {0}")]
    EntryPaymentFailed(ProgramError),

    #[error("No player at index {0}")]
    PlayerIndexOutOfRange(usize),

    #[error("Missing configuration value: {0}")]
    MissingConfig(&'static str),
}

impl RaffleError {
    /// Stable numeric code, used for `ProgramError::Custom`
    pub fn code(&self) -> u32 {
        match self {
            RaffleError::NotEnoughFunds { .. } => 0,
            RaffleError::NotOpen => 1,
            RaffleError::UpkeepNotNeeded { .. } => 2,
            RaffleError::InvalidRequest(_) => 3,
            RaffleError::OnlyCoordinatorCanFulfill => 4,
            RaffleError::TransferFailed => 5,
            RaffleError::RandomnessRequestFailed(_) => 6,
            RaffleError::EntryPaymentFailed(_) => 7,
            RaffleError::PlayerIndexOutOfRange(_) => 8,
            RaffleError::MissingConfig(_) => 9,
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            RaffleError::NotEnoughFunds { .. }
            | RaffleError::NotOpen
            | RaffleError::EntryPaymentFailed(_)
            | RaffleError::PlayerIndexOutOfRange(_)
            | RaffleError::MissingConfig(_) => ErrorClass::InputRejected,
            RaffleError::UpkeepNotNeeded { .. } => ErrorClass::PreconditionFailed,
            RaffleError::InvalidRequest(_) | RaffleError::OnlyCoordinatorCanFulfill => {
                ErrorClass::ProtocolViolation
            }
            RaffleError::TransferFailed => ErrorClass::FatalDuringPayout,
            RaffleError::RandomnessRequestFailed(inner) => inner.class(),
        }
    }
}

impl From<RaffleError> for ProgramError {
    fn from(e: RaffleError) -> Self {
        ProgramError::Custom(e.code())
    }
}

/// Errors returned by the randomness coordinator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    #[error("Subscription {0} does not exist")]
    UnknownSubscription(SubscriptionId),

    #[error("Consumer {consumer} is not registered on subscription {subscription_id}")]
    UnauthorizedConsumer {
        subscription_id: SubscriptionId,
        consumer: Pubkey,
    },

    #[error("Subscription {subscription_id} holds {balance} lamports, {required} required")]
    InsufficientFunding {
        subscription_id: SubscriptionId,
        balance: u64,
        required: u64,
    },

    #[error("No unfulfilled request with id {0}")]
    InvalidRequest(RequestId),

    #[error("Expected {expected} random words, got {got}")]
    InvalidRandomWords { expected: u32, got: usize },

    #[error("Requested {requested} words, at most {max} allowed")]
    NumWordsTooBig { requested: u32, max: u32 },

    #[error("Callback gas limit {requested} exceeds {max}")]
    GasLimitTooBig { requested: u32, max: u32 },

    #[error("Subscription {0} already has the maximum number of consumers")]
    TooManyConsumers(SubscriptionId),

    #[error("Only the subscription owner may do this")]
    MustBeSubOwner,

    #[error("Subscription {0} has unfulfilled requests")]
    PendingRequestExists(SubscriptionId),

    #[error("Consumer callback for request {request_id} failed: {source}")]
    CallbackFailed {
        request_id: RequestId,
        source: ProgramError,
    },

    #[error("Consumer {consumer} for request {request_id} is no longer reachable")]
    ConsumerUnavailable {
        request_id: RequestId,
        consumer: Pubkey,
    },

    #[error("Consumer id {0} is bound to another live consumer")]
    ConsumerIdInUse(Pubkey),
}

impl OracleError {
    /// Stable numeric code, offset so it never overlaps `RaffleError`
    pub fn code(&self) -> u32 {
        100 + match self {
            OracleError::UnknownSubscription(_) => 0,
            OracleError::UnauthorizedConsumer { .. } => 1,
            OracleError::InsufficientFunding { .. } => 2,
            OracleError::InvalidRequest(_) => 3,
            OracleError::InvalidRandomWords { .. } => 4,
            OracleError::NumWordsTooBig { .. } => 5,
            OracleError::GasLimitTooBig { .. } => 6,
            OracleError::TooManyConsumers(_) => 7,
            OracleError::MustBeSubOwner => 8,
            OracleError::PendingRequestExists(_) => 9,
            OracleError::CallbackFailed { .. } => 10,
            OracleError::ConsumerUnavailable { .. } => 11,
            OracleError::ConsumerIdInUse(_) => 12,
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            OracleError::InvalidRandomWords { .. }
            | OracleError::NumWordsTooBig { .. }
            | OracleError::GasLimitTooBig { .. } => ErrorClass::InputRejected,
            OracleError::PendingRequestExists(_) => ErrorClass::PreconditionFailed,
            OracleError::InsufficientFunding { .. } => ErrorClass::ResourceExhaustion,
            OracleError::UnknownSubscription(_)
            | OracleError::UnauthorizedConsumer { .. }
            | OracleError::InvalidRequest(_)
            | OracleError::TooManyConsumers(_)
            | OracleError::MustBeSubOwner
            | OracleError::CallbackFailed { .. }
            | OracleError::ConsumerUnavailable { .. }
            | OracleError::ConsumerIdInUse(_) => ErrorClass::ProtocolViolation,
        }
    }
}

impl From<OracleError> for ProgramError {
    fn from(e: OracleError) -> Self {
        ProgramError::Custom(e.code())
    }
}
