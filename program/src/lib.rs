// Raffle VRF
// A recurring raffle resolved with randomness from a subscription-based
// oracle coordinator.

// Core modules
pub mod error;
pub mod state;
pub mod config;
pub mod events;
pub mod clock;
pub mod transaction;

// Raffle and oracle
pub mod bank;
pub mod coordinator;
pub mod engine;
pub mod vrf;

// Hosting
pub mod instruction;
pub mod processor;
pub mod oracle;
pub mod keeper;
pub mod deploy;

pub use coordinator::{RandomnessConsumer, RandomnessCoordinator, RandomnessOracle};
pub use engine::RaffleEngine;
pub use error::{ErrorClass, OracleError, RaffleError};
pub use state::{RaffleState, RequestId, SubscriptionId};
