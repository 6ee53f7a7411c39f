// Raffle VRF - Instructions
use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{program_error::ProgramError, pubkey::Pubkey};

use std::mem::size_of;

use crate::state::{RequestId, SubscriptionId};

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub enum RaffleInstruction {
    /// Create an oracle subscription owned by the signer
    CreateSubscription,

    /// Add lamports to a subscription
    FundSubscription {
        subscription_id: SubscriptionId,
        amount: u64,
    },

    /// Authorize a consumer on a subscription
    AddConsumer {
        subscription_id: SubscriptionId,
        consumer: Pubkey,
    },

    /// Revoke a consumer's authorization
    RemoveConsumer {
        subscription_id: SubscriptionId,
        consumer: Pubkey,
    },

    /// Enter the raffle, paying `amount` lamports from the signer
    EnterRaffle {
        /// Must be at least the entrance fee
        amount: u64,
    },

    /// Report whether upkeep is needed
    CheckUpkeep,

    /// Close entries and request randomness
    PerformUpkeep,

    /// Deliver randomness for a request; empty words are derived from the id
    FulfillRandomWords {
        request_id: RequestId,
        random_words: Vec<u64>,
    },
}

impl RaffleInstruction {
    /// Unpacks a byte buffer into a RaffleInstruction
    pub fn unpack(input: &[u8]) -> Result<Self, ProgramError> {
        Self::try_from_slice(input).map_err(|_| ProgramError::InvalidInstructionData)
    }

    /// Packs a RaffleInstruction into a byte buffer readable by `unpack`
    pub fn pack(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(size_of::<Self>());
        match self {
            Self::CreateSubscription => buf.push(0),
            Self::FundSubscription {
                subscription_id,
                amount,
            } => {
                buf.push(1);
                buf.extend_from_slice(&subscription_id.to_le_bytes());
                buf.extend_from_slice(&amount.to_le_bytes());
            }
            Self::AddConsumer {
                subscription_id,
                consumer,
            } => {
                buf.push(2);
                buf.extend_from_slice(&subscription_id.to_le_bytes());
                buf.extend_from_slice(consumer.as_ref());
            }
            Self::RemoveConsumer {
                subscription_id,
                consumer,
            } => {
                buf.push(3);
                buf.extend_from_slice(&subscription_id.to_le_bytes());
                buf.extend_from_slice(consumer.as_ref());
            }
            Self::EnterRaffle { amount } => {
                buf.push(4);
                buf.extend_from_slice(&amount.to_le_bytes());
            }
            Self::CheckUpkeep => buf.push(5),
            Self::PerformUpkeep => buf.push(6),
            Self::FulfillRandomWords {
                request_id,
                random_words,
            } => {
                buf.push(7);
                buf.extend_from_slice(&request_id.to_le_bytes());
                // u32 length prefix, as borsh writes vectors
                buf.extend_from_slice(&(random_words.len() as u32).to_le_bytes());
                for word in random_words {
                    buf.extend_from_slice(&word.to_le_bytes());
                }
            }
        }
        buf
    }
}

pub fn create_subscription() -> Vec<u8> {
    RaffleInstruction::CreateSubscription.pack()
}

pub fn fund_subscription(subscription_id: SubscriptionId, amount: u64) -> Vec<u8> {
    RaffleInstruction::FundSubscription {
        subscription_id,
        amount,
    }
    .pack()
}

pub fn add_consumer(subscription_id: SubscriptionId, consumer: &Pubkey) -> Vec<u8> {
    RaffleInstruction::AddConsumer {
        subscription_id,
        consumer: *consumer,
    }
    .pack()
}

pub fn remove_consumer(subscription_id: SubscriptionId, consumer: &Pubkey) -> Vec<u8> {
    RaffleInstruction::RemoveConsumer {
        subscription_id,
        consumer: *consumer,
    }
    .pack()
}

pub fn enter_raffle(amount: u64) -> Vec<u8> {
    RaffleInstruction::EnterRaffle { amount }.pack()
}

pub fn check_upkeep() -> Vec<u8> {
    RaffleInstruction::CheckUpkeep.pack()
}

pub fn perform_upkeep() -> Vec<u8> {
    RaffleInstruction::PerformUpkeep.pack()
}

pub fn fulfill_random_words(request_id: RequestId, random_words: Vec<u64>) -> Vec<u8> {
    RaffleInstruction::FulfillRandomWords {
        request_id,
        random_words,
    }
    .pack()
}
