// Raffle VRF - Events
//
// Observations emitted by the engine and the coordinator for monitors and
// tests. Every event is also echoed to the program log.
use borsh::{BorshDeserialize, BorshSerialize};
use parking_lot::Mutex;
use solana_program::{msg, pubkey::Pubkey};
use std::{collections::VecDeque, fmt::Debug};

use crate::state::{RequestId, SubscriptionId};

/// Emitted by the raffle engine
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub enum RaffleEvent {
    /// A player joined the current round
    Entered { player: Pubkey },
    /// Upkeep issued a randomness request
    RandomnessRequested { request_id: RequestId },
    /// A round was resolved and paid out
    WinnerPicked { winner: Pubkey },
}

/// Emitted by the randomness coordinator
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub enum OracleEvent {
    SubscriptionCreated {
        subscription_id: SubscriptionId,
        owner: Pubkey,
    },
    SubscriptionFunded {
        subscription_id: SubscriptionId,
        old_balance: u64,
        new_balance: u64,
    },
    ConsumerAdded {
        subscription_id: SubscriptionId,
        consumer: Pubkey,
    },
    ConsumerRemoved {
        subscription_id: SubscriptionId,
        consumer: Pubkey,
    },
    SubscriptionCanceled {
        subscription_id: SubscriptionId,
        refunded: u64,
    },
    RandomWordsRequested {
        key_hash: [u8; 32],
        request_id: RequestId,
        subscription_id: SubscriptionId,
        num_words: u32,
        callback_gas_limit: u32,
        sender: Pubkey,
    },
    RandomWordsFulfilled {
        request_id: RequestId,
        payment: u64,
        success: bool,
    },
}

/// Events retained by a default log
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Bounded record of emitted events.
///
/// Holds at most `capacity` events; once full, each new event evicts the
/// oldest one. Long running monitors should `drain` regularly so nothing
/// is lost.
#[derive(Debug)]
pub struct EventLog<E> {
    events: Mutex<VecDeque<E>>,
    capacity: usize,
}

impl<E> Default for EventLog<E> {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }
}

impl<E> EventLog<E> {
    /// A log keeping the newest `capacity` events, at least one
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<E: Clone + Debug> EventLog<E> {
    pub fn emit(&self, event: E) {
        msg!("Event: {:?}", event);
        let mut events = self.events.lock();
        if events.len() == self.capacity {
            events.pop_front();
        }
        events.push_back(event);
    }

    /// Copy of the retained events, oldest first
    pub fn snapshot(&self) -> Vec<E> {
        self.events.lock().iter().cloned().collect()
    }

    /// Takes the retained events, leaving the log empty
    pub fn drain(&self) -> Vec<E> {
        self.events.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}
