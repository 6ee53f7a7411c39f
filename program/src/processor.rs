// Raffle VRF - Instruction Processor
use solana_program::{msg, program_error::ProgramError, pubkey::Pubkey};
use std::sync::Arc;

use crate::{
    bank::Vault,
    coordinator::{FulfillmentReceipt, RandomnessCoordinator},
    engine::RaffleEngine,
    instruction::RaffleInstruction,
    state::{RequestId, SubscriptionId},
};

/// What an instruction produced
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProcessOutcome {
    Done,
    SubscriptionCreated(SubscriptionId),
    UpkeepChecked { needed: bool, perform_data: Vec<u8> },
    RandomnessRequested(RequestId),
    Fulfilled(FulfillmentReceipt),
}

/// Applies encoded instructions to a deployed raffle and its coordinator
pub struct Processor {
    coordinator: Arc<RandomnessCoordinator>,
    raffle: Arc<RaffleEngine>,
    vault: Vault,
}

impl Processor {
    pub fn new(coordinator: Arc<RandomnessCoordinator>, raffle: Arc<RaffleEngine>, vault: Vault) -> Self {
        Self {
            coordinator,
            raffle,
            vault,
        }
    }

    pub fn process(
        &self,
        signer: &Pubkey,
        instruction_data: &[u8],
    ) -> Result<ProcessOutcome, ProgramError> {
        let instruction = RaffleInstruction::unpack(instruction_data)?;

        match instruction {
            RaffleInstruction::CreateSubscription => {
                msg!("Instruction: Create Subscription");
                let subscription_id = self.coordinator.create_subscription(signer);
                Ok(ProcessOutcome::SubscriptionCreated(subscription_id))
            }
            RaffleInstruction::FundSubscription {
                subscription_id,
                amount,
            } => {
                msg!("Instruction: Fund Subscription");
                self.coordinator.fund_subscription(subscription_id, amount)?;
                Ok(ProcessOutcome::Done)
            }
            RaffleInstruction::AddConsumer {
                subscription_id,
                consumer,
            } => {
                msg!("Instruction: Add Consumer");
                self.coordinator.add_consumer(subscription_id, &consumer)?;
                Ok(ProcessOutcome::Done)
            }
            RaffleInstruction::RemoveConsumer {
                subscription_id,
                consumer,
            } => {
                msg!("Instruction: Remove Consumer");
                self.coordinator.remove_consumer(subscription_id, &consumer)?;
                Ok(ProcessOutcome::Done)
            }
            RaffleInstruction::EnterRaffle { amount } => {
                msg!("Instruction: Enter Raffle");
                self.process_enter_raffle(signer, amount)
            }
            RaffleInstruction::CheckUpkeep => {
                msg!("Instruction: Check Upkeep");
                let (needed, perform_data) = self.raffle.check_upkeep();
                Ok(ProcessOutcome::UpkeepChecked {
                    needed,
                    perform_data,
                })
            }
            RaffleInstruction::PerformUpkeep => {
                msg!("Instruction: Perform Upkeep");
                let request_id = self.raffle.perform_upkeep()?;
                Ok(ProcessOutcome::RandomnessRequested(request_id))
            }
            RaffleInstruction::FulfillRandomWords {
                request_id,
                random_words,
            } => {
                msg!("Instruction: Fulfill Random Words");
                let receipt = self
                    .coordinator
                    .fulfill_random_words(request_id, random_words)?;
                Ok(ProcessOutcome::Fulfilled(receipt))
            }
        }
    }

    /// Moves the entry from the signer into the vault and records the player
    fn process_enter_raffle(&self, signer: &Pubkey, amount: u64) -> Result<ProcessOutcome, ProgramError> {
        self.raffle
            .enter_with_payment(signer, amount, || self.vault.collect(signer, amount))?;
        msg!("Vault {} now holds {} lamports", self.vault.address(), self.vault.balance());
        Ok(ProcessOutcome::Done)
    }
}
