// Raffle VRF - Raffle engine
use borsh::BorshDeserialize;
use parking_lot::Mutex;
use solana_program::{
    clock::UnixTimestamp,
    entrypoint::ProgramResult,
    msg,
    program_error::ProgramError,
    program_pack::IsInitialized,
    pubkey::Pubkey,
};
use std::sync::Arc;

use crate::{
    bank::Treasury,
    clock::TimeSource,
    config::{RaffleConfig, NUM_WORDS, REQUEST_CONFIRMATIONS},
    coordinator::{Fulfillment, RandomnessConsumer, RandomnessOracle, RandomnessRequest},
    error::{OracleError, RaffleError},
    events::{EventLog, RaffleEvent},
    state::{Raffle, RaffleState, RequestId, SubscriptionId},
    transaction::Transaction,
    vrf,
};

/// Owns the raffle and drives it through its rounds.
///
/// All raffle data sits behind one lock; every operation runs start to
/// finish while holding it, so callers never see a partial entry, upkeep or
/// payout.
pub struct RaffleEngine {
    id: Pubkey,
    config: RaffleConfig,
    raffle: Mutex<Raffle>,
    oracle: Arc<dyn RandomnessOracle>,
    treasury: Arc<dyn Treasury>,
    clock: Arc<dyn TimeSource>,
    events: EventLog<RaffleEvent>,
}

impl RaffleEngine {
    pub fn new(
        config: RaffleConfig,
        oracle: Arc<dyn RandomnessOracle>,
        treasury: Arc<dyn Treasury>,
        clock: Arc<dyn TimeSource>,
    ) -> Result<Arc<Self>, RaffleError> {
        Self::with_id(Pubkey::new_unique(), config, oracle, treasury, clock)
    }

    pub fn with_id(
        id: Pubkey,
        config: RaffleConfig,
        oracle: Arc<dyn RandomnessOracle>,
        treasury: Arc<dyn Treasury>,
        clock: Arc<dyn TimeSource>,
    ) -> Result<Arc<Self>, RaffleError> {
        let raffle = Raffle::new(config.entrance_fee, config.interval, clock.unix_timestamp());
        msg!(
            "Raffle {} initialized: fee={} interval={}",
            id,
            config.entrance_fee,
            config.interval
        );
        Ok(Self::assemble(id, config, raffle, oracle, treasury, clock)?)
    }

    /// Rebuilds an engine from `snapshot()` output, keeping any pending
    /// request so a late fulfillment still resolves the round. The engine
    /// the snapshot was taken from must be dropped first.
    pub fn restore(
        id: Pubkey,
        config: RaffleConfig,
        snapshot: &[u8],
        oracle: Arc<dyn RandomnessOracle>,
        treasury: Arc<dyn Treasury>,
        clock: Arc<dyn TimeSource>,
    ) -> Result<Arc<Self>, ProgramError> {
        let raffle = Raffle::try_from_slice(snapshot)
            .map_err(|err| ProgramError::BorshIoError(err.to_string()))?;
        if !raffle.is_initialized() {
            return Err(ProgramError::UninitializedAccount);
        }
        if !raffle.is_consistent() {
            msg!("Raffle snapshot has a pending request that does not match its state");
            return Err(ProgramError::InvalidAccountData);
        }
        if raffle.entrance_fee != config.entrance_fee || raffle.interval != config.interval {
            msg!("Raffle snapshot was taken with a different configuration");
            return Err(ProgramError::InvalidAccountData);
        }
        msg!(
            "Raffle {} restored: players={} pending={:?}",
            id,
            raffle.players.len(),
            raffle.pending_request_id
        );
        Ok(Self::assemble(id, config, raffle, oracle, treasury, clock)?)
    }

    fn assemble(
        id: Pubkey,
        config: RaffleConfig,
        raffle: Raffle,
        oracle: Arc<dyn RandomnessOracle>,
        treasury: Arc<dyn Treasury>,
        clock: Arc<dyn TimeSource>,
    ) -> Result<Arc<Self>, OracleError> {
        let engine = Arc::new(Self {
            id,
            config,
            raffle: Mutex::new(raffle),
            oracle,
            treasury,
            clock,
            events: EventLog::default(),
        });
        let consumer: Arc<dyn RandomnessConsumer> = engine.clone();
        engine.oracle.register_consumer(&consumer)?;
        Ok(engine)
    }

    /// Borsh encoding of the raffle data
    pub fn snapshot(&self) -> Result<Vec<u8>, ProgramError> {
        borsh::to_vec(&*self.raffle.lock()).map_err(|err| ProgramError::BorshIoError(err.to_string()))
    }

    pub fn id(&self) -> Pubkey {
        self.id
    }

    pub fn events(&self) -> &EventLog<RaffleEvent> {
        &self.events
    }

    /// Adds `payer` to the current round
    pub fn enter(&self, payer: &Pubkey, amount: u64) -> Result<(), RaffleError> {
        self.enter_with_payment(payer, amount, || Ok(()))
    }

    /// Like [`RaffleEngine::enter`], but `collect` moves the payment while
    /// the raffle is locked. If it fails the entry is not recorded.
    pub fn enter_with_payment<F>(
        &self,
        payer: &Pubkey,
        amount: u64,
        collect: F,
    ) -> Result<(), RaffleError>
    where
        F: FnOnce() -> ProgramResult,
    {
        if amount < self.config.entrance_fee {
            msg!(
                "Entry of {} lamports is below the fee of {}",
                amount,
                self.config.entrance_fee
            );
            return Err(RaffleError::NotEnoughFunds {
                amount,
                entrance_fee: self.config.entrance_fee,
            });
        }

        let mut raffle = self.raffle.lock();
        if raffle.state != RaffleState::Open {
            msg!("Raffle is not open");
            return Err(RaffleError::NotOpen);
        }
        let pool_balance = raffle
            .pool_balance
            .checked_add(amount)
            .ok_or(RaffleError::EntryPaymentFailed(ProgramError::ArithmeticOverflow))?;
        collect().map_err(RaffleError::EntryPaymentFailed)?;

        raffle.players.push(*payer);
        raffle.pool_balance = pool_balance;
        msg!("Player {} entered with {} lamports, pool={}", payer, amount, pool_balance);
        self.events.emit(RaffleEvent::Entered { player: *payer });
        Ok(())
    }

    /// Whether `perform_upkeep` would issue a request now. The payload is
    /// always empty.
    pub fn check_upkeep(&self) -> (bool, Vec<u8>) {
        let now = self.clock.unix_timestamp();
        (self.raffle.lock().upkeep_needed(now), Vec::new())
    }

    /// Closes entries and asks the oracle for one random word
    pub fn perform_upkeep(self: &Arc<Self>) -> Result<RequestId, RaffleError> {
        let now = self.clock.unix_timestamp();
        let mut raffle = self.raffle.lock();
        if !raffle.upkeep_needed(now) {
            msg!(
                "Upkeep not needed: balance={} players={} elapsed={}",
                raffle.pool_balance,
                raffle.players.len(),
                raffle.elapsed(now)
            );
            return Err(RaffleError::UpkeepNotNeeded {
                balance: raffle.pool_balance,
                players: raffle.players.len() as u64,
                state: raffle.state.into(),
            });
        }

        let consumer: Arc<dyn RandomnessConsumer> = self.clone();
        let request_id = self.oracle.request_random_words(
            &consumer,
            RandomnessRequest {
                key_hash: self.config.key_hash,
                subscription_id: self.config.subscription_id,
                request_confirmations: REQUEST_CONFIRMATIONS,
                callback_gas_limit: self.config.callback_gas_limit,
                num_words: NUM_WORDS,
            },
        )?;

        raffle.state = RaffleState::Calculating;
        raffle.pending_request_id = Some(request_id);
        msg!("Raffle calculating, waiting on request {}", request_id);
        self.events
            .emit(RaffleEvent::RandomnessRequested { request_id });
        Ok(request_id)
    }

    /// Picks and pays the winner for the pending request
    fn settle(&self, fulfillment: &Fulfillment) -> Result<Pubkey, RaffleError> {
        if !self.oracle.issued(fulfillment) {
            msg!("Fulfillment from foreign coordinator {}", fulfillment.coordinator());
            return Err(RaffleError::OnlyCoordinatorCanFulfill);
        }
        let request_id = fulfillment.request_id();

        let mut raffle = self.raffle.lock();
        if raffle.state != RaffleState::Calculating
            || raffle.pending_request_id != Some(request_id)
        {
            msg!(
                "Request {} does not match pending {:?}",
                request_id,
                raffle.pending_request_id
            );
            return Err(RaffleError::InvalidRequest(request_id));
        }
        let random_word = fulfillment
            .random_words()
            .first()
            .copied()
            .ok_or(RaffleError::InvalidRequest(request_id))?;
        let index = vrf::winner_index(random_word, raffle.players.len())
            .ok_or(RaffleError::InvalidRequest(request_id))?;
        let winner = raffle.players[index];
        let prize = raffle.pool_balance;
        let now = self.clock.unix_timestamp();

        // state is reset before the prize leaves, and restored if it cannot
        let mut round = Transaction::begin(&mut *raffle);
        round.reset_round(winner, now);
        if let Err(err) = self.treasury.pay_out(&winner, prize) {
            msg!("Payout of {} lamports to {} failed: {}", prize, winner, err);
            return Err(RaffleError::TransferFailed);
        }
        round.commit();

        msg!("Winner picked: {} (index {}) won {} lamports", winner, index, prize);
        self.events.emit(RaffleEvent::WinnerPicked { winner });
        Ok(winner)
    }

    pub fn entrance_fee(&self) -> u64 {
        self.config.entrance_fee
    }

    pub fn interval(&self) -> u64 {
        self.config.interval
    }

    pub fn subscription_id(&self) -> SubscriptionId {
        self.config.subscription_id
    }

    pub fn num_words(&self) -> u32 {
        NUM_WORDS
    }

    pub fn request_confirmations(&self) -> u16 {
        REQUEST_CONFIRMATIONS
    }

    pub fn raffle_state(&self) -> RaffleState {
        self.raffle.lock().state
    }

    pub fn recent_winner(&self) -> Option<Pubkey> {
        self.raffle.lock().recent_winner
    }

    pub fn player(&self, index: usize) -> Result<Pubkey, RaffleError> {
        self.raffle
            .lock()
            .players
            .get(index)
            .copied()
            .ok_or(RaffleError::PlayerIndexOutOfRange(index))
    }

    pub fn number_of_players(&self) -> usize {
        self.raffle.lock().players.len()
    }

    pub fn last_timestamp(&self) -> UnixTimestamp {
        self.raffle.lock().last_timestamp
    }

    pub fn pool_balance(&self) -> u64 {
        self.raffle.lock().pool_balance
    }

    pub fn pending_request_id(&self) -> Option<RequestId> {
        self.raffle.lock().pending_request_id
    }

    /// Copy of the whole raffle
    pub fn raffle(&self) -> Raffle {
        self.raffle.lock().clone()
    }
}

impl RandomnessConsumer for RaffleEngine {
    fn consumer_id(&self) -> Pubkey {
        self.id
    }

    fn fulfill_random_words(&self, fulfillment: &Fulfillment) -> ProgramResult {
        self.settle(fulfillment).map(|_| ()).map_err(ProgramError::from)
    }
}
