// Raffle VRF - Upkeep keeper
use solana_program::msg;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::{engine::RaffleEngine, error::RaffleError, state::RequestId};

/// Polls the raffle and performs upkeep whenever it is due
pub struct UpkeepKeeper {
    raffle: Arc<RaffleEngine>,
    period: Duration,
}

impl UpkeepKeeper {
    pub fn new(raffle: Arc<RaffleEngine>, period: Duration) -> Self {
        Self { raffle, period }
    }

    /// One poll. `Ok(None)` when nothing was due, including when another
    /// caller performed the upkeep between the check and the attempt.
    pub fn tick(&self) -> Result<Option<RequestId>, RaffleError> {
        let (needed, _) = self.raffle.check_upkeep();
        if !needed {
            return Ok(None);
        }
        match self.raffle.perform_upkeep() {
            Ok(request_id) => Ok(Some(request_id)),
            Err(RaffleError::UpkeepNotNeeded { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Polls every `period` until `shutdown` flips to true or is dropped.
    /// Returns the ids of the requests it issued.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Vec<RequestId> {
        let mut ticker = tokio::time::interval(self.period);
        let mut issued = Vec::new();
        loop {
            tokio::select! {
                _ = ticker.tick() => match self.tick() {
                    Ok(Some(request_id)) => issued.push(request_id),
                    Ok(None) => {}
                    Err(err) => msg!("Upkeep failed: {}", err),
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        issued
    }
}
