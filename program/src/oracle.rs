// Raffle VRF - Oracle worker
//
// Answers randomness requests out of band: notices arrive on the
// coordinator's request queue and are fulfilled after an optional delay.
use solana_program::msg;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc::UnboundedReceiver, watch};

use crate::coordinator::{RandomnessCoordinator, RequestNotice};

/// Supplies the words an oracle answers a request with
pub trait RandomnessSource: Send {
    /// An empty result lets the coordinator derive the words itself
    fn random_words(&mut self, notice: &RequestNotice) -> Vec<u64>;
}

/// Always defers to the coordinator's derived words
#[derive(Clone, Copy, Debug, Default)]
pub struct DerivedRandomness;

impl RandomnessSource for DerivedRandomness {
    fn random_words(&mut self, _notice: &RequestNotice) -> Vec<u64> {
        Vec::new()
    }
}

/// Hands out pre-chosen words in order, then falls back to derived ones
#[derive(Clone, Debug, Default)]
pub struct ScriptedRandomness {
    words: VecDeque<u64>,
}

impl ScriptedRandomness {
    pub fn new(words: impl IntoIterator<Item = u64>) -> Self {
        Self {
            words: words.into_iter().collect(),
        }
    }
}

impl RandomnessSource for ScriptedRandomness {
    fn random_words(&mut self, notice: &RequestNotice) -> Vec<u64> {
        let wanted = notice.num_words as usize;
        if self.words.len() < wanted {
            return Vec::new();
        }
        self.words.drain(..wanted).collect()
    }
}

/// Counts of what a worker did
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OracleReport {
    pub fulfilled: usize,
    pub failed: usize,
}

pub struct OracleWorker<S> {
    coordinator: Arc<RandomnessCoordinator>,
    requests: UnboundedReceiver<RequestNotice>,
    source: S,
    delay: Duration,
    report: OracleReport,
}

impl<S: RandomnessSource> OracleWorker<S> {
    /// Subscribes to the coordinator's request queue
    pub fn new(coordinator: Arc<RandomnessCoordinator>, source: S) -> Self {
        let requests = coordinator.subscribe_requests();
        Self {
            coordinator,
            requests,
            source,
            delay: Duration::ZERO,
            report: OracleReport::default(),
        }
    }

    /// Waits this long before answering each request
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Answers everything already queued, without waiting
    pub fn process_pending(&mut self) -> OracleReport {
        while let Ok(notice) = self.requests.try_recv() {
            self.answer(&notice);
        }
        self.report
    }

    /// Answers requests until `shutdown` flips to true or is dropped
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> OracleReport {
        loop {
            tokio::select! {
                notice = self.requests.recv() => {
                    let Some(notice) = notice else { break };
                    if !self.delay.is_zero() {
                        tokio::time::sleep(self.delay).await;
                    }
                    self.answer(&notice);
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        self.report
    }

    fn answer(&mut self, notice: &RequestNotice) {
        let random_words = self.source.random_words(notice);
        match self
            .coordinator
            .fulfill_random_words(notice.request_id, random_words)
        {
            Ok(receipt) => {
                msg!(
                    "Oracle fulfilled request {} for {} lamports",
                    receipt.request_id,
                    receipt.payment
                );
                self.report.fulfilled += 1;
            }
            Err(err) => {
                msg!("Oracle could not fulfill request {}: {}", notice.request_id, err);
                self.report.failed += 1;
            }
        }
    }
}
