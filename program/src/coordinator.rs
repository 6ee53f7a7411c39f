// Raffle VRF - Randomness coordinator
//
// Subscription registry plus request/fulfillment bookkeeping for an oracle
// that answers out of band. Requests are published on request queues; an
// oracle (or a test) later calls `fulfill_random_words`, which invokes the
// consumer that made the request exactly once per request id. A consumer id
// is bound to one live object at a time.
use borsh::{BorshDeserialize, BorshSerialize};
use parking_lot::Mutex;
use solana_program::{
    entrypoint::ProgramResult,
    msg,
    program_error::ProgramError,
    program_pack::Pack,
    pubkey::Pubkey,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::{
    config::CoordinatorConfig,
    error::OracleError,
    events::{EventLog, OracleEvent},
    state::{PendingRequest, RequestId, Subscription, SubscriptionId},
    vrf,
};

/// Parameters of a randomness request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RandomnessRequest {
    pub key_hash: [u8; 32],
    pub subscription_id: SubscriptionId,
    pub request_confirmations: u16,
    pub callback_gas_limit: u32,
    pub num_words: u32,
}

// Private allocation identifying one coordinator instance
#[derive(Debug, PartialEq, Eq)]
struct Seal;

/// Randomness delivered to a consumer.
///
/// Only a coordinator can build one. It carries that coordinator's seal, so
/// a consumer asks its own oracle (`RandomnessOracle::issued`) whether to
/// accept it instead of trusting the public `coordinator()` id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fulfillment {
    coordinator: Pubkey,
    seal: Arc<Seal>,
    request_id: RequestId,
    random_words: Vec<u64>,
}

impl Fulfillment {
    pub fn coordinator(&self) -> &Pubkey {
        &self.coordinator
    }

    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    pub fn random_words(&self) -> &[u64] {
        &self.random_words
    }
}

/// Something that requests randomness and is called back with it
pub trait RandomnessConsumer: Send + Sync {
    /// Identity the consumer is registered under on subscriptions
    fn consumer_id(&self) -> Pubkey;

    fn fulfill_random_words(&self, fulfillment: &Fulfillment) -> ProgramResult;
}

/// The requesting side of a coordinator, as seen by a consumer
pub trait RandomnessOracle: Send + Sync {
    fn id(&self) -> Pubkey;

    /// Records a request and returns its id. Must not call back into the
    /// consumer before returning.
    fn request_random_words(
        &self,
        consumer: &Arc<dyn RandomnessConsumer>,
        request: RandomnessRequest,
    ) -> Result<RequestId, OracleError>;

    /// Binds `consumer_id()` to `consumer`. Fails while the id is bound to
    /// another live object.
    fn register_consumer(&self, consumer: &Arc<dyn RandomnessConsumer>) -> Result<(), OracleError>;

    /// Whether `fulfillment` was built by this very oracle instance
    fn issued(&self, fulfillment: &Fulfillment) -> bool;
}

/// Published on request queues for every accepted request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestNotice {
    pub request_id: RequestId,
    pub subscription_id: SubscriptionId,
    pub consumer: Pubkey,
    pub num_words: u32,
}

/// Result of a successful fulfillment
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FulfillmentReceipt {
    pub request_id: RequestId,
    /// Lamports charged to the subscription
    pub payment: u64,
    pub random_words: Vec<u64>,
}

/// Persistable coordinator state
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct CoordinatorSnapshot {
    pub next_subscription_id: SubscriptionId,
    pub next_request_id: RequestId,
    pub subscriptions: Vec<Subscription>,
    /// `PendingRequest` records in packed form
    pub requests: Vec<Vec<u8>>,
}

#[derive(Default)]
struct Registry {
    // last id handed out, ids start at 1
    next_subscription_id: SubscriptionId,
    next_request_id: RequestId,
    subscriptions: BTreeMap<SubscriptionId, Subscription>,
    requests: BTreeMap<RequestId, PendingRequest>,
    // consumer object that made each unfulfilled request
    callbacks: BTreeMap<RequestId, Weak<dyn RandomnessConsumer>>,
}

pub struct RandomnessCoordinator {
    id: Pubkey,
    config: CoordinatorConfig,
    seal: Arc<Seal>,
    registry: Mutex<Registry>,
    consumers: Mutex<HashMap<Pubkey, Weak<dyn RandomnessConsumer>>>,
    request_queues: Mutex<Vec<UnboundedSender<RequestNotice>>>,
    events: EventLog<OracleEvent>,
}

impl RandomnessCoordinator {
    pub fn new(config: CoordinatorConfig) -> Self {
        Self::with_id(Pubkey::new_unique(), config)
    }

    pub fn with_id(id: Pubkey, config: CoordinatorConfig) -> Self {
        Self {
            id,
            config,
            seal: Arc::new(Seal),
            registry: Mutex::new(Registry::default()),
            consumers: Mutex::new(HashMap::new()),
            request_queues: Mutex::new(Vec::new()),
            events: EventLog::default(),
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn events(&self) -> &EventLog<OracleEvent> {
        &self.events
    }

    pub fn create_subscription(&self, owner: &Pubkey) -> SubscriptionId {
        let mut registry = self.registry.lock();
        registry.next_subscription_id += 1;
        let subscription_id = registry.next_subscription_id;
        registry
            .subscriptions
            .insert(subscription_id, Subscription::new(subscription_id, *owner));

        msg!("Subscription {} created by {}", subscription_id, owner);
        self.events.emit(OracleEvent::SubscriptionCreated {
            subscription_id,
            owner: *owner,
        });
        subscription_id
    }

    /// Adds lamports to a subscription, returns the new balance
    pub fn fund_subscription(
        &self,
        subscription_id: SubscriptionId,
        amount: u64,
    ) -> Result<u64, OracleError> {
        let mut registry = self.registry.lock();
        let subscription = registry
            .subscriptions
            .get_mut(&subscription_id)
            .ok_or(OracleError::UnknownSubscription(subscription_id))?;
        let old_balance = subscription.balance;
        subscription.balance = old_balance.saturating_add(amount);
        let new_balance = subscription.balance;

        msg!("Subscription {} funded: {} -> {}", subscription_id, old_balance, new_balance);
        self.events.emit(OracleEvent::SubscriptionFunded {
            subscription_id,
            old_balance,
            new_balance,
        });
        Ok(new_balance)
    }

    /// Authorizes `consumer` on a subscription. Adding twice is a no-op.
    pub fn add_consumer(
        &self,
        subscription_id: SubscriptionId,
        consumer: &Pubkey,
    ) -> Result<(), OracleError> {
        let mut registry = self.registry.lock();
        let subscription = registry
            .subscriptions
            .get_mut(&subscription_id)
            .ok_or(OracleError::UnknownSubscription(subscription_id))?;
        if subscription.is_consumer(consumer) {
            return Ok(());
        }
        if subscription.consumers.len() >= self.config.max_consumers {
            return Err(OracleError::TooManyConsumers(subscription_id));
        }
        subscription.consumers.insert(*consumer);

        msg!("Consumer {} added to subscription {}", consumer, subscription_id);
        self.events.emit(OracleEvent::ConsumerAdded {
            subscription_id,
            consumer: *consumer,
        });
        Ok(())
    }

    pub fn remove_consumer(
        &self,
        subscription_id: SubscriptionId,
        consumer: &Pubkey,
    ) -> Result<(), OracleError> {
        let mut registry = self.registry.lock();
        let subscription = registry
            .subscriptions
            .get_mut(&subscription_id)
            .ok_or(OracleError::UnknownSubscription(subscription_id))?;
        if !subscription.consumers.remove(consumer) {
            return Err(OracleError::UnauthorizedConsumer {
                subscription_id,
                consumer: *consumer,
            });
        }

        msg!("Consumer {} removed from subscription {}", consumer, subscription_id);
        self.events.emit(OracleEvent::ConsumerRemoved {
            subscription_id,
            consumer: *consumer,
        });
        Ok(())
    }

    /// Deletes a subscription and returns the balance owed to its owner
    pub fn cancel_subscription(
        &self,
        subscription_id: SubscriptionId,
        caller: &Pubkey,
    ) -> Result<u64, OracleError> {
        let mut registry = self.registry.lock();
        let subscription = registry
            .subscriptions
            .get(&subscription_id)
            .ok_or(OracleError::UnknownSubscription(subscription_id))?;
        if subscription.owner != *caller {
            return Err(OracleError::MustBeSubOwner);
        }
        if Self::has_unfulfilled(&registry, subscription_id) {
            return Err(OracleError::PendingRequestExists(subscription_id));
        }
        let refunded = registry
            .subscriptions
            .remove(&subscription_id)
            .map(|subscription| subscription.balance)
            .unwrap_or(0);

        msg!("Subscription {} canceled, refunding {}", subscription_id, refunded);
        self.events.emit(OracleEvent::SubscriptionCanceled {
            subscription_id,
            refunded,
        });
        Ok(refunded)
    }

    pub fn subscription(&self, subscription_id: SubscriptionId) -> Option<Subscription> {
        self.registry.lock().subscriptions.get(&subscription_id).cloned()
    }

    pub fn pending_request(&self, request_id: RequestId) -> Option<PendingRequest> {
        self.registry.lock().requests.get(&request_id).copied()
    }

    /// Whether any request against the subscription is still unfulfilled
    pub fn pending_request_exists(&self, subscription_id: SubscriptionId) -> bool {
        Self::has_unfulfilled(&self.registry.lock(), subscription_id)
    }

    fn has_unfulfilled(registry: &Registry, subscription_id: SubscriptionId) -> bool {
        registry
            .requests
            .values()
            .any(|request| request.subscription_id == subscription_id && !request.fulfilled)
    }

    /// New queue receiving a notice for every request accepted from now on
    pub fn subscribe_requests(&self) -> UnboundedReceiver<RequestNotice> {
        let (sender, receiver) = unbounded_channel();
        self.request_queues.lock().push(sender);
        receiver
    }

    /// Delivers randomness for `request_id` and calls the consumer back.
    ///
    /// An empty `random_words` derives the words from the request id,
    /// otherwise exactly `num_words` words must be supplied. The request is
    /// marked fulfilled before the callback runs and is never retried, even
    /// when the callback fails.
    pub fn fulfill_random_words(
        &self,
        request_id: RequestId,
        random_words: Vec<u64>,
    ) -> Result<FulfillmentReceipt, OracleError> {
        let (request, recorded, payment, random_words) = {
            let mut guard = self.registry.lock();
            let registry = &mut *guard;
            let request = registry
                .requests
                .get_mut(&request_id)
                .filter(|request| !request.fulfilled)
                .ok_or(OracleError::InvalidRequest(request_id))?;

            let random_words = if random_words.is_empty() {
                vrf::derive_random_words(request_id, request.num_words)
            } else if random_words.len() != request.num_words as usize {
                return Err(OracleError::InvalidRandomWords {
                    expected: request.num_words,
                    got: random_words.len(),
                });
            } else {
                random_words
            };

            let payment = self.config.fulfillment_cost(request.callback_gas_limit);
            let subscription = registry
                .subscriptions
                .get_mut(&request.subscription_id)
                .ok_or(OracleError::UnknownSubscription(request.subscription_id))?;
            if subscription.balance < payment {
                return Err(OracleError::InsufficientFunding {
                    subscription_id: subscription.id,
                    balance: subscription.balance,
                    required: payment,
                });
            }
            subscription.balance -= payment;
            request.fulfilled = true;
            let request = *request;
            let recorded = registry.callbacks.remove(&request_id);
            (request, recorded, payment, random_words)
        };

        let fulfillment = Fulfillment {
            coordinator: self.id,
            seal: self.seal.clone(),
            request_id,
            random_words,
        };
        // restored requests, or a requester that was since replaced, go to
        // whatever object now holds the consumer id
        let callback = recorded
            .and_then(|consumer| consumer.upgrade())
            .or_else(|| self.bound_consumer(&request.consumer));
        let outcome = match callback {
            Some(consumer) => consumer
                .fulfill_random_words(&fulfillment)
                .map_err(|source| OracleError::CallbackFailed { request_id, source }),
            None => Err(OracleError::ConsumerUnavailable {
                request_id,
                consumer: request.consumer,
            }),
        };

        let success = outcome.is_ok();
        if let Some(record) = self.registry.lock().requests.get_mut(&request_id) {
            record.callback_succeeded = success;
        }
        if let Err(err) = &outcome {
            msg!("Fulfillment of request {} failed: {}", request_id, err);
        }
        self.events.emit(OracleEvent::RandomWordsFulfilled {
            request_id,
            payment,
            success,
        });

        outcome.map(|()| FulfillmentReceipt {
            request_id,
            payment,
            random_words: fulfillment.random_words,
        })
    }

    fn bound_consumer(&self, consumer_id: &Pubkey) -> Option<Arc<dyn RandomnessConsumer>> {
        self.consumers.lock().get(consumer_id).and_then(Weak::upgrade)
    }

    pub fn snapshot(&self) -> CoordinatorSnapshot {
        let registry = self.registry.lock();
        let requests = registry
            .requests
            .values()
            .map(|request| {
                let mut packed = vec![0u8; PendingRequest::LEN];
                request.pack_into_slice(&mut packed);
                packed
            })
            .collect();
        CoordinatorSnapshot {
            next_subscription_id: registry.next_subscription_id,
            next_request_id: registry.next_request_id,
            subscriptions: registry.subscriptions.values().cloned().collect(),
            requests,
        }
    }

    /// Rebuilds a coordinator from a snapshot. Consumers must register
    /// again before their pending requests can be fulfilled.
    pub fn restore(
        id: Pubkey,
        config: CoordinatorConfig,
        snapshot: CoordinatorSnapshot,
    ) -> Result<Self, ProgramError> {
        let mut registry = Registry {
            next_subscription_id: snapshot.next_subscription_id,
            next_request_id: snapshot.next_request_id,
            ..Registry::default()
        };
        for subscription in snapshot.subscriptions {
            let subscription_id = subscription.id;
            if subscription_id == 0 || subscription_id > registry.next_subscription_id {
                msg!("Subscription {} is outside the id counter", subscription_id);
                return Err(ProgramError::InvalidAccountData);
            }
            if registry.subscriptions.insert(subscription_id, subscription).is_some() {
                msg!("Subscription {} appears twice", subscription_id);
                return Err(ProgramError::InvalidAccountData);
            }
        }
        for packed in &snapshot.requests {
            let request = PendingRequest::unpack(packed)?;
            let request_id = request.request_id;
            if request_id > registry.next_request_id {
                msg!("Request {} is ahead of the id counter", request_id);
                return Err(ProgramError::InvalidAccountData);
            }
            if registry.requests.insert(request_id, request).is_some() {
                msg!("Request {} appears twice", request_id);
                return Err(ProgramError::InvalidAccountData);
            }
        }

        let coordinator = Self::with_id(id, config);
        *coordinator.registry.lock() = registry;
        Ok(coordinator)
    }
}

impl RandomnessOracle for RandomnessCoordinator {
    fn id(&self) -> Pubkey {
        self.id
    }

    fn request_random_words(
        &self,
        consumer: &Arc<dyn RandomnessConsumer>,
        request: RandomnessRequest,
    ) -> Result<RequestId, OracleError> {
        let consumer_id = consumer.consumer_id();
        if request.num_words > self.config.max_num_words {
            return Err(OracleError::NumWordsTooBig {
                requested: request.num_words,
                max: self.config.max_num_words,
            });
        }
        if request.callback_gas_limit > self.config.max_callback_gas_limit {
            return Err(OracleError::GasLimitTooBig {
                requested: request.callback_gas_limit,
                max: self.config.max_callback_gas_limit,
            });
        }

        self.register_consumer(consumer)?;
        let mut guard = self.registry.lock();
        let registry = &mut *guard;
        let subscription = registry
            .subscriptions
            .get_mut(&request.subscription_id)
            .ok_or(OracleError::UnknownSubscription(request.subscription_id))?;
        if !subscription.is_consumer(&consumer_id) {
            return Err(OracleError::UnauthorizedConsumer {
                subscription_id: request.subscription_id,
                consumer: consumer_id,
            });
        }
        if subscription.balance < self.config.minimum_request_balance {
            return Err(OracleError::InsufficientFunding {
                subscription_id: request.subscription_id,
                balance: subscription.balance,
                required: self.config.minimum_request_balance,
            });
        }
        subscription.request_count += 1;

        registry.next_request_id += 1;
        let request_id = registry.next_request_id;
        registry.requests.insert(
            request_id,
            PendingRequest {
                request_id,
                subscription_id: request.subscription_id,
                consumer: consumer_id,
                num_words: request.num_words,
                callback_gas_limit: request.callback_gas_limit,
                key_hash: request.key_hash,
                fulfilled: false,
                callback_succeeded: false,
            },
        );
        registry.callbacks.insert(request_id, Arc::downgrade(consumer));
        drop(guard);

        msg!(
            "Randomness requested: id={} subscription={} consumer={}",
            request_id,
            request.subscription_id,
            consumer_id
        );
        self.events.emit(OracleEvent::RandomWordsRequested {
            key_hash: request.key_hash,
            request_id,
            subscription_id: request.subscription_id,
            num_words: request.num_words,
            callback_gas_limit: request.callback_gas_limit,
            sender: consumer_id,
        });

        let notice = RequestNotice {
            request_id,
            subscription_id: request.subscription_id,
            consumer: consumer_id,
            num_words: request.num_words,
        };
        self.request_queues
            .lock()
            .retain(|queue| queue.send(notice.clone()).is_ok());
        Ok(request_id)
    }

    fn register_consumer(&self, consumer: &Arc<dyn RandomnessConsumer>) -> Result<(), OracleError> {
        let consumer_id = consumer.consumer_id();
        let mut consumers = self.consumers.lock();
        if let Some(bound) = consumers.get(&consumer_id).and_then(Weak::upgrade) {
            if same_object(&bound, consumer) {
                return Ok(());
            }
            msg!("Consumer id {} is already bound to another object", consumer_id);
            return Err(OracleError::ConsumerIdInUse(consumer_id));
        }
        consumers.insert(consumer_id, Arc::downgrade(consumer));
        Ok(())
    }

    fn issued(&self, fulfillment: &Fulfillment) -> bool {
        Arc::ptr_eq(&fulfillment.seal, &self.seal)
    }
}

// Compares allocations only, vtable pointers may differ between casts
fn same_object(a: &Arc<dyn RandomnessConsumer>, b: &Arc<dyn RandomnessConsumer>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}
