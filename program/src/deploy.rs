// Raffle VRF - Deployment
//
// Development networks get their own coordinator and a funded subscription
// with the raffle registered as consumer. On live networks the coordinator
// and subscription already exist and the operator registers the consumer.
use solana_program::{entrypoint::ProgramResult, msg, program_error::ProgramError, pubkey::Pubkey};
use std::sync::Arc;

use crate::{
    bank::{Bank, Treasury, Vault},
    clock::TimeSource,
    config::{CoordinatorConfig, NetworkConfig, RaffleConfig, SUBSCRIPTION_FUND_AMOUNT},
    coordinator::{RandomnessCoordinator, RandomnessOracle},
    engine::RaffleEngine,
    error::RaffleError,
    processor::Processor,
    state::SubscriptionId,
};

pub struct LocalDeployment {
    pub network: NetworkConfig,
    /// Account that owns the subscription
    pub deployer: Pubkey,
    pub bank: Arc<Bank>,
    pub vault: Vault,
    pub coordinator: Arc<RandomnessCoordinator>,
    pub subscription_id: SubscriptionId,
    pub raffle: Arc<RaffleEngine>,
    pub processor: Processor,
}

impl LocalDeployment {
    /// Deploys everything on a development network
    pub fn deploy(network: &NetworkConfig, clock: Arc<dyn TimeSource>) -> Result<Self, RaffleError> {
        Self::deploy_with(network, CoordinatorConfig::development(), clock)
    }

    pub fn deploy_with(
        network: &NetworkConfig,
        coordinator_config: CoordinatorConfig,
        clock: Arc<dyn TimeSource>,
    ) -> Result<Self, RaffleError> {
        if !network.is_development() {
            msg!("{} is not a development network, attach to its coordinator instead", network.name);
            return Err(RaffleError::MissingConfig("coordinator"));
        }
        msg!("Development network detected! Deploying coordinator...");
        let deployer = Pubkey::new_unique();
        let coordinator = Arc::new(RandomnessCoordinator::new(coordinator_config));
        let subscription_id = coordinator.create_subscription(&deployer);
        coordinator.fund_subscription(subscription_id, SUBSCRIPTION_FUND_AMOUNT)?;

        let deployment = Self::assemble(network, deployer, coordinator, Some(subscription_id), clock)?;
        deployment
            .coordinator
            .add_consumer(deployment.subscription_id, &deployment.raffle.id())?;
        Ok(deployment)
    }

    /// Deploys the raffle against an existing coordinator. The network must
    /// name that coordinator and a subscription on it; registering the
    /// raffle as consumer is left to the subscription owner.
    pub fn attach(
        network: &NetworkConfig,
        coordinator: Arc<RandomnessCoordinator>,
        clock: Arc<dyn TimeSource>,
    ) -> Result<Self, RaffleError> {
        let expected = network
            .coordinator
            .ok_or(RaffleError::MissingConfig("coordinator"))?;
        if expected != coordinator.id() {
            msg!("Configured coordinator {} but got {}", expected, coordinator.id());
            return Err(RaffleError::MissingConfig("coordinator"));
        }
        let deployer = Pubkey::new_unique();
        Self::assemble(network, deployer, coordinator, None, clock)
    }

    fn assemble(
        network: &NetworkConfig,
        deployer: Pubkey,
        coordinator: Arc<RandomnessCoordinator>,
        subscription_id: Option<SubscriptionId>,
        clock: Arc<dyn TimeSource>,
    ) -> Result<Self, RaffleError> {
        let config = RaffleConfig::from_network(network, subscription_id)?;
        let bank = Arc::new(Bank::new());
        let vault = Vault::new(bank.clone(), Pubkey::new_unique());

        let oracle: Arc<dyn RandomnessOracle> = coordinator.clone();
        let treasury: Arc<dyn Treasury> = Arc::new(vault.clone());
        let subscription_id = config.subscription_id;
        let raffle = RaffleEngine::new(config, oracle, treasury, clock)?;
        let processor = Processor::new(coordinator.clone(), raffle.clone(), vault.clone());
        msg!("Raffle {} deployed on {}", raffle.id(), network.name);

        Ok(Self {
            network: network.clone(),
            deployer,
            bank,
            vault,
            coordinator,
            subscription_id,
            raffle,
            processor,
        })
    }

    /// Creates an account holding `lamports`
    pub fn new_player(&self, lamports: u64) -> Result<Pubkey, ProgramError> {
        let player = Pubkey::new_unique();
        self.bank.airdrop(&player, lamports)?;
        Ok(player)
    }

    /// Sends a cancelled subscription's refund back to the deployer
    pub fn cancel_subscription(&self) -> ProgramResult {
        let refunded = self
            .coordinator
            .cancel_subscription(self.subscription_id, &self.deployer)?;
        self.bank.airdrop(&self.deployer, refunded)
    }
}
