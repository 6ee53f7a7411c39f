use raffle_vrf::{
    bank::{Bank, Treasury, Vault},
    clock::{ManualClock, TimeSource},
    config::{self, CoordinatorConfig, NetworkConfig, RaffleConfig},
    coordinator::{RandomnessCoordinator, RandomnessOracle},
    deploy::LocalDeployment,
    events::{EventLog, RaffleEvent, DEFAULT_EVENT_CAPACITY},
    instruction::{self, RaffleInstruction},
    state::{PendingRequest, Raffle, RaffleState, NO_REQUEST},
    transaction::Transaction,
    vrf, OracleError, RaffleError,
};
use solana_program::{
    clock::Clock,
    program_error::ProgramError,
    program_pack::{IsInitialized, Pack},
    pubkey::Pubkey,
};
use std::sync::Arc;

const START: i64 = 1_700_000_000;

fn sample_request() -> PendingRequest {
    PendingRequest {
        request_id: 9,
        subscription_id: 2,
        consumer: Pubkey::new_unique(),
        num_words: 1,
        callback_gas_limit: 200_000,
        key_hash: [3u8; 32],
        fulfilled: true,
        callback_succeeded: false,
    }
}

#[test]
fn test_pending_request_pack() {
    let request = sample_request();
    let mut packed = vec![0u8; PendingRequest::LEN];
    PendingRequest::pack(request, &mut packed).unwrap();

    assert_eq!(PendingRequest::LEN, 90);
    assert_eq!(&packed[0..8], &9u64.to_le_bytes());
    assert_eq!(packed[88], 1);
    assert_eq!(packed[89], 0);
    assert_eq!(PendingRequest::unpack(&packed), Ok(request));
}

#[test]
fn test_pending_request_unpack_rejects_bad_data() {
    let zeroed = vec![0u8; PendingRequest::LEN];
    assert_eq!(
        PendingRequest::unpack(&zeroed),
        Err(ProgramError::UninitializedAccount)
    );

    let mut packed = vec![0u8; PendingRequest::LEN];
    sample_request().pack_into_slice(&mut packed);
    packed[88] = 2;
    assert_eq!(
        PendingRequest::unpack(&packed),
        Err(ProgramError::InvalidAccountData)
    );
    assert_eq!(
        PendingRequest::unpack(&packed[..40]),
        Err(ProgramError::InvalidAccountData)
    );
}

#[test]
fn test_raffle_state_wire_form() {
    assert_eq!(u8::from(RaffleState::Open), 0);
    assert_eq!(u8::from(RaffleState::Calculating), 1);
    assert_eq!(RaffleState::try_from(1u8), Ok(RaffleState::Calculating));
    assert!(RaffleState::try_from(2u8).is_err());
}

#[test]
fn test_upkeep_needed_requires_every_condition() {
    let mut raffle = Raffle::new(100, 30, START);
    assert!(raffle.is_initialized());
    assert!(!raffle.upkeep_needed(START + 30));

    raffle.players.push(Pubkey::new_unique());
    raffle.pool_balance = 100;
    assert!(!raffle.upkeep_needed(START + 29));
    assert!(raffle.upkeep_needed(START + 30));
    // clock going backwards never counts as elapsed
    assert_eq!(raffle.elapsed(START - 100), 0);
    assert!(!raffle.upkeep_needed(START - 100));

    raffle.pool_balance = 0;
    assert!(!raffle.upkeep_needed(START + 30));
    raffle.pool_balance = 100;

    raffle.state = RaffleState::Calculating;
    raffle.pending_request_id = Some(1);
    assert!(!raffle.upkeep_needed(START + 30));
}

#[test]
fn test_raffle_consistency() {
    let mut raffle = Raffle::new(100, 30, START);
    assert!(raffle.is_consistent());

    raffle.pending_request_id = Some(4);
    assert!(!raffle.is_consistent());

    raffle.state = RaffleState::Calculating;
    assert!(raffle.is_consistent());

    raffle.pending_request_id = Some(NO_REQUEST);
    assert!(!raffle.is_consistent());

    raffle.pending_request_id = None;
    assert!(!raffle.is_consistent());
}

#[test]
fn test_reset_round() {
    let mut raffle = Raffle::new(100, 30, START);
    raffle.players = vec![Pubkey::new_unique(), Pubkey::new_unique()];
    raffle.pool_balance = 200;
    raffle.state = RaffleState::Calculating;
    raffle.pending_request_id = Some(1);
    let winner = raffle.players[1];

    raffle.reset_round(winner, START + 45);

    assert_eq!(raffle.state, RaffleState::Open);
    assert!(raffle.players.is_empty());
    assert_eq!(raffle.pool_balance, 0);
    assert_eq!(raffle.last_timestamp, START + 45);
    assert_eq!(raffle.recent_winner, Some(winner));
    assert_eq!(raffle.pending_request_id, None);
    assert!(raffle.is_consistent());
}

#[test]
fn test_transaction_rolls_back_unless_committed() {
    let mut value = vec![1, 2, 3];
    {
        let mut tx = Transaction::begin(&mut value);
        tx.push(4);
        tx.clear();
        assert!(tx.is_empty());
    }
    assert_eq!(value, vec![1, 2, 3]);

    {
        let mut tx = Transaction::begin(&mut value);
        tx.push(4);
        tx.commit();
    }
    assert_eq!(value, vec![1, 2, 3, 4]);
}

#[test]
fn test_winner_index() {
    assert_eq!(vrf::winner_index(1, 3), Some(1));
    assert_eq!(vrf::winner_index(3, 3), Some(0));
    assert_eq!(vrf::winner_index(u64::MAX, 1), Some(0));
    assert_eq!(vrf::winner_index(7, 0), None);
}

#[test]
fn test_derived_words_are_deterministic() {
    let words = vrf::derive_random_words(5, 4);
    assert_eq!(words.len(), 4);
    assert_eq!(words, vrf::derive_random_words(5, 4));
    assert_ne!(words, vrf::derive_random_words(6, 4));
    assert_eq!(vrf::derive_random_words(5, 1)[0], words[0]);
    assert!(vrf::derive_random_words(5, 0).is_empty());

    let mut result = [0u8; 32];
    result[0] = 1;
    result[8] = 0xff;
    assert_eq!(vrf::word_from_result(result), 1);
}

#[test]
fn test_network_presets() {
    assert!(config::is_development_network("localnet"));
    assert!(config::is_development_network("development"));
    assert!(!config::is_development_network("mainnet-beta"));

    let localnet = NetworkConfig::for_network("localnet").unwrap();
    assert_eq!(localnet.name, "localnet");
    assert_eq!(localnet.interval, Some(30));
    assert_eq!(localnet.callback_gas_limit, Some(200_000));
    assert!(localnet.is_development());
    assert_eq!(NetworkConfig::for_network("mainnet-beta"), None);
}

#[test]
fn test_raffle_config_from_network() {
    let network = NetworkConfig::development();
    assert_eq!(
        RaffleConfig::from_network(&network, None),
        Err(RaffleError::MissingConfig("subscription_id"))
    );

    let config = RaffleConfig::from_network(&network, Some(4)).unwrap();
    assert_eq!(config.subscription_id, 4);
    assert_eq!(Some(config.entrance_fee), network.entrance_fee);
    assert_eq!(Some(config.key_hash), network.key_hash);

    let live = NetworkConfig {
        name: "mainnet-beta".to_string(),
        subscription_id: Some(11),
        ..NetworkConfig::development()
    };
    assert_eq!(
        RaffleConfig::from_network(&live, None).unwrap().subscription_id,
        11
    );
    assert_eq!(
        RaffleConfig::from_network(&live, Some(12)).unwrap().subscription_id,
        12
    );

    let no_fee = NetworkConfig {
        entrance_fee: None,
        ..NetworkConfig::development()
    };
    assert_eq!(
        RaffleConfig::from_network(&no_fee, Some(1)),
        Err(RaffleError::MissingConfig("entrance_fee"))
    );
}

#[test]
fn test_fulfillment_cost() {
    let config = CoordinatorConfig {
        base_fee: 10,
        gas_price: 2,
        ..CoordinatorConfig::development()
    };
    assert_eq!(config.fulfillment_cost(0), 10);
    assert_eq!(config.fulfillment_cost(100), 210);

    let expensive = CoordinatorConfig {
        base_fee: u64::MAX,
        gas_price: u64::MAX,
        ..CoordinatorConfig::development()
    };
    assert_eq!(expensive.fulfillment_cost(2), u64::MAX);
    assert_eq!(CoordinatorConfig::default(), CoordinatorConfig::development());
}

#[test]
fn test_instruction_encoding() {
    let consumer = Pubkey::new_unique();
    assert_eq!(
        RaffleInstruction::unpack(&instruction::add_consumer(3, &consumer)),
        Ok(RaffleInstruction::AddConsumer {
            subscription_id: 3,
            consumer
        })
    );
    assert_eq!(
        RaffleInstruction::unpack(&instruction::fulfill_random_words(8, vec![1, 2])),
        Ok(RaffleInstruction::FulfillRandomWords {
            request_id: 8,
            random_words: vec![1, 2]
        })
    );
    assert_eq!(instruction::perform_upkeep(), vec![6]);
    assert_eq!(
        RaffleInstruction::unpack(&[200]),
        Err(ProgramError::InvalidInstructionData)
    );
    assert_eq!(
        RaffleInstruction::unpack(&[]),
        Err(ProgramError::InvalidInstructionData)
    );
}

#[test]
fn test_instruction_pack_layout() {
    let consumer = Pubkey::new_unique();
    let instructions = [
        RaffleInstruction::CreateSubscription,
        RaffleInstruction::FundSubscription {
            subscription_id: 2,
            amount: 5_000,
        },
        RaffleInstruction::AddConsumer {
            subscription_id: 3,
            consumer,
        },
        RaffleInstruction::RemoveConsumer {
            subscription_id: 3,
            consumer,
        },
        RaffleInstruction::EnterRaffle { amount: 100 },
        RaffleInstruction::CheckUpkeep,
        RaffleInstruction::PerformUpkeep,
        RaffleInstruction::FulfillRandomWords {
            request_id: 8,
            random_words: vec![1, u64::MAX],
        },
        RaffleInstruction::FulfillRandomWords {
            request_id: 9,
            random_words: Vec::new(),
        },
    ];
    for ix in &instructions {
        assert_eq!(ix.pack(), borsh::to_vec(ix).unwrap());
    }

    let mut expected = vec![4];
    expected.extend_from_slice(&100u64.to_le_bytes());
    assert_eq!(instruction::enter_raffle(100), expected);

    let mut expected = vec![7];
    expected.extend_from_slice(&9u64.to_le_bytes());
    expected.extend_from_slice(&0u32.to_le_bytes());
    assert_eq!(instruction::fulfill_random_words(9, Vec::new()), expected);
}

#[test]
fn test_event_log_keeps_newest() {
    let log = EventLog::with_capacity(2);
    let events: Vec<RaffleEvent> = (0..3)
        .map(|_| RaffleEvent::Entered {
            player: Pubkey::new_unique(),
        })
        .collect();
    for event in &events {
        log.emit(event.clone());
    }

    assert_eq!(log.len(), 2);
    assert_eq!(log.snapshot(), events[1..].to_vec());
    assert_eq!(log.drain(), events[1..].to_vec());
    assert!(log.is_empty());

    log.emit(events[0].clone());
    assert_eq!(log.snapshot(), vec![events[0].clone()]);

    assert_eq!(EventLog::<RaffleEvent>::with_capacity(0).capacity(), 1);
    assert_eq!(
        EventLog::<RaffleEvent>::default().capacity(),
        DEFAULT_EVENT_CAPACITY
    );
}

#[test]
fn test_processor_rejects_garbage() {
    let clock = Arc::new(ManualClock::new(START));
    let deployment = LocalDeployment::deploy(&NetworkConfig::development(), clock).unwrap();

    assert_eq!(
        deployment.processor.process(&deployment.deployer, &[42, 0, 1]),
        Err(ProgramError::InvalidInstructionData)
    );
}

#[test]
fn test_bank_transfer() {
    let bank = Bank::new();
    let alice = Pubkey::new_unique();
    let bob = Pubkey::new_unique();
    bank.airdrop(&alice, 100).unwrap();

    assert_eq!(
        bank.transfer(&alice, &bob, 101),
        Err(ProgramError::InsufficientFunds)
    );
    bank.transfer(&alice, &bob, 40).unwrap();
    assert_eq!(bank.balance(&alice), 60);
    assert_eq!(bank.balance(&bob), 40);

    bank.set_rejects_deposits(&bob, true);
    assert_eq!(
        bank.transfer(&alice, &bob, 10),
        Err(ProgramError::InvalidAccountData)
    );
    assert_eq!(bank.balance(&alice), 60);
    assert_eq!(bank.balance(&bob), 40);

    bank.transfer(&alice, &alice, 60).unwrap();
    assert_eq!(bank.balance(&alice), 60);

    bank.airdrop(&bob, u64::MAX - 40).unwrap();
    assert_eq!(bank.airdrop(&bob, 1), Err(ProgramError::ArithmeticOverflow));
}

#[test]
fn test_vault_collect_and_pay_out() {
    let bank = Arc::new(Bank::new());
    let vault = Vault::new(bank.clone(), Pubkey::new_unique());
    let player = Pubkey::new_unique();
    bank.airdrop(&player, 500).unwrap();

    vault.collect(&player, 300).unwrap();
    assert_eq!(vault.balance(), 300);
    assert_eq!(bank.balance(vault.address()), 300);

    vault.pay_out(&player, 300).unwrap();
    assert_eq!(vault.balance(), 0);
    assert_eq!(bank.balance(&player), 500);
    assert_eq!(
        vault.pay_out(&player, 1),
        Err(ProgramError::InsufficientFunds)
    );
}

#[test]
fn test_clocks() {
    let clock = ManualClock::new(START);
    clock.advance(15);
    assert_eq!(clock.unix_timestamp(), START + 15);
    clock.set(START - 5);
    assert_eq!(clock.unix_timestamp(), START - 5);

    let sysvar = Clock {
        unix_timestamp: START,
        ..Clock::default()
    };
    assert_eq!(sysvar.unix_timestamp(), START);
}

#[test]
fn test_error_codes() {
    assert_eq!(
        ProgramError::from(RaffleError::NotEnoughFunds {
            amount: 1,
            entrance_fee: 2
        }),
        ProgramError::Custom(0)
    );
    assert_eq!(ProgramError::from(RaffleError::NotOpen), ProgramError::Custom(1));
    assert_eq!(
        ProgramError::from(RaffleError::TransferFailed),
        ProgramError::Custom(5)
    );
    assert_eq!(
        ProgramError::from(RaffleError::RandomnessRequestFailed(OracleError::MustBeSubOwner)),
        ProgramError::Custom(6)
    );
    assert_eq!(
        ProgramError::from(OracleError::InvalidRequest(1)),
        ProgramError::Custom(103)
    );
    assert_eq!(
        RaffleError::from(OracleError::MustBeSubOwner),
        RaffleError::RandomnessRequestFailed(OracleError::MustBeSubOwner)
    );
}

#[test]
fn test_deploy_requires_development_network() {
    let clock = Arc::new(ManualClock::new(START));
    let live = NetworkConfig {
        name: "mainnet-beta".to_string(),
        ..NetworkConfig::development()
    };

    assert_eq!(
        LocalDeployment::deploy(&live, clock).err(),
        Some(RaffleError::MissingConfig("coordinator"))
    );
}

#[test]
fn test_attach_to_existing_coordinator() {
    let clock = Arc::new(ManualClock::new(START));
    let coordinator = Arc::new(RandomnessCoordinator::new(CoordinatorConfig::development()));
    let operator = Pubkey::new_unique();
    let subscription_id = coordinator.create_subscription(&operator);
    coordinator
        .fund_subscription(subscription_id, config::SUBSCRIPTION_FUND_AMOUNT)
        .unwrap();
    let live = NetworkConfig {
        name: "mainnet-beta".to_string(),
        coordinator: Some(coordinator.id()),
        subscription_id: Some(subscription_id),
        entrance_fee: Some(100),
        ..NetworkConfig::development()
    };

    let wrong = NetworkConfig {
        coordinator: Some(Pubkey::new_unique()),
        ..live.clone()
    };
    assert_eq!(
        LocalDeployment::attach(&wrong, coordinator.clone(), clock.clone()).err(),
        Some(RaffleError::MissingConfig("coordinator"))
    );

    let deployment = LocalDeployment::attach(&live, coordinator.clone(), clock.clone()).unwrap();
    assert_eq!(deployment.subscription_id, subscription_id);
    let player = deployment.new_player(1_000).unwrap();
    deployment
        .processor
        .process(&player, &instruction::enter_raffle(100))
        .unwrap();
    clock.advance(30);

    // the operator has not registered the raffle yet
    assert!(matches!(
        deployment.raffle.perform_upkeep(),
        Err(RaffleError::RandomnessRequestFailed(
            OracleError::UnauthorizedConsumer { .. }
        ))
    ));

    coordinator
        .add_consumer(subscription_id, &deployment.raffle.id())
        .unwrap();
    let request_id = deployment.raffle.perform_upkeep().unwrap();
    coordinator.fulfill_random_words(request_id, Vec::new()).unwrap();
    assert_eq!(deployment.raffle.recent_winner(), Some(player));
    assert_eq!(deployment.bank.balance(&player), 1_000);
}

#[test]
fn test_cancel_local_subscription_refunds_deployer() {
    let clock = Arc::new(ManualClock::new(START));
    let deployment = LocalDeployment::deploy(&NetworkConfig::development(), clock).unwrap();

    deployment.cancel_subscription().unwrap();

    assert_eq!(
        deployment.bank.balance(&deployment.deployer),
        config::SUBSCRIPTION_FUND_AMOUNT
    );
    assert_eq!(
        deployment.coordinator.subscription(deployment.subscription_id),
        None
    );
}
