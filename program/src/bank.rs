// Raffle VRF - Lamport ledger
use parking_lot::Mutex;
use solana_program::{entrypoint::ProgramResult, msg, program_error::ProgramError, pubkey::Pubkey};
use std::collections::HashMap;
use std::sync::Arc;

/// Where the raffle sends its prize
pub trait Treasury: Send + Sync {
    /// Pays `lamports` out of the raffle pool to `recipient`
    fn pay_out(&self, recipient: &Pubkey, lamports: u64) -> ProgramResult;
}

#[derive(Clone, Copy, Debug, Default)]
struct LamportAccount {
    lamports: u64,
    /// Deposits into this account fail, like a recipient that cannot receive
    rejects_deposits: bool,
}

/// In-process ledger of lamport balances
#[derive(Debug, Default)]
pub struct Bank {
    accounts: Mutex<HashMap<Pubkey, LamportAccount>>,
}

impl Bank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance(&self, account: &Pubkey) -> u64 {
        self.accounts
            .lock()
            .get(account)
            .map(|account| account.lamports)
            .unwrap_or(0)
    }

    /// Mints lamports into `account`
    pub fn airdrop(&self, account: &Pubkey, lamports: u64) -> ProgramResult {
        let mut accounts = self.accounts.lock();
        let entry = accounts.entry(*account).or_default();
        entry.lamports = entry
            .lamports
            .checked_add(lamports)
            .ok_or(ProgramError::ArithmeticOverflow)?;
        Ok(())
    }

    /// Makes every later deposit into `account` fail (or succeed again)
    pub fn set_rejects_deposits(&self, account: &Pubkey, rejects: bool) {
        self.accounts.lock().entry(*account).or_default().rejects_deposits = rejects;
    }

    /// Moves lamports between two accounts, nothing changes on failure
    pub fn transfer(&self, from: &Pubkey, to: &Pubkey, lamports: u64) -> ProgramResult {
        let mut accounts = self.accounts.lock();
        let source = accounts.get(from).copied().unwrap_or_default();
        let destination = accounts.get(to).copied().unwrap_or_default();

        if destination.rejects_deposits {
            msg!("Account {} does not accept deposits", to);
            return Err(ProgramError::InvalidAccountData);
        }
        if source.lamports < lamports {
            msg!(
                "Insufficient funds: needed {} lamports, had {} lamports",
                lamports,
                source.lamports
            );
            return Err(ProgramError::InsufficientFunds);
        }
        if from == to {
            return Ok(());
        }
        let credited = destination
            .lamports
            .checked_add(lamports)
            .ok_or(ProgramError::ArithmeticOverflow)?;

        accounts.entry(*from).or_default().lamports = source.lamports - lamports;
        accounts.entry(*to).or_default().lamports = credited;
        Ok(())
    }
}

/// Bank account holding the raffle pool
#[derive(Clone, Debug)]
pub struct Vault {
    bank: Arc<Bank>,
    address: Pubkey,
}

impl Vault {
    pub fn new(bank: Arc<Bank>, address: Pubkey) -> Self {
        Self { bank, address }
    }

    pub fn address(&self) -> &Pubkey {
        &self.address
    }

    pub fn balance(&self) -> u64 {
        self.bank.balance(&self.address)
    }

    /// Pulls an entry payment from `payer` into the vault
    pub fn collect(&self, payer: &Pubkey, lamports: u64) -> ProgramResult {
        self.bank.transfer(payer, &self.address, lamports)
    }
}

impl Treasury for Vault {
    fn pay_out(&self, recipient: &Pubkey, lamports: u64) -> ProgramResult {
        msg!("Transferring {} lamports to winner {}", lamports, recipient);
        self.bank.transfer(&self.address, recipient, lamports)
    }
}
