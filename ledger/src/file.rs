//! A ledger reader backed by a JSON dump on disk.
//!
//! Lets the CLI and the watcher run against an exported ledger state (or a
//! file some other process keeps refreshing). The file is re-read whenever
//! the proposal list is requested, so a poll loop observes external updates.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::debug;

use tally_types::{AccountId, HolderBalance, Proposal, ProposalId, TokenAmount, VoteRecord};

use crate::{LedgerError, LedgerReader};

/// On-disk layout of a ledger dump.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerDump {
    #[serde(default)]
    pub proposals: Vec<Proposal>,
    #[serde(default)]
    pub headcounts: BTreeMap<ProposalId, u32>,
    #[serde(default)]
    pub votes: Vec<VoteRecord>,
    #[serde(default)]
    pub holders: Vec<HolderBalance>,
    /// Falls back to the sum of holder balances when absent.
    #[serde(default)]
    pub circulating_supply: Option<TokenAmount>,
}

impl LedgerDump {
    pub fn from_json_str(s: &str) -> Result<Self, LedgerError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn to_json_string(&self) -> Result<String, LedgerError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn supply(&self) -> Result<TokenAmount, LedgerError> {
        if let Some(supply) = self.circulating_supply {
            return Ok(supply);
        }
        self.holders
            .iter()
            .try_fold(TokenAmount::ZERO, |acc, h| acc.checked_add(h.balance))
            .ok_or_else(|| LedgerError::Malformed("holder balances overflow".into()))
    }
}

/// [`LedgerReader`] over a [`LedgerDump`] file.
pub struct FileLedger {
    path: PathBuf,
    dump: Mutex<LedgerDump>,
}

impl FileLedger {
    /// Open and parse the dump at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref().to_path_buf();
        let dump = Self::read(&path)?;
        Ok(Self {
            path,
            dump: Mutex::new(dump),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-read the file from disk.
    pub fn reload(&self) -> Result<(), LedgerError> {
        let fresh = Self::read(&self.path)?;
        *self.lock()? = fresh;
        Ok(())
    }

    fn read(path: &Path) -> Result<LedgerDump, LedgerError> {
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => LedgerError::NotFound(path.display().to_string()),
            _ => LedgerError::Io(e),
        })?;
        let dump = LedgerDump::from_json_str(&content)?;
        debug!(path = %path.display(), proposals = dump.proposals.len(), "ledger dump loaded");
        Ok(dump)
    }

    fn lock(&self) -> Result<MutexGuard<'_, LedgerDump>, LedgerError> {
        self.dump
            .lock()
            .map_err(|_| LedgerError::Unavailable("ledger dump lock poisoned".into()))
    }
}

impl LedgerReader for FileLedger {
    fn list_proposals(&self) -> Result<Vec<Proposal>, LedgerError> {
        self.reload()?;
        Ok(self.lock()?.proposals.clone())
    }

    fn headcount(&self, proposal: ProposalId) -> Result<u32, LedgerError> {
        let dump = self.lock()?;
        if let Some(count) = dump.headcounts.get(&proposal) {
            return Ok(*count);
        }
        let mut voters: Vec<&AccountId> = dump
            .votes
            .iter()
            .filter(|v| v.proposal == proposal && v.support)
            .map(|v| &v.voter)
            .collect();
        voters.sort();
        voters.dedup();
        Ok(voters.len() as u32)
    }

    fn has_voted(&self, proposal: ProposalId, account: &AccountId) -> Result<bool, LedgerError> {
        Ok(self
            .lock()?
            .votes
            .iter()
            .any(|v| v.proposal == proposal && &v.voter == account))
    }

    fn balance_of(&self, account: &AccountId) -> Result<TokenAmount, LedgerError> {
        Ok(self
            .lock()?
            .holders
            .iter()
            .find(|h| &h.account == account)
            .map(|h| h.balance)
            .unwrap_or(TokenAmount::ZERO))
    }

    fn circulating_supply(&self) -> Result<TokenAmount, LedgerError> {
        self.lock()?.supply()
    }

    fn list_holders(&self) -> Result<Vec<HolderBalance>, LedgerError> {
        Ok(self.lock()?.holders.clone())
    }

    fn vote_events(&self) -> Result<Vec<VoteRecord>, LedgerError> {
        Ok(self.lock()?.votes.clone())
    }
}
