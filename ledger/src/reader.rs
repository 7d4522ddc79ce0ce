//! Ledger reader trait.

use crate::LedgerError;
use tally_types::{AccountId, HolderBalance, Proposal, ProposalId, TokenAmount, VoteRecord};

/// Read access to the external ledger.
///
/// Every method is a potentially slow, fallible I/O call. Implementations
/// return whatever the ledger currently reports; they never cache on the
/// engine's behalf.
pub trait LedgerReader: Send + Sync {
    /// All proposal slots, including placeholder entries with a zero proposer.
    fn list_proposals(&self) -> Result<Vec<Proposal>, LedgerError>;

    /// Number of distinct accounts with a recorded supporting vote.
    fn headcount(&self, proposal: ProposalId) -> Result<u32, LedgerError>;

    /// Authoritative "has this account voted on this proposal".
    fn has_voted(&self, proposal: ProposalId, account: &AccountId) -> Result<bool, LedgerError>;

    fn balance_of(&self, account: &AccountId) -> Result<TokenAmount, LedgerError>;

    fn circulating_supply(&self) -> Result<TokenAmount, LedgerError>;

    /// Every account with a non-zero balance.
    fn list_holders(&self) -> Result<Vec<HolderBalance>, LedgerError>;

    /// Vote events the reader has observed. Readers without event access
    /// report none.
    fn vote_events(&self) -> Result<Vec<VoteRecord>, LedgerError> {
        Ok(Vec::new())
    }

    /// Account balance as a share of circulating supply, in basis points.
    fn ownership_bps(&self, account: &AccountId) -> Result<u32, LedgerError> {
        let balance = self.balance_of(account)?;
        let supply = self.circulating_supply()?;
        Ok(balance.share_bps(supply))
    }
}
