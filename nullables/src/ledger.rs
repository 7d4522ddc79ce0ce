//! Nullable ledger: an in-memory `LedgerReader` with failure injection.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use tally_ledger::{LedgerError, LedgerReader};
use tally_types::{AccountId, HolderBalance, Proposal, ProposalId, Timestamp, TokenAmount, VoteRecord};

/// Which reads a [`NullLedger`] should fail.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FailureMode {
    pub proposals: bool,
    pub headcounts: BTreeSet<ProposalId>,
    pub votes: bool,
    pub holders: bool,
    pub supply: bool,
    pub has_voted: bool,
}

#[derive(Default)]
struct State {
    proposals: BTreeMap<ProposalId, Proposal>,
    votes: Vec<VoteRecord>,
    holders: BTreeMap<AccountId, TokenAmount>,
    /// Overrides the headcount derived from `votes`.
    reported_headcounts: BTreeMap<ProposalId, u32>,
    failures: FailureMode,
    reads: u64,
}

/// An in-memory ledger for testing.
/// Thread-safe for use with tokio's multi-threaded runtime.
pub struct NullLedger {
    state: Mutex<State>,
}

impl NullLedger {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }

    /// Store `proposal`, replacing any previous one with the same id.
    pub fn add_proposal(&self, proposal: Proposal) {
        self.state.lock().unwrap().proposals.insert(proposal.id, proposal);
    }

    /// Create a minimal proposal and return its id.
    pub fn propose(&self, id: u64, proposer: AccountId, created_at: Timestamp) -> ProposalId {
        let proposal = Proposal {
            id: ProposalId::new(id),
            proposer,
            title: format!("proposal {id}"),
            description: String::new(),
            recipient: AccountId::new([0xEE; 20]),
            amount: TokenAmount::whole(100),
            created_at,
            nominal_deadline: created_at.plus_secs(7 * 24 * 3600),
            yes_vote_weight: 0,
            no_vote_weight: 0,
            executed: false,
            executed_at: None,
        };
        self.add_proposal(proposal);
        ProposalId::new(id)
    }

    /// Record a supporting vote.
    pub fn cast_vote(&self, voter: AccountId, proposal: ProposalId, at: Timestamp) {
        let mut state = self.state.lock().unwrap();
        let weight = state.holders.get(&voter).copied().unwrap_or_default();
        if let Some(p) = state.proposals.get_mut(&proposal) {
            p.yes_vote_weight = p.yes_vote_weight.saturating_add(weight.raw());
        }
        state.votes.push(VoteRecord {
            voter,
            proposal,
            support: true,
            timestamp: at,
        });
    }

    pub fn execute(&self, proposal: ProposalId, at: Timestamp) {
        if let Some(p) = self.state.lock().unwrap().proposals.get_mut(&proposal) {
            p.executed = true;
            p.executed_at = Some(at);
        }
    }

    pub fn set_balance(&self, account: AccountId, balance: TokenAmount) {
        let mut state = self.state.lock().unwrap();
        if balance.is_zero() {
            state.holders.remove(&account);
        } else {
            state.holders.insert(account, balance);
        }
    }

    /// Force the ledger-reported headcount for `proposal`.
    pub fn set_headcount(&self, proposal: ProposalId, count: u32) {
        self.state
            .lock()
            .unwrap()
            .reported_headcounts
            .insert(proposal, count);
    }

    /// Drop every proposal and vote, as after a redeploy. Balances survive.
    pub fn reset_proposals(&self) {
        let mut state = self.state.lock().unwrap();
        state.proposals.clear();
        state.votes.clear();
        state.reported_headcounts.clear();
    }

    pub fn set_failures(&self, failures: FailureMode) {
        self.state.lock().unwrap().failures = failures;
    }

    pub fn heal(&self) {
        self.set_failures(FailureMode::default());
    }

    /// Number of reads served so far (failed reads included).
    pub fn read_count(&self) -> u64 {
        self.state.lock().unwrap().reads
    }

    fn read<T>(&self, fail: impl FnOnce(&FailureMode) -> bool, f: impl FnOnce(&State) -> T) -> Result<T, LedgerError> {
        let mut state = self.state.lock().unwrap();
        state.reads += 1;
        if fail(&state.failures) {
            return Err(LedgerError::Unavailable("injected failure".into()));
        }
        Ok(f(&state))
    }
}

impl Default for NullLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl LedgerReader for NullLedger {
    fn list_proposals(&self) -> Result<Vec<Proposal>, LedgerError> {
        self.read(|f| f.proposals, |s| s.proposals.values().cloned().collect())
    }

    fn headcount(&self, proposal: ProposalId) -> Result<u32, LedgerError> {
        self.read(
            |f| f.headcounts.contains(&proposal),
            |s| {
                if let Some(count) = s.reported_headcounts.get(&proposal) {
                    return *count;
                }
                s.votes
                    .iter()
                    .filter(|v| v.proposal == proposal && v.support)
                    .map(|v| v.voter)
                    .collect::<BTreeSet<_>>()
                    .len() as u32
            },
        )
    }

    fn has_voted(&self, proposal: ProposalId, account: &AccountId) -> Result<bool, LedgerError> {
        self.read(
            |f| f.has_voted,
            |s| s.votes.iter().any(|v| v.proposal == proposal && &v.voter == account),
        )
    }

    fn balance_of(&self, account: &AccountId) -> Result<TokenAmount, LedgerError> {
        self.read(
            |f| f.holders,
            |s| s.holders.get(account).copied().unwrap_or_default(),
        )
    }

    fn circulating_supply(&self) -> Result<TokenAmount, LedgerError> {
        self.read(
            |f| f.supply,
            |s| s.holders.values().fold(TokenAmount::ZERO, |acc, b| acc + *b),
        )
    }

    fn list_holders(&self) -> Result<Vec<HolderBalance>, LedgerError> {
        self.read(
            |f| f.holders,
            |s| {
                s.holders
                    .iter()
                    .map(|(account, balance)| HolderBalance::new(*account, *balance))
                    .collect()
            },
        )
    }

    fn vote_events(&self) -> Result<Vec<VoteRecord>, LedgerError> {
        self.read(|f| f.votes, |s| s.votes.clone())
    }
}
