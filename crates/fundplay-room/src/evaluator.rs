//! Win claim evaluation.
//!
//! The [`ClaimBook`] holds at most one pending claim and the confirmed
//! winners of each category. Every proposal, whether typed by the host,
//! sent by a player, or raised by automatic detection, goes through
//! [`ClaimBook::propose`].

use std::collections::BTreeSet;

use fundplay_protocol::{
    Award, BingoCard, CategoryWinners, ClaimVerification, FullHouseOrdering,
    ParticipantId, Phase, RejectReason, Role, Standing, WinCategory, WinClaim,
};

use crate::bingo::CallHistory;
use crate::roster::Roster;

const CATEGORY_ORDER: [WinCategory; 2] = [WinCategory::Line, WinCategory::FullHouse];

/// Per-room claim rules.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ClaimPolicy {
    pub verification: ClaimVerification,
    pub ordering: FullHouseOrdering,
    pub max_claimants: usize,
}

/// A claim as submitted, before validation.
#[derive(Debug)]
pub(crate) struct Proposal<'a> {
    pub category: WinCategory,
    pub claimants: Vec<ParticipantId>,
    pub proposer: &'a ParticipantId,
    pub proposer_role: Role,
}

/// What the evaluator needs to see of the room.
pub(crate) struct ClaimContext<'a> {
    pub phase: Phase,
    pub roster: &'a Roster,
    pub history: &'a CallHistory,
    pub policy: ClaimPolicy,
}

/// What removing a departing claimant did to the pending claim.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Withdrawal {
    /// Others still claim; the claim now stands as shown.
    Reduced(WinClaim),
    /// The departing participant was the last claimant. The claim as it
    /// stood before removal.
    Emptied(WinClaim),
}

#[derive(Debug, Clone, Default)]
pub(crate) struct ClaimBook {
    pending: Option<WinClaim>,
    confirmed: Vec<CategoryWinners>,
}

impl ClaimBook {
    pub(crate) fn pending(&self) -> Option<&WinClaim> {
        self.pending.as_ref()
    }

    pub(crate) fn is_won(&self, category: WinCategory) -> bool {
        self.confirmed.iter().any(|w| w.category == category)
    }

    pub(crate) fn confirmed(&self) -> &[CategoryWinners] {
        &self.confirmed
    }

    /// Validates `proposal` and records it as the pending claim.
    pub(crate) fn propose(
        &mut self,
        proposal: Proposal<'_>,
        ctx: &ClaimContext<'_>,
    ) -> Result<WinClaim, RejectReason> {
        let Proposal {
            category,
            claimants,
            proposer,
            proposer_role,
        } = proposal;

        if self.pending.is_some() {
            return Err(RejectReason::ClaimAlreadyPending);
        }
        if self.is_won(category) {
            return Err(RejectReason::CategoryAlreadyWon);
        }
        if ctx.phase != Phase::Active {
            return Err(RejectReason::InvalidTransition);
        }
        if category == WinCategory::FullHouse && !self.is_won(WinCategory::Line) {
            let blocked = match ctx.policy.ordering {
                FullHouseOrdering::Strict => true,
                FullHouseOrdering::HostMayBypass => proposer_role != Role::Host,
                FullHouseOrdering::Free => false,
            };
            if blocked {
                return Err(RejectReason::LineNotConfirmed);
            }
        }

        let mut seen = BTreeSet::new();
        let claimants: Vec<ParticipantId> = claimants
            .into_iter()
            .filter(|id| seen.insert(id.clone()))
            .collect();
        if claimants.is_empty() || claimants.len() > ctx.policy.max_claimants {
            return Err(RejectReason::InvalidClaim);
        }
        let mut cards = Vec::with_capacity(claimants.len());
        for id in &claimants {
            match ctx.roster.get(id) {
                Some(p) if p.role == Role::Player => cards.push(p.card),
                _ => return Err(RejectReason::InvalidClaim),
            }
        }
        if proposer_role == Role::Player && claimants.as_slice() != std::slice::from_ref(proposer) {
            return Err(RejectReason::Unauthorized);
        }
        if ctx.policy.verification == ClaimVerification::AgainstHistory {
            let verified = cards.iter().all(|card| {
                card.is_some_and(|c| c.satisfies(category, |n| ctx.history.is_called(n)))
            });
            if !verified {
                return Err(RejectReason::ClaimNotVerified);
            }
        }

        let claim = WinClaim {
            category,
            claimants,
        };
        self.pending = Some(claim.clone());
        Ok(claim)
    }

    /// Accepts the pending claim of `category`, returning its winners.
    pub(crate) fn confirm(
        &mut self,
        category: WinCategory,
    ) -> Result<Vec<ParticipantId>, RejectReason> {
        let claim = self.take_pending(category)?;
        self.confirmed.push(CategoryWinners {
            category,
            winners: claim.claimants.clone(),
        });
        Ok(claim.claimants)
    }

    /// Throws out the pending claim of `category`.
    pub(crate) fn reject(&mut self, category: WinCategory) -> Result<WinClaim, RejectReason> {
        self.take_pending(category)
    }

    fn take_pending(&mut self, category: WinCategory) -> Result<WinClaim, RejectReason> {
        match self.pending.take() {
            Some(claim) if claim.category == category => Ok(claim),
            other => {
                self.pending = other;
                Err(RejectReason::InvalidTransition)
            }
        }
    }

    /// Drops a departing participant from the pending claim. `None` if
    /// they were not claiming.
    pub(crate) fn withdraw(&mut self, id: &ParticipantId) -> Option<Withdrawal> {
        let claim = self.pending.as_mut()?;
        if !claim.claimants.contains(id) {
            return None;
        }
        if claim.claimants.len() == 1 {
            return self.pending.take().map(Withdrawal::Emptied);
        }
        claim.claimants.retain(|c| c != id);
        Some(Withdrawal::Reduced(claim.clone()))
    }

    pub(crate) fn discard_pending(&mut self) {
        self.pending = None;
    }

    /// Confirmed winners as final standings, line first.
    pub(crate) fn standings(&self) -> Vec<Standing> {
        CATEGORY_ORDER
            .iter()
            .filter_map(|&category| {
                self.confirmed
                    .iter()
                    .find(|w| w.category == category)
                    .map(|w| Standing {
                        award: Award::Bingo { category },
                        winners: w.winners.clone(),
                    })
            })
            .collect()
    }
}

/// The first unwon category that `card` completes using cells that are
/// both marked and called.
pub(crate) fn detect(
    card: &BingoCard,
    marked: &BTreeSet<u8>,
    history: &CallHistory,
    book: &ClaimBook,
) -> Option<WinCategory> {
    let covered = |n: u8| marked.contains(&n) && history.is_called(n);
    CATEGORY_ORDER
        .into_iter()
        .filter(|&category| !book.is_won(category))
        .find(|&category| card.satisfies(category, covered))
}
