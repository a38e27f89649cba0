//! Sync ledger: request tokens and per-field write clock used to reconcile
//! backend responses with optimistic local edits.
//!
//! Every local write ticks a logical clock and stamps the touched field.
//! A request captures the clock when it is dispatched (its token) and
//! registers the fields it carries as in flight. When the response lands:
//!
//! - a request issued before a reset is discarded;
//! - the newest response so far takes the canonical value for each field,
//!   unless it was written after the token or another in-flight request
//!   still carries it;
//! - a response overtaken by a newer one only contributes the fields its
//!   own request carried (same exclusions) plus server-stamped data.

use std::collections::{BTreeSet, HashMap};

use super::model::OnboardingProgress;
use super::state::OnboardingState;

/// A field of the onboarding record that can be written independently.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Stage,
    TutorialStep,
    Checklist(String),
}

/// An in-flight request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    id: u64,
    epoch: u64,
    /// Clock value at dispatch.
    pub token: u64,
    pub fields: Vec<Field>,
}

/// How a response may be applied, per [`SyncLedger::assess`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Canonical values win except for `keep`.
    Current { keep: BTreeSet<Field> },
    /// A newer response was applied first; only `take` comes from this one.
    Superseded { take: BTreeSet<Field> },
    /// The request predates a reset.
    Discard,
}

/// Result of reconciling a backend response.
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciled {
    /// The response was merged; carries the resulting state.
    Applied(OnboardingState),
    /// A newer response had already been applied. The backend accepted the
    /// write and this response's own fields were merged.
    Superseded {
        state: OnboardingState,
        token: u64,
        latest: u64,
    },
    /// The request was issued before a reset, so its response was dropped.
    Stale { token: u64, latest: u64 },
}

impl Reconciled {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }

    /// The state after reconciliation, unless the response was dropped.
    pub fn state(&self) -> Option<&OnboardingState> {
        match self {
            Self::Applied(state) | Self::Superseded { state, .. } => Some(state),
            Self::Stale { .. } => None,
        }
    }
}

/// Bookkeeping for optimistic updates.
#[derive(Debug, Default)]
pub struct SyncLedger {
    epoch: u64,
    clock: u64,
    next_ticket: u64,
    last_applied: u64,
    writes: HashMap<Field, u64>,
    in_flight: Vec<Ticket>,
}

impl SyncLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp a local write of `field`.
    pub fn record_write(&mut self, field: Field) -> u64 {
        self.clock += 1;
        self.writes.insert(field, self.clock);
        self.clock
    }

    /// Register a request carrying `fields`.
    pub fn begin(&mut self, fields: Vec<Field>) -> Ticket {
        self.next_ticket += 1;
        let ticket = Ticket {
            id: self.next_ticket,
            epoch: self.epoch,
            token: self.clock,
            fields,
        };
        self.in_flight.push(ticket.clone());
        ticket
    }

    /// Release a request, whether it succeeded or not.
    pub fn finish(&mut self, ticket: &Ticket) {
        self.in_flight.retain(|t| t.id != ticket.id);
    }

    /// Decide how the response to `ticket` may be applied.
    pub fn assess(&self, ticket: &Ticket) -> Verdict {
        if ticket.epoch != self.epoch {
            return Verdict::Discard;
        }
        if ticket.token < self.last_applied {
            let take = ticket
                .fields
                .iter()
                .filter(|f| !self.is_protected(ticket, f))
                .cloned()
                .collect();
            return Verdict::Superseded { take };
        }

        let mut keep: BTreeSet<Field> = self
            .writes
            .iter()
            .filter(|(_, at)| **at > ticket.token)
            .map(|(field, _)| field.clone())
            .collect();
        for other in self.in_flight.iter().filter(|t| t.id != ticket.id) {
            keep.extend(other.fields.iter().cloned());
        }
        Verdict::Current { keep }
    }

    fn is_protected(&self, ticket: &Ticket, field: &Field) -> bool {
        self.writes.get(field).is_some_and(|at| *at > ticket.token)
            || self
                .in_flight
                .iter()
                .any(|t| t.id != ticket.id && t.fields.contains(field))
    }

    pub fn mark_applied(&mut self, token: u64) {
        self.last_applied = self.last_applied.max(token);
    }

    pub fn last_applied(&self) -> u64 {
        self.last_applied
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Forget everything. Responses to requests begun before the reset
    /// are discarded from then on.
    pub fn reset(&mut self) {
        let epoch = self.epoch + 1;
        *self = Self {
            epoch,
            ..Self::default()
        };
    }
}

/// Overlay protected local values onto a canonical record.
///
/// `completed_at` is stamped by the backend and never cleared, so a local
/// stamp survives a canonical record that predates it.
pub fn merge(
    local: &OnboardingState,
    mut canonical: OnboardingProgress,
    protected: &BTreeSet<Field>,
) -> OnboardingProgress {
    for field in protected {
        match field {
            Field::Stage => canonical.stage = local.current_stage,
            Field::TutorialStep => {
                canonical.tutorial_step = (local.tutorial_step > 0).then_some(local.tutorial_step);
            }
            Field::Checklist(key) => {
                let value = local.checklist.get(key).copied().unwrap_or(false);
                canonical.checklist.insert(key.clone(), value);
            }
        }
    }
    if let Some(known) = &local.progress {
        canonical.completed_at = canonical.completed_at.or(known.completed_at);
        canonical.updated_at = canonical.updated_at.max(known.updated_at);
    }
    canonical
}

/// Merge an overtaken response: local values everywhere except `take`.
pub fn merge_superseded(
    local: &OnboardingState,
    canonical: OnboardingProgress,
    take: &BTreeSet<Field>,
) -> OnboardingProgress {
    let keep = [Field::Stage, Field::TutorialStep]
        .into_iter()
        .chain(local.checklist.keys().map(|k| Field::Checklist(k.clone())))
        .filter(|f| !take.contains(f))
        .collect();
    merge(local, canonical, &keep)
}
