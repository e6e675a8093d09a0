//! In-memory roster cache.

use crate::models::Member;

use super::filter_members;

/// Ticket handed out when a refresh starts.
///
/// Tickets increase monotonically; a response carrying a ticket older than the
/// most recently issued one is stale and gets dropped.
///
/// `RosterController::refresh` borrows the controller mutably from
/// `begin_refresh` through `apply`, so its own refreshes never overlap and
/// never go stale. The ticket matters to callers that drive a `RosterCache`
/// directly and fetch outside that borrow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RefreshTicket(u64);

/// Last fetched copy of the collection plus the current search text.
///
/// Contents are only ever replaced wholesale, never patched row by row.
#[derive(Debug, Default)]
pub struct RosterCache {
    members: Vec<Member>,
    query: String,
    latest_ticket: u64,
}

impl RosterCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.id == id)
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
    }

    /// The search-narrowed view, recomputed on every call.
    pub fn filtered(&self) -> Vec<&Member> {
        filter_members(&self.members, &self.query)
    }

    pub fn begin_refresh(&mut self) -> RefreshTicket {
        self.latest_ticket += 1;
        RefreshTicket(self.latest_ticket)
    }

    /// Replace the cache with a fetched collection.
    ///
    /// Returns `false` without touching anything when `ticket` has been
    /// superseded by a newer refresh.
    pub fn apply(&mut self, ticket: RefreshTicket, mut members: Vec<Member>) -> bool {
        if ticket.0 < self.latest_ticket {
            tracing::debug!(
                "Discarding stale refresh {} (latest issued {})",
                ticket.0,
                self.latest_ticket
            );
            return false;
        }

        // Stable, so equal timestamps keep the store's order.
        members.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        self.members = members;
        true
    }
}
