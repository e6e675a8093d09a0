//! Search filter over the cached roster.

use crate::models::Member;

/// Members whose full name contains `query`, ignoring case.
///
/// An empty query keeps every member. Order is always preserved.
pub fn filter_members<'a>(members: &'a [Member], query: &str) -> Vec<&'a Member> {
    if query.is_empty() {
        return members.iter().collect();
    }

    let needle = query.to_lowercase();
    members
        .iter()
        .filter(|member| member.full_name.to_lowercase().contains(&needle))
        .collect()
}
