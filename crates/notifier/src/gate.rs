//! Preference gate — decides which channels an alert may use for a recipient.
//!
//! Severity never widens or narrows the set: every alert uses the same rule,
//! opted in AND reachable. Severity only changes how payloads are rendered.

use std::collections::BTreeSet;

use sentinel_common::types::{Alert, Channel, Recipient};

pub struct PreferenceGate;

impl PreferenceGate {
    /// Channels with the enablement flag set and a non-empty contact.
    pub fn eligible_channels(recipient: &Recipient, _alert: &Alert) -> BTreeSet<Channel> {
        Channel::ALL
            .into_iter()
            .filter(|&channel| recipient.preference(channel).is_deliverable())
            .collect()
    }
}
