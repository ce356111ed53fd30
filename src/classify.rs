//! Classification of withdrawal rejections.
//!
//! The exchange reports settlement conditions only as free-text revert
//! reasons. This module is the single place that reads that text; the
//! rest of the crate works with [`Classification`].
//!
//! Matching rules, checked in order:
//!
//! 1. `NOT_YET_COMPLETED_PREV` or `previous withdraw has not been completed`
//!    anywhere in the text: [`Classification::AlreadyPendingPrevious`].
//!    Takes precedence over the delta template below.
//! 2. `(for now its <block_delta> and <time_delta>)`: both values are the
//!    amounts already elapsed since the request, in blocks and seconds.
//!    [`Classification::TooEarly`] when both parse as `u64`,
//!    [`Classification::Unclassified`] otherwise.
//! 3. Anything else: [`Classification::Unclassified`].

use std::sync::LazyLock;

use regex::Regex;

const PENDING_PREVIOUS_MARKERS: [&str; 2] = [
    "NOT_YET_COMPLETED_PREV",
    "previous withdraw has not been completed",
];

static TOO_EARLY_TEMPLATE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\(for now its\s+([^\s()]+)\s+and\s+([^\s()]+)\s*\)").ok());

/// Structured meaning of a rejection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Classification {
    /// Not a condition the settlement flow can recover from.
    Unclassified,
    /// A previous withdrawal of the same token is still outstanding.
    AlreadyPendingPrevious,
    /// Settlement window not elapsed yet; deltas are what already passed.
    TooEarly { block_delta: u64, time_delta: u64 },
}

/// Classifies the rejection text. Never fails.
pub fn classify(message: &str) -> Classification {
    if PENDING_PREVIOUS_MARKERS
        .iter()
        .any(|marker| message.contains(marker))
    {
        return Classification::AlreadyPendingPrevious;
    }

    let Some(captures) = TOO_EARLY_TEMPLATE
        .as_ref()
        .and_then(|template| template.captures(message))
    else {
        return Classification::Unclassified;
    };

    let block_delta = captures.get(1).and_then(|m| m.as_str().parse::<u64>().ok());
    let time_delta = captures.get(2).and_then(|m| m.as_str().parse::<u64>().ok());
    match (block_delta, time_delta) {
        (Some(block_delta), Some(time_delta)) => Classification::TooEarly {
            block_delta,
            time_delta,
        },
        _ => Classification::Unclassified,
    }
}
