//! Subscription management

use kraken_types::{Depth, SubscriptionRequest};
use std::collections::{BTreeMap, HashMap};

/// Lifecycle of one pair's book subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairState {
    /// Subscribe sent, no confirmation yet
    Pending,
    /// Server confirmed the subscription
    Active {
        /// Channel ID for data arrays, if the server sent one
        channel_id: Option<u64>,
    },
    /// Unsubscribe sent, no confirmation yet
    Unsubscribing,
    /// Server rejected the subscription
    Rejected,
    /// Not subscribed
    Inactive,
}

impl PairState {
    /// Returns true if the server is streaming book data for the pair
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active { .. })
    }
}

/// Tracks book subscriptions for every configured pair
///
/// Request IDs are assigned here so replies can be correlated in logs; the
/// desired pair set is kept for restoration after reconnect.
#[derive(Debug)]
pub struct SubscriptionManager {
    depth: Depth,
    pairs: BTreeMap<String, PairState>,
    channels: HashMap<u64, String>,
    next_req_id: u64,
}

impl SubscriptionManager {
    /// Create a manager for `pairs` at `depth`, all inactive
    pub fn new<I, S>(pairs: I, depth: Depth) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            depth,
            pairs: pairs
                .into_iter()
                .map(|p| (p.into(), PairState::Inactive))
                .collect(),
            channels: HashMap::new(),
            next_req_id: 1,
        }
    }

    /// Subscribed depth
    pub fn depth(&self) -> Depth {
        self.depth
    }

    /// Configured pairs in sorted order
    pub fn pairs(&self) -> impl Iterator<Item = &str> {
        self.pairs.keys().map(String::as_str)
    }

    /// Get number of tracked pairs
    pub fn count(&self) -> usize {
        self.pairs.len()
    }

    /// One batched subscribe for every configured pair (for restoration)
    ///
    /// Channel IDs from the previous connection are forgotten.
    pub fn restoration_requests(&mut self) -> Vec<SubscriptionRequest> {
        self.channels.clear();
        if self.pairs.is_empty() {
            return Vec::new();
        }
        let pairs: Vec<String> = self.pairs.keys().cloned().collect();
        vec![self.track(SubscriptionRequest::subscribe(pairs, self.depth))]
    }

    /// Assign a request ID and move the named pairs to the matching state
    pub fn track(&mut self, request: SubscriptionRequest) -> SubscriptionRequest {
        let req_id = self.next_req_id;
        self.next_req_id += 1;

        let next = if request.is_subscribe() {
            PairState::Pending
        } else {
            PairState::Unsubscribing
        };
        for pair in &request.pair {
            if let Some(PairState::Active {
                channel_id: Some(id),
            }) = self.pairs.get(pair)
            {
                self.channels.remove(id);
            }
            self.pairs.insert(pair.clone(), next);
        }
        request.with_reqid(req_id)
    }

    /// Mark a pair's subscription as confirmed
    pub fn confirm(&mut self, pair: &str, channel_id: Option<u64>) {
        if let Some(id) = channel_id {
            self.channels.insert(id, pair.to_string());
        }
        self.pairs
            .insert(pair.to_string(), PairState::Active { channel_id });
    }

    /// Mark a pair as unsubscribed
    ///
    /// A pair already re-subscribed (pending) stays pending; the unsubscribe
    /// confirmation of a resync can arrive after the new subscribe was sent.
    pub fn mark_unsubscribed(&mut self, pair: &str) {
        if let Some(state) = self.pairs.get_mut(pair) {
            match *state {
                PairState::Pending => {}
                PairState::Active {
                    channel_id: Some(id),
                } => {
                    self.channels.remove(&id);
                    *state = PairState::Inactive;
                }
                _ => *state = PairState::Inactive,
            }
        }
    }

    /// Mark a pair's subscription as rejected
    pub fn reject(&mut self, pair: &str) {
        if let Some(state) = self.pairs.get_mut(pair) {
            *state = PairState::Rejected;
        }
    }

    /// Mark every pair inactive (connection lost)
    pub fn deactivate_all(&mut self) {
        self.channels.clear();
        for state in self.pairs.values_mut() {
            *state = PairState::Inactive;
        }
    }

    /// State of one pair, `None` if it is not configured
    pub fn state(&self, pair: &str) -> Option<PairState> {
        self.pairs.get(pair).copied()
    }

    /// Pairs with a confirmed subscription
    pub fn active_pairs(&self) -> Vec<String> {
        self.pairs
            .iter()
            .filter(|(_, s)| s.is_active())
            .map(|(p, _)| p.clone())
            .collect()
    }

    /// Check if any subscriptions are pending confirmation
    pub fn has_pending(&self) -> bool {
        self.pairs.values().any(|s| *s == PairState::Pending)
    }

    /// Pair for a data channel ID
    pub fn pair_for_channel(&self, channel_id: u64) -> Option<&str> {
        self.channels.get(&channel_id).map(String::as_str)
    }
}
