//! Domain types providing compile-time safety and self-documentation

use std::fmt;

/// Identity of one live timing-thread subscription.
///
/// Ids are small integers, allocated lowest-free-first and reused after
/// release. A `SubscriptionId` is only meaningful while the subscription it
/// names is live; using it after `unsubscribe` yields `NotSubscribed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u32);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub:{}", self.0)
    }
}

/// Opaque identity of a logical execution context (task, coroutine).
///
/// Tokens are compared by identity only. The host adapter decides what a
/// token means (typically a task id); the sampler only ever asks "did it
/// change since the last event?".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextToken(pub u64);

impl fmt::Display for ContextToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx:{}", self.0)
    }
}
