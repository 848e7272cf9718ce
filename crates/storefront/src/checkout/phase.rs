//! Checkout state machine.

use core::fmt;

/// Where a checkout attempt currently is.
///
/// ```text
/// Idle -> Validating -> Failed
///                    -> OrderPersisted -> Complete            (cash on delivery)
///                                      -> AwaitingRedirect    (online payment)
/// AwaitingRedirect -> Resumed -> Complete | Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CheckoutPhase {
    #[default]
    Idle,
    Validating,
    Failed,
    OrderPersisted,
    AwaitingRedirect,
    Resumed,
    Complete,
}

impl CheckoutPhase {
    /// Whether the machine may step from `self` to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle | Self::Failed | Self::Complete, Self::Validating)
                | (Self::Validating, Self::Failed | Self::OrderPersisted)
                | (Self::OrderPersisted, Self::Complete | Self::AwaitingRedirect | Self::Failed)
                | (Self::AwaitingRedirect | Self::Idle, Self::Resumed)
                | (Self::AwaitingRedirect, Self::Validating)
                | (Self::Resumed, Self::Complete | Self::Failed)
        )
    }

    /// Terminal for the current attempt.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Validating => "VALIDATING",
            Self::Failed => "FAILED",
            Self::OrderPersisted => "ORDER_PERSISTED",
            Self::AwaitingRedirect => "AWAITING_REDIRECT",
            Self::Resumed => "RESUMED",
            Self::Complete => "COMPLETE",
        }
    }
}

impl fmt::Display for CheckoutPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
