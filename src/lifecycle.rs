//! Order status transitions and who may trigger them.
//!
//! ```text
//! cart -> pending -> paid -> ready -> delivered
//!            \
//!             -> canceled
//! ```

use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::OrderStatus,
};

/// Who is asking for a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Owner(Uuid),
    Admin(Uuid),
    /// Payment confirmation (webhook or manual reconciliation).
    System,
}

impl Actor {
    pub fn from_user(user: &AuthUser) -> Self {
        if user.is_admin() {
            Actor::Admin(user.user_id)
        } else {
            Actor::Owner(user.user_id)
        }
    }

    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Actor::Owner(id) | Actor::Admin(id) => Some(*id),
            Actor::System => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Checkout,
    MarkPaid,
    Cancel,
    MarkReady,
    MarkDelivered,
}

/// Outcome of checking an action against the current status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Apply,
    /// The order is already in the target status; nothing to write.
    AlreadyApplied,
}

impl Action {
    pub fn from_status(&self) -> OrderStatus {
        match self {
            Action::Checkout => OrderStatus::Cart,
            Action::MarkPaid | Action::Cancel => OrderStatus::Pending,
            Action::MarkReady => OrderStatus::Paid,
            Action::MarkDelivered => OrderStatus::Ready,
        }
    }

    pub fn to_status(&self) -> OrderStatus {
        match self {
            Action::Checkout => OrderStatus::Pending,
            Action::MarkPaid => OrderStatus::Paid,
            Action::Cancel => OrderStatus::Canceled,
            Action::MarkReady => OrderStatus::Ready,
            Action::MarkDelivered => OrderStatus::Delivered,
        }
    }

    pub fn permits(&self, actor: &Actor) -> bool {
        match (self, actor) {
            (Action::Checkout, Actor::Owner(_)) => true,
            (Action::MarkPaid, Actor::System) => true,
            (Action::Cancel, Actor::Owner(_) | Actor::Admin(_)) => true,
            (Action::MarkReady | Action::MarkDelivered, Actor::Admin(_)) => true,
            _ => false,
        }
    }

    pub fn event_type(&self, actor: &Actor) -> &'static str {
        match (self, actor) {
            (Action::Checkout, _) => "checkout_started",
            (Action::MarkPaid, _) => "order_paid",
            (Action::Cancel, Actor::Admin(_)) => "order_canceled_admin",
            (Action::Cancel, _) => "order_canceled",
            (Action::MarkReady, _) => "order_ready",
            (Action::MarkDelivered, _) => "order_delivered",
        }
    }

    fn precondition_message(&self) -> &'static str {
        match self {
            Action::Checkout => "Cart already checked out",
            Action::MarkPaid => "Order is not pending payment",
            Action::Cancel => "Only pending orders can be canceled",
            Action::MarkReady => "Order must be paid before marking ready",
            Action::MarkDelivered => "Order must be ready before marking delivered",
        }
    }
}

/// Decide whether `action` can run against an order currently in `current`.
///
/// Repeating an action whose target is already reached is a no-op success;
/// anything else that does not start from the action's source status is a
/// state conflict.
pub fn plan(current: OrderStatus, action: Action) -> AppResult<Step> {
    if current == action.to_status() && action != Action::Checkout {
        return Ok(Step::AlreadyApplied);
    }
    if current != action.from_status() {
        return Err(AppError::state(action.precondition_message()));
    }
    Ok(Step::Apply)
}

/// Role check followed by [`plan`].
pub fn authorize(current: OrderStatus, action: Action, actor: &Actor) -> AppResult<Step> {
    if !action.permits(actor) {
        return Err(AppError::Forbidden);
    }
    plan(current, action)
}
