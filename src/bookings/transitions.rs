//! Booking status state machine.
//!
//! `pending -> confirmed -> completed`, with `cancelled` reachable from
//! `pending` or `confirmed`. `cancelled` and `completed` are terminal.

use time::Date;
use uuid::Uuid;

use crate::{
    auth::{AuthUser, Role},
    bookings::repo_types::BookingStatus::{self, *},
    error::{ServiceError, ServiceResult},
};

pub const ALREADY_CANCELLED: &str = "booking is already cancelled";
pub const CANCEL_COMPLETED: &str = "cannot cancel completed booking";
pub const CANCEL_FORBIDDEN: &str = "unauthorized to cancel this booking";
pub const CONFIRM_FORBIDDEN: &str = "only the host can confirm bookings";
pub const CONFIRM_NOT_PENDING: &str = "only pending bookings can be confirmed";
pub const COMPLETE_FORBIDDEN: &str = "only the host can mark bookings as completed";
pub const COMPLETE_NOT_CONFIRMED: &str = "only confirmed bookings can be marked as completed";
pub const COMPLETE_TOO_EARLY: &str = "booking cannot be completed before check-out date";
pub const INVALID_STATUS: &str = "invalid booking status";

/// The relationship a requester has with one booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Guest,
    Host,
    Admin,
}

/// Every capacity a requester holds on a booking. A host booking their own
/// listing is both guest and host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Parties {
    pub guest: bool,
    pub host: bool,
    pub admin: bool,
}

impl Parties {
    pub fn of(user: &AuthUser, guest_id: Uuid, host_id: Uuid) -> Self {
        Self {
            guest: user.id == guest_id,
            host: user.id == host_id,
            admin: match user.role {
                Role::Admin => true,
                Role::Guest | Role::Host => false,
            },
        }
    }

    pub fn any(self) -> bool {
        self.guest || self.host || self.admin
    }

    pub fn holds(self, actor: Actor) -> bool {
        match actor {
            Actor::Guest => self.guest,
            Actor::Host => self.host,
            Actor::Admin => self.admin,
        }
    }

    fn holds_any(self, actors: &[Actor]) -> bool {
        actors.iter().any(|a| self.holds(*a))
    }
}

struct Rule {
    from: BookingStatus,
    to: BookingStatus,
    by: &'static [Actor],
}

const RULES: &[Rule] = &[
    Rule {
        from: Pending,
        to: Confirmed,
        by: &[Actor::Host, Actor::Admin],
    },
    Rule {
        from: Pending,
        to: Cancelled,
        by: &[Actor::Guest, Actor::Host, Actor::Admin],
    },
    Rule {
        from: Confirmed,
        to: Cancelled,
        by: &[Actor::Host, Actor::Admin],
    },
    Rule {
        from: Confirmed,
        to: Completed,
        by: &[Actor::Host, Actor::Admin],
    },
];

fn forbidden_for(to: BookingStatus) -> ServiceError {
    ServiceError::forbidden(match to {
        Confirmed => CONFIRM_FORBIDDEN,
        Completed => COMPLETE_FORBIDDEN,
        Cancelled | Pending => CANCEL_FORBIDDEN,
    })
}

fn wrong_state(from: BookingStatus, to: BookingStatus) -> ServiceError {
    ServiceError::conflict(match (from, to) {
        (_, Confirmed) => CONFIRM_NOT_PENDING,
        (_, Completed) => COMPLETE_NOT_CONFIRMED,
        (Completed, _) => CANCEL_COMPLETED,
        _ => ALREADY_CANCELLED,
    })
}

/// Decides a status change requested through a booking update.
///
/// Authorization for the target is judged first, then the current state,
/// then the actors allowed on that specific edge.
pub fn check(from: BookingStatus, to: BookingStatus, who: Parties) -> ServiceResult<()> {
    if to == Pending {
        return Err(ServiceError::invalid(INVALID_STATUS));
    }

    let may_reach_target = RULES
        .iter()
        .filter(|r| r.to == to)
        .any(|r| who.holds_any(r.by));
    if !may_reach_target {
        return Err(forbidden_for(to));
    }

    let rule = RULES
        .iter()
        .find(|r| r.from == from && r.to == to)
        .ok_or_else(|| wrong_state(from, to))?;
    if !who.holds_any(rule.by) {
        return Err(forbidden_for(to));
    }
    Ok(())
}

/// Completion also waits for the stay to end.
pub fn ensure_stay_ended(check_out: Date, today: Date) -> ServiceResult<()> {
    if today < check_out {
        return Err(ServiceError::conflict(COMPLETE_TOO_EARLY));
    }
    Ok(())
}

/// The dedicated cancel action: any party may cancel a booking that has not
/// reached a terminal state.
pub fn check_cancel(from: BookingStatus, who: Parties) -> ServiceResult<()> {
    if !who.any() {
        return Err(ServiceError::forbidden(CANCEL_FORBIDDEN));
    }
    if from.is_terminal() {
        return Err(wrong_state(from, Cancelled));
    }
    Ok(())
}
