use uuid::Uuid;

use crate::engine::otp::{self, OtpIssuer};
use crate::error::AppError;
use crate::models::order::{DeliveryOrder, OrderStatus};
use crate::models::user::{Actor, Role};

#[derive(Debug, Clone, Default)]
pub struct TransitionRequest {
    pub status: Option<OrderStatus>,
    pub otp: Option<String>,
    pub courier: Option<Uuid>,
}

impl TransitionRequest {
    pub fn to(status: OrderStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn with_otp(mut self, otp: impl Into<String>) -> Self {
        self.otp = Some(otp.into());
        self
    }

    pub fn with_courier(mut self, courier: Uuid) -> Self {
        self.courier = Some(courier);
        self
    }

    fn requested(&self) -> Result<OrderStatus, AppError> {
        self.status
            .ok_or_else(|| AppError::Validation("status is required".to_string()))
    }
}

/// Which code path applied a status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionPath {
    /// A row of the transition table, with its guard and side effect.
    Guarded,
    /// A plain status write outside the table.
    Direct,
}

impl TransitionPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionPath::Guarded => "guarded",
            TransitionPath::Direct => "direct",
        }
    }
}

pub fn authorize(
    actor: &Actor,
    order: &DeliveryOrder,
    request: &TransitionRequest,
) -> Result<(), AppError> {
    match actor.role {
        Role::Admin => Ok(()),
        Role::Courier => {
            if order.assigned_courier != Some(actor.id) {
                return Err(AppError::Forbidden(
                    "order is not assigned to this courier".to_string(),
                ));
            }
            if request.courier.is_some() {
                return Err(AppError::Forbidden(
                    "only admins can assign couriers".to_string(),
                ));
            }
            Ok(())
        }
        Role::Customer => {
            if order.requester != actor.id {
                return Err(AppError::Forbidden(
                    "order belongs to another customer".to_string(),
                ));
            }
            if request.courier.is_some() {
                return Err(AppError::Forbidden(
                    "only admins can assign couriers".to_string(),
                ));
            }
            match request.requested()? {
                OrderStatus::Delivered => Ok(()),
                OrderStatus::Cancelled if !order.status.is_terminal() => Ok(()),
                OrderStatus::Cancelled => Err(AppError::Forbidden(format!(
                    "a {} order can no longer be cancelled",
                    order.status
                ))),
                _ => Err(AppError::Forbidden(
                    "customers may only confirm delivery or cancel".to_string(),
                )),
            }
        }
    }
}

/// Applies exactly one status change to `order`, all or nothing.
///
/// A supplied courier is taken on every path. `in_transit` always issues a
/// fresh code and `delivered` always demands the pending one, whatever the
/// current status. Pairs outside the table become direct writes that still
/// keep the OTP fields consistent.
pub fn apply(
    order: &mut DeliveryOrder,
    request: &TransitionRequest,
    issuer: &dyn OtpIssuer,
) -> Result<TransitionPath, AppError> {
    let requested = request.requested()?;

    let mut next = order.clone();
    if let Some(courier) = request.courier {
        next.assigned_courier = Some(courier);
    }

    let path = match (order.status, requested) {
        (_, OrderStatus::InTransit) => {
            require_courier(&next, requested)?;
            next.delivery_otp = Some(issuer.issue());
            next.otp_verified = false;
            TransitionPath::Guarded
        }
        (_, OrderStatus::Delivered) => {
            otp::verify(order.delivery_otp.as_deref(), request.otp.as_deref())?;
            require_courier(&next, requested)?;
            next.delivery_otp = None;
            next.otp_verified = true;
            TransitionPath::Guarded
        }
        (OrderStatus::Created, OrderStatus::Assigned) => {
            if next.assigned_courier.is_none() {
                return Err(AppError::Validation(
                    "a courier is required to assign an order".to_string(),
                ));
            }
            TransitionPath::Guarded
        }
        (OrderStatus::Assigned, OrderStatus::Picked) => {
            require_courier(&next, requested)?;
            TransitionPath::Guarded
        }
        (from, OrderStatus::Cancelled) if !from.is_terminal() => {
            clear_otp(&mut next);
            TransitionPath::Guarded
        }
        (_, to) => {
            require_courier(&next, to)?;
            clear_otp(&mut next);
            TransitionPath::Direct
        }
    };

    next.status = requested;
    *order = next;
    Ok(path)
}

/// A status write that never runs the OTP machinery.
pub fn apply_direct(order: &mut DeliveryOrder, status: OrderStatus) -> Result<(), AppError> {
    if matches!(status, OrderStatus::InTransit | OrderStatus::Delivered) {
        return Err(AppError::Validation(format!(
            "status {status} can only be reached through a status transition"
        )));
    }
    require_courier(order, status)?;
    clear_otp(order);
    order.status = status;
    Ok(())
}

fn require_courier(order: &DeliveryOrder, status: OrderStatus) -> Result<(), AppError> {
    if status.requires_courier() && order.assigned_courier.is_none() {
        return Err(AppError::Validation(format!(
            "order needs an assigned courier before it can be {status}"
        )));
    }
    Ok(())
}

fn clear_otp(order: &mut DeliveryOrder) {
    order.delivery_otp = None;
    order.otp_verified = false;
}
