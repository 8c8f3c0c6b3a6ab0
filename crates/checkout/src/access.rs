//! Who is calling, and what they may touch.

use common::UserId;
use domain::Order;

use crate::error::{CheckoutError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Customer,
    Admin,
}

/// The authenticated caller of a checkout operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: UserId,
    pub role: Role,
}

impl Caller {
    pub fn customer(user_id: UserId) -> Self {
        Self {
            user_id,
            role: Role::Customer,
        }
    }

    pub fn admin(user_id: UserId) -> Self {
        Self {
            user_id,
            role: Role::Admin,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Owners and admins may read and act on an order.
    pub fn ensure_can_access(&self, order: &Order) -> Result<()> {
        if self.is_admin() || order.is_owned_by(self.user_id) {
            Ok(())
        } else {
            Err(CheckoutError::Forbidden(
                "order belongs to another user".to_string(),
            ))
        }
    }

    pub fn ensure_admin(&self) -> Result<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(CheckoutError::Forbidden("admin role required".to_string()))
        }
    }
}
