//! Order lifecycle and payment status.

use serde::{Deserialize, Serialize};

use super::OrderError;

/// The lifecycle state of an order.
///
/// Allowed transitions:
/// ```text
/// CREATED ─────────┬──► PAYMENT_PENDING ──► PAID ──┐
///     │            │                                ▼
///     └────────────┴──────────────────────► ADMIN_CONFIRMED ──► SHIPPED ──► DELIVERED
///
/// CREATED, PAYMENT_PENDING, PAID, ADMIN_CONFIRMED ──► CANCELLED
/// ```
/// `CANCELLED` and `DELIVERED` accept no further transitions, except that a
/// new payment intent may revive a cancelled order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[default]
    Created,
    PaymentPending,
    Paid,
    AdminConfirmed,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 7] = [
        OrderStatus::Created,
        OrderStatus::PaymentPending,
        OrderStatus::Paid,
        OrderStatus::AdminConfirmed,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    /// States reachable in one step from this one.
    pub fn next_states(&self) -> &'static [OrderStatus] {
        use OrderStatus::*;
        match self {
            Created => &[PaymentPending, AdminConfirmed, Cancelled],
            PaymentPending => &[Paid, Cancelled],
            Paid => &[AdminConfirmed, Cancelled],
            AdminConfirmed => &[Shipped, Cancelled],
            Shipped => &[Delivered],
            Delivered | Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, to: OrderStatus) -> bool {
        self.next_states().contains(&to)
    }

    /// Checks a transition, treating a move to the current state as allowed.
    pub fn ensure_transition(&self, to: OrderStatus) -> Result<(), OrderError> {
        if *self == to || self.can_transition_to(to) {
            Ok(())
        } else {
            Err(OrderError::InvalidTransition { from: *self, to })
        }
    }

    /// Returns true for states no lifecycle move leaves.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// States reached only through the payment flow, never by a status update.
    pub fn is_payment_driven(&self) -> bool {
        matches!(self, OrderStatus::PaymentPending | OrderStatus::Paid)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Created => "CREATED",
            OrderStatus::PaymentPending => "PAYMENT_PENDING",
            OrderStatus::Paid => "PAID",
            OrderStatus::AdminConfirmed => "ADMIN_CONFIRMED",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    /// Parses a status label from a client.
    ///
    /// Accepts the canonical names in any case, plus the older lowercase
    /// labels: `pending`, `confirmed`, `processing`, `shipped`, `delivered`,
    /// `cancelled`.
    pub fn from_label(label: &str) -> Option<OrderStatus> {
        let label = label.trim();
        match label.to_ascii_lowercase().as_str() {
            "pending" => return Some(OrderStatus::Created),
            "confirmed" | "processing" => return Some(OrderStatus::AdminConfirmed),
            _ => {}
        }
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(label))
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the money for an order stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
    /// A paid order was cancelled; the refund itself happens at the gateway.
    Refunded,
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        };
        f.write_str(s)
    }
}

/// How the customer pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    /// Cash on delivery.
    #[default]
    Cod,
    /// Online payment through the payment gateway.
    Gateway,
}

impl PaymentMethod {
    /// Lifecycle state a freshly placed order starts in.
    pub fn initial_status(&self) -> OrderStatus {
        match self {
            PaymentMethod::Cod => OrderStatus::Created,
            PaymentMethod::Gateway => OrderStatus::PaymentPending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_table() {
        use OrderStatus::*;

        let allowed = [
            (Created, PaymentPending),
            (Created, AdminConfirmed),
            (Created, Cancelled),
            (PaymentPending, Paid),
            (PaymentPending, Cancelled),
            (Paid, AdminConfirmed),
            (Paid, Cancelled),
            (AdminConfirmed, Shipped),
            (AdminConfirmed, Cancelled),
            (Shipped, Delivered),
        ];

        for from in OrderStatus::ALL {
            for to in OrderStatus::ALL {
                assert_eq!(
                    from.can_transition_to(to),
                    allowed.contains(&(from, to)),
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn same_status_is_allowed_noop() {
        for status in OrderStatus::ALL {
            assert!(status.ensure_transition(status).is_ok());
        }
    }

    #[test]
    fn illegal_transition_names_both_ends() {
        let err = OrderStatus::Shipped
            .ensure_transition(OrderStatus::Cancelled)
            .unwrap_err();
        assert!(matches!(
            err,
            OrderError::InvalidTransition {
                from: OrderStatus::Shipped,
                to: OrderStatus::Cancelled
            }
        ));
    }

    #[test]
    fn terminal_states() {
        assert!(OrderStatus::Delivered.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(!OrderStatus::Shipped.is_terminal());
    }

    #[test]
    fn legacy_labels_normalize() {
        let cases = [
            ("pending", OrderStatus::Created),
            ("confirmed", OrderStatus::AdminConfirmed),
            ("processing", OrderStatus::AdminConfirmed),
            ("shipped", OrderStatus::Shipped),
            ("delivered", OrderStatus::Delivered),
            ("cancelled", OrderStatus::Cancelled),
            ("PAYMENT_PENDING", OrderStatus::PaymentPending),
            ("admin_confirmed", OrderStatus::AdminConfirmed),
        ];
        for (label, expected) in cases {
            assert_eq!(OrderStatus::from_label(label), Some(expected), "{label}");
        }
        assert_eq!(OrderStatus::from_label("refunded"), None);
    }

    #[test]
    fn serde_uses_canonical_names() {
        let json = serde_json::to_string(&OrderStatus::AdminConfirmed).unwrap();
        assert_eq!(json, "\"ADMIN_CONFIRMED\"");
        assert_eq!(
            serde_json::to_string(&PaymentStatus::Refunded).unwrap(),
            "\"refunded\""
        );
        assert_eq!(
            serde_json::from_str::<PaymentMethod>("\"gateway\"").unwrap(),
            PaymentMethod::Gateway
        );
    }

    #[test]
    fn initial_status_follows_payment_method() {
        assert_eq!(PaymentMethod::Cod.initial_status(), OrderStatus::Created);
        assert_eq!(
            PaymentMethod::Gateway.initial_status(),
            OrderStatus::PaymentPending
        );
    }
}
