use serde::{Deserialize, Serialize};

/// Monetary amount in minor currency units (paise, cents).
///
/// Every total in the system is integer arithmetic over this type; the only
/// fractional input is a per-km delivery rate, rounded through [`Money::scale`].
///
/// The operators saturate instead of panicking. Amounts derived from client
/// input go through the `checked_*` methods so an overflow is rejected rather
/// than clamped.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    /// Builds an amount from whole major units (rupees, dollars).
    pub fn from_major(major: i64) -> Self {
        Self(major.saturating_mul(100))
    }

    pub fn minor(&self) -> i64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Price of `quantity` units at this unit price, saturating at the `i64`
    /// bounds. Use [`Money::checked_times`] where overflow must be rejected.
    pub fn times(&self, quantity: u32) -> Money {
        Money(self.0.saturating_mul(i64::from(quantity)))
    }

    /// Price of `quantity` units, or `None` if it does not fit.
    pub fn checked_times(&self, quantity: u32) -> Option<Money> {
        self.0.checked_mul(i64::from(quantity)).map(Money)
    }

    pub fn checked_add(&self, rhs: Money) -> Option<Money> {
        self.0.checked_add(rhs.0).map(Money)
    }

    /// Sums amounts, or `None` if any partial sum overflows.
    pub fn checked_sum<I: IntoIterator<Item = Money>>(amounts: I) -> Option<Money> {
        amounts
            .into_iter()
            .try_fold(Money::ZERO, |acc, amount| acc.checked_add(amount))
    }

    /// Multiplies by a fractional factor, rounding half away from zero.
    ///
    /// Float-to-integer casts saturate, so an out-of-range product clamps to
    /// the `i64` bounds. Use [`Money::checked_scale`] to reject it instead.
    pub fn scale(&self, factor: f64) -> Money {
        Money((self.0 as f64 * factor).round() as i64)
    }

    /// Like [`Money::scale`], but `None` when the factor is not finite or the
    /// rounded product falls outside the `i64` range.
    pub fn checked_scale(&self, factor: f64) -> Option<Money> {
        let product = (self.0 as f64 * factor).round();
        // i64::MAX as f64 rounds up to 2^63, which is itself out of range.
        if !product.is_finite() || product >= i64::MAX as f64 || product < i64::MIN as f64 {
            return None;
        }
        Some(Money(product as i64))
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money(self.0.saturating_add(rhs.0))
    }
}

impl std::ops::Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Self) -> Self::Output {
        Money(self.0.saturating_sub(rhs.0))
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}
