//! Delivery charge calculation.

use common::Money;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// One step of the distance-based delivery tariff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliverySlab {
    pub min_distance_km: f64,
    pub charge: Money,
}

/// Store-wide delivery settings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DeliverySettings {
    /// Orders whose line subtotal reaches this amount ship free.
    #[serde(default)]
    pub free_delivery_threshold: Option<Money>,

    /// Deliveries within this distance ship free.
    #[serde(default)]
    pub free_distance_km: Option<f64>,

    /// Charge per kilometre when no slab applies.
    #[serde(default)]
    pub per_km_rate: Money,

    #[serde(default)]
    pub slabs: Vec<DeliverySlab>,
}

impl DeliverySettings {
    /// The slab with the greatest `min_distance_km` not above `distance_km`.
    pub fn slab_for(&self, distance_km: f64) -> Option<&DeliverySlab> {
        let mut slabs: Vec<&DeliverySlab> = self.slabs.iter().collect();
        slabs.sort_by(|a, b| a.min_distance_km.total_cmp(&b.min_distance_km));
        slabs
            .into_iter()
            .rev()
            .find(|slab| slab.min_distance_km <= distance_km)
    }
}

/// Longest delivery distance accepted, roughly half the Earth's circumference.
pub const MAX_DELIVERY_DISTANCE_KM: f64 = 20_000.0;

/// Computes the delivery charge for an order.
///
/// Rules, first match wins:
/// 1. no settings configured: free
/// 2. subtotal at or above the free-delivery threshold: free
/// 3. distance within the free distance: free
/// 4. the matching slab's charge
/// 5. the manual override if one was supplied, else distance × per-km rate
pub fn delivery_charge(
    subtotal: Money,
    distance_km: f64,
    settings: Option<&DeliverySettings>,
    manual_override: Option<Money>,
) -> Result<Money, DomainError> {
    if !distance_km.is_finite() || distance_km < 0.0 {
        return Err(DomainError::validation(format!(
            "distance must be a non-negative number of kilometres, got {distance_km}"
        )));
    }
    if distance_km > MAX_DELIVERY_DISTANCE_KM {
        return Err(DomainError::validation(format!(
            "distance must be at most {MAX_DELIVERY_DISTANCE_KM} km, got {distance_km}"
        )));
    }
    if let Some(charge) = manual_override
        && charge.is_negative()
    {
        return Err(DomainError::validation(format!(
            "delivery charge override must not be negative, got {charge}"
        )));
    }

    let Some(settings) = settings else {
        return Ok(Money::ZERO);
    };

    if let Some(threshold) = settings.free_delivery_threshold
        && subtotal >= threshold
    {
        return Ok(Money::ZERO);
    }

    if let Some(free_distance) = settings.free_distance_km
        && distance_km <= free_distance
    {
        return Ok(Money::ZERO);
    }

    if let Some(slab) = settings.slab_for(distance_km) {
        return Ok(slab.charge);
    }

    if let Some(charge) = manual_override {
        return Ok(charge);
    }
    settings.per_km_rate.checked_scale(distance_km).ok_or_else(|| {
        DomainError::validation(format!(
            "delivery charge for {distance_km} km at {} per km is out of range",
            settings.per_km_rate
        ))
    })
}
