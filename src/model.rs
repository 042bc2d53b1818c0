//! Invoice records produced by an extraction.
//!
//! Every field is optional: `None` is the null marker the model returns for
//! attributes it cannot see on the page. These types are what callers work
//! with; the contract sent to the model lives in [`crate::schema`] and is
//! mapped onto these records by [`crate::schema::map_invoice`].

use serde::{Deserialize, Serialize};

/// Postal address of a care provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
}

/// The party that provided the invoiced services.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CareProvider {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<Address>,
}

/// One line item on the invoice.
///
/// `rate` is kept as free-form text ("50.00", "$50/hr"); `price` and `amount`
/// are whatever number the model read, without currency parsing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub date: Option<String>,
    pub quantity: Option<i64>,
    pub rate: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub amount: Option<f64>,
}

/// Root extraction record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub care_provider: Option<CareProvider>,
    pub date: Option<String>,
    pub location: Option<String>,
    /// Line items in page order. `None` when the model reported no list at
    /// all, `Some(vec![])` when it reported an empty one.
    pub services: Option<Vec<Service>>,
    pub total_amount: Option<String>,
}

impl Invoice {
    /// `true` when the model filled in nothing at all.
    pub fn is_empty(&self) -> bool {
        *self == Invoice::default()
    }

    /// Number of line items (zero when `services` is `None`).
    pub fn service_count(&self) -> usize {
        self.services.as_ref().map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_invoice_is_empty() {
        assert!(Invoice::default().is_empty());
        let inv = Invoice {
            location: Some("Springfield".into()),
            ..Default::default()
        };
        assert!(!inv.is_empty());
    }

    #[test]
    fn service_count_treats_null_as_zero() {
        let mut inv = Invoice::default();
        assert_eq!(inv.service_count(), 0);
        inv.services = Some(vec![Service::default(), Service::default()]);
        assert_eq!(inv.service_count(), 2);
    }
}
