//! The response contract sent to the model, and the mapping back from it.
//!
//! [`SchemaDescriptor::invoice`] is a JSON Schema describing the fields of
//! [`Invoice`] (names, types, nesting and per-field descriptions). It is
//! handed to the completion service, which uses it either as a forced
//! function tool or as a `response_format`.
//!
//! The service answers with plain JSON. [`map_invoice`] walks that JSON and
//! builds the record explicitly instead of trusting a derive:
//!
//! * absent keys and `null` both become `None`
//! * unknown keys are ignored
//! * scalars are coerced leniently: a string field accepts a number
//!   (`100` → `"100"`), an integer field accepts `2.0` or `"2"` and truncates
//!   `1.5` to `1`, a float field accepts `50` or `"50.00"`
//! * anything else is a [`InvoiceError::SchemaViolation`] naming the JSON path,
//!   e.g. `services[0].quantity: expected integer, got string "two"`

use crate::error::InvoiceError;
use crate::model::{Address, CareProvider, Invoice, Service};
use serde_json::{json, Map, Value};
use tracing::warn;

/// A named JSON Schema the service must conform to.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaDescriptor {
    /// Tool / schema name, e.g. `"Invoice"`.
    pub name: String,
    /// One-line description shown to the model.
    pub description: String,
    /// The JSON Schema object itself.
    pub parameters: Value,
}

impl SchemaDescriptor {
    /// The descriptor for the root [`Invoice`] record.
    pub fn invoice() -> Self {
        Self {
            name: "Invoice".to_string(),
            description: "Structured data extracted from a care provider invoice.".to_string(),
            parameters: invoice_schema(),
        }
    }

    /// Pretty-printed schema, for embedding into a free-form prompt.
    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(&self.parameters).unwrap_or_else(|_| self.parameters.to_string())
    }
}

fn nullable(ty: &str, description: &str) -> Value {
    json!({ "type": [ty, "null"], "description": description })
}

fn address_schema() -> Value {
    json!({
        "type": ["object", "null"],
        "description": "The address of the care provider",
        "properties": {
            "street": nullable("string", "Address street"),
            "city": nullable("string", "Address city"),
            "state": nullable("string", "Address state"),
            "zip": nullable("string", "Address zip code"),
        }
    })
}

fn care_provider_schema() -> Value {
    json!({
        "type": ["object", "null"],
        "description": "The care provider who provided the service",
        "properties": {
            "name": nullable("string", "The name of the care provider"),
            "phone": nullable("string", "The phone number of the care provider"),
            "address": address_schema(),
        }
    })
}

fn service_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "date": nullable("string", "The date the service was provided"),
            "quantity": nullable("integer", "The quantity of the service"),
            "rate": nullable("string", "The rate of the service"),
            "description": nullable("string", "The description of the service"),
            "price": nullable("number", "The price of the service"),
            "amount": nullable("number", "The amount of the service"),
        }
    })
}

fn invoice_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "care_provider": care_provider_schema(),
            "date": nullable("string", "The date of the invoice"),
            "location": nullable("string", "The location of the invoice"),
            "services": {
                "type": ["array", "null"],
                "description": "The services provided by the care provider",
                "items": service_schema(),
            },
            "total_amount": nullable("string", "The total amount of the invoice"),
        }
    })
}

// ── Mapping ──────────────────────────────────────────────────────────────

/// Map a service reply onto an [`Invoice`].
pub fn map_invoice(value: &Value) -> Result<Invoice, InvoiceError> {
    let root = match value {
        Value::Object(map) => Fields::new(map, "$".to_string()),
        other => {
            return Err(InvoiceError::schema(format!(
                "$: expected object, got {}",
                describe(other)
            )))
        }
    };

    let care_provider = match root.object("care_provider")? {
        Some(cp) => Some(map_care_provider(&cp)?),
        None => None,
    };

    let services = match root.array("services")? {
        Some((path, items)) => Some(
            items
                .iter()
                .enumerate()
                .map(|(i, item)| map_service(item, format!("{path}[{i}]")))
                .collect::<Result<Vec<_>, _>>()?,
        ),
        None => None,
    };

    Ok(Invoice {
        care_provider,
        date: root.string("date")?,
        location: root.string("location")?,
        services,
        total_amount: root.string("total_amount")?,
    })
}

/// Parse raw reply text and map it. A body that is not JSON at all is a
/// schema violation, not a transport error.
pub fn map_invoice_str(text: &str) -> Result<Invoice, InvoiceError> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| InvoiceError::schema(format!("reply is not valid JSON: {e}")))?;
    map_invoice(&value)
}

fn map_care_provider(fields: &Fields<'_>) -> Result<CareProvider, InvoiceError> {
    let address = match fields.object("address")? {
        Some(addr) => Some(Address {
            street: addr.string("street")?,
            city: addr.string("city")?,
            state: addr.string("state")?,
            zip: addr.string("zip")?,
        }),
        None => None,
    };

    Ok(CareProvider {
        name: fields.string("name")?,
        phone: fields.string("phone")?,
        address,
    })
}

fn map_service(value: &Value, path: String) -> Result<Service, InvoiceError> {
    let fields = match value {
        Value::Object(map) => Fields::new(map, path),
        // A null entry in the list carries no information; keep the slot so
        // positions still line up with the page.
        Value::Null => return Ok(Service::default()),
        other => {
            return Err(InvoiceError::schema(format!(
                "{path}: expected object, got {}",
                describe(other)
            )))
        }
    };

    Ok(Service {
        date: fields.string("date")?,
        quantity: fields.integer("quantity")?,
        rate: fields.string("rate")?,
        description: fields.string("description")?,
        price: fields.float("price")?,
        amount: fields.float("amount")?,
    })
}

/// A JSON object together with its path from the root, for error messages.
struct Fields<'a> {
    map: &'a Map<String, Value>,
    path: String,
}

impl<'a> Fields<'a> {
    fn new(map: &'a Map<String, Value>, path: String) -> Self {
        Self { map, path }
    }

    fn child_path(&self, key: &str) -> String {
        if self.path == "$" {
            key.to_string()
        } else {
            format!("{}.{}", self.path, key)
        }
    }

    /// The value under `key`, treating `null` the same as a missing key.
    fn get(&self, key: &str) -> Option<&'a Value> {
        self.map.get(key).filter(|v| !v.is_null())
    }

    fn mismatch(&self, key: &str, expected: &str, got: &Value) -> InvoiceError {
        InvoiceError::schema(format!(
            "{}: expected {expected}, got {}",
            self.child_path(key),
            describe(got)
        ))
    }

    fn string(&self, key: &str) -> Result<Option<String>, InvoiceError> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(Value::Number(n)) => Ok(Some(n.to_string())),
            Some(Value::Bool(b)) => Ok(Some(b.to_string())),
            Some(other) => Err(self.mismatch(key, "string", other)),
        }
    }

    fn integer(&self, key: &str) -> Result<Option<i64>, InvoiceError> {
        let Some(value) = self.get(key) else {
            return Ok(None);
        };
        let parsed = match value {
            Value::Number(n) => n.as_i64().or_else(|| {
                let f = n.as_f64()?;
                integral(f).or_else(|| {
                    let truncated = integral(f.trunc())?;
                    warn!(
                        "{}: truncating {f} to {truncated}",
                        self.child_path(key)
                    );
                    Some(truncated)
                })
            }),
            Value::String(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().and_then(integral))
            }
            _ => None,
        };
        parsed
            .map(Some)
            .ok_or_else(|| self.mismatch(key, "integer", value))
    }

    fn float(&self, key: &str) -> Result<Option<f64>, InvoiceError> {
        let Some(value) = self.get(key) else {
            return Ok(None);
        };
        let parsed = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
            _ => None,
        };
        parsed
            .map(Some)
            .ok_or_else(|| self.mismatch(key, "number", value))
    }

    fn object(&self, key: &str) -> Result<Option<Fields<'a>>, InvoiceError> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Object(map)) => Ok(Some(Fields::new(map, self.child_path(key)))),
            Some(other) => Err(self.mismatch(key, "object", other)),
        }
    }

    fn array(&self, key: &str) -> Result<Option<(String, &'a Vec<Value>)>, InvoiceError> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Array(items)) => Ok(Some((self.child_path(key), items))),
            Some(other) => Err(self.mismatch(key, "array", other)),
        }
    }
}

fn integral(f: f64) -> Option<i64> {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

/// Short "type value" rendering of a JSON value for error messages.
fn describe(value: &Value) -> String {
    let kind = match value {
        Value::Null => return "null".to_string(),
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    };
    let mut text = value.to_string();
    if text.len() > 60 {
        let cut = (0..=57).rev().find(|&i| text.is_char_boundary(i)).unwrap_or(0);
        text.truncate(cut);
        text.push('…');
    }
    format!("{kind} {text}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn descriptor_lists_every_invoice_field() {
        let d = SchemaDescriptor::invoice();
        assert_eq!(d.name, "Invoice");
        let props = d.parameters["properties"].as_object().unwrap();
        let keys: Vec<&str> = props.keys().map(String::as_str).collect();
        for k in ["care_provider", "date", "location", "services", "total_amount"] {
            assert!(keys.contains(&k), "missing {k}");
        }
        let service = &d.parameters["properties"]["services"]["items"]["properties"];
        assert_eq!(service["quantity"]["type"], json!(["integer", "null"]));
        assert_eq!(service["price"]["type"], json!(["number", "null"]));
        let address = &d.parameters["properties"]["care_provider"]["properties"]["address"];
        assert_eq!(address["properties"]["zip"]["description"], "Address zip code");
    }

    #[test]
    fn empty_object_maps_to_empty_invoice() {
        let inv = map_invoice(&json!({})).unwrap();
        assert!(inv.is_empty());
    }

    #[test]
    fn nulls_and_missing_keys_become_none() {
        let inv = map_invoice(&json!({
            "care_provider": { "name": null, "phone": "555-0100" },
            "services": null,
            "date": null
        }))
        .unwrap();
        let cp = inv.care_provider.unwrap();
        assert_eq!(cp.name, None);
        assert_eq!(cp.phone.as_deref(), Some("555-0100"));
        assert_eq!(cp.address, None);
        assert_eq!(inv.services, None);
        assert_eq!(inv.date, None);
    }

    #[test]
    fn lenient_scalar_coercion() {
        let inv = map_invoice(&json!({
            "total_amount": 100,
            "services": [
                { "quantity": "2", "price": "50.00", "amount": 100, "rate": 50 },
                { "quantity": 3.0 }
            ]
        }))
        .unwrap();
        assert_eq!(inv.total_amount.as_deref(), Some("100"));
        let services = inv.services.unwrap();
        assert_eq!(services[0].quantity, Some(2));
        assert_eq!(services[0].price, Some(50.0));
        assert_eq!(services[0].amount, Some(100.0));
        assert_eq!(services[0].rate.as_deref(), Some("50"));
        assert_eq!(services[1].quantity, Some(3));
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let inv = map_invoice(&json!({ "location": "Springfield", "invoice_no": "A-17" })).unwrap();
        assert_eq!(inv.location.as_deref(), Some("Springfield"));
    }

    #[test]
    fn non_numeric_quantity_is_a_violation_with_path() {
        let err = map_invoice(&json!({ "services": [{}, { "quantity": "two" }] })).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("services[1].quantity"), "got: {msg}");
        assert!(msg.contains("expected integer"), "got: {msg}");

        let err = map_invoice(&json!({ "services": [{ "quantity": "1.5" }] })).unwrap_err();
        assert!(matches!(err, InvoiceError::SchemaViolation { .. }));
    }

    #[test]
    fn fractional_quantity_truncates_toward_zero() {
        let inv = map_invoice(&json!({
            "location": "Springfield",
            "services": [
                { "description": "Home visit", "quantity": 1.5 },
                { "quantity": -2.75 }
            ]
        }))
        .unwrap();
        assert_eq!(inv.location.as_deref(), Some("Springfield"));
        let services = inv.services.unwrap();
        assert_eq!(services[0].quantity, Some(1));
        assert_eq!(services[0].description.as_deref(), Some("Home visit"));
        assert_eq!(services[1].quantity, Some(-2));
    }

    #[test]
    fn wrong_container_types_are_violations() {
        let err = map_invoice(&json!({ "care_provider": "Acme" })).unwrap_err();
        assert!(err.to_string().contains("care_provider: expected object"));

        let err = map_invoice(&json!({ "services": { "date": "x" } })).unwrap_err();
        assert!(err.to_string().contains("services: expected array"));

        let err = map_invoice(&json!({ "care_provider": { "address": [1] } })).unwrap_err();
        assert!(err.to_string().contains("care_provider.address"));
    }

    #[test]
    fn non_object_root_is_a_violation() {
        let err = map_invoice(&json!([1, 2])).unwrap_err();
        assert!(err.to_string().contains("$: expected object"));
        assert!(map_invoice(&Value::Null).is_err());
    }

    #[test]
    fn null_service_entries_keep_their_slot() {
        let inv = map_invoice(&json!({ "services": [null, { "description": "Home visit" }] })).unwrap();
        let services = inv.services.unwrap();
        assert_eq!(services.len(), 2);
        assert_eq!(services[0], Service::default());
        assert_eq!(services[1].description.as_deref(), Some("Home visit"));
    }

    #[test]
    fn invalid_json_text_is_a_violation() {
        let err = map_invoice_str("Sorry, I cannot read this image.").unwrap_err();
        assert!(matches!(err, InvoiceError::SchemaViolation { .. }));
    }
}
