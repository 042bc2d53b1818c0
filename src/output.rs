//! Extraction results and their human-readable rendering.

use crate::model::{Address, CareProvider, Invoice, Service};
use serde::Serialize;
use std::fmt::Write as _;

/// Result of [`crate::extract::extract_invoice`].
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionOutput {
    pub invoice: Invoice,
    pub stats: ExtractionStats,
}

/// Timing and size figures for one extraction.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtractionStats {
    /// Name of the service that answered, e.g. `azure:gpt-4o`.
    pub service: String,
    pub image_width: u32,
    pub image_height: u32,
    /// Length of the base64 payload sent to the service.
    pub encoded_bytes: usize,
    pub render_duration_ms: u64,
    pub service_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Render an invoice field by field, nested records indented, services as a
/// list in their original order. Unknown values print as `null`; strings are
/// printed verbatim, quoted only when they would otherwise read as `null` or
/// lose whitespace.
pub fn render_report(invoice: &Invoice) -> String {
    let mut out = String::new();
    match &invoice.care_provider {
        Some(cp) => {
            out.push_str("care_provider:\n");
            write_care_provider(&mut out, cp, 1);
        }
        None => out.push_str("care_provider: null\n"),
    }
    line(&mut out, 0, "date", text(&invoice.date));
    line(&mut out, 0, "location", text(&invoice.location));
    match &invoice.services {
        None => out.push_str("services: null\n"),
        Some(services) if services.is_empty() => out.push_str("services: []\n"),
        Some(services) => {
            out.push_str("services:\n");
            for service in services {
                write_service(&mut out, service);
            }
        }
    }
    line(&mut out, 0, "total_amount", text(&invoice.total_amount));
    out
}

fn write_care_provider(out: &mut String, cp: &CareProvider, depth: usize) {
    line(out, depth, "name", text(&cp.name));
    line(out, depth, "phone", text(&cp.phone));
    match &cp.address {
        Some(addr) => {
            let _ = writeln!(out, "{}address:", indent(depth));
            write_address(out, addr, depth + 1);
        }
        None => line(out, depth, "address", "null".to_string()),
    }
}

fn write_address(out: &mut String, addr: &Address, depth: usize) {
    line(out, depth, "street", text(&addr.street));
    line(out, depth, "city", text(&addr.city));
    line(out, depth, "state", text(&addr.state));
    line(out, depth, "zip", text(&addr.zip));
}

fn write_service(out: &mut String, s: &Service) {
    let fields = [
        ("date", text(&s.date)),
        ("quantity", s.quantity.map_or_else(null, |q| q.to_string())),
        ("rate", text(&s.rate)),
        ("description", text(&s.description)),
        ("price", s.price.map_or_else(null, number)),
        ("amount", s.amount.map_or_else(null, number)),
    ];
    for (i, (key, value)) in fields.iter().enumerate() {
        let bullet = if i == 0 { "  - " } else { "    " };
        let _ = writeln!(out, "{bullet}{key}: {value}");
    }
}

fn line(out: &mut String, depth: usize, key: &str, value: String) {
    let _ = writeln!(out, "{}{key}: {value}", indent(depth));
}

fn indent(depth: usize) -> String {
    "  ".repeat(depth)
}

fn text(v: &Option<String>) -> String {
    v.as_deref().map_or_else(null, verbatim)
}

/// Strings print bare unless bare text would be misread: the literal `null`,
/// an empty string, or one with leading/trailing whitespace is quoted.
fn verbatim(s: &str) -> String {
    if s == "null" || s.is_empty() || s.trim() != s {
        format!("{s:?}")
    } else {
        s.to_string()
    }
}

fn null() -> String {
    "null".to_string()
}

/// `50.0` stays `50.0` (Debug formatting keeps the fractional part).
fn number(f: f64) -> String {
    format!("{f:?}")
}
