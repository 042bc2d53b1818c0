//! Extraction tests against an in-process completion service.
//!
//! No PDF rendering happens here: the page image is a fixed `EncodedPage`
//! and the service returns canned JSON, so these run without pdfium or
//! network access.

use async_trait::async_trait;
use edgequake_invoice::{
    extract_from_page, extract_invoice, extract_invoice_sync, render_report, Address,
    CareProvider, EncodedPage, ErrorKind, ExtractionConfig, Invoice, InvoiceError, Service,
    StructuredRequest, VisionCompletionService,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

// ── Test helpers ─────────────────────────────────────────────────────────────

enum Reply {
    Json(Value),
    Unavailable,
}

struct MockService {
    reply: Reply,
    calls: AtomicUsize,
    last_request: Mutex<Option<StructuredRequest>>,
}

impl MockService {
    fn returning(v: Value) -> Self {
        Self {
            reply: Reply::Json(v),
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    fn unavailable() -> Self {
        Self {
            reply: Reply::Unavailable,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VisionCompletionService for MockService {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: &StructuredRequest) -> Result<Value, InvoiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());
        match &self.reply {
            Reply::Json(v) => Ok(v.clone()),
            Reply::Unavailable => Err(InvoiceError::ServiceUnavailable {
                endpoint: "https://unreachable.invalid".into(),
                reason: "connection refused".into(),
            }),
        }
    }
}

fn page() -> EncodedPage {
    EncodedPage {
        base64: "iVBORw0KGgo=".into(),
        mime_type: "image/png".into(),
        width: 1700,
        height: 2200,
    }
}

fn acme_payload() -> Value {
    json!({
        "care_provider": {
            "name": "Acme Home Care",
            "phone": "555-0100",
            "address": { "street": "1 Main St", "city": "Springfield", "state": "IL", "zip": "62704" }
        },
        "date": "2024-01-15",
        "location": "Springfield",
        "services": [{
            "date": "2024-01-10",
            "quantity": 2,
            "rate": "50.00",
            "description": "Home visit",
            "price": 50.0,
            "amount": 100.0
        }],
        "total_amount": "100.00"
    })
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn acme_invoice_round_trips_every_field() {
    let service = MockService::returning(acme_payload());
    let invoice = extract_from_page(&page(), &ExtractionConfig::default(), &service)
        .await
        .unwrap();

    let expected = Invoice {
        care_provider: Some(CareProvider {
            name: Some("Acme Home Care".into()),
            phone: Some("555-0100".into()),
            address: Some(Address {
                street: Some("1 Main St".into()),
                city: Some("Springfield".into()),
                state: Some("IL".into()),
                zip: Some("62704".into()),
            }),
        }),
        date: Some("2024-01-15".into()),
        location: Some("Springfield".into()),
        services: Some(vec![Service {
            date: Some("2024-01-10".into()),
            quantity: Some(2),
            rate: Some("50.00".into()),
            description: Some("Home visit".into()),
            price: Some(50.0),
            amount: Some(100.0),
        }]),
        total_amount: Some("100.00".into()),
    };
    assert_eq!(invoice, expected);
    assert_eq!(service.calls(), 1);

    let report = render_report(&invoice);
    assert_eq!(
        report,
        "care_provider:\n\
         \x20 name: Acme Home Care\n\
         \x20 phone: 555-0100\n\
         \x20 address:\n\
         \x20   street: 1 Main St\n\
         \x20   city: Springfield\n\
         \x20   state: IL\n\
         \x20   zip: 62704\n\
         date: 2024-01-15\n\
         location: Springfield\n\
         services:\n\
         \x20 - date: 2024-01-10\n\
         \x20   quantity: 2\n\
         \x20   rate: 50.00\n\
         \x20   description: Home visit\n\
         \x20   price: 50.0\n\
         \x20   amount: 100.0\n\
         total_amount: 100.00\n"
    );
}

#[tokio::test]
async fn request_carries_image_schema_and_zero_temperature() {
    let service = MockService::returning(json!({}));
    extract_from_page(&page(), &ExtractionConfig::default(), &service)
        .await
        .unwrap();

    let req = service.last_request.lock().unwrap().clone().unwrap();
    assert_eq!(req.temperature, 0.0);
    assert_eq!(req.image.data_uri(), "data:image/png;base64,iVBORw0KGgo=");
    assert_eq!(req.schema.name, "Invoice");
    assert!(req.system_prompt.contains("return null for the attribute's value"));
}

#[tokio::test]
async fn missing_care_provider_is_absent_not_an_error() {
    let mut payload = acme_payload();
    payload["care_provider"] = Value::Null;
    let service = MockService::returning(payload);

    let invoice = extract_from_page(&page(), &ExtractionConfig::default(), &service)
        .await
        .unwrap();
    assert_eq!(invoice.care_provider, None);
    assert_eq!(invoice.service_count(), 1);
    assert!(render_report(&invoice).starts_with("care_provider: null\n"));
}

#[tokio::test]
async fn all_null_payload_yields_empty_invoice() {
    let service = MockService::returning(json!({
        "care_provider": null, "date": null, "location": null,
        "services": null, "total_amount": null
    }));
    let invoice = extract_from_page(&page(), &ExtractionConfig::default(), &service)
        .await
        .unwrap();
    assert!(invoice.is_empty());
}

#[tokio::test]
async fn services_keep_document_order() {
    let service = MockService::returning(json!({
        "services": [
            { "description": "Intake" },
            { "description": "Home visit" },
            { "description": "Follow-up" }
        ]
    }));
    let invoice = extract_from_page(&page(), &ExtractionConfig::default(), &service)
        .await
        .unwrap();
    let names: Vec<_> = invoice
        .services
        .unwrap()
        .into_iter()
        .map(|s| s.description.unwrap())
        .collect();
    assert_eq!(names, ["Intake", "Home visit", "Follow-up"]);
}

#[tokio::test]
async fn unreachable_service_is_service_unavailable() {
    let service = MockService::unavailable();
    let err = extract_from_page(&page(), &ExtractionConfig::default(), &service)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ServiceUnavailable);
    assert_eq!(err.exit_code(), 2);
    assert_eq!(service.calls(), 1, "no retry on failure");
}

#[tokio::test]
async fn wrongly_typed_field_is_schema_violation() {
    let service = MockService::returning(json!({ "services": [{ "quantity": "several" }] }));
    let err = extract_from_page(&page(), &ExtractionConfig::default(), &service)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SchemaViolation);
    assert!(err.to_string().contains("services[0].quantity"), "{err}");
}

#[tokio::test]
async fn non_object_reply_is_schema_violation() {
    let service = MockService::returning(json!(["not", "an", "invoice"]));
    let err = extract_from_page(&page(), &ExtractionConfig::default(), &service)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SchemaViolation);
}

#[tokio::test]
async fn missing_file_fails_before_any_service_call() {
    let service = MockService::returning(acme_payload());
    let err = extract_invoice(
        "/definitely/not/here/0001.pdf",
        &ExtractionConfig::default(),
        &service,
    )
    .await
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DocumentRead);
    assert_eq!(err.exit_code(), 1);
    assert_eq!(service.calls(), 0);
}

#[tokio::test]
async fn non_pdf_file_fails_before_any_service_call() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("invoice.pdf");
    std::fs::write(&path, b"PK\x03\x04 this is a zip").unwrap();

    let service = MockService::returning(acme_payload());
    let err = extract_invoice(&path, &ExtractionConfig::default(), &service)
        .await
        .unwrap_err();
    assert!(matches!(err, InvoiceError::NotAPdf { .. }), "{err:?}");
    assert_eq!(service.calls(), 0);
}

#[test]
fn sync_wrapper_reports_the_same_errors() {
    let service = MockService::returning(acme_payload());
    let err = extract_invoice_sync("/no/such/0001.pdf", &ExtractionConfig::default(), &service)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DocumentRead);
    assert_eq!(service.calls(), 0);
}
