//! Payment vendor idempotency compliance.
//!
//! An HTTP record is matched to a vendor only by registrable domain, so a
//! look-alike host such as `api.stripe.com.evil.com` is never treated as
//! covered. Records on hosts no vendor claims are reported as gaps.

use serde_json::Value;
use url::form_urlencoded;

use crate::analyzers::{Detection, GapKind, Outcome};
use crate::rules::catalog;
use crate::rules::config::{IdempotencyLocation, RuleSet, VendorRule};
use crate::trace::record::{HttpCall, scalar_text};
use crate::util::domain::parse_target;

/// Top-level field of a request body.
///
/// Accepts a JSON object, a string holding a JSON object, or a
/// form-encoded string (`a=1&idempotency_key=...`).
fn body_field(body: Option<&Value>, key: &str) -> Option<String> {
    match body? {
        Value::Object(map) => map.get(key).map(scalar_text),
        Value::String(text) => match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(map)) => map.get(key).map(scalar_text),
            _ => form_urlencoded::parse(text.as_bytes())
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.into_owned()),
        },
        _ => None,
    }
}

/// Every value the request sent for the vendor's key.
fn idempotency_values(call: &HttpCall, vendor: &VendorRule) -> Vec<String> {
    match vendor.idempotency_location {
        IdempotencyLocation::Header => call.header_values(&vendor.key_name),
        IdempotencyLocation::BodyField => body_field(call.body.as_ref(), &vendor.key_name)
            .into_iter()
            .collect(),
    }
}

/// Check one `http` record against the vendor table.
pub fn check(call: &HttpCall, rules: &RuleSet) -> Outcome {
    let Some(target) = parse_target(&call.url) else {
        tracing::debug!(url = %call.url, "http url has no parsable host");
        return Outcome::Gap(GapKind::UncoveredHost);
    };

    let Some(vendor) = target
        .registrable
        .as_deref()
        .and_then(|domain| rules.vendor_for_domain(domain))
    else {
        return Outcome::Gap(GapKind::UncoveredHost);
    };

    if !call.is_mutating() || !vendor.covers_path(&target.path) {
        return Outcome::NotApplicable;
    }

    // One usable value satisfies the key, whichever header casing carried it.
    let values = idempotency_values(call, vendor);
    if values.iter().any(|v| !vendor.is_placeholder(v)) {
        return Outcome::Analyzed(vec![]);
    }
    let problem = match values.first() {
        None => format!("{} missing", vendor.key_name),
        Some(value) => format!("Invalid idempotency key {:?}", value.trim()),
    };

    Outcome::Analyzed(vec![Detection {
        rule: catalog::payment_rule(),
        example: format!(
            "{}: {} {} ({})",
            vendor.provider_name,
            call.method.trim().to_ascii_uppercase(),
            call.url.trim(),
            problem
        ),
        subject: Some(vendor.provider_name.clone()),
    }])
}
