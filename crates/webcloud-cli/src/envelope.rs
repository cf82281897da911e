use serde::Serialize;
use webcloud_core::Error;

pub(crate) const SCHEMA_VERSION: u64 = 1;

pub(crate) fn warning_hint(code: &'static str) -> Option<&'static str> {
    match code {
        "terms_omitted" => Some(
            "Some terms did not fit the canvas and were shrunk or dropped. Use a smaller size profile or a wider canvas.",
        ),
        "render_failed" => Some(
            "The layout could not place any term; ranked terms are still returned. Try a smaller size profile.",
        ),
        "fetch_truncated" => Some(
            "The page body hit the byte cap; only the beginning was analyzed. Raise WEBCLOUD_MAX_BYTES to read more.",
        ),
        "relay_fallback_used" => Some(
            "The first fetch route failed and a later relay route served the page.",
        ),
        _ => None,
    }
}

pub(crate) fn warning_hints_from(codes: &[&'static str]) -> serde_json::Value {
    let mut m = serde_json::Map::new();
    for c in codes {
        if let Some(h) = warning_hint(c) {
            m.insert((*c).to_string(), serde_json::json!(h));
        }
    }
    serde_json::Value::Object(m)
}

pub(crate) fn add_envelope_fields(payload: &mut serde_json::Value, kind: &str, elapsed_ms: u128) {
    payload["schema_version"] = serde_json::json!(SCHEMA_VERSION);
    payload["kind"] = serde_json::json!(kind);
    payload["elapsed_ms"] = serde_json::json!(elapsed_ms);
    if payload.get("warnings").is_none() {
        payload["warnings"] = serde_json::json!([]);
    }
}

pub(crate) fn error_obj(err: &Error) -> serde_json::Value {
    #[derive(Serialize)]
    struct ErrorObject {
        code: &'static str,
        message: String,
        hint: &'static str,
        retryable: bool,
    }

    let e = ErrorObject {
        code: err.code(),
        message: err.to_string(),
        hint: err.hint(),
        retryable: err.retryable(),
    };
    match serde_json::to_value(e) {
        Ok(v) => v,
        Err(_) => serde_json::json!({
            "code": err.code(),
            "message": err.to_string(),
            "hint": err.hint(),
            "retryable": err.retryable()
        }),
    }
}

/// Full failure payload: `{ok: false, error: {...}}` plus envelope keys.
pub(crate) fn error_payload(kind: &str, err: &Error, elapsed_ms: u128) -> serde_json::Value {
    let mut v = serde_json::json!({
        "ok": false,
        "error": error_obj(err),
    });
    add_envelope_fields(&mut v, kind, elapsed_ms);
    v
}
