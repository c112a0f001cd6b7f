//! Queryable view of an HTTP response.

use serde_json::{Map, Value};

use crate::models::{Headers, HttpResponse};

/// Build `{statusCode, body, headers}` for querying.
///
/// The body is parsed as JSON when it is JSON and kept as a string
/// otherwise; JSON-encoded strings nested anywhere inside are parsed too,
/// so `.body.payload.id` works when `payload` arrives as `"{\"id\":1}"`.
/// The same object is also exposed under `response`, so `.response.statusCode`
/// and `.statusCode` are interchangeable. Top-level fields of an object body
/// are lifted to the root as well (`.token` reads `.body.token`) unless they
/// collide with `statusCode`, `body`, `headers` or `response`.
pub fn response_context(response: &HttpResponse) -> Value {
    let mut body = Value::String(response.body.clone());
    expand_json_strings(&mut body);

    let mut inner = Map::new();
    inner.insert("statusCode".into(), Value::from(response.status_code));
    inner.insert("body".into(), body.clone());
    inner.insert("headers".into(), headers_value(&response.headers));

    let mut root = inner.clone();
    root.insert("response".into(), Value::Object(inner));
    if let Value::Object(fields) = body {
        for (k, v) in fields {
            root.entry(k).or_insert(v);
        }
    }
    Value::Object(root)
}

/// Strict variant used for `{{jq}}` placeholders: a non-empty body that is
/// not JSON is an error rather than a string.
pub fn strict_response_context(response: &HttpResponse) -> Result<Value, String> {
    if !response.body.trim().is_empty() {
        serde_json::from_str::<Value>(&response.body).map_err(|e| e.to_string())?;
    }
    let mut ctx = response_context(response);
    if response.body.trim().is_empty() {
        ctx["body"] = Value::Null;
        ctx["response"]["body"] = Value::Null;
    }
    Ok(ctx)
}

fn headers_value(headers: &Headers) -> Value {
    Value::Object(
        headers
            .iter()
            .map(|(k, vs)| {
                (
                    k.clone(),
                    Value::Array(vs.iter().cloned().map(Value::String).collect()),
                )
            })
            .collect(),
    )
}

/// Replace, in place, every string that holds a JSON object or array with
/// the parsed value. Recurses into the parsed result as well.
pub fn expand_json_strings(v: &mut Value) {
    match v {
        Value::String(s) => {
            let trimmed = s.trim_start();
            if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
                return;
            }
            if let Ok(mut parsed) = serde_json::from_str::<Value>(s) {
                expand_json_strings(&mut parsed);
                *v = parsed;
            }
        }
        Value::Array(items) => items.iter_mut().for_each(expand_json_strings),
        Value::Object(map) => map.values_mut().for_each(expand_json_strings),
        _ => {}
    }
}
