//! Policy input document derived from the inbound request.

use http::Request;
use serde_json::{json, Map, Value};

use crate::body::RequestBody;

/// `{method, path, query, headers}`. Repeated headers become arrays;
/// non-UTF-8 header values are skipped. The body is not included: policies
/// read it through `request.body()`.
pub fn request_input(request: &Request<RequestBody>) -> Value {
    let mut headers = Map::new();
    for name in request.headers().keys() {
        let values: Vec<Value> = request
            .headers()
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(|v| Value::String(v.to_string()))
            .collect();
        let value = match values.len() {
            0 => continue,
            1 => values.into_iter().next().unwrap_or(Value::Null),
            _ => Value::Array(values),
        };
        headers.insert(name.as_str().to_string(), value);
    }

    json!({
        "method": request.method().as_str(),
        "path": request.uri().path(),
        "query": request.uri().query().unwrap_or(""),
        "headers": headers,
    })
}
