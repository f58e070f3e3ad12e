//! Request data extraction ("sent data").

use serde_json::{Map, Value};

use crate::dispatch::DispatchError;
use crate::http::Request;

/// JSON body when the request declares one, otherwise the query parameters.
///
/// An empty JSON body yields `null`. Query parameters become an object of
/// strings; a repeated key keeps its last value.
pub fn sent_data(request: &Request) -> Result<Value, DispatchError> {
    if request.is_json() {
        if request.body().is_empty() {
            return Ok(Value::Null);
        }
        return serde_json::from_slice(request.body()).map_err(DispatchError::InvalidBody);
    }

    let query = request.query().unwrap_or_default();
    let params: Map<String, Value> = url::form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (k.into_owned(), Value::String(v.into_owned())))
        .collect();
    Ok(Value::Object(params))
}
