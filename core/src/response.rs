//! Response classification and JSON decoding.
//!
//! Both entry points take the [`HttpResponse`] by value, so its body is
//! consumed exactly once whichever way the call ends.

use serde::de::DeserializeOwned;
use url::Url;

use crate::error::{Error, Result};
use crate::http::{HttpMethod, HttpResponse};

/// Status reported for a 2xx response whose body could not be decoded.
pub const INTERNAL_ERROR_STATUS: u16 = 500;

/// A decoded 2xx response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonResponse<T> {
    pub status: u16,
    pub body: T,
}

/// True for statuses in `[200, 300)`.
pub fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

/// Returns the status of a 2xx response without looking at its body.
///
/// `method` and `url` describe the request that produced `response` and end
/// up in [`Error::Remote`] when the status is outside the 2xx range.
pub fn expect_success(method: HttpMethod, url: &Url, response: HttpResponse) -> Result<u16> {
    check_status(&method, url, &response)?;
    Ok(response.status)
}

/// Decodes the JSON body of a 2xx response into `T`.
pub fn decode_json<T: DeserializeOwned>(
    method: HttpMethod,
    url: &Url,
    response: HttpResponse,
) -> Result<JsonResponse<T>> {
    check_status(&method, url, &response)?;
    let body = serde_json::from_slice(&response.body).map_err(|err| {
        tracing::debug!(%method, %url, status = response.status, %err, "response body failed to decode");
        Error::Decode(err)
    })?;
    Ok(JsonResponse {
        status: response.status,
        body,
    })
}

fn check_status(method: &HttpMethod, url: &Url, response: &HttpResponse) -> Result<()> {
    if is_success(response.status) {
        return Ok(());
    }
    tracing::debug!(%method, %url, status = response.status, "postgrest answered with an error status");
    Err(Error::Remote {
        method: method.clone(),
        url: url.to_string(),
        status: response.status,
        reason: response.reason.clone(),
    })
}
