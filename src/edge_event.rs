//! Lambda@Edge viewer request events.
//!
//! Source: https://docs.aws.amazon.com/AmazonCloudFront/latest/DeveloperGuide/lambda-event-structure.html

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{gateway::Gateway, oidc::IdentityProvider, request::{GatewayOutcome, GatewayRequest, GatewayResponse, Headers}};

#[derive(thiserror::Error, Debug)]
pub enum EventError {
  #[error("Event contains no records")]
  NoRecords,
  #[error(transparent)]
  Json(#[from] serde_json::Error)
}

#[derive(Debug, Deserialize)]
pub struct CloudFrontEvent {
  #[serde(rename = "Records")]
  pub records: Vec<CloudFrontRecord>
}

#[derive(Debug, Deserialize)]
pub struct CloudFrontRecord {
  pub cf: CloudFrontData
}

#[derive(Debug, Deserialize)]
pub struct CloudFrontData {
  pub request: CloudFrontRequest
}

/// The `cf.request` object. Fields the gateway does not use are carried
/// through unchanged when the request is returned to CloudFront.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudFrontRequest {
  pub uri: String,
  #[serde(default)]
  pub querystring: String,
  #[serde(default)]
  pub headers: Headers,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub origin: Option<Value>,
  #[serde(flatten)]
  pub extra: Map<String, Value>
}

impl CloudFrontRequest {
  /// Custom headers configured on the origin, under either origin kind
  pub fn origin_headers(&self) -> Result<Headers, EventError> {
    let custom_headers = self.origin.as_ref()
      .and_then(|origin| origin.get("custom").or_else(|| origin.get("s3")))
      .and_then(|origin| origin.get("customHeaders"));

    Ok(match custom_headers {
      Some(headers) => Headers::deserialize(headers)?,
      None => Headers::default()
    })
  }

  fn to_gateway_request(&self) -> Result<GatewayRequest, EventError> {
    Ok(GatewayRequest {
      path: self.uri.clone(),
      query: self.querystring.clone(),
      headers: self.headers.clone(),
      origin_headers: self.origin_headers()?
    })
  }
}

/// A generated response, as Lambda@Edge expects it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CloudFrontResponse {
  /// the status code as a string
  pub status: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub status_description: Option<String>,
  #[serde(default)]
  pub headers: Headers,
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub body: String
}

impl From<GatewayResponse> for CloudFrontResponse {
  fn from(response: GatewayResponse) -> Self {
    CloudFrontResponse {
      status: response.status.to_string(),
      status_description: StatusCode::from_u16(response.status)
        .ok()
        .and_then(|status| status.canonical_reason())
        .map(String::from),
      headers: response.headers,
      body: response.body
    }
  }
}

/// Run the first record's request through the gateway. The result is
/// either the (possibly rewritten) request for CloudFront to forward or a
/// response to return to the viewer.
pub async fn handle_event<P: IdentityProvider>(
  gateway: &Gateway<P>,
  event: CloudFrontEvent
) -> Result<Value, EventError> {
  let mut cf_request = event.records
    .into_iter()
    .next()
    .ok_or(EventError::NoRecords)?
    .cf
    .request;

  let outcome = gateway.handle(cf_request.to_gateway_request()?).await;

  Ok(match outcome {
    GatewayOutcome::Forward(request) => {
      cf_request.uri = request.path;
      cf_request.querystring = request.query;
      cf_request.headers = request.headers;
      serde_json::to_value(cf_request)?
    },
    GatewayOutcome::Respond(response) => serde_json::to_value(CloudFrontResponse::from(response))?
  })
}
