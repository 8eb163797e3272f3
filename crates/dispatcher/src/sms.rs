//! SMS gateway adapter.
//!
//! The only place that sees raw HTTP statuses and gateway error bodies:
//! every response is normalized into a [`SendOutcome`] carrying a
//! [`FailureClass`], and the rest of the system consumes that as data
//! instead of re-deriving it from status codes.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use pantry_common::config::AppConfig;
use pantry_common::types::ProviderStatus;
use pantry_engine::retry::FailureClass;

/// Gateway error bodies longer than this are truncated in stored detail.
const MAX_DETAIL_LEN: usize = 200;

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    to: &'a str,
    from: &'a str,
    body: &'a str,
    test: bool,
}

#[derive(Debug, Deserialize)]
struct SendMessageResponse {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GatewayError {
    error: Option<GatewayErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct GatewayErrorDetail {
    code: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageStatusResponse {
    status: String,
}

/// Normalized result of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Accepted {
        provider_message_id: Option<String>,
    },
    Rejected {
        class: FailureClass,
        detail: String,
    },
}

/// Thin client for the SMS gateway's HTTP API.
#[derive(Clone)]
pub struct SmsClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    sender: String,
    test_mode: bool,
}

impl SmsClient {
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.send_timeout_secs))
            .build()?;

        if config.sms_test_mode {
            tracing::info!("SMS client in test mode — sends routed to the gateway sandbox");
        }

        Ok(Self {
            http,
            base_url: config.sms_api_url.trim_end_matches('/').to_string(),
            api_key: config.sms_api_key.clone(),
            sender: config.sms_sender.clone(),
            test_mode: config.sms_test_mode,
        })
    }

    /// Attempt delivery of one message.
    ///
    /// Never returns an error: network failures and timeouts are normalized
    /// to `UpstreamUnavailable`, which the retry policy treats as
    /// transient.
    pub async fn send(&self, destination: &str, body: &str) -> SendOutcome {
        let request = SendMessageRequest {
            to: destination,
            from: &self.sender,
            body,
            test: self.test_mode,
        };

        let response = match self
            .http
            .post(format!("{}/messages", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                return SendOutcome::Rejected {
                    class: FailureClass::UpstreamUnavailable,
                    detail: format!("network error: {}", e),
                };
            }
        };

        let status = response.status().as_u16();
        if response.status().is_success() {
            let provider_message_id = response
                .json::<SendMessageResponse>()
                .await
                .ok()
                .and_then(|r| r.id);
            return SendOutcome::Accepted {
                provider_message_id,
            };
        }

        let body = response.text().await.unwrap_or_default();
        let (class, detail) = classify_response(status, &body);
        SendOutcome::Rejected { class, detail }
    }

    /// Query the delivery report for a previously accepted message.
    ///
    /// Returns `None` while the gateway still considers the message in
    /// flight.
    pub async fn fetch_status(
        &self,
        provider_message_id: &str,
    ) -> anyhow::Result<Option<ProviderStatus>> {
        let response = self
            .http
            .get(format!("{}/messages/{}", self.base_url, provider_message_id))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("delivery report query returned HTTP {}", response.status());
        }

        let report: MessageStatusResponse = response.json().await?;
        Ok(parse_delivery_report(&report.status))
    }
}

/// Classify a non-success gateway response.
///
/// Retriable: 429 and the upstream 5xx family. Balance exhaustion is
/// signalled by HTTP 402 or the gateway's `insufficient_balance` code and
/// is kept distinct from other permanent failures so operators can bulk
/// re-queue after a top-up. Anything unrecognized defaults to a permanent
/// `InvalidRequest` — the safe no-retry default.
pub fn classify_response(status: u16, body: &str) -> (FailureClass, String) {
    let gateway_error = serde_json::from_str::<GatewayError>(body)
        .ok()
        .and_then(|e| e.error);
    let gateway_code = gateway_error.as_ref().and_then(|d| d.code.clone());

    let class = if gateway_code.as_deref() == Some("insufficient_balance") || status == 402 {
        FailureClass::BalanceExhausted
    } else {
        match status {
            429 => FailureClass::RateLimited,
            500 | 502 | 503 | 504 => FailureClass::UpstreamUnavailable,
            404 | 422 => FailureClass::InvalidDestination,
            _ => FailureClass::InvalidRequest,
        }
    };

    let message = gateway_error
        .and_then(|d| d.message)
        .unwrap_or_else(|| body.chars().take(MAX_DETAIL_LEN).collect());
    let detail = if message.is_empty() {
        format!("HTTP {}", status)
    } else {
        format!("HTTP {}: {}", status, message)
    };

    (class, detail)
}

/// Map the gateway's delivery-report state onto [`ProviderStatus`].
pub fn parse_delivery_report(status: &str) -> Option<ProviderStatus> {
    match status {
        "delivered" => Some(ProviderStatus::Delivered),
        "failed" | "rejected" => Some(ProviderStatus::Failed),
        "undelivered" | "not_delivered" => Some(ProviderStatus::NotDelivered),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_rate_limited() {
        let (class, _) = classify_response(429, "");
        assert_eq!(class, FailureClass::RateLimited);
    }

    #[test]
    fn test_classify_upstream_errors() {
        for status in [500, 502, 503, 504] {
            let (class, _) = classify_response(status, "");
            assert_eq!(class, FailureClass::UpstreamUnavailable, "HTTP {}", status);
        }
    }

    #[test]
    fn test_classify_balance_exhausted_by_status() {
        let (class, _) = classify_response(402, "");
        assert_eq!(class, FailureClass::BalanceExhausted);
    }

    #[test]
    fn test_classify_balance_exhausted_by_code() {
        let body = r#"{"error": {"code": "insufficient_balance", "message": "no credit"}}"#;
        let (class, detail) = classify_response(400, body);
        assert_eq!(class, FailureClass::BalanceExhausted);
        assert_eq!(detail, "HTTP 400: no credit");
    }

    #[test]
    fn test_classify_invalid_destination() {
        let (class, _) = classify_response(422, "");
        assert_eq!(class, FailureClass::InvalidDestination);
        let (class, _) = classify_response(404, "");
        assert_eq!(class, FailureClass::InvalidDestination);
    }

    #[test]
    fn test_classify_unknown_defaults_to_invalid_request() {
        let (class, _) = classify_response(400, "");
        assert_eq!(class, FailureClass::InvalidRequest);
        let (class, _) = classify_response(418, "");
        assert_eq!(class, FailureClass::InvalidRequest);
    }

    #[test]
    fn test_detail_prefers_gateway_message() {
        let body = r#"{"error": {"code": "bad_number", "message": "destination rejected"}}"#;
        let (_, detail) = classify_response(422, body);
        assert_eq!(detail, "HTTP 422: destination rejected");
    }

    #[test]
    fn test_detail_truncates_raw_body() {
        let body = "x".repeat(500);
        let (_, detail) = classify_response(500, &body);
        assert!(detail.len() <= MAX_DETAIL_LEN + "HTTP 500: ".len());
    }

    #[test]
    fn test_parse_delivery_report() {
        assert_eq!(
            parse_delivery_report("delivered"),
            Some(ProviderStatus::Delivered)
        );
        assert_eq!(
            parse_delivery_report("failed"),
            Some(ProviderStatus::Failed)
        );
        assert_eq!(
            parse_delivery_report("undelivered"),
            Some(ProviderStatus::NotDelivered)
        );
        assert_eq!(parse_delivery_report("queued"), None);
    }
}
