use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::discovery::error::ClientError;
use crate::services::retry::RetryPolicy;

pub const DEFAULT_BASE_URL: &str = "https://api.myturn.ca.gov/public";

pub const ELIGIBILITY_PATH: &str = "/eligibility";
pub const LOCATIONS_PATH: &str = "/locations/search";

/// Only first-dose availability is tracked.
pub const DOSE_NUMBER: u8 = 1;

pub fn availability_path(location_id: &str) -> String {
    format!("/locations/{}/availability", location_id)
}

pub fn slots_path(location_id: &str, date: &str) -> String {
    format!("/locations/{}/date/{}/slots", location_id, date)
}

/// Questionnaire answers that qualify for every location. If the API ever
/// answers `eligible = false` to this, the payload is out of date.
pub fn eligibility_request_body() -> Value {
    json!({
        "eligibilityQuestionResponse": [
            {
                "id": "q.screening.18.yr.of.age",
                "value": ["q.screening.18.yr.of.age"],
                "type": "multi-select"
            },
            {
                "id": "q.screening.health.data",
                "value": ["q.screening.health.data"],
                "type": "multi-select"
            },
            {
                "id": "q.screening.privacy.statement",
                "value": ["q.screening.privacy.statement"],
                "type": "multi-select"
            },
            {
                "id": "q.screening.eligibility.age.range",
                "value": "75 and older",
                "type": "single-select"
            },
            {
                "id": "q.screening.eligibility.industry",
                "value": "Other",
                "type": "single-select"
            },
            {
                "id": "q.screening.eligibility.county",
                "value": "Alameda",
                "type": "single-select"
            }
        ]
    })
}

/// Optional API key sent on every request.
#[derive(Debug, Clone)]
pub struct ApiKey {
    pub header: String,
    pub value: String,
}

#[derive(Clone)]
pub struct MyTurnClient {
    base_url: String,
    http: Client,
    retry: RetryPolicy,
}

impl MyTurnClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<ApiKey>,
        retry: RetryPolicy,
    ) -> Result<Self, ClientError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("myturn-notifier/", env!("CARGO_PKG_VERSION"))),
        );

        if let Some(key) = api_key {
            let name = HeaderName::from_bytes(key.header.as_bytes())
                .map_err(|err| ClientError::config(format!("bad API key header name: {}", err)))?;
            let value = HeaderValue::from_str(&key.value)
                .map_err(|err| ClientError::config(format!("bad API key value: {}", err)))?;
            headers.insert(name, value);
        }

        let http = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|err| ClientError::config(err.to_string()))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
            retry,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

}

#[derive(Debug, Serialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationSearchRequest<'a> {
    pub location: LatLng,
    pub from_date: String,
    pub vaccine_data: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityRequest<'a> {
    pub start_date: String,
    pub end_date: String,
    pub vaccine_data: &'a str,
    pub dose_number: u8,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotsRequest<'a> {
    pub vaccine_data: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EligibilityResponse {
    pub eligible: bool,
    pub vaccine_data: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LocationsResponse {
    pub locations: Vec<LocationRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationRecord {
    pub ext_id: String,
    pub name: String,
    pub display_address: String,
    #[serde(rename = "type")]
    pub booking_type: String,
    pub vaccine_data: String,
    pub distance_in_meters: f64,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityResponse {
    pub availability: Vec<AvailabilityRecord>,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityRecord {
    pub date: String,
    /// Missing or null counts as unavailable.
    #[serde(default)]
    pub available: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct SlotsResponse {
    #[serde(rename = "slotsWithAvailability")]
    pub slots: Vec<SlotRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotRecord {
    pub local_start_time: String,
    #[serde(default)]
    pub duration_seconds: Option<u32>,
}

impl MyTurnClient {
    /// Run the eligibility handshake and return the `vaccineData` token.
    ///
    /// Unlike the query endpoints, an undecodable answer here is an error:
    /// nothing downstream works without the token.
    pub async fn check_eligibility(&self) -> Result<String, ClientError> {
        let url = self.url(ELIGIBILITY_PATH);
        let body = self.send_request(ELIGIBILITY_PATH, &eligibility_request_body()).await?;

        let response: EligibilityResponse =
            serde_json::from_str(&body).map_err(|err| ClientError::Decode {
                url: url.clone(),
                message: err.to_string(),
            })?;

        if !response.eligible {
            return Err(ClientError::Ineligible);
        }

        response.vaccine_data.ok_or(ClientError::Decode {
            url,
            message: "eligible response carried no vaccineData".to_string(),
        })
    }

    pub async fn search_locations(
        &self,
        request: &LocationSearchRequest<'_>,
    ) -> Result<Option<LocationsResponse>, ClientError> {
        self.post(LOCATIONS_PATH, request).await
    }

    pub async fn location_availability(
        &self,
        location_id: &str,
        request: &AvailabilityRequest<'_>,
    ) -> Result<Option<AvailabilityResponse>, ClientError> {
        self.post(&availability_path(location_id), request).await
    }

    pub async fn location_slots(
        &self,
        location_id: &str,
        date: &str,
        request: &SlotsRequest<'_>,
    ) -> Result<Option<SlotsResponse>, ClientError> {
        self.post(&slots_path(location_id, date), request).await
    }

    /// POST `body` and decode the reply as `T`.
    ///
    /// `Ok(None)` means the API answered 2xx with a body that is not the
    /// expected JSON; the body is logged and the caller decides what an
    /// empty answer looks like.
    async fn post<B, T>(&self, path: &str, body: &B) -> Result<Option<T>, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let text = self.send_request(path, body).await?;

        match serde_json::from_str::<T>(&text) {
            Ok(parsed) => Ok(Some(parsed)),
            Err(err) => {
                tracing::error!(
                    "Could not decode response from {}: {} - body: {}",
                    path,
                    err,
                    text
                );
                Ok(None)
            }
        }
    }

    /// Send a JSON POST, retrying transient failures per the retry policy.
    /// Returns the raw body of the first 2xx response.
    async fn send_request<B>(&self, path: &str, body: &B) -> Result<String, ClientError>
    where
        B: Serialize + ?Sized,
    {
        let url = self.url(path);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            tracing::debug!(
                "Sending request to {} (attempt {}) with body - {}",
                url,
                attempt,
                serde_json::to_string(body).unwrap_or_default()
            );

            match self.http.post(&url).json(body).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let text = response
                            .text()
                            .await
                            .map_err(|err| ClientError::transport(&url, err.to_string()))?;
                        tracing::debug!("Got response from {} - HTTP {}: {}", path, status, text);
                        return Ok(text);
                    }

                    if !self.retry.is_retryable(status) || self.retry.exhausted(attempt) {
                        return Err(ClientError::Status {
                            url,
                            status: status.as_u16(),
                            attempts: attempt,
                        });
                    }

                    tracing::warn!(
                        "{} returned HTTP {} (attempt {}/{}), retrying",
                        url,
                        status,
                        attempt,
                        self.retry.max_retries + 1
                    );
                }
                Err(err) => {
                    if self.retry.exhausted(attempt) {
                        return Err(ClientError::transport(&url, err.to_string()));
                    }

                    tracing::warn!(
                        "Request to {} failed (attempt {}/{}): {}",
                        url,
                        attempt,
                        self.retry.max_retries + 1,
                        err
                    );
                }
            }

            tokio::time::sleep(self.retry.delay_for(attempt)).await;
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}
