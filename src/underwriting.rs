//! Underwrites a policy through the production underwriting engine.

use crate::errors::{ResultExt, UnderwritingError};
use crate::insure_service::InsureService;
use crate::models::{
    Business, RatingRequest, Tenant, ToRecord, UnderwritingData, UnderwritingEntity,
    UnderwritingLogLine, UnderwritingRequest,
};
use serde_json::Value;
use std::sync::Arc;

/// Logical endpoint of the underwriting engine.
pub const UW_ENDPOINT: &str = "uw";

/// Versioned media type used for both `Accept` and `Content-Type`.
pub const UW_MEDIA_TYPE: &str = "application/vnd.uw-v1+json";

/// Builds the underwriting request for a rating request.
///
/// Underwriting data comes from the prefill outputs of the first insured
/// location; the other locations are ignored.
pub fn build_underwriting_request(
    rating_request: &RatingRequest,
) -> Result<UnderwritingRequest, UnderwritingError> {
    let policy = &rating_request.commercial_bop_policy;

    let first_location = policy.insured_locations.first().ok_or_else(|| {
        UnderwritingError::InvalidInput(
            "rating request has no insured locations".to_string(),
        )
    })?;

    let underwriting_data = UnderwritingData::from_location_record(
        first_location
            .to_record()
            .context("serializing first insured location")?,
    );

    let entity = UnderwritingEntity {
        address: policy
            .insured_address
            .to_record()
            .context("serializing insured address")?,
        business: Business {
            name: policy.insured_name.clone(),
        },
    };

    Ok(UnderwritingRequest::new(
        rating_request.version.clone(),
        rating_request
            .quote
            .to_record()
            .context("serializing quote")?,
        policy.effective_date,
        entity,
        underwriting_data,
    ))
}

/// Posts the request to the `uw` endpoint.
///
/// Returns the decoded body on HTTP 200 and `None` for any other status.
pub async fn dispatch(
    service: &dyn InsureService,
    request: &UnderwritingRequest,
) -> Result<Option<Value>, UnderwritingError> {
    let body = serde_json::to_string(request)?;
    let headers = [("Accept", UW_MEDIA_TYPE), ("Content-Type", UW_MEDIA_TYPE)];

    tracing::debug!("Underwriting payload: {}", body);

    let response = service.call_endpoint(UW_ENDPOINT, &headers, body).await?;

    if response.status != 200 {
        tracing::warn!(
            "Underwriting engine returned {} for request {}: {}",
            response.status,
            request.request_id(),
            response.body
        );
        return Ok(None);
    }

    Ok(Some(response.json()?))
}

/// Pairs a request with the engine's response.
pub fn assemble_log_line(request: UnderwritingRequest, response: Value) -> UnderwritingLogLine {
    UnderwritingLogLine::new(request, response)
}

/// Underwriting engine bound to a running service.
#[derive(Clone)]
pub struct PolicyUnderwriting {
    service: Arc<dyn InsureService>,
}

impl PolicyUnderwriting {
    pub fn new(service: Arc<dyn InsureService>) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &Arc<dyn InsureService> {
        &self.service
    }

    /// Underwrites a rating request.
    ///
    /// Returns the log line holding request and response, or `None` when the
    /// engine did not answer with HTTP 200. `tenant` is recorded on the
    /// tracing span only; it is not sent to the engine.
    #[tracing::instrument(
        skip(self, rating_request),
        fields(
            tenant = %tenant,
            env = %self.service.environment(),
            request_id = tracing::field::Empty
        )
    )]
    pub async fn underwrite_policy(
        &self,
        rating_request: &RatingRequest,
        tenant: Tenant,
    ) -> Result<Option<UnderwritingLogLine>, UnderwritingError> {
        let request = build_underwriting_request(rating_request)?;
        tracing::Span::current()
            .record("request_id", tracing::field::display(request.request_id()));

        tracing::info!(
            "Underwriting quote {} effective {}",
            rating_request
                .quote
                .quote_id()
                .unwrap_or_else(|| "<none>".to_string()),
            request.effective_date()
        );

        match dispatch(self.service.as_ref(), &request).await? {
            Some(response) => {
                tracing::info!("✓ Underwriting response received");
                Ok(Some(assemble_log_line(request, response)))
            }
            None => Ok(None),
        }
    }
}
