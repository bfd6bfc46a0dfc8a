use serde::Serialize;
use serde_json::{Value as JsonValue, json};
use time::OffsetDateTime;

use super::ApiClient;
use super::endpoints;
use crate::error::Error;
use crate::pipeline::ApiRequest;
use crate::types::{ItemId, ReviewId, ReviewSchedule};

#[derive(Serialize)]
struct ScheduleReviewBody<'a> {
    memory_item_id: &'a ItemId,
    #[serde(with = "time::serde::rfc3339")]
    review_date: OffsetDateTime,
}

impl ApiClient {
    /// Schedule a review of `item_id` at `review_date`.
    ///
    /// # Errors
    ///
    /// Any pipeline error, unchanged.
    pub async fn schedule_review(
        &self,
        item_id: &ItemId,
        review_date: OffsetDateTime,
    ) -> Result<ReviewSchedule, Error> {
        let request = ApiRequest::post(endpoints::REVIEW_SCHEDULE).json(&ScheduleReviewBody {
            memory_item_id: item_id,
            review_date,
        })?;

        self.pipeline
            .send_json(&request)
            .await
            .inspect_err(|e| tracing::error!(error = %e, item_id = %item_id, "Failed to schedule review"))
    }

    /// # Errors
    ///
    /// Any pipeline error, unchanged.
    pub async fn get_review_schedule(&self) -> Result<Vec<ReviewSchedule>, Error> {
        let request = ApiRequest::get(endpoints::REVIEW_SCHEDULE);

        self.pipeline
            .send_json(&request)
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to get review schedule"))
    }

    /// # Errors
    ///
    /// Any pipeline error, unchanged.
    pub async fn complete_review(&self, review_id: &ReviewId) -> Result<JsonValue, Error> {
        let request =
            ApiRequest::post(endpoints::COMPLETE_REVIEW).json(&json!({ "review_id": review_id }))?;

        self.pipeline
            .send_json(&request)
            .await
            .inspect_err(|e| tracing::error!(error = %e, review_id = %review_id, "Failed to complete review"))
    }
}
