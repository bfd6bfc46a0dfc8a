use serde_json::{Value as JsonValue, json};

use super::ApiClient;
use super::endpoints;
use crate::error::Error;
use crate::pipeline::ApiRequest;
use crate::types::{ProfileUpdate, UserProfile};

impl ApiClient {
    /// Fetch the signed-in user's profile and make it the session's user.
    ///
    /// # Errors
    ///
    /// Any pipeline error, unchanged.
    pub async fn get_profile(&self) -> Result<UserProfile, Error> {
        let request = ApiRequest::get(endpoints::USER_PROFILE);

        let profile: UserProfile = self
            .pipeline
            .send_json(&request)
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to get user profile"))?;
        self.session().replace_user(profile.clone());
        Ok(profile)
    }

    /// # Errors
    ///
    /// Any pipeline error, unchanged.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<UserProfile, Error> {
        let request = ApiRequest::put(endpoints::USER_PROFILE).json(update)?;

        let profile: UserProfile = self
            .pipeline
            .send_json(&request)
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to update user profile"))?;
        self.session().replace_user(profile.clone());
        Ok(profile)
    }

    /// # Errors
    ///
    /// Any pipeline error, unchanged.
    pub async fn change_password(
        &self,
        current_password: &str,
        new_password: &str,
    ) -> Result<JsonValue, Error> {
        let request = ApiRequest::post(endpoints::CHANGE_PASSWORD).json(&json!({
            "currentPassword": current_password,
            "newPassword": new_password,
        }))?;

        self.pipeline
            .send_json(&request)
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to change password"))
    }
}
