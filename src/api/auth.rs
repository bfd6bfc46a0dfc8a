use serde_json::json;

use super::ApiClient;
use super::endpoints;
use crate::error::Error;
use crate::pipeline::ApiRequest;
use crate::types::{AuthOutcome, LoginCredentials, RegisterCredentials};

impl ApiClient {
    /// Sign in with email and password and store the returned session.
    ///
    /// A success response without a usable token clears the session and is
    /// returned as [`AuthOutcome::NotSignedIn`].
    ///
    /// # Errors
    ///
    /// [`Error::Api`] with the server message (or "Login failed").
    pub async fn login(&self, credentials: &LoginCredentials) -> Result<AuthOutcome, Error> {
        let request = ApiRequest::post(endpoints::LOGIN).form([
            ("username", credentials.email.as_str()),
            ("password", credentials.password.as_str()),
        ]);

        self.pipeline
            .start_session(&request, "Login failed")
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Login error"))
    }

    /// Create an account and store the returned session, if the backend
    /// issues one. A backend that answers with the created user instead
    /// yields [`AuthOutcome::NotSignedIn`] carrying that user.
    ///
    /// # Errors
    ///
    /// As [`login`](Self::login), with fallback "Registration failed".
    pub async fn register(&self, credentials: &RegisterCredentials) -> Result<AuthOutcome, Error> {
        let request = ApiRequest::post(endpoints::REGISTER).json(credentials)?;

        self.pipeline
            .start_session(&request, "Registration failed")
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Registration error"))
    }

    /// Tell the backend (best effort) and always clear the local session.
    pub async fn logout(&self) {
        if let Some(token) = self.session().token() {
            let request = ApiRequest::post(endpoints::LOGOUT);
            if let Err(e) = self.pipeline.send_raw(&request, Some(&token)).await {
                tracing::warn!(error = %e, "Logout notification failed");
            }
        }
        self.session().clear_auth();
    }

    /// Exchange the stored refresh token for a new session.
    ///
    /// # Errors
    ///
    /// [`Error::NoRefreshToken`] if none is held (session untouched). Any
    /// other failure clears the session and is returned.
    pub async fn refresh_token(&self) -> Result<AuthOutcome, Error> {
        match self.pipeline.refresh_session().await {
            Ok(outcome) => Ok(outcome),
            Err(Error::NoRefreshToken) => Err(Error::NoRefreshToken),
            Err(e) => {
                tracing::error!(error = %e, "Token refresh error");
                if !matches!(e, Error::Cancelled) {
                    self.session().clear_auth();
                }
                Err(e)
            }
        }
    }

    /// # Errors
    ///
    /// [`Error::Api`] with the server message or "Failed to send reset email".
    pub async fn forgot_password(&self, email: &str) -> Result<(), Error> {
        let request = ApiRequest::post(endpoints::FORGOT_PASSWORD).json(&json!({ "email": email }))?;

        self.pipeline
            .send_public(&request, "Failed to send reset email")
            .await
            .map(|_| ())
            .inspect_err(|e| tracing::error!(error = %e, "Forgot password error"))
    }

    /// # Errors
    ///
    /// [`Error::Api`] with the server message or "Password reset failed".
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), Error> {
        let request = ApiRequest::post(endpoints::RESET_PASSWORD)
            .json(&json!({ "token": token, "password": new_password }))?;

        self.pipeline
            .send_public(&request, "Password reset failed")
            .await
            .map(|_| ())
            .inspect_err(|e| tracing::error!(error = %e, "Reset password error"))
    }

    /// # Errors
    ///
    /// [`Error::Api`] with the server message or "Email verification failed".
    pub async fn verify_email(&self, token: &str) -> Result<(), Error> {
        let request = ApiRequest::post(endpoints::VERIFY_EMAIL).json(&json!({ "token": token }))?;

        self.pipeline
            .send_public(&request, "Email verification failed")
            .await
            .map(|_| ())
            .inspect_err(|e| tracing::error!(error = %e, "Verify email error"))
    }
}
