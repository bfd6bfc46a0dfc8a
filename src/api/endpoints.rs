//! Backend path catalog.

pub const LOGIN: &str = "/api/auth/login";
pub const REGISTER: &str = "/api/auth/register";
pub const REFRESH_TOKEN: &str = "/api/auth/refresh";
pub const LOGOUT: &str = "/api/auth/logout";
pub const VERIFY_EMAIL: &str = "/api/auth/verify-email";
pub const FORGOT_PASSWORD: &str = "/api/auth/forgot-password";
pub const RESET_PASSWORD: &str = "/api/auth/reset-password";

pub const USER_PROFILE: &str = "/api/users/profile";
pub const CHANGE_PASSWORD: &str = "/api/users/change-password";

pub const GENERATE_MEMORY_AIDS: &str = "/api/memory/generate";
pub const MEMORY_ITEMS: &str = "/api/memory/items";
pub const MEMORY_ITEM: &str = "/api/memory/items/:id";

pub const REVIEW_SCHEDULE: &str = "/api/review/schedule";
pub const COMPLETE_REVIEW: &str = "/api/review/complete";

/// Substitute the `:id` segment of a path template. The id is percent-encoded.
#[must_use]
pub fn with_id(template: &str, id: &str) -> String {
    template.replace(":id", &urlencoding::encode(id))
}
