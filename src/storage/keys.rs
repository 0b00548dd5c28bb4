//! Storage key names.
//!
//! Key strings are part of the persisted format; renaming one orphans the
//! data stored under the old name.

pub const ADMIN_CONVERSATIONS: &str = "admin_conversations";
pub const FAVORITES: &str = "favorites";
pub const COMPARE_LISTINGS: &str = "compareListings";
pub const SECURITY_LOGS: &str = "security_logs";
pub const ADMIN_ACCESS_LOGS: &str = "admin_access_logs";
pub const SUSPICIOUS_ACTIVITIES: &str = "suspicious_activities";
pub const CONTACT_SUBMISSIONS: &str = "contactFormSubmissions";
pub const STATUS_MESSAGES: &str = "admin-status-messages";

pub const CONVERSATIONS_PREFIX: &str = "conversations_";
pub const JOB_IMAGES_PREFIX: &str = "job_images_";
pub const JOB_FEATURED_IMAGE_PREFIX: &str = "job_featured_image_";

/// Per-user conversation store.
#[must_use]
pub fn conversations(user_id: &str) -> String {
    format!("{CONVERSATIONS_PREFIX}{user_id}")
}

/// Image list for one job posting.
#[must_use]
pub fn job_images(job_id: &str) -> String {
    format!("{JOB_IMAGES_PREFIX}{job_id}")
}

/// Featured image for one job posting.
#[must_use]
pub fn job_featured_image(job_id: &str) -> String {
    format!("{JOB_FEATURED_IMAGE_PREFIX}{job_id}")
}
