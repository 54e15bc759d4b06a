//! Redirect URL resolution
//!
//! Pure boundary function: the base activation URL, optionally suffixed
//! with the CRM-assigned owner so the next page can route the prospect to
//! their coach.

/// Build the post-submission redirect URL
pub fn build_redirect_url(base_url: &str, owner_id: Option<&str>) -> String {
    match owner_id.filter(|id| !id.trim().is_empty()) {
        Some(owner) => format!("{}?uid={}", base_url, urlencoding::encode(owner)),
        None => base_url.to_string(),
    }
}
