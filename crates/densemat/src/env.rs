use std::env;
use std::sync::OnceLock;

use crate::eval::StagingPolicy;

static DENSEMAT_STAGING: OnceLock<StagingPolicy> = OnceLock::new();
static DENSEMAT_VALIDATE_KERNELS: OnceLock<bool> = OnceLock::new();

fn parse_bool(value: &str) -> bool {
    let normalized = value.trim().to_ascii_lowercase();
    matches!(normalized.as_str(), "1" | "true" | "yes" | "on")
}

fn parse_staging(value: &str) -> Option<StagingPolicy> {
    match value.trim().to_ascii_lowercase().as_str() {
        "auto" => Some(StagingPolicy::Auto),
        "always" => Some(StagingPolicy::Always),
        "never" => Some(StagingPolicy::Never),
        _ => None,
    }
}

pub(crate) fn staging_policy() -> StagingPolicy {
    *DENSEMAT_STAGING.get_or_init(|| match env::var("DENSEMAT_STAGING") {
        Ok(value) if !value.trim().is_empty() => parse_staging(&value).unwrap_or_else(|| {
            tracing::warn!(value = %value, "unrecognised DENSEMAT_STAGING, falling back to auto");
            StagingPolicy::Auto
        }),
        _ => StagingPolicy::Auto,
    })
}

pub(crate) fn validate_kernels() -> bool {
    *DENSEMAT_VALIDATE_KERNELS.get_or_init(|| match env::var("DENSEMAT_VALIDATE_KERNELS") {
        Ok(value) if !value.trim().is_empty() => parse_bool(&value),
        _ => cfg!(debug_assertions),
    })
}
