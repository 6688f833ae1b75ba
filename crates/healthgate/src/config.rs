//! Configuration for the Healthgate service.

/// Configuration for the service facade.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Organization name stamped into every access-log entry.
    pub organization: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            organization: "healthgate".to_string(),
        }
    }
}

impl ServiceConfig {
    /// Configuration for a named organization.
    pub fn for_organization(organization: impl Into<String>) -> Self {
        Self {
            organization: organization.into(),
        }
    }
}
