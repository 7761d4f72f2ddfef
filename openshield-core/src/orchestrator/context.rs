use uuid::Uuid;

/// Per-request identity, passed explicitly through every stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub request_id: String,
    /// Configured provider name taken from the route
    pub provider: String,
    pub api_key_id: Uuid,
    pub product_id: Uuid,
    pub ip_address: String,
}

impl RequestContext {
    pub fn new(
        request_id: impl Into<String>,
        provider: impl Into<String>,
        api_key_id: Uuid,
        product_id: Uuid,
        ip_address: impl Into<String>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            provider: provider.into(),
            api_key_id,
            product_id,
            ip_address: ip_address.into(),
        }
    }
}
