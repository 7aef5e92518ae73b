// CORS header computation

pub const ALLOW_METHODS: &str = "GET, HEAD, OPTIONS";
pub const ALLOW_HEADERS: &str = "Content-Type, Accept";

/// Origins are allowed when they end with one of the trusted hosts
#[derive(Debug, Clone, Default)]
pub struct CorsPolicy {
    trusted_hosts: Vec<String>,
}

impl CorsPolicy {
    pub fn new(trusted_hosts: Vec<String>) -> Self {
        let trusted_hosts = trusted_hosts
            .into_iter()
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
            .collect();
        Self { trusted_hosts }
    }

    pub fn is_allowed_origin(&self, origin: Option<&str>) -> bool {
        match origin {
            Some(origin) if !origin.is_empty() => self
                .trusted_hosts
                .iter()
                .any(|host| origin.ends_with(host.as_str())),
            _ => false,
        }
    }

    /// Headers for a response to a request from `origin`
    ///
    /// Methods and allowed headers are always present; the allow-origin
    /// header echoes the origin only when it is trusted.
    pub fn headers_for(&self, origin: Option<&str>) -> Vec<(&'static str, String)> {
        let mut headers = vec![
            ("Access-Control-Allow-Methods", ALLOW_METHODS.to_string()),
            ("Access-Control-Allow-Headers", ALLOW_HEADERS.to_string()),
        ];
        if let Some(origin) = origin.filter(|o| self.is_allowed_origin(Some(o))) {
            headers.push(("Access-Control-Allow-Origin", origin.to_string()));
        }
        headers
    }
}
