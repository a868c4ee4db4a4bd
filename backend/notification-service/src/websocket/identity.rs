use actix_web::{web, HttpRequest};
use notification_protocol::USER_ID_QUERY_PARAM;
use std::collections::HashMap;

/// Resolves the user a WebSocket upgrade request belongs to
///
/// The notification layer does not authenticate; it trusts whatever the
/// resolver returns. Swap the implementation to change how identity reaches
/// the gateway.
pub trait IdentityResolver: Send + Sync {
    /// `None` rejects the connection with a policy-violation close
    fn resolve(&self, req: &HttpRequest) -> Option<String>;
}

/// Reads the user id from a query parameter (`?userId=<id>`)
///
/// Session cookies are not consulted.
#[derive(Debug, Clone)]
pub struct QueryParamIdentity {
    param: String,
}

impl QueryParamIdentity {
    pub fn new(param: impl Into<String>) -> Self {
        Self {
            param: param.into(),
        }
    }
}

impl Default for QueryParamIdentity {
    fn default() -> Self {
        Self::new(USER_ID_QUERY_PARAM)
    }
}

impl IdentityResolver for QueryParamIdentity {
    fn resolve(&self, req: &HttpRequest) -> Option<String> {
        let query = web::Query::<HashMap<String, String>>::from_query(req.query_string()).ok()?;
        query
            .get(&self.param)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    }
}
