//! Request authentication.
//!
//! The engine trusts whatever [`Principal`] it is handed. This module produces one from the
//! request: the `x-api-key` header must match the configured key, after which the gateway's
//! identity headers are taken as given.
//!
//! | Header                | Required | Value                              |
//! |-----------------------|----------|------------------------------------|
//! | `x-api-key`           | yes      | shared secret                      |
//! | `x-user-id`           | yes      | canonical user id                  |
//! | `x-user-role`         | yes      | `superadmin`, `admin`, `doctor`, … |
//! | `x-organization-id`   | no       | canonical organization id          |
//! | `x-organization-type` | no       | `hospital`, `fleet` or `system`    |

use crate::error::{ApiError, ApiResult};
use axum::http::HeaderMap;
use medtrip_core::ids::{OrganizationId, UserId};
use medtrip_core::types::{OrganizationType, Role};
use medtrip_core::Principal;

pub const API_KEY_HEADER: &str = "x-api-key";
pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";
pub const ORGANIZATION_ID_HEADER: &str = "x-organization-id";
pub const ORGANIZATION_TYPE_HEADER: &str = "x-organization-type";

/// Turns an incoming request's headers into an authenticated principal.
pub trait IdentityResolver: Send + Sync {
    fn resolve(&self, headers: &HeaderMap) -> ApiResult<Principal>;
}

/// Shared-key gateway authentication with identity carried in headers.
pub struct HeaderIdentityResolver {
    api_key: String,
}

impl HeaderIdentityResolver {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
        }
    }

    fn check_api_key(&self, headers: &HeaderMap) -> ApiResult<()> {
        match header(headers, API_KEY_HEADER)? {
            Some(provided) if provided == self.api_key => Ok(()),
            Some(_) => Err(ApiError::Unauthenticated("invalid API key".into())),
            None => Err(ApiError::Unauthenticated("missing API key".into())),
        }
    }
}

impl IdentityResolver for HeaderIdentityResolver {
    fn resolve(&self, headers: &HeaderMap) -> ApiResult<Principal> {
        self.check_api_key(headers)?;

        let user_id = required(headers, USER_ID_HEADER)?
            .parse::<UserId>()
            .map_err(|e| ApiError::Unauthenticated(e.to_string()))?;
        let role = required(headers, USER_ROLE_HEADER)?
            .parse::<Role>()
            .map_err(|e| ApiError::Unauthenticated(e.to_string()))?;
        let organization_id = header(headers, ORGANIZATION_ID_HEADER)?
            .map(str::parse::<OrganizationId>)
            .transpose()
            .map_err(|e| ApiError::Unauthenticated(e.to_string()))?;
        let organization_type = header(headers, ORGANIZATION_TYPE_HEADER)?
            .map(str::parse::<OrganizationType>)
            .transpose()
            .map_err(|e| ApiError::Unauthenticated(e.to_string()))?;

        if organization_id.is_some() != organization_type.is_some() {
            return Err(ApiError::Unauthenticated(
                "organization id and type must be sent together".into(),
            ));
        }

        Ok(Principal {
            user_id,
            role,
            organization_id,
            organization_type,
        })
    }
}

fn header<'h>(headers: &'h HeaderMap, name: &str) -> ApiResult<Option<&'h str>> {
    headers
        .get(name)
        .map(|value| {
            value
                .to_str()
                .map(str::trim)
                .map_err(|_| ApiError::Unauthenticated(format!("{name} is not valid text")))
        })
        .transpose()
}

fn required<'h>(headers: &'h HeaderMap, name: &str) -> ApiResult<&'h str> {
    header(headers, name)?
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::Unauthenticated(format!("missing {name} header")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, String)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).expect("header value"));
        }
        map
    }

    #[test]
    fn resolves_organization_member() {
        let resolver = HeaderIdentityResolver::new("secret");
        let user = UserId::new();
        let org = OrganizationId::new();
        let principal = resolver
            .resolve(&headers(&[
                (API_KEY_HEADER, "secret".into()),
                (USER_ID_HEADER, user.to_string()),
                (USER_ROLE_HEADER, "paramedic".into()),
                (ORGANIZATION_ID_HEADER, org.to_string()),
                (ORGANIZATION_TYPE_HEADER, "fleet".into()),
            ]))
            .expect("valid headers");

        assert_eq!(principal.user_id, user);
        assert_eq!(principal.role, Role::Paramedic);
        assert!(principal.belongs_to(org));
        assert!(principal.is_fleet());
    }

    #[test]
    fn rejects_bad_key_and_half_an_organization() {
        let resolver = HeaderIdentityResolver::new("secret");
        let user = UserId::new().to_string();

        let err = resolver
            .resolve(&headers(&[
                (API_KEY_HEADER, "guess".into()),
                (USER_ID_HEADER, user.clone()),
                (USER_ROLE_HEADER, "admin".into()),
            ]))
            .expect_err("wrong key");
        assert!(matches!(err, ApiError::Unauthenticated(_)));

        let err = resolver
            .resolve(&headers(&[
                (API_KEY_HEADER, "secret".into()),
                (USER_ID_HEADER, user),
                (USER_ROLE_HEADER, "admin".into()),
                (ORGANIZATION_TYPE_HEADER, "hospital".into()),
            ]))
            .expect_err("type without id");
        assert!(matches!(err, ApiError::Unauthenticated(_)));
    }

    #[test]
    fn superadmin_needs_no_organization() {
        let resolver = HeaderIdentityResolver::new("secret");
        let principal = resolver
            .resolve(&headers(&[
                (API_KEY_HEADER, "secret".into()),
                (USER_ID_HEADER, UserId::new().to_string()),
                (USER_ROLE_HEADER, "superadmin".into()),
            ]))
            .expect("superadmin");
        assert!(principal.is_superadmin());
        assert_eq!(principal.organization_id, None);
    }
}
