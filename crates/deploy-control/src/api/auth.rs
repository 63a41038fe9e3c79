//! Environment identity extraction.
//!
//! Callers are authenticated by the gateway in front of this service, which
//! forwards the resolved environment in request headers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;

use crate::types::{AuthenticatedEnvironment, EnvironmentId, ProjectId};

use super::{error_response, ApiError};

/// Header carrying the authenticated environment ID.
pub const ENVIRONMENT_ID_HEADER: &str = "x-environment-id";

/// Header carrying the project ID of the authenticated environment.
pub const PROJECT_ID_HEADER: &str = "x-project-id";

/// Header carrying the environment slug.
const ENVIRONMENT_SLUG_HEADER: &str = "x-environment-slug";

/// Extractor for the environment the gateway authenticated.
#[derive(Debug, Clone)]
pub struct EnvironmentIdentity(pub AuthenticatedEnvironment);

fn header<'a>(parts: &'a Parts, name: &str) -> Result<Option<&'a str>, ApiError> {
    parts
        .headers
        .get(name)
        .map(|value| {
            value.to_str().map_err(|_| {
                error_response(StatusCode::BAD_REQUEST, format!("invalid {name} header"))
            })
        })
        .transpose()
}

impl<S> FromRequestParts<S> for EnvironmentIdentity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let environment_id = header(parts, ENVIRONMENT_ID_HEADER)?.filter(|v| !v.is_empty());
        let project_id = header(parts, PROJECT_ID_HEADER)?.filter(|v| !v.is_empty());

        let (Some(environment_id), Some(project_id)) = (environment_id, project_id) else {
            return Err(error_response(
                StatusCode::UNAUTHORIZED,
                "missing authenticated environment",
            ));
        };

        Ok(Self(AuthenticatedEnvironment {
            id: EnvironmentId::new(environment_id),
            project_id: ProjectId::new(project_id),
            slug: header(parts, ENVIRONMENT_SLUG_HEADER)?.map(ToOwned::to_owned),
        }))
    }
}
