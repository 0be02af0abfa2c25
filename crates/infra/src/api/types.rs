//! Wire types for the booking platform's GraphQL API and token endpoint.

use deskbot_domain::{Booking, DeskRef, Moment, SpaceRef};
use serde::{Deserialize, Serialize};

/// Generic GraphQL response envelope.
#[derive(Debug, Deserialize)]
pub(crate) struct GraphQLResponse<T> {
    pub data: Option<T>,
    pub errors: Option<Vec<GraphQLError>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphQLError {
    pub message: String,
}

/// The platform identifies users by an `{id, type}` pair in query variables.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct UserIdInput {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl UserIdInput {
    pub fn internal(id: String) -> Self {
        Self { id, kind: "Internal".to_string() }
    }
}

/* ------------------------------- me ------------------------------- */

#[derive(Debug, Deserialize)]
pub(crate) struct MeData {
    pub me: MeUser,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MeUser {
    pub id: String,
}

/* --------------------------- favorites ---------------------------- */

#[derive(Debug, Deserialize)]
pub(crate) struct FavoritesData {
    pub user: FavoritesUser,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FavoritesUser {
    #[serde(default)]
    pub favorite_spaces_and_desks: Vec<FavoritePair>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FavoritePair {
    #[serde(default)]
    pub desk: Option<DeskRef>,
    #[serde(default)]
    pub space: Option<SpaceRef>,
}

/* -------------------------- affectations --------------------------- */

#[derive(Debug, Deserialize)]
pub(crate) struct AffectationsData {
    pub user: AffectationsUser,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AffectationsUser {
    #[serde(default)]
    pub affectations: Vec<Booking>,
}

/* ------------------------ createAffectation ------------------------ */

#[derive(Debug, Clone, Serialize)]
pub(crate) struct DatedMoment {
    pub date: String,
    pub moment: Moment,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateAffectationData {
    pub create_affectation: CreatedAffectation,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreatedAffectation {
    pub id: String,
}

/* ------------------------ deleteAffectation ------------------------ */

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DeleteAffectationData {
    pub delete_affectation: DeleteResult,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DeleteResult {
    pub success: bool,
}

/* --------------------------- token endpoint ------------------------ */

#[derive(Debug, Serialize)]
pub(crate) struct TokenRefreshRequest {
    pub grant_type: &'static str,
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenRefreshResponse {
    pub access_token: String,
}
