//! Organizations, memberships and members

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use hr_common::api::query::{
    MemberSort, OrgSort, MEMBER_LIMIT_DEFAULT, MEMBER_LIMIT_MAX, PAGE_LIMIT_DEFAULT, PAGE_LIMIT_MAX,
};
use hr_common::api::requests::{OrgCreate, OrgUpdate};
use hr_common::api::types::{
    DetailResponse, MemberRole, OrgMemberOut, OrgOut, OrgWithMembershipOut,
};
use tracing::info;
use uuid::Uuid;

use crate::api::{require_moderator, ApiJson, ApiPath, ApiQuery};
use crate::auth::CurrentUser;
use crate::db::orgs::{self, Promotion};
use crate::error::{ApiError, ApiResult};
use crate::pagination::ListParams;
use crate::slug::slugify;
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/orgs", get(list_orgs).post(create_org))
        .route("/orgs/with-membership", get(list_orgs_with_membership))
        .route(
            "/orgs/:slug",
            get(get_org).patch(update_org).delete(delete_org),
        )
        .route("/orgs/:slug/join", post(join_org))
        .route("/orgs/:slug/promote/:profile_id", post(promote_member))
        .route("/orgs/:slug/members", get(list_members))
}

/// GET /api/orgs
pub async fn list_orgs(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<ListParams>,
) -> ApiResult<Json<Vec<OrgOut>>> {
    let list = params.resolve::<OrgSort>(PAGE_LIMIT_DEFAULT, PAGE_LIMIT_MAX)?;
    let rows = orgs::list(&state.db, &list).await?;

    let out = rows
        .into_iter()
        .map(OrgOut::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(out))
}

/// GET /api/orgs/with-membership
///
/// Same page as `/orgs`, annotated with the caller's membership.
pub async fn list_orgs_with_membership(
    user: CurrentUser,
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<ListParams>,
) -> ApiResult<Json<Vec<OrgWithMembershipOut>>> {
    let list = params.resolve::<OrgSort>(PAGE_LIMIT_DEFAULT, PAGE_LIMIT_MAX)?;
    let rows = orgs::list_with_membership(&state.db, user.id, &list).await?;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let member_role = row
            .member_role
            .as_deref()
            .map(str::parse::<MemberRole>)
            .transpose()?;
        out.push(OrgWithMembershipOut {
            org: OrgOut::try_from(row.org)?,
            is_member: member_role.is_some(),
            member_role,
        });
    }
    Ok(Json(out))
}

/// POST /api/orgs
///
/// The caller becomes the organization's creator and first member.
pub async fn create_org(
    user: CurrentUser,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<OrgCreate>,
) -> ApiResult<(StatusCode, Json<OrgOut>)> {
    payload.validate()?;

    let base_slug = slugify(&payload.name, "org");
    let row = orgs::create(&state.db, user.id, &payload, &base_slug).await?;
    info!(slug = %row.slug, creator = %user.username, "Organization created");

    Ok((StatusCode::CREATED, Json(OrgOut::try_from(row)?)))
}

/// GET /api/orgs/:slug
pub async fn get_org(
    State(state): State<AppState>,
    ApiPath(slug): ApiPath<String>,
) -> ApiResult<Json<OrgOut>> {
    let row = orgs::require_by_slug(&state.db, &slug).await?;
    Ok(Json(OrgOut::try_from(row)?))
}

/// PATCH /api/orgs/:slug (creator or moderator)
pub async fn update_org(
    user: CurrentUser,
    State(state): State<AppState>,
    ApiPath(slug): ApiPath<String>,
    ApiJson(payload): ApiJson<OrgUpdate>,
) -> ApiResult<Json<OrgOut>> {
    payload.validate()?;
    let org = orgs::require_by_slug(&state.db, &slug).await?;
    require_moderator(&state.db, &org.id, user.id).await?;

    let row = orgs::update(&state.db, &org.id, &payload).await?;
    Ok(Json(OrgOut::try_from(row)?))
}

/// DELETE /api/orgs/:slug (creator only)
pub async fn delete_org(
    user: CurrentUser,
    State(state): State<AppState>,
    ApiPath(slug): ApiPath<String>,
) -> ApiResult<StatusCode> {
    let org = orgs::require_by_slug(&state.db, &slug).await?;

    if org.created_by.as_deref() != Some(user.id.to_string().as_str()) {
        return Err(ApiError::Forbidden(
            "Only the organization creator can delete it".to_string(),
        ));
    }

    orgs::delete(&state.db, &org.id).await?;
    info!(slug = %slug, "Organization deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/orgs/:slug/join
pub async fn join_org(
    user: CurrentUser,
    State(state): State<AppState>,
    ApiPath(slug): ApiPath<String>,
) -> ApiResult<Json<DetailResponse>> {
    let org = orgs::require_by_slug(&state.db, &slug).await?;

    let detail = if orgs::join(&state.db, &org.id, user.id).await? {
        "Joined"
    } else {
        "Already a member"
    };
    Ok(Json(DetailResponse::new(detail)))
}

/// POST /api/orgs/:slug/promote/:profile_id (creator only)
pub async fn promote_member(
    user: CurrentUser,
    State(state): State<AppState>,
    ApiPath((slug, profile_id)): ApiPath<(String, Uuid)>,
) -> ApiResult<Json<DetailResponse>> {
    let org = orgs::require_by_slug(&state.db, &slug).await?;

    if orgs::role_of(&state.db, &org.id, user.id).await? != Some(MemberRole::Creator) {
        return Err(ApiError::Forbidden(
            "Only the organization creator can promote members".to_string(),
        ));
    }

    match orgs::promote(&state.db, &org.id, profile_id).await? {
        Promotion::Promoted => {
            info!(slug = %slug, member = %profile_id, "Member promoted to moderator");
            Ok(Json(DetailResponse::new("Promoted to moderator")))
        }
        Promotion::AlreadyModerator => Ok(Json(DetailResponse::new("Already a moderator"))),
        Promotion::IsCreator => Err(ApiError::BadRequest(
            "The creator's role cannot be changed".to_string(),
        )),
        Promotion::NotMember => Err(ApiError::NotFound("Member not found".to_string())),
    }
}

/// GET /api/orgs/:slug/members (members only)
pub async fn list_members(
    user: CurrentUser,
    State(state): State<AppState>,
    ApiPath(slug): ApiPath<String>,
    ApiQuery(params): ApiQuery<ListParams>,
) -> ApiResult<Json<Vec<OrgMemberOut>>> {
    let org = orgs::require_by_slug(&state.db, &slug).await?;

    if orgs::role_of(&state.db, &org.id, user.id).await?.is_none() {
        return Err(ApiError::Forbidden(
            "Not a member of this organization".to_string(),
        ));
    }

    let list = params.resolve::<MemberSort>(MEMBER_LIMIT_DEFAULT, MEMBER_LIMIT_MAX)?;
    let rows = orgs::list_members(&state.db, &org.id, &list).await?;

    let out = rows
        .into_iter()
        .map(OrgMemberOut::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(out))
}
