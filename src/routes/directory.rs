//! Directory routes: students, users, children and classes.

use axum::extract::{Path, Query, State};
use axum::response::Json;
use serde::Deserialize;

use crate::error::ApiError;
use crate::routes::auth::AuthUser;
use crate::services::directory::{ClassInfo, Directory, PublicUser, Role};
use crate::services::session::SessionUser;
use crate::state::AppState;

/// Self, an admin, or the parent of the target student.
fn can_view(dir: &Directory, viewer: &SessionUser, target_id: &str) -> bool {
    viewer.id == target_id || viewer.role == Role::Admin || dir.is_parent_of(&viewer.id, target_id)
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct StudentsQuery {
    pub parent_id: Option<String>,
}

/// `GET /api/students[?parentId=..]`
///
/// Without a filter this is admin only. A parent may filter on their own id.
pub async fn list_students(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<StudentsQuery>,
) -> Result<Json<Vec<PublicUser>>, ApiError> {
    let dir = state.directory.read().await;
    match query.parent_id {
        Some(parent_id) => {
            if auth.user.id != parent_id && auth.user.role != Role::Admin {
                return Err(ApiError::forbidden());
            }
            Ok(Json(dir.students_by_parent_id(&parent_id)))
        }
        None => {
            auth.require(&[Role::Admin])?;
            Ok(Json(dir.all_students()))
        }
    }
}

/// `GET /api/users/{id}`
pub async fn get_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<PublicUser>, ApiError> {
    let dir = state.directory.read().await;
    if !can_view(&dir, &auth.user, &id) {
        return Err(ApiError::forbidden());
    }
    dir.user_by_id(&id).map(Json).ok_or_else(|| ApiError::not_found("User"))
}

/// `GET /api/parents/{id}/children`: that parent or an admin.
pub async fn parent_children(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Vec<PublicUser>>, ApiError> {
    if auth.user.id != id && auth.user.role != Role::Admin {
        return Err(ApiError::forbidden());
    }
    let dir = state.directory.read().await;
    match dir.user_by_id(&id) {
        Some(parent) if parent.role == Role::Parent => Ok(Json(dir.children_for_parent(&id))),
        _ => Err(ApiError::not_found("Parent")),
    }
}

/// `GET /api/classes`: the full catalog, for any signed-in user.
pub async fn list_classes(State(state): State<AppState>, _auth: AuthUser) -> Json<Vec<ClassInfo>> {
    Json(state.directory.read().await.all_classes())
}

/// `GET /api/users/{id}/classes`: enrolments for a student, assignments for a teacher.
pub async fn user_classes(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Vec<ClassInfo>>, ApiError> {
    let dir = state.directory.read().await;
    if !can_view(&dir, &auth.user, &id) {
        return Err(ApiError::forbidden());
    }
    let user = dir.user_by_id(&id).ok_or_else(|| ApiError::not_found("User"))?;
    let classes = match user.role {
        Role::Student => dir.classes_by_student_id(&id),
        Role::Teacher => dir.classes_by_teacher_id(&id),
        Role::Parent | Role::Admin => Vec::new(),
    };
    Ok(Json(classes))
}

#[cfg(test)]
#[path = "directory_test.rs"]
mod tests;
