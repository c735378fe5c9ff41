//! OpenAPI schema aggregation.
//!
//! # Purpose
//! Collects every route and schema type into one OpenAPI document for docs and client
//! generation.
use crate::api::{
    apps, permissions, roles, system,
    types::{AckResponse, ErrorResponse},
    users,
};
use crate::model::{Application, Permission, PermissionKey, Role, RoleKey, User};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "guardian",
        version = "v1",
        description = "RBAC authorization data HTTP API"
    ),
    paths(
        system::health,
        apps::list_apps,
        apps::get_app,
        apps::upsert_app,
        apps::delete_app,
        permissions::list_permissions,
        permissions::get_permission,
        permissions::upsert_permission,
        permissions::delete_permission,
        roles::list_roles,
        roles::get_role,
        roles::upsert_role,
        roles::delete_role,
        users::list_users,
        users::get_user,
        users::upsert_user,
        users::delete_user
    ),
    components(schemas(
        AckResponse,
        ErrorResponse,
        Application,
        Permission,
        PermissionKey,
        Role,
        RoleKey,
        User
    )),
    tags(
        (name = "system", description = "Health probe"),
        (name = "apps", description = "Application management"),
        (name = "permissions", description = "Permission management"),
        (name = "roles", description = "Role management"),
        (name = "users", description = "User management")
    )
)]
pub struct ApiDoc;
