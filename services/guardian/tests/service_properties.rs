use guardian::model::{Application, Permission, PermissionKey, Role, RoleKey, User};
use guardian::service::{AccessService, RequestContext, ServiceError};
use guardian::store::RoleFilter;
use guardian::store::memory::InMemoryStore;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

fn service() -> AccessService {
    AccessService::new(Arc::new(InMemoryStore::new()))
}

fn ctx() -> RequestContext {
    RequestContext::with_timeout(Duration::from_secs(5))
}

fn permission_ref(id: &str) -> Permission {
    Permission {
        id: id.to_string(),
        ..Permission::default()
    }
}

fn role(id: &str, app_id: &str, permissions: &[&str]) -> Role {
    Role {
        id: id.to_string(),
        app_id: app_id.to_string(),
        name: format!("{id} in {app_id}"),
        permissions: permissions.iter().map(|p| permission_ref(p)).collect(),
        ..Role::default()
    }
}

fn role_ref(id: &str, app_id: &str) -> Role {
    Role {
        id: id.to_string(),
        app_id: app_id.to_string(),
        ..Role::default()
    }
}

fn key(id: &str, app_id: &str) -> RoleKey {
    RoleKey {
        id: id.to_string(),
        app_id: app_id.to_string(),
    }
}

async fn seed(svc: &AccessService) {
    let ctx = ctx();
    for app_id in ["a1", "a2"] {
        svc.upsert_app(
            &ctx,
            &Application {
                id: app_id.to_string(),
                name: app_id.to_uppercase(),
                description: String::new(),
            },
        )
        .await
        .expect("app");
        for perm in ["p1", "p2", "p3"] {
            svc.upsert_permission(
                &ctx,
                &Permission {
                    id: perm.to_string(),
                    app_id: app_id.to_string(),
                    name: format!("{perm} name"),
                    description: format!("{perm} description"),
                    created_at: None,
                },
            )
            .await
            .expect("permission");
        }
    }
}

#[tokio::test]
async fn upserted_role_reads_back_with_exact_permission_set() {
    let svc = service();
    seed(&svc).await;
    svc.upsert_role(&ctx(), &role("r1", "a1", &["p2", "p1", "p2"]))
        .await
        .expect("role");

    let read = svc.get_role(&ctx(), &key("r1", "a1")).await.expect("role");
    assert_eq!(read.name, "r1 in a1");
    let ids: BTreeSet<_> = read.permissions.iter().map(|p| p.id.clone()).collect();
    assert_eq!(ids, BTreeSet::from(["p1".to_string(), "p2".to_string()]));
    for permission in &read.permissions {
        assert_eq!(permission.app_id, "a1");
        assert_eq!(permission.name, format!("{} name", permission.id));
        assert_eq!(permission.description, format!("{} description", permission.id));
        assert!(permission.created_at.is_some());
    }

    let json = serde_json::to_string(&read).expect("json");
    let back: Role = serde_json::from_str(&json).expect("role");
    assert_eq!(back, read);
}

#[tokio::test]
async fn second_upsert_replaces_association_sets() {
    let svc = service();
    seed(&svc).await;
    svc.upsert_role(&ctx(), &role("r1", "a1", &["p1", "p2"]))
        .await
        .expect("role");
    svc.upsert_role(&ctx(), &role("r1", "a1", &["p3"]))
        .await
        .expect("role");
    let ids: Vec<_> = svc
        .get_role(&ctx(), &key("r1", "a1"))
        .await
        .expect("role")
        .permissions
        .into_iter()
        .map(|p| p.id)
        .collect();
    assert_eq!(ids, vec!["p3"]);

    svc.upsert_role(&ctx(), &role("r2", "a2", &[]))
        .await
        .expect("role");
    let user = |roles: Vec<Role>| User {
        username: "u1".to_string(),
        roles,
        ..User::default()
    };
    svc.upsert_user(&ctx(), &user(vec![role_ref("r1", "a1")]))
        .await
        .expect("user");
    svc.upsert_user(&ctx(), &user(vec![role_ref("r2", "a2")]))
        .await
        .expect("user");
    let read = svc.get_user(&ctx(), "u1").await.expect("user");
    let keys: Vec<_> = read.roles.iter().map(Role::key).collect();
    assert_eq!(keys, vec![key("r2", "a2")]);
    assert!(read.roles[0].permissions.is_empty());
}

#[tokio::test]
async fn deletes_are_idempotent_and_reads_become_not_found() {
    let svc = service();
    seed(&svc).await;
    svc.upsert_role(&ctx(), &role("r1", "a1", &["p1"]))
        .await
        .expect("role");

    svc.delete_role(&ctx(), &key("r1", "a1")).await.expect("delete");
    svc.delete_role(&ctx(), &key("r1", "a1"))
        .await
        .expect("delete again");
    let err = svc.get_role(&ctx(), &key("r1", "a1")).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));

    let never = PermissionKey {
        id: "never".to_string(),
        app_id: "a1".to_string(),
    };
    svc.delete_permission(&ctx(), &never)
        .await
        .expect("delete missing");
}

#[tokio::test]
async fn failed_write_leaves_previous_state_intact() {
    let svc = service();
    seed(&svc).await;
    svc.upsert_role(&ctx(), &role("r1", "a1", &["p1", "p2"]))
        .await
        .expect("role");

    let mut broken = role("r1", "a1", &["p1", "missing"]);
    broken.name = "renamed".to_string();
    let err = svc.upsert_role(&ctx(), &broken).await.unwrap_err();
    assert!(matches!(err, ServiceError::ConstraintViolation(_)));
    assert!(!err.is_retryable());

    let read = svc.get_role(&ctx(), &key("r1", "a1")).await.expect("role");
    assert_eq!(read.name, "r1 in a1");
    assert_eq!(read.permissions.len(), 2);
}

#[tokio::test]
async fn every_role_appears_once_with_empty_array_when_unassigned() {
    let svc = service();
    seed(&svc).await;
    svc.upsert_role(&ctx(), &role("r1", "a1", &["p1", "p2", "p3"]))
        .await
        .expect("role");
    svc.upsert_role(&ctx(), &role("r2", "a1", &[]))
        .await
        .expect("role");
    svc.upsert_role(&ctx(), &role("r1", "a2", &["p1"]))
        .await
        .expect("role");

    let roles = svc
        .list_roles(&ctx(), &RoleFilter::default())
        .await
        .expect("roles");
    let keys: Vec<_> = roles.iter().map(Role::key).collect();
    assert_eq!(keys, vec![key("r1", "a1"), key("r2", "a1"), key("r1", "a2")]);
    assert_eq!(roles[0].permissions.len(), 3);
    assert!(roles[1].permissions.is_empty());
    assert_eq!(roles[2].permissions.len(), 1);
    assert_eq!(roles[2].permissions[0].app_id, "a2");
}

#[tokio::test]
async fn app_filter_returns_exactly_that_apps_roles() {
    let svc = service();
    seed(&svc).await;
    for (id, app_id) in [("r1", "a1"), ("r2", "a1"), ("r3", "a2")] {
        svc.upsert_role(&ctx(), &role(id, app_id, &[]))
            .await
            .expect("role");
    }
    let roles = svc
        .list_roles(&ctx(), &RoleFilter::for_app("a1"))
        .await
        .expect("roles");
    assert_eq!(roles.len(), 2);
    assert!(roles.iter().all(|r| r.app_id == "a1"));
}

#[tokio::test]
async fn not_found_is_distinct_from_invalid_and_unavailable() {
    let svc = service();
    let err = svc.get_user(&ctx(), "nobody").await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
    assert!(!err.is_retryable());

    let err = svc.get_app(&ctx(), "").await.unwrap_err();
    assert!(matches!(err, ServiceError::Invalid(_)));

    let cancel = tokio_util::sync::CancellationToken::new();
    cancel.cancel();
    let err = svc
        .get_user(&ctx().with_cancellation(cancel), "nobody")
        .await
        .unwrap_err();
    assert!(err.is_retryable());
}

#[tokio::test]
async fn failed_user_replacement_keeps_previous_roles_and_timestamps() {
    let svc = service();
    seed(&svc).await;
    for id in ["r1", "r2", "r4"] {
        svc.upsert_role(&ctx(), &role(id, "a1", &["p1"]))
            .await
            .expect("role");
    }
    let user = |ids: &[&str]| User {
        username: "u".to_string(),
        roles: ids.iter().map(|id| role_ref(id, "a1")).collect(),
        ..User::default()
    };
    svc.upsert_user(&ctx(), &user(&["r1", "r2"]))
        .await
        .expect("user");
    let before = svc.get_user(&ctx(), "u").await.expect("user");

    // r3 sorts third among the requested keys and was never created.
    let err = svc
        .upsert_user(&ctx(), &user(&["r1", "r2", "r3", "r4"]))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::ConstraintViolation(_)));

    let after = svc.get_user(&ctx(), "u").await.expect("user");
    assert_eq!(after, before);
    let keys: Vec<_> = after.roles.iter().map(Role::key).collect();
    assert_eq!(keys, vec![key("r1", "a1"), key("r2", "a1")]);
}

#[tokio::test]
async fn application_round_trips_by_id() {
    let svc = service();
    let app = Application {
        id: "billing".to_string(),
        name: "Billing".to_string(),
        description: "Invoices and payments".to_string(),
    };
    svc.upsert_app(&ctx(), &app).await.expect("app");
    assert_eq!(svc.get_app(&ctx(), "billing").await.expect("app"), app);

    let renamed = Application {
        name: "Billing v2".to_string(),
        ..app
    };
    svc.upsert_app(&ctx(), &renamed).await.expect("app");
    assert_eq!(svc.get_app(&ctx(), "billing").await.expect("app"), renamed);
    assert_eq!(svc.list_apps(&ctx()).await.expect("apps"), vec![renamed]);
}

#[tokio::test]
async fn permission_round_trips_by_id_and_app() {
    let svc = service();
    seed(&svc).await;
    let key = PermissionKey {
        id: "p2".to_string(),
        app_id: "a2".to_string(),
    };
    let read = svc.get_permission(&ctx(), &key).await.expect("permission");
    assert_eq!(read.id, "p2");
    assert_eq!(read.app_id, "a2");
    assert_eq!(read.name, "p2 name");
    assert_eq!(read.description, "p2 description");
    let created_at = read.created_at.expect("created_at");

    let updated = Permission {
        description: "changed".to_string(),
        created_at: None,
        ..read
    };
    svc.upsert_permission(&ctx(), &updated)
        .await
        .expect("permission");
    let again = svc.get_permission(&ctx(), &key).await.expect("permission");
    assert_eq!(again.description, "changed");
    assert_eq!(again.created_at, Some(created_at));

    let other_app = PermissionKey {
        id: "p2".to_string(),
        app_id: "a1".to_string(),
    };
    let sibling = svc.get_permission(&ctx(), &other_app).await.expect("permission");
    assert_eq!(sibling.description, "p2 description");
}

#[tokio::test]
async fn user_round_trips_by_username_with_nested_roles() {
    let svc = service();
    seed(&svc).await;
    svc.upsert_role(&ctx(), &role("r1", "a1", &["p1", "p3"]))
        .await
        .expect("role");
    svc.upsert_role(&ctx(), &role("r1", "a2", &[]))
        .await
        .expect("role");
    let user = User {
        username: "carol".to_string(),
        roles: vec![role_ref("r1", "a2"), role_ref("r1", "a1"), role_ref("r1", "a2")],
        ..User::default()
    };
    svc.upsert_user(&ctx(), &user).await.expect("user");

    let read = svc.get_user(&ctx(), "carol").await.expect("user");
    assert_eq!(read.username, "carol");
    assert!(read.created_at.is_some());
    assert!(read.updated_at >= read.created_at);
    assert_eq!(read.role_keys(), user.role_keys());
    assert_eq!(read.roles.len(), 2);
    let a1 = read
        .roles
        .iter()
        .find(|r| r.app_id == "a1")
        .expect("a1 role");
    assert_eq!(a1.name, "r1 in a1");
    let ids: Vec<_> = a1.permissions.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["p1", "p3"]);

    let json = serde_json::to_string(&read).expect("json");
    let back: User = serde_json::from_str(&json).expect("user");
    assert_eq!(back, read);
    assert_eq!(svc.list_users(&ctx()).await.expect("users"), vec![read]);
}

#[tokio::test]
async fn listings_use_byte_order_for_mixed_case_ids() {
    let svc = service();
    for app_id in ["beta", "Alpha", "alpha"] {
        svc.upsert_app(
            &ctx(),
            &Application {
                id: app_id.to_string(),
                ..Application::default()
            },
        )
        .await
        .expect("app");
        svc.upsert_role(&ctx(), &role("Zed", app_id, &[]))
            .await
            .expect("role");
        svc.upsert_role(&ctx(), &role("abe", app_id, &[]))
            .await
            .expect("role");
    }
    let apps: Vec<_> = svc
        .list_apps(&ctx())
        .await
        .expect("apps")
        .into_iter()
        .map(|a| a.id)
        .collect();
    assert_eq!(apps, vec!["Alpha", "alpha", "beta"]);

    let roles: Vec<_> = svc
        .list_roles(&ctx(), &RoleFilter::for_app("alpha"))
        .await
        .expect("roles")
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(roles, vec!["Zed", "abe"]);
}
