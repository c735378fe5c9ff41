//! Postgres-backed implementation of the access store.
//!
//! # What this module is
//! Implements [`AccessStore`] on top of a `sqlx::PgPool`. It is the durable, shared home of the
//! RBAC hierarchy: applications, their permissions and roles, the role→permission associations,
//! users, and the user→role associations.
//!
//! # Key invariants
//! - Every aggregated read is one `LEFT JOIN` statement folded by [`super::aggregate`]; no N+1.
//! - Role and user upserts replace their association set inside one transaction. The
//!   `Transaction` rolls back on drop, so an early `?` return or a cancelled future never commits
//!   partial state.
//! - Foreign keys cascade on delete; a role can only reference permissions of its own
//!   application because both keys share the `app_id` column.
//!
//! # Security notes
//! - Filter values are always bound parameters. Only column names from a fixed, internal list
//!   are pushed into SQL text.
//! - The database password is never logged.
//!
//! # Operational notes
//! - Migrations run in [`PostgresStore::connect`] before any request is served.
//! - `acquire_timeout` makes pool exhaustion fail fast as [`StoreError::Unavailable`], and the
//!   connect timeout bounds startup against an unreachable server.
use super::aggregate::{RoleRow, UserRow, fold_roles, fold_users};
use super::{AccessStore, RoleFilter, StoreError, StoreResult};
use crate::config::{DatabaseConfig, PoolConfig};
use crate::model::{Application, Permission, PermissionKey, Role, RoleKey, Timestamp, User};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};

const ROLE_SELECT: &str = r#"SELECT
    r.id AS role_id,
    r.app_id AS role_app_id,
    r.name AS role_name,
    r.description AS role_description,
    r.created_at AS role_created_at,
    p.id AS perm_id,
    p.name AS perm_name,
    p.description AS perm_description,
    p.created_at AS perm_created_at
FROM roles r
LEFT JOIN role_permissions rp ON rp.role_id = r.id AND rp.app_id = r.app_id
LEFT JOIN permissions p ON p.id = rp.permission_id AND p.app_id = rp.app_id"#;

/// Byte-order collation keeps listings identical to the in-memory backend's `BTreeMap` order.
const ROLE_ORDER: &str = r#" ORDER BY r.app_id COLLATE "C", r.id COLLATE "C", p.id COLLATE "C""#;

const USER_SELECT: &str = r#"SELECT
    u.username AS username,
    u.created_at AS user_created_at,
    u.updated_at AS user_updated_at,
    r.id AS role_id,
    r.app_id AS role_app_id,
    r.name AS role_name,
    r.description AS role_description,
    r.created_at AS role_created_at,
    p.id AS perm_id,
    p.name AS perm_name,
    p.description AS perm_description,
    p.created_at AS perm_created_at
FROM users u
LEFT JOIN user_roles ur ON ur.username = u.username
LEFT JOIN roles r ON r.id = ur.role_id AND r.app_id = ur.app_id
LEFT JOIN role_permissions rp ON rp.role_id = r.id AND rp.app_id = r.app_id
LEFT JOIN permissions p ON p.id = rp.permission_id AND p.app_id = rp.app_id"#;

const USER_ORDER: &str = r#"
ORDER BY u.updated_at DESC, u.username COLLATE "C",
    r.app_id COLLATE "C", r.id COLLATE "C", p.id COLLATE "C""#;

/// One equality predicate: an allowlisted column and the value bound against it.
type Predicate = (&'static str, String);

/// Durable access store backed by Postgres.
///
/// # Example
/// ```rust,no_run
/// use guardian::config::{DatabaseConfig, PoolConfig};
/// use guardian::store::postgres::PostgresStore;
///
/// async fn open(db: DatabaseConfig) {
///     let _ = PostgresStore::connect(&db, &PoolConfig::default()).await;
/// }
/// ```
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

#[derive(Debug, FromRow)]
struct DbApplication {
    id: String,
    name: String,
    description: String,
}

impl From<DbApplication> for Application {
    fn from(row: DbApplication) -> Self {
        Application {
            id: row.id,
            name: row.name,
            description: row.description,
        }
    }
}

#[derive(Debug, FromRow)]
struct DbPermission {
    id: String,
    app_id: String,
    name: String,
    description: String,
    created_at: DateTime<Utc>,
}

impl From<DbPermission> for Permission {
    fn from(row: DbPermission) -> Self {
        Permission {
            id: row.id,
            app_id: row.app_id,
            name: row.name,
            description: row.description,
            created_at: Some(Timestamp::from(row.created_at)),
        }
    }
}

impl PostgresStore {
    /// Open a pool against `db` and apply the embedded migrations.
    pub async fn connect(db: &DatabaseConfig, pool: &PoolConfig) -> StoreResult<Self> {
        let options = PgConnectOptions::new()
            .host(&db.host)
            .port(db.port)
            .database(&db.database)
            .username(&db.username)
            .password(&db.password);
        let store = Self::from_options(options, pool, true).await?;
        tracing::info!(
            host = %db.host,
            port = db.port,
            database = %db.database,
            max_connections = pool.max_connections,
            "postgres store ready"
        );
        Ok(store)
    }

    /// Open a pool from prebuilt connect options.
    pub async fn from_options(
        options: PgConnectOptions,
        pool: &PoolConfig,
        run_migrations: bool,
    ) -> StoreResult<Self> {
        let connect = PgPoolOptions::new()
            .max_connections(pool.max_connections)
            .acquire_timeout(pool.acquire_timeout())
            .connect_with(options);
        let pool = tokio::time::timeout(pool.connect_timeout(), connect)
            .await
            .map_err(|_| StoreError::Unavailable("timed out connecting to database".into()))??;

        if run_migrations {
            sqlx::migrate!("./migrations").run(&pool).await?;
        }
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch_roles(&self, predicates: Vec<Predicate>) -> StoreResult<Vec<Role>> {
        let mut builder = select_with(ROLE_SELECT, predicates, ROLE_ORDER);
        let rows = builder
            .build_query_as::<RoleRow>()
            .fetch_all(&self.pool)
            .await?;
        Ok(fold_roles(rows))
    }

    async fn fetch_users(&self, predicates: Vec<Predicate>) -> StoreResult<Vec<User>> {
        let mut builder = select_with(USER_SELECT, predicates, USER_ORDER);
        let rows = builder
            .build_query_as::<UserRow>()
            .fetch_all(&self.pool)
            .await?;
        Ok(fold_users(rows))
    }
}

/// Assemble `select [WHERE col = $n AND ...] order`.
fn select_with(
    select: &'static str,
    predicates: Vec<Predicate>,
    order: &'static str,
) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(select);
    for (position, (column, value)) in predicates.into_iter().enumerate() {
        builder.push(if position == 0 { " WHERE " } else { " AND " });
        builder.push(column);
        builder.push(" = ");
        builder.push_bind(value);
    }
    builder.push(order);
    builder
}

fn role_predicates(filter: &RoleFilter) -> Vec<Predicate> {
    let mut predicates = Vec::new();
    if let Some(app_id) = &filter.app_id {
        predicates.push(("r.app_id", app_id.clone()));
    }
    predicates
}

fn role_key_predicates(key: &RoleKey) -> Vec<Predicate> {
    vec![("r.id", key.id.clone()), ("r.app_id", key.app_id.clone())]
}

#[async_trait]
impl AccessStore for PostgresStore {
    async fn list_apps(&self) -> StoreResult<Vec<Application>> {
        let rows = sqlx::query_as::<_, DbApplication>(
            r#"SELECT id, name, description FROM applications ORDER BY id COLLATE "C""#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Application::from).collect())
    }

    async fn get_app(&self, app_id: &str) -> StoreResult<Application> {
        sqlx::query_as::<_, DbApplication>(
            "SELECT id, name, description FROM applications WHERE id = $1",
        )
        .bind(app_id)
        .fetch_optional(&self.pool)
        .await?
        .map(Application::from)
        .ok_or_else(|| StoreError::NotFound("application".into()))
    }

    async fn upsert_app(&self, app: &Application) -> StoreResult<()> {
        sqlx::query(
            r#"INSERT INTO applications (id, name, description) VALUES ($1, $2, $3)
               ON CONFLICT (id) DO UPDATE
               SET name = EXCLUDED.name, description = EXCLUDED.description"#,
        )
        .bind(&app.id)
        .bind(&app.name)
        .bind(&app.description)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_app(&self, app_id: &str) -> StoreResult<()> {
        sqlx::query("DELETE FROM applications WHERE id = $1")
            .bind(app_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_permissions(&self) -> StoreResult<Vec<Permission>> {
        let rows = sqlx::query_as::<_, DbPermission>(
            r#"SELECT id, app_id, name, description, created_at
               FROM permissions ORDER BY app_id COLLATE "C", id COLLATE "C""#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Permission::from).collect())
    }

    async fn get_permission(&self, key: &PermissionKey) -> StoreResult<Permission> {
        sqlx::query_as::<_, DbPermission>(
            r#"SELECT id, app_id, name, description, created_at
               FROM permissions WHERE id = $1 AND app_id = $2"#,
        )
        .bind(&key.id)
        .bind(&key.app_id)
        .fetch_optional(&self.pool)
        .await?
        .map(Permission::from)
        .ok_or_else(|| StoreError::NotFound("permission".into()))
    }

    async fn upsert_permission(&self, permission: &Permission) -> StoreResult<()> {
        sqlx::query(
            r#"INSERT INTO permissions (id, app_id, name, description) VALUES ($1, $2, $3, $4)
               ON CONFLICT (id, app_id) DO UPDATE
               SET name = EXCLUDED.name, description = EXCLUDED.description"#,
        )
        .bind(&permission.id)
        .bind(&permission.app_id)
        .bind(&permission.name)
        .bind(&permission.description)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_permission(&self, key: &PermissionKey) -> StoreResult<()> {
        sqlx::query("DELETE FROM permissions WHERE id = $1 AND app_id = $2")
            .bind(&key.id)
            .bind(&key.app_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_roles(&self, filter: &RoleFilter) -> StoreResult<Vec<Role>> {
        self.fetch_roles(role_predicates(filter)).await
    }

    async fn get_role(&self, key: &RoleKey) -> StoreResult<Role> {
        self.fetch_roles(role_key_predicates(key))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound("role".into()))
    }

    async fn upsert_role(&self, role: &Role) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"INSERT INTO roles (id, app_id, name, description) VALUES ($1, $2, $3, $4)
               ON CONFLICT (id, app_id) DO UPDATE
               SET name = EXCLUDED.name, description = EXCLUDED.description"#,
        )
        .bind(&role.id)
        .bind(&role.app_id)
        .bind(&role.name)
        .bind(&role.description)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM role_permissions WHERE role_id = $1 AND app_id = $2")
            .bind(&role.id)
            .bind(&role.app_id)
            .execute(&mut *tx)
            .await?;

        for permission_id in role.permission_ids() {
            sqlx::query(
                "INSERT INTO role_permissions (role_id, app_id, permission_id) VALUES ($1, $2, $3)",
            )
            .bind(&role.id)
            .bind(&role.app_id)
            .bind(permission_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete_role(&self, key: &RoleKey) -> StoreResult<()> {
        sqlx::query("DELETE FROM roles WHERE id = $1 AND app_id = $2")
            .bind(&key.id)
            .bind(&key.app_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        self.fetch_users(Vec::new()).await
    }

    async fn get_user(&self, username: &str) -> StoreResult<User> {
        self.fetch_users(vec![("u.username", username.to_string())])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound("user".into()))
    }

    async fn upsert_user(&self, user: &User) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"INSERT INTO users (username) VALUES ($1)
               ON CONFLICT (username) DO UPDATE SET updated_at = now()"#,
        )
        .bind(&user.username)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM user_roles WHERE username = $1")
            .bind(&user.username)
            .execute(&mut *tx)
            .await?;

        for key in user.role_keys() {
            sqlx::query("INSERT INTO user_roles (username, role_id, app_id) VALUES ($1, $2, $3)")
                .bind(&user.username)
                .bind(&key.id)
                .bind(&key.app_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete_user(&self, username: &str) -> StoreResult<()> {
        sqlx::query("DELETE FROM users WHERE username = $1")
            .bind(username)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }

    fn is_durable(&self) -> bool {
        true
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
