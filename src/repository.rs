use crate::models::{AdminStats, Profile, ProfileUpdate, Role};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use std::{collections::HashMap, sync::Arc};
use thiserror::Error;
use tokio::sync::RwLock;

/// RepositoryError
///
/// The profile store could not be reached or answered unexpectedly.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("profile store query failed: {0}")]
    Database(#[from] sqlx::Error),
    #[error("profile store unavailable: {0}")]
    Unavailable(String),
}

/// Repository Trait
///
/// The document-store contract for user profiles, keyed by the identity provider's
/// subject id. Handlers, the identity provider and tests only ever see this trait.
///
/// `Send + Sync + async_trait` make `Arc<dyn Repository>` shareable across Axum tasks.
#[async_trait]
pub trait Repository: Send + Sync {
    async fn get_profile(&self, uid: &str) -> Result<Option<Profile>, RepositoryError>;

    /// Writes the whole document, replacing any existing one.
    async fn set_profile(&self, profile: Profile) -> Result<(), RepositoryError>;

    /// Applies a partial update. `updated_at` moves to `now` when the display name or
    /// role changes. Returns `None` when no profile exists for `uid`.
    async fn update_profile(
        &self,
        uid: &str,
        update: ProfileUpdate,
        now: DateTime<Utc>,
    ) -> Result<Option<Profile>, RepositoryError>;

    async fn get_stats(&self) -> Result<AdminStats, RepositoryError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// ProfileRow
///
/// Raw `public.profiles` row. The role column is free text and is parsed on the way out.
#[derive(Debug, FromRow)]
struct ProfileRow {
    uid: String,
    email: String,
    display_name: Option<String>,
    role: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    last_login: Option<DateTime<Utc>>,
    sessions_valid_after: Option<DateTime<Utc>>,
}

impl From<ProfileRow> for Profile {
    fn from(row: ProfileRow) -> Self {
        let role = Role::parse(&row.role).unwrap_or_else(|| {
            tracing::warn!(uid = %row.uid, role = %row.role, "unknown role in profile, treating as free");
            Role::Free
        });
        Profile {
            uid: row.uid,
            email: row.email,
            display_name: row.display_name,
            role,
            created_at: row.created_at,
            updated_at: row.updated_at,
            last_login: row.last_login,
            sessions_valid_after: row.sessions_valid_after,
        }
    }
}

const PROFILE_COLUMNS: &str =
    "uid, email, display_name, role, created_at, updated_at, last_login, sessions_valid_after";

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn get_profile(&self, uid: &str) -> Result<Option<Profile>, RepositoryError> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE uid = $1");
        let row = sqlx::query_as::<_, ProfileRow>(&sql)
            .bind(uid)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Profile::from))
    }

    /// set_profile
    ///
    /// Upsert on the primary key, mirroring a document `set`.
    async fn set_profile(&self, profile: Profile) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO profiles
                (uid, email, display_name, role, created_at, updated_at, last_login, sessions_valid_after)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (uid) DO UPDATE SET
                email = EXCLUDED.email,
                display_name = EXCLUDED.display_name,
                role = EXCLUDED.role,
                created_at = EXCLUDED.created_at,
                updated_at = EXCLUDED.updated_at,
                last_login = EXCLUDED.last_login,
                sessions_valid_after = EXCLUDED.sessions_valid_after
            "#,
        )
        .bind(&profile.uid)
        .bind(&profile.email)
        .bind(&profile.display_name)
        .bind(profile.role.as_str())
        .bind(profile.created_at)
        .bind(profile.updated_at)
        .bind(profile.last_login)
        .bind(profile.sessions_valid_after)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// update_profile
    ///
    /// Uses COALESCE so only provided fields change.
    async fn update_profile(
        &self,
        uid: &str,
        update: ProfileUpdate,
        now: DateTime<Utc>,
    ) -> Result<Option<Profile>, RepositoryError> {
        let sql = format!(
            r#"
            UPDATE profiles SET
                display_name = COALESCE($2, display_name),
                role = COALESCE($3, role),
                last_login = COALESCE($4, last_login),
                sessions_valid_after = COALESCE($5, sessions_valid_after),
                updated_at = CASE WHEN $2 IS NULL AND $3 IS NULL THEN updated_at ELSE $6 END
            WHERE uid = $1
            RETURNING {PROFILE_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, ProfileRow>(&sql)
            .bind(uid)
            .bind(update.display_name)
            .bind(update.role.map(|r| r.as_str()))
            .bind(update.last_login)
            .bind(update.sessions_valid_after)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Profile::from))
    }

    async fn get_stats(&self) -> Result<AdminStats, RepositoryError> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT role, COUNT(*) FROM profiles GROUP BY role")
                .fetch_all(&self.pool)
                .await?;
        Ok(tally(rows.iter().map(|(role, n)| (Role::parse(role).unwrap_or(Role::Free), *n))))
    }
}

fn tally(counts: impl Iterator<Item = (Role, i64)>) -> AdminStats {
    let mut stats = AdminStats::default();
    for (role, n) in counts {
        stats.total_users += n;
        match role {
            Role::Free => stats.free += n,
            Role::Premium => stats.premium += n,
            Role::Vip => stats.vip += n,
            Role::Admin => stats.admin += n,
        }
    }
    stats
}

/// InMemoryRepository
///
/// A `HashMap`-backed implementation for tests and local experiments. The store
/// built by `new_failing` answers every call with an `Unavailable` error.
#[derive(Default)]
pub struct InMemoryRepository {
    profiles: RwLock<HashMap<String, Profile>>,
    fail_all: bool,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            fail_all: true,
            ..Self::default()
        }
    }

    /// Seeds the store with `profiles`.
    pub fn with_profiles(profiles: impl IntoIterator<Item = Profile>) -> Self {
        let map = profiles
            .into_iter()
            .map(|p| (p.uid.clone(), p))
            .collect::<HashMap<_, _>>();
        Self {
            profiles: RwLock::new(map),
            fail_all: false,
        }
    }

    fn check(&self) -> Result<(), RepositoryError> {
        if self.fail_all {
            return Err(RepositoryError::Unavailable(
                "simulated profile store outage".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn get_profile(&self, uid: &str) -> Result<Option<Profile>, RepositoryError> {
        self.check()?;
        Ok(self.profiles.read().await.get(uid).cloned())
    }

    async fn set_profile(&self, profile: Profile) -> Result<(), RepositoryError> {
        self.check()?;
        self.profiles
            .write()
            .await
            .insert(profile.uid.clone(), profile);
        Ok(())
    }

    async fn update_profile(
        &self,
        uid: &str,
        update: ProfileUpdate,
        now: DateTime<Utc>,
    ) -> Result<Option<Profile>, RepositoryError> {
        self.check()?;
        let mut profiles = self.profiles.write().await;
        let Some(profile) = profiles.get_mut(uid) else {
            return Ok(None);
        };
        if update.display_name.is_some() || update.role.is_some() {
            profile.updated_at = now;
        }
        if let Some(name) = update.display_name {
            profile.display_name = Some(name);
        }
        if let Some(role) = update.role {
            profile.role = role;
        }
        if let Some(at) = update.last_login {
            profile.last_login = Some(at);
        }
        if let Some(at) = update.sessions_valid_after {
            profile.sessions_valid_after = Some(at);
        }
        Ok(Some(profile.clone()))
    }

    async fn get_stats(&self) -> Result<AdminStats, RepositoryError> {
        self.check()?;
        let profiles = self.profiles.read().await;
        Ok(tally(profiles.values().map(|p| (p.role, 1))))
    }
}
