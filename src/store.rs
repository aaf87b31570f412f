//! Generic CRUD primitives over a single entity table.
//!
//! Every function takes an explicit executor so the same primitive works
//! against the pool or inside a transaction. No authorization or business
//! rules live at this layer — those belong to the repositories and the API
//! boundary.

use crate::error::{ApiError, ApiResult};
use sqlx::{
    FromRow, PgExecutor, Postgres,
    postgres::PgRow,
    query_builder::{QueryBuilder, Separated},
};

pub const DEFAULT_LIMIT: i64 = 100;

/// Page
///
/// Offset/limit window shared by every listing query.
#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub skip: i64,
    pub limit: i64,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl Page {
    /// Builds a page from optional query parameters. Negative values are a
    /// caller error.
    pub fn new(skip: Option<i64>, limit: Option<i64>) -> ApiResult<Self> {
        let page = Self {
            skip: skip.unwrap_or(0),
            limit: limit.unwrap_or(DEFAULT_LIMIT),
        };
        if page.skip < 0 || page.limit < 0 {
            return Err(ApiError::BadRequest(
                "skip and limit must be non-negative".to_string(),
            ));
        }
        Ok(page)
    }
}

/// Record
///
/// Table metadata for an entity the generic store can operate on. `COLUMNS`
/// must list every column `FromRow` expects, in a stable order, so `SELECT`,
/// `RETURNING` and row decoding always agree.
pub trait Record: for<'r> FromRow<'r, PgRow> + Send + Unpin + 'static {
    const TABLE: &'static str;
    const COLUMNS: &'static str;

    fn id(&self) -> i64;
}

/// Insert
///
/// The "create shape" of an entity: a fixed column list plus the bind values
/// filling it, in the same order.
pub trait Insert: Send + Sync {
    const COLUMNS: &'static str;

    fn push_values(&self, values: &mut Separated<'_, '_, Postgres, &'static str>);
}

/// PatchSet
///
/// Accumulates `column = value` assignments for a partial update. Only fields
/// actually set end up in the statement, which is what makes
/// `update(existing, {})` a no-op.
pub struct PatchSet<'qb, 'args> {
    qb: &'qb mut QueryBuilder<'args, Postgres>,
    dirty: bool,
}

impl<'qb, 'args> PatchSet<'qb, 'args> {
    fn new(qb: &'qb mut QueryBuilder<'args, Postgres>) -> Self {
        Self { qb, dirty: false }
    }

    fn separate(&mut self) {
        if self.dirty {
            self.qb.push(", ");
        }
        self.dirty = true;
    }

    /// Adds a bound `column = $n` assignment.
    pub fn set<T>(&mut self, column: &str, value: T)
    where
        T: 'args + sqlx::Encode<'args, Postgres> + sqlx::Type<Postgres> + Send,
    {
        self.separate();
        self.qb.push(column);
        self.qb.push(" = ");
        self.qb.push_bind(value);
    }

    /// Adds a raw SQL assignment, e.g. `updated_at = now()`. The expression
    /// must not contain user input.
    pub fn set_expr(&mut self, column: &str, expr: &str) {
        self.separate();
        self.qb.push(column);
        self.qb.push(" = ");
        self.qb.push(expr);
    }

    pub fn is_empty(&self) -> bool {
        !self.dirty
    }
}

/// Patch
///
/// The "update shape" of an entity: pushes assignments for the fields that are
/// set and stays silent for the rest.
pub trait Patch: Send + Sync {
    fn apply(&self, set: &mut PatchSet<'_, '_>);
}

/// Maps storage failures into the API taxonomy. Uniqueness violations become
/// `Conflict` — the column constraints are the true arbiter of
/// check-then-create races, so this path is expected under concurrency.
pub(crate) fn db_error(err: sqlx::Error) -> ApiError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            ApiError::Conflict("A row with this unique value already exists.".to_string())
        }
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
            ApiError::BadRequest("A referenced row does not exist.".to_string())
        }
        _ => ApiError::Database(err),
    }
}

/// Single-entity lookup by identity; absence is not an error.
pub async fn get<'e, E: Record>(exec: impl PgExecutor<'e>, id: i64) -> ApiResult<Option<E>> {
    let sql = format!("SELECT {} FROM {} WHERE id = $1", E::COLUMNS, E::TABLE);
    sqlx::query_as::<_, E>(&sql)
        .bind(id)
        .fetch_optional(exec)
        .await
        .map_err(db_error)
}

/// Paginated listing in insertion (id) order.
pub async fn get_multi<'e, E: Record>(exec: impl PgExecutor<'e>, page: Page) -> ApiResult<Vec<E>> {
    let sql = format!(
        "SELECT {} FROM {} ORDER BY id OFFSET $1 LIMIT $2",
        E::COLUMNS,
        E::TABLE
    );
    sqlx::query_as::<_, E>(&sql)
        .bind(page.skip)
        .bind(page.limit)
        .fetch_all(exec)
        .await
        .map_err(db_error)
}

/// Inserts a new entity and returns it fully materialized, with the
/// store-assigned identity and generated fields populated.
pub async fn create<'e, E: Record, I: Insert>(
    exec: impl PgExecutor<'e>,
    data: &I,
) -> ApiResult<E> {
    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
        "INSERT INTO {} ({}) VALUES (",
        E::TABLE,
        I::COLUMNS
    ));
    {
        let mut values = qb.separated(", ");
        data.push_values(&mut values);
    }
    qb.push(") RETURNING ");
    qb.push(E::COLUMNS);

    qb.build_query_as::<E>()
        .fetch_one(exec)
        .await
        .map_err(db_error)
}

/// Applies only the fields present in the patch. An empty patch returns the
/// existing entity unchanged without touching the database.
pub async fn update<'e, E: Record, P: Patch>(
    exec: impl PgExecutor<'e>,
    existing: E,
    patch: &P,
) -> ApiResult<E> {
    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!("UPDATE {} SET ", E::TABLE));
    let mut set = PatchSet::new(&mut qb);
    patch.apply(&mut set);
    if set.is_empty() {
        return Ok(existing);
    }

    qb.push(" WHERE id = ");
    qb.push_bind(existing.id());
    qb.push(" RETURNING ");
    qb.push(E::COLUMNS);

    qb.build_query_as::<E>()
        .fetch_one(exec)
        .await
        .map_err(db_error)
}

/// Deletes by identity and returns the value as it existed immediately before
/// deletion. Fails with NotFound if absent.
pub async fn remove<'e, E: Record>(exec: impl PgExecutor<'e>, id: i64) -> ApiResult<E> {
    let sql = format!(
        "DELETE FROM {} WHERE id = $1 RETURNING {}",
        E::TABLE,
        E::COLUMNS
    );
    sqlx::query_as::<_, E>(&sql)
        .bind(id)
        .fetch_optional(exec)
        .await
        .map_err(db_error)?
        .ok_or_else(|| ApiError::NotFound(format!("No row with this id in {}.", E::TABLE)))
}
