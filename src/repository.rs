use crate::auth;
use crate::error::{ApiError, ApiResult};
use crate::models::{
    Comment, CreateCommentRequest, CreatePostRequest, CreateTagRequest, CreateUserRequest, Post,
    Tag, UpdateCommentRequest, UpdatePostRequest, UpdateTagRequest, UpdateUserRequest, User,
};
use crate::store::{self, Insert, Page, Patch, PatchSet, Record, db_error};
use async_trait::async_trait;
use sqlx::{
    PgPool, Postgres, Transaction,
    query_builder::{QueryBuilder, Separated},
};
use std::sync::Arc;

// --- Store wiring: table metadata and create/update shapes per entity ---

impl Record for User {
    const TABLE: &'static str = "users";
    const COLUMNS: &'static str = "id, email, hashed_password, full_name, is_active, is_superuser";

    fn id(&self) -> i64 {
        self.id
    }
}

impl Record for Post {
    const TABLE: &'static str = "posts";
    const COLUMNS: &'static str = "id, title, content, author_id, created_at, updated_at";

    fn id(&self) -> i64 {
        self.id
    }
}

impl Record for Tag {
    const TABLE: &'static str = "tags";
    const COLUMNS: &'static str = "id, name";

    fn id(&self) -> i64 {
        self.id
    }
}

impl Record for Comment {
    const TABLE: &'static str = "comments";
    const COLUMNS: &'static str = "id, content, author_id, post_id, created_at";

    fn id(&self) -> i64 {
        self.id
    }
}

/// Create shape for users. The password arrives here already hashed.
struct NewUser {
    email: String,
    hashed_password: String,
    full_name: Option<String>,
    is_active: bool,
    is_superuser: bool,
}

impl Insert for NewUser {
    const COLUMNS: &'static str = "email, hashed_password, full_name, is_active, is_superuser";

    fn push_values(&self, values: &mut Separated<'_, '_, Postgres, &'static str>) {
        values.push_bind(self.email.clone());
        values.push_bind(self.hashed_password.clone());
        values.push_bind(self.full_name.clone());
        values.push_bind(self.is_active);
        values.push_bind(self.is_superuser);
    }
}

struct UserPatch {
    email: Option<String>,
    hashed_password: Option<String>,
    full_name: Option<String>,
    is_active: Option<bool>,
    is_superuser: Option<bool>,
}

impl Patch for UserPatch {
    fn apply(&self, set: &mut PatchSet<'_, '_>) {
        if let Some(email) = &self.email {
            set.set("email", email.clone());
        }
        if let Some(hashed_password) = &self.hashed_password {
            set.set("hashed_password", hashed_password.clone());
        }
        if let Some(full_name) = &self.full_name {
            set.set("full_name", full_name.clone());
        }
        if let Some(is_active) = self.is_active {
            set.set("is_active", is_active);
        }
        if let Some(is_superuser) = self.is_superuser {
            set.set("is_superuser", is_superuser);
        }
    }
}

struct NewPost {
    title: String,
    content: String,
    author_id: i64,
}

impl Insert for NewPost {
    const COLUMNS: &'static str = "title, content, author_id";

    fn push_values(&self, values: &mut Separated<'_, '_, Postgres, &'static str>) {
        values.push_bind(self.title.clone());
        values.push_bind(self.content.clone());
        values.push_bind(self.author_id);
    }
}

struct PostPatch {
    title: Option<String>,
    content: Option<String>,
}

impl Patch for PostPatch {
    fn apply(&self, set: &mut PatchSet<'_, '_>) {
        if let Some(title) = &self.title {
            set.set("title", title.clone());
        }
        if let Some(content) = &self.content {
            set.set("content", content.clone());
        }
        // updated_at only advances when some field actually changes, so an
        // empty update stays a true no-op.
        if !set.is_empty() {
            set.set_expr("updated_at", "now()");
        }
    }
}

impl Insert for CreateTagRequest {
    const COLUMNS: &'static str = "name";

    fn push_values(&self, values: &mut Separated<'_, '_, Postgres, &'static str>) {
        values.push_bind(self.name.clone());
    }
}

impl Patch for UpdateTagRequest {
    fn apply(&self, set: &mut PatchSet<'_, '_>) {
        if let Some(name) = &self.name {
            set.set("name", name.clone());
        }
    }
}

struct NewComment {
    content: String,
    author_id: i64,
    post_id: i64,
}

impl Insert for NewComment {
    const COLUMNS: &'static str = "content, author_id, post_id";

    fn push_values(&self, values: &mut Separated<'_, '_, Postgres, &'static str>) {
        values.push_bind(self.content.clone());
        values.push_bind(self.author_id);
        values.push_bind(self.post_id);
    }
}

impl Patch for UpdateCommentRequest {
    fn apply(&self, set: &mut PatchSet<'_, '_>) {
        if let Some(content) = &self.content {
            set.set("content", content.clone());
        }
    }
}

// --- Repository contract ---

/// Repository
///
/// The abstract contract for all persistence operations, layered over the
/// generic entity store. Handlers interact with the data layer exclusively
/// through this trait, so the concrete implementation (Postgres in
/// production, an in-memory fake in tests) stays swappable.
///
/// **Send + Sync + async_trait** are required to make the trait object
/// (`Arc<dyn Repository>`) safely shareable across Axum's task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn get_user(&self, id: i64) -> ApiResult<Option<User>>;
    async fn get_user_by_email(&self, email: &str) -> ApiResult<Option<User>>;
    async fn list_users(&self, page: Page) -> ApiResult<Vec<User>>;
    // Hashes the password before persisting.
    async fn create_user(&self, data: CreateUserRequest) -> ApiResult<User>;
    // Partial update; a present password is re-hashed.
    async fn update_user(&self, existing: User, data: UpdateUserRequest) -> ApiResult<User>;

    // --- Tags ---
    async fn get_tag(&self, id: i64) -> ApiResult<Option<Tag>>;
    // Used by the check-then-create path; the unique index remains the arbiter.
    async fn get_tag_by_name(&self, name: &str) -> ApiResult<Option<Tag>>;
    async fn list_tags(&self, page: Page) -> ApiResult<Vec<Tag>>;
    async fn create_tag(&self, data: CreateTagRequest) -> ApiResult<Tag>;
    async fn update_tag(&self, existing: Tag, data: UpdateTagRequest) -> ApiResult<Tag>;
    async fn remove_tag(&self, id: i64) -> ApiResult<Tag>;

    // --- Posts ---
    async fn get_post(&self, id: i64) -> ApiResult<Option<Post>>;
    /// Listing with optional filters. A tag filter has inner-join semantics:
    /// posts without the tag are excluded.
    async fn list_posts(
        &self,
        page: Page,
        tag_id: Option<i64>,
        author_id: Option<i64>,
    ) -> ApiResult<Vec<Post>>;
    /// Creates a post owned by `author_id` and associates the tag ids that
    /// resolve; ids that do not exist are dropped.
    async fn create_post(&self, data: CreatePostRequest, author_id: i64) -> ApiResult<Post>;
    /// Partial update. A present `tag_ids` key (even null/empty) replaces the
    /// whole association atomically; an absent key leaves it untouched.
    async fn update_post(&self, existing: Post, data: UpdatePostRequest) -> ApiResult<Post>;
    async fn remove_post(&self, id: i64) -> ApiResult<Post>;
    async fn tags_for_post(&self, post_id: i64) -> ApiResult<Vec<Tag>>;

    // --- Comments ---
    async fn get_comment(&self, id: i64) -> ApiResult<Option<Comment>>;
    async fn list_comments(&self, page: Page, post_id: Option<i64>) -> ApiResult<Vec<Comment>>;
    async fn create_comment(&self, data: CreateCommentRequest, author_id: i64)
    -> ApiResult<Comment>;
    async fn update_comment(
        &self,
        existing: Comment,
        data: UpdateCommentRequest,
    ) -> ApiResult<Comment>;
    async fn remove_comment(&self, id: i64) -> ApiResult<Comment>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the
/// application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by the
/// PostgreSQL database.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Associates `post_id` with every id in `tag_ids` that resolves to an
/// existing tag. Ids that do not resolve are dropped without error.
async fn link_tags(
    tx: &mut Transaction<'_, Postgres>,
    post_id: i64,
    tag_ids: &[i64],
) -> ApiResult<()> {
    let resolved: Vec<i64> = sqlx::query_scalar("SELECT id FROM tags WHERE id = ANY($1)")
        .bind(tag_ids.to_vec())
        .fetch_all(&mut **tx)
        .await
        .map_err(db_error)?;

    if resolved.is_empty() {
        return Ok(());
    }

    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("INSERT INTO post_tags (post_id, tag_id) ");
    qb.push_values(resolved.iter(), |mut row, tag_id| {
        row.push_bind(post_id);
        row.push_bind(*tag_id);
    });
    // The pair is either present or absent; re-linking an existing pair is
    // not an error.
    qb.push(" ON CONFLICT DO NOTHING");
    qb.build().execute(&mut **tx).await.map_err(db_error)?;
    Ok(())
}

#[async_trait]
impl Repository for PostgresRepository {
    // --- Users ---

    async fn get_user(&self, id: i64) -> ApiResult<Option<User>> {
        store::get::<User>(&self.pool, id).await
    }

    async fn get_user_by_email(&self, email: &str) -> ApiResult<Option<User>> {
        sqlx::query_as::<_, User>(
            "SELECT id, email, hashed_password, full_name, is_active, is_superuser \
             FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)
    }

    async fn list_users(&self, page: Page) -> ApiResult<Vec<User>> {
        store::get_multi::<User>(&self.pool, page).await
    }

    async fn create_user(&self, data: CreateUserRequest) -> ApiResult<User> {
        let new_user = NewUser {
            email: data.email,
            hashed_password: auth::hash_password(&data.password)?,
            full_name: data.full_name,
            is_active: data.is_active,
            is_superuser: data.is_superuser,
        };
        store::create::<User, _>(&self.pool, &new_user).await
    }

    async fn update_user(&self, existing: User, data: UpdateUserRequest) -> ApiResult<User> {
        let hashed_password = match &data.password {
            Some(password) => Some(auth::hash_password(password)?),
            None => None,
        };
        let patch = UserPatch {
            email: data.email,
            hashed_password,
            full_name: data.full_name,
            is_active: data.is_active,
            is_superuser: data.is_superuser,
        };
        store::update(&self.pool, existing, &patch).await
    }

    // --- Tags ---

    async fn get_tag(&self, id: i64) -> ApiResult<Option<Tag>> {
        store::get::<Tag>(&self.pool, id).await
    }

    async fn get_tag_by_name(&self, name: &str) -> ApiResult<Option<Tag>> {
        sqlx::query_as::<_, Tag>("SELECT id, name FROM tags WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)
    }

    async fn list_tags(&self, page: Page) -> ApiResult<Vec<Tag>> {
        store::get_multi::<Tag>(&self.pool, page).await
    }

    async fn create_tag(&self, data: CreateTagRequest) -> ApiResult<Tag> {
        store::create::<Tag, _>(&self.pool, &data).await
    }

    async fn update_tag(&self, existing: Tag, data: UpdateTagRequest) -> ApiResult<Tag> {
        store::update(&self.pool, existing, &data).await
    }

    async fn remove_tag(&self, id: i64) -> ApiResult<Tag> {
        // Join rows referencing this tag cascade away with it.
        store::remove::<Tag>(&self.pool, id).await
    }

    // --- Posts ---

    async fn get_post(&self, id: i64) -> ApiResult<Option<Post>> {
        store::get::<Post>(&self.pool, id).await
    }

    async fn list_posts(
        &self,
        page: Page,
        tag_id: Option<i64>,
        author_id: Option<i64>,
    ) -> ApiResult<Vec<Post>> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT p.id, p.title, p.content, p.author_id, p.created_at, p.updated_at \
             FROM posts p",
        );
        if let Some(tag_id) = tag_id {
            qb.push(" JOIN post_tags pt ON pt.post_id = p.id AND pt.tag_id = ");
            qb.push_bind(tag_id);
        }
        if let Some(author_id) = author_id {
            qb.push(" WHERE p.author_id = ");
            qb.push_bind(author_id);
        }
        qb.push(" ORDER BY p.id OFFSET ");
        qb.push_bind(page.skip);
        qb.push(" LIMIT ");
        qb.push_bind(page.limit);

        qb.build_query_as::<Post>()
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)
    }

    async fn create_post(&self, data: CreatePostRequest, author_id: i64) -> ApiResult<Post> {
        let mut tx = self.pool.begin().await.map_err(ApiError::Database)?;

        let new_post = NewPost {
            title: data.title,
            content: data.content,
            author_id,
        };
        let post: Post = store::create::<Post, _>(&mut *tx, &new_post).await?;

        if let Some(tag_ids) = data.tag_ids.as_deref() {
            if !tag_ids.is_empty() {
                link_tags(&mut tx, post.id, tag_ids).await?;
            }
        }

        tx.commit().await.map_err(ApiError::Database)?;
        Ok(post)
    }

    async fn update_post(&self, existing: Post, data: UpdatePostRequest) -> ApiResult<Post> {
        // Clear-then-repopulate and the field update share one transaction so
        // a concurrent reader never observes the intermediate empty tag set.
        let mut tx = self.pool.begin().await.map_err(ApiError::Database)?;

        if let Some(tag_ids) = &data.tag_ids {
            sqlx::query("DELETE FROM post_tags WHERE post_id = $1")
                .bind(existing.id)
                .execute(&mut *tx)
                .await
                .map_err(db_error)?;
            if let Some(tag_ids) = tag_ids {
                if !tag_ids.is_empty() {
                    link_tags(&mut tx, existing.id, tag_ids).await?;
                }
            }
        }

        let patch = PostPatch {
            title: data.title,
            content: data.content,
        };
        let post = store::update(&mut *tx, existing, &patch).await?;

        tx.commit().await.map_err(ApiError::Database)?;
        Ok(post)
    }

    async fn remove_post(&self, id: i64) -> ApiResult<Post> {
        // Join rows and comments cascade away with the post.
        store::remove::<Post>(&self.pool, id).await
    }

    async fn tags_for_post(&self, post_id: i64) -> ApiResult<Vec<Tag>> {
        sqlx::query_as::<_, Tag>(
            "SELECT t.id, t.name FROM tags t \
             JOIN post_tags pt ON pt.tag_id = t.id \
             WHERE pt.post_id = $1 ORDER BY t.id",
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)
    }

    // --- Comments ---

    async fn get_comment(&self, id: i64) -> ApiResult<Option<Comment>> {
        store::get::<Comment>(&self.pool, id).await
    }

    async fn list_comments(&self, page: Page, post_id: Option<i64>) -> ApiResult<Vec<Comment>> {
        match post_id {
            Some(post_id) => sqlx::query_as::<_, Comment>(
                "SELECT id, content, author_id, post_id, created_at FROM comments \
                 WHERE post_id = $1 ORDER BY id OFFSET $2 LIMIT $3",
            )
            .bind(post_id)
            .bind(page.skip)
            .bind(page.limit)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error),
            None => store::get_multi::<Comment>(&self.pool, page).await,
        }
    }

    async fn create_comment(
        &self,
        data: CreateCommentRequest,
        author_id: i64,
    ) -> ApiResult<Comment> {
        let new_comment = NewComment {
            content: data.content,
            author_id,
            post_id: data.post_id,
        };
        store::create::<Comment, _>(&self.pool, &new_comment).await
    }

    async fn update_comment(
        &self,
        existing: Comment,
        data: UpdateCommentRequest,
    ) -> ApiResult<Comment> {
        store::update(&self.pool, existing, &data).await
    }

    async fn remove_comment(&self, id: i64) -> ApiResult<Comment> {
        store::remove::<Comment>(&self.pool, id).await
    }
}
