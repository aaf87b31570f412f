use crate::{
    AppState, auth,
    auth::{ActiveUser, Superuser},
    error::{ApiError, ApiResult},
    models::{
        Comment, CommentResponse, CreateCommentRequest, CreatePostRequest, CreateTagRequest,
        CreateUserRequest, LoginRequest, Post, PostResponse, Tag, TokenResponse,
        UpdateCommentRequest, UpdatePostRequest, UpdateTagRequest, UpdateUserRequest, UserProfile,
    },
    repository::Repository,
    store::Page,
};
use axum::{
    Form, Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;

// --- Filter Structs ---

/// PageParams
///
/// Plain offset/limit query parameters shared by the listing endpoints.
/// Negative values are rejected with 400.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct PageParams {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

/// PostFilter
///
/// Query parameters for the post listing endpoint. `tag_id` narrows the
/// listing to posts carrying that tag (inner join — untagged posts drop out);
/// `author_id` narrows to a single author's posts.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct PostFilter {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
    pub tag_id: Option<i64>,
    pub author_id: Option<i64>,
}

/// CommentFilter
///
/// Query parameters for the comment listing endpoint.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct CommentFilter {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
    pub post_id: Option<i64>,
}

// --- Presentation helpers ---

/// Resolves the author profile and tag set a post response embeds.
async fn present_post(repo: &dyn Repository, post: Post) -> ApiResult<PostResponse> {
    let author = repo
        .get_user(post.author_id)
        .await?
        .map(UserProfile::from)
        .ok_or_else(|| {
            ApiError::Internal(format!("post {} references a missing author", post.id))
        })?;
    let tags = repo.tags_for_post(post.id).await?;
    Ok(PostResponse {
        id: post.id,
        title: post.title,
        content: post.content,
        author,
        created_at: post.created_at,
        updated_at: post.updated_at,
        tags,
    })
}

/// Resolves the author profile a comment response embeds.
async fn present_comment(repo: &dyn Repository, comment: Comment) -> ApiResult<CommentResponse> {
    let author = repo
        .get_user(comment.author_id)
        .await?
        .map(UserProfile::from)
        .ok_or_else(|| {
            ApiError::Internal(format!(
                "comment {} references a missing author",
                comment.id
            ))
        })?;
    Ok(CommentResponse {
        id: comment.id,
        content: comment.content,
        post_id: comment.post_id,
        author,
        created_at: comment.created_at,
    })
}

// --- Auth Handlers ---

/// login
///
/// [Public Route] OAuth2-style password login. An unknown email and a wrong
/// password produce the same 401 so the two cases are indistinguishable to
/// clients.
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body(content = LoginRequest, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Access token", body = TokenResponse),
        (status = 401, description = "Incorrect email or password")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let user = auth::authenticate(state.repo.as_ref(), &form.username, &form.password)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Incorrect email or password".to_string()))?;

    let access_token = auth::issue_token(&state.config, &user)?;
    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
    }))
}

/// test_token
///
/// [Authenticated Route] Echoes the identity the presented token resolves to.
/// Useful for clients validating a stored credential.
#[utoipa::path(
    post,
    path = "/api/v1/auth/login/test-token",
    responses((status = 200, description = "Current user", body = UserProfile))
)]
pub async fn test_token(ActiveUser(user): ActiveUser) -> Json<UserProfile> {
    Json(user.into())
}

// --- User Handlers ---

/// list_users
///
/// [Superuser Route] Lists all users.
#[utoipa::path(
    get,
    path = "/api/v1/users",
    params(PageParams),
    responses((status = 200, description = "Users", body = [UserProfile]))
)]
pub async fn list_users(
    _superuser: Superuser,
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<Vec<UserProfile>>> {
    let page = Page::new(params.skip, params.limit)?;
    let users = state.repo.list_users(page).await?;
    Ok(Json(users.into_iter().map(UserProfile::from).collect()))
}

/// create_user
///
/// [Superuser Route] Creates a user. The in-process email check gives the
/// friendly message; the unique index catches a racing duplicate and also
/// surfaces as 409.
#[utoipa::path(
    post,
    path = "/api/v1/users",
    request_body = CreateUserRequest,
    responses(
        (status = 200, description = "Created", body = UserProfile),
        (status = 409, description = "Duplicate email")
    )
)]
pub async fn create_user(
    _superuser: Superuser,
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> ApiResult<Json<UserProfile>> {
    if state
        .repo
        .get_user_by_email(&payload.email)
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict(
            "The user with this email already exists.".to_string(),
        ));
    }
    let user = state.repo.create_user(payload).await?;
    Ok(Json(user.into()))
}

/// read_user_me
///
/// [Authenticated Route] The requesting user's own profile.
#[utoipa::path(
    get,
    path = "/api/v1/users/me",
    responses((status = 200, description = "Profile", body = UserProfile))
)]
pub async fn read_user_me(ActiveUser(user): ActiveUser) -> Json<UserProfile> {
    Json(user.into())
}

/// read_user
///
/// [Superuser Route] Reads any user by id.
#[utoipa::path(
    get,
    path = "/api/v1/users/{id}",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "Found", body = UserProfile),
        (status = 404, description = "Not Found")
    )
)]
pub async fn read_user(
    _superuser: Superuser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<UserProfile>> {
    let user = state
        .repo
        .get_user(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("The user with this id does not exist.".to_string()))?;
    Ok(Json(user.into()))
}

/// update_user
///
/// [Superuser Route] Partially updates any user. Absent fields are left
/// untouched.
#[utoipa::path(
    put,
    path = "/api/v1/users/{id}",
    params(("id" = i64, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated", body = UserProfile),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_user(
    _superuser: Superuser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateUserRequest>,
) -> ApiResult<Json<UserProfile>> {
    let existing = state
        .repo
        .get_user(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("The user with this id does not exist.".to_string()))?;
    let updated = state.repo.update_user(existing, payload).await?;
    Ok(Json(updated.into()))
}

// --- Post Handlers ---

/// read_posts
///
/// [Public Route] Lists posts with optional tag and author filters.
#[utoipa::path(
    get,
    path = "/api/v1/posts",
    params(PostFilter),
    responses((status = 200, description = "Posts", body = [PostResponse]))
)]
pub async fn read_posts(
    State(state): State<AppState>,
    Query(filter): Query<PostFilter>,
) -> ApiResult<Json<Vec<PostResponse>>> {
    let page = Page::new(filter.skip, filter.limit)?;
    let posts = state
        .repo
        .list_posts(page, filter.tag_id, filter.author_id)
        .await?;

    let mut responses = Vec::with_capacity(posts.len());
    for post in posts {
        responses.push(present_post(state.repo.as_ref(), post).await?);
    }
    Ok(Json(responses))
}

/// create_post
///
/// [Authenticated Route] Submits a new post owned by the requesting user.
/// Tag ids that do not resolve are dropped silently (open policy question —
/// kept as the observed upstream behavior).
#[utoipa::path(
    post,
    path = "/api/v1/posts",
    request_body = CreatePostRequest,
    responses((status = 200, description = "Created", body = PostResponse))
)]
pub async fn create_post(
    ActiveUser(user): ActiveUser,
    State(state): State<AppState>,
    Json(payload): Json<CreatePostRequest>,
) -> ApiResult<Json<PostResponse>> {
    let post = state.repo.create_post(payload, user.id).await?;
    Ok(Json(present_post(state.repo.as_ref(), post).await?))
}

/// read_post
///
/// [Public Route] A single post with its author and tags.
#[utoipa::path(
    get,
    path = "/api/v1/posts/{id}",
    params(("id" = i64, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Found", body = PostResponse),
        (status = 404, description = "Not Found")
    )
)]
pub async fn read_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<PostResponse>> {
    let post = state
        .repo
        .get_post(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("The post with this id does not exist.".to_string()))?;
    Ok(Json(present_post(state.repo.as_ref(), post).await?))
}

/// update_post
///
/// [Authenticated Route] Updates a post. Permitted only for the author or a
/// superuser; a present `tag_ids` key replaces the whole tag association.
#[utoipa::path(
    put,
    path = "/api/v1/posts/{id}",
    params(("id" = i64, Path, description = "Post ID")),
    request_body = UpdatePostRequest,
    responses(
        (status = 200, description = "Updated", body = PostResponse),
        (status = 403, description = "Not Owner"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_post(
    ActiveUser(user): ActiveUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdatePostRequest>,
) -> ApiResult<Json<PostResponse>> {
    let post = state
        .repo
        .get_post(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("The post with this id does not exist.".to_string()))?;

    if post.author_id != user.id && !user.is_superuser {
        return Err(ApiError::Forbidden(
            "You can only update your own posts.".to_string(),
        ));
    }

    let updated = state.repo.update_post(post, payload).await?;
    Ok(Json(present_post(state.repo.as_ref(), updated).await?))
}

/// delete_post
///
/// [Authenticated Route] Deletes a post and returns its last state. Permitted
/// only for the author or a superuser.
#[utoipa::path(
    delete,
    path = "/api/v1/posts/{id}",
    params(("id" = i64, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Deleted", body = PostResponse),
        (status = 403, description = "Not Owner"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_post(
    ActiveUser(user): ActiveUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<PostResponse>> {
    let post = state
        .repo
        .get_post(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("The post with this id does not exist.".to_string()))?;

    if post.author_id != user.id && !user.is_superuser {
        return Err(ApiError::Forbidden(
            "You can only delete your own posts.".to_string(),
        ));
    }

    // Capture the enriched representation before the row (and its join rows)
    // go away.
    let response = present_post(state.repo.as_ref(), post).await?;
    state.repo.remove_post(id).await?;
    Ok(Json(response))
}

// --- Comment Handlers ---

/// read_comments
///
/// [Public Route] Lists comments, optionally narrowed to one post.
#[utoipa::path(
    get,
    path = "/api/v1/comments",
    params(CommentFilter),
    responses((status = 200, description = "Comments", body = [CommentResponse]))
)]
pub async fn read_comments(
    State(state): State<AppState>,
    Query(filter): Query<CommentFilter>,
) -> ApiResult<Json<Vec<CommentResponse>>> {
    let page = Page::new(filter.skip, filter.limit)?;
    let comments = state.repo.list_comments(page, filter.post_id).await?;

    let mut responses = Vec::with_capacity(comments.len());
    for comment in comments {
        responses.push(present_comment(state.repo.as_ref(), comment).await?);
    }
    Ok(Json(responses))
}

/// create_comment
///
/// [Authenticated Route] Posts a comment. The target post must exist.
#[utoipa::path(
    post,
    path = "/api/v1/comments",
    request_body = CreateCommentRequest,
    responses(
        (status = 200, description = "Created", body = CommentResponse),
        (status = 404, description = "Post Not Found")
    )
)]
pub async fn create_comment(
    ActiveUser(user): ActiveUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateCommentRequest>,
) -> ApiResult<Json<CommentResponse>> {
    if state.repo.get_post(payload.post_id).await?.is_none() {
        return Err(ApiError::NotFound(
            "The post with this id does not exist.".to_string(),
        ));
    }
    let comment = state.repo.create_comment(payload, user.id).await?;
    Ok(Json(present_comment(state.repo.as_ref(), comment).await?))
}

/// read_comment
///
/// [Public Route] A single comment with its author.
#[utoipa::path(
    get,
    path = "/api/v1/comments/{id}",
    params(("id" = i64, Path, description = "Comment ID")),
    responses(
        (status = 200, description = "Found", body = CommentResponse),
        (status = 404, description = "Not Found")
    )
)]
pub async fn read_comment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<CommentResponse>> {
    let comment = state.repo.get_comment(id).await?.ok_or_else(|| {
        ApiError::NotFound("The comment with this id does not exist.".to_string())
    })?;
    Ok(Json(present_comment(state.repo.as_ref(), comment).await?))
}

/// update_comment
///
/// [Authenticated Route] Updates a comment. Permitted only for the author or
/// a superuser.
#[utoipa::path(
    put,
    path = "/api/v1/comments/{id}",
    params(("id" = i64, Path, description = "Comment ID")),
    request_body = UpdateCommentRequest,
    responses(
        (status = 200, description = "Updated", body = CommentResponse),
        (status = 403, description = "Not Owner"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_comment(
    ActiveUser(user): ActiveUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateCommentRequest>,
) -> ApiResult<Json<CommentResponse>> {
    let comment = state.repo.get_comment(id).await?.ok_or_else(|| {
        ApiError::NotFound("The comment with this id does not exist.".to_string())
    })?;

    if comment.author_id != user.id && !user.is_superuser {
        return Err(ApiError::Forbidden(
            "You can only update your own comments.".to_string(),
        ));
    }

    let updated = state.repo.update_comment(comment, payload).await?;
    Ok(Json(present_comment(state.repo.as_ref(), updated).await?))
}

/// delete_comment
///
/// [Authenticated Route] Deletes a comment and returns its last state.
/// Permitted only for the author or a superuser.
#[utoipa::path(
    delete,
    path = "/api/v1/comments/{id}",
    params(("id" = i64, Path, description = "Comment ID")),
    responses(
        (status = 200, description = "Deleted", body = CommentResponse),
        (status = 403, description = "Not Owner"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_comment(
    ActiveUser(user): ActiveUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<CommentResponse>> {
    let comment = state.repo.get_comment(id).await?.ok_or_else(|| {
        ApiError::NotFound("The comment with this id does not exist.".to_string())
    })?;

    if comment.author_id != user.id && !user.is_superuser {
        return Err(ApiError::Forbidden(
            "You can only delete your own comments.".to_string(),
        ));
    }

    let response = present_comment(state.repo.as_ref(), comment).await?;
    state.repo.remove_comment(id).await?;
    Ok(Json(response))
}

// --- Tag Handlers ---

/// read_tags
///
/// [Public Route] Lists all tags.
#[utoipa::path(
    get,
    path = "/api/v1/tags",
    params(PageParams),
    responses((status = 200, description = "Tags", body = [Tag]))
)]
pub async fn read_tags(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<Vec<Tag>>> {
    let page = Page::new(params.skip, params.limit)?;
    Ok(Json(state.repo.list_tags(page).await?))
}

/// create_tag
///
/// [Superuser Route] Creates a tag. Name uniqueness is checked in-process for
/// the friendly message and enforced by the unique index for races.
#[utoipa::path(
    post,
    path = "/api/v1/tags",
    request_body = CreateTagRequest,
    responses(
        (status = 200, description = "Created", body = Tag),
        (status = 409, description = "Duplicate name")
    )
)]
pub async fn create_tag(
    _superuser: Superuser,
    State(state): State<AppState>,
    Json(payload): Json<CreateTagRequest>,
) -> ApiResult<Json<Tag>> {
    if state.repo.get_tag_by_name(&payload.name).await?.is_some() {
        return Err(ApiError::Conflict(
            "The tag with this name already exists.".to_string(),
        ));
    }
    Ok(Json(state.repo.create_tag(payload).await?))
}

/// read_tag
///
/// [Public Route] A single tag by id.
#[utoipa::path(
    get,
    path = "/api/v1/tags/{id}",
    params(("id" = i64, Path, description = "Tag ID")),
    responses(
        (status = 200, description = "Found", body = Tag),
        (status = 404, description = "Not Found")
    )
)]
pub async fn read_tag(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Tag>> {
    let tag = state
        .repo
        .get_tag(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("The tag with this id does not exist.".to_string()))?;
    Ok(Json(tag))
}

/// update_tag
///
/// [Superuser Route] Renames a tag.
#[utoipa::path(
    put,
    path = "/api/v1/tags/{id}",
    params(("id" = i64, Path, description = "Tag ID")),
    request_body = UpdateTagRequest,
    responses(
        (status = 200, description = "Updated", body = Tag),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_tag(
    _superuser: Superuser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateTagRequest>,
) -> ApiResult<Json<Tag>> {
    let existing = state
        .repo
        .get_tag(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("The tag with this id does not exist.".to_string()))?;
    Ok(Json(state.repo.update_tag(existing, payload).await?))
}

/// delete_tag
///
/// [Superuser Route] Deletes a tag and returns its last state. Join rows
/// referencing the tag cascade away.
#[utoipa::path(
    delete,
    path = "/api/v1/tags/{id}",
    params(("id" = i64, Path, description = "Tag ID")),
    responses(
        (status = 200, description = "Deleted", body = Tag),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_tag(
    _superuser: Superuser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Tag>> {
    if state.repo.get_tag(id).await?.is_none() {
        return Err(ApiError::NotFound(
            "The tag with this id does not exist.".to_string(),
        ));
    }
    Ok(Json(state.repo.remove_tag(id).await?))
}
