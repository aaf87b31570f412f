//! Shared test scaffolding: an in-memory Repository implementation plus
//! helpers for assembling application state and seeding users.
//!
//! The mock mirrors the storage-layer contracts the real implementation leans
//! on — unique email/tag name surfacing as Conflict, insertion-order listing,
//! and whole-set tag reconciliation — so handler and auth logic can be
//! exercised without a live Postgres.

#![allow(dead_code)]

use async_trait::async_trait;
use blog_api::{
    AppState, CacheClient,
    auth,
    config::AppConfig,
    error::{ApiError, ApiResult},
    models::{
        Comment, CreateCommentRequest, CreatePostRequest, CreateTagRequest, CreateUserRequest,
        Post, Tag, UpdateCommentRequest, UpdatePostRequest, UpdateTagRequest, UpdateUserRequest,
        User,
    },
    repository::{Repository, RepositoryState},
    store::Page,
};
use chrono::Utc;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct MockData {
    users: Vec<User>,
    posts: Vec<Post>,
    tags: Vec<Tag>,
    comments: Vec<Comment>,
    post_tags: Vec<(i64, i64)>,
    next_id: i64,
}

impl MockData {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default)]
pub struct MockRepository {
    data: Mutex<MockData>,
}

fn paginate<T>(items: Vec<T>, page: Page) -> Vec<T> {
    items
        .into_iter()
        .skip(page.skip as usize)
        .take(page.limit as usize)
        .collect()
}

fn unique_violation() -> ApiError {
    ApiError::Conflict("A row with this unique value already exists.".to_string())
}

#[async_trait]
impl Repository for MockRepository {
    // --- Users ---

    async fn get_user(&self, id: i64) -> ApiResult<Option<User>> {
        let data = self.data.lock().unwrap();
        Ok(data.users.iter().find(|u| u.id == id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> ApiResult<Option<User>> {
        let data = self.data.lock().unwrap();
        Ok(data.users.iter().find(|u| u.email == email).cloned())
    }

    async fn list_users(&self, page: Page) -> ApiResult<Vec<User>> {
        let data = self.data.lock().unwrap();
        Ok(paginate(data.users.clone(), page))
    }

    async fn create_user(&self, data: CreateUserRequest) -> ApiResult<User> {
        let hashed_password = auth::hash_password(&data.password)?;
        let mut store = self.data.lock().unwrap();
        if store.users.iter().any(|u| u.email == data.email) {
            return Err(unique_violation());
        }
        let user = User {
            id: store.next_id(),
            email: data.email,
            hashed_password,
            full_name: data.full_name,
            is_active: data.is_active,
            is_superuser: data.is_superuser,
        };
        store.users.push(user.clone());
        Ok(user)
    }

    async fn update_user(&self, existing: User, data: UpdateUserRequest) -> ApiResult<User> {
        let hashed_password = match &data.password {
            Some(password) => Some(auth::hash_password(password)?),
            None => None,
        };
        let mut store = self.data.lock().unwrap();
        if let Some(email) = &data.email {
            if store
                .users
                .iter()
                .any(|u| u.email == *email && u.id != existing.id)
            {
                return Err(unique_violation());
            }
        }
        let user = store
            .users
            .iter_mut()
            .find(|u| u.id == existing.id)
            .ok_or_else(|| ApiError::NotFound("No row with this id in users.".to_string()))?;
        if let Some(email) = data.email {
            user.email = email;
        }
        if let Some(hashed) = hashed_password {
            user.hashed_password = hashed;
        }
        if let Some(full_name) = data.full_name {
            user.full_name = Some(full_name);
        }
        if let Some(is_active) = data.is_active {
            user.is_active = is_active;
        }
        if let Some(is_superuser) = data.is_superuser {
            user.is_superuser = is_superuser;
        }
        Ok(user.clone())
    }

    // --- Tags ---

    async fn get_tag(&self, id: i64) -> ApiResult<Option<Tag>> {
        let data = self.data.lock().unwrap();
        Ok(data.tags.iter().find(|t| t.id == id).cloned())
    }

    async fn get_tag_by_name(&self, name: &str) -> ApiResult<Option<Tag>> {
        let data = self.data.lock().unwrap();
        Ok(data.tags.iter().find(|t| t.name == name).cloned())
    }

    async fn list_tags(&self, page: Page) -> ApiResult<Vec<Tag>> {
        let data = self.data.lock().unwrap();
        Ok(paginate(data.tags.clone(), page))
    }

    async fn create_tag(&self, data: CreateTagRequest) -> ApiResult<Tag> {
        let mut store = self.data.lock().unwrap();
        if store.tags.iter().any(|t| t.name == data.name) {
            return Err(unique_violation());
        }
        let tag = Tag {
            id: store.next_id(),
            name: data.name,
        };
        store.tags.push(tag.clone());
        Ok(tag)
    }

    async fn update_tag(&self, existing: Tag, data: UpdateTagRequest) -> ApiResult<Tag> {
        let mut store = self.data.lock().unwrap();
        if let Some(name) = &data.name {
            if store
                .tags
                .iter()
                .any(|t| t.name == *name && t.id != existing.id)
            {
                return Err(unique_violation());
            }
        }
        let tag = store
            .tags
            .iter_mut()
            .find(|t| t.id == existing.id)
            .ok_or_else(|| ApiError::NotFound("No row with this id in tags.".to_string()))?;
        if let Some(name) = data.name {
            tag.name = name;
        }
        Ok(tag.clone())
    }

    async fn remove_tag(&self, id: i64) -> ApiResult<Tag> {
        let mut store = self.data.lock().unwrap();
        let index = store
            .tags
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| ApiError::NotFound("No row with this id in tags.".to_string()))?;
        let tag = store.tags.remove(index);
        store.post_tags.retain(|(_, tag_id)| *tag_id != id);
        Ok(tag)
    }

    // --- Posts ---

    async fn get_post(&self, id: i64) -> ApiResult<Option<Post>> {
        let data = self.data.lock().unwrap();
        Ok(data.posts.iter().find(|p| p.id == id).cloned())
    }

    async fn list_posts(
        &self,
        page: Page,
        tag_id: Option<i64>,
        author_id: Option<i64>,
    ) -> ApiResult<Vec<Post>> {
        let data = self.data.lock().unwrap();
        let posts: Vec<Post> = data
            .posts
            .iter()
            .filter(|p| match tag_id {
                Some(tag_id) => data.post_tags.contains(&(p.id, tag_id)),
                None => true,
            })
            .filter(|p| match author_id {
                Some(author_id) => p.author_id == author_id,
                None => true,
            })
            .cloned()
            .collect();
        Ok(paginate(posts, page))
    }

    async fn create_post(&self, data: CreatePostRequest, author_id: i64) -> ApiResult<Post> {
        let mut store = self.data.lock().unwrap();
        let post = Post {
            id: store.next_id(),
            title: data.title,
            content: data.content,
            author_id,
            created_at: Utc::now(),
            updated_at: None,
        };
        if let Some(tag_ids) = &data.tag_ids {
            for tag_id in tag_ids {
                // Unresolvable ids are dropped, matching the real repository;
                // the pair set never holds duplicates.
                if store.tags.iter().any(|t| t.id == *tag_id)
                    && !store.post_tags.contains(&(post.id, *tag_id))
                {
                    store.post_tags.push((post.id, *tag_id));
                }
            }
        }
        store.posts.push(post.clone());
        Ok(post)
    }

    async fn update_post(&self, existing: Post, data: UpdatePostRequest) -> ApiResult<Post> {
        let mut store = self.data.lock().unwrap();
        if let Some(tag_ids) = &data.tag_ids {
            store.post_tags.retain(|(post_id, _)| *post_id != existing.id);
            if let Some(tag_ids) = tag_ids {
                for tag_id in tag_ids {
                    if store.tags.iter().any(|t| t.id == *tag_id)
                        && !store.post_tags.contains(&(existing.id, *tag_id))
                    {
                        store.post_tags.push((existing.id, *tag_id));
                    }
                }
            }
        }
        let dirty = data.title.is_some() || data.content.is_some();
        let post = store
            .posts
            .iter_mut()
            .find(|p| p.id == existing.id)
            .ok_or_else(|| ApiError::NotFound("No row with this id in posts.".to_string()))?;
        if let Some(title) = data.title {
            post.title = title;
        }
        if let Some(content) = data.content {
            post.content = content;
        }
        if dirty {
            post.updated_at = Some(Utc::now());
        }
        Ok(post.clone())
    }

    async fn remove_post(&self, id: i64) -> ApiResult<Post> {
        let mut store = self.data.lock().unwrap();
        let index = store
            .posts
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| ApiError::NotFound("No row with this id in posts.".to_string()))?;
        let post = store.posts.remove(index);
        store.post_tags.retain(|(post_id, _)| *post_id != id);
        store.comments.retain(|c| c.post_id != id);
        Ok(post)
    }

    async fn tags_for_post(&self, post_id: i64) -> ApiResult<Vec<Tag>> {
        let data = self.data.lock().unwrap();
        let mut tags: Vec<Tag> = data
            .tags
            .iter()
            .filter(|t| data.post_tags.contains(&(post_id, t.id)))
            .cloned()
            .collect();
        tags.sort_by_key(|t| t.id);
        Ok(tags)
    }

    // --- Comments ---

    async fn get_comment(&self, id: i64) -> ApiResult<Option<Comment>> {
        let data = self.data.lock().unwrap();
        Ok(data.comments.iter().find(|c| c.id == id).cloned())
    }

    async fn list_comments(&self, page: Page, post_id: Option<i64>) -> ApiResult<Vec<Comment>> {
        let data = self.data.lock().unwrap();
        let comments: Vec<Comment> = data
            .comments
            .iter()
            .filter(|c| match post_id {
                Some(post_id) => c.post_id == post_id,
                None => true,
            })
            .cloned()
            .collect();
        Ok(paginate(comments, page))
    }

    async fn create_comment(
        &self,
        data: CreateCommentRequest,
        author_id: i64,
    ) -> ApiResult<Comment> {
        let mut store = self.data.lock().unwrap();
        if !store.posts.iter().any(|p| p.id == data.post_id) {
            // Mirrors the foreign-key violation mapping of the real store.
            return Err(ApiError::BadRequest(
                "A referenced row does not exist.".to_string(),
            ));
        }
        let comment = Comment {
            id: store.next_id(),
            content: data.content,
            author_id,
            post_id: data.post_id,
            created_at: Utc::now(),
        };
        store.comments.push(comment.clone());
        Ok(comment)
    }

    async fn update_comment(
        &self,
        existing: Comment,
        data: UpdateCommentRequest,
    ) -> ApiResult<Comment> {
        let mut store = self.data.lock().unwrap();
        let comment = store
            .comments
            .iter_mut()
            .find(|c| c.id == existing.id)
            .ok_or_else(|| ApiError::NotFound("No row with this id in comments.".to_string()))?;
        if let Some(content) = data.content {
            comment.content = content;
        }
        Ok(comment.clone())
    }

    async fn remove_comment(&self, id: i64) -> ApiResult<Comment> {
        let mut store = self.data.lock().unwrap();
        let index = store
            .comments
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| ApiError::NotFound("No row with this id in comments.".to_string()))?;
        Ok(store.comments.remove(index))
    }
}

// --- State assembly ---

/// Creates an AppState over the given mock repository, with default config
/// and a lazily-connecting cache client (no Redis required).
pub fn test_state(repo: Arc<MockRepository>) -> AppState {
    AppState {
        repo: repo as RepositoryState,
        cache: Arc::new(CacheClient::open("redis://localhost:6379").expect("cache client")),
        config: AppConfig::default(),
    }
}

/// Seeds a user through the repository so the stored digest is real and
/// `authenticate` works against it.
pub async fn seed_user(
    repo: &MockRepository,
    email: &str,
    password: &str,
    is_active: bool,
    is_superuser: bool,
) -> User {
    repo.create_user(CreateUserRequest {
        email: email.to_string(),
        password: password.to_string(),
        full_name: None,
        is_active,
        is_superuser,
    })
    .await
    .expect("failed to seed user")
}
