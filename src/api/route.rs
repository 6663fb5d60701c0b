//! This module defines the routes of the API.

use crate::api::auth::CustomSecurityScheme;
use crate::model::core::{
    Blog, BlogPost, KnowledgeBankPost, Note, NoteBox, NotePage, RecordResponse, Statistics,
    UserTopic,
};
use crate::monitor::{scan_blog, MonitorConfig};
use crate::query_builder::sql_builder::ComposeQuery;
use log::{debug, warn};
use poem::web::Data;
use poem_openapi::Object;
use poem_openapi::{param::Path, param::Query, payload::Json, ApiResponse, OpenApi, Tags};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

#[derive(Tags)]
enum ApiTags {
    KnowledgeBank,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Object)]
struct ErrorMessage {
    msg: String,
}

#[derive(ApiResponse)]
enum GetRecordsResponse<
    S: Serialize
        + for<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow>
        + std::fmt::Debug
        + std::marker::Unpin
        + Send
        + Sync
        + poem_openapi::types::Type
        + poem_openapi::types::ParseFromJSON
        + poem_openapi::types::ToJSON,
> {
    #[oai(status = 200)]
    Ok(Json<RecordResponse<S>>),

    #[oai(status = 400)]
    BadRequest(Json<ErrorMessage>),

    #[oai(status = 404)]
    NotFound(Json<ErrorMessage>),
}

#[derive(ApiResponse)]
enum PostResponse<
    S: Serialize
        + for<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow>
        + std::fmt::Debug
        + std::marker::Unpin
        + Send
        + Sync
        + poem_openapi::types::Type
        + poem_openapi::types::ParseFromJSON
        + poem_openapi::types::ToJSON,
> {
    #[oai(status = 201)]
    Created(Json<S>),

    #[oai(status = 400)]
    BadRequest(Json<ErrorMessage>),

    #[oai(status = 404)]
    NotFound(Json<ErrorMessage>),
}

#[derive(ApiResponse)]
enum DeleteResponse {
    #[oai(status = 204)]
    NoContent,

    #[oai(status = 400)]
    BadRequest(Json<ErrorMessage>),

    #[oai(status = 404)]
    NotFound(Json<ErrorMessage>),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Object)]
pub struct ScanResult {
    pub blog_id: i64,
    pub new_posts: u64,
}

#[derive(ApiResponse)]
enum GetScanResponse {
    #[oai(status = 200)]
    Ok(Json<ScanResult>),

    #[oai(status = 400)]
    BadRequest(Json<ErrorMessage>),

    #[oai(status = 404)]
    NotFound(Json<ErrorMessage>),
}

#[derive(ApiResponse)]
enum GetStatisticsResponse {
    #[oai(status = 200)]
    Ok(Json<Statistics>),

    #[oai(status = 400)]
    BadRequest(Json<ErrorMessage>),
}

fn parse_query_str(query_str: Option<String>) -> Result<Option<ComposeQuery>, String> {
    let query_str = match query_str {
        Some(query_str) => query_str,
        None => {
            debug!("Query string is empty.");
            "".to_string()
        }
    };

    match ComposeQuery::from_str(&query_str) {
        Ok(query) => Ok(query),
        Err(e) => Err(format!("Failed to parse query string: {}", e)),
    }
}

pub struct KnowledgeBankApi;

#[OpenApi]
impl KnowledgeBankApi {
    /// Call `/api/v1/statistics` to fetch the record counts of the current user.
    #[oai(
        path = "/api/v1/statistics",
        method = "get",
        tag = "ApiTags::KnowledgeBank",
        operation_id = "fetchStatistics"
    )]
    async fn fetch_statistics(
        &self,
        pool: Data<&Arc<sqlx::PgPool>>,
        token: CustomSecurityScheme,
    ) -> GetStatisticsResponse {
        let pool_arc = pool.clone();
        let owner = token.0.username;

        match Statistics::get_statistics(&pool_arc, &owner).await {
            Ok(statistics) => GetStatisticsResponse::Ok(Json(statistics)),
            Err(e) => {
                let err = format!("Failed to fetch statistics: {}", e);
                warn!("{}", err);
                GetStatisticsResponse::BadRequest(Json(ErrorMessage { msg: err }))
            }
        }
    }

    /// Call `/api/v1/blogs` with query params to fetch the registered blogs.
    #[oai(
        path = "/api/v1/blogs",
        method = "get",
        tag = "ApiTags::KnowledgeBank",
        operation_id = "fetchBlogs"
    )]
    async fn fetch_blogs(
        &self,
        pool: Data<&Arc<sqlx::PgPool>>,
        page: Query<Option<u64>>,
        page_size: Query<Option<u64>>,
        query_str: Query<Option<String>>,
        token: CustomSecurityScheme,
    ) -> GetRecordsResponse<Blog> {
        let pool_arc = pool.clone();
        let page = page.0;
        let page_size = page_size.0;
        let owner = token.0.username;

        let query = match parse_query_str(query_str.0) {
            Ok(query) => query,
            Err(err) => {
                warn!("{}", err);
                return GetRecordsResponse::BadRequest(Json(ErrorMessage { msg: err }));
            }
        };

        match RecordResponse::<Blog>::get_records(
            &pool_arc,
            "knowledgebank_blog",
            &query,
            page,
            page_size,
            Some("created_at DESC"),
            Some(&owner),
        )
        .await
        {
            Ok(blogs) => GetRecordsResponse::Ok(Json(blogs)),
            Err(e) => {
                let err = format!("Failed to fetch blogs: {}", e);
                warn!("{}", err);
                GetRecordsResponse::BadRequest(Json(ErrorMessage { msg: err }))
            }
        }
    }

    /// Call `/api/v1/blogs` with payload to register a blog.
    #[oai(
        path = "/api/v1/blogs",
        method = "post",
        tag = "ApiTags::KnowledgeBank",
        operation_id = "postBlog"
    )]
    async fn post_blog(
        &self,
        pool: Data<&Arc<sqlx::PgPool>>,
        payload: Json<Blog>,
        token: CustomSecurityScheme,
    ) -> PostResponse<Blog> {
        let pool_arc = pool.clone();
        let mut payload = payload.0;
        payload.update_owner(token.0.username);

        if let Err(e) = payload.validate() {
            let err = format!("Invalid blog payload: {}", e);
            warn!("{}", err);
            return PostResponse::BadRequest(Json(ErrorMessage { msg: err }));
        }

        match payload.insert(&pool_arc).await {
            Ok(blog) => PostResponse::Created(Json(blog)),
            Err(e) => {
                let err = format!("Failed to insert blog: {}", e);
                warn!("{}", err);
                PostResponse::BadRequest(Json(ErrorMessage { msg: err }))
            }
        }
    }

    /// Call `/api/v1/blogs/:id` with payload to update a blog.
    #[oai(
        path = "/api/v1/blogs/:id",
        method = "put",
        tag = "ApiTags::KnowledgeBank",
        operation_id = "putBlog"
    )]
    async fn put_blog(
        &self,
        pool: Data<&Arc<sqlx::PgPool>>,
        payload: Json<Blog>,
        id: Path<i64>,
        token: CustomSecurityScheme,
    ) -> PostResponse<Blog> {
        let pool_arc = pool.clone();
        let mut payload = payload.0;
        let id = id.0;
        payload.update_owner(token.0.username);

        if let Err(e) = payload.validate() {
            let err = format!("Invalid blog payload: {}", e);
            warn!("{}", err);
            return PostResponse::BadRequest(Json(ErrorMessage { msg: err }));
        }

        match payload.update(&pool_arc, id).await {
            Ok(blog) => PostResponse::Created(Json(blog)),
            Err(e) => {
                let err = format!("Failed to update blog: {}", e);
                warn!("{}", err);
                PostResponse::NotFound(Json(ErrorMessage { msg: err }))
            }
        }
    }

    /// Call `/api/v1/blogs/:id` to delete a blog and its posts.
    #[oai(
        path = "/api/v1/blogs/:id",
        method = "delete",
        tag = "ApiTags::KnowledgeBank",
        operation_id = "deleteBlog"
    )]
    async fn delete_blog(
        &self,
        pool: Data<&Arc<sqlx::PgPool>>,
        id: Path<i64>,
        token: CustomSecurityScheme,
    ) -> DeleteResponse {
        let pool_arc = pool.clone();
        let id = id.0;
        let owner = token.0.username;

        match Blog::delete(&pool_arc, id, &owner).await {
            Ok(_) => DeleteResponse::NoContent,
            Err(e) => {
                let err = format!("Failed to delete blog: {}", e);
                warn!("{}", err);
                DeleteResponse::NotFound(Json(ErrorMessage { msg: err }))
            }
        }
    }

    /// Call `/api/v1/blogs/:id/scan` to run the monitor for one blog immediately.
    #[oai(
        path = "/api/v1/blogs/:id/scan",
        method = "post",
        tag = "ApiTags::KnowledgeBank",
        operation_id = "scanBlog"
    )]
    async fn scan_blog(
        &self,
        pool: Data<&Arc<sqlx::PgPool>>,
        id: Path<i64>,
        token: CustomSecurityScheme,
    ) -> GetScanResponse {
        let pool_arc = pool.clone();
        let id = id.0;
        let owner = token.0.username;

        let blog = match Blog::get_by_id(&pool_arc, id, &owner).await {
            Ok(blog) => blog,
            Err(e) => {
                let err = format!("Failed to find blog {}: {}", id, e);
                warn!("{}", err);
                return GetScanResponse::NotFound(Json(ErrorMessage { msg: err }));
            }
        };

        match scan_blog(&pool_arc, &blog, &MonitorConfig::from_env()).await {
            Ok(new_posts) => GetScanResponse::Ok(Json(ScanResult {
                blog_id: id,
                new_posts: new_posts as u64,
            })),
            Err(e) => {
                let err = format!("Failed to scan blog {}: {}", id, e);
                warn!("{}", err);
                GetScanResponse::BadRequest(Json(ErrorMessage { msg: err }))
            }
        }
    }

    /// Call `/api/v1/blog-posts` with query params to fetch the discovered posts.
    #[oai(
        path = "/api/v1/blog-posts",
        method = "get",
        tag = "ApiTags::KnowledgeBank",
        operation_id = "fetchBlogPosts"
    )]
    async fn fetch_blog_posts(
        &self,
        pool: Data<&Arc<sqlx::PgPool>>,
        page: Query<Option<u64>>,
        page_size: Query<Option<u64>>,
        query_str: Query<Option<String>>,
        token: CustomSecurityScheme,
    ) -> GetRecordsResponse<BlogPost> {
        let pool_arc = pool.clone();
        let page = page.0;
        let page_size = page_size.0;
        let owner = token.0.username;

        let query = match parse_query_str(query_str.0) {
            Ok(query) => query,
            Err(err) => {
                warn!("{}", err);
                return GetRecordsResponse::BadRequest(Json(ErrorMessage { msg: err }));
            }
        };

        match BlogPost::get_records_by_owner(&pool_arc, &owner, &query, page, page_size, None).await
        {
            Ok(posts) => GetRecordsResponse::Ok(Json(posts)),
            Err(e) => {
                let err = format!("Failed to fetch blog posts: {}", e);
                warn!("{}", err);
                GetRecordsResponse::BadRequest(Json(ErrorMessage { msg: err }))
            }
        }
    }

    /// Call `/api/v1/blog-posts` with payload to add a post by hand.
    #[oai(
        path = "/api/v1/blog-posts",
        method = "post",
        tag = "ApiTags::KnowledgeBank",
        operation_id = "postBlogPost"
    )]
    async fn post_blog_post(
        &self,
        pool: Data<&Arc<sqlx::PgPool>>,
        payload: Json<BlogPost>,
        token: CustomSecurityScheme,
    ) -> PostResponse<BlogPost> {
        let pool_arc = pool.clone();
        let payload = payload.0;
        let owner = token.0.username;

        if let Err(e) = payload.validate() {
            let err = format!("Invalid blog post payload: {}", e);
            warn!("{}", err);
            return PostResponse::BadRequest(Json(ErrorMessage { msg: err }));
        }

        // The post must point at one of the user's own blogs.
        if let Err(e) = Blog::get_by_id(&pool_arc, payload.blog_id, &owner).await {
            let err = format!("Failed to find blog {}: {}", payload.blog_id, e);
            warn!("{}", err);
            return PostResponse::NotFound(Json(ErrorMessage { msg: err }));
        }

        match payload.insert(&pool_arc).await {
            Ok(post) => PostResponse::Created(Json(post)),
            Err(e) => {
                let err = format!("Failed to insert blog post: {}", e);
                warn!("{}", err);
                PostResponse::BadRequest(Json(ErrorMessage { msg: err }))
            }
        }
    }

    /// Call `/api/v1/blog-posts/:id` with payload to re-assign a post's topic.
    #[oai(
        path = "/api/v1/blog-posts/:id",
        method = "put",
        tag = "ApiTags::KnowledgeBank",
        operation_id = "putBlogPost"
    )]
    async fn put_blog_post(
        &self,
        pool: Data<&Arc<sqlx::PgPool>>,
        payload: Json<BlogPost>,
        id: Path<i64>,
        token: CustomSecurityScheme,
    ) -> PostResponse<BlogPost> {
        let pool_arc = pool.clone();
        let payload = payload.0;
        let id = id.0;
        let owner = token.0.username;

        match payload.update_topic(&pool_arc, id, &owner).await {
            Ok(post) => PostResponse::Created(Json(post)),
            Err(e) => {
                let err = format!("Failed to update blog post: {}", e);
                warn!("{}", err);
                PostResponse::NotFound(Json(ErrorMessage { msg: err }))
            }
        }
    }

    /// Call `/api/v1/blog-posts/:id` to delete a post.
    #[oai(
        path = "/api/v1/blog-posts/:id",
        method = "delete",
        tag = "ApiTags::KnowledgeBank",
        operation_id = "deleteBlogPost"
    )]
    async fn delete_blog_post(
        &self,
        pool: Data<&Arc<sqlx::PgPool>>,
        id: Path<i64>,
        token: CustomSecurityScheme,
    ) -> DeleteResponse {
        let pool_arc = pool.clone();
        let id = id.0;
        let owner = token.0.username;

        match BlogPost::delete(&pool_arc, id, &owner).await {
            Ok(_) => DeleteResponse::NoContent,
            Err(e) => {
                let err = format!("Failed to delete blog post: {}", e);
                warn!("{}", err);
                DeleteResponse::NotFound(Json(ErrorMessage { msg: err }))
            }
        }
    }

    /// Call `/api/v1/user-topics` with query params to fetch the user's topics.
    #[oai(
        path = "/api/v1/user-topics",
        method = "get",
        tag = "ApiTags::KnowledgeBank",
        operation_id = "fetchUserTopics"
    )]
    async fn fetch_user_topics(
        &self,
        pool: Data<&Arc<sqlx::PgPool>>,
        page: Query<Option<u64>>,
        page_size: Query<Option<u64>>,
        query_str: Query<Option<String>>,
        token: CustomSecurityScheme,
    ) -> GetRecordsResponse<UserTopic> {
        let pool_arc = pool.clone();
        let page = page.0;
        let page_size = page_size.0;
        let owner = token.0.username;

        let query = match parse_query_str(query_str.0) {
            Ok(query) => query,
            Err(err) => {
                warn!("{}", err);
                return GetRecordsResponse::BadRequest(Json(ErrorMessage { msg: err }));
            }
        };

        match RecordResponse::<UserTopic>::get_records(
            &pool_arc,
            "knowledgebank_user_topic",
            &query,
            page,
            page_size,
            Some("created_at ASC"),
            Some(&owner),
        )
        .await
        {
            Ok(topics) => GetRecordsResponse::Ok(Json(topics)),
            Err(e) => {
                let err = format!("Failed to fetch user topics: {}", e);
                warn!("{}", err);
                GetRecordsResponse::BadRequest(Json(ErrorMessage { msg: err }))
            }
        }
    }

    /// Call `/api/v1/user-topics` with payload to create a topic.
    #[oai(
        path = "/api/v1/user-topics",
        method = "post",
        tag = "ApiTags::KnowledgeBank",
        operation_id = "postUserTopic"
    )]
    async fn post_user_topic(
        &self,
        pool: Data<&Arc<sqlx::PgPool>>,
        payload: Json<UserTopic>,
        token: CustomSecurityScheme,
    ) -> PostResponse<UserTopic> {
        let pool_arc = pool.clone();
        let mut payload = payload.0;
        payload.update_owner(token.0.username);

        if let Err(e) = payload.validate() {
            let err = format!("Invalid user topic payload: {}", e);
            warn!("{}", err);
            return PostResponse::BadRequest(Json(ErrorMessage { msg: err }));
        }

        match payload.insert(&pool_arc).await {
            Ok(topic) => PostResponse::Created(Json(topic)),
            Err(e) => {
                let err = format!("Failed to insert user topic: {}", e);
                warn!("{}", err);
                PostResponse::BadRequest(Json(ErrorMessage { msg: err }))
            }
        }
    }

    /// Call `/api/v1/user-topics/:id` with payload to update a topic.
    #[oai(
        path = "/api/v1/user-topics/:id",
        method = "put",
        tag = "ApiTags::KnowledgeBank",
        operation_id = "putUserTopic"
    )]
    async fn put_user_topic(
        &self,
        pool: Data<&Arc<sqlx::PgPool>>,
        payload: Json<UserTopic>,
        id: Path<i64>,
        token: CustomSecurityScheme,
    ) -> PostResponse<UserTopic> {
        let pool_arc = pool.clone();
        let mut payload = payload.0;
        let id = id.0;
        payload.update_owner(token.0.username);

        if let Err(e) = payload.validate() {
            let err = format!("Invalid user topic payload: {}", e);
            warn!("{}", err);
            return PostResponse::BadRequest(Json(ErrorMessage { msg: err }));
        }

        match payload.update(&pool_arc, id).await {
            Ok(topic) => PostResponse::Created(Json(topic)),
            Err(e) => {
                let err = format!("Failed to update user topic: {}", e);
                warn!("{}", err);
                PostResponse::NotFound(Json(ErrorMessage { msg: err }))
            }
        }
    }

    /// Call `/api/v1/user-topics/:id` to delete a topic and its knowledge bank.
    #[oai(
        path = "/api/v1/user-topics/:id",
        method = "delete",
        tag = "ApiTags::KnowledgeBank",
        operation_id = "deleteUserTopic"
    )]
    async fn delete_user_topic(
        &self,
        pool: Data<&Arc<sqlx::PgPool>>,
        id: Path<i64>,
        token: CustomSecurityScheme,
    ) -> DeleteResponse {
        let pool_arc = pool.clone();
        let id = id.0;
        let owner = token.0.username;

        match UserTopic::delete(&pool_arc, id, &owner).await {
            Ok(_) => DeleteResponse::NoContent,
            Err(e) => {
                let err = format!("Failed to delete user topic: {}", e);
                warn!("{}", err);
                DeleteResponse::NotFound(Json(ErrorMessage { msg: err }))
            }
        }
    }

    /// Call `/api/v1/knowledge-bank-posts` with query params to fetch the curated posts.
    #[oai(
        path = "/api/v1/knowledge-bank-posts",
        method = "get",
        tag = "ApiTags::KnowledgeBank",
        operation_id = "fetchKnowledgeBankPosts"
    )]
    async fn fetch_knowledge_bank_posts(
        &self,
        pool: Data<&Arc<sqlx::PgPool>>,
        page: Query<Option<u64>>,
        page_size: Query<Option<u64>>,
        query_str: Query<Option<String>>,
        token: CustomSecurityScheme,
    ) -> GetRecordsResponse<KnowledgeBankPost> {
        let pool_arc = pool.clone();
        let page = page.0;
        let page_size = page_size.0;
        let owner = token.0.username;

        let query = match parse_query_str(query_str.0) {
            Ok(query) => query,
            Err(err) => {
                warn!("{}", err);
                return GetRecordsResponse::BadRequest(Json(ErrorMessage { msg: err }));
            }
        };

        match RecordResponse::<KnowledgeBankPost>::get_records(
            &pool_arc,
            "knowledgebank_knowledge_bank_post",
            &query,
            page,
            page_size,
            Some("saved_at DESC"),
            Some(&owner),
        )
        .await
        {
            Ok(entries) => GetRecordsResponse::Ok(Json(entries)),
            Err(e) => {
                let err = format!("Failed to fetch knowledge bank posts: {}", e);
                warn!("{}", err);
                GetRecordsResponse::BadRequest(Json(ErrorMessage { msg: err }))
            }
        }
    }

    /// Call `/api/v1/knowledge-bank-posts` with payload to curate a post into a topic.
    #[oai(
        path = "/api/v1/knowledge-bank-posts",
        method = "post",
        tag = "ApiTags::KnowledgeBank",
        operation_id = "postKnowledgeBankPost"
    )]
    async fn post_knowledge_bank_post(
        &self,
        pool: Data<&Arc<sqlx::PgPool>>,
        payload: Json<KnowledgeBankPost>,
        token: CustomSecurityScheme,
    ) -> PostResponse<KnowledgeBankPost> {
        let pool_arc = pool.clone();
        let mut payload = payload.0;
        payload.update_owner(token.0.username);

        match payload.insert(&pool_arc).await {
            Ok(entry) => PostResponse::Created(Json(entry)),
            Err(e) => {
                let err = format!("Failed to insert knowledge bank post: {}", e);
                warn!("{}", err);
                PostResponse::BadRequest(Json(ErrorMessage { msg: err }))
            }
        }
    }

    /// Call `/api/v1/knowledge-bank-posts/:id` with payload to update a curated post.
    #[oai(
        path = "/api/v1/knowledge-bank-posts/:id",
        method = "put",
        tag = "ApiTags::KnowledgeBank",
        operation_id = "putKnowledgeBankPost"
    )]
    async fn put_knowledge_bank_post(
        &self,
        pool: Data<&Arc<sqlx::PgPool>>,
        payload: Json<KnowledgeBankPost>,
        id: Path<i64>,
        token: CustomSecurityScheme,
    ) -> PostResponse<KnowledgeBankPost> {
        let pool_arc = pool.clone();
        let mut payload = payload.0;
        let id = id.0;
        payload.update_owner(token.0.username);

        match payload.update(&pool_arc, id).await {
            Ok(entry) => PostResponse::Created(Json(entry)),
            Err(e) => {
                let err = format!("Failed to update knowledge bank post: {}", e);
                warn!("{}", err);
                PostResponse::NotFound(Json(ErrorMessage { msg: err }))
            }
        }
    }

    /// Call `/api/v1/knowledge-bank-posts/:id` to remove a post from the knowledge bank.
    #[oai(
        path = "/api/v1/knowledge-bank-posts/:id",
        method = "delete",
        tag = "ApiTags::KnowledgeBank",
        operation_id = "deleteKnowledgeBankPost"
    )]
    async fn delete_knowledge_bank_post(
        &self,
        pool: Data<&Arc<sqlx::PgPool>>,
        id: Path<i64>,
        token: CustomSecurityScheme,
    ) -> DeleteResponse {
        let pool_arc = pool.clone();
        let id = id.0;
        let owner = token.0.username;

        match KnowledgeBankPost::delete(&pool_arc, id, &owner).await {
            Ok(_) => DeleteResponse::NoContent,
            Err(e) => {
                let err = format!("Failed to delete knowledge bank post: {}", e);
                warn!("{}", err);
                DeleteResponse::NotFound(Json(ErrorMessage { msg: err }))
            }
        }
    }

    /// Call `/api/v1/notes` with query params to fetch the user's notes.
    #[oai(
        path = "/api/v1/notes",
        method = "get",
        tag = "ApiTags::KnowledgeBank",
        operation_id = "fetchNotes"
    )]
    async fn fetch_notes(
        &self,
        pool: Data<&Arc<sqlx::PgPool>>,
        page: Query<Option<u64>>,
        page_size: Query<Option<u64>>,
        query_str: Query<Option<String>>,
        token: CustomSecurityScheme,
    ) -> GetRecordsResponse<Note> {
        let pool_arc = pool.clone();
        let page = page.0;
        let page_size = page_size.0;
        let owner = token.0.username;

        let query = match parse_query_str(query_str.0) {
            Ok(query) => query,
            Err(err) => {
                warn!("{}", err);
                return GetRecordsResponse::BadRequest(Json(ErrorMessage { msg: err }));
            }
        };

        match RecordResponse::<Note>::get_records(
            &pool_arc,
            "knowledgebank_note",
            &query,
            page,
            page_size,
            Some("updated_at DESC"),
            Some(&owner),
        )
        .await
        {
            Ok(notes) => GetRecordsResponse::Ok(Json(notes)),
            Err(e) => {
                let err = format!("Failed to fetch notes: {}", e);
                warn!("{}", err);
                GetRecordsResponse::BadRequest(Json(ErrorMessage { msg: err }))
            }
        }
    }

    /// Call `/api/v1/notes` with payload to create a note.
    #[oai(
        path = "/api/v1/notes",
        method = "post",
        tag = "ApiTags::KnowledgeBank",
        operation_id = "postNote"
    )]
    async fn post_note(
        &self,
        pool: Data<&Arc<sqlx::PgPool>>,
        payload: Json<Note>,
        token: CustomSecurityScheme,
    ) -> PostResponse<Note> {
        let pool_arc = pool.clone();
        let mut payload = payload.0;
        payload.update_owner(token.0.username);

        if let Err(e) = payload.validate() {
            let err = format!("Invalid note payload: {}", e);
            warn!("{}", err);
            return PostResponse::BadRequest(Json(ErrorMessage { msg: err }));
        }

        match payload.insert(&pool_arc).await {
            Ok(note) => PostResponse::Created(Json(note)),
            Err(e) => {
                let err = format!("Failed to insert note: {}", e);
                warn!("{}", err);
                PostResponse::BadRequest(Json(ErrorMessage { msg: err }))
            }
        }
    }

    /// Call `/api/v1/notes/:id` with payload to update a note.
    #[oai(
        path = "/api/v1/notes/:id",
        method = "put",
        tag = "ApiTags::KnowledgeBank",
        operation_id = "putNote"
    )]
    async fn put_note(
        &self,
        pool: Data<&Arc<sqlx::PgPool>>,
        payload: Json<Note>,
        id: Path<i64>,
        token: CustomSecurityScheme,
    ) -> PostResponse<Note> {
        let pool_arc = pool.clone();
        let mut payload = payload.0;
        let id = id.0;
        payload.update_owner(token.0.username);

        if let Err(e) = payload.validate() {
            let err = format!("Invalid note payload: {}", e);
            warn!("{}", err);
            return PostResponse::BadRequest(Json(ErrorMessage { msg: err }));
        }

        match payload.update(&pool_arc, id).await {
            Ok(note) => PostResponse::Created(Json(note)),
            Err(e) => {
                let err = format!("Failed to update note: {}", e);
                warn!("{}", err);
                PostResponse::NotFound(Json(ErrorMessage { msg: err }))
            }
        }
    }

    /// Call `/api/v1/notes/:id` to delete a note and its pages.
    #[oai(
        path = "/api/v1/notes/:id",
        method = "delete",
        tag = "ApiTags::KnowledgeBank",
        operation_id = "deleteNote"
    )]
    async fn delete_note(
        &self,
        pool: Data<&Arc<sqlx::PgPool>>,
        id: Path<i64>,
        token: CustomSecurityScheme,
    ) -> DeleteResponse {
        let pool_arc = pool.clone();
        let id = id.0;
        let owner = token.0.username;

        match Note::delete(&pool_arc, id, &owner).await {
            Ok(_) => DeleteResponse::NoContent,
            Err(e) => {
                let err = format!("Failed to delete note: {}", e);
                warn!("{}", err);
                DeleteResponse::NotFound(Json(ErrorMessage { msg: err }))
            }
        }
    }

    /// Call `/api/v1/note-pages` with query params to fetch note pages.
    #[oai(
        path = "/api/v1/note-pages",
        method = "get",
        tag = "ApiTags::KnowledgeBank",
        operation_id = "fetchNotePages"
    )]
    async fn fetch_note_pages(
        &self,
        pool: Data<&Arc<sqlx::PgPool>>,
        page: Query<Option<u64>>,
        page_size: Query<Option<u64>>,
        query_str: Query<Option<String>>,
        token: CustomSecurityScheme,
    ) -> GetRecordsResponse<NotePage> {
        let pool_arc = pool.clone();
        let page = page.0;
        let page_size = page_size.0;
        let owner = token.0.username;

        let query = match parse_query_str(query_str.0) {
            Ok(query) => query,
            Err(err) => {
                warn!("{}", err);
                return GetRecordsResponse::BadRequest(Json(ErrorMessage { msg: err }));
            }
        };

        match NotePage::get_records_by_owner(&pool_arc, &owner, &query, page, page_size).await {
            Ok(pages) => GetRecordsResponse::Ok(Json(pages)),
            Err(e) => {
                let err = format!("Failed to fetch note pages: {}", e);
                warn!("{}", err);
                GetRecordsResponse::BadRequest(Json(ErrorMessage { msg: err }))
            }
        }
    }

    /// Call `/api/v1/note-pages` with payload to create a note page.
    #[oai(
        path = "/api/v1/note-pages",
        method = "post",
        tag = "ApiTags::KnowledgeBank",
        operation_id = "postNotePage"
    )]
    async fn post_note_page(
        &self,
        pool: Data<&Arc<sqlx::PgPool>>,
        payload: Json<NotePage>,
        token: CustomSecurityScheme,
    ) -> PostResponse<NotePage> {
        let pool_arc = pool.clone();
        let payload = payload.0;
        let owner = token.0.username;

        if let Err(e) = payload.validate() {
            let err = format!("Invalid note page payload: {}", e);
            warn!("{}", err);
            return PostResponse::BadRequest(Json(ErrorMessage { msg: err }));
        }

        match payload.insert(&pool_arc, &owner).await {
            Ok(page) => PostResponse::Created(Json(page)),
            Err(e) => {
                let err = format!("Failed to insert note page: {}", e);
                warn!("{}", err);
                PostResponse::BadRequest(Json(ErrorMessage { msg: err }))
            }
        }
    }

    /// Call `/api/v1/note-pages/:id` with payload to update a note page.
    #[oai(
        path = "/api/v1/note-pages/:id",
        method = "put",
        tag = "ApiTags::KnowledgeBank",
        operation_id = "putNotePage"
    )]
    async fn put_note_page(
        &self,
        pool: Data<&Arc<sqlx::PgPool>>,
        payload: Json<NotePage>,
        id: Path<i64>,
        token: CustomSecurityScheme,
    ) -> PostResponse<NotePage> {
        let pool_arc = pool.clone();
        let payload = payload.0;
        let id = id.0;
        let owner = token.0.username;

        if let Err(e) = payload.validate() {
            let err = format!("Invalid note page payload: {}", e);
            warn!("{}", err);
            return PostResponse::BadRequest(Json(ErrorMessage { msg: err }));
        }

        match payload.update(&pool_arc, id, &owner).await {
            Ok(page) => PostResponse::Created(Json(page)),
            Err(e) => {
                let err = format!("Failed to update note page: {}", e);
                warn!("{}", err);
                PostResponse::NotFound(Json(ErrorMessage { msg: err }))
            }
        }
    }

    /// Call `/api/v1/note-pages/:id` to delete a note page and its boxes.
    #[oai(
        path = "/api/v1/note-pages/:id",
        method = "delete",
        tag = "ApiTags::KnowledgeBank",
        operation_id = "deleteNotePage"
    )]
    async fn delete_note_page(
        &self,
        pool: Data<&Arc<sqlx::PgPool>>,
        id: Path<i64>,
        token: CustomSecurityScheme,
    ) -> DeleteResponse {
        let pool_arc = pool.clone();
        let id = id.0;
        let owner = token.0.username;

        match NotePage::delete(&pool_arc, id, &owner).await {
            Ok(_) => DeleteResponse::NoContent,
            Err(e) => {
                let err = format!("Failed to delete note page: {}", e);
                warn!("{}", err);
                DeleteResponse::NotFound(Json(ErrorMessage { msg: err }))
            }
        }
    }

    /// Call `/api/v1/note-boxes` with query params to fetch note boxes.
    #[oai(
        path = "/api/v1/note-boxes",
        method = "get",
        tag = "ApiTags::KnowledgeBank",
        operation_id = "fetchNoteBoxes"
    )]
    async fn fetch_note_boxes(
        &self,
        pool: Data<&Arc<sqlx::PgPool>>,
        page: Query<Option<u64>>,
        page_size: Query<Option<u64>>,
        query_str: Query<Option<String>>,
        token: CustomSecurityScheme,
    ) -> GetRecordsResponse<NoteBox> {
        let pool_arc = pool.clone();
        let page = page.0;
        let page_size = page_size.0;
        let owner = token.0.username;

        let query = match parse_query_str(query_str.0) {
            Ok(query) => query,
            Err(err) => {
                warn!("{}", err);
                return GetRecordsResponse::BadRequest(Json(ErrorMessage { msg: err }));
            }
        };

        match NoteBox::get_records_by_owner(&pool_arc, &owner, &query, page, page_size).await {
            Ok(boxes) => GetRecordsResponse::Ok(Json(boxes)),
            Err(e) => {
                let err = format!("Failed to fetch note boxes: {}", e);
                warn!("{}", err);
                GetRecordsResponse::BadRequest(Json(ErrorMessage { msg: err }))
            }
        }
    }

    /// Call `/api/v1/note-boxes` with payload to create a note box.
    #[oai(
        path = "/api/v1/note-boxes",
        method = "post",
        tag = "ApiTags::KnowledgeBank",
        operation_id = "postNoteBox"
    )]
    async fn post_note_box(
        &self,
        pool: Data<&Arc<sqlx::PgPool>>,
        payload: Json<NoteBox>,
        token: CustomSecurityScheme,
    ) -> PostResponse<NoteBox> {
        let pool_arc = pool.clone();
        let payload = payload.0;
        let owner = token.0.username;

        match payload.insert(&pool_arc, &owner).await {
            Ok(nbox) => PostResponse::Created(Json(nbox)),
            Err(e) => {
                let err = format!("Failed to insert note box: {}", e);
                warn!("{}", err);
                PostResponse::BadRequest(Json(ErrorMessage { msg: err }))
            }
        }
    }

    /// Call `/api/v1/note-boxes/:id` with payload to update a note box.
    #[oai(
        path = "/api/v1/note-boxes/:id",
        method = "put",
        tag = "ApiTags::KnowledgeBank",
        operation_id = "putNoteBox"
    )]
    async fn put_note_box(
        &self,
        pool: Data<&Arc<sqlx::PgPool>>,
        payload: Json<NoteBox>,
        id: Path<i64>,
        token: CustomSecurityScheme,
    ) -> PostResponse<NoteBox> {
        let pool_arc = pool.clone();
        let payload = payload.0;
        let id = id.0;
        let owner = token.0.username;

        match payload.update(&pool_arc, id, &owner).await {
            Ok(nbox) => PostResponse::Created(Json(nbox)),
            Err(e) => {
                let err = format!("Failed to update note box: {}", e);
                warn!("{}", err);
                PostResponse::NotFound(Json(ErrorMessage { msg: err }))
            }
        }
    }

    /// Call `/api/v1/note-boxes/:id` to delete a note box.
    #[oai(
        path = "/api/v1/note-boxes/:id",
        method = "delete",
        tag = "ApiTags::KnowledgeBank",
        operation_id = "deleteNoteBox"
    )]
    async fn delete_note_box(
        &self,
        pool: Data<&Arc<sqlx::PgPool>>,
        id: Path<i64>,
        token: CustomSecurityScheme,
    ) -> DeleteResponse {
        let pool_arc = pool.clone();
        let id = id.0;
        let owner = token.0.username;

        match NoteBox::delete(&pool_arc, id, &owner).await {
            Ok(_) => DeleteResponse::NoContent,
            Err(e) => {
                let err = format!("Failed to delete note box: {}", e);
                warn!("{}", err);
                DeleteResponse::NotFound(Json(ErrorMessage { msg: err }))
            }
        }
    }
}
