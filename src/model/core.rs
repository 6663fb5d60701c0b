//! The database schema for the application. These are the models that will be used to interact with the database.

use super::util::{get_delimiter, match_color, parse_csv_error, ValidationError};
use crate::query_builder::sql_builder::ComposeQuery;
use anyhow::Ok as AnyOk;
use chrono::serde::{ts_seconds, ts_seconds_option};
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use log::{debug, info};
use poem_openapi::Object;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::{error::Error, option::Option, path::PathBuf};
use validator::Validate;

pub const DEFAULT_MAX_LENGTH: u64 = 64;
pub const DEFAULT_MIN_LENGTH: u64 = 1;
pub const TITLE_MAX_LENGTH: u64 = 255;
pub const URL_MAX_LENGTH: u64 = 512;
pub const POST_TITLE_MAX_LENGTH: u64 = 512;
pub const LINK_MAX_LENGTH: u64 = 1024;

lazy_static! {
    pub static ref HTTP_URL_REGEX: Regex = Regex::new(r"^https?://[^\s]+$").unwrap();
    // SHA-256 hex digest, the diff key for posts.
    pub static ref FINGERPRINT_REGEX: Regex = Regex::new(r"^[0-9a-f]{64}$").unwrap();
    pub static ref HEX_COLOR_REGEX: Regex = Regex::new(r"^#[0-9a-fA-F]{6}$").unwrap();
}

pub trait CheckData {
    fn check_csv_is_valid(filepath: &PathBuf) -> Vec<Box<dyn Error>>;

    // Implement the check function
    fn check_csv_is_valid_default<
        S: for<'de> serde::Deserialize<'de> + Validate + std::fmt::Debug,
    >(
        filepath: &PathBuf,
    ) -> Vec<Box<dyn Error>> {
        info!("Start to check the csv file: {:?}", filepath);
        let mut validation_errors: Vec<Box<dyn Error>> = vec![];
        let delimiter = match get_delimiter(filepath) {
            Ok(d) => d,
            Err(e) => {
                validation_errors.push(Box::new(ValidationError::new(
                    &format!("Failed to get delimiter: ({})", e),
                    vec![],
                )));
                return validation_errors;
            }
        };

        debug!("The delimiter is: {:?}", delimiter as char);
        // Build the CSV reader
        let mut reader = match csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .from_path(filepath)
        {
            Ok(r) => r,
            Err(e) => {
                validation_errors.push(Box::new(ValidationError::new(
                    &format!("Failed to read CSV: ({})", e),
                    vec![],
                )));
                return validation_errors;
            }
        };

        // Try to deserialize each record
        debug!(
            "Start to deserialize the csv file, real columns: {:?}, expected columns: {:?}",
            reader.headers().unwrap().into_iter().collect::<Vec<_>>(),
            Self::fields()
        );
        let mut line_number = 1;
        for result in reader.deserialize::<S>() {
            line_number += 1;

            match result {
                Ok(data) => match data.validate() {
                    Ok(_) => {
                        continue;
                    }
                    Err(e) => {
                        validation_errors.push(Box::new(ValidationError::new(
                            &format!(
                                "Failed to validate the data, line: {}, details: ({})",
                                line_number, e
                            ),
                            vec![],
                        )));
                        continue;
                    }
                },
                Err(e) => {
                    let error_msg = parse_csv_error(&e);

                    validation_errors.push(Box::new(ValidationError::new(&error_msg, vec![])));

                    continue;
                }
            };
        }

        validation_errors
    }

    fn fields() -> Vec<String>;

    fn unique_fields() -> Vec<String>;

    fn get_column_names(filepath: &PathBuf) -> Result<Vec<String>, Box<dyn Error>> {
        let delimiter = get_delimiter(filepath)?;
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .from_path(filepath)?;

        let headers = reader.headers()?;
        let mut column_names = Vec::new();
        let expected_columns = Self::fields();
        for header in headers {
            let column = header.to_string();
            // All the columns have been checked in the function `check_csv_is_valid`.
            if expected_columns.contains(&column) {
                column_names.push(column);
            } else {
                continue;
            }
        }

        Ok(column_names)
    }

    /// Select the columns to keep and write them into the output file, so the
    /// COPY statement sees exactly the expected columns.
    fn select_expected_columns(
        in_filepath: &PathBuf,
        out_filepath: &PathBuf,
    ) -> Result<(), Box<dyn Error>> {
        let delimiter = get_delimiter(in_filepath)?;
        debug!("The delimiter is: {:?}", delimiter as char);
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .from_path(in_filepath)?;

        let headers = reader.headers()?.clone();
        debug!("The headers are: {:?}", headers);

        // Identify the indices of the columns to keep
        let indices_to_keep: Vec<usize> = headers
            .iter()
            .enumerate()
            .filter_map(|(i, h)| {
                if Self::fields().contains(&h.to_string()) {
                    Some(i)
                } else {
                    None
                }
            })
            .collect();

        let mut wtr = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_writer(std::fs::File::create(out_filepath)?);

        let headers_to_keep: Vec<&str> = indices_to_keep.iter().map(|&i| &headers[i]).collect();
        wtr.write_record(&headers_to_keep)?;

        for result in reader.records() {
            let record = result?;
            let record_to_keep: Vec<&str> = indices_to_keep.iter().map(|&i| &record[i]).collect();
            wtr.write_record(&record_to_keep)?;
        }

        wtr.flush()?;

        debug!(
            "The path of the temporary file is: {}",
            out_filepath.display()
        );

        Ok(())
    }

    fn get_records<S: for<'de> serde::Deserialize<'de> + Validate + std::fmt::Debug>(
        filepath: &PathBuf,
    ) -> Result<Vec<S>, Box<dyn Error>> {
        debug!("Start to get records from the csv file: {:?}", filepath);
        let delimiter = get_delimiter(filepath)?;
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .from_path(filepath)?;

        let mut records = Vec::new();
        for result in reader.deserialize::<S>() {
            let record: S = result?;
            records.push(record);
        }

        debug!("Get {} records successfully.", records.len());

        Ok(records)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Object)]
pub struct RecordResponse<S>
where
    S: Serialize
        + for<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow>
        + std::fmt::Debug
        + std::marker::Unpin
        + Send
        + Sync
        + poem_openapi::types::Type
        + poem_openapi::types::ParseFromJSON
        + poem_openapi::types::ToJSON,
{
    /// data
    pub records: Vec<S>,
    /// total num
    pub total: u64,
    /// current page index
    pub page: u64,
    /// default 10
    pub page_size: u64,
}

impl<
        S: Serialize
            + for<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow>
            + std::fmt::Debug
            + std::marker::Unpin
            + Send
            + Sync
            + poem_openapi::types::Type
            + poem_openapi::types::ParseFromJSON
            + poem_openapi::types::ToJSON,
    > RecordResponse<S>
{
    pub async fn get_records(
        pool: &sqlx::PgPool,
        table_name: &str,
        query: &Option<ComposeQuery>,
        page: Option<u64>,
        page_size: Option<u64>,
        order_by: Option<&str>,
        owner: Option<&str>,
    ) -> Result<RecordResponse<S>, anyhow::Error> {
        let mut query_str = match query {
            Some(ComposeQuery::QueryItem(item)) => item.format(),
            Some(ComposeQuery::ComposeQueryItem(item)) => item.format(),
            None => "".to_string(),
        };

        if query_str.is_empty() {
            query_str = "1=1".to_string();
        };

        let order_by_str = if order_by.is_none() {
            "".to_string()
        } else {
            format!("ORDER BY {}", order_by.unwrap())
        };

        let pagination_str = if page.is_none() && page_size.is_none() {
            "LIMIT 10 OFFSET 0".to_string()
        } else {
            let page = match page {
                Some(page) => page,
                None => 1,
            };

            let page_size = match page_size {
                Some(page_size) => page_size,
                None => 10,
            };

            let limit = page_size;
            let offset = (page - 1) * page_size;

            format!("LIMIT {} OFFSET {}", limit, offset)
        };

        let which_owner = if owner.is_some() {
            format!("AND owner = '{}'", owner.unwrap())
        } else {
            "".to_string()
        };

        let query_str = format!("{} {}", query_str, which_owner);

        let sql_str = format!(
            "SELECT * FROM {} WHERE {} {} {}",
            table_name, query_str, order_by_str, pagination_str
        );

        let records = sqlx::query_as::<_, S>(sql_str.as_str())
            .fetch_all(pool)
            .await?;

        let sql_str = format!("SELECT COUNT(*) FROM {} WHERE {}", table_name, query_str);

        let total = sqlx::query_as::<_, (i64,)>(sql_str.as_str())
            .fetch_one(pool)
            .await?;

        AnyOk(RecordResponse {
            records: records,
            total: total.0 as u64,
            page: page.unwrap_or(1),
            page_size: page_size.unwrap_or(10),
        })
    }
}

/// A registered blog source that the monitor periodically checks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Object, sqlx::FromRow, Validate)]
pub struct Blog {
    // Ignore this field when deserialize from json
    #[serde(skip_deserializing)]
    #[oai(read_only)]
    pub id: i64,

    // The owner is filled in from the bearer token, not the payload.
    #[serde(skip_deserializing)]
    #[oai(read_only)]
    pub owner: String,

    #[validate(length(
        max = "URL_MAX_LENGTH",
        min = "DEFAULT_MIN_LENGTH",
        message = "The length of url must be between 1 and 512."
    ))]
    #[validate(regex(
        path = "HTTP_URL_REGEX",
        message = "The url must be a http(s) url. Such as `https://blog.rust-lang.org`."
    ))]
    pub url: String,

    #[oai(skip_serializing_if_is_none)]
    pub feed_url: Option<String>,

    #[validate(length(
        max = "TITLE_MAX_LENGTH",
        min = "DEFAULT_MIN_LENGTH",
        message = "The length of title must be between 1 and 255."
    ))]
    pub title: String,

    #[oai(skip_serializing_if_is_none)]
    pub description: Option<String>,

    #[serde(default = "default_is_active")]
    #[oai(default = "default_is_active")]
    pub is_active: bool,

    #[serde(skip_deserializing)]
    #[serde(with = "ts_seconds")]
    #[oai(read_only)]
    pub created_at: DateTime<Utc>,

    #[serde(skip_deserializing)]
    #[serde(with = "ts_seconds_option")]
    #[oai(read_only)]
    #[oai(skip_serializing_if_is_none)]
    pub last_checked_at: Option<DateTime<Utc>>,
}

fn default_is_active() -> bool {
    true
}

impl Blog {
    pub fn update_owner(&mut self, owner: String) -> &Self {
        self.owner = owner;
        return self;
    }

    pub async fn insert(&self, pool: &sqlx::PgPool) -> Result<Blog, anyhow::Error> {
        let sql_str = "INSERT INTO knowledgebank_blog (owner, url, feed_url, title, description, is_active) VALUES ($1, $2, $3, $4, $5, $6) RETURNING *";
        let blog = sqlx::query_as::<_, Blog>(sql_str)
            .bind(&self.owner)
            .bind(&self.url)
            .bind(&self.feed_url)
            .bind(&self.title)
            .bind(&self.description)
            .bind(&self.is_active)
            .fetch_one(pool)
            .await?;

        AnyOk(blog)
    }

    pub async fn update(&self, pool: &sqlx::PgPool, id: i64) -> Result<Blog, anyhow::Error> {
        let sql_str = "UPDATE knowledgebank_blog SET url = $1, feed_url = $2, title = $3, description = $4, is_active = $5 WHERE id = $6 AND owner = $7 RETURNING *";
        let blog = sqlx::query_as::<_, Blog>(sql_str)
            .bind(&self.url)
            .bind(&self.feed_url)
            .bind(&self.title)
            .bind(&self.description)
            .bind(&self.is_active)
            .bind(id)
            .bind(&self.owner)
            .fetch_one(pool)
            .await?;

        AnyOk(blog)
    }

    pub async fn delete(pool: &sqlx::PgPool, id: i64, owner: &str) -> Result<Blog, anyhow::Error> {
        let sql_str = "DELETE FROM knowledgebank_blog WHERE id = $1 AND owner = $2 RETURNING *";
        let blog = sqlx::query_as::<_, Blog>(sql_str)
            .bind(id)
            .bind(owner)
            .fetch_one(pool)
            .await?;

        AnyOk(blog)
    }

    pub async fn get_by_id(
        pool: &sqlx::PgPool,
        id: i64,
        owner: &str,
    ) -> Result<Blog, anyhow::Error> {
        let sql_str = "SELECT * FROM knowledgebank_blog WHERE id = $1 AND owner = $2";
        let blog = sqlx::query_as::<_, Blog>(sql_str)
            .bind(id)
            .bind(owner)
            .fetch_one(pool)
            .await?;

        AnyOk(blog)
    }

    /// Active blogs ordered by the oldest check first, so one scan pass
    /// always prefers the blogs that have waited the longest.
    pub async fn get_active(pool: &sqlx::PgPool) -> Result<Vec<Blog>, anyhow::Error> {
        let sql_str = "SELECT * FROM knowledgebank_blog WHERE is_active ORDER BY last_checked_at ASC NULLS FIRST, id ASC";
        let blogs = sqlx::query_as::<_, Blog>(sql_str).fetch_all(pool).await?;

        AnyOk(blogs)
    }

    pub async fn update_last_checked(&self, pool: &sqlx::PgPool) -> Result<(), anyhow::Error> {
        let sql_str = "UPDATE knowledgebank_blog SET last_checked_at = now() WHERE id = $1";
        sqlx::query(sql_str).bind(self.id).execute(pool).await?;

        AnyOk(())
    }

    /// Persist an autodiscovered feed url, so the next scan skips discovery.
    pub async fn update_feed_url(
        &self,
        pool: &sqlx::PgPool,
        feed_url: &str,
    ) -> Result<(), anyhow::Error> {
        let sql_str = "UPDATE knowledgebank_blog SET feed_url = $1 WHERE id = $2";
        sqlx::query(sql_str)
            .bind(feed_url)
            .bind(self.id)
            .execute(pool)
            .await?;

        AnyOk(())
    }
}

impl CheckData for Blog {
    fn check_csv_is_valid(filepath: &PathBuf) -> Vec<Box<dyn Error>> {
        Self::check_csv_is_valid_default::<BlogRecord>(filepath)
    }

    fn unique_fields() -> Vec<String> {
        vec!["owner".to_string(), "url".to_string()]
    }

    fn fields() -> Vec<String> {
        vec![
            "owner".to_string(),
            "url".to_string(),
            "feed_url".to_string(),
            "title".to_string(),
            "description".to_string(),
        ]
    }
}

// The CSV row shape for importing blogs, without the database-managed fields.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BlogRecord {
    #[validate(length(
        max = "DEFAULT_MAX_LENGTH",
        min = "DEFAULT_MIN_LENGTH",
        message = "The length of owner must be between 1 and 64."
    ))]
    pub owner: String,

    #[validate(regex(
        path = "HTTP_URL_REGEX",
        message = "The url must be a http(s) url. Such as `https://blog.rust-lang.org`."
    ))]
    pub url: String,

    pub feed_url: Option<String>,

    #[validate(length(
        max = "TITLE_MAX_LENGTH",
        min = "DEFAULT_MIN_LENGTH",
        message = "The length of title must be between 1 and 255."
    ))]
    pub title: String,

    pub description: Option<String>,
}

/// A post discovered at a blog, either from its feed or from the HTML fallback.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Object, sqlx::FromRow, Validate)]
pub struct BlogPost {
    // Ignore this field when deserialize from json
    #[serde(skip_deserializing)]
    #[oai(read_only)]
    pub id: i64,

    pub blog_id: i64,

    #[validate(length(
        max = "POST_TITLE_MAX_LENGTH",
        min = "DEFAULT_MIN_LENGTH",
        message = "The length of title must be between 1 and 512."
    ))]
    pub title: String,

    #[validate(length(
        max = "LINK_MAX_LENGTH",
        min = "DEFAULT_MIN_LENGTH",
        message = "The length of link must be between 1 and 1024."
    ))]
    #[validate(regex(
        path = "HTTP_URL_REGEX",
        message = "The link must be a http(s) url."
    ))]
    pub link: String,

    #[oai(skip_serializing_if_is_none)]
    pub guid: Option<String>,

    #[oai(skip_serializing_if_is_none)]
    pub author: Option<String>,

    #[oai(skip_serializing_if_is_none)]
    pub summary: Option<String>,

    #[serde(with = "ts_seconds_option")]
    #[oai(skip_serializing_if_is_none)]
    pub published_at: Option<DateTime<Utc>>,

    #[serde(skip_deserializing)]
    #[serde(with = "ts_seconds")]
    #[oai(read_only)]
    pub discovered_at: DateTime<Utc>,

    #[oai(skip_serializing_if_is_none)]
    pub topic: Option<String>,

    #[serde(skip_deserializing)]
    #[oai(read_only)]
    pub fingerprint: String,
}

impl BlogPost {
    /// The diff key: SHA-256 over the post's stable identity. The guid wins
    /// when the feed provides one, the link otherwise.
    pub fn compute_fingerprint(guid: Option<&str>, link: &str) -> String {
        let identity = match guid {
            Some(guid) if !guid.is_empty() => guid,
            _ => link,
        };

        let mut hasher = Sha256::new();
        hasher.update(identity.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub async fn insert(&self, pool: &sqlx::PgPool) -> Result<BlogPost, anyhow::Error> {
        let sql_str = "INSERT INTO knowledgebank_blog_post (blog_id, title, link, guid, author, summary, published_at, topic, fingerprint) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING *";
        let fingerprint = if self.fingerprint.is_empty() {
            BlogPost::compute_fingerprint(self.guid.as_deref(), &self.link)
        } else {
            self.fingerprint.clone()
        };

        let post = sqlx::query_as::<_, BlogPost>(sql_str)
            .bind(&self.blog_id)
            .bind(&self.title)
            .bind(&self.link)
            .bind(&self.guid)
            .bind(&self.author)
            .bind(&self.summary)
            .bind(&self.published_at)
            .bind(&self.topic)
            .bind(&fingerprint)
            .fetch_one(pool)
            .await?;

        AnyOk(post)
    }

    pub async fn update_topic(
        &self,
        pool: &sqlx::PgPool,
        id: i64,
        owner: &str,
    ) -> Result<BlogPost, anyhow::Error> {
        let sql_str = "UPDATE knowledgebank_blog_post SET topic = $1 WHERE id = $2 AND blog_id IN (SELECT id FROM knowledgebank_blog WHERE owner = $3) RETURNING *";
        let post = sqlx::query_as::<_, BlogPost>(sql_str)
            .bind(&self.topic)
            .bind(id)
            .bind(owner)
            .fetch_one(pool)
            .await?;

        AnyOk(post)
    }

    pub async fn delete(
        pool: &sqlx::PgPool,
        id: i64,
        owner: &str,
    ) -> Result<BlogPost, anyhow::Error> {
        let sql_str = "DELETE FROM knowledgebank_blog_post WHERE id = $1 AND blog_id IN (SELECT id FROM knowledgebank_blog WHERE owner = $2) RETURNING *";
        let post = sqlx::query_as::<_, BlogPost>(sql_str)
            .bind(id)
            .bind(owner)
            .fetch_one(pool)
            .await?;

        AnyOk(post)
    }

    /// All fingerprints already recorded for a blog, the baseline the diff
    /// step compares candidates against.
    pub async fn get_fingerprints(
        pool: &sqlx::PgPool,
        blog_id: i64,
    ) -> Result<Vec<String>, anyhow::Error> {
        let sql_str = "SELECT fingerprint FROM knowledgebank_blog_post WHERE blog_id = $1";
        let rows = sqlx::query_as::<_, (String,)>(sql_str)
            .bind(blog_id)
            .fetch_all(pool)
            .await?;

        AnyOk(rows.into_iter().map(|r| r.0).collect())
    }

    /// Posts are owned through their blog, so the owner scope needs a join.
    pub async fn get_records_by_owner(
        pool: &sqlx::PgPool,
        owner: &str,
        query: &Option<ComposeQuery>,
        page: Option<u64>,
        page_size: Option<u64>,
        order_by: Option<&str>,
    ) -> Result<RecordResponse<BlogPost>, anyhow::Error> {
        let mut query_str = match query {
            Some(ComposeQuery::QueryItem(item)) => item.format(),
            Some(ComposeQuery::ComposeQueryItem(item)) => item.format(),
            None => "".to_string(),
        };

        if query_str.is_empty() {
            query_str = "1=1".to_string();
        };

        let where_str = format!(
            "blog_id IN (SELECT id FROM knowledgebank_blog WHERE owner = '{}') AND ({})",
            owner, query_str
        );

        let order_by_str = if order_by.is_none() {
            "ORDER BY published_at DESC NULLS LAST".to_string()
        } else {
            format!("ORDER BY {}", order_by.unwrap())
        };

        let page = match page {
            Some(page) => page,
            None => 1,
        };

        let page_size = match page_size {
            Some(page_size) => page_size,
            None => 10,
        };

        let limit = page_size;
        let offset = (page - 1) * page_size;

        let sql_str = format!(
            "SELECT * FROM knowledgebank_blog_post WHERE {} {} LIMIT {} OFFSET {}",
            where_str, order_by_str, limit, offset
        );

        let records = sqlx::query_as::<_, BlogPost>(sql_str.as_str())
            .fetch_all(pool)
            .await?;

        let sql_str = format!(
            "SELECT COUNT(*) FROM knowledgebank_blog_post WHERE {}",
            where_str
        );

        let total = sqlx::query_as::<_, (i64,)>(sql_str.as_str())
            .fetch_one(pool)
            .await?;

        AnyOk(RecordResponse {
            records: records,
            total: total.0 as u64,
            page: page,
            page_size: page_size,
        })
    }
}

/// A user-defined topic with keyword hints for the classifier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Object, sqlx::FromRow, Validate)]
pub struct UserTopic {
    // Ignore this field when deserialize from json
    #[serde(skip_deserializing)]
    #[oai(read_only)]
    pub id: i64,

    #[serde(skip_deserializing)]
    #[oai(read_only)]
    pub owner: String,

    #[validate(length(
        max = "DEFAULT_MAX_LENGTH",
        min = "DEFAULT_MIN_LENGTH",
        message = "The length of name must be between 1 and 64."
    ))]
    pub name: String,

    /// Comma-separated keywords, matched case-insensitively against posts.
    #[oai(skip_serializing_if_is_none)]
    pub keywords: Option<String>,

    #[validate(regex(
        path = "HEX_COLOR_REGEX",
        message = "The color must be a hex color. Such as `#a6cee3`."
    ))]
    #[oai(skip_serializing_if_is_none)]
    pub color: Option<String>,

    #[serde(skip_deserializing)]
    #[serde(with = "ts_seconds")]
    #[oai(read_only)]
    pub created_at: DateTime<Utc>,
}

impl UserTopic {
    pub fn update_owner(&mut self, owner: String) -> &Self {
        self.owner = owner;
        return self;
    }

    /// Split the keyword list into lowercased, trimmed terms.
    pub fn keyword_list(&self) -> Vec<String> {
        match &self.keywords {
            Some(keywords) => keywords
                .split(',')
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
            None => vec![],
        }
    }

    pub async fn insert(&self, pool: &sqlx::PgPool) -> Result<UserTopic, anyhow::Error> {
        let color = match &self.color {
            Some(color) => color.clone(),
            None => match_color(&self.name),
        };

        let sql_str = "INSERT INTO knowledgebank_user_topic (owner, name, keywords, color) VALUES ($1, $2, $3, $4) RETURNING *";
        let topic = sqlx::query_as::<_, UserTopic>(sql_str)
            .bind(&self.owner)
            .bind(&self.name)
            .bind(&self.keywords)
            .bind(&color)
            .fetch_one(pool)
            .await?;

        AnyOk(topic)
    }

    pub async fn update(&self, pool: &sqlx::PgPool, id: i64) -> Result<UserTopic, anyhow::Error> {
        let sql_str = "UPDATE knowledgebank_user_topic SET name = $1, keywords = $2, color = $3 WHERE id = $4 AND owner = $5 RETURNING *";
        let topic = sqlx::query_as::<_, UserTopic>(sql_str)
            .bind(&self.name)
            .bind(&self.keywords)
            .bind(&self.color)
            .bind(id)
            .bind(&self.owner)
            .fetch_one(pool)
            .await?;

        AnyOk(topic)
    }

    pub async fn delete(
        pool: &sqlx::PgPool,
        id: i64,
        owner: &str,
    ) -> Result<UserTopic, anyhow::Error> {
        let sql_str = "DELETE FROM knowledgebank_user_topic WHERE id = $1 AND owner = $2 RETURNING *";
        let topic = sqlx::query_as::<_, UserTopic>(sql_str)
            .bind(id)
            .bind(owner)
            .fetch_one(pool)
            .await?;

        AnyOk(topic)
    }

    /// Topics in creation order, the order the classifier checks them in.
    pub async fn get_by_owner(
        pool: &sqlx::PgPool,
        owner: &str,
    ) -> Result<Vec<UserTopic>, anyhow::Error> {
        let sql_str =
            "SELECT * FROM knowledgebank_user_topic WHERE owner = $1 ORDER BY created_at ASC";
        let topics = sqlx::query_as::<_, UserTopic>(sql_str)
            .bind(owner)
            .fetch_all(pool)
            .await?;

        AnyOk(topics)
    }
}

impl CheckData for UserTopic {
    fn check_csv_is_valid(filepath: &PathBuf) -> Vec<Box<dyn Error>> {
        Self::check_csv_is_valid_default::<UserTopicRecord>(filepath)
    }

    fn unique_fields() -> Vec<String> {
        vec!["owner".to_string(), "name".to_string()]
    }

    fn fields() -> Vec<String> {
        vec![
            "owner".to_string(),
            "name".to_string(),
            "keywords".to_string(),
            "color".to_string(),
        ]
    }
}

// The CSV row shape for importing topics.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UserTopicRecord {
    #[validate(length(
        max = "DEFAULT_MAX_LENGTH",
        min = "DEFAULT_MIN_LENGTH",
        message = "The length of owner must be between 1 and 64."
    ))]
    pub owner: String,

    #[validate(length(
        max = "DEFAULT_MAX_LENGTH",
        min = "DEFAULT_MIN_LENGTH",
        message = "The length of name must be between 1 and 64."
    ))]
    pub name: String,

    pub keywords: Option<String>,

    pub color: Option<String>,
}

/// A curated post saved into a topic's knowledge bank.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Object, sqlx::FromRow, Validate)]
pub struct KnowledgeBankPost {
    // Ignore this field when deserialize from json
    #[serde(skip_deserializing)]
    #[oai(read_only)]
    pub id: i64,

    #[serde(skip_deserializing)]
    #[oai(read_only)]
    pub owner: String,

    pub topic_id: i64,

    pub post_id: i64,

    #[oai(skip_serializing_if_is_none)]
    pub annotation: Option<String>,

    #[serde(skip_deserializing)]
    #[serde(with = "ts_seconds")]
    #[oai(read_only)]
    pub saved_at: DateTime<Utc>,
}

impl KnowledgeBankPost {
    pub fn update_owner(&mut self, owner: String) -> &Self {
        self.owner = owner;
        return self;
    }

    pub async fn insert(&self, pool: &sqlx::PgPool) -> Result<KnowledgeBankPost, anyhow::Error> {
        let sql_str = "INSERT INTO knowledgebank_knowledge_bank_post (owner, topic_id, post_id, annotation) VALUES ($1, $2, $3, $4) RETURNING *";
        let entry = sqlx::query_as::<_, KnowledgeBankPost>(sql_str)
            .bind(&self.owner)
            .bind(&self.topic_id)
            .bind(&self.post_id)
            .bind(&self.annotation)
            .fetch_one(pool)
            .await?;

        AnyOk(entry)
    }

    pub async fn update(
        &self,
        pool: &sqlx::PgPool,
        id: i64,
    ) -> Result<KnowledgeBankPost, anyhow::Error> {
        let sql_str = "UPDATE knowledgebank_knowledge_bank_post SET topic_id = $1, annotation = $2 WHERE id = $3 AND owner = $4 RETURNING *";
        let entry = sqlx::query_as::<_, KnowledgeBankPost>(sql_str)
            .bind(&self.topic_id)
            .bind(&self.annotation)
            .bind(id)
            .bind(&self.owner)
            .fetch_one(pool)
            .await?;

        AnyOk(entry)
    }

    pub async fn delete(
        pool: &sqlx::PgPool,
        id: i64,
        owner: &str,
    ) -> Result<KnowledgeBankPost, anyhow::Error> {
        let sql_str =
            "DELETE FROM knowledgebank_knowledge_bank_post WHERE id = $1 AND owner = $2 RETURNING *";
        let entry = sqlx::query_as::<_, KnowledgeBankPost>(sql_str)
            .bind(id)
            .bind(owner)
            .fetch_one(pool)
            .await?;

        AnyOk(entry)
    }
}

/// A notes document, optionally tied to a topic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Object, sqlx::FromRow, Validate)]
pub struct Note {
    // Ignore this field when deserialize from json
    #[serde(skip_deserializing)]
    #[oai(read_only)]
    pub id: i64,

    #[serde(skip_deserializing)]
    #[oai(read_only)]
    pub owner: String,

    #[oai(skip_serializing_if_is_none)]
    pub topic_id: Option<i64>,

    #[validate(length(
        max = "TITLE_MAX_LENGTH",
        min = "DEFAULT_MIN_LENGTH",
        message = "The length of title must be between 1 and 255."
    ))]
    pub title: String,

    #[serde(skip_deserializing)]
    #[serde(with = "ts_seconds")]
    #[oai(read_only)]
    pub created_at: DateTime<Utc>,

    #[serde(skip_deserializing)]
    #[serde(with = "ts_seconds")]
    #[oai(read_only)]
    pub updated_at: DateTime<Utc>,
}

impl Note {
    pub fn update_owner(&mut self, owner: String) -> &Self {
        self.owner = owner;
        return self;
    }

    pub async fn insert(&self, pool: &sqlx::PgPool) -> Result<Note, anyhow::Error> {
        let sql_str = "INSERT INTO knowledgebank_note (owner, topic_id, title) VALUES ($1, $2, $3) RETURNING *";
        let note = sqlx::query_as::<_, Note>(sql_str)
            .bind(&self.owner)
            .bind(&self.topic_id)
            .bind(&self.title)
            .fetch_one(pool)
            .await?;

        AnyOk(note)
    }

    pub async fn update(&self, pool: &sqlx::PgPool, id: i64) -> Result<Note, anyhow::Error> {
        let sql_str = "UPDATE knowledgebank_note SET topic_id = $1, title = $2, updated_at = now() WHERE id = $3 AND owner = $4 RETURNING *";
        let note = sqlx::query_as::<_, Note>(sql_str)
            .bind(&self.topic_id)
            .bind(&self.title)
            .bind(id)
            .bind(&self.owner)
            .fetch_one(pool)
            .await?;

        AnyOk(note)
    }

    pub async fn delete(pool: &sqlx::PgPool, id: i64, owner: &str) -> Result<Note, anyhow::Error> {
        let sql_str = "DELETE FROM knowledgebank_note WHERE id = $1 AND owner = $2 RETURNING *";
        let note = sqlx::query_as::<_, Note>(sql_str)
            .bind(id)
            .bind(owner)
            .fetch_one(pool)
            .await?;

        AnyOk(note)
    }
}

/// An ordered page within a note.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Object, sqlx::FromRow, Validate)]
pub struct NotePage {
    // Ignore this field when deserialize from json
    #[serde(skip_deserializing)]
    #[oai(read_only)]
    pub id: i64,

    pub note_id: i64,

    #[validate(length(
        max = "TITLE_MAX_LENGTH",
        min = "DEFAULT_MIN_LENGTH",
        message = "The length of title must be between 1 and 255."
    ))]
    pub title: String,

    pub page_order: i32,

    #[serde(skip_deserializing)]
    #[serde(with = "ts_seconds")]
    #[oai(read_only)]
    pub created_at: DateTime<Utc>,

    #[serde(skip_deserializing)]
    #[serde(with = "ts_seconds")]
    #[oai(read_only)]
    pub updated_at: DateTime<Utc>,
}

impl NotePage {
    pub async fn insert(
        &self,
        pool: &sqlx::PgPool,
        owner: &str,
    ) -> Result<NotePage, anyhow::Error> {
        // The page belongs to the owner through its note, reject foreign note ids.
        let sql_str = "INSERT INTO knowledgebank_note_page (note_id, title, page_order) SELECT $1, $2, $3 WHERE EXISTS (SELECT 1 FROM knowledgebank_note WHERE id = $1 AND owner = $4) RETURNING *";
        let page = sqlx::query_as::<_, NotePage>(sql_str)
            .bind(&self.note_id)
            .bind(&self.title)
            .bind(&self.page_order)
            .bind(owner)
            .fetch_one(pool)
            .await?;

        AnyOk(page)
    }

    pub async fn update(
        &self,
        pool: &sqlx::PgPool,
        id: i64,
        owner: &str,
    ) -> Result<NotePage, anyhow::Error> {
        let sql_str = "UPDATE knowledgebank_note_page SET title = $1, page_order = $2, updated_at = now() WHERE id = $3 AND note_id IN (SELECT id FROM knowledgebank_note WHERE owner = $4) RETURNING *";
        let page = sqlx::query_as::<_, NotePage>(sql_str)
            .bind(&self.title)
            .bind(&self.page_order)
            .bind(id)
            .bind(owner)
            .fetch_one(pool)
            .await?;

        AnyOk(page)
    }

    pub async fn delete(
        pool: &sqlx::PgPool,
        id: i64,
        owner: &str,
    ) -> Result<NotePage, anyhow::Error> {
        let sql_str = "DELETE FROM knowledgebank_note_page WHERE id = $1 AND note_id IN (SELECT id FROM knowledgebank_note WHERE owner = $2) RETURNING *";
        let page = sqlx::query_as::<_, NotePage>(sql_str)
            .bind(id)
            .bind(owner)
            .fetch_one(pool)
            .await?;

        AnyOk(page)
    }

    pub async fn get_records_by_owner(
        pool: &sqlx::PgPool,
        owner: &str,
        query: &Option<ComposeQuery>,
        page: Option<u64>,
        page_size: Option<u64>,
    ) -> Result<RecordResponse<NotePage>, anyhow::Error> {
        let mut query_str = match query {
            Some(ComposeQuery::QueryItem(item)) => item.format(),
            Some(ComposeQuery::ComposeQueryItem(item)) => item.format(),
            None => "".to_string(),
        };

        if query_str.is_empty() {
            query_str = "1=1".to_string();
        };

        let where_str = format!(
            "note_id IN (SELECT id FROM knowledgebank_note WHERE owner = '{}') AND ({})",
            owner, query_str
        );

        let page = page.unwrap_or(1);
        let page_size = page_size.unwrap_or(10);
        let offset = (page - 1) * page_size;

        let sql_str = format!(
            "SELECT * FROM knowledgebank_note_page WHERE {} ORDER BY page_order ASC LIMIT {} OFFSET {}",
            where_str, page_size, offset
        );

        let records = sqlx::query_as::<_, NotePage>(sql_str.as_str())
            .fetch_all(pool)
            .await?;

        let sql_str = format!(
            "SELECT COUNT(*) FROM knowledgebank_note_page WHERE {}",
            where_str
        );

        let total = sqlx::query_as::<_, (i64,)>(sql_str.as_str())
            .fetch_one(pool)
            .await?;

        AnyOk(RecordResponse {
            records: records,
            total: total.0 as u64,
            page: page,
            page_size: page_size,
        })
    }
}

/// An ordered free-form text box within a note page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Object, sqlx::FromRow, Validate)]
pub struct NoteBox {
    // Ignore this field when deserialize from json
    #[serde(skip_deserializing)]
    #[oai(read_only)]
    pub id: i64,

    pub page_id: i64,

    pub content: String,

    pub box_order: i32,

    #[serde(skip_deserializing)]
    #[serde(with = "ts_seconds")]
    #[oai(read_only)]
    pub created_at: DateTime<Utc>,

    #[serde(skip_deserializing)]
    #[serde(with = "ts_seconds")]
    #[oai(read_only)]
    pub updated_at: DateTime<Utc>,
}

impl NoteBox {
    pub async fn insert(&self, pool: &sqlx::PgPool, owner: &str) -> Result<NoteBox, anyhow::Error> {
        let sql_str = "INSERT INTO knowledgebank_note_box (page_id, content, box_order) SELECT $1, $2, $3 WHERE EXISTS (SELECT 1 FROM knowledgebank_note_page p JOIN knowledgebank_note n ON p.note_id = n.id WHERE p.id = $1 AND n.owner = $4) RETURNING *";
        let nbox = sqlx::query_as::<_, NoteBox>(sql_str)
            .bind(&self.page_id)
            .bind(&self.content)
            .bind(&self.box_order)
            .bind(owner)
            .fetch_one(pool)
            .await?;

        AnyOk(nbox)
    }

    pub async fn update(
        &self,
        pool: &sqlx::PgPool,
        id: i64,
        owner: &str,
    ) -> Result<NoteBox, anyhow::Error> {
        let sql_str = "UPDATE knowledgebank_note_box SET content = $1, box_order = $2, updated_at = now() WHERE id = $3 AND page_id IN (SELECT p.id FROM knowledgebank_note_page p JOIN knowledgebank_note n ON p.note_id = n.id WHERE n.owner = $4) RETURNING *";
        let nbox = sqlx::query_as::<_, NoteBox>(sql_str)
            .bind(&self.content)
            .bind(&self.box_order)
            .bind(id)
            .bind(owner)
            .fetch_one(pool)
            .await?;

        AnyOk(nbox)
    }

    pub async fn delete(
        pool: &sqlx::PgPool,
        id: i64,
        owner: &str,
    ) -> Result<NoteBox, anyhow::Error> {
        let sql_str = "DELETE FROM knowledgebank_note_box WHERE id = $1 AND page_id IN (SELECT p.id FROM knowledgebank_note_page p JOIN knowledgebank_note n ON p.note_id = n.id WHERE n.owner = $2) RETURNING *";
        let nbox = sqlx::query_as::<_, NoteBox>(sql_str)
            .bind(id)
            .bind(owner)
            .fetch_one(pool)
            .await?;

        AnyOk(nbox)
    }

    pub async fn get_records_by_owner(
        pool: &sqlx::PgPool,
        owner: &str,
        query: &Option<ComposeQuery>,
        page: Option<u64>,
        page_size: Option<u64>,
    ) -> Result<RecordResponse<NoteBox>, anyhow::Error> {
        let mut query_str = match query {
            Some(ComposeQuery::QueryItem(item)) => item.format(),
            Some(ComposeQuery::ComposeQueryItem(item)) => item.format(),
            None => "".to_string(),
        };

        if query_str.is_empty() {
            query_str = "1=1".to_string();
        };

        let where_str = format!(
            "page_id IN (SELECT p.id FROM knowledgebank_note_page p JOIN knowledgebank_note n ON p.note_id = n.id WHERE n.owner = '{}') AND ({})",
            owner, query_str
        );

        let page = page.unwrap_or(1);
        let page_size = page_size.unwrap_or(10);
        let offset = (page - 1) * page_size;

        let sql_str = format!(
            "SELECT * FROM knowledgebank_note_box WHERE {} ORDER BY box_order ASC LIMIT {} OFFSET {}",
            where_str, page_size, offset
        );

        let records = sqlx::query_as::<_, NoteBox>(sql_str.as_str())
            .fetch_all(pool)
            .await?;

        let sql_str = format!(
            "SELECT COUNT(*) FROM knowledgebank_note_box WHERE {}",
            where_str
        );

        let total = sqlx::query_as::<_, (i64,)>(sql_str.as_str())
            .fetch_one(pool)
            .await?;

        AnyOk(RecordResponse {
            records: records,
            total: total.0 as u64,
            page: page,
            page_size: page_size,
        })
    }
}

/// Per-owner record counts for the dashboard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Object)]
pub struct Statistics {
    pub blog_count: i64,
    pub post_count: i64,
    pub topic_count: i64,
    pub knowledge_bank_count: i64,
    pub note_count: i64,
}

impl Statistics {
    pub async fn get_statistics(
        pool: &sqlx::PgPool,
        owner: &str,
    ) -> Result<Statistics, anyhow::Error> {
        let blog_count = sqlx::query_as::<_, (i64,)>(
            "SELECT COUNT(*) FROM knowledgebank_blog WHERE owner = $1",
        )
        .bind(owner)
        .fetch_one(pool)
        .await?;

        let post_count = sqlx::query_as::<_, (i64,)>(
            "SELECT COUNT(*) FROM knowledgebank_blog_post WHERE blog_id IN (SELECT id FROM knowledgebank_blog WHERE owner = $1)",
        )
        .bind(owner)
        .fetch_one(pool)
        .await?;

        let topic_count = sqlx::query_as::<_, (i64,)>(
            "SELECT COUNT(*) FROM knowledgebank_user_topic WHERE owner = $1",
        )
        .bind(owner)
        .fetch_one(pool)
        .await?;

        let knowledge_bank_count = sqlx::query_as::<_, (i64,)>(
            "SELECT COUNT(*) FROM knowledgebank_knowledge_bank_post WHERE owner = $1",
        )
        .bind(owner)
        .fetch_one(pool)
        .await?;

        let note_count = sqlx::query_as::<_, (i64,)>(
            "SELECT COUNT(*) FROM knowledgebank_note WHERE owner = $1",
        )
        .bind(owner)
        .fetch_one(pool)
        .await?;

        AnyOk(Statistics {
            blog_count: blog_count.0,
            post_count: post_count.0,
            topic_count: topic_count.0,
            knowledge_bank_count: knowledge_bank_count.0,
            note_count: note_count.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_compute_fingerprint() {
        let by_guid = BlogPost::compute_fingerprint(
            Some("urn:uuid:1234"),
            "https://blog.example.com/post-1",
        );
        let by_link = BlogPost::compute_fingerprint(None, "https://blog.example.com/post-1");
        assert_ne!(by_guid, by_link);
        assert!(FINGERPRINT_REGEX.is_match(&by_guid));

        // An empty guid falls back to the link.
        let by_empty_guid =
            BlogPost::compute_fingerprint(Some(""), "https://blog.example.com/post-1");
        assert_eq!(by_empty_guid, by_link);

        // Stable across calls.
        assert_eq!(
            by_link,
            BlogPost::compute_fingerprint(None, "https://blog.example.com/post-1")
        );
    }

    #[test]
    fn test_keyword_list() {
        let topic = UserTopic {
            id: 1,
            owner: "admin".to_string(),
            name: "Rust".to_string(),
            keywords: Some("rust, Cargo ,borrow checker,,".to_string()),
            color: None,
            created_at: Utc::now(),
        };
        assert_eq!(
            topic.keyword_list(),
            vec!["rust", "cargo", "borrow checker"]
        );

        let empty = UserTopic {
            keywords: None,
            ..topic
        };
        assert!(empty.keyword_list().is_empty());
    }

    #[test]
    fn test_check_csv_is_valid() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "owner,url,feed_url,title,description").unwrap();
        writeln!(
            file,
            "admin,https://blog.rust-lang.org,,Rust Blog,Official Rust blog"
        )
        .unwrap();
        writeln!(file, "admin,not-a-url,,Broken,").unwrap();

        let errors = Blog::check_csv_is_valid(&file.path().to_path_buf());
        // Only the second row violates the url pattern.
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("line: 3"));
    }

    #[test]
    fn test_get_column_names() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "owner,name,keywords,extra_column").unwrap();
        writeln!(file, "admin,Rust,rust,ignored").unwrap();

        let columns = UserTopic::get_column_names(&file.path().to_path_buf()).unwrap();
        assert_eq!(columns, vec!["owner", "name", "keywords"]);
    }
}
