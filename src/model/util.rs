//! Utility functions for the model module. Contains functions to import data from CSV files into the database and shared validation helpers.

use log::{debug, error, info, warn};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::{error::Error, path::PathBuf};

/// A color map for the topic labels.
/// More details on https://colorbrewer2.org/#type=qualitative&scheme=Paired&n=12
/// Don't change the order of the colors. It is important to keep the colors consistent.
const TOPIC_COLORS: [&str; 12] = [
    "#ffff99", "#6a3d9a", "#ff7f00", "#b2df8a", "#a6cee3", "#e31a1c", "#fdbf6f", "#fb9a99",
    "#cab2d6", "#33a02c", "#b15928", "#1f78b4",
];

/// Match a color to a topic name in a deterministic way, used when the user
/// doesn't pick one. Different names may still collide on the same color.
pub fn match_color(topic_name: &str) -> String {
    let mut hasher = DefaultHasher::new();
    topic_name.hash(&mut hasher);
    let hash = hasher.finish();
    let index = hash % TOPIC_COLORS.len() as u64;
    TOPIC_COLORS[index as usize].to_string()
}

#[derive(Debug)]
pub struct ValidationError {
    details: String,
    data: Vec<String>,
}

impl ValidationError {
    pub fn new(msg: &str, data: Vec<String>) -> ValidationError {
        ValidationError {
            details: msg.to_string(),
            data,
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.details)
    }
}

impl Error for ValidationError {
    fn description(&self) -> &str {
        &self.details
    }

    fn cause(&self) -> Option<&dyn Error> {
        // Generic error, underlying cause isn't tracked.
        None
    }
}

pub fn get_delimiter(filepath: &PathBuf) -> Result<u8, Box<dyn Error>> {
    let suffix = match filepath.extension() {
        Some(suffix) => suffix.to_str().unwrap(),
        None => return Err("File has no extension".into()),
    };

    if suffix == "csv" {
        Ok(b',')
    } else if suffix == "tsv" {
        Ok(b'\t')
    } else if suffix == "txt" {
        Ok(b' ')
    } else {
        Err(format!("Unsupported file type: {}", suffix).into())
    }
}

pub async fn drop_table(pool: &sqlx::PgPool, table: &str) {
    debug!("Dropping table {}...", table);
    sqlx::query(&format!(
        "
        DO $$ BEGIN
        IF EXISTS (SELECT FROM information_schema.tables
                    WHERE  table_schema = 'public'
                    AND    table_name   = '{}')
        THEN
            DELETE FROM {};
        END IF;
        END $$;
        ",
        table, table
    ))
    .execute(pool)
    .await
    .unwrap();
}

pub async fn drop_records(pool: &sqlx::PgPool, table: &str, colname: &str, colvalue: &str) {
    debug!("Dropping records from table {}...", table);
    sqlx::query(&format!(
        "
        DELETE FROM {} WHERE {} = '{}';
        ",
        table, colname, colvalue
    ))
    .execute(pool)
    .await
    .unwrap();
}

/// Import a CSV file into a table through a staging table, skipping rows that
/// collide with existing records on the unique columns.
pub async fn import_file_in_loop(
    pool: &sqlx::PgPool,
    filepath: &PathBuf,
    table_name: &str,
    expected_columns: &Vec<String>,
    unique_columns: &Vec<String>,
    delimiter: u8,
) -> Result<(), Box<dyn Error>> {
    match sqlx::query("DROP TABLE IF EXISTS staging")
        .execute(pool)
        .await
    {
        Ok(_) => {}
        Err(_) => {}
    }

    let mut tx = pool.begin().await?;
    sqlx::query(&format!(
        "CREATE TEMPORARY TABLE staging (LIKE {} INCLUDING DEFAULTS)",
        table_name
    ))
    .execute(&mut tx)
    .await?;

    let columns = expected_columns.join(",");
    let query_str = format!(
        "COPY staging ({}) FROM '{}' DELIMITER E'{}' CSV HEADER",
        columns,
        filepath.display(),
        delimiter as char
    );

    debug!("Importing query string: {}", query_str);

    sqlx::query(&query_str).execute(&mut tx).await?;

    let where_clause = unique_columns
        .iter()
        .map(|c| format!("{}.{} = staging.{}", table_name, c, c))
        .collect::<Vec<String>>()
        .join(" AND ");

    sqlx::query(&format!(
        "INSERT INTO {} ({})
         SELECT {} FROM staging
         WHERE NOT EXISTS (SELECT 1 FROM {} WHERE {})
         ON CONFLICT DO NOTHING",
        table_name, columns, columns, table_name, where_clause
    ))
    .execute(&mut tx)
    .await?;

    tx.commit().await?;

    match sqlx::query("DROP TABLE IF EXISTS staging")
        .execute(pool)
        .await
    {
        Ok(_) => {}
        Err(_) => {}
    };

    Ok(())
}

pub fn parse_csv_error(e: &csv::Error) -> String {
    match *e.kind() {
        csv::ErrorKind::Deserialize {
            pos: Some(ref pos),
            ref err,
            ..
        } => {
            format!(
                "Failed to deserialize the data, line: {}, column: {}, details: ({})",
                pos.line(),
                pos.record() + 1,
                err.kind()
            )
        }
        _ => {
            format!("Failed to parse CSV: ({})", e)
        }
    }
}

pub fn show_errors(errors: &Vec<Box<dyn std::error::Error>>, show_all_errors: bool) {
    if !show_all_errors {
        let total = errors.len();
        let num = if total > 3 { 3 } else { total };
        warn!("Found {} errors, only show the {} validation errors, if you want to see all errors, use --show-all-errors.", total, num);
        for e in errors.iter().take(3) {
            error!("{}", e);
        }

        if total == num {
            return;
        } else {
            warn!("Hide {} validation errors.", errors.len() - num);
        }
    } else {
        for e in errors {
            error!("{}", e);
        }
    }
}

/// Delete posts that were never curated and are older than the given number
/// of days. Keeps the blog_post table from growing without bound.
pub async fn cleanup_stale_posts(pool: &sqlx::PgPool, days: i64) -> Result<u64, Box<dyn Error>> {
    let query_str = format!(
        "
        DELETE FROM knowledgebank_blog_post
        WHERE discovered_at < now() - INTERVAL '{} days'
          AND id NOT IN (SELECT post_id FROM knowledgebank_knowledge_bank_post)
        ",
        days
    );

    let result = sqlx::query(&query_str).execute(pool).await?;
    info!("Deleted {} stale posts.", result.rows_affected());

    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_color() {
        let c1 = match_color("rust");
        let c2 = match_color("rust");
        assert_eq!(c1, c2);
        assert!(TOPIC_COLORS.contains(&c1.as_str()));
    }

    #[test]
    fn test_get_delimiter() {
        assert_eq!(get_delimiter(&PathBuf::from("blogs.csv")).unwrap(), b',');
        assert_eq!(get_delimiter(&PathBuf::from("blogs.tsv")).unwrap(), b'\t');
        assert!(get_delimiter(&PathBuf::from("blogs.json")).is_err());
        assert!(get_delimiter(&PathBuf::from("blogs")).is_err());
    }
}
