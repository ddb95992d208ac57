//! Quote store.
//!
//! Quotes are written by an administrator only; visitors touch the table through view
//! increments. Every write goes through the same checks:
//!
//! - text is unique (checked up front, then again by the `unique_quote_text` constraint)
//! - no more than [`MAX_QUOTES_PER_SOURCE`] quotes share a source
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use time::OffsetDateTime;

use crate::{
    constants::MAX_QUOTES_PER_SOURCE,
    error::AppError,
    models::quotes::{NewQuote, Quote, QuoteStats, QuoteUpdate, QuoteWeight},
};

/// Quote columns plus live like/dislike counts, aliased `q`.
pub(crate) const STATS_SELECT: &str = r#"
    SELECT
        q.id,
        q.text,
        q.source,
        q.weight,
        q.views,
        (
            SELECT COUNT(*) FROM quote_reactions r
            WHERE r.quote_id = q.id AND r.kind = 'like'
        ) AS likes,
        (
            SELECT COUNT(*) FROM quote_reactions r
            WHERE r.quote_id = q.id AND r.kind = 'dislike'
        ) AS dislikes,
        q.created_at
    FROM quotes q
"#;

const QUOTE_COLUMNS: &str = "id, text, source, weight, views, created_at, updated_at";

#[tracing::instrument(skip(db))]
pub async fn create_quote(db: &SqlitePool, quote: NewQuote) -> Result<Quote, AppError> {
    let quote = quote.validate()?;

    let mut tx = begin_immediate(db).await?;
    check_store_rules(&mut tx, &quote, None).await?;

    let now = OffsetDateTime::now_utc();
    let created = sqlx::query_as::<_, Quote>(&format!(
        r#"
            INSERT INTO
                quotes (text, source, weight, views, created_at, updated_at)
            VALUES
                ($1, $2, $3, 0, $4, $5)
            RETURNING {QUOTE_COLUMNS};
        "#
    ))
    .bind(&quote.text)
    .bind(&quote.source)
    .bind(quote.weight)
    .bind(now)
    .bind(now)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| map_unique_violation(e, &quote))
    .inspect_err(|e| tracing::error!(err = ?e, "an error occurred when adding quote"))?;

    tx.commit().await?;

    tracing::info!(id = created.id, source = %created.source, "added quote");

    Ok(created)
}

#[tracing::instrument(skip(db))]
pub async fn update_quote(
    db: &SqlitePool,
    id: i64,
    update: QuoteUpdate,
) -> Result<Quote, AppError> {
    let mut tx = begin_immediate(db).await?;

    let existing = fetch_quote(&mut tx, id).await?.ok_or(AppError::NotFound)?;
    let quote = update.apply_to(&existing)?;
    check_store_rules(&mut tx, &quote, Some(id)).await?;

    let updated = sqlx::query_as::<_, Quote>(&format!(
        r#"
            UPDATE quotes
            SET
                text = $1,
                source = $2,
                weight = $3,
                updated_at = $4
            WHERE id = $5
            RETURNING {QUOTE_COLUMNS};
        "#
    ))
    .bind(&quote.text)
    .bind(&quote.source)
    .bind(quote.weight)
    .bind(OffsetDateTime::now_utc())
    .bind(id)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| map_unique_violation(e, &quote))
    .inspect_err(|e| tracing::error!(err = ?e, id, "an error occurred when updating quote"))?;

    tx.commit().await?;

    Ok(updated)
}

/// Deletes a quote; its reactions go with it.
#[tracing::instrument(skip(db))]
pub async fn delete_quote(db: &SqlitePool, id: i64) -> Result<(), AppError> {
    let result = sqlx::query(
        r#"
            DELETE FROM quotes
            WHERE id = $1;
        "#,
    )
    .bind(id)
    .execute(db)
    .await
    .inspect_err(|e| tracing::error!(err = ?e, id, "an error occurred when deleting quote"))?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    Ok(())
}

pub async fn get_quote(db: &SqlitePool, id: i64) -> Result<Option<Quote>, AppError> {
    let mut conn = db.acquire().await?;

    fetch_quote(&mut conn, id).await
}

pub async fn get_quote_stats<'e, E>(executor: E, id: i64) -> Result<Option<QuoteStats>, AppError>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let stats = sqlx::query_as::<_, QuoteStats>(&format!("{STATS_SELECT} WHERE q.id = $1;"))
        .bind(id)
        .fetch_optional(executor)
        .await
        .inspect_err(|e| tracing::error!(err = ?e, id, "an error occurred when fetching quote"))?;

    Ok(stats)
}

/// Every quote with its counts, in storage order.
pub async fn list_quotes(db: &SqlitePool) -> Result<Vec<QuoteStats>, AppError> {
    let quotes = sqlx::query_as::<_, QuoteStats>(&format!("{STATS_SELECT} ORDER BY q.id;"))
        .fetch_all(db)
        .await
        .inspect_err(
            |e| tracing::error!(err = ?e, "an error occurred when fetching quotes from database"),
        )?;

    Ok(quotes)
}

/// Case-insensitive substring search over text and source.
#[tracing::instrument(skip(db))]
pub async fn search_quotes(db: &SqlitePool, term: &str) -> Result<Vec<QuoteStats>, AppError> {
    let pattern = format!("%{}%", escape_like(term.trim()));

    let quotes = sqlx::query_as::<_, QuoteStats>(&format!(
        r#"
            {STATS_SELECT}
            WHERE
                q.text LIKE $1 ESCAPE '\' OR q.source LIKE $2 ESCAPE '\'
            ORDER BY q.id;
        "#
    ))
    .bind(&pattern)
    .bind(&pattern)
    .fetch_all(db)
    .await
    .inspect_err(|e| tracing::error!(err = ?e, "an error occurred when searching quotes"))?;

    Ok(quotes)
}

pub async fn list_weights(db: &SqlitePool) -> Result<Vec<QuoteWeight>, AppError> {
    let weights = sqlx::query_as::<_, QuoteWeight>(
        r#"
            SELECT id, weight
            FROM quotes
            ORDER BY id;
        "#,
    )
    .fetch_all(db)
    .await
    .inspect_err(|e| tracing::error!(err = ?e, "an error occurred when fetching quote weights"))?;

    Ok(weights)
}

/// Single-statement increment; returns `false` when the quote no longer exists.
pub async fn increment_views(db: &SqlitePool, id: i64) -> Result<bool, AppError> {
    let result = sqlx::query(
        r#"
            UPDATE quotes
            SET views = views + 1
            WHERE id = $1;
        "#,
    )
    .bind(id)
    .execute(db)
    .await
    .inspect_err(|e| tracing::error!(err = ?e, id, "an error occurred when counting a view"))?;

    Ok(result.rows_affected() == 1)
}

pub async fn count_quotes(db: &SqlitePool) -> Result<i64, AppError> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM quotes;")
        .fetch_one(db)
        .await?;

    Ok(count)
}

/// Starts a transaction holding the write lock, so concurrent writers queue on the busy timeout.
pub(crate) async fn begin_immediate(db: &SqlitePool) -> Result<Transaction<'static, Sqlite>, AppError> {
    let tx = db
        .begin_with("BEGIN IMMEDIATE")
        .await
        .inspect_err(|e| tracing::error!(err = ?e, "an error occurred when starting a write transaction"))?;

    Ok(tx)
}

async fn fetch_quote(conn: &mut SqliteConnection, id: i64) -> Result<Option<Quote>, AppError> {
    let quote = sqlx::query_as::<_, Quote>(&format!(
        "SELECT {QUOTE_COLUMNS} FROM quotes WHERE id = $1;"
    ))
    .bind(id)
    .fetch_optional(conn)
    .await
    .inspect_err(|e| tracing::error!(err = ?e, id, "an error occurred when fetching quote"))?;

    Ok(quote)
}

/// Store-level rules for a validated quote. `exclude_id` is the quote being edited, which
/// must not count against itself.
async fn check_store_rules(
    conn: &mut SqliteConnection,
    quote: &NewQuote,
    exclude_id: Option<i64>,
) -> Result<(), AppError> {
    let exclude_id = exclude_id.unwrap_or(-1);

    let duplicate = sqlx::query_scalar::<_, bool>(
        r#"
            SELECT EXISTS(
                SELECT 1 FROM quotes
                WHERE text = $1 AND id != $2
            );
        "#,
    )
    .bind(&quote.text)
    .bind(exclude_id)
    .fetch_one(&mut *conn)
    .await?;

    if duplicate {
        return Err(duplicate_text(quote));
    }

    let same_source = sqlx::query_scalar::<_, i64>(
        r#"
            SELECT COUNT(*) FROM quotes
            WHERE source = $1 AND id != $2;
        "#,
    )
    .bind(&quote.source)
    .bind(exclude_id)
    .fetch_one(&mut *conn)
    .await?;

    if same_source >= MAX_QUOTES_PER_SOURCE {
        return Err(AppError::Validation(format!(
            "source \"{}\" already has {MAX_QUOTES_PER_SOURCE} quotes.",
            quote.source
        )));
    }

    Ok(())
}

fn duplicate_text(quote: &NewQuote) -> AppError {
    AppError::Validation(format!("quote \"{}\" already exists.", quote.text))
}

fn map_unique_violation(e: sqlx::Error, quote: &NewQuote) -> AppError {
    if e
        .as_database_error()
        .is_some_and(|db_err| db_err.is_unique_violation())
    {
        return duplicate_text(quote);
    }

    AppError::Database(e)
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());

    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }

    escaped
}
