//! Reaction store and resolver.
//!
//! A visitor holds at most one reaction per quote. Reacting again with the same kind takes
//! the reaction back; reacting with the other kind switches it.
use sqlx::{Sqlite, SqlitePool};
use time::OffsetDateTime;

use crate::{
    error::AppError,
    models::reactions::{ReactionCounts, ReactionKind, ReactionOutcome},
    quotes::begin_immediate,
};

/// What a new reaction does to the visitor's existing one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution {
    Create(ReactionKind),
    Remove,
    Switch(ReactionKind),
}

impl Resolution {
    pub fn resolve(existing: Option<ReactionKind>, requested: ReactionKind) -> Self {
        match existing {
            None => Resolution::Create(requested),
            Some(current) if current == requested => Resolution::Remove,
            Some(_) => Resolution::Switch(requested),
        }
    }

    pub fn resulting_state(&self) -> Option<ReactionKind> {
        match self {
            Resolution::Create(kind) | Resolution::Switch(kind) => Some(*kind),
            Resolution::Remove => None,
        }
    }
}

#[tracing::instrument(skip(db))]
pub async fn react(
    db: &SqlitePool,
    quote_id: i64,
    user_identifier: &str,
    requested: ReactionKind,
) -> Result<ReactionOutcome, AppError> {
    let mut tx = begin_immediate(db).await?;

    let quote_exists = sqlx::query_scalar::<_, bool>(
        r#"
            SELECT EXISTS(
                SELECT 1 FROM quotes
                WHERE id = $1
            );
        "#,
    )
    .bind(quote_id)
    .fetch_one(&mut *tx)
    .await?;

    if !quote_exists {
        return Err(AppError::NotFound);
    }

    let existing = user_reaction(&mut *tx, quote_id, user_identifier).await?;
    let resolution = Resolution::resolve(existing, requested);

    match resolution {
        Resolution::Create(kind) | Resolution::Switch(kind) => {
            sqlx::query(
                r#"
                    INSERT INTO
                        quote_reactions (quote_id, user_identifier, kind, created_at)
                    VALUES
                        ($1, $2, $3, $4)
                    ON CONFLICT (quote_id, user_identifier)
                    DO UPDATE SET
                        kind = excluded.kind;
                "#,
            )
            .bind(quote_id)
            .bind(user_identifier)
            .bind(kind)
            .bind(OffsetDateTime::now_utc())
            .execute(&mut *tx)
            .await
            .inspect_err(|e| {
                tracing::error!(err = ?e, quote_id, "an error occurred when saving reaction")
            })?;
        }
        Resolution::Remove => {
            sqlx::query(
                r#"
                    DELETE FROM quote_reactions
                    WHERE quote_id = $1 AND user_identifier = $2;
                "#,
            )
            .bind(quote_id)
            .bind(user_identifier)
            .execute(&mut *tx)
            .await
            .inspect_err(|e| {
                tracing::error!(err = ?e, quote_id, "an error occurred when removing reaction")
            })?;
        }
    }

    let counts = reaction_counts(&mut *tx, quote_id).await?;
    tx.commit().await?;

    tracing::debug!(quote_id, ?resolution, "applied reaction");

    Ok(ReactionOutcome {
        counts,
        user_reaction: resolution.resulting_state(),
    })
}

pub async fn user_reaction<'e, E>(
    executor: E,
    quote_id: i64,
    user_identifier: &str,
) -> Result<Option<ReactionKind>, AppError>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let kind = sqlx::query_scalar::<_, ReactionKind>(
        r#"
            SELECT kind
            FROM quote_reactions
            WHERE quote_id = $1 AND user_identifier = $2;
        "#,
    )
    .bind(quote_id)
    .bind(user_identifier)
    .fetch_optional(executor)
    .await
    .inspect_err(|e| tracing::error!(err = ?e, quote_id, "an error occurred when fetching reaction"))?;

    Ok(kind)
}

pub async fn reaction_counts<'e, E>(executor: E, quote_id: i64) -> Result<ReactionCounts, AppError>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let (likes, dislikes) = sqlx::query_as::<_, (i64, i64)>(
        r#"
            SELECT
                COALESCE(SUM(kind = 'like'), 0),
                COALESCE(SUM(kind = 'dislike'), 0)
            FROM quote_reactions
            WHERE quote_id = $1;
        "#,
    )
    .bind(quote_id)
    .fetch_one(executor)
    .await
    .inspect_err(|e| tracing::error!(err = ?e, quote_id, "an error occurred when counting reactions"))?;

    Ok(ReactionCounts { likes, dislikes })
}

pub async fn count_reactions(db: &SqlitePool) -> Result<i64, AppError> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM quote_reactions;")
        .fetch_one(db)
        .await?;

    Ok(count)
}
