use sqlx::SqlitePool;

use crate::{
    error::AppError,
    models::quotes::{QuoteStats, SortKey},
    quotes::STATS_SELECT,
};

/// Top quotes by `sort`, descending. Ties keep storage order.
#[tracing::instrument(skip(db))]
pub async fn top_quotes(
    db: &SqlitePool,
    sort: SortKey,
    limit: i64,
) -> Result<Vec<QuoteStats>, AppError> {
    // the column comes from a closed set, never from the request
    let query = format!(
        "{STATS_SELECT} ORDER BY {} DESC, q.id ASC LIMIT $1;",
        sort.order_column()
    );

    let quotes = sqlx::query_as::<_, QuoteStats>(&query)
        .bind(limit)
        .fetch_all(db)
        .await
        .inspect_err(
            |e| tracing::error!(err = ?e, sort = sort.as_str(), "an error occurred when ranking quotes"),
        )?;

    Ok(quotes)
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::{
        constants::TOP_QUOTES_LIMIT,
        init::test_pool,
        models::{quotes::NewQuote, reactions::ReactionKind},
        quotes::create_quote,
        reactions::react,
        selector::pick_random_quote,
    };

    async fn create(db: &SqlitePool, text: &str, source: &str) -> i64 {
        create_quote(db, NewQuote::new(text, source)).await.unwrap().id
    }

    fn ids(quotes: &[QuoteStats]) -> Vec<i64> {
        quotes.iter().map(|q| q.id).collect()
    }

    #[tokio::test]
    async fn ranks_by_likes_and_dislikes() {
        let db = test_pool().await;
        let a = create(&db, "a", "A").await;
        let b = create(&db, "b", "B").await;
        let c = create(&db, "c", "C").await;

        for user in ["u1", "u2"] {
            react(&db, b, user, ReactionKind::Like).await.unwrap();
        }
        react(&db, c, "u1", ReactionKind::Like).await.unwrap();
        react(&db, a, "u1", ReactionKind::Dislike).await.unwrap();

        let by_likes = top_quotes(&db, SortKey::Likes, TOP_QUOTES_LIMIT).await.unwrap();
        assert_eq!(ids(&by_likes), vec![b, c, a]);
        assert_eq!(by_likes[0].likes, 2);

        let by_dislikes = top_quotes(&db, SortKey::Dislikes, TOP_QUOTES_LIMIT)
            .await
            .unwrap();
        assert_eq!(ids(&by_dislikes), vec![a, b, c]);
    }

    #[tokio::test]
    async fn views_reflect_every_random_read() {
        let db = test_pool().await;
        let quote = create(&db, "seen", "Eyes").await;
        let _other = create_quote(&db, NewQuote::new("unseen", "Eyes").with_weight(0))
            .await
            .unwrap();

        for _ in 0..7 {
            pick_random_quote(&db).await.unwrap();
        }

        let by_views = top_quotes(&db, SortKey::Views, TOP_QUOTES_LIMIT).await.unwrap();
        assert_eq!(by_views[0].id, quote);
        assert_eq!(by_views[0].views, 7);
        assert_eq!(by_views[1].views, 0);
    }

    #[tokio::test]
    async fn newest_first() {
        let db = test_pool().await;
        let old = create(&db, "old", "A").await;
        let new = create(&db, "new", "B").await;

        for (id, created_at) in [
            (old, datetime!(2024-01-01 0:00 UTC)),
            (new, datetime!(2025-01-01 0:00 UTC)),
        ] {
            sqlx::query("UPDATE quotes SET created_at = $1 WHERE id = $2;")
                .bind(created_at)
                .bind(id)
                .execute(&db)
                .await
                .unwrap();
        }

        let by_new = top_quotes(&db, SortKey::New, TOP_QUOTES_LIMIT).await.unwrap();
        assert_eq!(ids(&by_new), vec![new, old]);
    }

    #[tokio::test]
    async fn ties_keep_storage_order_and_limit_applies() {
        let db = test_pool().await;

        let mut created = vec![];
        for idx in 0..12 {
            created.push(create(&db, &format!("quote {idx}"), &format!("source {idx}")).await);
        }

        let top = top_quotes(&db, SortKey::Likes, TOP_QUOTES_LIMIT).await.unwrap();

        assert_eq!(top.len(), 10);
        assert_eq!(ids(&top), created[..10].to_vec());
    }
}
