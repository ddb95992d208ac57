use rand::{
    distributions::{Distribution, WeightedError, WeightedIndex},
    seq::SliceRandom,
    Rng,
};
use sqlx::SqlitePool;

use crate::{
    error::AppError,
    models::quotes::{QuoteStats, QuoteWeight},
    quotes,
};

/// Picks one item with probability proportional to its weight.
///
/// Zero-weight items are never picked while anything else has weight. When every weight is
/// zero the pick degrades to a uniform choice, so a store holding only zero-weight quotes
/// still serves one.
pub fn pick_weighted<'a, T, R, F>(items: &'a [T], weight: F, rng: &mut R) -> Option<&'a T>
where
    R: Rng + ?Sized,
    F: Fn(&T) -> u64,
{
    if items.is_empty() {
        return None;
    }

    match WeightedIndex::new(items.iter().map(weight)) {
        Ok(dist) => items.get(dist.sample(rng)),
        Err(WeightedError::AllWeightsZero) => items.choose(rng),
        Err(e) => {
            tracing::warn!(err = ?e, "weights unusable, falling back to a uniform pick");
            items.choose(rng)
        }
    }
}

fn selection_weight(quote: &QuoteWeight) -> u64 {
    // stored weights are non-negative; the clamp keeps the running total from overflowing
    quote.weight.clamp(0, u32::MAX as i64) as u64
}

/// Weighted-random read: picks a quote, counts the view and returns the quote with its
/// counts as they are after the view. `None` when the store is empty.
#[tracing::instrument(skip_all)]
pub async fn pick_random_quote(db: &SqlitePool) -> Result<Option<QuoteStats>, AppError> {
    let weights = quotes::list_weights(db).await?;

    let picked = {
        let mut rng = rand::thread_rng();
        pick_weighted(&weights, selection_weight, &mut rng).map(|quote| quote.id)
    };

    let Some(id) = picked else {
        tracing::debug!("no quotes to pick from");
        return Ok(None);
    };

    if !quotes::increment_views(db, id).await? {
        tracing::warn!(id, "picked quote disappeared before its view was counted");
        return Ok(None);
    }

    quotes::get_quote_stats(db, id).await
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;
    use crate::{init::test_pool, models::quotes::NewQuote, quotes::create_quote};

    fn weighted(weights: &[i64]) -> Vec<QuoteWeight> {
        weights
            .iter()
            .enumerate()
            .map(|(idx, &weight)| QuoteWeight {
                id: idx as i64 + 1,
                weight,
            })
            .collect()
    }

    fn draw(items: &[QuoteWeight], trials: usize, seed: u64) -> Vec<usize> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut hits = vec![0; items.len()];

        for _ in 0..trials {
            let picked = pick_weighted(items, selection_weight, &mut rng).unwrap();
            hits[(picked.id - 1) as usize] += 1;
        }

        hits
    }

    #[test]
    fn empty_set_picks_nothing() {
        let mut rng = StdRng::seed_from_u64(7);

        assert!(pick_weighted(&[] as &[QuoteWeight], selection_weight, &mut rng).is_none());
    }

    #[test]
    fn draws_converge_to_weight_proportions() {
        let items = weighted(&[1, 2, 7]);
        let trials = 50_000;

        let hits = draw(&items, trials, 42);

        for (quote, hits) in items.iter().zip(hits) {
            let expected = quote.weight as f64 / 10.0;
            let observed = hits as f64 / trials as f64;

            assert!(
                (observed - expected).abs() < 0.02,
                "quote {} drawn {observed:.3} of the time, expected {expected:.3}",
                quote.id
            );
        }
    }

    #[test]
    fn zero_weight_is_never_picked_next_to_weighted_quotes() {
        let items = weighted(&[0, 3, 0, 1]);

        let hits = draw(&items, 10_000, 1);

        assert_eq!(hits[0], 0);
        assert_eq!(hits[2], 0);
        assert_eq!(hits[1] + hits[3], 10_000);
    }

    #[test]
    fn lone_zero_weight_quote_is_still_served() {
        let items = weighted(&[0]);

        assert_eq!(draw(&items, 100, 3), vec![100]);
    }

    #[test]
    fn all_zero_weights_fall_back_to_uniform() {
        let items = weighted(&[0, 0]);

        let hits = draw(&items, 10_000, 9);

        assert!(hits.iter().all(|&h| h > 4_000), "{hits:?}");
    }

    #[tokio::test]
    async fn random_read_counts_a_view() {
        let db = test_pool().await;

        assert_eq!(pick_random_quote(&db).await.unwrap(), None);

        let quote = create_quote(&db, NewQuote::new("only one", "Highlander"))
            .await
            .unwrap();

        for expected_views in 1..=3 {
            let picked = pick_random_quote(&db).await.unwrap().unwrap();

            assert_eq!(picked.id, quote.id);
            assert_eq!(picked.views, expected_views);
        }
    }

    #[tokio::test]
    async fn random_read_skips_zero_weight_quotes() {
        let db = test_pool().await;

        let hidden = create_quote(&db, NewQuote::new("hidden", "A").with_weight(0))
            .await
            .unwrap();
        let shown = create_quote(&db, NewQuote::new("shown", "B")).await.unwrap();

        for _ in 0..50 {
            let picked = pick_random_quote(&db).await.unwrap().unwrap();
            assert_eq!(picked.id, shown.id);
        }

        let hidden = quotes::get_quote_stats(&db, hidden.id).await.unwrap().unwrap();
        assert_eq!(hidden.views, 0);
    }
}
