//! Administrator commands. Quotes are curated out of band; visitors never create them.
use clap::Subcommand;
use sqlx::SqlitePool;

use crate::{
    constants::DEFAULT_WEIGHT,
    models::quotes::{NewQuote, QuoteStats, QuoteUpdate},
    quotes,
};

#[derive(Debug, Subcommand)]
pub enum QuoteCommand {
    /// add a quote.
    Add {
        #[arg(long)]
        text: String,
        #[arg(long)]
        source: String,
        /// relative chance of being served; 0 keeps the quote but never picks it.
        #[arg(long, default_value_t = DEFAULT_WEIGHT)]
        weight: i64,
    },
    /// change a quote's text, source or weight.
    Edit {
        id: i64,
        #[arg(long)]
        text: Option<String>,
        #[arg(long)]
        source: Option<String>,
        #[arg(long)]
        weight: Option<i64>,
    },
    /// delete a quote along with its reactions.
    Delete { id: i64 },
    /// list every quote with its counts.
    List,
    /// find quotes by text or source.
    Search { term: String },
}

#[tracing::instrument(skip(db))]
pub async fn run(db: &SqlitePool, command: QuoteCommand) -> anyhow::Result<()> {
    match command {
        QuoteCommand::Add {
            text,
            source,
            weight,
        } => {
            let quote =
                quotes::create_quote(db, NewQuote::new(text, source).with_weight(weight)).await?;
            println!("added quote #{} from \"{}\".", quote.id, quote.source);
        }
        QuoteCommand::Edit {
            id,
            text,
            source,
            weight,
        } => {
            let quote = quotes::update_quote(
                db,
                id,
                QuoteUpdate {
                    text,
                    source,
                    weight,
                },
            )
            .await?;
            println!("updated quote #{}.", quote.id);
        }
        QuoteCommand::Delete { id } => {
            quotes::delete_quote(db, id).await?;
            println!("deleted quote #{id}.");
        }
        QuoteCommand::List => print_quotes(&quotes::list_quotes(db).await?),
        QuoteCommand::Search { term } => print_quotes(&quotes::search_quotes(db, &term).await?),
    }

    Ok(())
}

fn print_quotes(quotes: &[QuoteStats]) {
    if quotes.is_empty() {
        println!("no quotes found in database!");
        return;
    }

    for quote in quotes {
        println!("{quote}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::AppError, init::test_pool};

    #[tokio::test]
    async fn add_edit_and_delete_through_commands() {
        let db = test_pool().await;

        run(
            &db,
            QuoteCommand::Add {
                text: "you shall not pass".to_string(),
                source: "LOTR".to_string(),
                weight: 2,
            },
        )
        .await
        .unwrap();

        let quote = quotes::list_quotes(&db).await.unwrap().remove(0);
        assert_eq!(quote.weight, 2);

        run(
            &db,
            QuoteCommand::Edit {
                id: quote.id,
                text: None,
                source: None,
                weight: Some(0),
            },
        )
        .await
        .unwrap();
        assert_eq!(quotes::get_quote(&db, quote.id).await.unwrap().unwrap().weight, 0);

        run(&db, QuoteCommand::Delete { id: quote.id }).await.unwrap();
        assert_eq!(quotes::count_quotes(&db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn validation_errors_surface_to_the_caller() {
        let db = test_pool().await;

        let err = run(
            &db,
            QuoteCommand::Add {
                text: "negative".to_string(),
                source: "Math".to_string(),
                weight: -3,
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<AppError>(),
            Some(AppError::Validation(_))
        ));
    }
}
