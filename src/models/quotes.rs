use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

use crate::{
    constants::{DEFAULT_WEIGHT, MAX_SOURCE_LEN},
    error::AppError,
};

#[derive(Clone, Debug, PartialEq, Eq, FromRow)]
pub struct Quote {
    pub id: i64,
    pub text: String,
    pub source: String,
    pub weight: i64,
    pub views: i64,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// A quote joined with its live reaction counts.
#[derive(Clone, Debug, PartialEq, Eq, FromRow, Serialize)]
pub struct QuoteStats {
    pub id: i64,
    pub text: String,
    pub source: String,
    #[serde(skip_serializing)]
    pub weight: i64,
    pub views: i64,
    pub likes: i64,
    pub dislikes: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl fmt::Display for QuoteStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let preview: String = self.text.chars().take(50).collect();
        let ellipsis = if self.text.chars().count() > 50 { "..." } else { "" };

        write!(
            f,
            "#{} \"{preview}{ellipsis}\" ({}) weight={} likes={} dislikes={} views={}",
            self.id, self.source, self.weight, self.likes, self.dislikes, self.views
        )
    }
}

/// Weight of a quote as seen by the selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, FromRow)]
pub struct QuoteWeight {
    pub id: i64,
    pub weight: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewQuote {
    pub text: String,
    pub source: String,
    pub weight: i64,
}

impl NewQuote {
    pub fn new(text: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: source.into(),
            weight: DEFAULT_WEIGHT,
        }
    }

    pub fn with_weight(mut self, weight: i64) -> Self {
        self.weight = weight;
        self
    }

    /// Field-level checks; the per-source quota and text uniqueness need the store.
    pub fn validate(self) -> Result<Self, AppError> {
        Ok(Self {
            text: validate_text(&self.text)?,
            source: validate_source(&self.source)?,
            weight: validate_weight(self.weight)?,
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QuoteUpdate {
    pub text: Option<String>,
    pub source: Option<String>,
    pub weight: Option<i64>,
}

impl QuoteUpdate {
    pub fn apply_to(&self, quote: &Quote) -> Result<NewQuote, AppError> {
        NewQuote {
            text: self.text.clone().unwrap_or_else(|| quote.text.clone()),
            source: self.source.clone().unwrap_or_else(|| quote.source.clone()),
            weight: self.weight.unwrap_or(quote.weight),
        }
        .validate()
    }
}

fn validate_text(text: &str) -> Result<String, AppError> {
    let text = text.trim();

    if text.is_empty() {
        return Err(AppError::Validation("quote text cannot be empty.".to_string()));
    }

    Ok(text.to_string())
}

fn validate_source(source: &str) -> Result<String, AppError> {
    let source = source.trim();

    if source.is_empty() {
        return Err(AppError::Validation("quote source cannot be empty.".to_string()));
    }

    if source.chars().count() > MAX_SOURCE_LEN {
        return Err(AppError::Validation(format!(
            "quote source cannot be longer than {MAX_SOURCE_LEN} characters."
        )));
    }

    Ok(source.to_string())
}

fn validate_weight(weight: i64) -> Result<i64, AppError> {
    if weight < 0 {
        return Err(AppError::Validation(format!(
            "quote weight must be zero or positive, got {weight}."
        )));
    }

    Ok(weight)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Likes,
    Dislikes,
    Views,
    New,
}

impl SortKey {
    /// Unknown or missing values fall back to [`SortKey::Likes`].
    pub fn from_param(param: Option<&str>) -> Self {
        match param.map(str::trim) {
            Some("likes") | None => SortKey::Likes,
            Some("dislikes") => SortKey::Dislikes,
            Some("views") => SortKey::Views,
            Some("new") => SortKey::New,
            Some(other) => {
                tracing::debug!(sort = %other, "unknown sort key, falling back to likes");
                SortKey::Likes
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Likes => "likes",
            SortKey::Dislikes => "dislikes",
            SortKey::Views => "views",
            SortKey::New => "new",
        }
    }

    pub(crate) fn order_column(&self) -> &'static str {
        match self {
            SortKey::Likes => "likes",
            SortKey::Dislikes => "dislikes",
            SortKey::Views => "views",
            SortKey::New => "created_at",
        }
    }
}
