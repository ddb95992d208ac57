use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ReactionKind {
    Like,
    Dislike,
}

impl FromStr for ReactionKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "like" => Ok(ReactionKind::Like),
            "dislike" => Ok(ReactionKind::Dislike),
            other => Err(AppError::InvalidReaction(other.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReactionCounts {
    pub likes: i64,
    pub dislikes: i64,
}

/// What a visitor sees after reacting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ReactionOutcome {
    #[serde(flatten)]
    pub counts: ReactionCounts,
    pub user_reaction: Option<ReactionKind>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ReactForm {
    pub reaction: Option<String>,
}

impl ReactForm {
    pub fn kind(&self) -> Result<ReactionKind, AppError> {
        self.reaction
            .as_deref()
            .ok_or_else(|| AppError::InvalidReaction(String::new()))?
            .parse()
    }
}
