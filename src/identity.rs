use std::{convert::Infallible, time::Duration};

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::constants::{MAX_USER_IDENTIFIER_LEN, USER_COOKIE};

/// Anonymous visitor, identified by a long-lived cookie token.
///
/// Extraction never fails: a missing or unusable cookie yields a freshly minted token that
/// the handler hands back through [`VisitorToken::cookie_jar`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VisitorToken {
    pub token: String,
    pub is_new: bool,
}

impl VisitorToken {
    pub fn mint() -> Self {
        Self {
            token: uuid::Uuid::new_v4().to_string(),
            is_new: true,
        }
    }

    pub fn from_jar(jar: &CookieJar) -> Self {
        match jar
            .get(USER_COOKIE)
            .map(|cookie| cookie.value_trimmed())
            .filter(|token| is_usable_token(token))
        {
            Some(token) => Self {
                token: token.to_string(),
                is_new: false,
            },
            None => Self::mint(),
        }
    }

    pub fn cookie(&self, max_age: Duration) -> Cookie<'static> {
        let max_age = time::Duration::seconds(i64::try_from(max_age.as_secs()).unwrap_or(i64::MAX));

        Cookie::build((USER_COOKIE, self.token.clone()))
            .max_age(max_age)
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .build()
    }

    /// Response cookies: the token is only sent back when it was minted for this request.
    pub fn cookie_jar(&self, max_age: Duration) -> CookieJar {
        let jar = CookieJar::new();
        if !self.is_new {
            return jar;
        }

        jar.add(self.cookie(max_age))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for VisitorToken
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_jar(&CookieJar::from_headers(&parts.headers)))
    }
}

fn is_usable_token(token: &str) -> bool {
    !token.is_empty()
        && token.len() <= MAX_USER_IDENTIFIER_LEN
        && token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use axum::http::{header::COOKIE, HeaderMap, HeaderValue};

    use super::*;

    fn visitor(cookie: &str) -> VisitorToken {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(cookie).unwrap());

        VisitorToken::from_jar(&CookieJar::from_headers(&headers))
    }

    #[test]
    fn reads_existing_token() {
        let visitor = visitor("theme=dark; quote_user_id=abc-123");

        assert_eq!(visitor.token, "abc-123");
        assert!(!visitor.is_new);
        assert!(visitor
            .cookie_jar(Duration::from_secs(60))
            .get(USER_COOKIE)
            .is_none());
    }

    #[test]
    fn mints_token_when_missing() {
        let visitor = VisitorToken::from_jar(&CookieJar::new());

        assert!(visitor.is_new);
        assert!(uuid::Uuid::parse_str(&visitor.token).is_ok());

        let jar = visitor.cookie_jar(Duration::from_secs(365 * 24 * 60 * 60));
        let cookie = jar.get(USER_COOKIE).unwrap();
        assert_eq!(cookie.value(), visitor.token);
        assert_eq!(cookie.max_age(), Some(time::Duration::days(365)));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.path(), Some("/"));
    }

    #[test]
    fn rejects_unusable_tokens() {
        let too_long = format!("quote_user_id={}", "a".repeat(MAX_USER_IDENTIFIER_LEN + 1));

        assert!(visitor(&too_long).is_new);
        assert!(visitor("quote_user_id=").is_new);
        assert!(visitor("quote_user_id=a%20b").is_new);
        assert!(visitor("other_id=abc").is_new);
    }
}
