//! Request guards. Handlers run these in order at the top of their body and
//! bail out with the first failure, so each guard only needs to check one
//! thing and name the status that goes with it.

use chrono::NaiveDate;
use serde_json::{Map, Value};
use uuid::Uuid;

use freet_db::models::{FreetRow, UpvoteRow, UserRow};
use freet_types::models::{self as rules, MAX_FREET_LENGTH};

use crate::auth::{AppState, with_db};
use crate::error::ApiError;
use crate::middleware::Session;

// -- Session --

pub fn require_signed_in(session: &Session) -> Result<Uuid, ApiError> {
    session
        .user_id()
        .ok_or_else(|| ApiError::Forbidden("You must be logged in to complete this action.".into()))
}

/// A token whose account no longer exists counts as signed out.
pub async fn require_signed_out(state: &AppState, session: &Session) -> Result<(), ApiError> {
    if current_user(state, session).await?.is_some() {
        return Err(ApiError::Forbidden("You are already signed in.".into()));
    }
    Ok(())
}

/// The signed-in user's row, or `None` for anonymous callers and tokens
/// whose account has since been deleted.
pub async fn current_user(state: &AppState, session: &Session) -> Result<Option<UserRow>, ApiError> {
    let Some(user_id) = session.user_id() else {
        return Ok(None);
    };
    let uid = user_id.to_string();
    with_db(state, move |db| db.get_user_by_id(&uid)).await
}

pub async fn require_user(state: &AppState, session: &Session) -> Result<UserRow, ApiError> {
    require_signed_in(session)?;
    current_user(state, session)
        .await?
        .ok_or_else(|| ApiError::Forbidden("You must be logged in to complete this action.".into()))
}

// -- Users --

/// Usernames are non-empty runs of ASCII letters, digits and underscores.
pub fn validate_username(username: &str) -> Result<(), ApiError> {
    let valid = !username.is_empty()
        && username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(ApiError::BadRequest(
            "Username must be a nonempty alphanumeric string.".into(),
        ));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.is_empty() || password.chars().any(char::is_whitespace) {
        return Err(ApiError::BadRequest(
            "Password must be a nonempty string without whitespace.".into(),
        ));
    }
    Ok(())
}

/// Parse a birthday and derive the `underage` flag as of `today`.
pub fn validate_birthday(raw: &str, today: NaiveDate) -> Result<(NaiveDate, bool), ApiError> {
    rules::parse_birthday(raw)
        .and_then(|birthday| rules::is_underage(birthday, today).map(|u| (birthday, u)))
        .ok_or_else(|| {
            ApiError::BadRequest(
                "Birthday must be a valid date in YYYY-MM-DD format and not in the future.".into(),
            )
        })
}

/// 409 if someone other than `except_id` holds `username`.
pub async fn require_username_available(
    state: &AppState,
    username: &str,
    except_id: Option<&str>,
) -> Result<(), ApiError> {
    let name = username.to_string();
    let holder = with_db(state, move |db| db.get_user_by_username(&name)).await?;
    match holder {
        Some(user) if Some(user.id.as_str()) != except_id => Err(username_taken()),
        _ => Ok(()),
    }
}

/// Turn a lost race on the unique username index into the same 409 the
/// availability check gives.
pub fn username_conflict(err: ApiError) -> ApiError {
    match err {
        ApiError::Internal(e) if freet_db::is_username_conflict(&e) => username_taken(),
        other => other,
    }
}

fn username_taken() -> ApiError {
    ApiError::Conflict("An account with this username already exists.".into())
}

pub async fn user_by_username(state: &AppState, username: &str) -> Result<UserRow, ApiError> {
    if username.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "Provided author username must be nonempty.".into(),
        ));
    }
    let name = username.to_string();
    with_db(state, move |db| db.get_user_by_username(&name))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("A user with username {} does not exist.", username)))
}

// -- Freets --

/// A malformed id can never match, so it reports as not found.
pub async fn freet_exists(state: &AppState, id: &str) -> Result<FreetRow, ApiError> {
    let not_found = || ApiError::NotFound(format!("Freet with freet ID {} does not exist.", id));
    let fid = id.parse::<Uuid>().map_err(|_| not_found())?.to_string();
    with_db(state, move |db| db.get_freet(&fid))
        .await?
        .ok_or_else(not_found)
}

pub fn require_freet_author(user: &UserRow, freet: &FreetRow) -> Result<(), ApiError> {
    if user.id != freet.author_id {
        return Err(ApiError::Forbidden("Cannot modify other users' freets.".into()));
    }
    Ok(())
}

/// Self-flagged freets are only shown to signed-in adults.
pub fn require_freet_visible(viewer: Option<&UserRow>, freet: &FreetRow) -> Result<(), ApiError> {
    if freet.self_flagged && viewer.is_none_or(|v| v.underage) {
        return Err(ApiError::Forbidden(
            "This freet is self-flagged; you must be signed in and 18 or older to view it.".into(),
        ));
    }
    Ok(())
}

/// Content must be non-blank and at most [`MAX_FREET_LENGTH`] characters
/// once surrounding whitespace is ignored.
pub fn validate_content(content: Option<&str>) -> Result<&str, ApiError> {
    let content = content.unwrap_or_default();
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(ApiError::BadRequest(
            "Freet content must be at least one character long.".into(),
        ));
    }
    if trimmed.chars().count() > MAX_FREET_LENGTH {
        return Err(ApiError::PayloadTooLarge(format!(
            "Freet content must be no more than {} characters.",
            MAX_FREET_LENGTH
        )));
    }
    Ok(content)
}

/// Names of the extra body fields that are set, in key order.
pub fn collect_flag_reasons(fields: &Map<String, Value>) -> Vec<String> {
    fields
        .iter()
        .filter(|(_, value)| is_set(value))
        .map(|(key, _)| key.clone())
        .collect()
}

fn is_set(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

// -- Upvotes --

pub async fn upvote_exists(state: &AppState, id: &str) -> Result<UpvoteRow, ApiError> {
    let not_found = || ApiError::NotFound(format!("Upvote with upvote ID {} does not exist.", id));
    let vid = id.parse::<Uuid>().map_err(|_| not_found())?.to_string();
    with_db(state, move |db| db.get_upvote(&vid))
        .await?
        .ok_or_else(not_found)
}

pub fn require_upvote_author(user: &UserRow, upvote: &UpvoteRow) -> Result<(), ApiError> {
    if user.id != upvote.author_id {
        return Err(ApiError::Forbidden("Cannot delete other users' upvotes.".into()));
    }
    Ok(())
}

/// Checked against the user's upvoted list, not the upvotes table.
pub fn require_not_upvoted(user: &UserRow, freet_id: &str) -> Result<(), ApiError> {
    if user.has_upvoted(freet_id) {
        return Err(already_upvoted());
    }
    Ok(())
}

pub fn already_upvoted() -> ApiError {
    ApiError::Conflict("You have already upvoted this freet.".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user(id: &str, underage: bool) -> UserRow {
        UserRow {
            id: id.into(),
            username: "someone".into(),
            password: String::new(),
            birthday: "2000-01-01".into(),
            underage,
            upvoted_freets: vec!["f1".into()],
            created_at: String::new(),
        }
    }

    fn freet(author_id: &str, self_flagged: bool) -> FreetRow {
        FreetRow {
            id: "f1".into(),
            author_id: author_id.into(),
            author_username: "someone".into(),
            content: "hi".into(),
            self_flagged,
            flags: vec![],
            created_at: String::new(),
            modified_at: String::new(),
        }
    }

    #[test]
    fn duplicate_username_insert_is_a_conflict() {
        let db = freet_db::Database::open_in_memory().unwrap();
        db.create_user("u1", "ada", "h", "2000-01-01", false).unwrap();
        let err = db.create_user("u2", "ADA", "h", "2000-01-01", false).unwrap_err();

        assert!(matches!(
            username_conflict(ApiError::Internal(err)),
            ApiError::Conflict(_)
        ));
        assert!(matches!(
            username_conflict(ApiError::Internal(anyhow::anyhow!("disk full"))),
            ApiError::Internal(_)
        ));
    }

    #[test]
    fn content_length_bounds() {
        let max = "a".repeat(MAX_FREET_LENGTH);
        assert!(validate_content(Some("a")).is_ok());
        assert!(validate_content(Some(&max)).is_ok());

        let over = "a".repeat(MAX_FREET_LENGTH + 1);
        assert!(matches!(validate_content(Some(&over)), Err(ApiError::PayloadTooLarge(_))));
        assert!(matches!(validate_content(Some("")), Err(ApiError::BadRequest(_))));
        assert!(matches!(validate_content(Some(" \n\t ")), Err(ApiError::BadRequest(_))));
        assert!(matches!(validate_content(None), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn content_length_ignores_padding_and_counts_chars() {
        let padded = format!("   {}   ", "b".repeat(MAX_FREET_LENGTH));
        assert_eq!(validate_content(Some(&padded)).unwrap(), padded);

        // multi-byte characters count once each
        let emoji = "🐦".repeat(MAX_FREET_LENGTH);
        assert!(validate_content(Some(&emoji)).is_ok());
    }

    #[test]
    fn flag_reasons_keep_only_set_fields() {
        let body = json!({
            "violence": true,
            "spoilers": "yes",
            "language": false,
            "other": "",
            "missing": null,
        });
        let reasons = collect_flag_reasons(body.as_object().unwrap());
        assert_eq!(reasons, vec!["spoilers".to_string(), "violence".to_string()]);
    }

    #[test]
    fn usernames_and_passwords() {
        assert!(validate_username("ada_99").is_ok());
        assert!(validate_username("").is_err());
        assert!(validate_username("ada lovelace").is_err());
        assert!(validate_username("ada!").is_err());

        assert!(validate_password("s3cret!").is_ok());
        assert!(validate_password("").is_err());
        assert!(validate_password("two words").is_err());
    }

    #[test]
    fn birthday_derives_underage() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 15).unwrap();
        assert!(!validate_birthday("1990-05-01", today).unwrap().1);
        assert!(validate_birthday("2015-05-01", today).unwrap().1);
        assert!(validate_birthday("2027-01-01", today).is_err());
        assert!(validate_birthday("yesterday", today).is_err());
    }

    #[test]
    fn flagged_freets_need_an_adult_viewer() {
        let flagged = freet("author", true);
        let adult = user("u1", false);
        let minor = user("u2", true);

        assert!(require_freet_visible(Some(&adult), &flagged).is_ok());
        assert!(require_freet_visible(Some(&minor), &flagged).is_err());
        assert!(require_freet_visible(None, &flagged).is_err());

        let plain = freet("author", false);
        assert!(require_freet_visible(None, &plain).is_ok());
        assert!(require_freet_visible(Some(&minor), &plain).is_ok());
    }

    #[test]
    fn ownership_checks() {
        let owner = user("author", false);
        let other = user("other", false);
        assert!(require_freet_author(&owner, &freet("author", false)).is_ok());
        assert!(matches!(
            require_freet_author(&other, &freet("author", false)),
            Err(ApiError::Forbidden(_))
        ));
    }

    #[test]
    fn upvoted_list_blocks_duplicates() {
        let u = user("u1", false);
        assert!(matches!(require_not_upvoted(&u, "f1"), Err(ApiError::Conflict(_))));
        assert!(require_not_upvoted(&u, "f2").is_ok());
    }
}
