//! Row to response shaping: stringified ids, author usernames, and
//! human-readable dates such as `October 15th 2026, 3:04:05 pm`.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use tracing::warn;

use freet_db::models::{FreetRow, UpvoteRow, UserRow};
use freet_types::api::{FreetResponse, UpvoteResponse, UserResponse};
use freet_types::models::BIRTHDAY_FORMAT;

pub fn user(row: &UserRow) -> UserResponse {
    UserResponse {
        id: row.id.clone(),
        username: row.username.clone(),
        date_joined: timestamp(&row.created_at, &row.id),
        birthday: birthday(&row.birthday, &row.id),
        underage: row.underage,
        upvoted_freets: row.upvoted_freets.clone(),
    }
}

pub fn freet(row: &FreetRow) -> FreetResponse {
    FreetResponse {
        id: row.id.clone(),
        author: row.author_username.clone(),
        date_created: timestamp(&row.created_at, &row.id),
        date_modified: timestamp(&row.modified_at, &row.id),
        content: row.content.clone(),
        self_flagged: row.self_flagged,
        flags: row.flags.clone(),
    }
}

pub fn upvote(row: &UpvoteRow) -> UpvoteResponse {
    UpvoteResponse {
        id: row.id.clone(),
        author: row.author_username.clone(),
        freet: row.freet_id.clone(),
        date_created: timestamp(&row.created_at, &row.id),
    }
}

/// Render a stored timestamp. Unparsable values are passed through as-is.
pub fn timestamp(raw: &str, owner: &str) -> String {
    match raw.parse::<DateTime<Utc>>() {
        Ok(dt) => format!(
            "{} {} {}",
            dt.format("%B"),
            ordinal(dt.day()),
            dt.format("%Y, %-I:%M:%S %P")
        ),
        Err(e) => {
            warn!("Corrupt timestamp '{}' on row '{}': {}", raw, owner, e);
            raw.to_string()
        }
    }
}

pub fn birthday(raw: &str, owner: &str) -> String {
    match NaiveDate::parse_from_str(raw, BIRTHDAY_FORMAT) {
        Ok(date) => format!("{} {} {}", date.format("%B"), ordinal(date.day()), date.year()),
        Err(e) => {
            warn!("Corrupt birthday '{}' on user '{}': {}", raw, owner, e);
            raw.to_string()
        }
    }
}

fn ordinal(day: u32) -> String {
    let suffix = match (day % 10, day % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{}{}", day, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinals() {
        let rendered: Vec<String> = [1, 2, 3, 4, 11, 12, 13, 21, 22, 23, 30, 31]
            .into_iter()
            .map(ordinal)
            .collect();
        assert_eq!(
            rendered,
            ["1st", "2nd", "3rd", "4th", "11th", "12th", "13th", "21st", "22nd", "23rd", "30th", "31st"]
        );
    }

    #[test]
    fn rfc3339_timestamps() {
        assert_eq!(
            timestamp("2026-10-15T15:04:05.123456Z", "x"),
            "October 15th 2026, 3:04:05 pm"
        );
        assert_eq!(
            timestamp("2026-03-01T00:09:00Z", "x"),
            "March 1st 2026, 12:09:00 am"
        );
    }

    #[test]
    fn corrupt_values_pass_through() {
        assert_eq!(timestamp("last tuesday", "x"), "last tuesday");
        assert_eq!(birthday("??", "x"), "??");
    }

    #[test]
    fn birthdays() {
        assert_eq!(birthday("2008-10-03", "x"), "October 3rd 2008");
    }

    #[test]
    fn upvote_shows_username_not_id() {
        let row = UpvoteRow {
            id: "v1".into(),
            author_id: "u1".into(),
            author_username: "ada".into(),
            freet_id: "f1".into(),
            created_at: "2026-10-15T15:04:05Z".into(),
        };
        let out = upvote(&row);
        assert_eq!(out.author, "ada");
        assert_eq!(out.freet, "f1");
    }
}
