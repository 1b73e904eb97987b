use chrono::NaiveDate;

/// Longest freet accepted, counted in characters of the trimmed content.
pub const MAX_FREET_LENGTH: usize = 280;

/// Users younger than this at registration are flagged `underage`.
pub const ADULT_AGE: u32 = 18;

/// Birthday wire and storage format.
pub const BIRTHDAY_FORMAT: &str = "%Y-%m-%d";

/// Whether someone born on `birthday` is underage on `today`.
/// Returns `None` when the birthday lies in the future.
pub fn is_underage(birthday: NaiveDate, today: NaiveDate) -> Option<bool> {
    today.years_since(birthday).map(|age| age < ADULT_AGE)
}

pub fn parse_birthday(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), BIRTHDAY_FORMAT).ok()
}
