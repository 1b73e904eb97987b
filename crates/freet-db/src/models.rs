//! Database row types — these map directly to SQLite rows.
//! Distinct from freet-types API models to keep the DB layer independent.

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub password: String,
    pub birthday: String,
    pub underage: bool,
    pub upvoted_freets: Vec<String>,
    pub created_at: String,
}

impl UserRow {
    pub fn has_upvoted(&self, freet_id: &str) -> bool {
        self.upvoted_freets.iter().any(|id| id == freet_id)
    }
}

pub struct FreetRow {
    pub id: String,
    pub author_id: String,
    pub author_username: String,
    pub content: String,
    pub self_flagged: bool,
    pub flags: Vec<String>,
    pub created_at: String,
    pub modified_at: String,
}

pub struct UpvoteRow {
    pub id: String,
    pub author_id: String,
    pub author_username: String,
    pub freet_id: String,
    pub created_at: String,
}
