use crate::models::{FreetRow, UpvoteRow, UserRow};
use crate::{Database, now};
use anyhow::Result;
use rusqlite::{Connection, Row};
use tracing::warn;

const USER_COLUMNS: &str =
    "id, username, password, birthday, underage, upvoted_freets, created_at";

// JOIN users to fetch the author's username in a single query
const FREET_SELECT: &str =
    "SELECT f.id, f.author_id, u.username, f.content, f.self_flagged, f.flags, f.created_at, f.modified_at
     FROM freets f
     LEFT JOIN users u ON f.author_id = u.id";

const UPVOTE_SELECT: &str =
    "SELECT v.id, v.author_id, u.username, v.freet_id, v.created_at
     FROM upvotes v
     LEFT JOIN users u ON v.author_id = u.id";

impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        id: &str,
        username: &str,
        password_hash: &str,
        birthday: &str,
        underage: bool,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, password, birthday, underage, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![id, username, password_hash, birthday, underage, now()],
            )?;
            Ok(())
        })
    }

    /// Usernames compare case-insensitively.
    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username", username))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    pub fn update_username(&self, id: &str, username: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET username = ?2 WHERE id = ?1",
                (id, username),
            )?;
            Ok(())
        })
    }

    pub fn update_password(&self, id: &str, password_hash: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET password = ?2 WHERE id = ?1",
                (id, password_hash),
            )?;
            Ok(())
        })
    }

    /// Delete a user along with every freet they wrote (each with its own
    /// cascade) and every upvote they cast. Returns false if no such user.
    pub fn delete_user(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let freet_ids: Vec<String> = {
                let mut stmt = conn.prepare("SELECT id FROM freets WHERE author_id = ?1")?;
                let ids = stmt
                    .query_map([id], |row| row.get(0))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                ids
            };
            for freet_id in &freet_ids {
                delete_freet_cascade(conn, freet_id)?;
            }

            conn.execute("DELETE FROM upvotes WHERE author_id = ?1", [id])?;
            let removed = conn.execute("DELETE FROM users WHERE id = ?1", [id])?;
            Ok(removed > 0)
        })
    }

    /// Append a freet id to the user's upvoted list. No-op if already present.
    pub fn add_upvoted_freet(&self, user_id: &str, freet_id: &str) -> Result<()> {
        self.with_conn(|conn| {
            update_upvoted_list(conn, user_id, |list| {
                if !list.iter().any(|id| id == freet_id) {
                    list.push(freet_id.to_string());
                }
            })
        })
    }

    pub fn remove_upvoted_freet(&self, user_id: &str, freet_id: &str) -> Result<()> {
        self.with_conn(|conn| {
            update_upvoted_list(conn, user_id, |list| list.retain(|id| id != freet_id))
        })
    }

    // -- Freets --

    /// Insert a freet. It is self-flagged iff `flags` is non-empty.
    pub fn insert_freet(
        &self,
        id: &str,
        author_id: &str,
        content: &str,
        flags: &[String],
    ) -> Result<()> {
        let flags_json = serde_json::to_string(flags)?;
        let timestamp = now();

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO freets (id, author_id, content, self_flagged, flags, created_at, modified_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                rusqlite::params![id, author_id, content, !flags.is_empty(), flags_json, timestamp],
            )?;
            Ok(())
        })
    }

    pub fn get_freet(&self, id: &str) -> Result<Option<FreetRow>> {
        self.with_conn(|conn| {
            let sql = format!("{FREET_SELECT} WHERE f.id = ?1");
            conn.query_row(&sql, [id], map_freet).optional()
        })
    }

    /// All freets, most recently modified first. Self-flagged freets are
    /// left out unless `include_flagged` is set.
    pub fn get_freets(&self, include_flagged: bool) -> Result<Vec<FreetRow>> {
        self.with_conn(|conn| {
            let sql = if include_flagged {
                format!("{FREET_SELECT} ORDER BY f.modified_at DESC, f.rowid DESC")
            } else {
                format!(
                    "{FREET_SELECT} WHERE f.self_flagged = 0 ORDER BY f.modified_at DESC, f.rowid DESC"
                )
            };
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], map_freet)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_freets_by_author(&self, author_id: &str) -> Result<Vec<FreetRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{FREET_SELECT} WHERE f.author_id = ?1 ORDER BY f.modified_at DESC, f.rowid DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([author_id], map_freet)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Delete a freet, its upvotes, and its id from every upvoted list.
    /// Returns false if no such freet.
    pub fn delete_freet(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| delete_freet_cascade(conn, id))
    }

    // -- Upvotes --

    /// Insert an upvote. Returns false, writing nothing, when the author has
    /// already upvoted this freet.
    pub fn insert_upvote(&self, id: &str, author_id: &str, freet_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO upvotes (id, author_id, freet_id, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![id, author_id, freet_id, now()],
            )?;
            Ok(inserted > 0)
        })
    }

    pub fn get_upvote(&self, id: &str) -> Result<Option<UpvoteRow>> {
        self.with_conn(|conn| {
            let sql = format!("{UPVOTE_SELECT} WHERE v.id = ?1");
            conn.query_row(&sql, [id], map_upvote).optional()
        })
    }

    pub fn get_upvotes(&self) -> Result<Vec<UpvoteRow>> {
        self.with_conn(|conn| query_upvotes(conn, None))
    }

    pub fn get_upvotes_by_author(&self, author_id: &str) -> Result<Vec<UpvoteRow>> {
        self.with_conn(|conn| query_upvotes(conn, Some(("v.author_id", author_id))))
    }

    pub fn get_upvotes_by_freet(&self, freet_id: &str) -> Result<Vec<UpvoteRow>> {
        self.with_conn(|conn| query_upvotes(conn, Some(("v.freet_id", freet_id))))
    }

    pub fn delete_upvote(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute("DELETE FROM upvotes WHERE id = ?1", [id])?;
            Ok(removed > 0)
        })
    }
}

/// `column` is always a literal from this module, never caller input.
fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1");
    let mut stmt = conn.prepare(&sql)?;

    let row = stmt
        .query_row([value], |row| {
            let id: String = row.get(0)?;
            let upvoted: String = row.get(5)?;
            Ok(UserRow {
                upvoted_freets: parse_id_list(&upvoted, &id),
                id,
                username: row.get(1)?,
                password: row.get(2)?,
                birthday: row.get(3)?,
                underage: row.get(4)?,
                created_at: row.get(6)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_upvotes(conn: &Connection, filter: Option<(&str, &str)>) -> Result<Vec<UpvoteRow>> {
    let rows = match filter {
        Some((column, value)) => {
            let sql = format!(
                "{UPVOTE_SELECT} WHERE {column} = ?1 ORDER BY v.created_at DESC, v.rowid DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([value], map_upvote)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        }
        None => {
            let sql = format!("{UPVOTE_SELECT} ORDER BY v.created_at DESC, v.rowid DESC");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], map_upvote)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        }
    };
    Ok(rows)
}

fn map_freet(row: &Row<'_>) -> rusqlite::Result<FreetRow> {
    let id: String = row.get(0)?;
    let flags: String = row.get(5)?;
    Ok(FreetRow {
        author_id: row.get(1)?,
        author_username: row
            .get::<_, Option<String>>(2)?
            .unwrap_or_else(|| "unknown".to_string()),
        content: row.get(3)?,
        self_flagged: row.get(4)?,
        flags: parse_id_list(&flags, &id),
        created_at: row.get(6)?,
        modified_at: row.get(7)?,
        id,
    })
}

fn map_upvote(row: &Row<'_>) -> rusqlite::Result<UpvoteRow> {
    Ok(UpvoteRow {
        id: row.get(0)?,
        author_id: row.get(1)?,
        author_username: row
            .get::<_, Option<String>>(2)?
            .unwrap_or_else(|| "unknown".to_string()),
        freet_id: row.get(3)?,
        created_at: row.get(4)?,
    })
}

/// Decode a JSON string-array column. A corrupt value reads as empty.
fn parse_id_list(raw: &str, owner: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_else(|e| {
        warn!("Corrupt JSON list '{}' on row '{}': {}", raw, owner, e);
        Vec::new()
    })
}

fn update_upvoted_list<F>(conn: &Connection, user_id: &str, edit: F) -> Result<()>
where
    F: FnOnce(&mut Vec<String>),
{
    let raw: Option<String> = conn
        .query_row(
            "SELECT upvoted_freets FROM users WHERE id = ?1",
            [user_id],
            |row| row.get(0),
        )
        .optional()?;

    let Some(raw) = raw else {
        return Ok(());
    };

    let mut list = parse_id_list(&raw, user_id);
    edit(&mut list);

    conn.execute(
        "UPDATE users SET upvoted_freets = ?2 WHERE id = ?1",
        (user_id, serde_json::to_string(&list)?),
    )?;
    Ok(())
}

// Not a transaction: each statement commits on its own.
fn delete_freet_cascade(conn: &Connection, freet_id: &str) -> Result<bool> {
    let upvoters: Vec<String> = {
        let mut stmt =
            conn.prepare("SELECT id FROM users WHERE instr(upvoted_freets, ?1) > 0")?;
        let ids = stmt
            .query_map([freet_id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        ids
    };
    for user_id in &upvoters {
        update_upvoted_list(conn, user_id, |list| list.retain(|id| id != freet_id))?;
    }

    conn.execute("DELETE FROM upvotes WHERE freet_id = ?1", [freet_id])?;
    let removed = conn.execute("DELETE FROM freets WHERE id = ?1", [freet_id])?;
    Ok(removed > 0)
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn new_id() -> String {
        Uuid::new_v4().to_string()
    }

    fn seed_user(db: &Database, username: &str, underage: bool) -> String {
        let id = new_id();
        db.create_user(&id, username, "hash", "2000-01-01", underage)
            .unwrap();
        id
    }

    fn seed_freet(db: &Database, author: &str, flags: &[&str]) -> String {
        let id = new_id();
        let flags: Vec<String> = flags.iter().map(|f| f.to_string()).collect();
        db.insert_freet(&id, author, "hello", &flags).unwrap();
        id
    }

    #[test]
    fn usernames_are_case_insensitive() {
        let db = Database::open_in_memory().unwrap();
        let id = seed_user(&db, "Alice", false);

        let found = db.get_user_by_username("alice").unwrap().unwrap();
        assert_eq!(found.id, id);
        assert_eq!(found.username, "Alice");
        assert!(found.upvoted_freets.is_empty());

        let err = db.create_user(&new_id(), "ALICE", "h", "2000-01-01", false).unwrap_err();
        assert!(crate::is_username_conflict(&err));

        let bob = seed_user(&db, "bob", false);
        let err = db.update_username(&bob, "alice").unwrap_err();
        assert!(crate::is_username_conflict(&err));
    }

    #[test]
    fn freet_row_resolves_author_and_flags() {
        let db = Database::open_in_memory().unwrap();
        let alice = seed_user(&db, "alice", false);
        let plain = seed_freet(&db, &alice, &[]);
        let flagged = seed_freet(&db, &alice, &["violence"]);

        let row = db.get_freet(&plain).unwrap().unwrap();
        assert_eq!(row.author_username, "alice");
        assert!(!row.self_flagged);
        assert!(row.flags.is_empty());

        let row = db.get_freet(&flagged).unwrap().unwrap();
        assert!(row.self_flagged);
        assert_eq!(row.flags, vec!["violence".to_string()]);

        assert!(db.get_freet(&new_id()).unwrap().is_none());
    }

    #[test]
    fn unflagged_listing_skips_self_flagged() {
        let db = Database::open_in_memory().unwrap();
        let alice = seed_user(&db, "alice", false);
        let plain = seed_freet(&db, &alice, &[]);
        seed_freet(&db, &alice, &["spoilers"]);

        assert_eq!(db.get_freets(true).unwrap().len(), 2);
        let visible = db.get_freets(false).unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, plain);
    }

    #[test]
    fn freets_list_newest_first() {
        let db = Database::open_in_memory().unwrap();
        let alice = seed_user(&db, "alice", false);
        let first = seed_freet(&db, &alice, &[]);
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = seed_freet(&db, &alice, &[]);

        let ids: Vec<String> = db
            .get_freets_by_author(&alice)
            .unwrap()
            .into_iter()
            .map(|f| f.id)
            .collect();
        assert_eq!(ids, vec![second, first]);
    }

    #[test]
    fn duplicate_upvote_is_ignored() {
        let db = Database::open_in_memory().unwrap();
        let alice = seed_user(&db, "alice", false);
        let bob = seed_user(&db, "bob", false);
        let freet = seed_freet(&db, &alice, &[]);

        assert!(db.insert_upvote(&new_id(), &bob, &freet).unwrap());
        assert!(!db.insert_upvote(&new_id(), &bob, &freet).unwrap());
        assert_eq!(db.get_upvotes_by_freet(&freet).unwrap().len(), 1);
    }

    #[test]
    fn upvoted_list_add_and_remove() {
        let db = Database::open_in_memory().unwrap();
        let alice = seed_user(&db, "alice", false);
        let freet = seed_freet(&db, &alice, &[]);

        db.add_upvoted_freet(&alice, &freet).unwrap();
        db.add_upvoted_freet(&alice, &freet).unwrap();
        let user = db.get_user_by_id(&alice).unwrap().unwrap();
        assert_eq!(user.upvoted_freets, vec![freet.clone()]);
        assert!(user.has_upvoted(&freet));

        db.remove_upvoted_freet(&alice, &freet).unwrap();
        let user = db.get_user_by_id(&alice).unwrap().unwrap();
        assert!(!user.has_upvoted(&freet));
    }

    #[test]
    fn deleting_freet_cascades_to_upvotes_and_lists() {
        let db = Database::open_in_memory().unwrap();
        let alice = seed_user(&db, "alice", false);
        let bob = seed_user(&db, "bob", false);
        let carol = seed_user(&db, "carol", false);
        let doomed = seed_freet(&db, &alice, &[]);
        let kept = seed_freet(&db, &alice, &[]);

        for user in [&bob, &carol] {
            db.insert_upvote(&new_id(), user, &doomed).unwrap();
            db.add_upvoted_freet(user, &doomed).unwrap();
        }
        db.insert_upvote(&new_id(), &bob, &kept).unwrap();
        db.add_upvoted_freet(&bob, &kept).unwrap();

        assert!(db.delete_freet(&doomed).unwrap());

        assert!(db.get_freet(&doomed).unwrap().is_none());
        assert!(db.get_upvotes_by_freet(&doomed).unwrap().is_empty());
        assert_eq!(db.get_upvotes_by_freet(&kept).unwrap().len(), 1);

        let bob_row = db.get_user_by_id(&bob).unwrap().unwrap();
        assert_eq!(bob_row.upvoted_freets, vec![kept]);
        let carol_row = db.get_user_by_id(&carol).unwrap().unwrap();
        assert!(carol_row.upvoted_freets.is_empty());

        assert!(!db.delete_freet(&doomed).unwrap());
    }

    #[test]
    fn deleting_user_removes_their_freets_and_upvotes() {
        let db = Database::open_in_memory().unwrap();
        let alice = seed_user(&db, "alice", false);
        let bob = seed_user(&db, "bob", false);
        let alices = seed_freet(&db, &alice, &[]);
        let bobs = seed_freet(&db, &bob, &[]);

        // alice upvotes bob, bob upvotes alice
        db.insert_upvote(&new_id(), &alice, &bobs).unwrap();
        db.add_upvoted_freet(&alice, &bobs).unwrap();
        db.insert_upvote(&new_id(), &bob, &alices).unwrap();
        db.add_upvoted_freet(&bob, &alices).unwrap();

        assert!(db.delete_user(&alice).unwrap());

        assert!(db.get_user_by_id(&alice).unwrap().is_none());
        assert!(db.get_freet(&alices).unwrap().is_none());
        assert!(db.get_upvotes_by_author(&alice).unwrap().is_empty());
        assert!(db.get_upvotes().unwrap().is_empty());
        let bob_row = db.get_user_by_id(&bob).unwrap().unwrap();
        assert!(bob_row.upvoted_freets.is_empty());
        assert!(db.get_freet(&bobs).unwrap().is_some());
    }

    #[test]
    fn upvote_row_resolves_author_username() {
        let db = Database::open_in_memory().unwrap();
        let alice = seed_user(&db, "alice", false);
        let bob = seed_user(&db, "bob", false);
        let freet = seed_freet(&db, &alice, &[]);
        let id = new_id();
        db.insert_upvote(&id, &bob, &freet).unwrap();

        let row = db.get_upvote(&id).unwrap().unwrap();
        assert_eq!(row.author_username, "bob");
        assert_eq!(row.freet_id, freet);
        assert_eq!(db.get_upvotes_by_author(&bob).unwrap().len(), 1);

        assert!(db.delete_upvote(&id).unwrap());
        assert!(db.get_upvote(&id).unwrap().is_none());
    }
}
