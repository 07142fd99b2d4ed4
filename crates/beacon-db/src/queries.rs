use crate::Database;
use crate::models::UserRow;
use anyhow::Result;
use rusqlite::Connection;

const USER_COLUMNS: &str = "id, name, mobile_number, email, age, gender, \
     last_latitude, last_longitude, last_seen_at, created_at";

impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        id: &str,
        name: &str,
        mobile_number: &str,
        email: Option<&str>,
        age: u32,
        gender: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, name, mobile_number, email, age, gender)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![id, name, mobile_number, email, age, gender],
            )?;
            Ok(())
        })
    }

    pub fn get_all_users(&self) -> Result<Vec<UserRow>> {
        self.with_conn(query_all_users)
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    // -- Locations --

    /// Write-through of an accepted location report. The staleness check
    /// lives in the roster store; this records what was accepted.
    pub fn update_last_location(
        &self,
        id: &str,
        latitude: f64,
        longitude: f64,
        recorded_at: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            let updated = conn.execute(
                "UPDATE users
                 SET last_latitude = ?2, last_longitude = ?3, last_seen_at = ?4
                 WHERE id = ?1",
                rusqlite::params![id, latitude, longitude, recorded_at],
            )?;
            if updated == 0 {
                anyhow::bail!("no such user: {}", id);
            }
            Ok(())
        })
    }
}

fn query_all_users(conn: &Connection) -> Result<Vec<UserRow>> {
    let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users"))?;

    let rows = stmt
        .query_map([], row_to_user)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

fn query_user_by_id(conn: &Connection, id: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"))?;

    let row = stmt.query_row([id], row_to_user).optional()?;

    Ok(row)
}

fn row_to_user(row: &rusqlite::Row<'_>) -> std::result::Result<UserRow, rusqlite::Error> {
    Ok(UserRow {
        id: row.get(0)?,
        name: row.get(1)?,
        mobile_number: row.get(2)?,
        email: row.get(3)?,
        age: row.get(4)?,
        gender: row.get(5)?,
        last_latitude: row.get(6)?,
        last_longitude: row.get(7)?,
        last_seen_at: row.get(8)?,
        created_at: row.get(9)?,
    })
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
