//! Staff account database operations.

use rusqlite::{params, ErrorCode, OptionalExtension};

use super::{Database, DbError, DbResult, UserStore};
use crate::models::User;

impl UserStore for Database {
    fn find_user(&self, name: &str) -> DbResult<Option<User>> {
        self.conn
            .query_row(
                "SELECT name, password_hash, created_at FROM users WHERE name = ?",
                [name],
                |row| {
                    Ok(User {
                        name: row.get(0)?,
                        password_hash: row.get(1)?,
                        created_at: row.get(2)?,
                    })
                },
            )
            .optional()
            .map_err(Into::into)
    }

    fn insert_user(&self, user: &User) -> DbResult<()> {
        let result = self.conn.execute(
            "INSERT INTO users (name, password_hash, created_at) VALUES (?1, ?2, ?3)",
            params![user.name, user.password_hash, user.created_at],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Err(DbError::Constraint(format!("User already exists: {}", user.name)))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(name: &str) -> User {
        User {
            name: name.into(),
            password_hash: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".into(),
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    #[test]
    fn test_insert_and_find() {
        let db = Database::open_in_memory().unwrap();
        db.insert_user(&user("Sato")).unwrap();

        let found = db.find_user("Sato").unwrap().unwrap();
        assert_eq!(found.name, "Sato");
        assert!(db.find_user("Suzuki").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_name_is_constraint_error() {
        let db = Database::open_in_memory().unwrap();
        db.insert_user(&user("Sato")).unwrap();

        let err = db.insert_user(&user("Sato")).unwrap_err();
        assert!(matches!(err, DbError::Constraint(_)));
    }
}
