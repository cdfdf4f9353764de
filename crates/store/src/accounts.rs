use serde::Deserialize;
use sqlx::{Row, SqlitePool};
use tracing::{info, warn};
use uuid::Uuid;

use common::{Account, Error, Result};

/// Fields accepted when registering an account.
#[derive(Debug, Clone, Deserialize)]
pub struct NewAccount {
    pub username: String,
    pub broker: String,
    pub api_key: String,
    pub totp_token: Option<String>,
    /// Defaults to 1 when omitted.
    pub default_quantity: Option<u32>,
}

/// CRUD over the `accounts` table.
#[derive(Clone)]
pub struct AccountStore {
    db: SqlitePool,
}

impl AccountStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Insert a new account. Usernames are unique; duplicates are rejected.
    pub async fn register(&self, new: NewAccount) -> Result<Account> {
        let username = new.username.trim().to_string();
        if username.is_empty() || new.broker.trim().is_empty() || new.api_key.trim().is_empty() {
            return Err(Error::InvalidRequest(
                "username, broker and api_key are required".into(),
            ));
        }
        if self.by_username(&username).await?.is_some() {
            return Err(Error::InvalidRequest(format!(
                "username '{username}' already exists"
            )));
        }

        let account = Account {
            id: Uuid::new_v4().to_string(),
            username,
            broker: new.broker.trim().to_string(),
            api_key: new.api_key,
            totp_token: new.totp_token.filter(|t| !t.is_empty()),
            default_quantity: new.default_quantity.unwrap_or(1).max(1),
        };

        sqlx::query(
            "INSERT INTO accounts (id, username, broker, api_key, totp_token, default_quantity)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&account.id)
        .bind(&account.username)
        .bind(&account.broker)
        .bind(&account.api_key)
        .bind(&account.totp_token)
        .bind(account.default_quantity as i64)
        .execute(&self.db)
        .await?;

        info!(username = %account.username, broker = %account.broker, "Account registered");
        Ok(account)
    }

    pub async fn get(&self, id: &str) -> Result<Option<Account>> {
        let row = sqlx::query(
            "SELECT id, username, broker, api_key, totp_token, default_quantity
             FROM accounts WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(|r| row_to_account(&r)))
    }

    pub async fn by_username(&self, username: &str) -> Result<Option<Account>> {
        let row = sqlx::query(
            "SELECT id, username, broker, api_key, totp_token, default_quantity
             FROM accounts WHERE username = ?1",
        )
        .bind(username)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(|r| row_to_account(&r)))
    }

    pub async fn list(&self) -> Result<Vec<Account>> {
        let rows = sqlx::query(
            "SELECT id, username, broker, api_key, totp_token, default_quantity
             FROM accounts ORDER BY username",
        )
        .fetch_all(&self.db)
        .await?;
        Ok(rows.iter().map(row_to_account).collect())
    }

    /// Bulk-import accounts from CSV content.
    ///
    /// Expected columns per row: username, broker, api_key, totp_token,
    /// default_quantity. Short rows, duplicate usernames and unparseable
    /// quantities skip the row rather than failing the import; the returned
    /// count is the number of accounts actually created.
    pub async fn import_csv(&self, content: &str) -> Result<usize> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());

        let mut imported = 0usize;
        for (index, record) in reader.records().enumerate() {
            let row = index + 1;
            let record = match record {
                Ok(r) => r,
                Err(e) => {
                    warn!(row, error = %e, "Skipping malformed CSV row");
                    continue;
                }
            };
            if record.len() < 5 {
                warn!(row, fields = record.len(), "Skipping short CSV row");
                continue;
            }

            let default_quantity = if record[4].is_empty() {
                1
            } else {
                match record[4].parse::<u32>() {
                    Ok(q) => q,
                    Err(_) => {
                        warn!(row, value = &record[4], "Skipping row with bad quantity");
                        continue;
                    }
                }
            };

            let new = NewAccount {
                username: record[0].to_string(),
                broker: record[1].to_string(),
                api_key: record[2].to_string(),
                totp_token: (!record[3].is_empty()).then(|| record[3].to_string()),
                default_quantity: Some(default_quantity),
            };
            match self.register(new).await {
                Ok(_) => imported += 1,
                Err(Error::InvalidRequest(reason)) => {
                    warn!(row, %reason, "Skipping CSV row");
                }
                Err(e) => return Err(e),
            }
        }

        info!(imported, "CSV account import finished");
        Ok(imported)
    }
}

fn row_to_account(row: &sqlx::sqlite::SqliteRow) -> Account {
    Account {
        id: row.get("id"),
        username: row.get("username"),
        broker: row.get("broker"),
        api_key: row.get("api_key"),
        totp_token: row.get("totp_token"),
        default_quantity: row.get::<i64, _>("default_quantity") as u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::memory_pool;

    fn new_account(username: &str) -> NewAccount {
        NewAccount {
            username: username.into(),
            broker: "zerodha".into(),
            api_key: format!("key-{username}"),
            totp_token: None,
            default_quantity: Some(3),
        }
    }

    #[tokio::test]
    async fn register_and_fetch_round_trip() {
        let store = AccountStore::new(memory_pool().await);
        let created = store.register(new_account("alice")).await.unwrap();

        let fetched = store.get(&created.id).await.unwrap().expect("account exists");
        assert_eq!(fetched.username, "alice");
        assert_eq!(fetched.default_quantity, 3);
        assert!(fetched.totp_token.is_none());

        assert!(store.get("missing-id").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_usernames_are_rejected() {
        let store = AccountStore::new(memory_pool().await);
        store.register(new_account("alice")).await.unwrap();

        let err = store.register(new_account("alice")).await.unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn blank_required_fields_are_rejected() {
        let store = AccountStore::new(memory_pool().await);
        let mut blank = new_account("  ");
        blank.username = "   ".into();
        assert!(store.register(blank).await.is_err());
    }

    #[tokio::test]
    async fn csv_import_skips_bad_rows_and_counts_the_rest() {
        let store = AccountStore::new(memory_pool().await);
        store.register(new_account("alice")).await.unwrap();

        let content = "\
bob,shonnay,key-b,totp-b,2
short,row
alice,zerodha,key-dup,totp,4
carol,angel,key-c,,
dave,angel,key-d,totp-d,not-a-number
";
        let imported = store.import_csv(content).await.unwrap();
        // bob and carol import; short row, duplicate alice and dave's bad
        // quantity are skipped
        assert_eq!(imported, 2);

        let all = store.list().await.unwrap();
        assert_eq!(all.len(), 3);

        let carol = store.by_username("carol").await.unwrap().unwrap();
        assert_eq!(carol.default_quantity, 1); // empty quantity falls back to 1
        assert!(carol.totp_token.is_none());
    }
}
