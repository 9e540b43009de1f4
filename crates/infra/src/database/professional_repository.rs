//! SQLite-backed professional directory.

use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{params, OptionalExtension};
use slotbook_core::notify::ports::{Contact, ProfessionalDirectory};
use slotbook_domain::Result as DomainResult;
use tokio::task;

use super::appointment_repository::map_join_error;
use super::manager::{map_sql_error, DbManager};

/// SQLite-backed professional directory.
pub struct SqliteProfessionalRepository {
    db: Arc<DbManager>,
}

impl SqliteProfessionalRepository {
    /// Construct a repository backed by the shared manager.
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    /// Create or replace one professional record.
    pub async fn upsert(
        &self,
        professional_id: &str,
        name: &str,
        email: Option<&str>,
    ) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let professional_id = professional_id.to_string();
        let name = name.to_string();
        let email = email.map(str::to_string);

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            conn.execute(
                "INSERT INTO professionals (id, name, email) VALUES (?1, ?2, ?3)
                 ON CONFLICT (id) DO UPDATE SET name = excluded.name, email = excluded.email",
                params![professional_id, name, email],
            )
            .map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }
}

#[async_trait]
impl ProfessionalDirectory for SqliteProfessionalRepository {
    async fn contact_for(&self, professional_id: &str) -> DomainResult<Option<Contact>> {
        let db = Arc::clone(&self.db);
        let professional_id = professional_id.to_string();

        task::spawn_blocking(move || -> DomainResult<Option<Contact>> {
            let conn = db.get_connection()?;
            let row = conn
                .query_row(
                    "SELECT name, email FROM professionals WHERE id = ?1",
                    params![professional_id],
                    |row| Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?)),
                )
                .optional()
                .map_err(map_sql_error)?;

            // A professional without a notification address yields no
            // contact; the notifier records a skip.
            Ok(row.and_then(|(name, email)| email.map(|email| Contact { name, email })))
        })
        .await
        .map_err(map_join_error)?
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    async fn setup() -> (SqliteProfessionalRepository, TempDir) {
        let temp_dir = TempDir::new().expect("temp dir created");
        let manager = DbManager::new(temp_dir.path().join("test.db"), 2).expect("manager");
        manager.run_migrations().expect("migrations");
        (SqliteProfessionalRepository::new(Arc::new(manager)), temp_dir)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn contact_resolution_requires_an_email() {
        let (repo, _tmp) = setup().await;

        repo.upsert("prof-1", "Dr. Bruno", Some("bruno@example.com")).await.expect("upsert");
        repo.upsert("prof-2", "Dr. Carla", None).await.expect("upsert");

        let with_email = repo.contact_for("prof-1").await.expect("lookup");
        assert_eq!(
            with_email,
            Some(Contact { name: "Dr. Bruno".into(), email: "bruno@example.com".into() })
        );

        assert_eq!(repo.contact_for("prof-2").await.expect("lookup"), None);
        assert_eq!(repo.contact_for("prof-missing").await.expect("lookup"), None);
    }
}
