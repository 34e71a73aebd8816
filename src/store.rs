use sqlx::{
    Pool, Sqlite,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};

use std::str::FromStr;

use crate::{
    errors::{StoreError, StoreResult},
    models::{Contact, ContactPatch, NewContact},
    settings::Settings,
};

const SELECT_CONTACT: &str = "SELECT id, first_name, last_name, email, phone, birthday, extra, \
     preferred_contact_method, sent FROM contacts";

/// Contact records persisted in a single SQLite table.
///
/// Cloning is cheap, clones share the underlying pool.
#[derive(Clone)]
pub struct ContactStore {
    pool: Pool<Sqlite>,
}

impl ContactStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    pub async fn connect(settings: &Settings) -> StoreResult<Self> {
        tracing::info!("Connecting to database");

        let connect_options = SqliteConnectOptions::from_str(&settings.database_url)
            .map_err(StoreError::Unavailable)?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(settings.max_connections)
            .connect_with(connect_options)
            .await
            .map_err(StoreError::Unavailable)?;

        Ok(Self::new(pool))
    }

    pub async fn ensure_schema(&self) -> StoreResult<()> {
        tracing::info!("Ensuring contacts table exists");

        sqlx::query(
            r#"
    CREATE TABLE IF NOT EXISTS contacts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            phone TEXT,
            birthday TEXT,
            extra TEXT,
            preferred_contact_method TEXT
                CHECK (preferred_contact_method IN ('email', 'sms')),
            sent INTEGER NOT NULL DEFAULT 0,
            first_name_folded TEXT NOT NULL,
            last_name_folded TEXT NOT NULL,
            email_folded TEXT NOT NULL)"#,
        )
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        for index in [
            "CREATE INDEX IF NOT EXISTS ix_contacts_first_name ON contacts (first_name)",
            "CREATE INDEX IF NOT EXISTS ix_contacts_last_name ON contacts (last_name)",
        ] {
            sqlx::query(index)
                .execute(&self.pool)
                .await
                .map_err(StoreError::from_sqlx)?;
        }

        Ok(())
    }

    /// Round trip to the database, used by the health check.
    pub async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub async fn create(&self, new: NewContact) -> StoreResult<Contact> {
        let result = sqlx::query(
            "INSERT INTO contacts (first_name, last_name, email, phone, birthday, extra, \
             preferred_contact_method, sent, first_name_folded, last_name_folded, email_folded) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&new.first_name)
        .bind(&new.last_name)
        .bind(&new.email)
        .bind(&new.phone)
        .bind(new.birthday)
        .bind(&new.extra)
        .bind(new.preferred_contact_method)
        .bind(new.sent)
        .bind(new.first_name.to_lowercase())
        .bind(new.last_name.to_lowercase())
        .bind(new.email.to_lowercase())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::from_write(e, &new.email))?;

        let id = result.last_insert_rowid();
        tracing::debug!("Created contact {}", id);

        Ok(Contact::from_new(id, new))
    }

    pub async fn get(&self, id: i64) -> StoreResult<Option<Contact>> {
        sqlx::query_as::<_, Contact>(&format!("{SELECT_CONTACT} WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)
    }

    /// Contacts in insertion order. An offset past the end yields an empty page.
    pub async fn list(&self, offset: u32, limit: u32) -> StoreResult<Vec<Contact>> {
        sqlx::query_as::<_, Contact>(&format!("{SELECT_CONTACT} ORDER BY id LIMIT ? OFFSET ?"))
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)
    }

    /// Contacts whose first name, last name or email contains `needle`,
    /// ignoring case. Matching runs on the lowercased `*_folded` columns since
    /// SQLite only folds ASCII.
    pub async fn search(&self, needle: &str, offset: u32, limit: u32) -> StoreResult<Vec<Contact>> {
        sqlx::query_as::<_, Contact>(&format!(
            "{SELECT_CONTACT} WHERE instr(first_name_folded, ?1) > 0 \
             OR instr(last_name_folded, ?1) > 0 \
             OR instr(email_folded, ?1) > 0 \
             ORDER BY id LIMIT ?2 OFFSET ?3"
        ))
        .bind(needle.to_lowercase())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)
    }

    /// Snapshot of every contact that has a birthday, in insertion order.
    pub async fn with_birthdays(&self) -> StoreResult<Vec<Contact>> {
        sqlx::query_as::<_, Contact>(&format!(
            "{SELECT_CONTACT} WHERE birthday IS NOT NULL ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)
    }

    /// Replace every mutable attribute of contact `id`.
    pub async fn update_full(&self, id: i64, new: NewContact) -> StoreResult<Contact> {
        let contact = Contact::from_new(id, new);
        let mut connection = self.pool.acquire().await.map_err(StoreError::from_sqlx)?;

        let updated = write_contact(&mut *connection, &contact).await?;
        if !updated {
            return Err(StoreError::NotFound(id));
        }

        tracing::debug!("Replaced contact {}", id);
        Ok(contact)
    }

    /// Overwrite only the fields supplied in `patch`.
    pub async fn update_partial(&self, id: i64, patch: ContactPatch) -> StoreResult<Contact> {
        let mut tx = self.pool.begin().await.map_err(StoreError::from_sqlx)?;

        let mut contact = sqlx::query_as::<_, Contact>(&format!("{SELECT_CONTACT} WHERE id = ?"))
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(StoreError::from_sqlx)?
            .ok_or(StoreError::NotFound(id))?;

        if patch.is_empty() {
            return Ok(contact);
        }

        patch.apply(&mut contact);
        write_contact(&mut *tx, &contact).await?;
        tx.commit().await.map_err(StoreError::from_sqlx)?;

        tracing::debug!("Patched contact {}", id);
        Ok(contact)
    }

    /// Returns whether a contact was deleted.
    pub async fn delete(&self, id: i64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM contacts WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            tracing::debug!("Deleted contact {}", id);
        }
        Ok(deleted)
    }
}

async fn write_contact(
    connection: &mut sqlx::SqliteConnection,
    contact: &Contact,
) -> StoreResult<bool> {
    let result = sqlx::query(
        "UPDATE contacts SET first_name = ?, last_name = ?, email = ?, phone = ?, \
         birthday = ?, extra = ?, preferred_contact_method = ?, sent = ?, \
         first_name_folded = ?, last_name_folded = ?, email_folded = ? WHERE id = ?",
    )
    .bind(&contact.first_name)
    .bind(&contact.last_name)
    .bind(&contact.email)
    .bind(&contact.phone)
    .bind(contact.birthday)
    .bind(&contact.extra)
    .bind(contact.preferred_contact_method)
    .bind(contact.sent)
    .bind(contact.first_name.to_lowercase())
    .bind(contact.last_name.to_lowercase())
    .bind(contact.email.to_lowercase())
    .bind(contact.id)
    .execute(connection)
    .await
    .map_err(|e| StoreError::from_write(e, &contact.email))?;

    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    use chrono::NaiveDate;
    use crate::models::{ContactMethod, Patch};

    pub(crate) async fn memory_store() -> ContactStore {
        // Every in-memory connection is its own database, so pin the pool to one
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = ContactStore::new(pool);
        store.ensure_schema().await.unwrap();
        store
    }

    fn full_contact() -> NewContact {
        NewContact {
            phone: Some("+380123456789".into()),
            extra: Some("college friend".into()),
            preferred_contact_method: Some(ContactMethod::Sms),
            ..NewContact::new("Ivan", "Ivanenko", "ivan@example.com")
        }
        .with_birthday(NaiveDate::from_ymd_opt(1990, 5, 20).unwrap())
    }

    #[tokio::test]
    async fn create_then_get_round_trips_every_field() {
        let store = memory_store().await;

        let created = store.create(full_contact()).await.unwrap();
        let fetched = store.get(created.id).await.unwrap().unwrap();

        assert_eq!(created, fetched);
        assert_eq!(fetched.preferred_contact_method, Some(ContactMethod::Sms));
        assert!(!fetched.sent);
    }

    #[tokio::test]
    async fn get_missing_is_none() {
        let store = memory_store().await;
        assert_eq!(store.get(42).await.unwrap(), None);
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let store = memory_store().await;
        store.create(full_contact()).await.unwrap();

        let err = store
            .create(NewContact::new("Other", "Person", "ivan@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail(email) if email == "ivan@example.com"));
        assert_eq!(store.list(0, 100).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn list_pages_in_insertion_order() {
        let store = memory_store().await;
        for i in 0..5 {
            store
                .create(NewContact::new("P", &format!("N{i}"), &format!("p{i}@example.com")))
                .await
                .unwrap();
        }

        let page = store.list(1, 2).await.unwrap();
        let names: Vec<_> = page.iter().map(|c| c.last_name.as_str()).collect();
        assert_eq!(names, vec!["N1", "N2"]);

        assert!(store.list(10, 2).await.unwrap().is_empty());
        assert!(store.list(0, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn search_matches_names_and_email_case_insensitively() {
        let store = memory_store().await;
        store
            .create(NewContact::new("Anna", "Smith", "anna@example.com"))
            .await
            .unwrap();
        store
            .create(NewContact::new("Bob", "Hannagan", "bob@example.com"))
            .await
            .unwrap();
        store
            .create(NewContact::new("Carl", "Jones", "carl@ANNEX.org"))
            .await
            .unwrap();

        let found = store.search("ANN", 0, 100).await.unwrap();
        let firsts: Vec<_> = found.iter().map(|c| c.first_name.as_str()).collect();
        assert_eq!(firsts, vec!["Anna", "Bob", "Carl"]);

        let found = store.search("ann", 1, 1).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].first_name, "Bob");

        assert!(store.search("zzz", 0, 100).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn search_treats_wildcards_literally() {
        let store = memory_store().await;
        store
            .create(NewContact::new("Under_score", "X", "u@example.com"))
            .await
            .unwrap();
        store
            .create(NewContact::new("Underscore", "Y", "v@example.com"))
            .await
            .unwrap();

        let found = store.search("r_s", 0, 100).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].first_name, "Under_score");
        assert!(store.search("%", 0, 100).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_full_replaces_all_attributes() {
        let store = memory_store().await;
        let created = store.create(full_contact()).await.unwrap();

        let replacement = NewContact::new("Petro", "Petrenko", "petro@example.com");
        let updated = store.update_full(created.id, replacement).await.unwrap();

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.first_name, "Petro");
        assert_eq!(updated.phone, None);
        assert_eq!(updated.birthday, None);
        assert_eq!(store.get(created.id).await.unwrap(), Some(updated));
    }

    #[tokio::test]
    async fn update_full_missing_is_not_found() {
        let store = memory_store().await;
        let err = store.update_full(7, full_contact()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(7)));
    }

    #[tokio::test]
    async fn update_into_taken_email_is_duplicate() {
        let store = memory_store().await;
        store.create(full_contact()).await.unwrap();
        let other = store
            .create(NewContact::new("Olena", "Koval", "olena@example.com"))
            .await
            .unwrap();

        let patch = ContactPatch {
            email: Patch::Value("ivan@example.com".into()),
            ..Default::default()
        };
        let err = store.update_partial(other.id, patch).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail(_)));
        assert_eq!(
            store.get(other.id).await.unwrap().unwrap().email,
            "olena@example.com"
        );
    }

    #[tokio::test]
    async fn update_partial_touches_only_supplied_fields() {
        let store = memory_store().await;
        let created = store.create(full_contact()).await.unwrap();

        let patch = ContactPatch {
            phone: Patch::Null,
            sent: Patch::Value(true),
            ..Default::default()
        };
        let updated = store.update_partial(created.id, patch).await.unwrap();

        assert_eq!(updated.phone, None);
        assert!(updated.sent);
        assert_eq!(updated.first_name, created.first_name);
        assert_eq!(updated.birthday, created.birthday);
        assert_eq!(updated.extra, created.extra);
        assert_eq!(store.get(created.id).await.unwrap(), Some(updated));
    }

    #[tokio::test]
    async fn empty_patch_leaves_contact_unchanged() {
        let store = memory_store().await;
        let created = store.create(full_contact()).await.unwrap();

        let updated = store
            .update_partial(created.id, ContactPatch::default())
            .await
            .unwrap();
        assert_eq!(updated, created);
    }

    #[tokio::test]
    async fn update_partial_missing_is_not_found() {
        let store = memory_store().await;
        let err = store
            .update_partial(3, ContactPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(3)));
    }

    #[tokio::test]
    async fn delete_is_permanent_and_idempotent() {
        let store = memory_store().await;
        let created = store.create(full_contact()).await.unwrap();

        assert!(store.delete(created.id).await.unwrap());
        assert_eq!(store.get(created.id).await.unwrap(), None);
        assert!(!store.delete(created.id).await.unwrap());
        assert!(!store.delete(created.id).await.unwrap());
    }

    #[tokio::test]
    async fn ids_are_not_reused_after_delete() {
        let store = memory_store().await;
        let first = store.create(full_contact()).await.unwrap();
        store.delete(first.id).await.unwrap();

        let second = store.create(full_contact()).await.unwrap();
        assert!(second.id > first.id);
    }

    #[tokio::test]
    async fn with_birthdays_skips_contacts_without_one() {
        let store = memory_store().await;
        store.create(full_contact()).await.unwrap();
        store
            .create(NewContact::new("No", "Birthday", "nobday@example.com"))
            .await
            .unwrap();

        let snapshot = store.with_birthdays().await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].email, "ivan@example.com");
    }

    #[tokio::test]
    async fn search_folds_non_ascii_case() {
        let store = memory_store().await;
        store
            .create(NewContact::new("Іван", "Іваненко", "ivan@example.com"))
            .await
            .unwrap();
        store
            .create(NewContact::new("Олена", "Коваль", "olena@example.com"))
            .await
            .unwrap();

        for needle in ["іван", "Іван", "ІВАН", "ненко"] {
            let found = store.search(needle, 0, 100).await.unwrap();
            assert_eq!(found.len(), 1, "{needle}");
            assert_eq!(found[0].first_name, "Іван");
        }

        let found = store.search("КОВАЛЬ", 0, 100).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].last_name, "Коваль");
    }

    #[tokio::test]
    async fn search_follows_updated_names() {
        let store = memory_store().await;
        let created = store
            .create(NewContact::new("Олена", "Коваль", "olena@example.com"))
            .await
            .unwrap();

        let patch = ContactPatch {
            first_name: Patch::Value("Оксана".into()),
            ..Default::default()
        };
        store.update_partial(created.id, patch).await.unwrap();

        assert_eq!(store.search("оксана", 0, 100).await.unwrap().len(), 1);
        assert!(store.search("олена", 0, 100).await.unwrap().is_empty());

        let replacement = NewContact::new("Марія", "Коваль", "olena@example.com");
        store.update_full(created.id, replacement).await.unwrap();
        assert_eq!(store.search("МАРІЯ", 0, 100).await.unwrap().len(), 1);
        assert!(store.search("оксана", 0, 100).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_full_into_taken_email_is_duplicate() {
        let store = memory_store().await;
        store.create(full_contact()).await.unwrap();
        let other = store
            .create(NewContact::new("Olena", "Koval", "olena@example.com"))
            .await
            .unwrap();

        let replacement = NewContact::new("Olena", "Koval", "ivan@example.com");
        let err = store.update_full(other.id, replacement).await.unwrap_err();

        assert!(matches!(err, StoreError::DuplicateEmail(email) if email == "ivan@example.com"));
        assert_eq!(store.get(other.id).await.unwrap(), Some(other));
    }

    #[tokio::test]
    async fn ping_reports_closed_pool_as_unavailable() {
        let store = memory_store().await;
        assert!(store.ping().await.is_ok());

        store.close().await;
        let err = store.ping().await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }
}
