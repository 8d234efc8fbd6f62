//! Tag associations.

use super::store::CatalogStore;
use super::{normalize_tag, normalize_tags};
use crate::core::media::MediaId;
use crate::error::StoreError;
use crate::events::CatalogEvent;
use rusqlite::{params, OptionalExtension, Transaction};
use serde::Serialize;

/// A tag and how many active records carry it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagCount {
    pub name: String,
    pub count: usize,
}

/// Insert missing tags and return their ids in input order
fn upsert_tag_ids(tx: &Transaction<'_>, names: &[String]) -> Result<Vec<i64>, StoreError> {
    let mut insert = tx.prepare("INSERT INTO tags (name) VALUES (?1) ON CONFLICT(name) DO NOTHING")?;
    let mut select = tx.prepare("SELECT id FROM tags WHERE name = ?1")?;

    let mut ids = Vec::with_capacity(names.len());
    for name in names {
        insert.execute([name])?;
        ids.push(select.query_row([name], |row| row.get(0))?);
    }
    Ok(ids)
}

fn link_tags(tx: &Transaction<'_>, media_id: MediaId, tag_ids: &[i64]) -> Result<(), StoreError> {
    let mut link =
        tx.prepare("INSERT OR IGNORE INTO media_tags (media_id, tag_id) VALUES (?1, ?2)")?;
    for tag_id in tag_ids {
        link.execute(params![media_id, tag_id])?;
    }
    Ok(())
}

impl CatalogStore {
    /// Replace the tags of a record with `names`
    pub fn set_tags<S: AsRef<str>>(&self, media_id: MediaId, names: &[S]) -> Result<(), StoreError> {
        let names = normalize_tags(names);
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let tag_ids = upsert_tag_ids(&tx, &names)?;
        tx.execute("DELETE FROM media_tags WHERE media_id = ?1", [media_id])?;
        link_tags(&tx, media_id, &tag_ids)?;
        tx.commit()?;
        drop(conn);

        self.notify(CatalogEvent::TagsChanged);
        Ok(())
    }

    /// Add `names` to the tags of a record
    pub fn add_tags<S: AsRef<str>>(&self, media_id: MediaId, names: &[S]) -> Result<(), StoreError> {
        let names = normalize_tags(names);
        if names.is_empty() {
            return Ok(());
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let tag_ids = upsert_tag_ids(&tx, &names)?;
        link_tags(&tx, media_id, &tag_ids)?;
        tx.commit()?;
        drop(conn);

        self.notify(CatalogEvent::TagsChanged);
        Ok(())
    }

    /// Remove `names` from the tags of a record. Tag rows are kept.
    pub fn remove_tags<S: AsRef<str>>(&self, media_id: MediaId, names: &[S]) -> Result<(), StoreError> {
        let names = normalize_tags(names);
        if names.is_empty() {
            return Ok(());
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut unlink = tx.prepare(
                "DELETE FROM media_tags
                 WHERE media_id = ?1 AND tag_id = (SELECT id FROM tags WHERE name = ?2)",
            )?;
            for name in &names {
                unlink.execute(params![media_id, name])?;
            }
        }
        tx.commit()?;
        drop(conn);

        self.notify(CatalogEvent::TagsChanged);
        Ok(())
    }

    /// Detach a tag from every record and delete the tag itself.
    ///
    /// Returns the number of associations removed.
    pub fn remove_tag_globally(&self, name: &str) -> Result<usize, StoreError> {
        let name = normalize_tag(name);
        if name.is_empty() {
            return Ok(0);
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let tag_id: Option<i64> = tx
            .query_row("SELECT id FROM tags WHERE name = ?1", [&name], |row| row.get(0))
            .optional()?;
        let Some(tag_id) = tag_id else {
            return Ok(0);
        };

        let affected = tx.execute("DELETE FROM media_tags WHERE tag_id = ?1", [tag_id])?;
        tx.execute(
            "DELETE FROM tags WHERE id = ?1
             AND NOT EXISTS (SELECT 1 FROM media_tags WHERE tag_id = ?1)",
            [tag_id],
        )?;
        tx.commit()?;
        drop(conn);

        self.notify(CatalogEvent::TagsChanged);
        Ok(affected)
    }

    /// Tag names of one record, sorted
    pub fn tags_for(&self, media_id: MediaId) -> Result<Vec<String>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT t.name FROM tags t
             JOIN media_tags mt ON mt.tag_id = t.id
             WHERE mt.media_id = ?1
             ORDER BY t.name ASC",
        )?;
        let names = stmt
            .query_map([media_id], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(names)
    }

    /// Every known tag name, sorted
    pub fn all_tags(&self) -> Result<Vec<String>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT name FROM tags ORDER BY name ASC")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(names)
    }

    /// Every tag with its number of active records, sorted by name
    pub fn tag_counts(&self) -> Result<Vec<TagCount>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT t.name, COUNT(m.id)
             FROM tags t
             LEFT JOIN media_tags mt ON mt.tag_id = t.id
             LEFT JOIN media m ON m.id = mt.media_id AND m.status = 'active'
             GROUP BY t.id
             ORDER BY t.name ASC",
        )?;
        let counts = stmt
            .query_map([], |row| {
                Ok(TagCount {
                    name: row.get(0)?,
                    count: row.get::<_, i64>(1)? as usize,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(counts)
    }

    /// Active records without any tag
    pub fn untagged_count(&self) -> Result<usize, StoreError> {
        let count: i64 = self.lock()?.query_row(
            "SELECT COUNT(*) FROM media
             WHERE status = 'active'
             AND id NOT IN (SELECT DISTINCT media_id FROM media_tags)",
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::media::MediaRecord;
    use crate::events::{Event, EventChannel};
    use std::path::Path;

    fn store_with(paths: &[&str]) -> (CatalogStore, Vec<MediaId>) {
        let store = CatalogStore::open_in_memory().unwrap();
        let ids = paths
            .iter()
            .map(|p| store.upsert(&MediaRecord::new(*p, "/media")).unwrap())
            .collect();
        (store, ids)
    }

    #[test]
    fn tags_are_normalized_on_storage() {
        let (store, ids) = store_with(&["/media/a.jpg"]);
        store.add_tags(ids[0], &["  Beach ", "BEACH", "Sunset"]).unwrap();

        assert_eq!(store.tags_for(ids[0]).unwrap(), vec!["beach", "sunset"]);
        assert_eq!(store.all_tags().unwrap(), vec!["beach", "sunset"]);
    }

    #[test]
    fn set_tags_replaces_existing() {
        let (store, ids) = store_with(&["/media/a.jpg"]);
        store.add_tags(ids[0], &["one", "two"]).unwrap();
        store.set_tags(ids[0], &["three"]).unwrap();

        assert_eq!(store.tags_for(ids[0]).unwrap(), vec!["three"]);
    }

    #[test]
    fn remove_tags_is_case_insensitive() {
        let (store, ids) = store_with(&["/media/a.jpg"]);
        store.add_tags(ids[0], &["keep", "drop"]).unwrap();
        store.remove_tags(ids[0], &[" DROP "]).unwrap();

        assert_eq!(store.tags_for(ids[0]).unwrap(), vec!["keep"]);
        assert!(store.all_tags().unwrap().contains(&"drop".to_string()));
    }

    #[test]
    fn remove_tag_globally_deletes_the_tag_row() {
        let (store, ids) = store_with(&["/media/a.jpg", "/media/b.jpg"]);
        store.add_tags(ids[0], &["old"]).unwrap();
        store.add_tags(ids[1], &["old", "new"]).unwrap();

        assert_eq!(store.remove_tag_globally("OLD").unwrap(), 2);
        assert_eq!(store.all_tags().unwrap(), vec!["new"]);
        assert_eq!(store.remove_tag_globally("old").unwrap(), 0);
    }

    #[test]
    fn tag_counts_ignore_deleted_records() {
        let (store, ids) = store_with(&["/media/a.jpg", "/media/b.jpg"]);
        store.add_tags(ids[0], &["x"]).unwrap();
        store.add_tags(ids[1], &["x"]).unwrap();
        store.soft_delete(Path::new("/media/b.jpg")).unwrap();

        assert_eq!(
            store.tag_counts().unwrap(),
            vec![TagCount {
                name: "x".to_string(),
                count: 1
            }]
        );
    }

    #[test]
    fn untagged_count_counts_active_records() {
        let (store, ids) = store_with(&["/media/a.jpg", "/media/b.jpg", "/media/c.jpg"]);
        store.add_tags(ids[0], &["x"]).unwrap();
        store.soft_delete(Path::new("/media/c.jpg")).unwrap();

        assert_eq!(store.untagged_count().unwrap(), 1);
    }

    #[test]
    fn tag_mutations_emit_tags_changed() {
        let (sender, receiver) = EventChannel::new();
        let store = CatalogStore::open_in_memory().unwrap().with_events(sender);
        let id = store.upsert(&MediaRecord::new("/media/a.jpg", "/media")).unwrap();
        while receiver.try_recv().is_some() {}

        store.add_tags(id, &["x"]).unwrap();

        assert!(matches!(
            receiver.try_recv(),
            Some(Event::Catalog(CatalogEvent::TagsChanged))
        ));
    }
}
