//! Duplicate and near-duplicate lookups over stored fingerprints.

use super::store::{path_to_sql, record_from_row, CatalogStore, MEDIA_COLUMNS};
use crate::core::fingerprint::{hamming_distance, parse_hash};
use crate::core::media::{normalize_path, MediaId, MediaRecord};
use crate::error::StoreError;
use rayon::prelude::*;
use serde::Serialize;
use std::path::Path;

/// Active records sharing one content hash
#[derive(Debug, Clone, Serialize)]
pub struct DuplicateGroup {
    pub content_hash: String,
    /// Sorted by path
    pub records: Vec<MediaRecord>,
}

/// A record whose pHash is close to the probe's
#[derive(Debug, Clone, Serialize)]
pub struct SimilarMatch {
    pub record: MediaRecord,
    /// Differing bits out of 64
    pub distance: u32,
}

impl CatalogStore {
    /// Groups of active records with byte-identical content
    pub fn exact_duplicates(&self, root: Option<&Path>) -> Result<Vec<DuplicateGroup>, StoreError> {
        let root_filter = if root.is_some() { "AND root_dir = ?1" } else { "" };
        let sql = format!(
            "SELECT {columns} FROM media
             WHERE status = 'active' AND sha256 IN (
                 SELECT sha256 FROM media
                 WHERE status = 'active' AND sha256 IS NOT NULL {filter}
                 GROUP BY sha256 HAVING COUNT(*) > 1
             ) {filter}
             ORDER BY sha256, file_path",
            columns = MEDIA_COLUMNS,
            filter = root_filter,
        );

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let records = match root {
            Some(root) => stmt.query_map([path_to_sql(&normalize_path(root))], record_from_row)?,
            None => stmt.query_map([], record_from_row)?,
        }
        .collect::<Result<Vec<_>, _>>()?;

        let mut groups: Vec<DuplicateGroup> = Vec::new();
        for record in records {
            match groups.last_mut() {
                Some(group) if group.content_hash == record.content_hash => {
                    group.records.push(record)
                }
                _ => groups.push(DuplicateGroup {
                    content_hash: record.content_hash.clone(),
                    records: vec![record],
                }),
            }
        }
        Ok(groups)
    }

    /// Active images within `max_distance` bits of `media_id`'s pHash,
    /// nearest first. Empty when the record has no pHash.
    pub fn similar_to(
        &self,
        media_id: MediaId,
        max_distance: u32,
    ) -> Result<Vec<SimilarMatch>, StoreError> {
        let Some(probe) = self
            .get_by_id(media_id)?
            .and_then(|record| parse_hash(&record.perceptual_hash))
        else {
            return Ok(Vec::new());
        };

        let candidates = {
            let conn = self.lock()?;
            let sql = format!(
                "SELECT {} FROM media
                 WHERE status = 'active' AND p_hash IS NOT NULL AND p_hash != '' AND id != ?1",
                MEDIA_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([media_id], record_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };

        let mut matches: Vec<SimilarMatch> = candidates
            .into_par_iter()
            .filter_map(|record| {
                let hash = parse_hash(&record.perceptual_hash)?;
                let distance = hamming_distance(probe, hash);
                (distance <= max_distance).then_some(SimilarMatch { record, distance })
            })
            .collect();

        matches.sort_by(|a, b| a.distance.cmp(&b.distance).then(a.record.id.cmp(&b.record.id)));
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::media::MediaRecord;

    fn image(path: &str, sha: &str, phash: &str) -> MediaRecord {
        let mut record = MediaRecord::new(path, "/media");
        record.content_hash = sha.to_string();
        record.perceptual_hash = phash.to_string();
        record
    }

    #[test]
    fn exact_duplicates_group_by_content_hash() {
        let store = CatalogStore::open_in_memory().unwrap();
        store.upsert(&image("/media/a.jpg", "aaa", "")).unwrap();
        store.upsert(&image("/media/copy-of-a.jpg", "aaa", "")).unwrap();
        store.upsert(&image("/media/b.jpg", "bbb", "")).unwrap();

        let groups = store.exact_duplicates(None).unwrap();

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].content_hash, "aaa");
        assert_eq!(groups[0].records.len(), 2);
    }

    #[test]
    fn deleted_copies_are_not_duplicates() {
        let store = CatalogStore::open_in_memory().unwrap();
        store.upsert(&image("/media/a.jpg", "aaa", "")).unwrap();
        store.upsert(&image("/media/copy.jpg", "aaa", "")).unwrap();
        store.soft_delete(Path::new("/media/copy.jpg")).unwrap();

        assert!(store.exact_duplicates(None).unwrap().is_empty());
        assert!(store
            .exact_duplicates(Some(Path::new("/media")))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn similar_to_returns_nearest_first() {
        let store = CatalogStore::open_in_memory().unwrap();
        let probe = store.upsert(&image("/media/p.jpg", "1", "0000000000000000")).unwrap();
        let far = store.upsert(&image("/media/far.jpg", "2", "00000000000000ff")).unwrap();
        let near = store.upsert(&image("/media/near.jpg", "3", "0000000000000001")).unwrap();
        store.upsert(&image("/media/none.jpg", "4", "")).unwrap();

        let matches = store.similar_to(probe, 10).unwrap();
        let ids: Vec<_> = matches.iter().map(|m| m.record.id).collect();
        assert_eq!(ids, vec![near, far]);
        assert_eq!(matches[0].distance, 1);
        assert_eq!(matches[1].distance, 8);

        assert_eq!(store.similar_to(probe, 4).unwrap().len(), 1);
    }

    #[test]
    fn similar_to_without_phash_is_empty() {
        let store = CatalogStore::open_in_memory().unwrap();
        let id = store.upsert(&image("/media/clip.mp4", "1", "")).unwrap();

        assert!(store.similar_to(id, 64).unwrap().is_empty());
        assert!(store.similar_to(9999, 64).unwrap().is_empty());
    }
}
