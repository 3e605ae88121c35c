use std::collections::HashMap;

use serde::Serialize;
use tokio::sync::Mutex;

use crate::error::AttendanceError;
use crate::services::ledger::LedgerClient;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Student {
    pub id: String,
    pub name: String,
}

/// In-memory snapshot of the student directory sheet (id → name).
#[derive(Debug, Clone, Default)]
pub struct StudentDirectory {
    by_id: HashMap<String, String>,
}

impl StudentDirectory {
    /// Build from raw directory rows. Row 1 is the header; rows missing an id
    /// or name are dropped; duplicate ids resolve last-write-wins.
    pub fn from_rows(rows: &[Vec<String>]) -> StudentDirectory {
        let mut by_id = HashMap::new();
        for row in rows.iter().skip(1) {
            if row.len() < 2 {
                continue;
            }
            let id = row[0].trim();
            let name = row[1].trim();
            if id.is_empty() || name.is_empty() {
                continue;
            }
            by_id.insert(id.to_string(), name.to_string());
        }
        StudentDirectory { by_id }
    }

    pub fn name_of(&self, student_id: &str) -> Option<&str> {
        self.by_id.get(student_id).map(String::as_str)
    }

    pub fn contains(&self, student_id: &str) -> bool {
        self.by_id.contains_key(student_id)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// All registered students, sorted by id for stable listing.
    pub fn students(&self) -> Vec<Student> {
        let mut students: Vec<Student> = self
            .by_id
            .iter()
            .map(|(id, name)| Student {
                id: id.clone(),
                name: name.clone(),
            })
            .collect();
        students.sort_by(|a, b| a.id.cmp(&b.id));
        students
    }
}

/// Process-lifetime cache for the rarely-changing directory sheet. The
/// attendance ledger is never cached; this one is, with explicit
/// invalidation instead of the implicit memoized global it replaces.
#[derive(Debug, Default)]
pub struct DirectoryCache {
    inner: Mutex<Option<StudentDirectory>>,
}

impl DirectoryCache {
    pub fn new() -> DirectoryCache {
        DirectoryCache::default()
    }

    /// Return the cached directory, fetching it once on first use.
    pub async fn get_or_fetch(
        &self,
        client: &LedgerClient,
    ) -> Result<StudentDirectory, AttendanceError> {
        let mut guard = self.inner.lock().await;
        if let Some(directory) = guard.as_ref() {
            return Ok(directory.clone());
        }
        let rows = client.fetch_directory_rows().await?;
        let directory = StudentDirectory::from_rows(&rows);
        log::info!("cached student directory ({} students)", directory.len());
        *guard = Some(directory.clone());
        Ok(directory)
    }

    /// Drop the snapshot; the next lookup refetches.
    pub async fn invalidate(&self) {
        *self.inner.lock().await = None;
    }
}
