//! Staleness bookkeeping for indexed projects.
//!
//! A small flat file records, per project, the date of the last successful
//! full index (`project_id,YYYY-MM-DD`, one line each). A project counts as
//! indexed while that date is less than seven days old, or while an index
//! run for it is currently in flight. The in-flight set is process-local
//! and never persisted.
//!
//! Explicit service object with an injected root directory; callers share
//! one instance rather than reaching for global state.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::RwLock;

use chrono::{NaiveDate, Utc};
use tracing::warn;

use crate::error::Result;

/// File name of the persisted registry, one line per project.
pub const REGISTRY_FILE: &str = "indexed_projects.txt";

/// Days after which a project's index is considered outdated.
pub const STALENESS_DAYS: i64 = 7;

pub struct IndexRegistry {
    root: PathBuf,
    in_flight: RwLock<HashSet<String>>,
}

impl IndexRegistry {
    /// Open (creating root dir and registry file if missing).
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        let path = root.join(REGISTRY_FILE);
        if !path.exists() {
            std::fs::write(&path, "")?;
        }
        Ok(Self {
            root,
            in_flight: RwLock::new(HashSet::new()),
        })
    }

    fn registry_path(&self) -> PathBuf {
        self.root.join(REGISTRY_FILE)
    }

    /// All persisted records. Malformed lines (no date segment, bad date)
    /// are skipped with a warning so one bad line cannot poison the table;
    /// a skipped project simply reads as "needs reindexing".
    pub fn indexed_projects(&self) -> BTreeMap<String, NaiveDate> {
        let path = self.registry_path();
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) => {
                warn!(file = %path.display(), %err, "cannot read index registry, recreating");
                let _ = std::fs::write(&path, "");
                return BTreeMap::new();
            }
        };

        let mut projects = BTreeMap::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match line.split_once(',') {
                Some((project, date)) => match NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d") {
                    Ok(date) => {
                        projects.insert(project.trim().to_string(), date);
                    }
                    Err(err) => {
                        warn!(line, %err, "skipping registry line with invalid date");
                    }
                },
                None => {
                    warn!(line, "skipping registry line without date segment");
                }
            }
        }
        projects
    }

    /// True while an index run is in flight for the project, or while the
    /// last successful index is fresher than the staleness window.
    pub fn is_indexed(&self, project_id: &str) -> bool {
        self.is_indexed_as_of(project_id, Utc::now().date_naive())
    }

    /// Freshness check against an explicit "today". The boundary is
    /// exclusive: day 6 is still indexed, day 7 is not.
    pub fn is_indexed_as_of(&self, project_id: &str, today: NaiveDate) -> bool {
        if self.is_indexing(project_id) {
            return true;
        }
        self.indexed_projects()
            .get(project_id)
            .map(|last| (today - *last).num_days() < STALENESS_DAYS)
            .unwrap_or(false)
    }

    /// Whether an index run is currently in flight for the project.
    pub fn is_indexing(&self, project_id: &str) -> bool {
        self.in_flight
            .read()
            .map(|set| set.contains(project_id))
            .unwrap_or(false)
    }

    /// Record that an index run has started (prevents concurrent re-entry).
    pub fn mark_as_indexing(&self, project_id: &str) {
        if let Ok(mut set) = self.in_flight.write() {
            set.insert(project_id.to_string());
        }
    }

    /// Clear the in-flight marker on completion or cancellation.
    pub fn finish_indexing(&self, project_id: &str) {
        if let Ok(mut set) = self.in_flight.write() {
            set.remove(project_id);
        }
    }

    /// Upsert today's date for the project and rewrite the whole table.
    pub fn mark_as_indexed(&self, project_id: &str) -> Result<()> {
        self.mark_as_indexed_on(project_id, Utc::now().date_naive())
    }

    /// Upsert an explicit date. Exists so staleness boundaries are testable
    /// without touching the wall clock.
    pub fn mark_as_indexed_on(&self, project_id: &str, date: NaiveDate) -> Result<()> {
        let mut projects = self.indexed_projects();
        projects.insert(project_id.to_string(), date);
        self.persist(&projects)
    }

    /// Drop the persisted record, if present.
    pub fn remove_project(&self, project_id: &str) -> Result<()> {
        let mut projects = self.indexed_projects();
        if projects.remove(project_id).is_some() {
            self.persist(&projects)?;
        }
        Ok(())
    }

    fn persist(&self, projects: &BTreeMap<String, NaiveDate>) -> Result<()> {
        let mut content = String::new();
        for (project, date) in projects {
            content.push_str(project);
            content.push(',');
            content.push_str(&date.format("%Y-%m-%d").to_string());
            content.push('\n');
        }
        std::fs::write(self.registry_path(), content)?;
        Ok(())
    }
}
