// Notification history: a small JSON ledger of papers already posted.
//
// Maps paper id -> date last notified (YYYY-MM-DD). A paper in the ledger is
// never posted again until its entry is pruned. Loading is fail-open: a
// missing or corrupt file yields an empty ledger, because a duplicate post is
// a better outcome than a pipeline that can't post at all.
//
// Single writer: one pipeline run at a time loads, mutates and saves the
// ledger. Overlapping runs are not supported and take no lock.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Days, Local, NaiveDate};
use tracing::{debug, info, warn};

use crate::papers::HasPaperId;

/// Default number of days an entry is kept.
pub const DEFAULT_RETENTION_DAYS: u32 = 90;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// The persistent notified-paper ledger.
#[derive(Debug)]
pub struct NotificationHistory {
    path: PathBuf,
    notified: BTreeMap<String, String>,
}

impl NotificationHistory {
    /// Load the ledger from `path`. Missing, unreadable or corrupt files are
    /// logged and treated as an empty ledger.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let notified = match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<BTreeMap<String, String>>(&contents) {
                Ok(map) => {
                    debug!(entries = map.len(), path = %path.display(), "Loaded notification history");
                    map
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Notification history is corrupt, starting empty");
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "No notification history yet, starting empty");
                BTreeMap::new()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read notification history, starting empty");
                BTreeMap::new()
            }
        };

        Self { path, notified }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.notified.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notified.is_empty()
    }

    pub fn is_notified(&self, id: &str) -> bool {
        self.notified.contains_key(id)
    }

    /// Date recorded for `id`, if any.
    pub fn notified_on(&self, id: &str) -> Option<&str> {
        self.notified.get(id).map(String::as_str)
    }

    /// Record today's date for every id. Re-marking an id moves its date
    /// forward ("last notified").
    pub fn mark_notified<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.mark_notified_on(ids, Local::now().date_naive());
    }

    /// [`mark_notified`](Self::mark_notified) with an explicit date.
    pub fn mark_notified_on<I, S>(&mut self, ids: I, date: NaiveDate)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let stamp = date.format(DATE_FORMAT).to_string();
        for id in ids {
            self.notified.insert(id.as_ref().to_string(), stamp.clone());
        }
    }

    /// Remove entries older than `retention_days` before today.
    pub fn prune(&mut self, retention_days: u32) -> usize {
        self.prune_at(retention_days, Local::now().date_naive())
    }

    /// Remove entries dated strictly before `today - retention_days`.
    /// An entry dated exactly on the cutoff is kept. Entries whose date
    /// can't be parsed are kept too.
    pub fn prune_at(&mut self, retention_days: u32, today: NaiveDate) -> usize {
        let Some(cutoff) = today.checked_sub_days(Days::new(u64::from(retention_days))) else {
            return 0;
        };

        let before = self.notified.len();
        self.notified.retain(|id, date| match NaiveDate::parse_from_str(date, DATE_FORMAT) {
            Ok(d) => d >= cutoff,
            Err(_) => {
                warn!(paper = %id, date = %date, "Unparseable notification date, keeping entry");
                true
            }
        });

        let removed = before - self.notified.len();
        if removed > 0 {
            info!(removed, cutoff = %cutoff, "Pruned notification history");
        }
        removed
    }

    /// Keep the items not yet in the ledger, preserving input order.
    pub fn filter_new<T: HasPaperId>(&self, items: Vec<T>) -> Vec<T> {
        items
            .into_iter()
            .filter(|item| !self.is_notified(item.paper_id()))
            .collect()
    }

    /// Oldest and newest recorded dates (lexicographic on ISO dates).
    pub fn date_range(&self) -> Option<(&str, &str)> {
        let oldest = self.notified.values().min()?;
        let newest = self.notified.values().max()?;
        Some((oldest.as_str(), newest.as_str()))
    }

    /// Persist the full ledger.
    ///
    /// Written to a sibling temp file, flushed, then renamed over the
    /// destination, so readers see either the old or the new ledger.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create history directory {}", parent.display())
                })?;
            }
        }

        let json = serde_json::to_string_pretty(&self.notified)
            .context("Failed to serialize notification history")?;

        let tmp_path = temp_path_for(&self.path);
        {
            let mut file = std::fs::File::create(&tmp_path)
                .with_context(|| format!("Failed to create {}", tmp_path.display()))?;
            file.write_all(json.as_bytes())
                .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
            file.write_all(b"\n")?;
            file.sync_all()
                .with_context(|| format!("Failed to flush {}", tmp_path.display()))?;
        }

        std::fs::rename(&tmp_path, &self.path).with_context(|| {
            format!(
                "Failed to move {} into place at {}",
                tmp_path.display(),
                self.path.display()
            )
        })?;

        debug!(entries = self.notified.len(), path = %self.path.display(), "Saved notification history");
        Ok(())
    }
}

/// `data/notified.json` -> `data/.notified.json.tmp`
fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "history".to_string());
    path.with_file_name(format!(".{name}.tmp"))
}
