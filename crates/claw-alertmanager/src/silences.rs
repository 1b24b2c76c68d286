//! Silence storage and the silence query engine.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{AlertmanagerError, Result};
use crate::labels::LabelSet;
use crate::matchers::{MatchType, Matcher, matches_filter_labels};
use crate::types::{Silence, SilenceState};

/// Storage form of a matcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatcherRecord {
    /// Label name.
    pub name: String,
    /// Literal value or regex source.
    pub pattern: String,
    /// Comparison performed.
    #[serde(rename = "type")]
    pub match_type: MatchType,
}

/// Storage form of a silence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SilenceRecord {
    /// Identifier; empty for a new silence.
    pub id: String,
    /// Matchers in the order they were given.
    pub matchers: Vec<MatcherRecord>,
    /// Start of the window.
    pub starts_at: DateTime<Utc>,
    /// End of the window.
    pub ends_at: DateTime<Utc>,
    /// When the record was last written.
    pub updated_at: DateTime<Utc>,
    /// Author.
    pub created_by: String,
    /// Reason.
    pub comment: String,
}

/// Converts a silence to its storage form.
#[must_use]
pub fn to_record(silence: &Silence) -> SilenceRecord {
    SilenceRecord {
        id: silence.id.clone(),
        matchers: silence
            .matchers
            .iter()
            .map(|m| MatcherRecord {
                name: m.name().to_string(),
                pattern: m.value().to_string(),
                match_type: m.match_type(),
            })
            .collect(),
        starts_at: silence.starts_at,
        ends_at: silence.ends_at,
        updated_at: silence.updated_at,
        created_by: silence.created_by.clone(),
        comment: silence.comment.clone(),
    }
}

/// Rebuilds a silence from its storage form.
///
/// # Errors
///
/// Returns `InvalidMatcher` if a stored regex no longer compiles.
pub fn from_record(record: SilenceRecord) -> Result<Silence> {
    let matchers = record
        .matchers
        .into_iter()
        .map(|m| Matcher::new(m.match_type, m.name, m.pattern))
        .collect::<Result<Vec<_>>>()?;

    Ok(Silence {
        id: record.id,
        matchers,
        starts_at: record.starts_at,
        ends_at: record.ends_at,
        updated_at: record.updated_at,
        created_by: record.created_by,
        comment: record.comment,
        status: None,
    })
}

/// Stores silences.
pub trait SilenceStore: Send + Sync + fmt::Debug {
    /// Returns the silences with the given ids, or all silences for `None`.
    /// Unknown ids are skipped.
    fn query(&self, ids: Option<&[String]>) -> Result<Vec<SilenceRecord>>;

    /// Inserts a silence (empty id) or replaces an existing one; returns its id.
    ///
    /// # Errors
    ///
    /// Returns `BadData` for an invalid record and `NotFound` for an unknown id.
    fn set(&self, record: SilenceRecord, now: DateTime<Utc>) -> Result<String>;

    /// Ends a silence at `now`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id and `BadData` if already expired.
    fn expire(&self, id: &str, now: DateTime<Utc>) -> Result<()>;
}

/// In-memory silence store.
#[derive(Debug, Default)]
pub struct MemSilences {
    silences: RwLock<HashMap<String, SilenceRecord>>,
}

impl MemSilences {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn validate(record: &SilenceRecord) -> Result<()> {
        if record.matchers.is_empty() {
            return Err(AlertmanagerError::bad_data("at least one matcher required"));
        }
        for m in &record.matchers {
            if m.name.is_empty() {
                return Err(AlertmanagerError::bad_data("matcher name must not be empty"));
            }
        }
        if record.ends_at < record.starts_at {
            return Err(AlertmanagerError::bad_data(
                "end time must not be before start time",
            ));
        }
        Ok(())
    }
}

impl SilenceStore for MemSilences {
    fn query(&self, ids: Option<&[String]>) -> Result<Vec<SilenceRecord>> {
        let silences = self.silences.read();
        Ok(match ids {
            Some(ids) => ids.iter().filter_map(|id| silences.get(id).cloned()).collect(),
            None => silences.values().cloned().collect(),
        })
    }

    fn set(&self, mut record: SilenceRecord, now: DateTime<Utc>) -> Result<String> {
        Self::validate(&record)?;

        let mut silences = self.silences.write();
        if record.id.is_empty() {
            record.id = Uuid::new_v4().to_string();
        } else if !silences.contains_key(&record.id) {
            return Err(AlertmanagerError::silence_not_found(record.id));
        }

        record.updated_at = now;
        let id = record.id.clone();
        silences.insert(id.clone(), record);
        Ok(id)
    }

    fn expire(&self, id: &str, now: DateTime<Utc>) -> Result<()> {
        let mut silences = self.silences.write();
        let record = silences
            .get_mut(id)
            .ok_or_else(|| AlertmanagerError::silence_not_found(id))?;

        match SilenceState::at(record.starts_at, record.ends_at, now) {
            SilenceState::Expired => {
                return Err(AlertmanagerError::bad_data(format!(
                    "silence {id} already expired"
                )));
            }
            SilenceState::Active => record.ends_at = now,
            SilenceState::Pending => {
                record.starts_at = now;
                record.ends_at = now;
            }
        }
        record.updated_at = now;
        Ok(())
    }
}

/// Validates and stores a silence submitted through the API.
///
/// # Errors
///
/// Returns `BadData` if the window is empty or already over, before storage
/// is touched, or the store's error otherwise.
pub fn create_silence(store: &dyn SilenceStore, silence: &Silence, now: DateTime<Utc>) -> Result<String> {
    if silence.starts_at == silence.ends_at {
        return Err(AlertmanagerError::bad_data(
            "start time must not be equal to end time",
        ));
    }
    if silence.ends_at < now {
        return Err(AlertmanagerError::bad_data("end time can't be in the past"));
    }

    let id = store.set(to_record(silence), now)?;
    info!(silence = %id, created_by = %silence.created_by, "silence set");
    Ok(id)
}

/// Fetches one silence with its status at `now`.
///
/// # Errors
///
/// Returns `NotFound` for an unknown id.
pub fn get_silence(store: &dyn SilenceStore, id: &str, now: DateTime<Utc>) -> Result<Silence> {
    let record = store
        .query(Some(&[id.to_string()]))?
        .into_iter()
        .next()
        .ok_or_else(|| AlertmanagerError::silence_not_found(id))?;
    Ok(from_record(record)?.with_status(now))
}

/// Expires a silence.
///
/// # Errors
///
/// Returns the store's error.
pub fn expire_silence(store: &dyn SilenceStore, id: &str, now: DateTime<Utc>) -> Result<()> {
    store.expire(id, now)?;
    info!(silence = %id, "silence expired");
    Ok(())
}

/// Lists silences whose matchers, read as name/value pairs, satisfy `matchers`.
///
/// Results are grouped active, pending, expired. Active silences are sorted
/// by ascending end, pending by ascending start and expired by descending end.
///
/// # Errors
///
/// Returns the store's error or a record that fails to rebuild.
pub fn list_silences(
    store: &dyn SilenceStore,
    matchers: &[Matcher],
    now: DateTime<Utc>,
) -> Result<Vec<Silence>> {
    let mut active = Vec::new();
    let mut pending = Vec::new();
    let mut expired = Vec::new();

    for record in store.query(None)? {
        let silence = from_record(record)?.with_status(now);
        if !matches_filter_labels(matchers, &silence.matcher_labels()) {
            continue;
        }
        match silence.state_at(now) {
            SilenceState::Active => active.push(silence),
            SilenceState::Pending => pending.push(silence),
            SilenceState::Expired => expired.push(silence),
        }
    }

    active.sort_by(|a, b| a.ends_at.cmp(&b.ends_at));
    pending.sort_by(|a, b| a.starts_at.cmp(&b.starts_at));
    expired.sort_by(|a, b| b.ends_at.cmp(&a.ends_at));

    debug!(
        active = active.len(),
        pending = pending.len(),
        expired = expired.len(),
        "listed silences"
    );

    active.extend(pending);
    active.extend(expired);
    Ok(active)
}

/// IDs of the active silences muting `labels`.
///
/// # Errors
///
/// Returns the store's error.
pub fn silenced_by(store: &dyn SilenceStore, labels: &LabelSet, now: DateTime<Utc>) -> Result<Vec<String>> {
    let mut ids = Vec::new();
    for record in store.query(None)? {
        if SilenceState::at(record.starts_at, record.ends_at, now) != SilenceState::Active {
            continue;
        }
        let silence = from_record(record)?;
        if silence.mutes(labels) {
            ids.push(silence.id);
        }
    }
    ids.sort();
    Ok(ids)
}
