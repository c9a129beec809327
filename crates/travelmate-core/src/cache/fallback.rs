use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::models::{PlanRecord, TravelPlan};

/// Prefix of identifiers assigned to plans saved locally.
pub const LOCAL_ID_PREFIX: &str = "plan_";

/// Name of the slot holding the most recent local write.
const CURRENT_SLOT: &str = "current";

/// Owner id to local plan ids.
const OWNERS_INDEX: &str = "owners";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self::at(data, Utc::now())
    }

    fn at(data: T, cached_at: DateTime<Utc>) -> Self {
        Self { data, cached_at }
    }

    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.cached_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            // Also covers clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            format!("{}h ago", (minutes + 30) / 60)
        } else {
            format!("{}d ago", (minutes + 720) / 1440)
        }
    }
}

/// Whether `id` can name a file in the cache directory.
fn is_storable_id(id: &str) -> bool {
    !id.is_empty()
        && id != CURRENT_SLOT
        && id != OWNERS_INDEX
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Local persistence for plan writes the server could not take.
///
/// Each record is one JSON file. The most recent write is also kept in a
/// `current` slot, and an owner index lets records be listed per user.
pub struct FallbackCache {
    dir: PathBuf,
}

impl FallbackCache {
    pub fn new(dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create cache directory: {}", dir.display()))?;
        Ok(Self { dir })
    }

    fn cache_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", name))
    }

    fn load<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        let path = self.cache_path(name);
        if !path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read cache file: {}", name))?;

        let cached = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse cache file: {}", name))?;

        Ok(Some(cached))
    }

    fn save<T: Serialize>(&self, name: &str, data: &T) -> Result<()> {
        let path = self.cache_path(name);
        let tmp = self.dir.join(format!("{}.json.tmp", name));
        let contents = serde_json::to_string_pretty(data)?;
        std::fs::write(&tmp, contents)
            .with_context(|| format!("Failed to write cache file: {}", name))?;
        std::fs::rename(&tmp, &path)
            .with_context(|| format!("Failed to replace cache file: {}", name))?;
        Ok(())
    }

    fn owners(&self) -> Result<BTreeMap<String, Vec<String>>> {
        Ok(self.load(OWNERS_INDEX)?.unwrap_or_default())
    }

    /// First free synthetic id at or after `now`.
    fn next_id(&self, now: DateTime<Utc>) -> String {
        let mut millis = now.timestamp_millis();
        loop {
            let id = format!("{}{}", LOCAL_ID_PREFIX, millis);
            if !self.cache_path(&id).exists() {
                return id;
            }
            millis += 1;
        }
    }

    /// Persist `plan` locally and return it as a stored record.
    ///
    /// A plan that already carries an id keeps it, so saving a local draft
    /// twice replaces it. Otherwise a synthetic id is assigned.
    pub fn store(&self, plan: &TravelPlan) -> Result<PlanRecord> {
        self.store_at(plan, Utc::now())
    }

    pub(crate) fn store_at(&self, plan: &TravelPlan, now: DateTime<Utc>) -> Result<PlanRecord> {
        let plan_id = match plan.plan_id.as_deref() {
            Some(id) if is_storable_id(id) => id.to_string(),
            Some(id) => anyhow::bail!("Plan id cannot be stored locally: {:?}", id),
            None => self.next_id(now),
        };
        let stamp = now.to_rfc3339_opts(SecondsFormat::Millis, true);

        let record = PlanRecord {
            plan_id: plan_id.clone(),
            matching_enabled: plan.matching_info.is_some(),
            created_at: stamp.clone(),
            updated_at: stamp,
            plan: TravelPlan {
                plan_id: None,
                ..plan.clone()
            },
        };

        let cached = CachedData::at(&record, now);
        self.save(&plan_id, &cached)?;
        self.save(CURRENT_SLOT, &cached)?;

        let mut owners = self.owners()?;
        let ids = owners.entry(record.plan.user_id.clone()).or_default();
        if !ids.contains(&plan_id) {
            ids.push(plan_id.clone());
            self.save(OWNERS_INDEX, &owners)?;
        }

        info!(plan_id = %plan_id, owner = %record.plan.user_id, "Plan saved to fallback cache");
        Ok(record)
    }

    pub fn load_plan(&self, plan_id: &str) -> Result<Option<CachedData<PlanRecord>>> {
        if !is_storable_id(plan_id) {
            debug!(plan_id, "Id cannot name a cached plan");
            return Ok(None);
        }
        self.load(plan_id)
    }

    /// The most recent local write, if any.
    pub fn latest(&self) -> Result<Option<CachedData<PlanRecord>>> {
        self.load(CURRENT_SLOT)
    }

    /// Local records saved for `owner`, oldest first.
    ///
    /// Index entries whose file has gone missing are skipped.
    pub fn owned_by(&self, owner: &str) -> Result<Vec<PlanRecord>> {
        let owners = self.owners()?;
        let Some(ids) = owners.get(owner) else {
            return Ok(Vec::new());
        };

        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            match self.load_plan(id) {
                Ok(Some(cached)) => records.push(cached.data),
                Ok(None) => debug!(plan_id = %id, "Indexed plan missing from cache"),
                Err(e) => warn!(plan_id = %id, error = %e, "Skipping unreadable cached plan"),
            }
        }
        Ok(records)
    }

    /// Delete a local record. Returns false when there was nothing to delete.
    pub fn remove(&self, plan_id: &str) -> Result<bool> {
        let Some(cached) = self.load_plan(plan_id)? else {
            return Ok(false);
        };

        let mut owners = self.owners()?;
        if let Some(ids) = owners.get_mut(&cached.data.plan.user_id) {
            ids.retain(|id| id != plan_id);
            if ids.is_empty() {
                owners.remove(&cached.data.plan.user_id);
            }
            self.save(OWNERS_INDEX, &owners)?;
        }

        std::fs::remove_file(self.cache_path(plan_id))
            .with_context(|| format!("Failed to remove cache file: {}", plan_id))?;

        if let Some(current) = self.latest()? {
            if current.data.plan_id == plan_id {
                std::fs::remove_file(self.cache_path(CURRENT_SLOT))
                    .context("Failed to clear current plan slot")?;
            }
        }

        info!(plan_id, "Plan removed from fallback cache");
        Ok(true)
    }
}
