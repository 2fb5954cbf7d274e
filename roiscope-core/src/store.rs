//! Region store service.
//!
//! Owns one copy-on-write [`RegionSet`] per image. Readers take an
//! `Arc<RegionSet>` snapshot and iterate it without holding any lock while
//! producers keep appending; a writer clones the set only when a snapshot
//! of it is still alive.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::region::{Region, RegionId};
use crate::set::RegionSet;

/// Change notification emitted by [`RegionStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegionEvent {
    Added { id: RegionId, image: String },
    Removed { id: RegionId, image: String },
    Updated { image: String },
    /// One image cleared, or every image when `image` is `None`.
    Cleared { image: Option<String> },
}

/// Observer for store mutations. Called after the store lock is released.
pub trait RegionListener: Send + Sync {
    fn on_event(&self, event: &RegionEvent);
}

/// Counts reported by [`RegionStore::statistics`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStatistics {
    pub image_count: usize,
    pub total_regions: usize,
    pub ignored_regions: usize,
    pub per_image: BTreeMap<String, usize>,
}

/// Per-image region registry, shared by reference between components.
#[derive(Default)]
pub struct RegionStore {
    sets: RwLock<HashMap<String, Arc<RegionSet>>>,
    listeners: RwLock<Vec<Arc<dyn RegionListener>>>,
}

impl std::fmt::Debug for RegionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegionStore")
            .field("images", &self.sets.read().len())
            .field("listeners", &self.listeners.read().len())
            .finish()
    }
}

impl RegionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener(&self, listener: Arc<dyn RegionListener>) {
        self.listeners.write().push(listener);
    }

    pub fn clear_listeners(&self) {
        self.listeners.write().clear();
    }

    fn notify(&self, events: &[RegionEvent]) {
        let listeners = self.listeners.read().clone();
        for event in events {
            for listener in &listeners {
                listener.on_event(event);
            }
        }
    }

    fn contains_id(sets: &HashMap<String, Arc<RegionSet>>, id: RegionId) -> bool {
        sets.values().any(|set| set.contains(id))
    }

    /// Adds a region to its image's set.
    ///
    /// Returns `false` (and changes nothing) when the id is already stored
    /// under any image.
    ///
    /// # Errors
    /// Propagates [`RegionSet::insert`] errors.
    pub fn add(&self, region: Region) -> Result<bool> {
        let id = region.id();
        let image = region.source_image().to_string();
        {
            let mut sets = self.sets.write();
            if Self::contains_id(&sets, id) {
                log::debug!("Skipping duplicate region {id}");
                return Ok(false);
            }
            let set = sets
                .entry(image.clone())
                .or_insert_with(|| Arc::new(RegionSet::new(image.clone())));
            Arc::make_mut(set).insert(region)?;
        }
        log::trace!("Added region {id} to '{image}'");
        self.notify(&[RegionEvent::Added { id, image }]);
        Ok(true)
    }

    /// Adds every region, skipping duplicates. Returns how many were added.
    ///
    /// # Errors
    /// Stops at the first region its image set rejects.
    pub fn add_all<I>(&self, regions: I) -> Result<usize>
    where
        I: IntoIterator<Item = Region>,
    {
        let mut added = 0;
        for region in regions {
            added += usize::from(self.add(region)?);
        }
        Ok(added)
    }

    /// Inserts a cell with its parts, linked, into the cell's image set.
    ///
    /// # Errors
    /// [`Error::DuplicateRegion`] if any part is already stored, otherwise
    /// as [`RegionSet::insert_cell`].
    pub fn add_cell(
        &self,
        cell: Region,
        nucleus: Option<Region>,
        cytoplasm: Option<Region>,
    ) -> Result<RegionId> {
        let image = cell.source_image().to_string();
        let mut ids = vec![cell.id()];
        ids.extend(nucleus.as_ref().map(Region::id));
        ids.extend(cytoplasm.as_ref().map(Region::id));
        let cell_id = {
            let mut sets = self.sets.write();
            if let Some(dup) = ids.iter().find(|id| Self::contains_id(&sets, **id)) {
                return Err(Error::DuplicateRegion(*dup));
            }
            let set = sets
                .entry(image.clone())
                .or_insert_with(|| Arc::new(RegionSet::new(image.clone())));
            Arc::make_mut(set).insert_cell(cell, nucleus, cytoplasm)?
        };
        let events: Vec<_> = ids
            .into_iter()
            .map(|id| RegionEvent::Added {
                id,
                image: image.clone(),
            })
            .collect();
        self.notify(&events);
        Ok(cell_id)
    }

    /// Replaces one image's set wholesale.
    pub fn replace_image(&self, set: RegionSet) {
        let image = set.image().to_string();
        log::debug!("Replacing '{image}' with {} regions", set.len());
        self.sets.write().insert(image.clone(), Arc::new(set));
        self.notify(&[RegionEvent::Updated { image }]);
    }

    /// Removes a region from whichever image holds it.
    pub fn remove(&self, id: RegionId) -> Option<Region> {
        let (image, region) = {
            let mut sets = self.sets.write();
            let (image, set) = sets.iter_mut().find(|(_, set)| set.contains(id))?;
            let region = Arc::make_mut(set).remove(id).ok()?;
            (image.clone(), region)
        };
        log::trace!("Removed region {id} from '{image}'");
        self.notify(&[RegionEvent::Removed { id, image }]);
        Some(region)
    }

    /// Runs `f` against a copy of the set of `image` and stores the copy
    /// only when `f` succeeds. A missing set starts empty.
    ///
    /// # Errors
    /// Whatever `f` returns. The stored set is then left untouched.
    pub fn modify<F, R>(&self, image: &str, f: F) -> Result<R>
    where
        F: FnOnce(&mut RegionSet) -> Result<R>,
    {
        let out = {
            let mut sets = self.sets.write();
            let mut draft = sets
                .get(image)
                .map_or_else(|| RegionSet::new(image), |set| RegionSet::clone(set));
            let out = f(&mut draft)?;
            sets.insert(image.to_string(), Arc::new(draft));
            out
        };
        self.notify(&[RegionEvent::Updated {
            image: image.to_string(),
        }]);
        Ok(out)
    }

    /// Mutates one region wherever it is stored.
    ///
    /// # Errors
    /// [`Error::UnknownRegion`] when no image holds `id`.
    pub fn update<F>(&self, id: RegionId, f: F) -> Result<()>
    where
        F: FnOnce(&mut Region),
    {
        let image = {
            let mut sets = self.sets.write();
            let (image, set) = sets
                .iter_mut()
                .find(|(_, set)| set.contains(id))
                .ok_or(Error::UnknownRegion(id))?;
            Arc::make_mut(set).update(id, f)?;
            image.clone()
        };
        self.notify(&[RegionEvent::Updated { image }]);
        Ok(())
    }

    /// Snapshot of one image's regions.
    pub fn snapshot(&self, image: &str) -> Option<Arc<RegionSet>> {
        self.sets.read().get(image).cloned()
    }

    /// Snapshot of every image's set.
    pub fn all_by_image(&self) -> HashMap<String, Arc<RegionSet>> {
        self.sets.read().clone()
    }

    /// Every stored region, grouped by image name order.
    pub fn all_regions(&self) -> Vec<Region> {
        let sets = self.all_by_image();
        let mut images: Vec<_> = sets.keys().collect();
        images.sort();
        images
            .into_iter()
            .flat_map(|image| sets[image].iter().cloned())
            .collect()
    }

    /// Image names with a set, sorted.
    pub fn images(&self) -> Vec<String> {
        let mut images: Vec<_> = self.sets.read().keys().cloned().collect();
        images.sort();
        images
    }

    /// Drops every region of one image.
    pub fn clear_image(&self, image: &str) {
        let removed = self.sets.write().remove(image);
        if let Some(set) = removed {
            log::debug!("Cleared {} regions from '{image}'", set.len());
            self.notify(&[RegionEvent::Cleared {
                image: Some(image.to_string()),
            }]);
        }
    }

    /// Drops every region of every image.
    pub fn clear_all(&self) {
        let total: usize = {
            let mut sets = self.sets.write();
            let total = sets.values().map(|s| s.len()).sum();
            sets.clear();
            total
        };
        log::debug!("Cleared all {total} regions");
        self.notify(&[RegionEvent::Cleared { image: None }]);
    }

    pub fn count(&self, image: &str) -> usize {
        self.sets.read().get(image).map_or(0, |s| s.len())
    }

    pub fn total_count(&self) -> usize {
        self.sets.read().values().map(|s| s.len()).sum()
    }

    pub fn has_regions(&self, image: &str) -> bool {
        self.count(image) > 0
    }

    /// Looks a region up by id across all images.
    pub fn find(&self, id: RegionId) -> Option<Region> {
        self.sets
            .read()
            .values()
            .find_map(|set| set.get(id).cloned())
    }

    pub fn statistics(&self) -> StoreStatistics {
        let sets = self.sets.read();
        let mut stats = StoreStatistics {
            image_count: sets.len(),
            ..StoreStatistics::default()
        };
        for (image, set) in sets.iter() {
            stats.total_regions += set.len();
            stats.ignored_regions += set.iter().filter(|r| r.is_ignored()).count();
            stats.per_image.insert(image.clone(), set.len());
        }
        stats
    }

    /// Applies the border rule to one image. Returns the ignored count.
    ///
    /// # Errors
    /// Propagates errors from the set mutation.
    pub fn apply_border_rule(
        &self,
        image: &str,
        width: i32,
        height: i32,
        border_distance: i32,
    ) -> Result<usize> {
        if !self.sets.read().contains_key(image) {
            return Ok(0);
        }
        let ignored = self.modify(image, |set| {
            Ok(set.apply_border_rule(width, height, border_distance))
        })?;
        log::debug!("Border rule ({border_distance}px) ignored {ignored} regions on '{image}'");
        Ok(ignored)
    }
}
