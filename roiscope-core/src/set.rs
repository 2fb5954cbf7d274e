//! Per-image region arena with consistent cross-references.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::geometry::Point;
use crate::region::{Body, Region, RegionId};

/// All regions of one image, in insertion order.
///
/// Cross-references between cells, nuclei and cytoplasm are ids into this
/// set. Every link operation updates both sides and recomputes the affected
/// cell ratios before returning.
#[derive(Debug, Clone, Default)]
pub struct RegionSet {
    image: String,
    regions: Vec<Region>,
    index: HashMap<RegionId, usize>,
    revision: u64,
}

impl RegionSet {
    /// Empty set for `image`.
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            regions: Vec::new(),
            index: HashMap::new(),
            revision: 0,
        }
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Mutation counter, bumped on every change.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn iter(&self) -> impl Iterator<Item = &Region> {
        self.regions.iter()
    }

    pub fn get(&self, id: RegionId) -> Option<&Region> {
        self.index.get(&id).map(|&i| &self.regions[i])
    }

    pub fn contains(&self, id: RegionId) -> bool {
        self.index.contains_key(&id)
    }

    fn position(&self, id: RegionId) -> Result<usize> {
        self.index.get(&id).copied().ok_or(Error::UnknownRegion(id))
    }

    fn check_insertable(&self, region: &Region) -> Result<()> {
        if region.source_image() != self.image {
            return Err(Error::ForeignImage {
                id: region.id(),
                expected: self.image.clone(),
                found: region.source_image().to_string(),
            });
        }
        if self.index.contains_key(&region.id()) {
            return Err(Error::DuplicateRegion(region.id()));
        }
        Ok(())
    }

    /// Appends a region.
    ///
    /// Links the region carries are dropped; re-establish them with the
    /// `link_*` operations.
    ///
    /// # Errors
    /// [`Error::ForeignImage`] or [`Error::DuplicateRegion`].
    pub fn insert(&mut self, mut region: Region) -> Result<RegionId> {
        self.check_insertable(&region)?;
        region.body_mut().clear_links();
        let id = region.id();
        self.index.insert(id, self.regions.len());
        self.regions.push(region);
        self.revision += 1;
        Ok(id)
    }

    /// Inserts a cell with its parts and links them in one step.
    ///
    /// Nothing is inserted when any part is rejected.
    ///
    /// # Errors
    /// Kind, image and duplicate checks as for [`insert`](Self::insert)
    /// and the link operations.
    pub fn insert_cell(
        &mut self,
        cell: Region,
        nucleus: Option<Region>,
        cytoplasm: Option<Region>,
    ) -> Result<RegionId> {
        expect_body(&cell, "cell", |b| matches!(b, Body::Cell(_)))?;
        self.check_insertable(&cell)?;
        if let Some(n) = &nucleus {
            expect_body(n, "nucleus", |b| matches!(b, Body::Nucleus(_)))?;
            self.check_insertable(n)?;
        }
        if let Some(c) = &cytoplasm {
            expect_body(c, "cytoplasm", |b| matches!(b, Body::Cytoplasm(_)))?;
            self.check_insertable(c)?;
        }
        let ids = [
            Some(cell.id()),
            nucleus.as_ref().map(Region::id),
            cytoplasm.as_ref().map(Region::id),
        ];
        for (i, a) in ids.iter().enumerate() {
            for b in &ids[i + 1..] {
                if let (Some(a), Some(b)) = (a, b) {
                    if a == b {
                        return Err(Error::DuplicateRegion(*a));
                    }
                }
            }
        }

        let nucleus_id = nucleus.map(|n| self.insert(n)).transpose()?;
        let cytoplasm_id = cytoplasm.map(|c| self.insert(c)).transpose()?;
        let cell_id = self.insert(cell)?;
        self.link_nucleus(cell_id, nucleus_id)?;
        self.link_cytoplasm(cell_id, cytoplasm_id)?;
        if let (Some(c), Some(n)) = (cytoplasm_id, nucleus_id) {
            self.associate(c, Some(n))?;
        }
        Ok(cell_id)
    }

    /// Removes a region, detaching every partner that referenced it.
    ///
    /// # Errors
    /// [`Error::UnknownRegion`] when the id is not in this set.
    pub fn remove(&mut self, id: RegionId) -> Result<Region> {
        let pos = self.position(id)?;
        let partners = self.regions[pos].body().linked_ids();
        let region = self.regions.remove(pos);
        self.index.remove(&id);
        for idx in self.index.values_mut() {
            if *idx > pos {
                *idx -= 1;
            }
        }
        for partner in partners {
            if let Ok(p) = self.position(partner) {
                detach(self.regions[p].body_mut(), id);
                self.refresh_ratio(p);
            }
        }
        self.revision += 1;
        Ok(region)
    }

    /// Applies `f` to one region and bumps the revision.
    ///
    /// # Errors
    /// [`Error::UnknownRegion`] when the id is not in this set.
    pub fn update<F>(&mut self, id: RegionId, f: F) -> Result<()>
    where
        F: FnOnce(&mut Region),
    {
        let pos = self.position(id)?;
        f(&mut self.regions[pos]);
        self.revision += 1;
        Ok(())
    }

    /// Links (or with `None`, unlinks) a cell's nucleus.
    ///
    /// A nucleus previously owned by another cell is taken from it.
    ///
    /// # Errors
    /// [`Error::UnknownRegion`] or [`Error::WrongKind`].
    pub fn link_nucleus(&mut self, cell: RegionId, nucleus: Option<RegionId>) -> Result<()> {
        let cell_pos = self.position_as(cell, "cell", |b| matches!(b, Body::Cell(_)))?;
        let new_pos = nucleus
            .map(|n| self.position_as(n, "nucleus", |b| matches!(b, Body::Nucleus(_))))
            .transpose()?;

        let old = match self.regions[cell_pos].body() {
            Body::Cell(links) => links.associated_nucleus,
            _ => None,
        };
        if let Some(old) = old.filter(|o| Some(*o) != nucleus) {
            if let Ok(p) = self.position(old) {
                if let Body::Nucleus(links) = self.regions[p].body_mut() {
                    links.parent_cell = None;
                }
            }
        }
        if let Some(pos) = new_pos {
            let previous_owner = match self.regions[pos].body_mut() {
                Body::Nucleus(links) => links.parent_cell.replace(cell),
                _ => None,
            };
            if let Some(owner) = previous_owner.filter(|o| *o != cell) {
                if let Ok(p) = self.position(owner) {
                    if let Body::Cell(links) = self.regions[p].body_mut() {
                        links.associated_nucleus = None;
                    }
                    self.refresh_ratio(p);
                }
            }
        }
        if let Body::Cell(links) = self.regions[cell_pos].body_mut() {
            links.associated_nucleus = nucleus;
        }
        self.refresh_ratio(cell_pos);
        self.revision += 1;
        Ok(())
    }

    /// Links (or with `None`, unlinks) a cell's cytoplasm.
    ///
    /// # Errors
    /// [`Error::UnknownRegion`] or [`Error::WrongKind`].
    pub fn link_cytoplasm(&mut self, cell: RegionId, cytoplasm: Option<RegionId>) -> Result<()> {
        let cell_pos = self.position_as(cell, "cell", |b| matches!(b, Body::Cell(_)))?;
        let new_pos = cytoplasm
            .map(|c| self.position_as(c, "cytoplasm", |b| matches!(b, Body::Cytoplasm(_))))
            .transpose()?;

        let old = match self.regions[cell_pos].body() {
            Body::Cell(links) => links.associated_cytoplasm,
            _ => None,
        };
        if let Some(old) = old.filter(|o| Some(*o) != cytoplasm) {
            if let Ok(p) = self.position(old) {
                if let Body::Cytoplasm(links) = self.regions[p].body_mut() {
                    links.parent_cell = None;
                }
            }
        }
        if let Some(pos) = new_pos {
            let previous_owner = match self.regions[pos].body_mut() {
                Body::Cytoplasm(links) => links.parent_cell.replace(cell),
                _ => None,
            };
            if let Some(owner) = previous_owner.filter(|o| *o != cell) {
                if let Ok(p) = self.position(owner) {
                    if let Body::Cell(links) = self.regions[p].body_mut() {
                        links.associated_cytoplasm = None;
                    }
                    self.refresh_ratio(p);
                }
            }
        }
        if let Body::Cell(links) = self.regions[cell_pos].body_mut() {
            links.associated_cytoplasm = cytoplasm;
        }
        self.refresh_ratio(cell_pos);
        self.revision += 1;
        Ok(())
    }

    /// Pairs a cytoplasm with the nucleus it surrounds.
    ///
    /// # Errors
    /// [`Error::UnknownRegion`] or [`Error::WrongKind`].
    pub fn associate(&mut self, cytoplasm: RegionId, nucleus: Option<RegionId>) -> Result<()> {
        let cyto_pos = self.position_as(cytoplasm, "cytoplasm", |b| matches!(b, Body::Cytoplasm(_)))?;
        let new_pos = nucleus
            .map(|n| self.position_as(n, "nucleus", |b| matches!(b, Body::Nucleus(_))))
            .transpose()?;

        let old = match self.regions[cyto_pos].body() {
            Body::Cytoplasm(links) => links.associated_nucleus,
            _ => None,
        };
        if let Some(old) = old.filter(|o| Some(*o) != nucleus) {
            if let Ok(p) = self.position(old) {
                if let Body::Nucleus(links) = self.regions[p].body_mut() {
                    links.associated_cytoplasm = None;
                }
            }
        }
        if let Some(pos) = new_pos {
            let previous = match self.regions[pos].body_mut() {
                Body::Nucleus(links) => links.associated_cytoplasm.replace(cytoplasm),
                _ => None,
            };
            if let Some(prev) = previous.filter(|p| *p != cytoplasm) {
                if let Ok(p) = self.position(prev) {
                    if let Body::Cytoplasm(links) = self.regions[p].body_mut() {
                        links.associated_nucleus = None;
                    }
                }
            }
        }
        if let Body::Cytoplasm(links) = self.regions[cyto_pos].body_mut() {
            links.associated_nucleus = nucleus;
        }
        self.revision += 1;
        Ok(())
    }

    /// Cell center: linked nucleus center, else the cell's bounds center.
    pub fn cell_center(&self, cell: RegionId) -> Option<Point> {
        let region = self.get(cell)?;
        let nucleus = region
            .as_cell()
            .and_then(|links| links.associated_nucleus)
            .and_then(|n| self.get(n));
        Some(nucleus.unwrap_or(region).bounds().center_point())
    }

    /// Distance from a cytoplasm's center to its associated nucleus center.
    pub fn distance_to_nucleus(&self, cytoplasm: RegionId) -> Option<f64> {
        let region = self.get(cytoplasm)?;
        let nucleus = self.get(region.as_cytoplasm()?.associated_nucleus?)?;
        Some(
            region
                .bounds()
                .center_point()
                .distance(&nucleus.bounds().center_point()),
        )
    }

    /// Records the measured stain intensity of a cytoplasm.
    ///
    /// # Errors
    /// [`Error::UnknownRegion`] or [`Error::WrongKind`].
    pub fn set_cytoplasm_intensity(
        &mut self,
        cytoplasm: RegionId,
        mean: Option<f64>,
        std: Option<f64>,
    ) -> Result<()> {
        let pos = self.position_as(cytoplasm, "cytoplasm", |b| matches!(b, Body::Cytoplasm(_)))?;
        if let Body::Cytoplasm(links) = self.regions[pos].body_mut() {
            links.mean_intensity = mean;
            links.std_intensity = std;
        }
        self.revision += 1;
        Ok(())
    }

    /// Human-readable description of a cell and its linked partners.
    ///
    /// `None` unless `cell` is a stored cell.
    pub fn cell_summary(&self, cell: RegionId) -> Option<String> {
        let region = self.get(cell)?;
        let links = region.as_cell()?;
        let mut lines = vec![
            format!("Cell: {}", region.name()),
            format!("Total area: {:.1} pixels", region.area()),
            format!("Segmentation: {}", links.segmentation_method()),
        ];
        if let Some(nucleus) = links.associated_nucleus.and_then(|id| self.get(id)) {
            lines.push(format!("Nucleus area: {:.1} pixels", nucleus.area()));
        }
        if let Some(cytoplasm) = links.associated_cytoplasm.and_then(|id| self.get(id)) {
            lines.push(format!("Cytoplasm area: {:.1} pixels", cytoplasm.area()));
        }
        if links.is_complete() {
            lines.push(format!("N/C ratio: {:.3}", links.nucleus_to_cytoplasm_ratio()));
        }
        Some(lines.join("\n"))
    }

    /// Human-readable description of a cytoplasm and its links.
    ///
    /// `None` unless `cytoplasm` is a stored cytoplasm.
    pub fn cytoplasm_summary(&self, cytoplasm: RegionId) -> Option<String> {
        let region = self.get(cytoplasm)?;
        let links = region.as_cytoplasm()?;
        let mut lines = vec![
            format!("Cytoplasm: {}", region.name()),
            format!("Area: {:.1} pixels", region.area()),
            format!("Segmentation: {}", links.segmentation_method()),
        ];
        match (links.mean_intensity, links.std_intensity) {
            (Some(mean), Some(std)) => lines.push(format!("Mean intensity: {mean:.2} +/- {std:.2}")),
            (Some(mean), None) => lines.push(format!("Mean intensity: {mean:.2}")),
            _ => {}
        }
        if let Some(nucleus) = links.associated_nucleus.and_then(|id| self.get(id)) {
            lines.push(format!("Associated nucleus: {}", nucleus.name()));
            if let Some(distance) = self.distance_to_nucleus(cytoplasm) {
                lines.push(format!("Distance to nucleus: {distance:.1} pixels"));
            }
        }
        if let Some(cell) = links.parent_cell.and_then(|id| self.get(id)) {
            lines.push(format!("Parent cell: {}", cell.name()));
        }
        Some(lines.join("\n"))
    }

    /// Sets every region's ignored flag from the border-distance rule.
    ///
    /// Returns the number of regions now ignored.
    pub fn apply_border_rule(&mut self, width: i32, height: i32, border_distance: i32) -> usize {
        let mut ignored = 0;
        for region in &mut self.regions {
            let flag = region.should_be_ignored(width, height, border_distance);
            region.set_ignored(flag);
            ignored += usize::from(flag);
        }
        self.revision += 1;
        ignored
    }

    /// Verifies every cross-reference has its matching back-reference.
    ///
    /// # Errors
    /// [`Error::InconsistentLink`] for the first broken pair found.
    pub fn check_links(&self) -> Result<()> {
        for region in &self.regions {
            let from = region.id();
            let pairs: Vec<(RegionId, &'static str, bool)> = match region.body() {
                Body::Plain => Vec::new(),
                Body::Cell(l) => {
                    let mut v = Vec::new();
                    if let Some(n) = l.associated_nucleus {
                        let ok = self
                            .get(n)
                            .and_then(Region::as_nucleus)
                            .is_some_and(|nl| nl.parent_cell == Some(from));
                        v.push((n, "nucleus does not point back to its cell", ok));
                    }
                    if let Some(c) = l.associated_cytoplasm {
                        let ok = self
                            .get(c)
                            .and_then(Region::as_cytoplasm)
                            .is_some_and(|cl| cl.parent_cell == Some(from));
                        v.push((c, "cytoplasm does not point back to its cell", ok));
                    }
                    v
                }
                Body::Nucleus(l) => {
                    let mut v = Vec::new();
                    if let Some(c) = l.parent_cell {
                        let ok = self
                            .get(c)
                            .and_then(Region::as_cell)
                            .is_some_and(|cl| cl.associated_nucleus == Some(from));
                        v.push((c, "parent cell does not list this nucleus", ok));
                    }
                    if let Some(c) = l.associated_cytoplasm {
                        let ok = self
                            .get(c)
                            .and_then(Region::as_cytoplasm)
                            .is_some_and(|cl| cl.associated_nucleus == Some(from));
                        v.push((c, "cytoplasm does not list this nucleus", ok));
                    }
                    v
                }
                Body::Cytoplasm(l) => {
                    let mut v = Vec::new();
                    if let Some(c) = l.parent_cell {
                        let ok = self
                            .get(c)
                            .and_then(Region::as_cell)
                            .is_some_and(|cl| cl.associated_cytoplasm == Some(from));
                        v.push((c, "parent cell does not list this cytoplasm", ok));
                    }
                    if let Some(n) = l.associated_nucleus {
                        let ok = self
                            .get(n)
                            .and_then(Region::as_nucleus)
                            .is_some_and(|nl| nl.associated_cytoplasm == Some(from));
                        v.push((n, "nucleus does not list this cytoplasm", ok));
                    }
                    v
                }
            };
            if let Some((to, detail, _)) = pairs.into_iter().find(|(_, _, ok)| !ok) {
                return Err(Error::InconsistentLink { from, to, detail });
            }
        }
        Ok(())
    }

    fn position_as(&self, id: RegionId, expected: &'static str, test: fn(&Body) -> bool) -> Result<usize> {
        let pos = self.position(id)?;
        if test(self.regions[pos].body()) {
            Ok(pos)
        } else {
            Err(Error::WrongKind { id, expected })
        }
    }

    fn refresh_ratio(&mut self, pos: usize) {
        let Body::Cell(links) = self.regions[pos].body() else {
            return;
        };
        let area_of = |id: Option<RegionId>| id.and_then(|i| self.get(i)).map(Region::area);
        let ratio = match (
            area_of(links.associated_nucleus),
            area_of(links.associated_cytoplasm),
        ) {
            (Some(nucleus), Some(cytoplasm)) if cytoplasm > 0.0 => nucleus / cytoplasm,
            _ => 0.0,
        };
        if let Body::Cell(links) = self.regions[pos].body_mut() {
            links.nucleus_to_cytoplasm_ratio = ratio;
        }
    }
}

fn expect_body(region: &Region, expected: &'static str, test: fn(&Body) -> bool) -> Result<()> {
    if test(region.body()) {
        Ok(())
    } else {
        Err(Error::WrongKind {
            id: region.id(),
            expected,
        })
    }
}

/// Clears whatever field of `body` points at `gone`.
fn detach(body: &mut Body, gone: RegionId) {
    let clear = |slot: &mut Option<RegionId>| {
        if *slot == Some(gone) {
            *slot = None;
        }
    };
    match body {
        Body::Plain => {}
        Body::Nucleus(l) => {
            clear(&mut l.parent_cell);
            clear(&mut l.associated_cytoplasm);
        }
        Body::Cytoplasm(l) => {
            clear(&mut l.associated_nucleus);
            clear(&mut l.parent_cell);
        }
        Body::Cell(l) => {
            clear(&mut l.associated_nucleus);
            clear(&mut l.associated_cytoplasm);
        }
    }
}

impl<'a> IntoIterator for &'a RegionSet {
    type Item = &'a Region;
    type IntoIter = std::slice::Iter<'a, Region>;

    fn into_iter(self) -> Self::IntoIter {
        self.regions.iter()
    }
}
