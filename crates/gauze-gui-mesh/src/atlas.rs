//! Grow-only texture atlas packing with leftover recycling.

use std::collections::HashMap;

const DEFAULT_WASTED_THRESHOLD: u32 = 20;

/// A named rectangle inside the atlas
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AtlasArea {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl AtlasArea {
    fn pixels(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// A rectangle packer that never relocates what it already placed.
///
/// New areas first try to recycle an unused leftover (best fit by wasted
/// pixels); otherwise the atlas grows along whichever axis yields the
/// smaller total pixel count, and the strip created by the growth becomes
/// the recycling area. Leftovers below the wasted threshold are discarded
/// instead of tracked.
pub struct Atlas {
    width: u32,
    height: u32,
    wasted_threshold: u32,
    areas: HashMap<String, AtlasArea>,
    unused: Vec<AtlasArea>,
}

impl Default for Atlas {
    fn default() -> Self {
        Self::new()
    }
}

impl Atlas {
    pub fn new() -> Self {
        Self::with_wasted_threshold(DEFAULT_WASTED_THRESHOLD)
    }

    /// `wasted_threshold` is the minimum leftover extent worth keeping as a
    /// recycling area
    pub fn with_wasted_threshold(wasted_threshold: u32) -> Self {
        Self {
            width: 0,
            height: 0,
            wasted_threshold,
            areas: HashMap::new(),
            unused: Vec::new(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn area(&self, name: &str) -> Option<AtlasArea> {
        self.areas.get(name).copied()
    }

    pub fn area_count(&self) -> usize {
        self.areas.len()
    }

    /// Place a named `width` x `height` area. Returns false (with a
    /// diagnostic) when the name is already taken.
    pub fn add_area(&mut self, name: impl Into<String>, width: u32, height: u32) -> bool {
        let name = name.into();
        if self.areas.contains_key(&name) {
            log::warn!("area name already existing: {name}");
            return false;
        }

        if self.recycle(&name, width, height) {
            return true;
        }

        // Nothing to recycle: enlarge the atlas
        if width <= self.width && height > self.height {
            self.enlarge_height(&name, width, height);
            return true;
        }
        if height <= self.height && width > self.width {
            self.enlarge_width(&name, width, height);
            return true;
        }

        // Either enlargement would fit; pick the one producing the fewer
        // total atlas pixels
        let grown_height = self.width as u64 * (self.height + height) as u64;
        let grown_width = (self.width + width) as u64 * self.height as u64;
        if grown_height <= grown_width {
            self.enlarge_height(&name, width, height);
        } else {
            self.enlarge_width(&name, width, height);
        }
        true
    }

    fn enlarge_width(&mut self, name: &str, width: u32, height: u32) {
        let strip = AtlasArea {
            x: self.width,
            y: 0,
            width,
            height: self.height.max(height),
        };
        self.unused.push(strip);
        self.width += width;
        self.height = self.height.max(height);
        let index = self.unused.len() - 1;
        self.recycle_into(name, width, height, index);
    }

    fn enlarge_height(&mut self, name: &str, width: u32, height: u32) {
        let strip = AtlasArea {
            x: 0,
            y: self.height,
            width: self.width.max(width),
            height,
        };
        self.unused.push(strip);
        self.height += height;
        self.width = self.width.max(width);
        let index = self.unused.len() - 1;
        self.recycle_into(name, width, height, index);
    }

    /// Find the fitting unused area wasting the fewest pixels
    fn recycle(&mut self, name: &str, width: u32, height: u32) -> bool {
        let needed = width as u64 * height as u64;
        let mut best: Option<(usize, u64)> = None;

        for (index, unused) in self.unused.iter().enumerate() {
            if unused.width >= width && unused.height >= height {
                let wasted = unused.pixels() - needed;
                if best.map(|(_, best_wasted)| wasted < best_wasted).unwrap_or(true) {
                    best = Some((index, wasted));
                }
            }
        }

        match best {
            Some((index, _)) => {
                self.recycle_into(name, width, height, index);
                true
            }
            None => false,
        }
    }

    fn recycle_into(&mut self, name: &str, width: u32, height: u32, index: usize) {
        let recycling = self.unused[index];
        let area = AtlasArea {
            x: recycling.x,
            y: recycling.y,
            width,
            height,
        };
        self.areas.insert(name.to_string(), area);

        let extra_width = recycling.width - width;
        let extra_height = recycling.height - height;

        if extra_width < self.wasted_threshold && extra_height < self.wasted_threshold {
            // Leftover too small to track
            self.unused.remove(index);
            return;
        }

        let column_pixels = extra_width as u64 * recycling.height as u64;
        let row_pixels = recycling.width as u64 * extra_height as u64;

        if row_pixels >= column_pixels {
            // Reuse the bottom row (full width)
            self.unused[index] = AtlasArea {
                x: recycling.x,
                y: recycling.y + height,
                width: recycling.width,
                height: extra_height,
            };
            if extra_width >= self.wasted_threshold && extra_height >= self.wasted_threshold {
                // Also keep the small rectangle right of the new area
                self.unused.push(AtlasArea {
                    x: recycling.x + width,
                    y: recycling.y,
                    width: extra_width,
                    height,
                });
            }
        } else {
            // Reuse the right column (full height)
            self.unused[index] = AtlasArea {
                x: recycling.x + width,
                y: recycling.y,
                width: extra_width,
                height: recycling.height,
            };
            if extra_width >= self.wasted_threshold && extra_height >= self.wasted_threshold {
                // Also keep the small rectangle below the new area
                self.unused.push(AtlasArea {
                    x: recycling.x,
                    y: recycling.y + height,
                    width,
                    height: extra_height,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_area_sizes_the_atlas() {
        let mut atlas = Atlas::new();
        assert!(atlas.add_area("hero", 100, 60));
        let area = atlas.area("hero").expect("placed");
        assert_eq!((area.x, area.y), (0, 0));
        assert_eq!((area.width, area.height), (100, 60));
        assert_eq!(atlas.width(), 100);
        assert_eq!(atlas.height(), 60);
    }

    #[test]
    fn test_duplicate_name_is_rejected() {
        let mut atlas = Atlas::new();
        assert!(atlas.add_area("icon", 10, 10));
        assert!(!atlas.add_area("icon", 20, 20));
        assert_eq!(atlas.area_count(), 1);
    }

    #[test]
    fn test_growth_picks_the_cheaper_axis() {
        let mut atlas = Atlas::new();
        atlas.add_area("wide", 200, 40);
        // 200x40 atlas: growing height by 40 costs 200*80=16000,
        // growing width by 50 costs 250*40=10000
        atlas.add_area("small", 50, 40);
        assert_eq!(atlas.width(), 250);
        assert_eq!(atlas.height(), 40);
        let area = atlas.area("small").expect("placed");
        assert_eq!((area.x, area.y), (200, 0));
    }

    #[test]
    fn test_leftovers_are_recycled() {
        let mut atlas = Atlas::with_wasted_threshold(10);
        atlas.add_area("tall", 100, 200);
        // Goes right: enlarging width (300x200=60000) beats height (100x300=30000)?
        // No - height growth is cheaper, so the atlas becomes 100x300 and the
        // 100x100 strip next to the new area is kept for recycling
        atlas.add_area("half", 50, 100);
        let after_growth = (atlas.width(), atlas.height());

        // A small area now fits into a tracked leftover without growth
        atlas.add_area("chip", 40, 40);
        assert_eq!((atlas.width(), atlas.height()), after_growth);

        let chip = atlas.area("chip").expect("placed");
        let half = atlas.area("half").expect("placed");
        assert!(!overlaps(chip, half));
        assert!(!overlaps(chip, atlas.area("tall").expect("placed")));
    }

    #[test]
    fn test_no_two_areas_overlap() {
        let mut atlas = Atlas::with_wasted_threshold(4);
        let sizes = [
            (64, 64),
            (32, 32),
            (128, 16),
            (16, 128),
            (48, 48),
            (8, 8),
            (100, 20),
        ];
        for (index, (width, height)) in sizes.iter().enumerate() {
            assert!(atlas.add_area(format!("area{index}"), *width, *height));
        }

        let areas: Vec<AtlasArea> = (0..sizes.len())
            .map(|index| atlas.area(&format!("area{index}")).expect("placed"))
            .collect();
        for i in 0..areas.len() {
            for j in (i + 1)..areas.len() {
                assert!(
                    !overlaps(areas[i], areas[j]),
                    "area{i} overlaps area{j}: {:?} vs {:?}",
                    areas[i],
                    areas[j]
                );
            }
            // And everything is inside the atlas
            assert!(areas[i].x + areas[i].width <= atlas.width());
            assert!(areas[i].y + areas[i].height <= atlas.height());
        }
    }

    fn overlaps(a: AtlasArea, b: AtlasArea) -> bool {
        a.x < b.x + b.width && b.x < a.x + a.width && a.y < b.y + b.height && b.y < a.y + a.height
    }
}
