use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

// Writes are only counted when a stored value actually changes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Element {
    text: String,
    classes: BTreeSet<String>,
    attributes: BTreeMap<String, String>,
    styles: BTreeMap<String, String>,
    writes: u64,
}

impl Element {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        let text = text.into();
        if self.text != text {
            self.text = text;
            self.bump();
        }
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.contains(class)
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.classes.iter().map(String::as_str)
    }

    pub fn add_class(&mut self, class: &str) {
        if self.classes.insert(class.to_string()) {
            self.bump();
        }
    }

    pub fn remove_class(&mut self, class: &str) {
        if self.classes.remove(class) {
            self.bump();
        }
    }

    pub fn toggle_class(&mut self, class: &str, on: bool) {
        if on {
            self.add_class(class);
        } else {
            self.remove_class(class);
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn set_attribute(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        if self.attributes.get(name) != Some(&value) {
            self.attributes.insert(name.to_string(), value);
            self.bump();
        }
    }

    pub fn remove_attribute(&mut self, name: &str) {
        if self.attributes.remove(name).is_some() {
            self.bump();
        }
    }

    pub fn style(&self, property: &str) -> Option<&str> {
        self.styles.get(property).map(String::as_str)
    }

    pub fn set_style(&mut self, property: &str, value: impl Into<String>) {
        let value = value.into();
        if self.styles.get(property) != Some(&value) {
            self.styles.insert(property.to_string(), value);
            self.bump();
        }
    }

    pub fn remove_style(&mut self, property: &str) {
        if self.styles.remove(property).is_some() {
            self.bump();
        }
    }

    pub fn writes(&self) -> u64 {
        self.writes
    }

    fn bump(&mut self) {
        self.writes = self.writes.saturating_add(1);
    }
}

/// Named child elements of one widget.
#[derive(Debug, Clone)]
pub struct ElementTable<K> {
    elements: BTreeMap<K, Element>,
}

impl<K> Default for ElementTable<K> {
    fn default() -> Self {
        Self {
            elements: BTreeMap::new(),
        }
    }
}

impl<K: Ord + Copy> ElementTable<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: K) -> Option<&Element> {
        self.elements.get(&key)
    }

    pub fn entry(&mut self, key: K) -> &mut Element {
        self.elements.entry(key).or_default()
    }

    pub fn writes(&self) -> u64 {
        self.elements.values().map(Element::writes).sum()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FontSpec {
    pub font: String,
    pub size: f32,
    pub face_camera: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SpriteItem {
    Sprite {
        asset: String,
        position: Vec3,
        scale: f32,
    },
    Text {
        text: String,
        position: Vec3,
        font: FontSpec,
    },
}

/// World-space sprites and labels grouped per plot index.
#[derive(Debug, Clone)]
pub struct SpriteGrid {
    name: String,
    plots: BTreeMap<u32, Vec<SpriteItem>>,
    visible: bool,
    writes: u64,
}

impl SpriteGrid {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            plots: BTreeMap::new(),
            visible: true,
            writes: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn clear_plot(&mut self, plot: u32) {
        if self.plots.remove(&plot).is_some() {
            self.writes = self.writes.saturating_add(1);
        }
    }

    pub fn add_sprite(&mut self, plot: u32, asset: impl Into<String>, position: Vec3, scale: f32) {
        self.push(
            plot,
            SpriteItem::Sprite {
                asset: asset.into(),
                position,
                scale,
            },
        );
    }

    pub fn add_text(&mut self, plot: u32, text: impl Into<String>, position: Vec3, font: FontSpec) {
        self.push(
            plot,
            SpriteItem::Text {
                text: text.into(),
                position,
                font,
            },
        );
    }

    pub fn plot(&self, plot: u32) -> &[SpriteItem] {
        self.plots.get(&plot).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn occupied_plots(&self) -> usize {
        self.plots.len()
    }

    pub fn set_visible(&mut self, visible: bool) {
        if self.visible != visible {
            self.visible = visible;
            self.writes = self.writes.saturating_add(1);
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn writes(&self) -> u64 {
        self.writes
    }

    fn push(&mut self, plot: u32, item: SpriteItem) {
        self.plots.entry(plot).or_default().push(item);
        self.writes = self.writes.saturating_add(1);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridCoord {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct AnchorHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldAnchor {
    pub location: GridCoord,
    pub offset: Vec3,
}

/// Fixed world anchors that screen-space widgets follow.
#[derive(Debug, Default)]
pub struct WorldAnchors {
    next_handle: u32,
    anchors: BTreeMap<AnchorHandle, WorldAnchor>,
}

impl WorldAnchors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_fixed(&mut self, location: GridCoord, offset: Vec3) -> AnchorHandle {
        let handle = AnchorHandle(self.next_handle);
        self.next_handle = self.next_handle.wrapping_add(1);
        self.anchors.insert(handle, WorldAnchor { location, offset });
        handle
    }

    pub fn release(&mut self, handle: AnchorHandle) -> bool {
        self.anchors.remove(&handle).is_some()
    }

    pub fn get(&self, handle: AnchorHandle) -> Option<&WorldAnchor> {
        self.anchors.get(&handle)
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_identical_writes_count_once() {
        let mut element = Element::default();
        element.set_text("ROME");
        element.set_text("ROME");
        element.add_class("city-banner--city");
        element.toggle_class("city-banner--city", true);
        element.set_style("--player-color-primary", "#ff0000");
        element.set_style("--player-color-primary", "#ff0000");

        assert_eq!(element.writes(), 3);
        assert_eq!(element.text(), "ROME");
        assert!(element.has_class("city-banner--city"));
    }

    #[test]
    fn element_table_creates_entries_on_demand() {
        let mut table = ElementTable::<u8>::new();
        assert!(table.get(1).is_none());

        table.entry(1).set_attribute("data-tooltip-content", "Hello");

        assert_eq!(
            table.get(1).and_then(|el| el.attribute("data-tooltip-content")),
            Some("Hello")
        );
        assert_eq!(table.writes(), 1);
    }

    #[test]
    fn sprite_grid_clear_only_counts_occupied_plots() {
        let mut grid = SpriteGrid::new("AllYields_SpriteGroup");
        grid.clear_plot(3);
        assert_eq!(grid.writes(), 0);

        grid.add_sprite(3, "YIELD_FOOD_2", Vec3::new(0.0, 0.0, 2.0), 0.66);
        grid.clear_plot(3);

        assert_eq!(grid.writes(), 2);
        assert!(grid.plot(3).is_empty());
    }

    #[test]
    fn anchors_release_by_handle() {
        let mut anchors = WorldAnchors::new();
        let first = anchors.register_fixed(GridCoord { x: 1, y: 2 }, Vec3::new(0.0, 0.0, 42.0));
        let second = anchors.register_fixed(GridCoord { x: 3, y: 4 }, Vec3::default());

        assert_ne!(first, second);
        assert!(anchors.release(first));
        assert!(!anchors.release(first));
        assert_eq!(anchors.len(), 1);
    }
}
