use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::Result;

/// Catalog columns the engine reads for a single object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogData {
    /// Apparent V magnitude, kept as the raw catalog string.
    #[serde(rename = "V", default)]
    pub v: String,
    #[serde(default)]
    pub sp_type: String,
}

/// Object projected onto the viewer, in screen pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogObject {
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub data: CatalogData,
}

impl CatalogObject {
    pub fn new(x: f64, y: f64, magnitude: impl Into<String>, sp_type: impl Into<String>) -> Self {
        Self {
            x,
            y,
            data: CatalogData {
                v: magnitude.into(),
                sp_type: sp_type.into(),
            },
        }
    }
}

/// Supplies the objects currently visible in the viewer.
pub trait ObjectSource: Send {
    /// Returns every object whose screen position falls inside the box.
    fn objects_in_bbox(&self, x: f64, y: f64, width: f64, height: f64) -> Vec<CatalogObject>;
}

/// Fixed list of objects, typically loaded from a JSON export of the viewer.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    objects: Vec<CatalogObject>,
}

impl StaticCatalog {
    pub fn new(objects: Vec<CatalogObject>) -> Self {
        Self { objects }
    }

    /// Parses a JSON array of `{ "x", "y", "data": { "V", "sp_type" } }`.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let objects: Vec<CatalogObject> = serde_json::from_str(json)?;
        Ok(Self::new(objects))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn push(&mut self, object: CatalogObject) {
        self.objects.push(object);
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl ObjectSource for StaticCatalog {
    fn objects_in_bbox(&self, x: f64, y: f64, width: f64, height: f64) -> Vec<CatalogObject> {
        self.objects
            .iter()
            .filter(|object| {
                object.x >= x && object.x < x + width && object.y >= y && object.y < y + height
            })
            .cloned()
            .collect()
    }
}

/// Reads a magnitude the way a lenient float parser does: the longest
/// numeric prefix of the trimmed string. Returns `None` when nothing parses.
pub fn parse_magnitude(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    trimmed
        .char_indices()
        .map(|(index, c)| index + c.len_utf8())
        .rev()
        .find_map(|end| {
            let prefix = &trimmed[..end];
            // Rust accepts "inf"/"nan" spellings that a catalog value never means.
            if prefix.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') {
                return None;
            }
            prefix.parse::<f64>().ok().filter(|value| value.is_finite())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_viewer_export() {
        let json = r#"[
            {"x": 12.5, "y": 40.0, "data": {"V": "3.2", "sp_type": "K0III"}},
            {"x": 500.0, "data": {"V": "", "sp_type": "G2V"}}
        ]"#;
        let catalog = StaticCatalog::from_json_str(json).unwrap();
        assert_eq!(catalog.len(), 2);

        let objects = catalog.objects_in_bbox(0.0, 0.0, 800.0, 800.0);
        assert_eq!(objects[0].data.v, "3.2");
        assert_eq!(objects[1].y, 0.0);
    }

    #[test]
    fn bbox_excludes_objects_off_screen() {
        let catalog = StaticCatalog::new(vec![
            CatalogObject::new(10.0, 10.0, "1", "A0V"),
            CatalogObject::new(-4.0, 10.0, "1", "A0V"),
            CatalogObject::new(810.0, 10.0, "1", "A0V"),
            CatalogObject::new(10.0, 900.0, "1", "A0V"),
        ]);
        let objects = catalog.objects_in_bbox(0.0, 0.0, 800.0, 800.0);
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].x, 10.0);
    }

    #[test]
    fn magnitude_parsing_is_lenient() {
        assert_eq!(parse_magnitude("3.0"), Some(3.0));
        assert_eq!(parse_magnitude(" -1.46 "), Some(-1.46));
        assert_eq!(parse_magnitude("4.5:"), Some(4.5));
        assert_eq!(parse_magnitude("2.1e0"), Some(2.1));
        assert_eq!(parse_magnitude(""), None);
        assert_eq!(parse_magnitude("abc"), None);
        assert_eq!(parse_magnitude("inf"), None);
    }
}
