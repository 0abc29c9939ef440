use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::{catalog::parse_magnitude, ObjectSource, SpectralType};

/// Object waiting for the sweep line, with its spectral type parsed once.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub x: f64,
    pub magnitude: f64,
    pub spectral: SpectralType,
}

/// Visible objects for one sweep cycle, sorted by ascending x.
#[derive(Debug, Clone, Default)]
pub struct ObjectQueue {
    entries: VecDeque<QueueEntry>,
}

impl ObjectQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a queue from the objects currently inside the viewport. Objects
    /// need both a spectral type and a magnitude strictly below `mag_limit`.
    pub fn snapshot(source: &dyn ObjectSource, width: f64, height: f64, mag_limit: f64) -> Self {
        let entries = source
            .objects_in_bbox(0.0, 0.0, width, height)
            .into_iter()
            .filter(|object| !object.data.sp_type.is_empty() && !object.data.v.is_empty())
            .filter_map(|object| {
                let magnitude = parse_magnitude(&object.data.v)?;
                (magnitude < mag_limit).then(|| QueueEntry {
                    x: object.x,
                    magnitude,
                    spectral: SpectralType::parse(&object.data.sp_type),
                })
            })
            .collect();
        Self::from_entries(entries)
    }

    pub fn from_entries(mut entries: Vec<QueueEntry>) -> Self {
        entries.sort_by(|a, b| a.x.total_cmp(&b.x));
        Self {
            entries: entries.into(),
        }
    }

    pub fn peek(&self) -> Option<&QueueEntry> {
        self.entries.front()
    }

    /// Dequeues the head once the sweep line at `x` is within `lookahead`
    /// pixels of it. Entries come out in non-decreasing x order.
    pub fn pop_ready(&mut self, x: f64, lookahead: f64) -> Option<QueueEntry> {
        match self.entries.front() {
            Some(head) if x >= head.x - lookahead => self.entries.pop_front(),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueueEntry> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CatalogObject, StaticCatalog};

    fn catalog() -> StaticCatalog {
        StaticCatalog::new(vec![
            CatalogObject::new(200.0, 5.0, "4.0", "K0III"),
            CatalogObject::new(10.0, 5.0, "1.2", "G2V"),
            CatalogObject::new(50.0, 5.0, "6.5", "A0V"),
            CatalogObject::new(70.0, 5.0, "", "A0V"),
            CatalogObject::new(90.0, 5.0, "2.0", ""),
            CatalogObject::new(110.0, 5.0, "n/a", "B3V"),
            CatalogObject::new(130.0, 5.0, "5.0", "M2Ia"),
        ])
    }

    #[test]
    fn snapshot_filters_and_sorts() {
        let queue = ObjectQueue::snapshot(&catalog(), 800.0, 800.0, 5.0);
        let xs: Vec<f64> = queue.iter().map(|entry| entry.x).collect();
        assert_eq!(xs, vec![10.0, 200.0]);
        assert_eq!(queue.peek().unwrap().spectral, SpectralType::parse("G2V"));
    }

    #[test]
    fn raising_the_limit_admits_fainter_objects() {
        let queue = ObjectQueue::snapshot(&catalog(), 800.0, 800.0, 7.0);
        assert_eq!(queue.len(), 4);
    }

    #[test]
    fn pops_only_within_lookahead() {
        let mut queue = ObjectQueue::snapshot(&catalog(), 800.0, 800.0, 5.0);
        assert!(queue.pop_ready(4.0, 5.0).is_none());
        assert_eq!(queue.pop_ready(5.0, 5.0).unwrap().x, 10.0);
        assert!(queue.pop_ready(5.0, 5.0).is_none());
        assert_eq!(queue.pop_ready(400.0, 5.0).unwrap().x, 200.0);
        assert!(queue.is_empty());
    }
}
