//! Left joins of resolved positions against the node and tag lookup tables.

use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

use crate::analyzers::utility::numeric_aware_cmp;
use crate::config::UnaffiliatedPolicy;
use crate::error::{PipelineError, PipelineResult};
use crate::output::read_records;
use crate::records::{EnrichedPosition, NodeInfo, ResolvedPosition, TagInfo, UNAFFILIATED};

/// `node_names.csv` indexed by node id. The first row for an id wins.
#[derive(Debug, Default)]
pub struct NodeDirectory {
    entries: Vec<NodeInfo>,
    by_id: HashMap<String, usize>,
}

impl NodeDirectory {
    pub fn new(rows: Vec<NodeInfo>) -> Self {
        let mut dir = NodeDirectory::default();
        for mut row in rows {
            row.node_id = row.node_id.trim().to_string();
            if dir.by_id.contains_key(&row.node_id) {
                continue;
            }
            dir.by_id.insert(row.node_id.clone(), dir.entries.len());
            dir.entries.push(row);
        }
        dir
    }

    /// Loads the table; a missing file yields an empty directory so every
    /// node falls back to its raw id.
    pub fn load(path: &Path) -> PipelineResult<Self> {
        match read_records::<NodeInfo>(path) {
            Ok(rows) => {
                info!(path = %path.display(), nodes = rows.len(), "Node table loaded");
                Ok(Self::new(rows))
            }
            Err(PipelineError::FileNotFound(_)) => {
                warn!(path = %path.display(), "Node table not found, places fall back to node ids");
                Ok(Self::default())
            }
            Err(e) => Err(e),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, node_id: &str) -> Option<&NodeInfo> {
        self.by_id.get(node_id).map(|&i| &self.entries[i])
    }

    /// Known place names ordered by floor, then west-to-east position,
    /// then table order.
    pub fn place_order(&self) -> Vec<String> {
        let mut rows: Vec<(usize, &NodeInfo)> = self.entries.iter().enumerate().collect();
        rows.sort_by(|(ia, a), (ib, b)| {
            let fa = a.floor.as_deref().unwrap_or("");
            let fb = b.floor.as_deref().unwrap_or("");
            let wa = a.west_to_east.as_deref().unwrap_or("");
            let wb = b.west_to_east.as_deref().unwrap_or("");
            numeric_aware_cmp(fa, fb)
                .then_with(|| numeric_aware_cmp(wa, wb))
                .then(ia.cmp(ib))
        });

        let mut order: Vec<String> = Vec::new();
        for (_, row) in rows {
            let name = place_label(row);
            if !order.contains(&name) {
                order.push(name);
            }
        }
        order
    }

    /// Sorts `labels` into place order; labels unknown to the table follow
    /// alphabetically.
    pub fn order_places<I: IntoIterator<Item = String>>(&self, labels: I) -> Vec<String> {
        let mut present: Vec<String> = labels.into_iter().collect();
        present.sort();
        present.dedup();

        let mut ordered: Vec<String> = self
            .place_order()
            .into_iter()
            .filter(|p| present.contains(p))
            .collect();
        let unknown: Vec<String> = present.into_iter().filter(|p| !ordered.contains(p)).collect();
        ordered.extend(unknown);
        ordered
    }
}

fn place_label(row: &NodeInfo) -> String {
    match row.place_name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => row.node_id.clone(),
    }
}

/// `tag_names.csv` indexed by tag id, keeping table order.
#[derive(Debug, Default)]
pub struct TagDirectory {
    entries: Vec<TagInfo>,
    by_id: HashMap<String, usize>,
}

impl TagDirectory {
    pub fn new(rows: Vec<TagInfo>) -> Self {
        let mut dir = TagDirectory::default();
        for mut row in rows {
            row.tag_id = row.tag_id.trim().to_string();
            if dir.by_id.contains_key(&row.tag_id) {
                continue;
            }
            dir.by_id.insert(row.tag_id.clone(), dir.entries.len());
            dir.entries.push(row);
        }
        dir
    }

    /// Loads the table; a missing file yields an empty directory.
    pub fn load(path: &Path) -> PipelineResult<Self> {
        match read_records::<TagInfo>(path) {
            Ok(rows) => {
                info!(path = %path.display(), tags = rows.len(), "Tag table loaded");
                Ok(Self::new(rows))
            }
            Err(PipelineError::FileNotFound(_)) => {
                warn!(path = %path.display(), "Tag table not found, names fall back to tag ids");
                Ok(Self::default())
            }
            Err(e) => Err(e),
        }
    }

    pub fn get(&self, tag_id: &str) -> Option<&TagInfo> {
        self.by_id.get(tag_id).map(|&i| &self.entries[i])
    }

    pub fn entries(&self) -> &[TagInfo] {
        &self.entries
    }

    /// Display name, falling back to the raw id.
    pub fn name_of(&self, tag_id: &str) -> String {
        self.get(tag_id)
            .and_then(|t| non_empty(t.tag_name.as_deref()))
            .unwrap_or_else(|| tag_id.to_string())
    }

    /// Department, falling back to [`UNAFFILIATED`].
    pub fn department_of(&self, tag_id: &str) -> String {
        self.get(tag_id)
            .and_then(|t| non_empty(t.department.as_deref()))
            .unwrap_or_else(|| UNAFFILIATED.to_string())
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

/// Attaches place and tag metadata to every resolved position.
///
/// Unmatched nodes keep their id as place name, unmatched tags keep their id
/// as display name and get the [`UNAFFILIATED`] department, which
/// [`UnaffiliatedPolicy::Drop`] removes.
pub fn enrich_positions(
    positions: &[ResolvedPosition],
    nodes: &NodeDirectory,
    tags: &TagDirectory,
    policy: UnaffiliatedPolicy,
) -> Vec<EnrichedPosition> {
    positions
        .iter()
        .map(|p| {
            let node = nodes.get(p.node_id.trim());
            EnrichedPosition {
                datetime: p.datetime,
                node_id: p.node_id.clone(),
                tag_id: p.tag_id.clone(),
                tag_rssi: p.tag_rssi,
                tag_volt: p.tag_volt,
                place_name: node.map(place_label).unwrap_or_else(|| p.node_id.clone()),
                floor: node.and_then(|n| n.floor.clone()),
                west_to_east: node.and_then(|n| n.west_to_east.clone()),
                tag_name: tags.name_of(p.tag_id.trim()),
                department: tags.department_of(p.tag_id.trim()),
            }
        })
        .filter(|e| policy == UnaffiliatedPolicy::Retain || e.department != UNAFFILIATED)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_datetime;

    fn node(id: &str, place: Option<&str>, floor: &str, w2e: &str) -> NodeInfo {
        NodeInfo {
            node_id: id.to_string(),
            place_name: place.map(str::to_string),
            floor: Some(floor.to_string()),
            west_to_east: Some(w2e.to_string()),
        }
    }

    fn tag(id: &str, name: &str, dept: Option<&str>) -> TagInfo {
        TagInfo {
            tag_id: id.to_string(),
            tag_name: Some(name.to_string()),
            department: dept.map(str::to_string),
        }
    }

    fn position(node_id: &str, tag_id: &str) -> ResolvedPosition {
        ResolvedPosition {
            datetime: parse_datetime("2025-09-01 08:00:00").unwrap(),
            node_id: node_id.to_string(),
            tag_id: tag_id.to_string(),
            tag_rssi: -50.0,
            tag_volt: None,
        }
    }

    #[test]
    fn test_unmatched_node_keeps_raw_id_as_place() {
        let nodes = NodeDirectory::new(vec![node("n1", Some("Lobby"), "1", "1")]);
        let tags = TagDirectory::default();

        let out = enrich_positions(
            &[position("n1", "t1"), position("n9", "t1")],
            &nodes,
            &tags,
            UnaffiliatedPolicy::Retain,
        );

        assert_eq!(out[0].place_name, "Lobby");
        assert_eq!(out[0].floor.as_deref(), Some("1"));
        assert_eq!(out[1].place_name, "n9");
        assert_eq!(out[1].floor, None);
    }

    #[test]
    fn test_unmatched_tag_falls_back_to_id_and_sentinel() {
        let nodes = NodeDirectory::default();
        let tags = TagDirectory::new(vec![tag("t1", "Sato", Some("giken")), tag("t2", "Ito", None)]);

        let out = enrich_positions(
            &[position("n1", "t1"), position("n1", "t2"), position("n1", "t3")],
            &nodes,
            &tags,
            UnaffiliatedPolicy::Retain,
        );

        assert_eq!((out[0].tag_name.as_str(), out[0].department.as_str()), ("Sato", "giken"));
        assert_eq!((out[1].tag_name.as_str(), out[1].department.as_str()), ("Ito", UNAFFILIATED));
        assert_eq!((out[2].tag_name.as_str(), out[2].department.as_str()), ("t3", UNAFFILIATED));
    }

    #[test]
    fn test_drop_policy_removes_unaffiliated_rows() {
        let tags = TagDirectory::new(vec![tag("t1", "Sato", Some("giken"))]);
        let out = enrich_positions(
            &[position("n1", "t1"), position("n1", "t2")],
            &NodeDirectory::default(),
            &tags,
            UnaffiliatedPolicy::Drop,
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].tag_id, "t1");
    }

    #[test]
    fn test_blank_place_name_falls_back_to_id() {
        let nodes = NodeDirectory::new(vec![node("n1", Some("  "), "1", "1")]);
        let out = enrich_positions(
            &[position("n1", "t1")],
            &nodes,
            &TagDirectory::default(),
            UnaffiliatedPolicy::Retain,
        );
        assert_eq!(out[0].place_name, "n1");
    }

    #[test]
    fn test_place_order_by_floor_then_west_to_east() {
        let nodes = NodeDirectory::new(vec![
            node("n1", Some("East 2F"), "2", "3"),
            node("n2", Some("West 2F"), "2", "1"),
            node("n3", Some("Center 10F"), "10", "2"),
            node("n4", Some("Center 1F"), "1", "2"),
        ]);
        assert_eq!(
            nodes.place_order(),
            vec!["Center 1F", "West 2F", "East 2F", "Center 10F"]
        );
    }

    #[test]
    fn test_order_places_appends_unknown_sorted() {
        let nodes = NodeDirectory::new(vec![
            node("n1", Some("B"), "1", "2"),
            node("n2", Some("A"), "1", "1"),
        ]);
        let ordered = nodes.order_places(vec![
            "zeta".to_string(),
            "B".to_string(),
            "alpha".to_string(),
            "A".to_string(),
            "B".to_string(),
        ]);
        assert_eq!(ordered, vec!["A", "B", "alpha", "zeta"]);
    }

    #[test]
    fn test_duplicate_ids_keep_first_row() {
        let nodes = NodeDirectory::new(vec![node("n1", Some("First"), "1", "1"), node("n1", Some("Second"), "1", "1")]);
        assert_eq!(nodes.get("n1").unwrap().place_name.as_deref(), Some("First"));
    }

    #[test]
    fn test_missing_lookup_file_is_empty_directory() {
        let nodes = NodeDirectory::load(Path::new("no/such/node_names.csv")).unwrap();
        assert!(nodes.is_empty());
        let tags = TagDirectory::load(Path::new("no/such/tag_names.csv")).unwrap();
        assert!(tags.entries().is_empty());
    }
}
