use serde::{Deserialize, Deserializer, Serialize};

/// The node-type taxonomy, ordered by level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeType {
    #[serde(rename = "TEMATIK")]
    Thematic,
    #[serde(rename = "SUB_TEMATIK")]
    SubThematic,
    #[serde(rename = "SUB_SUB_TEMATIK")]
    SubSubThematic,
    #[serde(rename = "SUPER_SUB_TEMATIK")]
    SuperSubThematic,
    #[serde(rename = "STRATEGIC_PEMDA")]
    Strategic,
    #[serde(rename = "TACTICAL_PEMDA")]
    Tactical,
    #[serde(rename = "OPERATIONAL_PEMDA")]
    Operational,
}

impl NodeType {
    pub const ALL: [NodeType; 7] = [
        NodeType::Thematic,
        NodeType::SubThematic,
        NodeType::SubSubThematic,
        NodeType::SuperSubThematic,
        NodeType::Strategic,
        NodeType::Tactical,
        NodeType::Operational,
    ];

    /// The level a node of this type sits at (0-6).
    pub fn level(&self) -> i32 {
        match self {
            NodeType::Thematic => 0,
            NodeType::SubThematic => 1,
            NodeType::SubSubThematic => 2,
            NodeType::SuperSubThematic => 3,
            NodeType::Strategic => 4,
            NodeType::Tactical => 5,
            NodeType::Operational => 6,
        }
    }

    pub fn from_level(level: i32) -> Option<Self> {
        usize::try_from(level)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
    }

    /// Wire value, e.g. "SUB_TEMATIK".
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Thematic => "TEMATIK",
            NodeType::SubThematic => "SUB_TEMATIK",
            NodeType::SubSubThematic => "SUB_SUB_TEMATIK",
            NodeType::SuperSubThematic => "SUPER_SUB_TEMATIK",
            NodeType::Strategic => "STRATEGIC_PEMDA",
            NodeType::Tactical => "TACTICAL_PEMDA",
            NodeType::Operational => "OPERATIONAL_PEMDA",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            NodeType::Thematic => "Tematik",
            NodeType::SubThematic => "Sub Tematik",
            NodeType::SubSubThematic => "Sub Sub Tematik",
            NodeType::SuperSubThematic => "Super Sub Tematik",
            NodeType::Strategic => "Strategic Pemda",
            NodeType::Tactical => "Tactical Pemda",
            NodeType::Operational => "Operational Pemda",
        }
    }

    /// Levels 4-6 belong to an organisational unit.
    pub fn is_org_scoped(&self) -> bool {
        self.level() >= 4
    }
}

/// Review status of a node. The client writes DRAFT on create and UPDATE on edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NodeStatus {
    #[default]
    Draft,
    Update,
    Approved,
    /// Any status this client does not know; the node is still shown.
    #[serde(other)]
    Unknown,
}

impl NodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeStatus::Draft => "DRAFT",
            NodeStatus::Update => "UPDATE",
            NodeStatus::Approved => "APPROVED",
            NodeStatus::Unknown => "UNKNOWN",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Target {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(rename = "nilai", deserialize_with = "number_or_string")]
    pub value: f64,
    #[serde(rename = "satuan", default)]
    pub unit: String,
    #[serde(rename = "tahun", default)]
    pub fiscal_year: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Indicator {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(rename = "indikator")]
    pub text: String,
    #[serde(rename = "keterangan", default)]
    pub description: Option<String>,
    #[serde(rename = "tahun", default)]
    pub fiscal_year: Option<i32>,
    #[serde(default)]
    pub targets: Vec<Target>,
}

/// One node of a performance tree as served by the backend, children nested.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PerformanceNode {
    pub id: i64,
    #[serde(rename = "parentId", default)]
    pub parent_id: Option<i64>,
    #[serde(rename = "namaPohon")]
    pub name: String,
    #[serde(rename = "keterangan", default)]
    pub description: Option<String>,
    #[serde(rename = "tahun")]
    pub fiscal_year: i32,
    #[serde(rename = "jenisPohon")]
    pub node_type: NodeType,
    #[serde(rename = "levelPohon")]
    pub level: i32,
    #[serde(default)]
    pub status: NodeStatus,
    #[serde(rename = "kodeOpd", default)]
    pub org_unit_code: Option<String>,
    #[serde(rename = "kodePemda", default)]
    pub region_code: Option<String>,
    #[serde(rename = "indikator", default)]
    pub indicators: Vec<Indicator>,
    #[serde(default)]
    pub children: Vec<PerformanceNode>,
}

impl PerformanceNode {
    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Depth-first search for a node by id.
    pub fn find(&self, id: i64) -> Option<&PerformanceNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(id))
    }

    /// Number of nodes in this subtree, including self.
    pub fn subtree_len(&self) -> usize {
        1 + self.children.iter().map(|c| c.subtree_len()).sum::<usize>()
    }
}

/// Search a forest for a node by id.
pub fn find_in<'a>(roots: &'a [PerformanceNode], id: i64) -> Option<&'a PerformanceNode> {
    roots.iter().find_map(|r| r.find(id))
}

/// A theme as listed by the theme endpoint. Older rows carry the title in
/// `tema` instead of `namaPohon` and may omit the level.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ThemeSummary {
    pub id: i64,
    #[serde(rename = "namaPohon", default)]
    pub name: Option<String>,
    #[serde(default)]
    pub tema: Option<String>,
    #[serde(rename = "keterangan", default)]
    pub description: Option<String>,
    #[serde(rename = "tahun", default)]
    pub fiscal_year: Option<i32>,
    #[serde(default)]
    pub status: NodeStatus,
    #[serde(rename = "kodePemda", default)]
    pub region_code: Option<String>,
    #[serde(rename = "indikator", default)]
    pub indicators: Vec<Indicator>,
}

impl ThemeSummary {
    pub fn title(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.is_empty())
            .or(self.tema.as_deref())
            .unwrap_or("")
    }

    /// A childless level-0 node, for views that list themes flat.
    pub fn into_node(self, default_year: i32) -> PerformanceNode {
        PerformanceNode {
            id: self.id,
            parent_id: None,
            name: self.title().to_string(),
            description: self.description,
            fiscal_year: self.fiscal_year.unwrap_or(default_year),
            node_type: NodeType::Thematic,
            level: 0,
            status: self.status,
            org_unit_code: None,
            region_code: self.region_code,
            indicators: self.indicators,
            children: Vec::new(),
        }
    }
}

/// Pending / approved totals for one level, from the count endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LevelCount {
    #[serde(rename = "levelPohon")]
    pub level: i32,
    #[serde(rename = "jenisPohon", default)]
    pub node_type: String,
    #[serde(default)]
    pub pending: u32,
    #[serde(default)]
    pub approved: u32,
}

/// Create/update body for `/pohon-kinerja`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodePayload {
    #[serde(rename = "parentId")]
    pub parent_id: Option<i64>,
    #[serde(rename = "namaPohon")]
    pub name: String,
    #[serde(rename = "keterangan")]
    pub description: String,
    #[serde(rename = "tahun")]
    pub fiscal_year: i32,
    #[serde(rename = "jenisPohon")]
    pub node_type: NodeType,
    #[serde(rename = "levelPohon")]
    pub level: i32,
    pub status: NodeStatus,
    #[serde(rename = "kodeOpd", skip_serializing_if = "Option::is_none")]
    pub org_unit_code: Option<String>,
    #[serde(rename = "kodePemda", skip_serializing_if = "Option::is_none")]
    pub region_code: Option<String>,
    #[serde(rename = "indikators")]
    pub indicators: Vec<IndicatorPayload>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(rename = "indikator")]
    pub text: String,
    #[serde(rename = "keterangan")]
    pub description: String,
    #[serde(rename = "tahun")]
    pub fiscal_year: i32,
    pub targets: Vec<TargetPayload>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(rename = "nilai")]
    pub value: f64,
    #[serde(rename = "satuan")]
    pub unit: String,
    #[serde(rename = "tahun")]
    pub fiscal_year: i32,
}

/// Target values arrive as numbers from most endpoints and as numeric
/// strings from the theme list.
fn number_or_string<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s
            .trim()
            .replace(',', ".")
            .parse::<f64>()
            .map_err(|_| serde::de::Error::custom(format!("invalid target value {s:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_level_round_trip() {
        for (i, t) in NodeType::ALL.iter().enumerate() {
            assert_eq!(t.level(), i as i32);
            assert_eq!(NodeType::from_level(i as i32), Some(*t));
        }
        assert_eq!(NodeType::from_level(-1), None);
        assert_eq!(NodeType::from_level(7), None);
        assert!(NodeType::Strategic.is_org_scoped());
        assert!(!NodeType::SuperSubThematic.is_org_scoped());
    }

    #[test]
    fn test_node_type_wire_values() {
        for t in NodeType::ALL {
            let json = serde_json::to_value(t).unwrap();
            assert_eq!(json, json!(t.as_str()));
        }
        assert_eq!(NodeType::Tactical.label(), "Tactical Pemda");
    }

    #[test]
    fn test_decode_nested_tree() {
        let node: PerformanceNode = serde_json::from_value(json!({
            "id": 1,
            "parentId": null,
            "namaPohon": "Pendidikan",
            "keterangan": "Tema pendidikan",
            "tahun": 2025,
            "jenisPohon": "TEMATIK",
            "levelPohon": 0,
            "status": "APPROVED",
            "indikator": [{
                "id": 11,
                "indikator": "Angka partisipasi sekolah",
                "keterangan": null,
                "tahun": 2025,
                "targets": [{"id": 111, "nilai": 95.5, "satuan": "%", "tahun": 2025}]
            }],
            "children": [{
                "id": 2,
                "parentId": 1,
                "namaPohon": "Pendidikan dasar",
                "tahun": 2025,
                "jenisPohon": "SUB_TEMATIK",
                "levelPohon": 1,
                "status": "DRAFT"
            }]
        }))
        .unwrap();

        assert_eq!(node.status, NodeStatus::Approved);
        assert_eq!(node.indicators[0].targets[0].value, 95.5);
        assert_eq!(node.children[0].parent_id, Some(1));
        assert!(node.children[0].indicators.is_empty());
        assert_eq!(node.subtree_len(), 2);
        assert_eq!(node.find(2).map(|n| n.name.as_str()), Some("Pendidikan dasar"));
        assert!(node.find(3).is_none());
    }

    #[test]
    fn test_unknown_status_still_decodes() {
        let node: PerformanceNode = serde_json::from_value(json!({
            "id": 7,
            "parentId": null,
            "namaPohon": "Kesehatan",
            "tahun": 2025,
            "jenisPohon": "TEMATIK",
            "levelPohon": 0,
            "status": "DITOLAK"
        }))
        .unwrap();
        assert_eq!(node.status, NodeStatus::Unknown);
        assert_eq!(node.status.as_str(), "UNKNOWN");
    }

    #[test]
    fn test_target_value_from_string() {
        let target: Target =
            serde_json::from_value(json!({"id": 5, "nilai": "12,5", "satuan": "dok"})).unwrap();
        assert_eq!(target.value, 12.5);
        assert_eq!(target.fiscal_year, None);

        let bad = serde_json::from_value::<Target>(json!({"nilai": "banyak", "satuan": "x"}));
        assert!(bad.is_err());
    }

    #[test]
    fn test_theme_summary_title_fallback() {
        let theme: ThemeSummary =
            serde_json::from_value(json!({"id": 3, "tema": "Kesehatan", "tahun": 2024})).unwrap();
        assert_eq!(theme.title(), "Kesehatan");

        let node = theme.into_node(2025);
        assert_eq!(node.name, "Kesehatan");
        assert_eq!(node.fiscal_year, 2024);
        assert_eq!(node.level, 0);
        assert_eq!(node.node_type, NodeType::Thematic);
    }

    #[test]
    fn test_payload_field_names() {
        let payload = NodePayload {
            parent_id: Some(1),
            name: "Sub".to_string(),
            description: String::new(),
            fiscal_year: 2025,
            node_type: NodeType::SubThematic,
            level: 1,
            status: NodeStatus::Draft,
            org_unit_code: None,
            region_code: None,
            indicators: vec![IndicatorPayload {
                id: None,
                text: "X".to_string(),
                description: String::new(),
                fiscal_year: 2025,
                targets: vec![TargetPayload {
                    id: None,
                    value: 10.0,
                    unit: "%".to_string(),
                    fiscal_year: 2025,
                }],
            }],
        };

        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            value,
            json!({
                "parentId": 1,
                "namaPohon": "Sub",
                "keterangan": "",
                "tahun": 2025,
                "jenisPohon": "SUB_TEMATIK",
                "levelPohon": 1,
                "status": "DRAFT",
                "indikators": [{
                    "indikator": "X",
                    "keterangan": "",
                    "tahun": 2025,
                    "targets": [{"nilai": 10.0, "satuan": "%", "tahun": 2025}]
                }]
            })
        );
    }
}
