use crate::action::ActionList;
use crate::condition::ConditionHolder;
use crate::hologram::HologramSettings;
use chrono::{DateTime, Utc};
use holograms_io::Location;
use serde::{Deserialize, Serialize};

/// Stored form of a hologram.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HologramDefinition {
    pub name: String,
    pub location: Location,
    #[serde(default)]
    pub settings: HologramSettings,
    #[serde(default, skip_serializing_if = "ConditionHolder::is_empty")]
    pub view_conditions: ConditionHolder,
    #[serde(default)]
    pub pages: Vec<PageDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
}

impl HologramDefinition {
    /// One page holding the given lines.
    pub fn simple(name: impl Into<String>, location: Location, lines: &[&str]) -> Self {
        Self {
            name: name.into(),
            location,
            settings: HologramSettings::default(),
            view_conditions: ConditionHolder::new(),
            pages: vec![PageDefinition {
                lines: lines.iter().map(|l| LineDefinition::new(*l)).collect(),
                ..PageDefinition::default()
            }],
            saved_at: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageDefinition {
    #[serde(default)]
    pub lines: Vec<LineDefinition>,
    #[serde(default, skip_serializing_if = "ConditionHolder::is_empty")]
    pub click_conditions: ConditionHolder,
    #[serde(default, skip_serializing_if = "ActionList::is_empty")]
    pub click_actions: ActionList,
}

/// The vertical offset is not stored; it follows from the content.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LineDefinition {
    pub content: String,
    #[serde(default)]
    pub offset_x: f64,
    #[serde(default)]
    pub offset_z: f64,
    #[serde(default, skip_serializing_if = "ConditionHolder::is_empty")]
    pub view_conditions: ConditionHolder,
    #[serde(default, skip_serializing_if = "ConditionHolder::is_empty")]
    pub click_conditions: ConditionHolder,
    #[serde(default, skip_serializing_if = "ActionList::is_empty")]
    pub click_actions: ActionList,
}

impl LineDefinition {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }
}
