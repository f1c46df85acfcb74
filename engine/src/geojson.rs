use serde::{Deserialize, Serialize};

use crate::model::{Area, Geometry};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub struct Feature {
    pub id: String,
    pub geometry: Geometry,
    pub properties: AreaProperties,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaProperties {
    /// Repeated here so layers can `promoteId` it for feature state.
    pub id: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub visible: bool,
    pub category: Option<String>,
}

impl Feature {
    pub fn from_area(area: &Area) -> Self {
        Self {
            id: area.id.clone(),
            geometry: area.geometry.clone(),
            properties: AreaProperties {
                id: area.id.clone(),
                name: area.name.clone(),
                description: area.description.clone(),
                visible: area.visible,
                category: area.category.clone(),
            },
        }
    }
}

impl FeatureCollection {
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

impl FromIterator<Feature> for FeatureCollection {
    fn from_iter<I: IntoIterator<Item = Feature>>(iter: I) -> Self {
        Self {
            features: iter.into_iter().collect(),
        }
    }
}
