use super::products::{BaseLayer, LayerGroup};
use crate::tiles::source::LayerSpec;
use crate::{LoopError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Placeholder in a group's layer name replaced by the base layer id
const BASE_LAYER_TOKEN: &str = "%@";
const ALERT_STYLE: &str = "default,default,wapo";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupEntry {
    pub id: String,
    #[serde(default)]
    pub layer_name: Option<String>,
    #[serde(default)]
    pub layer_style_default: Option<String>,
}

/// Maps groups and alert types to tile products.
///
/// ```json
/// {
///   "groups": [{ "id": "flood", "layerName": "%@,floodwarnings", "layerStyleDefault": "default,wapo" }],
///   "alertTypes": ["tornadowarning"]
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerCatalog {
    #[serde(default)]
    pub groups: Vec<GroupEntry>,
    #[serde(default)]
    pub alert_types: Vec<String>,
}

impl LayerCatalog {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| LoopError::Config(format!("layer catalog: {}", e)))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| LoopError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }

    pub fn for_base_layer(&self, base: BaseLayer) -> LayerSpec {
        LayerSpec::single(base.id())
    }

    /// The group's product over `base`, or the bare base layer when the
    /// catalog does not know the group
    pub fn for_group(&self, group: LayerGroup, base: BaseLayer) -> LayerSpec {
        // Later entries override earlier ones
        let Some(entry) = self.groups.iter().rev().find(|g| g.id == group.id()) else {
            return self.for_base_layer(base);
        };

        let name = entry
            .layer_name
            .as_deref()
            .map(|template| template.replacen(BASE_LAYER_TOKEN, base.id(), 1))
            .unwrap_or_else(|| base.id().to_string());
        LayerSpec::new(name, base.id()).with_style(entry.layer_style_default.clone().unwrap_or_default())
    }

    /// Alert overlay sandwiching the base layer, or the bare base layer for
    /// alert types without a mapped product
    pub fn for_alert_type(&self, alert_type: &str, base: BaseLayer) -> LayerSpec {
        if !self.alert_types.iter().any(|a| a == alert_type) {
            return self.for_base_layer(base);
        }
        let name = format!("{alert},{base},{alert}", alert = alert_type, base = base.id());
        LayerSpec::new(name, base.id()).with_style(ALERT_STYLE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"{
        "groups": [
            { "id": "flood", "layerName": "%@,floodwarnings", "layerStyleDefault": "default,wapo" },
            { "id": "fog", "layerStyleDefault": "" }
        ],
        "alertTypes": ["tornadowarning"]
    }"#;

    #[test]
    fn test_group_template() {
        let catalog = LayerCatalog::from_json_str(CATALOG).unwrap();
        let spec = catalog.for_group(LayerGroup::Flood, BaseLayer::Satellite);

        assert_eq!(spec.name, "irsatellitegrid,floodwarnings");
        assert_eq!(spec.base_layer_name, "irsatellitegrid");
        assert_eq!(spec.style.as_deref(), Some("default,wapo"));
    }

    #[test]
    fn test_group_without_name_uses_base() {
        let catalog = LayerCatalog::from_json_str(CATALOG).unwrap();
        let spec = catalog.for_group(LayerGroup::Fog, BaseLayer::Radar);
        assert_eq!(spec, LayerSpec::single("lowaltradarcontours"));

        let unknown = catalog.for_group(LayerGroup::Wind, BaseLayer::Radar);
        assert_eq!(unknown, LayerSpec::single("lowaltradarcontours"));
    }

    #[test]
    fn test_alert_types() {
        let catalog = LayerCatalog::from_json_str(CATALOG).unwrap();
        let spec = catalog.for_alert_type("tornadowarning", BaseLayer::Radar);

        assert_eq!(spec.name, "tornadowarning,lowaltradarcontours,tornadowarning");
        assert_eq!(spec.base_layer_name, "lowaltradarcontours");
        assert_eq!(spec.style.as_deref(), Some("default,default,wapo"));
        assert!(spec.is_composite());

        let fallback = catalog.for_alert_type("heatadvisory", BaseLayer::Satellite);
        assert_eq!(fallback, LayerSpec::single("irsatellitegrid"));
    }

    #[test]
    fn test_bad_catalog_is_config_error() {
        assert!(matches!(LayerCatalog::from_json_str("[1, 2]"), Err(LoopError::Config(_))));
        assert_eq!(LayerCatalog::from_json_str("{}").unwrap(), LayerCatalog::default());
    }
}
