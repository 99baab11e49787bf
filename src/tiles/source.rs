use crate::core::constants::COMPONENT_SEPARATOR;
use crate::core::geo::TileCoord;
use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "http://skywisetiles.wdtinc.com/";

/// Trait representing anything that can produce tile URLs for a given
/// coordinate and frame key.
pub trait TileSource: Send + Sync {
    /// Build a URL for the requested `coord` at `timestamp`.
    fn url(&self, coord: TileCoord, timestamp: &str) -> String;
}

/// A tile product, possibly made of several comma-joined components
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LayerSpec {
    pub name: String,
    /// Component whose valid times drive the animation axis
    pub base_layer_name: String,
    #[serde(default)]
    pub style: Option<String>,
}

impl LayerSpec {
    pub fn new(name: impl Into<String>, base_layer_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_layer_name: base_layer_name.into(),
            style: None,
        }
    }

    /// A single-component layer that is its own base
    pub fn single(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::new(name.clone(), name)
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        let style = style.into();
        self.style = if style.is_empty() { None } else { Some(style) };
        self
    }

    pub fn components(&self) -> Vec<&str> {
        self.name.split(COMPONENT_SEPARATOR).collect()
    }

    pub fn is_composite(&self) -> bool {
        self.components().len() > 1
    }

    /// Endpoint listing the valid times of every component
    pub fn valid_times_url(&self, base_url: &str) -> String {
        format!(
            "{}swarmweb/valid_frames?format=json&products={}",
            base_url, self.name
        )
    }

    pub fn tile_url(&self, base_url: &str, coord: TileCoord, timestamp: &str) -> String {
        if self.is_composite() {
            let mut url = format!(
                "{}swarmweb/comptile/{}/{}/{}.png?LAYERS={}&TIMES={}",
                base_url, coord.z, coord.x, coord.y, self.name, timestamp
            );
            if let Some(style) = &self.style {
                url.push_str("&STYLES=");
                url.push_str(style);
            }
            url
        } else {
            let mut url = format!(
                "{}swarmweb/tile/{}/{}/{}/{}/{}.png",
                base_url, self.name, timestamp, coord.z, coord.x, coord.y
            );
            if let Some(style) = &self.style {
                url.push_str("?STYLE=");
                url.push_str(style);
            }
            url
        }
    }
}

/// A layer bound to a tile server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerSource {
    base_url: String,
    layer: LayerSpec,
}

impl LayerSource {
    pub fn new(base_url: impl Into<String>, layer: LayerSpec) -> Self {
        Self {
            base_url: normalize_base_url(base_url.into()),
            layer,
        }
    }

    pub fn layer(&self) -> &LayerSpec {
        &self.layer
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn valid_times_url(&self) -> String {
        self.layer.valid_times_url(&self.base_url)
    }
}

impl TileSource for LayerSource {
    fn url(&self, coord: TileCoord, timestamp: &str) -> String {
        self.layer.tile_url(&self.base_url, coord, timestamp)
    }
}

/// Ensures the base URL ends with exactly one `/`
pub fn normalize_base_url(mut base_url: String) -> String {
    while base_url.ends_with('/') {
        base_url.pop();
    }
    base_url.push('/');
    base_url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_tile_url() {
        let layer = LayerSpec::single("lowaltradarcontours");
        let url = layer.tile_url(DEFAULT_BASE_URL, TileCoord::new(3, 5, 4), "2024-05-01T12:00:00");

        assert!(!layer.is_composite());
        assert_eq!(
            url,
            "http://skywisetiles.wdtinc.com/swarmweb/tile/lowaltradarcontours/2024-05-01T12:00:00/4/3/5.png"
        );
        let styled = layer.with_style("dark").tile_url(DEFAULT_BASE_URL, TileCoord::new(0, 0, 0), "t");
        assert!(styled.ends_with("/0/0/0.png?STYLE=dark"));
    }

    #[test]
    fn test_composite_tile_url() {
        let layer = LayerSpec::new("alert,radar,alert", "radar").with_style("default,default,wapo");
        let url = layer.tile_url("http://host/", TileCoord::new(1, 2, 3), "a,b,c");

        assert!(layer.is_composite());
        assert_eq!(layer.components(), vec!["alert", "radar", "alert"]);
        assert_eq!(
            url,
            "http://host/swarmweb/comptile/3/1/2.png?LAYERS=alert,radar,alert&TIMES=a,b,c&STYLES=default,default,wapo"
        );
    }

    #[test]
    fn test_source_normalizes_base_url() {
        let source = LayerSource::new("http://host//", LayerSpec::single("radar"));
        assert_eq!(
            source.valid_times_url(),
            "http://host/swarmweb/valid_frames?format=json&products=radar"
        );
        assert_eq!(
            source.url(TileCoord::new(0, 1, 2), "t"),
            "http://host/swarmweb/tile/radar/t/2/0/1.png"
        );
    }

    #[test]
    fn test_empty_style_is_none() {
        assert_eq!(LayerSpec::single("radar").with_style("").style, None);
    }
}
