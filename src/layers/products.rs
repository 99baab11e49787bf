use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Product whose valid times anchor every overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BaseLayer {
    #[default]
    Radar,
    Satellite,
}

impl BaseLayer {
    pub const ALL: [BaseLayer; 2] = [BaseLayer::Radar, BaseLayer::Satellite];

    /// Product identifier on the tile server
    pub fn id(&self) -> &'static str {
        match self {
            BaseLayer::Radar => "lowaltradarcontours",
            BaseLayer::Satellite => "irsatellitegrid",
        }
    }

    /// Unknown identifiers fall back to radar
    pub fn parse(id: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|layer| layer.id() == id)
            .unwrap_or_default()
    }
}

impl fmt::Display for BaseLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for BaseLayer {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

/// Thematic overlay groups drawn on top of a base layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LayerGroup {
    #[default]
    None,
    StormAndTornadoes,
    Flood,
    Winter,
    Snow,
    Ice,
    Freezing,
    Fog,
    Fire,
    Wind,
    HurricaneAndTropical,
    HurricaneTracks,
}

impl LayerGroup {
    pub const ALL: [LayerGroup; 12] = [
        LayerGroup::None,
        LayerGroup::StormAndTornadoes,
        LayerGroup::Flood,
        LayerGroup::Winter,
        LayerGroup::Snow,
        LayerGroup::Ice,
        LayerGroup::Freezing,
        LayerGroup::Fog,
        LayerGroup::Fire,
        LayerGroup::Wind,
        LayerGroup::HurricaneAndTropical,
        LayerGroup::HurricaneTracks,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            LayerGroup::None => "none",
            LayerGroup::StormAndTornadoes => "stormandtornadoes",
            LayerGroup::Flood => "flood",
            LayerGroup::Winter => "winter",
            LayerGroup::Snow => "snow",
            LayerGroup::Ice => "ice",
            LayerGroup::Freezing => "freezing",
            LayerGroup::Fog => "fog",
            LayerGroup::Fire => "fire",
            LayerGroup::Wind => "wind",
            LayerGroup::HurricaneAndTropical => "hurricaneandtropical",
            LayerGroup::HurricaneTracks => "hurricanetracks",
        }
    }

    /// Unknown identifiers fall back to `None`
    pub fn parse(id: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|group| group.id() == id)
            .unwrap_or_default()
    }
}

impl fmt::Display for LayerGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for LayerGroup {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}
