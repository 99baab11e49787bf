//! Prelude module for common tileloop types and traits
//!
//! This module re-exports the most commonly used types, traits, and functions
//! for easy importing with `use tileloop::prelude::*;`

pub use crate::core::{
    config::{LoopConfig, LoopProfile},
    geo::{LatLng, LatLngBounds, Point, TileCoord},
    viewport::{MapRect, Viewport},
};

pub use crate::animation::{AnimationDriver, AnimationPhase, AnimationState, FrameTimer};

pub use crate::context::{LoopContext, LoopContextBuilder};

pub use crate::events::{EventQueue, EventSender, OverlayEvent};

pub use crate::layers::{BaseLayer, LayerCatalog, LayerGroup};

pub use crate::net::{ApiKeyCredentials, HttpRequest, HttpResponse, ReqwestClient};

pub use crate::overlay::LoopOverlay;

pub use crate::runtime::{AsyncHandle, AsyncSpawner, TaskHandle, TokioSpawner};

pub use crate::tiles::{
    cache::{CacheEntry, TileCache},
    progress::FetchProgress,
    renderer::{DrawCommand, FrameRenderer},
    scheduler::{FetchRequest, FetchScheduler, FetchSummary},
    source::{LayerSource, LayerSpec, TileSource},
};

pub use crate::time::{Frame, TimeAxis, ValidTimesPoller};

pub use crate::traits::{CredentialProvider, HttpClient};

pub use crate::{LoopError, Result};

pub use std::{pin::Pin, sync::Arc, time::Duration};

pub use fxhash::{FxHashMap as HashMap, FxHashSet as HashSet, FxHasher};

pub use futures::Future;
