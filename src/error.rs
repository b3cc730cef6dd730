//! Error types shared by the map engine, the lifecycle manager and navigation.

use thiserror::Error;

use crate::map::{InteractionId, LayerId, OverlayId};

/// Errors that make `init_map` fail. A half-built map is unusable, so these
/// propagate to the caller.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MapError {
    /// The pane the map renders into does not exist.
    #[error("map target `{0}` not found")]
    MissingTarget(String),

    /// Another live instance is still bound to the target.
    #[error("map target `{selector}` is still bound to map generation {generation}")]
    TargetInUse { selector: String, generation: u64 },

    /// The view options cannot produce a usable view.
    #[error("invalid view configuration: {0}")]
    InvalidView(String),
}

/// Failures of individual engine operations. During teardown these are
/// recorded per resource and never abort the remaining steps.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("{0} is not registered on this map")]
    UnknownLayer(LayerId),

    #[error("{0} is not registered on this map")]
    UnknownInteraction(InteractionId),

    #[error("{0} is not registered on this map")]
    UnknownOverlay(OverlayId),

    /// The layer's data source is borrowed elsewhere and cannot be cleared.
    #[error("data source of {0} is in use")]
    SourceBusy(LayerId),

    /// The overlay element is borrowed elsewhere and cannot be detached.
    #[error("element of {0} is in use")]
    OverlayBusy(OverlayId),
}

/// Errors reported by a router when it rejects a navigation request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NavigationError {
    #[error("no page registered for route `{0}`")]
    UnknownRoute(String),

    #[error("route `{0}` is not an absolute path")]
    InvalidRoute(String),
}
