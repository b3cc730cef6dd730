//! The vector map engine: view and projection, layers with their data
//! sources, selection, overlays and rasterisation to braille.

mod feature;
mod geometry;
mod id;
mod instance;
mod layer;
mod overlay;
mod projection;
mod renderer;
mod select;
mod source;
mod spatial;

pub use feature::{Attachment, Feature, Geometry, Path};
pub use id::{FeatureId, InteractionId, LayerId, ListenerKey, OverlayId};
pub use instance::{Cursor, MapInstance, MapTarget, ViewAction, ViewEvent, HIT_TOLERANCE_PX};
pub use layer::{Layer, Tier};
pub use overlay::{Overlay, OverlayBody, OverlayElement};
pub use projection::{Extent, View, ViewOptions, ZOOM_FACTOR};
pub use renderer::{render_map, MapFrame, MarkerGlyph, TextLabel};
pub use select::{Condition, PointerEvent, PointerKind, Select, SelectEvent};
pub use source::{FeatureFetcher, FsFetcher, LoadState, SourceOrigin, VectorSource};
