//! Journal markers: the records, the point layer built from them, the
//! hover/click interactions on that layer and the hover preview.

mod interaction;
mod layer;
mod preview;
mod record;

pub use interaction::{Interaction, InteractionEvent};
pub use layer::{build_marker_layer, create_point_feature, MARKER_LAYER_NAME};
pub use preview::{
    MarkerPreviewController, PreviewContent, PreviewState, PreviewStyle, PREVIEW_MAX_WIDTH, PREVIEW_MIN_WIDTH,
    PREVIEW_OFFSET,
};
pub use record::{DisplayInfo, MarkerDataSource, MarkerRecord};
