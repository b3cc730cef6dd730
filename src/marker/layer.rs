use std::sync::Arc;

use tracing::debug;

use crate::map::{Attachment, Feature, Geometry, Layer, Tier, VectorSource};
use crate::marker::{MarkerDataSource, MarkerRecord};
use crate::style::marker_icon_style;

/// Name of the marker layer on the map
pub const MARKER_LAYER_NAME: &str = "markers";

/// Point feature for a record, carrying the record as its attachment.
/// Records without valid coordinates yield `None`.
pub fn create_point_feature(record: &Arc<MarkerRecord>) -> Option<Feature> {
    let Some(position) = record.position() else {
        debug!(marker = record.id, coords = ?record.coords, "marker is not plottable, skipping");
        return None;
    };
    Some(
        Feature::new(Geometry::Point(position))
            .with_style(marker_icon_style())
            .with_attachment(Attachment::Marker(Arc::clone(record))),
    )
}

/// Build the marker layer: one point feature per plottable record
pub fn build_marker_layer(data: &MarkerDataSource) -> Layer {
    let mut source = VectorSource::local();
    source.extend(data.records().iter().filter_map(create_point_feature));
    debug!(features = source.len(), records = data.len(), "built marker layer");
    Layer::new(MARKER_LAYER_NAME, Tier::Marker, source)
}
