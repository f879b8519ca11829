use crate::config::EngineConfig;
use crate::crs::{Crs, PointReprojector};
use crate::map::Extent;
use crate::reproject::ShapeReprojector;
use crate::shape::Shape;

/// One shape plus the text drawn next to it
#[derive(Clone, Debug, PartialEq)]
pub struct Feature {
    pub shape: Shape,
    /// Drawn right of a point symbol, or centered on the extent of any
    /// other shape
    pub label: Option<String>,
}

impl Feature {
    pub fn new(shape: Shape) -> Self {
        Self { shape, label: None }
    }

    pub fn labeled(shape: Shape, label: impl Into<String>) -> Self {
        Self {
            shape,
            label: Some(label.into()),
        }
    }
}

/// Outcome of a layer-wide reprojection
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReprojectStats {
    pub kept: usize,
    pub dropped: usize,
}

/// Ordered features sharing one CRS
#[derive(Clone, Debug)]
pub struct VectorLayer {
    pub name: String,
    crs: Crs,
    features: Vec<Feature>,
    /// Geometry and CRS before the first destructive reprojection
    original: Option<(Crs, Vec<Feature>)>,
    /// Annotations of this layer go through collision avoidance
    pub avoid_collision: bool,
}

impl VectorLayer {
    pub fn new(name: impl Into<String>, crs: Crs) -> Self {
        Self {
            name: name.into(),
            crs,
            features: Vec::new(),
            original: None,
            avoid_collision: false,
        }
    }

    pub fn with_features(name: impl Into<String>, crs: Crs, features: Vec<Feature>) -> Self {
        Self {
            features,
            ..Self::new(name, crs)
        }
    }

    pub fn push(&mut self, feature: Feature) {
        self.features.push(feature);
    }

    #[inline(always)]
    pub fn crs(&self) -> &Crs {
        &self.crs
    }

    #[inline(always)]
    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Union of all feature extents, `None` for an empty layer
    pub fn extent(&self) -> Option<Extent> {
        self.features
            .iter()
            .map(|f| f.shape.extent())
            .reduce(|a, b| a.union(&b))
    }

    /// Whether a destructive reprojection can still be undone
    pub fn has_original(&self) -> bool {
        self.original.is_some()
    }

    /// Put back the geometry from before the first [`change_layer_crs`].
    /// Returns false when there is nothing to restore.
    pub fn restore_original(&mut self) -> bool {
        match self.original.take() {
            Some((crs, features)) => {
                self.crs = crs;
                self.features = features;
                true
            }
            None => false,
        }
    }
}

/// Reproject every shape of `layer`, keeping the source index of each
/// survivor. Shapes without an image in `to` are skipped.
pub fn reproject_indexed<R: PointReprojector + ?Sized>(
    layer: &VectorLayer,
    to: &Crs,
    reprojector: &R,
    config: &EngineConfig,
) -> Vec<(usize, Feature)> {
    let shapes = ShapeReprojector::new(reprojector, config);
    layer
        .features
        .iter()
        .enumerate()
        .filter_map(|(i, f)| {
            shapes.reproject(&f.shape, &layer.crs, to).map(|shape| {
                (
                    i,
                    Feature {
                        shape,
                        label: f.label.clone(),
                    },
                )
            })
        })
        .collect()
}

/// Display-time reprojection: returns new features and leaves `layer` as is
pub fn reproject_for_display<R: PointReprojector + ?Sized>(
    layer: &VectorLayer,
    to: &Crs,
    reprojector: &R,
    config: &EngineConfig,
) -> Vec<Feature> {
    reproject_indexed(layer, to, reprojector, config)
        .into_iter()
        .map(|(_, f)| f)
        .collect()
}

/// Destructive reprojection of the layer's working geometry into `to`.
/// The first call keeps the prior geometry so it can be restored.
pub fn change_layer_crs<R: PointReprojector + ?Sized>(
    layer: &mut VectorLayer,
    to: &Crs,
    reprojector: &R,
    config: &EngineConfig,
) -> ReprojectStats {
    let before = layer.features.len();
    let features = reproject_for_display(layer, to, reprojector, config);
    let stats = ReprojectStats {
        kept: features.len(),
        dropped: before - features.len(),
    };

    let previous_crs = std::mem::replace(&mut layer.crs, to.clone());
    let previous = std::mem::replace(&mut layer.features, features);
    if layer.original.is_none() {
        layer.original = Some((previous_crs, previous));
    }

    log::debug!(
        "layer {} reprojected to {}: {} kept, {} dropped",
        layer.name,
        to.definition(),
        stats.kept,
        stats.dropped
    );
    stats
}
