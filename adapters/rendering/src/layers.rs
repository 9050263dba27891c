//! Ordered scene layers with per-layer dependency tracking.

use std::collections::{BTreeMap, BTreeSet};

use fleet_console_core::{EntityClass, Event};

use crate::{project, GridRaster, Primitive, SceneState};

/// Scene layers listed back to front.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LayerId {
    /// Pre-rasterised occupancy map.
    Grid,
    /// Planned robot paths.
    Paths,
    /// Robot markers with heading arrows.
    Robots,
    /// Goal markers and their guide lines.
    Goals,
    /// Detected objects with labels.
    Objects,
    /// Pointer tooltip, confirmations and status lines.
    Tooltip,
}

impl LayerId {
    /// Every layer in drawing order.
    pub const ALL: [Self; 6] = [
        Self::Grid,
        Self::Paths,
        Self::Robots,
        Self::Goals,
        Self::Objects,
        Self::Tooltip,
    ];

    /// State slices whose changes require the layer to be rebuilt.
    #[must_use]
    pub const fn dependencies(&self) -> &'static [StateSlice] {
        match self {
            Self::Grid => &[StateSlice::Grid],
            Self::Paths => &[
                StateSlice::Paths,
                StateSlice::Robots,
                StateSlice::Goals,
                StateSlice::PathVisibility,
                StateSlice::Transform,
            ],
            Self::Robots => &[
                StateSlice::Robots,
                StateSlice::Selection,
                StateSlice::Transform,
            ],
            Self::Goals => &[StateSlice::Goals, StateSlice::Robots, StateSlice::Transform],
            Self::Objects => &[StateSlice::Objects, StateSlice::Transform],
            Self::Tooltip => &[
                StateSlice::Pointer,
                StateSlice::Confirmation,
                StateSlice::Status,
            ],
        }
    }

    /// Coordinate space the layer's primitives are expressed in.
    #[must_use]
    pub const fn space(&self) -> LayerSpace {
        match self {
            Self::Tooltip => LayerSpace::Screen,
            _ => LayerSpace::World,
        }
    }
}

/// Coordinate space of a layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LayerSpace {
    /// Pixel space, drawn through the viewport transform.
    World,
    /// Screen space, unaffected by pan and zoom.
    Screen,
}

/// Independently changing portions of console state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StateSlice {
    /// Occupancy cells.
    Grid,
    /// Grid dimensions and resolution.
    Transform,
    /// Robot poses.
    Robots,
    /// Selected robot.
    Selection,
    /// Goal markers.
    Goals,
    /// Path polylines.
    Paths,
    /// Path visibility toggle.
    PathVisibility,
    /// Detected objects.
    Objects,
    /// Pointer position.
    Pointer,
    /// Transient confirmation message.
    Confirmation,
    /// Feed and command sink errors.
    Status,
}

impl StateSlice {
    /// Every slice.
    pub const ALL: [Self; 11] = [
        Self::Grid,
        Self::Transform,
        Self::Robots,
        Self::Selection,
        Self::Goals,
        Self::Paths,
        Self::PathVisibility,
        Self::Objects,
        Self::Pointer,
        Self::Confirmation,
        Self::Status,
    ];

    /// Slices changed by the provided console event.
    #[must_use]
    pub fn affected_by(event: &Event) -> &'static [Self] {
        match event {
            Event::SessionOpened { .. } => &Self::ALL,
            Event::GridLoaded { .. } => &[
                Self::Grid,
                Self::Transform,
                Self::Goals,
                Self::Paths,
                Self::Pointer,
            ],
            Event::SnapshotApplied { ticket, .. } => match ticket.class() {
                EntityClass::Grid => &[Self::Status],
                EntityClass::Robots => &[Self::Robots, Self::Status],
                EntityClass::Goals => &[Self::Goals, Self::Status],
                EntityClass::Paths => &[Self::Paths, Self::Status],
                EntityClass::Objects => &[Self::Objects, Self::Status],
            },
            Event::GridRejected { .. } | Event::FeedFailed { .. } | Event::SinkFailed { .. } => {
                &[Self::Status]
            }
            Event::PointerMoved { .. } => &[Self::Pointer],
            Event::SelectionChanged { .. } => &[Self::Selection],
            Event::GoalStaged { .. } | Event::GoalCleared { .. } | Event::GoalsCleared => {
                &[Self::Goals]
            }
            Event::ObjectsCleared => &[Self::Objects],
            Event::PathVisibilityChanged { .. } => &[Self::PathVisibility],
            Event::ConfirmationShown { .. } | Event::ConfirmationExpired => {
                &[Self::Confirmation]
            }
            Event::SessionClosed { .. }
            | Event::TimeAdvanced { .. }
            | Event::SnapshotDiscarded { .. }
            | Event::ViewportChanged { .. }
            | Event::PlacementModeChanged { .. }
            | Event::PlacementHeadingChanged { .. } => &[],
        }
    }
}

/// Drawing instructions of a single layer.
#[derive(Clone, Debug, PartialEq)]
pub struct Layer {
    id: LayerId,
    revision: u64,
    primitives: Vec<Primitive>,
}

impl Layer {
    fn empty(id: LayerId) -> Self {
        Self {
            id,
            revision: 0,
            primitives: Vec::new(),
        }
    }

    /// Identifier of the layer.
    #[must_use]
    pub const fn id(&self) -> LayerId {
        self.id
    }

    /// Number of times the layer has been rebuilt.
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    /// Primitives in drawing order.
    #[must_use]
    pub fn primitives(&self) -> &[Primitive] {
        &self.primitives
    }
}

/// Ordered layer stack that only rebuilds layers whose dependencies changed.
#[derive(Clone, Debug, PartialEq)]
pub struct SceneLayers {
    layers: BTreeMap<LayerId, Layer>,
    dirty: BTreeSet<LayerId>,
    raster: Option<GridRaster>,
}

impl SceneLayers {
    /// Creates a stack with every layer pending its first build.
    #[must_use]
    pub fn new() -> Self {
        Self {
            layers: LayerId::ALL
                .iter()
                .map(|id| (*id, Layer::empty(*id)))
                .collect(),
            dirty: LayerId::ALL.iter().copied().collect(),
            raster: None,
        }
    }

    /// Marks layers affected by the provided events as dirty.
    pub fn invalidate(&mut self, events: &[Event]) {
        for event in events {
            for slice in StateSlice::affected_by(event) {
                self.invalidate_slice(*slice);
            }
        }
    }

    /// Marks every layer depending on the slice as dirty.
    fn invalidate_slice(&mut self, slice: StateSlice) {
        for id in LayerId::ALL {
            if id.dependencies().contains(&slice) {
                let _ = self.dirty.insert(id);
            }
        }
    }

    /// Reports whether any layer awaits a rebuild.
    #[must_use]
    pub fn needs_refresh(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Rebuilds dirty layers from the provided state, returning their ids in
    /// drawing order.
    pub fn refresh(&mut self, state: &SceneState<'_>) -> Vec<LayerId> {
        let rebuilt: Vec<LayerId> = std::mem::take(&mut self.dirty).into_iter().collect();

        for id in &rebuilt {
            let primitives = match id {
                LayerId::Grid => {
                    self.raster = state.grid.as_ref().map(GridRaster::from_grid);
                    project::grid(state)
                }
                LayerId::Paths => project::paths(state),
                LayerId::Robots => project::robots(state),
                LayerId::Goals => project::goals(state),
                LayerId::Objects => project::objects(state),
                LayerId::Tooltip => project::tooltip(state),
            };
            if let Some(layer) = self.layers.get_mut(id) {
                layer.primitives = primitives;
                layer.revision = layer.revision.saturating_add(1);
            }
        }

        rebuilt
    }

    /// Layer with the provided identifier.
    #[must_use]
    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.get(&id)
    }

    /// Layers in drawing order.
    pub fn iter(&self) -> impl Iterator<Item = &Layer> {
        self.layers.values()
    }

    /// Bitmap of the loaded grid, rebuilt only with the grid layer.
    #[must_use]
    pub fn raster(&self) -> Option<&GridRaster> {
        self.raster.as_ref()
    }
}

impl Default for SceneLayers {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_console_core::{PollTicket, SessionId};

    fn ticket(class: EntityClass) -> PollTicket {
        PollTicket::new(SessionId::new(1), class, 1)
    }

    #[test]
    fn layers_are_ordered_back_to_front() {
        let layers = SceneLayers::new();
        let order: Vec<LayerId> = layers.iter().map(Layer::id).collect();

        assert_eq!(order, LayerId::ALL.to_vec());
    }

    #[test]
    fn robot_poll_only_dirties_dependent_layers() {
        let mut layers = SceneLayers::new();
        let _ = layers.refresh(&SceneState::default());

        layers.invalidate(&[Event::SnapshotApplied {
            ticket: ticket(EntityClass::Robots),
            count: 3,
        }]);

        assert_eq!(
            layers.dirty.iter().copied().collect::<Vec<_>>(),
            vec![
                LayerId::Paths,
                LayerId::Robots,
                LayerId::Goals,
                LayerId::Tooltip,
            ]
        );
    }

    #[test]
    fn refresh_rebuilds_only_dirty_layers() {
        let mut layers = SceneLayers::new();
        let first = layers.refresh(&SceneState::default());
        assert_eq!(first, LayerId::ALL.to_vec());
        assert!(!layers.needs_refresh());

        layers.invalidate(&[Event::ObjectsCleared]);
        let rebuilt = layers.refresh(&SceneState::default());

        assert_eq!(rebuilt, vec![LayerId::Objects]);
        assert_eq!(layers.layer(LayerId::Objects).map(Layer::revision), Some(2));
        assert_eq!(layers.layer(LayerId::Grid).map(Layer::revision), Some(1));
    }

    #[test]
    fn viewport_changes_do_not_dirty_any_layer() {
        let mut layers = SceneLayers::new();
        let _ = layers.refresh(&SceneState::default());

        layers.invalidate(&[Event::ViewportChanged {
            scale: 2.0,
            offset: glam::DVec2::ZERO,
        }]);

        assert!(!layers.needs_refresh());
    }
}
