#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the fleet console engine.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative console state, and pure systems. Adapters submit [`Command`]
//! values describing desired mutations, the console executes those commands
//! via its `apply` entry point, and then broadcasts [`Event`] values for
//! systems to react to deterministically. Systems consume event streams,
//! query immutable views, and respond exclusively with new command batches.
//!
//! The robot fleet itself is reached through two seams: a [`FeedSource`]
//! delivering entity snapshots asynchronously and a [`CommandSink`] accepting
//! operator commands.

mod appearance;
mod transform;
mod viewport;

use std::{fmt, time::Duration};

use glam::DVec2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use appearance::{MarkerColor, ObjectAppearance, ObjectKind};
pub use transform::{
    heading_direction, heading_from_screen, heading_to_screen, CoordinateTransform, GridError,
    TransformError,
};
pub use viewport::{Viewport, ViewportError, ViewportLimits, ZoomDirection};

/// Unique identifier assigned to a robot by the fleet.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RobotId(u32);

impl RobotId {
    /// Creates a new robot identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for RobotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier assigned to a detected object.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ObjectId(u32);

impl ObjectId {
    /// Creates a new object identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Identifies one lifetime of the console view, from open to close.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    /// Creates a new session identifier.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

/// Independently polled collections delivered by the data feed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityClass {
    /// The shared occupancy map.
    Grid,
    /// Robot positions and headings.
    Robots,
    /// Navigation goals per robot.
    Goals,
    /// Planned paths per robot.
    Paths,
    /// Externally detected objects.
    Objects,
}

impl EntityClass {
    /// Every entity class in polling order.
    pub const ALL: [Self; 5] = [
        Self::Grid,
        Self::Robots,
        Self::Goals,
        Self::Paths,
        Self::Objects,
    ];

    /// Lowercase name used in logs and status lines.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Grid => "grid",
            Self::Robots => "robots",
            Self::Goals => "goals",
            Self::Paths => "paths",
            Self::Objects => "objects",
        }
    }
}

impl fmt::Display for EntityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Occupancy map as delivered by the feed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GridReport {
    /// Number of cells along the x-axis.
    pub width: u32,
    /// Number of cells along the y-axis.
    pub height: u32,
    /// Metric length of a cell edge.
    pub resolution: f64,
    /// Row-major cell values: 0 free, 100 occupied, anything else unknown.
    pub occupancy: Vec<i32>,
}

/// Robot pose as delivered by the feed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RobotReport {
    /// Robot identifier.
    pub id: RobotId,
    /// Metric x coordinate.
    pub x: f64,
    /// Metric y coordinate.
    pub y: f64,
    /// Heading in radians.
    pub theta: f64,
}

/// Navigation goal as delivered by the feed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GoalReport {
    /// Robot the goal belongs to.
    pub id: RobotId,
    /// Metric x coordinate of the goal.
    pub x_goal: f64,
    /// Metric y coordinate of the goal.
    pub y_goal: f64,
    /// Requested heading at the goal in radians.
    #[serde(default)]
    pub theta_goal: f64,
}

/// Planned path as delivered by the feed, with coordinates split per axis.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PathReport {
    /// Robot the path belongs to.
    pub id: RobotId,
    /// Metric x coordinates of the waypoints.
    pub x: Vec<f64>,
    /// Metric y coordinates of the waypoints.
    pub y: Vec<f64>,
}

/// Detected object as delivered by the feed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectReport {
    /// Object identifier.
    pub id: ObjectId,
    /// Metric x coordinate.
    pub x: f64,
    /// Metric y coordinate.
    pub y: f64,
    /// Free-form type tag.
    #[serde(rename = "type")]
    pub kind: String,
}

/// State of a single occupancy cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CellState {
    /// Traversable space.
    Free,
    /// Blocked space.
    Occupied,
    /// Space the fleet has not observed.
    Unknown,
}

impl CellState {
    /// Classifies a raw occupancy value.
    #[must_use]
    pub const fn from_value(value: i32) -> Self {
        match value {
            0 => Self::Free,
            100 => Self::Occupied,
            _ => Self::Unknown,
        }
    }
}

/// One complete snapshot of an entity class.
#[derive(Clone, Debug, PartialEq)]
pub enum Snapshot {
    /// A freshly loaded occupancy map.
    Grid(GridReport),
    /// Every robot currently reported by the fleet.
    Robots(Vec<RobotReport>),
    /// Every active navigation goal.
    Goals(Vec<GoalReport>),
    /// Every planned path.
    Paths(Vec<PathReport>),
    /// Every detected object.
    Objects(Vec<ObjectReport>),
}

impl Snapshot {
    /// Entity class carried by the snapshot.
    #[must_use]
    pub const fn class(&self) -> EntityClass {
        match self {
            Self::Grid(_) => EntityClass::Grid,
            Self::Robots(_) => EntityClass::Robots,
            Self::Goals(_) => EntityClass::Goals,
            Self::Paths(_) => EntityClass::Paths,
            Self::Objects(_) => EntityClass::Objects,
        }
    }

    /// Number of records carried by the snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Grid(_) => 1,
            Self::Robots(records) => records.len(),
            Self::Goals(records) => records.len(),
            Self::Paths(records) => records.len(),
            Self::Objects(records) => records.len(),
        }
    }

    /// Reports whether the snapshot carries no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Identifies a single poll request issued to the feed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PollTicket {
    session: SessionId,
    class: EntityClass,
    sequence: u64,
}

impl PollTicket {
    /// Creates a ticket for the provided session, class and sequence number.
    #[must_use]
    pub const fn new(session: SessionId, class: EntityClass, sequence: u64) -> Self {
        Self {
            session,
            class,
            sequence,
        }
    }

    /// Session that issued the request.
    #[must_use]
    pub const fn session(&self) -> SessionId {
        self.session
    }

    /// Entity class requested.
    #[must_use]
    pub const fn class(&self) -> EntityClass {
        self.class
    }

    /// Monotonic sequence number within the class.
    #[must_use]
    pub const fn sequence(&self) -> u64 {
        self.sequence
    }
}

/// Outcome of a poll request reported by a feed.
#[derive(Clone, Debug, PartialEq)]
pub struct FeedCompletion {
    /// Ticket the completion answers.
    pub ticket: PollTicket,
    /// Snapshot or failure produced by the feed.
    pub result: Result<Snapshot, FeedError>,
}

impl FeedCompletion {
    /// Command that records the outcome in the console.
    #[must_use]
    pub fn into_command(self) -> Command {
        let Self { ticket, result } = self;
        match result {
            Ok(snapshot) => Command::ApplySnapshot { ticket, snapshot },
            Err(error) => Command::RecordFeedFailure { ticket, error },
        }
    }
}

/// Reasons a poll request fails.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum FeedError {
    /// The feed could not be reached or returned an error.
    #[error("feed unavailable: {message}")]
    Unavailable {
        /// Description supplied by the feed.
        message: String,
    },
    /// The feed answered with data that could not be decoded.
    #[error("malformed {class} payload: {message}")]
    Malformed {
        /// Class whose payload was rejected.
        class: EntityClass,
        /// Decoder diagnostic.
        message: String,
    },
    /// The request was abandoned after waiting too long.
    #[error("request timed out after {}ms", after.as_millis())]
    TimedOut {
        /// Time waited before abandoning the request.
        after: Duration,
    },
}

/// Asynchronous source of entity snapshots.
///
/// Requests never block. Completions are collected later through
/// [`FeedSource::drain_completions`], possibly out of order.
pub trait FeedSource {
    /// Starts fetching the snapshot described by the ticket.
    fn request(&mut self, ticket: PollTicket);

    /// Moves every completion that arrived since the last call into `out`.
    fn drain_completions(&mut self, out: &mut Vec<FeedCompletion>);
}

/// Commands forwarded to the fleet on behalf of the operator.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum SinkCommand {
    /// Sends a robot towards a navigation goal.
    SetGoal {
        /// Robot receiving the goal.
        robot: RobotId,
        /// Metric x coordinate of the goal.
        x: f64,
        /// Metric y coordinate of the goal.
        y: f64,
        /// Heading at the goal in radians.
        theta: f64,
        /// Milliseconds since the unix epoch when the command was issued.
        timestamp: u64,
    },
    /// Overrides the estimated pose of a robot.
    SetInitialPosition {
        /// Robot whose pose is reset.
        robot: RobotId,
        /// Metric x coordinate of the pose.
        x: f64,
        /// Metric y coordinate of the pose.
        y: f64,
        /// Heading of the pose in radians.
        theta: f64,
        /// Milliseconds since the unix epoch when the command was issued.
        timestamp: u64,
    },
    /// Halts a robot immediately.
    StopRobot {
        /// Robot to halt.
        robot: RobotId,
    },
    /// Discards every detected object known to the fleet.
    ClearAllObjects,
}

impl SinkCommand {
    /// Name of the command used in logs and status lines.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SetGoal { .. } => "setGoal",
            Self::SetInitialPosition { .. } => "setInitialPosition",
            Self::StopRobot { .. } => "stopRobot",
            Self::ClearAllObjects => "clearAllObjects",
        }
    }
}

/// Reasons a command sink refuses a command.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SinkError {
    /// The fleet answered that the command was not accepted.
    #[error("{command} was rejected by the fleet")]
    Rejected {
        /// Name of the rejected command.
        command: &'static str,
    },
    /// The command could not be delivered.
    #[error("failed to deliver command: {message}")]
    Transport {
        /// Description of the delivery failure.
        message: String,
    },
}

/// Receives operator commands destined for the fleet.
pub trait CommandSink {
    /// Delivers the command without waiting for the fleet to act on it.
    fn submit(&mut self, command: &SinkCommand) -> Result<(), SinkError>;
}

/// Meaning of a map click.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PlacementMode {
    /// Clicks send the selected robot to the clicked location.
    #[default]
    Goal,
    /// Clicks reset the selected robot's pose to the clicked location.
    InitialPosition,
}

/// Raw operator gestures collected by adapters for a single frame.
#[derive(Clone, Debug, PartialEq)]
pub enum OperatorInput {
    /// The pointer moved to a new screen position.
    PointerMoved {
        /// Screen position of the pointer.
        screen: DVec2,
    },
    /// The operator clicked on the map.
    Click {
        /// Screen position of the click.
        screen: DVec2,
    },
    /// The operator scrolled the wheel over the map.
    Wheel {
        /// Screen position of the pointer during the scroll.
        pointer: DVec2,
        /// Zoom direction implied by the scroll.
        direction: ZoomDirection,
    },
    /// The operator dragged the map.
    Drag {
        /// Screen-space movement since the previous drag sample.
        delta: DVec2,
    },
    /// A zoom button was pressed.
    ZoomButton {
        /// Direction of the button.
        direction: ZoomDirection,
    },
    /// The reset-zoom button was pressed.
    ResetZoom,
    /// The external selection list changed.
    SelectRobot {
        /// Newly selected robot, if any.
        robot: Option<RobotId>,
    },
    /// The placement mode toggle changed.
    SetPlacementMode {
        /// Requested placement mode.
        mode: PlacementMode,
    },
    /// The placement heading input changed.
    SetPlacementHeading {
        /// Heading in radians.
        theta: f64,
    },
    /// The clear-selected-goal control was pressed.
    ClearSelectedGoal,
    /// The clear-all-goals control was pressed.
    ClearAllGoals,
    /// The clear-all-objects control was pressed.
    ClearAllObjects,
    /// The path visibility toggle was pressed.
    TogglePaths,
    /// The stop control for the selected robot was pressed.
    StopSelectedRobot,
}

/// Commands that express all permissible console mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Starts a new view lifetime.
    OpenSession {
        /// Identifier of the new session.
        session: SessionId,
    },
    /// Ends the current view lifetime, discarding late completions.
    CloseSession,
    /// Advances the console clock by the provided delta time.
    Tick {
        /// Duration that elapsed since the previous tick.
        dt: Duration,
    },
    /// Reconciles a snapshot delivered by the feed.
    ApplySnapshot {
        /// Ticket of the request that produced the snapshot.
        ticket: PollTicket,
        /// Delivered snapshot.
        snapshot: Snapshot,
    },
    /// Records that a poll request failed.
    RecordFeedFailure {
        /// Ticket of the failed request.
        ticket: PollTicket,
        /// Failure reported for the request.
        error: FeedError,
    },
    /// Zooms one wheel notch around the pointer.
    ZoomAtPointer {
        /// Screen position kept fixed by the zoom.
        pointer: DVec2,
        /// Direction of the zoom.
        direction: ZoomDirection,
    },
    /// Zooms one button step without moving the offset.
    ZoomStep {
        /// Direction of the zoom.
        direction: ZoomDirection,
    },
    /// Moves the view by a screen-space delta.
    Pan {
        /// Screen-space movement.
        delta: DVec2,
    },
    /// Restores the default view.
    ResetView,
    /// Records the pointer position.
    MovePointer {
        /// Screen position of the pointer.
        screen: DVec2,
    },
    /// Changes the robot targeted by operator commands.
    SelectRobot {
        /// Newly selected robot, if any.
        robot: Option<RobotId>,
    },
    /// Changes the meaning of map clicks.
    SetPlacementMode {
        /// Requested placement mode.
        mode: PlacementMode,
    },
    /// Changes the heading carried by placement commands.
    SetPlacementHeading {
        /// Heading in radians.
        theta: f64,
    },
    /// Optimistically places a goal marker before the fleet confirms it.
    StageGoal {
        /// Robot receiving the goal.
        robot: RobotId,
        /// Metric position of the goal.
        map: DVec2,
        /// Heading at the goal in radians.
        theta: f64,
    },
    /// Removes the goal marker of a single robot.
    ClearGoal {
        /// Robot whose marker is removed.
        robot: RobotId,
    },
    /// Removes every goal marker.
    ClearAllGoals,
    /// Removes every detected object.
    ClearAllObjects,
    /// Flips path overlay visibility.
    TogglePaths,
    /// Shows a transient message near the pointer.
    ShowConfirmation {
        /// Text to display.
        message: String,
        /// Screen position the message is anchored to.
        anchor: DVec2,
    },
    /// Records that the command sink refused a command.
    RecordSinkFailure {
        /// Name of the refused command.
        command: &'static str,
        /// Failure reported by the sink.
        error: SinkError,
    },
}

/// Reasons a feed completion is ignored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DiscardReason {
    /// A completion with an equal or newer sequence was already applied.
    Stale,
    /// The completion belongs to a session that is no longer open.
    ForeignSession,
}

/// Events broadcast by the console after processing commands.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Indicates that a new session started.
    SessionOpened {
        /// Identifier of the session.
        session: SessionId,
    },
    /// Indicates that the session ended.
    SessionClosed {
        /// Identifier of the closed session.
        session: SessionId,
    },
    /// Indicates that the console clock advanced.
    TimeAdvanced {
        /// Duration that elapsed in the tick.
        dt: Duration,
    },
    /// Confirms that an occupancy map was loaded.
    GridLoaded {
        /// Number of cells along the x-axis.
        width: u32,
        /// Number of cells along the y-axis.
        height: u32,
        /// Metric length of a cell edge.
        resolution: f64,
    },
    /// Reports that an occupancy map could not be used.
    GridRejected {
        /// Ticket of the request that delivered the grid.
        ticket: PollTicket,
        /// Reason the grid was rejected.
        error: GridError,
    },
    /// Confirms that a snapshot replaced the state of its class.
    SnapshotApplied {
        /// Ticket of the applied request.
        ticket: PollTicket,
        /// Number of records now held for the class.
        count: usize,
    },
    /// Reports that a completion was ignored.
    SnapshotDiscarded {
        /// Ticket of the ignored request.
        ticket: PollTicket,
        /// Reason the completion was ignored.
        reason: DiscardReason,
    },
    /// Reports that a poll failed while prior state was retained.
    FeedFailed {
        /// Ticket of the failed request.
        ticket: PollTicket,
        /// Failure reported for the request.
        error: FeedError,
    },
    /// Announces the new viewport after a pan or zoom.
    ViewportChanged {
        /// Current scale.
        scale: f64,
        /// Current offset.
        offset: DVec2,
    },
    /// Announces a new pointer position.
    PointerMoved {
        /// Pointer position and its map coordinate.
        position: MousePosition,
    },
    /// Announces a new robot selection.
    SelectionChanged {
        /// Selected robot, if any.
        robot: Option<RobotId>,
    },
    /// Announces a new placement mode.
    PlacementModeChanged {
        /// Active placement mode.
        mode: PlacementMode,
    },
    /// Announces a new placement heading.
    PlacementHeadingChanged {
        /// Heading in radians.
        theta: f64,
    },
    /// Confirms that a goal marker was staged locally.
    GoalStaged {
        /// Robot owning the marker.
        robot: RobotId,
        /// Metric position of the goal.
        map: DVec2,
    },
    /// Confirms that a goal marker was removed.
    GoalCleared {
        /// Robot whose marker was removed.
        robot: RobotId,
    },
    /// Confirms that every goal marker was removed.
    GoalsCleared,
    /// Confirms that every detected object was removed.
    ObjectsCleared,
    /// Announces path overlay visibility.
    PathVisibilityChanged {
        /// Whether paths are drawn.
        visible: bool,
    },
    /// Announces a transient message.
    ConfirmationShown {
        /// Displayed text.
        message: String,
    },
    /// Announces that the transient message disappeared.
    ConfirmationExpired,
    /// Reports that the command sink refused a command.
    SinkFailed {
        /// Name of the refused command.
        command: &'static str,
        /// Failure reported by the sink.
        error: SinkError,
    },
}

/// Immutable view of a robot's most recent pose.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RobotState {
    /// Robot identifier.
    pub id: RobotId,
    /// Metric position.
    pub position: DVec2,
    /// Heading in radians.
    pub theta: f64,
}

/// Goal marker attached to a robot.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GoalMarker {
    /// Robot owning the marker.
    pub robot: RobotId,
    /// Metric position of the goal.
    pub map: DVec2,
    /// Pixel position derived when the marker was reconciled.
    pub pixel: DVec2,
    /// Heading at the goal in radians.
    pub theta: f64,
    /// Color shared by the robot's overlays.
    pub color: MarkerColor,
}

/// Planned path of a robot as a pixel-space polyline.
#[derive(Clone, Debug, PartialEq)]
pub struct PathRecord {
    /// Robot owning the path.
    pub robot: RobotId,
    /// Pixel-space waypoints in travel order.
    pub points: Vec<DVec2>,
    /// Color shared by the robot's overlays.
    pub color: MarkerColor,
}

/// Detected object with its resolved appearance.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectedObject {
    /// Object identifier.
    pub id: ObjectId,
    /// Metric position.
    pub position: DVec2,
    /// Category derived from the type tag.
    pub kind: ObjectKind,
    /// Color and radius used for drawing.
    pub appearance: ObjectAppearance,
}

/// Last known pointer position.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MousePosition {
    /// Screen coordinates.
    pub screen: DVec2,
    /// Metric coordinate under the pointer, once a grid is loaded.
    pub map: Option<DVec2>,
}

/// Transient message shown near the pointer.
#[derive(Clone, Debug, PartialEq)]
pub struct Confirmation {
    /// Displayed text.
    pub message: String,
    /// Screen position the message is anchored to.
    pub anchor: DVec2,
    /// Time left before the message disappears.
    pub remaining: Duration,
}

/// Read-only view of the loaded occupancy map.
#[derive(Clone, Copy, Debug)]
pub struct GridView<'a> {
    transform: CoordinateTransform,
    cells: &'a [CellState],
    revision: u64,
}

impl<'a> GridView<'a> {
    /// Creates a grid view over row-major cells.
    #[must_use]
    pub const fn new(transform: CoordinateTransform, cells: &'a [CellState], revision: u64) -> Self {
        Self {
            transform,
            cells,
            revision,
        }
    }

    /// Transform derived from the grid dimensions.
    #[must_use]
    pub const fn transform(&self) -> CoordinateTransform {
        self.transform
    }

    /// Increments every time a new grid is loaded.
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    /// Iterator over `(column, row, state)` triples in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, u32, CellState)> + 'a {
        let width = self.transform.grid_width();
        self.cells.iter().enumerate().map(move |(index, state)| {
            let index = index as u64;
            let width = u64::from(width);
            ((index % width) as u32, (index / width) as u32, *state)
        })
    }
}
