#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative console state for the fleet console.
//!
//! The [`Console`] owns the viewport, the loaded occupancy map and the keyed
//! collections reconciled from feed snapshots. It is only mutated through
//! [`apply`], which reports every change as an [`Event`]; adapters and systems
//! read it through the [`query`] module.

mod reconcile;

use std::{
    collections::{BTreeMap, BTreeSet},
    time::Duration,
};

use fleet_console_core::{
    Command, Confirmation, DetectedObject, DiscardReason, EntityClass, Event, FeedError,
    GoalMarker, MousePosition, ObjectId, PathRecord, PlacementMode, PollTicket, RobotId,
    RobotState, SessionId, SinkError, Snapshot, Viewport, ViewportLimits,
};
use glam::DVec2;
use thiserror::Error;
use tracing::{debug, error, warn};

use reconcile::{GoalTarget, LoadedGrid};

/// Pixel length of a grid cell edge used when no configuration is supplied.
pub const DEFAULT_CELL_SIZE_PX: f64 = 5.0;

/// Lifetime of the confirmation shown after an initial pose is set.
pub const DEFAULT_CONFIRMATION: Duration = Duration::from_millis(1500);

/// Validated settings that shape the console state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConsoleConfig {
    cell_size_px: f64,
    viewport: ViewportLimits,
    confirmation: Duration,
}

impl ConsoleConfig {
    /// Creates a configuration, rejecting values that cannot produce a usable view.
    pub fn new(
        cell_size_px: f64,
        viewport: ViewportLimits,
        confirmation: Duration,
    ) -> Result<Self, ConfigError> {
        if !cell_size_px.is_finite() || cell_size_px <= 0.0 {
            return Err(ConfigError::InvalidCellSize { cell_size_px });
        }
        if confirmation.is_zero() {
            return Err(ConfigError::ZeroConfirmation);
        }

        Ok(Self {
            cell_size_px,
            viewport,
            confirmation,
        })
    }

    /// Pixel length of a grid cell edge before viewport scaling.
    #[must_use]
    pub const fn cell_size_px(&self) -> f64 {
        self.cell_size_px
    }

    /// Zoom bounds and step sizes.
    #[must_use]
    pub const fn viewport(&self) -> ViewportLimits {
        self.viewport
    }

    /// How long transient confirmations stay visible.
    #[must_use]
    pub const fn confirmation(&self) -> Duration {
        self.confirmation
    }
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            cell_size_px: DEFAULT_CELL_SIZE_PX,
            viewport: ViewportLimits::default(),
            confirmation: DEFAULT_CONFIRMATION,
        }
    }
}

/// Reasons a console configuration is rejected.
#[derive(Clone, Copy, Debug, PartialEq, Error)]
pub enum ConfigError {
    /// The cell size is not a positive finite number of pixels.
    #[error("cell size must be a positive finite number of pixels (received {cell_size_px})")]
    InvalidCellSize {
        /// Requested cell size.
        cell_size_px: f64,
    },
    /// Confirmations would disappear before they are drawn.
    #[error("confirmation duration must be greater than zero")]
    ZeroConfirmation,
}

/// Per-class bookkeeping of poll outcomes.
#[derive(Clone, Debug, Default)]
struct ClassStatus {
    applied: Option<u64>,
    error: Option<FeedError>,
}

/// Represents the authoritative console state.
#[derive(Debug)]
pub struct Console {
    config: ConsoleConfig,
    session: Option<SessionId>,
    grid: Option<LoadedGrid>,
    grid_revision: u64,
    viewport: Viewport,
    robots: BTreeMap<RobotId, RobotState>,
    seen: BTreeSet<RobotId>,
    goal_targets: BTreeMap<RobotId, GoalTarget>,
    goals: BTreeMap<RobotId, GoalMarker>,
    waypoints: BTreeMap<RobotId, Vec<DVec2>>,
    paths: BTreeMap<RobotId, PathRecord>,
    objects: BTreeMap<ObjectId, DetectedObject>,
    status: BTreeMap<EntityClass, ClassStatus>,
    pointer: Option<MousePosition>,
    selection: Option<RobotId>,
    placement_mode: PlacementMode,
    placement_heading: f64,
    paths_visible: bool,
    confirmation: Option<Confirmation>,
    sink_failure: Option<(&'static str, SinkError)>,
}

impl Console {
    /// Creates an empty console with no open session.
    #[must_use]
    pub fn new(config: ConsoleConfig) -> Self {
        Self {
            config,
            session: None,
            grid: None,
            grid_revision: 0,
            viewport: Viewport::new(config.viewport()),
            robots: BTreeMap::new(),
            seen: BTreeSet::new(),
            goal_targets: BTreeMap::new(),
            goals: BTreeMap::new(),
            waypoints: BTreeMap::new(),
            paths: BTreeMap::new(),
            objects: BTreeMap::new(),
            status: BTreeMap::new(),
            pointer: None,
            selection: None,
            placement_mode: PlacementMode::default(),
            placement_heading: 0.0,
            paths_visible: true,
            confirmation: None,
            sink_failure: None,
        }
    }

    fn status_mut(&mut self, class: EntityClass) -> &mut ClassStatus {
        self.status.entry(class).or_default()
    }

    fn is_stale(&self, ticket: PollTicket) -> bool {
        self.status
            .get(&ticket.class())
            .and_then(|status| status.applied)
            .is_some_and(|applied| ticket.sequence() <= applied)
    }

    /// Checks a completion against the open session and the applied sequence.
    fn admit(&self, ticket: PollTicket) -> Result<(), DiscardReason> {
        if self.session != Some(ticket.session()) {
            return Err(DiscardReason::ForeignSession);
        }
        if self.is_stale(ticket) {
            return Err(DiscardReason::Stale);
        }
        Ok(())
    }

    fn rebuild_goal_markers(&mut self) {
        self.goals = match &self.grid {
            Some(grid) => reconcile::goal_markers(&self.goal_targets, &grid.transform),
            None => BTreeMap::new(),
        };
    }

    fn rebuild_path_records(&mut self) {
        self.paths = match &self.grid {
            Some(grid) => reconcile::path_records(&self.waypoints, &grid.transform),
            None => BTreeMap::new(),
        };
    }

    fn map_under(&self, screen: DVec2) -> Option<DVec2> {
        let grid = self.grid.as_ref()?;
        Some(
            grid.transform
                .pixel_to_map(self.viewport.to_world_pixel(screen)),
        )
    }

    fn refresh_pointer(&mut self, out_events: &mut Vec<Event>) {
        if let Some(pointer) = self.pointer {
            let position = MousePosition {
                screen: pointer.screen,
                map: self.map_under(pointer.screen),
            };
            self.pointer = Some(position);
            out_events.push(Event::PointerMoved { position });
        }
    }

    fn viewport_changed(&mut self, out_events: &mut Vec<Event>) {
        out_events.push(Event::ViewportChanged {
            scale: self.viewport.scale(),
            offset: self.viewport.offset(),
        });
        self.refresh_pointer(out_events);
    }

    fn reset_session_state(&mut self) {
        *self = Self::new(self.config);
    }

    fn reconcile(&mut self, ticket: PollTicket, snapshot: Snapshot, out_events: &mut Vec<Event>) {
        let count = match snapshot {
            Snapshot::Grid(report) => {
                let loaded = match LoadedGrid::from_report(&report, self.config.cell_size_px()) {
                    Ok(loaded) => loaded,
                    Err(rejection) => {
                        error!(
                            width = report.width,
                            height = report.height,
                            resolution = report.resolution,
                            %rejection,
                            "rejected occupancy grid"
                        );
                        out_events.push(Event::GridRejected {
                            ticket,
                            error: rejection,
                        });
                        return;
                    }
                };
                self.grid = Some(loaded);
                self.grid_revision = self.grid_revision.saturating_add(1);
                self.rebuild_goal_markers();
                self.rebuild_path_records();
                out_events.push(Event::GridLoaded {
                    width: report.width,
                    height: report.height,
                    resolution: report.resolution,
                });
                self.refresh_pointer(out_events);
                1
            }
            Snapshot::Robots(reports) => {
                self.robots = reconcile::robots_from_reports(reports);
                self.seen.extend(self.robots.keys().copied());
                self.robots.len()
            }
            Snapshot::Goals(reports) => {
                self.goal_targets = reconcile::goal_targets_from_reports(&reports);
                self.rebuild_goal_markers();
                self.goal_targets.len()
            }
            Snapshot::Paths(reports) => {
                let (waypoints, truncated) = reconcile::waypoints_from_reports(reports);
                if truncated > 0 {
                    warn!(truncated, "path reports with unequal axis lengths were truncated");
                }
                self.waypoints = waypoints;
                self.rebuild_path_records();
                self.waypoints.len()
            }
            Snapshot::Objects(reports) => {
                self.objects = reconcile::objects_from_reports(reports);
                self.objects.len()
            }
        };

        let status = self.status_mut(ticket.class());
        status.applied = Some(ticket.sequence());
        status.error = None;
        debug!(
            class = %ticket.class(),
            sequence = ticket.sequence(),
            count,
            "applied snapshot"
        );
        out_events.push(Event::SnapshotApplied { ticket, count });
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::new(ConsoleConfig::default())
    }
}

/// Applies the provided command to the console, mutating state deterministically.
pub fn apply(console: &mut Console, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::OpenSession { session } => {
            console.reset_session_state();
            console.session = Some(session);
            out_events.push(Event::SessionOpened { session });
        }
        Command::CloseSession => {
            if let Some(session) = console.session.take() {
                out_events.push(Event::SessionClosed { session });
            }
        }
        Command::Tick { dt } => {
            out_events.push(Event::TimeAdvanced { dt });
            if let Some(confirmation) = console.confirmation.as_mut() {
                confirmation.remaining = confirmation.remaining.saturating_sub(dt);
                if confirmation.remaining.is_zero() {
                    console.confirmation = None;
                    out_events.push(Event::ConfirmationExpired);
                }
            }
        }
        Command::ApplySnapshot { ticket, snapshot } => {
            if snapshot.class() != ticket.class() {
                warn!(
                    requested = %ticket.class(),
                    delivered = %snapshot.class(),
                    "feed answered with a snapshot of another class"
                );
                apply_failure(
                    console,
                    ticket,
                    FeedError::Malformed {
                        class: ticket.class(),
                        message: format!("received {} snapshot", snapshot.class()),
                    },
                    out_events,
                );
                return;
            }
            match console.admit(ticket) {
                Ok(()) => console.reconcile(ticket, snapshot, out_events),
                Err(reason) => discard(ticket, reason, out_events),
            }
        }
        Command::RecordFeedFailure { ticket, error } => {
            apply_failure(console, ticket, error, out_events);
        }
        Command::ZoomAtPointer { pointer, direction } => {
            if console.viewport.zoom_at(pointer, direction) {
                console.viewport_changed(out_events);
            }
        }
        Command::ZoomStep { direction } => {
            if console.viewport.zoom_step(direction) {
                console.viewport_changed(out_events);
            }
        }
        Command::Pan { delta } => {
            if delta != DVec2::ZERO {
                console.viewport.pan(delta);
                console.viewport_changed(out_events);
            }
        }
        Command::ResetView => {
            console.viewport.reset();
            console.viewport_changed(out_events);
        }
        Command::MovePointer { screen } => {
            let position = MousePosition {
                screen,
                map: console.map_under(screen),
            };
            console.pointer = Some(position);
            out_events.push(Event::PointerMoved { position });
        }
        Command::SelectRobot { robot } => {
            if console.selection != robot {
                console.selection = robot;
                out_events.push(Event::SelectionChanged { robot });
            }
        }
        Command::SetPlacementMode { mode } => {
            if console.placement_mode != mode {
                console.placement_mode = mode;
                out_events.push(Event::PlacementModeChanged { mode });
            }
        }
        Command::SetPlacementHeading { theta } => {
            if theta.is_finite() {
                console.placement_heading = theta;
                out_events.push(Event::PlacementHeadingChanged { theta });
            }
        }
        Command::StageGoal { robot, map, theta } => {
            let target = GoalTarget { map, theta };
            let _ = console.goal_targets.insert(robot, target);
            if let Some(grid) = &console.grid {
                let marker = reconcile::goal_marker(robot, target, &grid.transform);
                let _ = console.goals.insert(robot, marker);
            }
            out_events.push(Event::GoalStaged { robot, map });
        }
        Command::ClearGoal { robot } => {
            let _ = console.goal_targets.remove(&robot);
            if console.goals.remove(&robot).is_some() {
                out_events.push(Event::GoalCleared { robot });
            }
        }
        Command::ClearAllGoals => {
            console.goal_targets.clear();
            console.goals.clear();
            out_events.push(Event::GoalsCleared);
        }
        Command::ClearAllObjects => {
            console.objects.clear();
            out_events.push(Event::ObjectsCleared);
        }
        Command::TogglePaths => {
            console.paths_visible = !console.paths_visible;
            out_events.push(Event::PathVisibilityChanged {
                visible: console.paths_visible,
            });
        }
        Command::ShowConfirmation { message, anchor } => {
            console.confirmation = Some(Confirmation {
                message: message.clone(),
                anchor,
                remaining: console.config.confirmation(),
            });
            out_events.push(Event::ConfirmationShown { message });
        }
        Command::RecordSinkFailure { command, error } => {
            warn!(command, %error, "command sink refused command");
            console.sink_failure = Some((command, error.clone()));
            out_events.push(Event::SinkFailed { command, error });
        }
    }
}

fn apply_failure(
    console: &mut Console,
    ticket: PollTicket,
    error: FeedError,
    out_events: &mut Vec<Event>,
) {
    if let Err(reason) = console.admit(ticket) {
        discard(ticket, reason, out_events);
        return;
    }
    warn!(
        class = %ticket.class(),
        sequence = ticket.sequence(),
        %error,
        "poll failed; keeping last known state"
    );
    console.status_mut(ticket.class()).error = Some(error.clone());
    out_events.push(Event::FeedFailed { ticket, error });
}

fn discard(ticket: PollTicket, reason: DiscardReason, out_events: &mut Vec<Event>) {
    warn!(
        class = %ticket.class(),
        sequence = ticket.sequence(),
        ?reason,
        "discarded feed completion"
    );
    out_events.push(Event::SnapshotDiscarded { ticket, reason });
}

/// Query functions that provide read-only access to the console state.
pub mod query {
    use super::Console;
    use fleet_console_core::{
        Confirmation, CoordinateTransform, DetectedObject, EntityClass, FeedError, GoalMarker,
        GridView, MousePosition, PathRecord, PlacementMode, RobotId, RobotState, SessionId,
        SinkError, Viewport,
    };

    /// Session currently open, if any.
    #[must_use]
    pub fn session(console: &Console) -> Option<SessionId> {
        console.session
    }

    /// Read-only view of the loaded occupancy map.
    #[must_use]
    pub fn grid(console: &Console) -> Option<GridView<'_>> {
        console
            .grid
            .as_ref()
            .map(|grid| GridView::new(grid.transform, &grid.cells, console.grid_revision))
    }

    /// Coordinate transform of the loaded grid.
    #[must_use]
    pub fn transform(console: &Console) -> Option<CoordinateTransform> {
        console.grid.as_ref().map(|grid| grid.transform)
    }

    /// Current pan and zoom state.
    #[must_use]
    pub fn viewport(console: &Console) -> Viewport {
        console.viewport
    }

    /// Robots reported by the most recent robot poll, ordered by id.
    pub fn robots(console: &Console) -> impl Iterator<Item = &RobotState> {
        console.robots.values()
    }

    /// Most recent pose of the provided robot.
    #[must_use]
    pub fn robot(console: &Console, robot: RobotId) -> Option<&RobotState> {
        console.robots.get(&robot)
    }

    /// Robots that appeared in any poll of the session, including those
    /// missing from the latest one.
    pub fn seen_robots(console: &Console) -> impl Iterator<Item = RobotId> + '_ {
        console.seen.iter().copied()
    }

    /// Goal markers ordered by robot id.
    pub fn goals(console: &Console) -> impl Iterator<Item = &GoalMarker> {
        console.goals.values()
    }

    /// Goal marker of the provided robot.
    #[must_use]
    pub fn goal(console: &Console, robot: RobotId) -> Option<&GoalMarker> {
        console.goals.get(&robot)
    }

    /// Path polylines ordered by robot id.
    pub fn paths(console: &Console) -> impl Iterator<Item = &PathRecord> {
        console.paths.values()
    }

    /// Detected objects ordered by id.
    pub fn objects(console: &Console) -> impl Iterator<Item = &DetectedObject> {
        console.objects.values()
    }

    /// Last pointer position.
    #[must_use]
    pub fn pointer(console: &Console) -> Option<MousePosition> {
        console.pointer
    }

    /// Robot targeted by operator commands.
    #[must_use]
    pub fn selection(console: &Console) -> Option<RobotId> {
        console.selection
    }

    /// Meaning of map clicks.
    #[must_use]
    pub fn placement_mode(console: &Console) -> PlacementMode {
        console.placement_mode
    }

    /// Heading carried by placement commands, in radians.
    #[must_use]
    pub fn placement_heading(console: &Console) -> f64 {
        console.placement_heading
    }

    /// Whether path overlays are drawn.
    #[must_use]
    pub fn paths_visible(console: &Console) -> bool {
        console.paths_visible
    }

    /// Transient message currently shown.
    #[must_use]
    pub fn confirmation(console: &Console) -> Option<&Confirmation> {
        console.confirmation.as_ref()
    }

    /// Failure of the most recent poll for the class, cleared by the next success.
    #[must_use]
    pub fn feed_error(console: &Console, class: EntityClass) -> Option<&FeedError> {
        console
            .status
            .get(&class)
            .and_then(|status| status.error.as_ref())
    }

    /// Sequence number of the last snapshot applied for the class.
    #[must_use]
    pub fn applied_sequence(console: &Console, class: EntityClass) -> Option<u64> {
        console.status.get(&class).and_then(|status| status.applied)
    }

    /// Most recent command refused by the sink.
    #[must_use]
    pub fn sink_failure(console: &Console) -> Option<(&'static str, &SinkError)> {
        console
            .sink_failure
            .as_ref()
            .map(|(command, error)| (*command, error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_console_core::{
        GoalReport, GridReport, ObjectReport, PathReport, RobotReport, ZoomDirection,
    };

    const SESSION: SessionId = SessionId::new(1);

    fn ticket(class: EntityClass, sequence: u64) -> PollTicket {
        PollTicket::new(SESSION, class, sequence)
    }

    fn open_console() -> Console {
        let mut console = Console::default();
        let mut events = Vec::new();
        apply(
            &mut console,
            Command::OpenSession { session: SESSION },
            &mut events,
        );
        console
    }

    fn free_grid(width: u32, height: u32) -> Snapshot {
        Snapshot::Grid(GridReport {
            width,
            height,
            resolution: 1.0,
            occupancy: vec![0; (width * height) as usize],
        })
    }

    fn robot(id: u32, x: f64, y: f64) -> RobotReport {
        RobotReport {
            id: RobotId::new(id),
            x,
            y,
            theta: 0.0,
        }
    }

    fn deliver(console: &mut Console, ticket: PollTicket, snapshot: Snapshot) -> Vec<Event> {
        let mut events = Vec::new();
        apply(
            console,
            Command::ApplySnapshot { ticket, snapshot },
            &mut events,
        );
        events
    }

    #[test]
    fn successive_robot_polls_fully_replace_positions() {
        let mut console = open_console();

        let _ = deliver(
            &mut console,
            ticket(EntityClass::Robots, 1),
            Snapshot::Robots(vec![robot(1, 5.0, 5.0), robot(2, 1.0, 1.0)]),
        );
        let events = deliver(
            &mut console,
            ticket(EntityClass::Robots, 2),
            Snapshot::Robots(vec![robot(1, 6.0, 7.0)]),
        );

        assert_eq!(
            events,
            vec![Event::SnapshotApplied {
                ticket: ticket(EntityClass::Robots, 2),
                count: 1,
            }]
        );
        let state = query::robot(&console, RobotId::new(1)).expect("robot 1 present");
        assert_eq!(state.position, DVec2::new(6.0, 7.0));
        assert!(query::robot(&console, RobotId::new(2)).is_none());
        assert_eq!(
            query::seen_robots(&console).collect::<Vec<_>>(),
            vec![RobotId::new(1), RobotId::new(2)]
        );
    }

    #[test]
    fn failed_path_poll_leaves_other_classes_untouched() {
        let mut console = open_console();
        let _ = deliver(&mut console, ticket(EntityClass::Grid, 1), free_grid(10, 10));
        let _ = deliver(
            &mut console,
            ticket(EntityClass::Robots, 1),
            Snapshot::Robots(vec![robot(1, 5.0, 5.0)]),
        );
        let _ = deliver(
            &mut console,
            ticket(EntityClass::Goals, 1),
            Snapshot::Goals(vec![GoalReport {
                id: RobotId::new(1),
                x_goal: 8.0,
                y_goal: 2.0,
                theta_goal: 0.0,
            }]),
        );
        let _ = deliver(
            &mut console,
            ticket(EntityClass::Paths, 1),
            Snapshot::Paths(vec![PathReport {
                id: RobotId::new(1),
                x: vec![5.0, 8.0],
                y: vec![5.0, 2.0],
            }]),
        );
        let _ = deliver(
            &mut console,
            ticket(EntityClass::Objects, 1),
            Snapshot::Objects(vec![ObjectReport {
                id: ObjectId::new(3),
                x: 2.0,
                y: 2.0,
                kind: "person".to_owned(),
            }]),
        );

        let robots_before: Vec<_> = query::robots(&console).copied().collect();
        let goals_before: Vec<_> = query::goals(&console).copied().collect();
        let paths_before: Vec<_> = query::paths(&console).cloned().collect();
        let objects_before: Vec<_> = query::objects(&console).cloned().collect();

        let mut events = Vec::new();
        let error = FeedError::Unavailable {
            message: "connection refused".to_owned(),
        };
        apply(
            &mut console,
            Command::RecordFeedFailure {
                ticket: ticket(EntityClass::Paths, 2),
                error: error.clone(),
            },
            &mut events,
        );

        assert_eq!(
            events,
            vec![Event::FeedFailed {
                ticket: ticket(EntityClass::Paths, 2),
                error: error.clone(),
            }]
        );
        assert_eq!(query::robots(&console).copied().collect::<Vec<_>>(), robots_before);
        assert_eq!(query::goals(&console).copied().collect::<Vec<_>>(), goals_before);
        assert_eq!(query::paths(&console).cloned().collect::<Vec<_>>(), paths_before);
        assert_eq!(query::objects(&console).cloned().collect::<Vec<_>>(), objects_before);
        assert_eq!(query::feed_error(&console, EntityClass::Paths), Some(&error));
        assert_eq!(query::feed_error(&console, EntityClass::Robots), None);
    }

    #[test]
    fn next_successful_poll_clears_class_error() {
        let mut console = open_console();
        let mut events = Vec::new();
        apply(
            &mut console,
            Command::RecordFeedFailure {
                ticket: ticket(EntityClass::Objects, 1),
                error: FeedError::TimedOut {
                    after: Duration::from_secs(5),
                },
            },
            &mut events,
        );
        assert!(query::feed_error(&console, EntityClass::Objects).is_some());

        let _ = deliver(
            &mut console,
            ticket(EntityClass::Objects, 2),
            Snapshot::Objects(Vec::new()),
        );

        assert!(query::feed_error(&console, EntityClass::Objects).is_none());
    }

    #[test]
    fn out_of_order_completions_are_discarded() {
        let mut console = open_console();
        let _ = deliver(
            &mut console,
            ticket(EntityClass::Robots, 5),
            Snapshot::Robots(vec![robot(1, 1.0, 1.0)]),
        );

        let events = deliver(
            &mut console,
            ticket(EntityClass::Robots, 4),
            Snapshot::Robots(vec![robot(1, 9.0, 9.0)]),
        );

        assert_eq!(
            events,
            vec![Event::SnapshotDiscarded {
                ticket: ticket(EntityClass::Robots, 4),
                reason: DiscardReason::Stale,
            }]
        );
        let state = query::robot(&console, RobotId::new(1)).expect("robot present");
        assert_eq!(state.position, DVec2::new(1.0, 1.0));
    }

    #[test]
    fn completions_after_close_are_ignored() {
        let mut console = open_console();
        let mut events = Vec::new();
        apply(&mut console, Command::CloseSession, &mut events);
        assert_eq!(events, vec![Event::SessionClosed { session: SESSION }]);

        let events = deliver(
            &mut console,
            ticket(EntityClass::Robots, 1),
            Snapshot::Robots(vec![robot(1, 1.0, 1.0)]),
        );

        assert_eq!(
            events,
            vec![Event::SnapshotDiscarded {
                ticket: ticket(EntityClass::Robots, 1),
                reason: DiscardReason::ForeignSession,
            }]
        );
        assert_eq!(query::robots(&console).count(), 0);
    }

    #[test]
    fn goals_arriving_before_the_grid_are_projected_once_it_loads() {
        let mut console = open_console();
        let _ = deliver(
            &mut console,
            ticket(EntityClass::Goals, 1),
            Snapshot::Goals(vec![GoalReport {
                id: RobotId::new(1),
                x_goal: 8.0,
                y_goal: 2.0,
                theta_goal: 0.0,
            }]),
        );
        assert_eq!(query::goals(&console).count(), 0);

        let events = deliver(&mut console, ticket(EntityClass::Grid, 1), free_grid(10, 10));

        assert!(events.contains(&Event::GridLoaded {
            width: 10,
            height: 10,
            resolution: 1.0,
        }));
        let marker = query::goal(&console, RobotId::new(1)).expect("marker projected");
        assert_eq!(marker.pixel, DVec2::new(10.0, 10.0));
    }

    #[test]
    fn invalid_grid_is_rejected_without_loading() {
        let mut console = open_console();
        let events = deliver(
            &mut console,
            ticket(EntityClass::Grid, 1),
            Snapshot::Grid(GridReport {
                width: 0,
                height: 10,
                resolution: 1.0,
                occupancy: Vec::new(),
            }),
        );

        assert!(matches!(events.as_slice(), [Event::GridRejected { .. }]));
        assert!(query::grid(&console).is_none());
        assert_eq!(query::applied_sequence(&console, EntityClass::Grid), None);
    }

    #[test]
    fn goal_snapshot_replaces_staged_markers() {
        let mut console = open_console();
        let _ = deliver(&mut console, ticket(EntityClass::Grid, 1), free_grid(10, 10));
        let mut events = Vec::new();
        apply(
            &mut console,
            Command::StageGoal {
                robot: RobotId::new(2),
                map: DVec2::new(1.0, 1.0),
                theta: 0.0,
            },
            &mut events,
        );
        assert!(query::goal(&console, RobotId::new(2)).is_some());

        let _ = deliver(
            &mut console,
            ticket(EntityClass::Goals, 1),
            Snapshot::Goals(Vec::new()),
        );

        assert!(query::goal(&console, RobotId::new(2)).is_none());
    }

    #[test]
    fn clearing_goals_removes_markers() {
        let mut console = open_console();
        let _ = deliver(&mut console, ticket(EntityClass::Grid, 1), free_grid(10, 10));
        let mut events = Vec::new();
        for id in [1, 2] {
            apply(
                &mut console,
                Command::StageGoal {
                    robot: RobotId::new(id),
                    map: DVec2::new(3.0, 3.0),
                    theta: 0.0,
                },
                &mut events,
            );
        }
        events.clear();

        apply(
            &mut console,
            Command::ClearGoal {
                robot: RobotId::new(1),
            },
            &mut events,
        );
        assert_eq!(
            events,
            vec![Event::GoalCleared {
                robot: RobotId::new(1)
            }]
        );
        assert_eq!(query::goals(&console).count(), 1);

        apply(&mut console, Command::ClearAllGoals, &mut events);
        assert_eq!(query::goals(&console).count(), 0);
    }

    #[test]
    fn pointer_tracks_map_coordinates_through_zoom() {
        let mut console = open_console();
        let _ = deliver(&mut console, ticket(EntityClass::Grid, 1), free_grid(10, 10));
        let mut events = Vec::new();

        apply(
            &mut console,
            Command::MovePointer {
                screen: DVec2::new(1.0, 1.0),
            },
            &mut events,
        );
        let before = query::pointer(&console)
            .and_then(|pointer| pointer.map)
            .expect("map coordinate available");
        assert!((before - DVec2::new(8.0, 2.0)).length() < 1e-9);

        events.clear();
        apply(
            &mut console,
            Command::ZoomStep {
                direction: ZoomDirection::In,
            },
            &mut events,
        );

        assert!(matches!(
            events.as_slice(),
            [Event::ViewportChanged { .. }, Event::PointerMoved { .. }]
        ));
        let after = query::pointer(&console)
            .and_then(|pointer| pointer.map)
            .expect("map coordinate available");
        assert!((after - before).length() > 1e-6);
    }

    #[test]
    fn confirmation_expires_with_the_clock() {
        let mut console = open_console();
        let mut events = Vec::new();
        apply(
            &mut console,
            Command::ShowConfirmation {
                message: "Initial position set for Robot 1".to_owned(),
                anchor: DVec2::ZERO,
            },
            &mut events,
        );
        events.clear();

        apply(
            &mut console,
            Command::Tick {
                dt: Duration::from_millis(1000),
            },
            &mut events,
        );
        assert!(query::confirmation(&console).is_some());

        apply(
            &mut console,
            Command::Tick {
                dt: Duration::from_millis(500),
            },
            &mut events,
        );
        assert!(query::confirmation(&console).is_none());
        assert_eq!(events.last(), Some(&Event::ConfirmationExpired));
    }

    #[test]
    fn sink_failures_are_surfaced() {
        let mut console = open_console();
        let mut events = Vec::new();
        let error = SinkError::Rejected { command: "setGoal" };

        apply(
            &mut console,
            Command::RecordSinkFailure {
                command: "setGoal",
                error: error.clone(),
            },
            &mut events,
        );

        assert_eq!(query::sink_failure(&console), Some(("setGoal", &error)));
    }

    #[test]
    fn config_rejects_non_positive_cell_size() {
        assert_eq!(
            ConsoleConfig::new(0.0, ViewportLimits::default(), DEFAULT_CONFIRMATION),
            Err(ConfigError::InvalidCellSize { cell_size_px: 0.0 })
        );
        assert_eq!(
            ConsoleConfig::new(5.0, ViewportLimits::default(), Duration::ZERO),
            Err(ConfigError::ZeroConfirmation)
        );
    }
}
