//! Drives one console session: feed completions, operator input, polling and
//! the command sink, in that order, once per frame.

use std::{cell::RefCell, collections::VecDeque, rc::Rc, time::Duration};

use anyhow::{Context, Result};
use fleet_console_core::{
    Command, CommandSink, EntityClass, Event, FeedSource, OperatorInput, SessionId, SinkCommand,
};
use fleet_console_rendering::{ControlState, Presentation, RenderingBackend, Scene, SceneState};
use fleet_console_system_interaction::{Interaction, InteractionContext};
use fleet_console_system_polling::Polling;
use fleet_console_system_proximity::ProximityPolicy;
use fleet_console_world::{self as world, query, Console};
use tracing::{debug, info, warn};

use crate::config::ValidatedSettings;

/// Clock period of headless runs.
pub(crate) const HEADLESS_TICK: Duration = Duration::from_millis(100);
const GRID_WAIT_PAUSE: Duration = Duration::from_millis(20);

/// Owns the console together with the systems and adapters that feed it.
pub(crate) struct Session {
    id: SessionId,
    console: Console,
    polling: Polling,
    interaction: Interaction,
    proximity: ProximityPolicy,
    feed: Box<dyn FeedSource>,
    sink: Box<dyn CommandSink>,
    epoch_ms: u64,
    elapsed: Duration,
}

impl Session {
    /// `epoch_ms` is the wall-clock time the session starts at; command
    /// timestamps advance from it with the session clock.
    pub(crate) fn new(
        settings: &ValidatedSettings,
        feed: Box<dyn FeedSource>,
        sink: Box<dyn CommandSink>,
        id: SessionId,
        epoch_ms: u64,
    ) -> Self {
        Self {
            id,
            console: Console::new(settings.console),
            polling: Polling::new(settings.polling.clone()),
            interaction: Interaction,
            proximity: settings.proximity,
            feed,
            sink,
            epoch_ms,
            elapsed: Duration::ZERO,
        }
    }

    pub(crate) fn console(&self) -> &Console {
        &self.console
    }

    /// Opens the session, issuing the first request of every class.
    pub(crate) fn open(&mut self) -> Vec<Event> {
        info!(session = %self.id.get(), "session opened");
        let mut events = Vec::new();
        self.execute([Command::OpenSession { session: self.id }], &mut events);
        events
    }

    /// Closes the session; completions still in flight are discarded later.
    pub(crate) fn close(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        self.execute([Command::CloseSession], &mut events);
        info!(session = %self.id.get(), "session closed");
        events
    }

    /// Advances the session by one frame.
    ///
    /// Fails when the feed delivered a grid that cannot be displayed.
    pub(crate) fn step(&mut self, dt: Duration, inputs: &[OperatorInput]) -> Result<Vec<Event>> {
        self.elapsed = self.elapsed.saturating_add(dt);
        let timestamp_ms = self
            .epoch_ms
            .saturating_add(u64::try_from(self.elapsed.as_millis()).unwrap_or(u64::MAX));

        let mut events = Vec::new();
        let mut completions = Vec::new();
        self.feed.drain_completions(&mut completions);
        self.execute(
            completions.into_iter().map(|completion| completion.into_command()),
            &mut events,
        );

        let context = self.interaction_context();
        let mut commands = Vec::new();
        let mut sink_commands = Vec::new();
        self.interaction.handle(
            inputs,
            &context,
            timestamp_ms,
            &mut commands,
            &mut sink_commands,
        );
        commands.push(Command::Tick { dt });

        self.execute(commands, &mut events);
        self.submit(sink_commands, &mut events);

        ensure_grid_accepted(&events)?;
        Ok(events)
    }

    /// Steps the session until the grid loads or `timeout` of session time
    /// passes, calling `pace` between attempts. Returns whether a grid is loaded.
    pub(crate) fn await_grid(
        &mut self,
        timeout: Duration,
        mut pace: impl FnMut(Duration),
    ) -> Result<bool> {
        let mut waited = Duration::ZERO;
        while query::grid(&self.console).is_none() && waited < timeout {
            pace(GRID_WAIT_PAUSE);
            waited += GRID_WAIT_PAUSE;
            let _ = self.step(GRID_WAIT_PAUSE, &[])?;
        }
        Ok(query::grid(&self.console).is_some())
    }

    fn execute(&mut self, commands: impl IntoIterator<Item = Command>, events: &mut Vec<Event>) {
        let mut pending: VecDeque<Command> = commands.into_iter().collect();
        while let Some(command) = pending.pop_front() {
            let mut produced = Vec::new();
            world::apply(&mut self.console, command, &mut produced);

            let mut requests = Vec::new();
            let mut follow_up = Vec::new();
            self.polling.handle(&produced, &mut requests, &mut follow_up);
            for ticket in requests {
                debug!(class = %ticket.class(), sequence = ticket.sequence(), "feed request");
                self.feed.request(ticket);
            }
            pending.extend(follow_up);
            events.extend(produced);
        }
    }

    fn submit(&mut self, commands: Vec<SinkCommand>, events: &mut Vec<Event>) {
        for command in commands {
            match self.sink.submit(&command) {
                Ok(()) => info!(command = command.name(), "command submitted"),
                Err(error) => {
                    warn!(command = command.name(), %error, "command sink failed");
                    self.execute(
                        [Command::RecordSinkFailure {
                            command: command.name(),
                            error,
                        }],
                        events,
                    );
                }
            }
        }
    }

    fn interaction_context(&self) -> InteractionContext {
        InteractionContext {
            viewport: query::viewport(&self.console),
            transform: query::transform(&self.console),
            selection: query::selection(&self.console),
            mode: query::placement_mode(&self.console),
            heading: query::placement_heading(&self.console),
        }
    }

    /// Console state handed to the layer projections.
    pub(crate) fn scene_state(&self) -> SceneState<'_> {
        let console = &self.console;
        let suppressed_paths = query::transform(console)
            .map(|transform| {
                self.proximity.suppressed_paths(
                    query::robots(console),
                    query::goals(console),
                    &transform,
                )
            })
            .unwrap_or_default();

        SceneState {
            grid: query::grid(console),
            robots: query::robots(console).copied().collect(),
            seen_robots: query::seen_robots(console).collect(),
            selection: query::selection(console),
            goals: query::goals(console).copied().collect(),
            paths: query::paths(console).cloned().collect(),
            paths_visible: query::paths_visible(console),
            suppressed_paths,
            objects: query::objects(console).cloned().collect(),
            pointer: query::pointer(console),
            confirmation: query::confirmation(console).cloned(),
            status: self.status_lines(),
        }
    }

    fn status_lines(&self) -> Vec<String> {
        let mut lines: Vec<String> = EntityClass::ALL
            .iter()
            .filter_map(|class| {
                let error = query::feed_error(&self.console, *class)?;
                Some(match query::applied_sequence(&self.console, *class) {
                    Some(sequence) => format!("{class} feed: {error} (showing poll {sequence})"),
                    None => format!("{class} feed: {error}"),
                })
            })
            .collect();
        if let Some((command, error)) = query::sink_failure(&self.console) {
            lines.push(format!("{command} failed: {error}"));
        }
        lines
    }

    pub(crate) fn control_state(&self) -> ControlState {
        ControlState {
            robots: query::robots(&self.console).map(|robot| robot.id).collect(),
            selection: query::selection(&self.console),
            mode: query::placement_mode(&self.console),
            heading: query::placement_heading(&self.console),
            paths_visible: query::paths_visible(&self.console),
        }
    }

    /// Rebuilds the layers invalidated by `events` and mirrors view state.
    pub(crate) fn sync_scene(&self, scene: &mut Scene, events: &[Event]) {
        scene.layers.invalidate(events);
        if scene.layers.needs_refresh() {
            let rebuilt = scene.layers.refresh(&self.scene_state());
            debug!(?rebuilt, "layers rebuilt");
        }
        scene.viewport = query::viewport(&self.console);
        scene.controls = self.control_state();
    }
}

fn ensure_grid_accepted(events: &[Event]) -> Result<()> {
    for event in events {
        if let Event::GridRejected { error, .. } = event {
            return Err(*error).context("occupancy grid rejected");
        }
    }
    Ok(())
}

/// Totals reported at the end of a headless run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct HeadlessSummary {
    pub(crate) frames: u64,
    pub(crate) robots: usize,
    pub(crate) goals: usize,
    pub(crate) objects: usize,
}

/// Runs the session on a fixed [`HEADLESS_TICK`] clock for `duration`,
/// calling `pace` before every frame.
pub(crate) fn run_headless(
    session: &mut Session,
    duration: Duration,
    mut pace: impl FnMut(Duration),
) -> Result<HeadlessSummary> {
    let mut elapsed = Duration::ZERO;
    let mut frames = 0;
    while elapsed < duration {
        pace(HEADLESS_TICK);
        for event in session.step(HEADLESS_TICK, &[])? {
            debug!(?event, "console event");
        }
        elapsed += HEADLESS_TICK;
        frames += 1;
    }
    let _ = session.close();

    let console = session.console();
    Ok(HeadlessSummary {
        frames,
        robots: query::robots(console).count(),
        goals: query::goals(console).count(),
        objects: query::objects(console).count(),
    })
}

/// Drives the session through `backend` until it stops, then closes the
/// session. A failing frame stops the backend and its error is returned.
pub(crate) fn run_presented(
    session: Rc<RefCell<Session>>,
    backend: impl RenderingBackend,
    presentation: Presentation,
) -> Result<()> {
    let frames = Rc::clone(&session);
    let outcome = backend.run(presentation, move |dt, input, scene| {
        let mut session = frames.borrow_mut();
        let events = session.step(dt, &input.actions)?;
        session.sync_scene(scene, &events);
        Ok(())
    });
    let _ = session.borrow_mut().close();
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::ConsoleSettings, feed::DemoFeed};
    use fleet_console_core::{
        CoordinateTransform, FeedCompletion, FeedError, GoalReport, GridReport, PollTicket, RobotId, RobotReport,
        SinkError, Snapshot,
    };
    use fleet_console_rendering::{Color, FrameInput, LayerId};
    use glam::DVec2;
    use std::collections::BTreeMap;

    const EPOCH_MS: u64 = 1_700_000_000_000;

    /// Feed answering every request on the next frame from fixed results.
    #[derive(Default)]
    struct CannedFeed {
        answers: BTreeMap<EntityClass, Result<Snapshot, FeedError>>,
        ready: Vec<FeedCompletion>,
    }

    impl CannedFeed {
        fn with(mut self, class: EntityClass, answer: Result<Snapshot, FeedError>) -> Self {
            let _ = self.answers.insert(class, answer);
            self
        }
    }

    impl FeedSource for CannedFeed {
        fn request(&mut self, ticket: PollTicket) {
            let result = self
                .answers
                .get(&ticket.class())
                .cloned()
                .unwrap_or_else(|| Ok(empty_snapshot(ticket.class())));
            self.ready.push(FeedCompletion { ticket, result });
        }

        fn drain_completions(&mut self, out: &mut Vec<FeedCompletion>) {
            out.append(&mut self.ready);
        }
    }

    fn empty_snapshot(class: EntityClass) -> Snapshot {
        match class {
            EntityClass::Grid => Snapshot::Grid(free_grid()),
            EntityClass::Robots => Snapshot::Robots(Vec::new()),
            EntityClass::Goals => Snapshot::Goals(Vec::new()),
            EntityClass::Paths => Snapshot::Paths(Vec::new()),
            EntityClass::Objects => Snapshot::Objects(Vec::new()),
        }
    }

    fn free_grid() -> GridReport {
        GridReport {
            width: 10,
            height: 10,
            resolution: 1.0,
            occupancy: vec![0; 100],
        }
    }

    #[derive(Clone, Default)]
    struct RecordingSink {
        submitted: Rc<RefCell<Vec<SinkCommand>>>,
        reject: bool,
    }

    impl CommandSink for RecordingSink {
        fn submit(&mut self, command: &SinkCommand) -> Result<(), SinkError> {
            if self.reject {
                return Err(SinkError::Rejected {
                    command: command.name(),
                });
            }
            self.submitted.borrow_mut().push(command.clone());
            Ok(())
        }
    }

    fn session(feed: CannedFeed, sink: RecordingSink) -> Session {
        let settings = ConsoleSettings::default()
            .validate()
            .expect("default settings");
        Session::new(
            &settings,
            Box::new(feed),
            Box::new(sink),
            SessionId::new(1),
            EPOCH_MS,
        )
    }

    /// Backend running a fixed number of frames without a window.
    struct ScriptedBackend {
        frames: usize,
    }

    impl RenderingBackend for ScriptedBackend {
        fn run<F>(self, presentation: Presentation, mut update_scene: F) -> Result<()>
        where
            F: FnMut(Duration, FrameInput, &mut Scene) -> Result<()> + 'static,
        {
            let mut scene = presentation.scene;
            for _ in 0..self.frames {
                update_scene(Duration::from_millis(16), FrameInput::default(), &mut scene)?;
            }
            Ok(())
        }
    }

    fn presentation() -> Presentation {
        Presentation::new(
            "test",
            Color::from_rgb_u8(0, 0, 0),
            Scene::new(fleet_console_core::ViewportLimits::default()),
        )
    }

    fn robot_feed() -> CannedFeed {
        CannedFeed::default().with(
            EntityClass::Robots,
            Ok(Snapshot::Robots(vec![RobotReport {
                id: RobotId::new(1),
                x: 5.0,
                y: 5.0,
                theta: 0.0,
            }])),
        )
    }

    fn screen_of(session: &Session, map: DVec2) -> DVec2 {
        let transform = query::transform(session.console()).expect("grid loaded");
        query::viewport(session.console()).to_screen(transform.map_to_pixel(map))
    }

    #[test]
    fn first_frame_loads_every_class() {
        let mut session = session(robot_feed(), RecordingSink::default());
        let _ = session.open();

        let events = session
            .step(Duration::from_millis(16), &[])
            .expect("grid accepted");

        assert!(events
            .iter()
            .any(|event| matches!(event, Event::GridLoaded { width: 10, .. })));
        assert_eq!(query::robots(session.console()).count(), 1);
    }

    #[test]
    fn click_in_goal_mode_sends_exactly_one_set_goal() {
        let sink = RecordingSink::default();
        let mut session = session(robot_feed(), sink.clone());
        let _ = session.open();
        let _ = session.step(Duration::from_millis(16), &[]).expect("frame");
        let click = screen_of(&session, DVec2::new(8.0, 2.0));

        let _ = session
            .step(
                Duration::from_millis(16),
                &[
                    OperatorInput::SelectRobot {
                        robot: Some(RobotId::new(1)),
                    },
                    OperatorInput::Click { screen: click },
                ],
            )
            .expect("frame");

        let submitted = sink.submitted.borrow();
        assert_eq!(submitted.len(), 1);
        let SinkCommand::SetGoal {
            robot,
            x,
            y,
            theta,
            timestamp,
        } = &submitted[0]
        else {
            panic!("expected setGoal, got {:?}", submitted[0]);
        };
        assert_eq!(*robot, RobotId::new(1));
        assert!((x - 8.0).abs() < 1e-6 && (y - 2.0).abs() < 1e-6);
        assert_eq!(*theta, 0.0);
        assert_eq!(*timestamp, EPOCH_MS + 32);

        let goal = query::goal(session.console(), RobotId::new(1)).expect("goal staged");
        let transform = query::transform(session.console()).expect("grid loaded");
        assert!(goal
            .pixel
            .abs_diff_eq(transform.map_to_pixel(DVec2::new(8.0, 2.0)), 1e-6));
    }

    #[test]
    fn click_in_the_frame_the_grid_arrives_is_placed() {
        let sink = RecordingSink::default();
        let mut session = session(robot_feed(), sink.clone());
        let _ = session.open();
        let transform = CoordinateTransform::new(10, 10, 1.0, 5.0).expect("valid transform");
        let click = query::viewport(session.console())
            .to_screen(transform.map_to_pixel(DVec2::new(8.0, 2.0)));

        let _ = session
            .step(
                Duration::from_millis(16),
                &[
                    OperatorInput::SelectRobot {
                        robot: Some(RobotId::new(1)),
                    },
                    OperatorInput::Click { screen: click },
                ],
            )
            .expect("frame");

        assert_eq!(query::transform(session.console()), Some(transform));
        let submitted = sink.submitted.borrow();
        assert!(matches!(
            submitted.as_slice(),
            [SinkCommand::SetGoal { robot, x, y, .. }]
                if *robot == RobotId::new(1) && (x - 8.0).abs() < 1e-6 && (y - 2.0).abs() < 1e-6
        ));
    }

    #[test]
    fn rejected_grid_aborts_the_session() {
        let feed = CannedFeed::default().with(
            EntityClass::Grid,
            Ok(Snapshot::Grid(GridReport {
                width: 0,
                height: 10,
                resolution: 1.0,
                occupancy: Vec::new(),
            })),
        );
        let mut session = session(feed, RecordingSink::default());
        let _ = session.open();

        let error = session
            .step(Duration::from_millis(16), &[])
            .expect_err("grid rejected");

        assert!(format!("{error:#}").contains("occupancy grid rejected"));
    }

    #[test]
    fn presented_session_closes_when_the_backend_stops() {
        let shared = Rc::new(RefCell::new(session(robot_feed(), RecordingSink::default())));
        let _ = shared.borrow_mut().open();

        run_presented(Rc::clone(&shared), ScriptedBackend { frames: 3 }, presentation())
            .expect("frames succeed");

        let session = shared.borrow();
        assert_eq!(query::robots(session.console()).count(), 1);
        assert!(query::session(session.console()).is_none());
    }

    #[test]
    fn failing_frame_stops_the_backend_and_closes_the_session() {
        let feed = CannedFeed::default().with(
            EntityClass::Grid,
            Ok(Snapshot::Grid(GridReport {
                width: 4,
                height: 4,
                resolution: 1.0,
                occupancy: vec![0; 3],
            })),
        );
        let shared = Rc::new(RefCell::new(session(feed, RecordingSink::default())));
        let _ = shared.borrow_mut().open();

        let error = run_presented(Rc::clone(&shared), ScriptedBackend { frames: 3 }, presentation())
            .expect_err("grid rejected");

        assert!(format!("{error:#}").contains("occupancy grid rejected"));
        assert!(query::session(shared.borrow().console()).is_none());
    }

    #[test]
    fn sink_failures_reach_the_status_block() {
        let sink = RecordingSink {
            reject: true,
            ..RecordingSink::default()
        };
        let mut session = session(robot_feed(), sink);
        let _ = session.open();
        let _ = session.step(Duration::from_millis(16), &[]).expect("frame");

        let _ = session
            .step(
                Duration::from_millis(16),
                &[
                    OperatorInput::SelectRobot {
                        robot: Some(RobotId::new(1)),
                    },
                    OperatorInput::StopSelectedRobot,
                ],
            )
            .expect("sink failures are not fatal");

        assert_eq!(
            session.scene_state().status,
            vec!["stopRobot failed: stopRobot was rejected by the fleet".to_owned()]
        );
    }

    #[test]
    fn failing_feed_class_is_reported_without_blocking_others() {
        let feed = robot_feed().with(
            EntityClass::Paths,
            Err(FeedError::Unavailable {
                message: "planner offline".to_owned(),
            }),
        );
        let mut session = session(feed, RecordingSink::default());
        let _ = session.open();
        let _ = session.step(Duration::from_millis(16), &[]).expect("frame");

        let state = session.scene_state();
        assert_eq!(
            state.status,
            vec!["paths feed: feed unavailable: planner offline".to_owned()]
        );
        assert_eq!(state.robots.len(), 1);
    }

    #[test]
    fn failed_class_reports_the_poll_still_shown() {
        let mut session = session(robot_feed(), RecordingSink::default());
        let _ = session.open();
        let _ = session.step(Duration::from_millis(16), &[]).expect("frame");

        let mut events = Vec::new();
        world::apply(
            &mut session.console,
            Command::RecordFeedFailure {
                ticket: PollTicket::new(SessionId::new(1), EntityClass::Robots, 2),
                error: FeedError::Unavailable {
                    message: "link down".to_owned(),
                },
            },
            &mut events,
        );

        let state = session.scene_state();
        assert_eq!(
            state.status,
            vec!["robots feed: feed unavailable: link down (showing poll 1)".to_owned()]
        );
        assert_eq!(state.robots.len(), 1);
    }

    #[test]
    fn paths_near_their_goal_are_suppressed() {
        let feed = robot_feed().with(
            EntityClass::Goals,
            Ok(Snapshot::Goals(vec![GoalReport {
                id: RobotId::new(1),
                x_goal: 5.5,
                y_goal: 5.0,
                theta_goal: 0.0,
            }])),
        );
        let mut session = session(feed, RecordingSink::default());
        let _ = session.open();
        let _ = session.step(Duration::from_millis(16), &[]).expect("frame");

        assert!(session
            .scene_state()
            .suppressed_paths
            .contains(&RobotId::new(1)));
    }

    #[test]
    fn scene_sync_builds_layers_and_mirrors_controls() {
        let mut session = session(robot_feed(), RecordingSink::default());
        let mut scene = Scene::new(fleet_console_core::ViewportLimits::default());
        let mut events = session.open();
        events.extend(session.step(Duration::from_millis(16), &[]).expect("frame"));
        events.extend(
            session
                .step(
                    Duration::from_millis(16),
                    &[OperatorInput::ZoomButton {
                        direction: fleet_console_core::ZoomDirection::In,
                    }],
                )
                .expect("frame"),
        );

        session.sync_scene(&mut scene, &events);

        assert!(!scene.layers.needs_refresh());
        assert_eq!(scene.layers.raster().map(|raster| raster.width()), Some(10));
        assert!(scene
            .layers
            .layer(LayerId::Robots)
            .is_some_and(|layer| !layer.primitives().is_empty()));
        assert_eq!(scene.viewport, query::viewport(session.console()));
        assert_eq!(scene.controls.robots, vec![RobotId::new(1)]);
    }

    #[test]
    fn await_grid_returns_once_the_grid_loads() {
        let mut session = session(robot_feed(), RecordingSink::default());
        let _ = session.open();
        let mut pauses = 0;

        let loaded = session
            .await_grid(Duration::from_secs(1), |_| pauses += 1)
            .expect("grid accepted");

        assert!(loaded);
        assert_eq!(pauses, 1);
    }

    #[test]
    fn headless_demo_run_populates_the_console() {
        let settings = ConsoleSettings::default()
            .validate()
            .expect("default settings");
        let mut session = Session::new(
            &settings,
            Box::new(DemoFeed::new(7)),
            Box::new(RecordingSink::default()),
            SessionId::new(2),
            EPOCH_MS,
        );
        let _ = session.open();

        let summary = run_headless(&mut session, Duration::from_secs(2), |_| {})
            .expect("demo grid accepted");

        assert_eq!(summary.frames, 20);
        assert_eq!(summary.robots, 3);
        assert_eq!(summary.goals, 3);
        assert_eq!(summary.objects, 4);
    }
}
