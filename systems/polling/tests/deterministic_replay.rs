use std::{collections::VecDeque, time::Duration};

use fleet_console_core::{
    Command, EntityClass, Event, FeedError, GridReport, PollTicket, RobotId, RobotReport,
    SessionId, Snapshot,
};
use fleet_console_system_polling::{Polling, PollingConfig};
use fleet_console_world::{self as world, query, Console};

const SESSION: SessionId = SessionId::new(7);
const FRAME: Duration = Duration::from_millis(100);

#[test]
fn deterministic_replay_produces_identical_logs() {
    let first = replay(40);
    let second = replay(40);

    assert_eq!(first, second, "replay diverged between runs");
}

#[test]
fn replay_applies_robot_polls_in_sequence_order() {
    let outcome = replay(40);

    let robot_sequences: Vec<u64> = outcome
        .applied
        .iter()
        .filter(|(class, _)| *class == EntityClass::Robots)
        .map(|(_, sequence)| *sequence)
        .collect();
    assert!(robot_sequences.len() >= 10, "robots polled every 200ms");
    assert!(robot_sequences.windows(2).all(|pair| pair[0] < pair[1]));
    assert_eq!(
        outcome
            .applied
            .iter()
            .filter(|(class, _)| *class == EntityClass::Grid)
            .count(),
        1,
        "grid is loaded once"
    );
    assert!(outcome.final_robot_x > 0.0);
}

#[test]
fn failing_paths_feed_does_not_stall_other_classes() {
    let outcome = replay(40);

    assert!(outcome.path_failures > 0);
    assert!(outcome
        .applied
        .iter()
        .any(|(class, _)| *class == EntityClass::Goals));
}

#[derive(Debug, PartialEq)]
struct ReplayOutcome {
    applied: Vec<(EntityClass, u64)>,
    path_failures: usize,
    final_robot_x: f64,
}

/// Feed answering robot requests one frame after they are issued and every
/// other class immediately; every path request fails.
struct ScriptedFeed {
    pending: VecDeque<(u32, PollTicket)>,
    frame: u32,
}

impl ScriptedFeed {
    fn new() -> Self {
        Self {
            pending: VecDeque::new(),
            frame: 0,
        }
    }

    fn request(&mut self, ticket: PollTicket) {
        let delay = if ticket.class() == EntityClass::Robots { 1 } else { 0 };
        self.pending.push_back((self.frame + delay, ticket));
    }

    fn due(&mut self) -> Vec<Command> {
        let frame = self.frame;
        let (ready, waiting): (VecDeque<_>, VecDeque<_>) = self
            .pending
            .drain(..)
            .partition(|(ready, _)| *ready <= frame);
        self.pending = waiting;
        self.frame += 1;
        ready.into_iter().map(|(_, ticket)| answer(ticket)).collect()
    }
}

fn answer(ticket: PollTicket) -> Command {
    let snapshot = match ticket.class() {
        EntityClass::Grid => Snapshot::Grid(GridReport {
            width: 20,
            height: 20,
            resolution: 0.5,
            occupancy: vec![0; 400],
        }),
        EntityClass::Robots => Snapshot::Robots(vec![RobotReport {
            id: RobotId::new(1),
            x: ticket.sequence() as f64 * 0.1,
            y: 1.0,
            theta: 0.0,
        }]),
        EntityClass::Goals => Snapshot::Goals(Vec::new()),
        EntityClass::Paths => {
            return Command::RecordFeedFailure {
                ticket,
                error: FeedError::Unavailable {
                    message: "planner offline".to_owned(),
                },
            }
        }
        EntityClass::Objects => Snapshot::Objects(Vec::new()),
    };
    Command::ApplySnapshot { ticket, snapshot }
}

fn replay(frames: u32) -> ReplayOutcome {
    let config = PollingConfig::new(Duration::from_secs(2))
        .and_then(|config| config.with_interval(EntityClass::Robots, Duration::from_millis(200)))
        .expect("valid polling config");
    let mut console = Console::default();
    let mut polling = Polling::new(config);
    let mut feed = ScriptedFeed::new();
    let mut outcome = ReplayOutcome {
        applied: Vec::new(),
        path_failures: 0,
        final_robot_x: 0.0,
    };

    let mut commands = vec![Command::OpenSession { session: SESSION }];
    for _ in 0..frames {
        commands.push(Command::Tick { dt: FRAME });
        while !commands.is_empty() {
            let mut events = Vec::new();
            for command in commands.drain(..) {
                world::apply(&mut console, command, &mut events);
            }
            record(&events, &mut outcome);

            let mut requests = Vec::new();
            polling.handle(&events, &mut requests, &mut commands);
            for ticket in requests {
                feed.request(ticket);
            }
        }
        commands.extend(feed.due());
    }

    outcome.final_robot_x = query::robot(&console, RobotId::new(1))
        .map(|robot| robot.position.x)
        .unwrap_or_default();
    outcome
}

fn record(events: &[Event], outcome: &mut ReplayOutcome) {
    for event in events {
        match event {
            Event::SnapshotApplied { ticket, .. } => {
                outcome.applied.push((ticket.class(), ticket.sequence()));
            }
            Event::FeedFailed { ticket, .. } if ticket.class() == EntityClass::Paths => {
                outcome.path_failures += 1;
            }
            _ => {}
        }
    }
}
