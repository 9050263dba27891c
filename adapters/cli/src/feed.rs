//! Data feeds backing the console: JSON fixtures on disk and a seeded demo.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::mpsc::{self, Receiver, Sender},
    thread,
};

use anyhow::{Context, Result};
use fleet_console_core::{
    EntityClass, FeedCompletion, FeedError, FeedSource, GoalReport, GridReport, ObjectId,
    ObjectReport, PathReport, PollTicket, RobotId, RobotReport, Snapshot,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

/// Reads one JSON file per entity class from a directory on a worker thread.
#[derive(Debug)]
pub(crate) struct FixtureFeed {
    requests: Sender<PollTicket>,
    completions: Receiver<FeedCompletion>,
    orphaned: Vec<FeedCompletion>,
}

impl FixtureFeed {
    /// Starts the worker reading from `directory`.
    pub(crate) fn spawn(directory: impl Into<PathBuf>) -> Result<Self> {
        let directory = directory.into();
        if !directory.is_dir() {
            anyhow::bail!("fixture directory {} does not exist", directory.display());
        }

        let (request_sender, request_receiver) = mpsc::channel::<PollTicket>();
        let (completion_sender, completion_receiver) = mpsc::channel();
        let _ = thread::Builder::new()
            .name("fixture-feed".to_owned())
            .spawn(move || {
                for ticket in request_receiver {
                    let result = read_snapshot(&directory, ticket.class());
                    if completion_sender
                        .send(FeedCompletion { ticket, result })
                        .is_err()
                    {
                        break;
                    }
                }
            })
            .context("failed to start fixture feed worker")?;

        Ok(Self {
            requests: request_sender,
            completions: completion_receiver,
            orphaned: Vec::new(),
        })
    }
}

impl FeedSource for FixtureFeed {
    fn request(&mut self, ticket: PollTicket) {
        if self.requests.send(ticket).is_err() {
            warn!(class = %ticket.class(), "fixture feed worker stopped");
            self.orphaned.push(FeedCompletion {
                ticket,
                result: Err(FeedError::Unavailable {
                    message: "fixture feed worker stopped".to_owned(),
                }),
            });
        }
    }

    fn drain_completions(&mut self, out: &mut Vec<FeedCompletion>) {
        out.append(&mut self.orphaned);
        out.extend(self.completions.try_iter());
    }
}

/// File holding the snapshot of a class inside a fixture directory.
pub(crate) fn fixture_file(directory: &Path, class: EntityClass) -> PathBuf {
    directory.join(format!("{}.json", class.label()))
}

fn read_snapshot(directory: &Path, class: EntityClass) -> Result<Snapshot, FeedError> {
    let path = fixture_file(directory, class);
    let contents = fs::read_to_string(&path).map_err(|error| FeedError::Unavailable {
        message: format!("failed to read {}: {error}", path.display()),
    })?;
    debug!(%class, path = %path.display(), "fixture read");

    match class {
        EntityClass::Grid => decode(class, &contents).map(Snapshot::Grid),
        EntityClass::Robots => decode(class, &contents).map(Snapshot::Robots),
        EntityClass::Goals => decode(class, &contents).map(Snapshot::Goals),
        EntityClass::Paths => decode(class, &contents).map(Snapshot::Paths),
        EntityClass::Objects => decode(class, &contents).map(Snapshot::Objects),
    }
}

fn decode<T: DeserializeOwned>(class: EntityClass, contents: &str) -> Result<T, FeedError> {
    serde_json::from_str(contents).map_err(|error| FeedError::Malformed {
        class,
        message: error.to_string(),
    })
}

const DEMO_GRID_WIDTH: u32 = 120;
const DEMO_GRID_HEIGHT: u32 = 80;
const DEMO_RESOLUTION: f64 = 0.1;
const DEMO_ROBOTS: u32 = 3;
const DEMO_OBSTACLES: usize = 6;
const DEMO_STEP_M: f64 = 0.15;
const DEMO_ARRIVAL_M: f64 = 0.2;
const DEMO_PATH_POINTS: usize = 12;
const FREE: i32 = 0;
const OCCUPIED: i32 = 100;
const UNKNOWN: i32 = -1;

#[derive(Clone, Copy, Debug)]
struct DemoRobot {
    id: RobotId,
    x: f64,
    y: f64,
    theta: f64,
    goal_x: f64,
    goal_y: f64,
}

/// Synthetic fleet answering every request immediately from a seeded model.
///
/// Robots walk in straight lines towards random goals and pick a new goal on
/// arrival. Each robots request advances the model by one step, so the same
/// seed and request sequence always produce the same snapshots.
#[derive(Debug)]
pub(crate) struct DemoFeed {
    rng: ChaCha8Rng,
    occupancy: Vec<i32>,
    robots: Vec<DemoRobot>,
    objects: Vec<ObjectReport>,
    ready: Vec<FeedCompletion>,
}

impl DemoFeed {
    pub(crate) fn new(seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let occupancy = demo_occupancy(&mut rng);
        let mut feed = Self {
            rng,
            occupancy,
            robots: Vec::new(),
            objects: Vec::new(),
            ready: Vec::new(),
        };

        for id in 1..=DEMO_ROBOTS {
            let (x, y) = feed.free_point();
            let (goal_x, goal_y) = feed.free_point();
            feed.robots.push(DemoRobot {
                id: RobotId::new(id),
                x,
                y,
                theta: (goal_y - y).atan2(goal_x - x),
                goal_x,
                goal_y,
            });
        }
        for (index, kind) in ["person", "cone", "cone", "pallet"].into_iter().enumerate() {
            let (x, y) = feed.free_point();
            feed.objects.push(ObjectReport {
                id: ObjectId::new(index as u32 + 1),
                x,
                y,
                kind: kind.to_owned(),
            });
        }
        feed
    }

    fn free_point(&mut self) -> (f64, f64) {
        loop {
            let column = self.rng.gen_range(1..DEMO_GRID_WIDTH - 1);
            let row = self.rng.gen_range(1..DEMO_GRID_HEIGHT - 1);
            let index = (row * DEMO_GRID_WIDTH + column) as usize;
            if self.occupancy.get(index) == Some(&FREE) {
                return (
                    (f64::from(column) + 0.5) * DEMO_RESOLUTION,
                    (f64::from(row) + 0.5) * DEMO_RESOLUTION,
                );
            }
        }
    }

    fn advance(&mut self) {
        for index in 0..self.robots.len() {
            let Some(robot) = self.robots.get(index).copied() else {
                continue;
            };
            let (dx, dy) = (robot.goal_x - robot.x, robot.goal_y - robot.y);
            let distance = dx.hypot(dy);
            let next = if distance <= DEMO_ARRIVAL_M {
                let (goal_x, goal_y) = self.free_point();
                DemoRobot {
                    theta: (goal_y - robot.y).atan2(goal_x - robot.x),
                    goal_x,
                    goal_y,
                    ..robot
                }
            } else {
                let step = DEMO_STEP_M.min(distance);
                DemoRobot {
                    x: robot.x + dx / distance * step,
                    y: robot.y + dy / distance * step,
                    theta: dy.atan2(dx),
                    ..robot
                }
            };
            if let Some(slot) = self.robots.get_mut(index) {
                *slot = next;
            }
        }
    }

    fn snapshot(&mut self, class: EntityClass) -> Snapshot {
        match class {
            EntityClass::Grid => Snapshot::Grid(GridReport {
                width: DEMO_GRID_WIDTH,
                height: DEMO_GRID_HEIGHT,
                resolution: DEMO_RESOLUTION,
                occupancy: self.occupancy.clone(),
            }),
            EntityClass::Robots => {
                self.advance();
                Snapshot::Robots(
                    self.robots
                        .iter()
                        .map(|robot| RobotReport {
                            id: robot.id,
                            x: robot.x,
                            y: robot.y,
                            theta: robot.theta,
                        })
                        .collect(),
                )
            }
            EntityClass::Goals => Snapshot::Goals(
                self.robots
                    .iter()
                    .map(|robot| GoalReport {
                        id: robot.id,
                        x_goal: robot.goal_x,
                        y_goal: robot.goal_y,
                        theta_goal: robot.theta,
                    })
                    .collect(),
            ),
            EntityClass::Paths => Snapshot::Paths(
                self.robots
                    .iter()
                    .map(|robot| {
                        let (x, y) = (0..DEMO_PATH_POINTS)
                            .map(|step| {
                                let t = step as f64 / (DEMO_PATH_POINTS - 1) as f64;
                                (
                                    robot.x + (robot.goal_x - robot.x) * t,
                                    robot.y + (robot.goal_y - robot.y) * t,
                                )
                            })
                            .unzip();
                        PathReport { id: robot.id, x, y }
                    })
                    .collect(),
            ),
            EntityClass::Objects => Snapshot::Objects(self.objects.clone()),
        }
    }
}

impl FeedSource for DemoFeed {
    fn request(&mut self, ticket: PollTicket) {
        let snapshot = self.snapshot(ticket.class());
        self.ready.push(FeedCompletion {
            ticket,
            result: Ok(snapshot),
        });
    }

    fn drain_completions(&mut self, out: &mut Vec<FeedCompletion>) {
        out.append(&mut self.ready);
    }
}

/// Walled floor with rectangular obstacles and one unobserved corner.
fn demo_occupancy(rng: &mut ChaCha8Rng) -> Vec<i32> {
    let (width, height) = (DEMO_GRID_WIDTH as usize, DEMO_GRID_HEIGHT as usize);
    let mut cells = vec![FREE; width * height];

    for row in 0..height {
        for column in 0..width {
            let border = row == 0 || column == 0 || row == height - 1 || column == width - 1;
            let unobserved = row >= height - 12 && column >= width - 20;
            let value = if border {
                OCCUPIED
            } else if unobserved {
                UNKNOWN
            } else {
                continue;
            };
            if let Some(cell) = cells.get_mut(row * width + column) {
                *cell = value;
            }
        }
    }

    for _ in 0..DEMO_OBSTACLES {
        let block_width = rng.gen_range(3..12);
        let block_height = rng.gen_range(3..10);
        let left = rng.gen_range(2..width - block_width - 2);
        let top = rng.gen_range(2..height - block_height - 2);
        for row in top..top + block_height {
            for column in left..left + block_width {
                if let Some(cell) = cells.get_mut(row * width + column) {
                    *cell = OCCUPIED;
                }
            }
        }
    }

    cells
}
