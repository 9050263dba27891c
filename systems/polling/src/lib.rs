#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Poll scheduler that keeps one independent timer per entity class.
//!
//! The scheduler never talks to the feed directly. It reacts to console
//! events, emits [`PollTicket`] requests for the adapter to hand to a
//! [`fleet_console_core::FeedSource`], and reports abandoned requests as
//! console commands.

use std::{collections::BTreeMap, time::Duration};

use fleet_console_core::{Command, EntityClass, Event, FeedError, PollTicket, SessionId};
use thiserror::Error;
use tracing::debug;

/// Interval used for every class unless configured otherwise.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(1000);

/// Time after which an unanswered request is abandoned by default.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(5000);

/// Timing parameters of the scheduler.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PollingConfig {
    intervals: BTreeMap<EntityClass, Duration>,
    request_timeout: Duration,
}

impl PollingConfig {
    /// Creates a configuration polling every class at [`DEFAULT_INTERVAL`].
    pub fn new(request_timeout: Duration) -> Result<Self, PollingConfigError> {
        if request_timeout.is_zero() {
            return Err(PollingConfigError::ZeroTimeout);
        }
        Ok(Self {
            intervals: EntityClass::ALL
                .iter()
                .map(|class| (*class, DEFAULT_INTERVAL))
                .collect(),
            request_timeout,
        })
    }

    /// Overrides the polling interval of a single class.
    pub fn with_interval(
        mut self,
        class: EntityClass,
        interval: Duration,
    ) -> Result<Self, PollingConfigError> {
        if interval.is_zero() {
            return Err(PollingConfigError::ZeroInterval { class });
        }
        let _ = self.intervals.insert(class, interval);
        Ok(self)
    }

    /// Interval between successive requests of the class.
    #[must_use]
    pub fn interval(&self, class: EntityClass) -> Duration {
        self.intervals
            .get(&class)
            .copied()
            .unwrap_or(DEFAULT_INTERVAL)
    }

    /// Time after which an unanswered request is abandoned.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        self.request_timeout
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            intervals: EntityClass::ALL
                .iter()
                .map(|class| (*class, DEFAULT_INTERVAL))
                .collect(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Reasons a polling configuration is rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum PollingConfigError {
    /// A class would be polled continuously.
    #[error("polling interval for {class} must be greater than zero")]
    ZeroInterval {
        /// Class with the invalid interval.
        class: EntityClass,
    },
    /// Every request would time out immediately.
    #[error("request timeout must be greater than zero")]
    ZeroTimeout,
}

#[derive(Clone, Copy, Debug)]
struct InFlight {
    sequence: u64,
    waited: Duration,
}

#[derive(Debug)]
struct Channel {
    class: EntityClass,
    interval: Duration,
    elapsed: Duration,
    next_sequence: u64,
    in_flight: Option<InFlight>,
    active: bool,
}

impl Channel {
    fn new(class: EntityClass, interval: Duration) -> Self {
        Self {
            class,
            interval,
            elapsed: Duration::ZERO,
            next_sequence: 1,
            in_flight: None,
            active: false,
        }
    }

    fn issue(&mut self, session: SessionId, requests: &mut Vec<PollTicket>) {
        let ticket = PollTicket::new(session, self.class, self.next_sequence);
        self.next_sequence = self.next_sequence.saturating_add(1);
        self.in_flight = Some(InFlight {
            sequence: ticket.sequence(),
            waited: Duration::ZERO,
        });
        self.elapsed = Duration::ZERO;
        debug!(class = %self.class, sequence = ticket.sequence(), "issued poll request");
        requests.push(ticket);
    }

    fn settle(&mut self, sequence: u64) {
        if self
            .in_flight
            .is_some_and(|in_flight| in_flight.sequence == sequence)
        {
            self.in_flight = None;
        }
    }
}

/// Pure system that schedules feed requests on independent per-class timers.
#[derive(Debug)]
pub struct Polling {
    config: PollingConfig,
    session: Option<SessionId>,
    channels: Vec<Channel>,
}

impl Polling {
    /// Creates a scheduler that stays idle until a session opens.
    #[must_use]
    pub fn new(config: PollingConfig) -> Self {
        let channels = EntityClass::ALL
            .iter()
            .map(|class| Channel::new(*class, config.interval(*class)))
            .collect();
        Self {
            config,
            session: None,
            channels,
        }
    }

    /// Consumes console events, emitting feed requests and timeout failures.
    pub fn handle(
        &mut self,
        events: &[Event],
        requests: &mut Vec<PollTicket>,
        out: &mut Vec<Command>,
    ) {
        for event in events {
            match event {
                Event::SessionOpened { session } => self.open(*session, requests),
                Event::SessionClosed { .. } => self.close(),
                Event::TimeAdvanced { dt } => self.advance(*dt, requests, out),
                Event::GridLoaded { .. } => {
                    if let Some(channel) = self.channel_mut(EntityClass::Grid) {
                        channel.active = false;
                    }
                }
                Event::GridRejected { ticket, .. } => {
                    if let Some(channel) = self.owned_channel(*ticket) {
                        channel.settle(ticket.sequence());
                        channel.active = false;
                    }
                }
                Event::SnapshotApplied { ticket, .. }
                | Event::SnapshotDiscarded { ticket, .. }
                | Event::FeedFailed { ticket, .. } => {
                    if let Some(channel) = self.owned_channel(*ticket) {
                        channel.settle(ticket.sequence());
                    }
                }
                _ => {}
            }
        }
    }

    fn channel_mut(&mut self, class: EntityClass) -> Option<&mut Channel> {
        self.channels
            .iter_mut()
            .find(|channel| channel.class == class)
    }

    fn owned_channel(&mut self, ticket: PollTicket) -> Option<&mut Channel> {
        if self.session != Some(ticket.session()) {
            return None;
        }
        self.channel_mut(ticket.class())
    }

    fn open(&mut self, session: SessionId, requests: &mut Vec<PollTicket>) {
        self.session = Some(session);
        for channel in &mut self.channels {
            *channel = Channel::new(channel.class, channel.interval);
            channel.active = true;
            channel.issue(session, requests);
        }
    }

    fn close(&mut self) {
        self.session = None;
        for channel in &mut self.channels {
            channel.active = false;
            channel.in_flight = None;
        }
    }

    fn advance(&mut self, dt: Duration, requests: &mut Vec<PollTicket>, out: &mut Vec<Command>) {
        let Some(session) = self.session else {
            return;
        };
        let timeout = self.config.request_timeout();

        for channel in self.channels.iter_mut().filter(|channel| channel.active) {
            if let Some(in_flight) = channel.in_flight.as_mut() {
                in_flight.waited = in_flight.waited.saturating_add(dt);
                if in_flight.waited >= timeout {
                    let ticket = PollTicket::new(session, channel.class, in_flight.sequence);
                    out.push(Command::RecordFeedFailure {
                        ticket,
                        error: FeedError::TimedOut {
                            after: in_flight.waited,
                        },
                    });
                    channel.in_flight = None;
                }
            }

            channel.elapsed = channel.elapsed.saturating_add(dt).min(channel.interval);
            if channel.in_flight.is_none() && channel.elapsed >= channel.interval {
                channel.issue(session, requests);
            }
        }
    }
}

impl Default for Polling {
    fn default() -> Self {
        Self::new(PollingConfig::default())
    }
}
