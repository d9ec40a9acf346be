//! Simulated driver with recording peripherals.
//!
//! Requests are queued by the test and answered into a response log. Every
//! peripheral records what the runtime asked of it, timestamped on the
//! shared [`SimEnv`] clock where timing matters.

use std::{cell::RefCell, collections::VecDeque, convert::Infallible, rc::Rc, time::Duration};

use safelock_app::{Driver, Progress};
use safelock_core::{
    Environment, NetworkCredentials, PlatformError, Request, Response, UpdatePoll,
    platform::{Actuator, Advertiser, Radio, UpdateChannel},
};
use tracing::debug;

use crate::SimEnv;

/// One call to [`Actuator::drive`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActuatorEvent {
    /// Virtual time of the call
    pub at: Duration,
    /// Pin driven
    pub pin: String,
    /// Energized or released
    pub energized: bool,
}

/// Actuator that records every drive.
#[derive(Debug)]
pub struct RecordingActuator {
    env: SimEnv,
    events: Vec<ActuatorEvent>,
    fail_energize: bool,
}

impl RecordingActuator {
    /// Actuator timestamping on `env`.
    pub fn new(env: SimEnv) -> Self {
        Self { env, events: Vec::new(), fail_energize: false }
    }

    /// Make every energize fail (the release still succeeds).
    pub fn fail_energize(&mut self, fail: bool) {
        self.fail_energize = fail;
    }

    /// Every drive so far.
    pub fn events(&self) -> &[ActuatorEvent] {
        &self.events
    }

    /// Whether the last drive of `pin` left it released (or it was never
    /// driven).
    pub fn is_released(&self, pin: &str) -> bool {
        self.events.iter().rev().find(|e| e.pin == pin).is_none_or(|e| !e.energized)
    }

    /// Durations between each energize and the following release.
    pub fn openings(&self) -> Vec<(String, Duration)> {
        let mut openings = Vec::new();
        let mut energized: Option<&ActuatorEvent> = None;

        for event in &self.events {
            match (event.energized, energized) {
                (true, _) => energized = Some(event),
                (false, Some(start)) if start.pin == event.pin => {
                    openings.push((event.pin.clone(), event.at - start.at));
                    energized = None;
                },
                (false, _) => {},
            }
        }
        openings
    }
}

impl Actuator for RecordingActuator {
    fn drive(&mut self, pin: &str, energized: bool) -> Result<(), PlatformError> {
        self.events.push(ActuatorEvent { at: self.env.now(), pin: pin.to_string(), energized });
        if energized && self.fail_energize {
            return Err(PlatformError(format!("pin {pin} stuck")));
        }
        Ok(())
    }
}

/// Radio with a configurable set of networks in range.
#[derive(Debug)]
pub struct SimRadio {
    chip_id: u32,
    in_range: Vec<NetworkCredentials>,
    join_after: u32,
    joining: Option<u32>,
    associated: bool,
    associations: Vec<String>,
    hosted: Vec<String>,
}

impl SimRadio {
    /// Radio with the given chip id and nothing in range.
    pub fn new(chip_id: u32) -> Self {
        Self {
            chip_id,
            in_range: Vec::new(),
            join_after: 0,
            joining: None,
            associated: false,
            associations: Vec::new(),
            hosted: Vec::new(),
        }
    }

    /// Put a network in range. Only the exact credential associates.
    pub fn add_network(&mut self, name: impl Into<String>, credential: impl Into<String>) {
        self.in_range.push(NetworkCredentials { name: name.into(), credential: credential.into() });
    }

    /// Remove every network from range.
    pub fn clear_networks(&mut self) {
        self.in_range.clear();
    }

    /// Number of failed association checks before a reachable network joins.
    pub fn set_join_after(&mut self, polls: u32) {
        self.join_after = polls;
    }

    /// Names of every network association was attempted with.
    pub fn associations(&self) -> &[String] {
        &self.associations
    }

    /// Names of every standalone network hosted.
    pub fn hosted(&self) -> &[String] {
        &self.hosted
    }
}

impl Radio for SimRadio {
    fn chip_id(&self) -> u32 {
        self.chip_id
    }

    fn associate(&mut self, credentials: &NetworkCredentials) -> Result<(), PlatformError> {
        self.associations.push(credentials.name.clone());
        self.associated = false;
        self.joining = self.in_range.contains(credentials).then_some(self.join_after);
        debug!(network = %credentials.name, reachable = self.joining.is_some(), "associate");
        Ok(())
    }

    fn is_associated(&mut self) -> bool {
        match self.joining {
            Some(0) => {
                self.joining = None;
                self.associated = true;
            },
            Some(left) => self.joining = Some(left - 1),
            None => {},
        }
        self.associated
    }

    fn host_standalone(&mut self, name: &str) -> Result<(), PlatformError> {
        self.associated = false;
        self.hosted.push(name.to_string());
        Ok(())
    }
}

/// Advertiser recording every name.
#[derive(Debug, Default)]
pub struct SimAdvertiser {
    names: Vec<String>,
}

impl SimAdvertiser {
    /// Every advertised name, oldest first.
    pub fn names(&self) -> &[String] {
        &self.names
    }
}

impl Advertiser for SimAdvertiser {
    fn advertise(&mut self, name: &str) -> Result<(), PlatformError> {
        self.names.push(name.to_string());
        Ok(())
    }
}

/// Update channel delivering queued outcomes.
#[derive(Debug, Default)]
pub struct SimUpdates {
    queued: VecDeque<UpdatePoll>,
    polls: Vec<String>,
}

impl SimUpdates {
    /// Make the next poll install an image.
    pub fn queue_install(&mut self) {
        self.queued.push_back(UpdatePoll::Installed);
    }

    /// Device names announced by every poll so far.
    pub fn polls(&self) -> &[String] {
        &self.polls
    }
}

impl UpdateChannel for SimUpdates {
    fn poll(&mut self, device_name: &str) -> Result<UpdatePoll, PlatformError> {
        self.polls.push(device_name.to_string());
        Ok(self.queued.pop_front().unwrap_or(UpdatePoll::Idle))
    }
}

/// One progress line, stamped with the virtual time it was reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressLine {
    /// Virtual time of delivery
    pub at: Duration,
    /// Reported text
    pub line: String,
}

/// Responder that logs progress into its driver.
#[derive(Debug)]
pub struct SimResponder {
    env: SimEnv,
    log: Rc<RefCell<Vec<ProgressLine>>>,
}

impl Progress for SimResponder {
    fn progress(&mut self, line: &str) {
        self.log.borrow_mut().push(ProgressLine { at: self.env.now(), line: line.to_string() });
    }
}

/// Driver over a request queue.
///
/// An empty queue makes [`Driver::poll_request`] advance the clock by the
/// poll timeout, as a real listener would have waited.
#[derive(Debug)]
pub struct SimDriver {
    env: SimEnv,
    requests: VecDeque<Request>,
    responses: Vec<Response>,
    progress: Rc<RefCell<Vec<ProgressLine>>>,
    actuator: RecordingActuator,
    radio: SimRadio,
    advertiser: SimAdvertiser,
    updates: SimUpdates,
}

impl SimDriver {
    /// Driver on `env`, with a chip id drawn from its seeded RNG.
    pub fn new(env: SimEnv) -> Self {
        let chip_id = env.random_u32();
        Self {
            actuator: RecordingActuator::new(env.clone()),
            radio: SimRadio::new(chip_id),
            env,
            requests: VecDeque::new(),
            responses: Vec::new(),
            progress: Rc::default(),
            advertiser: SimAdvertiser::default(),
            updates: SimUpdates::default(),
        }
    }

    /// Queue a request.
    pub fn push_request(&mut self, request: Request) {
        self.requests.push_back(request);
    }

    /// Requests not yet served.
    pub fn pending(&self) -> usize {
        self.requests.len()
    }

    /// Every response, oldest first.
    pub fn responses(&self) -> &[Response] {
        &self.responses
    }

    /// Every progress line delivered ahead of a response, oldest first.
    pub fn progress(&self) -> Vec<ProgressLine> {
        self.progress.borrow().clone()
    }

    /// Most recent response.
    pub fn last_response(&self) -> Option<&Response> {
        self.responses.last()
    }

    /// The recording actuator.
    pub fn recorded_actuator(&self) -> &RecordingActuator {
        &self.actuator
    }

    /// The simulated radio.
    pub fn sim_radio(&self) -> &SimRadio {
        &self.radio
    }

    /// Mutable access to the simulated radio.
    pub fn sim_radio_mut(&mut self) -> &mut SimRadio {
        &mut self.radio
    }

    /// The recording advertiser.
    pub fn sim_advertiser(&self) -> &SimAdvertiser {
        &self.advertiser
    }

    /// The simulated update channel.
    pub fn sim_updates(&self) -> &SimUpdates {
        &self.updates
    }

    /// Mutable access to the simulated update channel.
    pub fn sim_updates_mut(&mut self) -> &mut SimUpdates {
        &mut self.updates
    }

    /// Mutable access to the recording actuator.
    pub fn recorded_actuator_mut(&mut self) -> &mut RecordingActuator {
        &mut self.actuator
    }
}

impl Driver for SimDriver {
    type Error = Infallible;
    type Responder = SimResponder;
    type Actuator = RecordingActuator;
    type Radio = SimRadio;
    type Advertiser = SimAdvertiser;
    type Updates = SimUpdates;

    fn poll_request(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<(Request, SimResponder)>, Infallible> {
        match self.requests.pop_front() {
            Some(request) => {
                let responder = SimResponder { env: self.env.clone(), log: self.progress.clone() };
                Ok(Some((request, responder)))
            },
            None => {
                self.env.advance(timeout);
                Ok(None)
            },
        }
    }

    fn respond(&mut self, _: SimResponder, response: Response) -> Result<(), Infallible> {
        self.responses.push(response);
        Ok(())
    }

    fn actuator(&mut self) -> &mut RecordingActuator {
        &mut self.actuator
    }

    fn radio(&mut self) -> &mut SimRadio {
        &mut self.radio
    }

    fn advertiser(&mut self) -> &mut SimAdvertiser {
        &mut self.advertiser
    }

    fn updates(&mut self) -> &mut SimUpdates {
        &mut self.updates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn radio_joins_after_configured_polls() {
        let mut radio = SimRadio::new(1);
        radio.add_network("home", "pw");
        radio.set_join_after(2);

        let home = NetworkCredentials { name: "home".into(), credential: "pw".into() };
        radio.associate(&home).unwrap();

        assert!(!radio.is_associated());
        assert!(!radio.is_associated());
        assert!(radio.is_associated());
    }

    #[test]
    fn radio_rejects_wrong_credential() {
        let mut radio = SimRadio::new(1);
        radio.add_network("home", "pw");

        let wrong = NetworkCredentials { name: "home".into(), credential: "nope".into() };
        radio.associate(&wrong).unwrap();

        assert!((0..10).all(|_| !radio.is_associated()));
    }

    #[test]
    fn actuator_pairs_openings() {
        let env = SimEnv::new();
        let mut actuator = RecordingActuator::new(env.clone());

        actuator.drive("5", true).unwrap();
        env.advance(Duration::from_secs(3));
        actuator.drive("5", false).unwrap();

        assert_eq!(actuator.openings(), vec![("5".to_string(), Duration::from_secs(3))]);
        assert!(actuator.is_released("5"));
    }

    #[test]
    fn responder_stamps_progress_with_virtual_time() {
        let env = SimEnv::new();
        let mut driver = SimDriver::new(env.clone());
        driver.push_request(Request::command(safelock_core::Params::new()));

        let (_, mut responder) = driver.poll_request(Duration::ZERO).unwrap().unwrap();
        responder.progress("first");
        env.advance(Duration::from_secs(1));
        responder.progress("second");

        assert_eq!(driver.progress(), vec![
            ProgressLine { at: Duration::ZERO, line: "first".into() },
            ProgressLine { at: Duration::from_secs(1), line: "second".into() },
        ]);
    }

    #[test]
    fn empty_queue_advances_clock() {
        let env = SimEnv::new();
        let mut driver = SimDriver::new(env.clone());

        assert!(driver.poll_request(Duration::from_millis(100)).unwrap().is_none());
        assert_eq!(env.now(), Duration::from_millis(100));
    }
}
