//! Generic runtime for the device loop.
//!
//! # Lifecycle
//!
//! ```text
//! boot ──> settle network ──> advertise ──> ┌──────────────────────┐
//!  ↑                                        │ poll request         │
//!  │                                        │ poll update channel  │
//!  └──────── restart deadline / update ──── │ check restart        │
//!                                           └──────────────────────┘
//! ```
//!
//! Everything happens on one thread, one step at a time. An open blocks the
//! loop for its whole duration and the wrong-secret penalty blocks it for
//! the delay. A restart keeps only what the persistent region holds.

use std::time::Duration;

use safelock_core::{
    Controller, ControllerAction, ControllerConfig, Eeprom, Environment, JoinConfig,
    NetworkIdentity, OpenSequence, OpenStep, Request, Response, SecretStore, UpdatePoll, network,
    open,
    platform::{Actuator, Advertiser, UpdateChannel},
};
use tracing::{debug, error, info, warn};

use crate::{Driver, Progress};

/// Runtime tunables.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Network join timing
    pub join: JoinConfig,
    /// Dispatch tunables
    pub controller: ControllerConfig,
    /// How long one step waits for a request
    pub poll_interval: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            join: JoinConfig::default(),
            controller: ControllerConfig::default(),
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// Progress line reported for one step of an open of `seconds`.
pub fn describe_step(step: OpenStep, seconds: u32) -> String {
    match step {
        OpenStep::Energize => format!("Opening safe for {seconds} seconds"),
        OpenStep::Hold { remaining } => format!("{remaining} seconds remaining"),
        OpenStep::Release => "Safe closed".to_string(),
    }
}

/// The device loop.
pub struct Runtime<D, E: Environment, M> {
    driver: D,
    env: E,
    controller: Controller<M>,
    config: RuntimeConfig,
    restart_requested: Option<(E::Instant, Duration)>,
    boots: u32,
}

impl<D, E, M> Runtime<D, E, M>
where
    D: Driver,
    E: Environment,
    M: Eeprom,
{
    /// Boot from `eeprom`: settle the network identity, advertise, and load
    /// the controller.
    ///
    /// Blocks for the whole join phase.
    pub fn boot(mut driver: D, env: E, eeprom: M, config: RuntimeConfig) -> Self {
        let store = SecretStore::new(eeprom);
        let network = settle(&mut driver, &env, &store, &config.join);
        let controller = Controller::new(store, network, config.controller.clone());

        Self { driver, env, controller, config, restart_requested: None, boots: 1 }
    }

    /// Serve until the driver fails.
    pub fn run(&mut self) -> Result<(), D::Error> {
        info!(network = ?self.controller.network(), "serving");
        loop {
            self.step()?;
        }
    }

    /// One pass of the loop. Returns whether a request was served.
    pub fn step(&mut self) -> Result<bool, D::Error> {
        let served = match self.driver.poll_request(self.config.poll_interval)? {
            Some((request, responder)) => {
                self.serve(&request, responder);
                true
            },
            None => false,
        };

        self.poll_updates();
        self.check_restart();
        Ok(served)
    }

    /// Restart now: re-settle the network and reload from the store.
    pub fn restart(&mut self) {
        self.restart_requested = None;
        self.boots += 1;
        info!(boot = self.boots, "restarting");

        let network = settle(&mut self.driver, &self.env, self.controller.store(), &self.config.join);
        self.controller.reboot(network);
    }

    /// The controller.
    pub fn controller(&self) -> &Controller<M> {
        &self.controller
    }

    /// Mutable access to the controller.
    pub fn controller_mut(&mut self) -> &mut Controller<M> {
        &mut self.controller
    }

    /// The driver.
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Mutable access to the driver, e.g. to queue simulated requests.
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// The environment.
    pub fn env(&self) -> &E {
        &self.env
    }

    /// Number of boots so far, including the first.
    pub fn boots(&self) -> u32 {
        self.boots
    }

    /// Whether a restart has been scheduled and not yet performed.
    pub fn restart_pending(&self) -> bool {
        self.restart_requested.is_some()
    }

    /// Network identity of the current boot.
    pub fn network(&self) -> NetworkIdentity {
        self.controller.network()
    }

    /// Tear down, keeping the driver, environment and persistent medium.
    pub fn into_parts(self) -> (D, E, M) {
        (self.driver, self.env, self.controller.into_store().into_inner())
    }

    fn serve(&mut self, request: &Request, responder: D::Responder) {
        debug!(target = ?request.target, "request");
        let mut responder = Some(responder);

        for action in self.controller.handle(request) {
            match action {
                ControllerAction::Delay(delay) => self.env.sleep(delay),
                ControllerAction::Respond(response) => self.reply(&mut responder, response),
                ControllerAction::Open { pin, sequence } => {
                    let response = self.open(&pin, sequence, responder.as_mut());
                    self.reply(&mut responder, response);
                },
                ControllerAction::Advertise { name } => advertise(&mut self.driver, &name),
                ControllerAction::ScheduleRestart { after } => {
                    info!(?after, "restart scheduled");
                    self.restart_requested = Some((self.env.now(), after));
                },
            }
        }

        if responder.is_some() {
            warn!("request produced no response");
        }
    }

    fn reply(&mut self, responder: &mut Option<D::Responder>, response: Response) {
        let Some(responder) = responder.take() else {
            warn!("second response for one request dropped");
            return;
        };
        if let Err(err) = self.driver.respond(responder, response) {
            warn!(%err, "failed to deliver response");
        }
    }

    /// Run an open, handing each line to `sink` as it happens.
    fn open(
        &mut self,
        pin: &str,
        sequence: OpenSequence,
        mut sink: Option<&mut D::Responder>,
    ) -> Response {
        let seconds = sequence.seconds();
        let mut lines = Vec::new();
        let mut report = |line: String| {
            if let Some(sink) = sink.as_deref_mut() {
                sink.progress(&line);
            }
            lines.push(line);
        };

        let result = open::run(sequence, pin, self.driver.actuator(), &self.env, |step| {
            report(describe_step(step, seconds));
        });
        if let Err(err) = result {
            error!(pin, %err, "open failed");
            report(format!("Actuator failure: {err}"));
        }

        Response::Text(lines.join("\n"))
    }

    fn poll_updates(&mut self) {
        if !self.controller.update_enabled() {
            return;
        }

        let device = self.controller.secrets().device_name().to_string();
        match self.driver.updates().poll(&device) {
            Ok(UpdatePoll::Idle) => {},
            Ok(UpdatePoll::Installed) => {
                info!("firmware update installed");
                self.restart();
            },
            Err(err) => warn!(%err, "update channel failed"),
        }
    }

    fn check_restart(&mut self) {
        let Some((requested, after)) = self.restart_requested else {
            return;
        };
        if self.env.now() - requested >= after {
            self.restart();
        }
    }
}

/// Network phase of boot: release the actuator, join or go standalone, and
/// advertise the device name.
fn settle<D, E, M>(
    driver: &mut D,
    env: &E,
    store: &SecretStore<M>,
    join: &JoinConfig,
) -> NetworkIdentity
where
    D: Driver,
    E: Environment,
    M: Eeprom,
{
    let secrets = store.load();

    if let Err(err) = driver.actuator().drive(secrets.actuator_pin(), false) {
        error!(pin = secrets.actuator_pin(), %err, "failed to release actuator at boot");
    }

    let identity = network::join(secrets.network().as_ref(), join.clone(), driver.radio(), env);
    info!(?identity, "network settled");

    advertise(driver, secrets.device_name());
    identity
}

fn advertise<D: Driver>(driver: &mut D, name: &str) {
    match driver.advertiser().advertise(name) {
        Ok(()) => info!(%name, "advertising"),
        Err(err) => warn!(%name, %err, "failed to advertise"),
    }
}

#[cfg(test)]
mod tests {
    use std::{
        cell::{Cell, RefCell},
        collections::VecDeque,
        io,
        rc::Rc,
    };

    use safelock_core::{
        MemoryEeprom, NetworkCredentials, Params, PlatformError,
        platform::Radio,
    };

    use super::*;

    #[derive(Default)]
    struct Peripherals {
        drives: Vec<(String, bool)>,
        advertised: Vec<String>,
        associate: bool,
        stuck: bool,
    }

    impl Actuator for Peripherals {
        fn drive(&mut self, pin: &str, energized: bool) -> Result<(), PlatformError> {
            self.drives.push((pin.to_string(), energized));
            if energized && self.stuck {
                return Err(PlatformError(format!("pin {pin} stuck")));
            }
            Ok(())
        }
    }

    impl Radio for Peripherals {
        fn chip_id(&self) -> u32 {
            0x00C0_FFEE
        }

        fn associate(&mut self, _: &NetworkCredentials) -> Result<(), PlatformError> {
            Ok(())
        }

        fn is_associated(&mut self) -> bool {
            self.associate
        }

        fn host_standalone(&mut self, _: &str) -> Result<(), PlatformError> {
            Ok(())
        }
    }

    impl Advertiser for Peripherals {
        fn advertise(&mut self, name: &str) -> Result<(), PlatformError> {
            self.advertised.push(name.to_string());
            Ok(())
        }
    }

    impl UpdateChannel for Peripherals {
        fn poll(&mut self, _: &str) -> Result<UpdatePoll, PlatformError> {
            Ok(UpdatePoll::Idle)
        }
    }

    /// Records progress lines with the clock reading at delivery.
    struct Lines {
        clock: Rc<Cell<Duration>>,
        seen: Rc<RefCell<Vec<(Duration, String)>>>,
    }

    impl Progress for Lines {
        fn progress(&mut self, line: &str) {
            self.seen.borrow_mut().push((self.clock.get(), line.to_string()));
        }
    }

    #[derive(Default)]
    struct QueueDriver {
        requests: VecDeque<Request>,
        responses: Vec<Response>,
        peripherals: Peripherals,
        clock: Rc<Cell<Duration>>,
        progress: Rc<RefCell<Vec<(Duration, String)>>>,
    }

    impl Driver for QueueDriver {
        type Error = io::Error;
        type Responder = Lines;
        type Actuator = Peripherals;
        type Radio = Peripherals;
        type Advertiser = Peripherals;
        type Updates = Peripherals;

        fn poll_request(&mut self, _: Duration) -> Result<Option<(Request, Lines)>, io::Error> {
            let lines = Lines { clock: self.clock.clone(), seen: self.progress.clone() };
            Ok(self.requests.pop_front().map(|r| (r, lines)))
        }

        fn respond(&mut self, _: Lines, response: Response) -> Result<(), io::Error> {
            self.responses.push(response);
            Ok(())
        }

        fn actuator(&mut self) -> &mut Peripherals {
            &mut self.peripherals
        }

        fn radio(&mut self) -> &mut Peripherals {
            &mut self.peripherals
        }

        fn advertiser(&mut self) -> &mut Peripherals {
            &mut self.peripherals
        }

        fn updates(&mut self) -> &mut Peripherals {
            &mut self.peripherals
        }
    }

    /// Clock shared with the driver so progress lines carry a timestamp.
    #[derive(Default)]
    struct StepClock(Rc<Cell<Duration>>);

    impl Environment for StepClock {
        type Instant = Duration;

        fn now(&self) -> Duration {
            self.0.get()
        }

        fn sleep(&self, duration: Duration) {
            self.0.set(self.0.get() + duration);
        }
    }

    fn boot() -> Runtime<QueueDriver, StepClock, MemoryEeprom> {
        let driver = QueueDriver::default();
        let clock = StepClock(driver.clock.clone());
        Runtime::boot(driver, clock, MemoryEeprom::new(), RuntimeConfig::default())
    }

    /// Provision a blank device and restart it onto the network.
    fn joined() -> Runtime<QueueDriver, StepClock, MemoryEeprom> {
        let mut runtime = boot();
        runtime.driver_mut().peripherals.associate = true;

        let params = Params::new().with("ssid", "home").with("password", "pw");
        runtime.driver_mut().requests.push_back(Request::command(params));
        runtime.step().unwrap();
        runtime.restart();
        assert_eq!(runtime.network(), NetworkIdentity::Joined);
        runtime
    }

    #[test]
    fn step_descriptions() {
        assert_eq!(describe_step(OpenStep::Energize, 10), "Opening safe for 10 seconds");
        assert_eq!(describe_step(OpenStep::Hold { remaining: 3 }, 10), "3 seconds remaining");
        assert_eq!(describe_step(OpenStep::Release, 10), "Safe closed");
    }

    #[test]
    fn blank_device_boots_standalone_and_advertises_default_name() {
        let runtime = boot();
        assert_eq!(runtime.network(), NetworkIdentity::Standalone);
        assert_eq!(runtime.driver().peripherals.advertised, vec!["safe".to_string()]);
        assert_eq!(runtime.driver().peripherals.drives, vec![("5".to_string(), false)]);
    }

    #[test]
    fn idle_step_serves_nothing() {
        let mut runtime = boot();
        assert!(!runtime.step().unwrap());
        assert!(runtime.driver().responses.is_empty());
    }

    #[test]
    fn network_change_restarts_after_delay() {
        let mut runtime = boot();
        let params = Params::new().with("ssid", "home").with("password", "pw");
        runtime.driver_mut().requests.push_back(Request::command(params));
        runtime.driver_mut().peripherals.associate = true;

        assert!(runtime.step().unwrap());
        assert!(runtime.restart_pending());
        assert_eq!(runtime.boots(), 1);

        runtime.env().sleep(Duration::from_secs(5));
        runtime.step().unwrap();

        assert_eq!(runtime.boots(), 2);
        assert_eq!(runtime.network(), NetworkIdentity::Joined);
    }

    #[test]
    fn open_response_lists_every_step() {
        let mut runtime = joined();

        let start = runtime.env().now();
        let params = Params::new().with("open", "").with("duration", "2");
        runtime.driver_mut().requests.push_back(Request::command(params));
        runtime.step().unwrap();

        assert_eq!(
            runtime.driver().responses.last(),
            Some(&Response::Text(
                "Opening safe for 2 seconds\n2 seconds remaining\n1 seconds remaining\nSafe closed"
                    .to_string()
            ))
        );
        assert_eq!(runtime.env().now() - start, Duration::from_secs(2));
    }

    #[test]
    fn open_progress_is_delivered_as_it_happens() {
        let mut runtime = joined();

        let start = runtime.env().now();
        let params = Params::new().with("open", "").with("duration", "2");
        runtime.driver_mut().requests.push_back(Request::command(params));
        runtime.step().unwrap();

        let at = |secs| start + Duration::from_secs(secs);
        assert_eq!(*runtime.driver().progress.borrow(), vec![
            (at(0), "Opening safe for 2 seconds".to_string()),
            (at(0), "2 seconds remaining".to_string()),
            (at(1), "1 seconds remaining".to_string()),
            (at(2), "Safe closed".to_string()),
        ]);
    }

    #[test]
    fn failed_open_reports_the_failure_line() {
        let mut runtime = joined();
        runtime.driver_mut().peripherals.stuck = true;

        let params = Params::new().with("open", "");
        runtime.driver_mut().requests.push_back(Request::command(params));
        runtime.step().unwrap();

        let progress = runtime.driver().progress.borrow();
        assert_eq!(progress.len(), 1);
        assert!(progress[0].1.starts_with("Actuator failure"));
    }
}
