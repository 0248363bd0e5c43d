use std::future;
use std::time::Duration;

use derive_getters::Getters;
use derive_new::new;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;
use tokio::time::Instant;
use tokio::time::Interval;
use tokio::time::MissedTickBehavior;

use crate::config::Config;
use crate::coordinates::AxisPolicy;
use crate::coordinates::CoordinateMapper;
use crate::engine::AddPointOutcome;
use crate::engine::EngineSnapshot;
use crate::engine::RegressionEngine;
use crate::engine::StepOutcome;
use crate::error::SessionError;
use crate::parameters::ParameterId;
use crate::parameters::ParameterValue;
use crate::schema::DataPoint;
use crate::schema::DisplayPoint;
use crate::schema::DisplaySize;

/// The rendering surface a session maps touches from.
#[derive(Clone, Copy, PartialEq, Debug, new)]
pub struct Surface {
    pub size: DisplaySize,
    pub padding: f64,
    pub axis: AxisPolicy,
}

impl Surface {
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.surface.size(), config.surface.padding, config.axis)
    }

    pub fn mapper<'a>(
        &self,
        points: impl IntoIterator<Item = &'a DataPoint> + Clone,
    ) -> CoordinateMapper {
        CoordinateMapper::for_points(self.size, self.padding, &self.axis, points)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TouchPhase {
    Start,
    Move,
}

#[derive(Debug)]
pub enum SessionCommand {
    Play,
    Pause,
    Reset,
    Step,
    SetSpeed(f64),
    SetParameter(ParameterId, ParameterValue),
    Touch(TouchPhase, DisplayPoint),
    Resize(DisplaySize),
}

/// What a renderer draws: the engine state plus the mapper that places it.
#[derive(Clone, Debug, Getters)]
pub struct SessionState {
    engine: EngineSnapshot,
    mapper: CoordinateMapper,
}

/// Handle to a task that owns one [`RegressionEngine`] and steps it while playing.
///
/// Dropping the handle stops the task.
pub struct Session {
    task: JoinHandle<()>,
    command_sender: mpsc::UnboundedSender<SessionCommand>,
    state_receiver: watch::Receiver<SessionState>,
}

impl Session {
    /// Must be called from within a tokio runtime.
    pub fn spawn(engine: RegressionEngine, surface: Surface) -> Self {
        let (command_sender, command_receiver) = mpsc::unbounded_channel();
        let (state_sender, state_receiver) = watch::channel(SessionState {
            engine: engine.snapshot(),
            mapper: surface.mapper(engine.points()),
        });
        let task = SessionTask {
            engine,
            surface,
            command_receiver,
            state_sender,
            ticker: None,
        };
        Session {
            task: tokio::spawn(task.run()),
            command_sender,
            state_receiver,
        }
    }

    pub fn send(&self, command: SessionCommand) -> Result<(), SessionError> {
        Ok(self.command_sender.send(command)?)
    }

    pub fn play(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::Play)
    }

    pub fn pause(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::Pause)
    }

    pub fn reset(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::Reset)
    }

    pub fn step(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::Step)
    }

    pub fn set_speed(&self, multiplier: f64) -> Result<(), SessionError> {
        self.send(SessionCommand::SetSpeed(multiplier))
    }

    pub fn set_parameter(
        &self,
        id: &str,
        value: impl Into<ParameterValue>,
    ) -> Result<(), SessionError> {
        let id = id.parse()?;
        self.send(SessionCommand::SetParameter(id, value.into()))
    }

    pub fn add_point(&self, position: DisplayPoint) -> Result<(), SessionError> {
        self.send(SessionCommand::Touch(TouchPhase::Start, position))
    }

    pub fn draw_move(&self, position: DisplayPoint) -> Result<(), SessionError> {
        self.send(SessionCommand::Touch(TouchPhase::Move, position))
    }

    pub fn resize(&self, size: DisplaySize) -> Result<(), SessionError> {
        self.send(SessionCommand::Resize(size))
    }

    /// The most recently published state.
    pub fn state(&self) -> SessionState {
        self.state_receiver.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_receiver.clone()
    }

    /// Stops the task after it has processed every command already sent.
    pub async fn shutdown(self) {
        drop(self.command_sender);
        if let Err(e) = self.task.await {
            log::warn!("Session task ended abnormally: {}", e);
        }
    }
}

struct Ticker {
    period: Duration,
    interval: Interval,
}

impl Ticker {
    fn new(period: Duration) -> Self {
        let mut interval = time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { period, interval }
    }
}

async fn next_tick(ticker: &mut Option<Ticker>) {
    match ticker {
        Some(ticker) => {
            ticker.interval.tick().await;
        }
        None => future::pending().await,
    }
}

struct SessionTask {
    engine: RegressionEngine,
    surface: Surface,
    command_receiver: mpsc::UnboundedReceiver<SessionCommand>,
    state_sender: watch::Sender<SessionState>,
    ticker: Option<Ticker>,
}

impl SessionTask {
    async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.command_receiver.recv() => match command {
                    Some(command) => self.process_command(command),
                    None => break,
                },
                _ = next_tick(&mut self.ticker) => self.on_tick(),
            }
            self.refresh_ticker();
            self.publish();
        }
        log::debug!("Session stopped at step {}", self.engine.current_step());
    }

    fn process_command(&mut self, command: SessionCommand) {
        use SessionCommand::*;
        match command {
            Play => self.engine.play(),
            Pause => self.engine.pause(),
            Reset => self.engine.reset(),
            Step => {
                self.engine.step();
            }
            SetSpeed(multiplier) => self.engine.set_speed(multiplier),
            SetParameter(id, value) => {
                if let Err(e) = self.engine.set_parameter(id, value) {
                    log::warn!("{}", e);
                }
            }
            Touch(phase, position) => self.touch(phase, position),
            Resize(size) => self.surface.size = size,
        }
    }

    fn touch(&mut self, phase: TouchPhase, position: DisplayPoint) {
        let mapper = self.surface.mapper(self.engine.points());
        if !mapper.is_inside_drawable_area(&position) {
            log::trace!("Ignored {:?} touch at {} outside the plot", phase, position);
            return;
        }
        let point = mapper.to_data(&position);
        if let AddPointOutcome::Added(point) =
            self.engine.add_point(point, Instant::now().into_std())
        {
            log::debug!("Added point {} from {:?} touch", point, phase);
        }
    }

    fn on_tick(&mut self) {
        // A tick can still fire after playback stopped.
        if self.engine.tick_period().is_none() {
            return;
        }
        if self.engine.step() == StepOutcome::Finished {
            log::debug!("Auto-play finished");
        }
    }

    fn refresh_ticker(&mut self) {
        match (self.engine.tick_period(), &self.ticker) {
            (Some(period), Some(ticker)) if ticker.period == period => {}
            (Some(period), _) => {
                log::debug!("Ticking every {:?}", period);
                self.ticker = Some(Ticker::new(period));
            }
            (None, Some(_)) => {
                log::debug!("Stopped ticking");
                self.ticker = None;
            }
            (None, None) => {}
        }
    }

    fn publish(&self) {
        let mapper = self.surface.mapper(self.engine.points());
        self.state_sender.send_replace(SessionState {
            engine: self.engine.snapshot(),
            mapper,
        });
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use tokio::time::sleep;

    use super::Session;
    use super::Surface;
    use crate::coordinates::AxisPolicy;
    use crate::coordinates::CoordinateMapper;
    use crate::engine::EngineSettings;
    use crate::engine::RegressionEngine;
    use crate::error::ParameterError;
    use crate::error::SessionError;
    use crate::schema::DataPoint;
    use crate::schema::DisplayPoint;
    use crate::schema::DisplaySize;

    fn surface() -> Surface {
        Surface::new(DisplaySize::new(220.0, 220.0), 10.0, AxisPolicy::default())
    }

    /// A session with noise disabled and two points on `y = x + 1`.
    async fn session_with_points() -> Session {
        session_with_points_on(surface(), EngineSettings::default()).await
    }

    async fn session_with_points_on(surface: Surface, settings: EngineSettings) -> Session {
        let _ = env_logger::builder().is_test(true).try_init();
        let engine = RegressionEngine::new(EngineSettings {
            seed: Some(3),
            ..settings
        });
        let session = Session::spawn(engine, surface);
        session.set_parameter("noise", 0.0).unwrap();
        // (0, 1) and (2, 3) in data space.
        session.add_point(DisplayPoint::new(110.0, 90.0)).unwrap();
        sleep(Duration::from_millis(100)).await;
        session.draw_move(DisplayPoint::new(150.0, 50.0)).unwrap();
        settle().await;
        session
    }

    async fn settle() {
        sleep(Duration::from_millis(1)).await;
    }

    fn assert_near(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{} != {}", a, b);
    }

    #[tokio::test(start_paused = true)]
    async fn touches_become_data_points() {
        let session = session_with_points().await;
        let state = session.state();
        let points = state.engine().points().iter().copied().collect::<Vec<_>>();
        assert_eq!(points.len(), 2);
        for (got, expected) in points.iter().zip([(0.0, 1.0), (2.0, 3.0)]) {
            assert_near(got.x, expected.0);
            assert_near(got.y, expected.1);
        }
        // Renderer maps the stored points back to where they were touched.
        let display = state.mapper().to_display(&points[1]);
        assert_near(display.x, 150.0);
        assert_near(display.y, 50.0);
    }

    #[tokio::test(start_paused = true)]
    async fn touches_outside_plot_are_ignored() {
        let session = session_with_points().await;
        sleep(Duration::from_millis(100)).await;
        session.add_point(DisplayPoint::new(5.0, 100.0)).unwrap();
        session.add_point(DisplayPoint::new(100.0, 215.0)).unwrap();
        settle().await;
        assert_eq!(session.state().engine().points().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_drag_is_throttled() {
        let session = session_with_points().await;
        sleep(Duration::from_millis(100)).await;
        session.draw_move(DisplayPoint::new(60.0, 60.0)).unwrap();
        session.draw_move(DisplayPoint::new(61.0, 61.0)).unwrap();
        settle().await;
        assert_eq!(session.state().engine().points().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn playing_steps_at_tick_rate() {
        let session = session_with_points().await;
        session.play().unwrap();
        sleep(Duration::from_millis(1000)).await;
        let fit = *session.state().engine().fit_state();
        assert!(fit.is_playing);
        assert!((28..=30).contains(&fit.current_step), "{}", fit.current_step);

        session.set_speed(2.0).unwrap();
        settle().await;
        let before = session.state().engine().fit_state().current_step;
        sleep(Duration::from_millis(500)).await;
        let after = session.state().engine().fit_state().current_step;
        assert!((28..=31).contains(&(after - before)), "{}", after - before);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_cancels_ticks() {
        let session = session_with_points().await;
        session.play().unwrap();
        sleep(Duration::from_millis(300)).await;
        session.pause().unwrap();
        settle().await;
        let paused_at = session.state().engine().fit_state().current_step;
        assert!(paused_at > 0);
        sleep(Duration::from_millis(1000)).await;
        let fit = *session.state().engine().fit_state();
        assert!(!fit.is_playing);
        assert_eq!(fit.current_step, paused_at);
    }

    #[tokio::test(start_paused = true)]
    async fn playback_stops_at_iteration_cap() {
        let session = session_with_points().await;
        session.set_parameter("iterations", 10.0).unwrap();
        session.play().unwrap();
        sleep(Duration::from_secs(2)).await;
        let state = session.state();
        assert!(!state.engine().fit_state().is_playing);
        assert_eq!(state.engine().fit_state().current_step, 10);
        assert_eq!(state.engine().loss_history().len(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn manual_step_and_reset() {
        let session = session_with_points().await;
        session.step().unwrap();
        session.step().unwrap();
        settle().await;
        let state = session.state();
        assert_eq!(state.engine().fit_state().current_step, 2);
        assert!(state.engine().prediction_line().is_some());
        session.reset().unwrap();
        settle().await;
        assert_eq!(session.state().engine().fit_state().current_step, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn subscribers_see_changes() {
        let session = session_with_points().await;
        let mut receiver = session.subscribe();
        receiver.borrow_and_update();
        session.play().unwrap();
        receiver.changed().await.unwrap();
        assert!(receiver.borrow().engine().fit_state().is_playing);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_parameter_is_rejected() {
        let session = session_with_points().await;
        let err = session.set_parameter("momentum", 0.9).unwrap_err();
        assert!(matches!(
            err,
            SessionError::Parameter(ParameterError::UnknownId(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn resize_changes_mapping() {
        let session = session_with_points().await;
        session.resize(DisplaySize::new(420.0, 220.0)).unwrap();
        settle().await;
        let mapper = *session.state().mapper();
        assert_eq!(mapper.size(), DisplaySize::new(420.0, 220.0));
        assert_eq!(
            mapper.to_display(&DataPoint::new(0.0, 0.0)),
            DisplayPoint::new(210.0, 110.0)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_finishes_task() {
        let session = session_with_points().await;
        session.play().unwrap();
        session.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_handle_stops_task() {
        let session = session_with_points().await;
        let mut receiver = session.subscribe();
        receiver.borrow_and_update();
        drop(session);
        assert!(receiver.changed().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn extreme_tick_rates_keep_session_alive() {
        for base_tick_hz in [1e12, 1e-20] {
            let settings = EngineSettings {
                base_tick_hz,
                ..EngineSettings::default()
            };
            let session = session_with_points_on(surface(), settings).await;
            session.play().unwrap();
            sleep(Duration::from_millis(50)).await;
            session.pause().unwrap();
            settle().await;
            let paused_at = session.state().engine().fit_state().current_step;
            if base_tick_hz > 1.0 {
                assert!(paused_at > 0, "no ticks at {} Hz", base_tick_hz);
            } else {
                assert_eq!(paused_at, 0);
            }

            session.step().unwrap();
            settle().await;
            let fit = *session.state().engine().fit_state();
            assert_eq!(fit.current_step, paused_at + 1, "at {} Hz", base_tick_hz);
            session.shutdown().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn touches_follow_fitted_axes() {
        let surface = Surface::new(DisplaySize::new(220.0, 220.0), 10.0, AxisPolicy::FitData);
        let session = session_with_points_on(surface, EngineSettings::default()).await;
        let state = session.state();
        let points = state.engine().points().iter().copied().collect::<Vec<_>>();
        assert_eq!(points.len(), 2);
        // The first touch maps through the default range, since there is no data yet.
        assert_near(points[0].x, 0.0);
        assert_near(points[0].y, 1.0);
        // The second maps through the range fitted around the first point alone.
        let fitted = CoordinateMapper::for_points(
            surface.size,
            surface.padding,
            &AxisPolicy::FitData,
            &points[..1],
        );
        let expected = fitted.to_data(&DisplayPoint::new(150.0, 50.0));
        assert_near(expected.x, 0.04);
        assert_near(expected.y, 1.06);
        assert_near(points[1].x, expected.x);
        assert_near(points[1].y, expected.y);
        // The published mapper refits around both points.
        assert_eq!(*state.mapper(), surface.mapper(&points));
    }
}
