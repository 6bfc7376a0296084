use std::{
    future::{self, Future},
    sync::{Arc, Mutex},
    time::Duration,
};

use rexevo_engine::{
    Action, AgentGeometry, DriverConfig, DriverError, Environment, EnvironmentError, GameDriver,
    Key, KeyInput, RawObservation, RawObstacle, SessionState, SimConfig, SimulatedRunner,
};
use tokio::time::sleep;

#[derive(Debug, Default)]
struct Script {
    crashed: bool,
    unavailable: bool,
    obstacle_x: Option<f64>,
    sent: Vec<KeyInput>,
}

/// Environment whose state is driven by the test body.
///
/// A Start press un-crashes the game, like the real one.
#[derive(Debug, Clone, Default)]
struct ScriptedEnv(Arc<Mutex<Script>>);

impl ScriptedEnv {
    fn crashed(crashed: bool) -> Self {
        let env = Self::default();
        env.set_crashed(crashed);
        env
    }

    fn set_crashed(&self, crashed: bool) {
        self.0.lock().unwrap().crashed = crashed;
    }

    fn set_unavailable(&self, unavailable: bool) {
        self.0.lock().unwrap().unavailable = unavailable;
    }

    fn set_obstacle(&self, x: Option<f64>) {
        self.0.lock().unwrap().obstacle_x = x;
    }

    fn count(&self, input: KeyInput) -> usize {
        self.0
            .lock()
            .unwrap()
            .sent
            .iter()
            .filter(|i| **i == input)
            .count()
    }
}

impl Environment for ScriptedEnv {
    fn observe(&mut self) -> impl Future<Output = Result<RawObservation, EnvironmentError>> + Send {
        let script = self.0.lock().unwrap();
        if script.unavailable {
            return future::ready(Err(EnvironmentError::Unavailable));
        }
        let obstacles = script
            .obstacle_x
            .map(|x| RawObstacle {
                x,
                y: 105.0,
                width: 25.0,
                height: 35.0,
            })
            .into_iter()
            .collect();
        future::ready(Ok(RawObservation {
            crashed: script.crashed,
            speed: 6.0,
            canvas_width: 600.0,
            agent: AgentGeometry {
                x: 50.0,
                y: 93.0,
                width: 44.0,
                height: 47.0,
            },
            obstacles,
        }))
    }

    fn send(&mut self, input: KeyInput) -> impl Future<Output = Result<(), EnvironmentError>> + Send {
        let mut script = self.0.lock().unwrap();
        if input == KeyInput::Press(Key::Start) {
            script.crashed = false;
        }
        script.sent.push(input);
        future::ready(Ok(()))
    }
}

#[tokio::test(start_paused = true)]
async fn test_session_scores_passed_obstacles() {
    let env = ScriptedEnv::crashed(true);
    let driver = GameDriver::connect(env.clone(), DriverConfig::default())
        .await
        .unwrap();
    let (handle, _task) = driver.spawn();

    let mut lease = handle.start_session().await.unwrap();
    lease.started().await.unwrap();
    assert_eq!(env.count(KeyInput::Press(Key::Start)), 1);
    // NORM is issued on session start
    assert_eq!(env.count(KeyInput::Release(Key::Down)), 1);

    env.set_obstacle(Some(150.0));
    sleep(Duration::from_millis(100)).await;
    env.set_obstacle(None);
    sleep(Duration::from_millis(100)).await;

    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.state, SessionState::Playing);
    assert_eq!(snapshot.points, 1);

    env.set_crashed(true);
    let mut frames = Vec::new();
    while let Some(frame) = lease.next_frame().await {
        frames.push(frame);
    }
    assert_eq!(lease.finish().await.unwrap(), 1);

    assert!(frames.iter().any(|f| f.distance < 0.5));
    assert_eq!(frames.iter().filter(|f| f.passed_obstacle()).count(), 1);
    for pair in frames.windows(2) {
        assert_eq!(pair[1].last_value, pair[0].distance);
    }
}

#[tokio::test(start_paused = true)]
async fn test_second_session_request_is_busy() {
    let env = ScriptedEnv::crashed(true);
    let driver = GameDriver::connect(env, DriverConfig::default())
        .await
        .unwrap();
    let (handle, _task) = driver.spawn();

    let _lease = handle.start_session().await.unwrap();
    let err = handle.start_session().await.unwrap_err();
    assert!(matches!(err, DriverError::SessionBusy));
}

#[tokio::test(start_paused = true)]
async fn test_actions_ignored_while_over() {
    let env = ScriptedEnv::crashed(true);
    let driver = GameDriver::connect(env.clone(), DriverConfig::default())
        .await
        .unwrap();
    let (handle, _task) = driver.spawn();
    sleep(Duration::from_millis(300)).await;

    handle.issue(Action::Jump).unwrap();
    handle.issue(Action::Down).unwrap();
    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.state, SessionState::Over);
    assert_eq!(snapshot.last_action, None);
    assert_eq!(env.count(KeyInput::Hold(Key::Up)), 0);
    assert_eq!(env.count(KeyInput::Hold(Key::Down)), 0);
}

#[tokio::test(start_paused = true)]
async fn test_jump_is_released_after_hold() {
    let env = ScriptedEnv::crashed(true);
    let driver = GameDriver::connect(env.clone(), DriverConfig::default())
        .await
        .unwrap();
    let (handle, _task) = driver.spawn();
    let mut lease = handle.start_session().await.unwrap();
    lease.started().await.unwrap();

    let releases = env.count(KeyInput::Release(Key::Up));
    handle.issue(Action::Jump).unwrap();
    handle.snapshot().await.unwrap();
    assert_eq!(env.count(KeyInput::Hold(Key::Up)), 1);
    assert_eq!(env.count(KeyInput::Release(Key::Up)), releases);

    // inside the refractory window
    handle.issue(Action::Jump).unwrap();
    handle.snapshot().await.unwrap();
    assert_eq!(env.count(KeyInput::Hold(Key::Up)), 1);

    sleep(Duration::from_millis(250)).await;
    assert_eq!(env.count(KeyInput::Release(Key::Up)), releases + 1);
}

#[tokio::test(start_paused = true)]
async fn test_request_while_playing_waits_for_game_end() {
    let env = ScriptedEnv::crashed(false);
    let driver = GameDriver::connect(env.clone(), DriverConfig::default())
        .await
        .unwrap();
    let (handle, _task) = driver.spawn();
    sleep(Duration::from_millis(300)).await;
    assert_eq!(
        handle.snapshot().await.unwrap().state,
        SessionState::Playing
    );

    let mut lease = handle.start_session().await.unwrap();
    sleep(Duration::from_millis(500)).await;
    assert_eq!(env.count(KeyInput::Press(Key::Start)), 0);

    env.set_crashed(true);
    lease.started().await.unwrap();
    assert_eq!(env.count(KeyInput::Press(Key::Start)), 1);
}

#[tokio::test(start_paused = true)]
async fn test_unavailable_game_causes_no_transition() {
    let env = ScriptedEnv::crashed(true);
    let driver = GameDriver::connect(env.clone(), DriverConfig::default())
        .await
        .unwrap();
    let (handle, _task) = driver.spawn();
    let mut lease = handle.start_session().await.unwrap();
    lease.started().await.unwrap();

    env.set_unavailable(true);
    env.set_crashed(true);
    sleep(Duration::from_secs(1)).await;
    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.state, SessionState::Playing);
    assert_eq!(snapshot.points, 0);

    env.set_unavailable(false);
    assert_eq!(lease.finish().await.unwrap(), 0);
    assert_eq!(handle.snapshot().await.unwrap().state, SessionState::Over);
}

#[tokio::test(start_paused = true)]
async fn test_zero_interval_is_rejected() {
    for config in [
        DriverConfig {
            sensor_interval: Duration::ZERO,
            ..DriverConfig::default()
        },
        DriverConfig {
            restart_interval: Duration::ZERO,
            ..DriverConfig::default()
        },
    ] {
        let err = GameDriver::connect(ScriptedEnv::default(), config)
            .await
            .unwrap_err();
        assert!(matches!(err, DriverError::ZeroInterval(_)));
    }
    assert!(DriverConfig::default().validate().is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_dropping_handles_stops_driver() {
    let driver = GameDriver::connect(ScriptedEnv::default(), DriverConfig::default())
        .await
        .unwrap();
    let (handle, task) = driver.spawn();
    drop(handle);
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_idle_runner_session_ends() {
    let sim = SimulatedRunner::new(SimConfig::default());
    let driver = GameDriver::connect(sim, DriverConfig::default())
        .await
        .unwrap();
    let (handle, _task) = driver.spawn();

    let mut lease = handle.start_session().await.unwrap();
    lease.started().await.unwrap();
    while lease.next_frame().await.is_some() {}
    let points = lease.finish().await.unwrap();
    assert_eq!(points, 0);
    assert_eq!(handle.snapshot().await.unwrap().state, SessionState::Over);
}
