//! MQTTによる追跡のオン/オフ制御
//!
//! リスナースレッドは [`TrackingFlag`] を書き換えるだけで、制御ループはフレームごとに1回読む。

use anyhow::{Context, Result};
use rumqttc::{Client, Connection, Event, MqttOptions, Packet, QoS};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::config::MqttConfig;

/// この回数のフレームごとに状態を配信する
pub const STATE_PUBLISH_INTERVAL: u32 = 20;

const STOP_WAIT: Duration = Duration::from_millis(500);

/// 制御ループとリスナースレッドで共有する追跡フラグ
#[derive(Debug, Clone)]
pub struct TrackingFlag(Arc<AtomicBool>);

impl TrackingFlag {
    pub fn new(enabled: bool) -> Self {
        Self(Arc::new(AtomicBool::new(enabled)))
    }

    pub fn is_enabled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn set(&self, enabled: bool) {
        self.0.store(enabled, Ordering::Release);
    }

    /// 反転して新しい値を返す
    pub fn toggle(&self) -> bool {
        !self.0.fetch_xor(true, Ordering::AcqRel)
    }
}

pub fn state_str(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    State,
    On,
    Off,
    Toggle,
}

impl ControlCommand {
    /// 前方一致で解釈する（"control on\n" なども受け付ける）
    pub fn parse(payload: &str) -> Option<Self> {
        let payload = payload.trim_start();
        if payload.starts_with("control state") {
            Some(Self::State)
        } else if payload.starts_with("control on") {
            Some(Self::On)
        } else if payload.starts_with("control off") {
            Some(Self::Off)
        } else if payload.starts_with("control toggle") {
            Some(Self::Toggle)
        } else {
            None
        }
    }
}

/// 追跡状態 ("on" / "off") の配信先
pub trait StatePublisher {
    fn publish_state(&mut self, enabled: bool) -> Result<()>;
}

/// 受信したコマンドをフラグに反映し、結果の状態を配信する
pub struct RemoteControl<P> {
    flag: TrackingFlag,
    publisher: P,
}

impl<P: StatePublisher> RemoteControl<P> {
    pub fn new(flag: TrackingFlag, publisher: P) -> Self {
        Self { flag, publisher }
    }

    pub fn handle(&mut self, payload: &str) -> Option<ControlCommand> {
        let command = ControlCommand::parse(payload)?;
        match command {
            ControlCommand::State => {}
            ControlCommand::On => self.flag.set(true),
            ControlCommand::Off => self.flag.set(false),
            ControlCommand::Toggle => {
                self.flag.toggle();
            }
        }
        self.publish();
        Some(command)
    }

    pub fn publish(&mut self) {
        let enabled = self.flag.is_enabled();
        if let Err(e) = self.publisher.publish_state(enabled) {
            tracing::warn!("Failed to publish state: {:#}", e);
        }
    }
}

/// 制御ループ側で一定フレームごとに状態を配信する
pub struct StateHeartbeat<P> {
    publisher: P,
    interval: u32,
    count: u32,
}

impl<P: StatePublisher> StateHeartbeat<P> {
    pub fn new(publisher: P) -> Self {
        Self::with_interval(publisher, STATE_PUBLISH_INTERVAL)
    }

    pub fn with_interval(publisher: P, interval: u32) -> Self {
        Self {
            publisher,
            interval: interval.max(1),
            count: 0,
        }
    }

    /// 1フレーム進める。配信したらtrue
    pub fn tick(&mut self, enabled: bool) -> bool {
        self.count += 1;
        if self.count < self.interval {
            return false;
        }
        self.count = 0;
        if let Err(e) = self.publisher.publish_state(enabled) {
            tracing::warn!("Failed to publish state: {:#}", e);
        }
        true
    }

    pub fn publish_now(&mut self, enabled: bool) -> Result<()> {
        self.publisher.publish_state(enabled)
    }
}

/// 制御メッセージの受信側（終了時に止める）
pub trait ControlBus {
    fn stop(self) -> Result<()>;
}

/// MQTTの状態トピックへの配信
///
/// 制御ループを止めないよう、送信キューが詰まっていたらエラーを返して捨てる。
#[derive(Clone)]
pub struct MqttPublisher {
    client: Client,
    topic: String,
}

impl MqttPublisher {
    pub fn new(client: Client, topic: String) -> Self {
        Self { client, topic }
    }
}

impl StatePublisher for MqttPublisher {
    fn publish_state(&mut self, enabled: bool) -> Result<()> {
        self.client
            .try_publish(self.topic.as_str(), QoS::AtLeastOnce, false, state_str(enabled))
            .with_context(|| format!("Failed to publish to {}", self.topic))?;
        Ok(())
    }
}

/// MQTTの購読スレッド
pub struct MqttBus {
    client: Client,
    publisher: MqttPublisher,
    running: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl MqttBus {
    pub fn start(config: &MqttConfig, flag: TrackingFlag) -> Result<Self> {
        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options.set_keep_alive(Duration::from_secs(5));
        let (client, connection) = Client::new(options, 10);

        let publisher = MqttPublisher::new(client.clone(), config.state_topic.clone());
        let running = Arc::new(AtomicBool::new(true));

        let listener = Listener {
            client: client.clone(),
            control_topic: config.control_topic.clone(),
            control: RemoteControl::new(flag, publisher.clone()),
            running: Arc::clone(&running),
        };
        let handle = thread::Builder::new()
            .name("mqtt".to_string())
            .spawn(move || listener.run(connection))
            .context("Failed to spawn MQTT thread")?;

        tracing::info!("MQTT connecting to {}:{}", config.host, config.port);
        Ok(Self {
            client,
            publisher,
            running,
            handle: Some(handle),
        })
    }

    pub fn publisher(&self) -> MqttPublisher {
        self.publisher.clone()
    }
}

impl ControlBus for MqttBus {
    /// 切断してスレッドを止める。応答がなければ待たずに切り離す
    fn stop(mut self) -> Result<()> {
        self.running.store(false, Ordering::Release);
        let result = self
            .client
            .try_disconnect()
            .context("Failed to request MQTT disconnect");

        if let Some(handle) = self.handle.take() {
            let deadline = Instant::now() + STOP_WAIT;
            while !handle.is_finished() && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(10));
            }
            if handle.is_finished() {
                let _ = handle.join();
            } else {
                tracing::warn!("MQTT thread did not stop in time; detaching");
            }
        }

        result?;
        Ok(())
    }
}

struct Listener {
    client: Client,
    control_topic: String,
    control: RemoteControl<MqttPublisher>,
    running: Arc<AtomicBool>,
}

impl Listener {
    fn run(mut self, mut connection: Connection) {
        for event in connection.iter() {
            if !self.running.load(Ordering::Acquire) {
                break;
            }
            match event {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    tracing::info!("MQTT connected");
                    // 再接続時も購読し直して現在の状態を知らせる
                    if let Err(e) = self
                        .client
                        .try_subscribe(self.control_topic.as_str(), QoS::AtMostOnce)
                    {
                        tracing::warn!("Failed to subscribe {}: {}", self.control_topic, e);
                    }
                    self.control.publish();
                }
                Ok(Event::Incoming(Packet::Publish(p))) if p.topic == self.control_topic => {
                    let payload = String::from_utf8_lossy(&p.payload);
                    tracing::info!("Control message: {}", payload.trim());
                    if self.control.handle(&payload).is_none() {
                        tracing::warn!("Unknown control message: {}", payload.trim());
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    if !self.running.load(Ordering::Acquire) {
                        break;
                    }
                    tracing::warn!("MQTT connection error: {}", e);
                    thread::sleep(Duration::from_secs(1));
                }
            }
        }
        tracing::debug!("MQTT listener stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingPublisher {
        published: Vec<bool>,
    }

    impl StatePublisher for &mut RecordingPublisher {
        fn publish_state(&mut self, enabled: bool) -> Result<()> {
            self.published.push(enabled);
            Ok(())
        }
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(ControlCommand::parse("control state"), Some(ControlCommand::State));
        assert_eq!(ControlCommand::parse("control on"), Some(ControlCommand::On));
        assert_eq!(ControlCommand::parse("control off\n"), Some(ControlCommand::Off));
        assert_eq!(ControlCommand::parse("control toggle"), Some(ControlCommand::Toggle));
        assert_eq!(ControlCommand::parse("control"), None);
        assert_eq!(ControlCommand::parse("zoom in"), None);
    }

    #[test]
    fn test_flag_toggle() {
        let flag = TrackingFlag::new(false);
        assert!(flag.toggle());
        assert!(flag.is_enabled());
        assert!(!flag.toggle());
        assert!(!flag.is_enabled());
    }

    #[test]
    fn test_flag_shared_between_clones() {
        let flag = TrackingFlag::new(true);
        let other = flag.clone();
        let handle = thread::spawn(move || other.set(false));
        handle.join().unwrap();
        assert!(!flag.is_enabled());
    }

    #[test]
    fn test_double_toggle_restores_and_publishes_twice() {
        let flag = TrackingFlag::new(true);
        let mut publisher = RecordingPublisher::default();
        {
            let mut control = RemoteControl::new(flag.clone(), &mut publisher);
            control.handle("control toggle");
            control.handle("control toggle");
        }
        assert!(flag.is_enabled());
        assert_eq!(publisher.published, vec![false, true]);
    }

    #[test]
    fn test_on_off_state() {
        let flag = TrackingFlag::new(false);
        let mut publisher = RecordingPublisher::default();
        {
            let mut control = RemoteControl::new(flag.clone(), &mut publisher);
            assert_eq!(control.handle("control on"), Some(ControlCommand::On));
            assert!(flag.is_enabled());
            assert_eq!(control.handle("control state"), Some(ControlCommand::State));
            assert_eq!(control.handle("control off"), Some(ControlCommand::Off));
            assert!(!flag.is_enabled());
            assert_eq!(control.handle("bogus"), None);
        }
        assert_eq!(publisher.published, vec![true, true, false]);
    }

    #[test]
    fn test_heartbeat_every_twenty_frames() {
        let mut publisher = RecordingPublisher::default();
        {
            let mut heartbeat = StateHeartbeat::new(&mut publisher);
            let fired: Vec<bool> = (0..45).map(|_| heartbeat.tick(true)).collect();
            assert_eq!(fired.iter().filter(|f| **f).count(), 2);
            assert!(fired[19]);
            assert!(fired[39]);
        }
        assert_eq!(publisher.published, vec![true, true]);
    }

    #[test]
    fn test_state_str() {
        assert_eq!(state_str(true), "on");
        assert_eq!(state_str(false), "off");
    }
}
