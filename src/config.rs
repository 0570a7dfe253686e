use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::tracker::SpeedRange;
use crate::visca::{PAN_SPEED_MAX, VISCA_DEFAULT_PORT};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub mqtt: MqttConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub pose: PoseConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub debug: DebugConfig,
}

/// 制御対象カメラ (VISCA over IP)
#[derive(Debug, Deserialize, Clone)]
pub struct CameraConfig {
    /// カメラのホスト名またはIP
    #[serde(default)]
    pub addr: String,
    #[serde(default = "default_camera_port")]
    pub port: u16,
    /// 送信タイムアウト（ミリ秒）
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_camera_port() -> u16 { VISCA_DEFAULT_PORT }
fn default_timeout_ms() -> u64 { 100 }

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            addr: String::new(),
            port: default_camera_port(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl CameraConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// MQTTによるリモート制御
#[derive(Debug, Deserialize, Clone)]
pub struct MqttConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_mqtt_host")]
    pub host: String,
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    /// 制御コマンドを受け付けるトピック
    #[serde(default = "default_control_topic")]
    pub control_topic: String,
    /// 追跡状態 ("on" / "off") を配信するトピック
    #[serde(default = "default_state_topic")]
    pub state_topic: String,
}

fn default_mqtt_host() -> String { "127.0.0.1".to_string() }
fn default_mqtt_port() -> u16 { 1883 }
fn default_client_id() -> String { "PTZTrack".to_string() }
fn default_control_topic() -> String { "PTZ_SETSTATE".to_string() }
fn default_state_topic() -> String { "PTZ_STATE".to_string() }

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: default_mqtt_host(),
            port: default_mqtt_port(),
            client_id: default_client_id(),
            control_topic: default_control_topic(),
            state_topic: default_state_topic(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TrackingConfig {
    /// MQTT有効時、起動直後から追跡するか（MQTT無効なら常に追跡）
    #[serde(default)]
    pub enabled_on_start: bool,
    /// 目標領域の左右端（フレーム幅に対する比率）
    #[serde(default = "default_boundary")]
    pub boundary: f32,
    #[serde(default = "default_speed_min")]
    pub speed_min: u8,
    #[serde(default = "default_speed_max")]
    pub speed_max: u8,
}

fn default_boundary() -> f32 { 0.35 }
fn default_speed_min() -> u8 { 1 }
fn default_speed_max() -> u8 { 12 }

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            enabled_on_start: false,
            boundary: default_boundary(),
            speed_min: default_speed_min(),
            speed_max: default_speed_max(),
        }
    }
}

impl TrackingConfig {
    pub fn speeds(&self) -> SpeedRange {
        SpeedRange::new(self.speed_min, self.speed_max)
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// ローカルのキャプチャデバイス
    #[default]
    Device,
    /// RTSP/HTTP などのネットワークストリーム
    Stream,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SourceConfig {
    #[serde(default)]
    pub kind: SourceKind,
    #[serde(default)]
    pub device: i32,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PoseConfig {
    #[serde(default = "default_model_path")]
    pub model_path: String,
    /// モデル入力の一辺（32の倍数）
    #[serde(default = "default_input_size")]
    pub input_size: u32,
    #[serde(default = "default_input_name")]
    pub input_name: String,
    #[serde(default = "default_output_name")]
    pub output_name: String,
    /// 人物として採用する検出スコアの下限
    #[serde(default = "default_min_person_score")]
    pub min_person_score: f32,
}

fn default_model_path() -> String { "models/movenet_multipose_lightning.onnx".to_string() }
fn default_input_size() -> u32 { 256 }
fn default_input_name() -> String { "input".to_string() }
fn default_output_name() -> String { "output_0".to_string() }
fn default_min_person_score() -> f32 { 0.2 }

impl Default for PoseConfig {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            input_size: default_input_size(),
            input_name: default_input_name(),
            output_name: default_output_name(),
            min_person_score: default_min_person_score(),
        }
    }
}

/// v4l2loopback への映像出力
#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_loopback")]
    pub loopback: bool,
    #[serde(default = "default_loopback_device")]
    pub device: String,
}

fn default_loopback() -> bool { true }
fn default_loopback_device() -> String { "/dev/video1".to_string() }

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            loopback: default_loopback(),
            device: default_loopback_device(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DebugConfig {
    /// プレビューウィンドウを表示
    #[serde(default)]
    pub ui: bool,
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("camera address is not set")]
    MissingCameraAddr,
    #[error("speed range must satisfy 1 <= speed_min ({min}) <= speed_max ({max}) <= {limit}")]
    InvalidSpeedRange { min: u8, max: u8, limit: u8 },
    #[error("tracking.boundary must be within (0, 0.5), got {0}")]
    InvalidBoundary(f32),
    #[error("source.url is required for a stream source")]
    MissingStreamUrl,
    #[error("camera.timeout_ms must be greater than 0")]
    ZeroTimeout,
    #[error("pose.input_size must be a positive multiple of 32, got {0}")]
    InvalidInputSize(u32),
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// 読めなければ既定値で続行
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path.as_ref()) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("{:#}; using default configuration", e);
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.camera.addr.trim().is_empty() {
            return Err(ConfigError::MissingCameraAddr);
        }
        if self.camera.timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }

        let t = &self.tracking;
        if t.speed_min < 1 || t.speed_min > t.speed_max || t.speed_max > PAN_SPEED_MAX {
            return Err(ConfigError::InvalidSpeedRange {
                min: t.speed_min,
                max: t.speed_max,
                limit: PAN_SPEED_MAX,
            });
        }
        if !(t.boundary > 0.0 && t.boundary < 0.5) {
            return Err(ConfigError::InvalidBoundary(t.boundary));
        }

        if self.source.kind == SourceKind::Stream
            && self.source.url.as_deref().map_or(true, |u| u.trim().is_empty())
        {
            return Err(ConfigError::MissingStreamUrl);
        }

        let size = self.pose.input_size;
        if size == 0 || size % 32 != 0 {
            return Err(ConfigError::InvalidInputSize(size));
        }

        Ok(())
    }

    /// 起動時の追跡状態: MQTTで制御する場合は設定に従い、そうでなければ常に有効
    pub fn initial_tracking_enabled(&self) -> bool {
        if self.mqtt.enabled {
            self.tracking.enabled_on_start
        } else {
            true
        }
    }
}
