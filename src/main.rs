use anyhow::{Context, Result};
use clap::Parser;
use opencv::prelude::*;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use ptz_tracker::camera::{FrameSource, OpenCvSource, WORKING_HEIGHT, WORKING_WIDTH};
use ptz_tracker::config::{Config, SourceKind};
use ptz_tracker::control::{MqttBus, StateHeartbeat, TrackingFlag};
use ptz_tracker::output::LoopbackOutput;
use ptz_tracker::pose::{PoseDetector, PoseSource};
use ptz_tracker::render::{annotate, PreviewWindow};
use ptz_tracker::shutdown::{shutdown, PUBLISH_GRACE};
use ptz_tracker::tracker::{DispatchOutcome, Tracker};
use ptz_tracker::visca::ViscaClient;

const DEFAULT_CONFIG_PATH: &str = "ptz_tracker.toml";
const READ_RETRY_DELAY: Duration = Duration::from_millis(10);

#[derive(Parser, Debug)]
#[command(name = "ptz-tracker", about = "Keeps people in frame by steering a PTZ camera over VISCA")]
struct Args {
    /// 設定ファイル
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// カメラのホスト名またはIP
    camera_addr: Option<String>,

    /// VISCA ポート
    #[arg(short = 'p', long)]
    camera_port: Option<u16>,

    /// MQTTによるリモート制御を有効化
    #[arg(short, long)]
    mqtt: bool,

    #[arg(long)]
    mqtt_host: Option<String>,

    /// MQTT有効時、起動直後から追跡する
    #[arg(short, long)]
    control: bool,

    /// 目標領域の左右端（幅に対する比率）
    #[arg(short, long)]
    boundary: Option<f32>,

    #[arg(short = 's', long)]
    speed_min: Option<u8>,

    #[arg(short = 'S', long)]
    speed_max: Option<u8>,

    /// プレビューウィンドウを表示
    #[arg(long)]
    ui: bool,

    /// キャプチャデバイス番号
    #[arg(long, conflicts_with = "url")]
    device: Option<i32>,

    /// ネットワークストリームのURL
    #[arg(long)]
    url: Option<String>,

    /// v4l2loopback への出力を無効化
    #[arg(long)]
    no_loopback: bool,
}

impl Args {
    /// コマンドラインの指定で設定を上書き
    fn apply(self, config: &mut Config) {
        if let Some(addr) = self.camera_addr {
            config.camera.addr = addr;
        }
        if let Some(port) = self.camera_port {
            config.camera.port = port;
        }
        if self.mqtt {
            config.mqtt.enabled = true;
        }
        if let Some(host) = self.mqtt_host {
            config.mqtt.host = host;
        }
        if self.control {
            config.tracking.enabled_on_start = true;
        }
        if let Some(boundary) = self.boundary {
            config.tracking.boundary = boundary;
        }
        if let Some(min) = self.speed_min {
            config.tracking.speed_min = min;
        }
        if let Some(max) = self.speed_max {
            config.tracking.speed_max = max;
        }
        if self.ui {
            config.debug.ui = true;
        }
        if let Some(device) = self.device {
            config.source.kind = SourceKind::Device;
            config.source.device = device;
        }
        if let Some(url) = self.url {
            config.source.kind = SourceKind::Stream;
            config.source.url = Some(url);
        }
        if self.no_loopback {
            config.output.loopback = false;
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let args = Args::parse();
    let mut config = Config::load_or_default(&args.config);
    args.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    run(config)
}

fn run(config: Config) -> Result<()> {
    tracing::info!(
        "Camera {}:{}, speed {}..={}, boundary {}",
        config.camera.addr,
        config.camera.port,
        config.tracking.speed_min,
        config.tracking.speed_max,
        config.tracking.boundary
    );

    let flag = TrackingFlag::new(config.initial_tracking_enabled());
    tracing::info!("Tracking {}", if flag.is_enabled() { "enabled" } else { "disabled" });

    let mut camera = ViscaClient::new(&config.camera.addr, config.camera.port, config.camera.timeout())?;
    if let Err(e) = camera.reset_sequence() {
        tracing::warn!("Failed to reset VISCA sequence: {:#}", e);
    }

    let mut detector = PoseDetector::new(&config.pose)?;
    let mut source = OpenCvSource::open(&config.source)?;

    let bus = if config.mqtt.enabled {
        Some(MqttBus::start(&config.mqtt, flag.clone())?)
    } else {
        None
    };
    let mut heartbeat = bus.as_ref().map(|b| StateHeartbeat::new(b.publisher()));

    let mut output = if config.output.loopback {
        match LoopbackOutput::open(&config.output.device) {
            Ok(output) => Some(output),
            Err(e) => {
                tracing::warn!("{:#}; video output disabled", e);
                None
            }
        }
    } else {
        None
    };

    let mut window = if config.debug.ui {
        Some(PreviewWindow::new(
            "PTZ Tracker",
            WORKING_WIDTH as usize,
            WORKING_HEIGHT as usize,
        )?)
    } else {
        None
    };

    // Ctrl+C / SIGTERM で終了処理へ
    let stop_requested = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&stop_requested))?;
    signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(&stop_requested))?;

    let mut tracker = Tracker::from_config(&config.tracking);
    let mut missed_reads = 0u32;

    tracing::info!("Tracking loop started (Ctrl+C to stop)");
    while !stop_requested.load(Ordering::Relaxed) {
        if !source.is_available() {
            tracing::warn!("{} is no longer available", source.description());
            break;
        }

        let Some(mut frame) = source.read_frame() else {
            if missed_reads == 0 {
                tracing::warn!("No video data from {}", source.description());
            }
            missed_reads += 1;
            thread::sleep(READ_RETRY_DELAY);
            continue;
        };
        if missed_reads > 0 {
            tracing::info!("Video resumed after {} failed reads", missed_reads);
            missed_reads = 0;
        }

        let enabled = flag.is_enabled();
        if let Some(heartbeat) = heartbeat.as_mut() {
            heartbeat.tick(enabled);
        }

        let persons = match detector.detect(&frame) {
            Ok(persons) => persons,
            Err(e) => {
                tracing::warn!("Pose detection failed: {:#}", e);
                Vec::new()
            }
        };

        let frame_size = (frame.cols() as u32, frame.rows() as u32);
        let report = tracker.process(frame_size, &persons, enabled, &mut camera);
        if report.outcome == DispatchOutcome::Sent {
            tracing::info!("{} ({} people)", report.command, report.regions.len());
        }

        if window.is_none() && output.is_none() {
            continue;
        }
        if let Err(e) = annotate(&mut frame, &persons, &report) {
            tracing::warn!("Failed to annotate frame: {:#}", e);
        }

        if let Some(w) = window.as_mut() {
            if !w.is_open() {
                tracing::info!("Preview window closed");
                break;
            }
            if let Err(e) = w.show(&frame) {
                tracing::warn!("{:#}; preview disabled", e);
                window = None;
            }
        }

        if let Some(o) = output.as_mut() {
            if let Err(e) = o.write_frame(&frame) {
                tracing::warn!("{:#}; video output disabled", e);
                output = None;
            }
        }
    }

    shutdown(
        &flag,
        &mut tracker,
        &mut camera,
        heartbeat.as_mut(),
        bus,
        &mut source,
        PUBLISH_GRACE,
    );
    drop(window);
    drop(output);
    tracing::info!("Shutdown complete");
    Ok(())
}
