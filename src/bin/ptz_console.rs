//! VISCA 動作確認用の対話コンソール
//!
//! 追跡ループを介さず、方向と速度を手で送ってカメラの応答を確かめる。

use anyhow::Result;
use clap::Parser;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use ptz_tracker::config::Config;
use ptz_tracker::motion::{Direction, MotionCommand, MotionSink};
use ptz_tracker::visca::ViscaClient;

#[derive(Parser, Debug)]
#[command(name = "ptz_console", about = "Send VISCA pan/tilt/zoom commands by hand")]
struct Args {
    #[arg(long, default_value = "ptz_tracker.toml")]
    config: PathBuf,

    /// カメラのホスト名またはIP（設定ファイルより優先）
    camera_addr: Option<String>,

    #[arg(short = 'p', long)]
    camera_port: Option<u16>,
}

/// 1行の入力を解釈した結果
#[derive(Debug, PartialEq)]
enum Input {
    Move(MotionCommand),
    Speed(u8),
    Reset,
    Show,
    Quit,
}

fn parse_input(line: &str, current_speed: u8) -> Result<Option<Input>> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let Some(&head) = parts.first() else {
        return Ok(None);
    };
    let speed = match parts.get(1) {
        Some(s) => s.parse()?,
        None => current_speed,
    };

    let direction = match head {
        "l" => Direction::PanLeft,
        "r" => Direction::PanRight,
        "u" => Direction::TiltUp,
        "d" => Direction::TiltDown,
        "i" => Direction::ZoomIn,
        "o" => Direction::ZoomOut,
        "z" => Direction::ZoomStop,
        "s" => Direction::Stop,
        "v" if parts.len() == 2 => return Ok(Some(Input::Speed(speed))),
        "reset" => return Ok(Some(Input::Reset)),
        "?" => return Ok(Some(Input::Show)),
        "q" => return Ok(Some(Input::Quit)),
        other => anyhow::bail!("不明なコマンド: {}", other),
    };
    Ok(Some(Input::Move(MotionCommand::new(direction, speed))))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let args = Args::parse();
    let mut config = Config::load_or_default(&args.config);
    if let Some(addr) = args.camera_addr {
        config.camera.addr = addr;
    }
    if let Some(port) = args.camera_port {
        config.camera.port = port;
    }
    if config.camera.addr.trim().is_empty() {
        anyhow::bail!("camera address is not set");
    }

    let mut camera = ViscaClient::new(&config.camera.addr, config.camera.port, config.camera.timeout())?;
    camera.reset_sequence()?;

    println!("=== PTZ Console ===");
    println!("接続先: {}", camera.target());
    println!();
    println!("コマンド:");
    println!("  l|r|u|d [speed] - パン左/右, チルト上/下");
    println!("  i|o [speed]     - ズームイン/アウト");
    println!("  z               - ズーム停止");
    println!("  s               - パン・チルト停止");
    println!("  v speed         - 既定の速度を変更");
    println!("  reset           - シーケンス番号をリセット");
    println!("  ?               - 現在の状態");
    println!("  q               - 停止して終了");
    println!();

    let mut speed = config.tracking.speed_min.max(1);
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("> ");
        io::stdout().flush()?;

        let Some(line) = lines.next() else {
            break;
        };
        let input = match parse_input(&line?, speed) {
            Ok(Some(input)) => input,
            Ok(None) => continue,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };

        match input {
            Input::Move(command) => match camera.apply(command) {
                Ok(()) => println!("送信: {}", command),
                Err(e) => tracing::warn!("Failed to send {}: {:#}", command, e),
            },
            Input::Speed(s) => {
                speed = s;
                println!("速度: {}", speed);
            }
            Input::Reset => camera.reset_sequence()?,
            Input::Show => println!("状態: {}@{}", camera.direction(), camera.speed()),
            Input::Quit => break,
        }
    }

    // 終了時は必ず止める
    camera.apply(MotionCommand::new(Direction::ZoomStop, speed))?;
    camera.apply(MotionCommand::stop(speed))?;
    println!("終了します");
    Ok(())
}
