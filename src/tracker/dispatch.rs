use anyhow::Result;

use crate::motion::{Direction, MotionCommand, MotionSink};

/// 1フレームの送信結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// 前回と同じ方向・速度なので送信しない
    Unchanged,
    /// 変化はあったが追跡が無効
    Suppressed,
    Sent,
    /// 送信失敗（ループは継続）
    Failed,
}

/// 直前に決定したコマンドと比較し、変化した時だけカメラへ送る
///
/// 送らなかった場合も記録は更新する。追跡を再開した直前の判定と同じなら
/// 余計な送信は起きない。送信失敗時の再送はしない（次に判定が変わった時に送られる）。
pub struct Dispatcher {
    last: MotionCommand,
}

impl Dispatcher {
    pub fn new(initial: MotionCommand) -> Self {
        Self { last: initial }
    }

    pub fn last(&self) -> MotionCommand {
        self.last
    }

    pub fn dispatch<S: MotionSink + ?Sized>(
        &mut self,
        command: MotionCommand,
        enabled: bool,
        sink: &mut S,
    ) -> DispatchOutcome {
        if command == self.last {
            return DispatchOutcome::Unchanged;
        }
        self.last = command;

        if !enabled {
            return DispatchOutcome::Suppressed;
        }

        match sink.apply(command) {
            Ok(()) => {
                tracing::debug!("sent {}", command);
                DispatchOutcome::Sent
            }
            Err(e) => {
                tracing::warn!("Failed to send {}: {:#}", command, e);
                DispatchOutcome::Failed
            }
        }
    }

    /// 終了時にカメラを止める（ZOOM_STOP → STOP）
    ///
    /// 記録は無視して必ず送る。両方試してから最初のエラーを返す。
    pub fn halt<S: MotionSink + ?Sized>(&mut self, sink: &mut S, speed: u8) -> Result<()> {
        let zoom = sink.apply(MotionCommand::new(Direction::ZoomStop, speed));
        let stop = MotionCommand::stop(speed);
        let pan_tilt = sink.apply(stop);
        self.last = stop;
        zoom.and(pan_tilt)
    }
}
