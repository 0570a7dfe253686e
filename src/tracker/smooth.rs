/// 保持するサンプル数
pub const HISTORY_LEN: usize = 10;
/// 移動平均に使う最新サンプル数
pub const AVERAGE_WINDOW: usize = 5;
/// 実データが来る前の初期値
pub const SEED_VALUE: f32 = 10.0;

/// 人物の縦方向の大きさ（top - bottom）の移動平均フィルタ
///
/// 10スロットのシフトレジスタで、平均には最新5スロットだけを使う。
/// 起動直後は初期値10が平均に混ざるので、ズーム判定は数フレーム遅れて立ち上がる。
/// 毎フレーム必ず1回シフトする（検出なしのフレームは直前の値を繰り返す）。
pub struct HeightSmoother {
    history: [f32; HISTORY_LEN],
}

impl HeightSmoother {
    pub fn new() -> Self {
        Self {
            history: [SEED_VALUE; HISTORY_LEN],
        }
    }

    /// サンプルを追加して平滑化した大きさ（絶対値）を返す
    pub fn push(&mut self, sample: Option<f32>) -> f32 {
        let value = sample.unwrap_or_else(|| self.latest());
        self.history.rotate_left(1);
        self.history[HISTORY_LEN - 1] = value;
        self.magnitude()
    }

    /// 最新5スロットの平均の絶対値
    pub fn magnitude(&self) -> f32 {
        let recent = &self.history[HISTORY_LEN - AVERAGE_WINDOW..];
        (recent.iter().sum::<f32>() / AVERAGE_WINDOW as f32).abs()
    }

    pub fn latest(&self) -> f32 {
        self.history[HISTORY_LEN - 1]
    }

    pub fn history(&self) -> &[f32; HISTORY_LEN] {
        &self.history
    }
}

impl Default for HeightSmoother {
    fn default() -> Self {
        Self::new()
    }
}
