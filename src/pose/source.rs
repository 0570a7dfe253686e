use anyhow::Result;

use super::keypoint::Person;

/// フレームから人物の姿勢を推定する推論エンジン
///
/// 呼び出しは同期・ブロッキング。制御ループ内で1フレームずつ順番に呼ぶこと。
/// 検出ゼロは空のVecで返す（エラーではない）。
pub trait PoseSource {
    type Frame;

    fn detect(&mut self, frame: &Self::Frame) -> Result<Vec<Person>>;
}
