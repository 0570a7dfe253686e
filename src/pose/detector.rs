use anyhow::{Context, Result};
use ndarray::{Array4, ArrayViewD};
use opencv::{
    core::{Mat, Size, Vec3b},
    imgproc,
    prelude::*,
};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;

use super::keypoint::{Keypoint, KeypointIndex, Person};
use super::source::PoseSource;
use crate::config::PoseConfig;

/// 1人あたりの出力: 17 * (y, x, score) + (ymin, xmin, ymax, xmax, score)
const VALUES_PER_PERSON: usize = KeypointIndex::COUNT * 3 + 5;

/// MoveNet MultiPose を使用した複数人物の姿勢検出器
pub struct PoseDetector {
    session: Session,
    input_size: i32,
    input_name: String,
    output_name: String,
    min_person_score: f32,
}

impl PoseDetector {
    /// ONNXモデルを読み込んで初期化
    pub fn new(config: &PoseConfig) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .commit_from_file(&config.model_path)
            .with_context(|| format!("Failed to load ONNX model: {}", config.model_path))?;

        Ok(Self {
            session,
            input_size: config.input_size as i32,
            input_name: config.input_name.clone(),
            output_name: config.output_name.clone(),
            min_person_score: config.min_person_score,
        })
    }

    /// BGR Mat → [1, size, size, 3] の f32 テンソル (RGB, 0.0-255.0)
    fn preprocess(&self, frame: &Mat) -> Result<Array4<f32>> {
        let size = self.input_size;

        let mut rgb = Mat::default();
        imgproc::cvt_color_def(frame, &mut rgb, imgproc::COLOR_BGR2RGB)?;

        let mut resized = Mat::default();
        imgproc::resize(
            &rgb,
            &mut resized,
            Size::new(size, size),
            0.0,
            0.0,
            imgproc::INTER_LINEAR,
        )?;

        let s = size as usize;
        let mut tensor = Array4::<f32>::zeros((1, s, s, 3));
        for y in 0..size {
            for x in 0..size {
                let pixel = resized.at_2d::<Vec3b>(y, x)?;
                for c in 0..3 {
                    tensor[[0, y as usize, x as usize, c]] = pixel[c] as f32;
                }
            }
        }

        Ok(tensor)
    }
}

impl PoseSource for PoseDetector {
    type Frame = Mat;

    fn detect(&mut self, frame: &Mat) -> Result<Vec<Person>> {
        let frame_w = frame.cols() as f32;
        let frame_h = frame.rows() as f32;
        let input = self.preprocess(frame)?;

        let input_tensor = Tensor::from_array(input)?;
        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => input_tensor])
            .context("Inference failed")?;

        // 出力は [1, 6, 56]
        let output: ArrayViewD<f32> = outputs[self.output_name.as_str()]
            .try_extract_array()
            .context("Failed to extract output tensor")?;

        parse_persons(&output, frame_w, frame_h, self.min_person_score)
    }
}

/// MultiPose の出力を人物ごとのキーポイント列（ピクセル座標）に変換
///
/// モデルの座標は入力画像に対する正規化値なので、そのままフレームサイズを掛ける。
fn parse_persons(
    output: &ArrayViewD<f32>,
    frame_w: f32,
    frame_h: f32,
    min_person_score: f32,
) -> Result<Vec<Person>> {
    let shape = output.shape();
    if shape.len() != 3 || shape[2] < VALUES_PER_PERSON {
        anyhow::bail!("Unexpected MultiPose output shape: {:?}", shape);
    }

    let mut persons = Vec::new();
    for i in 0..shape[1] {
        let score = output[[0, i, VALUES_PER_PERSON - 1]];
        if score < min_person_score {
            continue;
        }

        let keypoints = (0..KeypointIndex::COUNT)
            .map(|k| {
                let y = output[[0, i, k * 3]];
                let x = output[[0, i, k * 3 + 1]];
                let confidence = output[[0, i, k * 3 + 2]];
                Keypoint::new(x * frame_w, y * frame_h, confidence)
            })
            .collect();
        persons.push(Person::new(keypoints));
    }

    Ok(persons)
}
