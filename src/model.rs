// 该文件是 Cheliu （车流） 项目的一部分。
// src/model.rs - 车辆检测模型
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use tracing::debug;

use image::RgbImage;

use crate::frame::Frame;

pub mod artifacts;
#[cfg(feature = "opencv")]
mod darknet;
mod nms;

pub use self::artifacts::{ArtifactError, ModelArtifacts};
#[cfg(feature = "opencv")]
pub use self::darknet::DarknetModel;
pub use self::nms::{iou, nms_boxes};

/// 网络输入边长
pub const INPUT_SIZE: u32 = 416;
/// 类别置信度阈值
pub const CONFIDENCE_THRESHOLD: f32 = 0.5;
/// NMS IoU 阈值
pub const NMS_THRESHOLD: f32 = 0.4;
/// COCO 数据集中 "car" 的类别索引
pub const CAR_CLASS_ID: usize = 2;

// 每行候选: cx, cy, w, h, objectness, 之后是各类别分数
const BOX_FIELDS: usize = 5;

pub trait Model {
  type Input;
  type Output;
  type Error;

  /// 把原始帧转换为网络输入（缩放到 `INPUT_SIZE`，乘以 1/255）
  fn preprocess(&self, image: &RgbImage) -> Result<Self::Input, Self::Error>;
  fn infer(&mut self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

#[derive(Error, Debug)]
pub enum ModelError {
  #[cfg(feature = "opencv")]
  #[error("OpenCV 错误: {0}")]
  OpenCvError(#[from] opencv::Error),
  #[error("模型路径无效: {0}")]
  ModelPathError(String),
  #[error("模型没有输出层")]
  NoOutputLayers,
}

/// 像素坐标下的轴对齐边界框，左上角 + 宽高。
///
/// 占用统计把整个元组当作车辆身份：只有坐标完全相同的两个框才被视为同一辆车。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BBox {
  pub x: i32,
  pub y: i32,
  pub width: i32,
  pub height: i32,
}

impl BBox {
  pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
    Self {
      x,
      y,
      width,
      height,
    }
  }

  pub fn area(&self) -> i64 {
    (self.width.max(0) as i64) * (self.height.max(0) as i64)
  }
}

impl fmt::Display for BBox {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "({}, {}, {}, {})", self.x, self.y, self.width, self.height)
  }
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("无法解析边界框: {0}")]
pub struct ParseBBoxError(String);

impl FromStr for BBox {
  type Err = ParseBBoxError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let inner = s
      .trim()
      .strip_prefix('(')
      .and_then(|rest| rest.strip_suffix(')'))
      .ok_or_else(|| ParseBBoxError(s.to_string()))?;

    let values = inner
      .split(',')
      .map(|part| part.trim().parse::<i32>())
      .collect::<Result<Vec<_>, _>>()
      .map_err(|_| ParseBBoxError(s.to_string()))?;

    match values.as_slice() {
      &[x, y, width, height] => Ok(BBox::new(x, y, width, height)),
      _ => Err(ParseBBoxError(s.to_string())),
    }
  }
}

impl Serialize for BBox {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(self)
  }
}

impl<'de> Deserialize<'de> for BBox {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let text = String::deserialize(deserializer)?;
    text.parse().map_err(serde::de::Error::custom)
  }
}

/// 检测结果
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
  pub bbox: BBox,
  /// 类别索引
  pub class_id: usize,
  /// 置信度
  pub confidence: f32,
}

/// 网络的一个输出层，每行 `cols` 个数值
#[derive(Debug, Clone, Default)]
pub struct OutputLayer {
  cols: usize,
  data: Vec<f32>,
}

impl OutputLayer {
  pub fn new(cols: usize, data: Vec<f32>) -> Self {
    Self { cols, data }
  }

  pub fn rows(&self) -> impl Iterator<Item = &[f32]> {
    self.data.chunks_exact(self.cols.max(1))
  }
}

/// 车辆检测器，只保留 "car" 类别
pub struct VehicleDetector<M> {
  model: M,
}

impl<M> VehicleDetector<M>
where
  M: Model<Output = Vec<OutputLayer>>,
{
  pub fn new(model: M) -> Self {
    Self { model }
  }

  /// 对单帧运行检测。空帧直接返回空结果，不会调用模型。
  pub fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, M::Error> {
    if frame.is_empty() {
      debug!(
        "帧 {} 尺寸为 {}x{}，跳过检测",
        frame.index,
        frame.width(),
        frame.height()
      );
      return Ok(Vec::new());
    }

    let blob = self.model.preprocess(&frame.image)?;
    let outputs = self.model.infer(&blob)?;
    let detections = postprocess(&outputs, frame.width(), frame.height());

    debug!("帧 {}: 检测到 {} 辆车", frame.index, detections.len());
    Ok(detections)
  }
}

/// 解析网络输出：筛选 car 类别，换算像素坐标，再做 NMS。
///
/// 保留下来的框按原始候选顺序返回。
pub fn postprocess(layers: &[OutputLayer], width: u32, height: u32) -> Vec<Detection> {
  let mut boxes = Vec::new();
  let mut confidences = Vec::new();

  for layer in layers {
    for row in layer.rows() {
      if row.len() <= BOX_FIELDS + CAR_CLASS_ID {
        continue;
      }

      let (class_id, confidence) = argmax(&row[BOX_FIELDS..]);
      if confidence > CONFIDENCE_THRESHOLD && class_id == CAR_CLASS_ID {
        boxes.push(to_pixel_box(row, width, height));
        confidences.push(confidence);
      }
    }
  }

  let mut kept = nms_boxes(&boxes, &confidences, CONFIDENCE_THRESHOLD, NMS_THRESHOLD);
  kept.sort_unstable();

  kept
    .into_iter()
    .map(|i| Detection {
      bbox: boxes[i],
      class_id: CAR_CLASS_ID,
      confidence: confidences[i],
    })
    .collect()
}

/// 最高分类别，相同分数取第一个
fn argmax(scores: &[f32]) -> (usize, f32) {
  let mut best = (0, scores.first().copied().unwrap_or(0.0));
  for (i, &score) in scores.iter().enumerate().skip(1) {
    if score > best.1 {
      best = (i, score);
    }
  }
  best
}

// 中心点坐标转左上角坐标，全部向零截断
fn to_pixel_box(row: &[f32], width: u32, height: u32) -> BBox {
  let (w_f, h_f) = (width as f32, height as f32);
  let center_x = (row[0] * w_f) as i32;
  let center_y = (row[1] * h_f) as i32;
  let w = (row[2] * w_f) as i32;
  let h = (row[3] * h_f) as i32;
  let x = (center_x as f64 - w as f64 / 2.0) as i32;
  let y = (center_y as f64 - h as f64 / 2.0) as i32;
  BBox::new(x, y, w, h)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::frame::NchwBlob;

  fn candidate(cx: f32, cy: f32, w: f32, h: f32, class_id: usize, score: f32) -> Vec<f32> {
    let mut row = vec![cx, cy, w, h, score];
    let mut scores = vec![0.0; 80];
    scores[class_id] = score;
    row.extend(scores);
    row
  }

  fn layer(rows: &[Vec<f32>]) -> OutputLayer {
    OutputLayer::new(85, rows.concat())
  }

  struct FixedModel {
    outputs: Vec<OutputLayer>,
    calls: usize,
  }

  impl Model for FixedModel {
    type Input = NchwBlob;
    type Output = Vec<OutputLayer>;
    type Error = std::convert::Infallible;

    fn preprocess(&self, image: &RgbImage) -> Result<NchwBlob, Self::Error> {
      Ok(NchwBlob::from_image(image, INPUT_SIZE, INPUT_SIZE))
    }

    fn infer(&mut self, input: &NchwBlob) -> Result<Vec<OutputLayer>, Self::Error> {
      assert_eq!(input.width(), INPUT_SIZE as usize);
      assert_eq!(input.height(), INPUT_SIZE as usize);
      self.calls += 1;
      Ok(self.outputs.clone())
    }
  }

  #[test]
  fn bbox_display_and_parse() {
    let bbox = BBox::new(-3, 40, 120, 64);
    assert_eq!(bbox.to_string(), "(-3, 40, 120, 64)");
    assert_eq!("(-3, 40, 120, 64)".parse::<BBox>(), Ok(bbox));
    assert!("(1, 2, 3)".parse::<BBox>().is_err());
    assert!("1, 2, 3, 4".parse::<BBox>().is_err());
  }

  #[test]
  fn converts_normalized_center_box_to_pixels() {
    let outputs = [layer(&[candidate(0.5, 0.5, 0.25, 0.5, CAR_CLASS_ID, 0.9)])];
    let detections = postprocess(&outputs, 640, 480);

    assert_eq!(detections.len(), 1);
    assert_eq!(detections[0].bbox, BBox::new(240, 120, 160, 240));
    assert_eq!(detections[0].class_id, CAR_CLASS_ID);
  }

  #[test]
  fn truncates_odd_width_like_integer_grid() {
    // cx = 101, w = 51, x = trunc(101 - 25.5) = 75
    let outputs = [layer(&[
      candidate(101.0 / 1024.0, 0.5, 51.0 / 1024.0, 0.1, CAR_CLASS_ID, 0.8),
      candidate(10.0 / 1024.0, 0.5, 51.0 / 1024.0, 0.1, CAR_CLASS_ID, 0.8),
    ])];
    let detections = postprocess(&outputs, 1024, 100);
    assert_eq!(detections.len(), 2);
    assert_eq!(detections[0].bbox.width, 51);
    assert_eq!(detections[0].bbox.x, 75);
    // 负数同样向零截断: trunc(10 - 25.5) = -15
    assert_eq!(detections[1].bbox.x, -15);
  }

  #[test]
  fn drops_other_classes_and_weak_scores() {
    let outputs = [layer(&[
      candidate(0.2, 0.2, 0.1, 0.1, 0, 0.95),
      candidate(0.5, 0.5, 0.1, 0.1, 7, 0.9),
      candidate(0.8, 0.8, 0.1, 0.1, CAR_CLASS_ID, 0.5),
    ])];
    assert!(postprocess(&outputs, 100, 100).is_empty());
  }

  #[test]
  fn overlapping_candidates_collapse_to_one() {
    let outputs = [
      layer(&[candidate(0.50, 0.50, 0.20, 0.20, CAR_CLASS_ID, 0.7)]),
      layer(&[candidate(0.5625, 0.50, 0.20, 0.20, CAR_CLASS_ID, 0.9)]),
    ];
    let detections = postprocess(&outputs, 1000, 1000);

    assert_eq!(detections.len(), 1);
    assert!((detections[0].confidence - 0.9).abs() < 1e-6);
    assert_eq!(detections[0].bbox, BBox::new(462, 400, 200, 200));
  }

  #[test]
  fn survivors_keep_candidate_order() {
    let outputs = [layer(&[
      candidate(0.1, 0.1, 0.05, 0.05, CAR_CLASS_ID, 0.6),
      candidate(0.9, 0.9, 0.05, 0.05, CAR_CLASS_ID, 0.99),
    ])];
    let detections = postprocess(&outputs, 1000, 1000);

    assert_eq!(detections.len(), 2);
    assert!(detections[0].bbox.x < detections[1].bbox.x);
  }

  #[test]
  fn short_rows_are_ignored() {
    let outputs = [OutputLayer::new(6, vec![0.5, 0.5, 0.1, 0.1, 0.9, 0.9])];
    assert!(postprocess(&outputs, 100, 100).is_empty());
  }

  #[test]
  fn empty_frame_skips_inference() {
    let mut detector = VehicleDetector::new(FixedModel {
      outputs: vec![layer(&[candidate(0.5, 0.5, 0.2, 0.2, CAR_CLASS_ID, 0.9)])],
      calls: 0,
    });

    let frame = Frame::new(3, RgbImage::new(0, 0));
    let Ok(detections) = detector.detect(&frame);
    assert!(detections.is_empty());
    assert_eq!(detector.model.calls, 0);

    let frame = Frame::new(4, RgbImage::new(200, 100));
    let Ok(detections) = detector.detect(&frame);
    assert_eq!(detections.len(), 1);
    assert_eq!(detections[0].bbox, BBox::new(80, 40, 40, 20));
    assert_eq!(detector.model.calls, 1);
  }
}
