// 该文件是 Cheliu （车流） 项目的一部分。
// src/model/nms.rs - 非极大值抑制
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

use std::cmp::Ordering;

use super::BBox;

/// 计算两个整数边界框的 IoU。两个面积都为零的框视为完全重合。
pub fn iou(a: &BBox, b: &BBox) -> f32 {
  let area_a = a.area();
  let area_b = b.area();
  if area_a + area_b == 0 {
    return 1.0;
  }

  let x1 = a.x.max(b.x) as i64;
  let y1 = a.y.max(b.y) as i64;
  let x2 = (a.x as i64 + a.width as i64).min(b.x as i64 + b.width as i64);
  let y2 = (a.y as i64 + a.height as i64).min(b.y as i64 + b.height as i64);

  let intersection = if x2 > x1 && y2 > y1 {
    (x2 - x1) * (y2 - y1)
  } else {
    0
  };

  let union = area_a + area_b - intersection;
  (intersection as f64 / union as f64) as f32
}

/// 非极大值抑制
///
/// 先丢弃分数不高于 `score_threshold` 的框，其余按分数降序（稳定排序）依次检查，
/// 与所有已保留框的 IoU 都不超过 `nms_threshold` 时保留。返回保留框的下标，按分数降序。
pub fn nms_boxes(
  boxes: &[BBox],
  scores: &[f32],
  score_threshold: f32,
  nms_threshold: f32,
) -> Vec<usize> {
  let mut order: Vec<usize> = (0..boxes.len().min(scores.len()))
    .filter(|&i| scores[i] > score_threshold)
    .collect();
  order.sort_by(|&a, &b| scores[b].partial_cmp(&scores[a]).unwrap_or(Ordering::Equal));

  let mut kept: Vec<usize> = Vec::new();
  for candidate in order {
    let keep = kept
      .iter()
      .all(|&k| iou(&boxes[candidate], &boxes[k]) <= nms_threshold);
    if keep {
      kept.push(candidate);
    }
  }
  kept
}
