// 该文件是 Cheliu （车流） 项目的一部分。
// src/occupancy.rs - 车辆占用时间统计
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

use indexmap::IndexMap;
use tracing::warn;

use crate::model::{BBox, Detection};
use crate::output::{OccupancyReport, ReportRow};

/// 假定的视频帧率
pub const FRAME_RATE: f64 = 30.0;

/// 某个车辆身份第一次与最后一次出现的帧
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OccupancyRecord {
  pub entry: u64,
  /// 只出现过一次时为 `None`
  pub exit: Option<u64>,
}

/// 按边界框精确匹配的占用统计。
///
/// 车辆身份就是边界框坐标本身，框移动一个像素就会被记为另一辆车，
/// 这里并不做跨帧关联。记录按首次出现的顺序保存。
#[derive(Debug, Default)]
pub struct OccupancyAggregator {
  records: IndexMap<BBox, OccupancyRecord>,
}

impl OccupancyAggregator {
  pub fn new() -> Self {
    Self::default()
  }

  /// 记录一帧的检测结果，调用方需保证 `frame_index` 单调递增。
  pub fn observe(&mut self, frame_index: u64, detections: &[Detection]) {
    for detection in detections {
      match self.records.get_mut(&detection.bbox) {
        None => {
          self.records.insert(
            detection.bbox,
            OccupancyRecord {
              entry: frame_index,
              exit: None,
            },
          );
        }
        Some(record) => {
          if frame_index < record.exit.unwrap_or(record.entry) {
            warn!(
              "帧序号回退: {} 上次出现于 {}, 当前 {}",
              detection.bbox,
              record.exit.unwrap_or(record.entry),
              frame_index
            );
          }
          record.exit = Some(frame_index);
        }
      }
    }
  }

  /// 生成报表，不修改内部状态
  pub fn report(&self, frame_rate: f64) -> OccupancyReport {
    self
      .records
      .iter()
      .map(|(bbox, record)| {
        let exit = record.exit.unwrap_or(record.entry);
        ReportRow {
          vehicle: *bbox,
          entry: record.entry,
          exit,
          occupancy_secs: (exit as f64 - record.entry as f64) / frame_rate,
        }
      })
      .collect()
  }

  pub fn get(&self, bbox: &BBox) -> Option<&OccupancyRecord> {
    self.records.get(bbox)
  }

  pub fn len(&self) -> usize {
    self.records.len()
  }

  pub fn is_empty(&self) -> bool {
    self.records.is_empty()
  }

  pub fn reset(&mut self) {
    self.records.clear();
  }
}
