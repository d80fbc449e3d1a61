// 该文件是 Cheliu （车流） 项目的一部分。
// src/output.rs - 占用报表
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

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::BBox;

mod csv_report;
mod summary;

pub use self::csv_report::{DEFAULT_REPORT_NAME, REPORT_HEADERS};
pub use self::summary::RunSummary;

#[derive(Error, Debug)]
pub enum OutputError {
  #[error("CSV 错误: {0}")]
  CsvError(#[from] csv::Error),
  #[error("JSON 错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 报表中的一行，对应一个车辆身份
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
  #[serde(rename = "Vehicle")]
  pub vehicle: BBox,
  /// 首次出现的帧
  #[serde(rename = "Entry Time")]
  pub entry: u64,
  /// 最后出现的帧
  #[serde(rename = "Exit Time")]
  pub exit: u64,
  /// 占用时长（秒）
  #[serde(rename = "Occupancy Time")]
  pub occupancy_secs: f64,
}

/// 按首次出现顺序排列的报表
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OccupancyReport {
  rows: Vec<ReportRow>,
}

impl OccupancyReport {
  pub fn new(rows: Vec<ReportRow>) -> Self {
    Self { rows }
  }

  pub fn rows(&self) -> &[ReportRow] {
    &self.rows
  }

  pub fn into_rows(self) -> Vec<ReportRow> {
    self.rows
  }

  pub fn len(&self) -> usize {
    self.rows.len()
  }

  pub fn is_empty(&self) -> bool {
    self.rows.is_empty()
  }
}

impl FromIterator<ReportRow> for OccupancyReport {
  fn from_iter<I: IntoIterator<Item = ReportRow>>(iter: I) -> Self {
    Self {
      rows: iter.into_iter().collect(),
    }
  }
}

impl<'a> IntoIterator for &'a OccupancyReport {
  type Item = &'a ReportRow;
  type IntoIter = std::slice::Iter<'a, ReportRow>;

  fn into_iter(self) -> Self::IntoIter {
    self.rows.iter()
  }
}
