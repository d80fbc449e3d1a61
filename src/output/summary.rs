// 该文件是 Cheliu （车流） 项目的一部分。
// src/output/summary.rs - 处理摘要
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

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::OutputError;
use crate::task::RunOutcome;

/// 一次处理的摘要，以 JSON 写出
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
  pub source: String,
  pub frames_processed: u64,
  pub frames_skipped: u64,
  pub detections: u64,
  pub vehicles: usize,
  pub generated_at: DateTime<Utc>,
}

impl RunSummary {
  pub fn new(source: impl AsRef<Path>, outcome: &RunOutcome) -> Self {
    let stats = outcome.stats();
    Self {
      source: source.as_ref().display().to_string(),
      frames_processed: stats.frames_processed,
      frames_skipped: stats.frames_skipped,
      detections: stats.detections,
      vehicles: outcome.report().map_or(0, |report| report.len()),
      generated_at: Utc::now(),
    }
  }

  pub fn to_json(&self) -> Result<String, OutputError> {
    Ok(serde_json::to_string_pretty(self)?)
  }

  pub fn save(&self, path: impl AsRef<Path>) -> Result<(), OutputError> {
    fs::write(path, self.to_json()?)?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::BBox;
  use crate::output::{OccupancyReport, ReportRow};
  use crate::task::RunStats;

  #[test]
  fn summarises_vehicle_outcome() {
    let report = OccupancyReport::new(vec![ReportRow {
      vehicle: BBox::new(1, 2, 3, 4),
      entry: 1,
      exit: 4,
      occupancy_secs: 0.1,
    }]);
    let outcome = RunOutcome::Vehicles {
      report,
      stats: RunStats {
        frames_processed: 8,
        frames_skipped: 1,
        detections: 3,
      },
    };

    let summary = RunSummary::new("uploads/a.mp4", &outcome);
    let value: serde_json::Value = serde_json::from_str(&summary.to_json().unwrap()).unwrap();

    assert_eq!(value["source"], "uploads/a.mp4");
    assert_eq!(value["frames_processed"], 8);
    assert_eq!(value["frames_skipped"], 1);
    assert_eq!(value["vehicles"], 1);
    assert!(value["generated_at"].is_string());
  }

  #[test]
  fn empty_outcome_has_no_vehicles() {
    let outcome = RunOutcome::NoVehicles {
      stats: RunStats::default(),
    };
    assert_eq!(RunSummary::new("x.mkv", &outcome).vehicles, 0);
  }
}
