// 该文件是 Cheliu （车流） 项目的一部分。
// src/output/csv_report.rs - CSV 导出与读取
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

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use tracing::info;

use super::{OccupancyReport, OutputError, ReportRow};

/// 默认导出文件名
pub const DEFAULT_REPORT_NAME: &str = "occupancy_report.csv";

pub const REPORT_HEADERS: [&str; 4] = ["Vehicle", "Entry Time", "Exit Time", "Occupancy Time"];

impl OccupancyReport {
  /// 写出 CSV，空报表也会写出表头
  pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), OutputError> {
    let mut writer = csv::WriterBuilder::new()
      .has_headers(false)
      .from_writer(writer);

    writer.write_record(REPORT_HEADERS)?;
    for row in &self.rows {
      writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
  }

  pub fn to_csv_bytes(&self) -> Result<Vec<u8>, OutputError> {
    let mut buffer = Vec::new();
    self.write_csv(&mut buffer)?;
    Ok(buffer)
  }

  pub fn save_csv(&self, path: impl AsRef<Path>) -> Result<(), OutputError> {
    let path = path.as_ref();
    self.write_csv(File::create(path)?)?;
    info!("报表已保存: {} ({} 行)", path.display(), self.rows.len());
    Ok(())
  }

  pub fn read_csv<R: Read>(reader: R) -> Result<Self, OutputError> {
    let mut reader = csv::Reader::from_reader(reader);
    let rows = reader
      .deserialize::<ReportRow>()
      .collect::<Result<Vec<_>, _>>()?;
    Ok(Self { rows })
  }

  pub fn load_csv(path: impl AsRef<Path>) -> Result<Self, OutputError> {
    Self::read_csv(File::open(path)?)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::BBox;

  fn sample() -> OccupancyReport {
    OccupancyReport::new(vec![
      ReportRow {
        vehicle: BBox::new(10, 20, 30, 40),
        entry: 10,
        exit: 15,
        occupancy_secs: 5.0 / 30.0,
      },
      ReportRow {
        vehicle: BBox::new(-4, 0, 120, 80),
        entry: 12,
        exit: 12,
        occupancy_secs: 0.0,
      },
    ])
  }

  #[test]
  fn writes_header_and_quoted_vehicle() {
    let text = String::from_utf8(sample().to_csv_bytes().unwrap()).unwrap();
    let mut lines = text.lines();

    assert_eq!(lines.next(), Some("Vehicle,Entry Time,Exit Time,Occupancy Time"));
    assert_eq!(lines.next(), Some("\"(10, 20, 30, 40)\",10,15,0.16666666666666666"));
    assert_eq!(lines.next(), Some("\"(-4, 0, 120, 80)\",12,12,0.0"));
    assert_eq!(lines.next(), None);
  }

  #[test]
  fn empty_report_still_has_header() {
    let text = String::from_utf8(OccupancyReport::default().to_csv_bytes().unwrap()).unwrap();
    assert_eq!(text, "Vehicle,Entry Time,Exit Time,Occupancy Time\n");
    assert!(OccupancyReport::read_csv(text.as_bytes()).unwrap().is_empty());
  }

  #[test]
  fn csv_round_trip_preserves_rows() {
    let report = sample();
    let bytes = report.to_csv_bytes().unwrap();
    let parsed = OccupancyReport::read_csv(bytes.as_slice()).unwrap();

    assert_eq!(parsed.len(), report.len());
    for (a, b) in parsed.rows().iter().zip(report.rows()) {
      assert_eq!(a.vehicle, b.vehicle);
      assert_eq!(a.entry, b.entry);
      assert_eq!(a.exit, b.exit);
      assert!((a.occupancy_secs - b.occupancy_secs).abs() < 1e-9);
    }
  }

  #[test]
  fn save_and_load_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(DEFAULT_REPORT_NAME);

    sample().save_csv(&path).unwrap();
    let loaded = OccupancyReport::load_csv(&path).unwrap();
    assert_eq!(loaded.rows()[1].vehicle, BBox::new(-4, 0, 120, 80));
  }
}
