// 该文件是 Cheliu （车流） 项目的一部分。
// src/task.rs - 检测与统计任务
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

use std::fmt::Display;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::frame::Frame;
use crate::input::InputError;
use crate::model::{Model, OutputLayer, VehicleDetector};
use crate::occupancy::{FRAME_RATE, OccupancyAggregator};
use crate::output::OccupancyReport;

pub trait Task<I, M>: Sized {
  type Output;
  type Error;
  fn run_task(self, input: I, model: M) -> Result<Self::Output, Self::Error>;
}

#[derive(Error, Debug)]
pub enum TaskError {
  #[error("任务被中断，已处理 {frames} 帧，结果已丢弃")]
  Cancelled { frames: u64 },
  #[error("无法设置 Ctrl-C 处理: {0}")]
  SignalError(#[from] ctrlc::Error),
}

/// 协作式取消标志，在两次读帧之间检查
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
  pub fn new() -> Self {
    Self::default()
  }

  /// 创建标志并在收到 Ctrl-C 时置位，只能调用一次
  pub fn install_ctrlc_handler() -> Result<Self, TaskError> {
    let flag = Self::new();
    let handle = flag.clone();
    ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      handle.cancel();
    })?;
    Ok(flag)
  }

  pub fn cancel(&self) {
    self.0.store(true, Ordering::SeqCst);
  }

  pub fn is_cancelled(&self) -> bool {
    self.0.load(Ordering::SeqCst)
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
  /// 成功完成检测的帧数
  pub frames_processed: u64,
  /// 解码或推理失败而跳过的帧数
  pub frames_skipped: u64,
  /// 所有帧的检测总数
  pub detections: u64,
}

impl RunStats {
  /// 从输入源读到的帧数，包括被跳过的帧
  pub fn frames_read(&self) -> u64 {
    self.frames_processed + self.frames_skipped
  }
}

/// 一次处理的结果。没有检测到任何车辆时单独区分，便于提示用户。
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
  NoVehicles {
    stats: RunStats,
  },
  Vehicles {
    report: OccupancyReport,
    stats: RunStats,
  },
}

impl RunOutcome {
  pub fn stats(&self) -> &RunStats {
    match self {
      RunOutcome::NoVehicles { stats } => stats,
      RunOutcome::Vehicles { stats, .. } => stats,
    }
  }

  pub fn report(&self) -> Option<&OccupancyReport> {
    match self {
      RunOutcome::NoVehicles { .. } => None,
      RunOutcome::Vehicles { report, .. } => Some(report),
    }
  }
}

/// 单遍、顺序执行的占用统计任务
#[derive(Debug, Default, Clone)]
pub struct OccupancyTask {
  cancel: Option<CancelFlag>,
  max_frames: Option<u64>,
}

impl OccupancyTask {
  pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
    self.cancel = Some(cancel);
    self
  }

  /// 限制从输入源读取的帧数，损坏或推理失败的帧同样计入
  pub fn with_max_frames(mut self, max_frames: Option<u64>) -> Self {
    self.max_frames = max_frames;
    self
  }

  fn is_cancelled(&self) -> bool {
    self.cancel.as_ref().is_some_and(CancelFlag::is_cancelled)
  }
}

impl<'a, I, M> Task<I, &'a mut VehicleDetector<M>> for OccupancyTask
where
  I: Iterator<Item = Result<Frame, InputError>>,
  M: Model<Output = Vec<OutputLayer>>,
  M::Error: Display,
{
  type Output = RunOutcome;
  type Error = TaskError;

  fn run_task(
    self,
    mut input: I,
    detector: &'a mut VehicleDetector<M>,
  ) -> Result<Self::Output, Self::Error> {
    info!("开始任务...");
    let mut aggregator = OccupancyAggregator::new();
    let mut stats = RunStats::default();
    let now = std::time::Instant::now();

    loop {
      if self.is_cancelled() {
        warn!("中断信号接收，退出任务循环");
        return Err(TaskError::Cancelled {
          frames: stats.frames_processed,
        });
      }
      if self.max_frames.is_some_and(|n| stats.frames_read() >= n) {
        info!("达到指定帧数 {}, 退出任务循环", stats.frames_read());
        break;
      }

      let Some(item) = input.next() else {
        break;
      };

      let frame = match item {
        Ok(frame) => frame,
        Err(e) => {
          warn!("跳过损坏的帧: {}", e);
          stats.frames_skipped += 1;
          continue;
        }
      };

      let detections = match detector.detect(&frame) {
        Ok(detections) => detections,
        Err(e) => {
          warn!("第 {} 帧推理失败，跳过: {}", frame.index, e);
          stats.frames_skipped += 1;
          continue;
        }
      };

      debug!("处理第 {} 帧, 检测到 {} 辆车", frame.index, detections.len());
      stats.frames_processed += 1;
      stats.detections += detections.len() as u64;
      aggregator.observe(frame.index, &detections);
    }

    info!(
      "任务完成: {} 帧, 跳过 {} 帧, {} 个车辆身份, 耗时 {:.2?}",
      stats.frames_processed,
      stats.frames_skipped,
      aggregator.len(),
      now.elapsed()
    );

    let report = aggregator.report(FRAME_RATE);
    if report.is_empty() {
      Ok(RunOutcome::NoVehicles { stats })
    } else {
      Ok(RunOutcome::Vehicles { report, stats })
    }
  }
}

/// 打开视频文件并完成整段处理
#[cfg(feature = "opencv")]
pub fn process_video<M>(
  path: impl AsRef<std::path::Path>,
  detector: &mut VehicleDetector<M>,
  task: OccupancyTask,
) -> Result<RunOutcome, TaskError>
where
  M: Model<Output = Vec<OutputLayer>>,
  M::Error: Display,
{
  use crate::input::{FrameSource, VideoFileInput};

  let input = VideoFileInput::open(path);
  info!("输入源: {}", input.describe());
  task.run_task(input, detector)
}

#[cfg(all(test, feature = "opencv"))]
mod tests {
  use super::*;
  use image::RgbImage;

  /// 被调用即失败，用于确认没有帧进入推理
  struct UnreachableModel;

  impl Model for UnreachableModel {
    type Input = ();
    type Output = Vec<OutputLayer>;
    type Error = String;

    fn preprocess(&self, _image: &RgbImage) -> Result<(), String> {
      Err("preprocess called".to_string())
    }

    fn infer(&mut self, _input: &()) -> Result<Vec<OutputLayer>, String> {
      Err("infer called".to_string())
    }
  }

  #[test]
  fn unreadable_video_reports_no_vehicles() {
    let dir = tempfile::tempdir().unwrap();
    let mut detector = VehicleDetector::new(UnreachableModel);

    let outcome = process_video(
      dir.path().join("missing.mp4"),
      &mut detector,
      OccupancyTask::default(),
    )
    .unwrap();

    let expected = RunOutcome::NoVehicles {
      stats: RunStats::default(),
    };
    assert_eq!(outcome, expected);
  }

  #[test]
  fn non_video_file_reports_no_vehicles() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.avi");
    std::fs::write(&path, b"plain text, not a video").unwrap();
    let mut detector = VehicleDetector::new(UnreachableModel);

    let outcome = process_video(&path, &mut detector, OccupancyTask::default()).unwrap();

    assert!(matches!(outcome, RunOutcome::NoVehicles { .. }));
    assert_eq!(outcome.stats().frames_read(), 0);
  }
}
