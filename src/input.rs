// 该文件是 Cheliu （车流） 项目的一部分。
// src/input.rs - 视频帧输入
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

use thiserror::Error;

use crate::frame::Frame;

#[cfg(feature = "opencv")]
mod video_file;
#[cfg(feature = "opencv")]
pub use self::video_file::VideoFileInput;

#[derive(Error, Debug)]
pub enum InputError {
  #[error("第 {index} 帧无法解码: {reason}")]
  CorruptFrame { index: u64, reason: String },
  #[cfg(feature = "opencv")]
  #[error("OpenCV 错误: {0}")]
  OpenCvError(#[from] opencv::Error),
}

/// 帧来源：按解码顺序产生帧，直到结束。
///
/// 单帧损坏时产生 `Err`，调用方可以跳过后继续读取。
pub trait FrameSource: Iterator<Item = Result<Frame, InputError>> {
  /// 来源描述，用于日志
  fn describe(&self) -> String;
}
