// 该文件是 Cheliu （车流） 项目的一部分。
// src/input/video_file.rs - OpenCV 视频文件输入
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

use std::path::{Path, PathBuf};

use image::RgbImage;
use opencv::core::Mat;
use opencv::imgproc;
use opencv::prelude::*;
use opencv::videoio::{self, VideoCapture};
use tracing::{debug, info, warn};

use super::{FrameSource, InputError};
use crate::frame::Frame;

/// 视频文件输入源。
///
/// 文件无法打开时不会报错，而是得到一个空序列。
pub struct VideoFileInput {
  path: PathBuf,
  capture: Option<VideoCapture>,
  /// 已读取的帧数
  decoded: u64,
}

impl VideoFileInput {
  pub fn open(path: impl AsRef<Path>) -> Self {
    let path = path.as_ref().to_path_buf();
    let capture = open_capture(&path);
    if capture.is_some() {
      info!("视频已打开: {}", path.display());
    }

    Self {
      path,
      capture,
      decoded: 0,
    }
  }

  pub fn is_opened(&self) -> bool {
    self.capture.is_some()
  }

  fn release(&mut self) {
    if let Some(mut capture) = self.capture.take() {
      if let Err(e) = capture.release() {
        warn!("释放视频句柄失败: {}", e);
      }
      debug!("视频已关闭: {} (共 {} 帧)", self.path.display(), self.decoded);
    }
  }
}

fn open_capture(path: &Path) -> Option<VideoCapture> {
  let Some(path_str) = path.to_str() else {
    warn!("视频路径不是有效的 UTF-8: {}", path.display());
    return None;
  };

  match VideoCapture::from_file(path_str, videoio::CAP_ANY) {
    Ok(capture) => match capture.is_opened() {
      Ok(true) => Some(capture),
      Ok(false) => {
        warn!("无法打开视频文件: {}", path.display());
        None
      }
      Err(e) => {
        warn!("无法打开视频文件: {}: {}", path.display(), e);
        None
      }
    },
    Err(e) => {
      warn!("无法打开视频文件: {}: {}", path.display(), e);
      None
    }
  }
}

fn bgr_to_rgb_image(mat: &Mat, index: u64) -> Result<RgbImage, InputError> {
  let mut rgb = Mat::default();
  imgproc::cvt_color_def(mat, &mut rgb, imgproc::COLOR_BGR2RGB)?;
  let rgb = if rgb.is_continuous() {
    rgb
  } else {
    rgb.try_clone()?
  };

  let (width, height) = (rgb.cols().max(0) as u32, rgb.rows().max(0) as u32);
  let data = rgb.data_bytes()?.to_vec();
  RgbImage::from_raw(width, height, data).ok_or_else(|| InputError::CorruptFrame {
    index,
    reason: format!("像素数据与尺寸 {}x{} 不符", width, height),
  })
}

impl Iterator for VideoFileInput {
  type Item = Result<Frame, InputError>;

  fn next(&mut self) -> Option<Self::Item> {
    let capture = self.capture.as_mut()?;

    let mut mat = Mat::default();
    let grabbed = match capture.read(&mut mat) {
      Ok(grabbed) => grabbed && !mat.empty(),
      Err(e) => {
        warn!("读取视频帧失败，结束读取: {}", e);
        false
      }
    };
    if !grabbed {
      self.release();
      return None;
    }

    self.decoded += 1;
    let position = capture.get(videoio::CAP_PROP_POS_FRAMES).unwrap_or(0.0);
    let index = if position >= 1.0 {
      position as u64
    } else {
      self.decoded
    };

    Some(bgr_to_rgb_image(&mat, index).map(|image| Frame::new(index, image)))
  }
}

impl FrameSource for VideoFileInput {
  fn describe(&self) -> String {
    self.path.display().to_string()
  }
}

impl Drop for VideoFileInput {
  fn drop(&mut self) {
    self.release();
  }
}
