// 该文件是 Cheliu （车流） 项目的一部分。
// src/frame.rs - 视频帧与 NCHW 输入张量
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

use image::{RgbImage, imageops::FilterType};

const RGB_CHANNELS: usize = 3;
const PIXEL_SCALE: f32 = 1.0 / 255.0;

/// 帧数据
#[derive(Debug, Clone)]
pub struct Frame {
  /// 解码器报告的帧位置（从 1 开始）
  pub index: u64,
  /// RGB 图像数据
  pub image: RgbImage,
}

impl Frame {
  pub fn new(index: u64, image: RgbImage) -> Self {
    Self { index, image }
  }

  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }

  /// 宽或高为零的帧无法送入检测器
  pub fn is_empty(&self) -> bool {
    self.image.width() == 0 || self.image.height() == 0
  }
}

/// 网络输入张量，布局为 1×C×H×W，数值范围 [0, 1]
#[derive(Debug, Clone)]
pub struct NchwBlob {
  data: Box<[f32]>,
  height: usize,
  width: usize,
}

impl NchwBlob {
  pub fn with_shape(height: usize, width: usize) -> Self {
    let data = vec![0f32; RGB_CHANNELS * height * width].into_boxed_slice();
    Self {
      data,
      height,
      width,
    }
  }

  /// 缩放到 `width`×`height`（双线性，不裁剪，不保持宽高比），并乘以 1/255。
  ///
  /// 通道顺序与输入图像保持一致。
  pub fn from_image(image: &RgbImage, width: u32, height: u32) -> Self {
    let resized = image::imageops::resize(image, width, height, FilterType::Triangle);
    let mut blob = Self::with_shape(height as usize, width as usize);

    let plane = blob.height * blob.width;
    let row = blob.width;
    for (x, y, pixel) in resized.enumerate_pixels() {
      let offset = (y as usize) * row + (x as usize);
      for c in 0..RGB_CHANNELS {
        blob.data[c * plane + offset] = pixel[c] as f32 * PIXEL_SCALE;
      }
    }
    blob
  }

  pub fn channels(&self) -> usize {
    RGB_CHANNELS
  }

  pub fn height(&self) -> usize {
    self.height
  }

  pub fn width(&self) -> usize {
    self.width
  }

  pub fn as_slice(&self) -> &[f32] {
    &self.data
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;

  #[test]
  fn blob_has_nchw_shape_and_scaled_values() {
    let image = RgbImage::from_pixel(32, 24, Rgb([255, 0, 51]));
    let blob = NchwBlob::from_image(&image, 416, 416);

    assert_eq!(blob.channels(), 3);
    assert_eq!(blob.height(), 416);
    assert_eq!(blob.width(), 416);
    assert_eq!(blob.as_slice().len(), 3 * 416 * 416);

    let plane = 416 * 416;
    let data = blob.as_slice();
    assert!((data[0] - 1.0).abs() < 1e-6);
    assert!(data[plane].abs() < 1e-6);
    assert!((data[2 * plane] - 0.2).abs() < 1e-6);
  }

  #[test]
  fn zero_sized_frame_is_empty() {
    let frame = Frame::new(1, RgbImage::new(0, 10));
    assert!(frame.is_empty());
    let frame = Frame::new(1, RgbImage::new(4, 4));
    assert!(!frame.is_empty());
  }
}
