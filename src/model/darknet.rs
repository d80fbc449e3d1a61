// 该文件是 Cheliu （车流） 项目的一部分。
// src/model/darknet.rs - OpenCV DNN 加载的 Darknet YOLOv3
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

use std::path::Path;

use image::RgbImage;
use opencv::core::{CV_8UC3, CV_32F, Mat, Scalar, Size, Vector};
use opencv::dnn::{self, Net};
use opencv::prelude::*;
use tracing::{debug, info};

use super::{INPUT_SIZE, Model, ModelArtifacts, ModelError, OutputLayer};

pub struct DarknetModel {
  net: Net,
  output_names: Vector<String>,
}

fn path_str(path: &Path) -> Result<&str, ModelError> {
  path
    .to_str()
    .ok_or_else(|| ModelError::ModelPathError(path.display().to_string()))
}

impl DarknetModel {
  pub fn load(artifacts: &ModelArtifacts) -> Result<Self, ModelError> {
    let config = path_str(&artifacts.config)?;
    let weights = path_str(&artifacts.weights)?;

    info!("加载 Darknet 模型: {} / {}", config, weights);
    let mut net = dnn::read_net_from_darknet(config, weights)?;
    net.set_preferable_backend(dnn::DNN_BACKEND_OPENCV)?;
    net.set_preferable_target(dnn::DNN_TARGET_CPU)?;

    let output_names = net.get_unconnected_out_layers_names()?;
    if output_names.is_empty() {
      return Err(ModelError::NoOutputLayers);
    }
    debug!("模型输出层: {:?}", output_names);
    info!("模型加载完成");

    Ok(Self { net, output_names })
  }
}

/// RGB 图像转为 1x3x416x416 输入张量，双线性缩放并乘 1/255。
///
/// 帧已经是 RGB 顺序，所以不再交换通道。
pub fn rgb_to_blob(image: &RgbImage) -> Result<Mat, ModelError> {
  let (width, height) = image.dimensions();
  let mut mat =
    Mat::new_rows_cols_with_default(height as i32, width as i32, CV_8UC3, Scalar::all(0.0))?;
  mat.data_bytes_mut()?.copy_from_slice(image.as_raw());

  let size = Size::new(INPUT_SIZE as i32, INPUT_SIZE as i32);
  let blob = dnn::blob_from_image(&mat, 1.0 / 255.0, size, Scalar::default(), false, false, CV_32F)?;
  Ok(blob)
}

impl Model for DarknetModel {
  type Input = Mat;
  type Output = Vec<OutputLayer>;
  type Error = ModelError;

  fn preprocess(&self, image: &RgbImage) -> Result<Self::Input, Self::Error> {
    rgb_to_blob(image)
  }

  fn infer(&mut self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    self.net.set_input(input, "", 1.0, Scalar::default())?;

    let mut outputs = Vector::<Mat>::new();
    self.net.forward(&mut outputs, &self.output_names)?;

    outputs
      .iter()
      .map(|mat| -> Result<OutputLayer, ModelError> {
        let cols = mat.cols().max(0) as usize;
        let data = mat.data_typed::<f32>()?.to_vec();
        Ok(OutputLayer::new(cols, data))
      })
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;

  #[test]
  fn blob_has_nchw_shape_and_unit_scale() {
    let image = RgbImage::from_pixel(64, 48, Rgb([255, 0, 51]));
    let blob = rgb_to_blob(&image).unwrap();

    let shape: Vec<i32> = blob.mat_size().iter().copied().collect();
    assert_eq!(shape, vec![1, 3, INPUT_SIZE as i32, INPUT_SIZE as i32]);

    let data = blob.data_typed::<f32>().unwrap();
    let plane = INPUT_SIZE * INPUT_SIZE;
    assert!((data[0] - 1.0).abs() < 1e-6);
    assert!(data[plane].abs() < 1e-6);
    assert!((data[2 * plane] - 0.2).abs() < 1e-6);
  }

  #[test]
  fn blob_matches_linear_resize_on_uniform_image() {
    // 均匀图像在任何插值下都保持原值
    let image = RgbImage::from_pixel(1000, 10, Rgb([128, 128, 128]));
    let blob = rgb_to_blob(&image).unwrap();
    let data = blob.data_typed::<f32>().unwrap();
    assert!(data.iter().all(|v| (v - 128.0 / 255.0).abs() < 1e-6));
  }
}
