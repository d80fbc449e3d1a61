// 该文件是 Cheliu （车流） 项目的一部分。
// src/upload.rs - 上传视频的落盘
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
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

/// 支持的视频容器格式
pub const VIDEO_EXTENSIONS: [&str; 4] = ["mp4", "mov", "avi", "mkv"];

#[derive(Error, Debug)]
pub enum UploadError {
  #[error("文件名无效: {0:?}")]
  InvalidName(String),
  #[error("不支持的视频格式: {0:?}")]
  UnsupportedFormat(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 上传文件的工作目录
#[derive(Debug, Clone)]
pub struct UploadStore {
  root: PathBuf,
}

impl UploadStore {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  /// 把上传的视频写入工作目录，返回保存路径。
  ///
  /// 只保留文件名部分，目录成分会被丢弃。
  pub fn persist(&self, name: &str, bytes: &[u8]) -> Result<PathBuf, UploadError> {
    let file_name = sanitize_file_name(name).ok_or_else(|| UploadError::InvalidName(name.to_string()))?;
    if !is_video_file(file_name) {
      return Err(UploadError::UnsupportedFormat(file_name.to_string()));
    }

    fs::create_dir_all(&self.root)?;
    let path = self.root.join(file_name);
    fs::write(&path, bytes)?;

    info!(
      "上传文件已保存: {} ({:.2} MB)",
      path.display(),
      bytes.len() as f64 / (1024.0 * 1024.0)
    );
    Ok(path)
  }
}

/// 扩展名是否属于支持的视频格式（不区分大小写）
pub fn is_video_file(name: &str) -> bool {
  Path::new(name)
    .extension()
    .and_then(|ext| ext.to_str())
    .is_some_and(|ext| {
      VIDEO_EXTENSIONS
        .iter()
        .any(|allowed| ext.eq_ignore_ascii_case(allowed))
    })
}

fn sanitize_file_name(name: &str) -> Option<&str> {
  let last = name.rsplit(['/', '\\']).next()?.trim();
  match last {
    "" | "." | ".." => None,
    _ => Some(last),
  }
}
