// 该文件是 Cheliu （车流） 项目的一部分。
// src/model/artifacts.rs - 模型文件获取
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

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};
use url::Url;

/// YOLOv3 权重文件
pub const WEIGHTS_URL: &str = "https://pjreddie.com/media/files/yolov3.weights";
/// YOLOv3 网络结构文件
pub const CONFIG_URL: &str = "https://raw.githubusercontent.com/pjreddie/darknet/master/cfg/yolov3.cfg";

#[derive(Error, Debug)]
pub enum ArtifactError {
  #[error("URL 无效: {0}")]
  InvalidUrl(#[from] url::ParseError),
  #[error("无法从 URL 推断文件名: {0}")]
  MissingFileName(String),
  #[error("下载 {url} 失败: {source}")]
  Download {
    url: String,
    #[source]
    source: Box<ureq::Error>,
  },
  #[error("下载内容为空: {0}")]
  EmptyDownload(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] io::Error),
}

/// 下载器，把 `url` 的内容写入 `dest`，返回写入的字节数
pub trait Fetch {
  fn fetch(&self, url: &Url, dest: &Path) -> Result<u64, ArtifactError>;
}

/// 基于 ureq 的阻塞 HTTP 下载
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpFetch;

impl Fetch for HttpFetch {
  fn fetch(&self, url: &Url, dest: &Path) -> Result<u64, ArtifactError> {
    let response = ureq::get(url.as_str())
      .call()
      .map_err(|e| ArtifactError::Download {
        url: url.to_string(),
        source: Box::new(e),
      })?;

    write_partial(&mut response.into_reader(), url, dest)
  }
}

fn partial_path(dest: &Path) -> PathBuf {
  let mut partial = dest.as_os_str().to_owned();
  partial.push(".part");
  PathBuf::from(partial)
}

/// 先写入 `<dest>.part`，完整写完后再改名。失败时不留下残缺文件。
fn write_partial<R: Read>(reader: &mut R, url: &Url, dest: &Path) -> Result<u64, ArtifactError> {
  let partial = partial_path(dest);

  let copied = File::create(&partial).and_then(|mut file| {
    let written = io::copy(reader, &mut file)?;
    file.sync_all()?;
    Ok(written)
  });
  let written = match copied {
    Ok(written) => written,
    Err(e) => {
      let _ = fs::remove_file(&partial);
      return Err(e.into());
    }
  };

  if written == 0 {
    fs::remove_file(&partial)?;
    return Err(ArtifactError::EmptyDownload(url.to_string()));
  }

  fs::rename(&partial, dest)?;
  Ok(written)
}

/// 本地的 darknet 模型文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelArtifacts {
  pub weights: PathBuf,
  pub config: PathBuf,
}

impl ModelArtifacts {
  /// 确保 `dir` 下存在权重与网络结构文件，缺失时从固定地址下载。
  pub fn ensure(dir: impl AsRef<Path>) -> Result<Self, ArtifactError> {
    Self::ensure_with(dir, WEIGHTS_URL, CONFIG_URL, &HttpFetch)
  }

  pub fn ensure_with<F: Fetch>(
    dir: impl AsRef<Path>,
    weights_url: &str,
    config_url: &str,
    fetcher: &F,
  ) -> Result<Self, ArtifactError> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;

    let weights = ensure_file(dir, &Url::parse(weights_url)?, fetcher)?;
    let config = ensure_file(dir, &Url::parse(config_url)?, fetcher)?;

    Ok(Self { weights, config })
  }
}

fn file_name(url: &Url) -> Result<&str, ArtifactError> {
  url
    .path_segments()
    .and_then(|mut segments| segments.next_back())
    .filter(|name| !name.is_empty())
    .ok_or_else(|| ArtifactError::MissingFileName(url.to_string()))
}

fn ensure_file<F: Fetch>(dir: &Path, url: &Url, fetcher: &F) -> Result<PathBuf, ArtifactError> {
  let path = dir.join(file_name(url)?);
  if path.is_file() {
    debug!("使用本地模型文件: {}", path.display());
    return Ok(path);
  }

  info!("下载模型文件: {} -> {}", url, path.display());
  let size = fetcher.fetch(url, &path)?;
  info!(
    "下载完成: {} ({:.2} MB)",
    path.display(),
    size as f64 / (1024.0 * 1024.0)
  );
  Ok(path)
}
