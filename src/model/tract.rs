// 该文件是 Huoyan （火眼） 项目的一部分。
// src/model/tract.rs - 基于 tract 的 ONNX 推理
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
use tract_onnx::prelude::*;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{NormalizedTensor, RawOutputTensor},
  model::Model,
};

const DEFAULT_INPUT_SIZE: u32 = 320;

#[derive(Error, Debug)]
pub enum TractModelError {
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
  #[error("模型加载错误: {0}")]
  ModelLoadError(String),
  #[error("输入尺寸不匹配: 模型 {expected}, 实际 {actual}")]
  InputSizeMismatch { expected: u32, actual: u32 },
  #[error("模型没有输出")]
  NoOutput,
  #[error("tract 错误: {0}")]
  TractError(String),
}

impl TractModelError {
  fn tract(err: TractError) -> Self {
    TractModelError::TractError(format!("{:#}", err))
  }
}

pub struct TractModelBuilder {
  model_path: String,
  input_size: u32,
}

impl FromUrlWithScheme for TractModelBuilder {
  const SCHEME: &'static str = "onnx";
}

impl FromUrl for TractModelBuilder {
  type Error = TractModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(TractModelError::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    if url.path().is_empty() {
      return Err(TractModelError::ModelPathError("模型路径为空".to_string()));
    }

    Ok(TractModelBuilder {
      model_path: url.path().to_string(),
      input_size: DEFAULT_INPUT_SIZE,
    })
  }
}

impl TractModelBuilder {
  pub fn new(model_path: impl Into<String>) -> Self {
    Self {
      model_path: model_path.into(),
      input_size: DEFAULT_INPUT_SIZE,
    }
  }

  pub fn input_size(mut self, input_size: u32) -> Self {
    self.input_size = input_size;
    self
  }

  pub fn build(self) -> Result<TractModel, TractModelError> {
    info!("加载模型文件: {}", self.model_path);
    let size = self.input_size as usize;

    let plan = tract_onnx::onnx()
      .model_for_path(&self.model_path)
      .map_err(|e| TractModelError::ModelLoadError(format!("{}: {:#}", self.model_path, e)))?
      .with_input_fact(
        0,
        InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, size, size)),
      )
      .map_err(TractModelError::tract)?
      .into_optimized()
      .map_err(TractModelError::tract)?
      .into_runnable()
      .map_err(TractModelError::tract)?;

    info!("模型加载完成, 输入尺寸 {}x{}", size, size);

    Ok(TractModel {
      plan,
      input_size: self.input_size,
    })
  }
}

pub struct TractModel {
  plan: SimplePlan<TypedFact, Box<dyn TypedOp>, TypedModel>,
  input_size: u32,
}

impl TractModel {
  pub fn input_size(&self) -> u32 {
    self.input_size
  }
}

impl Model for TractModel {
  type Error = TractModelError;

  fn infer(&self, input: NormalizedTensor) -> Result<RawOutputTensor, Self::Error> {
    if input.size() != self.input_size {
      return Err(TractModelError::InputSizeMismatch {
        expected: self.input_size,
        actual: input.size(),
      });
    }

    let shape = input.shape();
    let tensor = Tensor::from_shape(&shape, input.as_slice()).map_err(TractModelError::tract)?;

    debug!("执行模型推理");
    let outputs = self
      .plan
      .run(tvec!(tensor.into()))
      .map_err(TractModelError::tract)?;

    let output = outputs.first().ok_or(TractModelError::NoOutput)?;
    let view = output
      .to_array_view::<f32>()
      .map_err(TractModelError::tract)?;

    let shape = view.shape().to_vec();
    debug!("模型输出形状: {:?}", shape);

    RawOutputTensor::new(view.iter().copied().collect(), shape)
      .map_err(|e| TractModelError::TractError(e.to_string()))
  }
}
