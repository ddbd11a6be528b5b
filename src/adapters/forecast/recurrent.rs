//! 遞迴神經網路 (多步視窗) 預測，前向計算交給 `candle`。
//!
//! 權重檔為 JSON：堆疊的 LSTM 層 (kernel 形狀 `[input][4·units]`、recurrent_kernel
//! `[units][4·units]`、bias `[4·units]`，閘門順序 input/forget/cell/output)，
//! 最後接一層 dense 把最後一個隱藏狀態轉成全部未來步。

use crate::config::settings::RecurrentSettings;
use crate::domain::calendar::{next_month_start, Frequency};
use crate::domain::model::{ForecastResult, TimeSeries};
use crate::domain::ports::SequenceModel;
use crate::utils::error::{ForecastError, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::{LSTMConfig, Linear, Module, VarBuilder, LSTM, RNN};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LstmLayer {
    pub kernel: Vec<Vec<f64>>,
    pub recurrent_kernel: Vec<Vec<f64>>,
    pub bias: Vec<f64>,
}

impl LstmLayer {
    pub fn units(&self) -> usize {
        self.bias.len() / 4
    }

    fn check(&self, index: usize, input_dim: usize) -> Result<()> {
        let units = self.units();
        let width = 4 * units;
        let malformed = |what: &str| -> Result<()> {
            Err(ForecastError::model(format!(
                "LSTM layer {}: {} has the wrong shape",
                index, what
            )))
        };
        if units == 0 || self.bias.len() != width {
            return malformed("bias");
        }
        if self.kernel.len() != input_dim || self.kernel.iter().any(|row| row.len() != width) {
            return malformed("kernel");
        }
        if self.recurrent_kernel.len() != units
            || self.recurrent_kernel.iter().any(|row| row.len() != width)
        {
            return malformed("recurrent_kernel");
        }
        Ok(())
    }

    /// 轉成 candle 的 LSTM；kernel 轉置成 `[4·units, input]`，bias 全放在輸入側。
    fn build(&self, input_dim: usize, device: &Device) -> Result<LSTM> {
        let width = 4 * self.units();
        let mut tensors = HashMap::new();
        tensors.insert("weight_ih_l0".to_string(), transposed(&self.kernel, device)?);
        tensors.insert("weight_hh_l0".to_string(), transposed(&self.recurrent_kernel, device)?);
        tensors.insert("bias_ih_l0".to_string(), Tensor::from_slice(&self.bias, width, device)?);
        tensors.insert("bias_hh_l0".to_string(), Tensor::zeros(width, DType::F64, device)?);
        let vb = VarBuilder::from_tensors(tensors, DType::F64, device);
        Ok(candle_nn::lstm(input_dim, self.units(), LSTMConfig::default(), vb)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseLayer {
    pub kernel: Vec<Vec<f64>>,
    pub bias: Vec<f64>,
}

impl DenseLayer {
    fn build(&self, device: &Device) -> Result<Linear> {
        let bias = Tensor::from_slice(&self.bias, self.bias.len(), device)?;
        Ok(Linear::new(transposed(&self.kernel, device)?, Some(bias)))
    }
}

/// `[rows][cols]` 轉成形狀 `[cols, rows]` 的張量。
fn transposed(rows: &[Vec<f64>], device: &Device) -> Result<Tensor> {
    let cols = rows.first().map(Vec::len).unwrap_or(0);
    let flat: Vec<f64> = rows.iter().flatten().copied().collect();
    Ok(Tensor::from_vec(flat, (rows.len(), cols), device)?.t()?.contiguous()?)
}

/// 權重檔的內容。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkWeights {
    pub layers: Vec<LstmLayer>,
    pub dense: DenseLayer,
}

impl NetworkWeights {
    fn check(&self) -> Result<()> {
        if self.layers.is_empty() {
            return Err(ForecastError::model("network has no LSTM layers"));
        }
        let mut input_dim = 1;
        for (i, layer) in self.layers.iter().enumerate() {
            layer.check(i, input_dim)?;
            input_dim = layer.units();
        }
        if self.dense.bias.is_empty()
            || self.dense.kernel.len() != input_dim
            || self.dense.kernel.iter().any(|row| row.len() != self.dense.bias.len())
        {
            return Err(ForecastError::model("dense layer shape does not match the last LSTM layer"));
        }
        Ok(())
    }
}

/// 已訓練好的 LSTM 網路 (只做前向計算，CPU)。
#[derive(Debug, Clone)]
pub struct LstmNetwork {
    weights: NetworkWeights,
    lstms: Vec<LSTM>,
    head: Linear,
    device: Device,
}

impl LstmNetwork {
    pub fn new(layers: Vec<LstmLayer>, dense: DenseLayer) -> Result<Self> {
        Self::from_weights(NetworkWeights { layers, dense })
    }

    pub fn from_weights(weights: NetworkWeights) -> Result<Self> {
        weights.check()?;
        let device = Device::Cpu;
        let mut lstms = Vec::with_capacity(weights.layers.len());
        let mut input_dim = 1;
        for layer in &weights.layers {
            lstms.push(layer.build(input_dim, &device)?);
            input_dim = layer.units();
        }
        let head = weights.dense.build(&device)?;
        Ok(Self {
            weights,
            lstms,
            head,
            device,
        })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_weights(serde_json::from_slice(bytes)?)
    }

    pub fn weights(&self) -> &NetworkWeights {
        &self.weights
    }

    pub fn layer_count(&self) -> usize {
        self.lstms.len()
    }
}

impl SequenceModel for LstmNetwork {
    fn predict(&self, window: &[f64]) -> Result<Vec<f64>> {
        if window.is_empty() {
            return Err(ForecastError::model("empty input window"));
        }
        // [batch = 1, 時間步, 特徵 = 1]
        let mut sequence = Tensor::from_slice(window, (1, window.len(), 1), &self.device)?;
        let mut last_hidden = None;
        for lstm in &self.lstms {
            let states = lstm.seq(&sequence)?;
            sequence = lstm.states_to_tensor(&states)?;
            last_hidden = states.last().map(|state| state.h().clone());
        }
        let hidden = last_hidden.ok_or_else(|| ForecastError::model("network produced no hidden state"))?;
        Ok(self.head.forward(&hidden)?.flatten_all()?.to_vec1::<f64>()?)
    }

    fn output_len(&self) -> usize {
        self.weights.dense.bias.len()
    }
}

fn unit_range() -> (f64, f64) {
    (0.0, 1.0)
}

/// 訓練時擬合好的縮放轉換，只載入不重新擬合。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Scaler {
    MinMax {
        data_min: f64,
        data_max: f64,
        #[serde(default = "unit_range")]
        feature_range: (f64, f64),
    },
    Standard {
        mean: f64,
        std: f64,
    },
}

impl Scaler {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    fn min_max_scale(data_min: f64, data_max: f64, feature_range: (f64, f64)) -> f64 {
        let span = data_max - data_min;
        // 常數特徵當作範圍 1
        let span = if span == 0.0 { 1.0 } else { span };
        (feature_range.1 - feature_range.0) / span
    }

    fn std_or_one(std: f64) -> f64 {
        if std == 0.0 {
            1.0
        } else {
            std
        }
    }

    pub fn transform(&self, value: f64) -> f64 {
        match *self {
            Scaler::MinMax {
                data_min,
                data_max,
                feature_range,
            } => (value - data_min) * Self::min_max_scale(data_min, data_max, feature_range) + feature_range.0,
            Scaler::Standard { mean, std } => (value - mean) / Self::std_or_one(std),
        }
    }

    pub fn inverse(&self, value: f64) -> f64 {
        match *self {
            Scaler::MinMax {
                data_min,
                data_max,
                feature_range,
            } => (value - feature_range.0) / Self::min_max_scale(data_min, data_max, feature_range) + data_min,
            Scaler::Standard { mean, std } => value * Self::std_or_one(std) + mean,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecurrentConfig {
    pub input_length: usize,
    pub output_length: usize,
}

impl Default for RecurrentConfig {
    fn default() -> Self {
        Self {
            input_length: 12,
            output_length: 6,
        }
    }
}

impl From<&RecurrentSettings> for RecurrentConfig {
    fn from(settings: &RecurrentSettings) -> Self {
        Self {
            input_length: settings.input_length,
            output_length: settings.output_length,
        }
    }
}

/// 以固定長度的尾端視窗一次預測 `output_length` 步。
#[derive(Debug, Clone)]
pub struct RecurrentAdapter<M: SequenceModel = LstmNetwork> {
    model: M,
    scaler: Scaler,
    config: RecurrentConfig,
}

impl<M: SequenceModel> RecurrentAdapter<M> {
    pub fn new(model: M, scaler: Scaler, config: RecurrentConfig) -> Result<Self> {
        if config.input_length == 0 || config.output_length == 0 {
            return Err(ForecastError::config("input_length and output_length must be at least 1"));
        }
        if model.output_len() != config.output_length {
            return Err(ForecastError::model(format!(
                "model produces {} steps but output_length is {}",
                model.output_len(),
                config.output_length
            )));
        }
        Ok(Self {
            model,
            scaler,
            config,
        })
    }

    pub fn config(&self) -> RecurrentConfig {
        self.config
    }

    pub fn forecast(&self, series: &TimeSeries, cutoff: Option<NaiveDate>) -> Result<ForecastResult> {
        let series = match cutoff {
            Some(cutoff) => series.until(cutoff),
            None => series.clone(),
        };
        let needed = self.config.input_length;
        if series.len() < needed {
            return Err(ForecastError::InsufficientHistory {
                needed,
                got: series.len(),
            });
        }
        let last_date = series
            .last_date()
            .ok_or_else(|| ForecastError::data("empty series"))?;

        let values = series.values();
        let window: Vec<f64> = values[values.len() - needed..]
            .iter()
            .map(|&v| self.scaler.transform(v))
            .collect();

        let scaled = self.model.predict(&window)?;
        if scaled.len() != self.config.output_length {
            return Err(ForecastError::model(format!(
                "model returned {} steps, expected {}",
                scaled.len(),
                self.config.output_length
            )));
        }
        let predictions: Vec<f64> = scaled.into_iter().map(|v| self.scaler.inverse(v)).collect();

        let dates = Frequency::MonthStart.range(next_month_start(last_date)?, self.config.output_length)?;
        tracing::debug!(
            "Recurrent forecast from window ending {}: {:?}",
            last_date,
            predictions
        );
        ForecastResult::from_values(dates, predictions)
    }
}

impl RecurrentAdapter<LstmNetwork> {
    pub fn from_artifacts(model_bytes: &[u8], scaler_bytes: &[u8], config: RecurrentConfig) -> Result<Self> {
        let network = LstmNetwork::from_bytes(model_bytes)?;
        let scaler = Scaler::from_bytes(scaler_bytes)?;
        tracing::info!(
            "Loaded recurrent network: {} LSTM layer(s), {} output steps",
            network.layer_count(),
            network.output_len()
        );
        Self::new(network, scaler, config)
    }

    pub fn load(
        model_path: impl AsRef<Path>,
        scaler_path: impl AsRef<Path>,
        config: RecurrentConfig,
    ) -> Result<Self> {
        let model_bytes = std::fs::read(model_path.as_ref())?;
        let scaler_bytes = std::fs::read(scaler_path.as_ref())?;
        Self::from_artifacts(&model_bytes, &scaler_bytes, config)
    }
}
