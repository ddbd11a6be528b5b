//! 三種預測模型的轉接層。每個 adapter 擁有自己的模型，不共用狀態。

pub mod decomposition;
pub mod recurrent;
pub mod seasonal;

pub use decomposition::{DecompositionAdapter, DecompositionConfig, FittedDecomposition, SeasonalityMode};
pub use recurrent::{LstmNetwork, NetworkWeights, RecurrentAdapter, RecurrentConfig, Scaler};
pub use seasonal::{ArimaOrder, FittedSarima, SeasonalAdapter, SeasonalOrder};
