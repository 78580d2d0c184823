pub mod model;
pub mod pipeline;
pub mod types;

pub use model::{AdditiveModel, ForecastModel};
pub use pipeline::{run_forecast, training_series};
pub use types::*;
