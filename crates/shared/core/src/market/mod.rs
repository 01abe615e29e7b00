//! Bar/candle model: periods, candles, series and the Heikin-Ashi transform

mod candle;
mod heikin_ashi;
mod series;

pub use candle::{CandleItem, CandlePeriod};
pub use series::CandleSeries;
