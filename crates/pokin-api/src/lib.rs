pub mod envelope;
pub mod error;
pub mod executor;
pub mod model;
pub mod request;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use envelope::{ApiPayload, decode_response};
pub use error::ApiError;
pub use executor::{ApiExecutor, ApiReply, Backend, Ticket};
pub use model::{
    Indicator, IndicatorPayload, LevelCount, NodePayload, NodeStatus, NodeType, PerformanceNode,
    Target, TargetPayload, ThemeSummary, find_in,
};
pub use request::{ApiRequest, HttpMethod, ResponseKind};
pub use reqwest::Url;
