mod schema;

pub use schema::{
    AnalyticsFlowConfig, BrowserConfig, Config, DragFlowConfig, EditFlowConfig, FlowsConfig,
    OnFailure, OverlayConfig, ProbeConfig, RetryConfig, Viewport, WaitConfig,
};
