pub mod analyze_ctx;
pub mod analyze_flow;

pub use analyze_ctx::AnalyzeCtx;
pub use analyze_flow::AnalyzeFlow;
