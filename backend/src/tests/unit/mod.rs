pub mod engine;
pub mod http;
pub mod jobs;
pub mod lifecycle;
pub mod pipeline;
