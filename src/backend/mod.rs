//! Backend module - Pipeline trait and the HTTP inference client

pub mod http_backend;
pub mod traits;

pub use http_backend::HttpPipeline;
pub use traits::{GenerationParameters, Img2ImgPipeline, InferenceRequest};
