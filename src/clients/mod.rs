pub mod inference_client;

pub use inference_client::InferenceClient;
