mod chat;
mod export;
mod font;
mod health;
mod modify_image;
mod vectorize;

pub use chat::{chat_handler, ChatRequest, ChatResponse};
pub use export::{export_handler, ExportRequest};
pub use font::{recognize_font_handler, FontResponse};
pub use health::{health_check, HealthResponse};
pub use modify_image::{modify_image_handler, ModifyImageResponse};
pub use vectorize::{vectorize_handler, VectorizeMode, VectorizeResponse};
