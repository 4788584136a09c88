// Example: ask a hosted language model to describe the typography in an image
use std::fs;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use replicate_client::{ModelRunner, ReplicateClient};

const TEXT_MODEL: &str =
    "meta/meta-llama-3-70b-instruct:4b83ab0198ad37a14f287d35e64dd545f8c99f6c952713e88494a2a4a10cc657";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let client = match ReplicateClient::from_env() {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("\nPlease set your Replicate token:");
            eprintln!("  export REPLICATE_API_TOKEN=r8_...");
            return Ok(());
        }
    };

    let Some(image_path) = std::env::args().nth(1) else {
        eprintln!("Usage: cargo run -p replicate-client --example recognize_font <IMAGE_PATH>");
        return Ok(());
    };

    let image_bytes = fs::read(&image_path)?;
    println!("Loaded {} bytes from {}", image_bytes.len(), image_path);

    let mime = match image_path.rsplit('.').next().map(|ext| ext.to_lowercase()) {
        Some(ext) if ext == "jpg" || ext == "jpeg" => "image/jpeg",
        _ => "image/png",
    };

    let input = serde_json::json!({
        "prompt": "Identify the font family, weight and style of the text in this image, \
                   and suggest similar free fonts.",
        "image": format!("data:{};base64,{}", mime, STANDARD.encode(&image_bytes)),
        "max_tokens": 1500,
        "temperature": 0.3,
        "top_p": 0.9,
    });

    let output = client.run(TEXT_MODEL, input).await?;
    println!("\n{}", output.text());

    Ok(())
}
