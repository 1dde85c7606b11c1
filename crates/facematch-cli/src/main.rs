use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use base64::Engine;
use clap::{Parser, Subcommand};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "facematch", about = "facematch face comparison CLI")]
struct Cli {
    /// Base URL of the facematchd server
    #[arg(long, env = "FACEMATCH_SERVER", default_value = "http://127.0.0.1:4000", global = true)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare the face at a URL with the face in a local image file
    Compare {
        /// Remote image URL (http:// or https://)
        #[arg(short, long)]
        url: String,
        /// Local image file to upload inline
        #[arg(short, long)]
        image: PathBuf,
    },
    /// Show daemon health
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let server = cli.server.trim_end_matches('/');

    let response = match cli.command {
        Commands::Compare { url, image } => {
            let bytes = tokio::fs::read(&image)
                .await
                .with_context(|| format!("failed to read {}", image.display()))?;
            tracing::debug!(path = %image.display(), bytes = bytes.len(), "uploading image");

            client
                .post(format!("{server}/compare"))
                .json(&json!({
                    "imageUrl": url,
                    "base64Image": data_url(&image, &bytes),
                }))
                .send()
                .await
        }
        Commands::Health => client.get(format!("{server}/health")).send().await,
    }
    .with_context(|| format!("failed to reach {server}"))?;

    let status = response.status();
    let body: Value = response.json().await.context("server returned a non-JSON body")?;
    println!("{}", serde_json::to_string_pretty(&body)?);

    if !status.is_success() {
        bail!("server answered {status}");
    }
    Ok(())
}

/// Encode `bytes` as a `data:image/<type>;base64,` URL, typed by file extension.
fn data_url(path: &Path, bytes: &[u8]) -> String {
    let kind = match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("jpg" | "jpeg") => "jpeg",
        Some("gif") => "gif",
        Some("webp") => "webp",
        Some("bmp") => "bmp",
        _ => "png",
    };
    let payload = base64::engine::general_purpose::STANDARD.encode(bytes);
    format!("data:image/{kind};base64,{payload}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_url_kind_from_extension() {
        assert_eq!(data_url(Path::new("me.JPG"), b"hi"), "data:image/jpeg;base64,aGk=");
        assert_eq!(data_url(Path::new("me.webp"), b"hi"), "data:image/webp;base64,aGk=");
        assert_eq!(data_url(Path::new("no_extension"), b"hi"), "data:image/png;base64,aGk=");
    }

    #[test]
    fn test_cli_parses_compare() {
        let cli = Cli::try_parse_from([
            "facematch",
            "--server",
            "http://localhost:9000",
            "compare",
            "--url",
            "https://example.com/a.jpg",
            "--image",
            "b.png",
        ])
        .unwrap();
        assert_eq!(cli.server, "http://localhost:9000");
        match cli.command {
            Commands::Compare { url, image } => {
                assert_eq!(url, "https://example.com/a.jpg");
                assert_eq!(image, PathBuf::from("b.png"));
            }
            Commands::Health => panic!("expected compare"),
        }
    }
}
