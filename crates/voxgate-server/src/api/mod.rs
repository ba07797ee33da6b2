//! API routes and handlers

mod health;
mod llm;
mod transcribe;
mod tts;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Browser recordings can run to several MB.
const AUDIO_UPLOAD_LIMIT_BYTES: usize = 25 * 1024 * 1024;

/// Create the main API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route(
            "/transcribe",
            post(transcribe::transcribe).layer(DefaultBodyLimit::max(AUDIO_UPLOAD_LIMIT_BYTES)),
        )
        .route("/tts", post(tts::synthesize))
        .route("/llm/generate", post(llm::generate))
        .route("/llm/stream", post(llm::generate_stream))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::{FutureExt, StreamExt};
    use serde_json::{json, Value};
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;
    use voxgate_core::audio::{encode_pcm16, WavInfo};
    use voxgate_core::backends::{
        BackendRegistry, BackendTranscript, NeuralSynthesizer, SegmentStream, SpeechToText,
        SttLoader, Synthesizer, TtsLoader,
    };
    use voxgate_core::{Gateway, GatewayConfig};

    struct EchoStt {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SpeechToText for EchoStt {
        fn name(&self) -> &str {
            "echo"
        }

        fn requires_normalized_input(&self) -> bool {
            false
        }

        async fn transcribe(
            &self,
            _audio_path: &Path,
            language: &str,
        ) -> voxgate_core::Result<BackendTranscript> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(BackendTranscript {
                text: " turn on the lights ".to_string(),
                language: Some(language.to_string()),
                probability: Some(0.93),
            })
        }
    }

    struct ToneVoice;

    impl NeuralSynthesizer for ToneVoice {
        fn name(&self) -> &str {
            "tone"
        }

        fn sample_rate(&self) -> u32 {
            24_000
        }

        fn generate<'a>(&'a self, text: &'a str, _voice: &'a str, _speed: f32) -> SegmentStream<'a> {
            let segment = vec![0.25f32; text.len() * 10];
            futures::stream::iter(vec![Ok(segment.clone()), Ok(segment)]).boxed()
        }
    }

    struct TestServer {
        base: String,
        stt: Arc<EchoStt>,
        _scratch: TempDir,
    }

    async fn spawn_router(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    /// A stand-in for the local model server.
    async fn spawn_ollama() -> String {
        let router = Router::new().route(
            "/api/chat",
            post(|axum::Json(body): axum::Json<Value>| async move {
                let last = body["messages"]
                    .as_array()
                    .and_then(|m| m.last())
                    .and_then(|m| m["content"].as_str())
                    .unwrap_or_default()
                    .to_string();
                axum::Json(json!({
                    "model": body["model"],
                    "message": { "role": "assistant", "content": format!("echo: {last}") },
                    "prompt_eval_count": 10,
                    "eval_count": 3
                }))
            }),
        );
        spawn_router(router).await
    }

    async fn start() -> TestServer {
        let scratch = tempfile::tempdir().unwrap();
        let mut config = GatewayConfig::default();
        config.scratch_dir = scratch.path().to_path_buf();
        config.llm.ollama_base_url = spawn_ollama().await;

        let stt = Arc::new(EchoStt {
            calls: AtomicUsize::new(0),
        });
        let stt_loader: SttLoader = {
            let stt = stt.clone();
            Box::new(move || {
                let backend: Arc<dyn SpeechToText> = stt.clone();
                async move { Ok::<_, voxgate_core::Error>(backend) }.boxed()
            })
        };
        let tts_loader: TtsLoader = Box::new(|| {
            async {
                Ok::<_, voxgate_core::Error>(Arc::new(Synthesizer::Neural(Arc::new(ToneVoice))))
            }
            .boxed()
        });
        let registry = BackendRegistry::with_loaders("echo", stt_loader, "kokoro", tts_loader);
        let gateway = Gateway::with_registry(config, registry).unwrap();

        let base = spawn_router(create_router(AppState::new(gateway))).await;
        TestServer {
            base,
            stt,
            _scratch: scratch,
        }
    }

    fn audio_form(bytes: Vec<u8>, mime: &str) -> reqwest::multipart::Form {
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name("clip")
            .mime_str(mime)
            .unwrap();
        reqwest::multipart::Form::new().part("audio", part)
    }

    #[tokio::test]
    async fn health_reports_configuration() {
        let server = start().await;
        let body: Value = reqwest::get(format!("{}/health", server.base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(body["status"], "ok");
        assert_eq!(body["port"], 3002);
        assert_eq!(body["stt_model"], "small");
        assert_eq!(body["stt_backend"], "mlx");
        assert_eq!(body["tts_backend"], "kokoro");
        assert_eq!(body["llm_provider"], "ollama");
        assert_eq!(server.stt.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn transcribe_returns_transcript() {
        let server = start().await;
        let clip = encode_pcm16(&vec![0i16; 4_000], 16_000).unwrap();
        let response = reqwest::Client::new()
            .post(format!("{}/transcribe", server.base))
            .multipart(audio_form(clip, "audio/wav"))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["text"], "turn on the lights");
        assert_eq!(body["language"], "en");
        assert!((body["probability"].as_f64().unwrap() - 0.93).abs() < 1e-6);
    }

    #[tokio::test]
    async fn tiny_upload_gets_empty_transcript() {
        let server = start().await;
        let response = reqwest::Client::new()
            .post(format!("{}/transcribe", server.base))
            .multipart(audio_form(vec![1u8; 64], "audio/webm"))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body, json!({ "text": "", "language": "en", "probability": 0.0 }));
        assert_eq!(server.stt.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn transcribe_without_audio_field_is_rejected() {
        let server = start().await;
        let form = reqwest::multipart::Form::new().text("other", "value");
        let response = reqwest::Client::new()
            .post(format!("{}/transcribe", server.base))
            .multipart(form)
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 400);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body, json!({ "error": "No audio file provided" }));
    }

    #[tokio::test]
    async fn tts_returns_wav_bytes() {
        let server = start().await;
        let response = reqwest::Client::new()
            .post(format!("{}/tts", server.base))
            .json(&json!({ "text": "hey", "voice": "AF_Heart" }))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        assert_eq!(response.headers()["content-type"], "audio/wav");
        let bytes = response.bytes().await.unwrap();
        let info = WavInfo::parse(&bytes).unwrap();
        assert_eq!(info.sample_rate, 24_000);
        assert_eq!(info.sample_count(), 60);
    }

    #[tokio::test]
    async fn tts_without_text_is_rejected() {
        let server = start().await;
        let response = reqwest::Client::new()
            .post(format!("{}/tts", server.base))
            .json(&json!({ "text": "  " }))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 400);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["error"], "No text provided");
    }

    #[tokio::test]
    async fn llm_generate_round_trips_through_provider() {
        let server = start().await;
        let response = reqwest::Client::new()
            .post(format!("{}/llm/generate", server.base))
            .json(&json!({
                "systemInstruction": "You are terse.",
                "contents": [{ "role": "user", "parts": [{ "text": "ping" }] }]
            }))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        let body: Value = response.json().await.unwrap();
        assert_eq!(
            body,
            json!({
                "text": "echo: ping",
                "usage": { "promptTokenCount": 10, "candidatesTokenCount": 3 },
                "model": "llama3.1:8b",
                "provider": "ollama"
            })
        );
    }

    #[tokio::test]
    async fn llm_generate_without_persona_is_a_server_error() {
        let server = start().await;
        let response = reqwest::Client::new()
            .post(format!("{}/llm/generate", server.base))
            .json(&json!({ "contents": [] }))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 500);
        let body: Value = response.json().await.unwrap();
        assert!(body["error"]
            .as_str()
            .unwrap()
            .contains("systemInstruction is required"));
    }

    #[tokio::test]
    async fn llm_stream_without_persona_is_a_server_error() {
        let server = start().await;
        let response = reqwest::Client::new()
            .post(format!("{}/llm/stream", server.base))
            .json(&json!({ "systemInstruction": "   ", "contents": [] }))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 500);
        let body: Value = response.json().await.unwrap();
        assert!(body["error"]
            .as_str()
            .unwrap()
            .contains("persona prompt missing"));
    }

    #[tokio::test]
    async fn llm_stream_emits_ndjson_records() {
        let server = start().await;
        let response = reqwest::Client::new()
            .post(format!("{}/llm/stream", server.base))
            .json(&json!({
                "systemInstruction": "persona",
                "contents": [{ "role": "user", "parts": [{ "text": "x".repeat(40) }] }],
                "streamChunkSize": 24
            }))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        assert_eq!(response.headers()["content-type"], "application/x-ndjson");
        let body = response.text().await.unwrap();
        let records: Vec<Value> = body
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        // "echo: " + 40 chars = 46 chars -> 2 deltas + done
        assert_eq!(records.len(), 3);
        let text: String = records[..2]
            .iter()
            .map(|r| r["delta"].as_str().unwrap())
            .collect();
        assert_eq!(text, format!("echo: {}", "x".repeat(40)));
        assert_eq!(records[2]["done"], true);
        assert_eq!(records[2]["model"], "llama3.1:8b");
        assert_eq!(records[2]["usage"]["candidatesTokenCount"], 3);
    }
}
