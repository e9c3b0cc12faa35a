//! Vendor Adapter Integration Tests
//!
//! Runs each HTTP adapter against a local axum server that imitates the
//! vendor proxy routes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{Response, StatusCode};
use axum::routing::post;
use axum::Router;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::net::TcpListener;

use parley::adapters::{
    ChatClient, ChatEndpoint, ChatRequest, DeepgramTranscriber, DispatchError, HttpSynthesizer,
    SynthesisError, Synthesizer, Transcriber, TranscriptionError, WhisperTranscriber,
};
use parley::core::{fragments, SpeechSynthesisGateway, TranscriptionGateway};
use parley::domain::{AudioClip, Message, TtsRequest, TtsVendor};

/// Serve `app` on an ephemeral port and return its base URL
async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn respond(status: u16, content_type: &'static str, body: impl Into<Body>) -> Response<Body> {
    Response::builder()
        .status(status)
        .header("Content-Type", content_type)
        .body(body.into())
        .unwrap()
}

fn clip() -> AudioClip {
    AudioClip::webm(vec![7u8; 2048])
}

type Captured = Arc<Mutex<Option<Bytes>>>;

/// Route that records the request body and replies with a fixed response
fn recording_route(
    path: &str,
    captured: Captured,
    status: u16,
    content_type: &'static str,
    body: &'static str,
) -> Router {
    Router::new().route(
        path,
        post(move |request: Bytes| {
            let captured = captured.clone();
            async move {
                *captured.lock() = Some(request);
                respond(status, content_type, body)
            }
        }),
    )
}

// ---------------------------------------------------------------------------
// Whisper
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_whisper_sends_multipart_and_reads_text() {
    let captured: Captured = Arc::default();
    let base = serve(recording_route(
        "/api/whisper",
        captured.clone(),
        200,
        "application/json",
        r#"{"text":"  hello there  ","duration":1.5}"#,
    ))
    .await;

    let whisper = WhisperTranscriber::new(format!("{}/api/whisper", base))
        .with_prompt(Some("Fitness coaching".to_string()))
        .with_language(Some("en".to_string()));
    let transcript = whisper.transcribe(&clip()).await.unwrap();

    assert_eq!(transcript.text, "hello there");
    assert_eq!(transcript.duration_seconds, Some(1.5));

    let body = captured.lock().clone().unwrap();
    let body = String::from_utf8_lossy(&body);
    assert!(body.contains(r#"name="file""#));
    assert!(body.contains(r#"name="prompt""#));
    assert!(body.contains("Fitness coaching"));
    assert!(body.contains(r#"name="language""#));
}

#[tokio::test]
async fn test_whisper_translation_error_is_unsupported() {
    let captured: Captured = Arc::default();
    let base = serve(recording_route(
        "/api/whisper",
        captured,
        400,
        "application/json",
        r#"{"error":{"message":"Translation is not supported for this format"}}"#,
    ))
    .await;

    let whisper = WhisperTranscriber::new(format!("{}/api/whisper", base));
    let result = whisper.transcribe(&clip()).await;

    assert!(
        matches!(result, Err(TranscriptionError::Unsupported(_))),
        "expected Unsupported, got {:?}",
        result
    );
}

#[tokio::test]
async fn test_whisper_other_400_is_status_error() {
    let captured: Captured = Arc::default();
    let base = serve(recording_route(
        "/api/whisper",
        captured,
        400,
        "application/json",
        r#"{"error":{"message":"file too large"}}"#,
    ))
    .await;

    let whisper = WhisperTranscriber::new(format!("{}/api/whisper", base));
    match whisper.transcribe(&clip()).await {
        Err(TranscriptionError::Status { status, body }) => {
            assert_eq!(status, 400);
            assert!(body.contains("file too large"));
        }
        other => panic!("expected Status error, got {:?}", other),
    }
}

// ---------------------------------------------------------------------------
// Deepgram and the gateway
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_deepgram_reads_transcript_field() {
    let captured: Captured = Arc::default();
    let base = serve(recording_route(
        "/api/deepgram",
        captured.clone(),
        200,
        "application/json",
        r#"{"transcript":"from the fallback"}"#,
    ))
    .await;

    let deepgram = DeepgramTranscriber::new(format!("{}/api/deepgram", base));
    let transcript = deepgram.transcribe(&clip()).await.unwrap();

    assert_eq!(transcript.text, "from the fallback");
    let body = captured.lock().clone().unwrap();
    assert!(String::from_utf8_lossy(&body).contains(r#"name="audio""#));
}

#[tokio::test]
async fn test_gateway_falls_back_after_primary_timeout() {
    let app = Router::new()
        .route(
            "/api/whisper",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                respond(200, "application/json", r#"{"text":"too late"}"#)
            }),
        )
        .route(
            "/api/deepgram",
            post(|| async { respond(200, "application/json", r#"{"transcript":"in time"}"#) }),
        );
    let base = serve(app).await;

    let gateway = TranscriptionGateway::new(
        Arc::new(WhisperTranscriber::new(format!("{}/api/whisper", base))),
        Arc::new(DeepgramTranscriber::new(format!("{}/api/deepgram", base))),
    )
    .with_timeout(Duration::from_millis(200));

    let outcome = gateway.transcribe_detailed(&clip()).await;

    assert_eq!(outcome.text, "in time");
    assert_eq!(outcome.vendor.as_deref(), Some("deepgram"));
    assert!(outcome.used_fallback());
    assert_eq!(gateway.transcript(), "in time");
}

#[tokio::test]
async fn test_gateway_timeout_and_empty_secondary_yields_empty() {
    let app = Router::new()
        .route(
            "/api/whisper",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                respond(200, "application/json", r#"{"text":"too late"}"#)
            }),
        )
        .route(
            "/api/deepgram",
            post(|| async { respond(200, "application/json", r#"{"transcript":""}"#) }),
        );
    let base = serve(app).await;

    let gateway = TranscriptionGateway::new(
        Arc::new(WhisperTranscriber::new(format!("{}/api/whisper", base))),
        Arc::new(DeepgramTranscriber::new(format!("{}/api/deepgram", base))),
    )
    .with_timeout(Duration::from_millis(200));

    assert_eq!(gateway.transcribe(&clip()).await, "");
}

// ---------------------------------------------------------------------------
// Text to speech
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_tts_posts_text_and_voice_id() {
    let captured: Captured = Arc::default();
    let base = serve(recording_route(
        "/api/elevenlabs",
        captured.clone(),
        200,
        "audio/mpeg",
        "ID3-fake-mp3-bytes",
    ))
    .await;

    let tts = HttpSynthesizer::elevenlabs(format!("{}/api/elevenlabs", base));
    let audio = tts.synthesize("Hi!", Some("voice-42")).await.unwrap();
    assert_eq!(audio, b"ID3-fake-mp3-bytes");

    let body = captured.lock().clone().unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["text"], "Hi!");
    assert_eq!(json["voiceId"], "voice-42");
}

#[tokio::test]
async fn test_tts_omits_missing_voice_id() {
    let captured: Captured = Arc::default();
    let base = serve(recording_route("/api/hume", captured.clone(), 200, "audio/mpeg", "mp3")).await;

    let tts = HttpSynthesizer::hume(format!("{}/api/hume", base));
    tts.synthesize("plain", None).await.unwrap();

    let body = captured.lock().clone().unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(json.get("voiceId").is_none());
}

#[tokio::test]
async fn test_tts_422_surfaces_validation_detail() {
    let captured: Captured = Arc::default();
    let base = serve(recording_route(
        "/api/elevenlabs",
        captured,
        422,
        "application/json",
        r#"{"detail":"text exceeds 5000 characters"}"#,
    ))
    .await;

    let tts = HttpSynthesizer::elevenlabs(format!("{}/api/elevenlabs", base));
    match tts.synthesize("x", None).await {
        Err(SynthesisError::Validation { vendor, detail }) => {
            assert_eq!(vendor, TtsVendor::ElevenLabs);
            assert_eq!(detail, "text exceeds 5000 characters");
        }
        other => panic!("expected Validation error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_tts_empty_body_is_an_error() {
    let captured: Captured = Arc::default();
    let base = serve(recording_route("/api/hume", captured, 200, "audio/mpeg", "")).await;

    let tts = HttpSynthesizer::hume(format!("{}/api/hume", base));
    assert!(matches!(
        tts.synthesize("x", None).await,
        Err(SynthesisError::EmptyAudio(TtsVendor::Hume))
    ));
}

#[tokio::test]
async fn test_gateway_retries_empty_elevenlabs_body() {
    let calls = Arc::new(AtomicUsize::new(0));
    let bodies: Arc<Mutex<Vec<String>>> = Arc::default();
    let app = Router::new().route(
        "/api/elevenlabs",
        post({
            let calls = calls.clone();
            let bodies = bodies.clone();
            move |request: Bytes| async move {
                let json: serde_json::Value = serde_json::from_slice(&request).unwrap();
                bodies.lock().push(json["text"].as_str().unwrap_or_default().to_string());
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    respond(200, "audio/mpeg", Vec::<u8>::new())
                } else {
                    respond(200, "audio/mpeg", vec![1u8; 20_000])
                }
            }
        }),
    );
    let base = serve(app).await;

    let gateway = SpeechSynthesisGateway::new().with_synthesizer(Arc::new(
        HttpSynthesizer::elevenlabs(format!("{}/api/elevenlabs", base)),
    ));
    let out = gateway
        .synthesize_detailed(&TtsRequest::new("[laughs] Hi!", TtsVendor::ElevenLabs))
        .await
        .unwrap();

    assert!(out.retried);
    assert_eq!(out.audio.len(), 20_000);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(*bodies.lock(), vec!["<speak>Hi!</speak>", "Hi!"]);
}

// ---------------------------------------------------------------------------
// Chat completion
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_chat_streams_body_and_sends_system_prompt() {
    let captured: Captured = Arc::default();
    let base = serve(recording_route(
        "/api/chat",
        captured.clone(),
        200,
        "text/plain",
        "0:\"Hi\"\n0:\"!\"\ne:{\"finishReason\":\"stop\"}\n",
    ))
    .await;

    let client = ChatClient::new(format!("{}/api/chat", base));
    let messages = vec![Message::user("Hello there")];
    let request = ChatRequest::new(&messages).with_system_prompt("Be brief.");

    let body = client.stream(&request).await.unwrap();
    let text: Vec<String> = fragments(body)
        .map(|fragment| fragment.unwrap())
        .collect()
        .await;
    assert_eq!(text.concat(), "Hi!");

    let sent = captured.lock().clone().unwrap();
    let json: serde_json::Value = serde_json::from_slice(&sent).unwrap();
    assert_eq!(json["systemPrompt"], "Be brief.");
    assert_eq!(json["messages"][0]["role"], "user");
    assert_eq!(json["messages"][0]["content"], "Hello there");
}

#[tokio::test]
async fn test_chat_non_2xx_is_dispatch_error() {
    let app = Router::new().route(
        "/api/chat",
        post(|| async { (StatusCode::BAD_GATEWAY, "upstream down") }),
    );
    let base = serve(app).await;

    let client = ChatClient::new(format!("{}/api/chat", base));
    let messages = vec![Message::user("Hello")];
    match client.stream(&ChatRequest::new(&messages)).await {
        Err(DispatchError::Status { status, .. }) => assert_eq!(status, 502),
        Err(other) => panic!("expected Status error, got {:?}", other),
        Ok(_) => panic!("expected an error"),
    }
}
