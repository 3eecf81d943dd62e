//! Integration tests for the load → transform → encode → submit pipeline.
//!
//! Network calls go through a recording fake [`Transport`], so every test
//! runs offline. The live portal test is gated behind `EKYC_E2E_ENABLED`.
//!
//! Run with:
//!   cargo test --test pipeline -- --nocapture

use base64::Engine as _;
use ekyc_pipeline::{
    ApiRequest, ClientConfig, CropBox, Credentials, EditParams, EkycError, Endpoint, Environment,
    FormPart, HttpTransport, ImageAsset, RawResponse, RequestBody, ResponseBody, Session, Slot,
    Submitter, TargetFormat, Transport, TransportError, ValidationError,
};
use image::{DynamicImage, GenericImageView, ImageFormat, Rgba, RgbaImage};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

// ── Test helpers ─────────────────────────────────────────────────────────────

#[derive(Debug)]
struct Call {
    request: ApiRequest,
    /// Whether every file part's path existed while `send` ran.
    files_present: bool,
}

#[derive(Clone)]
struct FakeTransport {
    calls: Arc<Mutex<Vec<Call>>>,
    reply: Result<RawResponse, TransportError>,
}

impl FakeTransport {
    fn replying(status: u16, body: &str) -> Self {
        Self {
            calls: Arc::default(),
            reply: Ok(RawResponse {
                status,
                body: body.to_string(),
            }),
        }
    }

    fn failing(reason: &str) -> Self {
        Self {
            calls: Arc::default(),
            reply: Err(TransportError(reason.to_string())),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn last_request(&self) -> ApiRequest {
        self.calls
            .lock()
            .unwrap()
            .last()
            .map(|c| c.request.clone())
            .expect("no request was sent")
    }

    fn last_files_present(&self) -> bool {
        self.calls.lock().unwrap().last().expect("no call").files_present
    }
}

impl Transport for FakeTransport {
    async fn send(&self, request: ApiRequest) -> Result<RawResponse, TransportError> {
        let files_present = file_paths(&request).iter().all(|p| p.exists());
        self.calls.lock().unwrap().push(Call {
            request,
            files_present,
        });
        self.reply.clone()
    }
}

fn file_paths(request: &ApiRequest) -> Vec<PathBuf> {
    match &request.body {
        RequestBody::Json(_) => Vec::new(),
        RequestBody::Multipart(parts) => parts
            .iter()
            .filter_map(|p| match p {
                FormPart::File { path, .. } => Some(path.clone()),
                FormPart::Text { .. } => None,
            })
            .collect(),
    }
}

fn json_of(request: &ApiRequest) -> &Value {
    match &request.body {
        RequestBody::Json(v) => v,
        RequestBody::Multipart(_) => panic!("expected a JSON body"),
    }
}

fn rgba(w: u32, h: u32, px: [u8; 4]) -> ImageAsset {
    ImageAsset::new(DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba(px))))
}

fn session_with(slots: &[Slot]) -> Session {
    let mut session = Session::default();
    session.set_journey_id("journey-42");
    for &slot in slots {
        session.upload(slot, rgba(32, 24, [90, 120, 150, 255]));
    }
    session
}

fn decode_b64(v: &Value) -> DynamicImage {
    let text = v.as_str().expect("base64 string");
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(text)
        .expect("valid base64");
    image::load_from_memory(&bytes).expect("decodable image")
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("ekyc_pipeline=debug"))
        .with_test_writer()
        .try_init();
}

fn close(a: u8, b: u8, tolerance: u8) -> bool {
    a.abs_diff(b) <= tolerance
}

// ── Loading ──────────────────────────────────────────────────────────────────

#[test]
fn upload_from_disk() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("card.png");
    DynamicImage::ImageRgba8(RgbaImage::from_pixel(12, 9, Rgba([9, 8, 7, 128])))
        .save(&path)
        .expect("write png");

    let mut session = Session::default();
    session.upload(Slot::Front, ImageAsset::from_path(&path).expect("load"));
    let asset = session.image(Slot::Front).expect("slot filled");
    assert_eq!((asset.width(), asset.height()), (12, 9));
    assert_eq!(asset.mode(), ekyc_pipeline::PixelMode::Rgba);
    assert_eq!(asset.source_format, Some(ImageFormat::Png));
}

// ── Transform properties ─────────────────────────────────────────────────────

#[test]
fn neutral_edits_are_identity() {
    let asset = rgba(40, 30, [10, 200, 77, 180]);
    let out = ekyc_pipeline::transform(&asset.image, &EditParams::default());
    assert!(!out.edited);
    assert!(out.warning.is_none());
    assert_eq!(out.image.as_bytes(), asset.image.as_bytes());
    assert_eq!(out.image.color(), asset.image.color());
}

#[test]
fn valid_crop_has_box_dimensions() {
    let asset = rgba(100, 80, [1, 2, 3, 255]);
    for (l, t, r, b) in [(0, 0, 100, 80), (10, 5, 60, 45), (99, 79, 100, 80)] {
        let params = EditParams {
            crop: Some(CropBox::new(l, t, r, b)),
            ..EditParams::default()
        };
        let out = ekyc_pipeline::transform(&asset.image, &params);
        assert!(out.edited);
        assert_eq!(out.image.dimensions(), (r - l, b - t));
    }
}

#[test]
fn margin_pads_with_black_ring() {
    let asset = rgba(20, 10, [200, 200, 200, 255]);
    let params = EditParams {
        margin: 5,
        ..EditParams::default()
    };
    let out = ekyc_pipeline::transform(&asset.image, &params);
    assert_eq!(out.image.dimensions(), (30, 20));
    assert_eq!(out.image.get_pixel(0, 0), Rgba([0, 0, 0, 255]));
    assert_eq!(out.image.get_pixel(4, 10), Rgba([0, 0, 0, 255]));
    assert_eq!(out.image.get_pixel(5, 5), Rgba([200, 200, 200, 255]));
    assert_eq!(out.image.get_pixel(24, 14), Rgba([200, 200, 200, 255]));
    assert_eq!(out.image.get_pixel(25, 15), Rgba([0, 0, 0, 255]));
}

#[test]
fn invalid_crop_keeps_original_and_warns() {
    let asset = rgba(50, 40, [5, 6, 7, 255]);
    let params = EditParams {
        crop: Some(CropBox::new(30, 0, 10, 40)),
        ..EditParams::default()
    };
    let out = ekyc_pipeline::transform(&asset.image, &params);
    assert!(!out.edited);
    assert!(matches!(
        out.warning,
        Some(ValidationError::InvalidCrop { left: 30, right: 10, .. })
    ));
    assert_eq!(out.image.as_bytes(), asset.image.as_bytes());
}

#[test]
fn jpeg_of_alpha_image_is_three_channel() {
    let asset = rgba(16, 16, [250, 10, 10, 0]);
    let encoded = ekyc_pipeline::encode(&asset.image, &Default::default(), None).expect("encode");
    assert_eq!(encoded.format, TargetFormat::Jpeg);
    let decoded = image::load_from_memory_with_format(&encoded.bytes, ImageFormat::Jpeg)
        .expect("decode jpeg");
    assert_eq!(decoded.color(), image::ColorType::Rgb8);
    assert_eq!(decoded.dimensions(), (16, 16));
}

// ── End-to-end submissions ───────────────────────────────────────────────────

#[tokio::test]
async fn edited_document_end_to_end() {
    init_tracing();
    let mut session = Session::default();
    session.set_journey_id("journey-42");
    session.upload(Slot::Doc, rgba(400, 300, [100, 150, 200, 255]));
    session
        .set_edit_params(
            Slot::Doc,
            EditParams {
                brightness: 1.2,
                contrast: 0.8,
                margin: 10,
                crop: None,
            },
        )
        .expect("valid edits");

    // Before encoding: exact values.
    let preview = session.preview(Slot::Doc).expect("slot filled");
    assert_eq!(preview.image.dimensions(), (420, 320));
    for (x, y) in [(0, 0), (419, 0), (0, 319), (419, 319), (9, 160), (210, 9)] {
        assert_eq!(preview.image.get_pixel(x, y), Rgba([0, 0, 0, 255]), "({x},{y})");
    }
    assert_eq!(preview.image.get_pixel(210, 160), Rgba([122, 170, 218, 255]));

    let transport = FakeTransport::replying(200, r#"{"status":"success"}"#);
    let submitter = Submitter::new(transport.clone());
    let body = submitter
        .submit(&session, Endpoint::Document)
        .await
        .expect("accepted");
    assert_eq!(body, json!({"status": "success"}));

    let request = transport.last_request();
    let payload = json_of(&request);
    let jpeg = decode_b64(&payload["idImageBase64Image"]);
    assert_eq!(jpeg.dimensions(), (420, 320));
    assert_eq!(jpeg.color(), image::ColorType::Rgb8);

    let rgb = jpeg.to_rgb8();
    for (x, y) in [(0, 0), (419, 0), (0, 319), (419, 319)] {
        let p = rgb.get_pixel(x, y).0;
        assert!(p.iter().all(|&c| c <= 8), "ring at ({x},{y}) = {p:?}");
    }
    let centre = rgb.get_pixel(210, 160).0;
    assert!(
        close(centre[0], 122, 6) && close(centre[1], 170, 6) && close(centre[2], 218, 6),
        "centre = {centre:?}"
    );
}

#[tokio::test]
async fn empty_journey_never_calls_network() {
    let mut session = session_with(&[Slot::Doc]);
    session.clear_journey();
    let transport = FakeTransport::replying(200, "{}");
    let submitter = Submitter::new(transport.clone());

    for endpoint in Endpoint::ALL {
        let err = submitter.submit(&session, endpoint).await.unwrap_err();
        assert!(
            matches!(err, EkycError::Validation(ValidationError::MissingJourneyId)),
            "{endpoint}: {err:?}"
        );
    }
    session.set_journey_id("   ");
    let err = submitter.submit(&session, Endpoint::Document).await.unwrap_err();
    assert!(err.is_validation());
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn idcard_without_back_fails_locally() {
    let session = session_with(&[Slot::Front]);
    let transport = FakeTransport::replying(200, "{}");
    let submitter = Submitter::new(transport.clone());

    let err = submitter.submit(&session, Endpoint::IdCard).await.unwrap_err();
    assert!(matches!(
        err,
        EkycError::Validation(ValidationError::MissingImage { slot: Slot::Back })
    ));
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn idcard_png_payload() {
    let mut session = session_with(&[Slot::Front, Slot::Back]);
    session.okayid.image_format = TargetFormat::Png;
    session.okayid.cambodia = true;
    let transport = FakeTransport::replying(200, r#"{"status":"success"}"#);
    Submitter::new(transport.clone())
        .submit(&session, Endpoint::IdCard)
        .await
        .expect("accepted");

    let request = transport.last_request();
    assert!(request.url.ends_with("/api/ekyc/okayid"));
    let payload = json_of(&request);
    assert_eq!(payload["journeyId"], "journey-42");
    assert_eq!(payload["imageFormat"], "PNG");
    assert_eq!(payload["imageEnabled"], true);
    assert_eq!(payload["faceImageEnabled"], true);
    assert_eq!(payload["cambodia"], true);
    let front = decode_b64(&payload["base64ImageString"]);
    let back = decode_b64(&payload["backImage"]);
    // PNG keeps the alpha channel.
    assert_eq!(front.color(), image::ColorType::Rgba8);
    assert_eq!(back.dimensions(), (32, 24));
}

#[tokio::test]
async fn passport_full_size_is_optional() {
    let mut session = session_with(&[Slot::Half]);
    session.passport.country = "MYS".into();
    let transport = FakeTransport::replying(200, "{}");
    let submitter = Submitter::new(transport.clone());

    submitter.submit(&session, Endpoint::Passport).await.expect("accepted");
    let request = transport.last_request();
    let payload = json_of(&request);
    assert_eq!(payload["type"], "passport");
    assert_eq!(payload["country"], "MYS");
    assert!(payload.get("fullSizeImage").is_none());
    assert!(payload["halfSizeImage"].is_string());

    session.upload(Slot::Full, rgba(8, 8, [0, 0, 0, 255]));
    submitter.submit(&session, Endpoint::Passport).await.expect("accepted");
    assert!(json_of(&transport.last_request())["fullSizeImage"].is_string());
}

#[tokio::test]
async fn face_match_stages_files_and_cleans_up() {
    let mut session = session_with(&[Slot::IdCard, Slot::Best]);
    session.face_match.liveness_detection = true;
    let transport = FakeTransport::replying(200, r#"{"status":"success"}"#);

    Submitter::new(transport.clone())
        .submit(&session, Endpoint::FaceMatch)
        .await
        .expect("accepted");

    assert!(transport.last_files_present(), "files must exist during send");
    let request = transport.last_request();
    assert!(request.url.ends_with("/api/ekyc/okayface/v1-1"));
    let RequestBody::Multipart(parts) = &request.body else {
        panic!("expected multipart");
    };
    let names: Vec<_> = parts.iter().map(FormPart::name).collect();
    assert_eq!(
        names,
        ["journeyId", "livenessDetection", "imageIdCard", "imageBest"]
    );
    assert!(matches!(
        &parts[1],
        FormPart::Text { value, .. } if value == "true"
    ));
    for path in file_paths(&request) {
        assert!(!path.exists(), "{} was not removed", path.display());
    }
}

#[tokio::test]
async fn staged_files_removed_after_transport_failure() {
    let session = session_with(&[Slot::Best]);
    let transport = FakeTransport::failing("connection reset");

    let err = Submitter::new(transport.clone())
        .submit(&session, Endpoint::Liveness)
        .await
        .unwrap_err();
    assert!(matches!(err, EkycError::Transport { ref reason, .. } if reason.contains("reset")));

    let request = transport.last_request();
    let paths = file_paths(&request);
    assert_eq!(paths.len(), 1);
    assert!(!paths[0].exists());
}

#[tokio::test]
async fn remote_errors_keep_the_body() {
    let session = session_with(&[Slot::Doc]);

    let transport = FakeTransport::replying(400, r#"{"message":"bad image"}"#);
    let err = Submitter::new(transport)
        .submit(&session, Endpoint::Document)
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(400));
    match err {
        EkycError::Remote { body, .. } => {
            assert_eq!(body.as_json(), Some(&json!({"message": "bad image"})))
        }
        other => panic!("unexpected: {other:?}"),
    }

    let transport = FakeTransport::replying(502, "Bad Gateway");
    let err = Submitter::new(transport)
        .submit(&session, Endpoint::Document)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EkycError::Remote { status: 502, body: ResponseBody::Raw(ref s) } if s == "Bad Gateway"
    ));
}

fn icc_in_payload(v: &Value) -> Option<Vec<u8>> {
    use image::{ImageDecoder, ImageReader};
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(v.as_str().expect("base64 string"))
        .expect("valid base64");
    ImageReader::new(std::io::Cursor::new(bytes))
        .with_guessed_format()
        .expect("readable header")
        .into_decoder()
        .expect("known format")
        .icc_profile()
        .expect("readable profile")
}

fn doc_with_profile(config: ClientConfig, profile: &[u8]) -> Session {
    let mut session = Session::new(config);
    session.set_journey_id("journey-42");
    let mut asset = rgba(10, 10, [30, 60, 90, 255]);
    asset.icc_profile = Some(profile.to_vec());
    session.upload(Slot::Doc, asset);
    session
}

#[tokio::test]
async fn icc_profile_follows_config() {
    let profile: Vec<u8> = (0..160u32).map(|i| (i * 3 % 256) as u8).collect();

    let transport = FakeTransport::replying(200, "{}");
    let submitter = Submitter::new(transport.clone());
    let kept = doc_with_profile(ClientConfig::default(), &profile);
    submitter.submit(&kept, Endpoint::Document).await.expect("accepted");
    assert_eq!(
        icc_in_payload(&json_of(&transport.last_request())["idImageBase64Image"]),
        Some(profile.clone())
    );

    let config = ClientConfig::builder()
        .preserve_icc_profile(false)
        .build()
        .expect("valid config");
    let stripped = doc_with_profile(config, &profile);
    submitter.submit(&stripped, Endpoint::Document).await.expect("accepted");
    assert_eq!(
        icc_in_payload(&json_of(&transport.last_request())["idImageBase64Image"]),
        None
    );
}

#[tokio::test]
async fn urls_follow_environment() {
    let config = ClientConfig::builder()
        .environment(Environment::Production)
        .build()
        .expect("valid config");
    let mut session = Session::new(config);
    session.set_journey_id("journey-42");
    session.upload(Slot::Best, rgba(8, 8, [1, 1, 1, 255]));
    let transport = FakeTransport::replying(200, "{}");

    Submitter::new(transport.clone())
        .submit(&session, Endpoint::Liveness)
        .await
        .expect("accepted");
    assert_eq!(
        transport.last_request().url,
        "https://ekycportal.innov8tif.com/api/ekyc/okaylive"
    );
}

// ── Journey acquisition ──────────────────────────────────────────────────────

#[tokio::test]
async fn journey_is_cached_in_session() {
    let mut session = Session::default();
    let transport = FakeTransport::replying(200, r#"{"journeyId":"abc123","status":"success"}"#);
    let submitter = Submitter::new(transport.clone());

    let response = submitter
        .acquire_journey(&mut session, &Credentials::new("ops", "secret"))
        .await
        .expect("credentials present");
    assert_eq!(response.journey_id().as_deref(), Some("abc123"));
    assert_eq!(session.journey_id().as_deref(), Some("abc123"));

    let request = transport.last_request();
    assert_eq!(
        request.url,
        "https://ekycportaldemo.innov8tif.com/api/ekyc/journeyid"
    );
    assert_eq!(
        json_of(&request),
        &json!({"username": "ops", "password": "secret"})
    );

    session.set_environment(Environment::Production);
    assert_eq!(session.journey_id(), None);
}

#[tokio::test]
async fn empty_credentials_send_nothing() {
    let mut session = Session::default();
    let transport = FakeTransport::replying(200, "{}");
    let err = Submitter::new(transport.clone())
        .acquire_journey(&mut session, &Credentials::new("", ""))
        .await
        .unwrap_err();
    assert_eq!(err, ValidationError::EmptyCredentials);
    assert_eq!(transport.call_count(), 0);
    assert!(session.journey().is_none());
}

#[tokio::test]
async fn failed_journey_is_reported_not_raised() {
    let mut session = Session::default();
    let submitter = Submitter::new(FakeTransport::failing("dns failure"));
    let response = submitter
        .acquire_journey(&mut session, &Credentials::new("ops", "secret"))
        .await
        .expect("credentials present");
    assert_eq!(response.journey_id(), None);
    assert!(response.to_string().contains("dns failure"));
    assert_eq!(session.journey_id(), None);
}

#[test]
fn blocking_submit_matches_async() {
    let session = session_with(&[Slot::Best]);
    let transport = FakeTransport::replying(200, r#"{"live":true}"#);
    let body = Submitter::new(transport.clone())
        .submit_blocking(&session, Endpoint::Liveness)
        .expect("accepted");
    assert_eq!(body["live"], true);
    assert_eq!(transport.call_count(), 1);
}

// ── Live portal (opt-in) ─────────────────────────────────────────────────────

/// Requires `EKYC_E2E_ENABLED=1`, `EKYC_USERNAME` and `EKYC_PASSWORD`.
#[tokio::test]
async fn live_demo_journey() {
    if std::env::var("EKYC_E2E_ENABLED").is_err() {
        println!("SKIP: set EKYC_E2E_ENABLED=1 to run live tests");
        return;
    }
    let (Ok(user), Ok(pass)) = (std::env::var("EKYC_USERNAME"), std::env::var("EKYC_PASSWORD"))
    else {
        println!("SKIP: EKYC_USERNAME / EKYC_PASSWORD not set");
        return;
    };

    let mut session = Session::default();
    let submitter = Submitter::new(HttpTransport::new().expect("http client"));
    let response = submitter
        .acquire_journey(&mut session, &Credentials::new(user, pass))
        .await
        .expect("credentials present");
    println!("{response}");
    assert!(session.journey_id().is_some(), "no journey id: {response}");
}
