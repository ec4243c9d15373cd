//! Application constants

/// Length every encoded text is padded or truncated to before classification
pub const MAX_SEQUENCE_LENGTH: usize = 100;

/// Scores strictly above this value are flagged as gambling ads
pub const DETECTION_THRESHOLD: f32 = 0.5;

/// Only every Nth decoded video frame goes through OCR
pub const FRAME_SAMPLE_INTERVAL: usize = 30;

/// Upper bound on frames read from a single uploaded video
pub const MAX_VIDEO_FRAMES: usize = 300;

/// Maximum request body size for uploads (200 MB)
pub const MAX_UPLOAD_SIZE: usize = 200 * 1024 * 1024;

/// Tesseract language set: Indonesian + English
pub const DEFAULT_OCR_LANGS: &str = "ind+eng";

pub const DEFAULT_PORT: u16 = 5000;

/// Status strings returned to clients
pub const STATUS_DETECTED: &str = "Terdeteksi Iklan Judi";
pub const STATUS_NOT_DETECTED: &str = "Tidak Terindikasi Iklan Judi";

/// Client-facing validation messages
pub const MSG_TEXT_REQUIRED: &str = "Text tidak boleh kosong";
pub const MSG_IMAGE_REQUIRED: &str = "File gambar tidak ditemukan";
pub const MSG_IMAGE_UNREADABLE: &str = "Format gambar tidak didukung";
pub const MSG_NO_TEXT_FOUND: &str = "Teks tidak ditemukan di dalam gambar";
pub const MSG_VIDEO_REQUIRED: &str = "No video uploaded";

/// Model artifact file names, inside MODEL_DIR or the hub repo
pub const MODEL_WEIGHTS_FILE: &str = "model.safetensors";
pub const MODEL_CONFIG_FILE: &str = "config.json";
pub const TOKENIZER_FILE: &str = "tokenizer.json";
pub const MSG_INVALID_JSON: &str = "Body harus berupa JSON dengan field text";
pub const MSG_INVALID_MULTIPART: &str = "Form upload tidak valid";
