use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
}

/// The three binary blobs a block analysis request uploads as
/// multipart/form-data fields.
#[derive(Debug, Default)]
pub struct BlockUpload {
    pub blk: Vec<u8>,
    pub rev: Vec<u8>,
    pub xor: Vec<u8>,
}
