use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use md5::{Digest, Md5};

pub fn content_md5(data: &[u8]) -> String {
    STANDARD.encode(Md5::digest(data))
}

pub fn md5_hex(data: &[u8]) -> String {
    format!("{:x}", Md5::digest(data))
}
