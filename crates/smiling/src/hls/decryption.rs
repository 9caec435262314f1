// HLS Stream Decryptor: AES-128-CBC over each segment, concatenated after the init segment.

use aes::Aes128;
use bytes::Bytes;
use cbc::cipher::{BlockDecryptMut, KeyIvInit, block_padding::NoPadding};
use tracing::debug;

use crate::DownloadError;
use crate::hls::scheduler::FetchedStream;

type Aes128CbcDec = cbc::Decryptor<Aes128>;

const BLOCK_SIZE: usize = 16;

/// Decrypts segments that were each encrypted independently with the same key and IV.
#[derive(Clone)]
pub struct StreamDecryptor {
    // Fresh cipher state; cloned for every segment so chaining restarts at the IV.
    initial: Aes128CbcDec,
}

impl StreamDecryptor {
    pub fn new(key: &[u8; 16], iv: &[u8; 16]) -> Self {
        Self {
            initial: Aes128CbcDec::new(&(*key).into(), &(*iv).into()),
        }
    }

    /// Init segment followed by every decrypted segment with its padding removed.
    pub fn decrypt(&self, init: &[u8], segments: &[Bytes]) -> Result<Bytes, DownloadError> {
        let capacity = init.len() + segments.iter().map(Bytes::len).sum::<usize>();
        let mut buffer = Vec::with_capacity(capacity);
        buffer.extend_from_slice(init);

        for (index, segment) in segments.iter().enumerate() {
            if segment.is_empty() {
                continue;
            }
            if segment.len() % BLOCK_SIZE != 0 {
                return Err(DownloadError::Decrypt(format!(
                    "segment #{index} is {} bytes, not a multiple of {BLOCK_SIZE}",
                    segment.len()
                )));
            }

            let start = buffer.len();
            buffer.extend_from_slice(segment);
            self.initial
                .clone()
                .decrypt_padded_mut::<NoPadding>(&mut buffer[start..])
                .map_err(|e| DownloadError::Decrypt(format!("segment #{index}: {e}")))?;

            let pad = usize::from(buffer[buffer.len() - 1]);
            if pad == 0 || pad > BLOCK_SIZE {
                return Err(DownloadError::Decrypt(format!(
                    "segment #{index} has invalid padding length {pad}"
                )));
            }
            buffer.truncate(buffer.len() - pad);
        }

        debug!(
            encrypted = capacity - init.len(),
            output = buffer.len(),
            "Decrypted segments"
        );
        Ok(Bytes::from(buffer))
    }

    pub fn decrypt_stream(stream: &FetchedStream) -> Result<Bytes, DownloadError> {
        Self::new(&stream.key, &stream.iv).decrypt(&stream.init, &stream.segments)
    }
}
