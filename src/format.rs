//! Model file format for ALICE-PLSA
//!
//! ```text
//! MAGIC (8) + VERSION (2) + HEADER (24) + zstd(bincode(ModelState))
//! ```
//!
//! The header repeats the table dimensions so a file can be inspected
//! without decompressing it.

use crate::model::ModelState;
use crate::{ALICEPLSAError, Result, ALICE_PLSA_MAGIC, ALICE_PLSA_VERSION};
use std::path::Path;

/// Zstd level for model payloads
const ZSTD_LEVEL: i32 = 3;

/// Fixed-size header following magic and version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelHeader {
    pub n_words: u64,
    pub n_docs: u64,
    pub n_topics: u32,
}

impl ModelHeader {
    /// Header size in bytes (fixed)
    pub const SIZE: usize = 24;

    /// Header for the given dimensions; fails if one does not fit its field
    pub fn new(n_words: usize, n_docs: usize, n_topics: usize) -> Result<Self> {
        let field = |name: &str, value: usize| {
            ALICEPLSAError::EncodingError(format!("{} = {} does not fit the header", name, value))
        };
        Ok(Self {
            n_words: u64::try_from(n_words).map_err(|_| field("n_words", n_words))?,
            n_docs: u64::try_from(n_docs).map_err(|_| field("n_docs", n_docs))?,
            n_topics: u32::try_from(n_topics).map_err(|_| field("n_topics", n_topics))?,
        })
    }

    pub fn for_model(model: &ModelState) -> Result<Self> {
        Self::new(model.n_words(), model.n_docs(), model.n_topics())
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];

        bytes[0..8].copy_from_slice(&self.n_words.to_le_bytes());
        bytes[8..16].copy_from_slice(&self.n_docs.to_le_bytes());
        bytes[16..20].copy_from_slice(&self.n_topics.to_le_bytes());
        bytes[20..24].fill(0); // reserved

        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::SIZE {
            return Err(ALICEPLSAError::DecodingError("Header too short".to_string()));
        }

        let mut u64_buf = [0u8; 8];
        let mut u32_buf = [0u8; 4];

        u64_buf.copy_from_slice(&bytes[0..8]);
        let n_words = u64::from_le_bytes(u64_buf);
        u64_buf.copy_from_slice(&bytes[8..16]);
        let n_docs = u64::from_le_bytes(u64_buf);
        u32_buf.copy_from_slice(&bytes[16..20]);
        let n_topics = u32::from_le_bytes(u32_buf);

        Ok(Self {
            n_words,
            n_docs,
            n_topics,
        })
    }
}

const PREFIX: usize = 8 + 2;

/// Read only magic, version, and header
pub fn read_header(data: &[u8]) -> Result<ModelHeader> {
    if data.len() < PREFIX + ModelHeader::SIZE {
        return Err(ALICEPLSAError::DecodingError("Data too short".to_string()));
    }
    if &data[0..8] != ALICE_PLSA_MAGIC {
        return Err(ALICEPLSAError::InvalidMagic);
    }
    let version = (data[8], data[9]);
    if version.0 != ALICE_PLSA_VERSION.0 {
        return Err(ALICEPLSAError::InvalidVersion(version.0, version.1));
    }
    ModelHeader::from_bytes(&data[PREFIX..PREFIX + ModelHeader::SIZE])
}

impl ModelState {
    /// Encode as a compressed model file
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let serialized = bincode::serialize(self)
            .map_err(|e| ALICEPLSAError::EncodingError(format!("Bincode error: {}", e)))?;

        let compressed = zstd::stream::encode_all(std::io::Cursor::new(&serialized), ZSTD_LEVEL)
            .map_err(|e| ALICEPLSAError::EncodingError(format!("Zstd error: {}", e)))?;

        let mut output = Vec::with_capacity(PREFIX + ModelHeader::SIZE + compressed.len());
        output.extend_from_slice(ALICE_PLSA_MAGIC);
        output.push(ALICE_PLSA_VERSION.0);
        output.push(ALICE_PLSA_VERSION.1);
        output.extend_from_slice(&ModelHeader::for_model(self)?.to_bytes());
        output.extend_from_slice(&compressed);

        Ok(output)
    }

    /// Decode a model file, checking the payload against its header
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let header = read_header(data)?;
        let compressed = &data[PREFIX + ModelHeader::SIZE..];

        let decompressed = zstd::stream::decode_all(std::io::Cursor::new(compressed))
            .map_err(|e| ALICEPLSAError::DecodingError(format!("Zstd error: {}", e)))?;

        let model: ModelState = bincode::deserialize(&decompressed)
            .map_err(|e| ALICEPLSAError::DecodingError(format!("Bincode error: {}", e)))?;

        model.check_shape()?;
        if ModelHeader::for_model(&model).ok() != Some(header) {
            return Err(ALICEPLSAError::DecodingError(format!(
                "header says {}x{}x{}, payload is {}x{}x{}",
                header.n_words,
                header.n_docs,
                header.n_topics,
                model.n_words(),
                model.n_docs(),
                model.n_topics()
            )));
        }
        Ok(model)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::from_bytes(&data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_bytes() {
        let header = ModelHeader {
            n_words: 1000,
            n_docs: 42,
            n_topics: 8,
        };
        let bytes = header.to_bytes();
        assert_eq!(bytes.len(), ModelHeader::SIZE);
        assert_eq!(ModelHeader::from_bytes(&bytes).unwrap(), header);
        assert!(ModelHeader::from_bytes(&bytes[..10]).is_err());
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_header_rejects_oversized_topic_count() {
        assert!(matches!(
            ModelHeader::new(10, 10, u32::MAX as usize + 1),
            Err(ALICEPLSAError::EncodingError(_))
        ));
        let header = ModelHeader::new(10, 4, 3).unwrap();
        assert_eq!(header.n_topics, 3);
    }

    #[test]
    fn test_model_file_roundtrip() {
        let model = ModelState::random(12, 5, 3, 99).unwrap();
        let bytes = model.to_bytes().unwrap();

        assert_eq!(&bytes[0..8], ALICE_PLSA_MAGIC);
        let header = read_header(&bytes).unwrap();
        assert_eq!(header.n_words, 12);
        assert_eq!(header.n_docs, 5);
        assert_eq!(header.n_topics, 3);

        let back = ModelState::from_bytes(&bytes).unwrap();
        assert_eq!(back, model);
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = ModelState::uniform(2, 2, 1).unwrap().to_bytes().unwrap();
        bytes[0] = b'X';
        assert!(matches!(
            ModelState::from_bytes(&bytes),
            Err(ALICEPLSAError::InvalidMagic)
        ));
    }

    #[test]
    fn test_unknown_version() {
        let mut bytes = ModelState::uniform(2, 2, 1).unwrap().to_bytes().unwrap();
        bytes[8] = 9;
        assert!(matches!(
            ModelState::from_bytes(&bytes),
            Err(ALICEPLSAError::InvalidVersion(9, 0))
        ));
    }

    #[test]
    fn test_truncated() {
        assert!(matches!(
            ModelState::from_bytes(b"ALICEPLS"),
            Err(ALICEPLSAError::DecodingError(_))
        ));
        let bytes = ModelState::uniform(2, 2, 1).unwrap().to_bytes().unwrap();
        assert!(ModelState::from_bytes(&bytes[..bytes.len() - 4]).is_err());
    }

    #[test]
    fn test_header_payload_mismatch() {
        let mut bytes = ModelState::uniform(2, 2, 1).unwrap().to_bytes().unwrap();
        bytes[PREFIX] = 7;
        assert!(matches!(
            ModelState::from_bytes(&bytes),
            Err(ALICEPLSAError::DecodingError(_))
        ));
    }

    #[test]
    fn test_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.plsa");
        let model = ModelState::random(4, 3, 2, 1).unwrap();
        model.save(&path).unwrap();
        assert_eq!(ModelState::load(&path).unwrap(), model);
        assert!(matches!(
            ModelState::load(dir.path().join("nope.plsa")),
            Err(ALICEPLSAError::Io(_))
        ));
    }
}
