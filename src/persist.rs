//! On-disk index layout.
//!
//! An index directory holds two JSON files:
//!
//! | File | Contents |
//! |------|----------|
//! | `corpus.json` | ordered array of fragment records |
//! | `embeddings.json` | `{model, ids, texts, vectors}` parallel arrays |
//!
//! Vectors are stored as base64-encoded little-endian `f32` blobs (see
//! [`vec_to_blob`]) so a reload is bit-identical to what was saved.
//! Lexical statistics are never persisted; they are rebuilt from the
//! corpus on load.
//!
//! There is no format version: a present, parseable file is valid, and a
//! format change requires a rebuild. Every write goes to a `.tmp` sibling
//! which is then renamed over the target.

use std::path::{Path, PathBuf};

use recall_core::embedding::vec_to_blob;
use recall_core::models::Fragment;
use recall_core::{Error, Result};
use serde::{Deserialize, Serialize};

pub const CORPUS_FILE: &str = "corpus.json";
pub const EMBEDDINGS_FILE: &str = "embeddings.json";

/// Persisted embedding generation: one vector per fragment id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingFile {
    /// Model that produced the vectors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub ids: Vec<String>,
    /// Fragment text each vector was computed from.
    pub texts: Vec<String>,
    #[serde(with = "blob_list")]
    pub vectors: Vec<Vec<f32>>,
}

impl EmbeddingFile {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Reads and writes the two index files under one directory.
#[derive(Debug, Clone)]
pub struct IndexStore {
    dir: PathBuf,
}

impl IndexStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn corpus_path(&self) -> PathBuf {
        self.dir.join(CORPUS_FILE)
    }

    pub fn embeddings_path(&self) -> PathBuf {
        self.dir.join(EMBEDDINGS_FILE)
    }

    pub fn save_corpus(&self, fragments: &[Fragment]) -> Result<()> {
        let path = self.corpus_path();
        let json = serde_json::to_vec(fragments).map_err(|source| Error::Format {
            path: path.clone(),
            source,
        })?;
        write_atomic(&path, &json)
    }

    /// Load the corpus; `Ok(None)` when the file does not exist.
    pub fn load_corpus(&self) -> Result<Option<Vec<Fragment>>> {
        read_json(&self.corpus_path())
    }

    pub fn save_embeddings(&self, file: &EmbeddingFile) -> Result<()> {
        let path = self.embeddings_path();
        let json = serde_json::to_vec(file).map_err(|source| Error::Format {
            path: path.clone(),
            source,
        })?;
        write_atomic(&path, &json)
    }

    /// Load the embedding generation; `Ok(None)` when the file does not
    /// exist. Arrays of unequal length are a format error.
    pub fn load_embeddings(&self) -> Result<Option<EmbeddingFile>> {
        let path = self.embeddings_path();
        let Some(file) = read_json::<EmbeddingFile>(&path)? else {
            return Ok(None);
        };
        if file.ids.len() != file.texts.len() || file.ids.len() != file.vectors.len() {
            return Err(Error::Format {
                path,
                source: serde::de::Error::custom(format!(
                    "parallel arrays differ in length: {} ids, {} texts, {} vectors",
                    file.ids.len(),
                    file.texts.len(),
                    file.vectors.len()
                )),
            });
        }
        Ok(Some(file))
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(Error::Persistence {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|source| Error::Format {
            path: path.to_path_buf(),
            source,
        })
}

/// Write `bytes` to a `.tmp` sibling of `path`, then rename it into place.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let io_err = |source: std::io::Error| Error::Persistence {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    std::fs::write(&tmp, bytes).map_err(io_err)?;
    std::fs::rename(&tmp, path).map_err(io_err)?;
    Ok(())
}

/// Serde adapter: `Vec<Vec<f32>>` as a list of base64 little-endian blobs.
mod blob_list {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use recall_core::embedding::blob_to_vec;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::vec_to_blob;

    pub fn serialize<S: Serializer>(vectors: &[Vec<f32>], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(vectors.iter().map(|v| STANDARD.encode(vec_to_blob(v))))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Vec<f32>>, D::Error> {
        let encoded: Vec<String> = Vec::deserialize(deserializer)?;
        encoded
            .iter()
            .map(|s| {
                let bytes = STANDARD.decode(s).map_err(serde::de::Error::custom)?;
                if bytes.len() % 4 != 0 {
                    return Err(serde::de::Error::custom(format!(
                        "vector blob of {} bytes is not a whole number of f32 values",
                        bytes.len()
                    )));
                }
                Ok(blob_to_vec(&bytes))
            })
            .collect()
    }
}
