use std::{
    collections::BTreeMap,
    io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tokio::{
    fs,
    io::{AsyncWrite, AsyncWriteExt, BufWriter},
};

use super::{Store, StoreError, Summary};
use crate::Card;

pub const DATA_FILE: &str = "cards.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct Document {
    pages: BTreeMap<u32, Vec<Card>>,
}

/// Live-save store backed by a single JSON document in the output folder.
///
/// Every [`Store::append_page`] rewrites the whole document into a temporary file
/// next to it, syncs it, and renames it over the previous one. A reader never
/// observes a half written file.
#[derive(Debug)]
pub struct File {
    doc: Document,
    dir: PathBuf,
    path: PathBuf,
}

impl File {
    /// Opens the store in `dir`. A missing directory or data file is an empty
    /// store; nothing is created until the first page is appended.
    pub async fn open<P: Into<PathBuf>>(dir: P) -> Result<Self, StoreError> {
        let dir = dir.into();
        let path = dir.join(DATA_FILE);
        let doc = Self::load(&path).await?;
        tracing::debug!(path = %path.display(), pages = doc.pages.len(), "opened store");
        Ok(Self { doc, dir, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    #[cfg(test)]
    pub fn cards(&self, page: u32) -> Option<&[Card]> {
        self.doc.pages.get(&page).map(Vec::as_slice)
    }

    async fn load(path: &Path) -> Result<Document, StoreError> {
        let buf = match fs::read(path).await {
            Ok(buf) => buf,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Default::default()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: path.to_owned(),
                    source,
                })
            }
        };
        serde_json::from_slice(&buf).map_err(|source| StoreError::Corrupt {
            path: path.to_owned(),
            source,
        })
    }

    async fn write<W: AsyncWrite + Unpin>(mut to: W, doc: &Document) -> io::Result<()> {
        let bytes = serde_json::to_vec_pretty(doc)?;
        to.write_all(&bytes).await?;
        to.write_all(b"\n").await?;
        to.flush().await?;
        Ok(())
    }

    async fn save(&self) -> io::Result<()> {
        fs::create_dir_all(&self.dir).await?;
        let (tmp_file, tmp_path) = tempfile::NamedTempFile::new_in(&self.dir)?.into_parts();
        let tmp_path = tmp_path.keep().map_err(|e| e.error)?;

        let result = async {
            let mut file = fs::File::from_std(tmp_file);
            Self::write(BufWriter::new(&mut file), &self.doc).await?;
            file.sync_all().await?;
            fs::rename(&tmp_path, &self.path).await
        }
        .await;

        if result.is_err() {
            if let Err(e) = fs::remove_file(&tmp_path).await {
                tracing::warn!(path = %tmp_path.display(), "couldn't remove temporary file: {e}");
            }
        }
        result?;
        sync_dir(&self.dir).await
    }
}

/// Flushes the directory entry so a finished rename survives power loss.
#[cfg(unix)]
async fn sync_dir(dir: &Path) -> io::Result<()> {
    fs::File::open(dir).await?.sync_all().await
}

#[cfg(not(unix))]
async fn sync_dir(_: &Path) -> io::Result<()> {
    Ok(())
}

#[async_trait::async_trait]
impl Store for File {
    fn has_page(&self, page: u32) -> bool {
        self.doc.pages.contains_key(&page)
    }

    async fn append_page(&mut self, page: u32, cards: &[Card]) -> Result<(), StoreError> {
        let previous = self.doc.pages.insert(page, cards.to_vec());
        if let Err(source) = self.save().await {
            // keep memory in line with what is on disk
            match previous {
                Some(previous) => self.doc.pages.insert(page, previous),
                None => self.doc.pages.remove(&page),
            };
            return Err(StoreError::Io {
                path: self.path.clone(),
                source,
            });
        }
        tracing::debug!(page, cards = cards.len(), "saved page");
        Ok(())
    }

    async fn summarize(&self) -> Result<Summary, StoreError> {
        let doc = Self::load(&self.path).await?;
        let file_size = match fs::metadata(&self.path).await {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        Ok(super::summary_of(
            self.path.display().to_string(),
            &doc.pages,
            file_size,
        ))
    }
}
