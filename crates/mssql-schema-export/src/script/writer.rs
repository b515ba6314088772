//! Writes assembled scripts into the per-type directory tree.

use super::{ScriptFile, ScriptPart, SCRIPT_EXTENSION};
use crate::error::Result;
use crate::source::ObjectType;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Suffix for the staging file a script is written to before it is renamed
/// onto its final path.
const STAGING_EXTENSION: &str = "tmp";

static STAGING_SEQ: AtomicU64 = AtomicU64::new(0);

/// Characters that would change which directory a name lands in.
const PATH_SEPARATORS: [char; 3] = ['/', '\\', '\0'];

/// File stem for an object name. Path separators become `_` so a name can
/// never leave its type directory.
fn file_stem(name: &str) -> Cow<'_, str> {
    if name.contains(PATH_SEPARATORS) {
        Cow::Owned(name.replace(PATH_SEPARATORS, "_"))
    } else {
        Cow::Borrowed(name)
    }
}

/// Places scripts under `<root>/<type code>/<name><suffix>.sql`.
#[derive(Debug, Clone)]
pub struct ScriptWriter {
    root: PathBuf,
}

impl ScriptWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding scripts of one object type.
    pub fn type_dir(&self, object_type: ObjectType) -> PathBuf {
        self.root.join(object_type.folder_code())
    }

    /// Full path of one script file.
    pub fn file_path(&self, object_type: ObjectType, name: &str, part: ScriptPart) -> PathBuf {
        self.type_dir(object_type).join(format!(
            "{}{}.{}",
            file_stem(name),
            part.suffix(),
            SCRIPT_EXTENSION
        ))
    }

    /// Write every file of an object, creating the type directory if needed.
    ///
    /// Each file is staged under a unique sibling name and renamed into place,
    /// so concurrent writers of the same path leave exactly one complete script.
    pub async fn write(
        &self,
        object_type: ObjectType,
        name: &str,
        files: &[ScriptFile],
    ) -> Result<Vec<PathBuf>> {
        tokio::fs::create_dir_all(self.type_dir(object_type)).await?;

        let mut written = Vec::with_capacity(files.len());
        for file in files {
            let path = self.file_path(object_type, name, file.part);
            write_replace(&path, file.contents.as_bytes()).await?;
            debug!("Wrote {}", path.display());
            written.push(path);
        }

        Ok(written)
    }
}

async fn write_replace(path: &Path, contents: &[u8]) -> Result<()> {
    let staging = path.with_extension(format!(
        "{}.{}.{}",
        std::process::id(),
        STAGING_SEQ.fetch_add(1, Ordering::Relaxed),
        STAGING_EXTENSION
    ));

    let result = match tokio::fs::write(&staging, contents).await {
        Ok(()) => tokio::fs::rename(&staging, path).await,
        Err(e) => Err(e),
    };
    if result.is_err() {
        let _ = tokio::fs::remove_file(&staging).await;
    }
    Ok(result?)
}
