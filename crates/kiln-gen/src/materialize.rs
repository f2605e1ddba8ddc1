//! Result materialization
//!
//! Turns a downloaded payload into files on disk and picks the canonical
//! mesh among them. Payloads are normally ZIP archives holding an `.obj`
//! mesh, its `.mtl` material and a handful of textures.

use kiln_core::{KilnError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

pub const MESH_EXTENSION: &str = "obj";
pub const MATERIAL_EXTENSION: &str = "mtl";
pub const TEXTURE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "tga", "bmp"];

const ZIP_MAGIC: &[u8; 4] = b"PK\x03\x04";

/// What a downloaded file is, judged by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Mesh,
    Material,
    Texture,
    Other,
}

/// A file written to the output directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    /// File name without directories
    pub name: String,
    pub path: PathBuf,
    /// Size in bytes
    pub size: u64,
}

impl DownloadedFile {
    /// Describe an existing file on disk
    pub fn from_path(path: &Path) -> Result<Self> {
        let size = fs::metadata(path)?.len();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Ok(Self {
            name,
            path: path.to_path_buf(),
            size,
        })
    }

    fn extension(&self) -> Option<String> {
        Path::new(&self.name)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
    }

    pub fn kind(&self) -> ArtifactKind {
        match self.extension().as_deref() {
            Some(MESH_EXTENSION) => ArtifactKind::Mesh,
            Some(MATERIAL_EXTENSION) => ArtifactKind::Material,
            Some(ext) if TEXTURE_EXTENSIONS.contains(&ext) => ArtifactKind::Texture,
            _ => ArtifactKind::Other,
        }
    }

    pub fn has_extension(&self, ext: &str) -> bool {
        self.extension()
            .map(|e| e.eq_ignore_ascii_case(ext.trim_start_matches('.')))
            .unwrap_or(false)
    }
}

/// Pick the largest file with the given extension (case-insensitive).
///
/// On equal sizes the earliest file in `files` wins.
pub fn select_canonical<'a>(files: &'a [DownloadedFile], ext: &str) -> Option<&'a DownloadedFile> {
    let mut best: Option<&DownloadedFile> = None;
    for file in files.iter().filter(|f| f.has_extension(ext)) {
        match best {
            Some(current) if file.size <= current.size => {}
            _ => best = Some(file),
        }
    }
    best
}

/// Pick the primary `.obj` mesh
pub fn select_canonical_mesh(files: &[DownloadedFile]) -> Option<&DownloadedFile> {
    select_canonical(files, MESH_EXTENSION)
}

/// Write a downloaded payload into `output_dir`.
///
/// ZIP payloads are extracted member by member; anything else is written as
/// a single file named after the last segment of `source_url`.
pub fn materialize_payload(
    bytes: &[u8],
    source_url: &str,
    output_dir: &Path,
) -> Result<Vec<DownloadedFile>> {
    fs::create_dir_all(output_dir)?;

    if bytes.starts_with(ZIP_MAGIC) {
        extract_zip(bytes, output_dir)
    } else {
        let path = output_dir.join(file_name_from_url(source_url));
        fs::write(&path, bytes)?;
        Ok(vec![DownloadedFile::from_path(&path)?])
    }
}

/// Extract every file member of a ZIP archive under `output_dir`
pub fn extract_zip(bytes: &[u8], output_dir: &Path) -> Result<Vec<DownloadedFile>> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| KilnError::Download(format!("corrupt archive: {}", e)))?;

    let mut files = Vec::new();
    for i in 0..archive.len() {
        let mut member = archive
            .by_index(i)
            .map_err(|e| KilnError::Download(format!("corrupt archive member {}: {}", i, e)))?;

        // Absolute paths and `..` components would land outside output_dir
        let Some(relative) = member.enclosed_name() else {
            tracing::warn!(member = member.name(), "skipping archive member with unsafe path");
            continue;
        };
        let target = output_dir.join(relative);

        if member.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut out = fs::File::create(&target)?;
        std::io::copy(&mut member, &mut out)
            .map_err(|e| KilnError::Download(format!("failed to extract {}: {}", target.display(), e)))?;
        out.flush()?;

        files.push(DownloadedFile::from_path(&target)?);
    }

    tracing::debug!(count = files.len(), dir = %output_dir.display(), "extracted archive");
    Ok(files)
}

fn file_name_from_url(url: &str) -> String {
    let without_query = url.split(['?', '#']).next().unwrap_or("");
    without_query
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .unwrap_or("result")
        .to_string()
}
