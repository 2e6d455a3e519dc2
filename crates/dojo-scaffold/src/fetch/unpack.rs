//! Archive extraction
//!
//! Repository archives wrap everything in a single `<repo>-<commit>/`
//! directory. That first path component is stripped, so the module's manifest
//! ends up directly inside the destination.

use super::ArchiveFormat;
use crate::error::AcquireError;
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};
use zip::ZipArchive;

/// Extract `archive` into `destination`, returning the number of files written
pub async fn unpack(
    archive: &Path,
    destination: &Path,
    format: ArchiveFormat,
) -> Result<usize, AcquireError> {
    let archive_path = archive.to_path_buf();
    let destination = destination.to_path_buf();

    let task_archive = archive_path.clone();
    tokio::task::spawn_blocking(move || match format {
        ArchiveFormat::TarGz => unpack_tar_gz(&task_archive, &destination),
        ArchiveFormat::Zip => unpack_zip(&task_archive, &destination),
    })
    .await
    .map_err(|e| AcquireError::unpack(&archive_path, e))?
}

fn unpack_tar_gz(archive: &Path, destination: &Path) -> Result<usize, AcquireError> {
    let unpack_err = |e: io::Error| AcquireError::unpack(archive, e);

    let file = File::open(archive).map_err(unpack_err)?;
    let mut tar = tar::Archive::new(GzDecoder::new(file));
    let mut written = 0;

    for entry in tar.entries().map_err(unpack_err)? {
        let mut entry = entry.map_err(unpack_err)?;
        let entry_type = entry.header().entry_type();
        if !(entry_type.is_file() || entry_type.is_dir()) {
            // Links and metadata records (e.g. pax global headers) are skipped
            continue;
        }

        let path = entry.path().map_err(unpack_err)?.into_owned();
        let Some(relative) = strip_top_level(&path) else {
            continue;
        };
        let target = destination.join(relative);

        if entry_type.is_dir() {
            fs::create_dir_all(&target).map_err(|e| AcquireError::write(&target, e))?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| AcquireError::write(parent, e))?;
        }
        entry.unpack(&target).map_err(unpack_err)?;
        written += 1;
    }

    Ok(written)
}

fn unpack_zip(archive: &Path, destination: &Path) -> Result<usize, AcquireError> {
    let file = File::open(archive).map_err(|e| AcquireError::unpack(archive, e))?;
    let mut zip = ZipArchive::new(file).map_err(|e| AcquireError::unpack(archive, e))?;
    let mut written = 0;

    for i in 0..zip.len() {
        let mut file = zip
            .by_index(i)
            .map_err(|e| AcquireError::unpack(archive, e))?;
        let Some(path) = file.enclosed_name() else {
            continue;
        };
        let Some(relative) = strip_top_level(&path) else {
            continue;
        };
        let target = destination.join(relative);

        if file.is_dir() {
            fs::create_dir_all(&target).map_err(|e| AcquireError::write(&target, e))?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| AcquireError::write(parent, e))?;
        }
        let mut out = File::create(&target).map_err(|e| AcquireError::write(&target, e))?;
        io::copy(&mut file, &mut out).map_err(|e| AcquireError::unpack(archive, e))?;
        written += 1;
    }

    Ok(written)
}

/// Drop the leading directory; `None` for the directory itself and for
/// anything that would escape the destination
fn strip_top_level(path: &Path) -> Option<PathBuf> {
    let mut components = path.components();
    components.next()?;

    let mut relative = PathBuf::new();
    for component in components {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    if relative.as_os_str().is_empty() {
        None
    } else {
        Some(relative)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use flate2::write::GzEncoder;
    use flate2::Compression;

    /// In-memory tar.gz holding `files` (paths include the top-level directory)
    pub fn tar_gz_bytes(files: &[(&str, &str)]) -> Vec<u8> {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (name, contents) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(contents.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, contents.as_bytes()).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }
}
