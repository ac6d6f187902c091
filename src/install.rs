//! Module archive download and installation.
//!
//! Installs a module by downloading its gzipped tarball to a temp file,
//! working out the target directory name from the archive's manifest, and
//! unpacking into the modules directory. The temp file is removed on
//! every exit path, success or failure.

use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;
use tracing::{debug, info, warn};

use crate::cache::CatalogCache;
use crate::client::CatalogApi;
use crate::error::{BazaarError, Result};
use crate::models::ModuleRecord;

/// Manifest file names marking a module's top-level directory inside an
/// archive. `module.json` is current; `config.php` covers older modules.
const MANIFEST_FILES: &[&str] = &["module.json", "config.php"];

// ---------------------------------------------------------------------------
// InstallOutcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    /// Unpacked into the modules directory. The catalogue cache has been
    /// flushed so the host rescans its module list.
    Installed { name: String, path: PathBuf },
    /// A directory with the module's name already exists. Nothing was
    /// written; the existing install must be removed first.
    AlreadyInstalled { name: String },
}

// ---------------------------------------------------------------------------
// Installer
// ---------------------------------------------------------------------------

/// Downloads and unpacks module archives.
pub struct Installer<'a> {
    api: &'a dyn CatalogApi,
    cache: &'a CatalogCache,
    modules_dir: &'a Path,
}

impl<'a> Installer<'a> {
    pub(crate) fn new(
        api: &'a dyn CatalogApi,
        cache: &'a CatalogCache,
        modules_dir: &'a Path,
    ) -> Self {
        Installer {
            api,
            cache,
            modules_dir,
        }
    }

    /// Download and unpack `module` into the modules directory.
    ///
    /// The directory name comes from the archive manifest, falling back
    /// to the module id when no manifest is found. An existing directory
    /// of that name short-circuits to [`InstallOutcome::AlreadyInstalled`]
    /// without touching anything. On success the whole catalogue cache is
    /// flushed, since an install changes what every user's listing should
    /// show as installed.
    pub fn install(&self, module: &ModuleRecord) -> Result<InstallOutcome> {
        let url = module.download_url.as_deref().ok_or_else(|| {
            BazaarError::NotDownloadable(format!("module {} has no download URL", module.id))
        })?;

        let mut tmp = tempfile::NamedTempFile::new()?;
        let bytes = self.api.download(url, tmp.as_file_mut())?;
        debug!(module_id = %module.id, bytes, "module archive downloaded");

        let dir_name = archive_dir_name(tmp.path())
            .map_err(|e| BazaarError::Install(format!("unreadable module archive: {e}")))?
            .unwrap_or_else(|| module.id.clone());
        let target = self.modules_dir.join(&dir_name);

        if target.exists() {
            info!(module_id = %module.id, dir = %dir_name, "module directory already present");
            return Ok(InstallOutcome::AlreadyInstalled { name: dir_name });
        }

        fs::create_dir_all(self.modules_dir)?;
        extract(tmp.path(), self.modules_dir)?;

        if let Err(e) = self.cache.flush() {
            warn!(error = %e, "cache flush after install failed");
        }

        info!(module_id = %module.id, path = %target.display(), "module installed");
        Ok(InstallOutcome::Installed {
            name: dir_name,
            path: target,
        })
    }
}

// ---------------------------------------------------------------------------
// Archive helpers
// ---------------------------------------------------------------------------

/// Find the top-level directory carrying a module manifest.
///
/// Modules ship as `<dir>/module.json` plus the module's files, one
/// directory per archive. Returns `None` when no entry matches; the
/// caller falls back to the module id.
fn archive_dir_name(archive_path: &Path) -> io::Result<Option<String>> {
    let file = File::open(archive_path)?;
    let mut archive = Archive::new(GzDecoder::new(BufReader::new(file)));

    for entry in archive.entries()? {
        let entry = entry?;
        let path = entry.path()?;
        let mut parts = path.components();
        if let (Some(Component::Normal(dir)), Some(Component::Normal(file)), None) =
            (parts.next(), parts.next(), parts.next())
        {
            let is_manifest = file
                .to_str()
                .map(|name| MANIFEST_FILES.contains(&name))
                .unwrap_or(false);
            if is_manifest {
                if let Some(dir) = dir.to_str() {
                    return Ok(Some(dir.to_string()));
                }
            }
        }
    }
    Ok(None)
}

fn extract(archive_path: &Path, dest: &Path) -> Result<()> {
    let file = File::open(archive_path)?;
    let mut archive = Archive::new(GzDecoder::new(BufReader::new(file)));
    archive
        .unpack(dest)
        .map_err(|e| BazaarError::Install(format!("archive extraction failed: {e}")))?;
    Ok(())
}
