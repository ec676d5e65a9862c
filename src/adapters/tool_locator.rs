//! Locating the external signing tool.
//!
//! Search order:
//! 1. an explicit path (flag or config), which must exist
//! 2. the highest-versioned `signtool.exe` under the Windows SDK roots
//! 3. `PATH`

use crate::infra::error::{Result, SigningError};
use std::path::{Path, PathBuf};

/// File name of the signing tool
pub const SIGNTOOL_EXE: &str = "signtool.exe";

const ARCHITECTURES: [&str; 3] = ["x64", "arm64", "x86"];

/// Resolves the signing tool once per batch
pub trait ToolLocator {
    /// Path of the tool to run, or `ToolNotFound`
    fn locate(&self) -> Result<PathBuf>;
}

/// Dotted SDK version such as `10.0.22621.0`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct ToolVersion(Vec<u64>);

impl ToolVersion {
    pub fn parse(s: &str) -> Option<Self> {
        let parts = s
            .split('.')
            .map(|p| p.parse::<u64>().ok())
            .collect::<Option<Vec<_>>>()?;
        if parts.is_empty() {
            None
        } else {
            Some(ToolVersion(parts))
        }
    }
}

impl std::fmt::Display for ToolVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.0.iter().map(u64::to_string).collect();
        f.write_str(&parts.join("."))
    }
}

#[derive(Debug, Clone)]
struct Candidate {
    path: PathBuf,
    version: ToolVersion,
    arch_rank: usize,
}

/// Windows SDK aware locator
#[derive(Debug, Clone)]
pub struct SdkToolLocator {
    explicit: Option<PathBuf>,
    roots: Vec<PathBuf>,
    architectures: Vec<String>,
    search_path: bool,
}

impl Default for SdkToolLocator {
    fn default() -> Self {
        Self::new(Self::default_roots())
    }
}

impl SdkToolLocator {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self {
            explicit: None,
            roots,
            architectures: Self::preferred_architectures(),
            search_path: true,
        }
    }

    /// Use this path and nothing else
    #[must_use]
    pub fn with_explicit(mut self, path: Option<PathBuf>) -> Self {
        self.explicit = path;
        self
    }

    #[must_use]
    pub fn with_path_search(mut self, enabled: bool) -> Self {
        self.search_path = enabled;
        self
    }

    #[must_use]
    pub fn with_architectures(mut self, architectures: Vec<String>) -> Self {
        self.architectures = architectures;
        self
    }

    /// SDK installation roots under both Program Files directories
    #[must_use]
    pub fn default_roots() -> Vec<PathBuf> {
        let mut roots = Vec::new();
        for var in ["ProgramFiles(x86)", "ProgramFiles"] {
            if let Some(program_files) = std::env::var_os(var) {
                let kits = PathBuf::from(program_files).join("Windows Kits");
                for release in ["10", "8.1"] {
                    let root = kits.join(release);
                    if !roots.contains(&root) {
                        roots.push(root);
                    }
                }
            }
        }
        roots
    }

    /// Host architecture first, then the remaining ones
    fn preferred_architectures() -> Vec<String> {
        let host = if cfg!(target_arch = "aarch64") {
            "arm64"
        } else if cfg!(target_arch = "x86") {
            "x86"
        } else {
            "x64"
        };
        std::iter::once(host)
            .chain(ARCHITECTURES.iter().copied().filter(|a| *a != host))
            .map(str::to_string)
            .collect()
    }

    fn arch_rank(&self, arch: &str) -> Option<usize> {
        self.architectures
            .iter()
            .position(|a| a.eq_ignore_ascii_case(arch))
    }

    /// Every signing tool found under one SDK root
    fn candidates_in_root(&self, root: &Path) -> Vec<Candidate> {
        let mut candidates = Vec::new();
        let bin = root.join("bin");

        let Ok(entries) = std::fs::read_dir(&bin) else {
            log::debug!("SDK root has no bin directory: {}", root.display());
            return candidates;
        };

        for entry in entries.flatten() {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            let dir = entry.path();

            if let Some(version) = ToolVersion::parse(&name) {
                // bin/<version>/<arch>/signtool.exe
                for (rank, arch) in self.architectures.iter().enumerate() {
                    let tool = dir.join(arch).join(SIGNTOOL_EXE);
                    if tool.is_file() {
                        candidates.push(Candidate {
                            path: tool,
                            version: version.clone(),
                            arch_rank: rank,
                        });
                    }
                }
            } else if let Some(rank) = self.arch_rank(&name) {
                // Unversioned layout: bin/<arch>/signtool.exe
                let tool = dir.join(SIGNTOOL_EXE);
                if tool.is_file() {
                    candidates.push(Candidate {
                        path: tool,
                        version: ToolVersion::default(),
                        arch_rank: rank,
                    });
                }
            }
        }

        let kit = root.join("App Certification Kit").join(SIGNTOOL_EXE);
        if kit.is_file() {
            candidates.push(Candidate {
                path: kit,
                version: ToolVersion::default(),
                arch_rank: self.architectures.len(),
            });
        }

        candidates
    }

    fn best_in_roots(&self) -> Option<Candidate> {
        self.roots
            .iter()
            .flat_map(|root| self.candidates_in_root(root))
            .inspect(|c| log::debug!("Found signing tool {} ({})", c.path.display(), c.version))
            // Highest version wins; within a version, the preferred architecture
            .max_by(|a, b| {
                a.version
                    .cmp(&b.version)
                    .then_with(|| b.arch_rank.cmp(&a.arch_rank))
            })
    }
}

impl ToolLocator for SdkToolLocator {
    fn locate(&self) -> Result<PathBuf> {
        if let Some(ref explicit) = self.explicit {
            if explicit.is_file() {
                log::info!("Using signing tool: {}", explicit.display());
                return Ok(explicit.clone());
            }
            return Err(SigningError::ToolNotFound {
                searched: vec![explicit.clone()],
            });
        }

        if let Some(best) = self.best_in_roots() {
            log::info!(
                "Using signing tool: {} (SDK {})",
                best.path.display(),
                best.version
            );
            return Ok(best.path);
        }

        if self.search_path {
            if let Ok(found) = which::which(SIGNTOOL_EXE) {
                log::info!("Using signing tool from PATH: {}", found.display());
                return Ok(found);
            }
        }

        Err(SigningError::ToolNotFound {
            searched: self.roots.clone(),
        })
    }
}
