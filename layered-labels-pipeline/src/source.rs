//! Artifact sources.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{trace, warn};
use walkdir::WalkDir;

use crate::{Artifact, ArtifactSource, ConfigProvider, PipelineError};

/// Supplies artifacts from memory, in insertion order.
#[derive(Debug, Default)]
pub struct VecArtifactSource {
    artifacts: VecDeque<Artifact>,
}

impl VecArtifactSource {
    pub fn new(artifacts: impl IntoIterator<Item = Artifact>) -> Self {
        Self {
            artifacts: artifacts.into_iter().collect(),
        }
    }

    /// One artifact per `(id, text)` pair, each holding a single document
    /// named `document_name`.
    pub fn from_texts<'a>(
        document_name: &str,
        texts: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<Self, PipelineError> {
        let mut artifacts = VecDeque::new();
        for (id, text) in texts {
            let mut artifact = Artifact::new(id);
            artifact.add_document(document_name, text)?;
            artifacts.push_back(artifact);
        }
        Ok(Self { artifacts })
    }

    pub fn remaining(&self) -> usize {
        self.artifacts.len()
    }
}

impl ArtifactSource for VecArtifactSource {
    fn estimate_total(&self) -> Option<usize> {
        Some(self.artifacts.len())
    }

    fn try_advance(&mut self, consumer: &mut dyn FnMut(Artifact)) -> Result<bool, PipelineError> {
        match self.artifacts.pop_front() {
            Some(artifact) => {
                consumer(artifact);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Character set of the files read by [`TextFilesArtifactSource`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Charset {
    /// Invalid sequences decode to U+FFFD.
    #[default]
    Utf8,
    /// ISO-8859-1: every byte is the code point of the same value.
    Latin1,
}

impl Charset {
    /// Accepts the common spellings: `UTF-8`, `utf8`, `ISO-8859-1`,
    /// `latin1`, and so on.
    pub fn from_name(name: &str) -> Result<Self, PipelineError> {
        let normalized: String = name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match normalized.as_str() {
            "utf8" => Ok(Charset::Utf8),
            "iso88591" | "latin1" | "l1" => Ok(Charset::Latin1),
            _ => Err(PipelineError::UnsupportedCharset {
                name: name.to_string(),
            }),
        }
    }

    fn decode(self, path: &Path, bytes: Vec<u8>) -> String {
        match self {
            Charset::Utf8 => match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        valid_up_to = err.utf8_error().valid_up_to(),
                        "invalid UTF-8, replacing malformed sequences"
                    );
                    String::from_utf8_lossy(err.as_bytes()).into_owned()
                }
            },
            Charset::Latin1 => bytes.into_iter().map(char::from).collect(),
        }
    }
}

/// Reads every file under a directory whose name ends with an extension.
///
/// Each file becomes one artifact holding one document. The artifact id is
/// the file name without the extension and the `relativePath` metadata entry
/// is the path below the input directory. Files are visited in sorted order.
///
/// Files are decoded with the source's [`Charset`]. Malformed input never
/// stops a run; a file that cannot be read at all is skipped with a warning
/// and listed in [`skipped`](TextFilesArtifactSource::skipped).
#[derive(Debug)]
pub struct TextFilesArtifactSource {
    input_directory: PathBuf,
    extension: String,
    document_name: String,
    charset: Charset,
    total: usize,
    files: VecDeque<PathBuf>,
    skipped: Vec<PathBuf>,
}

impl TextFilesArtifactSource {
    pub fn new(
        input_directory: impl Into<PathBuf>,
        extension: &str,
        document_name: &str,
    ) -> Result<Self, PipelineError> {
        let input_directory = input_directory.into();

        let mut files = VecDeque::new();
        for entry in WalkDir::new(&input_directory)
            .follow_links(false)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|source| PipelineError::Walk {
                path: input_directory.clone(),
                source,
            })?;
            if entry.file_type().is_file() && entry.file_name().to_string_lossy().ends_with(extension)
            {
                files.push_back(entry.into_path());
            }
        }

        Ok(Self {
            input_directory,
            extension: extension.to_string(),
            document_name: document_name.to_string(),
            charset: Charset::default(),
            total: files.len(),
            files,
            skipped: Vec::new(),
        })
    }

    /// Built from the `inputDirectory`, `extension` and `documentName`
    /// settings, plus an optional `charsetName` (UTF-8 when absent).
    pub fn from_settings(settings: &dyn ConfigProvider) -> Result<Self, PipelineError> {
        let source = Self::new(
            settings.require("inputDirectory")?,
            settings.require("extension")?,
            settings.require("documentName")?,
        )?;
        match settings.get("charsetName") {
            Some(name) => Ok(source.with_charset(Charset::from_name(name)?)),
            None => Ok(source),
        }
    }

    pub fn with_charset(mut self, charset: Charset) -> Self {
        self.charset = charset;
        self
    }

    /// Files that could not be read.
    pub fn skipped(&self) -> &[PathBuf] {
        &self.skipped
    }

    fn artifact_id(&self, path: &Path) -> String {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stem = name.strip_suffix(self.extension.as_str()).unwrap_or(&name);
        let stem = if self.extension.starts_with('.') {
            stem
        } else {
            stem.strip_suffix('.').unwrap_or(stem)
        };
        stem.to_string()
    }

    fn read(&self, path: &Path) -> Result<Artifact, PipelineError> {
        trace!(path = %path.display(), "reading document");
        let bytes = fs::read(path).map_err(|source| PipelineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let text = self.charset.decode(path, bytes);

        let mut artifact = Artifact::new(self.artifact_id(path));
        artifact.add_document(&self.document_name, text)?;
        let relative = path.strip_prefix(&self.input_directory).unwrap_or(path);
        artifact.set_metadata("relativePath", relative.to_string_lossy());
        Ok(artifact)
    }
}

impl ArtifactSource for TextFilesArtifactSource {
    fn estimate_total(&self) -> Option<usize> {
        Some(self.total)
    }

    fn try_advance(&mut self, consumer: &mut dyn FnMut(Artifact)) -> Result<bool, PipelineError> {
        while let Some(path) = self.files.pop_front() {
            match self.read(&path) {
                Ok(artifact) => {
                    consumer(artifact);
                    return Ok(true);
                }
                Err(PipelineError::Io { path, source }) => {
                    warn!(path = %path.display(), error = %source, "skipping unreadable file");
                    self.skipped.push(path);
                }
                Err(err) => return Err(err),
            }
        }
        Ok(false)
    }
}
