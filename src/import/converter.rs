//! External text conversion
//!
//! Format-to-format conversion is delegated to a separate program (pandoc by
//! default) reading the raw text on stdin and writing the result to stdout.

use crate::import::source::ImportError;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// What to convert from and into
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionRequest {
    pub from: String,
    pub to: String,
    /// Filters applied in order; the order is significant
    pub filters: Vec<PathBuf>,
    pub extra_args: Vec<String>,
}

impl ConversionRequest {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            filters: Vec::new(),
            extra_args: Vec::new(),
        }
    }

    pub fn with_filter(mut self, filter: impl Into<PathBuf>) -> Self {
        self.filters.push(filter.into());
        self
    }

    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.extra_args.push(arg.into());
        self
    }

    /// Command line arguments for pandoc
    pub fn args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(self.filters.len() * 2 + self.extra_args.len() + 5);
        for filter in &self.filters {
            args.push("--lua-filter".to_string());
            args.push(filter.display().to_string());
        }
        args.push("-f".to_string());
        args.push(self.from.clone());
        args.push("-t".to_string());
        args.push(self.to.clone());
        args.extend(self.extra_args.iter().cloned());
        args.push("-".to_string());
        args
    }
}

/// Converts raw markup into the target document format
#[async_trait]
pub trait TextConverter: Send + Sync {
    async fn convert(&self, raw: &str, request: &ConversionRequest) -> Result<String, ImportError>;
}

/// Converter that shells out to pandoc (or a compatible program)
#[derive(Debug, Clone)]
pub struct PandocConverter {
    program: PathBuf,
}

impl PandocConverter {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for PandocConverter {
    fn default() -> Self {
        Self::new("pandoc")
    }
}

#[async_trait]
impl TextConverter for PandocConverter {
    async fn convert(&self, raw: &str, request: &ConversionRequest) -> Result<String, ImportError> {
        let mut child = Command::new(&self.program)
            .args(request.args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ImportError::Conversion(format!("cannot start {}: {}", self.program.display(), e))
            })?;

        // Feed stdin from a separate task so a full stdout pipe cannot deadlock us
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| ImportError::Conversion("converter stdin unavailable".into()))?;
        let input = raw.to_owned();
        let writer = tokio::spawn(async move {
            let result = stdin.write_all(input.as_bytes()).await;
            drop(stdin);
            result
        });

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| ImportError::Conversion(format!("converter failed: {}", e)))?;

        // A converter that exits early closes its stdin; its status tells the story
        let _ = writer.await;

        if !output.status.success() {
            return Err(ImportError::Conversion(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        String::from_utf8(output.stdout)
            .map_err(|e| ImportError::Conversion(format!("converter output is not UTF-8: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_keep_filter_order() {
        let request = ConversionRequest::new("mediawiki", "asciidoc")
            .with_filter("filters/remove-header-ids.lua")
            .with_filter("filters/description-list.lua")
            .with_filter("filters/wikilink.lua")
            .with_arg("--wrap=none");

        assert_eq!(
            request.args(),
            vec![
                "--lua-filter",
                "filters/remove-header-ids.lua",
                "--lua-filter",
                "filters/description-list.lua",
                "--lua-filter",
                "filters/wikilink.lua",
                "-f",
                "mediawiki",
                "-t",
                "asciidoc",
                "--wrap=none",
                "-",
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_program_is_conversion_error() {
        let converter = PandocConverter::new("definitely-not-a-real-converter");
        let request = ConversionRequest::new("mediawiki", "asciidoc");
        let result = converter.convert("text", &request).await;
        assert!(matches!(result, Err(ImportError::Conversion(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_zero_exit_is_conversion_error() {
        // `false` ignores its arguments and exits 1
        let converter = PandocConverter::new("false");
        let request = ConversionRequest::new("mediawiki", "asciidoc");
        let err = converter.convert("text", &request).await.unwrap_err();
        assert!(matches!(err, ImportError::Conversion(_)));
        assert!(err.to_string().contains("exited"));
    }
}
