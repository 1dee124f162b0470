//! `mdstage convert` command implementation.

use std::path::{Path, PathBuf};

use clap::Args;
use console::Term;
use mdstage_config::{CliSettings, Config};
use mdstage_convert::{
    ArtifactKind, GeneratedArtifact, PreviewSettings, RenderedPreview, StorageConverter,
};

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the convert command.
#[derive(Args)]
pub(crate) struct ConvertArgs {
    /// Path to the markdown file.
    markdown_file: PathBuf,

    /// Directory to write artifacts to (overrides config).
    #[arg(short = 'o', long)]
    output_dir: Option<PathBuf>,

    /// Print the storage markup to stdout as well.
    #[arg(long)]
    stdout: bool,

    /// Render an SVG preview for each diagram via Kroki.
    #[arg(long)]
    previews: bool,

    /// Kroki server URL for preview rendering (overrides config).
    #[arg(long)]
    kroki_url: Option<String>,

    /// Theme for emitted code macros (overrides config).
    #[arg(long)]
    theme: Option<String>,

    /// Width in pixels for emitted drawio macros (overrides config).
    #[arg(long)]
    diagram_width: Option<u32>,

    /// Path to configuration file (default: auto-discover mdstage.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub(crate) verbose: bool,
}

impl ConvertArgs {
    /// Execute the convert command.
    ///
    /// # Errors
    ///
    /// Returns an error if the conversion fails.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        // Load config
        let cli_settings = CliSettings {
            output_dir: self.output_dir.clone(),
            kroki_url: self.kroki_url.clone(),
            code_theme: self.theme.clone(),
            diagram_width: self.diagram_width,
        };
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;

        // Read markdown file
        let markdown = std::fs::read_to_string(&self.markdown_file)?;
        let basename = derive_basename(&self.markdown_file)?;
        output.info(&format!("Converting {}...", self.markdown_file.display()));

        let mut converter = StorageConverter::new()
            .code_theme(config.convert.code_theme.clone())
            .diagram_width(config.convert.diagram_width);
        if self.previews {
            let kroki_url = config.require_kroki_url()?;
            converter = converter.preview(PreviewSettings {
                kroki_url: kroki_url.to_owned(),
                timeout: config.preview_resolved.timeout,
            });
        }

        let result = converter.convert(&markdown, basename);

        let diagram_count = result
            .artifacts
            .iter()
            .filter(|artifact| artifact.kind == ArtifactKind::Diagram)
            .count();
        output.info(&format!("Found {diagram_count} mermaid diagram(s)"));

        for warning in &result.warnings {
            output.warning(&format!("Warning: {warning}"));
        }

        // Write artifacts
        let out_dir = &config.output_resolved.dir;
        let mut written = write_artifacts(out_dir, &result.artifacts)?;
        if self.previews {
            written.extend(write_previews(out_dir, &result.previews)?);
        }
        for path in &written {
            output.info(&format!("  -> {}", path.display()));
        }

        if self.stdout {
            Term::stdout().write_str(&result.storage)?;
        }

        output.success(&format!(
            "\nConversion complete! {} file(s) written to {}",
            written.len(),
            out_dir.display()
        ));

        Ok(())
    }
}

/// Derive the artifact basename from the input file's stem.
fn derive_basename(path: &Path) -> Result<&str, CliError> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .ok_or_else(|| {
            CliError::Validation(format!(
                "cannot derive an output name from {}",
                path.display()
            ))
        })
}

/// Write all artifacts into `dir`, creating it if needed.
fn write_artifacts(dir: &Path, artifacts: &[GeneratedArtifact]) -> Result<Vec<PathBuf>, CliError> {
    std::fs::create_dir_all(dir)?;
    let mut written = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        let path = dir.join(&artifact.name);
        std::fs::write(&path, &artifact.content)?;
        written.push(path);
    }
    Ok(written)
}

/// Write one SVG file per rendered preview into `dir`.
fn write_previews(dir: &Path, previews: &[RenderedPreview]) -> Result<Vec<PathBuf>, CliError> {
    std::fs::create_dir_all(dir)?;
    let mut written = Vec::with_capacity(previews.len());
    for preview in previews {
        let path = dir.join(format!("diagram-{}-preview.svg", preview.index + 1));
        std::fs::write(&path, &preview.svg)?;
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_derive_basename_strips_extension() {
        assert_eq!(derive_basename(Path::new("guide.md")).unwrap(), "guide");
        assert_eq!(
            derive_basename(Path::new("docs/notes.markdown")).unwrap(),
            "notes"
        );
    }

    #[test]
    fn test_derive_basename_rejects_stemless_path() {
        let error = derive_basename(Path::new("..")).unwrap_err();
        assert!(matches!(error, CliError::Validation(_)));
    }

    #[test]
    fn test_write_artifacts_creates_directory_and_files() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out");
        let artifacts = vec![
            GeneratedArtifact::diagram(0, "<mxfile/>"),
            GeneratedArtifact::markup("page", "<p>hi</p>\n"),
        ];

        let written = write_artifacts(&target, &artifacts).unwrap();

        assert_eq!(written.len(), 2);
        assert_eq!(
            std::fs::read_to_string(target.join("diagram-1.drawio")).unwrap(),
            "<mxfile/>"
        );
        assert_eq!(
            std::fs::read_to_string(target.join("page-confluence.xml")).unwrap(),
            "<p>hi</p>\n"
        );
    }

    #[test]
    fn test_write_previews_numbers_from_one() {
        let dir = tempfile::tempdir().unwrap();
        let previews = vec![RenderedPreview {
            index: 2,
            svg: "<svg/>".to_owned(),
        }];

        let written = write_previews(dir.path(), &previews).unwrap();

        assert_eq!(written.len(), 1);
        assert!(written[0].ends_with("diagram-3-preview.svg"));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("diagram-3-preview.svg")).unwrap(),
            "<svg/>"
        );
    }
}
