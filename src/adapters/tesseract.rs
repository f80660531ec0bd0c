//! OCR through the Tesseract command line.
//!
//! The crop is piped to `tesseract stdin stdout ... tsv` as PNG and the TSV
//! word rows are parsed into positioned spans.

use crate::core::config::{ConfigError, ConfigValidator};
use crate::core::errors::RecognitionError;
use crate::core::traits::TextRecognizer;
use crate::domain::{LanguageHint, RecognizedText, RegionClass, TextSpan};
use crate::processors::{BoundingBox, binarize_for_ocr};
use image::{DynamicImage, ImageFormat, RgbImage};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{Cursor, ErrorKind, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tracing::debug;

/// Page segmentation settings for one pass over a crop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentationMode {
    /// Page segmentation mode (`--psm`).
    pub psm: u8,
    /// Mode tried when the first pass finds no words.
    #[serde(default)]
    pub fallback_psm: Option<u8>,
}

impl SegmentationMode {
    pub fn new(psm: u8, fallback_psm: Option<u8>) -> Self {
        Self { psm, fallback_psm }
    }

    /// A single line of text (`--psm 7`), for short field-like regions.
    pub fn single_line() -> Self {
        Self::new(7, None)
    }
}

/// Configuration for [`TesseractRecognizer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TesseractConfig {
    /// Path or name of the tesseract binary.
    pub binary: PathBuf,
    /// OCR engine mode (`--oem`).
    pub oem: u8,
    /// Page segmentation mode (`--psm`); 6 treats the crop as one block of text.
    pub psm: u8,
    /// Mode tried when the first pass finds no words; 11 looks for sparse text.
    pub fallback_psm: Option<u8>,
    /// Grayscale and Otsu-binarize crops before OCR.
    pub binarize: bool,
    /// Keep runs of spaces between words.
    pub preserve_interword_spaces: bool,
    /// Languages the engine accepts; `None` accepts any hint.
    pub languages: Option<Vec<String>>,
    /// Maximum simultaneous tesseract processes.
    pub max_concurrency: Option<usize>,
    /// Segmentation used instead of `psm`/`fallback_psm` for these classes.
    pub class_modes: BTreeMap<RegionClass, SegmentationMode>,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("tesseract"),
            oem: 3,
            psm: 6,
            fallback_psm: Some(11),
            binarize: true,
            preserve_interword_spaces: false,
            languages: None,
            max_concurrency: None,
            class_modes: BTreeMap::new(),
        }
    }
}

impl TesseractConfig {
    /// Uses `mode` for regions of `class`.
    pub fn with_class_mode(mut self, class: RegionClass, mode: SegmentationMode) -> Self {
        self.class_modes.insert(class, mode);
        self
    }

    /// The segmentation used when the region class is unknown.
    pub fn default_mode(&self) -> SegmentationMode {
        SegmentationMode::new(self.psm, self.fallback_psm)
    }

    /// The segmentation used for regions of `class`.
    pub fn mode_for(&self, class: RegionClass) -> SegmentationMode {
        self.class_modes
            .get(&class)
            .copied()
            .unwrap_or_else(|| self.default_mode())
    }
}

impl ConfigValidator for TesseractConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.oem > 3 {
            return Err(ConfigError::InvalidConfig {
                message: format!("oem must be between 0 and 3, got {}", self.oem),
            });
        }
        let modes = std::iter::once(self.default_mode()).chain(self.class_modes.values().copied());
        for psm in modes.flat_map(|m| std::iter::once(m.psm).chain(m.fallback_psm)) {
            if psm > 13 {
                return Err(ConfigError::InvalidConfig {
                    message: format!("psm must be between 0 and 13, got {}", psm),
                });
            }
        }
        self.validate_worker_count("max_concurrency", self.max_concurrency)?;
        if matches!(&self.languages, Some(langs) if langs.is_empty()) {
            return Err(ConfigError::InvalidConfig {
                message: "language list must not be empty".to_string(),
            });
        }
        Ok(())
    }

    fn get_defaults() -> Self {
        Self::default()
    }
}

/// Text recognizer that shells out to `tesseract`.
#[derive(Debug, Clone, Default)]
pub struct TesseractRecognizer {
    config: TesseractConfig,
}

impl TesseractRecognizer {
    /// Create a new recognizer with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new recognizer with custom configuration.
    pub fn with_config(config: TesseractConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Restricts accepted languages to those installed for the binary.
    pub fn with_installed_languages(mut self) -> Result<Self, RecognitionError> {
        let output = self.command().arg("--list-langs").output();
        let output = map_spawn_result(output)?;
        let languages = parse_list_langs(&String::from_utf8_lossy(&output.stdout));
        debug!(languages = ?languages, "tesseract languages discovered");
        self.config.languages = Some(languages);
        Ok(self)
    }

    /// Returns `true` if the binary can be started.
    pub fn is_available(&self) -> bool {
        self.command()
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    pub fn config(&self) -> &TesseractConfig {
        &self.config
    }

    fn command(&self) -> Command {
        Command::new(&self.config.binary)
    }

    fn encode(&self, image: &RgbImage) -> Result<Vec<u8>, RecognitionError> {
        let image = if self.config.binarize {
            DynamicImage::ImageLuma8(binarize_for_ocr(image))
        } else {
            DynamicImage::ImageRgb8(image.clone())
        };
        let mut png = Cursor::new(Vec::new());
        image
            .write_to(&mut png, ImageFormat::Png)
            .map_err(|e| RecognitionError::Failed(format!("failed to encode crop: {}", e)))?;
        Ok(png.into_inner())
    }

    /// Runs one tesseract pass and returns its TSV output.
    fn run_tesseract(
        &self,
        png: &[u8],
        hint: &LanguageHint,
        psm: u8,
    ) -> Result<String, RecognitionError> {
        let mut command = self.command();
        command
            .args(["stdin", "stdout"])
            .args(["-l", &hint.to_string()])
            .args(["--oem", &self.config.oem.to_string()])
            .args(["--psm", &psm.to_string()]);
        if self.config.preserve_interword_spaces {
            command.args(["-c", "preserve_interword_spaces=1"]);
        }
        command
            .arg("tsv")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = map_spawn_result(command.spawn())?;
        // Tesseract loads language data before reading stdin and may exit
        // early; the exit status and stderr decide the error, not the pipe.
        let written = match child.stdin.take() {
            Some(mut stdin) => stdin.write_all(png),
            None => Ok(()),
        };
        let output = child.wait_with_output()?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() && stderr.contains("Failed loading language") {
            return Err(RecognitionError::UnsupportedLanguage {
                language: hint.to_string(),
            });
        }
        if let Err(e) = written {
            if e.kind() != ErrorKind::BrokenPipe || output.status.success() {
                return Err(e.into());
            }
        } else if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }
        Err(RecognitionError::Failed(format!(
            "tesseract exited with {}: {}",
            output.status,
            stderr.trim()
        )))
    }

    fn recognize_with_mode(
        &self,
        image: &RgbImage,
        hint: &LanguageHint,
        mode: SegmentationMode,
    ) -> Result<RecognizedText, RecognitionError> {
        if let Some(language) = self
            .config
            .languages
            .as_deref()
            .and_then(|supported| hint.first_unsupported(supported))
        {
            return Err(RecognitionError::UnsupportedLanguage {
                language: language.to_string(),
            });
        }

        let png = self.encode(image)?;
        let mut text = parse_tsv(&self.run_tesseract(&png, hint, mode.psm)?);
        if text.spans.is_empty() {
            if let Some(fallback) = mode.fallback_psm {
                debug!(psm = fallback, "no words found; retrying in fallback mode");
                text = parse_tsv(&self.run_tesseract(&png, hint, fallback)?);
            }
        }
        Ok(text)
    }
}

impl TextRecognizer for TesseractRecognizer {
    fn recognize(
        &self,
        image: &RgbImage,
        hint: &LanguageHint,
    ) -> Result<RecognizedText, RecognitionError> {
        self.recognize_with_mode(image, hint, self.config.default_mode())
    }

    fn recognize_class(
        &self,
        image: &RgbImage,
        hint: &LanguageHint,
        class: RegionClass,
    ) -> Result<RecognizedText, RecognitionError> {
        self.recognize_with_mode(image, hint, self.config.mode_for(class))
    }

    fn supported_languages(&self) -> Option<&[String]> {
        self.config.languages.as_deref()
    }

    fn max_concurrency(&self) -> Option<usize> {
        self.config.max_concurrency
    }

    fn name(&self) -> &str {
        "tesseract"
    }
}

fn map_spawn_result<T>(result: std::io::Result<T>) -> Result<T, RecognitionError> {
    match result {
        Ok(value) => Ok(value),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(
            RecognitionError::EngineUnavailable("tesseract not found (install tesseract-ocr)".to_string()),
        ),
        Err(e) => Err(RecognitionError::Io(e)),
    }
}

/// One word row of tesseract's TSV output.
#[derive(Debug)]
struct TsvWord {
    line_key: (u32, u32, u32),
    span: TextSpan,
}

fn parse_word_row(row: &str) -> Option<TsvWord> {
    let fields: Vec<&str> = row.split('\t').collect();
    if fields.len() < 12 || fields[0] != "5" {
        return None;
    }
    let text = fields[11..].join("\t");
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let num = |i: usize| fields[i].trim().parse::<f32>().ok();
    let (left, top, width, height) = (num(6)?, num(7)?, num(8)?, num(9)?);
    let conf = num(10)?.max(0.0) / 100.0;
    let key = |i: usize| fields[i].trim().parse::<u32>().ok();

    Some(TsvWord {
        line_key: (key(2)?, key(3)?, key(4)?),
        span: TextSpan::new(text, conf).with_bbox(BoundingBox::from_coords(
            left,
            top,
            left + width,
            top + height,
        )),
    })
}

/// Parses TSV output into word spans; words sharing a block, paragraph and
/// line are joined by spaces and lines by newlines.
pub(crate) fn parse_tsv(tsv: &str) -> RecognizedText {
    let words: Vec<TsvWord> = tsv.lines().filter_map(parse_word_row).collect();

    let lines: Vec<String> = words
        .iter()
        .chunk_by(|w| w.line_key)
        .into_iter()
        .map(|(_, line)| line.map(|w| w.span.text.as_str()).join(" "))
        .collect();

    let spans = words.into_iter().map(|w| w.span).collect();
    RecognizedText::new(lines.join("\n"), spans)
}

/// Parses `tesseract --list-langs` output.
fn parse_list_langs(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("List of available languages"))
        .map(str::to_string)
        .collect()
}
