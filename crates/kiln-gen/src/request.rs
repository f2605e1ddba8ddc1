//! Generation requests and input validation
//!
//! A run takes exactly one primary input: a text prompt, a local image or a
//! remote image URL. Callers that collect these as three optional fields (CLI
//! flags, config) go through [`RawInputs::validate`] to get a
//! [`GenerationInput`], which cannot represent the invalid combinations.

use kiln_core::{KilnError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// The single primary input of a generation job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationInput {
    Prompt(String),
    Image(PathBuf),
    ImageUrl(String),
}

impl GenerationInput {
    /// Input type as recorded in the run record
    pub fn input_type(&self) -> &'static str {
        match self {
            GenerationInput::Prompt(_) => "prompt",
            GenerationInput::Image(_) => "image",
            GenerationInput::ImageUrl(_) => "image_url",
        }
    }

    /// Input value as recorded in the run record
    pub fn input_value(&self) -> String {
        match self {
            GenerationInput::Prompt(p) => p.clone(),
            GenerationInput::Image(path) => path.to_string_lossy().to_string(),
            GenerationInput::ImageUrl(url) => url.clone(),
        }
    }

    /// Whether this input is an image (local or remote)
    pub fn is_image(&self) -> bool {
        !matches!(self, GenerationInput::Prompt(_))
    }
}

/// Primary inputs as loose optional fields, before validation
#[derive(Debug, Clone, Default)]
pub struct RawInputs {
    pub prompt: Option<String>,
    pub image: Option<PathBuf>,
    pub image_url: Option<String>,
}

impl RawInputs {
    /// Return the one populated field as a [`GenerationInput`].
    ///
    /// Empty strings and empty paths count as absent.
    pub fn validate(self) -> Result<GenerationInput> {
        let mut provided = Vec::new();

        if let Some(prompt) = self.prompt.filter(|p| !p.trim().is_empty()) {
            provided.push(GenerationInput::Prompt(prompt));
        }
        if let Some(image) = self.image.filter(|p| !p.as_os_str().is_empty()) {
            provided.push(GenerationInput::Image(image));
        }
        if let Some(url) = self.image_url.filter(|u| !u.trim().is_empty()) {
            provided.push(GenerationInput::ImageUrl(url));
        }

        match provided.len() {
            0 => Err(KilnError::InvalidInput(
                "must provide exactly one of: prompt, image, image_url".to_string(),
            )),
            1 => Ok(provided.remove(0)),
            _ => {
                let types: Vec<&str> = provided.iter().map(|i| i.input_type()).collect();
                Err(KilnError::InvalidInput(format!(
                    "provide only ONE input, got: {}",
                    types.join(", ")
                )))
            }
        }
    }
}

/// Auxiliary camera views accepted alongside a front image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewKind {
    Left,
    Right,
    Back,
}

impl ViewKind {
    pub const ALL: [ViewKind; 3] = [ViewKind::Left, ViewKind::Right, ViewKind::Back];

    pub fn as_str(&self) -> &'static str {
        match self {
            ViewKind::Left => "left",
            ViewKind::Right => "right",
            ViewKind::Back => "back",
        }
    }
}

impl fmt::Display for ViewKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ViewKind {
    type Err = KilnError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "left" => Ok(ViewKind::Left),
            "right" => Ok(ViewKind::Right),
            "back" => Ok(ViewKind::Back),
            other => Err(KilnError::InvalidInput(format!(
                "invalid view '{}'. Valid views: left, right, back",
                other
            ))),
        }
    }
}

/// A local image for one auxiliary view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewImage {
    pub view: ViewKind,
    pub path: PathBuf,
}

/// A validated generation request
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    input: GenerationInput,
    views: Vec<ViewImage>,
}

impl GenerationRequest {
    /// A request without auxiliary views
    pub fn new(input: GenerationInput) -> Self {
        Self {
            input,
            views: Vec::new(),
        }
    }

    pub fn from_prompt(prompt: impl Into<String>) -> Self {
        Self::new(GenerationInput::Prompt(prompt.into()))
    }

    pub fn from_image(path: impl AsRef<Path>) -> Self {
        Self::new(GenerationInput::Image(path.as_ref().to_path_buf()))
    }

    pub fn from_image_url(url: impl Into<String>) -> Self {
        Self::new(GenerationInput::ImageUrl(url.into()))
    }

    /// Attach an auxiliary view image.
    ///
    /// Views require an image input and each view may appear once.
    pub fn with_view(mut self, view: ViewKind, path: impl AsRef<Path>) -> Result<Self> {
        if !self.input.is_image() {
            return Err(KilnError::InvalidInput(format!(
                "{} view requires an image or image_url input, got {}",
                view,
                self.input.input_type()
            )));
        }
        if self.views.iter().any(|v| v.view == view) {
            return Err(KilnError::InvalidInput(format!(
                "{} view supplied more than once",
                view
            )));
        }
        self.views.push(ViewImage {
            view,
            path: path.as_ref().to_path_buf(),
        });
        Ok(self)
    }

    pub fn input(&self) -> &GenerationInput {
        &self.input
    }

    pub fn views(&self) -> &[ViewImage] {
        &self.views
    }

    /// Whether any local file has to be uploaded before submission
    pub fn needs_upload(&self) -> bool {
        matches!(self.input, GenerationInput::Image(_)) || !self.views.is_empty()
    }
}
