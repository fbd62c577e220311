//! Image endpoints: generation (JSON) plus edit and variation (multipart PNG uploads).

use super::files::{validate_upload, PNG_UPLOAD};
use super::{json_object, missing_field, model_or, str_of, unexpected_input};
use super::{Adapter, MultipartBody, WireRequest};
use crate::types::{Endpoint, ImageData, ResponseEnvelope, ResponseStatus, TurnInput, WireResponse};
use crate::{Error, ErrorContext, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Map, Value};

const GENERATION_MODEL: &str = "dall-e-3";
const EDIT_MODEL: &str = "dall-e-2";
const DEFAULT_N: u32 = 1;
const DEFAULT_SIZE: &str = "1024x1024";
const DEFAULT_FORMAT: &str = "url";
const IMAGE_FORMATS: &[&str] = &["url", "b64_json"];
const MAX_N: u32 = 10;
const MAX_PROMPT_CHARS: usize = 4000;

static SIZE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[1-9][0-9]*x[1-9][0-9]*$").expect("size pattern compiles"));

/// Resolved `n`, `size` and `response_format`, shared by all three endpoints.
struct Common {
    n: u32,
    size: String,
    response_format: String,
}

fn common(
    endpoint: Endpoint,
    n: Option<u32>,
    size: &Option<String>,
    response_format: &Option<String>,
) -> Result<Common> {
    let n = n.unwrap_or(DEFAULT_N);
    if !(1..=MAX_N).contains(&n) {
        return Err(missing_field(
            endpoint,
            "image.n",
            &format!("n must be between 1 and {}, got {}", MAX_N, n),
        ));
    }
    let size = size.clone().unwrap_or_else(|| DEFAULT_SIZE.to_string());
    if !SIZE_PATTERN.is_match(&size) {
        return Err(missing_field(
            endpoint,
            "image.size",
            &format!("size must look like WIDTHxHEIGHT, got '{}'", size),
        ));
    }
    let response_format = response_format
        .clone()
        .unwrap_or_else(|| DEFAULT_FORMAT.to_string());
    if !IMAGE_FORMATS.contains(&response_format.as_str()) {
        return Err(missing_field(
            endpoint,
            "image.response_format",
            &format!(
                "unsupported response_format '{}'; expected url or b64_json",
                response_format
            ),
        ));
    }
    Ok(Common {
        n,
        size,
        response_format,
    })
}

fn prompt(endpoint: Endpoint, prompt: &Option<String>) -> Result<String> {
    let prompt = prompt
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| missing_field(endpoint, "image.prompt", "a `prompt` is required"))?;
    let chars = prompt.chars().count();
    if chars > MAX_PROMPT_CHARS {
        return Err(missing_field(
            endpoint,
            "image.prompt",
            &format!(
                "prompt is limited to {} characters, got {}",
                MAX_PROMPT_CHARS, chars
            ),
        ));
    }
    Ok(prompt.to_string())
}

fn multipart_common(body: MultipartBody, model: String, common: Common) -> MultipartBody {
    body.text("model", model)
        .text("n", common.n.to_string())
        .text("size", common.size)
        .text("response_format", common.response_format)
}

fn image_response(endpoint: Endpoint, wire: WireResponse) -> Result<ResponseEnvelope> {
    let body = json_object(endpoint, &wire)?;
    let data = body.get("data").and_then(Value::as_array).ok_or_else(|| {
        Error::decode_with_context(
            "image response has no `data` array",
            ErrorContext::new()
                .with_field_path("data")
                .with_source(endpoint.as_str()),
        )
    })?;
    let images = data
        .iter()
        .map(|item| serde_json::from_value::<ImageData>(item.clone()))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| {
            Error::decode_with_context(
                format!("malformed image entry: {}", e),
                ErrorContext::new()
                    .with_field_path("data")
                    .with_source(endpoint.as_str()),
            )
        })?;

    let revised: Vec<Value> = images
        .iter()
        .filter_map(|i| i.revised_prompt.clone().map(Value::String))
        .collect();
    let mut metadata = Map::new();
    metadata.insert("count".into(), json!(images.len()));
    metadata.insert(
        "created".into(),
        body.get("created").cloned().unwrap_or(Value::Null),
    );
    metadata.insert(
        "revised_prompts".into(),
        if revised.is_empty() {
            Value::Null
        } else {
            Value::Array(revised)
        },
    );

    let id = str_of(body, "id").unwrap_or_default();
    Ok(ResponseEnvelope::with_images(
        endpoint,
        id,
        ResponseStatus::Completed,
        images,
        metadata,
        wire,
    ))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ImageGenerationAdapter;

impl Adapter for ImageGenerationAdapter {
    fn endpoint(&self) -> Endpoint {
        Endpoint::ImageGeneration
    }

    fn transform_request(&self, input: &TurnInput) -> Result<WireRequest> {
        let TurnInput::ImageGeneration(image) = input else {
            return Err(unexpected_input(self.endpoint(), input));
        };
        let prompt = prompt(self.endpoint(), &image.prompt)?;
        let common = common(self.endpoint(), image.n, &image.size, &image.response_format)?;

        let mut body = Map::new();
        body.insert("prompt".into(), Value::String(prompt));
        body.insert(
            "model".into(),
            Value::String(model_or(&image.model, GENERATION_MODEL)),
        );
        body.insert("n".into(), json!(common.n));
        body.insert("size".into(), Value::String(common.size));
        if let Some(quality) = &image.quality {
            body.insert("quality".into(), Value::String(quality.clone()));
        }
        if let Some(style) = &image.style {
            body.insert("style".into(), Value::String(style.clone()));
        }
        body.insert(
            "response_format".into(),
            Value::String(common.response_format),
        );
        Ok(WireRequest::Json(Value::Object(body)))
    }

    fn transform_response(&self, wire: WireResponse) -> Result<ResponseEnvelope> {
        image_response(self.endpoint(), wire)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ImageEditAdapter;

impl Adapter for ImageEditAdapter {
    fn endpoint(&self) -> Endpoint {
        Endpoint::ImageEdit
    }

    fn transform_request(&self, input: &TurnInput) -> Result<WireRequest> {
        let TurnInput::ImageEdit(edit) = input else {
            return Err(unexpected_input(self.endpoint(), input));
        };
        let source = edit.image.as_ref().ok_or_else(|| {
            missing_field(self.endpoint(), "image.image", "an `image` to edit is required")
        })?;
        let prompt = prompt(self.endpoint(), &edit.prompt)?;
        let common = common(self.endpoint(), edit.n, &edit.size, &edit.response_format)?;

        let mut body = MultipartBody::new().file(validate_upload("image", source, &PNG_UPLOAD)?);
        if let Some(mask) = &edit.mask {
            body = body.file(validate_upload("mask", mask, &PNG_UPLOAD)?);
        }
        let body = multipart_common(
            body.text("prompt", prompt),
            model_or(&edit.model, EDIT_MODEL),
            common,
        );
        Ok(WireRequest::Multipart(body))
    }

    fn transform_response(&self, wire: WireResponse) -> Result<ResponseEnvelope> {
        image_response(self.endpoint(), wire)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ImageVariationAdapter;

impl Adapter for ImageVariationAdapter {
    fn endpoint(&self) -> Endpoint {
        Endpoint::ImageVariation
    }

    fn transform_request(&self, input: &TurnInput) -> Result<WireRequest> {
        let TurnInput::ImageVariation(variation) = input else {
            return Err(unexpected_input(self.endpoint(), input));
        };
        let source = variation.image.as_ref().ok_or_else(|| {
            missing_field(
                self.endpoint(),
                "image.image",
                "an `image` to vary is required",
            )
        })?;
        let common = common(
            self.endpoint(),
            variation.n,
            &variation.size,
            &variation.response_format,
        )?;

        let body = multipart_common(
            MultipartBody::new().file(validate_upload("image", source, &PNG_UPLOAD)?),
            model_or(&variation.model, EDIT_MODEL),
            common,
        );
        Ok(WireRequest::Multipart(body))
    }

    fn transform_response(&self, wire: WireResponse) -> Result<ResponseEnvelope> {
        image_response(self.endpoint(), wire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ImageEditInput, ImageGenerationInput, ImageVariationInput};
    use std::io::Write;
    use std::path::PathBuf;

    fn png(dir: &tempfile::TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR\0\0\0\x01\0\0\0\x01")
            .unwrap();
        path
    }

    #[test]
    fn generation_defaults_and_limits() {
        let input = TurnInput::ImageGeneration(ImageGenerationInput {
            prompt: Some("a cat".into()),
            style: Some("vivid".into()),
            ..Default::default()
        });
        let body = ImageGenerationAdapter
            .transform_request(&input)
            .unwrap()
            .as_json()
            .cloned()
            .unwrap();
        assert_eq!(body["n"], 1);
        assert_eq!(body["size"], "1024x1024");
        assert_eq!(body["model"], "dall-e-3");
        assert_eq!(body["style"], "vivid");
        assert!(body.get("quality").is_none());

        for bad in [
            ImageGenerationInput::default(),
            ImageGenerationInput {
                prompt: Some("a cat".into()),
                n: Some(11),
                ..Default::default()
            },
            ImageGenerationInput {
                prompt: Some("a cat".into()),
                size: Some("big".into()),
                ..Default::default()
            },
            ImageGenerationInput {
                prompt: Some("p".repeat(MAX_PROMPT_CHARS + 1)),
                ..Default::default()
            },
        ] {
            assert!(ImageGenerationAdapter
                .transform_request(&TurnInput::ImageGeneration(bad))
                .unwrap_err()
                .is_validation());
        }
    }

    #[test]
    fn edit_uploads_image_and_mask() {
        let dir = tempfile::tempdir().unwrap();
        let input = TurnInput::ImageEdit(ImageEditInput {
            image: Some(png(&dir, "base.png")),
            mask: Some(png(&dir, "mask.png")),
            prompt: Some("add a hat".into()),
            ..Default::default()
        });
        let wire = ImageEditAdapter.transform_request(&input).unwrap();
        let body = wire.as_multipart().unwrap();
        assert_eq!(body.files.len(), 2);
        assert_eq!(body.file_part("mask").unwrap().mime.as_deref(), Some("image/png"));
        assert_eq!(body.field("model"), Some("dall-e-2"));
        assert_eq!(body.field("n"), Some("1"));
        assert_eq!(body.field("prompt"), Some("add a hat"));
    }

    #[test]
    fn variation_without_image_fails_locally() {
        let err = ImageVariationAdapter
            .transform_request(&TurnInput::ImageVariation(ImageVariationInput::default()))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest { .. }));
    }

    #[test]
    fn response_collects_images_and_revised_prompts() {
        let raw = json!({
            "created": 1700000000,
            "data": [
                {"url": "https://img/1.png", "revised_prompt": "a fluffy cat"},
                {"b64_json": "iVBORw0KGgo="}
            ]
        });
        let env = ImageGenerationAdapter
            .transform_response(WireResponse::Json(raw.clone()))
            .unwrap();
        let images = env.images().unwrap();
        assert_eq!(images.len(), 2);
        assert_eq!(images[1].b64_json.as_deref(), Some("iVBORw0KGgo="));
        assert_eq!(env.metadata()["count"], 2);
        assert_eq!(env.metadata()["revised_prompts"], json!(["a fluffy cat"]));
        assert!(env.id().starts_with("imggen_"));
        assert_eq!(env.raw(), &WireResponse::Json(raw));
    }
}
