use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    dto::products::ProductForm,
    error::FieldErrors,
    storage::{ImageFile, validate_image},
};

pub const NAME_MAX: usize = 100;
pub const DESCRIPTION_MAX: usize = 1000;

pub mod messages {
    pub const REQUIRED_NAME: &str = "Product name is required";
    pub const NAME_TOO_LONG: &str = "Product name must be less than 100 characters";
    pub const REQUIRED_DESCRIPTION: &str = "Product description is required";
    pub const DESCRIPTION_TOO_LONG: &str = "Description must be less than 1000 characters";
    pub const REQUIRED_BENEFICIARY: &str = "Beneficiary is required";
    pub const REQUIRED_CATEGORY: &str = "Category is required";
    pub const UNKNOWN_CATEGORY: &str = "The selected category does not exist.";
    pub const REQUIRED_IMAGE: &str = "Product image is required";
    pub const INVALID_IMAGE: &str =
        "Image must be a valid file (JPEG, PNG, GIF, WebP, SVG, BMP) under 15MB";
    pub const INVALID_TECH: &str = "Technology name is required";
    pub const INVALID_TECH_LIST: &str = "Technologies must be a JSON list of names";
    pub const INVALID_PRICE: &str = "Price must be a positive number";
    pub const RATING_RANGE: &str = "Rating must be between 0 and 5";
    pub const RATING_STEP: &str = "Rating must be in 0.5 steps";
    pub const INVALID_PAGES: &str = "Pages must be a positive whole number";
    pub const INVALID_URL: &str = "The URL must start with http or https and be valid.";
}

static SCRIPT_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>").expect("valid script regex")
});
static HTML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid tag regex"));
static HTTP_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?://.+").expect("valid url regex"));

/// Whether the image is required (create) or optional (update).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageRule {
    Required,
    Optional,
}

#[derive(Debug, Clone)]
pub struct ValidatedProduct {
    pub name: String,
    pub description: String,
    pub beneficiary: String,
    pub category_id: Uuid,
    pub price: f64,
    pub rating: f64,
    pub url: Option<String>,
    pub pages: Option<i32>,
    pub techs: Vec<String>,
    /// Present only when a new file was supplied and passed type/size checks.
    pub image: Option<ImageFile>,
}

/// Strips `<script>` blocks and any remaining markup, then trims.
pub fn sanitize(value: &str) -> String {
    let without_scripts = SCRIPT_TAG.replace_all(value, "");
    HTML_TAG.replace_all(&without_scripts, "").trim().to_string()
}

pub fn parse_category_id(raw: Option<&str>) -> Result<Uuid, String> {
    raw.map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| Uuid::parse_str(v).ok())
        .ok_or_else(|| messages::REQUIRED_CATEGORY.to_string())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TechEntry {
    Named { name: String },
    Bare(String),
}

/// Parses the `productTechs` JSON, trimming names and dropping duplicates
/// while keeping submission order.
pub fn parse_techs(raw: Option<&str>) -> Result<Vec<String>, String> {
    let raw = match raw.map(str::trim) {
        None | Some("") => return Ok(Vec::new()),
        Some(raw) => raw,
    };
    let entries: Vec<TechEntry> =
        serde_json::from_str(raw).map_err(|_| messages::INVALID_TECH_LIST.to_string())?;

    let mut techs: Vec<String> = Vec::with_capacity(entries.len());
    for entry in entries {
        let name = match entry {
            TechEntry::Named { name } | TechEntry::Bare(name) => name.trim().to_string(),
        };
        if name.is_empty() {
            return Err(messages::INVALID_TECH.to_string());
        }
        if !techs.contains(&name) {
            techs.push(name);
        }
    }
    Ok(techs)
}

fn parse_price(raw: Option<&str>) -> Result<f64, String> {
    raw.map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v >= 0.0)
        .ok_or_else(|| messages::INVALID_PRICE.to_string())
}

fn parse_rating(raw: Option<&str>) -> Result<f64, String> {
    let raw = match raw.map(str::trim) {
        None | Some("") => return Ok(0.0),
        Some(raw) => raw,
    };
    let rating = raw
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| messages::RATING_RANGE.to_string())?;
    if !(0.0..=5.0).contains(&rating) {
        return Err(messages::RATING_RANGE.to_string());
    }
    if (rating * 2.0).fract() != 0.0 {
        return Err(messages::RATING_STEP.to_string());
    }
    Ok(rating)
}

fn parse_pages(raw: Option<&str>) -> Result<Option<i32>, String> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => v
            .parse::<i32>()
            .ok()
            .filter(|p| *p > 0)
            .map(Some)
            .ok_or_else(|| messages::INVALID_PAGES.to_string()),
    }
}

fn parse_url(raw: Option<&str>) -> Result<Option<String>, String> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) if HTTP_URL.is_match(v) => Ok(Some(v.to_string())),
        Some(_) => Err(messages::INVALID_URL.to_string()),
    }
}

fn bounded_text(
    raw: Option<&str>,
    max: usize,
    required: &str,
    too_long: &str,
) -> Result<String, String> {
    let value = sanitize(raw.unwrap_or_default());
    if value.is_empty() {
        return Err(required.to_string());
    }
    if value.chars().count() > max {
        return Err(too_long.to_string());
    }
    Ok(value)
}

fn check_image(image: Option<&ImageFile>, rule: ImageRule) -> Result<Option<ImageFile>, String> {
    let supplied = image.filter(|f| f.is_supplied());
    match (supplied, rule) {
        (None, ImageRule::Required) => Err(messages::REQUIRED_IMAGE.to_string()),
        (None, ImageRule::Optional) => Ok(None),
        (Some(file), _) => validate_image(file)
            .map(|()| Some(file.clone()))
            .map_err(|_| messages::INVALID_IMAGE.to_string()),
    }
}

fn take<T>(errors: &mut FieldErrors, field: &str, result: Result<T, String>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(message) => {
            errors.insert(field.to_string(), message);
            None
        }
    }
}

pub fn validate_product(form: &ProductForm, rule: ImageRule) -> Result<ValidatedProduct, FieldErrors> {
    let mut errors = FieldErrors::new();

    let name = take(
        &mut errors,
        "name",
        bounded_text(
            form.name.as_deref(),
            NAME_MAX,
            messages::REQUIRED_NAME,
            messages::NAME_TOO_LONG,
        ),
    );
    let description = take(
        &mut errors,
        "description",
        bounded_text(
            form.description.as_deref(),
            DESCRIPTION_MAX,
            messages::REQUIRED_DESCRIPTION,
            messages::DESCRIPTION_TOO_LONG,
        ),
    );
    let beneficiary = take(
        &mut errors,
        "beneficiary",
        form.beneficiary
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .ok_or_else(|| messages::REQUIRED_BENEFICIARY.to_string()),
    );
    let category_id = take(&mut errors, "categoryId", parse_category_id(form.category_id.as_deref()));
    let price = take(&mut errors, "price", parse_price(form.price.as_deref()));
    let rating = take(&mut errors, "rating", parse_rating(form.rating.as_deref()));
    let url = take(&mut errors, "url", parse_url(form.url.as_deref()));
    let pages = take(&mut errors, "pages", parse_pages(form.pages.as_deref()));
    let techs = take(&mut errors, "productTechs", parse_techs(form.product_techs.as_deref()));
    let image = take(&mut errors, "image", check_image(form.image.as_ref(), rule));

    match (
        name,
        description,
        beneficiary,
        category_id,
        price,
        rating,
        url,
        pages,
        techs,
        image,
    ) {
        (
            Some(name),
            Some(description),
            Some(beneficiary),
            Some(category_id),
            Some(price),
            Some(rating),
            Some(url),
            Some(pages),
            Some(techs),
            Some(image),
        ) => Ok(ValidatedProduct {
            name,
            description,
            beneficiary,
            category_id,
            price,
            rating,
            url,
            pages,
            techs,
            image,
        }),
        _ => Err(errors),
    }
}
