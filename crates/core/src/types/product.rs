//! Admin product add/edit data contract.
//!
//! The admin console sends the same payload to create (`POST /products/admin`)
//! and edit (`PUT /products/admin/{id}`) a product. Images are uploaded to the
//! image host first; the draft only carries their public URLs.
//!
//! Nothing in the cart subsystem consumes these types. They live here so the
//! admin console and the backend serialize one agreed shape.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for a product draft.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProductDraftError {
    #[error("a category must be selected")]
    MissingCategory,
    #[error("price must not be negative")]
    NegativePrice,
    #[error("stock must not be negative")]
    NegativeStock,
    #[error("exactly the first image must be marked as main")]
    MainImage,
}

/// An uploaded product image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductImage {
    pub url: String,
    pub main_image: bool,
}

/// Payload for creating or editing a catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDraft {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    pub stock: i32,
    pub category_names: Vec<String>,
    #[serde(default)]
    pub images: Vec<ProductImage>,
}

impl ProductDraft {
    /// Name used when the form leaves it blank.
    pub const UNNAMED: &'static str = "Unnamed product";

    /// Build a draft from raw form input.
    ///
    /// A blank name falls back to [`Self::UNNAMED`]. Existing images keep
    /// their order and newly uploaded ones are appended; the first image
    /// becomes the main one.
    #[must_use]
    pub fn from_form(
        name: &str,
        description: &str,
        price: Decimal,
        stock: i32,
        category: Option<&str>,
        images: impl IntoIterator<Item = String>,
    ) -> Self {
        let name = name.trim();
        let images = images
            .into_iter()
            .enumerate()
            .map(|(i, url)| ProductImage {
                url,
                main_image: i == 0,
            })
            .collect();

        Self {
            name: if name.is_empty() {
                Self::UNNAMED.to_string()
            } else {
                name.to_string()
            },
            description: description.to_string(),
            price,
            stock,
            category_names: category
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(String::from)
                .into_iter()
                .collect(),
            images,
        }
    }

    /// Check the draft before it is submitted.
    ///
    /// # Errors
    ///
    /// Returns the first violated rule.
    pub fn validate(&self) -> Result<(), ProductDraftError> {
        if self.category_names.iter().all(|c| c.trim().is_empty()) {
            return Err(ProductDraftError::MissingCategory);
        }
        if self.price.is_sign_negative() && !self.price.is_zero() {
            return Err(ProductDraftError::NegativePrice);
        }
        if self.stock < 0 {
            return Err(ProductDraftError::NegativeStock);
        }
        let main_ok = self
            .images
            .iter()
            .enumerate()
            .all(|(i, img)| img.main_image == (i == 0));
        if !main_ok {
            return Err(ProductDraftError::MainImage);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_form_marks_first_image_main() {
        let draft = ProductDraft::from_form(
            "  Figura Goku ",
            "",
            Decimal::from(85_000),
            4,
            Some("Anime"),
            vec!["https://img/a.png".to_string(), "https://img/b.png".to_string()],
        );
        assert_eq!(draft.name, "Figura Goku");
        assert_eq!(draft.category_names, vec!["Anime".to_string()]);
        assert!(draft.images[0].main_image);
        assert!(!draft.images[1].main_image);
        assert_eq!(draft.validate(), Ok(()));
    }

    #[test]
    fn test_blank_name_falls_back() {
        let draft =
            ProductDraft::from_form("", "", Decimal::ZERO, 0, Some("Cartas"), Vec::new());
        assert_eq!(draft.name, ProductDraft::UNNAMED);
    }

    #[test]
    fn test_category_is_required() {
        let draft = ProductDraft::from_form("Mando", "", Decimal::ONE, 1, None, Vec::new());
        assert_eq!(draft.validate(), Err(ProductDraftError::MissingCategory));
    }

    #[test]
    fn test_negative_stock_is_rejected() {
        let draft =
            ProductDraft::from_form("Mando", "", Decimal::ONE, -1, Some("Accesorios"), Vec::new());
        assert_eq!(draft.validate(), Err(ProductDraftError::NegativeStock));
    }

    #[test]
    fn test_serializes_camel_case() {
        let draft = ProductDraft::from_form(
            "Mando",
            "Inalámbrico",
            Decimal::from(120_000),
            2,
            Some("Videojuegos"),
            vec!["https://img/m.png".to_string()],
        );
        let json = serde_json::to_value(&draft).unwrap();
        assert_eq!(json["categoryNames"][0], "Videojuegos");
        assert_eq!(json["images"][0]["mainImage"], true);
    }
}
