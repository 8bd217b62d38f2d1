//! Products

use std::fmt;

use rust_decimal::Decimal;
use rusty_money::{Money, iso::Currency};
use serde::{Deserialize, Serialize};
use slotmap::new_key_type;
use smallvec::SmallVec;

use crate::tags::{collection::TagCollection, string::StringTagCollection};

new_key_type! {
    /// Product Key
    pub struct ProductKey;
}

/// External product identifier, as stored by the document store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    /// Create a product id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProductId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Identity of a colour variant: its colour code when it has one, otherwise its name.
///
/// Keys are trimmed and lower-cased, so `"#FF0000"` and `"#ff0000"` are the same variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct VariantKey(String);

impl VariantKey {
    /// Create a normalised variant key.
    pub fn new(key: impl AsRef<str>) -> Self {
        Self(key.as_ref().trim().to_lowercase())
    }

    /// The normalised key.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for VariantKey {
    fn from(key: String) -> Self {
        Self::new(key)
    }
}

impl From<&str> for VariantKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<VariantKey> for String {
    fn from(key: VariantKey) -> Self {
        key.0
    }
}

impl fmt::Display for VariantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A colour a product is sold in.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorVariant {
    /// Display name, e.g. "Indigo"
    pub name: String,

    /// Colour code, e.g. "#3f51b5"
    pub color_code: Option<String>,

    /// Image references on the media host
    pub images: SmallVec<[String; 4]>,
}

impl ColorVariant {
    /// Create a variant without images.
    pub fn new(name: impl Into<String>, color_code: Option<&str>) -> Self {
        Self {
            name: name.into(),
            color_code: color_code.map(ToString::to_string),
            images: SmallVec::new(),
        }
    }

    /// Canonical key: the colour code if set, otherwise the name.
    #[must_use]
    pub fn key(&self) -> VariantKey {
        match self.color_code.as_deref().map(str::trim) {
            Some(code) if !code.is_empty() => VariantKey::new(code),
            _ => VariantKey::new(&self.name),
        }
    }

    /// Whether a requested key names this variant, by colour code or by name.
    #[must_use]
    pub fn matches(&self, key: &VariantKey) -> bool {
        self.key() == *key || VariantKey::new(&self.name) == *key
    }
}

/// Product
#[derive(Debug, Clone)]
pub struct Product<'a, T: TagCollection = StringTagCollection> {
    /// External product id
    pub id: ProductId,

    /// Product title
    pub name: String,

    /// Product tags
    pub tags: T,

    /// Base price. Records written by older admin tools can lack one.
    pub price: Option<Money<'a, Currency>>,

    /// Product's own discount in percent points (0-100)
    pub discount: Option<Decimal>,

    /// Units available to sell
    pub stock: u32,

    /// Units sold (or held in carts)
    pub sales_count: u32,

    /// Whether the product is visible in the storefront
    pub published: bool,

    /// Colour variants
    pub variants: SmallVec<[ColorVariant; 4]>,
}

impl<'a, T: TagCollection> Product<'a, T> {
    /// Create a published product with no discount, tags or variants.
    pub fn new(
        id: impl Into<ProductId>,
        name: impl Into<String>,
        price: Money<'a, Currency>,
        stock: u32,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            tags: T::empty(),
            price: Some(price),
            discount: None,
            stock,
            sales_count: 0,
            published: true,
            variants: SmallVec::new(),
        }
    }

    /// Set the product's own discount.
    #[must_use]
    pub fn with_discount(mut self, percent: impl Into<Decimal>) -> Self {
        self.discount = Some(percent.into());
        self
    }

    /// Set the product's tags.
    #[must_use]
    pub fn with_tags(mut self, tags: T) -> Self {
        self.tags = tags;
        self
    }

    /// Add a colour variant.
    #[must_use]
    pub fn with_variant(mut self, variant: ColorVariant) -> Self {
        self.variants.push(variant);
        self
    }

    /// Mark the product as unpublished.
    #[must_use]
    pub fn unpublished(mut self) -> Self {
        self.published = false;
        self
    }

    /// Find the variant a requested key refers to.
    pub fn variant(&self, key: &VariantKey) -> Option<&ColorVariant> {
        self.variants.iter().find(|variant| variant.matches(key))
    }

    /// Currency of the base price, if there is one.
    pub fn currency(&self) -> Option<&'a Currency> {
        self.price.map(|price| price.currency())
    }
}

impl From<String> for ProductId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[cfg(test)]
mod tests {
    use rusty_money::iso::INR;

    use super::*;

    #[test]
    fn variant_key_is_case_insensitive() {
        assert_eq!(VariantKey::new(" #FF0000"), VariantKey::new("#ff0000"));
    }

    #[test]
    fn variant_key_prefers_color_code() {
        let coded = ColorVariant::new("Red", Some("#FF0000"));
        let uncoded = ColorVariant::new("Red", None);
        let blank_code = ColorVariant::new("Red", Some("  "));

        assert_eq!(coded.key().as_str(), "#ff0000");
        assert_eq!(uncoded.key().as_str(), "red");
        assert_eq!(blank_code.key().as_str(), "red");
    }

    #[test]
    fn variant_matches_by_code_or_name() {
        let variant = ColorVariant::new("Indigo", Some("#3F51B5"));

        assert!(variant.matches(&VariantKey::new("#3f51b5")));
        assert!(variant.matches(&VariantKey::new("INDIGO")));
        assert!(!variant.matches(&VariantKey::new("teal")));
    }

    #[test]
    fn product_finds_variant_by_either_identity() {
        let product: Product<'_> = Product::new("kurta", "Kurta", Money::from_minor(1000, INR), 5)
            .with_variant(ColorVariant::new("Indigo", Some("#3F51B5")))
            .with_variant(ColorVariant::new("Saffron", None));

        assert_eq!(
            product.variant(&"saffron".into()).map(|v| v.name.as_str()),
            Some("Saffron")
        );
        assert_eq!(
            product.variant(&"#3f51b5".into()).map(|v| v.name.as_str()),
            Some("Indigo")
        );
        assert!(product.variant(&"green".into()).is_none());
    }

    #[test]
    fn new_product_defaults() {
        let product: Product<'_> = Product::new("tee", "Tee", Money::from_minor(500, INR), 3);

        assert!(product.published);
        assert_eq!(product.discount, None);
        assert_eq!(product.sales_count, 0);
        assert_eq!(product.currency(), Some(INR));
    }
}
