//! crates/stylecal_core/src/matcher.rs
//!
//! Joins classified events with the product catalog.

use crate::domain::{Category, EventRecommendation, ExternalEvent, Product};

/// True when the product is flagged as fashion and its category equals
/// `category`, ignoring case and surrounding whitespace.
pub fn product_matches(product: &Product, category: Category) -> bool {
    product.is_fashion == Some(true)
        && product
            .category
            .as_deref()
            .is_some_and(|c| c.trim().eq_ignore_ascii_case(category.as_str()))
}

/// All products matching `category`, in catalog order. Unclassified events
/// get an empty pool.
pub fn product_pool(category: Option<Category>, catalog: &[Product]) -> Vec<Product> {
    let Some(category) = category else {
        return Vec::new();
    };
    catalog
        .iter()
        .filter(|p| product_matches(p, category))
        .cloned()
        .collect()
}

/// Builds the full, untruncated recommendation for one event.
pub fn recommend(event: &ExternalEvent, category: Option<Category>, catalog: &[Product]) -> EventRecommendation {
    EventRecommendation {
        event_id: event.external_id.clone(),
        title: event.title.clone(),
        category,
        pool: product_pool(category, catalog),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(id: i64, category: Option<&str>, is_fashion: Option<bool>) -> Product {
        Product {
            id,
            brand: Some("Aegis".into()),
            category: category.map(str::to_string),
            is_fashion,
            name: Some(format!("Item {id}")),
            image: None,
            url: format!("https://shop.example/{id}"),
        }
    }

    #[test]
    fn requires_fashion_flag_and_category() {
        let catalog = vec![
            product(1, Some("formal"), Some(true)),
            product(2, Some("Formal"), Some(false)),
            product(3, Some("FORMAL"), None),
            product(4, Some("casual"), Some(true)),
            product(5, None, Some(true)),
            product(6, Some(" formal "), Some(true)),
        ];
        let ids: Vec<i64> = product_pool(Some(Category::Formal), &catalog)
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec![1, 6]);
    }

    #[test]
    fn unclassified_event_gets_no_products() {
        let catalog = vec![product(1, Some("formal"), Some(true))];
        assert!(product_pool(None, &catalog).is_empty());
    }

    #[test]
    fn pool_keeps_catalog_order() {
        let catalog = vec![
            product(9, Some("casual"), Some(true)),
            product(2, Some("casual"), Some(true)),
            product(5, Some("casual"), Some(true)),
        ];
        let first = product_pool(Some(Category::Casual), &catalog);
        let second = product_pool(Some(Category::Casual), &catalog);
        assert_eq!(first, second);
        assert_eq!(first.iter().map(|p| p.id).collect::<Vec<_>>(), vec![9, 2, 5]);
    }
}
