//! Product catalog types and the cached-menu contract.
//!
//! Catalog retrieval itself (fetching a menu from elsewhere) is an external
//! collaborator; the core only defines the lookup shape and the `products`
//! cache key the loader writes through.

use serde::{Deserialize, Serialize};

use crate::storage::{StorageAdapter, keys};

/// A sellable product as listed on the menu.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Stable product identifier, unique across the whole catalog.
    pub id: String,
    /// Display name, captured into cart lines at first add.
    pub name: String,
    /// Unit price, captured into cart lines at first add.
    pub price: f64,
    /// Optional long-form description shown on the menu.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A named menu section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    pub items: Vec<Product>,
}

/// The full menu: store name plus categorized products.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    pub store_name: String,
    pub categories: Vec<Category>,
}

impl Catalog {
    /// The embedded fallback menu, used whenever no cached catalog is
    /// available.
    pub fn builtin() -> Self {
        let product = |id: &str, name: &str, price: f64| Product {
            id: id.to_owned(),
            name: name.to_owned(),
            price,
            description: None,
        };

        Self {
            store_name: "Lanchonete Demo".to_owned(),
            categories: vec![
                Category {
                    name: "Pastéis".to_owned(),
                    items: vec![
                        Product {
                            description: Some(
                                "Sabores: Queijo, Carne, Frango, Pizza, Calabresa com queijo."
                                    .to_owned(),
                            ),
                            ..product("p1", "Pastel Grande (G)", 12.00)
                        },
                        product("p2", "Pastel de Carne", 14.00),
                    ],
                },
                Category {
                    name: "Lanches".to_owned(),
                    items: vec![
                        product("l1", "Misto", 7.00),
                        product("l2", "X-Egg", 10.00),
                        product("l3", "X-Bacon", 14.00),
                    ],
                },
                Category {
                    name: "Bebidas".to_owned(),
                    items: vec![
                        product("b1", "Coca-Cola Lata", 6.00),
                        product("b2", "Água Mineral", 3.00),
                    ],
                },
            ],
        }
    }

    /// Look up a product by id across all categories. First match wins.
    pub fn product(&self, id: &str) -> Option<&Product> {
        self.categories
            .iter()
            .flat_map(|category| category.items.iter())
            .find(|product| product.id == id)
    }

    /// Read the cached catalog from the `products` key, falling back to the
    /// builtin menu when the cache is absent or unreadable.
    pub fn load_cached(adapter: &StorageAdapter) -> Self {
        adapter.read(keys::PRODUCTS, Self::builtin())
    }

    /// Write this catalog to the `products` cache key. This is the storage
    /// side of the external menu loader's contract.
    pub fn cache(&self, adapter: &StorageAdapter) {
        adapter.write(keys::PRODUCTS, self);
    }
}
