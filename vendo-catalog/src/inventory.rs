use std::collections::HashMap;
use uuid::Uuid;

use crate::product::Product;

/// In-memory product/stock store used by the orchestrator for availability
/// checks at order creation and compensating restocks on cancellation.
pub struct InventoryManager {
    products: HashMap<Uuid, Product>,
}

impl InventoryManager {
    pub fn new() -> Self {
        Self {
            products: HashMap::new(),
        }
    }

    /// Build from a JSON array of products, as exported by the upstream
    /// catalog service.
    pub fn from_seed(json: &str) -> Result<Self, serde_json::Error> {
        let products: Vec<Product> = serde_json::from_str(json)?;
        let mut manager = Self::new();
        for product in products {
            manager.upsert(product);
        }
        Ok(manager)
    }

    pub fn upsert(&mut self, product: Product) {
        self.products.insert(product.id, product);
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn get(&self, product_id: &Uuid) -> Option<&Product> {
        self.products.get(product_id)
    }

    /// Availability check + decrement, applied at order creation. Also bumps
    /// the sales counter so best-seller sorting stays consistent.
    pub fn commit_sale(&mut self, product_id: &Uuid, quantity: u32) -> Result<(), InventoryError> {
        let product = self
            .products
            .get_mut(product_id)
            .ok_or_else(|| InventoryError::NotFound(product_id.to_string()))?;

        if !product.is_active {
            return Err(InventoryError::NotAvailable(product.name.clone()));
        }
        if product.stock < quantity as i64 {
            return Err(InventoryError::InsufficientStock {
                product: product.name.clone(),
                requested: quantity as i64,
                available: product.stock,
            });
        }

        product.stock -= quantity as i64;
        product.sales_count += quantity as i64;
        Ok(())
    }

    /// Compensation for a cancelled order line: stock back, sales counter
    /// down (floored at zero).
    pub fn restock(&mut self, product_id: &Uuid, quantity: u32) -> Result<(), InventoryError> {
        let product = self
            .products
            .get_mut(product_id)
            .ok_or_else(|| InventoryError::NotFound(product_id.to_string()))?;

        product.stock += quantity as i64;
        product.sales_count = (product.sales_count - quantity as i64).max(0);
        Ok(())
    }
}

impl Default for InventoryManager {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("Product not found: {0}")]
    NotFound(String),

    #[error("Product not available: {0}")]
    NotAvailable(String),

    #[error("Insufficient stock for {product}: requested {requested}, available {available}")]
    InsufficientStock {
        product: String,
        requested: i64,
        available: i64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(stock: i64) -> (InventoryManager, Uuid) {
        let mut manager = InventoryManager::new();
        let id = Uuid::new_v4();
        manager.upsert(Product {
            id,
            vendor_id: Uuid::new_v4(),
            name: "Kettle".to_string(),
            image_url: None,
            product_type: None,
            price: 5000,
            weight: Some(1.2),
            stock,
            sales_count: 0,
            is_active: true,
        });
        (manager, id)
    }

    #[test]
    fn test_sale_and_restock_roundtrip() {
        let (mut manager, id) = seeded(5);

        manager.commit_sale(&id, 2).unwrap();
        assert_eq!(manager.get(&id).unwrap().stock, 3);
        assert_eq!(manager.get(&id).unwrap().sales_count, 2);

        manager.restock(&id, 2).unwrap();
        assert_eq!(manager.get(&id).unwrap().stock, 5);
        assert_eq!(manager.get(&id).unwrap().sales_count, 0);
    }

    #[test]
    fn test_seed_parses_product_array() {
        let id = Uuid::new_v4();
        let vendor_id = Uuid::new_v4();
        let json = format!(
            r#"[{{
                "id": "{id}",
                "vendor_id": "{vendor_id}",
                "name": "Kettle",
                "price": 5000,
                "stock": 10,
                "sales_count": 0,
                "is_active": true
            }}]"#
        );

        let manager = InventoryManager::from_seed(&json).unwrap();
        assert_eq!(manager.len(), 1);
        let product = manager.get(&id).unwrap();
        assert_eq!(product.price, 5000);
        // Omitted optional fields come through as their defaults
        assert!(product.product_type.is_none());
        assert!(product.is_physical());
    }

    #[test]
    fn test_insufficient_stock_rejected() {
        let (mut manager, id) = seeded(1);
        let result = manager.commit_sale(&id, 2);
        assert!(matches!(
            result,
            Err(InventoryError::InsufficientStock { .. })
        ));
        // No partial decrement
        assert_eq!(manager.get(&id).unwrap().stock, 1);
    }
}
