use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;
use vendo_catalog::{Product, Vendor};
use vendo_shared::Address;

/// A cart line with its product and owning vendor already fetched.
#[derive(Debug, Clone)]
pub struct CartLine {
    pub product: Product,
    pub vendor: Vendor,
    pub quantity: u32,
}

/// One item inside a vendor group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupItem {
    pub product_id: Uuid,
    pub name: String,
    pub quantity: u32,
    /// Kilograms per unit; 1.0 when the product declares no weight.
    pub weight: f64,
    pub is_physical: bool,
    pub unit_price: i64,
}

/// The subset of a cart belonging to one vendor, plus that vendor's resolved
/// origin address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorGroup {
    pub vendor_id: Uuid,
    pub vendor_name: String,
    pub vendor_email: String,
    pub vendor_phone: String,
    pub origin: Address,
    pub items: Vec<GroupItem>,
    /// Total physical weight of the group (digital items contribute zero).
    pub total_weight: f64,
}

impl VendorGroup {
    pub fn has_physical_items(&self) -> bool {
        self.items.iter().any(|i| i.is_physical)
    }

    pub fn physical_items(&self) -> impl Iterator<Item = &GroupItem> {
        self.items.iter().filter(|i| i.is_physical)
    }

    /// Every vendor currently supports in-store pickup.
    pub fn supports_pickup(&self) -> bool {
        true
    }
}

/// Partition cart lines by owning vendor, preserving first-seen vendor
/// order. Pure data transformation over already-fetched entities; there are
/// no failure modes here.
pub fn group_by_vendor(lines: &[CartLine]) -> Vec<VendorGroup> {
    let mut groups: Vec<VendorGroup> = Vec::new();
    let mut index: HashMap<Uuid, usize> = HashMap::new();

    for line in lines {
        let slot = *index.entry(line.vendor.id).or_insert_with(|| {
            groups.push(VendorGroup {
                vendor_id: line.vendor.id,
                vendor_name: line.vendor.name.clone(),
                vendor_email: line.vendor.email.clone(),
                vendor_phone: line.vendor.phone.clone(),
                origin: line.vendor.address.clone(),
                items: Vec::new(),
                total_weight: 0.0,
            });
            groups.len() - 1
        });

        let is_physical = line.product.is_physical();
        let weight = line.product.unit_weight();
        let group = &mut groups[slot];
        group.items.push(GroupItem {
            product_id: line.product.id,
            name: line.product.name.clone(),
            quantity: line.quantity,
            weight,
            is_physical,
            unit_price: line.product.price,
        });
        if is_physical {
            group.total_weight += weight * line.quantity as f64;
        }
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vendor(name: &str) -> Vendor {
        Vendor {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: format!("{}@vendors.example.com", name),
            phone: "+2348000000000".to_string(),
            address: Address {
                line1: "1 Depot Way".to_string(),
                city: "Lagos".to_string(),
                country: "NG".to_string(),
                ..Default::default()
            },
        }
    }

    fn product(vendor: &Vendor, product_type: Option<&str>, weight: Option<f64>) -> Product {
        Product {
            id: Uuid::new_v4(),
            vendor_id: vendor.id,
            name: "Item".to_string(),
            image_url: None,
            product_type: product_type.map(|s| s.to_string()),
            price: 5000,
            weight,
            stock: 100,
            sales_count: 0,
            is_active: true,
        }
    }

    #[test]
    fn test_groups_preserve_vendor_order() {
        let a = vendor("alpha");
        let b = vendor("beta");
        let lines = vec![
            CartLine { product: product(&a, None, None), vendor: a.clone(), quantity: 1 },
            CartLine { product: product(&b, None, None), vendor: b.clone(), quantity: 1 },
            CartLine { product: product(&a, None, None), vendor: a.clone(), quantity: 2 },
        ];

        let groups = group_by_vendor(&lines);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].vendor_id, a.id);
        assert_eq!(groups[0].items.len(), 2);
        assert_eq!(groups[1].vendor_id, b.id);
    }

    #[test]
    fn test_weight_defaults_and_digital_excluded() {
        let v = vendor("gamma");
        let lines = vec![
            CartLine { product: product(&v, None, None), vendor: v.clone(), quantity: 2 },
            CartLine { product: product(&v, Some("digital"), Some(9.0)), vendor: v.clone(), quantity: 1 },
            CartLine { product: product(&v, Some("apparel"), Some(0.5)), vendor: v.clone(), quantity: 4 },
        ];

        let groups = group_by_vendor(&lines);
        assert_eq!(groups.len(), 1);
        // 2 * 1.0 default + 4 * 0.5; the digital line contributes nothing
        assert!((groups[0].total_weight - 4.0).abs() < f64::EPSILON);
        assert!(!groups[0].items[1].is_physical);
    }

    #[test]
    fn test_empty_cart_yields_no_groups() {
        assert!(group_by_vendor(&[]).is_empty());
    }
}
