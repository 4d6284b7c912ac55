//! Report definitions for bulk exports.

use std::collections::HashMap;
use std::fmt;

use crate::error::{Error, ErrorKind, Result};
use crate::jsonl::DEFAULT_LINKAGE_FIELD;

/// A named bulk report.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReportType {
    Products,
    Orders,
    Customers,
    /// Product variants with their inventory levels per location.
    ProductVariantInventory,
    /// A report registered by the caller.
    Custom(String),
}

impl ReportType {
    /// Stable name used on the command line and in logs.
    pub fn name(&self) -> &str {
        match self {
            ReportType::Products => "products",
            ReportType::Orders => "orders",
            ReportType::Customers => "customers",
            ReportType::ProductVariantInventory => "product-variant-inventory",
            ReportType::Custom(name) => name,
        }
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<&str> for ReportType {
    fn from(name: &str) -> Self {
        match name {
            "products" => ReportType::Products,
            "orders" => ReportType::Orders,
            "customers" => ReportType::Customers,
            "product-variant-inventory" => ReportType::ProductVariantInventory,
            other => ReportType::Custom(other.to_string()),
        }
    }
}

/// Query and JSONL linkage field for a report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportDefinition {
    pub query: String,
    pub linkage_field: String,
}

impl ReportDefinition {
    /// A definition using the default linkage field.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            linkage_field: DEFAULT_LINKAGE_FIELD.to_string(),
        }
    }

    pub fn with_linkage_field(mut self, field: impl Into<String>) -> Self {
        self.linkage_field = field.into();
        self
    }
}

const PRODUCTS_QUERY: &str = r#"{
  products {
    edges {
      node {
        id
        title
        handle
        status
        vendor
        productType
        createdAt
        updatedAt
      }
    }
  }
}"#;

const ORDERS_QUERY: &str = r#"{
  orders {
    edges {
      node {
        id
        name
        createdAt
        displayFinancialStatus
        displayFulfillmentStatus
        currentTotalPriceSet { shopMoney { amount currencyCode } }
        lineItems {
          edges {
            node {
              id
              sku
              quantity
              originalUnitPriceSet { shopMoney { amount currencyCode } }
            }
          }
        }
      }
    }
  }
}"#;

const CUSTOMERS_QUERY: &str = r#"{
  customers {
    edges {
      node {
        id
        displayName
        email
        state
        createdAt
        updatedAt
      }
    }
  }
}"#;

const PRODUCT_VARIANT_INVENTORY_QUERY: &str = r#"{
  productVariants {
    edges {
      node {
        id
        sku
        title
        inventoryItem {
          id
          inventoryLevels {
            edges {
              node {
                id
                location { id name }
                quantities(names: ["available", "on_hand"]) { name quantity }
              }
            }
          }
        }
      }
    }
  }
}"#;

/// Maps report types to their definitions.
#[derive(Debug, Clone)]
pub struct ReportRegistry {
    reports: HashMap<ReportType, ReportDefinition>,
}

impl ReportRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            reports: HashMap::new(),
        }
    }

    /// A registry holding the built-in reports.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(ReportType::Products, ReportDefinition::new(PRODUCTS_QUERY));
        registry.register(ReportType::Orders, ReportDefinition::new(ORDERS_QUERY));
        registry.register(ReportType::Customers, ReportDefinition::new(CUSTOMERS_QUERY));
        registry.register(
            ReportType::ProductVariantInventory,
            ReportDefinition::new(PRODUCT_VARIANT_INVENTORY_QUERY),
        );
        registry
    }

    /// Add or replace a report.
    pub fn register(&mut self, report_type: ReportType, definition: ReportDefinition) -> &mut Self {
        self.reports.insert(report_type, definition);
        self
    }

    pub fn get(&self, report_type: &ReportType) -> Result<&ReportDefinition> {
        self.reports
            .get(report_type)
            .ok_or_else(|| Error::new(ErrorKind::UnknownReport(report_type.to_string())))
    }

    /// Registered report types, sorted by name.
    pub fn report_types(&self) -> Vec<&ReportType> {
        let mut types: Vec<&ReportType> = self.reports.keys().collect();
        types.sort_by(|a, b| a.name().cmp(b.name()));
        types
    }
}

impl Default for ReportRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
