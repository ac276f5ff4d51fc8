use std::collections::HashSet;

use async_trait::async_trait;
use dashmap::DashMap;
use ulid::Ulid;

use super::{CustomerDirectory, ServiceCatalog, StoreError};

/// In-process customer name lookup.
#[derive(Default)]
pub struct StaticDirectory {
    names: DashMap<Ulid, String>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, customer_id: Ulid, name: impl Into<String>) {
        self.names.insert(customer_id, name.into());
    }
}

#[async_trait]
impl CustomerDirectory for StaticDirectory {
    async fn display_name(&self, customer_id: Ulid) -> Result<Option<String>, StoreError> {
        Ok(self.names.get(&customer_id).map(|e| e.value().clone()))
    }
}

/// Quote-exempt services: any name carrying the quote tag, plus an explicit list.
/// Matching is case-insensitive.
pub struct QuoteCatalog {
    tag: String,
    services: HashSet<String>,
}

impl QuoteCatalog {
    pub fn new<I, S>(tag: &str, services: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            tag: tag.trim().to_lowercase(),
            services: services
                .into_iter()
                .map(|s| s.as_ref().trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }
}

impl ServiceCatalog for QuoteCatalog {
    fn is_quote_exempt(&self, service_name: &str) -> bool {
        let name = service_name.trim().to_lowercase();
        (!self.tag.is_empty() && name.contains(&self.tag)) || self.services.contains(&name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_and_list_are_case_insensitive() {
        let catalog = QuoteCatalog::new("contact for quote", ["Laser Package"]);
        assert!(catalog.is_quote_exempt("Bridal Makeup (Contact for Quote)"));
        assert!(catalog.is_quote_exempt("  laser package "));
        assert!(!catalog.is_quote_exempt("Consultation"));
    }

    #[test]
    fn empty_tag_matches_nothing_by_itself() {
        let catalog = QuoteCatalog::new("", Vec::<String>::new());
        assert!(!catalog.is_quote_exempt("anything"));
    }

    #[tokio::test]
    async fn directory_lookup() {
        let dir = StaticDirectory::new();
        let id = Ulid::new();
        dir.insert(id, "Ada Lovelace");
        assert_eq!(dir.display_name(id).await.unwrap().as_deref(), Some("Ada Lovelace"));
        assert_eq!(dir.display_name(Ulid::new()).await.unwrap(), None);
    }
}
