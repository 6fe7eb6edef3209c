//! Paginated aggregation over the registry's listing endpoint.
//!
//! [`collect_pages`] keeps requesting pages until the registry reports the
//! last one, unioning the extracted keys into a set. Advancement depends only
//! on the page-number / pages-available contract: an empty intermediate page
//! is neither an error nor the end of the listing.

use std::collections::BTreeSet;

use confwatch_core::{
    ConfigItem, GatewayError, Group, NamespaceId, PageQuery, PageResult, RegistryGateway,
    SearchMode,
};

use crate::error::AggregateError;

/// Run `first` and every following page, collecting `extract(item)` for each item.
///
/// Any failing page aborts the whole aggregation.
pub fn collect_pages<F>(
    gateway: &dyn RegistryGateway,
    first: PageQuery,
    mut extract: F,
) -> Result<BTreeSet<String>, AggregateError>
where
    F: FnMut(&ConfigItem) -> String,
{
    if first.page_size == 0 {
        return Err(AggregateError::InvalidPageSize);
    }

    let mut query = first;
    let mut collected = BTreeSet::new();
    loop {
        let page = gateway
            .list_page(&query)
            .map_err(|source| AggregateError::page(&query, source))?;
        if page.pages_available == 0 {
            break;
        }
        collected.extend(page.page_items.iter().map(&mut extract));
        tracing::debug!(
            page = query.page_no,
            pages_available = page.pages_available,
            items = page.page_items.len(),
            collected = collected.len(),
            "aggregated listing page",
        );

        // A registry that echoes a stale page number must not stall the loop.
        let current = page.page_number.max(query.page_no);
        if current >= page.pages_available {
            break;
        }
        query = query.next_page();
    }
    Ok(collected)
}

/// Every distinct group in `namespace` whose entries match the two patterns
/// (exact match; empty pattern matches all).
pub fn list_all_groups(
    gateway: &dyn RegistryGateway,
    namespace: &NamespaceId,
    data_id_pattern: &str,
    group_pattern: &str,
    page_size: u32,
) -> Result<BTreeSet<String>, AggregateError> {
    let first = PageQuery {
        namespace: namespace.clone(),
        group: group_pattern.to_string(),
        data_id: data_id_pattern.to_string(),
        search: SearchMode::Accurate,
        page_no: 1,
        page_size,
    };
    collect_pages(gateway, first, |item| item.group.clone())
}

/// Every distinct data id in one group of `namespace`.
pub fn list_all_data_ids(
    gateway: &dyn RegistryGateway,
    namespace: &NamespaceId,
    group: &Group,
    page_size: u32,
) -> Result<BTreeSet<String>, AggregateError> {
    let first = PageQuery {
        namespace: namespace.clone(),
        group: group.0.clone(),
        data_id: String::new(),
        search: SearchMode::Accurate,
        page_no: 1,
        page_size,
    };
    collect_pages(gateway, first, |item| item.data_id.clone())
}

/// One page of data ids in a group, passed through without aggregation.
///
/// With `fuzzy`, `search_text` is matched as a substring (`*text*`).
pub fn list_data_ids(
    gateway: &dyn RegistryGateway,
    namespace: &NamespaceId,
    group: &Group,
    search_text: &str,
    fuzzy: bool,
    page_no: u32,
    page_size: u32,
) -> Result<PageResult, GatewayError> {
    gateway.list_page(&data_id_query(
        namespace,
        group,
        search_text,
        fuzzy,
        page_no,
        page_size,
    ))
}

fn data_id_query(
    namespace: &NamespaceId,
    group: &Group,
    search_text: &str,
    fuzzy: bool,
    page_no: u32,
    page_size: u32,
) -> PageQuery {
    let (search, data_id) = if fuzzy {
        let text = search_text.trim_matches('*');
        let pattern = if text.is_empty() {
            "*".to_string()
        } else {
            format!("*{text}*")
        };
        (SearchMode::Blur, pattern)
    } else {
        (SearchMode::Accurate, search_text.to_string())
    };
    PageQuery {
        namespace: namespace.clone(),
        group: group.0.clone(),
        data_id,
        search,
        page_no: page_no.max(1),
        page_size,
    }
}
