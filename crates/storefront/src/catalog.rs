//! Catalog filtering, sorting and pagination state.
//!
//! `Catalog` is plain data: it turns filter and page selections into
//! [`ProductListRequest`]s and applies responses. The store performs the
//! network calls around it.
//!
//! Responses can arrive out of order when a newer query is issued before an
//! older one completes. Each fetch takes a [`FetchTicket`] from a monotonic
//! sequence and only the response for the most recently issued ticket is
//! applied; older ones are dropped.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::{PaginationInfo, Product, ProductListRequest, ProductPage};

/// Default number of products per catalog page.
pub const DEFAULT_PAGE_SIZE: u32 = 12;

/// Default number of featured (best-seller) products on the landing page.
pub const DEFAULT_FEATURED_LIMIT: u32 = 5;

/// Sort key for catalog queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    #[default]
    Date,
    Price,
    Name,
}

/// Sort direction for catalog queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl std::str::FromStr for SortBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "date" => Ok(Self::Date),
            "price" => Ok(Self::Price),
            "name" => Ok(Self::Name),
            _ => Err(format!("invalid sort key: {s}")),
        }
    }
}

impl std::str::FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            _ => Err(format!("invalid sort order: {s}")),
        }
    }
}

/// Active catalog filters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters {
    pub category: BTreeSet<String>,
    pub sub_category: BTreeSet<String>,
    pub search: String,
    pub sort_by: SortBy,
    pub sort_order: SortOrder,
}

/// A partial filter change; `None` fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterUpdate {
    pub category: Option<BTreeSet<String>>,
    pub sub_category: Option<BTreeSet<String>>,
    pub search: Option<String>,
    pub sort_by: Option<SortBy>,
    pub sort_order: Option<SortOrder>,
}

impl FilterUpdate {
    #[must_use]
    pub fn category<I, T>(categories: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            category: Some(categories.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn search(term: impl Into<String>) -> Self {
        Self {
            search: Some(term.into()),
            ..Self::default()
        }
    }
}

impl Filters {
    /// Shallow merge: every field present in `update` replaces the current one.
    pub fn merge(&mut self, update: FilterUpdate) {
        if let Some(category) = update.category {
            self.category = category;
        }
        if let Some(sub_category) = update.sub_category {
            self.sub_category = sub_category;
        }
        if let Some(search) = update.search {
            self.search = search;
        }
        if let Some(sort_by) = update.sort_by {
            self.sort_by = sort_by;
        }
        if let Some(sort_order) = update.sort_order {
            self.sort_order = sort_order;
        }
    }

    /// Toggle one category in or out of the filter set.
    pub fn toggle_category(&mut self, category: &str) {
        if !self.category.remove(category) {
            self.category.insert(category.to_owned());
        }
    }

    /// Toggle one sub-category in or out of the filter set.
    pub fn toggle_sub_category(&mut self, sub_category: &str) {
        if !self.sub_category.remove(sub_category) {
            self.sub_category.insert(sub_category.to_owned());
        }
    }
}

/// Pagination metadata of the last applied page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub total: u64,
    pub pages: u32,
    /// Always >= 1.
    pub current_page: u32,
    pub limit: u32,
}

impl Pagination {
    #[must_use]
    pub const fn new(limit: u32) -> Self {
        Self {
            total: 0,
            pages: 1,
            current_page: 1,
            limit,
        }
    }

    /// Whether `page` is a selectable page number.
    #[must_use]
    pub fn contains(&self, page: u32) -> bool {
        page >= 1 && page <= self.pages.max(1)
    }
}

impl From<PaginationInfo> for Pagination {
    fn from(info: PaginationInfo) -> Self {
        Self {
            total: info.total,
            pages: info.pages,
            current_page: info.current_page.max(1),
            limit: info.limit,
        }
    }
}

/// Identifies one issued catalog fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FetchTicket(u64);

/// Catalog state: current page of products, filters and pagination.
#[derive(Debug, Clone)]
pub struct Catalog {
    products: Vec<Product>,
    featured: Vec<Product>,
    filters: Filters,
    pagination: Pagination,
    last_issued: u64,
    show_search: bool,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl Catalog {
    #[must_use]
    pub fn new(page_size: u32) -> Self {
        Self {
            products: Vec::new(),
            featured: Vec::new(),
            filters: Filters::default(),
            pagination: Pagination::new(page_size.max(1)),
            last_issued: 0,
            show_search: false,
        }
    }

    #[must_use]
    pub fn products(&self) -> &[Product] {
        &self.products
    }

    #[must_use]
    pub fn featured(&self) -> &[Product] {
        &self.featured
    }

    #[must_use]
    pub const fn filters(&self) -> &Filters {
        &self.filters
    }

    #[must_use]
    pub const fn pagination(&self) -> Pagination {
        self.pagination
    }

    #[must_use]
    pub const fn show_search(&self) -> bool {
        self.show_search
    }

    pub const fn set_show_search(&mut self, show: bool) {
        self.show_search = show;
    }

    /// Request for `page` under the current filters.
    #[must_use]
    pub fn request_for(&self, page: u32) -> ProductListRequest {
        ProductListRequest {
            page,
            limit: self.pagination.limit,
            category: self.filters.category.iter().cloned().collect(),
            sub_category: self.filters.sub_category.iter().cloned().collect(),
            search: self.filters.search.clone(),
            sort_by: self.filters.sort_by,
            sort_order: self.filters.sort_order,
            bestseller: None,
        }
    }

    /// Merge a filter change and reset to the first page.
    ///
    /// Returns the request for page 1 built from the merged filters, so the
    /// caller can fetch immediately without re-reading state.
    pub fn update_filters(&mut self, update: FilterUpdate) -> ProductListRequest {
        self.filters.merge(update);
        self.pagination.current_page = 1;
        self.request_for(1)
    }

    /// Request for `page`, or `None` when the page is outside `1..=pages`.
    #[must_use]
    pub fn page_request(&self, page: u32) -> Option<ProductListRequest> {
        if self.pagination.contains(page) {
            Some(self.request_for(page))
        } else {
            debug!(page, pages = self.pagination.pages, "Ignoring out-of-range page");
            None
        }
    }

    /// Issue a ticket for a new fetch. Any earlier outstanding ticket becomes
    /// stale.
    pub const fn begin_fetch(&mut self) -> FetchTicket {
        self.last_issued += 1;
        FetchTicket(self.last_issued)
    }

    /// Whether `ticket` is the most recently issued one.
    #[must_use]
    pub const fn is_current(&self, ticket: FetchTicket) -> bool {
        ticket.0 == self.last_issued
    }

    /// Apply a fetched page. Returns `false` (and changes nothing) when the
    /// ticket has been superseded.
    pub fn complete_fetch(&mut self, ticket: FetchTicket, page: ProductPage) -> bool {
        if !self.is_current(ticket) {
            debug!(ticket = ticket.0, latest = self.last_issued, "Discarding stale catalog response");
            return false;
        }
        self.products = page.products;
        if let Some(info) = page.pagination {
            self.pagination = info.into();
        }
        true
    }

    /// Replace the featured strip.
    pub fn set_featured(&mut self, products: Vec<Product>) {
        self.featured = products;
    }

    /// Up to `limit` products sharing `product`'s category and sub-category,
    /// drawn from the current page and the featured strip.
    #[must_use]
    pub fn related_products(&self, product: &Product, limit: usize) -> Vec<Product> {
        let mut seen = BTreeSet::new();
        self.products
            .iter()
            .chain(self.featured.iter())
            .filter(|p| {
                p.id != product.id
                    && p.category == product.category
                    && p.sub_category == product.sub_category
            })
            .filter(|p| seen.insert(p.id.clone()))
            .take(limit)
            .cloned()
            .collect()
    }
}

/// Request for the landing page's best-seller strip: newest first.
#[must_use]
pub fn featured_request(limit: u32) -> ProductListRequest {
    ProductListRequest {
        page: 1,
        limit,
        category: Vec::new(),
        sub_category: Vec::new(),
        search: String::new(),
        sort_by: SortBy::Date,
        sort_order: SortOrder::Desc,
        bestseller: Some(true),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn product(id: &str, category: &str, sub_category: &str) -> Product {
        serde_json::from_value(json!({
            "_id": id,
            "name": id,
            "price": 10,
            "category": category,
            "subCategory": sub_category
        }))
        .unwrap()
    }

    fn page(ids: &[&str], pages: u32, current_page: u32) -> ProductPage {
        ProductPage {
            products: ids.iter().map(|id| product(id, "OTC", "Pain")).collect(),
            pagination: Some(PaginationInfo {
                total: u64::from(pages) * 2,
                pages,
                current_page,
                limit: 2,
            }),
        }
    }

    #[test]
    fn test_update_filters_merges_and_resets_page() {
        let mut catalog = Catalog::new(2);
        let ticket = catalog.begin_fetch();
        catalog.complete_fetch(ticket, page(&["a", "b"], 3, 2));
        assert_eq!(catalog.pagination().current_page, 2);

        catalog.update_filters(FilterUpdate::search("para"));
        let request = catalog.update_filters(FilterUpdate::category(["OTC"]));

        assert_eq!(catalog.pagination().current_page, 1);
        assert_eq!(request.page, 1);
        assert_eq!(request.category, vec!["OTC".to_string()]);
        // Earlier search survives the shallow merge.
        assert_eq!(request.search, "para");
    }

    #[test]
    fn test_page_request_rejects_out_of_range() {
        let mut catalog = Catalog::new(2);
        let ticket = catalog.begin_fetch();
        catalog.complete_fetch(ticket, page(&["a", "b"], 3, 1));

        assert!(catalog.page_request(0).is_none());
        assert!(catalog.page_request(4).is_none());
        assert_eq!(catalog.page_request(3).unwrap().page, 3);
    }

    #[test]
    fn test_stale_response_is_discarded() {
        let mut catalog = Catalog::new(2);
        let older = catalog.begin_fetch();
        let newer = catalog.begin_fetch();

        assert!(catalog.complete_fetch(newer, page(&["new"], 1, 1)));
        assert!(!catalog.complete_fetch(older, page(&["old"], 5, 1)));

        assert_eq!(catalog.products()[0].id.as_str(), "new");
        assert_eq!(catalog.pagination().pages, 1);
    }

    #[test]
    fn test_response_without_pagination_keeps_metadata() {
        let mut catalog = Catalog::new(2);
        let ticket = catalog.begin_fetch();
        catalog.complete_fetch(ticket, page(&["a"], 4, 1));

        let ticket = catalog.begin_fetch();
        catalog.complete_fetch(
            ticket,
            ProductPage {
                products: vec![],
                pagination: None,
            },
        );
        assert_eq!(catalog.pagination().pages, 4);
        assert!(catalog.products().is_empty());
    }

    #[test]
    fn test_toggle_category() {
        let mut filters = Filters::default();
        filters.toggle_category("OTC");
        assert!(filters.category.contains("OTC"));
        filters.toggle_category("OTC");
        assert!(filters.category.is_empty());
    }

    #[test]
    fn test_related_products_excludes_self_and_other_categories() {
        let mut catalog = Catalog::new(10);
        let ticket = catalog.begin_fetch();
        catalog.complete_fetch(
            ticket,
            ProductPage {
                products: vec![
                    product("a", "OTC", "Pain"),
                    product("b", "OTC", "Pain"),
                    product("c", "OTC", "Cold"),
                    product("d", "Rx", "Pain"),
                ],
                pagination: None,
            },
        );
        catalog.set_featured(vec![product("b", "OTC", "Pain"), product("e", "OTC", "Pain")]);

        let related = catalog.related_products(&product("a", "OTC", "Pain"), 5);
        let ids: Vec<&str> = related.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "e"]);
    }

    #[test]
    fn test_featured_request_shape() {
        let request = featured_request(5);
        assert_eq!(request.bestseller, Some(true));
        assert_eq!(request.sort_by, SortBy::Date);
        assert_eq!(request.sort_order, SortOrder::Desc);
        assert_eq!(request.limit, 5);
    }
}
