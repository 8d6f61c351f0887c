//! Shop state core.
//!
//! [`ShopState`] owns the cart, the auth token, the catalog page, filters,
//! pagination and an index of the products currently in view. It is created
//! once at start-up and shared by cloning the handle.
//!
//! Mutations are local-first: the cart is updated synchronously and only then
//! mirrored to the backend when a token is present. A failed sync produces a
//! notice but never rolls the local change back. Locks are only held inside
//! synchronous sections, so readers always see the latest local write even
//! while a sync call is in flight.
//!
//! Lock order, when more than one is taken: token, cart, catalog, products.

use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use rust_decimal::Decimal;
use tracing::{debug, info, instrument, warn};
use ymgs_core::{CurrencyCode, ProductId, round_money};

use crate::api::{Product, ProductListRequest, ShopApi};
use crate::cart::{
    Cart, CartEntryInput, CartItem, CartRow, ProductIndex, cart_total, clamp_to_minimum,
};
use crate::catalog::{
    Catalog, DEFAULT_FEATURED_LIMIT, DEFAULT_PAGE_SIZE, FetchTicket, FilterUpdate, Filters,
    Pagination, featured_request,
};
use crate::config::StorefrontConfig;
use crate::error::{Notice, ShopError, add_breadcrumb};
use crate::session::{AuthToken, TokenStore};

/// Store-wide settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShopSettings {
    pub delivery_fee: Decimal,
    pub currency: CurrencyCode,
    pub page_size: u32,
    pub featured_limit: u32,
}

impl Default for ShopSettings {
    fn default() -> Self {
        Self {
            delivery_fee: Decimal::TEN,
            currency: CurrencyCode::default(),
            page_size: DEFAULT_PAGE_SIZE,
            featured_limit: DEFAULT_FEATURED_LIMIT,
        }
    }
}

impl From<&StorefrontConfig> for ShopSettings {
    fn from(config: &StorefrontConfig) -> Self {
        Self {
            delivery_fee: config.delivery_fee,
            currency: config.currency,
            page_size: config.page_size,
            featured_limit: config.featured_limit,
        }
    }
}

/// Shared shop state. Cheap to clone.
pub struct ShopState<A, S> {
    inner: Arc<ShopStateInner<A, S>>,
}

impl<A, S> Clone for ShopState<A, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct ShopStateInner<A, S> {
    api: A,
    tokens: S,
    settings: ShopSettings,
    token: RwLock<Option<AuthToken>>,
    cart: RwLock<Cart>,
    catalog: RwLock<Catalog>,
    products: RwLock<ProductIndex>,
    notices: Mutex<Vec<Notice>>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Rebuild the product index after a catalog change: listed and featured
/// products are refreshed, and anything no longer listed, featured or in the
/// cart is dropped.
fn reindex(index: &mut ProductIndex, catalog: &Catalog, cart: &Cart) {
    let shown = || catalog.products().iter().chain(catalog.featured());
    for product in shown() {
        index.insert(product.id.clone(), product.clone());
    }
    index.retain(|id, _| cart.get(id).is_some() || shown().any(|p| &p.id == id));
}

impl<A: ShopApi, S: TokenStore> ShopState<A, S> {
    /// Create an empty store: guest mode, empty cart, nothing fetched yet.
    pub fn new(api: A, tokens: S, settings: ShopSettings) -> Self {
        Self {
            inner: Arc::new(ShopStateInner {
                api,
                tokens,
                settings,
                token: RwLock::new(None),
                cart: RwLock::new(Cart::new()),
                catalog: RwLock::new(Catalog::new(settings.page_size)),
                products: RwLock::new(ProductIndex::new()),
                notices: Mutex::new(Vec::new()),
            }),
        }
    }

    pub(crate) fn api(&self) -> &A {
        &self.inner.api
    }

    #[must_use]
    pub fn settings(&self) -> ShopSettings {
        self.inner.settings
    }

    #[must_use]
    pub fn delivery_fee(&self) -> Decimal {
        self.inner.settings.delivery_fee
    }

    #[must_use]
    pub fn currency(&self) -> CurrencyCode {
        self.inner.settings.currency
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Initial load: featured strip and first catalog page, then session
    /// restore from durable storage.
    #[instrument(skip(self))]
    pub async fn init(&self) {
        tokio::join!(self.load_featured(), self.refresh_catalog());
        self.restore_session().await;
    }

    /// Adopt a durably stored token if none is held in memory, then hydrate
    /// the cart. Returns whether a session is active afterwards.
    pub async fn restore_session(&self) -> bool {
        if self.is_logged_in() {
            return true;
        }
        let stored = match self.inner.tokens.load() {
            Ok(stored) => stored,
            Err(e) => {
                self.report(e.into());
                return false;
            }
        };
        let Some(token) = stored else {
            debug!("No stored token, browsing as guest");
            return false;
        };
        *write(&self.inner.token) = Some(token.clone());
        info!("Restored saved session");
        self.get_user_cart(&token).await;
        true
    }

    /// Start a session: persist the token and replace the local cart with the
    /// server cart.
    #[instrument(skip_all)]
    pub async fn login(&self, token: AuthToken) {
        if let Err(e) = self.inner.tokens.save(&token) {
            self.report(e.into());
        }
        *write(&self.inner.token) = Some(token.clone());
        add_breadcrumb("auth", "Logged in", None);
        info!("Logged in");
        self.get_user_cart(&token).await;
    }

    /// End the session. Durable storage is cleared first, then the token and
    /// cart together, so no reader sees a token without its cart or the
    /// reverse.
    pub fn logout(&self) {
        if let Err(e) = self.inner.tokens.clear() {
            self.report(e.into());
        }
        {
            let mut token = write(&self.inner.token);
            let mut cart = write(&self.inner.cart);
            *token = None;
            cart.clear();
        }
        add_breadcrumb("auth", "Logged out", None);
        info!("Logged out");
    }

    /// The current token, if logged in.
    #[must_use]
    pub fn token(&self) -> Option<AuthToken> {
        read(&self.inner.token).clone()
    }

    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        read(&self.inner.token).is_some()
    }

    /// Replace the local cart with the server cart for `token`.
    ///
    /// Every entry is normalized on the way in. The response is discarded if
    /// the session changed while the request was in flight. Products the
    /// cart references but the store has not seen yet are fetched afterwards.
    #[instrument(skip_all)]
    pub async fn get_user_cart(&self, token: &AuthToken) {
        let response = match self.inner.api.get_cart(token).await {
            Ok(response) => response,
            Err(e) => {
                self.report(e.into());
                return;
            }
        };
        let hydrated = Cart::from_raw(response.cart_data);
        let items = hydrated.len();
        {
            let current = read(&self.inner.token);
            if current.as_ref() != Some(token) {
                debug!("Session changed during cart hydration, discarding server cart");
                return;
            }
            *write(&self.inner.cart) = hydrated;
        }
        info!(items, "Hydrated cart from server");
        self.backfill_products().await;
    }

    async fn backfill_products(&self) {
        let missing: Vec<ProductId> = {
            let cart = read(&self.inner.cart);
            let products = read(&self.inner.products);
            cart.ids()
                .filter(|id| !products.contains_key(*id))
                .cloned()
                .collect()
        };
        for id in missing {
            match self.inner.api.get_product(&id).await {
                Ok(product) => self.remember(product),
                Err(e) => warn!(product_id = %id, error = %e, "Could not load product for cart entry"),
            }
        }
    }

    // =========================================================================
    // Cart
    // =========================================================================

    /// Add a product to the cart.
    ///
    /// A structured entry overwrites any existing entry for the product; a
    /// bare quantity is added on top of an existing unit line. Unit lines
    /// below the product minimum are raised to it with a notice. Unknown
    /// products are ignored. Returns the stored entry.
    #[instrument(skip(self, input), fields(product_id = %id))]
    pub async fn add_to_cart(
        &self,
        id: &ProductId,
        input: impl Into<CartEntryInput>,
    ) -> Option<CartItem> {
        let input = input.into();
        let Some(item) = input.normalize() else {
            debug!("Ignoring add with non-positive quantity");
            return None;
        };
        let Some(product) = self.product(id) else {
            warn!("Add to cart for unknown product ignored");
            return None;
        };

        // Clamp the merged line, not the increment.
        let (stored, clamped) = {
            let mut cart = write(&self.inner.cart);
            let merged = if input.is_legacy() {
                cart.merge_legacy(id, item)
            } else {
                item
            };
            let (item, clamped) = clamp_to_minimum(merged, &product);
            cart.set(id.clone(), item);
            (item, clamped)
        };
        if clamped {
            self.minimum_notice(&product);
        }
        debug!(
            quantity = stored.quantity(),
            package = stored.is_package(),
            "Cart entry stored"
        );
        add_breadcrumb("cart", "Added to cart", Some(&[("product_id", id.as_str())]));
        self.push_notice(Notice::success("Item Added to Cart"));

        if let Some(token) = self.token()
            && let Err(e) = self.inner.api.sync_cart_add(&token, id, &stored).await
        {
            self.report(e.into());
        }
        Some(stored)
    }

    /// Set a cart entry. A zero or negative quantity removes it; any other
    /// update for a product the store has not seen is ignored.
    ///
    /// Returns the stored entry, or `None` when the entry was removed.
    #[instrument(skip(self, input), fields(product_id = %id))]
    pub async fn update_quantity(
        &self,
        id: &ProductId,
        input: impl Into<CartEntryInput>,
    ) -> Option<CartItem> {
        let Some(item) = input.into().normalize() else {
            write(&self.inner.cart).remove(id);
            add_breadcrumb("cart", "Removed from cart", Some(&[("product_id", id.as_str())]));
            if let Some(token) = self.token()
                && let Err(e) = self.inner.api.sync_cart_update(&token, id, None).await
            {
                self.report(e.into());
            }
            return None;
        };
        let Some(product) = self.product(id) else {
            warn!("Quantity update for unknown product ignored");
            return None;
        };
        let item = self.enforce_minimum(item, &product);
        write(&self.inner.cart).set(id.clone(), item);
        add_breadcrumb("cart", "Updated quantity", Some(&[("product_id", id.as_str())]));

        if let Some(token) = self.token()
            && let Err(e) = self.inner.api.sync_cart_update(&token, id, Some(&item)).await
        {
            self.report(e.into());
        }
        Some(item)
    }

    /// Remove a product from the cart.
    pub async fn remove_from_cart(&self, id: &ProductId) {
        self.update_quantity(id, CartEntryInput::Quantity(0)).await;
    }

    /// Drop every entry locally. Used after a successful order.
    pub fn clear_cart(&self) {
        write(&self.inner.cart).clear();
    }

    fn enforce_minimum(&self, item: CartItem, product: &Product) -> CartItem {
        let (item, clamped) = clamp_to_minimum(item, product);
        if clamped {
            self.minimum_notice(product);
        }
        item
    }

    fn minimum_notice(&self, product: &Product) {
        debug!(minimum = product.min_order_quantity, "Raised quantity to minimum");
        self.push_notice(Notice::info(format!(
            "Minimum order quantity for {} is {}",
            product.name, product.min_order_quantity
        )));
    }

    /// Snapshot of the cart.
    #[must_use]
    pub fn cart(&self) -> Cart {
        read(&self.inner.cart).clone()
    }

    /// Total number of units in the cart.
    #[must_use]
    pub fn cart_count(&self) -> u64 {
        read(&self.inner.cart).count()
    }

    /// Subtotal of every line, rounded to two decimal places.
    #[must_use]
    pub fn cart_amount(&self) -> Decimal {
        let cart = read(&self.inner.cart);
        let products = read(&self.inner.products);
        cart.amount(&products)
    }

    /// Total of one line.
    #[must_use]
    pub fn item_total(&self, id: &ProductId) -> Decimal {
        let cart = read(&self.inner.cart);
        let products = read(&self.inner.products);
        cart.item_total(id, &products)
    }

    /// Denormalized cart rows priced from the current product data.
    #[must_use]
    pub fn cart_items(&self) -> Vec<CartRow> {
        let cart = read(&self.inner.cart);
        let products = read(&self.inner.products);
        cart.rows(&products).collect()
    }

    /// Cart total shown to the customer: nothing for an empty cart,
    /// otherwise subtotal plus delivery fee.
    #[must_use]
    pub fn cart_total(&self) -> Decimal {
        cart_total(self.cart_amount(), self.delivery_fee())
    }

    /// Amount submitted with an order: subtotal plus delivery fee.
    #[must_use]
    pub fn order_amount(&self) -> Decimal {
        round_money(self.cart_amount() + self.delivery_fee())
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    /// Merge a filter change, reset to page 1 and fetch immediately with the
    /// merged filters. Returns whether the fetched page was applied.
    #[instrument(skip(self))]
    pub async fn update_filters(&self, update: FilterUpdate) -> bool {
        let (request, ticket) = {
            let mut catalog = write(&self.inner.catalog);
            let request = catalog.update_filters(update);
            (request, catalog.begin_fetch())
        };
        add_breadcrumb("catalog", "Changed filters", None);
        self.fetch_page(request, ticket).await
    }

    /// Fetch `page` with the current filters. Pages outside `1..=pages` are
    /// ignored and leave all state unchanged.
    #[instrument(skip(self))]
    pub async fn set_page(&self, page: u32) -> bool {
        let (request, ticket) = {
            let mut catalog = write(&self.inner.catalog);
            let Some(request) = catalog.page_request(page) else {
                return false;
            };
            (request, catalog.begin_fetch())
        };
        self.fetch_page(request, ticket).await
    }

    /// Re-fetch the current page.
    #[instrument(skip(self))]
    pub async fn refresh_catalog(&self) -> bool {
        let (request, ticket) = {
            let mut catalog = write(&self.inner.catalog);
            let request = catalog.request_for(catalog.pagination().current_page);
            (request, catalog.begin_fetch())
        };
        self.fetch_page(request, ticket).await
    }

    /// Set the search term, resetting to page 1.
    pub async fn search(&self, term: impl Into<String>) -> bool {
        self.update_filters(FilterUpdate::search(term)).await
    }

    async fn fetch_page(&self, request: ProductListRequest, ticket: FetchTicket) -> bool {
        match self.inner.api.list_products(&request).await {
            Ok(page) => {
                let cart = read(&self.inner.cart);
                let mut catalog = write(&self.inner.catalog);
                if !catalog.complete_fetch(ticket, page) {
                    return false;
                }
                reindex(&mut write(&self.inner.products), &catalog, &cart);
                debug!(page = request.page, "Applied catalog page");
                true
            }
            Err(e) => {
                if !read(&self.inner.catalog).is_current(ticket) {
                    debug!(error = %e, "Dropping failure of superseded catalog fetch");
                    return false;
                }
                self.report(e.into());
                false
            }
        }
    }

    /// Fetch the best-seller strip. Filters and pagination are untouched.
    #[instrument(skip(self))]
    pub async fn load_featured(&self) {
        let request = featured_request(self.inner.settings.featured_limit);
        match self.inner.api.list_products(&request).await {
            Ok(page) => {
                let cart = read(&self.inner.cart);
                let mut catalog = write(&self.inner.catalog);
                catalog.set_featured(page.products);
                reindex(&mut write(&self.inner.products), &catalog, &cart);
            }
            Err(e) => self.report(e.into()),
        }
    }

    /// Products on the current catalog page.
    #[must_use]
    pub fn products(&self) -> Vec<Product> {
        read(&self.inner.catalog).products().to_vec()
    }

    /// The best-seller strip.
    #[must_use]
    pub fn featured(&self) -> Vec<Product> {
        read(&self.inner.catalog).featured().to_vec()
    }

    #[must_use]
    pub fn filters(&self) -> Filters {
        read(&self.inner.catalog).filters().clone()
    }

    #[must_use]
    pub fn pagination(&self) -> Pagination {
        read(&self.inner.catalog).pagination()
    }

    /// A product on the current page, in the featured strip, in the cart, or
    /// fetched by id since the last catalog change.
    #[must_use]
    pub fn product(&self, id: &ProductId) -> Option<Product> {
        read(&self.inner.products).get(id).cloned()
    }

    /// A known product, or fetch it from the backend.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn fetch_product(&self, id: &ProductId) -> Option<Product> {
        if let Some(product) = self.product(id) {
            return Some(product);
        }
        match self.inner.api.get_product(id).await {
            Ok(product) => {
                self.remember(product.clone());
                Some(product)
            }
            Err(e) => {
                self.report(e.into());
                None
            }
        }
    }

    /// Products in the same category and sub-category as `id`.
    #[must_use]
    pub fn related_products(&self, id: &ProductId, limit: usize) -> Vec<Product> {
        let Some(product) = self.product(id) else {
            return Vec::new();
        };
        read(&self.inner.catalog).related_products(&product, limit)
    }

    fn remember(&self, product: Product) {
        write(&self.inner.products).insert(product.id.clone(), product);
    }


    // =========================================================================
    // Search bar
    // =========================================================================

    #[must_use]
    pub fn show_search(&self) -> bool {
        read(&self.inner.catalog).show_search()
    }

    pub fn set_search(&self, show: bool) {
        write(&self.inner.catalog).set_show_search(show);
    }

    /// Flip search bar visibility, returning the new state.
    pub fn toggle_search(&self) -> bool {
        let mut catalog = write(&self.inner.catalog);
        let show = !catalog.show_search();
        catalog.set_show_search(show);
        show
    }

    // =========================================================================
    // Notices
    // =========================================================================

    /// Drain pending notices, oldest first.
    pub fn take_notices(&self) -> Vec<Notice> {
        std::mem::take(&mut *self.inner.notices.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub(crate) fn push_notice(&self, notice: Notice) {
        self.inner
            .notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notice);
    }

    /// Log an error and queue its notice.
    pub(crate) fn report(&self, err: ShopError) {
        let notice = err.report();
        self.push_notice(notice);
    }
}
