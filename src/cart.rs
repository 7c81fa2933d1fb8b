//! The server-side cart and the store caching it.

use crate::{
    client::ApiClient,
    error::ApiError,
    util::callback::{Listeners, OnChange},
};
use parking_lot::Mutex;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::{fmt, future::Future, sync::Arc};

/// Price components of one cart item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PriceBreakdown {
    pub base_price: f64,
    pub fees: f64,
    pub taxes: f64,
    pub discounts: f64,
    pub total_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    #[serde(alias = "_id")]
    pub id: String,
    pub service_id: String,
    #[serde(default)]
    pub service_type: String,
    #[serde(default)]
    pub service_name: String,
    #[serde(default)]
    pub selected_date: Option<String>,
    #[serde(default)]
    pub selected_time: Option<String>,
    #[serde(default = "one")]
    pub quantity: u32,
    #[serde(default)]
    pub price_breakdown: PriceBreakdown,
}

fn one() -> u32 {
    1
}

/// The cart as returned by the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    #[serde(default)]
    pub items: Vec<CartItem>,
    /// Server-computed total. Only used to detect drift from [`CartTotals`].
    #[serde(default)]
    pub total_cart_price: Option<f64>,
}

impl Cart {
    pub fn totals(&self) -> CartTotals {
        CartTotals::from_items(&self.items)
    }
}

/// Order summary shown on the cart and checkout pages.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CartTotals {
    pub subtotal: f64,
    pub fees: f64,
    pub taxes: f64,
    pub discounts: f64,
    pub total: f64,
}

impl CartTotals {
    /// Sums each breakdown field across the items.
    pub fn from_items<'a>(items: impl IntoIterator<Item = &'a CartItem>) -> Self {
        items
            .into_iter()
            .map(|item| &item.price_breakdown)
            .fold(CartTotals::default(), |acc, price| CartTotals {
                subtotal: acc.subtotal + price.base_price,
                fees: acc.fees + price.fees,
                taxes: acc.taxes + price.taxes,
                discounts: acc.discounts + price.discounts,
                total: acc.total + price.total_price,
            })
    }
}

/// Body of `POST /api/cart`.
#[derive(Debug, Clone, PartialEq, Serialize, bon::Builder)]
#[serde(rename_all = "camelCase")]
pub struct NewCartItem {
    #[builder(into)]
    pub service_id: String,
    #[builder(into)]
    pub service_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(into)]
    pub selected_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(into)]
    pub selected_time: Option<String>,
    #[builder(default = 1)]
    pub quantity: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_breakdown: Option<PriceBreakdown>,
}

/// Body of `PUT /api/cart/:id`. Unset fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_time: Option<String>,
}

/// Cart endpoints.
pub trait CartApi {
    fn fetch_cart(&self) -> impl Future<Output = Result<Cart, ApiError>>;
    fn add_to_cart(&self, item: &NewCartItem) -> impl Future<Output = Result<(), ApiError>>;
    fn update_cart_item(
        &self,
        id: &str,
        update: &CartItemUpdate,
    ) -> impl Future<Output = Result<(), ApiError>>;
    fn remove_cart_item(&self, id: &str) -> impl Future<Output = Result<(), ApiError>>;
    fn clear_cart(&self) -> impl Future<Output = Result<(), ApiError>>;
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CartResponse {
    Wrapped { cart: Cart },
    Bare(Cart),
}

impl CartApi for ApiClient {
    async fn fetch_cart(&self) -> Result<Cart, ApiError> {
        let response: CartResponse = self.get("/api/cart").await?;
        Ok(match response {
            CartResponse::Wrapped { cart } => cart,
            CartResponse::Bare(cart) => cart,
        })
    }

    async fn add_to_cart(&self, item: &NewCartItem) -> Result<(), ApiError> {
        self.send_empty(Method::POST, "/api/cart", Some(item)).await
    }

    async fn update_cart_item(&self, id: &str, update: &CartItemUpdate) -> Result<(), ApiError> {
        self.send_empty(Method::PUT, &format!("/api/cart/{id}"), Some(update))
            .await
    }

    async fn remove_cart_item(&self, id: &str) -> Result<(), ApiError> {
        self.send_empty::<()>(Method::DELETE, &format!("/api/cart/{id}"), None)
            .await
    }

    async fn clear_cart(&self) -> Result<(), ApiError> {
        self.send_empty::<()>(Method::DELETE, "/api/cart", None).await
    }
}

/// Snapshot of the cart store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CartState {
    pub cart: Cart,
    pub loading: bool,
    /// Last failure, as shown to the user.
    pub error: Option<String>,
}

impl CartState {
    pub fn item_count(&self) -> usize {
        self.cart.items.len()
    }
}

struct CartInner<A> {
    api: A,
    state: Mutex<CartState>,
    listeners: Listeners<CartState>,
}

/// Client-side copy of the cart, refreshed after every mutation. Clones share state.
pub struct CartStore<A>(Arc<CartInner<A>>);

impl<A> Clone for CartStore<A> {
    fn clone(&self) -> Self {
        CartStore(self.0.clone())
    }
}

impl<A> fmt::Debug for CartStore<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CartStore")
            .field("state", &*self.0.state.lock())
            .finish()
    }
}

impl<A: CartApi> CartStore<A> {
    pub fn new(api: A) -> Self {
        Self(Arc::new(CartInner {
            api,
            state: Mutex::new(CartState::default()),
            listeners: Listeners::default(),
        }))
    }

    pub fn state(&self) -> CartState {
        self.0.state.lock().clone()
    }

    pub fn cart(&self) -> Cart {
        self.0.state.lock().cart.clone()
    }

    pub fn item_count(&self) -> usize {
        self.0.state.lock().item_count()
    }

    pub fn totals(&self) -> CartTotals {
        self.0.state.lock().cart.totals()
    }

    pub fn error(&self) -> Option<String> {
        self.0.state.lock().error.clone()
    }

    pub fn subscribe(&self, listener: impl Into<OnChange<CartState>>) {
        self.0.listeners.push(listener.into());
    }

    fn update(&self, f: impl FnOnce(&mut CartState)) {
        let next = {
            let mut state = self.0.state.lock();
            f(&mut state);
            state.clone()
        };
        self.0.listeners.notify(&next);
    }

    /// Re-fetches the cart from the server.
    pub async fn refresh(&self) -> Result<(), ApiError> {
        self.update(|state| state.loading = true);
        let result = self.0.api.fetch_cart().await;
        match result {
            Ok(cart) => {
                #[cfg(feature = "tracing")]
                warn_on_total_drift(&cart);
                self.update(|state| {
                    state.cart = cart;
                    state.loading = false;
                    state.error = None;
                });
                Ok(())
            }
            Err(e) => {
                self.fail(&e);
                Err(e)
            }
        }
    }

    pub async fn add_item(&self, item: &NewCartItem) -> Result<(), ApiError> {
        self.mutate(self.0.api.add_to_cart(item)).await
    }

    pub async fn update_item(&self, id: &str, update: &CartItemUpdate) -> Result<(), ApiError> {
        self.mutate(self.0.api.update_cart_item(id, update)).await
    }

    pub async fn remove_item(&self, id: &str) -> Result<(), ApiError> {
        self.mutate(self.0.api.remove_cart_item(id)).await
    }

    pub async fn clear(&self) -> Result<(), ApiError> {
        self.mutate(self.0.api.clear_cart()).await
    }

    async fn mutate(
        &self,
        request: impl Future<Output = Result<(), ApiError>>,
    ) -> Result<(), ApiError> {
        if let Err(e) = request.await {
            self.fail(&e);
            return Err(e);
        }
        self.refresh().await
    }

    fn fail(&self, error: &ApiError) {
        #[cfg(feature = "tracing")]
        tracing::warn!("Cart request failed: {error}");
        let message = error.user_message();
        self.update(|state| {
            state.loading = false;
            state.error = Some(message);
        });
    }
}

#[cfg(feature = "tracing")]
fn warn_on_total_drift(cart: &Cart) {
    if let Some(server_total) = cart.total_cart_price {
        let total = cart.totals().total;
        if (server_total - total).abs() > 0.005 {
            tracing::warn!(
                server_total,
                total,
                "Server cart total differs from the sum of item prices"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    fn item(id: &str, base: f64, fees: f64, taxes: f64, discounts: f64) -> CartItem {
        CartItem {
            id: id.to_string(),
            service_id: format!("svc-{id}"),
            service_type: "activity".to_string(),
            service_name: format!("Service {id}"),
            selected_date: Some("2026-11-02".to_string()),
            selected_time: Some("09:30".to_string()),
            quantity: 1,
            price_breakdown: PriceBreakdown {
                base_price: base,
                fees,
                taxes,
                discounts,
                total_price: base + fees + taxes - discounts,
            },
        }
    }

    #[derive(Default)]
    struct FakeCartApi {
        items: Mutex<Vec<CartItem>>,
        fetches: AtomicUsize,
        fail_writes: AtomicBool,
    }

    impl CartApi for Arc<FakeCartApi> {
        async fn fetch_cart(&self) -> Result<Cart, ApiError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(Cart {
                items: self.items.lock().clone(),
                total_cart_price: None,
            })
        }

        async fn add_to_cart(&self, new: &NewCartItem) -> Result<(), ApiError> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(ApiError::from_response_body(
                    400,
                    r#"{"message":"Date is no longer available"}"#,
                ));
            }
            let mut items = self.items.lock();
            let id = format!("{}", items.len() + 1);
            let mut added = item(&id, 100.0, 5.0, 12.5, 0.0);
            added.service_id = new.service_id.clone();
            added.quantity = new.quantity;
            items.push(added);
            Ok(())
        }

        async fn update_cart_item(&self, id: &str, update: &CartItemUpdate) -> Result<(), ApiError> {
            let mut items = self.items.lock();
            let item = items
                .iter_mut()
                .find(|item| item.id == id)
                .ok_or_else(|| ApiError::from_response_body(404, "{}"))?;
            if let Some(quantity) = update.quantity {
                item.quantity = quantity;
            }
            Ok(())
        }

        async fn remove_cart_item(&self, id: &str) -> Result<(), ApiError> {
            self.items.lock().retain(|item| item.id != id);
            Ok(())
        }

        async fn clear_cart(&self) -> Result<(), ApiError> {
            self.items.lock().clear();
            Ok(())
        }
    }

    #[test]
    fn totals_are_the_elementwise_sum() {
        let items = vec![
            item("a", 120.0, 6.0, 15.5, 10.0),
            item("b", 80.25, 4.0, 10.0, 0.0),
            item("c", 45.5, 2.25, 5.75, 5.0),
        ];
        let totals = CartTotals::from_items(&items);

        let sum = |f: fn(&PriceBreakdown) -> f64| -> f64 {
            items.iter().map(|item| f(&item.price_breakdown)).sum()
        };
        assert_eq!(totals.subtotal, sum(|p| p.base_price));
        assert_eq!(totals.fees, sum(|p| p.fees));
        assert_eq!(totals.taxes, sum(|p| p.taxes));
        assert_eq!(totals.discounts, sum(|p| p.discounts));
        assert_eq!(totals.total, sum(|p| p.total_price));
        assert_eq!(totals.subtotal, 245.75);
    }

    #[test]
    fn empty_cart_totals_are_zero() {
        assert_eq!(CartTotals::from_items(std::iter::empty()), CartTotals::default());
    }

    #[test]
    fn cart_item_reads_server_shape() {
        let item: CartItem = serde_json::from_str(
            r#"{
                "_id": "ci-1",
                "serviceId": "svc-9",
                "serviceType": "dining",
                "serviceName": "Da Conch Shack",
                "selectedDate": "2026-12-24",
                "priceBreakdown": {"basePrice": 60, "fees": 3, "taxes": 7.5, "discounts": 0, "totalPrice": 70.5}
            }"#,
        )
        .unwrap();
        assert_eq!(item.id, "ci-1");
        assert_eq!(item.quantity, 1);
        assert_eq!(item.selected_time, None);
        assert_eq!(item.price_breakdown.total_price, 70.5);
    }

    #[test]
    fn new_item_omits_unset_fields() {
        let item = NewCartItem::builder()
            .service_id("svc-1")
            .service_type("stay")
            .build();
        assert_eq!(
            serde_json::to_value(&item).unwrap(),
            serde_json::json!({"serviceId": "svc-1", "serviceType": "stay", "quantity": 1})
        );
    }

    #[tokio::test]
    async fn mutations_refetch_the_cart() {
        let api = Arc::new(FakeCartApi::default());
        let store = CartStore::new(api.clone());

        store.refresh().await.unwrap();
        assert_eq!(store.item_count(), 0);

        let new = NewCartItem::builder()
            .service_id("svc-7")
            .service_type("activity")
            .quantity(2)
            .build();
        store.add_item(&new).await.unwrap();
        store.add_item(&new).await.unwrap();
        assert_eq!(store.item_count(), 2);
        assert_eq!(store.totals().subtotal, 200.0);

        let update = CartItemUpdate {
            quantity: Some(4),
            ..Default::default()
        };
        store.update_item("1", &update).await.unwrap();
        assert_eq!(store.cart().items[0].quantity, 4);

        store.remove_item("2").await.unwrap();
        assert_eq!(store.item_count(), 1);

        store.clear().await.unwrap();
        assert_eq!(store.item_count(), 0);
        assert_eq!(api.fetches.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn failures_become_the_error_message() {
        let api = Arc::new(FakeCartApi::default());
        let store = CartStore::new(api.clone());
        api.fail_writes.store(true, Ordering::SeqCst);

        let new = NewCartItem::builder()
            .service_id("svc-7")
            .service_type("activity")
            .build();
        let result = store.add_item(&new).await;
        assert_matches!(result, Err(ApiError::Status { status: 400, .. }));
        assert_eq!(store.error().as_deref(), Some("Date is no longer available"));
        assert_eq!(api.fetches.load(Ordering::SeqCst), 0);

        api.fail_writes.store(false, Ordering::SeqCst);
        store.add_item(&new).await.unwrap();
        assert_eq!(store.error(), None);
    }

    #[tokio::test]
    async fn subscribers_see_the_refreshed_count() {
        let api = Arc::new(FakeCartApi::default());
        api.items.lock().push(item("a", 10.0, 0.0, 0.0, 0.0));
        let store = CartStore::new(api);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();
        store.subscribe(move |state: &CartState| log.lock().push(state.item_count()));

        store.refresh().await.unwrap();
        assert_eq!(*seen.lock(), vec![0, 1]);
    }
}
