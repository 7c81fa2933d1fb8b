//! Client state and REST bindings for the Caicos travel-booking marketplace.
//!
//! The crate holds everything a marketplace frontend needs except the widgets: the
//! session ([`AuthStore`]), the server-side cart ([`CartStore`]), cart checkout with
//! guest or signed-in payment ([`CheckoutFlow`]), the tabbed profile editor
//! ([`ProfileEditor`]), the vendor listing wizard ([`ListingWizard`]) and the traveler
//! itinerary ([`Itinerary`]).
//!
//! All backend calls go through [`ApiClient`], which implements one small trait per
//! resource so each store can be driven by an in-memory fake in tests.
//!
//! On `wasm32` targets persistence uses the browser's `localStorage`/`sessionStorage`.
//! On native targets use [`MemoryStorage`] and drive the stores inside a
//! [`tokio::task::LocalSet`](https://docs.rs/tokio/latest/tokio/task/struct.LocalSet.html),
//! since background tasks are spawned with `spawn_local`.

pub mod auth;
pub mod cart;
pub mod checkout;
pub mod client;
pub mod config;
pub mod error;
pub mod geo;
pub mod header;
pub mod info;
pub mod itinerary;
pub mod listing;
pub mod profile;
pub mod storage;
mod util;
pub mod validation;

pub use auth::{AuthApi, AuthState, AuthStore, SessionUser, UserRole};
pub use cart::{Cart, CartApi, CartItem, CartStore, CartTotals, PriceBreakdown};
pub use checkout::{CheckoutFlow, CheckoutStage, GuestInfo};
pub use client::ApiClient;
pub use config::ClientConfig;
pub use error::ApiError;
pub use itinerary::{Booking, BookingApi, BookingFilter, Itinerary, SortKey};
pub use listing::{ListingWizard, ServiceListing, ServiceType};
pub use profile::{ProfileEditor, ProfileSection, UserProfile};
pub use storage::{KeyValueStorage, MemoryStorage, StorageEvent};
pub use validation::FieldErrors;
