//! What the site header shows for the current session.

use crate::auth::{AuthState, UserRole};

/// Badge counts above this are shown as `99+`.
const BADGE_CAP: usize = 99;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavLink {
    pub label: &'static str,
    pub href: &'static str,
}

const fn link(label: &'static str, href: &'static str) -> NavLink {
    NavLink { label, href }
}

const BROWSE_LINKS: &[NavLink] = &[
    link("Activities", "/activities"),
    link("Dining", "/dining"),
    link("Stays", "/stays"),
    link("Transportation", "/transportation"),
    link("Wellness & Spa", "/wellness-spa"),
    link("Shopping", "/shopping"),
    link("Travel Guides", "/info"),
];

const TRAVELER_LINKS: &[NavLink] = &[
    link("My Itinerary", "/itinerary"),
    link("Profile", "/profile"),
];

const VENDOR_LINKS: &[NavLink] = &[
    link("Dashboard", "/vendor/dashboard"),
    link("Create Listing", "/vendor/create-listing"),
    link("Bookings", "/vendor/bookings"),
    link("Profile", "/profile"),
];

const ADMIN_LINKS: &[NavLink] = &[
    link("Admin Dashboard", "/admin/dashboard"),
    link("Users", "/admin/users"),
    link("Listings", "/admin/listings"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderAction {
    SignIn { href: &'static str },
    SignOut,
}

/// The cart button. `badge` is `None` when the count badge is hidden.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartIcon {
    pub href: &'static str,
    pub badge: Option<String>,
}

impl CartIcon {
    pub fn new(count: usize) -> Self {
        let badge = match count {
            0 => None,
            n if n > BADGE_CAP => Some(format!("{BADGE_CAP}+")),
            n => Some(n.to_string()),
        };
        Self {
            href: "/cart",
            badge,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderModel {
    pub links: Vec<NavLink>,
    /// `None` while the session is still loading.
    pub action: Option<HeaderAction>,
    /// Only travelers and guests shop, so only they get a cart.
    pub cart: Option<CartIcon>,
    pub greeting: Option<String>,
}

impl HeaderModel {
    pub fn new(auth: &AuthState, cart_count: usize) -> Self {
        let role = auth.is_authenticated.then(|| auth.role()).flatten();

        let mut links = BROWSE_LINKS.to_vec();
        match role {
            Some(UserRole::Admin) => links = ADMIN_LINKS.to_vec(),
            Some(UserRole::Vendor) => links = VENDOR_LINKS.to_vec(),
            Some(UserRole::Traveler) => links.extend_from_slice(TRAVELER_LINKS),
            None => {}
        }

        let action = if auth.loading {
            None
        } else if auth.is_authenticated {
            Some(HeaderAction::SignOut)
        } else {
            Some(HeaderAction::SignIn { href: "/login" })
        };

        let cart = matches!(role, None | Some(UserRole::Traveler)).then(|| CartIcon::new(cart_count));

        let greeting = auth
            .user
            .as_ref()
            .filter(|_| auth.is_authenticated)
            .map(|user| format!("Hi, {}", user.display_name()));

        Self {
            links,
            action,
            cart,
            greeting,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthAction, SessionUser};

    fn signed_in(role: UserRole) -> AuthState {
        AuthState::default().reduce(AuthAction::SignedIn(SessionUser {
            id: "u-1".to_string(),
            email: "kim@example.com".to_string(),
            first_name: "Kim".to_string(),
            last_name: String::new(),
            role,
        }))
    }

    fn guest() -> AuthState {
        AuthState::default().reduce(AuthAction::SessionRestored(None))
    }

    #[test]
    fn badge_is_hidden_at_zero_and_capped() {
        assert_eq!(CartIcon::new(0).badge, None);
        assert_eq!(CartIcon::new(7).badge.as_deref(), Some("7"));
        assert_eq!(CartIcon::new(99).badge.as_deref(), Some("99"));
        assert_eq!(CartIcon::new(100).badge.as_deref(), Some("99+"));
    }

    #[test]
    fn guests_browse_and_sign_in() {
        let header = HeaderModel::new(&guest(), 2);
        assert_eq!(header.links, BROWSE_LINKS);
        assert_eq!(header.action, Some(HeaderAction::SignIn { href: "/login" }));
        assert_eq!(header.cart.unwrap().badge.as_deref(), Some("2"));
        assert_eq!(header.greeting, None);
    }

    #[test]
    fn travelers_get_itinerary_and_cart() {
        let header = HeaderModel::new(&signed_in(UserRole::Traveler), 0);
        assert!(header.links.iter().any(|l| l.href == "/itinerary"));
        assert_eq!(header.action, Some(HeaderAction::SignOut));
        assert_eq!(header.cart, Some(CartIcon::new(0)));
        assert_eq!(header.greeting.as_deref(), Some("Hi, Kim"));
    }

    #[test]
    fn vendors_and_admins_have_no_cart() {
        let vendor = HeaderModel::new(&signed_in(UserRole::Vendor), 3);
        assert!(vendor.cart.is_none());
        assert!(vendor.links.iter().any(|l| l.href == "/vendor/create-listing"));

        let admin = HeaderModel::new(&signed_in(UserRole::Admin), 3);
        assert!(admin.cart.is_none());
        assert_eq!(admin.links, ADMIN_LINKS);
    }

    #[test]
    fn no_action_while_loading() {
        let header = HeaderModel::new(&AuthState::default(), 0);
        assert_eq!(header.action, None);
    }
}
