//! Per-service-type listing schemas.
//!
//! Every form's rules are declared here and checked by the shared validation layer, so
//! the six forms cannot drift apart.

use super::image::Image;
use crate::validation::{clock_time, field_error, non_blank};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Fields every listing has.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ListingBasics {
    #[validate(custom(function = "non_blank", message = "Name is required"))]
    pub name: String,
    #[validate(custom(function = "non_blank", message = "Description is required"))]
    pub description: String,
    #[validate(custom(function = "non_blank", message = "Location is required"))]
    pub location: String,
    #[validate(custom(function = "non_blank", message = "Island is required"))]
    pub island: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(email(message = "Enter a valid email address"))]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub images: Vec<Image>,
}

/// Daily opening hours. `None` times mean closed that day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct OpeningHours {
    pub day: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(custom(function = "clock_time"))]
    pub open: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(custom(function = "clock_time"))]
    pub close: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ActivityListing {
    #[serde(flatten)]
    #[validate(nested)]
    pub basics: ListingBasics,
    #[serde(default)]
    pub category: String,
    #[validate(length(min = 1, message = "Add at least one option"), nested)]
    pub options: Vec<ActivityOption>,
    #[serde(default)]
    #[validate(nested)]
    pub schedule: Vec<AvailabilitySlot>,
    #[serde(default)]
    pub included: Vec<String>,
}

/// One bookable variant of an activity, e.g. a half-day and a full-day tour.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ActivityOption {
    #[validate(custom(function = "non_blank", message = "Title is required"))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[validate(range(min = 0.0, message = "Price cannot be negative"))]
    pub price: f64,
    #[validate(range(min = 1, message = "Duration must be at least 1 minute"))]
    pub duration_minutes: u32,
    #[validate(range(min = 1, message = "At least 1 participant is required"))]
    pub max_participants: u32,
    #[serde(default)]
    pub images: Vec<Image>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilitySlot {
    pub day: String,
    #[validate(custom(function = "clock_time"))]
    pub start_time: String,
    #[validate(custom(function = "clock_time"))]
    pub end_time: String,
    #[validate(range(min = 1, message = "Capacity must be at least 1"))]
    pub capacity: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "has_menu_items", skip_on_field_errors = false))]
pub struct DiningListing {
    #[serde(flatten)]
    #[validate(nested)]
    pub basics: ListingBasics,
    #[serde(default)]
    pub cuisine: Vec<String>,
    #[serde(default)]
    pub price_range: String,
    #[validate(nested)]
    pub menu: Vec<MenuSection>,
    #[serde(default)]
    #[validate(nested)]
    pub opening_hours: Vec<OpeningHours>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MenuSection {
    #[validate(custom(function = "non_blank", message = "Section title is required"))]
    pub title: String,
    #[validate(nested)]
    pub items: Vec<MenuItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MenuItem {
    #[validate(custom(function = "non_blank", message = "Name is required"))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[validate(range(min = 0.0, message = "Price cannot be negative"))]
    pub price: f64,
    #[serde(default)]
    pub dietary: Vec<String>,
    #[serde(default)]
    pub images: Vec<Image>,
}

/// Checked on the whole listing: `menu` already carries the per-section list errors.
fn has_menu_items(listing: &DiningListing) -> Result<(), ValidationError> {
    if listing.menu.iter().any(|section| !section.items.is_empty()) {
        return Ok(());
    }
    Err(field_error("menu", "length", "Add at least one menu item"))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ShoppingListing {
    #[serde(flatten)]
    #[validate(nested)]
    pub basics: ListingBasics,
    #[serde(default)]
    pub store_type: String,
    #[validate(length(min = 1, message = "Add at least one product"), nested)]
    pub products: Vec<Product>,
    #[serde(default)]
    #[validate(nested)]
    pub opening_hours: Vec<OpeningHours>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[validate(custom(function = "non_blank", message = "Name is required"))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[validate(range(min = 0.0, message = "Price cannot be negative"))]
    pub price: f64,
    #[serde(default)]
    pub images: Vec<Image>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StayListing {
    #[serde(flatten)]
    #[validate(nested)]
    pub basics: ListingBasics,
    #[serde(default)]
    pub property_type: String,
    #[serde(default)]
    pub amenities: Vec<String>,
    #[validate(length(min = 1, message = "Add at least one room type"), nested)]
    pub rooms: Vec<Room>,
    #[validate(custom(function = "clock_time"))]
    pub check_in_time: String,
    #[validate(custom(function = "clock_time"))]
    pub check_out_time: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    #[validate(custom(function = "non_blank", message = "Room name is required"))]
    pub name: String,
    #[validate(range(min = 0.0, message = "Price cannot be negative"))]
    pub price_per_night: f64,
    #[validate(range(min = 1, message = "At least 1 guest is required"))]
    pub max_guests: u32,
    #[serde(default)]
    pub beds: u32,
    #[serde(default)]
    pub images: Vec<Image>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TransportationListing {
    #[serde(flatten)]
    #[validate(nested)]
    pub basics: ListingBasics,
    #[validate(length(min = 1, message = "Add at least one vehicle"), nested)]
    pub vehicles: Vec<Vehicle>,
    #[validate(nested)]
    pub service_area: ServiceArea,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    #[validate(custom(function = "non_blank", message = "Vehicle type is required"))]
    pub vehicle_type: String,
    #[validate(range(min = 1, message = "Capacity must be at least 1"))]
    pub capacity: u32,
    #[validate(range(min = 0.0, message = "Price cannot be negative"))]
    pub base_fare: f64,
    #[serde(default)]
    pub images: Vec<Image>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ServiceArea {
    #[validate(length(min = 1, message = "Select at least one island"))]
    pub islands: Vec<String>,
    #[serde(default)]
    pub airport_pickup: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct WellnessSpaListing {
    #[serde(flatten)]
    #[validate(nested)]
    pub basics: ListingBasics,
    #[validate(length(min = 1, message = "Add at least one treatment"), nested)]
    pub services: Vec<SpaService>,
    #[serde(default)]
    #[validate(nested)]
    pub opening_hours: Vec<OpeningHours>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SpaService {
    #[validate(custom(function = "non_blank", message = "Name is required"))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[validate(range(min = 1, message = "Duration must be at least 1 minute"))]
    pub duration_minutes: u32,
    #[validate(range(min = 0.0, message = "Price cannot be negative"))]
    pub price: f64,
    #[serde(default)]
    pub images: Vec<Image>,
}
