//! The traveler's bookings page.

use crate::{client::ApiClient, error::ApiError};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, fmt, future::Future};

pub mod pdf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
    #[serde(other)]
    Unknown,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Completed => "completed",
            BookingStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category specific fields of a booking. Dates are kept as sent by the server, see
/// [`Booking::primary_date`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "lowercase")]
pub enum BookingDetails {
    Activity {
        date: String,
    },
    Stay {
        #[serde(rename = "checkInDate")]
        check_in_date: String,
        #[serde(rename = "checkOutDate")]
        check_out_date: String,
    },
    Transportation {
        #[serde(rename = "pickupDate")]
        pickup_date: String,
    },
    Dining {
        #[serde(rename = "reservationDate")]
        reservation_date: String,
    },
    #[serde(other)]
    Other,
}

impl BookingDetails {
    pub fn category(&self) -> &'static str {
        match self {
            BookingDetails::Activity { .. } => "activity",
            BookingDetails::Stay { .. } => "stay",
            BookingDetails::Transportation { .. } => "transportation",
            BookingDetails::Dining { .. } => "dining",
            BookingDetails::Other => "other",
        }
    }

    fn raw_date(&self) -> Option<&str> {
        match self {
            BookingDetails::Activity { date } => Some(date),
            BookingDetails::Stay { check_in_date, .. } => Some(check_in_date),
            BookingDetails::Transportation { pickup_date } => Some(pickup_date),
            BookingDetails::Dining { reservation_date } => Some(reservation_date),
            BookingDetails::Other => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    #[serde(alias = "_id")]
    pub id: String,
    pub status: BookingStatus,
    #[serde(default)]
    pub service_name: String,
    #[serde(default)]
    pub total_price: f64,
    #[serde(default = "one")]
    pub guests: u32,
    #[serde(flatten)]
    pub details: BookingDetails,
}

fn one() -> u32 {
    1
}

impl Booking {
    pub fn category(&self) -> &'static str {
        self.details.category()
    }

    /// The day the booking happens: the check-in for stays, the pickup for rides.
    ///
    /// Accepts a bare date or a timestamp, which is truncated to its calendar day.
    pub fn primary_date(&self) -> Option<NaiveDate> {
        self.details.raw_date().and_then(parse_day)
    }
}

fn parse_day(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|dt| dt.date())
        })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BookingFilter {
    #[default]
    All,
    /// Happening today or later.
    Upcoming,
    /// Everything that is not upcoming, including bookings without a readable date.
    Past,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortKey {
    #[default]
    Date,
    Category,
    Status,
}

pub fn filter_bookings<'a>(
    bookings: impl IntoIterator<Item = &'a Booking>,
    filter: BookingFilter,
    today: NaiveDate,
) -> Vec<&'a Booking> {
    bookings
        .into_iter()
        .filter(|booking| {
            let upcoming = booking.primary_date().is_some_and(|date| date >= today);
            match filter {
                BookingFilter::All => true,
                BookingFilter::Upcoming => upcoming,
                BookingFilter::Past => !upcoming,
            }
        })
        .collect()
}

/// Stable ascending sort. Undated bookings sort last by date.
pub fn sort_bookings(bookings: &mut [&Booking], key: SortKey) {
    bookings.sort_by(|a, b| compare(a, b, key));
}

fn compare(a: &Booking, b: &Booking, key: SortKey) -> Ordering {
    match key {
        SortKey::Date => match (a.primary_date(), b.primary_date()) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
        SortKey::Category => a.category().cmp(b.category()),
        SortKey::Status => a.status.as_str().cmp(b.status.as_str()),
    }
}

/// Booking endpoints.
pub trait BookingApi {
    fn user_bookings(&self) -> impl Future<Output = Result<Vec<Booking>, ApiError>>;

    fn cancel_booking(&self, id: &str) -> impl Future<Output = Result<(), ApiError>>;
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BookingsResponse {
    Bookings { bookings: Vec<Booking> },
    Bare(Vec<Booking>),
}

impl BookingApi for ApiClient {
    async fn user_bookings(&self) -> Result<Vec<Booking>, ApiError> {
        let response: BookingsResponse = self.get("/api/bookings/user").await?;
        Ok(match response {
            BookingsResponse::Bookings { bookings } => bookings,
            BookingsResponse::Bare(bookings) => bookings,
        })
    }

    async fn cancel_booking(&self, id: &str) -> Result<(), ApiError> {
        self.send_empty::<()>(Method::PUT, &format!("/api/bookings/{id}/cancel"), None)
            .await
    }
}

/// State of the itinerary page.
#[derive(Debug)]
pub struct Itinerary<A> {
    api: A,
    bookings: Vec<Booking>,
    pub filter: BookingFilter,
    pub sort: SortKey,
    loading: bool,
    error: Option<String>,
}

impl<A: BookingApi> Itinerary<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            bookings: Vec::new(),
            filter: BookingFilter::default(),
            sort: SortKey::default(),
            loading: false,
            error: None,
        }
    }

    pub fn bookings(&self) -> &[Booking] {
        &self.bookings
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub async fn load(&mut self) -> Result<(), ApiError> {
        self.loading = true;
        let result = self.api.user_bookings().await;
        self.loading = false;
        match result {
            Ok(bookings) => {
                self.bookings = bookings;
                self.error = None;
                Ok(())
            }
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!("Failed to load bookings: {e}");
                self.error = Some(e.user_message());
                Err(e)
            }
        }
    }

    /// The bookings to show, filtered then sorted.
    pub fn visible(&self, today: NaiveDate) -> Vec<&Booking> {
        let mut visible = filter_bookings(&self.bookings, self.filter, today);
        sort_bookings(&mut visible, self.sort);
        visible
    }

    /// Cancels a booking and reloads the list.
    pub async fn cancel(&mut self, id: &str) -> Result<(), ApiError> {
        if let Err(e) = self.api.cancel_booking(id).await {
            self.error = Some(e.user_message());
            return Err(e);
        }
        self.load().await
    }

    /// Renders the visible bookings as a PDF document.
    pub fn export_pdf(&self, today: NaiveDate) -> Vec<u8> {
        let mut canvas = pdf::PdfCanvas::new();
        pdf::render_itinerary(&mut canvas, &self.visible(today), today);
        canvas.finish()
    }
}
