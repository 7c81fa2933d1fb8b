//! Cart checkout, for signed-in users and guests.
//!
//! ```text
//! Loading -> Empty
//!         -> Ready -> (signed in) ----------------------> Payment -> Done
//!                  -> ChooseCheckout -> GuestDetails ----^
//!                                    -> sign-in redirect, then `signed_in`
//! ```
//!
//! The payment intent is reused until the items, the amount or the payer change. Its id is
//! kept in session storage so the processor's redirect back can be matched to it.

use crate::{
    cart::{Cart, CartTotals},
    client::ApiClient,
    error::ApiError,
    storage::{
        get_json, set_json, KeyValueStorage, StorageError, KEY_CART_PAYMENT_INTENT_ID,
        KEY_PENDING_BOOKING,
    },
    validation::{non_blank, validate_form, FieldErrors},
};
use serde::{Deserialize, Serialize};
use std::{fmt, future::Future};
use thiserror::Error;
use validator::Validate;

/// Where unauthenticated shoppers are sent to sign in, returning to checkout afterwards.
pub const SIGN_IN_REDIRECT: &str = "/login?redirect=/cart-checkout";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutStage {
    Loading,
    Empty,
    Ready,
    ChooseCheckout,
    GuestDetails,
    Payment,
    Done,
}

impl fmt::Display for CheckoutStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Contact details of a shopper checking out without an account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GuestInfo {
    #[validate(custom(function = "non_blank", message = "First name is required"))]
    pub first_name: String,
    #[validate(custom(function = "non_blank", message = "Last name is required"))]
    pub last_name: String,
    #[validate(email(message = "Enter a valid email address"))]
    pub email: String,
    #[validate(custom(function = "non_blank", message = "Phone number is required"))]
    pub phone: String,
}

/// A payment intent as created by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntent {
    pub client_secret: String,
    #[serde(alias = "id")]
    pub payment_intent_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartPaymentRequest {
    pub cart_item_ids: Vec<String>,
    pub amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guest_info: Option<GuestInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingPaymentRequest {
    pub service_id: String,
    pub service_type: String,
    pub amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guest_info: Option<GuestInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeRequest {
    pub payment_intent_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guest_info: Option<GuestInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking: Option<PendingBooking>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BookingConfirmation {
    #[serde(alias = "bookingIds")]
    pub booking_ids: Vec<String>,
    pub message: Option<String>,
}

/// Payment endpoints.
pub trait PaymentApi {
    fn create_payment_intent(
        &self,
        request: &BookingPaymentRequest,
    ) -> impl Future<Output = Result<PaymentIntent, ApiError>>;

    fn create_cart_payment_intent(
        &self,
        request: &CartPaymentRequest,
    ) -> impl Future<Output = Result<PaymentIntent, ApiError>>;

    fn finalize_booking(
        &self,
        request: &FinalizeRequest,
    ) -> impl Future<Output = Result<BookingConfirmation, ApiError>>;
}

impl PaymentApi for ApiClient {
    async fn create_payment_intent(
        &self,
        request: &BookingPaymentRequest,
    ) -> Result<PaymentIntent, ApiError> {
        self.post("/api/payments/create-payment-intent", request)
            .await
    }

    async fn create_cart_payment_intent(
        &self,
        request: &CartPaymentRequest,
    ) -> Result<PaymentIntent, ApiError> {
        self.post("/api/payments/create-cart-payment-intent", request)
            .await
    }

    async fn finalize_booking(
        &self,
        request: &FinalizeRequest,
    ) -> Result<BookingConfirmation, ApiError> {
        self.post("/api/payments/finalize-booking", request).await
    }
}

#[derive(Error, Debug)]
pub enum CheckoutError {
    #[error("Checkout cannot do that at the {0} stage")]
    WrongStage(CheckoutStage),
    #[error("Please fix the highlighted fields")]
    Invalid(FieldErrors),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl CheckoutError {
    pub fn user_message(&self) -> String {
        match self {
            CheckoutError::Api(e) => e.user_message(),
            other => other.to_string(),
        }
    }
}

/// Client-side state of one payment: the secret the processor's form is mounted with,
/// and the request it was created for.
#[derive(Debug)]
struct PaymentState<R> {
    intent: Option<PaymentIntent>,
    request: Option<R>,
    error: Option<String>,
}

impl<R> Default for PaymentState<R> {
    fn default() -> Self {
        Self {
            intent: None,
            request: None,
            error: None,
        }
    }
}

impl<R: Clone + PartialEq> PaymentState<R> {
    /// Creates the intent unless one already exists for an identical `request`.
    /// Any other request replaces the intent.
    async fn ensure<F>(
        &mut self,
        session: &mut dyn KeyValueStorage,
        request: &R,
        create: F,
    ) -> Result<(), CheckoutError>
    where
        F: Future<Output = Result<PaymentIntent, ApiError>>,
    {
        if self.intent.is_some() && self.request.as_ref() == Some(request) {
            return Ok(());
        }
        self.intent = None;
        self.request = None;
        let intent = create.await.map_err(|e| {
            #[cfg(feature = "tracing")]
            tracing::warn!("Could not create the payment intent: {e}");
            CheckoutError::from(e)
        })?;
        session.set(KEY_CART_PAYMENT_INTENT_ID, &intent.payment_intent_id)?;
        self.intent = Some(intent);
        self.request = Some(request.clone());
        Ok(())
    }

    fn record<T>(&mut self, result: Result<T, CheckoutError>) -> Result<T, CheckoutError> {
        match &result {
            Ok(_) => self.error = None,
            Err(e) => self.error = Some(e.user_message()),
        }
        result
    }
}

/// The cart checkout page.
pub struct CheckoutFlow<P> {
    payments: P,
    session: Box<dyn KeyValueStorage>,
    stage: CheckoutStage,
    cart: Cart,
    guest: Option<GuestInfo>,
    guest_errors: FieldErrors,
    payment: PaymentState<CartPaymentRequest>,
    confirmation: Option<BookingConfirmation>,
}

impl<P> fmt::Debug for CheckoutFlow<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckoutFlow")
            .field("stage", &self.stage)
            .field("items", &self.cart.items.len())
            .field("guest", &self.guest.is_some())
            .field("payment", &self.payment)
            .finish()
    }
}

impl<P: PaymentApi> CheckoutFlow<P> {
    /// `session` should be the browser's session storage.
    pub fn new<S>(payments: P, session: S) -> Self
    where
        S: KeyValueStorage + 'static,
    {
        Self {
            payments,
            session: Box::new(session),
            stage: CheckoutStage::Loading,
            cart: Cart::default(),
            guest: None,
            guest_errors: FieldErrors::new(),
            payment: PaymentState::default(),
            confirmation: None,
        }
    }

    pub fn stage(&self) -> CheckoutStage {
        self.stage
    }

    pub fn cart(&self) -> &Cart {
        &self.cart
    }

    pub fn totals(&self) -> CartTotals {
        self.cart.totals()
    }

    pub fn guest(&self) -> Option<&GuestInfo> {
        self.guest.as_ref()
    }

    pub fn guest_errors(&self) -> &FieldErrors {
        &self.guest_errors
    }

    /// Secret to mount the processor's payment form with, once created.
    pub fn client_secret(&self) -> Option<&str> {
        self.payment
            .intent
            .as_ref()
            .map(|intent| intent.client_secret.as_str())
    }

    pub fn error(&self) -> Option<&str> {
        self.payment.error.as_deref()
    }

    pub fn confirmation(&self) -> Option<&BookingConfirmation> {
        self.confirmation.as_ref()
    }

    fn expect_stage(&self, stages: &[CheckoutStage]) -> Result<(), CheckoutError> {
        if stages.contains(&self.stage) {
            Ok(())
        } else {
            Err(CheckoutError::WrongStage(self.stage))
        }
    }

    /// Shows the fetched cart.
    pub fn load(&mut self, cart: Cart) {
        self.stage = if cart.items.is_empty() {
            CheckoutStage::Empty
        } else {
            CheckoutStage::Ready
        };
        self.cart = cart;
    }

    /// The "Proceed to checkout" button.
    pub async fn proceed(&mut self, is_authenticated: bool) -> Result<(), CheckoutError> {
        self.expect_stage(&[CheckoutStage::Ready])?;
        if !is_authenticated {
            self.stage = CheckoutStage::ChooseCheckout;
            return Ok(());
        }
        self.start_payment().await
    }

    pub fn choose_guest(&mut self) -> Result<(), CheckoutError> {
        self.expect_stage(&[CheckoutStage::ChooseCheckout])?;
        self.stage = CheckoutStage::GuestDetails;
        Ok(())
    }

    /// Where to send the shopper to sign in.
    pub fn choose_sign_in(&self) -> Result<&'static str, CheckoutError> {
        self.expect_stage(&[CheckoutStage::ChooseCheckout])?;
        Ok(SIGN_IN_REDIRECT)
    }

    /// Validates the guest form and creates the payment intent for it.
    pub async fn submit_guest(&mut self, info: GuestInfo) -> Result<(), CheckoutError> {
        self.expect_stage(&[CheckoutStage::GuestDetails])?;
        if let Err(errors) = validate_form(&info) {
            self.guest_errors = errors.clone();
            self.guest = Some(info);
            return Err(CheckoutError::Invalid(errors));
        }
        self.guest_errors = FieldErrors::new();
        self.guest = Some(info);
        self.start_payment().await
    }

    /// The shopper came back from signing in.
    pub async fn signed_in(&mut self) -> Result<(), CheckoutError> {
        self.expect_stage(&[
            CheckoutStage::Ready,
            CheckoutStage::ChooseCheckout,
            CheckoutStage::GuestDetails,
        ])?;
        self.guest = None;
        self.start_payment().await
    }

    async fn start_payment(&mut self) -> Result<(), CheckoutError> {
        let request = CartPaymentRequest {
            cart_item_ids: self.cart.items.iter().map(|item| item.id.clone()).collect(),
            amount: self.totals().total,
            guest_info: self.guest.clone(),
        };
        let result = self
            .payment
            .ensure(
                self.session.as_mut(),
                &request,
                self.payments.create_cart_payment_intent(&request),
            )
            .await;
        self.payment.record(result)?;
        self.stage = CheckoutStage::Payment;
        Ok(())
    }

    /// Manual back-navigation. The payment intent, if any, is kept until its inputs change.
    pub fn back(&mut self) -> Result<(), CheckoutError> {
        self.stage = match self.stage {
            CheckoutStage::Payment if self.guest.is_some() => CheckoutStage::GuestDetails,
            CheckoutStage::Payment | CheckoutStage::ChooseCheckout => CheckoutStage::Ready,
            CheckoutStage::GuestDetails => CheckoutStage::ChooseCheckout,
            stage => return Err(CheckoutError::WrongStage(stage)),
        };
        self.payment.error = None;
        Ok(())
    }

    /// Finalizes the booking once the processor has confirmed the payment.
    pub async fn complete(&mut self) -> Result<&BookingConfirmation, CheckoutError> {
        self.expect_stage(&[CheckoutStage::Payment])?;
        let Some(intent) = &self.payment.intent else {
            return Err(CheckoutError::WrongStage(self.stage));
        };
        let request = FinalizeRequest {
            payment_intent_id: intent.payment_intent_id.clone(),
            guest_info: self.guest.clone(),
            booking: None,
        };
        let result = self
            .payments
            .finalize_booking(&request)
            .await
            .map_err(CheckoutError::from);
        let confirmation = self.payment.record(result)?;

        if let Err(_e) = self.session.remove(KEY_CART_PAYMENT_INTENT_ID) {
            #[cfg(feature = "tracing")]
            tracing::warn!("Could not clear the payment intent id: {_e}");
        }
        self.stage = CheckoutStage::Done;
        Ok(&*self.confirmation.insert(confirmation))
    }
}

/// A single service booked directly from its page, kept in session storage until paid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingBooking {
    pub service_id: String,
    pub service_type: String,
    #[serde(default)]
    pub service_name: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default = "one")]
    pub guests: u32,
    pub total_price: f64,
}

fn one() -> u32 {
    1
}

impl PendingBooking {
    pub fn load(session: &dyn KeyValueStorage) -> Result<Option<Self>, StorageError> {
        get_json(session, KEY_PENDING_BOOKING)
    }

    pub fn save(&self, session: &mut dyn KeyValueStorage) -> Result<(), StorageError> {
        set_json(session, KEY_PENDING_BOOKING, self)
    }

    pub fn clear(session: &mut dyn KeyValueStorage) -> Result<(), StorageError> {
        session.remove(KEY_PENDING_BOOKING)
    }
}

/// Payment for a [`PendingBooking`].
pub struct BookingCheckout<P> {
    payments: P,
    session: Box<dyn KeyValueStorage>,
    booking: PendingBooking,
    guest: Option<GuestInfo>,
    payment: PaymentState<BookingPaymentRequest>,
    confirmation: Option<BookingConfirmation>,
}

impl<P> fmt::Debug for BookingCheckout<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BookingCheckout")
            .field("booking", &self.booking)
            .field("payment", &self.payment)
            .finish()
    }
}

impl<P: PaymentApi> BookingCheckout<P> {
    /// Stores `booking` as pending and starts paying for it.
    pub fn start<S>(
        payments: P,
        mut session: S,
        booking: PendingBooking,
    ) -> Result<Self, CheckoutError>
    where
        S: KeyValueStorage + 'static,
    {
        booking.save(&mut session)?;
        Ok(Self::with_booking(payments, Box::new(session), booking))
    }

    /// Picks up the booking pending in this tab, if any.
    pub fn resume<S>(payments: P, session: S) -> Result<Option<Self>, CheckoutError>
    where
        S: KeyValueStorage + 'static,
    {
        let booking = PendingBooking::load(&session)?;
        Ok(booking.map(|booking| Self::with_booking(payments, Box::new(session), booking)))
    }

    fn with_booking(
        payments: P,
        session: Box<dyn KeyValueStorage>,
        booking: PendingBooking,
    ) -> Self {
        Self {
            payments,
            session,
            booking,
            guest: None,
            payment: PaymentState::default(),
            confirmation: None,
        }
    }

    pub fn booking(&self) -> &PendingBooking {
        &self.booking
    }

    pub fn client_secret(&self) -> Option<&str> {
        self.payment
            .intent
            .as_ref()
            .map(|intent| intent.client_secret.as_str())
    }

    pub fn error(&self) -> Option<&str> {
        self.payment.error.as_deref()
    }

    /// Creates the payment intent, reusing it while the payer stays the same.
    /// `guest` is required when not signed in.
    pub async fn create_payment_intent(
        &mut self,
        guest: Option<GuestInfo>,
    ) -> Result<&str, CheckoutError> {
        if let Some(info) = &guest {
            validate_form(info).map_err(CheckoutError::Invalid)?;
        }
        self.guest = guest;
        let request = BookingPaymentRequest {
            service_id: self.booking.service_id.clone(),
            service_type: self.booking.service_type.clone(),
            amount: self.booking.total_price,
            guest_info: self.guest.clone(),
        };
        let result = self
            .payment
            .ensure(
                self.session.as_mut(),
                &request,
                self.payments.create_payment_intent(&request),
            )
            .await;
        self.payment.record(result)?;
        self.client_secret()
            .ok_or(CheckoutError::WrongStage(CheckoutStage::Ready))
    }

    /// Finalizes the booking and forgets it.
    pub async fn complete(&mut self) -> Result<&BookingConfirmation, CheckoutError> {
        let Some(intent) = &self.payment.intent else {
            return Err(CheckoutError::WrongStage(CheckoutStage::Ready));
        };
        let request = FinalizeRequest {
            payment_intent_id: intent.payment_intent_id.clone(),
            guest_info: self.guest.clone(),
            booking: Some(self.booking.clone()),
        };
        let result = self
            .payments
            .finalize_booking(&request)
            .await
            .map_err(CheckoutError::from);
        let confirmation = self.payment.record(result)?;

        for result in [
            PendingBooking::clear(self.session.as_mut()),
            self.session.remove(KEY_CART_PAYMENT_INTENT_ID),
        ] {
            if let Err(_e) = result {
                #[cfg(feature = "tracing")]
                tracing::warn!("Could not clear the pending booking: {_e}");
            }
        }
        Ok(&*self.confirmation.insert(confirmation))
    }
}
