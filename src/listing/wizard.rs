use super::{
    reconcile_images, CreatedListing, ImageUploader, ListingApi, ServiceListing, ServiceType,
    UploadError,
};
use crate::{
    error::ApiError,
    validation::{validate_form, FieldErrors},
};
use std::fmt;
use thiserror::Error;

/// The three wizard pages, plus the confirmation shown after a successful submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardStep {
    TypeSelect,
    ServiceForm,
    Review,
    Submitted,
}

impl WizardStep {
    /// 1-based position for the progress indicator.
    pub fn number(&self) -> u8 {
        match self {
            WizardStep::TypeSelect => 1,
            WizardStep::ServiceForm => 2,
            WizardStep::Review | WizardStep::Submitted => 3,
        }
    }
}

impl fmt::Display for WizardStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WizardStep::TypeSelect => "type selection",
            WizardStep::ServiceForm => "service details",
            WizardStep::Review => "review",
            WizardStep::Submitted => "submitted",
        })
    }
}

#[derive(Error, Debug)]
pub enum WizardError {
    #[error("Not available on the {actual} step (expected {expected})")]
    WrongStep {
        expected: WizardStep,
        actual: WizardStep,
    },
    #[error("Expected a {expected} listing, got {found}")]
    TypeMismatch {
        expected: ServiceType,
        found: ServiceType,
    },
    #[error("Please fix the highlighted fields")]
    Invalid(FieldErrors),
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// The vendor's create-listing wizard.
///
/// Steps only move one at a time. The draft survives going back, so a vendor can return
/// to the form from review without losing input.
#[derive(Debug)]
pub struct ListingWizard {
    step: WizardStep,
    draft: Option<ServiceListing>,
    errors: FieldErrors,
    submitting: bool,
    error: Option<String>,
    created: Option<CreatedListing>,
}

impl Default for ListingWizard {
    fn default() -> Self {
        Self::new()
    }
}

impl ListingWizard {
    pub fn new() -> Self {
        Self {
            step: WizardStep::TypeSelect,
            draft: None,
            errors: FieldErrors::new(),
            submitting: false,
            error: None,
            created: None,
        }
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn draft(&self) -> Option<&ServiceListing> {
        self.draft.as_ref()
    }

    /// Field errors from the last attempt to leave the form.
    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    /// Submission failure, as shown on the review page.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    pub fn created(&self) -> Option<&CreatedListing> {
        self.created.as_ref()
    }

    fn expect_step(&self, expected: WizardStep) -> Result<(), WizardError> {
        if self.step != expected {
            return Err(WizardError::WrongStep {
                expected,
                actual: self.step,
            });
        }
        Ok(())
    }

    /// Picks the service type and opens its form. Re-picking the same type keeps the draft.
    pub fn select_type(&mut self, service_type: ServiceType) -> Result<(), WizardError> {
        self.expect_step(WizardStep::TypeSelect)?;
        let keep = self
            .draft
            .as_ref()
            .is_some_and(|draft| draft.service_type() == service_type);
        if !keep {
            self.draft = Some(ServiceListing::new(service_type));
            self.errors = FieldErrors::new();
        }
        self.step = WizardStep::ServiceForm;
        Ok(())
    }

    /// Edits the draft in place. Nothing is validated until [`ListingWizard::advance`].
    pub fn update<F>(&mut self, edit: F) -> Result<(), WizardError>
    where
        F: FnOnce(&mut ServiceListing),
    {
        self.expect_step(WizardStep::ServiceForm)?;
        let draft = self.draft.as_mut().ok_or(WizardError::WrongStep {
            expected: WizardStep::TypeSelect,
            actual: self.step,
        })?;
        edit(draft);
        Ok(())
    }

    /// Replaces the draft with the form's listing and moves to review if it validates.
    /// Otherwise the wizard stays on the form and returns the field errors.
    pub fn next(&mut self, listing: ServiceListing) -> Result<(), WizardError> {
        self.expect_step(WizardStep::ServiceForm)?;
        if let Some(draft) = &self.draft {
            if draft.service_type() != listing.service_type() {
                return Err(WizardError::TypeMismatch {
                    expected: draft.service_type(),
                    found: listing.service_type(),
                });
            }
        }

        let result = validate_form(&listing);
        self.draft = Some(listing);
        match result {
            Ok(()) => {
                self.errors = FieldErrors::new();
                self.step = WizardStep::Review;
                Ok(())
            }
            Err(errors) => {
                self.errors = errors.clone();
                Err(WizardError::Invalid(errors))
            }
        }
    }

    /// [`ListingWizard::next`] with the current draft.
    pub fn advance(&mut self) -> Result<(), WizardError> {
        self.expect_step(WizardStep::ServiceForm)?;
        let listing = self.draft.clone().ok_or(WizardError::WrongStep {
            expected: WizardStep::TypeSelect,
            actual: self.step,
        })?;
        self.next(listing)
    }

    pub fn back(&mut self) -> Result<(), WizardError> {
        self.step = match self.step {
            WizardStep::ServiceForm => WizardStep::TypeSelect,
            WizardStep::Review => WizardStep::ServiceForm,
            actual => {
                return Err(WizardError::WrongStep {
                    expected: WizardStep::ServiceForm,
                    actual,
                })
            }
        };
        self.error = None;
        Ok(())
    }

    /// Uploads the staged images, then creates the listing.
    ///
    /// On failure the wizard stays on review with its draft untouched, so the vendor
    /// can simply submit again.
    pub async fn submit<U, A>(&mut self, uploader: &U, api: &A) -> Result<&CreatedListing, WizardError>
    where
        U: ImageUploader,
        A: ListingApi,
    {
        self.expect_step(WizardStep::Review)?;
        let Some(draft) = self.draft.as_ref() else {
            return Err(WizardError::WrongStep {
                expected: WizardStep::TypeSelect,
                actual: self.step,
            });
        };

        self.submitting = true;
        self.error = None;
        let result = Self::send(draft, uploader, api).await;
        self.submitting = false;

        match result {
            Ok((listing, created)) => {
                #[cfg(feature = "tracing")]
                tracing::info!(id = %created.id, service_type = %listing.service_type(), "Listing created");
                self.draft = Some(listing);
                self.step = WizardStep::Submitted;
                Ok(self.created.insert(created))
            }
            Err(e) => {
                self.error = Some(match &e {
                    WizardError::Upload(upload) => upload.user_message(),
                    WizardError::Api(api) => api.user_message(),
                    other => other.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn send<U, A>(
        draft: &ServiceListing,
        uploader: &U,
        api: &A,
    ) -> Result<(ServiceListing, CreatedListing), WizardError>
    where
        U: ImageUploader,
        A: ListingApi,
    {
        let listing = reconcile_images(draft, uploader).await?;
        let created = api.create_listing(&listing).await?;
        Ok((listing, created))
    }

    /// Starts over for another listing.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}
