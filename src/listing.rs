//! Vendor listings and the wizard that creates them.
//!
//! A [`ServiceListing`] is one of six typed schemas sharing [`ListingBasics`]. Photos are
//! picked as [`LocalImage`]s and only uploaded when the wizard submits, see
//! [`reconcile_images`].

use crate::{client::ApiClient, error::ApiError};
use serde::{Deserialize, Serialize};
use std::{fmt, future::Future};
use validator::{Validate, ValidationErrors};

mod image;
mod schema;
mod upload;
mod wizard;

pub use image::{Image, ImageSource, LocalImage};
pub use schema::*;
pub use upload::{reconcile_images, ImageUploader, UploadError};
pub use wizard::{ListingWizard, WizardError, WizardStep};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ServiceType {
    Activity,
    Dining,
    Shopping,
    Stay,
    Transportation,
    WellnessSpa,
}

impl ServiceType {
    pub const ALL: [ServiceType; 6] = [
        ServiceType::Activity,
        ServiceType::Dining,
        ServiceType::Shopping,
        ServiceType::Stay,
        ServiceType::Transportation,
        ServiceType::WellnessSpa,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ServiceType::Activity => "Activity",
            ServiceType::Dining => "Dining",
            ServiceType::Shopping => "Shopping",
            ServiceType::Stay => "Stay",
            ServiceType::Transportation => "Transportation",
            ServiceType::WellnessSpa => "Wellness & Spa",
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A listing as sent to `POST /api/services`, tagged by `serviceType`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "serviceType", rename_all = "camelCase")]
pub enum ServiceListing {
    Activity(ActivityListing),
    Dining(DiningListing),
    Shopping(ShoppingListing),
    Stay(StayListing),
    Transportation(TransportationListing),
    WellnessSpa(WellnessSpaListing),
}

/// Collects every image of a listing, in a fixed order: the listing's own images first,
/// then each sub-entity's in list order.
macro_rules! walk_images {
    ($listing:expr, $iter:ident) => {{
        let mut images = Vec::new();
        match $listing {
            ServiceListing::Activity(listing) => {
                images.extend(listing.basics.images.$iter());
                for option in listing.options.$iter() {
                    images.extend(option.images.$iter());
                }
            }
            ServiceListing::Dining(listing) => {
                images.extend(listing.basics.images.$iter());
                for section in listing.menu.$iter() {
                    for item in section.items.$iter() {
                        images.extend(item.images.$iter());
                    }
                }
            }
            ServiceListing::Shopping(listing) => {
                images.extend(listing.basics.images.$iter());
                for product in listing.products.$iter() {
                    images.extend(product.images.$iter());
                }
            }
            ServiceListing::Stay(listing) => {
                images.extend(listing.basics.images.$iter());
                for room in listing.rooms.$iter() {
                    images.extend(room.images.$iter());
                }
            }
            ServiceListing::Transportation(listing) => {
                images.extend(listing.basics.images.$iter());
                for vehicle in listing.vehicles.$iter() {
                    images.extend(vehicle.images.$iter());
                }
            }
            ServiceListing::WellnessSpa(listing) => {
                images.extend(listing.basics.images.$iter());
                for service in listing.services.$iter() {
                    images.extend(service.images.$iter());
                }
            }
        }
        images
    }};
}

impl ServiceListing {
    /// An empty form for the given type.
    pub fn new(service_type: ServiceType) -> Self {
        match service_type {
            ServiceType::Activity => ServiceListing::Activity(Default::default()),
            ServiceType::Dining => ServiceListing::Dining(Default::default()),
            ServiceType::Shopping => ServiceListing::Shopping(Default::default()),
            ServiceType::Stay => ServiceListing::Stay(Default::default()),
            ServiceType::Transportation => ServiceListing::Transportation(Default::default()),
            ServiceType::WellnessSpa => ServiceListing::WellnessSpa(Default::default()),
        }
    }

    pub fn service_type(&self) -> ServiceType {
        match self {
            ServiceListing::Activity(_) => ServiceType::Activity,
            ServiceListing::Dining(_) => ServiceType::Dining,
            ServiceListing::Shopping(_) => ServiceType::Shopping,
            ServiceListing::Stay(_) => ServiceType::Stay,
            ServiceListing::Transportation(_) => ServiceType::Transportation,
            ServiceListing::WellnessSpa(_) => ServiceType::WellnessSpa,
        }
    }

    pub fn basics(&self) -> &ListingBasics {
        match self {
            ServiceListing::Activity(listing) => &listing.basics,
            ServiceListing::Dining(listing) => &listing.basics,
            ServiceListing::Shopping(listing) => &listing.basics,
            ServiceListing::Stay(listing) => &listing.basics,
            ServiceListing::Transportation(listing) => &listing.basics,
            ServiceListing::WellnessSpa(listing) => &listing.basics,
        }
    }

    pub fn basics_mut(&mut self) -> &mut ListingBasics {
        match self {
            ServiceListing::Activity(listing) => &mut listing.basics,
            ServiceListing::Dining(listing) => &mut listing.basics,
            ServiceListing::Shopping(listing) => &mut listing.basics,
            ServiceListing::Stay(listing) => &mut listing.basics,
            ServiceListing::Transportation(listing) => &mut listing.basics,
            ServiceListing::WellnessSpa(listing) => &mut listing.basics,
        }
    }

    pub fn images(&self) -> Vec<&Image> {
        walk_images!(self, iter)
    }

    pub fn images_mut(&mut self) -> Vec<&mut Image> {
        walk_images!(self, iter_mut)
    }

    /// Images still waiting to be uploaded.
    pub fn local_image_count(&self) -> usize {
        self.images().iter().filter(|image| image.is_local()).count()
    }
}

impl Validate for ServiceListing {
    fn validate(&self) -> Result<(), ValidationErrors> {
        match self {
            ServiceListing::Activity(listing) => listing.validate(),
            ServiceListing::Dining(listing) => listing.validate(),
            ServiceListing::Shopping(listing) => listing.validate(),
            ServiceListing::Stay(listing) => listing.validate(),
            ServiceListing::Transportation(listing) => listing.validate(),
            ServiceListing::WellnessSpa(listing) => listing.validate(),
        }
    }
}

/// What the server answers after creating a listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreatedListing {
    #[serde(alias = "_id")]
    pub id: String,
}

/// Listing endpoints.
pub trait ListingApi {
    fn create_listing(
        &self,
        listing: &ServiceListing,
    ) -> impl Future<Output = Result<CreatedListing, ApiError>>;
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CreatedResponse {
    Service { service: CreatedListing },
    Bare(CreatedListing),
}

impl ListingApi for ApiClient {
    async fn create_listing(&self, listing: &ServiceListing) -> Result<CreatedListing, ApiError> {
        let response: CreatedResponse = self.post("/api/services", listing).await?;
        Ok(match response {
            CreatedResponse::Service { service } => service,
            CreatedResponse::Bare(created) => created,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::validation::validate_form;

    pub(crate) fn basics(name: &str) -> ListingBasics {
        ListingBasics {
            name: name.to_string(),
            description: "Glass-bottom boat over the reef".to_string(),
            location: "Grace Bay".to_string(),
            island: "Providenciales".to_string(),
            contact_phone: None,
            contact_email: Some("tours@example.com".to_string()),
            images: Vec::new(),
        }
    }

    pub(crate) fn option(title: &str) -> ActivityOption {
        ActivityOption {
            title: title.to_string(),
            description: String::new(),
            price: 85.0,
            duration_minutes: 120,
            max_participants: 12,
            images: Vec::new(),
        }
    }

    pub(crate) fn activity() -> ServiceListing {
        ServiceListing::Activity(ActivityListing {
            basics: basics("Reef Explorer"),
            category: "water".to_string(),
            options: vec![option("Morning trip"), option("Sunset trip")],
            schedule: vec![AvailabilitySlot {
                day: "monday".to_string(),
                start_time: "09:00".to_string(),
                end_time: "11:00".to_string(),
                capacity: 12,
            }],
            included: vec!["Snorkel gear".to_string()],
        })
    }

    #[test]
    fn valid_activity_passes() {
        assert_eq!(validate_form(&activity()), Ok(()));
    }

    #[test]
    fn each_blank_basic_field_is_reported() {
        for field in ["name", "description", "location", "island"] {
            let mut listing = activity();
            let basics = listing.basics_mut();
            match field {
                "name" => basics.name.clear(),
                "description" => basics.description = "   ".to_string(),
                "location" => basics.location.clear(),
                _ => basics.island.clear(),
            }
            let errors = validate_form(&listing).unwrap_err();
            assert!(errors.contains(field), "missing error for {field}: {errors}");
            assert_eq!(errors.len(), 1);
        }
    }

    #[test]
    fn nested_minimums_use_indexed_keys() {
        let mut listing = activity();
        if let ServiceListing::Activity(activity) = &mut listing {
            activity.options[1].price = -5.0;
            activity.options[1].title.clear();
        }
        let errors = validate_form(&listing).unwrap_err();
        assert_eq!(errors.get("options.1.price"), Some("Price cannot be negative"));
        assert_eq!(errors.get("options.1.title"), Some("Title is required"));
    }

    #[test]
    fn required_collections_must_not_be_empty() {
        let mut listing = ServiceListing::new(ServiceType::Dining);
        *listing.basics_mut() = basics("Conch Shack");
        let errors = validate_form(&listing).unwrap_err();
        assert_eq!(errors.get("menu"), Some("Add at least one menu item"));

        let mut listing = ServiceListing::new(ServiceType::Transportation);
        *listing.basics_mut() = basics("Island Taxi");
        let errors = validate_form(&listing).unwrap_err();
        assert!(errors.contains("vehicles"));
    }

    #[test]
    fn empty_menu_with_a_blank_section_reports_both() {
        let mut listing = ServiceListing::new(ServiceType::Dining);
        *listing.basics_mut() = basics("Conch Shack");
        if let ServiceListing::Dining(dining) = &mut listing {
            dining.menu = vec![MenuSection {
                title: String::new(),
                items: Vec::new(),
            }];
        }
        let errors = validate_form(&listing).unwrap_err();
        assert_eq!(errors.get("menu"), Some("Add at least one menu item"));
        assert_eq!(errors.get("menu.0.title"), Some("Section title is required"));

        let mut wizard = ListingWizard::new();
        wizard.select_type(ServiceType::Dining).unwrap();
        assert!(matches!(wizard.next(listing), Err(WizardError::Invalid(_))));
        assert_eq!(wizard.step(), WizardStep::ServiceForm);
    }

    #[test]
    fn wire_shape_is_tagged_and_flat() {
        let json = serde_json::to_value(activity()).unwrap();
        assert_eq!(json["serviceType"], "activity");
        assert_eq!(json["name"], "Reef Explorer");
        assert_eq!(json["options"][0]["durationMinutes"], 120);

        let spa = serde_json::to_value(ServiceListing::new(ServiceType::WellnessSpa)).unwrap();
        assert_eq!(spa["serviceType"], "wellnessSpa");

        let back: ServiceListing = serde_json::from_value(json).unwrap();
        assert_eq!(back, activity());
    }

    #[test]
    fn images_are_walked_in_order() {
        let mut listing = activity();
        if let ServiceListing::Activity(activity) = &mut listing {
            activity.basics.images = vec![Image::remote("a"), Image::remote("b")];
            activity.options[0].images = vec![Image::remote("c")];
            activity.options[1].images = vec![Image::remote("d"), Image::remote("e")];
        }
        let urls: Vec<_> = listing.images().iter().filter_map(|i| i.url()).collect();
        assert_eq!(urls, ["a", "b", "c", "d", "e"]);

        for image in listing.images_mut() {
            image.is_main = true;
        }
        assert!(listing.images().iter().all(|image| image.is_main));
    }
}
