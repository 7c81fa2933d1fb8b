//! The tabbed profile editor.
//!
//! Each tab edits one section of [`UserProfile`] in a modal. Saving sends only that
//! section and merges whatever the server answers back into the loaded profile.

use crate::{
    auth::{SessionUser, UserRole},
    client::ApiClient,
    error::ApiError,
    validation::{non_blank, validate_form, FieldErrors},
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use thiserror::Error;
use validator::Validate;

pub mod budget;

use budget::{BudgetAllocation, BudgetBalancer, BudgetError};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TravelPreferences {
    pub preferred_activities: Vec<String>,
    pub preferred_islands: Vec<String>,
    pub travel_style: Option<String>,
    pub trip_frequency: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AccommodationPreferences {
    pub accommodation_types: Vec<String>,
    pub amenities: Vec<String>,
    pub room_preference: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct GroupDetails {
    #[validate(range(min = 1, message = "Group size must be at least 1"))]
    pub group_size: u32,
    pub has_children: bool,
    pub children_ages: Vec<u8>,
    pub accessibility_needs: Vec<String>,
}

impl Default for GroupDetails {
    fn default() -> Self {
        Self {
            group_size: 1,
            has_children: false,
            children_ages: Vec::new(),
            accessibility_needs: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BudgetPreferences {
    pub total_budget: Option<f64>,
    pub currency: Option<String>,
    pub allocation: BudgetAllocation,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FoodPreferences {
    pub dietary_restrictions: Vec<String>,
    pub favorite_cuisines: Vec<String>,
    pub allergies: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileVisibility {
    #[default]
    Public,
    Private,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PrivacySettings {
    pub profile_visibility: ProfileVisibility,
    pub share_itinerary: bool,
    pub marketing_emails: bool,
}

/// The signed-in user's full profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(alias = "_id")]
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub role: UserRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub travel_preferences: Option<TravelPreferences>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accommodation_preferences: Option<AccommodationPreferences>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_details: Option<GroupDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_preferences: Option<BudgetPreferences>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub food_preferences: Option<FoodPreferences>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub privacy_settings: Option<PrivacySettings>,
}

impl UserProfile {
    /// The identity part, for updating the session after a personal-details save.
    pub fn session_user(&self) -> SessionUser {
        SessionUser {
            id: self.id.clone(),
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            role: self.role,
        }
    }

    /// Takes identity fields from `update`, and each section from `update` when it has one.
    fn merge(&mut self, update: UserProfile) {
        self.id = update.id;
        self.email = update.email;
        self.first_name = update.first_name;
        self.last_name = update.last_name;
        self.phone = update.phone.or(self.phone.take());
        self.role = update.role;
        macro_rules! merge_sections {
            ($($field:ident),*) => {
                $(if update.$field.is_some() {
                    self.$field = update.$field;
                })*
            };
        }
        merge_sections!(
            travel_preferences,
            accommodation_preferences,
            group_details,
            budget_preferences,
            food_preferences,
            privacy_settings
        );
    }

    fn apply(&mut self, draft: &SectionDraft) {
        match draft {
            SectionDraft::Personal(personal) => {
                self.first_name = personal.first_name.clone();
                self.last_name = personal.last_name.clone();
                self.email = personal.email.clone();
                self.phone = personal.phone.clone();
            }
            SectionDraft::Travel(travel) => self.travel_preferences = Some(travel.clone()),
            SectionDraft::Accommodation(stay) => {
                self.accommodation_preferences = Some(stay.clone())
            }
            SectionDraft::Group(group) => self.group_details = Some(group.clone()),
            SectionDraft::Budget(budget) => {
                self.budget_preferences = Some(BudgetPreferences {
                    total_budget: budget.total_budget,
                    currency: budget.currency.clone(),
                    allocation: budget.balancer.values(),
                })
            }
            SectionDraft::Food(food) => self.food_preferences = Some(food.clone()),
            SectionDraft::Privacy(privacy) => self.privacy_settings = Some(privacy.clone()),
        }
    }
}

/// The tabs of the profile page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfileSection {
    Personal,
    Travel,
    Accommodation,
    Group,
    Budget,
    Food,
    Privacy,
}

impl ProfileSection {
    pub const ALL: [ProfileSection; 7] = [
        ProfileSection::Personal,
        ProfileSection::Travel,
        ProfileSection::Accommodation,
        ProfileSection::Group,
        ProfileSection::Budget,
        ProfileSection::Food,
        ProfileSection::Privacy,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            ProfileSection::Personal => "Personal Information",
            ProfileSection::Travel => "Travel Preferences",
            ProfileSection::Accommodation => "Accommodation",
            ProfileSection::Group => "Group Details",
            ProfileSection::Budget => "Budget",
            ProfileSection::Food => "Food & Dining",
            ProfileSection::Privacy => "Privacy",
        }
    }
}

/// Editable personal details, saved through `PUT /api/users/me`.
#[derive(Debug, Clone, PartialEq, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PersonalDetails {
    #[validate(custom(function = "non_blank", message = "First name is required"))]
    pub first_name: String,
    #[validate(custom(function = "non_blank", message = "Last name is required"))]
    pub last_name: String,
    #[validate(email(message = "Enter a valid email address"))]
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BudgetDraft {
    pub total_budget: Option<f64>,
    pub currency: Option<String>,
    pub balancer: BudgetBalancer,
}

/// The modal form of one open section.
#[derive(Debug, Clone, PartialEq)]
pub enum SectionDraft {
    Personal(PersonalDetails),
    Travel(TravelPreferences),
    Accommodation(AccommodationPreferences),
    Group(GroupDetails),
    Budget(BudgetDraft),
    Food(FoodPreferences),
    Privacy(PrivacySettings),
}

impl SectionDraft {
    /// Seeds the form from the loaded profile, using defaults for sections never filled in.
    pub fn from_profile(profile: &UserProfile, section: ProfileSection) -> Self {
        match section {
            ProfileSection::Personal => SectionDraft::Personal(PersonalDetails {
                first_name: profile.first_name.clone(),
                last_name: profile.last_name.clone(),
                email: profile.email.clone(),
                phone: profile.phone.clone(),
            }),
            ProfileSection::Travel => {
                SectionDraft::Travel(profile.travel_preferences.clone().unwrap_or_default())
            }
            ProfileSection::Accommodation => SectionDraft::Accommodation(
                profile
                    .accommodation_preferences
                    .clone()
                    .unwrap_or_default(),
            ),
            ProfileSection::Group => {
                SectionDraft::Group(profile.group_details.clone().unwrap_or_default())
            }
            ProfileSection::Budget => {
                let saved = profile.budget_preferences.clone().unwrap_or_default();
                SectionDraft::Budget(BudgetDraft {
                    total_budget: saved.total_budget,
                    currency: saved.currency,
                    balancer: BudgetBalancer::from_allocation(saved.allocation),
                })
            }
            ProfileSection::Food => {
                SectionDraft::Food(profile.food_preferences.clone().unwrap_or_default())
            }
            ProfileSection::Privacy => {
                SectionDraft::Privacy(profile.privacy_settings.clone().unwrap_or_default())
            }
        }
    }

    pub fn section(&self) -> ProfileSection {
        match self {
            SectionDraft::Personal(_) => ProfileSection::Personal,
            SectionDraft::Travel(_) => ProfileSection::Travel,
            SectionDraft::Accommodation(_) => ProfileSection::Accommodation,
            SectionDraft::Group(_) => ProfileSection::Group,
            SectionDraft::Budget(_) => ProfileSection::Budget,
            SectionDraft::Food(_) => ProfileSection::Food,
            SectionDraft::Privacy(_) => ProfileSection::Privacy,
        }
    }

    /// Whether the save button is enabled.
    pub fn can_save(&self) -> bool {
        self.validate().is_ok()
    }

    pub fn validate(&self) -> Result<(), ProfileError> {
        match self {
            SectionDraft::Personal(personal) => validate_form(personal)?,
            SectionDraft::Group(group) => validate_form(group)?,
            SectionDraft::Budget(budget) => {
                budget.balancer.allocation()?;
            }
            SectionDraft::Travel(_)
            | SectionDraft::Accommodation(_)
            | SectionDraft::Food(_)
            | SectionDraft::Privacy(_) => {}
        }
        Ok(())
    }

    fn request(&self) -> Result<SaveRequest<'_>, ProfileError> {
        let update = match self {
            SectionDraft::Personal(personal) => return Ok(SaveRequest::Personal(personal)),
            SectionDraft::Travel(travel) => ProfileUpdate::TravelPreferences(travel.clone()),
            SectionDraft::Accommodation(stay) => {
                ProfileUpdate::AccommodationPreferences(stay.clone())
            }
            SectionDraft::Group(group) => ProfileUpdate::GroupDetails(group.clone()),
            SectionDraft::Budget(budget) => ProfileUpdate::BudgetPreferences(BudgetPreferences {
                total_budget: budget.total_budget,
                currency: budget.currency.clone(),
                allocation: budget.balancer.allocation()?,
            }),
            SectionDraft::Food(food) => ProfileUpdate::FoodPreferences(food.clone()),
            SectionDraft::Privacy(privacy) => ProfileUpdate::PrivacySettings(privacy.clone()),
        };
        Ok(SaveRequest::Section(update))
    }
}

enum SaveRequest<'a> {
    Personal(&'a PersonalDetails),
    Section(ProfileUpdate),
}

/// Body of `PUT /api/users/profile`: exactly one section, keyed by its field name.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ProfileUpdate {
    TravelPreferences(TravelPreferences),
    AccommodationPreferences(AccommodationPreferences),
    GroupDetails(GroupDetails),
    BudgetPreferences(BudgetPreferences),
    FoodPreferences(FoodPreferences),
    PrivacySettings(PrivacySettings),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaicosCredits {
    #[serde(alias = "credits", alias = "caicosCredits", default)]
    pub balance: f64,
}

#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("Profile has not been loaded")]
    NotLoaded,
    #[error("No profile section is open")]
    NoOpenSection,
    #[error("{0}")]
    Invalid(#[from] FieldErrors),
    #[error(transparent)]
    Budget(#[from] BudgetError),
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Profile endpoints.
pub trait ProfileApi {
    fn fetch_profile(&self) -> impl Future<Output = Result<UserProfile, ApiError>>;
    fn update_personal(
        &self,
        details: &PersonalDetails,
    ) -> impl Future<Output = Result<UserProfile, ApiError>>;
    fn update_profile(
        &self,
        update: &ProfileUpdate,
    ) -> impl Future<Output = Result<UserProfile, ApiError>>;
    fn caicos_credits(&self) -> impl Future<Output = Result<CaicosCredits, ApiError>>;
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ProfileResponse {
    User { user: UserProfile },
    Profile { profile: UserProfile },
    Bare(UserProfile),
}

impl From<ProfileResponse> for UserProfile {
    fn from(response: ProfileResponse) -> Self {
        match response {
            ProfileResponse::User { user } => user,
            ProfileResponse::Profile { profile } => profile,
            ProfileResponse::Bare(profile) => profile,
        }
    }
}

impl ProfileApi for ApiClient {
    async fn fetch_profile(&self) -> Result<UserProfile, ApiError> {
        let response: ProfileResponse = self.get("/api/users/profile").await?;
        Ok(response.into())
    }

    async fn update_personal(&self, details: &PersonalDetails) -> Result<UserProfile, ApiError> {
        let response: ProfileResponse = self.put("/api/users/me", details).await?;
        Ok(response.into())
    }

    async fn update_profile(&self, update: &ProfileUpdate) -> Result<UserProfile, ApiError> {
        let response: ProfileResponse = self.put("/api/users/profile", update).await?;
        Ok(response.into())
    }

    async fn caicos_credits(&self) -> Result<CaicosCredits, ApiError> {
        self.get("/api/users/caicos-credits").await
    }
}

/// State of the profile page.
#[derive(Debug)]
pub struct ProfileEditor<A> {
    api: A,
    profile: Option<UserProfile>,
    draft: Option<SectionDraft>,
    saving: bool,
    error: Option<String>,
}

impl<A: ProfileApi> ProfileEditor<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            profile: None,
            draft: None,
            saving: false,
            error: None,
        }
    }

    pub fn profile(&self) -> Option<&UserProfile> {
        self.profile.as_ref()
    }

    pub fn draft(&self) -> Option<&SectionDraft> {
        self.draft.as_ref()
    }

    /// The open modal's form, for editing in place.
    pub fn draft_mut(&mut self) -> Option<&mut SectionDraft> {
        self.draft.as_mut()
    }

    pub fn open_section(&self) -> Option<ProfileSection> {
        self.draft.as_ref().map(SectionDraft::section)
    }

    pub fn is_saving(&self) -> bool {
        self.saving
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub async fn load(&mut self) -> Result<&UserProfile, ProfileError> {
        match self.api.fetch_profile().await {
            Ok(profile) => {
                self.error = None;
                Ok(self.profile.insert(profile))
            }
            Err(e) => {
                self.error = Some(e.user_message());
                Err(e.into())
            }
        }
    }

    /// Opens a section's modal, discarding any other open draft.
    pub fn open(&mut self, section: ProfileSection) -> Result<&mut SectionDraft, ProfileError> {
        let profile = self.profile.as_ref().ok_or(ProfileError::NotLoaded)?;
        self.error = None;
        Ok(self.draft.insert(SectionDraft::from_profile(profile, section)))
    }

    pub fn close(&mut self) {
        self.draft = None;
        self.error = None;
    }

    /// Saves the open section. The modal stays open when validation or the request fails.
    pub async fn save(&mut self) -> Result<&UserProfile, ProfileError> {
        let draft = self.draft.as_ref().ok_or(ProfileError::NoOpenSection)?;
        if self.profile.is_none() {
            return Err(ProfileError::NotLoaded);
        }
        draft.validate()?;
        let request = draft.request()?;

        self.saving = true;
        let result = match request {
            SaveRequest::Personal(personal) => self.api.update_personal(personal).await,
            SaveRequest::Section(update) => self.api.update_profile(&update).await,
        };
        self.saving = false;

        let updated = match result {
            Ok(updated) => updated,
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!("Saving the {:?} section failed: {e}", draft.section());
                self.error = Some(e.user_message());
                return Err(e.into());
            }
        };

        let draft = self.draft.take().ok_or(ProfileError::NoOpenSection)?;
        let profile = self.profile.as_mut().ok_or(ProfileError::NotLoaded)?;
        profile.apply(&draft);
        profile.merge(updated);
        self.error = None;
        Ok(profile)
    }

    pub async fn caicos_credits(&self) -> Result<CaicosCredits, ApiError> {
        self.api.caicos_credits().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::budget::BudgetCategory;
    use assert_matches::assert_matches;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn profile() -> UserProfile {
        serde_json::from_value(serde_json::json!({
            "_id": "u-42",
            "email": "marla@example.com",
            "firstName": "Marla",
            "lastName": "Gibbs",
            "role": "traveler",
            "travelPreferences": {"preferredActivities": ["snorkeling"]}
        }))
        .unwrap()
    }

    #[derive(Default)]
    struct FakeProfileApi {
        personal: Mutex<Vec<PersonalDetails>>,
        updates: Mutex<Vec<serde_json::Value>>,
        fail: std::sync::atomic::AtomicBool,
    }

    impl ProfileApi for Arc<FakeProfileApi> {
        async fn fetch_profile(&self) -> Result<UserProfile, ApiError> {
            Ok(profile())
        }

        async fn update_personal(&self, details: &PersonalDetails) -> Result<UserProfile, ApiError> {
            self.personal.lock().push(details.clone());
            let mut updated = profile();
            updated.first_name = details.first_name.clone();
            updated.last_name = details.last_name.clone();
            updated.email = details.email.clone();
            Ok(updated)
        }

        async fn update_profile(&self, update: &ProfileUpdate) -> Result<UserProfile, ApiError> {
            if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
                return Err(ApiError::from_response_body(
                    500,
                    r#"{"message":"Could not save preferences"}"#,
                ));
            }
            self.updates.lock().push(serde_json::to_value(update).unwrap());
            // The server echoes the profile without the preference bags.
            let mut updated = profile();
            updated.travel_preferences = None;
            Ok(updated)
        }

        async fn caicos_credits(&self) -> Result<CaicosCredits, ApiError> {
            Ok(CaicosCredits { balance: 125.0 })
        }
    }

    async fn loaded() -> (ProfileEditor<Arc<FakeProfileApi>>, Arc<FakeProfileApi>) {
        let api = Arc::new(FakeProfileApi::default());
        let mut editor = ProfileEditor::new(api.clone());
        editor.load().await.unwrap();
        (editor, api)
    }

    #[test]
    fn open_requires_a_loaded_profile() {
        let mut editor = ProfileEditor::new(Arc::new(FakeProfileApi::default()));
        assert_matches!(editor.open(ProfileSection::Travel), Err(ProfileError::NotLoaded));
    }

    #[tokio::test]
    async fn personal_details_are_validated() {
        let (mut editor, api) = loaded().await;
        let Ok(SectionDraft::Personal(personal)) = editor.open(ProfileSection::Personal) else {
            panic!("expected the personal form");
        };
        personal.first_name = " ".to_string();
        personal.email = "not-an-email".to_string();

        let Err(ProfileError::Invalid(errors)) = editor.save().await else {
            panic!("expected validation errors");
        };
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().any(|(_, message)| message == "First name is required"));
        assert_eq!(errors.get("email"), Some("Enter a valid email address"));
        assert!(api.personal.lock().is_empty());
        assert_eq!(editor.open_section(), Some(ProfileSection::Personal));
    }

    #[tokio::test]
    async fn saving_personal_details_uses_the_me_endpoint() {
        let (mut editor, api) = loaded().await;
        if let Ok(SectionDraft::Personal(personal)) = editor.open(ProfileSection::Personal) {
            personal.first_name = "Marlene".to_string();
        }
        let saved = editor.save().await.unwrap();
        assert_eq!(saved.first_name, "Marlene");
        assert_eq!(saved.session_user().display_name(), "Marlene Gibbs");
        assert_eq!(api.personal.lock().len(), 1);
        assert!(api.updates.lock().is_empty());
        assert_eq!(editor.open_section(), None);
    }

    #[tokio::test]
    async fn sections_are_sent_alone_and_kept_after_merge() {
        let (mut editor, api) = loaded().await;
        if let Ok(SectionDraft::Food(food)) = editor.open(ProfileSection::Food) {
            food.dietary_restrictions.push("vegetarian".to_string());
        }
        let saved = editor.save().await.unwrap().clone();

        assert_eq!(
            api.updates.lock()[0],
            serde_json::json!({"foodPreferences": {
                "dietaryRestrictions": ["vegetarian"],
                "favoriteCuisines": [],
                "allergies": []
            }})
        );
        assert_eq!(
            saved.food_preferences.unwrap().dietary_restrictions,
            vec!["vegetarian".to_string()]
        );
        // Sections the server left out are kept.
        assert_eq!(
            saved.travel_preferences.unwrap().preferred_activities,
            vec!["snorkeling".to_string()]
        );
    }

    #[tokio::test]
    async fn unbalanced_budget_cannot_be_saved() {
        let (mut editor, api) = loaded().await;
        if let Ok(SectionDraft::Budget(budget)) = editor.open(ProfileSection::Budget) {
            budget.balancer.set(BudgetCategory::Accommodation, 60);
        }
        assert!(!editor.draft().unwrap().can_save());
        assert_matches!(
            editor.save().await,
            Err(ProfileError::Budget(BudgetError::Unbalanced(60)))
        );

        if let Some(SectionDraft::Budget(budget)) = editor.draft_mut() {
            budget.balancer.auto_distribute();
        }
        let saved = editor.save().await.unwrap();
        assert_eq!(saved.budget_preferences.as_ref().unwrap().allocation.total(), 100);
        assert_eq!(api.updates.lock().len(), 1);
    }

    #[tokio::test]
    async fn failed_save_keeps_the_modal_open() {
        let (mut editor, api) = loaded().await;
        api.fail.store(true, std::sync::atomic::Ordering::SeqCst);
        editor.open(ProfileSection::Privacy).unwrap();
        assert_matches!(editor.save().await, Err(ProfileError::Api(_)));
        assert_eq!(editor.error(), Some("Could not save preferences"));
        assert_eq!(editor.open_section(), Some(ProfileSection::Privacy));
        assert!(!editor.is_saving());
    }

    #[tokio::test]
    async fn credits_come_from_the_api() {
        let (editor, _) = loaded().await;
        assert_eq!(editor.caicos_credits().await.unwrap().balance, 125.0);
    }
}
