//! Property catalog and the caller-facing property tools.
//!
//! Tool payloads are spoken strings rather than structured JSON: the model
//! relays them to the caller more or less verbatim, so they are written the
//! way a leasing agent would say them.

use std::sync::Arc;

use async_trait::async_trait;
use leasing_agent_core::{Tool, ToolError, ToolSchema};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Spoken when the catalog has no listings to offer.
pub const CATALOG_UNAVAILABLE: &str =
    "I'm sorry, I couldn't load property information right now.";

/// One rental listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    /// Short handle callers use ("boulder", "lander")
    pub nickname: String,
    pub city: String,
    pub state: String,
    /// "studio" or a count like "1"
    pub bedrooms: String,
    pub bathrooms: String,
    pub monthly_rent: u32,
    pub utilities_included: bool,
    pub minimum_stay_months: u32,
    pub amenities: Vec<String>,
    /// Spoken pet policy
    pub pets: String,
    pub deposit: Option<u32>,
    pub available_from: String,
    pub available_until: Option<String>,
}

impl Property {
    fn bedroom_phrase(&self) -> String {
        if self.bedrooms == "studio" {
            "studio".to_string()
        } else {
            format!("{} bedroom", self.bedrooms)
        }
    }

    /// One-line spoken summary for catalog listings.
    pub fn summary(&self) -> String {
        format!(
            "{} in {} for ${}/month, available {}",
            self.bedroom_phrase(),
            self.city,
            self.monthly_rent,
            self.available_from
        )
    }

    /// Full spoken description.
    pub fn details(&self) -> String {
        let utilities = if self.utilities_included {
            " with utilities included"
        } else {
            ", utilities not included"
        };
        let deposit = match self.deposit {
            Some(amount) => format!(" The security deposit is ${amount}."),
            None => String::new(),
        };
        format!(
            "The {} is a {} with {} bathroom in {}, {}. It rents for ${} per month{}. \
             Minimum stay is {} months.{} {} Amenities include {}.",
            self.name,
            self.bedroom_phrase(),
            self.bathrooms,
            self.city,
            self.state,
            self.monthly_rent,
            utilities,
            self.minimum_stay_months,
            deposit,
            self.pets,
            self.amenities.join(", ")
        )
    }

    /// Spoken availability window, in the context of a requested stay.
    pub fn availability(&self, move_in: &str, move_out: &str) -> String {
        let until = match &self.available_until {
            Some(date) => format!(" through {date}"),
            None => String::new(),
        };
        format!(
            "For a stay from {} to {}: the {} is available starting {}{}. \
             Minimum stay is {} months.",
            move_in, move_out, self.name, self.available_from, until, self.minimum_stay_months
        )
    }
}

/// In-memory catalog of listings.
#[derive(Debug, Default)]
pub struct PropertyStore {
    properties: Vec<Property>,
}

impl PropertyStore {
    pub fn new(properties: Vec<Property>) -> Self {
        Self { properties }
    }

    /// The two listings the company currently manages.
    pub fn seeded() -> Self {
        Self::new(vec![
            Property {
                name: "Pine Street Condo".to_string(),
                nickname: "boulder".to_string(),
                city: "Boulder".to_string(),
                state: "CO".to_string(),
                bedrooms: "1".to_string(),
                bathrooms: "1".to_string(),
                monthly_rent: 2200,
                utilities_included: true,
                minimum_stay_months: 3,
                amenities: vec![
                    "in-unit laundry".to_string(),
                    "dedicated parking".to_string(),
                    "fast wifi".to_string(),
                    "full kitchen".to_string(),
                ],
                pets: "Pets are allowed with a pet deposit.".to_string(),
                deposit: None,
                available_from: "January 15, 2025".to_string(),
                available_until: None,
            },
            Property {
                name: "Main Street Studio".to_string(),
                nickname: "lander".to_string(),
                city: "Lander".to_string(),
                state: "WY".to_string(),
                bedrooms: "studio".to_string(),
                bathrooms: "1".to_string(),
                monthly_rent: 1200,
                utilities_included: false,
                minimum_stay_months: 1,
                amenities: vec![
                    "mountain views".to_string(),
                    "street parking".to_string(),
                    "wifi".to_string(),
                ],
                pets: "Pets are allowed with a $400 pet deposit.".to_string(),
                deposit: Some(1000),
                available_from: "now".to_string(),
                available_until: None,
            },
        ])
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn all(&self) -> &[Property] {
        &self.properties
    }

    /// Match a caller's free-form description to a listing. Callers say
    /// anything from "the boulder one" to "your studio", so matching is a
    /// cascade from most to least specific.
    pub fn find(&self, query: &str) -> Option<&Property> {
        let q = query.trim().to_lowercase();
        if q.is_empty() {
            return None;
        }

        // nickname exact
        if let Some(p) = self.properties.iter().find(|p| p.nickname == q) {
            return Some(p);
        }
        // city, either direction
        if let Some(p) = self.properties.iter().find(|p| {
            let city = p.city.to_lowercase();
            q.contains(&city) || city.contains(&q)
        }) {
            return Some(p);
        }
        // listing name
        if let Some(p) = self
            .properties
            .iter()
            .find(|p| p.name.to_lowercase().contains(&q))
        {
            return Some(p);
        }
        // bedroom count
        if let Some(p) = self.properties.iter().find(|p| q.contains(&p.bedrooms)) {
            return Some(p);
        }
        // spoken bedroom terms
        if q.contains("studio") {
            return self.properties.iter().find(|p| p.bedrooms == "studio");
        }
        if q.contains("one") {
            return self.properties.iter().find(|p| p.bedrooms == "1");
        }
        None
    }

    fn not_found(&self, query: &str) -> String {
        let places: Vec<String> = self
            .properties
            .iter()
            .map(|p| format!("{}, {}", p.city, p.state))
            .collect();
        format!(
            "I couldn't find a property matching '{}'. We currently have listings in {}.",
            query,
            places.join(" and ")
        )
    }
}

/// `list_available_properties`
pub struct ListPropertiesTool {
    store: Arc<PropertyStore>,
}

impl ListPropertiesTool {
    pub fn new(store: Arc<PropertyStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for ListPropertiesTool {
    fn name(&self) -> &str {
        "list_available_properties"
    }

    fn description(&self) -> &str {
        "List all rental properties currently available, with rent and availability"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new(self.name(), self.description())
    }

    async fn execute(&self, _arguments: Value) -> Result<Value, ToolError> {
        if self.store.is_empty() {
            return Ok(Value::String(CATALOG_UNAVAILABLE.to_string()));
        }
        let summaries: Vec<String> = self.store.all().iter().map(Property::summary).collect();
        Ok(Value::String(format!(
            "We currently have {} properties: {}.",
            self.store.len(),
            summaries.join("; ")
        )))
    }
}

/// `get_property_info`
pub struct PropertyInfoTool {
    store: Arc<PropertyStore>,
}

impl PropertyInfoTool {
    pub fn new(store: Arc<PropertyStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for PropertyInfoTool {
    fn name(&self) -> &str {
        "get_property_info"
    }

    fn description(&self) -> &str {
        "Get full details for one property: rent, deposit, pet policy, amenities, minimum stay"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new(self.name(), self.description()).string_param(
            "property_name",
            "Property the caller is asking about, in their own words",
            true,
        )
    }

    async fn execute(&self, arguments: Value) -> Result<Value, ToolError> {
        if self.store.is_empty() {
            return Ok(Value::String(CATALOG_UNAVAILABLE.to_string()));
        }
        let query = arguments["property_name"].as_str().unwrap_or_default();
        let answer = match self.store.find(query) {
            Some(property) => property.details(),
            None => self.store.not_found(query),
        };
        Ok(Value::String(answer))
    }
}

/// `check_property_availability`
pub struct CheckAvailabilityTool {
    store: Arc<PropertyStore>,
}

impl CheckAvailabilityTool {
    pub fn new(store: Arc<PropertyStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for CheckAvailabilityTool {
    fn name(&self) -> &str {
        "check_property_availability"
    }

    fn description(&self) -> &str {
        "Check whether a property is available for a requested move-in and move-out date"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new(self.name(), self.description())
            .string_param(
                "property_name",
                "Property the caller is asking about, in their own words",
                true,
            )
            .string_param("move_in_date", "Requested move-in date", true)
            .string_param("move_out_date", "Requested move-out date", true)
    }

    async fn execute(&self, arguments: Value) -> Result<Value, ToolError> {
        if self.store.is_empty() {
            return Ok(Value::String(CATALOG_UNAVAILABLE.to_string()));
        }
        let query = arguments["property_name"].as_str().unwrap_or_default();
        let move_in = arguments["move_in_date"].as_str().unwrap_or_default();
        let move_out = arguments["move_out_date"].as_str().unwrap_or_default();
        let answer = match self.store.find(query) {
            Some(property) => property.availability(move_in, move_out),
            None => self.store.not_found(query),
        };
        Ok(Value::String(answer))
    }
}
