//! Lead capture tool and sinks.

use async_trait::async_trait;
use leasing_agent_core::{Error, LeadRecord, LeadSink, Tool, ToolError, ToolSchema};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tracing::info;

/// `save_lead`. The payload carries the structured lead under `"lead"` so
/// the session can merge it into its [`LeadRecord`], plus a spoken
/// confirmation for the model to relay.
pub struct SaveLeadTool;

#[async_trait]
impl Tool for SaveLeadTool {
    fn name(&self) -> &str {
        "save_lead"
    }

    fn description(&self) -> &str {
        "Save the caller's contact information so the team can follow up"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new(self.name(), self.description())
            .string_param("name", "Caller's full name", false)
            .string_param("email", "Caller's email address", false)
            .string_param("phone", "Caller's phone number", false)
            .string_param(
                "property_interest",
                "Property the caller is interested in",
                false,
            )
            .string_param("notes", "Anything else worth passing to the team", false)
    }

    // Callers volunteer contact details piecemeal across turns, so any
    // non-empty subset of fields is a valid capture. The session merges
    // each payload into the record it already holds.
    async fn execute(&self, arguments: Value) -> Result<Value, ToolError> {
        let field = |key: &str| {
            arguments[key]
                .as_str()
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        let name = field("name");
        let email = field("email");
        let phone = field("phone");
        let property_interest = field("property_interest");
        let notes = field("notes");

        if name.is_none()
            && email.is_none()
            && phone.is_none()
            && property_interest.is_none()
            && notes.is_none()
        {
            return Err(ToolError::InvalidArguments(
                "save_lead needs at least one field".to_string(),
            ));
        }

        info!(name = ?name, email = ?email, "lead captured");

        let confirmation = match email {
            Some(email) => format!(
                "I've saved your information. Someone from our team will reach out to {email} \
                 within 24 hours to follow up."
            ),
            None => "I've saved your information for follow-up.".to_string(),
        };

        Ok(json!({
            "saved": true,
            "lead": {
                "name": name,
                "email": email,
                "phone": phone,
                "property_interest": property_interest,
                "notes": notes,
            },
            "confirmation": confirmation,
        }))
    }
}

/// Lead sink that keeps records in memory. Stands in for a CRM integration
/// and backs the integration tests.
#[derive(Default)]
pub struct InMemoryLeadSink {
    leads: Mutex<Vec<LeadRecord>>,
}

impl InMemoryLeadSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.leads.lock().len()
    }

    pub fn all(&self) -> Vec<LeadRecord> {
        self.leads.lock().clone()
    }
}

#[async_trait]
impl LeadSink for InMemoryLeadSink {
    async fn store(&self, lead: &LeadRecord) -> Result<(), Error> {
        self.leads.lock().push(lead.clone());
        Ok(())
    }
}
