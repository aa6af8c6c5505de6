//! Production `CrmApi` implementation over the rate-limited client.
//!
//! Talks the CRM's v1 REST surface: custom fields (contact and opportunity
//! scopes), pipelines with nested stages, paginated contact and opportunity
//! listings, key-based contact search, and the create endpoints.

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use crm_model::{
    ContactPayload, CustomFieldValue, DedupKey, FieldDataType, FieldDefinition,
    OpportunityPayload, SchemaEntity, SourceContact, SourceOpportunity, StageDefinition,
};

use crate::api::CrmApi;
use crate::client::{ApiRequest, RateLimitedClient};
use crate::error::{ApiFailure, Result};

/// Records fetched per page when listing contacts and opportunities.
const PAGE_LIMIT: usize = 100;

/// `CrmApi` over HTTP, bound to one account.
pub struct HttpCrmApi {
    client: RateLimitedClient,
}

impl HttpCrmApi {
    pub fn new(client: RateLimitedClient) -> Self {
        Self { client }
    }

    fn fetch(&self, request: &ApiRequest) -> Result<Value> {
        self.client.execute(request)
    }

    /// Drain a paginated listing: request pages until a short page.
    fn fetch_paginated(&self, path: &str, array_key: &str) -> Result<Vec<Value>> {
        let mut items = Vec::new();
        let mut page = 1usize;
        loop {
            let request = ApiRequest::get(path)
                .with_query("page", page.to_string())
                .with_query("limit", PAGE_LIMIT.to_string());
            let value = self.fetch(&request)?;
            let Some(batch) = value.get(array_key).and_then(Value::as_array) else {
                break;
            };
            if batch.is_empty() {
                break;
            }
            let short_page = batch.len() < PAGE_LIMIT;
            items.extend(batch.iter().cloned());
            debug!(path, page, fetched = batch.len(), "fetched page");
            if short_page {
                break;
            }
            page += 1;
        }
        Ok(items)
    }
}

#[derive(Debug, Deserialize)]
struct WireField {
    id: String,
    name: String,
    #[serde(rename = "dataType", alias = "type", default)]
    data_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WirePipeline {
    id: String,
    name: String,
    #[serde(default)]
    stages: Vec<WireStage>,
}

#[derive(Debug, Deserialize)]
struct WireStage {
    id: String,
    name: String,
    #[serde(default)]
    position: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct WireContact {
    id: String,
    #[serde(rename = "firstName", default)]
    first_name: String,
    #[serde(rename = "lastName", default)]
    last_name: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    phone: Option<String>,
    #[serde(rename = "address1", default)]
    address: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(rename = "postalCode", default)]
    postal_code: Option<String>,
    #[serde(default)]
    country: Option<String>,
    #[serde(rename = "customFields", default)]
    custom_fields: Vec<WireCustomValue>,
}

#[derive(Debug, Deserialize)]
struct WireCustomValue {
    #[serde(rename = "fieldId", alias = "id")]
    field_id: String,
    #[serde(default)]
    value: Value,
}

#[derive(Debug, Deserialize)]
struct WireOpportunity {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(rename = "pipelineId")]
    pipeline_id: String,
    #[serde(rename = "pipelineStageId", alias = "stageId")]
    stage_id: String,
    #[serde(rename = "contactId")]
    contact_id: String,
    #[serde(rename = "monetaryValue", alias = "value", default)]
    value: f64,
    #[serde(default)]
    status: String,
    #[serde(default)]
    notes: Option<String>,
}

impl From<WireContact> for SourceContact {
    fn from(wire: WireContact) -> Self {
        SourceContact {
            id: wire.id,
            first_name: wire.first_name,
            last_name: wire.last_name,
            email: wire.email,
            phone: wire.phone,
            address: wire.address,
            city: wire.city,
            state: wire.state,
            postal_code: wire.postal_code,
            country: wire.country,
            custom_fields: wire
                .custom_fields
                .into_iter()
                .map(|value| CustomFieldValue {
                    field_id: value.field_id,
                    value: value_to_string(&value.value),
                })
                .collect(),
        }
    }
}

impl From<WireOpportunity> for SourceOpportunity {
    fn from(wire: WireOpportunity) -> Self {
        SourceOpportunity {
            id: wire.id,
            name: wire.name,
            pipeline_id: wire.pipeline_id,
            stage_id: wire.stage_id,
            contact_id: wire.contact_id,
            value: wire.value,
            status: wire.status,
            notes: wire.notes,
        }
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn decode<T: serde::de::DeserializeOwned>(value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(ApiFailure::from)
}

fn created_id(value: &Value, envelope: &str) -> Result<String> {
    value
        .get(envelope)
        .and_then(|v| v.get("id"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ApiFailure::Decode(format!("missing {envelope}.id in create response")))
}

impl CrmApi for HttpCrmApi {
    fn list_fields(&self) -> Result<Vec<SchemaEntity>> {
        let mut entities = Vec::new();
        for path in ["/custom-fields", "/custom-fields/opportunity"] {
            let value = self.fetch(&ApiRequest::get(path))?;
            let fields: Vec<WireField> = match value.get("customFields") {
                Some(array) => decode(array.clone())?,
                None => Vec::new(),
            };
            for field in fields {
                let data_type = field
                    .data_type
                    .as_deref()
                    .map_or(FieldDataType::Text, FieldDataType::parse);
                entities.push(SchemaEntity::field(field.id, field.name, data_type));
            }
        }
        info!(count = entities.len(), "fetched custom fields");
        Ok(entities)
    }

    fn list_pipelines(&self) -> Result<Vec<SchemaEntity>> {
        let value = self.fetch(&ApiRequest::get("/pipelines"))?;
        let pipelines: Vec<WirePipeline> = match value.get("pipelines") {
            Some(array) => decode(array.clone())?,
            None => Vec::new(),
        };
        let mut entities = Vec::new();
        for pipeline in pipelines {
            entities.push(SchemaEntity::pipeline(pipeline.id.clone(), pipeline.name));
            for (index, stage) in pipeline.stages.into_iter().enumerate() {
                let position = stage.position.unwrap_or(index as u32);
                entities.push(SchemaEntity::stage(
                    stage.id,
                    stage.name,
                    pipeline.id.clone(),
                    position,
                ));
            }
        }
        info!(count = entities.len(), "fetched pipelines and stages");
        Ok(entities)
    }

    fn list_contacts(&self) -> Result<Vec<SourceContact>> {
        let items = self.fetch_paginated("/contacts", "contacts")?;
        let mut contacts = Vec::with_capacity(items.len());
        for item in items {
            let wire: WireContact = decode(item)?;
            contacts.push(wire.into());
        }
        info!(count = contacts.len(), "fetched contacts");
        Ok(contacts)
    }

    fn list_opportunities(&self) -> Result<Vec<SourceOpportunity>> {
        let items = self.fetch_paginated("/opportunities", "opportunities")?;
        let mut opportunities = Vec::with_capacity(items.len());
        for item in items {
            let wire: WireOpportunity = decode(item)?;
            opportunities.push(wire.into());
        }
        info!(count = opportunities.len(), "fetched opportunities");
        Ok(opportunities)
    }

    fn find_contact_by_key(&self, key: &DedupKey) -> Result<Option<String>> {
        let request = match key {
            DedupKey::Email(email) => {
                ApiRequest::get("/contacts").with_query("email", email.clone())
            }
            DedupKey::Phone(phone) => ApiRequest::get("/contacts")
                .with_query("query", phone.clone())
                .with_query("limit", "10"),
        };
        let value = self.fetch(&request)?;
        let contacts: Vec<WireContact> = match value.get("contacts") {
            Some(array) => decode(array.clone())?,
            None => Vec::new(),
        };
        // The search endpoints match loosely; confirm on the normalized key
        // before trusting a hit.
        for contact in contacts {
            let matches = match key {
                DedupKey::Email(_) => contact
                    .email
                    .as_deref()
                    .and_then(DedupKey::from_email)
                    .is_some_and(|candidate| &candidate == key),
                DedupKey::Phone(_) => contact
                    .phone
                    .as_deref()
                    .and_then(DedupKey::from_phone)
                    .is_some_and(|candidate| &candidate == key),
            };
            if matches {
                return Ok(Some(contact.id));
            }
        }
        Ok(None)
    }

    fn create_contact(&self, payload: &ContactPayload) -> Result<String> {
        let mut body = json!({
            "firstName": payload.first_name,
            "lastName": payload.last_name,
        });
        set_optional(&mut body, "email", payload.email.as_deref());
        set_optional(&mut body, "phone", payload.phone.as_deref());
        set_optional(&mut body, "address1", payload.address.as_deref());
        set_optional(&mut body, "city", payload.city.as_deref());
        set_optional(&mut body, "state", payload.state.as_deref());
        set_optional(&mut body, "postalCode", payload.postal_code.as_deref());
        set_optional(&mut body, "country", payload.country.as_deref());
        if !payload.custom_fields.is_empty() {
            let values: Vec<Value> = payload
                .custom_fields
                .iter()
                .map(|field| json!({ "fieldId": field.field_id, "value": field.value }))
                .collect();
            body["customFields"] = Value::Array(values);
        }
        let value = self.fetch(&ApiRequest::post("/contacts", body))?;
        created_id(&value, "contact")
    }

    fn create_opportunity(&self, payload: &OpportunityPayload) -> Result<String> {
        let body = json!({
            "name": payload.name,
            "pipelineId": payload.pipeline_id,
            "stageId": payload.stage_id,
            "contactId": payload.contact_id,
            "status": payload.status,
            "value": payload.value,
        });
        let value = self.fetch(&ApiRequest::post("/opportunities", body))?;
        created_id(&value, "opportunity")
    }

    fn create_field(&self, definition: &FieldDefinition) -> Result<String> {
        let body = json!({
            "name": definition.name,
            "dataType": serde_json::to_value(&definition.data_type)?,
        });
        let value = self.fetch(&ApiRequest::post("/custom-fields", body))?;
        created_id(&value, "customField")
    }

    fn create_stage(&self, pipeline_id: &str, definition: &StageDefinition) -> Result<String> {
        let body = json!({
            "name": definition.name,
            "position": definition.position,
        });
        let path = format!("/pipelines/{pipeline_id}/stages");
        let value = self.fetch(&ApiRequest::post(path, body))?;
        created_id(&value, "stage")
    }
}

fn set_optional(body: &mut Value, key: &str, value: Option<&str>) {
    if let Some(value) = value
        && !value.is_empty()
    {
        body[key] = Value::String(value.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_contact_decodes_and_converts() {
        let raw = json!({
            "id": "c1",
            "firstName": "Jane",
            "lastName": "Doe",
            "email": "jane@example.com",
            "customFields": [{"fieldId": "f1", "value": "Plumbing"}]
        });
        let wire: WireContact = serde_json::from_value(raw).unwrap();
        let contact: SourceContact = wire.into();
        assert_eq!(contact.id, "c1");
        assert_eq!(contact.custom_fields[0].field_id, "f1");
        assert_eq!(contact.custom_fields[0].value, "Plumbing");
    }

    #[test]
    fn wire_opportunity_accepts_either_stage_key() {
        let raw = json!({
            "id": "o1",
            "name": "Deal",
            "pipelineId": "p1",
            "pipelineStageId": "s1",
            "contactId": "c1",
            "monetaryValue": 1250.0,
            "status": "open"
        });
        let wire: WireOpportunity = serde_json::from_value(raw).unwrap();
        assert_eq!(wire.stage_id, "s1");
        assert!((wire.value - 1250.0).abs() < f64::EPSILON);
    }

    #[test]
    fn created_id_requires_envelope() {
        let ok = json!({"contact": {"id": "m1"}});
        assert_eq!(created_id(&ok, "contact").unwrap(), "m1");
        let missing = json!({"contact": {}});
        assert!(created_id(&missing, "contact").is_err());
    }
}
