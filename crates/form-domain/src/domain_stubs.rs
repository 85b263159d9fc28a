use crate::config::FormConfig;
use crate::errors::ConfigError;
use serde_json::json;

/// Configuraciones de ejemplo (ciudad, distrito, reunión) para demos y
/// pruebas.
pub struct DomainStubs;

impl DomainStubs {
    /// Ciudad: `basic` -> `geographic` -> `review`. El distrito puede crearse
    /// desde el propio formulario y depende del país (jerarquía).
    pub fn city_config() -> Result<FormConfig, ConfigError> {
        FormConfig::from_value(json!({
            "entity": "city",
            "steps": [
                { "id": "basic", "title": "Datos básicos",
                  "fields": ["name", "population", "isCapital"] },
                { "id": "geographic", "title": "Ubicación",
                  "fields": ["foundedOn"],
                  "relationships": ["country", "district"] },
                { "id": "review", "title": "Revisión" }
            ],
            "fields": {
                "name": { "type": "text", "label": "Nombre", "required": true, "maxLength": 120 },
                "population": { "type": "number", "label": "Población", "min": 0, "integer": true },
                "isCapital": { "type": "boolean", "label": "Capital", "default": false },
                "foundedOn": { "type": "date", "label": "Fundación", "max": "2100-01-01" }
            },
            "relationships": {
                "country": { "label": "País", "targetEntity": "country" },
                "district": { "label": "Distrito", "targetEntity": "district", "allowInlineCreate": true }
            },
            "behavior": {
                "persistence": { "storagePrefix": "crm_form_", "sessionTimeoutMinutes": 60, "maxDrafts": 3 },
                "hierarchy": ["country", "district"]
            }
        }))
    }

    /// Distrito: formulario mínimo que se abre desde la ciudad.
    pub fn district_config() -> Result<FormConfig, ConfigError> {
        FormConfig::from_value(json!({
            "entity": "district",
            "steps": [
                { "id": "basic", "title": "Datos básicos", "fields": ["name", "code"] },
                { "id": "review", "title": "Revisión" }
            ],
            "fields": {
                "name": { "type": "text", "label": "Nombre", "required": true },
                "code": { "type": "text", "label": "Código", "pattern": "^[A-Z]{2,4}$" }
            },
            "behavior": {
                "persistence": { "storagePrefix": "crm_form_" }
            }
        }))
    }

    /// Reunión: relación múltiple con participantes y validación al cambiar.
    pub fn meeting_config() -> Result<FormConfig, ConfigError> {
        FormConfig::from_value(json!({
            "entity": "meeting",
            "steps": [
                { "id": "details", "title": "Detalles",
                  "fields": ["subject", "contactEmail", "status"],
                  "validation": { "mode": "onChange", "validateOnNext": true } },
                { "id": "people", "title": "Participantes",
                  "relationships": ["participants"],
                  "validation": { "mode": "onBlur", "validateOnNext": false } },
                { "id": "review", "title": "Revisión" }
            ],
            "fields": {
                "subject": { "type": "text", "label": "Asunto", "required": true, "minLength": 3 },
                "contactEmail": { "type": "text", "format": "email", "label": "Email de contacto" },
                "status": { "type": "select", "label": "Estado", "options": ["planned", "held", "cancelled"],
                            "default": "planned" }
            },
            "relationships": {
                "participants": { "label": "Participantes", "targetEntity": "party",
                                  "cardinality": "multiple", "required": true, "allowInlineCreate": true }
            },
            "behavior": {
                "navigation": { "allowStepSkipping": false },
                "autosave": { "debounceMs": 500 }
            }
        }))
    }
}
