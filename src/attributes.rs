// 🏛️ Attribute Registry - field catalogue for every entity
//
// One place records what each field is called on screen, how its value is
// rendered, and which rules it must satisfy. Validation and presentation both
// read from here.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::entities::AccountType;
use crate::format::DisplayFormat;

// ============================================================================
// ATTRIBUTE TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Client,
    BankAccount,
    AccountStatus,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Client => "Client",
            EntityKind::BankAccount => "BankAccount",
            EntityKind::AccountStatus => "AccountStatus",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeType {
    Integer,
    Number,
    Text,
    Date,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ValidationRule {
    /// Value must be present; text must not be blank
    Required,

    /// Text length in characters, inclusive bounds
    StringLength { min: usize, max: usize },

    /// Whole value must match the regular expression
    Pattern {
        regex: String,
        message: Option<String>,
    },
}

// ============================================================================
// ATTRIBUTE DEFINITION
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeDefinition {
    /// Unique ID (e.g., "client.first_name")
    pub id: String,

    /// Field name on the entity (e.g., "first_name")
    pub name: String,

    pub entity: EntityKind,

    /// Restricts a bank account attribute to one account kind
    pub account_type: Option<AccountType>,

    pub type_: AttributeType,

    /// Screen label; may span two lines ("First\nName")
    pub display_name: Option<String>,

    pub display_format: Option<DisplayFormat>,

    pub validation_rules: Vec<ValidationRule>,
}

impl AttributeDefinition {
    pub fn new(entity: EntityKind, name: impl Into<String>, type_: AttributeType) -> Self {
        let name = name.into();
        let prefix = match entity {
            EntityKind::Client => "client",
            EntityKind::BankAccount => "bank_account",
            EntityKind::AccountStatus => "account_status",
        };
        AttributeDefinition {
            id: format!("{}.{}", prefix, name),
            name,
            entity,
            account_type: None,
            type_,
            display_name: None,
            display_format: None,
            validation_rules: Vec::new(),
        }
    }

    /// Builder: screen label
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// Builder: value rendering
    pub fn with_format(mut self, format: DisplayFormat) -> Self {
        self.display_format = Some(format);
        self
    }

    /// Builder: add validation rule
    pub fn with_validation(mut self, rule: ValidationRule) -> Self {
        self.validation_rules.push(rule);
        self
    }

    /// Builder: only applies to one account kind
    pub fn for_account_type(mut self, account_type: AccountType) -> Self {
        self.account_type = Some(account_type);
        self
    }

    pub fn required(self) -> Self {
        self.with_validation(ValidationRule::Required)
    }

    pub fn length(self, min: usize, max: usize) -> Self {
        self.with_validation(ValidationRule::StringLength { min, max })
    }

    pub fn pattern(self, regex: &str, message: Option<&str>) -> Self {
        self.with_validation(ValidationRule::Pattern {
            regex: regex.to_string(),
            message: message.map(str::to_string),
        })
    }

    pub fn is_required(&self) -> bool {
        self.validation_rules.contains(&ValidationRule::Required)
    }

    /// Single-line label used in messages; falls back to the field name.
    pub fn label(&self) -> String {
        match &self.display_name {
            Some(display) => display.replace('\n', " "),
            None => self.name.clone(),
        }
    }
}

// ============================================================================
// ATTRIBUTE REGISTRY
// ============================================================================

/// Catalogue of all entity attributes, kept in registration order.
pub struct AttributeRegistry {
    attributes: Vec<AttributeDefinition>,
    index: HashMap<String, usize>,
}

impl AttributeRegistry {
    /// Create a registry with every entity attribute registered
    pub fn new() -> Self {
        let mut registry = AttributeRegistry {
            attributes: Vec::new(),
            index: HashMap::new(),
        };

        registry.register_account_status_attributes();
        registry.register_client_attributes();
        registry.register_bank_account_attributes();
        registry
    }

    fn register_account_status_attributes(&mut self) {
        use AttributeType::*;
        use EntityKind::AccountStatus as E;

        self.register(AttributeDefinition::new(E, "account_status_id", Integer));
        self.register(
            AttributeDefinition::new(E, "description", Text)
                .with_display_name("Account\nStatus")
                .required(),
        );
    }

    fn register_client_attributes(&mut self) {
        use AttributeType::*;
        use EntityKind::Client as E;

        self.register(AttributeDefinition::new(E, "client_id", Integer));
        self.register(
            AttributeDefinition::new(E, "client_number", Integer)
                .with_display_name("Client")
                .required()
                .pattern("[0-9]{8}", Some("Value must between 10000000-99999999.")),
        );
        self.register(
            AttributeDefinition::new(E, "first_name", Text)
                .with_display_name("First\nName")
                .required()
                .length(1, 35),
        );
        self.register(
            AttributeDefinition::new(E, "last_name", Text)
                .with_display_name("Last\nName")
                .required()
                .length(1, 35),
        );
        self.register(
            AttributeDefinition::new(E, "address", Text)
                .with_display_name("Street Address")
                .required()
                .length(1, 35),
        );
        self.register(
            AttributeDefinition::new(E, "city", Text)
                .required()
                .length(1, 35),
        );
        self.register(
            AttributeDefinition::new(E, "province", Text)
                .required()
                .pattern("[A-Z][A-Z]", Some("Must be 2 uppercase characters.")),
        );
        self.register(
            AttributeDefinition::new(E, "postal_code", Text)
                .with_display_name("Postal\nCode")
                .required()
                .length(0, 7)
                .pattern(
                    "[A-Z][0-9][A-Z] [0-9][A-Z][0-9]",
                    Some("Must be 7 characters like\"A9A 9A9\""),
                ),
        );
        self.register(
            AttributeDefinition::new(E, "date_created", Date)
                .with_display_name("Created\nOn")
                .with_format(DisplayFormat::ShortDate)
                .required(),
        );
        self.register(
            AttributeDefinition::new(E, "notes", Text).with_display_name("Special\nClient Notes"),
        );
        self.register(AttributeDefinition::new(E, "full_name", Text).with_display_name("Name"));
        self.register(
            AttributeDefinition::new(E, "full_address", Text).with_display_name("Address"),
        );
    }

    fn register_bank_account_attributes(&mut self) {
        use AttributeType::*;
        use EntityKind::BankAccount as E;

        self.register(AttributeDefinition::new(E, "bank_account_id", Integer));
        self.register(
            AttributeDefinition::new(E, "account_number", Integer)
                .with_display_name("Account\nNumber")
                .required()
                .pattern("[0-9]+", None),
        );
        self.register(AttributeDefinition::new(E, "client_id", Integer).required());
        self.register(AttributeDefinition::new(E, "account_status_id", Integer).required());
        self.register(
            AttributeDefinition::new(E, "balance", Number)
                .with_display_name("Current\nBalance")
                .with_format(DisplayFormat::Currency)
                .required(),
        );
        self.register(
            AttributeDefinition::new(E, "opening_balance", Number)
                .with_display_name("Opening\nBalance")
                .with_format(DisplayFormat::Currency)
                .required(),
        );
        self.register(
            AttributeDefinition::new(E, "date_created", Date)
                .with_display_name("Created\nOn")
                .with_format(DisplayFormat::ShortDate)
                .required(),
        );
        self.register(
            AttributeDefinition::new(E, "notes", Text).with_display_name("Special\nAccount Notes"),
        );

        // Kind-specific
        self.register(
            AttributeDefinition::new(E, "savings_service_charges", Number)
                .for_account_type(AccountType::Savings)
                .with_display_name("Service\nCharges")
                .with_format(DisplayFormat::Currency)
                .required(),
        );
        self.register(
            AttributeDefinition::new(E, "mortgage_rate", Number)
                .for_account_type(AccountType::Mortgage)
                .with_display_name("Mortgage\nRate")
                .with_format(DisplayFormat::Percent)
                .required(),
        );
        self.register(
            AttributeDefinition::new(E, "amortization", Integer)
                .for_account_type(AccountType::Mortgage),
        );
        self.register(
            AttributeDefinition::new(E, "interest_rate", Number)
                .for_account_type(AccountType::Investment)
                .with_display_name("Interest\nRate")
                .with_format(DisplayFormat::Percent)
                .required(),
        );
        self.register(
            AttributeDefinition::new(E, "chequing_service_charges", Number)
                .for_account_type(AccountType::Chequing)
                .with_display_name("Service\nCharges")
                .with_format(DisplayFormat::Currency)
                .required(),
        );
    }

    /// Register an attribute; a definition with the same id is replaced
    pub fn register(&mut self, attribute: AttributeDefinition) {
        match self.index.get(&attribute.id) {
            Some(&position) => self.attributes[position] = attribute,
            None => {
                self.index.insert(attribute.id.clone(), self.attributes.len());
                self.attributes.push(attribute);
            }
        }
    }

    /// Get attribute definition by ID
    pub fn get(&self, id: &str) -> Option<&AttributeDefinition> {
        self.index.get(id).map(|&position| &self.attributes[position])
    }

    /// Attributes of an entity, in registration order
    pub fn for_entity(&self, entity: EntityKind) -> Vec<&AttributeDefinition> {
        self.attributes.iter().filter(|a| a.entity == entity).collect()
    }

    /// Bank account attributes that apply to one account kind
    pub fn for_account_type(&self, account_type: AccountType) -> Vec<&AttributeDefinition> {
        self.attributes
            .iter()
            .filter(|a| a.entity == EntityKind::BankAccount)
            .filter(|a| a.account_type.map_or(true, |t| t == account_type))
            .collect()
    }

    /// Screen label as registered (may contain a line break)
    pub fn display_name(&self, id: &str) -> Option<&str> {
        self.get(id).and_then(|a| a.display_name.as_deref())
    }

    /// Single-line label
    pub fn display_label(&self, id: &str) -> Option<String> {
        self.get(id).map(|a| a.label())
    }

    pub fn count(&self) -> usize {
        self.attributes.len()
    }
}

impl Default for AttributeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
