// 📐 Shape Layer - Entity Validation
// Checks entities against the rules in the attribute registry

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::attributes::{AttributeDefinition, AttributeRegistry, EntityKind, ValidationRule};
use crate::entities::{AccountKind, AccountStatus, BankAccount, Client};
use crate::error::BankResult;

// ============================================================================
// VALIDATION RESULT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
    pub context: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.context, self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// A field value as seen by the rules.
#[derive(Debug, Clone, Copy)]
enum FieldValue<'a> {
    Integer(i64),
    Number(f64),
    Text(Option<&'a str>),
    Date(NaiveDate),
}

impl FieldValue<'_> {
    fn is_missing(&self) -> bool {
        match self {
            FieldValue::Text(None) => true,
            FieldValue::Text(Some(s)) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Text form the rules match against; None when there is nothing to check.
    fn as_text(&self) -> Option<String> {
        match self {
            FieldValue::Integer(v) => Some(v.to_string()),
            FieldValue::Number(v) => Some(v.to_string()),
            FieldValue::Text(Some(s)) if !s.is_empty() => Some(s.to_string()),
            FieldValue::Text(_) => None,
            FieldValue::Date(d) => Some(d.to_string()),
        }
    }
}

// ============================================================================
// VALIDATOR
// ============================================================================

pub struct Validator {
    registry: AttributeRegistry,
    patterns: HashMap<String, Regex>,
}

impl Validator {
    /// Validator over the built-in attribute registry
    pub fn new() -> BankResult<Self> {
        Self::with_registry(AttributeRegistry::new())
    }

    /// Compile every pattern rule up front; an invalid pattern is an error here
    pub fn with_registry(registry: AttributeRegistry) -> BankResult<Self> {
        let mut patterns = HashMap::new();

        for entity in [EntityKind::Client, EntityKind::BankAccount, EntityKind::AccountStatus] {
            for attr in registry.for_entity(entity) {
                for rule in &attr.validation_rules {
                    if let ValidationRule::Pattern { regex, .. } = rule {
                        if !patterns.contains_key(regex) {
                            let compiled = Regex::new(&format!("^(?:{})$", regex))?;
                            patterns.insert(regex.clone(), compiled);
                        }
                    }
                }
            }
        }

        Ok(Validator { registry, patterns })
    }

    pub fn registry(&self) -> &AttributeRegistry {
        &self.registry
    }

    pub fn validate_client(&self, client: &Client) -> ValidationResult {
        let values: HashMap<&str, FieldValue> = [
            ("client_number", FieldValue::Integer(client.client_number)),
            ("first_name", FieldValue::Text(Some(&client.first_name))),
            ("last_name", FieldValue::Text(Some(&client.last_name))),
            ("address", FieldValue::Text(Some(&client.address))),
            ("city", FieldValue::Text(Some(&client.city))),
            ("province", FieldValue::Text(Some(&client.province))),
            ("postal_code", FieldValue::Text(Some(&client.postal_code))),
            ("date_created", FieldValue::Date(client.date_created)),
            ("notes", FieldValue::Text(client.notes.as_deref())),
        ]
        .into_iter()
        .collect();

        self.check(self.registry.for_entity(EntityKind::Client), &values, "Client")
    }

    pub fn validate_bank_account(&self, account: &BankAccount) -> ValidationResult {
        let mut values: HashMap<&str, FieldValue> = [
            ("account_number", FieldValue::Integer(account.account_number)),
            ("client_id", FieldValue::Integer(account.client_id)),
            ("account_status_id", FieldValue::Integer(account.account_status_id)),
            ("balance", FieldValue::Number(account.balance)),
            ("opening_balance", FieldValue::Number(account.opening_balance)),
            ("date_created", FieldValue::Date(account.date_created)),
            ("notes", FieldValue::Text(account.notes.as_deref())),
        ]
        .into_iter()
        .collect();

        match &account.kind {
            AccountKind::Savings { savings_service_charges } => {
                values.insert("savings_service_charges", FieldValue::Number(*savings_service_charges));
            }
            AccountKind::Mortgage { mortgage_rate, amortization } => {
                values.insert("mortgage_rate", FieldValue::Number(*mortgage_rate));
                if let Some(months) = amortization {
                    values.insert("amortization", FieldValue::Integer(i64::from(*months)));
                }
            }
            AccountKind::Investment { interest_rate } => {
                values.insert("interest_rate", FieldValue::Number(*interest_rate));
            }
            AccountKind::Chequing { chequing_service_charges } => {
                values.insert("chequing_service_charges", FieldValue::Number(*chequing_service_charges));
            }
        }

        let context = account.account_type().discriminator();
        let attributes = self.registry.for_account_type(account.account_type());

        // Amounts and rates must be real numbers
        let non_finite: Vec<ValidationError> = attributes
            .iter()
            .filter_map(|attr| match values.get(attr.name.as_str()) {
                Some(FieldValue::Number(v)) if !v.is_finite() => Some(ValidationError {
                    field: attr.name.clone(),
                    message: format!("The field {} must be a finite number.", attr.label()),
                    context: context.to_string(),
                }),
                _ => None,
            })
            .collect();

        let mut result = self.check(attributes, &values, context);

        if !non_finite.is_empty() {
            let mut errors = result.err().unwrap_or_default();
            errors.extend(non_finite);
            result = Err(errors);
        }

        result
    }

    pub fn validate_account_status(&self, status: &AccountStatus) -> ValidationResult {
        let values: HashMap<&str, FieldValue> =
            [("description", FieldValue::Text(Some(&status.description)))]
                .into_iter()
                .collect();

        self.check(
            self.registry.for_entity(EntityKind::AccountStatus),
            &values,
            "AccountStatus",
        )
    }

    /// Evaluate every attribute that has a value. A field that fails
    /// Required is not checked further.
    fn check(
        &self,
        attributes: Vec<&AttributeDefinition>,
        values: &HashMap<&str, FieldValue>,
        context: &str,
    ) -> ValidationResult {
        let mut errors = Vec::new();

        for attr in attributes {
            let Some(value) = values.get(attr.name.as_str()) else {
                continue;
            };

            for rule in &attr.validation_rules {
                if let Some(message) = self.apply_rule(attr, rule, value) {
                    let stop = matches!(rule, ValidationRule::Required);
                    errors.push(ValidationError {
                        field: attr.name.clone(),
                        message,
                        context: context.to_string(),
                    });
                    if stop {
                        break;
                    }
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Returns the failure message, or None when the rule holds.
    fn apply_rule(
        &self,
        attr: &AttributeDefinition,
        rule: &ValidationRule,
        value: &FieldValue,
    ) -> Option<String> {
        match rule {
            ValidationRule::Required => value
                .is_missing()
                .then(|| format!("The {} field is required.", attr.label())),

            ValidationRule::StringLength { min, max } => {
                let FieldValue::Text(Some(text)) = value else {
                    return None;
                };
                let len = text.chars().count();
                if len >= *min && len <= *max {
                    None
                } else if *min == 0 {
                    Some(format!(
                        "The field {} must be a string with a maximum length of {}.",
                        attr.label(),
                        max
                    ))
                } else {
                    Some(format!(
                        "The field {} must be a string with a minimum length of {} and a maximum length of {}.",
                        attr.label(),
                        min,
                        max
                    ))
                }
            }

            ValidationRule::Pattern { regex, message } => {
                let text = value.as_text()?;
                let compiled = self.patterns.get(regex)?;
                if compiled.is_match(&text) {
                    None
                } else {
                    Some(message.clone().unwrap_or_else(|| {
                        format!(
                            "The field {} must match the regular expression '{}'.",
                            attr.label(),
                            regex
                        )
                    }))
                }
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{AccountStatus, StatusKind};

    fn valid_client() -> Client {
        let mut client = Client::new("Grace", "Hopper", "1 Compiler Rd", "Waterloo", "ON", "N2L 3G1");
        client.client_number = 10_000_001;
        client
    }

    fn fields(errors: &[ValidationError]) -> Vec<&str> {
        errors.iter().map(|e| e.field.as_str()).collect()
    }

    #[test]
    fn test_valid_client_passes() {
        let validator = Validator::new().unwrap();
        assert!(validator.validate_client(&valid_client()).is_ok());
    }

    #[test]
    fn test_client_number_must_be_eight_digits() {
        let validator = Validator::new().unwrap();
        let mut client = valid_client();

        client.client_number = 1234567;
        let errors = validator.validate_client(&client).unwrap_err();
        assert_eq!(fields(&errors), vec!["client_number"]);
        assert_eq!(errors[0].message, "Value must between 10000000-99999999.");

        client.client_number = 100_000_000;
        assert!(validator.validate_client(&client).is_err());

        client.client_number = 99_999_999;
        assert!(validator.validate_client(&client).is_ok());
    }

    #[test]
    fn test_required_blank_name_reports_once() {
        let validator = Validator::new().unwrap();
        let mut client = valid_client();
        client.first_name = "   ".to_string();

        let errors = validator.validate_client(&client).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "The First Name field is required.");
        assert_eq!(errors[0].context, "Client");
    }

    #[test]
    fn test_empty_name_skips_length_rule() {
        let validator = Validator::new().unwrap();
        let mut client = valid_client();
        client.last_name = String::new();

        let errors = validator.validate_client(&client).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "The Last Name field is required.");
    }

    #[test]
    fn test_string_length_limit() {
        let validator = Validator::new().unwrap();
        let mut client = valid_client();
        client.city = "C".repeat(36);

        let errors = validator.validate_client(&client).unwrap_err();
        assert_eq!(
            errors[0].message,
            "The field city must be a string with a minimum length of 1 and a maximum length of 35."
        );

        client.city = "C".repeat(35);
        assert!(validator.validate_client(&client).is_ok());
    }

    #[test]
    fn test_province_pattern() {
        let validator = Validator::new().unwrap();
        let mut client = valid_client();

        for bad in ["on", "ONT", "O", "0N"] {
            client.province = bad.to_string();
            let errors = validator.validate_client(&client).unwrap_err();
            assert_eq!(errors[0].message, "Must be 2 uppercase characters.", "{}", bad);
        }
    }

    #[test]
    fn test_postal_code_rules() {
        let validator = Validator::new().unwrap();
        let mut client = valid_client();

        client.postal_code = "N2L3G1".to_string();
        let errors = validator.validate_client(&client).unwrap_err();
        assert_eq!(errors[0].message, "Must be 7 characters like\"A9A 9A9\"");

        // Too long fails both length and pattern
        client.postal_code = "N2L 3G1X".to_string();
        let errors = validator.validate_client(&client).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(
            errors[0].message,
            "The field Postal Code must be a string with a maximum length of 7."
        );
    }

    #[test]
    fn test_collects_all_client_errors() {
        let validator = Validator::new().unwrap();
        let mut client = valid_client();
        client.client_number = 0;
        client.address = String::new();
        client.province = "xx".to_string();

        let errors = validator.validate_client(&client).unwrap_err();
        assert_eq!(fields(&errors), vec!["client_number", "address", "province"]);
    }

    #[test]
    fn test_notes_optional() {
        let validator = Validator::new().unwrap();
        let client = valid_client().with_notes("Prefers paper statements");
        assert!(validator.validate_client(&client).is_ok());
    }

    #[test]
    fn test_bank_account_validation() {
        let validator = Validator::new().unwrap();

        let mut account = BankAccount::mortgage(1, 1, 150_000.0, 0.045, Some(300));
        account.account_number = 12;
        assert!(validator.validate_bank_account(&account).is_ok());

        account.account_number = -3;
        let errors = validator.validate_bank_account(&account).unwrap_err();
        assert_eq!(fields(&errors), vec!["account_number"]);
        assert_eq!(errors[0].context, "MortgageAccount");
        assert_eq!(
            errors[0].message,
            "The field Account Number must match the regular expression '[0-9]+'."
        );
    }

    #[test]
    fn test_bank_account_rejects_non_finite_amounts() {
        let validator = Validator::new().unwrap();
        let mut account = BankAccount::investment(1, 1, 100.0, f64::NAN);
        account.account_number = 1;

        let errors = validator.validate_bank_account(&account).unwrap_err();
        assert_eq!(fields(&errors), vec!["interest_rate"]);
        assert_eq!(errors[0].message, "The field Interest Rate must be a finite number.");
    }

    #[test]
    fn test_non_finite_errors_follow_registry_order() {
        let validator = Validator::new().unwrap();
        let mut account = BankAccount::investment(1, 1, f64::INFINITY, f64::NAN);
        account.account_number = 1;

        for _ in 0..5 {
            let errors = validator.validate_bank_account(&account).unwrap_err();
            assert_eq!(
                fields(&errors),
                vec!["balance", "opening_balance", "interest_rate"]
            );
            assert_eq!(errors[0].message, "The field Current Balance must be a finite number.");
        }
    }

    #[test]
    fn test_account_status_requires_description() {
        let validator = Validator::new().unwrap();
        let mut status = AccountStatus::new(StatusKind::Delinquent);
        assert!(validator.validate_account_status(&status).is_ok());

        status.description = String::new();
        let errors = validator.validate_account_status(&status).unwrap_err();
        assert_eq!(errors[0].message, "The Account Status field is required.");
    }

    #[test]
    fn test_invalid_custom_pattern_is_reported() {
        use crate::attributes::{AttributeDefinition, AttributeType};

        let mut registry = AttributeRegistry::new();
        registry.register(
            AttributeDefinition::new(EntityKind::Client, "city", AttributeType::Text)
                .pattern("[unclosed", None),
        );
        assert!(Validator::with_registry(registry).is_err());
    }
}
