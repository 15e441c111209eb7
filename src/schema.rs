//! Declarative record shapes and the validation run before every write.
//!
//! Each entity type contributes a [`TypeSchema`] to a [`SchemaRegistry`] that
//! is built once at startup. Writes go through [`TypeSchema::validate`], which
//! for every declared field:
//! 1. applies the default when the value is absent,
//! 2. assigns a fresh value to `unique` fields on creation,
//! 3. rejects missing required fields,
//! 4. checks the value's JSON shape against the declared type,
//! 5. runs the field's custom validators.
//!
//! The first failure aborts the whole write.

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::{marker::PhantomData, str::FromStr};

use crate::error::{LedgerError, LedgerResult};
use crate::ids;
use crate::repo::Record;
use crate::stub::LedgerStub;

pub const CREATED_AT_FIELD: &str = "createdAt";

// ----------------------
// Field specs
// ----------------------
/// `Decimal` is an exact amount written as a decimal string, e.g. `"0.01"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType { String, Number, Decimal, Boolean, Object, Array, Date }

impl FieldType {
    fn name(&self) -> &'static str {
        match self {
            FieldType::String => "String",
            FieldType::Number => "Number",
            FieldType::Decimal => "Decimal",
            FieldType::Boolean => "Boolean",
            FieldType::Object => "Object",
            FieldType::Array => "Array",
            FieldType::Date => "Date",
        }
    }

    fn accepts(&self, v: &Value) -> bool {
        match self {
            FieldType::String => v.is_string(),
            FieldType::Number => v.is_number(),
            FieldType::Decimal => v.as_str().map(|s| Decimal::from_str(s).is_ok()).unwrap_or(false),
            FieldType::Boolean => v.is_boolean(),
            FieldType::Object => v.is_object(),
            FieldType::Array => v.is_array(),
            FieldType::Date => v.as_str().map(|s| DateTime::parse_from_rfc3339(s).is_ok()).unwrap_or(false),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldDefault {
    Value(Value),
    /// The invocation timestamp, RFC 3339.
    Now,
}

#[derive(Clone, Copy)]
pub struct Validator {
    pub name: &'static str,
    pub check: fn(&Value) -> bool,
}

impl std::fmt::Debug for Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

impl Validator {
    pub fn non_empty() -> Self {
        Self { name: "non_empty", check: |v| v.as_str().map(|s| !s.trim().is_empty()).unwrap_or(true) }
    }

    pub fn non_negative() -> Self {
        Self { name: "non_negative", check: |v| decimal_of(v).map(|n| n >= Decimal::ZERO).unwrap_or(true) }
    }

    pub fn positive() -> Self {
        Self { name: "positive", check: |v| decimal_of(v).map(|n| n > Decimal::ZERO).unwrap_or(true) }
    }

    pub fn hex_digest() -> Self {
        Self {
            name: "hex_digest",
            check: |v| v.as_str()
                .map(|s| s.len() == ids::ADDRESS_KEY_LEN && s.chars().all(|c| c.is_ascii_hexdigit()))
                .unwrap_or(true),
        }
    }
}

// Numeric reading of a Number or Decimal field, without going through f64.
fn decimal_of(v: &Value) -> Option<Decimal> {
    match v {
        Value::String(s) => Decimal::from_str(s).ok(),
        Value::Number(n) => {
            let text = n.to_string();
            Decimal::from_str(&text).or_else(|_| Decimal::from_scientific(&text)).ok()
        }
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    pub ty: FieldType,
    pub required: bool,
    pub default: Option<FieldDefault>,
    pub unique: bool,
    pub validators: Vec<Validator>,
}

impl FieldSpec {
    pub fn new(name: &str, ty: FieldType) -> Self {
        Self { name: name.to_string(), ty, required: false, default: None, unique: false, validators: vec![] }
    }

    pub fn required(mut self) -> Self { self.required = true; self }

    pub fn unique(mut self) -> Self { self.unique = true; self }

    pub fn default_value(mut self, v: impl Into<Value>) -> Self {
        self.default = Some(FieldDefault::Value(v.into()));
        self
    }

    pub fn default_now(mut self) -> Self { self.default = Some(FieldDefault::Now); self }

    pub fn validator(mut self, v: Validator) -> Self { self.validators.push(v); self }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeOptions {
    pub primary_key: String,
    pub singular: String,
    pub plural: String,
}

impl TypeOptions {
    pub fn new(primary_key: &str, singular: &str, plural: &str) -> Self {
        Self { primary_key: primary_key.into(), singular: singular.into(), plural: plural.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode { Create, Update }

// ----------------------
// Type schema
// ----------------------
#[derive(Debug, Clone)]
pub struct TypeSchema {
    pub fields: Vec<FieldSpec>,
    pub options: TypeOptions,
}

impl TypeSchema {
    pub fn singular(&self) -> &str { &self.options.singular }
    pub fn plural(&self) -> &str { &self.options.plural }
    pub fn primary_key(&self) -> &str { &self.options.primary_key }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Ledger key under which a record of this type is stored.
    pub fn storage_key(&self, key: &str) -> String {
        format!("{}/{}", self.options.plural, key)
    }

    /// Prefills declared static defaults. No ledger access.
    pub fn apply_defaults(&self, values: &mut Map<String, Value>) {
        for f in &self.fields {
            if let Some(FieldDefault::Value(d)) = &f.default {
                if is_absent(values.get(&f.name)) {
                    values.insert(f.name.clone(), d.clone());
                }
            }
        }
    }

    pub fn validate(&self, values: &mut Map<String, Value>, mode: WriteMode, now: DateTime<Utc>) -> LedgerResult<()> {
        for f in &self.fields {
            if is_absent(values.get(&f.name)) {
                match &f.default {
                    Some(FieldDefault::Value(d)) => { values.insert(f.name.clone(), d.clone()); }
                    Some(FieldDefault::Now) => {
                        values.insert(f.name.clone(), Value::String(now.to_rfc3339_opts(SecondsFormat::Millis, true)));
                    }
                    None => {}
                }
            }

            if f.unique && mode == WriteMode::Create {
                values.insert(f.name.clone(), Value::String(ids::unique_value()));
            }

            let value = values.get(&f.name).filter(|v| !v.is_null());
            let value = match value {
                Some(v) => v,
                None if f.required => {
                    return Err(LedgerError::Validation(format!("the field '{}' of {} is required", f.name, self.options.singular)));
                }
                None => continue,
            };

            if !f.ty.accepts(value) {
                return Err(LedgerError::TypeMismatch { field: f.name.clone(), expected: f.ty.name().to_string() });
            }

            if let Some(v) = f.validators.iter().find(|v| !(v.check)(value)) {
                return Err(LedgerError::Validator { field: f.name.clone(), validator: v.name.to_string() });
            }
        }
        Ok(())
    }
}

fn is_absent(v: Option<&Value>) -> bool {
    v.map(|v| v.is_null()).unwrap_or(true)
}

// ----------------------
// Registry
// ----------------------
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    types: Vec<TypeSchema>,
    address_key_attempts: u32,
}

impl SchemaRegistry {
    pub fn new(address_key_attempts: u32) -> Self {
        Self { types: vec![], address_key_attempts: address_key_attempts.max(1) }
    }

    /// Registry holding every ledger entity type.
    pub fn standard(address_key_attempts: u32) -> LedgerResult<Self> {
        use crate::model::*;
        let mut reg = Self::new(address_key_attempts);
        reg.register::<Member>()?;
        reg.register::<Address>()?;
        reg.register::<Asset>()?;
        reg.register::<Wallet>()?;
        reg.register::<Transaction>()?;
        reg.register::<Transfer>()?;
        Ok(reg)
    }

    pub fn address_key_attempts(&self) -> u32 { self.address_key_attempts }

    pub fn register<E: Entity>(&mut self) -> LedgerResult<()> {
        self.define(E::fields(), E::options())
    }

    pub fn define(&mut self, mut fields: Vec<FieldSpec>, options: TypeOptions) -> LedgerResult<()> {
        if options.singular.is_empty() || options.plural.is_empty() {
            return Err(LedgerError::Schema("the singular or plural name can't be empty".into()));
        }
        if options.primary_key.is_empty() {
            return Err(LedgerError::Schema(format!("type '{}' has no primary key", options.singular)));
        }
        if !fields.iter().any(|f| f.name == options.primary_key) {
            return Err(LedgerError::Schema(format!(
                "primary key '{}' is not a declared field of '{}'", options.primary_key, options.singular
            )));
        }
        for (i, f) in fields.iter().enumerate() {
            if fields[..i].iter().any(|g| g.name == f.name) {
                return Err(LedgerError::Schema(format!("field '{}' declared twice on '{}'", f.name, options.singular)));
            }
        }
        if self.types.iter().any(|t| t.options.singular == options.singular || t.options.plural == options.plural) {
            return Err(LedgerError::Schema(format!(
                "type name '{}'/'{}' is already registered", options.singular, options.plural
            )));
        }

        if !fields.iter().any(|f| f.name == CREATED_AT_FIELD) {
            fields.push(FieldSpec::new(CREATED_AT_FIELD, FieldType::Date).required().default_now());
        }
        self.types.push(TypeSchema { fields, options });
        Ok(())
    }

    pub fn get(&self, singular: &str) -> Option<&TypeSchema> {
        self.types.iter().find(|t| t.options.singular == singular)
    }

    pub fn schema_for<E: Entity>(&self) -> LedgerResult<&TypeSchema> {
        let opts = E::options();
        self.get(&opts.singular)
            .ok_or_else(|| LedgerError::Schema(format!("type '{}' is not registered", opts.singular)))
    }

    pub fn type_names(&self) -> Vec<&str> {
        self.types.iter().map(|t| t.options.singular.as_str()).collect()
    }
}

// ----------------------
// Entities
// ----------------------
pub struct HookContext<'a> {
    pub stub: &'a dyn LedgerStub,
    pub registry: &'a SchemaRegistry,
}

/// A record type stored on the ledger.
pub trait Entity: Serialize + DeserializeOwned + Clone {
    fn options() -> TypeOptions;

    fn fields() -> Vec<FieldSpec>;

    fn key(&self) -> &str;

    fn before_create(_draft: &mut Draft<Self>, _ctx: &HookContext<'_>) -> LedgerResult<()> {
        Ok(())
    }

    fn after_create(_record: &Record<Self>, _ctx: &HookContext<'_>) -> LedgerResult<()> {
        Ok(())
    }
}

/// Unsaved instance of an entity: raw field values, defaults prefilled.
#[derive(Debug, Clone)]
pub struct Draft<E> {
    values: Map<String, Value>,
    _entity: PhantomData<E>,
}

impl<E: Entity> Draft<E> {
    pub(crate) fn from_values(values: Map<String, Value>) -> Self {
        Self { values, _entity: PhantomData }
    }

    pub fn get(&self, field: &str) -> Option<&Value> { self.values.get(field) }

    pub fn set(&mut self, field: &str, value: impl Into<Value>) {
        self.values.insert(field.to_string(), value.into());
    }

    pub fn values(&self) -> &Map<String, Value> { &self.values }

    pub(crate) fn values_mut(&mut self) -> &mut Map<String, Value> { &mut self.values }
}
