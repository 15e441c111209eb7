use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer, ser::SerializeMap};
use serde_json::{Map, Value};
use std::marker::PhantomData;
use tracing::debug;

use crate::error::{LedgerError, LedgerResult};
use crate::filter::{Filter, FindOptions, Query, DOC_TYPE_FIELD};
use crate::schema::{Draft, Entity, HookContext, SchemaRegistry, TypeSchema, WriteMode, CREATED_AT_FIELD};
use crate::stub::LedgerStub;

/// A persisted entity plus the fields the adapter injects.
#[derive(Debug, Clone, PartialEq)]
pub struct Record<E> {
    pub data: E,
    pub created_at: DateTime<Utc>,
    pub doc_type: String,
}

impl<E: Entity> Record<E> {
    pub fn from_document(doc: Value) -> LedgerResult<Self> {
        let created_at = doc.get(CREATED_AT_FIELD)
            .and_then(|v| v.as_str())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|d| d.with_timezone(&Utc))
            .ok_or_else(|| LedgerError::Validation(format!("stored record has no valid '{}'", CREATED_AT_FIELD)))?;
        let doc_type = doc.get(DOC_TYPE_FIELD)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let data: E = serde_json::from_value(doc)?;
        Ok(Self { data, created_at, doc_type })
    }
}

impl<E: Entity> Serialize for Record<E> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let body = serde_json::to_value(&self.data).map_err(serde::ser::Error::custom)?;
        let fields = body.as_object().cloned().unwrap_or_default();
        let mut map = serializer.serialize_map(Some(fields.len() + 2))?;
        for (k, v) in &fields {
            map.serialize_entry(k, v)?;
        }
        map.serialize_entry(CREATED_AT_FIELD, &self.created_at)?;
        map.serialize_entry(DOC_TYPE_FIELD, &self.doc_type)?;
        map.end()
    }
}

/// Typed access to the records of one entity type.
pub struct Repository<'r, E> {
    registry: &'r SchemaRegistry,
    schema: &'r TypeSchema,
    _entity: PhantomData<E>,
}

impl<'r, E: Entity> Repository<'r, E> {
    pub fn new(registry: &'r SchemaRegistry) -> LedgerResult<Self> {
        let schema = registry.schema_for::<E>()?;
        Ok(Self { registry, schema, _entity: PhantomData })
    }

    pub fn schema(&self) -> &TypeSchema { self.schema }

    /// In-memory instance prefilled with declared defaults.
    pub fn build(&self, values: Value) -> LedgerResult<Draft<E>> {
        let mut values = match values {
            Value::Object(m) => m,
            Value::Null => Map::new(),
            _ => return Err(LedgerError::Validation(format!("a {} must be built from an object", self.schema.singular()))),
        };
        self.schema.apply_defaults(&mut values);
        Ok(Draft::from_values(values))
    }

    pub fn build_from(&self, entity: &E) -> LedgerResult<Draft<E>> {
        self.build(serde_json::to_value(entity)?)
    }

    pub fn find_by_key(&self, stub: &dyn LedgerStub, key: &str) -> LedgerResult<Option<Record<E>>> {
        stub.get_state(&self.schema.storage_key(key))?
            .map(Record::from_document)
            .transpose()
    }

    pub fn find(&self, stub: &dyn LedgerStub, filter: Filter, options: &FindOptions) -> LedgerResult<Vec<Record<E>>> {
        let query = Query::scoped(self.schema.plural(), filter, options);
        stub.query(&query)?
            .into_iter()
            .map(Record::from_document)
            .collect()
    }

    pub fn find_all(&self, stub: &dyn LedgerStub) -> LedgerResult<Vec<Record<E>>> {
        self.find(stub, Filter::any(), &FindOptions::default())
    }

    pub fn find_one(&self, stub: &dyn LedgerStub, filter: Filter, options: &FindOptions) -> LedgerResult<Option<Record<E>>> {
        let mut options = options.clone();
        options.limit = Some(1);
        Ok(self.find(stub, filter, &options)?.into_iter().next())
    }

    /// Merges `patch` onto the first match and writes it back as an update.
    /// `createdAt` and the primary key are kept from the stored record.
    pub fn find_one_and_update(&self, stub: &mut dyn LedgerStub, filter: Filter, patch: Value) -> LedgerResult<Record<E>> {
        let query = Query::scoped(self.schema.plural(), filter, &FindOptions { limit: Some(1), ..Default::default() });
        let mut current = match stub.query(&query)?.into_iter().next() {
            Some(Value::Object(m)) => m,
            _ => return Err(LedgerError::NotFound(format!("no {} matches the filter", self.schema.singular()))),
        };

        let Value::Object(patch) = patch else {
            return Err(LedgerError::Validation("an update patch must be an object".into()));
        };
        let pk = self.schema.primary_key();
        let key = current.get(pk).and_then(|v| v.as_str()).unwrap_or_default().to_string();
        for (field, value) in patch {
            if field == CREATED_AT_FIELD || field == DOC_TYPE_FIELD {
                continue;
            }
            if field == pk && value.as_str() != Some(key.as_str()) {
                return Err(LedgerError::Validation(format!("the key of a {} can't be changed", self.schema.singular())));
            }
            current.insert(field, value);
        }

        self.schema.validate(&mut current, WriteMode::Update, stub.timestamp())?;
        current.insert(DOC_TYPE_FIELD.into(), Value::String(self.schema.plural().into()));
        let doc = Value::Object(current);
        let record = Record::from_document(doc.clone())?;
        stub.put_state(&self.schema.storage_key(&key), doc)?;
        debug!("updated {} {}", self.schema.singular(), key);
        Ok(record)
    }

    /// Creates the record. Fails if its primary key is already taken.
    pub fn save(&self, stub: &mut dyn LedgerStub, mut draft: Draft<E>) -> LedgerResult<Record<E>> {
        {
            let ctx = HookContext { stub: &*stub, registry: self.registry };
            E::before_create(&mut draft, &ctx)?;
        }

        let values = draft.values_mut();
        values.insert(DOC_TYPE_FIELD.into(), Value::String(self.schema.plural().into()));
        self.schema.validate(values, WriteMode::Create, stub.timestamp())?;

        let doc = Value::Object(draft.values().clone());
        let record = Record::<E>::from_document(doc.clone()).map_err(|e| match e {
            LedgerError::Serde(err) => LedgerError::TypeMismatch {
                field: self.schema.singular().to_string(),
                expected: err.to_string(),
            },
            other => other,
        })?;

        let storage_key = self.schema.storage_key(record.data.key());
        if stub.get_state(&storage_key)?.is_some() {
            return Err(LedgerError::AlreadyExists(format!(
                "this {} already exists: {}", self.schema.singular(), record.data.key()
            )));
        }
        stub.put_state(&storage_key, doc)?;
        debug!("created {} {}", self.schema.singular(), record.data.key());

        let ctx = HookContext { stub: &*stub, registry: self.registry };
        E::after_create(&record, &ctx)?;
        Ok(record)
    }
}
