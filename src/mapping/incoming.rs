//! Entity to item mapping.

use super::template::{expand, local_name, strip_prefix};
use super::{Datatype, EntityToItemMapping, IncomingMappingConfig, parse_datatype};
use crate::io::traits::ItemFactory;
use crate::models::{Entity, EntityRef, Item, Value};
use crate::{Error, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone)]
enum Source {
    Identity,
    Deleted,
    Recorded,
    Property(String),
    Reference(String),
}

#[derive(Debug, Clone)]
struct Rule {
    field: String,
    source: Source,
    strip: bool,
    required: bool,
    default: Option<Value>,
    datatype: Option<Datatype>,
}

impl Rule {
    fn compile(mapping: &EntityToItemMapping) -> Result<Self> {
        let entity_property = || {
            mapping
                .entity_property
                .clone()
                .filter(|name| !name.is_empty())
                .ok_or_else(|| {
                    Error::Configuration(format!(
                        "entity property {} is required for mapping",
                        mapping.property
                    ))
                })
        };
        let source = if mapping.is_identity {
            Source::Identity
        } else if mapping.is_deleted {
            Source::Deleted
        } else if mapping.is_recorded {
            Source::Recorded
        } else if mapping.is_reference {
            Source::Reference(entity_property()?)
        } else {
            Source::Property(entity_property()?)
        };
        Ok(Self {
            field: mapping.property.clone(),
            source,
            strip: mapping.strip_reference_prefix,
            required: mapping.required,
            default: mapping.default_value.clone().map(Value::from_json),
            datatype: parse_datatype(mapping.datatype.as_deref())?,
        })
    }
}

/// Builds items from entities using one dataset's incoming mapping.
///
/// Entity keys are full URIs by default, so short property names resolve
/// against the base URI. With `strip_props` set, keys arrive already
/// stripped upstream and configured names match by local name instead.
/// Without explicit mappings and with `mapNamed` set, every property or
/// reference whose local name the item factory accepts is copied.
#[derive(Clone)]
pub struct EntityToItemMapper {
    base_uri: String,
    rules: Vec<Rule>,
    map_named: bool,
    strip_props: bool,
    factory: Arc<dyn ItemFactory>,
}

impl fmt::Debug for EntityToItemMapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityToItemMapper")
            .field("base_uri", &self.base_uri)
            .field("rules", &self.rules)
            .field("map_named", &self.map_named)
            .field("strip_props", &self.strip_props)
            .field("field_names", &self.factory.field_names())
            .finish()
    }
}

impl EntityToItemMapper {
    /// Compiles and validates a mapping configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when a property rule lacks its entity
    /// property, a datatype is unknown, or more than one identity rule exists.
    pub fn new(config: &IncomingMappingConfig, factory: Arc<dyn ItemFactory>) -> Result<Self> {
        let rules = config
            .property_mappings
            .iter()
            .map(Rule::compile)
            .collect::<Result<Vec<_>>>()?;

        let identities = rules
            .iter()
            .filter(|rule| matches!(rule.source, Source::Identity))
            .count();
        if identities > 1 {
            return Err(Error::Configuration(format!(
                "at most one identity property mapping is allowed, found {identities}"
            )));
        }

        Ok(Self {
            base_uri: config.base_uri.clone(),
            rules,
            map_named: config.map_named,
            strip_props: false,
            factory,
        })
    }

    /// Sets whether entity keys arrive with their URI prefix stripped.
    #[must_use]
    pub const fn with_strip_props(mut self, strip_props: bool) -> Self {
        self.strip_props = strip_props;
        self
    }

    /// Whether entity keys are expected in stripped form.
    #[must_use]
    pub const fn strip_props(&self) -> bool {
        self.strip_props
    }

    /// Maps one entity to an item.
    ///
    /// # Errors
    ///
    /// Returns a validation error when a required property is absent and has
    /// no default, or a type conversion error when coercion fails.
    pub fn map(&self, entity: &Entity) -> Result<Item> {
        let mut item = self.factory.new_item();

        if self.rules.is_empty() {
            if self.map_named {
                self.map_named_fields(entity, &mut item);
            }
            return Ok(item);
        }

        for rule in &self.rules {
            let value = match &rule.source {
                Source::Identity => Some(Value::String(entity.id.clone())),
                Source::Deleted => Some(Value::Boolean(entity.deleted)),
                Source::Recorded => entity
                    .recorded
                    .map(|recorded| {
                        i64::try_from(recorded).map(Value::Integer).map_err(|_| {
                            Error::TypeConversion {
                                field: rule.field.clone(),
                                expected: "int".to_string(),
                                actual: recorded.to_string(),
                            }
                        })
                    })
                    .transpose()?,
                Source::Property(name) => self.lookup(&entity.properties, name).cloned(),
                Source::Reference(name) => self.lookup(&entity.references, name).map(ref_value),
            };

            let value = match value.filter(|v| !v.is_null()) {
                Some(value) if rule.strip => strip_value(value),
                Some(value) => value,
                None => match &rule.default {
                    Some(default) => default.clone(),
                    None if rule.required => {
                        return Err(Error::validation(
                            &rule.field,
                            format!("property {} is required", rule.field),
                        ));
                    },
                    None => continue,
                },
            };
            let value = match rule.datatype {
                Some(datatype) => datatype.coerce(&rule.field, &value)?,
                None => value,
            };
            item.set(rule.field.as_str(), value);
        }
        Ok(item)
    }

    fn map_named_fields(&self, entity: &Entity, item: &mut Item) {
        for (key, value) in &entity.properties {
            let name = local_name(&self.base_uri, key);
            if self.factory.accepts(name) {
                item.set(name, value.clone());
            }
        }
        for (key, target) in &entity.references {
            let name = local_name(&self.base_uri, key);
            if self.factory.accepts(name) {
                item.set(name, ref_value(target));
            }
        }
    }

    /// Finds `name` by exact key, then by its local name when keys are
    /// stripped or by its base URI expansion when they are not.
    fn lookup<'a, V>(&self, map: &'a BTreeMap<String, V>, name: &str) -> Option<&'a V> {
        map.get(name).or_else(|| {
            if self.strip_props {
                map.get(local_name(&self.base_uri, name))
            } else {
                map.get(&expand(&self.base_uri, name))
            }
        })
    }
}

fn ref_value(target: &EntityRef) -> Value {
    match target {
        EntityRef::One(uri) => Value::String(uri.clone()),
        EntityRef::Many(uris) => Value::Sequence(uris.iter().cloned().map(Value::String).collect()),
    }
}

fn strip_value(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(strip_prefix(&s).to_string()),
        Value::Sequence(values) => Value::Sequence(values.into_iter().map(strip_value).collect()),
        other => other,
    }
}
